//! [`TestWorkspace`] builder for on-disk configuration scenarios.
//!
//! Writes an `appcentral.toml` and one JSON catalog per server into a
//! temporary directory, in the layout the file store reads.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use tempfile::TempDir;

/// Builder for a server catalog document.
///
/// ```rust
/// use appcentral_test_utils::CatalogBuilder;
///
/// let catalog = CatalogBuilder::new("Acme")
///     .repository("stable")
///     .application("7", "crm", &["1.0", "2.0"])
///     .to_json();
/// assert!(catalog.contains("\"crm\""));
/// ```
#[derive(Debug, Clone)]
pub struct CatalogBuilder {
    account: String,
    repositories: Vec<Value>,
}

impl CatalogBuilder {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            repositories: Vec::new(),
        }
    }

    /// Start a new repository; following applications are added to it.
    pub fn repository(mut self, id: &str) -> Self {
        self.repositories.push(json!({
            "id": id,
            "name": id,
            "applications": [],
        }));
        self
    }

    /// Add an application to the most recent repository.
    ///
    /// Panics if no repository was started.
    pub fn application(mut self, key: &str, app_id: &str, versions: &[&str]) -> Self {
        let repository = self
            .repositories
            .last_mut()
            .expect("CatalogBuilder::application called before repository");
        let versions: Vec<Value> = versions.iter().map(|v| json!({ "version": v })).collect();
        repository["applications"]
            .as_array_mut()
            .unwrap()
            .push(json!({
                "key": key,
                "app_id": app_id,
                "versions": versions,
            }));
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&json!({
            "account": self.account,
            "repositories": self.repositories,
        }))
        .unwrap()
    }
}

struct ServerFixture {
    id: String,
    account: Option<String>,
    catalog: String,
}

/// A temporary directory holding an appcentral configuration.
///
/// # Example
///
/// ```rust,no_run
/// use appcentral_test_utils::{CatalogBuilder, TestWorkspace};
///
/// let mut workspace = TestWorkspace::new();
/// workspace.add_server(
///     "s1",
///     &CatalogBuilder::new("Acme").repository("stable").application("7", "crm", &["1.0"]),
/// );
/// workspace.write_config();
/// workspace.assert_file_exists("appcentral.toml");
/// ```
pub struct TestWorkspace {
    temp_dir: TempDir,
    servers: Vec<ServerFixture>,
    extra_config: String,
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
            servers: Vec::new(),
            extra_config: String::new(),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.root().join("appcentral.toml")
    }

    /// Register a server and write its catalog to `catalogs/{id}.json`.
    pub fn add_server(&mut self, id: &str, catalog: &CatalogBuilder) -> &mut Self {
        let relative = format!("catalogs/{id}.json");
        self.write_file(&relative, &catalog.to_json());
        self.servers.push(ServerFixture {
            id: id.to_string(),
            account: None,
            catalog: relative,
        });
        self
    }

    /// Register a server whose catalog file does not exist.
    pub fn add_missing_server(&mut self, id: &str) -> &mut Self {
        self.servers.push(ServerFixture {
            id: id.to_string(),
            account: Some(format!("{id} (offline)")),
            catalog: format!("catalogs/{id}-missing.json"),
        });
        self
    }

    /// Append raw TOML (e.g. `[aggregator]` or `[cache]` sections).
    pub fn with_config(&mut self, toml: &str) -> &mut Self {
        self.extra_config.push_str(toml);
        self.extra_config.push('\n');
        self
    }

    /// Write `appcentral.toml` for the registered servers.
    pub fn write_config(&self) {
        let mut config = self.extra_config.clone();
        for server in &self.servers {
            config.push_str("\n[[servers]]\n");
            config.push_str(&format!("id = \"{}\"\n", server.id));
            if let Some(account) = &server.account {
                config.push_str(&format!("account = \"{account}\"\n"));
            }
            config.push_str(&format!("catalog = \"{}\"\n", server.catalog));
        }
        fs::write(self.config_path(), config).unwrap();
    }

    /// Write a file relative to the workspace root, creating parents.
    pub fn write_file(&self, relative: &str, content: &str) {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    pub fn assert_file_exists(&self, relative: &str) {
        let path = self.root().join(relative);
        assert!(path.exists(), "expected file to exist: {}", path.display());
    }
}
