//! End-to-end refresh with progress over an on-disk configuration

use appcentral_core::{AggregationStatus, ProgressHandlers};
use appcentral_store::open_aggregator;
use appcentral_test_utils::{CatalogBuilder, TestWorkspace};
use pretty_assertions::assert_eq;

fn workspace_with_offline_server() -> TestWorkspace {
    let mut workspace = TestWorkspace::new();
    workspace
        .add_server(
            "acme",
            &CatalogBuilder::new("Acme")
                .repository("stable")
                .application("7", "crm", &["1.0"])
                .repository("testing")
                .application("7", "crm", &["2.0-rc1"]),
        )
        .add_missing_server("offline");
    workspace.write_config();
    workspace
}

#[tokio::test]
async fn test_update_reports_progress_per_repository() {
    let workspace = workspace_with_offline_server();
    let aggregator = open_aggregator(&workspace.config_path()).unwrap();
    let mut lines = Vec::new();
    let mut completions = Vec::new();

    let report = aggregator
        .update_applications_list(
            ProgressHandlers::new()
                .on_entered(|e| lines.push(format!("{} {}/{}", e.account, e.server, e.repository)))
                .on_completed(|e| completions.push(e.success)),
        )
        .await
        .unwrap();

    assert_eq!(lines, vec!["Acme acme/stable", "Acme acme/testing"]);
    assert_eq!(completions, vec![true, true]);
    assert_eq!(report.repositories_refreshed, 2);
    assert_eq!(report.versions_seen, 2);
    assert_eq!(
        report.status(),
        AggregationStatus::Partial {
            failed: 1,
            visited: 2
        }
    );
    assert_eq!(report.failures[0].server.as_str(), "offline");
}

#[tokio::test]
async fn test_update_refreshes_cached_listings() {
    let mut workspace = TestWorkspace::new();
    workspace.add_server(
        "acme",
        &CatalogBuilder::new("Acme")
            .repository("stable")
            .application("7", "crm", &["1.0"]),
    );
    workspace.write_config();
    let aggregator = open_aggregator(&workspace.config_path()).unwrap();
    aggregator.get_available_applications(false).await.unwrap();

    workspace.write_file(
        "catalogs/acme.json",
        &CatalogBuilder::new("Acme")
            .repository("stable")
            .application("7", "crm", &["1.0", "1.1"])
            .to_json(),
    );
    aggregator
        .update_applications_list(ProgressHandlers::new())
        .await
        .unwrap();

    let built = aggregator.get_available_applications(false).await.unwrap();
    assert_eq!(built.value.provenance("crm", "1.1").len(), 1);
}

#[tokio::test]
async fn test_configured_account_overrides_catalog_account() {
    let mut workspace = TestWorkspace::new();
    workspace.add_server(
        "acme",
        &CatalogBuilder::new("Acme").repository("stable"),
    );
    workspace.write_config();
    let config = std::fs::read_to_string(workspace.config_path()).unwrap();
    workspace.write_file(
        "appcentral.toml",
        &config.replace("id = \"acme\"\n", "id = \"acme\"\naccount = \"Acme Holdings\"\n"),
    );
    let aggregator = open_aggregator(&workspace.config_path()).unwrap();
    let mut accounts = Vec::new();

    aggregator
        .update_applications_list(
            ProgressHandlers::new().on_entered(|e| accounts.push(e.account.to_string())),
        )
        .await
        .unwrap();

    assert_eq!(accounts, vec!["Acme Holdings"]);
}

#[tokio::test]
async fn test_update_picks_up_renamed_account() {
    let mut workspace = TestWorkspace::new();
    workspace.add_server("s1", &CatalogBuilder::new("OldName").repository("stable"));
    workspace.write_config();
    let aggregator = open_aggregator(&workspace.config_path()).unwrap();
    let mut accounts = Vec::new();

    aggregator
        .update_applications_list(
            ProgressHandlers::new().on_entered(|e| accounts.push(e.account.to_string())),
        )
        .await
        .unwrap();
    workspace.write_file(
        "catalogs/s1.json",
        &CatalogBuilder::new("NewName").repository("stable").to_json(),
    );
    aggregator
        .update_applications_list(
            ProgressHandlers::new().on_entered(|e| accounts.push(e.account.to_string())),
        )
        .await
        .unwrap();

    assert_eq!(accounts, vec!["OldName", "NewName"]);
}
