//! Identifiers and metadata reported by AppCentral servers.

use std::borrow::Borrow;
use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Insertion-ordered listing returned by a remote server.
///
/// Order matches the order the server reported entries in.
pub type Listing<K, V> = IndexMap<K, V>;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// Identifier of a registered AppCentral server.
    ServerId
}

string_id! {
    /// Identifier of a repository, unique within one server's listing.
    RepositoryId
}

string_id! {
    /// Stable identifier of an application, as declared in its metadata.
    ///
    /// The aggregated index is keyed by this identifier.
    ApplicationId
}

string_id! {
    /// Repository-local handle under which an application is listed.
    ///
    /// Versions are queried by this key; two repositories may list the same
    /// [`ApplicationId`] under different keys.
    ApplicationKey
}

string_id! {
    /// Identifier of one release of an application.
    ///
    /// Keys are opaque: they are never parsed, compared or sorted.
    VersionKey
}

/// Repository details reported by a server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Application details reported by a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationMetadata {
    /// Stable application identifier, distinct from the listing key.
    pub app_id: ApplicationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ApplicationMetadata {
    pub fn new(app_id: impl Into<ApplicationId>) -> Self {
        Self {
            app_id: app_id.into(),
            name: None,
            description: None,
            category: None,
        }
    }
}

/// Release details reported for one application version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Where an application version was found.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub server: ServerId,
    pub repository: RepositoryId,
}

impl ProvenanceRecord {
    pub fn new(server: impl Into<ServerId>, repository: impl Into<RepositoryId>) -> Self {
        Self {
            server: server.into(),
            repository: repository.into(),
        }
    }
}

impl fmt::Display for ProvenanceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.server, self.repository)
    }
}
