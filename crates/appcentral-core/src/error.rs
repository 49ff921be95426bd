//! Error types for appcentral-core

use std::fmt;

use crate::types::{ApplicationId, ServerId};

pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while aggregating AppCentral servers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The registry of servers could not be enumerated.
    ///
    /// Nothing can be aggregated, so this always aborts the whole build.
    #[error("repository registry unavailable: {reason}")]
    RegistryUnavailable { reason: String },

    /// A single server (or one of its repositories) failed to answer.
    #[error("remote server '{server}' failed: {cause}")]
    RemoteServer { server: ServerId, cause: String },

    /// The application is absent from the built index.
    ///
    /// `unreachable` lists servers that failed during the build, so an
    /// absence caused by a partial build is visible to the caller.
    #[error("application '{application}' not found{}", UnreachableSuffix(.unreachable))]
    ApplicationNotFound {
        application: ApplicationId,
        unreachable: Vec<ServerId>,
    },

    /// The operation is declared but has no implementation configured.
    #[error("unsupported operation: {operation}")]
    UnsupportedOperation { operation: &'static str },

    /// A dependency requirement cannot be met from the index.
    #[error("unsatisfiable dependency on '{application}'{}", ConstraintSuffix(.constraint))]
    UnsatisfiableDependency {
        application: ApplicationId,
        constraint: Option<String>,
    },

    /// An operation that needs a complete index got a partial one.
    #[error("application index is incomplete: {failed} server(s) failed")]
    IncompleteIndex { failed: usize },

    /// The traversal was cancelled by the caller.
    #[error("aggregation cancelled")]
    Cancelled,
}

impl Error {
    /// Create a remote server error from any displayable cause.
    pub fn remote(server: impl Into<ServerId>, cause: impl fmt::Display) -> Self {
        Self::RemoteServer {
            server: server.into(),
            cause: cause.to_string(),
        }
    }

    /// Create a registry error from any displayable reason.
    pub fn registry(reason: impl fmt::Display) -> Self {
        Self::RegistryUnavailable {
            reason: reason.to_string(),
        }
    }

    /// Whether this error aborts a whole traversal rather than one server.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RegistryUnavailable { .. } | Self::Cancelled)
    }
}

struct UnreachableSuffix<'a>(&'a [ServerId]);

impl fmt::Display for UnreachableSuffix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }
        let names: Vec<&str> = self.0.iter().map(ServerId::as_str).collect();
        write!(f, " (unreachable servers: {})", names.join(", "))
    }
}

struct ConstraintSuffix<'a>(&'a Option<String>);

impl fmt::Display for ConstraintSuffix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(constraint) => write!(f, " ({constraint})"),
            None => Ok(()),
        }
    }
}
