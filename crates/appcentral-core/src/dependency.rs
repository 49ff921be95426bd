//! Dependency resolution extension point.
//!
//! The aggregator does not interpret version constraints. A
//! [`DependencyResolver`] plugged into the aggregator receives the
//! requirements and a complete [`ApplicationIndex`], and either picks a
//! version and provenance for each requirement or names the first
//! requirement it cannot meet with
//! [`Error::UnsatisfiableDependency`](crate::Error::UnsatisfiableDependency).
//!
//! Without a resolver, [`Aggregator::resolve_dependencies`] reports
//! [`Error::UnsupportedOperation`](crate::Error::UnsupportedOperation).
//!
//! [`Aggregator::resolve_dependencies`]: crate::Aggregator::resolve_dependencies

use indexmap::IndexMap;

use crate::error::Result;
use crate::index::ApplicationIndex;
use crate::types::{ApplicationId, ProvenanceRecord, VersionKey};

/// One application that must be available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub application: ApplicationId,
    /// Constraint text, passed to the resolver uninterpreted.
    pub constraint: Option<String>,
}

impl Requirement {
    /// Require any version of `application`.
    pub fn any(application: impl Into<ApplicationId>) -> Self {
        Self {
            application: application.into(),
            constraint: None,
        }
    }

    /// Require `application` under a resolver-defined constraint.
    pub fn constrained(application: impl Into<ApplicationId>, constraint: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            constraint: Some(constraint.into()),
        }
    }
}

/// The version and origin chosen for one requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub version: VersionKey,
    pub provenance: ProvenanceRecord,
}

/// A satisfying assignment, in requirement order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub selections: IndexMap<ApplicationId, Selection>,
}

impl Resolution {
    pub fn get(&self, application: &str) -> Option<&Selection> {
        self.selections.get(application)
    }

    pub fn len(&self) -> usize {
        self.selections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }
}

/// Strategy that satisfies requirements from an index.
///
/// Ordering and conflict policy belong entirely to the implementation.
pub trait DependencyResolver: Send + Sync {
    fn resolve(&self, requirements: &[Requirement], index: &ApplicationIndex)
    -> Result<Resolution>;
}
