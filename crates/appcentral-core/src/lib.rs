//! Aggregated application index for AppCentral.
//!
//! This crate walks every server in a repository registry, pulls each
//! server's repositories, applications and versions, and folds the result
//! into a single [`ApplicationIndex`] mapping application to version to the
//! places that version was found.
//!
//! The registry and the per-server remote clients are injected through the
//! [`ServerRegistry`] and [`ClientFactory`] traits; this crate performs no
//! network or storage I/O of its own.

pub mod aggregator;
pub mod cache;
pub mod client;
pub mod dependency;
pub mod error;
pub mod index;
pub mod progress;
pub mod types;

pub use aggregator::{Aggregation, AggregationStatus, Aggregator, AggregatorConfig, ServerFailure};
pub use cache::{CacheStats, CachingClient};
pub use client::{ClientFactory, RemoteServerClient, ServerRegistry};
pub use dependency::{DependencyResolver, Requirement, Resolution, Selection};
pub use error::{Error, Result};
pub use index::{ApplicationIndex, VersionMap};
pub use progress::{ProgressHandlers, RefreshReport, RepositoryCompleted, RepositoryEntered};
pub use types::{
    ApplicationId, ApplicationKey, ApplicationMetadata, Listing, ProvenanceRecord, RepositoryId,
    RepositoryMetadata, ServerId, VersionKey, VersionMetadata,
};

pub use tokio_util::sync::CancellationToken;
