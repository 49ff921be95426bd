//! Shared test utilities for the appcentral workspace.
//!
//! This crate provides standardised test doubles and fixtures so crate test
//! suites do not each grow their own. It is a dev-dependency only and never
//! published.
//!
//! # Modules
//!
//! - [`mock`] — in-memory registry, servers and client factory
//! - [`workspace`] — [`TestWorkspace`] builder for on-disk configuration
//!   and catalog files
//!
//! [`TestWorkspace`]: workspace::TestWorkspace

pub mod mock;
pub mod workspace;

pub use mock::{Call, MockApplication, MockFactory, MockRegistry, MockRepository, MockServer, mock_aggregator};
pub use workspace::{CatalogBuilder, TestWorkspace};
