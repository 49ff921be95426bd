//! End-to-end index building over an on-disk configuration
//!
//! Exercises the full flow: appcentral.toml -> file registry -> catalog
//! clients -> aggregator -> index.

use std::fs;

use appcentral_core::{AggregationStatus, ApplicationId, Error, ProvenanceRecord};
use appcentral_store::open_aggregator;
use appcentral_test_utils::{CatalogBuilder, TestWorkspace};
use pretty_assertions::assert_eq;

fn acme() -> CatalogBuilder {
    CatalogBuilder::new("Acme")
        .repository("stable")
        .application("7", "crm", &["1.0", "2.0"])
        .application("8", "wiki", &["0.9"])
        .repository("testing")
        .application("7", "crm", &["2.1-rc1"])
}

fn globex() -> CatalogBuilder {
    CatalogBuilder::new("Globex")
        .repository("main")
        .application("crm-app", "crm", &["2.0"])
        .application("erp", "erp", &["5.0"])
}

#[tokio::test]
async fn test_full_flow_with_one_offline_server() {
    let mut workspace = TestWorkspace::new();
    workspace
        .add_server("acme", &acme())
        .add_missing_server("offline")
        .add_server("globex", &globex());
    workspace.write_config();
    let aggregator = open_aggregator(&workspace.config_path()).unwrap();

    let built = aggregator.get_available_applications(false).await.unwrap();

    assert_eq!(
        built.status(),
        AggregationStatus::Partial {
            failed: 1,
            visited: 3
        }
    );
    assert_eq!(built.failed_servers()[0].as_str(), "offline");

    let applications: Vec<&str> = built.value.applications().map(|a| a.as_str()).collect();
    assert_eq!(applications, vec!["crm", "wiki", "erp"]);
    assert_eq!(
        built.value.provenance("crm", "2.0"),
        &[
            ProvenanceRecord::new("acme", "stable"),
            ProvenanceRecord::new("globex", "main"),
        ]
    );
    assert_eq!(
        built.value.provenance("crm", "2.1-rc1"),
        &[ProvenanceRecord::new("acme", "testing")]
    );
    assert_eq!(built.value.version_count(), 5);
}

#[tokio::test]
async fn test_find_agrees_with_index_and_reports_unreachable() {
    let mut workspace = TestWorkspace::new();
    workspace
        .add_server("acme", &acme())
        .add_missing_server("offline");
    workspace.write_config();
    let aggregator = open_aggregator(&workspace.config_path()).unwrap();

    let built = aggregator.get_available_applications(false).await.unwrap();
    let found = aggregator
        .find_application(&ApplicationId::new("crm"), false)
        .await
        .unwrap();
    assert_eq!(Some(&found.value), built.value.get("crm"));

    let err = aggregator
        .find_application(&ApplicationId::new("erp"), false)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "application 'erp' not found (unreachable servers: offline)"
    );
}

#[tokio::test]
async fn test_index_serializes_as_nested_maps() {
    let mut workspace = TestWorkspace::new();
    workspace.add_server("globex", &globex());
    workspace.write_config();
    let aggregator = open_aggregator(&workspace.config_path()).unwrap();

    let index = aggregator
        .get_available_applications(false)
        .await
        .unwrap()
        .into_value();

    assert_eq!(
        serde_json::to_value(&index).unwrap(),
        serde_json::json!({
            "crm": { "2.0": [ { "server": "globex", "repository": "main" } ] },
            "erp": { "5.0": [ { "server": "globex", "repository": "main" } ] },
        })
    );
}

#[tokio::test]
async fn test_server_added_after_open_is_aggregated() {
    let mut workspace = TestWorkspace::new();
    workspace.add_server("acme", &acme());
    workspace.write_config();
    let aggregator = open_aggregator(&workspace.config_path()).unwrap();
    assert!(!aggregator
        .get_available_applications(false)
        .await
        .unwrap()
        .value
        .contains("erp"));

    workspace.add_server("globex", &globex());
    workspace.write_config();

    let built = aggregator.get_available_applications(false).await.unwrap();
    assert!(built.is_complete());
    assert_eq!(
        built.value.provenance("erp", "5.0"),
        &[ProvenanceRecord::new("globex", "main")]
    );
}

#[tokio::test]
async fn test_concurrent_walk_matches_sequential_walk() {
    let mut sequential = TestWorkspace::new();
    let mut concurrent = TestWorkspace::new();
    for workspace in [&mut sequential, &mut concurrent] {
        workspace
            .add_server("acme", &acme())
            .add_missing_server("offline")
            .add_server("globex", &globex());
    }
    concurrent.with_config("[aggregator]\nmax_concurrent_servers = 3");
    sequential.write_config();
    concurrent.write_config();

    let one = open_aggregator(&sequential.config_path())
        .unwrap()
        .get_available_applications(false)
        .await
        .unwrap();
    let many = open_aggregator(&concurrent.config_path())
        .unwrap()
        .get_available_applications(false)
        .await
        .unwrap();

    assert_eq!(one.value, many.value);
    assert_eq!(one.failed_servers(), many.failed_servers());
}

#[tokio::test]
async fn test_cached_listings_serve_until_refresh() {
    let mut workspace = TestWorkspace::new();
    workspace.add_server("globex", &globex());
    workspace.write_config();
    let aggregator = open_aggregator(&workspace.config_path()).unwrap();
    aggregator.get_available_applications(false).await.unwrap();

    workspace.write_file(
        "catalogs/globex.json",
        &CatalogBuilder::new("Globex")
            .repository("main")
            .application("crm-app", "crm", &["2.0", "3.0"])
            .to_json(),
    );

    let cached = aggregator.get_available_applications(false).await.unwrap();
    assert!(cached.value.contains("erp"));
    assert!(cached.value.provenance("crm", "3.0").is_empty());

    let refreshed = aggregator.get_available_applications(true).await.unwrap();
    assert!(!refreshed.value.contains("erp"));
    assert_eq!(refreshed.value.provenance("crm", "3.0").len(), 1);
}

#[tokio::test]
async fn test_disabled_cache_reads_through() {
    let mut workspace = TestWorkspace::new();
    workspace
        .add_server("globex", &globex())
        .with_config("[cache]\nenabled = false");
    workspace.write_config();
    let aggregator = open_aggregator(&workspace.config_path()).unwrap();
    aggregator.get_available_applications(false).await.unwrap();

    workspace.write_file(
        "catalogs/globex.json",
        &CatalogBuilder::new("Globex").repository("main").to_json(),
    );

    let built = aggregator.get_available_applications(false).await.unwrap();
    assert!(built.value.is_empty());
    assert!(built.is_complete());
}

#[tokio::test]
async fn test_removed_config_makes_registry_unavailable() {
    let mut workspace = TestWorkspace::new();
    workspace.add_server("acme", &acme());
    workspace.write_config();
    let aggregator = open_aggregator(&workspace.config_path()).unwrap();

    fs::remove_file(workspace.config_path()).unwrap();

    let err = aggregator
        .get_available_applications(false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RegistryUnavailable { .. }));
}

#[tokio::test]
async fn test_malformed_catalog_fails_only_its_server() {
    let mut workspace = TestWorkspace::new();
    workspace
        .add_server("acme", &acme())
        .add_server("globex", &globex());
    workspace.write_config();
    workspace.write_file("catalogs/globex.json", "{ \"repositories\": 42 }");
    let aggregator = open_aggregator(&workspace.config_path()).unwrap();

    let built = aggregator.get_available_applications(false).await.unwrap();

    assert_eq!(built.failures.len(), 1);
    assert_eq!(built.failures[0].server.as_str(), "globex");
    assert!(built.failures[0].cause.contains("Invalid catalog"));
    assert!(built.value.contains("wiki"));
}
