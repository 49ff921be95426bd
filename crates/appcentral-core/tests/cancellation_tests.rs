//! Cancellation, call timeouts and concurrent server walks.

use std::sync::Arc;
use std::time::Duration;

use appcentral_core::{AggregatorConfig, CancellationToken, Error, ProgressHandlers, ProvenanceRecord};
use appcentral_test_utils::{MockRepository, MockServer, mock_aggregator};
use pretty_assertions::assert_eq;

fn slow_server(id: &str, latency: Duration) -> Arc<MockServer> {
    MockServer::new(id)
        .repository(MockRepository::new("main").application("1", "crm", &["1.0"]))
        .with_latency(latency)
        .shared()
}

#[tokio::test]
async fn test_already_cancelled_token_makes_no_remote_calls() {
    let server = slow_server("s1", Duration::ZERO);
    let aggregator = mock_aggregator(&[server.clone()]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = aggregator
        .get_available_applications_with_cancel(false, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(server.call_count(), 0);
}

#[tokio::test]
async fn test_cancel_during_build_aborts_between_calls() {
    let server = slow_server("s1", Duration::from_millis(200));
    let aggregator = mock_aggregator(&[server.clone()]);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = aggregator
        .get_available_applications_with_cancel(false, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    // Only the repository listing was started before the token fired.
    assert_eq!(server.call_count(), 1);
}

#[tokio::test]
async fn test_cancel_during_refresh() {
    let server = slow_server("s1", Duration::from_millis(200));
    let aggregator = mock_aggregator(&[server]);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = aggregator
        .update_applications_list_with_cancel(ProgressHandlers::new(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
}

#[tokio::test]
async fn test_call_timeout_fails_only_the_slow_server() {
    let slow = slow_server("slow", Duration::from_millis(500));
    let fast = slow_server("fast", Duration::ZERO);
    let aggregator = mock_aggregator(&[slow, fast])
        .with_config(AggregatorConfig::default().with_call_timeout(Duration::from_millis(20)));

    let built = aggregator.get_available_applications(false).await.unwrap();

    assert_eq!(built.failures.len(), 1);
    assert_eq!(built.failures[0].server.as_str(), "slow");
    assert!(built.failures[0].cause.contains("timed out"));
    assert_eq!(
        built.value.provenance("crm", "1.0"),
        &[ProvenanceRecord::new("fast", "main")]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_walk_matches_sequential_order() {
    // Later servers answer faster, so they finish first when run together.
    let servers: Vec<Arc<MockServer>> = (0..4)
        .map(|i| slow_server(&format!("s{i}"), Duration::from_millis(40 - i * 10)))
        .collect();

    let sequential = mock_aggregator(&servers)
        .get_available_applications(false)
        .await
        .unwrap();
    let concurrent = mock_aggregator(&servers)
        .with_config(AggregatorConfig::default().with_max_concurrent_servers(4))
        .get_available_applications(false)
        .await
        .unwrap();

    assert_eq!(sequential, concurrent);
    let order: Vec<&str> = concurrent
        .value
        .provenance("crm", "1.0")
        .iter()
        .map(|p| p.server.as_str())
        .collect();
    assert_eq!(order, vec!["s0", "s1", "s2", "s3"]);
}
