use std::sync::Arc;
use std::time::{Duration, Instant};

use msgate_core::{
    codes, BulkConfig, BulkDispatcher, BulkJob, CancellationToken, DeliveryState, MockAdapter,
    MockReply, ProviderAdapter, ProviderCapabilities, ProviderError, ProviderRegistry,
    RegistryError, Router, RouterConfig, SelectionCriterion, SendOptions, SendStatus,
    MULTI_PROVIDER_ID, ROUTER_PROVIDER_ID,
};

fn capabilities(name: &str, countries: &[&str], priority: i32) -> ProviderCapabilities {
    ProviderCapabilities::new(name, countries.iter().copied())
        .expect("valid capabilities")
        .with_priority(priority)
}

fn ghana_mock(name: &str, priority: i32) -> MockAdapter {
    MockAdapter::new(capabilities(name, &["GH"], priority))
}

fn registry_of(adapters: &[Arc<MockAdapter>]) -> Arc<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();
    for adapter in adapters {
        registry
            .register(Arc::clone(adapter) as Arc<dyn ProviderAdapter>)
            .expect("unique provider names");
    }
    Arc::new(registry)
}

fn router_of(adapters: &[Arc<MockAdapter>]) -> Router {
    Router::new(registry_of(adapters))
}

fn options() -> SendOptions {
    SendOptions::new("+233244123456", "Your code is 1234", "MSGATE")
}

fn names(adapters: &[Arc<dyn ProviderAdapter>]) -> Vec<String> {
    adapters
        .iter()
        .map(|adapter| adapter.name().to_owned())
        .collect()
}

// =============================================================================
// Failover
// =============================================================================

#[tokio::test]
async fn when_first_provider_lacks_credit_system_fails_over_to_next() {
    // Given: A (priority 1) answers insufficient_credit, B (priority 2) accepts
    let a = Arc::new(
        ghana_mock("A", 1).then(MockReply::failed(SendStatus::InsufficientCredit)),
    );
    let b = Arc::new(ghana_mock("B", 2).then(MockReply::submitted("abc123")));
    let router = router_of(&[Arc::clone(&b), Arc::clone(&a)]);

    // When: A message is routed to Ghana
    let outcome = router.send(options(), "GH", None).await;

    // Then: B's success is returned and both adapters were tried once, in order
    assert!(outcome.success);
    assert_eq!(outcome.provider_id, "B");
    assert_eq!(outcome.external_id.as_deref(), Some("abc123"));
    assert_eq!(outcome.attempts, vec!["A", "B"]);
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 1);
    assert_eq!(a.stats().snapshot().total_failed, 1);
    assert_eq!(b.stats().snapshot().total_delivered, 1);
}

#[tokio::test]
async fn when_a_provider_succeeds_system_stops_trying_candidates() {
    // Given: Three healthy adapters
    let adapters: Vec<_> = (1..=3)
        .map(|priority| Arc::new(ghana_mock(&format!("p{priority}"), priority)))
        .collect();
    let router = router_of(&adapters);

    // When: A message is sent
    let outcome = router.send(options(), "GH", None).await;

    // Then: Exactly one adapter is called
    assert!(outcome.success);
    assert_eq!(outcome.provider_id, "p1");
    let total_calls: usize = adapters.iter().map(|adapter| adapter.calls()).sum();
    assert_eq!(total_calls, 1);
}

#[tokio::test]
async fn when_every_provider_fails_without_code_system_reports_all_failed() {
    // Given: Two adapters that fail without a specific code
    let a = Arc::new(ghana_mock("A", 1).with_default_reply(MockReply::failed(SendStatus::ProviderError)));
    let b = Arc::new(ghana_mock("B", 2).with_default_reply(MockReply::failed(SendStatus::Rejected)));
    let router = router_of(&[Arc::clone(&a), Arc::clone(&b)]);

    // When: A message is routed
    let outcome = router.send(options(), "GH", None).await;

    // Then: The last failure is reported under the multi-provider sentinel
    assert!(!outcome.success);
    assert_eq!(outcome.provider_id, MULTI_PROVIDER_ID);
    assert_eq!(outcome.status, SendStatus::Rejected);
    assert_eq!(outcome.error_code.as_deref(), Some(codes::ALL_FAILED));
    assert_eq!(outcome.attempts, vec!["A", "B"]);
    assert_eq!(a.calls() + b.calls(), 2);
}

#[tokio::test]
async fn when_destination_is_not_covered_system_reports_no_provider_without_calls() {
    // Given: Only a Ghana adapter
    let a = Arc::new(ghana_mock("A", 1));
    let router = router_of(&[Arc::clone(&a)]);

    // When: A message is routed to an uncovered country
    let outcome = router.send(options(), "ZZ", None).await;

    // Then: The router itself reports NO_PROVIDER and nobody was called
    assert!(!outcome.success);
    assert_eq!(outcome.provider_id, ROUTER_PROVIDER_ID);
    assert_eq!(outcome.status, SendStatus::Failed);
    assert_eq!(outcome.error_code.as_deref(), Some(codes::NO_PROVIDER));
    assert!(outcome.attempts.is_empty());
    assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn when_registry_is_empty_system_reports_no_provider() {
    let router = Router::new(Arc::new(ProviderRegistry::new()));

    let outcome = router.send(options(), "GH", None).await;

    assert_eq!(outcome.error_code.as_deref(), Some(codes::NO_PROVIDER));
}

#[tokio::test]
async fn when_provider_exceeds_timeout_system_records_failure_and_moves_on() {
    // Given: A slow adapter with a 50 ms budget and a fast fallback
    let slow = Arc::new(
        MockAdapter::new(capabilities("slow", &["GH"], 1).with_timeout_ms(50))
            .with_delay(Duration::from_millis(500)),
    );
    let fast = Arc::new(ghana_mock("fast", 2));
    let router = router_of(&[Arc::clone(&slow), Arc::clone(&fast)]);

    // When: A message is routed
    let started = Instant::now();
    let outcome = router.send(options(), "GH", None).await;

    // Then: The slow attempt is abandoned and counted as a failure
    assert!(outcome.success);
    assert_eq!(outcome.provider_id, "fast");
    assert!(started.elapsed() < Duration::from_millis(500));
    let slow_stats = slow.stats().snapshot();
    assert_eq!(slow_stats.total_sent, 1);
    assert_eq!(slow_stats.total_failed, 1);
    assert!(slow_stats.avg_latency_ms.is_some_and(|latency| latency >= 50.0));
}

#[tokio::test]
async fn when_only_provider_times_out_system_reports_timeout_code() {
    let slow = Arc::new(
        MockAdapter::new(capabilities("slow", &["GH"], 1).with_timeout_ms(20))
            .with_delay(Duration::from_millis(300)),
    );
    let router = router_of(&[slow]);

    let outcome = router.send(options(), "GH", None).await;

    assert_eq!(outcome.provider_id, MULTI_PROVIDER_ID);
    assert_eq!(outcome.status, SendStatus::ProviderError);
    assert_eq!(outcome.error_code.as_deref(), Some(codes::TIMEOUT));
}

#[tokio::test]
async fn when_send_is_cancelled_system_skips_remaining_candidates() {
    // Given: A cancelled token
    let a = Arc::new(ghana_mock("A", 1));
    let router = router_of(&[Arc::clone(&a)]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    // When: A send is started
    let outcome = router.send_with_cancel(options(), "GH", None, &cancel).await;

    // Then: No attempt is made
    assert_eq!(outcome.provider_id, ROUTER_PROVIDER_ID);
    assert_eq!(outcome.error_code.as_deref(), Some(codes::CANCELLED));
    assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn when_stats_accumulate_counters_never_decrease() {
    let a = Arc::new(
        ghana_mock("A", 1)
            .then(MockReply::failed(SendStatus::Rejected))
            .then(MockReply::submitted("x")),
    );
    let router = router_of(&[Arc::clone(&a)]);
    let mut previous = a.stats().snapshot();

    for _ in 0..4 {
        router.send(options(), "GH", None).await;
        let current = a.stats().snapshot();
        assert_eq!(current.total_sent, previous.total_sent + 1);
        assert!(current.total_delivered >= previous.total_delivered);
        assert!(current.total_failed >= previous.total_failed);
        assert_eq!(current.total_sent, current.total_delivered + current.total_failed);
        assert!(current.last_used.is_some());
        previous = current;
    }

    assert_eq!(previous.total_failed, 1);
    assert_eq!(previous.success_rate, 75.0);
}

// =============================================================================
// Candidate resolution
// =============================================================================

#[test]
fn when_priorities_differ_system_orders_candidates_ascending() {
    // Given: Registered with priorities 3, 1, 2
    let router = router_of(&[
        Arc::new(ghana_mock("three", 3)),
        Arc::new(ghana_mock("one", 1)),
        Arc::new(ghana_mock("two", 2)),
    ]);

    // Then: Candidates come back as 1, 2, 3
    assert_eq!(router.candidates("GH", None), vec!["one", "two", "three"]);
}

#[test]
fn when_wildcard_provider_exists_system_includes_it_for_every_country() {
    let router = router_of(&[
        Arc::new(MockAdapter::new(capabilities("global", &["*"], 50))),
        Arc::new(ghana_mock("local", 1)),
    ]);

    assert_eq!(router.candidates("gh", None), vec!["local", "global"]);
    assert_eq!(router.candidates("KE", None), vec!["global"]);
}

#[test]
fn when_network_is_given_system_keeps_unrestricted_and_matching_providers() {
    let mtn_only = MockAdapter::new(
        capabilities("mtn-only", &["GH"], 1)
            .with_networks(["MTN"])
            .expect("networks"),
    );
    let router = router_of(&[Arc::new(mtn_only), Arc::new(ghana_mock("any", 2))]);

    assert_eq!(router.candidates("GH", Some("mtn")), vec!["mtn-only", "any"]);
    assert_eq!(router.candidates("GH", Some("VODAFONE")), vec!["any"]);
    assert_eq!(router.candidates("GH", None), vec!["mtn-only", "any"]);
}

#[tokio::test]
async fn when_country_code_is_malformed_system_reports_routing_error() {
    let a = Arc::new(ghana_mock("A", 1));
    let router = router_of(&[Arc::clone(&a)]);

    let outcome = router.send(options(), "Ghana", None).await;

    assert_eq!(outcome.error_code.as_deref(), Some(codes::ROUTING_ERROR));
    assert_eq!(a.calls(), 0);
}

#[test]
fn when_provider_name_repeats_registration_fails() {
    let mut registry = ProviderRegistry::new();
    registry
        .register(Arc::new(ghana_mock("dup", 1)))
        .expect("first registration");

    let error = registry
        .register(Arc::new(ghana_mock("dup", 2)))
        .expect_err("duplicate name");

    assert!(matches!(error, RegistryError::DuplicateProvider { ref name } if name == "dup"));
    assert_eq!(registry.len(), 1);
}

// =============================================================================
// Ranking
// =============================================================================

#[tokio::test]
async fn when_ranking_by_reliability_ties_keep_priority_order() {
    // Given: "flaky" fails once, the others have no history
    let flaky = Arc::new(ghana_mock("flaky", 1).then(MockReply::failed(SendStatus::Rejected)));
    let steady = Arc::new(ghana_mock("steady", 2));
    let fresh = Arc::new(ghana_mock("fresh", 3));
    let router = router_of(&[Arc::clone(&flaky), Arc::clone(&steady), Arc::clone(&fresh)]);
    flaky.send(options()).await;
    steady.send(options()).await;

    // When: Ranking by reliability
    let ranked = router.rank("GH", None, SelectionCriterion::Reliability);

    // Then: 100% first, untried (0%) and flaky (0%) keep priority order
    assert_eq!(names(&ranked), vec!["steady", "flaky", "fresh"]);
}

#[tokio::test]
async fn when_ranking_by_speed_untried_providers_rank_last() {
    let measured = Arc::new(ghana_mock("measured", 5));
    let untried = Arc::new(ghana_mock("untried", 1));
    let router = router_of(&[Arc::clone(&untried), Arc::clone(&measured)]);
    measured.send(options()).await;

    let best = router
        .best_provider("GH", None, SelectionCriterion::Speed)
        .expect("a candidate");

    assert_eq!(best.name(), "measured");
}

#[test]
fn when_ranking_by_cost_priority_order_is_kept() {
    let router = Router::with_config(
        registry_of(&[
            Arc::new(ghana_mock("second", 2)),
            Arc::new(ghana_mock("first", 1)),
        ]),
        RouterConfig {
            default_latency_ms: 1_000,
        },
    );

    let ranked = router.rank("GH", None, SelectionCriterion::Cost);

    assert_eq!(names(&ranked), vec!["first", "second"]);
    assert!(router
        .best_provider("ZZ", None, SelectionCriterion::Cost)
        .is_none());
}

// =============================================================================
// Delivery status and health
// =============================================================================

#[tokio::test]
async fn when_provider_is_unspecified_system_probes_until_one_recognizes_id() {
    let a = Arc::new(ghana_mock("A", 1));
    let b = Arc::new(ghana_mock("B", 2).with_delivery_status("abc123", DeliveryState::Delivered));
    let router = router_of(&[a, b]);

    let found = router.check_delivery_status("abc123", None).await;
    let missing = router.check_delivery_status("nope", None).await;
    let unregistered = router.check_delivery_status("abc123", Some("C")).await;

    assert_eq!(found.status, DeliveryState::Delivered);
    assert_eq!(found.provider_id.as_deref(), Some("B"));
    assert_eq!(missing.status, DeliveryState::Unknown);
    assert!(missing.error.is_some());
    assert_eq!(unregistered.status, DeliveryState::Unknown);
}

#[tokio::test]
async fn when_health_is_checked_every_provider_is_reported() {
    let healthy = Arc::new(ghana_mock("healthy", 1));
    let broken = Arc::new(
        ghana_mock("broken", 2)
            .with_balance(Err(ProviderError::Transport(String::from("dns failure")))),
    );
    let registry = registry_of(&[healthy, broken]);

    let report = registry.health_check_all().await;

    assert_eq!(report.len(), 2);
    assert!(report["healthy"].healthy);
    assert!(report["healthy"].balance.is_some());
    assert!(!report["broken"].healthy);
    assert!(report["broken"].error.is_some());
}

// =============================================================================
// Bulk dispatch
// =============================================================================

fn bulk_jobs(count: usize) -> Vec<BulkJob> {
    (0..count)
        .map(|index| {
            BulkJob::new(
                SendOptions::new(format!("+23324400{index:04}"), "promo", "MSGATE")
                    .with_correlation_id(format!("job-{index}")),
                "GH",
            )
        })
        .collect()
}

#[tokio::test]
async fn when_bulk_jobs_are_dispatched_outcomes_keep_input_order() {
    // Given: Every third message fails
    let mut adapter = ghana_mock("A", 1);
    for index in 0..6 {
        adapter = adapter.then(if index % 3 == 0 {
            MockReply::failed(SendStatus::Rejected)
        } else {
            MockReply::submitted(format!("id-{index}"))
        });
    }
    let adapter = Arc::new(adapter);
    let router = Arc::new(router_of(&[Arc::clone(&adapter)]));
    let dispatcher = BulkDispatcher::new(
        router,
        &BulkConfig {
            batch_size: 1,
            batch_delay_ms: 0,
        },
    );

    // When: Six jobs are dispatched one per batch
    let report = dispatcher.dispatch(bulk_jobs(6)).await;

    // Then: Outcomes line up with the submitted jobs
    assert_eq!(report.batches, 6);
    assert_eq!(report.succeeded, 4);
    assert_eq!(report.failed, 2);
    let successes: Vec<bool> = report.outcomes.iter().map(|outcome| outcome.success).collect();
    assert_eq!(successes, vec![false, true, true, false, true, true]);
    let recipients: Vec<String> = adapter
        .received()
        .into_iter()
        .map(|options| options.recipient)
        .collect();
    assert_eq!(recipients[0], "+233244000000");
    assert_eq!(recipients[5], "+233244000005");
}

#[tokio::test]
async fn when_bulk_has_several_batches_system_pauses_between_them() {
    let router = Arc::new(router_of(&[Arc::new(ghana_mock("A", 1))]));
    let dispatcher = BulkDispatcher::new(
        router,
        &BulkConfig {
            batch_size: 2,
            batch_delay_ms: 40,
        },
    );

    let started = Instant::now();
    let report = dispatcher.dispatch(bulk_jobs(5)).await;

    // Three batches, two pauses, none after the last batch
    assert_eq!(report.batches, 3);
    assert!(started.elapsed() >= Duration::from_millis(80));
}

#[tokio::test]
async fn when_bulk_is_cancelled_remaining_jobs_are_reported_cancelled() {
    let adapter = Arc::new(ghana_mock("A", 1));
    let router = Arc::new(router_of(&[Arc::clone(&adapter)]));
    let dispatcher = BulkDispatcher::new(
        router,
        &BulkConfig {
            batch_size: 2,
            batch_delay_ms: 10_000,
        },
    );
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let report = dispatcher.dispatch_with_cancel(bulk_jobs(4), &cancel).await;

    assert_eq!(report.batches, 1);
    assert_eq!(report.succeeded, 2);
    assert_eq!(adapter.calls(), 2);
    for outcome in &report.outcomes[2..] {
        assert_eq!(outcome.error_code.as_deref(), Some(codes::CANCELLED));
    }
}
