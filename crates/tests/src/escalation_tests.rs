//! Integration tests for escalation timing through the full runtime.
//!
//! All tests run under a paused tokio clock: levels fire exactly when their
//! cumulative delays elapse, and an acknowledge or resolve between levels
//! stops the chain.

use std::collections::HashMap;
use std::time::Duration;

use vigil_core::alerts::AlertSeverity;
use vigil_core::runtime::EngineRuntime;

use crate::mock_infrastructure::{
    build_runtime, engine_config, error_rate_rule, level, policy, RecordingNotifier,
    ScriptedCollaborators,
};

fn three_level_runtime(notifier: std::sync::Arc<RecordingNotifier>) -> EngineRuntime {
    let escalation = policy(
        "standard",
        vec![
            level(0, "slack-alerts"),
            level(5, "pagerduty-oncall"),
            level(15, "pagerduty-oncall"),
        ],
    );
    build_runtime(
        engine_config(vec![error_rate_rule(AlertSeverity::Error, 5)], vec![escalation], vec![]),
        notifier,
        ScriptedCollaborators::new(&[]),
    )
}

#[tokio::test(start_paused = true)]
async fn test_levels_fire_at_cumulative_delays() {
    let notifier = RecordingNotifier::new();
    let runtime = three_level_runtime(notifier.clone());

    let created = runtime
        .record_metric("error_rate", 10.0, "percent", vec![], HashMap::new())
        .await;
    assert_eq!(created.len(), 1);

    // Level 0 is immediate.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(notifier.sent_to("slack-alerts"), ["alert_created", "alert_escalated"]);
    assert!(notifier.sent_to("pagerduty-oncall").is_empty());

    // Level 1 after 5 minutes.
    tokio::time::sleep(Duration::from_secs(5 * 60)).await;
    assert_eq!(notifier.sent_to("pagerduty-oncall").len(), 1);

    // Level 2 after a further 15 minutes; nothing fires early.
    tokio::time::sleep(Duration::from_secs(14 * 60)).await;
    assert_eq!(notifier.sent_to("pagerduty-oncall").len(), 1);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(notifier.sent_to("pagerduty-oncall").len(), 2);

    // Exhausted: the cursor sits past the last level and no timer remains.
    let alert = runtime.components().alert_store().get(&created[0].alert().id).unwrap();
    assert_eq!(alert.escalation.unwrap().level, 3);
    assert_eq!(runtime.components().scheduler().active_timers(), 0);

    runtime.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_acknowledge_between_levels_stops_the_chain() {
    let notifier = RecordingNotifier::new();
    let runtime = three_level_runtime(notifier.clone());

    let created = runtime
        .record_metric("error_rate", 10.0, "percent", vec![], HashMap::new())
        .await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    runtime.intake().acknowledge_alert(&created[0].alert().id, "ops").unwrap();

    tokio::time::sleep(Duration::from_secs(60 * 60)).await;
    assert!(notifier.sent_to("pagerduty-oncall").is_empty());
    assert_eq!(runtime.components().scheduler().active_timers(), 0);

    runtime.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_resolve_at_fire_time_is_safe() {
    let notifier = RecordingNotifier::new();
    let runtime = three_level_runtime(notifier.clone());

    let created = runtime
        .record_metric("error_rate", 10.0, "percent", vec![], HashMap::new())
        .await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    // Resolve through the store directly, without cancelling the timer.
    // The pending level still wakes, observes the terminal status, and
    // declines to fire.
    runtime.components().alert_store().resolve(&created[0].alert().id, "ops");

    tokio::time::sleep(Duration::from_secs(60 * 60)).await;
    assert!(notifier.sent_to("pagerduty-oncall").is_empty());

    runtime.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_response_window_advances_next_level() {
    let mut escalation = policy(
        "windowed",
        vec![level(0, "slack-alerts"), level(30, "pagerduty-oncall")],
    );
    // Level 0 responders get 3 minutes before level 1 takes over, despite
    // level 1's own 30 minute delay.
    escalation.levels[0].timeout_minutes = Some(3);

    let notifier = RecordingNotifier::new();
    let runtime = build_runtime(
        engine_config(vec![error_rate_rule(AlertSeverity::Error, 5)], vec![escalation], vec![]),
        notifier.clone(),
        ScriptedCollaborators::new(&[]),
    );

    runtime.record_metric("error_rate", 10.0, "percent", vec![], HashMap::new()).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    tokio::time::sleep(Duration::from_secs(3 * 60)).await;

    assert_eq!(notifier.sent_to("pagerduty-oncall").len(), 1);

    runtime.shutdown().await;
}
