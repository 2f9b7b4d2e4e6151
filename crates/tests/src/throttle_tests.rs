//! Integration tests for the throttle gate and per-channel rate limits.
//!
//! The throttle decision is made inside the alert store; these tests verify
//! the end-to-end contract through the full runtime: repeated rule firings
//! within a window admit at most the configured number of alerts, suppressed
//! firings produce no notifications, and a rate-limited channel never
//! affects delivery to its siblings.

use std::collections::HashMap;

use vigil_core::alerts::{AlertSeverity, SignalOutcome};

use crate::mock_infrastructure::{
    build_runtime, engine_config, error_rate_rule, RecordingNotifier, ScriptedCollaborators,
};

#[tokio::test]
async fn test_window_admits_at_most_max_alerts() {
    let notifier = RecordingNotifier::new();
    let runtime = build_runtime(
        engine_config(vec![error_rate_rule(AlertSeverity::Error, 2)], vec![], vec![]),
        notifier.clone(),
        ScriptedCollaborators::new(&[]),
    );

    let mut outcomes = Vec::new();
    for _ in 0..5 {
        outcomes.extend(
            runtime
                .record_metric("error_rate", 10.0, "percent", vec![], HashMap::new())
                .await,
        );
    }

    // 5 firings, 2 admitted; firings 3-5 return the second alert unchanged.
    assert_eq!(outcomes.len(), 5);
    let created: Vec<_> = outcomes.iter().filter(|o| o.is_created()).collect();
    assert_eq!(created.len(), 2);
    let second_id = &created[1].alert().id;
    for outcome in &outcomes[2..] {
        match outcome {
            SignalOutcome::Suppressed(prior) => assert_eq!(&prior.id, second_id),
            SignalOutcome::Created(alert) => panic!("admitted past quota: {}", alert.id),
        }
    }

    assert_eq!(runtime.components().alert_store().count_for_rule("high-error-rate"), 2);
    assert_eq!(notifier.count_of("alert_created"), 2);

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_suppression_is_per_rule() {
    let mut cpu_rule = error_rate_rule(AlertSeverity::Warning, 1);
    cpu_rule.id = "high-cpu".into();
    cpu_rule.name = "High CPU".into();
    cpu_rule.conditions[0].metric = "cpu_usage".into();

    let notifier = RecordingNotifier::new();
    let runtime = build_runtime(
        engine_config(
            vec![error_rate_rule(AlertSeverity::Error, 1), cpu_rule],
            vec![],
            vec![],
        ),
        notifier.clone(),
        ScriptedCollaborators::new(&[]),
    );

    // Exhaust the error-rate rule's window.
    for _ in 0..3 {
        runtime.record_metric("error_rate", 10.0, "percent", vec![], HashMap::new()).await;
    }

    // The CPU rule has its own window and still fires.
    let created = runtime
        .record_metric("cpu_usage", 95.0, "percent", vec![], HashMap::new())
        .await;
    assert_eq!(created.len(), 1);
    assert!(created[0].is_created());
    assert_eq!(created[0].alert().rule_id, "high-cpu");

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_rate_limited_channel_does_not_block_siblings() {
    let mut config = engine_config(vec![error_rate_rule(AlertSeverity::Error, 10)], vec![], vec![]);
    // Alert lifecycle notifications fan out to both channels; sms allows
    // only one send per hour.
    config.channels[1].id = "sms-oncall".into();
    config.channels[1].max_per_hour = 1;
    config.engine.notify_channels = vec!["slack-alerts".into(), "sms-oncall".into()];

    let notifier = RecordingNotifier::new();
    let runtime = build_runtime(config, notifier.clone(), ScriptedCollaborators::new(&[]));

    for _ in 0..3 {
        runtime.record_metric("error_rate", 10.0, "percent", vec![], HashMap::new()).await;
    }

    assert_eq!(notifier.sent_to("slack-alerts").len(), 3);
    assert_eq!(notifier.sent_to("sms-oncall").len(), 1);

    runtime.shutdown().await;
}
