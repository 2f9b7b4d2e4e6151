//! End-to-end scenario: a sustained error-rate breach walks the full
//! pipeline from metric intake through escalation to an incident and its
//! resolution.

use std::collections::HashMap;
use std::time::Duration;

use vigil_core::{
    alerts::AlertSeverity,
    escalation::EscalationAction,
    incidents::IncidentSeverity,
};

use crate::mock_infrastructure::{
    build_runtime, engine_config, error_rate_rule, level, policy, RecordingNotifier,
    ScriptedCollaborators,
};

#[tokio::test(start_paused = true)]
async fn test_error_rate_breach_escalates_into_an_incident() {
    // Standard paging ladder: slack immediately, page after 5 minutes,
    // page again and open an incident after a further 15.
    let mut ladder = policy(
        "standard",
        vec![
            level(0, "slack-alerts"),
            level(5, "pagerduty-oncall"),
            level(15, "pagerduty-oncall"),
        ],
    );
    ladder.levels[2].actions.push(EscalationAction::CreateIncident);

    let notifier = RecordingNotifier::new();
    let runtime = build_runtime(
        engine_config(vec![error_rate_rule(AlertSeverity::Error, 1)], vec![ladder], vec![]),
        notifier.clone(),
        ScriptedCollaborators::new(&[]),
    );

    // Sustained breach; the throttle admits a single alert and the later
    // firings come back pointing at it.
    let mut outcomes = Vec::new();
    for _ in 0..3 {
        outcomes.extend(
            runtime
                .record_metric("error_rate", 12.0, "percent", vec![], HashMap::new())
                .await,
        );
    }
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes.iter().filter(|o| o.is_created()).count(), 1);
    let alert_id = outcomes[0].alert().id.clone();
    assert!(outcomes[1..].iter().all(|o| !o.is_created() && o.alert().id == alert_id));

    // t=0: alert notification plus level 0 on slack. No incident yet.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(notifier.sent_to("slack-alerts"), ["alert_created", "alert_escalated"]);
    assert_eq!(runtime.incident_manager().open_count(), 0);

    // t=5m: level 1 pages.
    tokio::time::sleep(Duration::from_secs(5 * 60)).await;
    assert_eq!(notifier.sent_to("pagerduty-oncall"), ["alert_escalated"]);
    assert_eq!(runtime.incident_manager().open_count(), 0);

    // t=20m: level 2 pages again and opens an incident. The error-severity
    // alert maps to a high-severity incident and the two are linked.
    tokio::time::sleep(Duration::from_secs(15 * 60)).await;
    assert_eq!(notifier.sent_to("pagerduty-oncall").len(), 2);
    assert_eq!(notifier.count_of("incident_created"), 1);

    let incidents = runtime.incident_manager().open_incidents();
    assert_eq!(incidents.len(), 1);
    let incident = &incidents[0];
    assert_eq!(incident.severity, IncidentSeverity::High);
    assert_eq!(incident.alert_ids, vec![alert_id.clone()]);

    let alert = runtime.components().alert_store().get(&alert_id).unwrap();
    assert_eq!(alert.incident_id.as_deref(), Some(incident.id.as_str()));

    // Resolving the incident notifies and closes it out.
    runtime
        .incident_manager()
        .resolve_incident(&incident.id, "ops", "rolled back deploy")
        .await
        .unwrap();
    assert_eq!(notifier.count_of("incident_resolved"), 1);
    assert_eq!(runtime.incident_manager().open_count(), 0);

    // No further incident escalation fires after resolution.
    tokio::time::sleep(Duration::from_secs(60 * 60)).await;
    let paged_for_incident = notifier
        .sent_to("pagerduty-oncall")
        .iter()
        .filter(|e| e.as_str() == "incident_escalated")
        .count();
    assert_eq!(paged_for_incident, 0);

    runtime.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_critical_signal_opens_incident_immediately() {
    let notifier = RecordingNotifier::new();
    let runtime = build_runtime(
        engine_config(vec![error_rate_rule(AlertSeverity::Critical, 1)], vec![], vec![]),
        notifier.clone(),
        ScriptedCollaborators::new(&[]),
    );

    let created = runtime
        .record_metric(
            "error_rate",
            50.0,
            "percent",
            vec![],
            HashMap::from([("service".to_string(), "api-gateway".to_string())]),
        )
        .await;
    assert_eq!(created.len(), 1);
    assert!(created[0].is_created());

    // Critical alerts skip the escalation ladder's incident action and
    // open one on admission; the service dimension seeds the impact list.
    let incidents = runtime.incident_manager().open_incidents();
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].severity, IncidentSeverity::Critical);
    assert_eq!(incidents[0].affected_services, vec!["api-gateway".to_string()]);
    assert_eq!(notifier.count_of("incident_created"), 1);

    runtime.shutdown().await;
}
