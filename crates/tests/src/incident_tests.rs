//! Integration tests for the incident lifecycle and post-mortems.

use chrono::{Duration, Utc};
use vigil_core::incidents::{
    IncidentError, IncidentSeverity, IncidentStatus, IncidentUpdate, NewIncident, PostMortemError,
};

use crate::mock_infrastructure::{
    build_runtime, engine_config, RecordingNotifier, ScriptedCollaborators,
};
use vigil_core::runtime::EngineRuntime;

fn bare_runtime(notifier: std::sync::Arc<RecordingNotifier>) -> EngineRuntime {
    build_runtime(
        engine_config(vec![], vec![], vec![]),
        notifier,
        ScriptedCollaborators::new(&[]),
    )
}

fn incident(severity: IncidentSeverity) -> NewIncident {
    NewIncident {
        title: "checkout failing".into(),
        description: "payment provider timeouts".into(),
        severity,
        affected_services: vec!["checkout".into()],
        ..Default::default()
    }
}

#[tokio::test]
async fn test_resolution_time_measured_from_detection() {
    let runtime = bare_runtime(RecordingNotifier::new());
    let manager = runtime.incident_manager();

    let created = manager.create_incident(incident(IncidentSeverity::Medium), "ops").await;
    manager.backdate(&created.id, Utc::now() - Duration::minutes(47));

    let resolved = manager.resolve_incident(&created.id, "ops", "provider failover").await.unwrap();

    assert_eq!(resolved.status, IncidentStatus::Resolved);
    assert_eq!(resolved.metrics.resolution_time_minutes, Some(47));
    assert!(resolved.resolved_at.is_some());
    // Medium severity, under an hour: no automatic post-mortem.
    assert!(resolved.post_mortem_id.is_none());

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_post_mortem_auto_generated_once_for_high_severity() {
    let notifier = RecordingNotifier::new();
    let runtime = bare_runtime(notifier.clone());
    let manager = runtime.incident_manager();

    let created = manager.create_incident(incident(IncidentSeverity::High), "ops").await;
    let resolved = manager.resolve_incident(&created.id, "ops", "rolled back deploy").await.unwrap();

    let pm_id = resolved.post_mortem_id.expect("high severity requires a post-mortem");
    let report = manager.get_post_mortem(&pm_id).unwrap();
    assert_eq!(report.incident_id, resolved.id);
    assert!(!report.action_items.is_empty());

    // Generation is one-shot.
    assert!(matches!(
        manager.generate_post_mortem(&resolved.id),
        Err(IncidentError::PostMortem(PostMortemError::AlreadyGenerated(_)))
    ));

    assert_eq!(notifier.count_of("incident_created"), 1);
    assert_eq!(notifier.count_of("incident_resolved"), 1);

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_post_mortem_required_after_long_resolution() {
    let runtime = bare_runtime(RecordingNotifier::new());
    let manager = runtime.incident_manager();

    let created = manager.create_incident(incident(IncidentSeverity::Low), "ops").await;
    manager.backdate(&created.id, Utc::now() - Duration::minutes(95));

    let resolved = manager.resolve_incident(&created.id, "ops", "cache flush").await.unwrap();
    assert!(resolved.post_mortem_id.is_some());

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_post_mortem_refused_while_open() {
    let runtime = bare_runtime(RecordingNotifier::new());
    let manager = runtime.incident_manager();

    let created = manager.create_incident(incident(IncidentSeverity::Low), "ops").await;
    assert!(matches!(
        manager.generate_post_mortem(&created.id),
        Err(IncidentError::PostMortem(PostMortemError::NotResolved(_)))
    ));

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_status_moves_forward_only() {
    let runtime = bare_runtime(RecordingNotifier::new());
    let manager = runtime.incident_manager();

    let created = manager.create_incident(incident(IncidentSeverity::Medium), "ops").await;

    let updated = manager
        .update_incident(
            &created.id,
            IncidentUpdate { status: Some(IncidentStatus::Monitoring), ..Default::default() },
            "alice",
        )
        .await
        .unwrap();
    assert_eq!(updated.status, IncidentStatus::Monitoring);
    assert!(updated.metrics.response_time_minutes.is_some());

    // A backward transition is ignored; the rest of the update applies.
    let updated = manager
        .update_incident(
            &created.id,
            IncidentUpdate {
                status: Some(IncidentStatus::Investigating),
                commander: Some("alice".into()),
                ..Default::default()
            },
            "alice",
        )
        .await
        .unwrap();
    assert_eq!(updated.status, IncidentStatus::Monitoring);
    assert_eq!(updated.commander.as_deref(), Some("alice"));

    // Resolution must go through resolve_incident.
    assert!(matches!(
        manager
            .update_incident(
                &created.id,
                IncidentUpdate { status: Some(IncidentStatus::Resolved), ..Default::default() },
                "alice",
            )
            .await,
        Err(IncidentError::InvalidTransition { .. })
    ));

    // A resolved incident is immutable.
    manager.resolve_incident(&created.id, "ops", "done").await.unwrap();
    assert!(matches!(
        manager
            .update_incident(&created.id, IncidentUpdate::default(), "alice")
            .await,
        Err(IncidentError::AlreadyResolved(_))
    ));
    assert!(matches!(
        manager.resolve_incident(&created.id, "ops", "again").await,
        Err(IncidentError::AlreadyResolved(_))
    ));

    runtime.shutdown().await;
}
