//! Integration tests for runbook automation against incidents.
//!
//! Covers the automated response on incident creation, the rollback
//! contract (aborting failure runs every rollback step in order), and the
//! timeline/automation records the manager keeps for each run.

use vigil_core::incidents::{IncidentError, IncidentEventKind, IncidentSeverity, NewIncident};
use vigil_core::runbooks::RunbookError;

use crate::mock_infrastructure::{
    backend_runbook, build_runtime, engine_config, script_step, RecordingNotifier,
    ScriptedCollaborators,
};

fn backend_incident() -> NewIncident {
    NewIncident {
        title: "API errors spiking".into(),
        description: "5xx rate above threshold".into(),
        severity: IncidentSeverity::Medium,
        tags: vec!["backend".into()],
        ..Default::default()
    }
}

#[tokio::test]
async fn test_auto_response_runs_matching_runbook() {
    let collaborators = ScriptedCollaborators::new(&[]);
    let runtime = build_runtime(
        engine_config(
            vec![],
            vec![],
            vec![backend_runbook(
                "restart-api",
                vec![script_step("restart", "systemctl-restart")],
                vec![],
            )],
        ),
        RecordingNotifier::new(),
        collaborators.clone(),
    );

    let incident = runtime
        .incident_manager()
        .create_incident(backend_incident(), "ops")
        .await;

    assert_eq!(collaborators.calls(), vec!["systemctl-restart"]);
    assert_eq!(incident.automation.len(), 1);
    assert_eq!(incident.automation[0].executed_by, "auto-response");
    assert!(incident.automation[0].success);
    assert!(incident.timeline.iter().any(|e| e.kind == IncidentEventKind::ActionTaken));

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_aborting_failure_rolls_back_in_order() {
    let collaborators = ScriptedCollaborators::new(&["migrate-db"]);
    let mut failing = script_step("migrate", "migrate-db");
    failing.rollback_on_failure = true;

    let runtime = build_runtime(
        engine_config(
            vec![],
            vec![],
            vec![backend_runbook(
                "deploy-fix",
                vec![script_step("drain", "drain-traffic"), failing, script_step("undrain", "undrain-traffic")],
                vec![script_step("r1", "restore-backup"), script_step("r2", "restore-traffic")],
            )],
        ),
        RecordingNotifier::new(),
        collaborators.clone(),
    );

    let incident = runtime
        .incident_manager()
        .create_incident(backend_incident(), "ops")
        .await;

    // The step after the failure never runs; rollback preserves definition
    // order.
    assert_eq!(
        collaborators.calls(),
        vec!["drain-traffic", "migrate-db", "restore-backup", "restore-traffic"]
    );

    let record = &incident.automation[0];
    assert!(!record.success);
    assert!(record.rolled_back);
    assert_eq!(record.errors.len(), 1);

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_operator_run_and_direct_rollback() {
    let collaborators = ScriptedCollaborators::new(&[]);
    let runtime = build_runtime(
        engine_config(
            vec![],
            vec![],
            vec![backend_runbook(
                "scale-up",
                vec![script_step("scale", "scale-out")],
                vec![script_step("undo", "scale-in")],
            )],
        ),
        RecordingNotifier::new(),
        collaborators.clone(),
    );

    // Untagged incident: no automated response.
    let incident = runtime
        .incident_manager()
        .create_incident(
            NewIncident { title: "latency".into(), severity: IncidentSeverity::Low, ..Default::default() },
            "ops",
        )
        .await;
    assert!(incident.automation.is_empty());

    let run = runtime
        .incident_manager()
        .run_runbook(&incident.id, "scale-up", "alice")
        .await
        .unwrap();
    assert!(run.success);

    let rollback = runtime
        .incident_manager()
        .trigger_rollback(&incident.id, "scale-up", "alice")
        .await
        .unwrap();
    assert!(rollback.rolled_back);
    assert!(rollback.step_results.is_empty());

    assert_eq!(collaborators.calls(), vec!["scale-out", "scale-in"]);
    let incident = runtime.incident_manager().get(&incident.id).unwrap();
    assert_eq!(incident.automation.len(), 2);

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_automation_requires_open_incident_and_known_runbook() {
    let runtime = build_runtime(
        engine_config(
            vec![],
            vec![],
            vec![backend_runbook("noop", vec![script_step("s", "true")], vec![])],
        ),
        RecordingNotifier::new(),
        ScriptedCollaborators::new(&[]),
    );
    let manager = runtime.incident_manager();

    let incident = runtime
        .incident_manager()
        .create_incident(
            NewIncident { title: "t".into(), ..Default::default() },
            "ops",
        )
        .await;

    assert!(matches!(
        manager.run_runbook(&incident.id, "ghost", "ops").await,
        Err(IncidentError::Runbook(RunbookError::NotFound(_)))
    ));

    manager.resolve_incident(&incident.id, "ops", "fixed").await.unwrap();
    assert!(matches!(
        manager.run_runbook(&incident.id, "noop", "ops").await,
        Err(IncidentError::AlreadyResolved(_))
    ));

    runtime.shutdown().await;
}
