//! Incident lifecycle management.
//!
//! The manager owns the incident map and its append-only timelines, fans
//! out lifecycle notifications, binds incidents to escalation, and fronts
//! runbook automation so every run lands on the incident record. Entity
//! locks are never held across notification dispatch; events carry cloned
//! snapshots.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    alerts::{Alert, AlertStore},
    escalation::{EscalationScheduler, EscalationTarget},
    notify::{NotificationDispatcher, NotificationEvent},
    runbooks::{ExecutionResult, RunbookError, RunbookExecutor},
};

use super::{
    postmortem::{build_post_mortem, post_mortem_required, PostMortem, PostMortemError},
    statuspage::StatusPage,
    types::{
        minutes_between, Incident, IncidentEvent, IncidentEventKind, IncidentSeverity,
        IncidentStatus,
    },
};

/// Errors from incident operations.
#[derive(Debug, Error)]
pub enum IncidentError {
    /// No incident with the given id exists.
    #[error("incident not found: {0}")]
    NotFound(String),

    /// The incident is already resolved and immutable.
    #[error("incident {0} is already resolved")]
    AlreadyResolved(String),

    /// The requested status transition is not allowed.
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    /// A runbook operation failed before execution started.
    #[error(transparent)]
    Runbook(#[from] RunbookError),

    /// Post-mortem generation failed.
    #[error(transparent)]
    PostMortem(#[from] PostMortemError),
}

/// Input for opening an incident.
#[derive(Debug, Clone, Default)]
pub struct NewIncident {
    pub title: String,
    pub description: String,
    pub severity: IncidentSeverity,
    pub affected_services: Vec<String>,
    pub tags: Vec<String>,
    pub estimated_affected_users: Option<u64>,
    pub commander: Option<String>,
}

/// Partial update applied to an open incident. Unset fields are left
/// unchanged.
#[derive(Debug, Clone, Default)]
pub struct IncidentUpdate {
    /// New lifecycle status. Must move forward; `resolved` must go through
    /// [`IncidentManager::resolve_incident`].
    pub status: Option<IncidentStatus>,
    /// Revised severity.
    pub severity: Option<IncidentSeverity>,
    /// Incident commander assignment.
    pub commander: Option<String>,
    /// Responders to add (deduplicated).
    pub responders: Vec<String>,
    /// Root cause, once identified.
    pub root_cause: Option<String>,
    /// Revised affected-user estimate.
    pub estimated_affected_users: Option<u64>,
    /// Free-form note appended to the timeline entry.
    pub note: Option<String>,
}

/// Manages incident state, automation, and lifecycle notifications.
pub struct IncidentManager {
    incidents: DashMap<String, Incident>,
    post_mortems: DashMap<String, PostMortem>,
    store: Arc<AlertStore>,
    dispatcher: Arc<NotificationDispatcher>,
    scheduler: Arc<EscalationScheduler>,
    executor: Arc<RunbookExecutor>,
    status_page: Option<Arc<dyn StatusPage>>,
    /// Channels receiving incident lifecycle notifications.
    notify_channels: Vec<String>,
}

impl IncidentManager {
    /// Creates a manager wired to its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<AlertStore>,
        dispatcher: Arc<NotificationDispatcher>,
        scheduler: Arc<EscalationScheduler>,
        executor: Arc<RunbookExecutor>,
        notify_channels: Vec<String>,
    ) -> Self {
        Self {
            incidents: DashMap::new(),
            post_mortems: DashMap::new(),
            store,
            dispatcher,
            scheduler,
            executor,
            status_page: None,
            notify_channels,
        }
    }

    /// Enables status-page integration.
    #[must_use]
    pub fn with_status_page(mut self, status_page: Arc<dyn StatusPage>) -> Self {
        self.status_page = Some(status_page);
        self
    }

    // ========== Creation ==========

    /// Opens a new incident, notifies, and binds escalation.
    pub async fn create_incident(&self, input: NewIncident, detected_by: &str) -> Incident {
        let id = format!("inc-{}", Uuid::new_v4());
        let mut incident = Incident::new(
            id.clone(),
            input.title,
            input.description,
            input.severity,
            input.affected_services,
            detected_by.to_string(),
        );
        incident.tags = input.tags;
        incident.estimated_affected_users = input.estimated_affected_users;
        incident.commander = input.commander;

        self.incidents.insert(id, incident.clone());

        info!(
            incident_id = %incident.id,
            severity = incident.severity.as_str(),
            title = %incident.title,
            "Incident created"
        );

        let _ = self
            .dispatcher
            .dispatch(&NotificationEvent::IncidentCreated(incident.clone()), &self.notify_channels)
            .await;
        self.scheduler.start_for_incident(&incident);
        self.publish_status(&incident);
        self.auto_respond(&incident).await;

        self.get(&incident.id).unwrap_or(incident)
    }

    /// Opens an incident for an alert and links the two.
    ///
    /// Severity maps from the alert scale; the alert's `service` dimension,
    /// when present, seeds the affected services.
    pub async fn create_incident_for_alert(
        &self,
        alert: &Alert,
        detected_by: &str,
    ) -> Result<Incident, IncidentError> {
        let id = format!("inc-{}", Uuid::new_v4());
        let mut incident = Incident::new(
            id.clone(),
            alert.message.clone(),
            format!("Opened from alert {} (rule {})", alert.id, alert.rule_id),
            IncidentSeverity::from_alert(alert.severity),
            alert.dimensions.get("service").cloned().into_iter().collect(),
            detected_by.to_string(),
        );
        incident.tags = alert.tags.clone();
        incident.alert_ids.push(alert.id.clone());

        self.incidents.insert(id.clone(), incident.clone());
        self.store.link_incident(&alert.id, &id);

        info!(
            incident_id = %incident.id,
            alert_id = %alert.id,
            severity = incident.severity.as_str(),
            "Incident opened for alert"
        );

        let _ = self
            .dispatcher
            .dispatch(&NotificationEvent::IncidentCreated(incident.clone()), &self.notify_channels)
            .await;
        self.scheduler.start_for_incident(&incident);
        self.publish_status(&incident);
        self.auto_respond(&incident).await;

        Ok(self.get(&incident.id).unwrap_or(incident))
    }

    // ========== Lifecycle ==========

    /// Applies a partial update to an open incident.
    ///
    /// Status only moves forward; a backward transition is ignored with a
    /// warning while the rest of the update still applies. The first update
    /// stamps the incident's response time. A severity raise re-binds
    /// escalation against the new severity.
    ///
    /// # Errors
    ///
    /// Returns [`IncidentError::NotFound`], [`IncidentError::AlreadyResolved`],
    /// or [`IncidentError::InvalidTransition`] when the update asks for
    /// `resolved` directly.
    pub async fn update_incident(
        &self,
        incident_id: &str,
        update: IncidentUpdate,
        updated_by: &str,
    ) -> Result<Incident, IncidentError> {
        let (incident, severity_raised) = {
            let mut entry = self
                .incidents
                .get_mut(incident_id)
                .ok_or_else(|| IncidentError::NotFound(incident_id.to_string()))?;
            let incident = entry.value_mut();

            if !incident.is_open() {
                return Err(IncidentError::AlreadyResolved(incident_id.to_string()));
            }

            let mut changes = Vec::new();
            let mut severity_raised = false;

            if let Some(status) = update.status {
                if status == IncidentStatus::Resolved {
                    return Err(IncidentError::InvalidTransition {
                        from: incident.status.as_str(),
                        to: "resolved",
                    });
                }
                if status.rank() < incident.status.rank() {
                    warn!(
                        incident_id = %incident_id,
                        from = incident.status.as_str(),
                        to = status.as_str(),
                        "Ignoring backward status transition"
                    );
                } else if status != incident.status {
                    changes.push(format!(
                        "status {} -> {}",
                        incident.status.as_str(),
                        status.as_str()
                    ));
                    incident.status = status;
                }
            }

            if let Some(severity) = update.severity {
                if severity != incident.severity {
                    severity_raised = severity > incident.severity;
                    changes.push(format!(
                        "severity {} -> {}",
                        incident.severity.as_str(),
                        severity.as_str()
                    ));
                    incident.severity = severity;
                }
            }

            if let Some(commander) = update.commander {
                changes.push(format!("commander {commander}"));
                incident.commander = Some(commander);
            }

            for responder in update.responders {
                if !incident.responders.contains(&responder) {
                    incident.responders.push(responder);
                }
            }

            if let Some(root_cause) = update.root_cause {
                changes.push("root cause identified".to_string());
                incident.root_cause = Some(root_cause);
            }

            if let Some(users) = update.estimated_affected_users {
                incident.estimated_affected_users = Some(users);
            }

            if let Some(note) = &update.note {
                changes.push(format!("note: {note}"));
            }

            if incident.metrics.response_time_minutes.is_none() {
                incident.metrics.response_time_minutes =
                    Some(minutes_between(incident.detected_at, Utc::now()));
            }

            let description = if changes.is_empty() {
                "Incident updated".to_string()
            } else {
                format!("Incident updated: {}", changes.join(", "))
            };
            incident.record(IncidentEvent::now(
                IncidentEventKind::Updated,
                description,
                Some(updated_by),
            ));

            (incident.clone(), severity_raised)
        };

        let _ = self
            .dispatcher
            .dispatch(&NotificationEvent::IncidentUpdated(incident.clone()), &self.notify_channels)
            .await;

        if severity_raised {
            info!(
                incident_id = %incident_id,
                severity = incident.severity.as_str(),
                "Severity raised, re-binding escalation"
            );
            self.scheduler.start_for_incident(&incident);
        }

        Ok(incident)
    }

    /// Resolves an incident: stamps resolution time, cancels escalation,
    /// notifies, updates the status page, and auto-generates a post-mortem
    /// when one is required (critical/high severity or resolution over an
    /// hour). The record is immutable afterwards except for post-mortem
    /// attachment.
    ///
    /// # Errors
    ///
    /// Returns [`IncidentError::NotFound`] or
    /// [`IncidentError::AlreadyResolved`].
    pub async fn resolve_incident(
        &self,
        incident_id: &str,
        resolved_by: &str,
        resolution: &str,
    ) -> Result<Incident, IncidentError> {
        let incident = {
            let mut entry = self
                .incidents
                .get_mut(incident_id)
                .ok_or_else(|| IncidentError::NotFound(incident_id.to_string()))?;
            let incident = entry.value_mut();

            if !incident.is_open() {
                return Err(IncidentError::AlreadyResolved(incident_id.to_string()));
            }

            let now = Utc::now();
            incident.status = IncidentStatus::Resolved;
            incident.resolved_at = Some(now);
            incident.resolution = Some(resolution.to_string());
            incident.metrics.resolution_time_minutes =
                Some(minutes_between(incident.detected_at, now));
            if incident.metrics.response_time_minutes.is_none() {
                incident.metrics.response_time_minutes = incident.metrics.resolution_time_minutes;
            }
            incident.record(IncidentEvent::now(
                IncidentEventKind::Resolved,
                format!("Incident resolved: {resolution}"),
                Some(resolved_by),
            ));

            incident.clone()
        };

        self.scheduler.cancel(&EscalationTarget::Incident(incident_id.to_string()));

        info!(
            incident_id = %incident_id,
            resolution_time_minutes = incident.metrics.resolution_time_minutes,
            "Incident resolved"
        );

        let _ = self
            .dispatcher
            .dispatch(&NotificationEvent::IncidentResolved(incident.clone()), &self.notify_channels)
            .await;
        self.publish_resolution(&incident);

        if post_mortem_required(incident.severity, incident.metrics.resolution_time_minutes) {
            match self.generate_post_mortem(incident_id) {
                Ok(report) => {
                    info!(incident_id = %incident_id, post_mortem_id = %report.id, "Post-mortem auto-generated");
                }
                Err(e) => {
                    warn!(incident_id = %incident_id, error = %e, "Post-mortem generation failed");
                }
            }
        }

        Ok(self.get(incident_id).unwrap_or(incident))
    }

    fn publish_status(&self, incident: &Incident) {
        if let Some(page) = &self.status_page {
            let page = Arc::clone(page);
            let snapshot = incident.clone();
            tokio::spawn(async move { page.update_component_status(&snapshot).await });
        }
    }

    fn publish_resolution(&self, incident: &Incident) {
        if let Some(page) = &self.status_page {
            let page = Arc::clone(page);
            let snapshot = incident.clone();
            tokio::spawn(async move { page.resolve_component_status(&snapshot).await });
        }
    }

    /// Automated response: runs every enabled runbook whose trigger matches
    /// the incident's tags or services.
    async fn auto_respond(&self, incident: &Incident) {
        let runbook_ids: Vec<String> = self
            .executor
            .matching(&incident.tags, &incident.affected_services)
            .iter()
            .map(|r| r.id.clone())
            .collect();

        for runbook_id in runbook_ids {
            info!(
                incident_id = %incident.id,
                runbook_id = %runbook_id,
                "Automated response runbook triggered"
            );
            match self
                .executor
                .execute(&runbook_id, &incident.id, "auto-response", &serde_json::json!({}))
                .await
            {
                Ok(result) => self.record_automation(&incident.id, &result, "Runbook"),
                Err(e) => warn!(
                    incident_id = %incident.id,
                    runbook_id = %runbook_id,
                    error = %e,
                    "Automated response failed to start"
                ),
            }
        }
    }

    // ========== Automation ==========

    /// Runs a runbook against an open incident and records the outcome on
    /// its timeline.
    ///
    /// # Errors
    ///
    /// Returns [`IncidentError::NotFound`], [`IncidentError::AlreadyResolved`],
    /// or a [`RunbookError`] when the runbook is unknown or disabled. Step
    /// failures are reported inside the [`ExecutionResult`].
    pub async fn run_runbook(
        &self,
        incident_id: &str,
        runbook_id: &str,
        executed_by: &str,
    ) -> Result<ExecutionResult, IncidentError> {
        self.require_open(incident_id)?;

        let result = self
            .executor
            .execute(runbook_id, incident_id, executed_by, &serde_json::json!({}))
            .await?;
        self.record_automation(incident_id, &result, "Runbook");
        Ok(result)
    }

    /// Runs only a runbook's rollback sequence against an open incident.
    ///
    /// # Errors
    ///
    /// Same as [`IncidentManager::run_runbook`].
    pub async fn trigger_rollback(
        &self,
        incident_id: &str,
        runbook_id: &str,
        executed_by: &str,
    ) -> Result<ExecutionResult, IncidentError> {
        self.require_open(incident_id)?;

        let result = self
            .executor
            .execute_rollback(runbook_id, incident_id, executed_by, &serde_json::json!({}))
            .await?;
        self.record_automation(incident_id, &result, "Rollback for runbook");
        Ok(result)
    }

    fn require_open(&self, incident_id: &str) -> Result<(), IncidentError> {
        let entry = self
            .incidents
            .get(incident_id)
            .ok_or_else(|| IncidentError::NotFound(incident_id.to_string()))?;
        if !entry.is_open() {
            return Err(IncidentError::AlreadyResolved(incident_id.to_string()));
        }
        Ok(())
    }

    fn record_automation(&self, incident_id: &str, result: &ExecutionResult, what: &str) {
        let Some(mut entry) = self.incidents.get_mut(incident_id) else {
            return;
        };
        let incident = entry.value_mut();

        incident.automation.push(super::types::AutomationRecord {
            runbook_id: result.runbook_id.clone(),
            executed_by: result.executed_by.clone(),
            success: result.success,
            steps_run: result.step_results.len() + result.rollback_results.len(),
            rolled_back: result.rolled_back,
            errors: result.errors.clone(),
            executed_at: result.finished_at,
        });

        let outcome = if result.success { "succeeded" } else { "failed" };
        incident.record(IncidentEvent::now(
            IncidentEventKind::ActionTaken,
            format!("{what} {} {outcome}", result.runbook_id),
            Some(&result.executed_by),
        ));
    }

    // ========== Escalation hooks ==========

    /// Records an escalation level firing on the incident timeline and
    /// engages the level's responders.
    pub fn note_escalation(
        &self,
        incident_id: &str,
        policy_id: &str,
        level: usize,
        responders: &[String],
    ) {
        let Some(mut entry) = self.incidents.get_mut(incident_id) else {
            return;
        };
        let incident = entry.value_mut();

        for responder in responders {
            if !incident.responders.contains(responder) {
                incident.responders.push(responder.clone());
            }
        }
        incident.record(IncidentEvent::now(
            IncidentEventKind::Escalated,
            format!("Escalated to level {level} (policy {policy_id})"),
            Some("escalation"),
        ));
    }

    /// Records a requested service scale-out on the incident timeline.
    pub fn note_scale_request(&self, incident_id: &str, service: &str, replicas: u32) {
        let Some(mut entry) = self.incidents.get_mut(incident_id) else {
            return;
        };
        entry.record(IncidentEvent::now(
            IncidentEventKind::ActionTaken,
            format!("Requested scale-out of {service} to {replicas} replicas"),
            Some("escalation"),
        ));
    }

    /// Appends an arbitrary timeline event. Returns `false` when the
    /// incident does not exist.
    pub fn record_event(&self, incident_id: &str, event: IncidentEvent) -> bool {
        match self.incidents.get_mut(incident_id) {
            Some(mut entry) => {
                entry.record(event);
                true
            }
            None => false,
        }
    }

    // ========== Stale sweep ==========

    /// Sends a reminder for every open incident with no timeline activity
    /// for `stale_after_minutes`. The reminder itself counts as activity,
    /// so repeated sweeps remind at most once per staleness period.
    pub async fn sweep_stale(&self, stale_after_minutes: i64) -> Vec<String> {
        let now = Utc::now();
        let stale_ids: Vec<String> = self
            .incidents
            .iter()
            .filter(|entry| {
                entry.is_open()
                    && entry
                        .timeline
                        .last()
                        .is_some_and(|e| minutes_between(e.timestamp, now) >= stale_after_minutes)
            })
            .map(|entry| entry.id.clone())
            .collect();

        let mut reminded = Vec::new();
        for incident_id in stale_ids {
            let snapshot = {
                let Some(mut entry) = self.incidents.get_mut(&incident_id) else {
                    continue;
                };
                if !entry.is_open() {
                    continue;
                }
                entry.record(IncidentEvent::now(
                    IncidentEventKind::StaleReminder,
                    format!("No activity for over {stale_after_minutes} minutes"),
                    Some("alert-engine"),
                ));
                entry.clone()
            };

            warn!(incident_id = %incident_id, "Incident is stale, sending reminder");
            let _ = self
                .dispatcher
                .dispatch(&NotificationEvent::IncidentStale(snapshot), &self.notify_channels)
                .await;
            reminded.push(incident_id);
        }

        reminded
    }

    // ========== Post-mortems ==========

    /// Generates and attaches a post-mortem for a resolved incident.
    ///
    /// Generation is one-shot per incident; a second call fails with
    /// [`PostMortemError::AlreadyGenerated`].
    ///
    /// # Errors
    ///
    /// Returns [`IncidentError::NotFound`] or a [`PostMortemError`].
    pub fn generate_post_mortem(&self, incident_id: &str) -> Result<PostMortem, IncidentError> {
        let incident = self
            .incidents
            .get(incident_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| IncidentError::NotFound(incident_id.to_string()))?;

        let report = build_post_mortem(&incident)?;

        self.post_mortems.insert(report.id.clone(), report.clone());
        if let Some(mut entry) = self.incidents.get_mut(incident_id) {
            entry.post_mortem_id = Some(report.id.clone());
        }

        info!(
            incident_id = %incident_id,
            post_mortem_id = %report.id,
            action_items = report.action_items.len(),
            "Post-mortem generated"
        );

        Ok(report)
    }

    /// Gets a post-mortem by id.
    #[must_use]
    pub fn get_post_mortem(&self, post_mortem_id: &str) -> Option<PostMortem> {
        self.post_mortems.get(post_mortem_id).map(|entry| entry.clone())
    }

    // ========== Queries ==========

    /// Gets an incident by id.
    #[must_use]
    pub fn get(&self, incident_id: &str) -> Option<Incident> {
        self.incidents.get(incident_id).map(|entry| entry.clone())
    }

    /// All incidents, in no particular order.
    #[must_use]
    pub fn all(&self) -> Vec<Incident> {
        self.incidents.iter().map(|entry| entry.clone()).collect()
    }

    /// All open incidents.
    #[must_use]
    pub fn open_incidents(&self) -> Vec<Incident> {
        self.incidents.iter().filter(|e| e.is_open()).map(|e| e.clone()).collect()
    }

    /// Count of open incidents.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.incidents.iter().filter(|e| e.is_open()).count()
    }

    /// Rewinds an incident's detection and timeline timestamps. Test
    /// support for timing-derived metrics.
    #[doc(hidden)]
    pub fn backdate(&self, incident_id: &str, to: DateTime<Utc>) {
        if let Some(mut entry) = self.incidents.get_mut(incident_id) {
            entry.detected_at = to;
            for event in &mut entry.timeline {
                event.timestamp = to;
            }
        }
    }
}
