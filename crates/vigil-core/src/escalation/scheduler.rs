//! Cancellable escalation timers.
//!
//! Binding an alert or incident to a policy schedules its levels as real
//! async timers. Each fire re-checks the entity's current status before
//! acting, so a resolve or acknowledge that races a timer is always safe:
//! the timer wakes, observes the terminal state, and does nothing.

use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    alerts::{Alert, AlertSeverity, AlertStore, EscalationCursor},
    incidents::{Incident, IncidentManager, IncidentSeverity},
    notify::{NotificationDispatcher, NotificationEvent},
};

use super::policy::{first_matching, EscalationAction, EscalationPolicy};

/// The entity an escalation timer belongs to.
#[derive(Debug, Clone)]
pub enum EscalationTarget {
    Alert(String),
    Incident(String),
}

impl EscalationTarget {
    /// Timer registry key. Alert and incident ids live in separate
    /// namespaces so they can never collide.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::Alert(id) => format!("alert:{id}"),
            Self::Incident(id) => format!("incident:{id}"),
        }
    }
}

/// Minutes until `level` fires once it is armed, or `None` past the last
/// level. A previous level's response window, when set, overrides the
/// level's own delay.
fn level_delay(policy: &EscalationPolicy, level: usize) -> Option<u32> {
    policy.levels.get(level)?;
    Some(
        level
            .checked_sub(1)
            .and_then(|prev| policy.levels[prev].timeout_minutes)
            .unwrap_or(policy.levels[level].delay_minutes),
    )
}

/// Incident severities matched against alert-scale policy conditions.
fn alert_scale(severity: IncidentSeverity) -> AlertSeverity {
    match severity {
        IncidentSeverity::Critical => AlertSeverity::Critical,
        IncidentSeverity::High => AlertSeverity::Error,
        IncidentSeverity::Medium => AlertSeverity::Warning,
        IncidentSeverity::Low => AlertSeverity::Info,
    }
}

/// Schedules and cancels per-entity escalation timers.
///
/// One timer exists per entity at a time; scheduling the next level
/// replaces (and aborts) the previous handle under the same key.
pub struct EscalationScheduler {
    policies: Vec<EscalationPolicy>,
    store: Arc<AlertStore>,
    dispatcher: Arc<NotificationDispatcher>,
    timers: DashMap<String, JoinHandle<()>>,
    // Broken Arc cycle: the incident manager holds the scheduler strongly,
    // the scheduler holds the manager weakly and is bound after construction.
    incident_manager: OnceLock<Weak<IncidentManager>>,
}

impl EscalationScheduler {
    /// Creates a scheduler over the configured policies.
    #[must_use]
    pub fn new(
        policies: Vec<EscalationPolicy>,
        store: Arc<AlertStore>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            policies,
            store,
            dispatcher,
            timers: DashMap::new(),
            incident_manager: OnceLock::new(),
        }
    }

    /// Binds the incident manager. Called once by the runtime builder.
    pub fn bind_incident_manager(&self, manager: Weak<IncidentManager>) {
        let _ = self.incident_manager.set(manager);
    }

    fn manager(&self) -> Option<Arc<IncidentManager>> {
        self.incident_manager.get().and_then(Weak::upgrade)
    }

    /// Number of currently scheduled timers.
    #[must_use]
    pub fn active_timers(&self) -> usize {
        self.timers.len()
    }

    /// Binds a new alert to the first matching policy and schedules level 0.
    ///
    /// Returns the bound policy id, or `None` when no policy matches (the
    /// alert then never escalates).
    pub fn start_for_alert(self: &Arc<Self>, alert: &Alert) -> Option<String> {
        let policy = first_matching(&self.policies, alert.severity, &alert.tags, Utc::now())?;
        let policy = policy.clone();

        info!(
            alert_id = %alert.id,
            policy_id = %policy.id,
            levels = policy.levels.len(),
            "Alert bound to escalation policy"
        );

        self.record_cursor(&alert.id, &policy, 0);
        self.schedule_level(EscalationTarget::Alert(alert.id.clone()), policy.clone(), 0);
        Some(policy.id)
    }

    /// Binds an incident to the first matching policy and schedules level 0.
    ///
    /// Incident severity is matched against policy conditions on the alert
    /// scale (critical→critical, high→error, medium→warning, low→info).
    pub fn start_for_incident(self: &Arc<Self>, incident: &Incident) -> Option<String> {
        let severity = alert_scale(incident.severity);
        let policy = first_matching(&self.policies, severity, &incident.tags, Utc::now())?;
        let policy = policy.clone();

        info!(
            incident_id = %incident.id,
            policy_id = %policy.id,
            levels = policy.levels.len(),
            "Incident bound to escalation policy"
        );

        self.schedule_level(EscalationTarget::Incident(incident.id.clone()), policy.clone(), 0);
        Some(policy.id)
    }

    /// Cancels any pending timer for the target. Idempotent.
    pub fn cancel(&self, target: &EscalationTarget) {
        if let Some((key, handle)) = self.timers.remove(&target.key()) {
            handle.abort();
            debug!(target = %key, "Escalation timer cancelled");
        }
    }

    /// Cancels all pending timers. Used at shutdown.
    pub fn cancel_all(&self) {
        let keys: Vec<String> = self.timers.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            if let Some((_, handle)) = self.timers.remove(&key) {
                handle.abort();
            }
        }
        debug!("All escalation timers cancelled");
    }

    fn record_cursor(&self, alert_id: &str, policy: &EscalationPolicy, level: usize) {
        let next_fire_at = level_delay(policy, level)
            .map(|minutes| Utc::now() + chrono::Duration::minutes(i64::from(minutes)));
        self.store.set_escalation_cursor(
            alert_id,
            EscalationCursor { policy_id: policy.id.clone(), level, next_fire_at },
        );
    }

    /// Arms the timer for one level. Replaces any existing timer for the
    /// same target.
    fn schedule_level(self: &Arc<Self>, target: EscalationTarget, policy: EscalationPolicy, level: usize) {
        let Some(delay_minutes) = level_delay(&policy, level) else {
            // Past the last level: escalation is exhausted for this target.
            self.timers.remove(&target.key());
            return;
        };

        let scheduler = Arc::clone(self);
        let key = target.key();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(u64::from(delay_minutes) * 60)).await;
            scheduler.fire_level(target, policy, level).await;
        });

        if let Some(previous) = self.timers.insert(key, handle) {
            previous.abort();
        }
    }

    /// Executes one level after its delay elapsed: status recheck, channel
    /// fan-out, actions, then arm the next level.
    async fn fire_level(self: Arc<Self>, target: EscalationTarget, policy: EscalationPolicy, level: usize) {
        match &target {
            EscalationTarget::Alert(alert_id) => {
                let Some(alert) = self.store.get(alert_id) else {
                    self.timers.remove(&target.key());
                    return;
                };
                if !alert.is_active() {
                    debug!(
                        alert_id = %alert_id,
                        status = ?alert.status,
                        "Alert no longer active at fire time, stopping escalation"
                    );
                    self.timers.remove(&target.key());
                    return;
                }
                self.fire_alert_level(&alert, &policy, level).await;
            }
            EscalationTarget::Incident(incident_id) => {
                let Some(manager) = self.manager() else {
                    self.timers.remove(&target.key());
                    return;
                };
                let Some(incident) = manager.get(incident_id) else {
                    self.timers.remove(&target.key());
                    return;
                };
                if !incident.is_open() {
                    debug!(
                        incident_id = %incident_id,
                        "Incident resolved at fire time, stopping escalation"
                    );
                    self.timers.remove(&target.key());
                    return;
                }
                self.fire_incident_level(&incident, &policy, level).await;
            }
        }

        self.schedule_level(target, policy, level + 1);
    }

    async fn fire_alert_level(&self, alert: &Alert, policy: &EscalationPolicy, level: usize) {
        let tier = &policy.levels[level];

        info!(
            alert_id = %alert.id,
            policy_id = %policy.id,
            level = level,
            channels = tier.channels.len(),
            responders = ?tier.responders,
            "Escalation level fired for alert"
        );

        let event = NotificationEvent::AlertEscalated { alert: alert.clone(), level };
        let _ = self.dispatcher.dispatch(&event, &tier.channels).await;

        let mut incident_id = alert.incident_id.clone();
        for action in &tier.actions {
            incident_id = self.run_action(action, alert, incident_id, policy, level).await;
        }

        self.record_cursor(&alert.id, policy, level + 1);
    }

    async fn fire_incident_level(&self, incident: &Incident, policy: &EscalationPolicy, level: usize) {
        let tier = &policy.levels[level];

        info!(
            incident_id = %incident.id,
            policy_id = %policy.id,
            level = level,
            channels = tier.channels.len(),
            "Escalation level fired for incident"
        );

        let event = NotificationEvent::IncidentEscalated { incident: incident.clone(), level };
        let _ = self.dispatcher.dispatch(&event, &tier.channels).await;

        if let Some(manager) = self.manager() {
            manager.note_escalation(&incident.id, &policy.id, level, &tier.responders);

            for action in &tier.actions {
                match action {
                    EscalationAction::CreateIncident => {
                        // Already an incident; nothing to create.
                    }
                    EscalationAction::ExecuteRunbook { runbook_id } => {
                        let by = format!("escalation:{}", policy.id);
                        if let Err(e) = manager.run_runbook(&incident.id, runbook_id, &by).await {
                            warn!(
                                incident_id = %incident.id,
                                runbook_id = %runbook_id,
                                error = %e,
                                "Escalation runbook execution failed"
                            );
                        }
                    }
                    EscalationAction::ScaleService { service, replicas } => {
                        manager.note_scale_request(&incident.id, service, *replicas);
                    }
                    EscalationAction::TriggerRollback { runbook_id } => {
                        let by = format!("escalation:{}", policy.id);
                        if let Err(e) = manager.trigger_rollback(&incident.id, runbook_id, &by).await {
                            warn!(
                                incident_id = %incident.id,
                                runbook_id = %runbook_id,
                                error = %e,
                                "Escalation rollback failed"
                            );
                        }
                    }
                }
            }
        }
    }

    /// Runs one action for an alert-target level. Returns the (possibly
    /// newly created) linked incident id, threaded through so later actions
    /// in the same level see an incident opened by an earlier one.
    async fn run_action(
        &self,
        action: &EscalationAction,
        alert: &Alert,
        incident_id: Option<String>,
        policy: &EscalationPolicy,
        level: usize,
    ) -> Option<String> {
        let by = format!("escalation:{}", policy.id);

        match action {
            EscalationAction::CreateIncident => {
                if incident_id.is_some() {
                    debug!(alert_id = %alert.id, "Alert already linked to an incident, skipping create");
                    return incident_id;
                }
                let Some(manager) = self.manager() else {
                    return incident_id;
                };
                match manager.create_incident_for_alert(alert, &by).await {
                    Ok(incident) => {
                        info!(
                            alert_id = %alert.id,
                            incident_id = %incident.id,
                            level = level,
                            "Escalation opened incident for alert"
                        );
                        Some(incident.id)
                    }
                    Err(e) => {
                        warn!(alert_id = %alert.id, error = %e, "Escalation failed to open incident");
                        incident_id
                    }
                }
            }
            EscalationAction::ExecuteRunbook { runbook_id } => {
                let Some(manager) = self.manager() else {
                    return incident_id;
                };
                match &incident_id {
                    Some(id) => {
                        if let Err(e) = manager.run_runbook(id, runbook_id, &by).await {
                            warn!(
                                alert_id = %alert.id,
                                runbook_id = %runbook_id,
                                error = %e,
                                "Escalation runbook execution failed"
                            );
                        }
                    }
                    None => {
                        warn!(
                            alert_id = %alert.id,
                            runbook_id = %runbook_id,
                            "Runbook action requires a linked incident, skipping"
                        );
                    }
                }
                incident_id
            }
            EscalationAction::ScaleService { service, replicas } => {
                match (&incident_id, self.manager()) {
                    (Some(id), Some(manager)) => {
                        manager.note_scale_request(id, service, *replicas);
                    }
                    _ => {
                        info!(
                            alert_id = %alert.id,
                            service = %service,
                            replicas = replicas,
                            "Scale-out requested"
                        );
                    }
                }
                incident_id
            }
            EscalationAction::TriggerRollback { runbook_id } => {
                let Some(manager) = self.manager() else {
                    return incident_id;
                };
                match &incident_id {
                    Some(id) => {
                        if let Err(e) = manager.trigger_rollback(id, runbook_id, &by).await {
                            warn!(
                                alert_id = %alert.id,
                                runbook_id = %runbook_id,
                                error = %e,
                                "Escalation rollback failed"
                            );
                        }
                    }
                    None => {
                        warn!(
                            alert_id = %alert.id,
                            runbook_id = %runbook_id,
                            "Rollback action requires a linked incident, skipping"
                        );
                    }
                }
                incident_id
            }
        }
    }
}
