//! Signal intake: rule evaluation over incoming metrics and events.
//!
//! The intake is the write path of the engine. Recording a metric buffers
//! it and evaluates every enabled rule that references it; a satisfied rule
//! passes the throttle gate and becomes an alert, which is notified,
//! escalated, and (for critical severity) auto-opens an incident.

use std::{collections::HashMap, sync::Arc};

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    escalation::{EscalationScheduler, EscalationTarget},
    incidents::IncidentManager,
    metrics::MetricsCollector,
    notify::{NotificationDispatcher, NotificationEvent},
};

use super::{
    store::{AlertStore, ThrottleDecision},
    types::{Alert, AlertRule, AlertSeverity, MetricSnapshot},
};

/// Outcome of one rule firing for a recorded signal.
#[derive(Debug, Clone)]
pub enum SignalOutcome {
    /// A new alert was admitted into the store.
    Created(Alert),
    /// The firing hit the rule's throttle. Carries the most recent alert
    /// already covering the rule, unchanged; nothing was stored or
    /// re-notified.
    Suppressed(Alert),
}

impl SignalOutcome {
    /// The alert covering the firing, whether created or prior.
    #[must_use]
    pub fn alert(&self) -> &Alert {
        match self {
            Self::Created(alert) | Self::Suppressed(alert) => alert,
        }
    }

    /// Whether this firing admitted a new alert.
    #[must_use]
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Evaluates signals against rules and drives the alert write path.
pub struct SignalIntake {
    metrics: Arc<MetricsCollector>,
    rules: Vec<AlertRule>,
    store: Arc<AlertStore>,
    dispatcher: Arc<NotificationDispatcher>,
    scheduler: Arc<EscalationScheduler>,
    incident_manager: Arc<IncidentManager>,
    /// Channels receiving `alert_created` notifications.
    notify_channels: Vec<String>,
}

impl SignalIntake {
    /// Creates an intake over the configured rules.
    #[must_use]
    pub fn new(
        metrics: Arc<MetricsCollector>,
        rules: Vec<AlertRule>,
        store: Arc<AlertStore>,
        dispatcher: Arc<NotificationDispatcher>,
        scheduler: Arc<EscalationScheduler>,
        incident_manager: Arc<IncidentManager>,
        notify_channels: Vec<String>,
    ) -> Self {
        Self { metrics, rules, store, dispatcher, scheduler, incident_manager, notify_channels }
    }

    /// The configured rules.
    #[must_use]
    pub fn rules(&self) -> &[AlertRule] {
        &self.rules
    }

    /// Records a metric observation and evaluates the rules referencing it.
    ///
    /// Returns one outcome per rule that fired: [`SignalOutcome::Created`]
    /// with the admitted alert, or [`SignalOutcome::Suppressed`] with the
    /// most recent existing alert when the rule was throttled. A metric
    /// referenced by no rule is buffered and otherwise ignored.
    pub async fn record_metric(
        &self,
        name: &str,
        value: f64,
        unit: &str,
        tags: Vec<String>,
        dimensions: HashMap<String, String>,
    ) -> Vec<SignalOutcome> {
        self.metrics.record_metric(name, value, unit, tags, dimensions.clone());

        let mut outcomes = Vec::new();
        for rule in &self.rules {
            if !rule.enabled || !rule.conditions.iter().any(|c| c.metric == name) {
                continue;
            }
            if let Some(outcome) = self.evaluate_rule(rule, name, &dimensions).await {
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    /// Admits a pre-classified event as an alert, bypassing rule
    /// evaluation and throttling.
    pub async fn ingest_event(
        &self,
        source: &str,
        severity: AlertSeverity,
        message: &str,
        tags: Vec<String>,
    ) -> Alert {
        let alert = Alert::new(
            format!("alert-{}", Uuid::new_v4()),
            format!("event:{source}"),
            severity,
            message.to_string(),
            None,
            tags,
        );

        info!(
            alert_id = %alert.id,
            source = %source,
            severity = severity.as_str(),
            "Pre-classified event admitted as alert"
        );

        self.admit(alert).await
    }

    /// Acknowledges an alert and cancels its pending escalation.
    pub fn acknowledge_alert(&self, alert_id: &str, by: &str) -> Option<Alert> {
        let alert = self.store.acknowledge(alert_id, by)?;
        self.scheduler.cancel(&EscalationTarget::Alert(alert_id.to_string()));
        info!(alert_id = %alert_id, by = %by, "Alert acknowledged");
        Some(alert)
    }

    /// Resolves an alert and cancels its pending escalation.
    pub fn resolve_alert(&self, alert_id: &str, by: &str) -> Option<Alert> {
        let alert = self.store.resolve(alert_id, by)?;
        self.scheduler.cancel(&EscalationTarget::Alert(alert_id.to_string()));
        info!(alert_id = %alert_id, by = %by, "Alert resolved");
        Some(alert)
    }

    /// Evaluates one rule after `metric_name` was recorded. All conditions
    /// must hold over their own windows; the snapshot captures the
    /// condition on the recorded metric.
    async fn evaluate_rule(
        &self,
        rule: &AlertRule,
        metric_name: &str,
        dimensions: &HashMap<String, String>,
    ) -> Option<SignalOutcome> {
        let mut snapshot = None;

        for condition in &rule.conditions {
            let value =
                self.metrics.aggregate(&condition.metric, condition.window_minutes, condition.aggregation)?;
            if !condition.op.matches(value, condition.threshold) {
                return None;
            }
            if condition.metric == metric_name {
                snapshot = Some(MetricSnapshot {
                    metric: condition.metric.clone(),
                    value,
                    threshold: condition.threshold,
                });
            }
        }

        match self.store.check_throttle(&rule.id, rule.throttle) {
            ThrottleDecision::Suppress(prior) => {
                debug!(
                    rule_id = %rule.id,
                    prior_alert_id = %prior.id,
                    "Rule firing suppressed by throttle"
                );
                Some(SignalOutcome::Suppressed(*prior))
            }
            ThrottleDecision::Allow => {
                let mut alert = Alert::new(
                    format!("alert-{}", Uuid::new_v4()),
                    rule.id.clone(),
                    rule.severity,
                    rule.name.clone(),
                    snapshot,
                    rule.tags.clone(),
                );
                alert.dimensions = dimensions.clone();

                info!(
                    alert_id = %alert.id,
                    rule_id = %rule.id,
                    severity = rule.severity.as_str(),
                    metric = %metric_name,
                    "Alert created"
                );

                Some(SignalOutcome::Created(self.admit(alert).await))
            }
        }
    }

    /// Post-creation path shared by rule firings and ingested events:
    /// store, notify, escalate, and auto-open an incident for critical
    /// severity.
    async fn admit(&self, alert: Alert) -> Alert {
        self.store.insert(alert.clone());

        let _ = self
            .dispatcher
            .dispatch(&NotificationEvent::AlertCreated(alert.clone()), &self.notify_channels)
            .await;
        self.scheduler.start_for_alert(&alert);

        if alert.severity == AlertSeverity::Critical && alert.incident_id.is_none() {
            match self.incident_manager.create_incident_for_alert(&alert, "alert-engine").await {
                Ok(incident) => {
                    info!(
                        alert_id = %alert.id,
                        incident_id = %incident.id,
                        "Incident auto-opened for critical alert"
                    );
                }
                Err(e) => {
                    debug!(alert_id = %alert.id, error = %e, "Incident auto-open failed");
                }
            }
        }

        // The stored copy may have picked up a cursor or incident link.
        self.store.get(&alert.id).unwrap_or(alert)
    }
}
