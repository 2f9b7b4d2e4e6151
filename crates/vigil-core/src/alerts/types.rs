//! Alert type definitions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::Aggregation;

/// Severity level of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Informational alert for awareness.
    Info,
    /// Warning alert indicating potential issues.
    Warning,
    /// Error alert indicating a real problem.
    Error,
    /// Critical alert requiring immediate attention.
    Critical,
}

impl AlertSeverity {
    /// Static label used in logs and rendered notifications.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

/// Current status of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    /// Alert is currently active.
    Active,
    /// Alert has been acknowledged by an operator.
    Acknowledged,
    /// Alert has been resolved.
    Resolved,
    /// Alert firing was suppressed by the throttle gate.
    Suppressed,
}

/// Comparison operator applied to an aggregated metric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
}

impl ComparisonOp {
    /// Applies the operator to `value` against `threshold`.
    #[must_use]
    pub fn matches(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Gt => value > threshold,
            Self::Gte => value >= threshold,
            Self::Lt => value < threshold,
            Self::Lte => value <= threshold,
            Self::Eq => (value - threshold).abs() < f64::EPSILON,
        }
    }
}

/// Condition evaluated against a metric's windowed aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertCondition {
    /// Metric name this condition watches.
    pub metric: String,
    /// Comparison operator.
    pub op: ComparisonOp,
    /// Threshold the aggregate is compared against.
    pub threshold: f64,
    /// Trailing window in minutes the aggregate is computed over.
    pub window_minutes: u32,
    /// Aggregation applied over the window.
    pub aggregation: Aggregation,
}

/// Throttling policy: at most `max_alerts` alerts per `period_minutes`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThrottlePolicy {
    /// Length of the throttle window in minutes.
    pub period_minutes: u32,
    /// Maximum alerts the rule may produce inside one window.
    pub max_alerts: u32,
}

/// A rule defining when to create alerts.
///
/// Rules are loaded at startup and treated as immutable while being
/// evaluated against; edits happen out-of-band through configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    /// Unique identifier for the rule.
    pub id: String,
    /// Human-readable name for the rule.
    pub name: String,
    /// Whether this rule is currently enabled.
    pub enabled: bool,
    /// Severity level for alerts created by this rule.
    pub severity: AlertSeverity,
    /// Category label (e.g., "availability", "latency").
    pub category: String,
    /// Conditions that trigger the alert. All must hold.
    pub conditions: Vec<AlertCondition>,
    /// Throttling policy for repeated firings.
    pub throttle: ThrottlePolicy,
    /// Tags used for escalation policy and runbook matching.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Owning team or person.
    #[serde(default)]
    pub owner: Option<String>,
}

/// Snapshot of the metric observation that triggered an alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSnapshot {
    /// Metric name.
    pub metric: String,
    /// Aggregated value at trigger time.
    pub value: f64,
    /// Threshold the value was compared against.
    pub threshold: f64,
}

/// Escalation progress attached to an alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationCursor {
    /// Id of the bound escalation policy.
    pub policy_id: String,
    /// Current level index (next level to execute).
    pub level: usize,
    /// When the next level is scheduled to fire.
    pub next_fire_at: Option<DateTime<Utc>>,
}

/// An active or historical alert instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Unique identifier for the alert.
    pub id: String,
    /// ID of the rule that created this alert.
    pub rule_id: String,
    /// Severity level of the alert.
    pub severity: AlertSeverity,
    /// Current status of the alert.
    pub status: AlertStatus,
    /// Descriptive message about the alert.
    pub message: String,
    /// Metric snapshot captured at trigger time.
    pub snapshot: Option<MetricSnapshot>,
    /// Tags inherited from the rule.
    pub tags: Vec<String>,
    /// Key/value context copied from the triggering metric point.
    #[serde(default)]
    pub dimensions: HashMap<String, String>,
    /// Timestamp when the alert was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp when the alert was acknowledged, if applicable.
    pub acknowledged_at: Option<DateTime<Utc>>,
    /// Who acknowledged the alert.
    pub acknowledged_by: Option<String>,
    /// Timestamp when the alert was resolved, if applicable.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Who resolved the alert.
    pub resolved_by: Option<String>,
    /// Escalation progress, when a policy matched.
    pub escalation: Option<EscalationCursor>,
    /// Linked incident, when one was opened for this alert.
    pub incident_id: Option<String>,
}

impl Alert {
    /// Creates a new active alert.
    #[must_use]
    pub fn new(
        id: String,
        rule_id: String,
        severity: AlertSeverity,
        message: String,
        snapshot: Option<MetricSnapshot>,
        tags: Vec<String>,
    ) -> Self {
        Self {
            id,
            rule_id,
            severity,
            status: AlertStatus::Active,
            message,
            snapshot,
            tags,
            dimensions: HashMap::new(),
            created_at: Utc::now(),
            acknowledged_at: None,
            acknowledged_by: None,
            resolved_at: None,
            resolved_by: None,
            escalation: None,
            incident_id: None,
        }
    }

    /// Marks the alert as acknowledged. No-op unless currently active.
    pub fn acknowledge(&mut self, by: &str) {
        if self.status == AlertStatus::Active {
            self.status = AlertStatus::Acknowledged;
            self.acknowledged_at = Some(Utc::now());
            self.acknowledged_by = Some(by.to_string());
        }
    }

    /// Marks the alert as resolved.
    pub fn resolve(&mut self, by: &str) {
        self.status = AlertStatus::Resolved;
        self.resolved_at = Some(Utc::now());
        self.resolved_by = Some(by.to_string());
    }

    /// Whether escalation may still act on this alert.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == AlertStatus::Active
    }
}
