//! Incident type definitions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alerts::AlertSeverity;

/// Severity of a human-tracked incident.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentSeverity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl IncidentSeverity {
    /// Static label used in logs and rendered notifications.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Maps an alert severity onto the incident scale.
    ///
    /// Used when a critical alert auto-opens an incident and by escalation
    /// actions that create incidents from alerts.
    #[must_use]
    pub fn from_alert(severity: AlertSeverity) -> Self {
        match severity {
            AlertSeverity::Critical => Self::Critical,
            AlertSeverity::Error => Self::High,
            AlertSeverity::Warning => Self::Medium,
            AlertSeverity::Info => Self::Low,
        }
    }

    /// Whether a post-mortem is mandatory for this severity.
    #[must_use]
    pub fn requires_post_mortem(&self) -> bool {
        matches!(self, Self::Critical | Self::High)
    }
}

/// Lifecycle status of an incident.
///
/// Transitions are monotonic forward: `investigating → identified →
/// monitoring → resolved`. Severity may be revised at any non-resolved
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    Investigating,
    Identified,
    Monitoring,
    Resolved,
}

impl IncidentStatus {
    /// Static label used in logs and rendered notifications.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Investigating => "investigating",
            Self::Identified => "identified",
            Self::Monitoring => "monitoring",
            Self::Resolved => "resolved",
        }
    }

    /// Position in the forward-only lifecycle.
    #[must_use]
    pub fn rank(&self) -> u8 {
        match self {
            Self::Investigating => 0,
            Self::Identified => 1,
            Self::Monitoring => 2,
            Self::Resolved => 3,
        }
    }

    /// Whether the incident is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Resolved)
    }
}

/// Kind of timeline entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentEventKind {
    Created,
    Updated,
    Escalated,
    ActionTaken,
    Notification,
    StaleReminder,
    Resolved,
}

/// A single append-only timeline entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentEvent {
    /// When the event happened.
    pub timestamp: DateTime<Utc>,
    /// Event kind.
    pub kind: IncidentEventKind,
    /// Human-readable description.
    pub description: String,
    /// Who or what produced the event.
    pub actor: Option<String>,
    /// Extra context.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl IncidentEvent {
    /// Creates an event timestamped now.
    #[must_use]
    pub fn now(kind: IncidentEventKind, description: impl Into<String>, actor: Option<&str>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            description: description.into(),
            actor: actor.map(ToString::to_string),
            metadata: HashMap::new(),
        }
    }
}

/// Derived timing metrics for an incident.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncidentMetrics {
    /// Minutes from detection to first acknowledgement/update.
    pub response_time_minutes: Option<i64>,
    /// Minutes from detection to resolution.
    pub resolution_time_minutes: Option<i64>,
}

/// Record of one automated runbook execution against an incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationRecord {
    /// Runbook that ran.
    pub runbook_id: String,
    /// Who or what triggered the run.
    pub executed_by: String,
    /// Aggregate outcome.
    pub success: bool,
    /// Number of steps that produced a result.
    pub steps_run: usize,
    /// Whether the rollback sequence was performed.
    pub rolled_back: bool,
    /// Collected error messages.
    pub errors: Vec<String>,
    /// When the run finished.
    pub executed_at: DateTime<Utc>,
}

/// A human-tracked operational problem, possibly caused by one or more
/// alerts. Immutable once resolved, except for post-mortem attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    /// Unique identifier.
    pub id: String,
    /// Short title.
    pub title: String,
    /// Longer description of the problem.
    pub description: String,
    /// Current severity; may be revised while open.
    pub severity: IncidentSeverity,
    /// Lifecycle status.
    pub status: IncidentStatus,
    /// Incident commander, when assigned.
    pub commander: Option<String>,
    /// Responders currently engaged.
    pub responders: Vec<String>,
    /// Services impacted by the incident.
    pub affected_services: Vec<String>,
    /// Alerts linked to this incident.
    pub alert_ids: Vec<String>,
    /// Tags used for runbook and policy matching.
    pub tags: Vec<String>,
    /// Append-only, timestamp-ordered event log.
    pub timeline: Vec<IncidentEvent>,
    /// Derived timing metrics.
    pub metrics: IncidentMetrics,
    /// Estimated number of affected users, when known.
    pub estimated_affected_users: Option<u64>,
    /// Runbook executions performed for this incident.
    pub automation: Vec<AutomationRecord>,
    /// Root cause, once identified.
    pub root_cause: Option<String>,
    /// Resolution summary, once resolved.
    pub resolution: Option<String>,
    /// Who or what detected the incident.
    pub detected_by: String,
    /// When the incident was detected.
    pub detected_at: DateTime<Utc>,
    /// When the incident was resolved.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Attached post-mortem, once generated.
    pub post_mortem_id: Option<String>,
}

impl Incident {
    /// Creates a new incident in `investigating` with a seeded timeline.
    #[must_use]
    pub fn new(
        id: String,
        title: String,
        description: String,
        severity: IncidentSeverity,
        affected_services: Vec<String>,
        detected_by: String,
    ) -> Self {
        let created = IncidentEvent::now(
            IncidentEventKind::Created,
            format!("Incident created: {title}"),
            Some(&detected_by),
        );

        Self {
            id,
            title,
            description,
            severity,
            status: IncidentStatus::Investigating,
            commander: None,
            responders: Vec::new(),
            affected_services,
            alert_ids: Vec::new(),
            tags: Vec::new(),
            timeline: vec![created],
            metrics: IncidentMetrics::default(),
            estimated_affected_users: None,
            automation: Vec::new(),
            root_cause: None,
            resolution: None,
            detected_by,
            detected_at: Utc::now(),
            resolved_at: None,
            post_mortem_id: None,
        }
    }

    /// Appends a timeline event. The timeline is append-only; events are
    /// never reordered or deleted.
    pub fn record(&mut self, event: IncidentEvent) {
        self.timeline.push(event);
    }

    /// Whether the incident is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }
}

/// Whole minutes between two instants, used for response/resolution times.
#[must_use]
pub fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    end.signed_duration_since(start).num_minutes()
}
