//! Escalation policy definitions and matching.
//!
//! Policies are loaded at startup and read-only at runtime. The first
//! policy whose conditions match an alert or incident wins; an entity with
//! no matching policy gets immediate notification only and never escalates.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::alerts::AlertSeverity;

/// Time-of-day / day-of-week applicability window.
///
/// Hours are UTC, inclusive start, exclusive end; an end smaller than the
/// start wraps past midnight (e.g., 22–6 for an overnight window). Days use
/// `chrono` weekday numbering, Monday = 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_hour: u8,
    pub end_hour: u8,
    #[serde(default)]
    pub days: Vec<u8>,
}

impl TimeWindow {
    /// Whether `now` falls inside the window.
    #[must_use]
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let hour = now.hour() as u8;
        let in_hours = if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        };

        let in_days = self.days.is_empty()
            || self.days.contains(&(now.weekday().num_days_from_monday() as u8));

        in_hours && in_days
    }
}

/// Applicability conditions for a policy.
///
/// Empty severity/tag lists match anything; both present conditions must
/// hold (severity in set AND tags intersect).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConditions {
    #[serde(default)]
    pub severities: Vec<AlertSeverity>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub time_window: Option<TimeWindow>,
}

impl PolicyConditions {
    /// Whether the conditions match the given severity/tags at `now`.
    #[must_use]
    pub fn matches(&self, severity: AlertSeverity, tags: &[String], now: DateTime<Utc>) -> bool {
        if !self.severities.is_empty() && !self.severities.contains(&severity) {
            return false;
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|t| tags.contains(t)) {
            return false;
        }
        if let Some(window) = &self.time_window {
            if !window.contains(now) {
                return false;
            }
        }
        true
    }
}

/// Action executed when an escalation level fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EscalationAction {
    /// Open an incident for the escalating alert.
    CreateIncident,
    /// Execute a runbook against the linked incident.
    ExecuteRunbook { runbook_id: String },
    /// Request a service scale-out; recorded on the incident timeline.
    ScaleService { service: String, replicas: u32 },
    /// Run a runbook's rollback sequence against the linked incident.
    TriggerRollback { runbook_id: String },
}

/// One timed tier of responders, channels, and actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationLevel {
    /// Delay from the previous level (or from binding, for level 0).
    /// Zero means immediate.
    pub delay_minutes: u32,
    /// Channels notified when the level fires.
    #[serde(default)]
    pub channels: Vec<String>,
    /// Responders paged/recorded when the level fires.
    #[serde(default)]
    pub responders: Vec<String>,
    /// Actions executed when the level fires.
    #[serde(default)]
    pub actions: Vec<EscalationAction>,
    /// Response window granted to this level's responders. When set it
    /// overrides the next level's own delay.
    #[serde(default)]
    pub timeout_minutes: Option<u32>,
}

/// Ordered escalation tiers with applicability conditions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationPolicy {
    /// Unique identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// When this policy applies.
    #[serde(default)]
    pub conditions: PolicyConditions,
    /// Ordered levels; must be non-empty (validated at load).
    pub levels: Vec<EscalationLevel>,
}

/// First policy matching the given severity/tags, in configured order.
#[must_use]
pub fn first_matching<'a>(
    policies: &'a [EscalationPolicy],
    severity: AlertSeverity,
    tags: &[String],
    now: DateTime<Utc>,
) -> Option<&'a EscalationPolicy> {
    policies.iter().find(|p| p.conditions.matches(severity, tags, now))
}
