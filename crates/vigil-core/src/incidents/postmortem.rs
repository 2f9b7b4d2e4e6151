//! Post-mortem generation for resolved incidents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::types::{Incident, IncidentEvent, IncidentSeverity};

/// Resolution time above which a post-mortem is required regardless of
/// severity.
pub const POST_MORTEM_RESOLUTION_THRESHOLD_MINUTES: i64 = 60;

/// Errors from post-mortem generation.
#[derive(Debug, Error)]
pub enum PostMortemError {
    /// No incident with the given id exists.
    #[error("incident not found: {0}")]
    IncidentNotFound(String),

    /// The incident is still open.
    #[error("incident {0} is not resolved")]
    NotResolved(String),

    /// A post-mortem was already generated for the incident.
    #[error("post-mortem {0} already exists for this incident")]
    AlreadyGenerated(String),
}

/// Coarse user-impact bucket derived from the affected-user estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    Minimal,
    Moderate,
    Significant,
    Severe,
}

impl ImpactLevel {
    /// Buckets an estimated affected-user count. An unknown estimate is
    /// treated as minimal.
    #[must_use]
    pub fn from_affected_users(users: Option<u64>) -> Self {
        match users.unwrap_or(0) {
            0..=99 => Self::Minimal,
            100..=999 => Self::Moderate,
            1_000..=9_999 => Self::Significant,
            _ => Self::Severe,
        }
    }

    /// Static label used in the rendered report.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Moderate => "moderate",
            Self::Significant => "significant",
            Self::Severe => "severe",
        }
    }
}

/// Business impact section of a post-mortem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactAssessment {
    /// Severity the incident ended at.
    pub severity: IncidentSeverity,
    /// Minutes from detection to resolution.
    pub duration_minutes: i64,
    /// Estimated affected users, when known.
    pub estimated_affected_users: Option<u64>,
    /// Bucketed user impact.
    pub impact_level: ImpactLevel,
    /// Services that were affected.
    pub affected_services: Vec<String>,
}

/// Priority of a follow-up action item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionItemPriority {
    Low,
    Medium,
    High,
}

/// A follow-up task derived from the incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionItem {
    /// What needs doing.
    pub description: String,
    /// How urgent it is.
    pub priority: ActionItemPriority,
    /// Suggested owner, when one is known.
    pub owner: Option<String>,
}

/// A generated post-mortem report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostMortem {
    /// Unique identifier.
    pub id: String,
    /// Incident this report covers.
    pub incident_id: String,
    /// Report title.
    pub title: String,
    /// One-paragraph summary.
    pub summary: String,
    /// Root cause, when identified before resolution.
    pub root_cause: Option<String>,
    /// Resolution summary.
    pub resolution: Option<String>,
    /// Business impact section.
    pub impact: ImpactAssessment,
    /// Full incident timeline, copied in timestamp order.
    pub timeline: Vec<IncidentEvent>,
    /// Alerts that contributed to the incident.
    pub contributing_alerts: Vec<String>,
    /// Responders who worked the incident.
    pub responders: Vec<String>,
    /// Derived follow-up tasks.
    pub action_items: Vec<ActionItem>,
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
}

/// Whether a resolved incident requires a post-mortem: critical or high
/// severity, or a resolution time over one hour.
#[must_use]
pub fn post_mortem_required(severity: IncidentSeverity, resolution_time_minutes: Option<i64>) -> bool {
    severity.requires_post_mortem()
        || resolution_time_minutes.is_some_and(|m| m > POST_MORTEM_RESOLUTION_THRESHOLD_MINUTES)
}

/// Builds a post-mortem from a resolved incident.
///
/// # Errors
///
/// Returns [`PostMortemError::NotResolved`] when the incident is still
/// open, or [`PostMortemError::AlreadyGenerated`] when one exists.
pub fn build_post_mortem(incident: &Incident) -> Result<PostMortem, PostMortemError> {
    if incident.is_open() {
        return Err(PostMortemError::NotResolved(incident.id.clone()));
    }
    if let Some(existing) = &incident.post_mortem_id {
        return Err(PostMortemError::AlreadyGenerated(existing.clone()));
    }

    let duration_minutes = incident.metrics.resolution_time_minutes.unwrap_or(0);

    let impact = ImpactAssessment {
        severity: incident.severity,
        duration_minutes,
        estimated_affected_users: incident.estimated_affected_users,
        impact_level: ImpactLevel::from_affected_users(incident.estimated_affected_users),
        affected_services: incident.affected_services.clone(),
    };

    let summary = format!(
        "{} ({} severity) affected {} for {} minutes. Impact: {}.",
        incident.title,
        incident.severity.as_str(),
        if incident.affected_services.is_empty() {
            "no recorded services".to_string()
        } else {
            incident.affected_services.join(", ")
        },
        duration_minutes,
        impact.impact_level.as_str(),
    );

    Ok(PostMortem {
        id: format!("pm-{}", Uuid::new_v4()),
        incident_id: incident.id.clone(),
        title: format!("Post-mortem: {}", incident.title),
        summary,
        root_cause: incident.root_cause.clone(),
        resolution: incident.resolution.clone(),
        impact,
        timeline: incident.timeline.clone(),
        contributing_alerts: incident.alert_ids.clone(),
        responders: incident.responders.clone(),
        action_items: derive_action_items(incident, duration_minutes),
        generated_at: Utc::now(),
    })
}

/// Follow-up tasks derived from what the incident record is missing or
/// what went wrong during handling.
fn derive_action_items(incident: &Incident, duration_minutes: i64) -> Vec<ActionItem> {
    let mut items = Vec::new();

    if incident.root_cause.is_none() {
        items.push(ActionItem {
            description: "Identify and document the root cause".to_string(),
            priority: ActionItemPriority::High,
            owner: incident.commander.clone(),
        });
    }

    if duration_minutes > POST_MORTEM_RESOLUTION_THRESHOLD_MINUTES {
        items.push(ActionItem {
            description: format!(
                "Review detection and escalation timings (resolution took {duration_minutes} minutes)"
            ),
            priority: ActionItemPriority::Medium,
            owner: None,
        });
    }

    for record in &incident.automation {
        if !record.success {
            items.push(ActionItem {
                description: format!("Investigate failed runbook {}", record.runbook_id),
                priority: ActionItemPriority::High,
                owner: None,
            });
        }
    }

    if incident.estimated_affected_users.is_none() {
        items.push(ActionItem {
            description: "Estimate user impact for this incident class".to_string(),
            priority: ActionItemPriority::Low,
            owner: None,
        });
    }

    items
}
