//! Incident tracking, automation records, and post-mortems.
//!
//! Incidents carry an append-only timeline and forward-only lifecycle;
//! resolution stamps timing metrics and unlocks one-shot post-mortem
//! generation.

pub mod manager;
pub mod postmortem;
pub mod statuspage;
pub mod types;

pub use manager::{IncidentError, IncidentManager, IncidentUpdate, NewIncident};
pub use postmortem::{
    build_post_mortem, post_mortem_required, ActionItem, ActionItemPriority, ImpactAssessment,
    ImpactLevel, PostMortem, PostMortemError,
};
pub use statuspage::{LogStatusPage, StatusPage};
pub use types::{
    minutes_between, AutomationRecord, Incident, IncidentEvent, IncidentEventKind,
    IncidentMetrics, IncidentSeverity, IncidentStatus,
};
