//! Runbook type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-variant structured step configuration, tagged by step type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepConfig {
    /// Run a script through the script collaborator.
    Script {
        command: String,
        #[serde(default)]
        args: Vec<String>,
    },
    /// Call an HTTP API through the api-call collaborator.
    ApiCall {
        url: String,
        #[serde(default = "default_method")]
        method: String,
    },
    /// Request a manual action from a human.
    Manual {
        instructions: String,
        #[serde(default)]
        assignee: Option<String>,
    },
    /// Request approval before continuing.
    Approval { approvers: Vec<String> },
    /// Pause execution for a fixed duration.
    Wait { seconds: u64 },
}

fn default_method() -> String {
    "POST".to_string()
}

impl StepConfig {
    /// Static label for logs and step results.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Script { .. } => "script",
            Self::ApiCall { .. } => "api_call",
            Self::Manual { .. } => "manual",
            Self::Approval { .. } => "approval",
            Self::Wait { .. } => "wait",
        }
    }
}

/// One ordered remediation step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunbookStep {
    /// Unique id within the runbook.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Step behavior, tagged by type.
    pub config: StepConfig,
    /// Upper bound for one attempt, in seconds. Defaults to `60`.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Additional attempts after the first failure. Defaults to `0`.
    #[serde(default)]
    pub retries: u32,
    /// On failure, record the error and continue with the next step.
    #[serde(default)]
    pub continue_on_failure: bool,
    /// On aborting failure, run the runbook's rollback sequence.
    #[serde(default)]
    pub rollback_on_failure: bool,
}

fn default_timeout_seconds() -> u64 {
    60
}

/// Conditions that select a runbook for an incident.
///
/// A runbook matches when any of its tags intersects the incident's tags,
/// or any of its services intersects the incident's affected services.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunbookTrigger {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub services: Vec<String>,
}

impl RunbookTrigger {
    /// Whether this trigger selects an incident with the given tags/services.
    #[must_use]
    pub fn matches(&self, tags: &[String], services: &[String]) -> bool {
        self.tags.iter().any(|t| tags.contains(t))
            || self.services.iter().any(|s| services.contains(s))
    }
}

/// An ordered, automatable remediation procedure with defined rollback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomatedRunbook {
    /// Unique identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// What the runbook does.
    #[serde(default)]
    pub description: String,
    /// Whether the runbook may execute.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Matching conditions for automated response.
    #[serde(default)]
    pub trigger: RunbookTrigger,
    /// Ordered remediation steps.
    pub steps: Vec<RunbookStep>,
    /// Ordered rollback steps, run best-effort on aborting failure.
    #[serde(default)]
    pub rollback_steps: Vec<RunbookStep>,
}

fn default_enabled() -> bool {
    true
}

/// Result of a single step attempt sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Step id.
    pub step_id: String,
    /// Step name.
    pub name: String,
    /// Step kind label.
    pub kind: String,
    /// Whether the step ultimately succeeded.
    pub success: bool,
    /// Attempts performed (1 = no retries needed).
    pub attempts: u32,
    /// Collaborator output on success.
    pub output: Option<String>,
    /// Final error message on failure.
    pub error: Option<String>,
}

/// Aggregate result of one runbook execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Runbook that ran.
    pub runbook_id: String,
    /// Incident the run was performed for.
    pub incident_id: String,
    /// Who or what triggered the run.
    pub executed_by: String,
    /// True when every step succeeded (or failures were continue-on-failure).
    pub success: bool,
    /// Whether the rollback sequence was performed.
    pub rolled_back: bool,
    /// Ordered results for executed steps.
    pub step_results: Vec<StepResult>,
    /// Ordered results for rollback steps, when performed.
    pub rollback_results: Vec<StepResult>,
    /// Collected error messages, in occurrence order.
    pub errors: Vec<String>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
}

/// Errors surfaced by the runbook executor.
#[derive(Debug, Error)]
pub enum RunbookError {
    /// No runbook with the given id exists.
    #[error("runbook not found: {0}")]
    NotFound(String),

    /// The runbook exists but is disabled.
    #[error("runbook disabled: {0}")]
    Disabled(String),
}

/// Failure returned by a step collaborator.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StepError(pub String);
