//! Automated remediation runbooks.
//!
//! A runbook is an ordered list of steps (script, api_call, manual,
//! approval, wait) with per-step timeout/retry budgets and a
//! continue-or-rollback failure policy, plus a parallel rollback sequence.
//! The actual step work is performed by injected [`RunbookCollaborators`].

pub mod executor;
pub mod types;

pub use executor::{RunbookCollaborators, RunbookExecutor, SimulatedCollaborators};
pub use types::{
    AutomatedRunbook, ExecutionResult, RunbookError, RunbookStep, RunbookTrigger, StepConfig,
    StepError, StepResult,
};
