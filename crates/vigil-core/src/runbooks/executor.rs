//! Runbook execution with per-step timeout, retry, and rollback policy.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use super::types::{
    AutomatedRunbook, ExecutionResult, RunbookError, RunbookStep, StepConfig, StepError,
    StepResult,
};

/// External collaborators that perform the actual step work.
///
/// Each method returns a short output description on success or a
/// [`StepError`] that the executor folds into the step result. These are
/// pluggable and simulated in tests.
#[async_trait]
pub trait RunbookCollaborators: Send + Sync {
    /// Runs a script step.
    async fn execute_script(
        &self,
        command: &str,
        args: &[String],
        params: &serde_json::Value,
    ) -> Result<String, StepError>;

    /// Performs an HTTP API call step.
    async fn make_api_call(
        &self,
        url: &str,
        method: &str,
        params: &serde_json::Value,
    ) -> Result<String, StepError>;

    /// Requests a manual action from a human responder.
    async fn request_manual_action(
        &self,
        instructions: &str,
        assignee: Option<&str>,
    ) -> Result<String, StepError>;

    /// Requests approval; an unapproved request is a step failure.
    async fn request_approval(&self, approvers: &[String]) -> Result<String, StepError>;
}

/// Collaborator stand-in that logs each step and reports success.
///
/// Used by the CLI simulator; tests inject scripted collaborators instead.
#[derive(Debug, Default)]
pub struct SimulatedCollaborators;

#[async_trait]
impl RunbookCollaborators for SimulatedCollaborators {
    async fn execute_script(
        &self,
        command: &str,
        args: &[String],
        _params: &serde_json::Value,
    ) -> Result<String, StepError> {
        info!(command = %command, args = ?args, "Simulated script execution");
        Ok(format!("simulated: {command}"))
    }

    async fn make_api_call(
        &self,
        url: &str,
        method: &str,
        _params: &serde_json::Value,
    ) -> Result<String, StepError> {
        info!(url = %url, method = %method, "Simulated API call");
        Ok(format!("simulated: {method} {url}"))
    }

    async fn request_manual_action(
        &self,
        instructions: &str,
        assignee: Option<&str>,
    ) -> Result<String, StepError> {
        info!(instructions = %instructions, assignee = ?assignee, "Simulated manual action request");
        Ok("simulated: manual action requested".to_string())
    }

    async fn request_approval(&self, approvers: &[String]) -> Result<String, StepError> {
        info!(approvers = ?approvers, "Simulated approval request");
        Ok("simulated: approved".to_string())
    }
}

/// Executes runbooks against incidents.
pub struct RunbookExecutor {
    runbooks: HashMap<String, AutomatedRunbook>,
    collaborators: Arc<dyn RunbookCollaborators>,
}

impl RunbookExecutor {
    /// Creates an executor over the configured runbooks.
    #[must_use]
    pub fn new(runbooks: Vec<AutomatedRunbook>, collaborators: Arc<dyn RunbookCollaborators>) -> Self {
        let runbooks = runbooks.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self { runbooks, collaborators }
    }

    /// Gets a runbook definition by id.
    #[must_use]
    pub fn get(&self, runbook_id: &str) -> Option<&AutomatedRunbook> {
        self.runbooks.get(runbook_id)
    }

    /// Enabled runbooks whose trigger matches the given tags/services.
    #[must_use]
    pub fn matching(&self, tags: &[String], services: &[String]) -> Vec<&AutomatedRunbook> {
        self.runbooks
            .values()
            .filter(|r| r.enabled && r.trigger.matches(tags, services))
            .collect()
    }

    /// Executes a runbook's ordered steps.
    ///
    /// On a step failure with `continue_on_failure` the error is recorded
    /// and execution proceeds. Otherwise remaining steps are aborted and,
    /// when the failing step has `rollback_on_failure`, every rollback step
    /// runs in order best-effort: rollback failures are logged and recorded
    /// but never re-abort the unwind.
    ///
    /// # Errors
    ///
    /// Returns [`RunbookError::NotFound`] or [`RunbookError::Disabled`];
    /// step failures are reported inside the [`ExecutionResult`], not as
    /// errors.
    pub async fn execute(
        &self,
        runbook_id: &str,
        incident_id: &str,
        executed_by: &str,
        params: &serde_json::Value,
    ) -> Result<ExecutionResult, RunbookError> {
        let runbook = self
            .runbooks
            .get(runbook_id)
            .ok_or_else(|| RunbookError::NotFound(runbook_id.to_string()))?;
        if !runbook.enabled {
            return Err(RunbookError::Disabled(runbook_id.to_string()));
        }

        info!(
            runbook_id = %runbook_id,
            incident_id = %incident_id,
            executed_by = %executed_by,
            steps = runbook.steps.len(),
            "Executing runbook"
        );

        let started_at = Utc::now();
        let mut step_results = Vec::new();
        let mut rollback_results = Vec::new();
        let mut errors = Vec::new();
        let mut success = true;
        let mut rolled_back = false;

        for step in &runbook.steps {
            let result = self.run_step(step, params).await;

            if result.success {
                step_results.push(result);
                continue;
            }

            let error = result.error.clone().unwrap_or_else(|| "step failed".to_string());
            errors.push(format!("{}: {error}", step.id));
            let abort = !step.continue_on_failure;
            let rollback = abort && step.rollback_on_failure;
            step_results.push(result);

            if !abort {
                warn!(
                    runbook_id = %runbook_id,
                    step_id = %step.id,
                    error = %error,
                    "Step failed, continuing per continue_on_failure"
                );
                continue;
            }

            success = false;
            warn!(
                runbook_id = %runbook_id,
                step_id = %step.id,
                error = %error,
                rollback = rollback,
                "Step failed, aborting remaining steps"
            );

            if rollback {
                rolled_back = true;
                for rollback_step in &runbook.rollback_steps {
                    let result = self.run_step(rollback_step, params).await;
                    if !result.success {
                        let error =
                            result.error.clone().unwrap_or_else(|| "rollback step failed".into());
                        warn!(
                            runbook_id = %runbook_id,
                            step_id = %rollback_step.id,
                            error = %error,
                            "Rollback step failed, continuing unwind"
                        );
                        errors.push(format!("rollback {}: {error}", rollback_step.id));
                    }
                    rollback_results.push(result);
                }
            }
            break;
        }

        let result = ExecutionResult {
            runbook_id: runbook_id.to_string(),
            incident_id: incident_id.to_string(),
            executed_by: executed_by.to_string(),
            success,
            rolled_back,
            step_results,
            rollback_results,
            errors,
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            runbook_id = %runbook_id,
            incident_id = %incident_id,
            success = result.success,
            rolled_back = result.rolled_back,
            errors = result.errors.len(),
            "Runbook execution finished"
        );

        Ok(result)
    }

    /// Runs only a runbook's rollback sequence, best effort.
    ///
    /// Used when a rollback is requested directly (operator command or an
    /// escalation action) rather than by a failing forward step. Rollback
    /// step failures are recorded and never stop the unwind; the result is
    /// successful when every rollback step succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`RunbookError::NotFound`] or [`RunbookError::Disabled`].
    pub async fn execute_rollback(
        &self,
        runbook_id: &str,
        incident_id: &str,
        executed_by: &str,
        params: &serde_json::Value,
    ) -> Result<ExecutionResult, RunbookError> {
        let runbook = self
            .runbooks
            .get(runbook_id)
            .ok_or_else(|| RunbookError::NotFound(runbook_id.to_string()))?;
        if !runbook.enabled {
            return Err(RunbookError::Disabled(runbook_id.to_string()));
        }

        info!(
            runbook_id = %runbook_id,
            incident_id = %incident_id,
            executed_by = %executed_by,
            rollback_steps = runbook.rollback_steps.len(),
            "Executing rollback sequence"
        );

        let started_at = Utc::now();
        let mut rollback_results = Vec::new();
        let mut errors = Vec::new();

        for step in &runbook.rollback_steps {
            let result = self.run_step(step, params).await;
            if !result.success {
                let error = result.error.clone().unwrap_or_else(|| "rollback step failed".into());
                warn!(
                    runbook_id = %runbook_id,
                    step_id = %step.id,
                    error = %error,
                    "Rollback step failed, continuing unwind"
                );
                errors.push(format!("rollback {}: {error}", step.id));
            }
            rollback_results.push(result);
        }

        Ok(ExecutionResult {
            runbook_id: runbook_id.to_string(),
            incident_id: incident_id.to_string(),
            executed_by: executed_by.to_string(),
            success: errors.is_empty(),
            rolled_back: true,
            step_results: Vec::new(),
            rollback_results,
            errors,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Runs one step with its timeout and retry budget.
    async fn run_step(&self, step: &RunbookStep, params: &serde_json::Value) -> StepResult {
        let timeout = Duration::from_secs(step.timeout_seconds);
        let max_attempts = step.retries + 1;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let outcome = tokio::time::timeout(timeout, self.attempt_step(step, params)).await;

            match outcome {
                Ok(Ok(output)) => {
                    return StepResult {
                        step_id: step.id.clone(),
                        name: step.name.clone(),
                        kind: step.config.kind().to_string(),
                        success: true,
                        attempts: attempt,
                        output: Some(output),
                        error: None,
                    };
                }
                Ok(Err(e)) => {
                    warn!(step_id = %step.id, attempt, error = %e, "Step attempt failed");
                    last_error = Some(e.0);
                }
                Err(_) => {
                    warn!(
                        step_id = %step.id,
                        attempt,
                        timeout_seconds = step.timeout_seconds,
                        "Step attempt timed out"
                    );
                    last_error = Some(format!("timed out after {}s", step.timeout_seconds));
                }
            }
        }

        StepResult {
            step_id: step.id.clone(),
            name: step.name.clone(),
            kind: step.config.kind().to_string(),
            success: false,
            attempts: max_attempts,
            output: None,
            error: last_error,
        }
    }

    async fn attempt_step(
        &self,
        step: &RunbookStep,
        params: &serde_json::Value,
    ) -> Result<String, StepError> {
        match &step.config {
            StepConfig::Script { command, args } => {
                self.collaborators.execute_script(command, args, params).await
            }
            StepConfig::ApiCall { url, method } => {
                self.collaborators.make_api_call(url, method, params).await
            }
            StepConfig::Manual { instructions, assignee } => {
                self.collaborators.request_manual_action(instructions, assignee.as_deref()).await
            }
            StepConfig::Approval { approvers } => {
                self.collaborators.request_approval(approvers).await
            }
            StepConfig::Wait { seconds } => {
                tokio::time::sleep(Duration::from_secs(*seconds)).await;
                Ok(format!("waited {seconds}s"))
            }
        }
    }
}
