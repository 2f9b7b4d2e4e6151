//! Reusable test doubles and fixture builders.
//!
//! Integration tests build a full `EngineRuntime` from a programmatic
//! `EngineConfig`, inject a [`RecordingNotifier`] in place of real delivery
//! transports, and [`ScriptedCollaborators`] in place of real runbook step
//! execution. Both record everything they were asked to do so tests assert
//! on observable behavior rather than internals.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use vigil_core::{
    alerts::{AlertCondition, AlertRule, AlertSeverity, ComparisonOp, ThrottlePolicy},
    config::EngineConfig,
    escalation::{EscalationLevel, EscalationPolicy, PolicyConditions},
    metrics::Aggregation,
    notify::{ChannelConfig, ChannelTarget, Notifier, NotifyError, RenderedMessage},
    runbooks::{
        AutomatedRunbook, RunbookCollaborators, RunbookStep, RunbookTrigger, StepConfig, StepError,
    },
    runtime::EngineRuntime,
};

/// Notifier double that records every delivery as `(channel_id, event_type)`.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// All deliveries in order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }

    /// Event types delivered to a specific channel, in order.
    pub fn sent_to(&self, channel_id: &str) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(id, _)| id == channel_id)
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// Number of deliveries of a given event type across all channels.
    pub fn count_of(&self, event_type: &str) -> usize {
        self.sent.lock().iter().filter(|(_, event)| event == event_type).count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(
        &self,
        message: &RenderedMessage,
        channel: &ChannelConfig,
    ) -> Result<(), NotifyError> {
        self.sent.lock().push((channel.id.clone(), message.event_type.clone()));
        Ok(())
    }
}

/// Runbook collaborator double: records script commands in call order and
/// fails the ones it was scripted to fail.
pub struct ScriptedCollaborators {
    failing_commands: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedCollaborators {
    pub fn new(failing_commands: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            failing_commands: failing_commands.iter().map(ToString::to_string).collect(),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Script commands in the order they were attempted.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl RunbookCollaborators for ScriptedCollaborators {
    async fn execute_script(
        &self,
        command: &str,
        _args: &[String],
        _params: &serde_json::Value,
    ) -> Result<String, StepError> {
        self.calls.lock().push(command.to_string());
        if self.failing_commands.iter().any(|c| c == command) {
            Err(StepError(format!("{command} exited 1")))
        } else {
            Ok("ok".to_string())
        }
    }

    async fn make_api_call(
        &self,
        url: &str,
        _method: &str,
        _params: &serde_json::Value,
    ) -> Result<String, StepError> {
        self.calls.lock().push(url.to_string());
        Ok("200".to_string())
    }

    async fn request_manual_action(
        &self,
        _instructions: &str,
        _assignee: Option<&str>,
    ) -> Result<String, StepError> {
        Ok("requested".to_string())
    }

    async fn request_approval(&self, _approvers: &[String]) -> Result<String, StepError> {
        Ok("approved".to_string())
    }
}

/// A webhook channel with default limits.
pub fn channel(id: &str) -> ChannelConfig {
    ChannelConfig {
        id: id.to_string(),
        enabled: true,
        target: ChannelTarget::Webhook { url: "https://example.test/hook".into() },
        max_per_hour: 100,
        cooldown_seconds: 0,
    }
}

/// A rule firing when the 5-minute average of `error_rate` exceeds 5,
/// tagged `backend`.
pub fn error_rate_rule(severity: AlertSeverity, max_alerts: u32) -> AlertRule {
    AlertRule {
        id: "high-error-rate".into(),
        name: "High error rate".into(),
        enabled: true,
        severity,
        category: "availability".into(),
        conditions: vec![AlertCondition {
            metric: "error_rate".into(),
            op: ComparisonOp::Gt,
            threshold: 5.0,
            window_minutes: 5,
            aggregation: Aggregation::Avg,
        }],
        throttle: ThrottlePolicy { period_minutes: 15, max_alerts },
        tags: vec!["backend".into()],
        owner: None,
    }
}

/// An escalation level without responders or actions.
pub fn level(delay_minutes: u32, channel_id: &str) -> EscalationLevel {
    EscalationLevel {
        delay_minutes,
        channels: vec![channel_id.to_string()],
        responders: vec![],
        actions: vec![],
        timeout_minutes: None,
    }
}

/// A policy matching everything, with the given levels.
pub fn policy(id: &str, levels: Vec<EscalationLevel>) -> EscalationPolicy {
    EscalationPolicy {
        id: id.to_string(),
        name: id.to_string(),
        conditions: PolicyConditions::default(),
        levels,
    }
}

/// A script step with a short timeout and no retries.
pub fn script_step(id: &str, command: &str) -> RunbookStep {
    RunbookStep {
        id: id.to_string(),
        name: format!("step {id}"),
        config: StepConfig::Script { command: command.to_string(), args: vec![] },
        timeout_seconds: 5,
        retries: 0,
        continue_on_failure: false,
        rollback_on_failure: false,
    }
}

/// A runbook triggered by the `backend` tag.
pub fn backend_runbook(
    id: &str,
    steps: Vec<RunbookStep>,
    rollback_steps: Vec<RunbookStep>,
) -> AutomatedRunbook {
    AutomatedRunbook {
        id: id.to_string(),
        name: format!("runbook {id}"),
        description: String::new(),
        enabled: true,
        trigger: RunbookTrigger { tags: vec!["backend".into()], services: vec![] },
        steps,
        rollback_steps,
    }
}

/// A config with two channels (`slack-alerts`, `pagerduty-oncall`) and
/// lifecycle notifications going to slack.
pub fn engine_config(
    rules: Vec<AlertRule>,
    policies: Vec<EscalationPolicy>,
    runbooks: Vec<AutomatedRunbook>,
) -> EngineConfig {
    let mut config = EngineConfig {
        rules,
        policies,
        runbooks,
        channels: vec![channel("slack-alerts"), channel("pagerduty-oncall")],
        ..Default::default()
    };
    config.engine.notify_channels = vec!["slack-alerts".into()];
    config
}

/// Builds a runtime over the config with recording doubles injected and the
/// background sweep disabled (tests drive time explicitly).
pub fn build_runtime(
    config: EngineConfig,
    notifier: Arc<RecordingNotifier>,
    collaborators: Arc<ScriptedCollaborators>,
) -> EngineRuntime {
    EngineRuntime::builder()
        .with_config(config)
        .with_notifier(notifier)
        .with_collaborators(collaborators)
        .disable_stale_sweep()
        .build()
        .expect("test config must build")
}
