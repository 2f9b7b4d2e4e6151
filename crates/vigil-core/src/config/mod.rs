//! Engine configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: Hardcoded in struct `Default` implementations
//! 2. **Config file**: TOML file specified by `VIGIL_CONFIG` env var
//! 3. **Environment variables**: `VIGIL__*` env vars override specific fields
//!
//! # Configuration Sections
//!
//! - `[engine]`: sweep interval, stale-incident age, default channels
//! - `[logging]`: log level and format
//! - `[[rules]]`: alert rules evaluated by the signal intake
//! - `[[policies]]`: escalation policies, first match wins
//! - `[[channels]]`: notification channels, tagged by type
//! - `[[runbooks]]`: automated runbooks with rollback sequences
//!
//! # Validation
//!
//! Configuration is validated at load time. Invalid configurations (empty
//! escalation levels, unknown channel references, nonpositive windows)
//! return errors rather than failing silently later. Definitions are
//! read-only once the engine is built.
//!
//! # Example
//!
//! ```toml
//! [engine]
//! sweep_interval_seconds = 60
//! stale_after_minutes = 30
//! notify_channels = ["slack-alerts"]
//!
//! [[channels]]
//! id = "slack-alerts"
//! [channels.target]
//! type = "slack"
//! webhook_url = "https://hooks.example/T123"
//!
//! [[rules]]
//! id = "high-error-rate"
//! name = "High error rate"
//! enabled = true
//! severity = "error"
//! category = "availability"
//! throttle = { period_minutes = 15, max_alerts = 2 }
//!
//! [[rules.conditions]]
//! metric = "error_rate"
//! op = "gt"
//! threshold = 5.0
//! window_minutes = 5
//! aggregation = "avg"
//! ```

use std::{collections::HashSet, path::Path};

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{
    alerts::AlertRule, escalation::EscalationPolicy, notify::ChannelConfig,
    runbooks::AutomatedRunbook,
};

/// Engine-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Interval of the stale-incident sweep task in seconds. Defaults to `60`.
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,

    /// Minutes without timeline activity before an open incident gets a
    /// stale reminder. Defaults to `30`.
    #[serde(default = "default_stale_after_minutes")]
    pub stale_after_minutes: i64,

    /// Channels receiving alert and incident lifecycle notifications
    /// (escalation levels name their own channels).
    #[serde(default)]
    pub notify_channels: Vec<String>,
}

fn default_sweep_interval_seconds() -> u64 {
    60
}

fn default_stale_after_minutes() -> i64 {
    30
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: default_sweep_interval_seconds(),
            stale_after_minutes: default_stale_after_minutes(),
            notify_channels: Vec::new(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter. Defaults to `info`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format, `pretty` or `json`. Defaults to `pretty`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), format: default_log_format() }
    }
}

/// Root configuration for the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine-level settings.
    #[serde(default)]
    pub engine: EngineSettings,

    /// Logging settings, consumed by the binary.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Alert rules.
    #[serde(default)]
    pub rules: Vec<AlertRule>,

    /// Escalation policies, evaluated in order.
    #[serde(default)]
    pub policies: Vec<EscalationPolicy>,

    /// Notification channels.
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,

    /// Automated runbooks.
    #[serde(default)]
    pub runbooks: Vec<AutomatedRunbook>,
}

impl EngineConfig {
    /// Loads configuration from the given TOML file with environment
    /// overrides. The prefix and nesting separator are both `__`:
    /// `VIGIL__LOGGING__LEVEL` overrides `logging.level`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, or
    /// deserialized.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config_builder = Config::builder()
            .set_default("engine.sweep_interval_seconds", 60)?
            .set_default("engine.stale_after_minutes", 30)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("VIGIL").separator("__"))
            .build()?;

        config_builder.try_deserialize()
    }

    /// Loads configuration from `config/config.toml` with fallback to
    /// defaults. The path can be overridden via the `VIGIL_CONFIG`
    /// environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration cannot be loaded or
    /// parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("VIGIL_CONFIG").unwrap_or_else(|_| "config/config.toml".to_string());
        Self::from_file(&config_path)
    }

    /// Validates the configuration for correctness and consistency.
    ///
    /// Checks include:
    /// - Unique rule, policy, channel, and runbook ids
    /// - Every channel reference resolves to a configured channel
    /// - Rules have at least one condition with a positive window
    /// - Policies have at least one level
    /// - Runbook steps carry positive timeouts
    ///
    /// # Errors
    ///
    /// Returns a descriptive message for the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.engine.sweep_interval_seconds == 0 {
            return Err("Sweep interval must be greater than 0".to_string());
        }
        if self.engine.stale_after_minutes <= 0 {
            return Err("Stale-after minutes must be greater than 0".to_string());
        }
        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err("Logging format must be 'json' or 'pretty'".to_string());
        }

        let channel_ids = unique_ids("channel", self.channels.iter().map(|c| c.id.as_str()))?;
        unique_ids("rule", self.rules.iter().map(|r| r.id.as_str()))?;
        unique_ids("policy", self.policies.iter().map(|p| p.id.as_str()))?;
        let runbook_ids = unique_ids("runbook", self.runbooks.iter().map(|r| r.id.as_str()))?;

        for channel in &self.engine.notify_channels {
            if !channel_ids.contains(channel.as_str()) {
                return Err(format!("Unknown notify channel: {channel}"));
            }
        }

        for rule in &self.rules {
            if rule.conditions.is_empty() {
                return Err(format!("Rule {} has no conditions", rule.id));
            }
            for condition in &rule.conditions {
                if condition.window_minutes == 0 {
                    return Err(format!(
                        "Rule {} has a nonpositive window for metric {}",
                        rule.id, condition.metric
                    ));
                }
            }
            if rule.throttle.period_minutes == 0 || rule.throttle.max_alerts == 0 {
                return Err(format!("Rule {} has a nonpositive throttle", rule.id));
            }
        }

        for policy in &self.policies {
            if policy.levels.is_empty() {
                return Err(format!("Policy {} has no levels", policy.id));
            }
            for (index, level) in policy.levels.iter().enumerate() {
                for channel in &level.channels {
                    if !channel_ids.contains(channel.as_str()) {
                        return Err(format!(
                            "Policy {} level {index} references unknown channel: {channel}",
                            policy.id
                        ));
                    }
                }
                for action in &level.actions {
                    if let Some(runbook_id) = action_runbook(action) {
                        if !runbook_ids.contains(runbook_id) {
                            return Err(format!(
                                "Policy {} level {index} references unknown runbook: {runbook_id}",
                                policy.id
                            ));
                        }
                    }
                }
            }
        }

        for runbook in &self.runbooks {
            if runbook.steps.is_empty() {
                return Err(format!("Runbook {} has no steps", runbook.id));
            }
            for step in runbook.steps.iter().chain(runbook.rollback_steps.iter()) {
                if step.timeout_seconds == 0 {
                    return Err(format!(
                        "Runbook {} step {} has a nonpositive timeout",
                        runbook.id, step.id
                    ));
                }
            }
        }

        Ok(())
    }
}

fn unique_ids<'a>(
    what: &str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<HashSet<&'a str>, String> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(format!("Duplicate {what} id: {id}"));
        }
    }
    Ok(seen)
}

fn action_runbook(action: &crate::escalation::EscalationAction) -> Option<&str> {
    use crate::escalation::EscalationAction;
    match action {
        EscalationAction::ExecuteRunbook { runbook_id }
        | EscalationAction::TriggerRollback { runbook_id } => Some(runbook_id),
        EscalationAction::CreateIncident | EscalationAction::ScaleService { .. } => None,
    }
}
