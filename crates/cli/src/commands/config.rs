use clap::Subcommand;
use std::path::Path;
use vigil_core::config::EngineConfig;

use super::utils::{print_error, print_info, print_success, CliError, CliResult};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate the current configuration
    Validate {
        /// Path to config file (defaults to config/config.toml)
        #[arg(short, long, default_value = "config/config.toml")]
        file: String,
    },

    /// Show current configuration
    Show {
        /// Path to config file (defaults to config/config.toml)
        #[arg(short, long, default_value = "config/config.toml")]
        file: String,

        /// Show sensitive values (webhook URLs, integration keys)
        #[arg(long)]
        show_sensitive: bool,
    },

    /// Generate a sample configuration file
    Generate {
        /// Output path for the config file
        #[arg(short, long, default_value = "config/config.toml")]
        output: String,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn handle_config_command(command: ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Validate { file } => validate_config(&file),
        ConfigCommands::Show { file, show_sensitive } => show_config(&file, show_sensitive),
        ConfigCommands::Generate { output, force } => generate_config(&output, force),
    }
}

fn validate_config(file: &str) -> CliResult<()> {
    if !Path::new(file).exists() {
        print_error(&format!("Configuration file not found: {file}"));
        return Err(CliError::Config(format!("File not found: {file}")));
    }

    print_info(&format!("Loading configuration from {file}..."));

    let config = EngineConfig::from_file(file).map_err(|e| CliError::Config(e.to_string()))?;

    print_info("Validating configuration...");
    config.validate().map_err(CliError::Config)?;

    print_success("Configuration is valid!");

    println!("Configuration Summary:");
    println!("  Rules: {}", config.rules.len());
    println!("  Policies: {}", config.policies.len());
    println!("  Channels: {}", config.channels.len());
    println!("  Runbooks: {}", config.runbooks.len());
    println!("  Sweep interval: {}s", config.engine.sweep_interval_seconds);
    println!("  Stale after: {} minutes", config.engine.stale_after_minutes);

    Ok(())
}

fn show_config(file: &str, show_sensitive: bool) -> CliResult<()> {
    let config = EngineConfig::from_file(file).map_err(|e| CliError::Config(e.to_string()))?;

    println!("Configuration from {file}:");

    println!("\n[Engine]");
    println!("  Sweep Interval: {}s", config.engine.sweep_interval_seconds);
    println!("  Stale After: {} minutes", config.engine.stale_after_minutes);
    println!("  Notify Channels: {}", config.engine.notify_channels.join(", "));

    println!("\n[Channels] ({} configured)", config.channels.len());
    for channel in &config.channels {
        let target = if show_sensitive {
            serde_json::to_string(&channel.target).unwrap_or_else(|_| "<unprintable>".into())
        } else {
            format!("{} [target hidden - use --show-sensitive]", channel.target.kind().as_str())
        };
        println!(
            "  {}: {} (enabled: {}, max/hour: {})",
            channel.id,
            target,
            channel.enabled,
            channel.max_per_hour
        );
    }

    println!("\n[Rules] ({} configured)", config.rules.len());
    for rule in &config.rules {
        println!(
            "  {}: {} [{:?}] {} condition(s), throttle {}/{}m",
            rule.id,
            rule.name,
            rule.severity,
            rule.conditions.len(),
            rule.throttle.max_alerts,
            rule.throttle.period_minutes
        );
    }

    println!("\n[Policies] ({} configured)", config.policies.len());
    for policy in &config.policies {
        println!("  {}: {} ({} levels)", policy.id, policy.name, policy.levels.len());
    }

    println!("\n[Runbooks] ({} configured)", config.runbooks.len());
    for runbook in &config.runbooks {
        println!(
            "  {}: {} ({} steps, {} rollback steps)",
            runbook.id,
            runbook.name,
            runbook.steps.len(),
            runbook.rollback_steps.len()
        );
    }

    println!("\n[Logging]");
    println!("  Level: {}", config.logging.level);
    println!("  Format: {}", config.logging.format);

    Ok(())
}

fn generate_config(output: &str, force: bool) -> CliResult<()> {
    if Path::new(output).exists() && !force {
        return Err(CliError::Config(format!(
            "File {output} already exists. Use --force to overwrite."
        )));
    }

    std::fs::write(output, SAMPLE_CONFIG)?;

    print_success(&format!("Sample configuration generated: {output}"));
    print_info("Remember to:");
    print_info("  1. Replace webhook URLs and integration keys with real values");
    print_info("  2. Tune rule thresholds and throttle windows for your workload");
    print_info("  3. Point escalation levels at your real on-call channels");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# Vigil Alert & Incident Response Engine Configuration
# This is a sample configuration file with sensible defaults

[engine]
sweep_interval_seconds = 60
stale_after_minutes = 30
notify_channels = ["slack-alerts"]

[logging]
level = "info"
format = "pretty"

[[channels]]
id = "slack-alerts"
[channels.target]
type = "slack"
webhook_url = "https://hooks.slack.com/services/YOUR/WEBHOOK/URL"

[[channels]]
id = "pagerduty-oncall"
max_per_hour = 20
[channels.target]
type = "pagerduty"
integration_key = "YOUR_INTEGRATION_KEY"

[[rules]]
id = "high-error-rate"
name = "High error rate"
enabled = true
severity = "error"
category = "availability"
tags = ["backend"]
throttle = { period_minutes = 15, max_alerts = 2 }

[[rules.conditions]]
metric = "error_rate"
op = "gt"
threshold = 5.0
window_minutes = 5
aggregation = "avg"

[[rules]]
id = "slow-responses"
name = "Slow responses"
enabled = true
severity = "warning"
category = "latency"
throttle = { period_minutes = 30, max_alerts = 1 }

[[rules.conditions]]
metric = "latency_ms"
op = "gte"
threshold = 500.0
window_minutes = 10
aggregation = "p95"

[[policies]]
id = "standard"
name = "Standard escalation"

[policies.conditions]
severities = ["error", "critical"]

[[policies.levels]]
delay_minutes = 0
channels = ["slack-alerts"]

[[policies.levels]]
delay_minutes = 5
channels = ["pagerduty-oncall"]
responders = ["oncall-secondary"]

[[policies.levels.actions]]
type = "create_incident"

[[runbooks]]
id = "restart-api"
name = "Restart API"

[runbooks.trigger]
tags = ["backend"]

[[runbooks.steps]]
id = "restart"
name = "Restart service"
[runbooks.steps.config]
type = "script"
command = "systemctl restart api"

[[runbooks.rollback_steps]]
id = "page-oncall"
name = "Page on-call"
[runbooks.rollback_steps.config]
type = "manual"
instructions = "Restart failed; investigate the API host manually"
"#;
