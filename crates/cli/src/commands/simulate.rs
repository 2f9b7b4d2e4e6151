use std::collections::HashMap;

use clap::Subcommand;
use vigil_core::{
    alerts::{AlertSeverity, SignalOutcome},
    config::EngineConfig,
    runtime::EngineRuntime,
};

use super::utils::{print_error, print_info, print_success, CliError, CliResult};

#[derive(Subcommand)]
pub enum SimulateCommands {
    /// Feed metric samples through the engine and report what fires
    Metric {
        /// Path to config file (defaults to config/config.toml)
        #[arg(short, long, default_value = "config/config.toml")]
        file: String,

        /// Metric name
        #[arg(short, long)]
        name: String,

        /// Sample value
        #[arg(short, long)]
        value: f64,

        /// Unit label attached to each sample
        #[arg(short, long, default_value = "count")]
        unit: String,

        /// Number of samples to record
        #[arg(short, long, default_value = "1")]
        count: usize,

        /// Dimension in key=value form (can be specified multiple times)
        #[arg(short, long)]
        dimension: Vec<String>,
    },

    /// Ingest a discrete event signal and report what fires
    Event {
        /// Path to config file (defaults to config/config.toml)
        #[arg(short, long, default_value = "config/config.toml")]
        file: String,

        /// Event source identifier
        #[arg(short, long)]
        source: String,

        /// Severity (info, warning, error, critical)
        #[arg(long, default_value = "warning")]
        severity: String,

        /// Event message
        #[arg(short, long)]
        message: String,

        /// Tag (can be specified multiple times)
        #[arg(short, long)]
        tag: Vec<String>,
    },
}

pub async fn handle_simulate_command(command: SimulateCommands) -> CliResult<()> {
    match command {
        SimulateCommands::Metric { file, name, value, unit, count, dimension } => {
            simulate_metric(&file, &name, value, &unit, count, &dimension).await
        }
        SimulateCommands::Event { file, source, severity, message, tag } => {
            simulate_event(&file, &source, &severity, &message, tag).await
        }
    }
}

async fn build_runtime(file: &str) -> CliResult<EngineRuntime> {
    let config = EngineConfig::from_file(file).map_err(|e| CliError::Config(e.to_string()))?;
    EngineRuntime::builder()
        .with_config(config)
        .disable_stale_sweep()
        .build()
        .map_err(|e| CliError::Config(e.to_string()))
}

async fn simulate_metric(
    file: &str,
    name: &str,
    value: f64,
    unit: &str,
    count: usize,
    dimensions: &[String],
) -> CliResult<()> {
    let dimensions = parse_dimensions(dimensions)?;
    let runtime = build_runtime(file).await?;

    print_info(&format!("Recording {count} sample(s) of {name} = {value}"));

    let mut created = Vec::new();
    let mut suppressed = 0;
    for _ in 0..count {
        let outcomes = runtime
            .record_metric(name, value, unit, Vec::new(), dimensions.clone())
            .await;
        for outcome in outcomes {
            match outcome {
                SignalOutcome::Created(alert) => created.push(alert),
                SignalOutcome::Suppressed(_) => suppressed += 1,
            }
        }
    }

    report_outcome(&runtime, created.len());
    if suppressed > 0 {
        print_info(&format!("{suppressed} firing(s) suppressed by throttle"));
    }

    for alert in &created {
        println!(
            "  {} [{:?}] rule={} message={}",
            alert.id, alert.severity, alert.rule_id, alert.message
        );
    }

    runtime.shutdown().await;
    Ok(())
}

async fn simulate_event(
    file: &str,
    source: &str,
    severity: &str,
    message: &str,
    tags: Vec<String>,
) -> CliResult<()> {
    let severity = parse_severity(severity)?;
    let runtime = build_runtime(file).await?;

    let alert = runtime.intake().ingest_event(source, severity, message, tags).await;

    report_outcome(&runtime, 1);
    println!("  {} [{:?}] source={} message={}", alert.id, alert.severity, source, alert.message);

    runtime.shutdown().await;
    Ok(())
}

fn report_outcome(runtime: &EngineRuntime, alerts_created: usize) {
    if alerts_created == 0 {
        print_info("No alerts fired (conditions unmet or throttled)");
    } else {
        print_success(&format!("{alerts_created} alert(s) created"));
    }

    let open = runtime.incident_manager().open_incidents();
    if !open.is_empty() {
        print_info(&format!("{} incident(s) opened:", open.len()));
        for incident in &open {
            println!("  {} [{:?}] {}", incident.id, incident.severity, incident.title);
        }
    }
}

fn parse_dimensions(raw: &[String]) -> CliResult<HashMap<String, String>> {
    let mut dimensions = HashMap::new();
    for entry in raw {
        let (key, value) = entry.split_once('=').ok_or_else(|| {
            CliError::General(format!("Dimension must be key=value, got: {entry}"))
        })?;
        dimensions.insert(key.to_string(), value.to_string());
    }
    Ok(dimensions)
}

fn parse_severity(raw: &str) -> CliResult<AlertSeverity> {
    match raw.to_lowercase().as_str() {
        "info" => Ok(AlertSeverity::Info),
        "warning" => Ok(AlertSeverity::Warning),
        "error" => Ok(AlertSeverity::Error),
        "critical" => Ok(AlertSeverity::Critical),
        other => {
            print_error(&format!("Unknown severity: {other}"));
            Err(CliError::General(
                "Severity must be one of: info, warning, error, critical".to_string(),
            ))
        }
    }
}
