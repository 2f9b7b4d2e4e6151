use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
use commands::{handle_config_command, handle_simulate_command, ConfigCommands, SimulateCommands};

#[derive(Parser)]
#[command(name = "vigil-cli")]
#[command(about = "Vigil CLI - Management tool for the Vigil alert and incident response engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level filter (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration Management
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Run signals through the engine with simulated delivery
    #[command(subcommand)]
    Simulate(SimulateCommands),
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    match cli.command {
        Commands::Config(config_command) => {
            handle_config_command(config_command)?;
        }

        Commands::Simulate(simulate_command) => {
            handle_simulate_command(simulate_command).await?;
        }
    }

    Ok(())
}
