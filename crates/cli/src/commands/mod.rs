pub mod config;
pub mod simulate;
pub mod utils;

pub use config::{handle_config_command, ConfigCommands};
pub use simulate::{handle_simulate_command, SimulateCommands};
