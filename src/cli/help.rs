//! CLI help and command-name contract for logging and routing.

use crate::cli::parse::{Commands, ConfigCommands};

/// Command name string for log fields (e.g. "recover", "config.validate").
pub fn command_name(command: &Commands) -> String {
    match command {
        Commands::Recover { .. } => "recover".to_string(),
        Commands::Status { .. } => "status".to_string(),
        Commands::Generate { .. } => "generate".to_string(),
        Commands::Config { command } => format!("config.{}", config_command_name(command)),
    }
}

pub fn config_command_name(command: &ConfigCommands) -> &'static str {
    match command {
        ConfigCommands::Validate { .. } => "validate",
        ConfigCommands::Show => "show",
    }
}
