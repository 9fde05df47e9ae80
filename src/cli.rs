//! CLI domain: parse, route, help, output, and presentation only.
//! No domain orchestration; single route table dispatches to domain services.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::command_name;
pub use output::{exit_code, map_error};
pub use parse::{Cli, Commands, ConfigCommands};
pub use presentation::{
    format_config_toml, format_generated_json, format_generated_text, format_recovered_json,
    format_recovered_text, format_status_report_text, format_validation_json,
    format_validation_text,
};
pub use route::RunContext;
