//! CLI presentation: text and json formatters per command family.

mod config;
mod generation;
mod recovery;

pub use config::{format_config_toml, format_validation_json, format_validation_text};
pub use generation::{
    format_generated_json, format_generated_text, format_status_report_text, status_report_json,
};
pub use recovery::{format_recovered_json, format_recovered_text};
