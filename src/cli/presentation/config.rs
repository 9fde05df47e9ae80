//! Config command presentation: validation results and effective config.

use crate::config::{TaleforgeConfig, ValidationError};
use serde_json::json;

pub fn format_validation_text(errors: &[ValidationError]) -> String {
    if errors.is_empty() {
        return "Configuration is valid".to_string();
    }
    let mut output = format!("Configuration has {} problem(s):\n", errors.len());
    for error in errors {
        output.push_str(&format!("  - {}\n", error));
    }
    output
}

pub fn format_validation_json(errors: &[ValidationError]) -> String {
    let out = json!({
        "valid": errors.is_empty(),
        "errors": errors.iter().map(|e| e.to_string()).collect::<Vec<_>>(),
    });
    serde_json::to_string_pretty(&out).unwrap_or_else(|_| "{}".to_string())
}

/// Effective configuration as TOML with the API key masked
pub fn format_config_toml(config: &TaleforgeConfig) -> String {
    let mut redacted = config.clone();
    if redacted.provider.api_key.is_some() {
        redacted.provider.api_key = Some("********".to_string());
    }
    toml::to_string_pretty(&redacted).unwrap_or_else(|e| format!("# failed to render: {}", e))
}
