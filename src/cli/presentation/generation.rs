//! Generate and status command presentation.

use crate::pipeline::Generated;
use crate::status::{Stage, StatusReport};
use serde_json::json;

pub fn format_generated_text(generated: &Generated) -> String {
    let mut output = format!("Kind: {}\n", generated.kind);
    output.push_str(&format!("Recovery tier: {}\n", generated.tier));
    if generated.truncated {
        output.push_str("Provider output was truncated at its token limit\n");
    }
    if generated.degraded {
        output.push_str("Built from request parameters (provider output unusable)\n");
    }
    output.push('\n');
    output.push_str(&serde_json::to_string_pretty(&generated.data).unwrap_or_else(|_| "null".to_string()));
    output
}

pub fn format_generated_json(generated: &Generated) -> String {
    serde_json::to_string_pretty(generated).unwrap_or_else(|_| "{}".to_string())
}

pub fn format_status_report_text(stage: Stage, report: &StatusReport) -> String {
    let bar_width = 20usize;
    let filled = usize::from(report.progress_percent) * bar_width / 100;
    let bar = format!("[{}{}]", "#".repeat(filled), "-".repeat(bar_width - filled));
    format!(
        "Stage: {}\n{} {:>3}%\n{}\nEstimated time remaining: {}s",
        stage, bar, report.progress_percent, report.message, report.estimated_seconds
    )
}

/// JSON shape shared by the status command and pipeline status
pub fn status_report_json(stage: Stage, report: &StatusReport) -> serde_json::Value {
    json!({
        "stage": stage,
        "message": report.message,
        "estimatedSeconds": report.estimated_seconds,
        "progressPercent": report.progress_percent,
    })
}
