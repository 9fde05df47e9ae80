//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::PipelineError;

/// Map route errors to a string for CLI output. Pipeline errors carry their
/// user-facing message alongside the detail.
pub fn map_error(e: &anyhow::Error) -> String {
    match e.downcast_ref::<PipelineError>() {
        Some(PipelineError::ConfigError(msg)) => format!("Configuration error: {}", msg),
        Some(pipeline) => format!(
            "{} ({}, status {})",
            pipeline.user_message(),
            pipeline,
            pipeline.http_status()
        ),
        None => format!("{:#}", e),
    }
}

/// Process exit code for a failed command
pub fn exit_code(e: &anyhow::Error) -> i32 {
    match e.downcast_ref::<PipelineError>() {
        Some(PipelineError::ConfigError(_)) => 2,
        _ => 1,
    }
}
