//! Error types for the Taleforge generation pipeline.

use crate::recovery::RecoveryAttempt;
use std::time::Duration;
use thiserror::Error;

/// Outcome classes of a single provider call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Provider rate limit exceeded: {body}")]
    RateLimited { body: String },

    #[error("Provider request timed out after {}s", .after.as_secs())]
    Timeout { after: Duration },

    #[error("Provider returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Provider transport error: {0}")]
    Transport(String),

    #[error("Provider response could not be read: {0}")]
    InvalidResponse(String),
}

/// Every recovery tier, fallback synthesis included, failed.
#[derive(Debug, Clone, Error)]
#[error("Could not recover a structured object from provider output (tiers tried: {})", tiers_tried(.attempts))]
pub struct RecoveryError {
    pub attempts: Vec<RecoveryAttempt>,
    /// Leading slice of the raw text, for diagnostics
    pub preview: String,
}

fn tiers_tried(attempts: &[RecoveryAttempt]) -> String {
    attempts
        .iter()
        .map(|a| a.tier.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Admission and lifecycle errors raised by the dispatcher itself
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Generation queue is full ({depth} jobs waiting)")]
    QueueFull { depth: usize },

    #[error("Generation queue is shut down")]
    Closed,

    #[error("Generation job aborted: {0}")]
    Aborted(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// The distinguishable outcome classes outer layers present to users
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    RateLimited,
    Timeout,
    Busy,
    Recovery,
    Failed,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Provider(ProviderError::RateLimited { .. }) => ErrorKind::RateLimited,
            PipelineError::Provider(ProviderError::Timeout { .. }) => ErrorKind::Timeout,
            PipelineError::Provider(_) => ErrorKind::Failed,
            PipelineError::Recovery(_) => ErrorKind::Recovery,
            PipelineError::Dispatch(DispatchError::Aborted(_)) => ErrorKind::Failed,
            PipelineError::Dispatch(_) => ErrorKind::Busy,
            PipelineError::ConfigError(_) => ErrorKind::Failed,
        }
    }

    /// Status code for the outer HTTP boundary
    pub fn http_status(&self) -> u16 {
        match self {
            PipelineError::Provider(ProviderError::RateLimited { .. }) => 429,
            PipelineError::Provider(ProviderError::Timeout { .. }) => 408,
            PipelineError::Provider(_) => 502,
            PipelineError::Recovery(_) => 500,
            PipelineError::Dispatch(DispatchError::Aborted(_)) => 500,
            PipelineError::Dispatch(_) => 503,
            PipelineError::ConfigError(_) => 500,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::RateLimited => "The generation service is busy. Please try again in a moment.",
            ErrorKind::Timeout => "The request timed out. Try a simpler prompt.",
            ErrorKind::Busy => "Too many generations are waiting. Please try again shortly.",
            ErrorKind::Recovery => {
                "The generated content came back malformed. Please try generating again."
            }
            ErrorKind::Failed => "Generation failed. Please try again.",
        }
    }
}

impl From<config::ConfigError> for PipelineError {
    fn from(err: config::ConfigError) -> Self {
        PipelineError::ConfigError(err.to_string())
    }
}

/// Errors from the caller-side service that wraps the pipeline
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("User {0} does not have enough tokens")]
    InsufficientTokens(String),

    #[error("Token ledger error: {0}")]
    Ledger(String),

    #[error("Content store error: {0}")]
    Store(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}
