//! Configuration System
//!
//! Layered configuration for the generation pipeline: built-in defaults, the
//! global config file, an explicit file, then `TALEFORGE__*` environment
//! overrides. Everything is validated before the pipeline is built.

use crate::error::PipelineError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use crate::provider::ProviderConfig;
pub use crate::queue::QueueConfig;

mod merge;
mod sources;

pub use sources::environment::{API_KEY_VAR, ENV_PREFIX};
pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaleforgeConfig {
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub status: StatusConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_average_job_seconds() -> u32 {
    20
}

/// Status estimate tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Typical wall-clock time for one generation
    #[serde(default = "default_average_job_seconds")]
    pub average_job_seconds: u32,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            average_job_seconds: default_average_job_seconds(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Provider(String),
    Queue(String),
    Status(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Provider(msg) => write!(f, "Provider: {}", msg),
            ValidationError::Queue(msg) => write!(f, "Queue: {}", msg),
            ValidationError::Status(msg) => write!(f, "Status: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl TaleforgeConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.provider.validate() {
            errors.push(ValidationError::Provider(e));
        }
        if let Err(e) = self.queue.validate() {
            errors.push(ValidationError::Queue(e));
        }
        if self.status.average_job_seconds == 0 {
            errors.push(ValidationError::Status(
                "average_job_seconds must be greater than zero".to_string(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Loads [`TaleforgeConfig`] from layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from defaults, the global file, `explicit` (if given) and the environment.
    pub fn load(explicit: Option<&Path>) -> Result<TaleforgeConfig, PipelineError> {
        let mut builder = merge::merge_policy::builder_with_defaults()?;
        builder = sources::global_file::add_to_builder(builder)?;
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(PipelineError::ConfigError(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = sources::environment::add_to_builder(builder)?;

        let config: TaleforgeConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Load a single TOML file with no other sources applied.
    pub fn load_from_file(path: &Path) -> Result<TaleforgeConfig, PipelineError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&contents).map_err(|e| {
            PipelineError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Load then validate, joining every problem into one error
    pub fn load_validated(explicit: Option<&Path>) -> Result<TaleforgeConfig, PipelineError> {
        let config = Self::load(explicit)?;
        config.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            PipelineError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(config)
    }

    pub fn global_path() -> Option<PathBuf> {
        global_config_path()
    }
}
