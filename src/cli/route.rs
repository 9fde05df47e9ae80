//! CLI route: single route table and run context. Dispatches to domain services and presentation.

use crate::config::{ConfigLoader, TaleforgeConfig};
use crate::content::ContentKind;
use crate::error::{PipelineError, ProviderError};
use crate::pipeline::{GenerationPipeline, GenerationRequest, Generated};
use crate::provider::{RawText, ScriptedProvider};
use crate::queue::QueueDispatcher;
use crate::recovery::{recover, RecoveryOptions};
use crate::status::{Stage, StatusReporter};
use anyhow::{anyhow, bail, Context};
use serde_json::{Map, Value};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::cli::parse::{Commands, ConfigCommands};
use crate::cli::presentation::{
    format_config_toml, format_generated_json, format_generated_text, format_recovered_json,
    format_recovered_text, format_status_report_text, format_validation_json,
    format_validation_text, status_report_json,
};
use crate::cli::command_name;

/// Runtime context for CLI execution: the loaded configuration and where it came from.
pub struct RunContext {
    config: TaleforgeConfig,
    config_path: Option<PathBuf>,
}

impl RunContext {
    /// Load layered configuration; `config_path` is applied over the global file.
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, PipelineError> {
        let config = ConfigLoader::load(config_path.as_deref())?;
        Ok(Self {
            config,
            config_path,
        })
    }

    pub fn with_config(config: TaleforgeConfig) -> Self {
        Self {
            config,
            config_path: None,
        }
    }

    pub fn config(&self) -> &TaleforgeConfig {
        &self.config
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> anyhow::Result<String> {
        let started = Instant::now();
        let name = command_name(command);
        debug!(command = %name, "Executing command");
        let result = self.execute_inner(command);
        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => info!(command = %name, duration_ms, "Command finished"),
            Err(e) => warn!(command = %name, duration_ms, error = %e, "Command failed"),
        }
        result
    }

    fn execute_inner(&self, command: &Commands) -> anyhow::Result<String> {
        match command {
            Commands::Recover {
                input,
                truncated,
                fallback,
                require,
                format,
            } => self.handle_recover(input, *truncated, fallback.as_deref(), require, format),
            Commands::Status {
                stage,
                position,
                format,
            } => self.handle_status(stage, *position, format),
            Commands::Generate {
                kind,
                prompt,
                user,
                params,
                replay,
                truncated,
                format,
            } => {
                let kind: ContentKind = kind.parse().map_err(|e: String| anyhow!(e))?;
                let mut request = GenerationRequest::new(kind, prompt.clone());
                request.parameters = parse_params(params)?;
                let generated = self.handle_generate(user, request, replay.as_deref(), *truncated)?;
                if format == "text" {
                    Ok(format_generated_text(&generated))
                } else {
                    Ok(format_generated_json(&generated))
                }
            }
            Commands::Config { command } => self.handle_config_command(command),
        }
    }

    fn handle_recover(
        &self,
        input: &str,
        truncated: bool,
        fallback: Option<&str>,
        require: &[String],
        format: &str,
    ) -> anyhow::Result<String> {
        let raw = read_input(input)?;
        let mut options = RecoveryOptions::truncated(truncated).require(require.iter());
        if let Some(fallback) = fallback {
            let defaults: Map<String, Value> = serde_json::from_str(fallback)
                .context("--fallback must be a JSON object")?;
            options = options.with_fallback(defaults);
        }

        let recovered = recover(&raw, &options).map_err(PipelineError::from)?;
        if format == "json" {
            Ok(format_recovered_json(&recovered))
        } else {
            Ok(format_recovered_text(&recovered))
        }
    }

    fn handle_status(
        &self,
        stage: &str,
        position: Option<usize>,
        format: &str,
    ) -> anyhow::Result<String> {
        let stage: Stage = stage.parse().map_err(|e: String| anyhow!(e))?;
        let reporter = StatusReporter::new(self.config.status.average_job_seconds);
        let report = reporter.report(stage, position);
        if format == "json" {
            serde_json::to_string_pretty(&status_report_json(stage, &report))
                .context("Failed to render status report")
        } else {
            Ok(format_status_report_text(stage, &report))
        }
    }

    fn handle_generate(
        &self,
        user: &str,
        request: GenerationRequest,
        replay: Option<&Path>,
        truncated: bool,
    ) -> anyhow::Result<Generated> {
        let pipeline = match replay {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read replay file {}", path.display()))?;
                let reply = RawText {
                    content,
                    finish_reason: Some(if truncated { "length" } else { "stop" }.to_string()),
                };
                info!(path = %path.display(), "Replaying stored provider reply");
                GenerationPipeline::new(
                    Arc::new(QueueDispatcher::new(self.config.queue.clone())),
                    Arc::new(ScriptedProvider::new([Ok::<_, ProviderError>(reply)])),
                    StatusReporter::new(self.config.status.average_job_seconds),
                )
            }
            None => {
                if let Err(errors) = self.config.validate() {
                    return Err(PipelineError::ConfigError(
                        format_validation_text(&errors).trim_end().to_string(),
                    )
                    .into());
                }
                GenerationPipeline::from_config(&self.config)?
            }
        };

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("Failed to start async runtime")?;

        let result: Result<Generated, PipelineError> = runtime.block_on(async {
            if let Err(e) = pipeline.start() {
                return Err(e.into());
            }
            let result = pipeline.generate(user, request).await;
            pipeline.shutdown().await;
            result
        });
        Ok(result?)
    }

    fn handle_config_command(&self, command: &ConfigCommands) -> anyhow::Result<String> {
        match command {
            ConfigCommands::Validate { format } => {
                let errors = self.config.validate().err().unwrap_or_default();
                let source = self
                    .config_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "defaults, global file and environment".to_string());
                debug!(source = %source, problems = errors.len(), "Validated configuration");
                let rendered = if format == "json" {
                    format_validation_json(&errors)
                } else {
                    format_validation_text(&errors)
                };
                if errors.is_empty() {
                    Ok(rendered)
                } else {
                    Err(PipelineError::ConfigError(rendered).into())
                }
            }
            ConfigCommands::Show => Ok(format_config_toml(&self.config)),
        }
    }
}

/// Read raw text from a file, or stdin when `input` is "-".
fn read_input(input: &str) -> anyhow::Result<String> {
    if input == "-" {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read stdin")?;
        return Ok(raw);
    }
    std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input))
}

/// Parse `key=value` pairs. Values that are valid JSON keep their type.
fn parse_params(params: &[String]) -> anyhow::Result<Map<String, Value>> {
    let mut parameters = Map::new();
    for param in params {
        let Some((key, value)) = param.split_once('=') else {
            bail!("Invalid --param '{}': expected key=value", param);
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("Invalid --param '{}': empty key", param);
        }
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        parameters.insert(key.to_string(), value);
    }
    Ok(parameters)
}
