//! CLI parse: clap types for Taleforge. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Taleforge CLI - campaign content generation pipeline
#[derive(Parser)]
#[command(name = "taleforge")]
#[command(about = "Queue, generate and recover tabletop campaign content")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (layered over the global config)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Recover a structured object from raw provider text
    Recover {
        /// File holding the raw text, or "-" for stdin
        input: String,
        /// Treat the text as cut off at the provider's token limit
        #[arg(long)]
        truncated: bool,
        /// JSON object used when every other tier fails
        #[arg(long)]
        fallback: Option<String>,
        /// Top-level field the recovered object must carry (repeatable)
        #[arg(long)]
        require: Vec<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print the status report for a stage
    Status {
        /// Stage (queued, processing, generating, portrait, complete, error)
        #[arg(long)]
        stage: String,
        /// Jobs ahead of the caller (queued stage only)
        #[arg(long)]
        position: Option<usize>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Generate one piece of content through the pipeline
    Generate {
        /// Content kind (character, npc, item, quest, encounter, world, campaign)
        #[arg(long)]
        kind: String,
        /// Free-text prompt
        #[arg(long)]
        prompt: String,
        /// User the job is queued for
        #[arg(long, default_value = "cli")]
        user: String,
        /// Request parameter as key=value (repeatable; values parse as JSON when they can)
        #[arg(long = "param")]
        params: Vec<String>,
        /// Use the contents of FILE as the provider reply instead of calling the provider
        #[arg(long)]
        replay: Option<PathBuf>,
        /// With --replay, report the stored reply as stopped at the token limit
        #[arg(long, requires = "replay")]
        truncated: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "json")]
        format: String,
    },
    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Load and validate the layered configuration
    Validate {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print the effective configuration as TOML (API key redacted)
    Show,
}
