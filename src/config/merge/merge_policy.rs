//! Merge rules: defaults, override order, conflict handling.

use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
///
/// Later sources override earlier ones key by key: defaults, global file,
/// explicit file, environment.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("provider.base_url", "https://api.openai.com/v1")?
        .set_default("provider.model", "gpt-4o-mini")?
        .set_default("provider.timeout_secs", 60)?
        .set_default("queue.max_concurrent", 1)?
        .set_default("status.average_job_seconds", 20)?
        .set_default("logging.level", "info")
}
