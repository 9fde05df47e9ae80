//! Environment source: TALEFORGE__SECTION__KEY overrides, plus TALEFORGE_API_KEY.

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Prefix for structured overrides, e.g. `TALEFORGE__QUEUE__MAX_CONCURRENT=2`
pub const ENV_PREFIX: &str = "TALEFORGE";

/// Conventional variable for the provider key
pub const API_KEY_VAR: &str = "TALEFORGE_API_KEY";

pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    match std::env::var(API_KEY_VAR) {
        Ok(key) if !key.trim().is_empty() => builder.set_override("provider.api_key", key),
        _ => Ok(builder),
    }
}
