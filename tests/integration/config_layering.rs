//! Integration tests for layered configuration
//!
//! Precedence, lowest first: defaults, global file, explicit file, environment.

use std::fs;
use taleforge::config::{global_config_path, ConfigLoader};
use taleforge::pipeline::GenerationPipeline;

use super::test_utils::with_isolated_config;

fn write_global(body: &str) {
    let path = global_config_path().expect("config dir resolvable");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

#[test]
fn defaults_apply_without_any_file() {
    with_isolated_config(|_| {
        let config = ConfigLoader::load(None).unwrap();
        assert_eq!(config.provider.base_url, "https://api.openai.com/v1");
        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert_eq!(config.provider.timeout_secs, 60);
        assert_eq!(config.queue.max_concurrent, 1);
        assert_eq!(config.queue.max_queue_depth, None);
        assert_eq!(config.status.average_job_seconds, 20);
        assert!(config.validate().is_ok());
    });
}

#[test]
fn global_file_lives_under_xdg_config_home() {
    with_isolated_config(|temp_dir| {
        let path = global_config_path().unwrap();
        assert_eq!(
            path,
            temp_dir.path().join("config").join("taleforge").join("config.toml")
        );
    });
}

#[test]
fn explicit_file_overrides_global_file() {
    with_isolated_config(|temp_dir| {
        write_global(
            r#"
[provider]
model = "global-model"
timeout_secs = 45

[status]
average_job_seconds = 30
"#,
        );
        let explicit = temp_dir.path().join("taleforge.toml");
        fs::write(
            &explicit,
            r#"
[provider]
model = "explicit-model"
"#,
        )
        .unwrap();

        let config = ConfigLoader::load(Some(&explicit)).unwrap();
        assert_eq!(config.provider.model, "explicit-model");
        // Keys the explicit file leaves alone keep their global values
        assert_eq!(config.provider.timeout_secs, 45);
        assert_eq!(config.status.average_job_seconds, 30);
    });
}

#[test]
fn environment_overrides_every_file() {
    with_isolated_config(|_| {
        write_global(
            r#"
[queue]
max_concurrent = 2
"#,
        );
        std::env::set_var("TALEFORGE__QUEUE__MAX_QUEUE_DEPTH", "25");
        std::env::set_var("TALEFORGE__PROVIDER__MODEL", "env-model");
        let loaded = ConfigLoader::load(None);
        std::env::remove_var("TALEFORGE__QUEUE__MAX_QUEUE_DEPTH");
        std::env::remove_var("TALEFORGE__PROVIDER__MODEL");

        let config = loaded.unwrap();
        assert_eq!(config.queue.max_concurrent, 2);
        assert_eq!(config.queue.max_queue_depth, Some(25));
        assert_eq!(config.provider.model, "env-model");
    });
}

#[test]
fn invalid_queue_config_is_rejected_before_building_pipeline() {
    with_isolated_config(|temp_dir| {
        let explicit = temp_dir.path().join("taleforge.toml");
        fs::write(
            &explicit,
            r#"
[queue]
max_concurrent = 0
"#,
        )
        .unwrap();

        let config = ConfigLoader::load(Some(&explicit)).unwrap();
        assert!(config.validate().is_err());
        assert!(GenerationPipeline::from_config(&config).is_err());
        assert!(ConfigLoader::load_validated(Some(&explicit)).is_err());
    });
}
