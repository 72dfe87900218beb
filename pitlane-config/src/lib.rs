//! # Pitlane Configuration
//!
//! Layered settings for the recorder: defaults, optional YAML files and
//! `PITLANE_*` environment variables, validated after merging.

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod capture;
mod error;
mod live;
mod pipeline;
mod storage;
mod validation;

pub use capture::CaptureConfig;
pub use error::ConfigError;
pub use live::LiveConfig;
pub use pipeline::PipelineConfig;
pub use storage::StorageConfig;

const ENV_PREFIX: &str = "PITLANE_";

/// Top-level configuration container.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone)]
pub struct PitlaneConfig {
    #[validate(nested)]
    #[serde(default)]
    pub capture: CaptureConfig,

    #[validate(nested)]
    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[validate(nested)]
    #[serde(default)]
    pub storage: StorageConfig,

    #[validate(nested)]
    #[serde(default)]
    pub live: LiveConfig,
}

impl PitlaneConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default values
    /// 2. `config/pitlane.yaml`, if present
    /// 3. `config/<PITLANE_ENV>.yaml`, if present (`PITLANE_ENV` defaults to `local`)
    /// 4. `PITLANE_*` environment variables, `__` separating sections
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(PitlaneConfig::default()));

        if Path::new("config/pitlane.yaml").exists() {
            figment = figment.merge(Yaml::file("config/pitlane.yaml"));
        }

        let env = std::env::var("PITLANE_ENV").unwrap_or_else(|_| "local".into());
        let env_file = format!("config/{env}.yaml");
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::finish(figment)
    }

    /// Load one explicit file on top of the defaults, then the environment.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        let figment =
            Figment::from(Serialized::defaults(PitlaneConfig::default())).merge(Yaml::file(path));
        Self::finish(figment)
    }

    fn finish(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_validates() {
        let config = PitlaneConfig::default();
        config.validate().expect("Default config should validate");
        assert_eq!(config.capture.port, 20777);
        assert_eq!(config.pipeline.queue_capacity, 1000);
        assert!(config.pipeline.drivers.is_none());
    }

    #[test]
    fn environment_override() {
        std::env::set_var("PITLANE_PIPELINE__JOIN_TIMEOUT_MS", "750");
        let config = PitlaneConfig::load().unwrap();
        std::env::remove_var("PITLANE_PIPELINE__JOIN_TIMEOUT_MS");
        assert_eq!(config.pipeline.join_timeout_ms, 750);
    }

    #[test]
    fn file_values_are_validated() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "capture:\n  port: 80\npipeline:\n  categories: [lap, warp]\n  drivers: [0, 3]"
        )
        .unwrap();

        let err = PitlaneConfig::load_from_path(file.path()).unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(message.contains("capture.port"), "{message}");
        assert!(message.contains("unknown category 'warp'"), "{message}");
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "pipeline:\n  categories: [lap, motion]\n  drivers: [0, 3]").unwrap();

        let config = PitlaneConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.pipeline.categories, vec!["lap", "motion"]);
        assert_eq!(config.pipeline.drivers, Some(vec![0, 3]));
        assert_eq!(config.capture.sample_rate_hz, 30);
    }

    #[test]
    fn missing_file_is_reported() {
        assert!(matches!(
            PitlaneConfig::load_from_path("does/not/exist.yaml"),
            Err(ConfigError::FileNotFound(_))
        ));
    }
}
