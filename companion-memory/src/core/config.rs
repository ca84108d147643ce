use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::models::error::{MemoryError, MemoryResult};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub vector: VectorConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MemoryConfig {
    pub short_term_ttl_seconds: i64,
    pub default_importance: f64,
    pub cleanup_interval_seconds: u64,
    pub archive_threshold: f64,
    pub archive_retention_days: i64,
    pub promotion_threshold: f64,
    pub search_top_k: usize,
    #[serde(default)]
    pub cleanup_on_start: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            short_term_ttl_seconds: 3600,
            default_importance: 0.5,
            cleanup_interval_seconds: 300, // 5 minutes
            archive_threshold: 0.1,
            archive_retention_days: 30,
            promotion_threshold: 0.7,
            search_top_k: 5,
            cleanup_on_start: false,
        }
    }
}

impl MemoryConfig {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VectorConfig {
    pub enabled: bool,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CompletionConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout_seconds: 30,
            max_retries: 2,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        Self::builder_with_defaults()?
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("COMPANION_MEMORY").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Load from an explicit file on top of the built-in defaults
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::builder_with_defaults()?
            .add_source(File::with_name(path))
            .build()?
            .try_deserialize()
    }

    fn builder_with_defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError>
    {
        let memory = MemoryConfig::default();
        let completion = CompletionConfig::default();

        Config::builder()
            .set_default("memory.short_term_ttl_seconds", memory.short_term_ttl_seconds)?
            .set_default("memory.default_importance", memory.default_importance)?
            .set_default(
                "memory.cleanup_interval_seconds",
                memory.cleanup_interval_seconds,
            )?
            .set_default("memory.archive_threshold", memory.archive_threshold)?
            .set_default("memory.archive_retention_days", memory.archive_retention_days)?
            .set_default("memory.promotion_threshold", memory.promotion_threshold)?
            .set_default("memory.search_top_k", memory.search_top_k as u64)?
            .set_default("memory.cleanup_on_start", memory.cleanup_on_start)?
            .set_default("vector.enabled", true)?
            .set_default("completion.enabled", completion.enabled)?
            .set_default("completion.base_url", completion.base_url)?
            .set_default("completion.model", completion.model)?
            .set_default("completion.timeout_seconds", completion.timeout_seconds)?
            .set_default("completion.max_retries", completion.max_retries)
    }

    pub fn validate(&self) -> MemoryResult<()> {
        let memory = &self.memory;

        for (name, value) in [
            ("memory.default_importance", memory.default_importance),
            ("memory.archive_threshold", memory.archive_threshold),
            ("memory.promotion_threshold", memory.promotion_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(MemoryError::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        if memory.cleanup_interval_seconds == 0 {
            return Err(MemoryError::InvalidConfig(
                "memory.cleanup_interval_seconds must be positive".to_string(),
            ));
        }
        if memory.search_top_k == 0 {
            return Err(MemoryError::InvalidConfig(
                "memory.search_top_k must be positive".to_string(),
            ));
        }
        if memory.archive_retention_days < 0 {
            return Err(MemoryError::InvalidConfig(
                "memory.archive_retention_days must not be negative".to_string(),
            ));
        }
        if self.completion.enabled && self.completion.base_url.trim().is_empty() {
            return Err(MemoryError::InvalidConfig(
                "completion.base_url is required when completion is enabled".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.memory.short_term_ttl_seconds, 3600);
        assert_eq!(settings.memory.cleanup_interval(), Duration::from_secs(300));
        assert!(settings.vector.enabled);
        assert!(!settings.completion.enabled);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "[memory]\ncleanup_interval_seconds = 60\npromotion_threshold = 0.8\n\n[vector]\nenabled = false"
        )
        .unwrap();

        let settings = Settings::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(settings.memory.cleanup_interval_seconds, 60);
        assert!((settings.memory.promotion_threshold - 0.8).abs() < f64::EPSILON);
        assert_eq!(settings.memory.short_term_ttl_seconds, 3600);
        assert!(!settings.vector.enabled);
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let mut settings = Settings::default();
        settings.memory.archive_threshold = 1.5;
        assert!(matches!(
            settings.validate(),
            Err(MemoryError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut settings = Settings::default();
        settings.memory.cleanup_interval_seconds = 0;
        assert!(settings.validate().is_err());
    }
}
