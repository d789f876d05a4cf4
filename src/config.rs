use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{NormalizerError, Result};
use crate::pipeline::processing::normalize::NormalizerPolicy;

/// Environment variable that overrides the config file path
pub const CONFIG_PATH_ENV: &str = "AID_NORMALIZER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub normalizer: NormalizerConfig,
    pub cleanup: CleanupConfig,
    pub report: ReportConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    #[serde(flatten)]
    pub policy: NormalizerPolicy,
    /// Ruleset TOML to use instead of the embedded one
    pub ruleset_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    pub progress_every: usize,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self { progress_every: 100 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub cache_ttl_seconds: u64,
    pub per_page: usize,
}

impl ReportConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: 300,
            per_page: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: PathBuf,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            file_prefix: "aid_normalizer.log".to_string(),
        }
    }
}

impl Config {
    /// Load from `$AID_NORMALIZER_CONFIG`, else `config.toml`. A missing
    /// default file yields the defaults.
    pub fn load() -> Result<Self> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::load_from(path),
            Err(_) => Self::load_optional(DEFAULT_CONFIG_PATH),
        }
    }

    /// Load an explicitly named file; it must exist
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_content = fs::read_to_string(path).map_err(|e| {
            NormalizerError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&config_content)
    }

    /// Load a file if it exists, defaults otherwise
    pub fn load_optional(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        if config.report.per_page == 0 {
            return Err(NormalizerError::Config("report.per_page must be at least 1".to_string()));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::normalize::rules::{
        NegativeQuantityPolicy, ResidualEventPolicy, UnmatchedEventPolicy,
    };

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.normalizer.policy, NormalizerPolicy::default());
        assert_eq!(config.cleanup.progress_every, 100);
        assert_eq!(config.report.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.report.per_page, 10);
        assert_eq!(config.logging.directory, PathBuf::from("logs"));
    }

    #[test]
    fn test_policies_parse() {
        let config = Config::from_toml_str(
            r#"
            [normalizer]
            negative_quantities = "clamp_to_zero"
            residual_event = "keep_sin_evento"
            unmatched_event = "passthrough"
            ruleset_path = "rules/custom.toml"

            [report]
            cache_ttl_seconds = 60
            "#,
        )
        .unwrap();

        let policy = config.normalizer.policy;
        assert_eq!(policy.negative_quantities, NegativeQuantityPolicy::ClampToZero);
        assert_eq!(policy.residual_event, ResidualEventPolicy::KeepSinEvento);
        assert_eq!(policy.unmatched_event, UnmatchedEventPolicy::Passthrough);
        assert_eq!(config.normalizer.ruleset_path, Some(PathBuf::from("rules/custom.toml")));
        assert_eq!(config.report.cache_ttl_seconds, 60);
        assert_eq!(config.report.per_page, 10);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Config::from_toml_str("[normalizer]\nresidual_event = \"maybe\"").is_err());
        assert!(Config::from_toml_str("[report]\nper_page = 0").is_err());
    }

    #[test]
    fn test_missing_optional_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_optional(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.cleanup.progress_every, 100);
        assert!(Config::load_from(dir.path().join("absent.toml")).is_err());
    }
}
