//! Configuration management for bankguard
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (BANKGUARD_* prefix, `__` between sections)
//! 2. bankguard.local.toml (gitignored, local overrides)
//! 3. bankguard.toml (git-tracked, project config)
//! 4. ~/.config/bankguard/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)
//!
//! ```toml
//! [policy]
//! mfa_window_secs = 600
//! small_transfer_max = 2000000
//!
//! [store]
//! seed_file = "fixtures/bank.json"
//!
//! [logging]
//! level = "info"
//! audit = true
//! ```

use bankguard_abac::PolicyLimits;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main bankguard configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankguardConfig {
    /// Thresholds for the standard policy table.
    pub policy: PolicyLimits,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON snapshot of principals and accounts. Absent means the built-in
    /// demo fixtures.
    pub seed_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter; `RUST_LOG` takes precedence.
    pub level: String,
    /// Emit one tracing event per decision.
    pub audit: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            audit: true,
        }
    }
}

impl BankguardConfig {
    /// Checks that the merged configuration is usable.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.policy
            .validate()
            .map_err(|err| ConfigError::ValidationError(err.to_string()))?;
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "logging.level must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve relative paths to absolute
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();

        if let Some(seed_file) = &self.store.seed_file {
            if seed_file.is_relative() {
                self.store.seed_file = Some(base.join(seed_file));
            }
        }
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> std::result::Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BankguardConfig::default();
        assert_eq!(config.policy, PolicyLimits::default());
        assert_eq!(config.store.seed_file, None);
        assert_eq!(config.logging.level, "warn");
        assert!(config.logging.audit);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_limits() {
        let mut config = BankguardConfig::default();
        config.policy.small_transfer_fraud_max = -0.5;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("small_transfer_fraud_max"));
    }

    #[test]
    fn test_validation_rejects_empty_level() {
        let mut config = BankguardConfig::default();
        config.logging.level = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_path_resolution() {
        let mut config = BankguardConfig::default();
        config.store.seed_file = Some(PathBuf::from("fixtures/bank.json"));
        config.resolve_paths("/home/user/project");

        assert_eq!(
            config.store.seed_file,
            Some(PathBuf::from("/home/user/project/fixtures/bank.json"))
        );
    }

    #[test]
    fn test_absolute_paths_untouched() {
        let mut config = BankguardConfig::default();
        config.store.seed_file = Some(PathBuf::from("/srv/bank.json"));
        config.resolve_paths("/home/user/project");
        assert_eq!(config.store.seed_file, Some(PathBuf::from("/srv/bank.json")));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = BankguardConfig::default();
        config.policy.mfa_window_secs = 600;
        config.store.seed_file = Some(PathBuf::from("/srv/bank.json"));

        let rendered = config.to_toml().expect("render");
        assert!(rendered.contains("mfa_window_secs = 600"));

        let parsed: BankguardConfig = toml::from_str(&rendered).expect("parse");
        assert_eq!(parsed, config);
    }
}
