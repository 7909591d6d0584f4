//! Configuration for the module host
//!
//! Holds the per-module enable switches consulted by `register_all`, the
//! health thresholds forwarded to health-reactive modules, and logging
//! settings. Files can be JSON or TOML.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::module::traits::ModuleError;

/// Per-module switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleToggle {
    /// Load this module during `register_all`
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ModuleToggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Health threshold configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Below this TPS the host is unhealthy
    #[serde(default = "default_unhealthy_below_tps")]
    pub unhealthy_below_tps: f64,

    /// At or above this TPS an unhealthy host has recovered
    #[serde(default = "default_recovered_at_tps")]
    pub recovered_at_tps: f64,

    /// How often the health monitor samples TPS
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_unhealthy_below_tps() -> f64 {
    18.0
}

fn default_recovered_at_tps() -> f64 {
    19.5
}

fn default_sample_interval_ms() -> u64 {
    5_000
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            unhealthy_below_tps: default_unhealthy_below_tps(),
            recovered_at_tps: default_recovered_at_tps(),
            sample_interval_ms: default_sample_interval_ms(),
        }
    }
}

impl HealthConfig {
    /// Check threshold sanity
    pub fn validate(&self) -> Result<(), ModuleError> {
        if !(self.unhealthy_below_tps.is_finite() && self.unhealthy_below_tps > 0.0) {
            return Err(ModuleError::ConfigError(format!(
                "unhealthy_below_tps must be a positive number, got {}",
                self.unhealthy_below_tps
            )));
        }
        if !self.recovered_at_tps.is_finite() || self.recovered_at_tps < self.unhealthy_below_tps
        {
            return Err(ModuleError::ConfigError(format!(
                "recovered_at_tps ({}) must be >= unhealthy_below_tps ({})",
                self.recovered_at_tps, self.unhealthy_below_tps
            )));
        }
        if self.sample_interval_ms == 0 {
            return Err(ModuleError::ConfigError(
                "sample_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter (e.g. "info", "modhost::module=debug"); RUST_LOG wins
    #[serde(default)]
    pub filter: Option<String>,

    /// Emit JSON (requires the `json-logging` feature)
    #[serde(default)]
    pub json_format: bool,
}

/// Module system configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleSystemConfig {
    /// Per-module switches; modules without an entry are enabled
    #[serde(default)]
    pub modules: HashMap<String, ModuleToggle>,

    /// Health thresholds
    #[serde(default)]
    pub health: HealthConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ModuleSystemConfig {
    /// Whether `name` should be loaded; absent entries default to enabled
    pub fn is_enabled(&self, name: &str) -> bool {
        self.modules.get(name).map_or(true, |t| t.enabled)
    }

    /// Set the switch for a module (builder style)
    pub fn with_module_enabled(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.modules.insert(name.into(), ModuleToggle { enabled });
        self
    }

    /// Validate the whole configuration
    pub fn validate(&self) -> Result<(), ModuleError> {
        self.health.validate()
    }

    /// Load configuration from JSON file
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ModuleSystemConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn to_json_file(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from TOML file
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: ModuleSystemConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_module_defaults_to_enabled() {
        let config = ModuleSystemConfig::default().with_module_enabled("off", false);
        assert!(config.is_enabled("anything"));
        assert!(!config.is_enabled("off"));
    }

    #[test]
    fn test_toml_defaults() {
        let config = ModuleSystemConfig::from_toml_str(
            r#"
            [modules.analytics]
            enabled = false

            [modules.core]

            [health]
            unhealthy_below_tps = 15.0
            "#,
        )
        .unwrap();

        assert!(!config.is_enabled("analytics"));
        assert!(config.is_enabled("core"));
        assert_eq!(config.health.unhealthy_below_tps, 15.0);
        assert_eq!(config.health.recovered_at_tps, 19.5);
        assert_eq!(config.health.sample_interval_ms, 5_000);
        assert!(config.logging.filter.is_none());
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let health = HealthConfig {
            unhealthy_below_tps: 19.0,
            recovered_at_tps: 10.0,
            ..HealthConfig::default()
        };
        assert!(matches!(health.validate(), Err(ModuleError::ConfigError(_))));
        assert!(ModuleSystemConfig::from_toml_str("[health]\nrecovered_at_tps = 1.0\n").is_err());
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modules.json");

        let config = ModuleSystemConfig::default().with_module_enabled("legacy", false);
        config.to_json_file(&path).unwrap();

        let loaded = ModuleSystemConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
