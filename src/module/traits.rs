//! Module system traits and interfaces
//!
//! Defines the `Module` trait implemented by every hosted module, the capability
//! set the manager inspects before invoking hooks, and the shared error type.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Module lifecycle state
///
/// ```text
/// UNLOADED --load--> LOADING --success--> ENABLED
/// LOADING --failure--> FAILED
/// ENABLED --disable--> DISABLED
/// DISABLED --enable--> ENABLED | FAILED
/// FAILED --enable--> ENABLED | FAILED
/// ENABLED --reload--> ENABLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModuleState {
    /// Not loaded (also reported for unknown names)
    Unloaded,
    /// Constructed and initializing; never serves hook calls
    Loading,
    /// Running normally
    Enabled,
    /// Stopped by an operator or by `disable_all`
    Disabled,
    /// Construction or initialization failed
    Failed,
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModuleState::Unloaded => "UNLOADED",
            ModuleState::Loading => "LOADING",
            ModuleState::Enabled => "ENABLED",
            ModuleState::Disabled => "DISABLED",
            ModuleState::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Authored load priority, used as a tie-breaker within a dependency depth tier
///
/// Ordering follows declaration order, so `Highest > Lowest`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Lowest,
    Low,
    #[default]
    Normal,
    High,
    Highest,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Lowest => "lowest",
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Highest => "highest",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Priority {
    type Err = ModuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lowest" => Ok(Priority::Lowest),
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            "highest" => Ok(Priority::Highest),
            other => Err(ModuleError::InvalidManifest(format!(
                "Unknown priority: {}",
                other
            ))),
        }
    }
}

bitflags! {
    /// Hooks a module opts into
    ///
    /// The manager only calls a hook when the matching flag is present.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u8 {
        /// `initialize` runs on load and on every re-enable
        const INITIALIZE = 1 << 0;
        /// `disable` runs when the module is shut down
        const DISABLE    = 1 << 1;
        /// `reload` runs on operator reload
        const RELOAD     = 1 << 2;
        /// `on_unhealthy` / `on_recovered` run on health transitions
        const HEALTH     = 1 << 3;
    }
}

/// Health sample handed to health-reactive modules
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthSample {
    /// Most recent ticks-per-second sample (0.0 if nothing was sampled yet)
    pub tps: f64,
    /// Below this the host is considered unhealthy
    pub unhealthy_below_tps: f64,
    /// At or above this an unhealthy host is considered recovered
    pub recovered_at_tps: f64,
}

/// Module trait that all hosted modules implement
///
/// Every hook has a default no-op body; which hooks actually run is decided by
/// [`Module::capabilities`]. Hooks are invoked synchronously and are expected
/// to return quickly.
pub trait Module: Send {
    /// Hooks this module wants called
    fn capabilities(&self) -> Capabilities {
        Capabilities::empty()
    }

    /// Called on first load and again whenever the module is re-enabled.
    fn initialize(&mut self) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Called when the module is disabled. Responsible for undoing anything
    /// `initialize` registered.
    fn disable(&mut self) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Called on operator reload. The instance is kept; a failing reload must
    /// leave the previous in-memory state usable.
    fn reload(&mut self) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Host dropped below the unhealthy threshold.
    fn on_unhealthy(&mut self, _sample: &HealthSample) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Host climbed back to the recovery threshold.
    fn on_recovered(&mut self, _sample: &HealthSample) -> Result<(), ModuleError> {
        Ok(())
    }
}

/// Module system errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModuleError {
    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Module '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("Module '{0}' was declared twice with different descriptors")]
    DuplicateModule(String),

    #[error("Cannot {operation} module '{module}' while it is {state}")]
    InvalidTransition {
        module: String,
        state: ModuleState,
        operation: &'static str,
    },

    #[error("Module dependency missing: {0}")]
    DependencyMissing(String),

    #[error("Module '{module}' requires dependency '{dependency}' which is not enabled")]
    DependencyNotEnabled { module: String, dependency: String },

    #[error("Circular dependency detected: {}", .0.join(" -> "))]
    CircularDependency(Vec<String>),

    #[error("Dependency resolution failed: {}", .0.join("; "))]
    ResolutionFailed(Vec<String>),

    #[error("Module construction failed: {0}")]
    ConstructionFailed(String),

    #[error("Module initialization failed: {0}")]
    InitializationError(String),

    #[error("Module operation failed: {0}")]
    OperationError(String),

    #[error("Module hook panicked: {0}")]
    HookPanicked(String),

    #[error("Invalid module manifest: {0}")]
    InvalidManifest(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<toml::de::Error> for ModuleError {
    fn from(e: toml::de::Error) -> Self {
        ModuleError::InvalidManifest(e.to_string())
    }
}

impl From<serde_json::Error> for ModuleError {
    fn from(e: serde_json::Error) -> Self {
        ModuleError::ConfigError(e.to_string())
    }
}

impl From<std::io::Error> for ModuleError {
    fn from(e: std::io::Error) -> Self {
        ModuleError::OperationError(e.to_string())
    }
}

impl From<anyhow::Error> for ModuleError {
    fn from(e: anyhow::Error) -> Self {
        ModuleError::OperationError(e.to_string())
    }
}
