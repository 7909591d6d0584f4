//! modhost - in-process module host
//!
//! This crate lets a single host application register many independently
//! versioned sub-components ("modules"), each declaring dependencies on other
//! modules, a load priority and optional lifecycle hooks. It resolves a safe
//! load order, drives every module through the lifecycle state machine and
//! propagates runtime health signals to modules that opt in.
//!
//! ## Design Principles
//!
//! 1. **Nothing loads from a broken graph**: a missing dependency or a cycle
//!    aborts the whole pass before any module is instantiated
//! 2. **Failures stay local**: one module's failing hook never stops its siblings
//! 3. **Every failure is recorded**: the registry keeps the last error per module
//!
//! ## Example
//!
//! ```rust
//! use modhost::module::{Module, ModuleDefinition, ModuleDescriptor, ModuleManager, Priority};
//! use modhost::module::registry::StaticDiscovery;
//! use modhost::ModuleSystemConfig;
//!
//! struct Core;
//! impl Module for Core {}
//!
//! let discovery = StaticDiscovery::new().with(ModuleDefinition::new(
//!     ModuleDescriptor::new("core").with_priority(Priority::Highest),
//!     || Ok(Box::new(Core) as Box<dyn Module>),
//! ));
//!
//! let manager = ModuleManager::new(discovery, ModuleSystemConfig::default());
//! let report = manager.register_all().unwrap();
//! assert_eq!(report.enabled, vec!["core".to_string()]);
//! ```

pub mod config;
pub mod module;
pub mod utils;

// Re-export config module
pub use config::*;

pub use module::{
    Capabilities, LoadReport, Module, ModuleDefinition, ModuleDescriptor, ModuleError,
    ModuleManager, ModuleState, Priority,
};
