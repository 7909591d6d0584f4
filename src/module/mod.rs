//! Module system
//!
//! Lets a host register many independently versioned sub-components
//! ("modules"), resolve a safe load order from their declared dependencies
//! and priorities, and drive each one through the lifecycle state machine.
//!
//! ## Architecture
//!
//! - **Resolution**: descriptors are checked for missing dependencies and
//!   cycles, then ordered by dependency depth and priority
//! - **Registry**: thread-safe record of every module's state, timestamps and
//!   last error
//! - **Manager**: sequences load/enable/disable/reload and fans out health
//!   transitions to modules that opt in
//! - **Health**: an async sampler turns TPS readings into health transitions
//!
//! ```text
//! UNLOADED --load--> LOADING --init ok--> ENABLED --disable--> DISABLED
//!                       |                   ^  |                  |
//!                       +--init fail--> FAILED  +--reload (stays)  |
//!                                         |                        |
//!                                         +--------enable----------+
//! ```

pub mod descriptor;
pub mod events;
pub mod health;
pub mod lifecycle;
pub mod loader;
pub mod manager;
pub mod registry;
pub mod traits;
pub mod validation;

pub use descriptor::{ModuleDefinition, ModuleDescriptor, ModuleFactory};
pub use events::{EventPublisher, ModuleEvent};
pub use health::{HealthMonitor, HealthThresholds, TpsSource};
pub use loader::{ModuleLoader, PackageScan};
pub use manager::{LoadReport, ModuleManager};
pub use registry::{
    DependencyGraph, DependencyResolver, DiscoveryProvider, ManifestDiscovery, ModuleHandle,
    ModuleManifest, ModuleRegistry, ModuleStatus, ResolutionResult, StaticDiscovery,
};
pub use traits::{Capabilities, HealthSample, Module, ModuleError, ModuleState, Priority};
pub use validation::{DescriptorValidator, ValidationResult};
