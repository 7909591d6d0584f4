//! Module registry, discovery and dependency resolution
//!
//! Holds the dependency graph and resolver, the thread-safe module registry,
//! manifest parsing and the pluggable discovery providers.

pub mod dependencies;
pub mod discovery;
pub mod graph;
pub mod manifest;
pub mod store;

pub use dependencies::{DependencyResolver, ResolutionResult};
pub use discovery::{DiscoveryProvider, ManifestDiscovery, StaticDiscovery};
pub use graph::DependencyGraph;
pub use manifest::{ManifestEntry, ModuleManifest};
pub use store::{ModuleHandle, ModuleRegistry, ModuleStatus};
