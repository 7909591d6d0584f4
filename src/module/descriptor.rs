//! Module declarations
//!
//! A [`ModuleDescriptor`] is the immutable declaration of a module: its name,
//! dependencies and priority. A [`ModuleDefinition`] pairs a descriptor with the
//! constructor that produces the module's behavior object.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::module::traits::{Module, ModuleError, Priority};

/// Immutable module declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// Unique, non-empty module name
    pub name: String,
    /// Optional semantic version
    #[serde(default)]
    pub version: Option<String>,
    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,
    /// Modules that must be loaded first; missing ones are resolution errors
    #[serde(default)]
    pub hard_dependencies: BTreeSet<String>,
    /// Optional ordering hints; absence is not an error
    #[serde(default)]
    pub soft_dependencies: BTreeSet<String>,
    /// Tie-breaker within a dependency depth tier
    #[serde(default)]
    pub priority: Priority,
}

impl ModuleDescriptor {
    /// Create a descriptor with no dependencies and normal priority
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            description: None,
            hard_dependencies: BTreeSet::new(),
            soft_dependencies: BTreeSet::new(),
            priority: Priority::Normal,
        }
    }

    /// Add a hard dependency
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.hard_dependencies.insert(name.into());
        self
    }

    /// Add a soft dependency
    pub fn soft_depends_on(mut self, name: impl Into<String>) -> Self {
        self.soft_dependencies.insert(name.into());
        self
    }

    /// Set the load priority
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Constructor for a module's behavior object
pub type ModuleFactory = Arc<dyn Fn() -> Result<Box<dyn Module>, ModuleError> + Send + Sync>;

/// Descriptor plus construction capability, as supplied by discovery
#[derive(Clone)]
pub struct ModuleDefinition {
    pub descriptor: ModuleDescriptor,
    pub factory: ModuleFactory,
}

impl ModuleDefinition {
    /// Create a definition from a descriptor and constructor closure
    pub fn new<F>(descriptor: ModuleDescriptor, factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn Module>, ModuleError> + Send + Sync + 'static,
    {
        Self {
            descriptor,
            factory: Arc::new(factory),
        }
    }

    /// Module name
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}

impl fmt::Debug for ModuleDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDefinition")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}
