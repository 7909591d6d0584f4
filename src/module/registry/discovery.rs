//! Module discovery
//!
//! Discovery is pluggable: a [`DiscoveryProvider`] returns candidate module
//! definitions (descriptor + constructor). The core never inspects module
//! types itself.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::module::descriptor::{ModuleDefinition, ModuleFactory};
use crate::module::registry::manifest::ModuleManifest;
use crate::module::traits::{Module, ModuleError};

/// Source of candidate module definitions
pub trait DiscoveryProvider: Send + Sync {
    /// Discover candidates. A candidate that cannot be turned into a
    /// definition is returned as `Err` and skipped by the loader's scan.
    fn discover(&self) -> Vec<Result<ModuleDefinition, ModuleError>>;
}

/// In-memory list of definitions
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    definitions: Vec<ModuleDefinition>,
}

impl StaticDiscovery {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a definition (builder style)
    pub fn with(mut self, definition: ModuleDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    /// Add a definition
    pub fn push(&mut self, definition: ModuleDefinition) {
        self.definitions.push(definition);
    }
}

impl From<Vec<ModuleDefinition>> for StaticDiscovery {
    fn from(definitions: Vec<ModuleDefinition>) -> Self {
        Self { definitions }
    }
}

impl DiscoveryProvider for StaticDiscovery {
    fn discover(&self) -> Vec<Result<ModuleDefinition, ModuleError>> {
        debug!("Static discovery yielding {} modules", self.definitions.len());
        self.definitions.iter().cloned().map(Ok).collect()
    }
}

/// Manifest-driven discovery
///
/// Declarations come from a [`ModuleManifest`]; constructors come from a
/// factory table keyed by module name. A declared module without a factory
/// is reported as an unloadable candidate.
#[derive(Default)]
pub struct ManifestDiscovery {
    manifest: ModuleManifest,
    factories: HashMap<String, ModuleFactory>,
}

impl ManifestDiscovery {
    /// Create a provider over a parsed manifest
    pub fn new(manifest: ModuleManifest) -> Self {
        Self {
            manifest,
            factories: HashMap::new(),
        }
    }

    /// Create a provider from a manifest file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ModuleError> {
        info!("Loading module manifest from {:?}", path.as_ref());
        Ok(Self::new(ModuleManifest::from_file(path)?))
    }

    /// Register the constructor for a declared module
    pub fn with_factory<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn Module>, ModuleError> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    /// Underlying manifest
    pub fn manifest(&self) -> &ModuleManifest {
        &self.manifest
    }
}

impl DiscoveryProvider for ManifestDiscovery {
    fn discover(&self) -> Vec<Result<ModuleDefinition, ModuleError>> {
        self.manifest
            .descriptors()
            .into_iter()
            .map(|descriptor| match self.factories.get(&descriptor.name) {
                Some(factory) => Ok(ModuleDefinition {
                    descriptor,
                    factory: Arc::clone(factory),
                }),
                None => Err(ModuleError::ConstructionFailed(format!(
                    "No factory registered for module '{}'",
                    descriptor.name
                ))),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;
    impl Module for Noop {}

    #[test]
    fn test_manifest_discovery_reports_missing_factory() {
        let manifest =
            ModuleManifest::parse("[[module]]\nname = \"a\"\n\n[[module]]\nname = \"b\"\n")
                .unwrap();
        let discovery =
            ManifestDiscovery::new(manifest).with_factory("a", || Ok(Box::new(Noop) as Box<dyn Module>));

        let candidates = discovery.discover();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].as_ref().unwrap().name(), "a");
        assert!(matches!(
            candidates[1],
            Err(ModuleError::ConstructionFailed(_))
        ));
    }
}
