//! Module loader implementation
//!
//! Turns module definitions into live instances and performs first-time
//! registration. Owns no ordering logic: the manager decides what to load
//! and when.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::module::descriptor::ModuleDefinition;
use crate::module::registry::discovery::DiscoveryProvider;
use crate::module::registry::store::{ModuleHandle, ModuleRegistry};
use crate::module::traits::{Module, ModuleError};
use crate::module::validation::{DescriptorValidator, ValidationResult};
use crate::utils::panic_message;

/// Outcome of [`ModuleLoader::scan_package`]
#[derive(Default)]
pub struct PackageScan {
    /// Candidates that passed validation, in discovery order
    pub definitions: Vec<ModuleDefinition>,
    /// Rejected candidates with their joined validation errors
    pub rejected: Vec<(String, String)>,
}

/// Module loader for constructing and registering modules
pub struct ModuleLoader {
    registry: Arc<ModuleRegistry>,
    validator: DescriptorValidator,
}

impl ModuleLoader {
    /// Create a loader that registers into `registry`
    pub fn new(registry: Arc<ModuleRegistry>) -> Self {
        Self {
            registry,
            validator: DescriptorValidator::new(),
        }
    }

    /// Collect loadable definitions from a discovery provider.
    ///
    /// Candidates the provider could not produce are logged and skipped.
    /// Candidates whose descriptor fails validation are recorded in the
    /// registry as `FAILED` with the validation errors and listed in
    /// [`PackageScan::rejected`]. Neither fails the scan.
    pub fn scan_package(&self, provider: &dyn DiscoveryProvider) -> PackageScan {
        let mut scan = PackageScan::default();

        for candidate in provider.discover() {
            let definition = match candidate {
                Ok(definition) => definition,
                Err(e) => {
                    warn!("Skipping module candidate: {}", e);
                    continue;
                }
            };

            match self.validator.validate(&definition.descriptor) {
                ValidationResult::Valid => scan.definitions.push(definition),
                ValidationResult::Invalid(errors) => {
                    let name = definition.name().to_string();
                    let message = errors.join("; ");
                    warn!(module = %name, ?errors, "Rejecting module with invalid descriptor");

                    // A live instance under this name belongs to a valid declaration
                    if self.registry.get(&name).is_none() {
                        self.registry
                            .register_failed(definition.descriptor, message.clone());
                    }
                    scan.rejected.push((name, message));
                }
            }
        }

        info!(
            discovered = scan.definitions.len(),
            rejected = scan.rejected.len(),
            "Package scan complete"
        );
        scan
    }

    /// Instantiate a module and register it in `UNLOADED` state.
    ///
    /// Returns `None` if construction fails; the failure is recorded in the
    /// registry as a `FAILED` entry carrying the error message. If the
    /// module already has a live instance, that instance is returned
    /// unchanged.
    pub fn load(&self, definition: &ModuleDefinition) -> Option<ModuleHandle> {
        let name = definition.name();

        if let Some(existing) = self.registry.get(name) {
            debug!(module = %name, "Module already instantiated, reusing instance");
            return Some(existing);
        }

        let instance = match self.construct(definition) {
            Ok(instance) => instance,
            Err(e) => {
                error!(module = %name, "Failed to construct module: {}", e);
                self.registry
                    .register_failed(definition.descriptor.clone(), e.to_string());
                return None;
            }
        };

        match self
            .registry
            .register(name, instance, definition.descriptor.clone())
        {
            Ok(handle) => {
                info!(module = %name, instance = %handle.instance_id(), "Module instantiated");
                Some(handle)
            }
            Err(e) => {
                // Lost a race with a concurrent load of the same module
                warn!(module = %name, "Registration rejected: {}", e);
                self.registry.get(name)
            }
        }
    }

    /// Shared registry
    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    fn construct(&self, definition: &ModuleDefinition) -> Result<Box<dyn Module>, ModuleError> {
        let factory = Arc::clone(&definition.factory);
        match catch_unwind(AssertUnwindSafe(|| factory())) {
            Ok(result) => result.map_err(|e| match e {
                ModuleError::ConstructionFailed(_) => e,
                other => ModuleError::ConstructionFailed(other.to_string()),
            }),
            Err(payload) => Err(ModuleError::ConstructionFailed(format!(
                "constructor panicked: {}",
                panic_message(payload.as_ref())
            ))),
        }
    }
}
