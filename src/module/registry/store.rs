//! Module registry
//!
//! Thread-safe store of module entries keyed by name. Pure state storage: the
//! registry records whatever the manager tells it and applies no transition
//! policy of its own.
//!
//! Locking: the entry map sits behind one `RwLock` that is only held for map
//! reads/updates. Each module instance lives behind its own `Mutex`
//! ([`ModuleHandle`]), so a slow hook on one module never blocks registry
//! reads for another.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::module::descriptor::ModuleDescriptor;
use crate::module::traits::{Module, ModuleError, ModuleState, Priority};
use crate::utils::time::current_timestamp_millis;

/// Shared handle to a module instance
///
/// Cloning the handle does not clone the module. The manager locks it for
/// the duration of a lifecycle operation, which also serializes operations
/// on the same module.
#[derive(Clone)]
pub struct ModuleHandle {
    id: Uuid,
    inner: Arc<Mutex<Box<dyn Module>>>,
}

impl ModuleHandle {
    /// Wrap a freshly constructed module
    pub fn new(module: Box<dyn Module>) -> Self {
        Self {
            id: Uuid::new_v4(),
            inner: Arc::new(Mutex::new(module)),
        }
    }

    /// Identity of the wrapped instance
    pub fn instance_id(&self) -> Uuid {
        self.id
    }

    /// Lock the instance. A poisoned lock is recovered: hook panics are
    /// caught and recorded by the manager, the instance itself stays usable.
    pub fn lock(&self) -> MutexGuard<'_, Box<dyn Module>> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!(instance = %self.id, "Recovering poisoned module lock");
            poisoned.into_inner()
        })
    }
}

impl std::fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Registry row
#[derive(Debug)]
struct ModuleEntry {
    instance: Option<ModuleHandle>,
    descriptor: ModuleDescriptor,
    state: ModuleState,
    load_time_millis: u64,
    enable_timestamp: Option<u64>,
    last_error: Option<String>,
}

impl ModuleEntry {
    fn status(&self) -> ModuleStatus {
        ModuleStatus {
            name: self.descriptor.name.clone(),
            version: self.descriptor.version.clone(),
            priority: self.descriptor.priority,
            state: self.state,
            hard_dependencies: self.descriptor.hard_dependencies.clone(),
            soft_dependencies: self.descriptor.soft_dependencies.clone(),
            load_time_millis: self.load_time_millis,
            enable_timestamp: self.enable_timestamp,
            last_error: self.last_error.clone(),
            instance_id: self.instance.as_ref().map(ModuleHandle::instance_id),
        }
    }
}

/// Read-only snapshot of a registry entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleStatus {
    pub name: String,
    pub version: Option<String>,
    pub priority: Priority,
    pub state: ModuleState,
    pub hard_dependencies: BTreeSet<String>,
    pub soft_dependencies: BTreeSet<String>,
    /// Unix millis at first registration
    pub load_time_millis: u64,
    /// Unix millis of the last transition to ENABLED; `None` unless ENABLED
    pub enable_timestamp: Option<u64>,
    pub last_error: Option<String>,
    /// `None` when construction failed
    pub instance_id: Option<Uuid>,
}

/// Thread-safe module registry
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    entries: RwLock<HashMap<String, ModuleEntry>>,
}

impl ModuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructed module in `UNLOADED` state.
    ///
    /// A name that is only known as a construction failure (no instance) can
    /// be registered again; anything else is `AlreadyRegistered`.
    pub fn register(
        &self,
        name: &str,
        instance: Box<dyn Module>,
        descriptor: ModuleDescriptor,
    ) -> Result<ModuleHandle, ModuleError> {
        let mut entries = self.write();
        if let Some(existing) = entries.get(name) {
            if existing.instance.is_some() {
                return Err(ModuleError::AlreadyRegistered(name.to_string()));
            }
        }

        let handle = ModuleHandle::new(instance);
        let previous = entries.remove(name);
        entries.insert(
            name.to_string(),
            ModuleEntry {
                instance: Some(handle.clone()),
                descriptor,
                state: previous.as_ref().map_or(ModuleState::Unloaded, |p| p.state),
                load_time_millis: current_timestamp_millis(),
                enable_timestamp: None,
                last_error: previous.and_then(|p| p.last_error),
            },
        );
        debug!(module = %name, instance = %handle.instance_id(), "Module registered");
        Ok(handle)
    }

    /// Record a module whose construction failed: `FAILED`, no instance.
    pub fn register_failed(&self, descriptor: ModuleDescriptor, error: impl Into<String>) {
        let error = error.into();
        let mut entries = self.write();
        match entries.get_mut(&descriptor.name) {
            Some(entry) => {
                entry.state = ModuleState::Failed;
                entry.enable_timestamp = None;
                entry.last_error = Some(error);
            }
            None => {
                entries.insert(
                    descriptor.name.clone(),
                    ModuleEntry {
                        instance: None,
                        descriptor,
                        state: ModuleState::Failed,
                        load_time_millis: current_timestamp_millis(),
                        enable_timestamp: None,
                        last_error: Some(error),
                    },
                );
            }
        }
    }

    /// Set the state of a known module. Entering `ENABLED` stamps the enable
    /// timestamp; any other state clears it. Returns `false` for unknown names.
    pub fn set_state(&self, name: &str, state: ModuleState) -> bool {
        let mut entries = self.write();
        let Some(entry) = entries.get_mut(name) else {
            return false;
        };
        entry.state = state;
        entry.enable_timestamp = match state {
            ModuleState::Enabled => Some(current_timestamp_millis()),
            _ => None,
        };
        true
    }

    /// Record the latest error for a module. Returns `false` for unknown names.
    pub fn set_error(&self, name: &str, message: impl Into<String>) -> bool {
        let mut entries = self.write();
        match entries.get_mut(name) {
            Some(entry) => {
                entry.last_error = Some(message.into());
                true
            }
            None => false,
        }
    }

    /// Clear the last error. Returns `false` for unknown names.
    pub fn clear_error(&self, name: &str) -> bool {
        let mut entries = self.write();
        match entries.get_mut(name) {
            Some(entry) => {
                entry.last_error = None;
                true
            }
            None => false,
        }
    }

    /// Instance handle for a module, if it was constructed
    pub fn get(&self, name: &str) -> Option<ModuleHandle> {
        self.read().get(name).and_then(|e| e.instance.clone())
    }

    /// Snapshot of a module's entry
    pub fn get_entry(&self, name: &str) -> Option<ModuleStatus> {
        self.read().get(name).map(ModuleEntry::status)
    }

    /// Declared descriptor of a module
    pub fn get_descriptor(&self, name: &str) -> Option<ModuleDescriptor> {
        self.read().get(name).map(|e| e.descriptor.clone())
    }

    /// Current state; `UNLOADED` for unknown names
    pub fn get_state(&self, name: &str) -> ModuleState {
        self.read()
            .get(name)
            .map_or(ModuleState::Unloaded, |e| e.state)
    }

    /// Snapshots of every module in `state`, sorted by name
    pub fn get_entries_by_state(&self, state: ModuleState) -> Vec<ModuleStatus> {
        let mut found: Vec<ModuleStatus> = self
            .read()
            .values()
            .filter(|e| e.state == state)
            .map(ModuleEntry::status)
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }

    /// Snapshots of every module, sorted by name
    pub fn all_entries(&self) -> Vec<ModuleStatus> {
        let mut all: Vec<ModuleStatus> = self.read().values().map(ModuleEntry::status).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Whether a module is registered
    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// All registered names
    pub fn get_names(&self) -> BTreeSet<String> {
        self.read().keys().cloned().collect()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Remove one entry. Returns whether it existed.
    pub fn unregister(&self, name: &str) -> bool {
        self.write().remove(name).is_some()
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.write().clear();
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ModuleEntry>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ModuleEntry>> {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    struct Noop;
    impl Module for Noop {}

    fn registry_with(names: &[&str]) -> ModuleRegistry {
        let registry = ModuleRegistry::new();
        for name in names {
            registry
                .register(name, Box::new(Noop), ModuleDescriptor::new(*name))
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_unknown_module_is_unloaded() {
        let registry = ModuleRegistry::new();
        assert_eq!(registry.get_state("ghost"), ModuleState::Unloaded);
        assert!(registry.get("ghost").is_none());
        assert!(registry.get_entry("ghost").is_none());
        assert!(!registry.set_state("ghost", ModuleState::Enabled));
        assert!(!registry.set_error("ghost", "nope"));
    }

    #[test]
    fn test_register_twice_is_rejected() {
        let registry = registry_with(&["a"]);
        let err = registry
            .register("a", Box::new(Noop), ModuleDescriptor::new("a"))
            .unwrap_err();
        assert_eq!(err, ModuleError::AlreadyRegistered("a".to_string()));
    }

    #[test]
    fn test_enable_timestamp_follows_state() {
        let registry = registry_with(&["a"]);
        assert!(registry.get_entry("a").unwrap().enable_timestamp.is_none());

        registry.set_state("a", ModuleState::Enabled);
        assert!(registry.get_entry("a").unwrap().enable_timestamp.is_some());

        registry.set_state("a", ModuleState::Disabled);
        assert!(registry.get_entry("a").unwrap().enable_timestamp.is_none());
    }

    #[test]
    fn test_failed_construction_can_be_replaced() {
        let registry = ModuleRegistry::new();
        registry.register_failed(ModuleDescriptor::new("a"), "no constructor");

        let status = registry.get_entry("a").unwrap();
        assert_eq!(status.state, ModuleState::Failed);
        assert_eq!(status.last_error.as_deref(), Some("no constructor"));
        assert!(status.instance_id.is_none());

        let handle = registry
            .register("a", Box::new(Noop), ModuleDescriptor::new("a"))
            .unwrap();
        let status = registry.get_entry("a").unwrap();
        assert_eq!(status.instance_id, Some(handle.instance_id()));
        assert_eq!(status.state, ModuleState::Failed);
    }

    #[test]
    fn test_entries_by_state_and_clear() {
        let registry = registry_with(&["a", "b", "c"]);
        registry.set_state("a", ModuleState::Enabled);
        registry.set_state("c", ModuleState::Enabled);

        let enabled: Vec<String> = registry
            .get_entries_by_state(ModuleState::Enabled)
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(enabled, vec!["a", "c"]);

        assert!(registry.unregister("b"));
        assert!(!registry.contains("b"));
        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_access() {
        let registry = Arc::new(registry_with(&["a", "b"]));
        let mut handles = Vec::new();

        for i in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                for _ in 0..200 {
                    let state = if i % 2 == 0 {
                        ModuleState::Enabled
                    } else {
                        ModuleState::Disabled
                    };
                    registry.set_state("a", state);
                    let _ = registry.get_state("b");
                    let _ = registry.get_names();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(matches!(
            registry.get_state("a"),
            ModuleState::Enabled | ModuleState::Disabled
        ));
    }
}
