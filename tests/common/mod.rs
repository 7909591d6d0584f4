//! Test utilities for module system testing
//!
//! Provides a configurable [`TestModule`], a [`Tracker`] to observe and steer it
//! from the test body, and [`TestHost`] to assemble a manager from
//! descriptors.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use modhost::config::ModuleSystemConfig;
use modhost::module::registry::StaticDiscovery;
use modhost::module::{
    Capabilities, HealthSample, Module, ModuleDefinition, ModuleDescriptor, ModuleError,
    ModuleManager,
};

/// Shared log of hook calls, e.g. `"initialize:Core"`
pub type Journal = Arc<Mutex<Vec<String>>>;

/// Observation and failure switches for one test module
#[derive(Debug, Default)]
pub struct Tracker {
    pub constructed: AtomicUsize,
    pub initialized: AtomicUsize,
    pub disabled: AtomicUsize,
    pub reloaded: AtomicUsize,
    pub unhealthy: AtomicUsize,
    pub recovered: AtomicUsize,
    /// Mirror of the module's in-memory generation counter
    pub generation: AtomicU64,
    pub last_sample: Mutex<Option<HealthSample>>,

    pub fail_construct: AtomicBool,
    pub fail_initialize: AtomicBool,
    pub panic_initialize: AtomicBool,
    pub fail_disable: AtomicBool,
    pub fail_reload: AtomicBool,
    pub fail_health: AtomicBool,
}

impl Tracker {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn set(flag: &AtomicBool, value: bool) {
        flag.store(value, Ordering::SeqCst);
    }
}

/// Module whose hooks record into a [`Tracker`] and a [`Journal`]
pub struct TestModule {
    name: String,
    capabilities: Capabilities,
    tracker: Arc<Tracker>,
    journal: Journal,
    /// In-memory state bumped on every successful reload
    generation: u64,
}

impl TestModule {
    fn record(&self, hook: &str) {
        self.journal
            .lock()
            .unwrap()
            .push(format!("{}:{}", hook, self.name));
    }

    fn check(&self, flag: &AtomicBool, hook: &str) -> Result<(), ModuleError> {
        if flag.load(Ordering::SeqCst) {
            Err(ModuleError::OperationError(format!(
                "{} failed for {}",
                hook, self.name
            )))
        } else {
            Ok(())
        }
    }
}

impl Module for TestModule {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn initialize(&mut self) -> Result<(), ModuleError> {
        self.record("initialize");
        self.tracker.initialized.fetch_add(1, Ordering::SeqCst);
        if self.tracker.panic_initialize.load(Ordering::SeqCst) {
            panic!("initialize exploded in {}", self.name);
        }
        self.check(&self.tracker.fail_initialize, "initialize")
    }

    fn disable(&mut self) -> Result<(), ModuleError> {
        self.record("disable");
        self.tracker.disabled.fetch_add(1, Ordering::SeqCst);
        self.check(&self.tracker.fail_disable, "disable")
    }

    fn reload(&mut self) -> Result<(), ModuleError> {
        self.record("reload");
        self.tracker.reloaded.fetch_add(1, Ordering::SeqCst);
        self.check(&self.tracker.fail_reload, "reload")?;
        self.generation += 1;
        self.tracker.generation.store(self.generation, Ordering::SeqCst);
        Ok(())
    }

    fn on_unhealthy(&mut self, sample: &HealthSample) -> Result<(), ModuleError> {
        self.record("unhealthy");
        self.tracker.unhealthy.fetch_add(1, Ordering::SeqCst);
        *self.tracker.last_sample.lock().unwrap() = Some(*sample);
        self.check(&self.tracker.fail_health, "on_unhealthy")
    }

    fn on_recovered(&mut self, sample: &HealthSample) -> Result<(), ModuleError> {
        self.record("recovered");
        self.tracker.recovered.fetch_add(1, Ordering::SeqCst);
        *self.tracker.last_sample.lock().unwrap() = Some(*sample);
        self.check(&self.tracker.fail_health, "on_recovered")
    }
}

/// Definition for a [`TestModule`] wired to `tracker` and `journal`
pub fn test_definition(
    descriptor: ModuleDescriptor,
    capabilities: Capabilities,
    tracker: &Arc<Tracker>,
    journal: &Journal,
) -> ModuleDefinition {
    let name = descriptor.name.clone();
    let tracker = Arc::clone(tracker);
    let journal = Arc::clone(journal);

    ModuleDefinition::new(descriptor, move || {
        tracker.constructed.fetch_add(1, Ordering::SeqCst);
        if tracker.fail_construct.load(Ordering::SeqCst) {
            return Err(ModuleError::ConstructionFailed(format!(
                "{} has no usable constructor",
                name
            )));
        }
        Ok(Box::new(TestModule {
            name: name.clone(),
            capabilities,
            tracker: Arc::clone(&tracker),
            journal: Arc::clone(&journal),
            generation: 0,
        }) as Box<dyn Module>)
    })
}

/// Test fixture assembling a manager from test modules
pub struct TestHost {
    pub journal: Journal,
    trackers: HashMap<String, Arc<Tracker>>,
    discovery: StaticDiscovery,
}

impl TestHost {
    pub fn new() -> Self {
        Self {
            journal: Arc::new(Mutex::new(Vec::new())),
            trackers: HashMap::new(),
            discovery: StaticDiscovery::new(),
        }
    }

    /// Add a module declaring every capability
    pub fn module(self, descriptor: ModuleDescriptor) -> Self {
        self.module_with(descriptor, Capabilities::all())
    }

    /// Add a module declaring only `capabilities`
    pub fn module_with(mut self, descriptor: ModuleDescriptor, capabilities: Capabilities) -> Self {
        let tracker = Arc::new(Tracker::default());
        self.trackers
            .insert(descriptor.name.clone(), Arc::clone(&tracker));
        self.discovery.push(test_definition(
            descriptor,
            capabilities,
            &tracker,
            &self.journal,
        ));
        self
    }

    pub fn tracker(&self, name: &str) -> Arc<Tracker> {
        Arc::clone(
            self.trackers
                .get(name)
                .unwrap_or_else(|| panic!("no tracker for {}", name)),
        )
    }

    /// Hook calls recorded so far, filtered by hook name
    pub fn calls(&self, hook: &str) -> Vec<String> {
        let prefix = format!("{}:", hook);
        self.journal
            .lock()
            .unwrap()
            .iter()
            .filter_map(|entry| entry.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn build(&self) -> ModuleManager {
        self.build_with(ModuleSystemConfig::default())
    }

    pub fn build_with(&self, config: ModuleSystemConfig) -> ModuleManager {
        ModuleManager::new(self.discovery.clone(), config)
    }
}

/// The Core / Data / Feature scenario
pub fn core_data_feature() -> TestHost {
    use modhost::module::Priority;

    TestHost::new()
        .module(ModuleDescriptor::new("Core").with_priority(Priority::Highest))
        .module(ModuleDescriptor::new("Data").depends_on("Core"))
        .module(
            ModuleDescriptor::new("Feature")
                .depends_on("Data")
                .soft_depends_on("Analytics")
                .with_priority(Priority::Low),
        )
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
