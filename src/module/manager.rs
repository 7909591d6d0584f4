//! Module manager for orchestrating all modules
//!
//! Runs discovery -> resolution -> sequential load/enable, exposes the
//! operator operations (enable, disable, reload) and fans health transitions
//! out to health-reactive modules.
//!
//! Every state-changing operation locks the module's instance first and
//! re-reads its state under that lock, so the permission check and the state
//! write for one module are atomic with respect to each other. Registry reads
//! for other modules are never blocked by a running hook.

use serde::Serialize;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::config::ModuleSystemConfig;
use crate::module::descriptor::{ModuleDefinition, ModuleDescriptor};
use crate::module::events::{EventPublisher, ModuleEvent};
use crate::module::lifecycle::{can_disable, can_enable, can_load, can_reload, receives_health};
use crate::module::loader::ModuleLoader;
use crate::module::registry::dependencies::{DependencyResolver, ResolutionResult};
use crate::module::registry::discovery::DiscoveryProvider;
use crate::module::registry::store::{ModuleHandle, ModuleRegistry, ModuleStatus};
use crate::module::traits::{Capabilities, HealthSample, Module, ModuleError, ModuleState};
use crate::utils::{log_error, panic_message};

/// Outcome of a `register_all` pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    /// Modules that reached ENABLED, in load order
    pub enabled: Vec<String>,
    /// Modules that ended FAILED, with their error
    pub failed: Vec<(String, String)>,
    /// Modules switched off by configuration or already loaded
    pub skipped: Vec<String>,
}

/// Module manager coordinates all registered modules
pub struct ModuleManager {
    /// Shared module registry
    registry: Arc<ModuleRegistry>,
    /// Instance construction
    loader: ModuleLoader,
    /// Where module definitions come from
    discovery: Box<dyn DiscoveryProvider>,
    /// Enable switches and health thresholds
    config: ModuleSystemConfig,
    /// Definitions from the last successful resolution, by name
    definitions: RwLock<HashMap<String, ModuleDefinition>>,
    /// Resolved load order from the last successful resolution
    load_order: RwLock<Vec<String>>,
    /// Result of the last resolve pass, successful or not
    last_resolution: RwLock<Option<ResolutionResult>>,
    /// System-wide health flag
    healthy: AtomicBool,
    /// Serializes health flips with their fan-out
    health_fanout: Mutex<()>,
    /// Latest TPS sample (f64 bits)
    last_tps: AtomicU64,
    /// Lifecycle event channel
    events: EventPublisher,
}

impl ModuleManager {
    /// Create a manager over a discovery provider
    pub fn new<D>(discovery: D, config: ModuleSystemConfig) -> Self
    where
        D: DiscoveryProvider + 'static,
    {
        let registry = Arc::new(ModuleRegistry::new());
        Self {
            loader: ModuleLoader::new(Arc::clone(&registry)),
            registry,
            discovery: Box::new(discovery),
            config,
            definitions: RwLock::new(HashMap::new()),
            load_order: RwLock::new(Vec::new()),
            last_resolution: RwLock::new(None),
            healthy: AtomicBool::new(true),
            health_fanout: Mutex::new(()),
            last_tps: AtomicU64::new(0f64.to_bits()),
            events: EventPublisher::default(),
        }
    }

    /// Discover, resolve and load every module in dependency order.
    ///
    /// Candidates with an invalid descriptor are left out of resolution,
    /// recorded as FAILED with the validation errors and listed in the
    /// report's `failed`. Resolution errors (missing dependencies, duplicate declarations, a
    /// cycle) abort the whole pass before anything is loaded. Per-module load
    /// failures are recorded on the module and never stop its siblings.
    pub fn register_all(&self) -> Result<LoadReport, ModuleError> {
        info!("Discovering and registering modules");

        let scan = self.loader.scan_package(self.discovery.as_ref());
        for (name, error) in &scan.rejected {
            self.events.publish(ModuleEvent::Failed {
                module: name.clone(),
                error: error.clone(),
            });
        }
        let (resolution, definitions) = self.resolve(scan.definitions);

        let outcome = Self::resolution_outcome(&resolution);
        *write_lock(&self.last_resolution) = Some(resolution);
        let order = outcome?;

        *write_lock(&self.definitions) = definitions;
        *write_lock(&self.load_order) = order.clone();

        let mut report = LoadReport {
            failed: scan.rejected,
            ..LoadReport::default()
        };
        for name in &order {
            if !self.config.is_enabled(name) {
                info!(module = %name, "Module disabled by configuration, skipping");
                report.skipped.push(name.clone());
                continue;
            }

            let Some(definition) = read_lock(&self.definitions).get(name).cloned() else {
                continue;
            };

            match self.load_and_enable(&definition) {
                Ok(()) => report.enabled.push(name.clone()),
                Err(ModuleError::InvalidTransition { .. }) => {
                    debug!(module = %name, "Module already loaded, skipping");
                    report.skipped.push(name.clone());
                }
                Err(e) => report.failed.push((name.clone(), e.to_string())),
            }
        }

        info!(
            enabled = report.enabled.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            "Module registration complete"
        );
        Ok(report)
    }

    /// Instantiate a module and drive it `UNLOADED -> LOADING -> ENABLED|FAILED`.
    ///
    /// The initialize hook runs if the module declares it. A failing hook
    /// leaves the module FAILED with the error recorded; the disable hook is
    /// not called automatically.
    pub fn load_and_enable(&self, definition: &ModuleDefinition) -> Result<(), ModuleError> {
        let name = definition.name();

        let state = self.registry.get_state(name);
        if !can_load(state) {
            return Err(Self::rejected(name, state, "load"));
        }

        let Some(handle) = self.loader.load(definition) else {
            return Err(self.construction_error(name));
        };
        self.events.publish(ModuleEvent::Loaded {
            module: name.to_string(),
        });

        let mut module = handle.lock();
        let state = self.registry.get_state(name);
        if !can_load(state) {
            return Err(Self::rejected(name, state, "load"));
        }

        if let Err(e) = self.check_dependencies_enabled(&definition.descriptor) {
            self.registry.set_state(name, ModuleState::Loading);
            self.record_failure(name, &e);
            return Err(e);
        }

        self.activate(name, module.as_mut())
    }

    /// Enable a DISABLED or FAILED module, re-running its initialize hook.
    ///
    /// A FAILED module whose construction failed is re-constructed first.
    /// Rejected (without any state change) if the module is in any other
    /// state or a hard dependency is not ENABLED.
    pub fn enable(&self, name: &str) -> Result<(), ModuleError> {
        let handle = match self.registry.get(name) {
            Some(handle) => handle,
            None => self.reconstruct(name)?,
        };

        let mut module = handle.lock();
        let state = self.registry.get_state(name);
        if !can_enable(state) {
            return Err(Self::rejected(name, state, "enable"));
        }

        if let Some(descriptor) = self.registry.get_descriptor(name) {
            self.check_dependencies_enabled(&descriptor)?;
        }

        info!(module = %name, from = %state, "Enabling module");
        self.activate(name, module.as_mut())
    }

    /// Disable an ENABLED module.
    ///
    /// The disable hook runs if declared. A failing hook is recorded as the
    /// module's last error, but the module still ends DISABLED.
    pub fn disable(&self, name: &str) -> Result<(), ModuleError> {
        let handle = self.handle_for(name, "disable")?;
        let mut module = handle.lock();

        let state = self.registry.get_state(name);
        if !can_disable(state) {
            return Err(Self::rejected(name, state, "disable"));
        }

        let dependents = self.enabled_dependents(name);
        if !dependents.is_empty() {
            warn!(
                module = %name,
                ?dependents,
                "Disabling a module that enabled modules depend on"
            );
        }

        if module.capabilities().contains(Capabilities::DISABLE) {
            if let Err(e) = invoke_hook(name, "disable", module.as_mut(), |m| m.disable()) {
                error!(module = %name, "Disable hook failed: {}", e);
                self.registry.set_error(name, e.to_string());
            }
        }

        self.registry.set_state(name, ModuleState::Disabled);
        self.events.publish(ModuleEvent::Disabled {
            module: name.to_string(),
        });
        info!(module = %name, "Module disabled");
        Ok(())
    }

    /// Reload an ENABLED module in place.
    ///
    /// Calls the reload hook only if declared; the instance is never
    /// re-created. If the hook fails the module stays ENABLED with the error
    /// recorded and the error is returned.
    pub fn reload(&self, name: &str) -> Result<(), ModuleError> {
        let handle = self.handle_for(name, "reload")?;
        let mut module = handle.lock();

        let state = self.registry.get_state(name);
        if !can_reload(state) {
            return Err(Self::rejected(name, state, "reload"));
        }

        if !module.capabilities().contains(Capabilities::RELOAD) {
            debug!(module = %name, "Module does not support reload, nothing to do");
            return Ok(());
        }

        match invoke_hook(name, "reload", module.as_mut(), |m| m.reload()) {
            Ok(()) => {
                self.registry.clear_error(name);
                self.events.publish(ModuleEvent::Reloaded {
                    module: name.to_string(),
                    error: None,
                });
                info!(module = %name, "Module reloaded");
                Ok(())
            }
            Err(e) => {
                error!(module = %name, "Reload failed, keeping previous state: {}", e);
                self.registry.set_error(name, e.to_string());
                self.events.publish(ModuleEvent::Reloaded {
                    module: name.to_string(),
                    error: Some(e.to_string()),
                });
                Err(e)
            }
        }
    }

    /// Reload every ENABLED module in load order.
    pub fn reload_all(&self) -> Vec<(String, Result<(), ModuleError>)> {
        self.ordered_names()
            .into_iter()
            .filter(|name| self.registry.get_state(name) == ModuleState::Enabled)
            .map(|name| {
                let result = self.reload(&name);
                (name, result)
            })
            .collect()
    }

    /// Disable every ENABLED module in reverse load order, so dependents shut
    /// down before their dependencies. Returns the names disabled, in order.
    pub fn disable_all(&self) -> Vec<String> {
        info!("Disabling all modules");
        let mut disabled = Vec::new();

        for name in self.ordered_names().into_iter().rev() {
            if self.registry.get_state(&name) != ModuleState::Enabled {
                continue;
            }
            let context = format!("Error disabling module {}", name);
            if log_error(|| self.disable(&name), &context).is_some() {
                disabled.push(name);
            }
        }

        disabled
    }

    /// Disable everything and forget all registered modules.
    pub fn shutdown(&self) -> Vec<String> {
        info!("Shutting down module manager");
        let disabled = self.disable_all();
        self.registry.clear();
        write_lock(&self.definitions).clear();
        write_lock(&self.load_order).clear();
        info!("Module manager shut down");
        disabled
    }

    /// Flip the system-wide health flag and notify health-reactive modules.
    ///
    /// No-op (returns `false`) if the flag already has this value. Otherwise
    /// every ENABLED module declaring [`Capabilities::HEALTH`] gets
    /// `on_unhealthy` or `on_recovered`; a failing hook is logged and recorded
    /// and does not stop the remaining notifications.
    ///
    /// Concurrent calls are serialized, so hooks of one transition finish
    /// before the next transition starts. The flag itself flips before the
    /// hooks run and [`is_healthy`](Self::is_healthy) never waits for them.
    pub fn notify_health_change(&self, healthy: bool) -> bool {
        let _fanout = self
            .health_fanout
            .lock()
            .unwrap_or_else(|p| p.into_inner());
        if self.healthy.swap(healthy, Ordering::SeqCst) == healthy {
            return false;
        }

        let sample = self.health_sample();
        if healthy {
            info!(tps = sample.tps, "Host recovered, notifying modules");
        } else {
            warn!(tps = sample.tps, "Host unhealthy, notifying modules");
        }
        self.events.publish(ModuleEvent::HealthChanged {
            healthy,
            tps: sample.tps,
        });

        for name in self.ordered_names() {
            if !receives_health(self.registry.get_state(&name)) {
                continue;
            }
            let Some(handle) = self.registry.get(&name) else {
                continue;
            };
            let mut module = handle.lock();

            // Re-check under the instance lock
            if !receives_health(self.registry.get_state(&name))
                || !module.capabilities().contains(Capabilities::HEALTH)
            {
                continue;
            }

            let result = if healthy {
                invoke_hook(&name, "on_recovered", module.as_mut(), |m| m.on_recovered(&sample))
            } else {
                invoke_hook(&name, "on_unhealthy", module.as_mut(), |m| m.on_unhealthy(&sample))
            };

            if let Err(e) = result {
                warn!(module = %name, "Health hook failed: {}", e);
                self.registry.set_error(&name, e.to_string());
            }
        }

        true
    }

    /// Current system-wide health flag. Does not block on a running fan-out.
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    /// Store the latest TPS sample (forwarded to health hooks)
    pub fn record_tps(&self, tps: f64) {
        self.last_tps.store(tps.to_bits(), Ordering::Relaxed);
    }

    /// Latest TPS sample
    pub fn current_tps(&self) -> f64 {
        f64::from_bits(self.last_tps.load(Ordering::Relaxed))
    }

    /// Latest sample plus configured thresholds
    pub fn health_sample(&self) -> HealthSample {
        HealthSample {
            tps: self.current_tps(),
            unhealthy_below_tps: self.config.health.unhealthy_below_tps,
            recovered_at_tps: self.config.health.recovered_at_tps,
        }
    }

    /// Status snapshot of one module
    pub fn status(&self, name: &str) -> Option<ModuleStatus> {
        self.registry.get_entry(name)
    }

    /// Status snapshots of all modules, sorted by name
    pub fn all_modules(&self) -> Vec<ModuleStatus> {
        self.registry.all_entries()
    }

    /// Current state; `UNLOADED` for unknown modules
    pub fn state(&self, name: &str) -> ModuleState {
        self.registry.get_state(name)
    }

    /// Resolved load order of the last successful `register_all`
    pub fn load_order(&self) -> Vec<String> {
        read_lock(&self.load_order).clone()
    }

    /// Result of the last resolve pass
    pub fn last_resolution(&self) -> Option<ResolutionResult> {
        read_lock(&self.last_resolution).clone()
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<ModuleEvent> {
        self.events.subscribe()
    }

    /// Shared registry
    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// Active configuration
    pub fn config(&self) -> &ModuleSystemConfig {
        &self.config
    }

    fn resolve(
        &self,
        discovered: Vec<ModuleDefinition>,
    ) -> (ResolutionResult, HashMap<String, ModuleDefinition>) {
        let mut resolver = DependencyResolver::new();
        let mut definitions = HashMap::new();
        let mut duplicate_errors = Vec::new();

        for definition in discovered {
            match resolver.add_module(definition.descriptor.clone()) {
                Ok(()) => {
                    definitions
                        .entry(definition.name().to_string())
                        .or_insert(definition);
                }
                Err(e) => duplicate_errors.push(e.to_string()),
            }
        }

        let mut resolution = resolver.resolve();
        if !duplicate_errors.is_empty() {
            duplicate_errors.append(&mut resolution.errors);
            resolution.errors = duplicate_errors;
            resolution.load_order.clear();
        }

        (resolution, definitions)
    }

    fn resolution_outcome(resolution: &ResolutionResult) -> Result<Vec<String>, ModuleError> {
        for message in &resolution.errors {
            error!("{}", message);
        }
        if let Some(cycle) = &resolution.cycle {
            error!(cycle = %cycle.join(" -> "), "Circular dependency detected");
        }
        for warning in &resolution.warnings {
            debug!("{}", warning);
        }

        match (&resolution.cycle, resolution.errors.is_empty()) {
            (None, true) => Ok(resolution.load_order.clone()),
            (Some(cycle), true) => Err(ModuleError::CircularDependency(cycle.clone())),
            (cycle, false) => {
                let mut errors = resolution.errors.clone();
                if let Some(cycle) = cycle {
                    errors.push(ModuleError::CircularDependency(cycle.clone()).to_string());
                }
                Err(ModuleError::ResolutionFailed(errors))
            }
        }
    }

    /// LOADING -> initialize -> ENABLED | FAILED. Caller holds the instance lock.
    fn activate(&self, name: &str, module: &mut dyn Module) -> Result<(), ModuleError> {
        self.registry.set_state(name, ModuleState::Loading);

        let result = if module.capabilities().contains(Capabilities::INITIALIZE) {
            invoke_hook(name, "initialize", module, |m| m.initialize())
        } else {
            Ok(())
        };

        match result {
            Ok(()) => {
                self.registry.set_state(name, ModuleState::Enabled);
                self.registry.clear_error(name);
                self.events.publish(ModuleEvent::Enabled {
                    module: name.to_string(),
                });
                info!(module = %name, "Module enabled");
                Ok(())
            }
            Err(e) => {
                let e = match e {
                    ModuleError::InitializationError(_) | ModuleError::HookPanicked(_) => e,
                    other => ModuleError::InitializationError(other.to_string()),
                };
                self.record_failure(name, &e);
                Err(e)
            }
        }
    }

    fn record_failure(&self, name: &str, e: &ModuleError) {
        error!(module = %name, "Module failed: {}", e);
        self.registry.set_state(name, ModuleState::Failed);
        self.registry.set_error(name, e.to_string());
        self.events.publish(ModuleEvent::Failed {
            module: name.to_string(),
            error: e.to_string(),
        });
    }

    fn check_dependencies_enabled(&self, descriptor: &ModuleDescriptor) -> Result<(), ModuleError> {
        for dep in &descriptor.hard_dependencies {
            if self.registry.get_state(dep) != ModuleState::Enabled {
                return Err(ModuleError::DependencyNotEnabled {
                    module: descriptor.name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
        Ok(())
    }

    fn enabled_dependents(&self, name: &str) -> Vec<String> {
        self.registry
            .get_entries_by_state(ModuleState::Enabled)
            .into_iter()
            .filter(|s| s.hard_dependencies.contains(name))
            .map(|s| s.name)
            .collect()
    }

    /// Rebuild the instance of a module whose construction failed earlier.
    fn reconstruct(&self, name: &str) -> Result<ModuleHandle, ModuleError> {
        let state = self.registry.get_state(name);
        if !self.registry.contains(name) {
            return Err(ModuleError::ModuleNotFound(name.to_string()));
        }
        if !can_enable(state) {
            return Err(Self::rejected(name, state, "enable"));
        }

        // Entries without a resolved definition were rejected during the scan
        let definition = read_lock(&self.definitions).get(name).cloned().ok_or_else(|| {
            let reason = self
                .registry
                .get_entry(name)
                .and_then(|s| s.last_error)
                .unwrap_or_else(|| "not part of the resolved load order".to_string());
            ModuleError::InvalidManifest(format!("Module '{}' cannot be enabled: {}", name, reason))
        })?;

        info!(module = %name, "Retrying construction of failed module");
        let handle = self
            .loader
            .load(&definition)
            .ok_or_else(|| self.construction_error(name))?;
        self.events.publish(ModuleEvent::Loaded {
            module: name.to_string(),
        });
        Ok(handle)
    }

    fn handle_for(&self, name: &str, operation: &'static str) -> Result<ModuleHandle, ModuleError> {
        match self.registry.get(name) {
            Some(handle) => Ok(handle),
            None if self.registry.contains(name) => Err(Self::rejected(
                name,
                self.registry.get_state(name),
                operation,
            )),
            None => Err(ModuleError::ModuleNotFound(name.to_string())),
        }
    }

    fn construction_error(&self, name: &str) -> ModuleError {
        let message = self
            .registry
            .get_entry(name)
            .and_then(|s| s.last_error)
            .unwrap_or_else(|| format!("Module '{}' could not be constructed", name));
        self.events.publish(ModuleEvent::Failed {
            module: name.to_string(),
            error: message.clone(),
        });
        ModuleError::ConstructionFailed(message)
    }

    fn rejected(name: &str, state: ModuleState, operation: &'static str) -> ModuleError {
        debug!(module = %name, %state, operation, "Rejected lifecycle transition");
        ModuleError::InvalidTransition {
            module: name.to_string(),
            state,
            operation,
        }
    }

    /// Load order first, then any registered module outside it.
    fn ordered_names(&self) -> Vec<String> {
        let mut names = self.load_order();
        for name in self.registry.get_names() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

/// Run a hook, turning a panic into `HookPanicked`.
fn invoke_hook<F>(
    name: &str,
    hook: &'static str,
    module: &mut dyn Module,
    f: F,
) -> Result<(), ModuleError>
where
    F: FnOnce(&mut dyn Module) -> Result<(), ModuleError>,
{
    match catch_unwind(AssertUnwindSafe(|| f(module))) {
        Ok(result) => result,
        Err(payload) => Err(ModuleError::HookPanicked(format!(
            "{} hook of '{}': {}",
            hook,
            name,
            panic_message(payload.as_ref())
        ))),
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|p| p.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|p| p.into_inner())
}
