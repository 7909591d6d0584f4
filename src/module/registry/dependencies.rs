//! Module dependency resolution
//!
//! Builds a [`DependencyGraph`] from module descriptors, validates hard
//! dependencies, detects cycles and produces a load order that is both
//! topologically valid and priority-sorted within each dependency depth tier.

use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::module::descriptor::ModuleDescriptor;
use crate::module::registry::graph::DependencyGraph;
use crate::module::traits::{ModuleError, Priority};

/// Dependency resolution result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionResult {
    /// Modules in load order (dependencies first); empty on any error
    pub load_order: Vec<String>,
    /// One message per missing hard dependency edge
    pub errors: Vec<String>,
    /// Cycle path, first and last element equal
    pub cycle: Option<Vec<String>>,
    /// Absent soft dependencies (informational)
    pub warnings: Vec<String>,
}

impl ResolutionResult {
    /// Whether resolution produced a usable load order
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.cycle.is_none()
    }

    /// Convert into a `Result`, surfacing the cycle or every error.
    pub fn into_result(self) -> Result<Vec<String>, ModuleError> {
        if let Some(cycle) = self.cycle {
            return Err(ModuleError::CircularDependency(cycle));
        }
        if !self.errors.is_empty() {
            return Err(ModuleError::ResolutionFailed(self.errors));
        }
        Ok(self.load_order)
    }
}

/// Dependency resolver
#[derive(Debug, Default)]
pub struct DependencyResolver {
    /// Descriptors in registration order
    descriptors: Vec<ModuleDescriptor>,
    /// Name -> position in `descriptors`
    positions: HashMap<String, usize>,
}

impl DependencyResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module declaration.
    ///
    /// Re-adding an identical descriptor is a no-op; a different descriptor
    /// under an existing name is rejected.
    pub fn add_module(&mut self, descriptor: ModuleDescriptor) -> Result<(), ModuleError> {
        if let Some(&pos) = self.positions.get(&descriptor.name) {
            if self.descriptors[pos] == descriptor {
                debug!(module = %descriptor.name, "Identical descriptor re-added, ignoring");
                return Ok(());
            }
            return Err(ModuleError::DuplicateModule(descriptor.name));
        }

        self.positions
            .insert(descriptor.name.clone(), self.descriptors.len());
        self.descriptors.push(descriptor);
        Ok(())
    }

    /// Remove a module declaration. Returns whether it was present.
    pub fn remove_module(&mut self, name: &str) -> bool {
        let Some(pos) = self.positions.remove(name) else {
            return false;
        };
        self.descriptors.remove(pos);
        for (i, d) in self.descriptors.iter().enumerate().skip(pos) {
            self.positions.insert(d.name.clone(), i);
        }
        true
    }

    /// Whether a module with this name was added
    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    /// Registered descriptor for `name`
    pub fn descriptor(&self, name: &str) -> Option<&ModuleDescriptor> {
        self.positions.get(name).map(|&i| &self.descriptors[i])
    }

    /// Number of registered modules
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether no modules were added
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Resolve the registered modules into a load order.
    ///
    /// The graph is rebuilt on every call, so the result always reflects the
    /// current set of descriptors.
    pub fn resolve(&self) -> ResolutionResult {
        let mut graph = DependencyGraph::new();
        let mut result = ResolutionResult::default();

        for descriptor in &self.descriptors {
            graph.add_node(&descriptor.name);
        }

        for descriptor in &self.descriptors {
            for dep in &descriptor.hard_dependencies {
                if !self.contains(dep) {
                    result.errors.push(format!(
                        "Module '{}' requires missing dependency '{}'",
                        descriptor.name, dep
                    ));
                }
                graph.add_edge(&descriptor.name, dep);
            }
            for soft in &descriptor.soft_dependencies {
                if !self.contains(soft) {
                    result.warnings.push(format!(
                        "Module '{}' soft dependency '{}' is not present",
                        descriptor.name, soft
                    ));
                }
            }
        }

        // Always run for diagnostics, even when dependencies are missing
        result.cycle = graph.detect_cycle();

        if !result.is_success() {
            debug!(
                errors = result.errors.len(),
                cycle = ?result.cycle,
                "Dependency resolution failed"
            );
            return result;
        }

        let topo = graph.get_topological_order();
        let depths = self.compute_depths(&topo);

        let mut ordered: Vec<(usize, Priority, String)> = topo
            .into_iter()
            .map(|name| {
                let depth = depths.get(&name).copied().unwrap_or(0);
                let priority = self
                    .descriptor(&name)
                    .map(|d| d.priority)
                    .unwrap_or_default();
                (depth, priority, name)
            })
            .collect();

        // Stable: equal (depth, priority) keep topological position
        ordered.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(&a.1)));

        result.load_order = ordered.into_iter().map(|(_, _, name)| name).collect();
        debug!(load_order = ?result.load_order, "Dependency resolution complete");
        result
    }

    /// Depth of every module: 0 without hard dependencies, otherwise one more
    /// than the deepest hard dependency. Soft dependencies are ignored.
    ///
    /// `topo` lists dependencies first, so one forward pass fills the memo
    /// table without recursion.
    fn compute_depths(&self, topo: &[String]) -> HashMap<String, usize> {
        let mut depths: HashMap<String, usize> = HashMap::with_capacity(topo.len());

        for name in topo {
            let depth = self
                .descriptor(name)
                .map(|d| {
                    d.hard_dependencies
                        .iter()
                        .filter_map(|dep| depths.get(dep))
                        .max()
                        .map_or(0, |deepest| deepest + 1)
                })
                .unwrap_or(0);
            depths.insert(name.clone(), depth);
        }

        depths
    }
}
