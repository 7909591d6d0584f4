//! Module dependency graph
//!
//! Directed graph over module names where an edge `a -> b` means "a depends on
//! b". Nodes live in an arena indexed by insertion order, which keeps cycle
//! detection and ordering deterministic. Traversals use an explicit stack, so
//! deep dependency chains cannot overflow the call stack.

use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

/// Dependency graph over module names
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Node names in insertion order
    nodes: Vec<String>,
    /// Name -> arena index
    index: HashMap<String, usize>,
    /// Arena index -> indices of direct dependencies (deduplicated, insertion order)
    edges: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. No-op if it already exists.
    pub fn add_node(&mut self, name: &str) {
        self.intern(name);
    }

    /// Declare that `from` depends on `to`, creating missing nodes.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        let from = self.intern(from);
        let to = self.intern(to);
        if !self.edges[from].contains(&to) {
            self.edges[from].push(to);
        }
    }

    /// Whether the node exists
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node names in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(String::as_str)
    }

    /// Direct dependencies of `name` (empty for unknown names)
    pub fn get_dependencies(&self, name: &str) -> BTreeSet<String> {
        self.index
            .get(name)
            .map(|&i| self.edges[i].iter().map(|&d| self.nodes[d].clone()).collect())
            .unwrap_or_default()
    }

    /// Nodes that directly depend on `name`
    pub fn get_dependents(&self, name: &str) -> BTreeSet<String> {
        let Some(&target) = self.index.get(name) else {
            return BTreeSet::new();
        };
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, deps)| deps.contains(&target))
            .map(|(i, _)| self.nodes[i].clone())
            .collect()
    }

    /// Find a cycle, if any.
    ///
    /// Depth-first traversal tracking the current path. On reaching a node that
    /// is already on the path, returns the path slice starting at that node and
    /// closed with the node itself, e.g. `[a, b, c, a]`. Every consecutive pair
    /// in the result is a real edge.
    pub fn detect_cycle(&self) -> Option<Vec<String>> {
        let mut marks = vec![Mark::Unvisited; self.nodes.len()];

        for start in 0..self.nodes.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }

            // (node, next edge to follow); the stack is exactly the current path
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            marks[start] = Mark::OnPath;

            while let Some(top) = stack.last_mut() {
                let node = top.0;
                if let Some(&dep) = self.edges[node].get(top.1) {
                    top.1 += 1;
                    match marks[dep] {
                        Mark::OnPath => {
                            let pos = stack
                                .iter()
                                .position(|&(n, _)| n == dep)
                                .unwrap_or(0);
                            let mut cycle: Vec<String> = stack[pos..]
                                .iter()
                                .map(|&(n, _)| self.nodes[n].clone())
                                .collect();
                            cycle.push(self.nodes[dep].clone());
                            return Some(cycle);
                        }
                        Mark::Unvisited => {
                            marks[dep] = Mark::OnPath;
                            stack.push((dep, 0));
                        }
                        Mark::Done => {}
                    }
                } else {
                    marks[node] = Mark::Done;
                    stack.pop();
                }
            }
        }

        None
    }

    /// Topological order with every dependency before its dependents.
    ///
    /// DFS post-order over the depends-on edges, starting from nodes in
    /// insertion order. Only meaningful after [`detect_cycle`](Self::detect_cycle)
    /// returned `None`; on a cyclic graph the result is unspecified.
    pub fn get_topological_order(&self) -> Vec<String> {
        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());

        for start in 0..self.nodes.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }

            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            marks[start] = Mark::OnPath;

            while let Some(top) = stack.last_mut() {
                let node = top.0;
                if let Some(&dep) = self.edges[node].get(top.1) {
                    top.1 += 1;
                    if marks[dep] == Mark::Unvisited {
                        marks[dep] = Mark::OnPath;
                        stack.push((dep, 0));
                    }
                } else {
                    marks[node] = Mark::Done;
                    order.push(self.nodes[node].clone());
                    stack.pop();
                }
            }
        }

        order
    }

    fn intern(&mut self, name: &str) -> usize {
        if let Some(&i) = self.index.get(name) {
            return i;
        }
        let i = self.nodes.len();
        self.nodes.push(name.to_string());
        self.index.insert(name.to_string(), i);
        self.edges.push(Vec::new());
        i
    }
}
