//! Dirty-tracking dependency graph

use crate::error::{DagError, DagResult};
use ahash::{AHashMap, AHashSet};
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::{Duration, SystemTime};

/// Requirements on node ids
///
/// `Ord` gives a deterministic order among nodes that are ready at the same
/// time.
pub trait NodeId: Clone + Eq + Hash + Ord + Debug {}

impl<T: Clone + Eq + Hash + Ord + Debug> NodeId for T {}

/// A node with an opaque payload
#[derive(Debug, Clone)]
pub struct Node<K, P> {
    payload: P,
    dirty: bool,
    last_computed: Option<SystemTime>,
    last_duration: Option<Duration>,
    dependencies: AHashSet<K>,
    dependents: AHashSet<K>,
}

impl<K, P> Node<K, P> {
    fn new(payload: P) -> Self {
        Self {
            payload,
            dirty: true,
            last_computed: None,
            last_duration: None,
            dependencies: AHashSet::new(),
            dependents: AHashSet::new(),
        }
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// When the node was last computed by an executor
    pub fn last_computed(&self) -> Option<SystemTime> {
        self.last_computed
    }

    /// Wall-clock duration of the last computation
    pub fn last_duration(&self) -> Option<Duration> {
        self.last_duration
    }

    /// Nodes this node reads
    pub fn dependencies(&self) -> impl Iterator<Item = &K> {
        self.dependencies.iter()
    }

    /// Nodes that read this node
    pub fn dependents(&self) -> impl Iterator<Item = &K> {
        self.dependents.iter()
    }
}

/// Dependency graph whose nodes carry a dirty flag
///
/// New nodes start dirty. Dependency sets are replaced wholesale with
/// [`update_dependencies`](DirtyGraph::update_dependencies), which keeps the
/// dependent back references in sync.
#[derive(Debug, Clone)]
pub struct DirtyGraph<K, P> {
    nodes: AHashMap<K, Node<K, P>>,
}

impl<K: NodeId, P> Default for DirtyGraph<K, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: NodeId, P> DirtyGraph<K, P> {
    /// Create an empty graph
    pub fn new() -> Self {
        Self {
            nodes: AHashMap::new(),
        }
    }

    /// Add a node, or replace the payload of an existing one.
    ///
    /// Either way the node is marked dirty; existing edges are kept.
    pub fn add_node(&mut self, id: K, payload: P) {
        match self.nodes.get_mut(&id) {
            Some(node) => {
                node.payload = payload;
                node.dirty = true;
            }
            None => {
                self.nodes.insert(id, Node::new(payload));
            }
        }
    }

    /// Remove a node and sever all of its edges
    pub fn remove_node(&mut self, id: &K) -> Option<P> {
        let node = self.nodes.remove(id)?;

        for dependency in &node.dependencies {
            if let Some(dep) = self.nodes.get_mut(dependency) {
                dep.dependents.remove(id);
            }
        }
        for dependent in &node.dependents {
            if let Some(dep) = self.nodes.get_mut(dependent) {
                dep.dependencies.remove(id);
            }
        }

        Some(node.payload)
    }

    /// Replace the dependency set of a node and rewire back references
    ///
    /// Every dependency must already be a node of the graph. Cycles are not
    /// rejected here; they surface from [`topological_order`].
    ///
    /// [`topological_order`]: DirtyGraph::topological_order
    pub fn update_dependencies<I>(&mut self, id: &K, dependencies: I) -> DagResult<()>
    where
        I: IntoIterator<Item = K>,
    {
        if !self.nodes.contains_key(id) {
            return Err(not_found(id));
        }

        let new_deps: AHashSet<K> = dependencies.into_iter().collect();
        if let Some(missing) = new_deps.iter().find(|dep| !self.nodes.contains_key(*dep)) {
            return Err(not_found(missing));
        }

        let old_deps = match self.nodes.get_mut(id) {
            Some(node) => std::mem::take(&mut node.dependencies),
            None => return Err(not_found(id)),
        };

        for dep in old_deps.difference(&new_deps) {
            if let Some(node) = self.nodes.get_mut(dep) {
                node.dependents.remove(id);
            }
        }
        for dep in &new_deps {
            if let Some(node) = self.nodes.get_mut(dep) {
                node.dependents.insert(id.clone());
            }
        }

        if let Some(node) = self.nodes.get_mut(id) {
            node.dependencies = new_deps;
        }
        Ok(())
    }

    /// Mark a node dirty, and with `propagate` everything downstream of it
    ///
    /// Returns the number of nodes that were clean before.
    pub fn mark_dirty(&mut self, id: &K, propagate: bool) -> DagResult<usize> {
        if !self.nodes.contains_key(id) {
            return Err(not_found(id));
        }

        let mut newly_dirty = 0;
        let mut visited = AHashSet::new();
        let mut stack = vec![id.clone()];

        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            let Some(node) = self.nodes.get_mut(&current) else {
                continue;
            };
            if !node.dirty {
                node.dirty = true;
                newly_dirty += 1;
            }
            if propagate {
                stack.extend(node.dependents.iter().cloned());
            }
        }

        Ok(newly_dirty)
    }

    /// Mark a node clean without recomputing it
    pub fn mark_clean(&mut self, id: &K) -> DagResult<()> {
        let node = self.nodes.get_mut(id).ok_or_else(|| not_found(id))?;
        node.dirty = false;
        Ok(())
    }

    /// Store a computed payload: the node becomes clean and its timing is
    /// recorded
    pub fn commit(&mut self, id: &K, payload: P, duration: Duration) -> DagResult<()> {
        let node = self.nodes.get_mut(id).ok_or_else(|| not_found(id))?;
        node.payload = payload;
        node.dirty = false;
        node.last_computed = Some(SystemTime::now());
        node.last_duration = Some(duration);
        Ok(())
    }

    /// All nodes ordered so that dependencies come first (Kahn's algorithm)
    pub fn topological_order(&self) -> DagResult<Vec<K>> {
        let mut in_degree: AHashMap<&K, usize> = self
            .nodes
            .iter()
            .map(|(id, node)| (id, node.dependencies.len()))
            .collect();

        let mut ready: BTreeSet<&K> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = ready.pop_first() {
            order.push(id.clone());
            for dependent in &self.nodes[id].dependents {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        if order.len() < self.nodes.len() {
            return Err(DagError::CycleDetected {
                ordered: order.len(),
                total: self.nodes.len(),
            });
        }
        Ok(order)
    }

    /// Nodes grouped by level
    ///
    /// Roots are level 0; every other node sits one level above its deepest
    /// dependency, so nodes sharing a level never depend on each other.
    pub fn levels(&self) -> DagResult<Vec<Vec<K>>> {
        let order = self.topological_order()?;
        let mut level_of: AHashMap<&K, usize> = AHashMap::with_capacity(order.len());
        let mut levels: Vec<Vec<K>> = Vec::new();

        for id in &order {
            let level = self.nodes[id]
                .dependencies
                .iter()
                .filter_map(|dep| level_of.get(dep))
                .map(|level| level + 1)
                .max()
                .unwrap_or(0);
            level_of.insert(id, level);

            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(id.clone());
        }

        Ok(levels)
    }

    /// Topological order restricted to dirty nodes
    pub fn execution_plan(&self) -> DagResult<Vec<K>> {
        Ok(self
            .topological_order()?
            .into_iter()
            .filter(|id| self.nodes[id].dirty)
            .collect())
    }

    pub fn get(&self, id: &K) -> Option<&Node<K, P>> {
        self.nodes.get(id)
    }

    pub fn payload(&self, id: &K) -> Option<&P> {
        self.nodes.get(id).map(|node| &node.payload)
    }

    pub fn payload_mut(&mut self, id: &K) -> Option<&mut P> {
        self.nodes.get_mut(id).map(|node| &mut node.payload)
    }

    pub fn contains(&self, id: &K) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn is_dirty(&self, id: &K) -> bool {
        self.nodes.get(id).map_or(false, |node| node.dirty)
    }

    /// Ids of all dirty nodes, in no particular order
    pub fn dirty_nodes(&self) -> impl Iterator<Item = &K> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.dirty)
            .map(|(id, _)| id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &K> {
        self.nodes.keys()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn not_found<K: Debug>(id: &K) -> DagError {
    DagError::NodeNotFound(format!("{:?}", id))
}
