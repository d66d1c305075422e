//! Version-stamped render cache
//!
//! Entries remember the versions of every cell their graph read. A lookup
//! whose snapshot no longer matches the live counters is a miss, so cells can
//! change without the cache being told; `invalidate_*` only frees memory early.

use crate::graph::{GraphDefinition, GraphId};
use crate::point::SampledGraph;
use crate::sampler::{data_argument_count, sample, SamplingOptions};
use ahash::AHashMap;
use calcgraph_core::{CellAddress, CellVersions};
use calcgraph_formula::CellStore;
use std::sync::Arc;

/// Cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Function, parametric and implicit graphs
    Sampled {
        graph: GraphId,
        resolution: usize,
        domain: (u64, u64),
        range: (u64, u64),
    },
    /// Data plots and scatter graphs
    Data { graph: GraphId, args: usize },
}

impl CacheKey {
    /// The key a graph samples under with these options
    pub fn for_graph(graph: &GraphDefinition, options: &SamplingOptions) -> Self {
        if graph.kind.is_sampled() {
            CacheKey::Sampled {
                graph: graph.id,
                resolution: options.resolution,
                domain: options.domain_for(graph).key(),
                range: options.range_for(graph).key(),
            }
        } else {
            CacheKey::Data {
                graph: graph.id,
                args: data_argument_count(&graph.ast),
            }
        }
    }

    pub fn graph(&self) -> GraphId {
        match self {
            CacheKey::Sampled { graph, .. } | CacheKey::Data { graph, .. } => *graph,
        }
    }
}

/// Hit and miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Render cache
#[derive(Debug, Default)]
pub struct RenderCache {
    entries: AHashMap<CacheKey, Arc<SampledGraph>>,
    stats: CacheStats,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached points for a key, if their snapshot is still current
    ///
    /// A stale entry is dropped and counted as a miss.
    pub fn get(&mut self, key: &CacheKey, versions: &CellVersions) -> Option<Arc<SampledGraph>> {
        match self.entries.get(key) {
            Some(entry) if entry.versions.is_current(versions) => {
                self.stats.hits += 1;
                tracing::trace!(graph = %key.graph(), "render cache hit");
                Some(Arc::clone(entry))
            }
            Some(_) => {
                self.entries.remove(key);
                self.stats.misses += 1;
                tracing::trace!(graph = %key.graph(), "render cache entry stale");
                None
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Store sampled points under a key
    pub fn insert(&mut self, key: CacheKey, sampled: SampledGraph) -> Arc<SampledGraph> {
        let entry = Arc::new(sampled);
        self.entries.insert(key, Arc::clone(&entry));
        entry
    }

    /// Return cached points for a graph, sampling it on a miss
    pub fn get_or_sample(
        &mut self,
        graph: &GraphDefinition,
        store: &dyn CellStore,
        versions: &CellVersions,
        options: &SamplingOptions,
    ) -> Arc<SampledGraph> {
        let key = CacheKey::for_graph(graph, options);
        if let Some(entry) = self.get(&key, versions) {
            return entry;
        }

        let mut sampled = sample(graph, store, options);
        sampled.versions = versions.snapshot(graph.bindings.iter().copied());
        self.insert(key, sampled)
    }

    /// Drop every entry that read the cell
    pub fn invalidate_cell(&mut self, cell: CellAddress) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.versions.covers(cell));
        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::debug!(%cell, removed, "render cache entries invalidated");
        }
        removed
    }

    /// Drop every entry of a graph
    pub fn invalidate_graph(&mut self, graph: GraphId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.graph() != graph);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}
