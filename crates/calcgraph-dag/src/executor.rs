//! Running a compute callback over the dirty part of a [`DirtyGraph`]

use crate::error::DagResult;
use crate::graph::{DirtyGraph, NodeId};
use std::time::{Duration, Instant};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// How the executor walks the execution plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One node at a time in topological order
    #[default]
    Sequential,
    /// Dirty nodes of one level concurrently, with a barrier between levels
    LevelParallel,
}

/// Summary of one executor run
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport<K> {
    /// Nodes in the order their results were committed
    pub computed: Vec<K>,
    /// Number of batches committed (one per node when sequential)
    pub batches: usize,
    /// Wall-clock time of the whole run
    pub elapsed: Duration,
}

impl<K> ExecutionReport<K> {
    pub fn computed_count(&self) -> usize {
        self.computed.len()
    }
}

/// Executes the dirty nodes of a graph
#[derive(Debug, Clone, Copy, Default)]
pub struct Executor {
    mode: ExecutionMode,
}

impl Executor {
    pub fn new(mode: ExecutionMode) -> Self {
        Self { mode }
    }

    pub fn sequential() -> Self {
        Self::new(ExecutionMode::Sequential)
    }

    pub fn level_parallel() -> Self {
        Self::new(ExecutionMode::LevelParallel)
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Compute every dirty node and mark it clean.
    ///
    /// `compute` receives the node id and a read-only view of the graph in
    /// which every dependency of the node has already been committed. Its
    /// return value becomes the node's new payload.
    pub fn run<K, P, F>(&self, graph: &mut DirtyGraph<K, P>, compute: F) -> DagResult<ExecutionReport<K>>
    where
        K: NodeId + Send + Sync,
        P: Send + Sync,
        F: Fn(&K, &DirtyGraph<K, P>) -> P + Sync,
    {
        let started = Instant::now();
        let report = match self.mode {
            ExecutionMode::Sequential => run_sequential(graph, &compute)?,
            ExecutionMode::LevelParallel => run_levels(graph, &compute)?,
        };

        tracing::debug!(
            mode = ?self.mode,
            computed = report.computed.len(),
            batches = report.batches,
            "dag execution finished"
        );

        Ok(ExecutionReport {
            elapsed: started.elapsed(),
            ..report
        })
    }
}

fn run_sequential<K, P, F>(graph: &mut DirtyGraph<K, P>, compute: &F) -> DagResult<ExecutionReport<K>>
where
    K: NodeId,
    F: Fn(&K, &DirtyGraph<K, P>) -> P,
{
    let plan = graph.execution_plan()?;
    let mut computed = Vec::with_capacity(plan.len());

    for id in plan {
        let start = Instant::now();
        let payload = compute(&id, &*graph);
        graph.commit(&id, payload, start.elapsed())?;
        tracing::trace!(node = ?id, "computed");
        computed.push(id);
    }

    Ok(ExecutionReport {
        batches: computed.len(),
        computed,
        elapsed: Duration::ZERO,
    })
}

fn run_levels<K, P, F>(graph: &mut DirtyGraph<K, P>, compute: &F) -> DagResult<ExecutionReport<K>>
where
    K: NodeId + Send + Sync,
    P: Send + Sync,
    F: Fn(&K, &DirtyGraph<K, P>) -> P + Sync,
{
    let levels = graph.levels()?;
    let mut computed = Vec::new();
    let mut batches = 0;

    for level in levels {
        let dirty: Vec<K> = level.into_iter().filter(|id| graph.is_dirty(id)).collect();
        if dirty.is_empty() {
            continue;
        }

        // Nodes on one level never read each other, so they only need the
        // committed results of earlier levels.
        let results = compute_level(&dirty, &*graph, compute);

        // Barrier: the whole level is committed before the next one starts
        for (id, payload, duration) in results {
            graph.commit(&id, payload, duration)?;
            computed.push(id);
        }
        batches += 1;
        tracing::trace!(level = batches, nodes = dirty.len(), "level committed");
    }

    Ok(ExecutionReport {
        computed,
        batches,
        elapsed: Duration::ZERO,
    })
}

fn timed<K, P, F>(id: &K, graph: &DirtyGraph<K, P>, compute: &F) -> (K, P, Duration)
where
    K: NodeId,
    F: Fn(&K, &DirtyGraph<K, P>) -> P,
{
    let start = Instant::now();
    let payload = compute(id, graph);
    (id.clone(), payload, start.elapsed())
}

#[cfg(feature = "parallel")]
fn compute_level<K, P, F>(level: &[K], graph: &DirtyGraph<K, P>, compute: &F) -> Vec<(K, P, Duration)>
where
    K: NodeId + Send + Sync,
    P: Send + Sync,
    F: Fn(&K, &DirtyGraph<K, P>) -> P + Sync,
{
    match crate::parallel::rayon_pool() {
        Some(pool) if level.len() > 1 => pool.install(|| {
            level
                .par_iter()
                .map(|id| timed(id, graph, compute))
                .collect()
        }),
        _ => level.iter().map(|id| timed(id, graph, compute)).collect(),
    }
}

#[cfg(not(feature = "parallel"))]
fn compute_level<K, P, F>(level: &[K], graph: &DirtyGraph<K, P>, compute: &F) -> Vec<(K, P, Duration)>
where
    K: NodeId,
    F: Fn(&K, &DirtyGraph<K, P>) -> P,
{
    level.iter().map(|id| timed(id, graph, compute)).collect()
}
