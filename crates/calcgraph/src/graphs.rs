//! Graphs on a worksheet
//!
//! Graphs are either added explicitly or synthesized from cells whose formula
//! is a top-level `PLOT(...)` call. The synthesized ones form a derived index
//! that is reconciled with the cells after every write.

use crate::worksheet::{SheetStore, Worksheet};
use calcgraph_core::{CellAddress, Error, Result};
use calcgraph_formula::PLOT_FUNCTION;
use calcgraph_plot::{Bounds, GraphDefinition, GraphId, GraphKind, SampledGraph};
use std::collections::BTreeMap;
use std::sync::Arc;

impl Worksheet {
    /// Add a graph whose kind is inferred from the variables its formula uses
    pub fn add_graph(&mut self, formula: &str) -> Result<GraphId> {
        let id = GraphId::Explicit(self.next_graph_id);
        let graph = GraphDefinition::inferred(id, formula).map_err(parse_error)?;
        Ok(self.insert_graph(graph))
    }

    /// Add a graph of a given kind
    pub fn add_graph_of_kind(&mut self, kind: GraphKind, formula: &str) -> Result<GraphId> {
        let id = GraphId::Explicit(self.next_graph_id);
        let graph = GraphDefinition::new(id, kind, formula).map_err(parse_error)?;
        Ok(self.insert_graph(graph))
    }

    fn insert_graph(&mut self, mut graph: GraphDefinition) -> GraphId {
        self.next_graph_id += 1;
        graph.refresh_bindings(&self.store());
        let id = graph.id;
        tracing::debug!(graph = %id, kind = ?graph.kind, "graph added");
        self.graphs.insert(id, graph);
        id
    }

    /// Remove an explicitly added graph
    ///
    /// Graphs backed by a `PLOT` cell go away when the cell's formula changes.
    pub fn remove_graph(&mut self, id: GraphId) -> Result<GraphDefinition> {
        if id.is_synthesized() {
            return Err(synthesized_error(id));
        }
        let graph = self
            .graphs
            .remove(&id)
            .ok_or_else(|| Error::GraphNotFound(id.to_string()))?;
        self.render_cache.invalidate_graph(id);
        Ok(graph)
    }

    /// Get a graph
    pub fn graph(&self, id: GraphId) -> Option<&GraphDefinition> {
        self.graphs.get(&id)
    }

    /// All graphs, explicit ones first in creation order, then `PLOT`
    /// cells in row-major order
    pub fn graphs(&self) -> impl Iterator<Item = &GraphDefinition> {
        self.graphs.values()
    }

    pub fn graph_count(&self) -> usize {
        self.graphs.len()
    }

    /// Replace the formula of an explicit graph; its kind is inferred again
    pub fn update_graph_formula(&mut self, id: GraphId, formula: &str) -> Result<()> {
        if id.is_synthesized() {
            return Err(synthesized_error(id));
        }
        let store = SheetStore {
            cells: &self.cells,
            named_ranges: &self.named_ranges,
        };
        let graph = self
            .graphs
            .get_mut(&id)
            .ok_or_else(|| Error::GraphNotFound(id.to_string()))?;

        graph.set_formula(formula).map_err(parse_error)?;
        graph.kind = GraphKind::infer(&graph.ast);
        graph.refresh_bindings(&store);
        self.render_cache.invalidate_graph(id);
        Ok(())
    }

    pub fn set_graph_visible(&mut self, id: GraphId, visible: bool) -> Result<()> {
        self.graph_mut(id)?.visible = visible;
        Ok(())
    }

    pub fn set_graph_color(&mut self, id: GraphId, color: &str) -> Result<()> {
        self.graph_mut(id)?.color = color.to_string();
        Ok(())
    }

    /// Set or clear the x domain (the `t` range of a parametric graph)
    pub fn set_graph_domain(&mut self, id: GraphId, domain: Option<Bounds>) -> Result<()> {
        self.graph_mut(id)?.domain = domain;
        self.render_cache.invalidate_graph(id);
        Ok(())
    }

    /// Set or clear the y range
    pub fn set_graph_range(&mut self, id: GraphId, range: Option<Bounds>) -> Result<()> {
        self.graph_mut(id)?.range = range;
        self.render_cache.invalidate_graph(id);
        Ok(())
    }

    fn graph_mut(&mut self, id: GraphId) -> Result<&mut GraphDefinition> {
        self.graphs
            .get_mut(&id)
            .ok_or_else(|| Error::GraphNotFound(id.to_string()))
    }

    /// Sampled points of a graph, served from the render cache while none of
    /// the cells it reads have changed
    pub fn sample_graph(&mut self, id: GraphId) -> Result<Arc<SampledGraph>> {
        let graph = self
            .graphs
            .get(&id)
            .ok_or_else(|| Error::GraphNotFound(id.to_string()))?;
        let store = SheetStore {
            cells: &self.cells,
            named_ranges: &self.named_ranges,
        };
        Ok(self
            .render_cache
            .get_or_sample(graph, &store, &self.versions, &self.options.sampling))
    }

    /// Reconcile `PLOT` graphs with the cells: add new ones, rebuild changed
    /// ones and drop the ones whose cell no longer plots
    pub(crate) fn sync_plot_graphs(&mut self) {
        let plot_cells: BTreeMap<CellAddress, String> = self
            .cells
            .values()
            .filter(|cell| {
                cell.ast
                    .as_ref()
                    .map_or(false, |ast| ast.top_level_function() == Some(PLOT_FUNCTION))
            })
            .filter_map(|cell| Some((cell.address, cell.formula.clone()?)))
            .collect();

        let stale: Vec<GraphId> = self
            .graphs
            .keys()
            .filter(|id| matches!(id, GraphId::Cell(address) if !plot_cells.contains_key(address)))
            .copied()
            .collect();
        for id in stale {
            self.graphs.remove(&id);
            self.render_cache.invalidate_graph(id);
            tracing::debug!(graph = %id, "plot graph removed");
        }

        for (address, formula) in plot_cells {
            let id = GraphId::Cell(address);
            if self.graphs.get(&id).map_or(false, |graph| graph.formula == formula) {
                continue;
            }
            match GraphDefinition::new(id, GraphKind::DataPlot, formula) {
                Ok(graph) => {
                    self.render_cache.invalidate_graph(id);
                    self.graphs.insert(id, graph);
                    tracing::debug!(graph = %id, "plot graph synchronized");
                }
                Err(err) => tracing::warn!(graph = %id, error = %err, "plot formula did not parse"),
            }
        }

        self.refresh_graph_bindings();
    }

    /// Recompute every graph's bindings; a graph whose bindings moved loses
    /// its cached points
    pub(crate) fn refresh_graph_bindings(&mut self) {
        let store = SheetStore {
            cells: &self.cells,
            named_ranges: &self.named_ranges,
        };
        for graph in self.graphs.values_mut() {
            let before = std::mem::take(&mut graph.bindings);
            graph.refresh_bindings(&store);
            if graph.bindings != before {
                self.render_cache.invalidate_graph(graph.id);
            }
        }
    }
}

fn parse_error(err: calcgraph_formula::FormulaError) -> Error {
    Error::GraphFormula(err.to_string())
}

fn synthesized_error(id: GraphId) -> Error {
    Error::DerivedGraph(id.to_string())
}
