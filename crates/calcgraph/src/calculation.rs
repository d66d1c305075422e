//! Worksheet calculation engine
//!
//! Every write goes through the same pass: store the input, parse it, check the
//! new dependency edges for cycles, evaluate the cell, then recalculate its
//! transitive dependents in topological order. Failures never escape a write;
//! they become the error marker of the cell that failed.
//!
//! # Example
//!
//! ```rust
//! use calcgraph::prelude::*;
//!
//! let mut sheet = Worksheet::new("Sheet1");
//! sheet.set_cell_input("A1", "10").unwrap();
//! sheet.set_cell_input("A2", "20").unwrap();
//! sheet.set_cell_input("A3", "=A1+A2").unwrap();
//!
//! let stats = sheet.set_cell_input("A1", "5").unwrap();
//! assert_eq!(stats.cells_calculated, 1);
//! assert_eq!(sheet.value("A3"), Some(&CellValue::Number(25.0)));
//! ```

use crate::worksheet::{check_bounds, parse_address, Cell, ParameterRange, SheetStore, Worksheet};
use calcgraph_core::{CellAddress, CellRange, CellValue, Error, NamedRange, Result};
use calcgraph_dag::{DagError, DirtyGraph, ExecutionMode, Executor};
use calcgraph_formula::{
    evaluate, parse_formula, CellStore, EvaluationContext, FormulaExpr, References, FORMULA_SIGIL,
};
use calcgraph_plot::SamplingOptions;

/// Message stored on a cell whose formula would close a cycle
pub const CIRCULAR_REFERENCE: &str = "Circular reference";

/// Options for worksheet calculation
#[derive(Debug, Clone)]
pub struct CalculationOptions {
    /// Delete cells that a write leaves empty, formula-free, unreferenced and
    /// not a parameter (default: true)
    pub garbage_collect: bool,
    /// How full recalculation runs the formula DAG (default: level-parallel)
    pub execution_mode: ExecutionMode,
    /// Defaults for graph sampling
    pub sampling: SamplingOptions,
}

impl Default for CalculationOptions {
    fn default() -> Self {
        Self {
            garbage_collect: true,
            execution_mode: ExecutionMode::LevelParallel,
            sampling: SamplingOptions::default(),
        }
    }
}

/// Statistics from a write or a full recalculation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalculationStats {
    /// Number of formula cells (full recalculation only)
    pub formula_count: usize,
    /// Number of cells evaluated
    pub cells_calculated: usize,
    /// Number of evaluated cells that ended up holding an error marker
    pub errors: usize,
    /// Number of formulas rejected for closing a cycle
    pub circular_references: usize,
    /// Number of level batches (full recalculation only)
    pub batches: usize,
}

impl Worksheet {
    // === Writes ===

    /// Write raw user input to a cell
    ///
    /// Input starting with `=` is a formula; anything else is read as a
    /// literal (empty input clears the cell).
    pub fn set_cell_input(&mut self, address: &str, input: &str) -> Result<CalculationStats> {
        let address = parse_address(address)?;
        Ok(self.write_input(address, input))
    }

    /// Write raw user input to a cell by 1-based row and column
    pub fn set_cell_input_at(&mut self, row: u32, col: u32, input: &str) -> Result<CalculationStats> {
        let address = CellAddress::new(row, col);
        check_bounds(address)?;
        Ok(self.write_input(address, input))
    }

    /// Write a literal value; text is stored as is, even when it starts with `=`
    pub fn set_cell_value<V: Into<CellValue>>(
        &mut self,
        address: &str,
        value: V,
    ) -> Result<CalculationStats> {
        let address = parse_address(address)?;
        let mut stats = CalculationStats::default();
        self.write_literal(address, value.into());
        self.finish_write(address, &mut stats);
        Ok(stats)
    }

    /// Clear a cell's value and formula
    pub fn clear_cell(&mut self, address: &str) -> Result<CalculationStats> {
        self.set_cell_value(address, CellValue::Null)
    }

    fn write_input(&mut self, address: CellAddress, input: &str) -> CalculationStats {
        let mut stats = CalculationStats::default();
        if input.starts_with(FORMULA_SIGIL) {
            self.write_formula(address, input, &mut stats);
        } else {
            self.write_literal(address, CellValue::from_input(input));
        }
        self.finish_write(address, &mut stats);
        stats
    }

    fn write_formula(&mut self, address: CellAddress, text: &str, stats: &mut CalculationStats) {
        self.pending_circular.remove(&address);
        let parsed = parse_formula(text);

        let cell = self.cells.entry(address).or_insert_with(|| Cell::new(address));
        cell.formula = Some(text.to_string());

        match parsed {
            Ok(ast) => {
                cell.ast = Some(ast);
                if let Some(precedents) = self.formula_precedents(address) {
                    if self.dependencies.would_create_cycle(address, &precedents) {
                        self.reject_circular(address, stats);
                    } else {
                        self.install_formula(address, precedents, stats);
                    }
                }
            }
            Err(err) => {
                cell.ast = None;
                tracing::debug!(cell = %address, error = %err, "formula failed to parse");
                self.dependencies.clear_dependencies(address);
                stats.errors += 1;
                self.commit_value(address, err.to_cell_value());
            }
        }
    }

    fn write_literal(&mut self, address: CellAddress, value: CellValue) {
        self.pending_circular.remove(&address);
        self.dependencies.clear_dependencies(address);

        let value = match self.cells.get_mut(&address) {
            Some(cell) => {
                cell.formula = None;
                cell.ast = None;
                match (cell.parameter, value) {
                    (Some(parameter), CellValue::Number(n)) => CellValue::Number(parameter.snap(n)),
                    (_, value) => value,
                }
            }
            None if value.is_null() => return,
            None => {
                self.cells.insert(address, Cell::new(address));
                value
            }
        };

        self.commit_value(address, value);
    }

    /// Everything that follows a write: dependents, pending cycles, cleanup
    /// and PLOT graph synchronization
    fn finish_write(&mut self, address: CellAddress, stats: &mut CalculationStats) {
        self.recalculate_dependents(&[address], stats);
        self.retry_pending_circular(stats);
        self.collect_garbage(address);
        self.sync_plot_graphs();

        tracing::debug!(
            cell = %address,
            calculated = stats.cells_calculated,
            errors = stats.errors,
            circular = stats.circular_references,
            "write finished"
        );
    }

    // === Evaluation ===

    /// Cells the formula of a cell reads; `None` for cells without a parsed formula
    fn formula_precedents(&self, address: CellAddress) -> Option<References> {
        let ast = self.cells.get(&address)?.ast.as_ref()?;
        Some(calcgraph_formula::extract_references(ast, &self.store()))
    }

    fn install_formula(
        &mut self,
        address: CellAddress,
        precedents: References,
        stats: &mut CalculationStats,
    ) {
        self.dependencies.set_references(address, precedents);
        self.pending_circular.remove(&address);
        if let Some(value) = self.evaluate_cell(address, stats) {
            self.commit_value(address, value);
        }
    }

    /// Keep the formula but install no edges and show the cycle marker
    fn reject_circular(&mut self, address: CellAddress, stats: &mut CalculationStats) {
        tracing::warn!(cell = %address, "formula rejected: circular reference");
        self.dependencies.clear_dependencies(address);
        self.pending_circular.insert(address);
        stats.circular_references += 1;
        self.commit_value(address, CellValue::error(CIRCULAR_REFERENCE));
    }

    fn evaluate_cell(&self, address: CellAddress, stats: &mut CalculationStats) -> Option<CellValue> {
        let ast = self.cells.get(&address)?.ast.as_ref()?;
        let value = evaluate_formula(address, ast, &self.store());

        stats.cells_calculated += 1;
        if value.is_error() {
            stats.errors += 1;
        }
        Some(value)
    }

    /// Store a value; the version is bumped and cached graphs reading the cell
    /// dropped only when the value actually changed
    pub(crate) fn commit_value(&mut self, address: CellAddress, value: CellValue) -> bool {
        let Some(cell) = self.cells.get_mut(&address) else {
            return false;
        };
        if cell.value == value {
            return false;
        }

        cell.value = value;
        self.versions.bump(address);
        self.render_cache.invalidate_cell(address);
        true
    }

    fn recalculate_dependents(&mut self, changed: &[CellAddress], stats: &mut CalculationStats) {
        for address in self.dependencies.recalc_order(changed) {
            if let Some(value) = self.evaluate_cell(address, stats) {
                self.commit_value(address, value);
            }
        }
    }

    /// Install every rejected formula whose edges no longer close a cycle
    fn retry_pending_circular(&mut self, stats: &mut CalculationStats) {
        loop {
            let mut pending: Vec<CellAddress> = self.pending_circular.iter().copied().collect();
            pending.sort_unstable();

            let mut resolved = Vec::new();
            for address in pending {
                let Some(precedents) = self.formula_precedents(address) else {
                    self.pending_circular.remove(&address);
                    continue;
                };
                if !self.dependencies.would_create_cycle(address, &precedents) {
                    self.install_formula(address, precedents, stats);
                    resolved.push(address);
                }
            }

            if resolved.is_empty() {
                break;
            }
            tracing::debug!(count = resolved.len(), "circular references resolved");
            self.recalculate_dependents(&resolved, stats);
        }
    }

    fn collect_garbage(&mut self, address: CellAddress) {
        if !self.options.garbage_collect {
            return;
        }

        let collectable = self.cells.get(&address).map_or(false, |cell| {
            cell.value.is_null() && !cell.has_formula() && !cell.is_parameter()
        }) && !self.dependencies.has_dependents(address);

        if collectable {
            self.cells.remove(&address);
            tracing::trace!(cell = %address, "empty cell removed");
        }
    }

    // === Full recalculation ===

    /// Re-derive every dependency edge and recalculate every formula
    ///
    /// Formulas are computed through the dirty-tracking DAG using the
    /// configured [`ExecutionMode`].
    pub fn recalculate_all(&mut self) -> Result<CalculationStats> {
        let mut stats = CalculationStats::default();
        self.rebuild_dependencies(&mut stats);

        let mut formula_cells: Vec<CellAddress> = self
            .cells
            .values()
            .filter(|cell| cell.ast.is_some() && !self.pending_circular.contains(&cell.address))
            .map(|cell| cell.address)
            .collect();
        formula_cells.sort_unstable();
        stats.formula_count = formula_cells.len() + self.pending_circular.len();

        let mut dag: DirtyGraph<CellAddress, CellValue> = DirtyGraph::new();
        for &address in &formula_cells {
            let value = self.cells.get(&address).map(|cell| cell.value.clone());
            dag.add_node(address, value.unwrap_or_default());
        }
        for &address in &formula_cells {
            let inputs = self.dependencies.precedents_among(address, &formula_cells);
            dag.update_dependencies(&address, inputs).map_err(dag_error)?;
        }

        let executor = Executor::new(self.options.execution_mode);
        let report = {
            let sheet = self.store();
            executor
                .run(&mut dag, |address, graph| {
                    match sheet.cells.get(address).and_then(|cell| cell.ast.as_ref()) {
                        Some(ast) => evaluate_formula(*address, ast, &DagStore { graph, sheet }),
                        None => graph.payload(address).cloned().unwrap_or_default(),
                    }
                })
                .map_err(dag_error)?
        };
        stats.batches = report.batches;

        for address in report.computed {
            if let Some(value) = dag.remove_node(&address) {
                stats.cells_calculated += 1;
                if value.is_error() {
                    stats.errors += 1;
                }
                self.commit_value(address, value);
            }
        }

        self.sync_plot_graphs();

        tracing::debug!(
            formulas = stats.formula_count,
            calculated = stats.cells_calculated,
            batches = stats.batches,
            circular = stats.circular_references,
            "full recalculation finished"
        );
        Ok(stats)
    }

    /// Rebuild the dependency graph from scratch, rejecting cycles in
    /// row-major order
    fn rebuild_dependencies(&mut self, stats: &mut CalculationStats) {
        self.dependencies.clear();
        self.pending_circular.clear();

        let mut formula_cells: Vec<CellAddress> = self
            .cells
            .values()
            .filter(|cell| cell.ast.is_some())
            .map(|cell| cell.address)
            .collect();
        formula_cells.sort_unstable();

        for address in formula_cells {
            let Some(precedents) = self.formula_precedents(address) else {
                continue;
            };
            if self.dependencies.would_create_cycle(address, &precedents) {
                self.reject_circular(address, stats);
            } else {
                self.dependencies.set_references(address, precedents);
            }
        }
    }

    // === Named ranges ===

    /// Define or redefine a named range and recalculate the sheet
    pub fn define_name(&mut self, name: &str, range: &str) -> Result<CalculationStats> {
        NamedRange::validate_name(name)?;
        let range = CellRange::parse(range)?;
        check_bounds(range.start)?;
        check_bounds(range.end)?;

        self.named_ranges
            .define_or_update(NamedRange::new(name, range))?;
        tracing::debug!(name, %range, "named range defined");
        self.recalculate_all()
    }

    /// Remove a named range and recalculate the sheet
    pub fn remove_name(&mut self, name: &str) -> Result<CalculationStats> {
        self.named_ranges
            .remove(name)
            .ok_or_else(|| Error::InvalidName(format!("'{}' is not defined", name)))?;
        tracing::debug!(name, "named range removed");
        self.recalculate_all()
    }

    // === Parameters ===

    /// Turn a cell into a parameter (slider) cell
    ///
    /// The cell keeps its numeric value clamped into the range, or takes
    /// `min`; a formula on the cell is replaced.
    pub fn set_parameter(&mut self, address: &str, range: ParameterRange) -> Result<CalculationStats> {
        let address = parse_address(address)?;
        let current = self
            .cells
            .get(&address)
            .and_then(|cell| cell.value.as_number())
            .unwrap_or(range.min);
        self.cells
            .entry(address)
            .or_insert_with(|| Cell::new(address))
            .parameter = Some(range);

        let mut stats = CalculationStats::default();
        self.write_literal(address, CellValue::Number(current));
        self.finish_write(address, &mut stats);
        Ok(stats)
    }

    /// Move a parameter cell to a new value, clamped and snapped to its step
    pub fn set_parameter_value(&mut self, address: &str, value: f64) -> Result<CalculationStats> {
        let address = parse_address(address)?;
        if !self.cells.get(&address).map_or(false, Cell::is_parameter) {
            return Err(Error::InvalidParameter(format!(
                "{} is not a parameter cell",
                address
            )));
        }

        let mut stats = CalculationStats::default();
        self.write_literal(address, CellValue::Number(value));
        self.finish_write(address, &mut stats);
        Ok(stats)
    }

    /// Remove the parameter marker of a cell, keeping its value
    pub fn clear_parameter(&mut self, address: &str) -> Result<bool> {
        let address = parse_address(address)?;
        let removed = self
            .cells
            .get_mut(&address)
            .and_then(|cell| cell.parameter.take())
            .is_some();
        if removed {
            self.collect_garbage(address);
        }
        Ok(removed)
    }
}

/// Evaluate a formula, turning failures into the cell's error marker
fn evaluate_formula(address: CellAddress, ast: &FormulaExpr, store: &dyn CellStore) -> CellValue {
    let ctx = EvaluationContext::new(store);
    match evaluate(ast, &ctx) {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!(cell = %address, error = %err, "evaluation failed");
            err.to_cell_value()
        }
    }
}

fn dag_error(err: DagError) -> Error {
    Error::Recalculation(err.to_string())
}

/// Reads freshly computed formula values from the DAG, everything else from
/// the sheet
struct DagStore<'a> {
    graph: &'a DirtyGraph<CellAddress, CellValue>,
    sheet: SheetStore<'a>,
}

impl CellStore for DagStore<'_> {
    fn get(&self, row: u32, col: u32) -> Option<&CellValue> {
        self.graph
            .payload(&CellAddress::new(row, col))
            .or_else(|| self.sheet.get(row, col))
    }

    fn named_range(&self, name: &str) -> Option<CellRange> {
        self.sheet.named_range(name)
    }
}
