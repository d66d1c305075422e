//! Worksheet type
//!
//! A worksheet owns its cells, the dependency graph between them, the cell
//! version counters, the graphs drawn from its data and the render cache that
//! holds their sampled points. Writes go through [`crate::calculation`];
//! this module holds the data model and the read side.

use crate::calculation::CalculationOptions;
use ahash::{AHashMap, AHashSet};
use calcgraph_core::{
    CellAddress, CellRange, CellValue, CellVersions, Error, NamedRangeCollection, Result,
    MAX_COLS, MAX_ROWS,
};
use calcgraph_formula::{CellStore, DependencyGraph, FormulaExpr};
use calcgraph_plot::{GraphDefinition, GraphId, RenderCache};
use std::collections::BTreeMap;

/// Slider bounds for a parameter cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl ParameterRange {
    /// Create a parameter range; `min <= max` and `step > 0`, all finite
    pub fn new(min: f64, max: f64, step: f64) -> Result<Self> {
        if !(min.is_finite() && max.is_finite() && step.is_finite()) {
            return Err(Error::InvalidParameter("bounds must be finite".into()));
        }
        if min > max {
            return Err(Error::InvalidParameter(format!(
                "min {} is greater than max {}",
                min, max
            )));
        }
        if step <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "step must be positive, got {}",
                step
            )));
        }
        Ok(Self { min, max, step })
    }

    /// Clamp a value into the range and snap it to the nearest step from `min`
    pub fn snap(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return self.min;
        }
        let clamped = value.clamp(self.min, self.max);
        let steps = ((clamped - self.min) / self.step).round();
        let snapped = self.min + steps * self.step;
        if snapped > self.max {
            snapped - self.step
        } else {
            snapped
        }
    }
}

/// A single cell
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub address: CellAddress,
    /// Raw formula text including the `=` sigil
    pub formula: Option<String>,
    /// Parsed formula; `None` when there is no formula or it failed to parse
    pub ast: Option<FormulaExpr>,
    pub value: CellValue,
    /// Display format string, not interpreted by the engine
    pub format: Option<String>,
    pub parameter: Option<ParameterRange>,
}

impl Cell {
    pub fn new(address: CellAddress) -> Self {
        Self {
            address,
            formula: None,
            ast: None,
            value: CellValue::Null,
            format: None,
            parameter: None,
        }
    }

    /// Check if the cell holds a formula (parsed or not)
    pub fn has_formula(&self) -> bool {
        self.formula.is_some()
    }

    pub fn is_parameter(&self) -> bool {
        self.parameter.is_some()
    }
}

/// A worksheet
#[derive(Debug)]
pub struct Worksheet {
    /// Sheet name
    pub(crate) name: String,
    pub(crate) cells: AHashMap<CellAddress, Cell>,
    pub(crate) graphs: BTreeMap<GraphId, GraphDefinition>,
    pub(crate) named_ranges: NamedRangeCollection,
    pub(crate) dependencies: DependencyGraph,
    pub(crate) versions: CellVersions,
    pub(crate) render_cache: RenderCache,
    /// Formula cells rejected for closing a cycle; retried after later writes
    pub(crate) pending_circular: AHashSet<CellAddress>,
    pub(crate) next_graph_id: u32,
    pub(crate) options: CalculationOptions,
}

impl Worksheet {
    /// Create a new worksheet with the given name
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self::with_options(name, CalculationOptions::default())
    }

    /// Create a new worksheet with custom calculation options
    pub fn with_options<S: Into<String>>(name: S, options: CalculationOptions) -> Self {
        Self {
            name: name.into(),
            cells: AHashMap::new(),
            graphs: BTreeMap::new(),
            named_ranges: NamedRangeCollection::new(),
            dependencies: DependencyGraph::new(),
            versions: CellVersions::new(),
            render_cache: RenderCache::new(),
            pending_circular: AHashSet::new(),
            next_graph_id: 1,
            options,
        }
    }

    /// Get the sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    pub fn options(&self) -> &CalculationOptions {
        &self.options
    }

    /// Replace the calculation options
    ///
    /// Sampling defaults are part of the render cache key, so cached points
    /// for the old defaults simply stop matching.
    pub fn set_options(&mut self, options: CalculationOptions) {
        self.options = options;
    }

    // === Cell access ===

    /// Get a cell
    pub fn cell(&self, address: CellAddress) -> Option<&Cell> {
        self.cells.get(&address)
    }

    /// Get a cell by 1-based row and column
    pub fn cell_at(&self, row: u32, col: u32) -> Option<&Cell> {
        self.cell(CellAddress::new(row, col))
    }

    /// Get the value at an A1-style address; invalid or empty addresses give `None`
    pub fn value(&self, address: &str) -> Option<&CellValue> {
        let address = CellAddress::parse(address).ok()?;
        self.cell(address).map(|cell| &cell.value)
    }

    /// Get the value at a 1-based row and column
    pub fn value_at(&self, row: u32, col: u32) -> Option<&CellValue> {
        self.cell_at(row, col).map(|cell| &cell.value)
    }

    /// Get the raw formula text of a cell
    pub fn formula(&self, address: &str) -> Option<&str> {
        let address = CellAddress::parse(address).ok()?;
        self.cell(address)?.formula.as_deref()
    }

    /// Iterate over every stored cell in row-major order
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        let mut cells: Vec<&Cell> = self.cells.values().collect();
        cells.sort_by_key(|cell| cell.address);
        cells.into_iter()
    }

    /// Number of stored cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Cells the given cell reads, row-major
    pub fn precedents(&self, address: CellAddress) -> Vec<CellAddress> {
        let mut cells: Vec<CellAddress> = self.dependencies.precedents(address).collect();
        cells.sort_unstable();
        cells
    }

    /// Cells that read the given cell, row-major
    pub fn dependents(&self, address: CellAddress) -> Vec<CellAddress> {
        let mut cells: Vec<CellAddress> = self.dependencies.dependents(address).collect();
        cells.sort_unstable();
        cells
    }

    /// Check whether a formula cell was rejected for closing a cycle
    pub fn is_pending_circular(&self, address: CellAddress) -> bool {
        self.pending_circular.contains(&address)
    }

    pub fn dependency_graph(&self) -> &DependencyGraph {
        &self.dependencies
    }

    /// Current version counter of a cell
    pub fn version(&self, address: CellAddress) -> u64 {
        self.versions.get(address)
    }

    pub fn versions(&self) -> &CellVersions {
        &self.versions
    }

    pub fn named_ranges(&self) -> &NamedRangeCollection {
        &self.named_ranges
    }

    pub fn render_cache(&self) -> &RenderCache {
        &self.render_cache
    }

    /// A read-only view used to evaluate formulas against this sheet
    pub fn store(&self) -> SheetStore<'_> {
        SheetStore {
            cells: &self.cells,
            named_ranges: &self.named_ranges,
        }
    }

    // === Cell formatting ===

    /// Set or clear the display format of a cell
    pub fn set_cell_format(&mut self, address: &str, format: Option<&str>) -> Result<()> {
        let address = parse_address(address)?;
        match format {
            Some(format) => {
                self.cells
                    .entry(address)
                    .or_insert_with(|| Cell::new(address))
                    .format = Some(format.to_string());
            }
            None => {
                if let Some(cell) = self.cells.get_mut(&address) {
                    cell.format = None;
                }
            }
        }
        Ok(())
    }
}

/// Borrowed view of a sheet's cells and names implementing [`CellStore`]
///
/// Built from disjoint fields so the render cache can be borrowed mutably
/// while formulas read the cells.
#[derive(Debug, Clone, Copy)]
pub struct SheetStore<'a> {
    pub(crate) cells: &'a AHashMap<CellAddress, Cell>,
    pub(crate) named_ranges: &'a NamedRangeCollection,
}

impl CellStore for SheetStore<'_> {
    fn get(&self, row: u32, col: u32) -> Option<&CellValue> {
        self.cells
            .get(&CellAddress::new(row, col))
            .map(|cell| &cell.value)
    }

    fn named_range(&self, name: &str) -> Option<CellRange> {
        self.named_ranges.get(name).map(|named| named.range)
    }
}

impl CellStore for Worksheet {
    fn get(&self, row: u32, col: u32) -> Option<&CellValue> {
        self.value_at(row, col)
    }

    fn named_range(&self, name: &str) -> Option<CellRange> {
        self.named_ranges.get(name).map(|named| named.range)
    }
}

/// Parse an A1 address and check it lies on the grid
pub(crate) fn parse_address(address: &str) -> Result<CellAddress> {
    let address = CellAddress::parse(address)?;
    check_bounds(address)?;
    Ok(address)
}

pub(crate) fn check_bounds(address: CellAddress) -> Result<()> {
    if address.row == 0 || address.row > MAX_ROWS {
        return Err(Error::RowOutOfBounds(address.row, MAX_ROWS));
    }
    if address.col == 0 || address.col > MAX_COLS {
        return Err(Error::ColumnOutOfBounds(address.col, MAX_COLS));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_snap() {
        let range = ParameterRange::new(0.0, 1.0, 0.25).unwrap();
        assert_eq!(range.snap(0.3), 0.25);
        assert_eq!(range.snap(0.4), 0.5);
        assert_eq!(range.snap(-3.0), 0.0);
        assert_eq!(range.snap(7.0), 1.0);
        assert_eq!(range.snap(f64::NAN), 0.0);

        // max is not a whole number of steps away from min
        let range = ParameterRange::new(0.0, 1.0, 0.6).unwrap();
        assert_eq!(range.snap(1.0), 0.6);
        assert_eq!(range.snap(0.2), 0.0);
    }

    #[test]
    fn test_parameter_validation() {
        assert!(ParameterRange::new(1.0, 0.0, 0.1).is_err());
        assert!(ParameterRange::new(0.0, 1.0, 0.0).is_err());
        assert!(ParameterRange::new(0.0, f64::INFINITY, 0.1).is_err());
    }

    #[test]
    fn test_cell_format() {
        let mut sheet = Worksheet::new("Sheet1");
        sheet.set_cell_format("B2", Some("0.00")).unwrap();
        assert_eq!(sheet.cell_at(2, 2).unwrap().format.as_deref(), Some("0.00"));
        assert_eq!(sheet.value("B2"), Some(&CellValue::Null));

        sheet.set_cell_format("B2", None).unwrap();
        assert_eq!(sheet.cell_at(2, 2).unwrap().format, None);
        assert!(sheet.set_cell_format("A0", None).is_err());
    }

    #[test]
    fn test_bounds() {
        assert!(parse_address("XFD1048576").is_ok());
        assert!(parse_address("XFE1").is_err());
        assert!(parse_address("A1048577").is_err());
    }
}
