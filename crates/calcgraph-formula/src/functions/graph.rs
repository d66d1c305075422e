//! Graph functions
//!
//! `POINT` builds a coordinate tuple usable by parametric graphs and data
//! plots. `PLOT` only marks its cell as a graph source: the plotting layer
//! evaluates its arguments itself, so the cell just shows a marker.

use super::number_arg;
use crate::error::FormulaResult;
use calcgraph_core::CellValue;

/// Name of the function whose cells are synchronized into graph definitions
pub const PLOT_FUNCTION: &str = "PLOT";

/// Value displayed by a cell holding a `PLOT` formula
pub const PLOT_MARKER: &str = "[PLOT]";

/// POINT(x, y, [z]) → a one-row array of coordinates
pub fn fn_point(args: &[CellValue]) -> FormulaResult<CellValue> {
    let coords = (0..args.len())
        .map(|i| number_arg(args, i).map(CellValue::Number))
        .collect::<FormulaResult<Vec<_>>>()?;
    Ok(CellValue::Array(vec![coords]))
}

/// PLOT(series, ...) → the plot marker
pub fn fn_plot(_args: &[CellValue]) -> FormulaResult<CellValue> {
    Ok(CellValue::text(PLOT_MARKER))
}
