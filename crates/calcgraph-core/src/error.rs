//! Errors returned by workbook, worksheet and graph operations
//!
//! Formula failures do not show up here: they are stored in the cell as an
//! error marker and flow to dependents as values.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Text that is not an A1 address
    #[error("bad cell address: {0}")]
    InvalidAddress(String),

    #[error("bad cell range: {0}")]
    InvalidRange(String),

    /// Row outside `1..=max`
    #[error("row {0} is outside 1..={1}")]
    RowOutOfBounds(u32, u32),

    /// Column outside `1..=max`
    #[error("column {0} is outside 1..={1}")]
    ColumnOutOfBounds(u32, u32),

    /// Worksheet index past the end of the workbook
    #[error("no worksheet at index {0}, the workbook has {1}")]
    SheetOutOfBounds(usize, usize),

    #[error("bad worksheet name: {0}")]
    InvalidSheetName(String),

    #[error("a worksheet named '{0}' already exists")]
    DuplicateSheetName(String),

    #[error("a workbook keeps at least one worksheet")]
    LastWorksheet,

    /// Named range that cannot be defined or resolved
    #[error("bad name: {0}")]
    InvalidName(String),

    #[error("no graph {0} on this worksheet")]
    GraphNotFound(String),

    /// Graphs synthesized from `PLOT` cells change only through their cell
    #[error("graph {0} follows a PLOT cell and cannot be edited directly")]
    DerivedGraph(String),

    /// Empty or non-finite sampling interval
    #[error("bad sampling bounds: {0}")]
    InvalidBounds(String),

    /// Slider range or value that cannot be applied
    #[error("bad parameter: {0}")]
    InvalidParameter(String),

    #[error("graph formula does not parse: {0}")]
    GraphFormula(String),

    /// The recalculation DAG rejected the formula cells
    #[error("recalculation failed: {0}")]
    Recalculation(String),
}
