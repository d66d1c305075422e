//! Prelude module - common imports for calcgraph users
//!
//! ```rust
//! use calcgraph::prelude::*;
//! ```

pub use crate::{
    // Graph types
    Bounds,
    // Calculation types
    CalculationOptions,
    CalculationStats,
    // Cell types
    CellAddress,
    CellRange,
    CellValue,
    // Error types
    Error,
    ExecutionMode,
    GraphId,
    GraphKind,
    ParameterRange,
    Point,
    Result,
    SamplingOptions,
    // Main types
    Workbook,
    Worksheet,
};
