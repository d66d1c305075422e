//! # calcgraph
//!
//! A reactive calculation substrate shared by a cell grid and a function
//! plotter.
//!
//! Cells hold literal values or formulas; graphs are written in the same
//! formula language and evaluated over the free variables `x`, `y` and `t`.
//! Every write recalculates exactly the cells that depend on it, and sampled
//! graph points are cached against the versions of the cells they read.
//!
//! ## Features
//!
//! - Formula parsing and evaluation with a small built-in function set
//! - Per-cell dependency tracking with cycle rejection
//! - Full recalculation through a dirty-tracking DAG, optionally level-parallel
//! - Function, parametric, implicit, scatter and `PLOT(...)` data graphs
//! - Row/column insertion and deletion, named ranges and parameter cells
//!
//! ## Example
//!
//! ```rust
//! use calcgraph::prelude::*;
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.active_worksheet_mut();
//!
//! sheet.set_cell_input("A1", "2").unwrap();
//! sheet.set_cell_input("B1", "=A1^3").unwrap();
//! assert_eq!(sheet.value("B1"), Some(&CellValue::Number(8.0)));
//!
//! // A graph reading A1 is resampled only after A1 changes
//! let graph = sheet.add_graph("A1*x").unwrap();
//! let first = sheet.sample_graph(graph).unwrap();
//! let again = sheet.sample_graph(graph).unwrap();
//! assert!(std::sync::Arc::ptr_eq(&first, &again));
//! ```

pub mod calculation;
pub mod graphs;
pub mod prelude;
pub mod structure;
pub mod workbook;
pub mod worksheet;

// Re-export calculation types
pub use calculation::{CalculationOptions, CalculationStats, CIRCULAR_REFERENCE};
pub use workbook::Workbook;
pub use worksheet::{Cell, ParameterRange, SheetStore, Worksheet};

// Re-export core types
pub use calcgraph_core::{
    CellAddress, CellRange, CellValue, CellVersions, Error, NamedRange, NamedRangeCollection,
    Result, VersionSnapshot, ERROR_PREFIX, MAX_COLS, MAX_ROWS, MAX_SHEET_NAME_LEN,
};

// Re-export formula types
pub use calcgraph_formula::{
    evaluate, parse_formula, CellStore, DependencyGraph, EvaluationContext, EvaluationError,
    FormulaError, FormulaExpr, FormulaResult, FunctionRegistry, SyntaxErrorKind,
    VariableBindings,
};

// Re-export DAG types
pub use calcgraph_dag::{DagError, DirtyGraph, ExecutionMode, ExecutionReport, Executor};

// Re-export graph types
pub use calcgraph_plot::{
    Bounds, CacheStats, GraphDefinition, GraphId, GraphKind, Point, RenderCache, SampledGraph,
    SamplingOptions,
};
