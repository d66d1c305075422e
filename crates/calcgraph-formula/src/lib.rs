//! # calcgraph-formula
//!
//! Formula parser and evaluator shared by the grid and the graphing surface.
//!
//! This crate provides:
//! - Formula parsing (text → AST)
//! - Formula evaluation (AST → value) against a [`CellStore`], optionally with
//!   the graph variables `x`, `y`, `t` bound
//! - A function registry with a small built-in set
//! - The per-cell dependency graph used for recalculation ordering
//!
//! ## Example
//!
//! ```rust
//! use calcgraph_core::CellValue;
//! use calcgraph_formula::{evaluate, parse_formula, EvaluationContext, VariableBindings};
//!
//! let ast = parse_formula("=x^2 + 1").unwrap();
//! let vars = VariableBindings::new().with_x(3.0);
//! let ctx = EvaluationContext::simple().with_variables(&vars);
//! assert_eq!(evaluate(&ast, &ctx).unwrap(), CellValue::Number(10.0));
//! ```

pub mod ast;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;

pub use ast::{BinaryOperator, FormulaExpr, UnaryOperator};
pub use dependency::{extract_references, DependencyGraph, References, EXPANDED_RANGE_LIMIT};
pub use error::{EvaluationError, FormulaError, FormulaResult, SyntaxErrorKind};
pub use evaluator::{default_registry, evaluate, CellStore, EvaluationContext, VariableBindings};
pub use functions::graph::{PLOT_FUNCTION, PLOT_MARKER};
pub use functions::{FunctionDef, FunctionRegistry};
pub use parser::{parse_formula, FORMULA_SIGIL};
