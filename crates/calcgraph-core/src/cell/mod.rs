//! Cell-related types and utilities
//!
//! This module contains:
//! - [`CellAddress`] - A cell's location (e.g., "A1"), 1-based
//! - [`CellRange`] - A rectangular range of cells (e.g., "A1:B10")
//! - [`CellValue`] - The value stored in a cell

mod address;
mod value;

pub use address::{CellAddress, CellRange, CellRangeIterator};
pub use value::{CellValue, ERROR_PREFIX};
