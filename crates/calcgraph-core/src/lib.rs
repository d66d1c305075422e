//! # calcgraph-core
//!
//! Core data structures shared by the grid and the graphing surface.
//!
//! This crate provides:
//! - [`CellAddress`] and [`CellRange`] - 1-based cell addressing and the column codec
//! - [`CellValue`] - The tagged value stored in a cell, including error markers
//! - [`NamedRangeCollection`] - Case-insensitive named ranges
//! - [`CellVersions`] - Per-cell version counters used for cache invalidation
//!
//! ## Example
//!
//! ```rust
//! use calcgraph_core::{CellAddress, CellValue};
//!
//! let addr = CellAddress::parse("AA10").unwrap();
//! assert_eq!(addr.col, 27);
//! assert_eq!(addr.row, 10);
//!
//! let value = CellValue::from("3.5");
//! assert_eq!(value.to_number(), 3.5);
//! ```

pub mod cell;
pub mod error;
pub mod named_range;
pub mod version;

pub use cell::{CellAddress, CellRange, CellValue, ERROR_PREFIX};
pub use error::{Error, Result};
pub use named_range::{NamedRange, NamedRangeCollection};
pub use version::{CellVersions, VersionSnapshot};

/// Maximum number of rows in a worksheet
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet
pub const MAX_COLS: u32 = 16_384;

/// Maximum length of a worksheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
