//! Row and column insertion and deletion
//!
//! Cells at or after the edit point move by one; cells on a deleted row or
//! column are dropped. Formula text is kept verbatim, so a moved formula reads
//! whatever now sits at the addresses it names. Dependency edges are derived
//! again from the new layout and the whole sheet is recalculated.

use crate::calculation::CalculationStats;
use crate::worksheet::Worksheet;
use ahash::AHashSet;
use calcgraph_core::{CellAddress, Error, Result, MAX_COLS, MAX_ROWS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dimension {
    Row,
    Column,
}

impl Dimension {
    fn index(self, address: CellAddress) -> u32 {
        match self {
            Dimension::Row => address.row,
            Dimension::Column => address.col,
        }
    }

    fn offset(self, address: CellAddress, delta: i64) -> Option<CellAddress> {
        match self {
            Dimension::Row => address.offset(delta, 0),
            Dimension::Column => address.offset(0, delta),
        }
    }

    fn check(self, index: u32) -> Result<()> {
        match self {
            Dimension::Row if index == 0 || index > MAX_ROWS => {
                Err(Error::RowOutOfBounds(index, MAX_ROWS))
            }
            Dimension::Column if index == 0 || index > MAX_COLS => {
                Err(Error::ColumnOutOfBounds(index, MAX_COLS))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit {
    Insert,
    Delete,
}

impl Worksheet {
    /// Insert an empty row before `row` (1-based)
    pub fn insert_row(&mut self, row: u32) -> Result<CalculationStats> {
        self.shift_cells(Dimension::Row, row, Edit::Insert)
    }

    /// Delete `row` (1-based), moving the rows below it up
    pub fn delete_row(&mut self, row: u32) -> Result<CalculationStats> {
        self.shift_cells(Dimension::Row, row, Edit::Delete)
    }

    /// Insert an empty column before `col` (1-based)
    pub fn insert_column(&mut self, col: u32) -> Result<CalculationStats> {
        self.shift_cells(Dimension::Column, col, Edit::Insert)
    }

    /// Delete `col` (1-based), moving the columns after it left
    pub fn delete_column(&mut self, col: u32) -> Result<CalculationStats> {
        self.shift_cells(Dimension::Column, col, Edit::Delete)
    }

    fn shift_cells(&mut self, dimension: Dimension, at: u32, edit: Edit) -> Result<CalculationStats> {
        dimension.check(at)?;

        let cells = std::mem::take(&mut self.cells);
        let mut touched: AHashSet<CellAddress> = AHashSet::new();
        let mut dropped = 0usize;

        for (address, mut cell) in cells {
            let index = dimension.index(address);
            let target = match edit {
                Edit::Insert if index >= at => dimension.offset(address, 1),
                Edit::Delete if index == at => None,
                Edit::Delete if index > at => dimension.offset(address, -1),
                _ => Some(address),
            };

            match target {
                Some(target) if target == address => {
                    self.cells.insert(address, cell);
                }
                Some(target) => {
                    touched.insert(address);
                    touched.insert(target);
                    cell.address = target;
                    self.cells.insert(target, cell);
                }
                None => {
                    touched.insert(address);
                    dropped += 1;
                }
            }
        }

        // Every address whose content changed gets a new version
        for address in touched {
            self.versions.bump(address);
        }
        self.render_cache.clear();

        tracing::debug!(?dimension, at, ?edit, dropped, "cells shifted");
        self.recalculate_all()
    }
}
