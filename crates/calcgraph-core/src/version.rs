//! Per-cell version counters
//!
//! Every cell address carries a monotonically increasing counter that is bumped
//! exactly once per change of the cell's stored value. Caches record a
//! [`VersionSnapshot`] of the cells they read and compare it against the live
//! counters instead of re-evaluating anything.

use crate::cell::CellAddress;
use ahash::AHashMap;

/// Version counters keyed by cell address
///
/// An address that was never written has version 0.
#[derive(Debug, Default, Clone)]
pub struct CellVersions {
    versions: AHashMap<CellAddress, u64>,
}

impl CellVersions {
    /// Create an empty counter table
    pub fn new() -> Self {
        Self::default()
    }

    /// Current version of a cell
    pub fn get(&self, address: CellAddress) -> u64 {
        self.versions.get(&address).copied().unwrap_or(0)
    }

    /// Increment the version of a cell, returning the new version
    pub fn bump(&mut self, address: CellAddress) -> u64 {
        let version = self.versions.entry(address).or_insert(0);
        *version += 1;
        *version
    }

    /// Capture the current versions of a set of cells
    pub fn snapshot<I>(&self, cells: I) -> VersionSnapshot
    where
        I: IntoIterator<Item = CellAddress>,
    {
        let mut entries: Vec<(CellAddress, u64)> =
            cells.into_iter().map(|addr| (addr, self.get(addr))).collect();
        entries.sort_unstable();
        entries.dedup();
        VersionSnapshot { entries }
    }
}

/// The versions of a fixed set of cells at one point in time
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VersionSnapshot {
    entries: Vec<(CellAddress, u64)>,
}

impl VersionSnapshot {
    /// Check that every captured cell still has the captured version
    pub fn is_current(&self, versions: &CellVersions) -> bool {
        self.entries
            .iter()
            .all(|&(addr, version)| versions.get(addr) == version)
    }

    /// Check whether the snapshot covers a cell
    pub fn covers(&self, address: CellAddress) -> bool {
        self.entries
            .binary_search_by(|(addr, _)| addr.cmp(&address))
            .is_ok()
    }

    /// Iterate over the captured `(cell, version)` pairs in row-major order
    pub fn iter(&self) -> impl Iterator<Item = (CellAddress, u64)> + '_ {
        self.entries.iter().copied()
    }

    /// Number of cells captured
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the snapshot covers no cells
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
