//! Named range definitions
//!
//! Named ranges give a rectangular block of cells a meaningful name that can be
//! used as a free variable inside formulas.
//!
//! # Example
//!
//! ```text
//! // Define a named range "Prices" that refers to A1:A10
//! sheet.define_name("Prices", "A1:A10")?;
//!
//! // Use it in a formula
//! =SUM(Prices)
//! ```

use crate::cell::CellRange;
use crate::error::{Error, Result};
use ahash::AHashMap;

/// A named range definition
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NamedRange {
    /// The name as the user spelled it (lookups are case-insensitive)
    pub name: String,
    /// The cells the name refers to
    pub range: CellRange,
    /// Optional comment/description for documentation
    pub comment: Option<String>,
}

impl NamedRange {
    /// Create a new named range
    pub fn new(name: impl Into<String>, range: CellRange) -> Self {
        Self {
            name: name.into(),
            range,
            comment: None,
        }
    }

    /// Set a comment for this named range
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Check that a name is usable as a formula identifier.
    ///
    /// Names start with a letter or underscore, contain only alphanumerics and
    /// underscores, and must not look like a cell reference or a graph variable.
    pub fn validate_name(name: &str) -> Result<()> {
        let mut chars = name.chars();
        let valid_start = chars
            .next()
            .map_or(false, |c| c.is_ascii_alphabetic() || c == '_');
        if !valid_start || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::InvalidName(format!("'{}' is not an identifier", name)));
        }

        let letters = name.trim_end_matches(|c: char| c.is_ascii_digit());
        let looks_like_cell = letters.len() < name.len()
            && !letters.is_empty()
            && letters.chars().all(|c| c.is_ascii_alphabetic());
        if looks_like_cell {
            return Err(Error::InvalidName(format!(
                "'{}' collides with a cell reference",
                name
            )));
        }

        if ["x", "y", "t"].iter().any(|v| name.eq_ignore_ascii_case(v)) {
            return Err(Error::InvalidName(format!(
                "'{}' is reserved for graph variables",
                name
            )));
        }

        Ok(())
    }
}

/// Collection of named ranges with case-insensitive lookup
#[derive(Debug, Default, Clone)]
pub struct NamedRangeCollection {
    /// Named ranges keyed by lowercase name
    ranges: AHashMap<String, NamedRange>,
}

impl NamedRangeCollection {
    /// Create a new empty collection
    pub fn new() -> Self {
        Self::default()
    }

    fn make_key(name: &str) -> String {
        name.to_lowercase()
    }

    /// Define a new named range
    ///
    /// Returns an error if the name is invalid or already defined
    pub fn define(&mut self, range: NamedRange) -> Result<()> {
        NamedRange::validate_name(&range.name)?;
        let key = Self::make_key(&range.name);

        if self.ranges.contains_key(&key) {
            return Err(Error::InvalidName(format!(
                "Named range '{}' already exists",
                range.name
            )));
        }

        self.ranges.insert(key, range);
        Ok(())
    }

    /// Define or update a named range
    pub fn define_or_update(&mut self, range: NamedRange) -> Result<()> {
        NamedRange::validate_name(&range.name)?;
        let key = Self::make_key(&range.name);
        self.ranges.insert(key, range);
        Ok(())
    }

    /// Get a named range by name
    pub fn get(&self, name: &str) -> Option<&NamedRange> {
        self.ranges.get(&Self::make_key(name))
    }

    /// Remove a named range
    pub fn remove(&mut self, name: &str) -> Option<NamedRange> {
        self.ranges.remove(&Self::make_key(name))
    }

    /// Check if a name exists
    pub fn contains(&self, name: &str) -> bool {
        self.ranges.contains_key(&Self::make_key(name))
    }

    /// Iterate over all named ranges
    pub fn iter(&self) -> impl Iterator<Item = &NamedRange> {
        self.ranges.values()
    }

    /// Get the number of named ranges
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Check if the collection is empty
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}
