//! Cell value types

use std::fmt;

/// Reserved prefix of every error marker value.
///
/// Parse, evaluation and cycle failures are stored on the failing cell as a
/// text value starting with this prefix, e.g. `#ERROR: Division by zero`.
pub const ERROR_PREFIX: &str = "#ERROR";

/// Represents the value stored in a cell
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellValue {
    /// Empty cell (no value)
    #[default]
    Null,

    /// Numeric value
    Number(f64),

    /// Text value (error markers are text values with [`ERROR_PREFIX`])
    Text(String),

    /// Boolean value
    Boolean(bool),

    /// Rectangular array of values, row-major (produced by range reads)
    Array(Vec<Vec<CellValue>>),
}

impl CellValue {
    /// Create a new text value
    pub fn text<S: Into<String>>(s: S) -> Self {
        CellValue::Text(s.into())
    }

    /// Create an error marker carrying a message
    pub fn error<S: fmt::Display>(message: S) -> Self {
        CellValue::Text(format!("{}: {}", ERROR_PREFIX, message))
    }

    /// Interpret raw user input that does not start with the formula sigil.
    ///
    /// Empty input is [`CellValue::Null`], numeric input becomes a number,
    /// `TRUE`/`FALSE` (any case) become booleans, everything else is text.
    pub fn from_input(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return CellValue::Null;
        }
        if let Some(n) = trimmed.parse::<f64>().ok().filter(|n| n.is_finite()) {
            return CellValue::Number(n);
        }
        match trimmed.to_ascii_uppercase().as_str() {
            "TRUE" => CellValue::Boolean(true),
            "FALSE" => CellValue::Boolean(false),
            _ => CellValue::Text(input.to_string()),
        }
    }

    /// Check if the cell is empty
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Check if the value is an error marker
    pub fn is_error(&self) -> bool {
        matches!(self, CellValue::Text(s) if s.starts_with(ERROR_PREFIX))
    }

    /// Get the error marker text if this is one
    pub fn error_message(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) if s.starts_with(ERROR_PREFIX) => Some(s),
            _ => None,
        }
    }

    /// Get the value as a number without coercion
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the value as text without coercion
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Coerce to a number for arithmetic.
    ///
    /// Numbers pass through; booleans become 0/1; text parses as a float or
    /// becomes 0; null becomes 0; arrays take their first element (empty → 0).
    pub fn to_number(&self) -> f64 {
        match self {
            CellValue::Number(n) => *n,
            CellValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            CellValue::Text(s) => s.trim().parse().unwrap_or(0.0),
            CellValue::Null => 0.0,
            CellValue::Array(rows) => rows
                .iter()
                .flatten()
                .next()
                .map(CellValue::to_number)
                .unwrap_or(0.0),
        }
    }

    /// Coerce to a boolean (non-zero numbers and "TRUE" are true)
    pub fn to_bool(&self) -> bool {
        match self {
            CellValue::Boolean(b) => *b,
            CellValue::Text(s) => s.eq_ignore_ascii_case("TRUE") || self.to_number() != 0.0,
            other => other.to_number() != 0.0,
        }
    }

    /// Stringify for concatenation and display
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Number(n) => format_number(*n),
            CellValue::Text(s) => s.clone(),
            CellValue::Boolean(true) => "TRUE".to_string(),
            CellValue::Boolean(false) => "FALSE".to_string(),
            CellValue::Null => String::new(),
            CellValue::Array(rows) => rows
                .iter()
                .flatten()
                .map(CellValue::to_text)
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// Iterate over every scalar of an array value (row-major), or the value itself
    pub fn scalars(&self) -> Box<dyn Iterator<Item = &CellValue> + '_> {
        match self {
            CellValue::Array(rows) => Box::new(rows.iter().flatten().flat_map(|v| v.scalars())),
            other => Box::new(std::iter::once(other)),
        }
    }

    /// Get the type name (for error messages)
    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Null => "null",
            CellValue::Number(_) => "number",
            CellValue::Text(_) => "text",
            CellValue::Boolean(_) => "boolean",
            CellValue::Array(_) => "array",
        }
    }
}

/// Format a number without a trailing `.0` for integral values
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Number(f64::from(n))
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_coercion() {
        assert_eq!(CellValue::Number(2.5).to_number(), 2.5);
        assert_eq!(CellValue::Boolean(true).to_number(), 1.0);
        assert_eq!(CellValue::Boolean(false).to_number(), 0.0);
        assert_eq!(CellValue::text("3.25").to_number(), 3.25);
        assert_eq!(CellValue::text("abc").to_number(), 0.0);
        assert_eq!(CellValue::Null.to_number(), 0.0);
        assert_eq!(CellValue::Array(vec![]).to_number(), 0.0);
        assert_eq!(
            CellValue::Array(vec![vec![CellValue::Number(7.0), CellValue::Number(8.0)]])
                .to_number(),
            7.0
        );
    }

    #[test]
    fn test_to_text() {
        assert_eq!(CellValue::Number(42.0).to_text(), "42");
        assert_eq!(CellValue::Number(0.5).to_text(), "0.5");
        assert_eq!(CellValue::Boolean(true).to_text(), "TRUE");
        assert_eq!(CellValue::Null.to_text(), "");
        assert_eq!(
            CellValue::Array(vec![
                vec![CellValue::Number(1.0)],
                vec![CellValue::Number(2.0)]
            ])
            .to_text(),
            "1,2"
        );
    }

    #[test]
    fn test_error_marker() {
        let err = CellValue::error("Division by zero");
        assert!(err.is_error());
        assert_eq!(err.error_message(), Some("#ERROR: Division by zero"));
        assert!(!CellValue::text("fine").is_error());
        assert!(!CellValue::Number(1.0).is_error());
    }

    #[test]
    fn test_from_input() {
        assert_eq!(CellValue::from_input(""), CellValue::Null);
        assert_eq!(CellValue::from_input("  "), CellValue::Null);
        assert_eq!(CellValue::from_input("12"), CellValue::Number(12.0));
        assert_eq!(CellValue::from_input("-0.5"), CellValue::Number(-0.5));
        assert_eq!(CellValue::from_input("true"), CellValue::Boolean(true));
        assert_eq!(CellValue::from_input("hello"), CellValue::text("hello"));
    }

    #[test]
    fn test_scalars_flattens_nested_arrays() {
        let value = CellValue::Array(vec![
            vec![CellValue::Number(1.0), CellValue::Number(2.0)],
            vec![CellValue::Array(vec![vec![CellValue::Number(3.0)]])],
        ]);
        let numbers: Vec<f64> = value.scalars().map(CellValue::to_number).collect();
        assert_eq!(numbers, vec![1.0, 2.0, 3.0]);
    }
}
