//! Formula error types

use calcgraph_core::CellValue;
use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur during formula parsing or evaluation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// Malformed formula text
    #[error("Syntax error at position {position}: {kind}")]
    Syntax {
        kind: SyntaxErrorKind,
        /// Byte offset into the formula body (after the `=` sigil)
        position: usize,
    },

    /// Formula evaluation error
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

impl FormulaError {
    pub(crate) fn syntax(kind: SyntaxErrorKind, position: usize) -> Self {
        FormulaError::Syntax { kind, position }
    }

    /// Check if this is a syntax error
    pub fn is_syntax(&self) -> bool {
        matches!(self, FormulaError::Syntax { .. })
    }

    /// Convert into the error marker stored on a failing cell.
    ///
    /// A propagated marker is stored as is rather than wrapped a second time.
    pub fn to_cell_value(&self) -> CellValue {
        match self {
            FormulaError::Evaluation(EvaluationError::Propagated(marker)) => {
                CellValue::Text(marker.clone())
            }
            other => CellValue::error(other),
        }
    }
}

/// The ways formula text can be malformed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyntaxErrorKind {
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("unmatched parenthesis")]
    UnmatchedParenthesis,

    #[error("unexpected token {0}")]
    UnexpectedToken(String),

    #[error("unexpected end of formula")]
    UnexpectedEnd,

    #[error("invalid reference '{0}'")]
    InvalidReference(String),
}

/// Errors raised while evaluating an AST
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    /// A free variable that is neither a bound graph variable nor a named range
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    /// Function name not present in the registry
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Division by a numeric zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Wrong number of arguments
    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Invalid argument passed to a function
    #[error("Invalid argument for {function}: {message}")]
    InvalidArgument { function: String, message: String },

    /// An operand already held an error marker
    #[error("{0}")]
    Propagated(String),
}
