//! Formula Abstract Syntax Tree types

use calcgraph_core::{CellAddress, CellRange, CellValue};
use std::fmt;

/// Formula expression AST
///
/// Every node owns its children exclusively; trees are immutable once parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    /// Literal number, text or boolean
    Literal(CellValue),

    /// Single cell reference
    CellRef(CellAddress),
    /// Rectangular range reference
    Range(CellRange),
    /// Free variable: a graph variable (`x`, `y`, `t`) or a named range
    Variable(String),

    /// Function call, name upper-cased at parse time
    Function {
        name: String,
        args: Vec<FormulaExpr>,
    },

    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },
    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<FormulaExpr>,
    },
}

impl FormulaExpr {
    /// Numeric literal
    pub fn number(n: f64) -> Self {
        FormulaExpr::Literal(CellValue::Number(n))
    }

    /// Text literal
    pub fn text<S: Into<String>>(s: S) -> Self {
        FormulaExpr::Literal(CellValue::Text(s.into()))
    }

    /// Build a binary operation node
    pub fn binary(op: BinaryOperator, left: FormulaExpr, right: FormulaExpr) -> Self {
        FormulaExpr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Name of the top-level function call, if the expression is one
    pub fn top_level_function(&self) -> Option<&str> {
        match self {
            FormulaExpr::Function { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Check whether any node of the tree is a free variable with this name
    /// (case-insensitive)
    pub fn mentions_variable(&self, variable: &str) -> bool {
        match self {
            FormulaExpr::Variable(name) => name.eq_ignore_ascii_case(variable),
            FormulaExpr::Function { args, .. } => {
                args.iter().any(|arg| arg.mentions_variable(variable))
            }
            FormulaExpr::BinaryOp { left, right, .. } => {
                left.mentions_variable(variable) || right.mentions_variable(variable)
            }
            FormulaExpr::UnaryOp { operand, .. } => operand.mentions_variable(variable),
            FormulaExpr::Literal(_) | FormulaExpr::CellRef(_) | FormulaExpr::Range(_) => false,
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Text
    Concat,
}

impl BinaryOperator {
    /// The operator as written in formula text
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Power => "^",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::Concat => "&",
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Plus,
}
