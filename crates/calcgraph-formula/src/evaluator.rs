//! Formula evaluator
//!
//! Evaluates formula ASTs against a cell store and an optional set of graph
//! variable bindings.

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};
use crate::error::{EvaluationError, FormulaResult};
use crate::functions::FunctionRegistry;
use calcgraph_core::{CellRange, CellValue};
use std::cmp::Ordering;
use std::sync::OnceLock;

/// Global function registry (lazily initialized)
static FUNCTION_REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();

/// The registry of built-in functions shared by every evaluation context
pub fn default_registry() -> &'static FunctionRegistry {
    FUNCTION_REGISTRY.get_or_init(FunctionRegistry::new)
}

/// Read access to the cells a formula may reference
///
/// Implemented by the worksheet and by the layered stores used during a full
/// recalculation.
pub trait CellStore {
    /// Current value of the cell at `(row, col)`, `None` if it does not exist
    fn get(&self, row: u32, col: u32) -> Option<&CellValue>;

    /// Resolve a named range (case-insensitive)
    fn named_range(&self, _name: &str) -> Option<CellRange> {
        None
    }
}

/// Values bound to the graph variables `x`, `y` and `t`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VariableBindings {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub t: Option<f64>,
}

impl VariableBindings {
    /// No variables bound
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_x(mut self, x: f64) -> Self {
        self.x = Some(x);
        self
    }

    pub fn with_y(mut self, y: f64) -> Self {
        self.y = Some(y);
        self
    }

    pub fn with_t(mut self, t: f64) -> Self {
        self.t = Some(t);
        self
    }

    /// Look up a variable by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<f64> {
        if name.eq_ignore_ascii_case("x") {
            self.x
        } else if name.eq_ignore_ascii_case("y") {
            self.y
        } else if name.eq_ignore_ascii_case("t") {
            self.t
        } else {
            None
        }
    }
}

/// Context for formula evaluation
#[derive(Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// Cell values visible to the formula
    pub store: Option<&'a dyn CellStore>,
    /// Graph variable bindings, present only when sampling a graph
    pub variables: Option<&'a VariableBindings>,
    /// Functions callable from the formula
    pub registry: &'a FunctionRegistry,
}

impl<'a> EvaluationContext<'a> {
    /// Create a context reading from a cell store
    pub fn new(store: &'a dyn CellStore) -> Self {
        Self {
            store: Some(store),
            variables: None,
            registry: default_registry(),
        }
    }

    /// Create a simple context without a cell store (for testing)
    pub fn simple() -> Self {
        Self {
            store: None,
            variables: None,
            registry: default_registry(),
        }
    }

    /// Bind graph variables
    pub fn with_variables(mut self, variables: &'a VariableBindings) -> Self {
        self.variables = Some(variables);
        self
    }

    /// Use a different function registry
    pub fn with_registry(mut self, registry: &'a FunctionRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Get a cell value; missing cells read as `Null`
    pub fn get_cell_value(&self, row: u32, col: u32) -> CellValue {
        self.store
            .and_then(|store| store.get(row, col))
            .cloned()
            .unwrap_or(CellValue::Null)
    }

    /// Get a range of cell values as a row-major array
    pub fn get_range_values(&self, range: &CellRange) -> CellValue {
        let rows = (range.start.row..=range.end.row)
            .map(|row| {
                (range.start.col..=range.end.col)
                    .map(|col| self.get_cell_value(row, col))
                    .collect()
            })
            .collect();
        CellValue::Array(rows)
    }

    /// Resolve a free variable: bound graph variable, then named range
    fn resolve_variable(&self, name: &str) -> FormulaResult<CellValue> {
        if let Some(value) = self.variables.and_then(|vars| vars.get(name)) {
            return Ok(CellValue::Number(value));
        }

        if let Some(range) = self.store.and_then(|store| store.named_range(name)) {
            return Ok(self.get_range_values(&range));
        }

        Err(EvaluationError::UnknownVariable(name.to_string()).into())
    }
}

/// Evaluate a formula expression
///
/// A NaN or infinite number is never returned; it becomes an
/// [`EvaluationError::InvalidArgument`] naming the operation that produced it.
pub fn evaluate(expr: &FormulaExpr, ctx: &EvaluationContext) -> FormulaResult<CellValue> {
    match evaluate_node(expr, ctx)? {
        CellValue::Number(n) if !n.is_finite() => Err(EvaluationError::InvalidArgument {
            function: operation_name(expr),
            message: format!("{} is not a finite number", n),
        }
        .into()),
        value => Ok(value),
    }
}

fn operation_name(expr: &FormulaExpr) -> String {
    match expr {
        FormulaExpr::Function { name, .. } => name.clone(),
        FormulaExpr::BinaryOp { op, .. } => op.symbol().to_string(),
        _ => "value".to_string(),
    }
}

fn evaluate_node(expr: &FormulaExpr, ctx: &EvaluationContext) -> FormulaResult<CellValue> {
    match expr {
        FormulaExpr::Literal(value) => Ok(value.clone()),

        FormulaExpr::CellRef(address) => Ok(ctx.get_cell_value(address.row, address.col)),

        FormulaExpr::Range(range) => Ok(ctx.get_range_values(range)),

        FormulaExpr::Variable(name) => ctx.resolve_variable(name),

        FormulaExpr::BinaryOp { op, left, right } => evaluate_binary_op(*op, left, right, ctx),

        FormulaExpr::UnaryOp { op, operand } => evaluate_unary_op(*op, operand, ctx),

        FormulaExpr::Function { name, args } => {
            // Arguments are evaluated eagerly, left to right
            let evaluated_args = args
                .iter()
                .map(|arg| evaluate(arg, ctx))
                .collect::<FormulaResult<Vec<_>>>()?;

            ctx.registry.call(name, &evaluated_args)
        }
    }
}

/// The scalar an operator sees: the first element of an array
fn operand_scalar(value: &CellValue) -> &CellValue {
    match value {
        CellValue::Array(rows) => rows.iter().flatten().next().unwrap_or(&CellValue::Null),
        other => other,
    }
}

/// Fail with the operand's error marker, if it carries one
fn propagate_marker(value: &CellValue) -> FormulaResult<()> {
    match operand_scalar(value).error_message() {
        Some(marker) => Err(EvaluationError::Propagated(marker.to_string()).into()),
        None => Ok(()),
    }
}

/// Coerce an arithmetic operand, propagating error markers
fn arithmetic_operand(value: &CellValue) -> FormulaResult<f64> {
    propagate_marker(value)?;
    Ok(operand_scalar(value).to_number())
}

/// Evaluate a binary operation
fn evaluate_binary_op(
    op: BinaryOperator,
    left: &FormulaExpr,
    right: &FormulaExpr,
    ctx: &EvaluationContext,
) -> FormulaResult<CellValue> {
    let left_val = evaluate(left, ctx)?;
    let right_val = evaluate(right, ctx)?;

    match op {
        BinaryOperator::Add => arithmetic(&left_val, &right_val, |l, r| Ok(l + r)),
        BinaryOperator::Subtract => arithmetic(&left_val, &right_val, |l, r| Ok(l - r)),
        BinaryOperator::Multiply => arithmetic(&left_val, &right_val, |l, r| Ok(l * r)),
        BinaryOperator::Divide => arithmetic(&left_val, &right_val, |l, r| {
            if r == 0.0 {
                Err(EvaluationError::DivisionByZero.into())
            } else {
                Ok(l / r)
            }
        }),
        BinaryOperator::Power => arithmetic(&left_val, &right_val, |l, r| Ok(l.powf(r))),

        BinaryOperator::Equal => {
            compare(&left_val, &right_val, |l, r| CellValue::Boolean(values_equal(l, r)))
        }
        BinaryOperator::NotEqual => {
            compare(&left_val, &right_val, |l, r| CellValue::Boolean(!values_equal(l, r)))
        }

        BinaryOperator::LessThan => compare(&left_val, &right_val, |l, r| {
            CellValue::Boolean(compare_values(l, r) == Some(Ordering::Less))
        }),
        BinaryOperator::LessEqual => compare(&left_val, &right_val, |l, r| {
            CellValue::Boolean(matches!(
                compare_values(l, r),
                Some(Ordering::Less | Ordering::Equal)
            ))
        }),
        BinaryOperator::GreaterThan => compare(&left_val, &right_val, |l, r| {
            CellValue::Boolean(compare_values(l, r) == Some(Ordering::Greater))
        }),
        BinaryOperator::GreaterEqual => compare(&left_val, &right_val, |l, r| {
            CellValue::Boolean(matches!(
                compare_values(l, r),
                Some(Ordering::Greater | Ordering::Equal)
            ))
        }),

        BinaryOperator::Concat => compare(&left_val, &right_val, |l, r| {
            CellValue::Text(l.to_text() + &r.to_text())
        }),
    }
}

/// Comparisons and `&`: error markers pass through, as in arithmetic
fn compare<F>(left: &CellValue, right: &CellValue, apply: F) -> FormulaResult<CellValue>
where
    F: FnOnce(&CellValue, &CellValue) -> CellValue,
{
    propagate_marker(left)?;
    propagate_marker(right)?;
    Ok(apply(left, right))
}

fn arithmetic<F>(left: &CellValue, right: &CellValue, apply: F) -> FormulaResult<CellValue>
where
    F: FnOnce(f64, f64) -> FormulaResult<f64>,
{
    let l = arithmetic_operand(left)?;
    let r = arithmetic_operand(right)?;
    apply(l, r).map(CellValue::Number)
}

/// `=` semantics: raw equality first, then numeric equality.
///
/// Two text values that differ are unequal; they never fall back to the
/// numeric comparison (which would make all non-numeric strings equal to 0).
fn values_equal(left: &CellValue, right: &CellValue) -> bool {
    if left == right {
        return true;
    }
    match (left, right) {
        (CellValue::Text(_), CellValue::Text(_)) => false,
        _ => left.to_number() == right.to_number(),
    }
}

/// Ordering for `< > <= >=`: text against text compares as strings, anything
/// else compares numerically. `None` when a NaN is involved.
fn compare_values(left: &CellValue, right: &CellValue) -> Option<Ordering> {
    match (left, right) {
        (CellValue::Text(l), CellValue::Text(r)) => Some(l.cmp(r)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    }
}

/// Evaluate a unary operation
fn evaluate_unary_op(
    op: UnaryOperator,
    operand: &FormulaExpr,
    ctx: &EvaluationContext,
) -> FormulaResult<CellValue> {
    let value = evaluate(operand, ctx)?;
    let n = arithmetic_operand(&value)?;

    match op {
        UnaryOperator::Negate => Ok(CellValue::Number(-n)),
        UnaryOperator::Plus => Ok(CellValue::Number(n)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormulaError;
    use crate::parser::parse_formula;
    use ahash::AHashMap;
    use calcgraph_core::CellAddress;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct MapStore {
        cells: AHashMap<CellAddress, CellValue>,
        names: AHashMap<String, CellRange>,
    }

    impl MapStore {
        fn with(mut self, a1: &str, value: impl Into<CellValue>) -> Self {
            self.cells
                .insert(CellAddress::parse(a1).unwrap(), value.into());
            self
        }

        fn with_name(mut self, name: &str, range: &str) -> Self {
            self.names
                .insert(name.to_lowercase(), CellRange::parse(range).unwrap());
            self
        }
    }

    impl CellStore for MapStore {
        fn get(&self, row: u32, col: u32) -> Option<&CellValue> {
            self.cells.get(&CellAddress::new(row, col))
        }

        fn named_range(&self, name: &str) -> Option<CellRange> {
            self.names.get(&name.to_lowercase()).copied()
        }
    }

    fn eval(formula: &str) -> FormulaResult<CellValue> {
        let ast = parse_formula(formula)?;
        evaluate(&ast, &EvaluationContext::simple())
    }

    fn eval_with(formula: &str, store: &MapStore) -> FormulaResult<CellValue> {
        let ast = parse_formula(formula)?;
        evaluate(&ast, &EvaluationContext::new(store))
    }

    fn number(formula: &str) -> f64 {
        match eval(formula) {
            Ok(CellValue::Number(n)) => n,
            other => panic!("expected number from {formula}, got {other:?}"),
        }
    }

    #[test]
    fn test_evaluate_literals() {
        assert_eq!(eval("=42").unwrap(), CellValue::Number(42.0));
        assert_eq!(eval("=\"Hello\"").unwrap(), CellValue::text("Hello"));
        assert_eq!(eval("=TRUE").unwrap(), CellValue::Boolean(true));
    }

    #[test]
    fn test_evaluate_arithmetic() {
        assert_eq!(number("=1+2"), 3.0);
        assert_eq!(number("=10-3"), 7.0);
        assert_eq!(number("=4*5"), 20.0);
        assert_eq!(number("=20/4"), 5.0);
        assert_eq!(number("=2^10"), 1024.0);
    }

    #[test]
    fn test_evaluate_precedence() {
        assert_eq!(number("=1+2*3"), 7.0);
        assert_eq!(number("=(1+2)*3"), 9.0);
        assert_eq!(number("=2+3*4-5"), 9.0);
        assert_eq!(number("=2^3^2"), 512.0);
        assert_eq!(number("=-2^2"), 4.0);
    }

    #[test]
    fn test_evaluate_unary() {
        assert_eq!(number("=-5"), -5.0);
        assert_eq!(number("=--5"), 5.0);
        assert_eq!(number("=+\"3\""), 3.0);
    }

    #[test]
    fn test_arithmetic_coercion() {
        assert_eq!(number("=TRUE+1"), 2.0);
        assert_eq!(number("=\"2.5\"*2"), 5.0);
        assert_eq!(number("=\"abc\"+1"), 1.0);

        let store = MapStore::default().with("A1", 4.0).with("A2", 6.0);
        // Empty cells read as null, which is 0
        assert_eq!(eval_with("=B7+1", &store).unwrap(), CellValue::Number(1.0));
        // Arrays take their first element
        assert_eq!(
            eval_with("=A1:A2*10", &store).unwrap(),
            CellValue::Number(40.0)
        );
    }

    #[test]
    fn test_evaluate_comparison() {
        assert_eq!(eval("=1<2").unwrap(), CellValue::Boolean(true));
        assert_eq!(eval("=1>2").unwrap(), CellValue::Boolean(false));
        assert_eq!(eval("=5=5").unwrap(), CellValue::Boolean(true));
        assert_eq!(eval("=5<>5").unwrap(), CellValue::Boolean(false));
        assert_eq!(eval("=5<=5").unwrap(), CellValue::Boolean(true));
        assert_eq!(eval("=5>=6").unwrap(), CellValue::Boolean(false));
        assert_eq!(eval("=\"abc\"<\"abd\"").unwrap(), CellValue::Boolean(true));
    }

    #[test]
    fn test_equality_falls_back_to_numbers() {
        assert_eq!(eval("=1=\"1\"").unwrap(), CellValue::Boolean(true));
        assert_eq!(eval("=TRUE=1").unwrap(), CellValue::Boolean(true));
        assert_eq!(eval("=\"a\"=\"a\"").unwrap(), CellValue::Boolean(true));
        assert_eq!(eval("=\"a\"=\"b\"").unwrap(), CellValue::Boolean(false));
        // Two texts compare as text even when both read as numbers
        assert_eq!(eval("=\"1.0\"=\"1\"").unwrap(), CellValue::Boolean(false));
        assert_eq!(eval("=\"1.0\"=1").unwrap(), CellValue::Boolean(true));
    }

    #[test]
    fn test_evaluate_concatenation() {
        assert_eq!(
            eval("=\"Hello \"&\"World\"").unwrap(),
            CellValue::text("Hello World")
        );
        assert_eq!(eval("=\"Value: \"&42").unwrap(), CellValue::text("Value: 42"));
        assert_eq!(eval("=1&TRUE").unwrap(), CellValue::text("1TRUE"));
    }

    #[test]
    fn test_evaluate_division_by_zero() {
        assert_eq!(
            eval("=1/0"),
            Err(FormulaError::Evaluation(EvaluationError::DivisionByZero))
        );
        assert_eq!(
            eval("=1/0").unwrap_err().to_cell_value(),
            CellValue::text("#ERROR: Division by zero")
        );
    }

    #[test]
    fn test_cell_and_range_references() {
        let store = MapStore::default()
            .with("A1", 1.0)
            .with("B1", 2.0)
            .with("A2", "x");

        assert_eq!(eval_with("=A1+B1", &store).unwrap(), CellValue::Number(3.0));
        assert_eq!(eval_with("=C9", &store).unwrap(), CellValue::Null);
        assert_eq!(
            eval_with("=A1:B2", &store).unwrap(),
            CellValue::Array(vec![
                vec![CellValue::Number(1.0), CellValue::Number(2.0)],
                vec![CellValue::text("x"), CellValue::Null],
            ])
        );
    }

    #[test]
    fn test_error_markers_propagate() {
        let store = MapStore::default().with("A1", CellValue::error("Division by zero"));

        let err = eval_with("=A1*2", &store).unwrap_err();
        assert_eq!(
            err,
            FormulaError::Evaluation(EvaluationError::Propagated(
                "#ERROR: Division by zero".into()
            ))
        );
        // The marker is stored as is, not wrapped again
        assert_eq!(err.to_cell_value(), CellValue::error("Division by zero"));

        // Comparisons and concatenation do not swallow it
        for formula in ["=A1=0", "=0<>A1", "=A1<1", "=\"x\"&A1", "=A1:A2>=0"] {
            assert_eq!(
                eval_with(formula, &store).unwrap_err().to_cell_value(),
                CellValue::error("Division by zero"),
                "{}",
                formula
            );
        }
    }

    #[test]
    fn test_non_finite_results_are_errors() {
        let invalid = |formula: &str| match eval(formula) {
            Err(FormulaError::Evaluation(EvaluationError::InvalidArgument { function, .. })) => {
                function
            }
            other => panic!("expected invalid argument from {formula}, got {other:?}"),
        };

        assert_eq!(invalid("=1E308*10"), "*");
        assert_eq!(invalid("=ROUND(1.5, 400)"), "ROUND");
        assert_eq!(invalid("=10^400"), "^");
        assert_eq!(invalid("=1E400"), "value");
        // The failure aborts the enclosing expression
        assert_eq!(invalid("=SUM(1E308*10, 1)"), "*");
    }

    #[test]
    fn test_variable_resolution_order() {
        let store = MapStore::default()
            .with("A1", 5.0)
            .with_name("rate", "A1")
            .with_name("x", "A1");

        // Bound variables win over named ranges, case-insensitively
        let vars = VariableBindings::new().with_x(2.0);
        let ast = parse_formula("X * rate").unwrap();
        let ctx = EvaluationContext::new(&store).with_variables(&vars);
        assert_eq!(evaluate(&ast, &ctx).unwrap(), CellValue::Number(10.0));

        // Without bindings the named range is used
        assert_eq!(eval_with("=x+Rate", &store).unwrap(), CellValue::Number(10.0));

        assert_eq!(
            eval_with("=nope", &store),
            Err(FormulaError::Evaluation(EvaluationError::UnknownVariable(
                "nope".into()
            )))
        );
    }

    #[test]
    fn test_unbound_graph_variable_is_unknown() {
        assert_eq!(
            eval("=t*2"),
            Err(FormulaError::Evaluation(EvaluationError::UnknownVariable(
                "t".into()
            )))
        );
    }

    #[test]
    fn test_evaluate_functions() {
        assert_eq!(number("=SUM(1,2,3)"), 6.0);
        assert_eq!(number("=sum(1, 2) * 2"), 6.0);
        assert_eq!(number("=ROUND(SQRT(2), 2)"), 1.41);
        assert_eq!(eval("=IF(1>2, \"yes\", \"no\")").unwrap(), CellValue::text("no"));
    }

    #[test]
    fn test_unknown_function() {
        assert_eq!(
            eval("=FOO(1)"),
            Err(FormulaError::Evaluation(EvaluationError::UnknownFunction(
                "FOO".into()
            )))
        );
    }

    #[test]
    fn test_argument_failure_aborts_call() {
        assert_eq!(
            eval("=SUM(1, 1/0)"),
            Err(FormulaError::Evaluation(EvaluationError::DivisionByZero))
        );
    }

    #[test]
    fn test_custom_registry() {
        let registry = FunctionRegistry::empty();
        let ast = parse_formula("=SUM(1)").unwrap();
        let ctx = EvaluationContext::simple().with_registry(&registry);
        assert!(matches!(
            evaluate(&ast, &ctx),
            Err(FormulaError::Evaluation(EvaluationError::UnknownFunction(_)))
        ));
    }

    #[test]
    fn test_constant_formulas_are_deterministic() {
        let ast = parse_formula("=SIN(1)*100+LEN(\"abc\")&\"!\"").unwrap();
        let first = evaluate(&ast, &EvaluationContext::simple()).unwrap();
        for _ in 0..5 {
            assert_eq!(evaluate(&ast, &EvaluationContext::simple()).unwrap(), first);
        }
    }
}
