//! Built-in functions
//!
//! The registry maps upper-cased names to plain function pointers over
//! evaluated argument values. Arity is checked by the registry before the
//! implementation runs, so implementations may index their arguments directly.

pub mod graph;
pub mod logical;
pub mod math;
pub mod text;

use crate::error::{EvaluationError, FormulaError, FormulaResult};
use ahash::AHashMap;
use calcgraph_core::CellValue;

/// Function implementation signature
pub type FunctionImpl = fn(&[CellValue]) -> FormulaResult<CellValue>;

/// Function definition
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
}

impl FunctionDef {
    fn check_arity(&self, actual: usize) -> FormulaResult<()> {
        let expected = match self.max_args {
            Some(max) if max == self.min_args && actual != max => format!("exactly {}", max),
            Some(max) if actual > max => format!("at most {}", max),
            _ if actual < self.min_args => format!("at least {}", self.min_args),
            _ => return Ok(()),
        };

        Err(EvaluationError::ArgumentCount {
            function: self.name.to_string(),
            expected,
            actual,
        }
        .into())
    }
}

/// Function registry
pub struct FunctionRegistry {
    functions: AHashMap<String, FunctionDef>,
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register_math_functions();
        registry.register_logical_functions();
        registry.register_text_functions();
        registry.register_graph_functions();

        registry
    }

    /// Create a registry with no functions
    pub fn empty() -> Self {
        Self {
            functions: AHashMap::new(),
        }
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_uppercase())
    }

    /// Check whether a function is registered
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Register a function, replacing any previous definition of that name
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_uppercase(), def);
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Call a function by name with already evaluated arguments
    pub fn call(&self, name: &str, args: &[CellValue]) -> FormulaResult<CellValue> {
        let func = self
            .get(name)
            .ok_or_else(|| EvaluationError::UnknownFunction(name.to_uppercase()))?;

        func.check_arity(args.len())?;
        (func.implementation)(args)
    }

    fn define(
        &mut self,
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: FunctionImpl,
    ) {
        self.register(FunctionDef {
            name,
            min_args,
            max_args,
            implementation,
        });
    }

    fn register_math_functions(&mut self) {
        // Aggregates
        self.define("SUM", 1, None, math::fn_sum);
        self.define("AVERAGE", 1, None, math::fn_average);
        self.define("MIN", 1, None, math::fn_min);
        self.define("MAX", 1, None, math::fn_max);
        self.define("COUNT", 1, None, math::fn_count);

        // Scalar math
        self.define("ABS", 1, Some(1), math::fn_abs);
        self.define("SQRT", 1, Some(1), math::fn_sqrt);
        self.define("POWER", 2, Some(2), math::fn_power);
        self.define("ROUND", 1, Some(2), math::fn_round);
        self.define("MOD", 2, Some(2), math::fn_mod);
        self.define("INT", 1, Some(1), math::fn_int);
        self.define("EXP", 1, Some(1), math::fn_exp);
        self.define("LN", 1, Some(1), math::fn_ln);
        self.define("LOG10", 1, Some(1), math::fn_log10);

        // Trigonometry
        self.define("SIN", 1, Some(1), math::fn_sin);
        self.define("COS", 1, Some(1), math::fn_cos);
        self.define("TAN", 1, Some(1), math::fn_tan);
        self.define("PI", 0, Some(0), math::fn_pi);
    }

    fn register_logical_functions(&mut self) {
        self.define("IF", 2, Some(3), logical::fn_if);
        self.define("AND", 1, None, logical::fn_and);
        self.define("OR", 1, None, logical::fn_or);
        self.define("NOT", 1, Some(1), logical::fn_not);
    }

    fn register_text_functions(&mut self) {
        self.define("CONCAT", 1, None, text::fn_concat);
        self.define("LEN", 1, Some(1), text::fn_len);
        self.define("UPPER", 1, Some(1), text::fn_upper);
        self.define("LOWER", 1, Some(1), text::fn_lower);
    }

    fn register_graph_functions(&mut self) {
        self.define("POINT", 2, Some(3), graph::fn_point);
        self.define(graph::PLOT_FUNCTION, 1, None, graph::fn_plot);
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// === Argument helpers shared by the implementations ===

/// Fail with the marker if the value is an error marker
pub(crate) fn check_error(value: &CellValue) -> FormulaResult<()> {
    match value.error_message() {
        Some(marker) => Err(EvaluationError::Propagated(marker.to_string()).into()),
        None => Ok(()),
    }
}

/// Coerce argument `index` to a number, propagating error markers
pub(crate) fn number_arg(args: &[CellValue], index: usize) -> FormulaResult<f64> {
    let value = args.get(index).unwrap_or(&CellValue::Null);
    for scalar in value.scalars().take(1) {
        check_error(scalar)?;
    }
    Ok(value.to_number())
}

/// Numbers of every argument for the aggregate functions.
///
/// Direct arguments are coerced (text only when it parses); inside arrays
/// only numbers count. Error markers anywhere propagate.
pub(crate) fn collect_numbers(args: &[CellValue]) -> FormulaResult<Vec<f64>> {
    let mut numbers = Vec::new();

    for arg in args {
        match arg {
            CellValue::Array(_) => {
                for scalar in arg.scalars() {
                    check_error(scalar)?;
                    if let CellValue::Number(n) = scalar {
                        numbers.push(*n);
                    }
                }
            }
            CellValue::Text(s) => {
                check_error(arg)?;
                if let Ok(n) = s.trim().parse::<f64>() {
                    numbers.push(n);
                }
            }
            CellValue::Number(n) => numbers.push(*n),
            CellValue::Boolean(b) => numbers.push(if *b { 1.0 } else { 0.0 }),
            CellValue::Null => {}
        }
    }

    Ok(numbers)
}

/// Invalid argument error for a function
pub(crate) fn invalid_argument(function: &str, message: impl Into<String>) -> FormulaError {
    EvaluationError::InvalidArgument {
        function: function.to_string(),
        message: message.into(),
    }
    .into()
}
