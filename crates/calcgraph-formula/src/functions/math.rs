//! Math functions

use super::{collect_numbers, invalid_argument, number_arg};
use crate::error::{EvaluationError, FormulaResult};
use calcgraph_core::CellValue;

/// SUM function
pub fn fn_sum(args: &[CellValue]) -> FormulaResult<CellValue> {
    let numbers = collect_numbers(args)?;
    Ok(CellValue::Number(numbers.iter().sum()))
}

/// AVERAGE function
pub fn fn_average(args: &[CellValue]) -> FormulaResult<CellValue> {
    let numbers = collect_numbers(args)?;
    if numbers.is_empty() {
        return Err(EvaluationError::DivisionByZero.into());
    }
    Ok(CellValue::Number(
        numbers.iter().sum::<f64>() / numbers.len() as f64,
    ))
}

/// MIN function (0 when there are no numbers)
pub fn fn_min(args: &[CellValue]) -> FormulaResult<CellValue> {
    let numbers = collect_numbers(args)?;
    let min = numbers.into_iter().reduce(f64::min).unwrap_or(0.0);
    Ok(CellValue::Number(min))
}

/// MAX function (0 when there are no numbers)
pub fn fn_max(args: &[CellValue]) -> FormulaResult<CellValue> {
    let numbers = collect_numbers(args)?;
    let max = numbers.into_iter().reduce(f64::max).unwrap_or(0.0);
    Ok(CellValue::Number(max))
}

/// COUNT function: counts numeric values, never fails
pub fn fn_count(args: &[CellValue]) -> FormulaResult<CellValue> {
    let count = args
        .iter()
        .flat_map(CellValue::scalars)
        .filter(|v| matches!(v, CellValue::Number(_)))
        .count();
    Ok(CellValue::Number(count as f64))
}

/// ABS function
pub fn fn_abs(args: &[CellValue]) -> FormulaResult<CellValue> {
    Ok(CellValue::Number(number_arg(args, 0)?.abs()))
}

/// SQRT function
pub fn fn_sqrt(args: &[CellValue]) -> FormulaResult<CellValue> {
    let n = number_arg(args, 0)?;
    if n < 0.0 {
        return Err(invalid_argument("SQRT", "negative number"));
    }
    Ok(CellValue::Number(n.sqrt()))
}

/// POWER function
pub fn fn_power(args: &[CellValue]) -> FormulaResult<CellValue> {
    let base = number_arg(args, 0)?;
    let exponent = number_arg(args, 1)?;

    let result = base.powf(exponent);
    if !result.is_finite() {
        return Err(invalid_argument("POWER", "result is not a finite number"));
    }
    Ok(CellValue::Number(result))
}

/// ROUND function, half away from zero
pub fn fn_round(args: &[CellValue]) -> FormulaResult<CellValue> {
    let n = number_arg(args, 0)?;
    let digits = if args.len() > 1 {
        number_arg(args, 1)?.trunc() as i32
    } else {
        0
    };

    let rounded = if digits >= 0 {
        let factor = 10f64.powi(digits);
        (n * factor).round() / factor
    } else {
        let factor = 10f64.powi(-digits);
        (n / factor).round() * factor
    };
    Ok(CellValue::Number(rounded))
}

/// MOD function; the result has the sign of the divisor
pub fn fn_mod(args: &[CellValue]) -> FormulaResult<CellValue> {
    let n = number_arg(args, 0)?;
    let d = number_arg(args, 1)?;

    if d == 0.0 {
        return Err(EvaluationError::DivisionByZero.into());
    }
    Ok(CellValue::Number(n - d * (n / d).floor()))
}

/// INT function (rounds down)
pub fn fn_int(args: &[CellValue]) -> FormulaResult<CellValue> {
    Ok(CellValue::Number(number_arg(args, 0)?.floor()))
}

/// EXP function
pub fn fn_exp(args: &[CellValue]) -> FormulaResult<CellValue> {
    Ok(CellValue::Number(number_arg(args, 0)?.exp()))
}

/// LN function
pub fn fn_ln(args: &[CellValue]) -> FormulaResult<CellValue> {
    let n = number_arg(args, 0)?;
    if n <= 0.0 {
        return Err(invalid_argument("LN", "argument must be positive"));
    }
    Ok(CellValue::Number(n.ln()))
}

/// LOG10 function
pub fn fn_log10(args: &[CellValue]) -> FormulaResult<CellValue> {
    let n = number_arg(args, 0)?;
    if n <= 0.0 {
        return Err(invalid_argument("LOG10", "argument must be positive"));
    }
    Ok(CellValue::Number(n.log10()))
}

pub fn fn_sin(args: &[CellValue]) -> FormulaResult<CellValue> {
    Ok(CellValue::Number(number_arg(args, 0)?.sin()))
}

pub fn fn_cos(args: &[CellValue]) -> FormulaResult<CellValue> {
    Ok(CellValue::Number(number_arg(args, 0)?.cos()))
}

pub fn fn_tan(args: &[CellValue]) -> FormulaResult<CellValue> {
    Ok(CellValue::Number(number_arg(args, 0)?.tan()))
}

pub fn fn_pi(_args: &[CellValue]) -> FormulaResult<CellValue> {
    Ok(CellValue::Number(std::f64::consts::PI))
}
