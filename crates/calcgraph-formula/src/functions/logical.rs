//! Logical functions

use super::check_error;
use crate::error::FormulaResult;
use calcgraph_core::CellValue;

/// IF function; a missing else branch yields FALSE
pub fn fn_if(args: &[CellValue]) -> FormulaResult<CellValue> {
    let condition = &args[0];
    check_error(condition)?;

    if condition.to_bool() {
        Ok(args[1].clone())
    } else {
        Ok(args.get(2).cloned().unwrap_or(CellValue::Boolean(false)))
    }
}

/// Truth values of every scalar argument, arrays flattened
fn truth_values(args: &[CellValue]) -> FormulaResult<Vec<bool>> {
    args.iter()
        .flat_map(CellValue::scalars)
        .filter(|v| !v.is_null())
        .map(|v| check_error(v).map(|_| v.to_bool()))
        .collect()
}

/// AND function
pub fn fn_and(args: &[CellValue]) -> FormulaResult<CellValue> {
    let values = truth_values(args)?;
    Ok(CellValue::Boolean(values.into_iter().all(|b| b)))
}

/// OR function
pub fn fn_or(args: &[CellValue]) -> FormulaResult<CellValue> {
    let values = truth_values(args)?;
    Ok(CellValue::Boolean(values.into_iter().any(|b| b)))
}

/// NOT function
pub fn fn_not(args: &[CellValue]) -> FormulaResult<CellValue> {
    check_error(&args[0])?;
    Ok(CellValue::Boolean(!args[0].to_bool()))
}
