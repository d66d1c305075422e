//! Text functions

use super::check_error;
use crate::error::FormulaResult;
use calcgraph_core::CellValue;

/// CONCAT function: joins every scalar of every argument
pub fn fn_concat(args: &[CellValue]) -> FormulaResult<CellValue> {
    let mut result = String::new();
    for scalar in args.iter().flat_map(CellValue::scalars) {
        check_error(scalar)?;
        result.push_str(&scalar.to_text());
    }
    Ok(CellValue::Text(result))
}

/// LEN function (characters, not bytes)
pub fn fn_len(args: &[CellValue]) -> FormulaResult<CellValue> {
    check_error(&args[0])?;
    Ok(CellValue::Number(args[0].to_text().chars().count() as f64))
}

/// UPPER function
pub fn fn_upper(args: &[CellValue]) -> FormulaResult<CellValue> {
    check_error(&args[0])?;
    Ok(CellValue::Text(args[0].to_text().to_uppercase()))
}

/// LOWER function
pub fn fn_lower(args: &[CellValue]) -> FormulaResult<CellValue> {
    check_error(&args[0])?;
    Ok(CellValue::Text(args[0].to_text().to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat() {
        let args = [
            CellValue::text("a"),
            CellValue::Number(1.0),
            CellValue::Array(vec![vec![CellValue::Boolean(true), CellValue::Null]]),
        ];
        assert_eq!(fn_concat(&args).unwrap(), CellValue::text("a1TRUE"));
    }

    #[test]
    fn test_len_counts_chars() {
        assert_eq!(
            fn_len(&[CellValue::text("héllo")]).unwrap(),
            CellValue::Number(5.0)
        );
        assert_eq!(fn_len(&[CellValue::Number(12.5)]).unwrap(), CellValue::Number(4.0));
    }

    #[test]
    fn test_case_conversion() {
        assert_eq!(fn_upper(&[CellValue::text("abc")]).unwrap(), CellValue::text("ABC"));
        assert_eq!(fn_lower(&[CellValue::text("AbC")]).unwrap(), CellValue::text("abc"));
    }
}
