//! Row filtering: predicate filter, expression filter, limit

use crate::error::TabflowError;
use crate::expr;
use crate::validate;
use crate::value::{table_columns, Table, Value};
use serde_json::Value as Json;

pub const OPERATORS: &[&str] = &[
    "equals",
    "notEquals",
    "contains",
    "notContains",
    "startsWith",
    "endsWith",
    "greaterThan",
    "lessThan",
    "greaterOrEqual",
    "lessOrEqual",
    "isNull",
    "isNotNull",
];

/// Does `cell <operator> target` hold? Shared by `filter` and
/// `conditionalColumn`. Equality is strict (same type, same value); Null and
/// "" both count as null for the null checks; ordering operators go through
/// numeric coercion and are false on NaN.
pub(crate) fn matches(cell: &Value, operator: &str, target: &Value) -> bool {
    match operator {
        "equals" => cell.strict_eq(target),
        "notEquals" => !cell.strict_eq(target),
        "contains" => cell.to_text().contains(&target.to_text()),
        "notContains" => !cell.to_text().contains(&target.to_text()),
        "startsWith" => cell.to_text().starts_with(&target.to_text()),
        "endsWith" => cell.to_text().ends_with(&target.to_text()),
        "isNull" => cell.is_nullish(),
        "isNotNull" => !cell.is_nullish(),
        ordering => {
            let (a, b) = (cell.as_number(), target.as_number());
            if a.is_nan() || b.is_nan() {
                return false;
            }
            match ordering {
                "greaterThan" => a > b,
                "lessThan" => a < b,
                "greaterOrEqual" => a >= b,
                _ => a <= b,
            }
        }
    }
}

pub fn filter(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let column = validate::require_str(params, "column")?;
    let operator = validate::require_str(params, "operator")?;
    validate::require_one_of("operator", operator, OPERATORS)?;
    if !table.is_empty() {
        validate::require_column(&table_columns(table), column)?;
    }
    let target = validate::value_param(params, "value");

    Ok(table
        .iter()
        .filter(|row| {
            let cell = row.get(column).unwrap_or(&Value::Null);
            matches(cell, operator, &target)
        })
        .cloned()
        .collect())
}

/// Keep rows where the expression is truthy. A row whose evaluation fails
/// is excluded rather than failing the whole table.
pub fn filter_expression(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let expression = validate::require_str(params, "expression")?;
    // surface syntax errors before the per-row pass
    if !table.is_empty() {
        expr::evaluate(expression, &table[0])
            .map_err(|e| TabflowError::validation(e.to_string()))?;
    }
    Ok(table
        .iter()
        .filter(|row| {
            expr::evaluate(expression, row)
                .map(|v| v.truthy())
                .unwrap_or(false)
        })
        .cloned()
        .collect())
}

pub fn limit(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let count = validate::require_number(params, "count")?;
    if count < 0.0 || count.fract() != 0.0 {
        return Err(TabflowError::validation(format!(
            "parameter 'count' must be a non-negative integer, got {count}"
        )));
    }
    Ok(table.iter().take(count as usize).cloned().collect())
}
