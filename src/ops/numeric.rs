//! Numeric transforms
//!
//! All of these validate the target column by sampling before the row pass.
//! Cells that fail numeric coercion are left unchanged rather than erroring;
//! divide (and modulo) by zero produce Null.

use crate::error::TabflowError;
use crate::validate;
use crate::value::{table_columns, Table, Value};
use serde_json::Value as Json;

fn checked_column(table: &Table, params: &Json) -> Result<String, TabflowError> {
    let column = validate::require_str(params, "column")?;
    if !table.is_empty() {
        validate::require_column(&table_columns(table), column)?;
        validate::require_numeric_column(table, column)?;
    }
    Ok(column.to_string())
}

fn map_numeric(table: &Table, column: &str, f: impl Fn(f64) -> f64) -> Table {
    table
        .iter()
        .map(|row| {
            let mut out = row.clone();
            if let Some(cell) = out.get_mut(column) {
                if let Some(n) = cell.as_finite_number() {
                    *cell = Value::Number(f(n));
                }
            }
            out
        })
        .collect()
}

pub fn round(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let column = checked_column(table, params)?;
    let precision = validate::optional_number(params, "precision").unwrap_or(0.0);
    if precision < 0.0 || precision.fract() != 0.0 {
        return Err(TabflowError::validation(
            "parameter 'precision' must be a non-negative integer",
        ));
    }
    let factor = 10f64.powi(precision as i32);
    Ok(map_numeric(table, &column, |n| (n * factor).round() / factor))
}

pub fn absolute(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let column = checked_column(table, params)?;
    Ok(map_numeric(table, &column, f64::abs))
}

pub fn ceiling(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let column = checked_column(table, params)?;
    Ok(map_numeric(table, &column, f64::ceil))
}

pub fn floor(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let column = checked_column(table, params)?;
    Ok(map_numeric(table, &column, f64::floor))
}

const OPERATIONS: &[&str] = &["add", "subtract", "multiply", "divide", "power", "modulo"];

/// Arithmetic against a constant or a second column. Divide/modulo by zero
/// yield Null for that row.
pub fn math_operation(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let column = checked_column(table, params)?;
    let operation = validate::require_str(params, "operation")?;
    validate::require_one_of("operation", operation, OPERATIONS)?;

    let operand_column = validate::optional_str(params, "operandColumn").map(str::to_string);
    let constant = validate::optional_number(params, "value");
    if operand_column.is_none() && constant.is_none() {
        return Err(TabflowError::validation(
            "mathOperation needs either 'value' or 'operandColumn'",
        ));
    }
    if let Some(ref oc) = operand_column {
        if !table.is_empty() {
            validate::require_column(&table_columns(table), oc)?;
            validate::require_numeric_column(table, oc)?;
        }
    }

    Ok(table
        .iter()
        .map(|row| {
            let mut out = row.clone();
            let operand = match &operand_column {
                Some(oc) => row.get(oc).map(Value::as_number).unwrap_or(f64::NAN),
                None => constant.unwrap_or(f64::NAN),
            };
            if let Some(cell) = out.get_mut(&column) {
                if let Some(n) = cell.as_finite_number() {
                    *cell = apply_operation(n, operation, operand);
                }
            }
            out
        })
        .collect())
}

fn apply_operation(n: f64, operation: &str, operand: f64) -> Value {
    match operation {
        "add" => Value::Number(n + operand),
        "subtract" => Value::Number(n - operand),
        "multiply" => Value::Number(n * operand),
        "power" => Value::Number(n.powf(operand)),
        "divide" if operand == 0.0 => Value::Null,
        "divide" => Value::Number(n / operand),
        _ if operand == 0.0 => Value::Null,
        _ => Value::Number(n % operand),
    }
}
