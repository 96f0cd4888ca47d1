//! Computed columns: expression-derived and conditional

use crate::error::TabflowError;
use crate::expr;
use crate::ops::filter;
use crate::validate;
use crate::value::{table_columns, Table, Value};
use serde_json::Value as Json;

/// Add a column computed by evaluating an expression per row. A row whose
/// evaluation fails gets Null instead of failing the table.
pub fn add_column(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let name = validate::require_str(params, "name")?;
    let expression = validate::require_str(params, "expression")?;
    // syntax problems surface before the per-row pass
    if !table.is_empty() {
        expr::evaluate(expression, &table[0])
            .map_err(|e| TabflowError::validation(e.to_string()))?;
    }

    Ok(table
        .iter()
        .map(|row| {
            let computed = expr::evaluate(expression, row).unwrap_or(Value::Null);
            let mut out = row.clone();
            out.insert(name.to_string(), computed);
            out
        })
        .collect())
}

/// Add a column from an ordered condition list; the first matching
/// (column, operator, value) wins, otherwise the default applies
pub fn conditional_column(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let name = validate::require_str(params, "name")?;
    let conditions = params
        .get("conditions")
        .and_then(Json::as_array)
        .ok_or_else(|| {
            TabflowError::validation("missing required list parameter 'conditions'")
        })?;
    if conditions.is_empty() {
        return Err(TabflowError::validation(
            "parameter 'conditions' must list at least one condition",
        ));
    }
    let default = validate::value_param(params, "default");

    struct Condition {
        column: String,
        operator: String,
        target: Value,
        result: Value,
    }

    let mut parsed = Vec::with_capacity(conditions.len());
    let available = table_columns(table);
    for condition in conditions {
        let column = validate::require_str(condition, "column")?.to_string();
        let operator = validate::require_str(condition, "operator")?.to_string();
        validate::require_one_of("operator", &operator, filter::OPERATORS)?;
        if !table.is_empty() {
            validate::require_column(&available, &column)?;
        }
        parsed.push(Condition {
            column,
            operator,
            target: validate::value_param(condition, "value"),
            result: validate::value_param(condition, "result"),
        });
    }

    Ok(table
        .iter()
        .map(|row| {
            let value = parsed
                .iter()
                .find(|c| {
                    let cell = row.get(&c.column).unwrap_or(&Value::Null);
                    filter::matches(cell, &c.operator, &c.target)
                })
                .map(|c| c.result.clone())
                .unwrap_or_else(|| default.clone());
            let mut out = row.clone();
            out.insert(name.to_string(), value);
            out
        })
        .collect())
}
