//! Window-style transforms over the current row order
//!
//! None of these sort; they read the table as it arrives (put a `sort`
//! transform before them to control the order).

use crate::error::TabflowError;
use crate::validate;
use crate::value::{table_columns, Table, Value};
use serde_json::Value as Json;

fn require_existing(table: &Table, column: &str) -> Result<(), TabflowError> {
    if table.is_empty() {
        return Ok(());
    }
    validate::require_column(&table_columns(table), column)
}

fn output_name(params: &Json, fallback: String) -> String {
    validate::optional_str(params, "output")
        .map(str::to_string)
        .unwrap_or(fallback)
}

/// Competition rank over current order: a row whose value equals the
/// previous row's value shares its rank, otherwise rank = position + 1
pub fn rank(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let column = validate::require_str(params, "column")?;
    let output = output_name(params, "rank".to_string());
    require_existing(table, column)?;

    let mut out = Vec::with_capacity(table.len());
    let mut current_rank = 0usize;
    let mut previous: Option<Value> = None;
    for (i, row) in table.iter().enumerate() {
        let value = row.get(column).cloned().unwrap_or(Value::Null);
        let tied = previous.as_ref().is_some_and(|p| p.strict_eq(&value));
        if !tied {
            current_rank = i + 1;
        }
        previous = Some(value);
        let mut new_row = row.clone();
        new_row.insert(output.clone(), Value::Number(current_rank as f64));
        out.push(new_row);
    }
    Ok(out)
}

pub fn row_number(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let output = output_name(params, "row_number".to_string());
    Ok(table
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut out = row.clone();
            out.insert(output.clone(), Value::Number((i + 1) as f64));
            out
        })
        .collect())
}

fn offset_param(params: &Json) -> Result<usize, TabflowError> {
    let offset = validate::optional_number(params, "offset").unwrap_or(1.0);
    if offset < 1.0 || offset.fract() != 0.0 {
        return Err(TabflowError::validation(
            "parameter 'offset' must be a positive integer",
        ));
    }
    Ok(offset as usize)
}

/// Value from `offset` rows earlier; rows before the window start get the
/// default (Null unless given)
pub fn lag(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    shifted(table, params, true)
}

/// Value from `offset` rows later
pub fn lead(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    shifted(table, params, false)
}

fn shifted(table: &Table, params: &Json, backwards: bool) -> Result<Table, TabflowError> {
    let column = validate::require_str(params, "column")?;
    let offset = offset_param(params)?;
    let default = validate::value_param(params, "default");
    let suffix = if backwards { "lag" } else { "lead" };
    let output = output_name(params, format!("{column}_{suffix}"));
    require_existing(table, column)?;

    Ok(table
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let source = if backwards {
                i.checked_sub(offset)
            } else {
                Some(i + offset).filter(|&j| j < table.len())
            };
            let value = source
                .and_then(|j| table[j].get(column))
                .cloned()
                .unwrap_or_else(|| default.clone());
            let mut out = row.clone();
            out.insert(output.clone(), value);
            out
        })
        .collect())
}

/// Running sum; non-numeric cells contribute 0 and the running total carries
pub fn cumulative_sum(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let column = validate::require_str(params, "column")?;
    let output = output_name(params, format!("{column}_cumsum"));
    require_existing(table, column)?;

    let mut running = 0.0;
    Ok(table
        .iter()
        .map(|row| {
            running += row
                .get(column)
                .and_then(Value::as_finite_number)
                .unwrap_or(0.0);
            let mut out = row.clone();
            out.insert(output.clone(), Value::Number(running));
            out
        })
        .collect())
}

/// Linear-interpolated percentile of the column's numeric values, broadcast
/// to every row; a column with no numeric values yields Null
pub fn percentile(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let column = validate::require_str(params, "column")?;
    let p = validate::require_number(params, "percentile")?;
    if !(0.0..=100.0).contains(&p) {
        return Err(TabflowError::validation(
            "parameter 'percentile' must be between 0 and 100",
        ));
    }
    let output = output_name(params, format!("{column}_p{}", p as i64));
    require_existing(table, column)?;

    let mut numbers: Vec<f64> = table
        .iter()
        .filter_map(|row| row.get(column).and_then(Value::as_finite_number))
        .collect();
    numbers.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let result = if numbers.is_empty() {
        Value::Null
    } else {
        let position = p / 100.0 * (numbers.len() - 1) as f64;
        let low = position.floor() as usize;
        let high = position.ceil() as usize;
        let fraction = position - low as f64;
        Value::Number(numbers[low] + (numbers[high] - numbers[low]) * fraction)
    };

    Ok(table
        .iter()
        .map(|row| {
            let mut out = row.clone();
            out.insert(output.clone(), result.clone());
            out
        })
        .collect())
}
