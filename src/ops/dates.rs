//! Date transforms
//!
//! Cells are parsed with `columns::parse_date` (Date values pass straight
//! through, strings must look like ISO or US dates). A cell that does not
//! parse yields Null in the derived column and is left alone in place.

use crate::error::TabflowError;
use crate::ops::columns::parse_date;
use crate::validate;
use crate::value::{table_columns, Table, Value};
use chrono::{Datelike, Duration, Months, NaiveDate};
use serde_json::Value as Json;

fn as_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Date(d) => Some(*d),
        Value::String(s) => parse_date(s),
        _ => None,
    }
}

fn require_existing(table: &Table, column: &str) -> Result<(), TabflowError> {
    if table.is_empty() {
        return Ok(());
    }
    validate::require_column(&table_columns(table), column)
}

const PARTS: &[&str] = &["year", "month", "day", "weekday", "quarter"];

/// Extract one date part into a new column (default `<column>_<part>`).
/// Weekday is 0 = Sunday .. 6 = Saturday.
pub fn extract_date(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let column = validate::require_str(params, "column")?;
    let part = validate::require_str(params, "part")?;
    validate::require_one_of("part", part, PARTS)?;
    let output = validate::optional_str(params, "output")
        .map(str::to_string)
        .unwrap_or_else(|| format!("{column}_{part}"));
    require_existing(table, column)?;

    Ok(table
        .iter()
        .map(|row| {
            let mut out = row.clone();
            let extracted = row
                .get(column)
                .and_then(as_date)
                .map(|d| {
                    Value::Number(match part {
                        "year" => d.year() as f64,
                        "month" => d.month() as f64,
                        "day" => d.day() as f64,
                        "weekday" => d.weekday().num_days_from_sunday() as f64,
                        _ => ((d.month() - 1) / 3 + 1) as f64,
                    })
                })
                .unwrap_or(Value::Null);
            out.insert(output.clone(), extracted);
            out
        })
        .collect())
}

/// Render a date column as text using YYYY/MM/DD-style tokens
pub fn format_date(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let column = validate::require_str(params, "column")?;
    let format = validate::require_str(params, "format")?;
    require_existing(table, column)?;
    let chrono_format = format
        .replace("YYYY", "%Y")
        .replace("MM", "%m")
        .replace("DD", "%d");

    Ok(table
        .iter()
        .map(|row| {
            let mut out = row.clone();
            if let Some(cell) = out.get_mut(column) {
                if let Some(d) = as_date(cell) {
                    *cell = Value::String(d.format(&chrono_format).to_string());
                }
            }
            out
        })
        .collect())
}

const UNITS: &[&str] = &["days", "months", "years"];

/// Shift a date column by a signed amount of days/months/years. Month and
/// year arithmetic clamps to the end of the month (Jan 31 + 1 month =
/// Feb 28/29).
pub fn date_add(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let column = validate::require_str(params, "column")?;
    let amount = validate::require_number(params, "amount")?;
    let unit = validate::require_str(params, "unit")?;
    validate::require_one_of("unit", unit, UNITS)?;
    if amount.fract() != 0.0 {
        return Err(TabflowError::validation(
            "parameter 'amount' must be an integer",
        ));
    }
    require_existing(table, column)?;
    let amount = amount as i64;

    Ok(table
        .iter()
        .map(|row| {
            let mut out = row.clone();
            if let Some(cell) = out.get_mut(column) {
                if let Some(d) = as_date(cell) {
                    if let Some(shifted) = shift(d, amount, unit) {
                        *cell = Value::Date(shifted);
                    }
                }
            }
            out
        })
        .collect())
}

fn shift(date: NaiveDate, amount: i64, unit: &str) -> Option<NaiveDate> {
    let months = match unit {
        "days" => return date.checked_add_signed(Duration::days(amount)),
        "months" => amount,
        _ => amount * 12,
    };
    if months >= 0 {
        date.checked_add_months(Months::new(months as u32))
    } else {
        date.checked_sub_months(Months::new((-months) as u32))
    }
}

/// Whole days from `start` to `end` into a new column; unparseable cells
/// yield Null
pub fn date_diff(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let start = validate::require_str(params, "start")?;
    let end = validate::require_str(params, "end")?;
    let output = validate::optional_str(params, "output")
        .map(str::to_string)
        .unwrap_or_else(|| "date_diff".to_string());
    require_existing(table, start)?;
    require_existing(table, end)?;

    Ok(table
        .iter()
        .map(|row| {
            let mut out = row.clone();
            let diff = match (
                row.get(start).and_then(as_date),
                row.get(end).and_then(as_date),
            ) {
                (Some(a), Some(b)) => Value::Number((b - a).num_days() as f64),
                _ => Value::Null,
            };
            out.insert(output.clone(), diff);
            out
        })
        .collect())
}
