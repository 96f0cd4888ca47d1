//! Transform parameter validation
//!
//! Every transform validates its parameters against the incoming table
//! before touching any row. Failures are `Validation` errors that name the
//! offending parameter or column and list the valid alternatives.

use crate::error::TabflowError;
use crate::value::{Table, Value};
use regex::Regex;
use serde_json::Value as Json;

/// Required string parameter, must be present and non-empty
pub fn require_str<'a>(params: &'a Json, key: &str) -> Result<&'a str, TabflowError> {
    match params.get(key).and_then(Json::as_str) {
        Some(s) if !s.trim().is_empty() => Ok(s),
        Some(_) => Err(TabflowError::validation(format!(
            "parameter '{key}' must not be empty"
        ))),
        None => Err(TabflowError::validation(format!(
            "missing required parameter '{key}'"
        ))),
    }
}

/// Required string parameter where whitespace is significant (delimiters,
/// search text). Only the empty string is rejected.
pub fn require_raw_str<'a>(params: &'a Json, key: &str) -> Result<&'a str, TabflowError> {
    match params.get(key).and_then(Json::as_str) {
        Some("") => Err(TabflowError::validation(format!(
            "parameter '{key}' must not be empty"
        ))),
        Some(s) => Ok(s),
        None => Err(TabflowError::validation(format!(
            "missing required parameter '{key}'"
        ))),
    }
}

pub fn optional_str<'a>(params: &'a Json, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Json::as_str)
}

/// Required numeric parameter
pub fn require_number(params: &Json, key: &str) -> Result<f64, TabflowError> {
    params.get(key).and_then(Json::as_f64).ok_or_else(|| {
        TabflowError::validation(format!("missing required numeric parameter '{key}'"))
    })
}

pub fn optional_number(params: &Json, key: &str) -> Option<f64> {
    params.get(key).and_then(Json::as_f64)
}

/// Required list-of-strings parameter, must be non-empty
pub fn require_str_list(params: &Json, key: &str) -> Result<Vec<String>, TabflowError> {
    let items = params.get(key).and_then(Json::as_array).ok_or_else(|| {
        TabflowError::validation(format!("missing required list parameter '{key}'"))
    })?;
    if items.is_empty() {
        return Err(TabflowError::validation(format!(
            "parameter '{key}' must list at least one column"
        )));
    }
    items
        .iter()
        .map(|v| {
            v.as_str().map(str::to_string).ok_or_else(|| {
                TabflowError::validation(format!("parameter '{key}' must contain only strings"))
            })
        })
        .collect()
}

pub fn optional_str_list(params: &Json, key: &str) -> Option<Vec<String>> {
    params.get(key).and_then(Json::as_array).map(|items| {
        items
            .iter()
            .filter_map(Json::as_str)
            .map(str::to_string)
            .collect()
    })
}

/// Arbitrary cell value parameter (defaults to Null when absent)
pub fn value_param(params: &Json, key: &str) -> Value {
    params.get(key).map(Value::from_json).unwrap_or(Value::Null)
}

/// The referenced column must exist; the error lists what is available
pub fn require_column(columns: &[String], name: &str) -> Result<(), TabflowError> {
    if columns.iter().any(|c| c == name) {
        return Ok(());
    }
    Err(TabflowError::validation(format!(
        "column '{}' does not exist (available: {})",
        name,
        columns.join(", ")
    )))
}

/// Enum-style parameter check
pub fn require_one_of(key: &str, value: &str, allowed: &[&str]) -> Result<(), TabflowError> {
    if allowed.contains(&value) {
        return Ok(());
    }
    Err(TabflowError::validation(format!(
        "invalid value '{}' for parameter '{}' (expected one of: {})",
        value,
        key,
        allowed.join(", ")
    )))
}

/// Compile a user-supplied pattern, turning regex errors into validation
/// errors at the operation boundary
pub fn compile_pattern(pattern: &str) -> Result<Regex, TabflowError> {
    Regex::new(pattern)
        .map_err(|e| TabflowError::validation(format!("invalid regex pattern '{pattern}': {e}")))
}

/// Numeric-column check by sampling: the first 10 non-null values must all
/// coerce to numbers. A column with no non-null values passes (nothing to
/// operate on, nothing to reject).
pub fn require_numeric_column(table: &Table, column: &str) -> Result<(), TabflowError> {
    let sample: Vec<&Value> = table
        .iter()
        .filter_map(|row| row.get(column))
        .filter(|v| !v.is_nullish())
        .take(10)
        .collect();
    for value in sample {
        if value.as_number().is_nan() {
            return Err(TabflowError::validation(format!(
                "column '{}' contains non-numeric data (found '{}')",
                column,
                value.to_text()
            )));
        }
    }
    Ok(())
}
