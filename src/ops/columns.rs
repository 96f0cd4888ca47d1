//! Column structure: projection, rename, removal, casting

use crate::error::TabflowError;
use crate::validate;
use crate::value::{table_columns, Record, Table, Value};
use chrono::NaiveDate;
use serde_json::Value as Json;

/// Project to the listed columns, in list order
pub fn select(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let keep = validate::require_str_list(params, "columns")?;
    if !table.is_empty() {
        let available = table_columns(table);
        for column in &keep {
            validate::require_column(&available, column)?;
        }
    }
    Ok(table
        .iter()
        .map(|row| {
            keep.iter()
                .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
                .collect()
        })
        .collect())
}

/// Projection with an include/exclude mode
pub fn select_columns(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let listed = validate::require_str_list(params, "columns")?;
    let mode = validate::optional_str(params, "mode").unwrap_or("include");
    validate::require_one_of("mode", mode, &["include", "exclude"])?;
    if mode == "include" {
        return select(table, params);
    }
    Ok(table
        .iter()
        .map(|row| {
            row.iter()
                .filter(|(k, _)| !listed.iter().any(|c| c == *k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .collect())
}

fn rename_one(row: &Record, from: &str, to: &str) -> Record {
    let mut out = Record::with_capacity(row.len());
    for (key, value) in row {
        if key == from {
            out.insert(to.to_string(), value.clone());
        } else if key == to {
            // renaming onto an existing column overwrites it
            continue;
        } else {
            out.insert(key.clone(), value.clone());
        }
    }
    out
}

pub fn rename(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let from = validate::require_str(params, "from")?;
    let to = validate::require_str(params, "to")?;
    if !table.is_empty() {
        validate::require_column(&table_columns(table), from)?;
    }
    Ok(table.iter().map(|row| rename_one(row, from, to)).collect())
}

/// Batch rename from a `{old: new}` mapping, applied in mapping order
pub fn rename_columns(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let mapping = params
        .get("mapping")
        .and_then(Json::as_object)
        .ok_or_else(|| {
            TabflowError::validation("missing required object parameter 'mapping'")
        })?;
    if mapping.is_empty() {
        return Err(TabflowError::validation(
            "parameter 'mapping' must rename at least one column",
        ));
    }
    let mut out = table.clone();
    for (from, to) in mapping {
        let to = to.as_str().ok_or_else(|| {
            TabflowError::validation(format!("new name for column '{from}' must be a string"))
        })?;
        if !out.is_empty() {
            validate::require_column(&table_columns(&out), from)?;
        }
        out = out.iter().map(|row| rename_one(row, from, to)).collect();
    }
    Ok(out)
}

pub fn remove_column(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let column = validate::require_str(params, "column")?;
    if !table.is_empty() {
        validate::require_column(&table_columns(table), column)?;
    }
    Ok(table
        .iter()
        .map(|row| {
            let mut out = row.clone();
            out.shift_remove(column);
            out
        })
        .collect())
}

/// Cast a column to string / number / boolean / date. A value that does not
/// convert is left unchanged; cast failure is never an error.
pub fn cast(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let column = validate::require_str(params, "column")?;
    let target = validate::require_str(params, "to")?;
    validate::require_one_of("to", target, &["string", "number", "boolean", "date"])?;
    if !table.is_empty() {
        validate::require_column(&table_columns(table), column)?;
    }
    Ok(table
        .iter()
        .map(|row| {
            let mut out = row.clone();
            if let Some(cell) = out.get_mut(column) {
                *cell = cast_value(cell, target);
            }
            out
        })
        .collect())
}

fn cast_value(value: &Value, target: &str) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    match target {
        "string" => Value::String(value.to_text()),
        "number" => {
            let n = value.as_number();
            if n.is_nan() {
                value.clone()
            } else {
                Value::Number(n)
            }
        }
        "boolean" => match value {
            Value::Boolean(_) => value.clone(),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => Value::Boolean(true),
                "false" | "0" | "no" => Value::Boolean(false),
                _ => value.clone(),
            },
            Value::Number(n) => Value::Boolean(*n != 0.0),
            _ => value.clone(),
        },
        _ => match value {
            Value::Date(_) => value.clone(),
            Value::String(s) => parse_date(s).map(Value::Date).unwrap_or_else(|| value.clone()),
            _ => value.clone(),
        },
    }
}

/// Accepts ISO dates, ISO datetimes (date prefix) and US-style slashes
pub(crate) fn parse_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    if let Some(prefix) = trimmed.get(..10) {
        if let Ok(d) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(d);
        }
    }
    NaiveDate::parse_from_str(trimmed, "%m/%d/%Y").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn sample() -> Table {
        vec![row(&[
            ("name", Value::from("Ada")),
            ("age", Value::from("36")),
            ("city", Value::from("London")),
        ])]
    }

    #[test]
    fn select_projects_in_list_order() {
        let out = select(&sample(), &json!({"columns": ["city", "name"]})).unwrap();
        let keys: Vec<&String> = out[0].keys().collect();
        assert_eq!(keys, ["city", "name"]);
    }

    #[test]
    fn exclude_mode_drops_listed() {
        let out =
            select_columns(&sample(), &json!({"columns": ["age"], "mode": "exclude"})).unwrap();
        assert!(!out[0].contains_key("age"));
        assert!(out[0].contains_key("name"));
    }

    #[test]
    fn rename_keeps_position() {
        let out = rename(&sample(), &json!({"from": "age", "to": "years"})).unwrap();
        let keys: Vec<&String> = out[0].keys().collect();
        assert_eq!(keys, ["name", "years", "city"]);
    }

    #[test]
    fn rename_onto_existing_overwrites() {
        let out = rename(&sample(), &json!({"from": "age", "to": "city"})).unwrap();
        assert_eq!(out[0]["city"], Value::from("36"));
        assert_eq!(out[0].len(), 2);
    }

    #[test]
    fn cast_failure_keeps_original() {
        let table = vec![row(&[("v", Value::from("abc"))])];
        let out = cast(&table, &json!({"column": "v", "to": "number"})).unwrap();
        assert_eq!(out[0]["v"], Value::from("abc"));
    }

    #[test]
    fn cast_to_date_accepts_iso() {
        let table = vec![row(&[("d", Value::from("2024-03-15"))])];
        let out = cast(&table, &json!({"column": "d", "to": "date"})).unwrap();
        assert!(matches!(out[0]["d"], Value::Date(_)));
        assert_eq!(out[0]["d"].to_text(), "2024-03-15");
    }

    #[test]
    fn cast_number_string() {
        let table = vec![row(&[("v", Value::from("42"))])];
        let out = cast(&table, &json!({"column": "v", "to": "number"})).unwrap();
        assert_eq!(out[0]["v"], Value::Number(42.0));
    }
}
