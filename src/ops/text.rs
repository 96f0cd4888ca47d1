//! Text transforms
//!
//! In-place string operations leave Null cells untouched; transforms that
//! build strings from several cells (`concat`) render Null as "".

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

/// Apply a string function to every non-null cell of one column
fn map_column(
    table: &Table,
    column: &str,
    f: impl Fn(&str) -> String,
) -> Table {
    table
        .iter()
        .map(|row| {
            let mut out = row.clone();
            if let Some(cell) = out.get_mut(column) {
                if !cell.is_null() {
                    *cell = Value::String(f(&cell.to_text()));
                }
            }
            out
        })
        .collect()
}

pub fn trim(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let column = validate::require_str(params, "column")?;
    let mode = validate::optional_str(params, "mode").unwrap_or("both");
    validate::require_one_of("mode", mode, &["both", "left", "right"])?;
    require_existing(table, column)?;
    Ok(map_column(table, column, |s| match mode {
        "left" => s.trim_start().to_string(),
        "right" => s.trim_end().to_string(),
        _ => s.trim().to_string(),
    }))
}

pub fn uppercase(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let column = validate::require_str(params, "column")?;
    require_existing(table, column)?;
    Ok(map_column(table, column, |s| s.to_uppercase()))
}

pub fn lowercase(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let column = validate::require_str(params, "column")?;
    require_existing(table, column)?;
    Ok(map_column(table, column, |s| s.to_lowercase()))
}

/// Split one column on a delimiter into named output columns; missing parts
/// fill with "". The source column is kept.
pub fn split(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let column = validate::require_str(params, "column")?;
    let delimiter = validate::require_raw_str(params, "delimiter")?;
    let outputs = validate::require_str_list(params, "outputs")?;
    require_existing(table, column)?;
    Ok(table
        .iter()
        .map(|row| {
            let mut out = row.clone();
            let text = row.get(column).map(Value::to_text).unwrap_or_default();
            let parts: Vec<&str> = text.split(delimiter).collect();
            for (i, name) in outputs.iter().enumerate() {
                let piece = parts.get(i).copied().unwrap_or("");
                out.insert(name.clone(), Value::String(piece.to_string()));
            }
            out
        })
        .collect())
}

/// Join several columns into a new one; Null renders as ""
pub fn concat(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let columns = validate::require_str_list(params, "columns")?;
    let output = validate::require_str(params, "output")?;
    let separator = validate::optional_str(params, "separator").unwrap_or("");
    if !table.is_empty() {
        let available = table_columns(table);
        for c in &columns {
            validate::require_column(&available, c)?;
        }
    }
    Ok(table
        .iter()
        .map(|row| {
            let joined = columns
                .iter()
                .map(|c| row.get(c).map(Value::to_text).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(separator);
            let mut out = row.clone();
            out.insert(output.to_string(), Value::String(joined));
            out
        })
        .collect())
}

/// Character-based substring; `length` absent means to end of string
pub fn substring(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let column = validate::require_str(params, "column")?;
    let start = validate::require_number(params, "start")?;
    if start < 0.0 || start.fract() != 0.0 {
        return Err(TabflowError::validation(
            "parameter 'start' must be a non-negative integer",
        ));
    }
    let length = validate::optional_number(params, "length");
    require_existing(table, column)?;
    let start = start as usize;
    Ok(map_column(table, column, |s| {
        let iter = s.chars().skip(start);
        match length {
            Some(len) => iter.take(len.max(0.0) as usize).collect(),
            None => iter.collect(),
        }
    }))
}

fn pad(table: &Table, params: &Json, at_start: bool) -> Result<Table, TabflowError> {
    let column = validate::require_str(params, "column")?;
    let length = validate::require_number(params, "length")? as usize;
    let fill = validate::optional_str(params, "fill").unwrap_or(" ").to_string();
    if fill.is_empty() {
        return Err(TabflowError::validation("parameter 'fill' must not be empty"));
    }
    require_existing(table, column)?;
    Ok(map_column(table, column, |s| {
        let current = s.chars().count();
        if current >= length {
            return s.to_string();
        }
        let padding: String = fill.chars().cycle().take(length - current).collect();
        if at_start {
            format!("{padding}{s}")
        } else {
            format!("{s}{padding}")
        }
    }))
}

pub fn pad_start(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    pad(table, params, true)
}

pub fn pad_end(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    pad(table, params, false)
}

/// Whole-value replacement: the cell text must equal `search` exactly
pub fn replace(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let column = validate::require_str(params, "column")?;
    let search = validate::require_raw_str(params, "search")?.to_string();
    let replacement = validate::optional_str(params, "replacement")
        .unwrap_or("")
        .to_string();
    require_existing(table, column)?;
    Ok(map_column(table, column, |s| {
        if s == search {
            replacement.clone()
        } else {
            s.to_string()
        }
    }))
}

/// Substring replacement of every occurrence
pub fn replace_text(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let column = validate::require_str(params, "column")?;
    let search = validate::require_raw_str(params, "search")?.to_string();
    let replacement = validate::optional_str(params, "replacement")
        .unwrap_or("")
        .to_string();
    require_existing(table, column)?;
    Ok(map_column(table, column, |s| s.replace(&search, &replacement)))
}

pub fn replace_regex(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let column = validate::require_str(params, "column")?;
    let pattern = validate::require_raw_str(params, "pattern")?;
    let replacement = validate::optional_str(params, "replacement").unwrap_or("");
    let re = validate::compile_pattern(pattern)?;
    require_existing(table, column)?;
    Ok(map_column(table, column, |s| {
        re.replace_all(s, replacement).into_owned()
    }))
}

/// Extract the first capture group (or whole match) into a new column;
/// no match yields Null
pub fn extract_regex(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let column = validate::require_str(params, "column")?;
    let pattern = validate::require_raw_str(params, "pattern")?;
    let output = validate::require_str(params, "output")?;
    let re = validate::compile_pattern(pattern)?;
    require_existing(table, column)?;
    Ok(table
        .iter()
        .map(|row| {
            let mut out = row.clone();
            let extracted = row
                .get(column)
                .filter(|v| !v.is_null())
                .and_then(|v| {
                    let text = v.to_text();
                    re.captures(&text).map(|caps| {
                        caps.get(1)
                            .or_else(|| caps.get(0))
                            .map(|m| m.as_str().to_string())
                            .unwrap_or_default()
                    })
                })
                .map(Value::String)
                .unwrap_or(Value::Null);
            out.insert(output.to_string(), extracted);
            out
        })
        .collect())
}

/// Replace Null and "" with a default value
pub fn fill_null(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let column = validate::require_str(params, "column")?;
    let default = validate::value_param(params, "value");
    require_existing(table, column)?;
    Ok(table
        .iter()
        .map(|row| {
            let mut out = row.clone();
            if let Some(cell) = out.get_mut(column) {
                if cell.is_nullish() {
                    *cell = default.clone();
                }
            }
            out
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Record;
    use serde_json::json;

    fn table_of(column: &str, values: Vec<Value>) -> Table {
        values
            .into_iter()
            .map(|v| {
                let mut r = Record::new();
                r.insert(column.to_string(), v);
                r
            })
            .collect()
    }

    #[test]
    fn trim_modes() {
        let t = table_of("v", vec![Value::from("  hi  ")]);
        assert_eq!(
            trim(&t, &json!({"column": "v"})).unwrap()[0]["v"],
            Value::from("hi")
        );
        assert_eq!(
            trim(&t, &json!({"column": "v", "mode": "left"})).unwrap()[0]["v"],
            Value::from("hi  ")
        );
    }

    #[test]
    fn null_cells_pass_through_case_change() {
        let t = table_of("v", vec![Value::Null, Value::from("ok")]);
        let out = uppercase(&t, &json!({"column": "v"})).unwrap();
        assert_eq!(out[0]["v"], Value::Null);
        assert_eq!(out[1]["v"], Value::from("OK"));
    }

    #[test]
    fn split_fills_missing_parts() {
        let t = table_of("name", vec![Value::from("Ada Lovelace"), Value::from("Plato")]);
        let out = split(
            &t,
            &json!({"column": "name", "delimiter": " ", "outputs": ["first", "last"]}),
        )
        .unwrap();
        assert_eq!(out[0]["last"], Value::from("Lovelace"));
        assert_eq!(out[1]["last"], Value::from(""));
    }

    #[test]
    fn replace_text_accepts_space_search() {
        let t = table_of("v", vec![Value::from("a b c")]);
        let out = replace_text(
            &t,
            &json!({"column": "v", "search": " ", "replacement": "_"}),
        )
        .unwrap();
        assert_eq!(out[0]["v"], Value::from("a_b_c"));
    }

    #[test]
    fn concat_renders_null_empty() {
        let mut r = Record::new();
        r.insert("a".to_string(), Value::from("x"));
        r.insert("b".to_string(), Value::Null);
        let out = concat(
            &vec![r],
            &json!({"columns": ["a", "b"], "separator": "-", "output": "ab"}),
        )
        .unwrap();
        assert_eq!(out[0]["ab"], Value::from("x-"));
    }

    #[test]
    fn pad_start_cycles_fill() {
        let t = table_of("v", vec![Value::from("7")]);
        let out = pad_start(&t, &json!({"column": "v", "length": 3, "fill": "0"})).unwrap();
        assert_eq!(out[0]["v"], Value::from("007"));
    }

    #[test]
    fn replace_is_whole_value() {
        let t = table_of("v", vec![Value::from("ab"), Value::from("abc")]);
        let out = replace(
            &t,
            &json!({"column": "v", "search": "ab", "replacement": "X"}),
        )
        .unwrap();
        assert_eq!(out[0]["v"], Value::from("X"));
        assert_eq!(out[1]["v"], Value::from("abc"));
    }

    #[test]
    fn extract_regex_prefers_first_group() {
        let t = table_of("v", vec![Value::from("id-42"), Value::from("none")]);
        let out = extract_regex(
            &t,
            &json!({"column": "v", "pattern": r"id-(\d+)", "output": "id"}),
        )
        .unwrap();
        assert_eq!(out[0]["id"], Value::from("42"));
        assert_eq!(out[1]["id"], Value::Null);
    }

    #[test]
    fn bad_pattern_is_validation_error() {
        let t = table_of("v", vec![Value::from("x")]);
        let err = replace_regex(&t, &json!({"column": "v", "pattern": "("})).unwrap_err();
        assert!(matches!(err, TabflowError::Validation { .. }));
    }

    #[test]
    fn fill_null_covers_empty_string() {
        let t = table_of("v", vec![Value::Null, Value::from(""), Value::from("x")]);
        let out = fill_null(&t, &json!({"column": "v", "value": "n/a"})).unwrap();
        assert_eq!(out[0]["v"], Value::from("n/a"));
        assert_eq!(out[1]["v"], Value::from("n/a"));
        assert_eq!(out[2]["v"], Value::from("x"));
    }
}
