//! Grouping, ordering, deduplication

use crate::error::TabflowError;
use crate::validate;
use crate::value::{table_columns, Record, Table, Value};
use indexmap::IndexMap;
use serde_json::Value as Json;
use std::collections::HashSet;

const AGGREGATIONS: &[&str] = &["sum", "avg", "count", "min", "max"];

struct AggSpec {
    column: String,
    operation: String,
    output: String,
}

fn parse_aggregations(params: &Json) -> Result<Vec<AggSpec>, TabflowError> {
    let entries = params
        .get("aggregations")
        .and_then(Json::as_array)
        .ok_or_else(|| {
            TabflowError::validation("missing required list parameter 'aggregations'")
        })?;
    if entries.is_empty() {
        return Err(TabflowError::validation(
            "parameter 'aggregations' must list at least one aggregation",
        ));
    }
    entries
        .iter()
        .map(|entry| {
            let column = validate::require_str(entry, "column")?.to_string();
            let operation = validate::require_str(entry, "operation")?.to_string();
            validate::require_one_of("operation", &operation, AGGREGATIONS)?;
            let output = validate::optional_str(entry, "output")
                .map(str::to_string)
                .unwrap_or_else(|| format!("{operation}_{column}"));
            Ok(AggSpec { column, operation, output })
        })
        .collect()
}

struct GroupState {
    /// first-seen raw key values, emitted as the group's key columns
    key_values: Vec<Value>,
    size: usize,
    /// numeric samples per aggregation, non-numeric values discarded
    numbers: Vec<Vec<f64>>,
}

/// Group on a composite key (parts joined with `|||`), aggregate numeric
/// columns. Groups come out in first-seen order. An aggregation over a group
/// with no numeric values yields sum 0, avg 0, min/max Null; count is the
/// group size regardless.
pub fn group_by(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let key_columns = validate::require_str_list(params, "columns")?;
    let aggs = parse_aggregations(params)?;
    if !table.is_empty() {
        let available = table_columns(table);
        for c in key_columns.iter().chain(aggs.iter().map(|a| &a.column)) {
            validate::require_column(&available, c)?;
        }
    }

    let mut groups: IndexMap<String, GroupState> = IndexMap::new();
    for row in table {
        let key = key_columns
            .iter()
            .map(|c| row.get(c).unwrap_or(&Value::Null).join_key())
            .collect::<Vec<_>>()
            .join("|||");
        let state = groups.entry(key).or_insert_with(|| GroupState {
            key_values: key_columns
                .iter()
                .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                .collect(),
            size: 0,
            numbers: vec![Vec::new(); aggs.len()],
        });
        state.size += 1;
        for (i, agg) in aggs.iter().enumerate() {
            if let Some(n) = row.get(&agg.column).and_then(Value::as_finite_number) {
                state.numbers[i].push(n);
            }
        }
    }

    Ok(groups
        .into_values()
        .map(|state| {
            let mut out = Record::new();
            for (column, value) in key_columns.iter().zip(state.key_values) {
                out.insert(column.clone(), value);
            }
            for (i, agg) in aggs.iter().enumerate() {
                out.insert(agg.output.clone(), aggregate(&agg.operation, &state.numbers[i], state.size));
            }
            out
        })
        .collect())
}

fn aggregate(operation: &str, numbers: &[f64], group_size: usize) -> Value {
    match operation {
        "count" => Value::Number(group_size as f64),
        "sum" => Value::Number(numbers.iter().sum()),
        "avg" => {
            if numbers.is_empty() {
                Value::Number(0.0)
            } else {
                Value::Number(numbers.iter().sum::<f64>() / numbers.len() as f64)
            }
        }
        "min" => numbers
            .iter()
            .copied()
            .fold(None, |acc: Option<f64>, n| Some(acc.map_or(n, |a| a.min(n))))
            .map(Value::Number)
            .unwrap_or(Value::Null),
        _ => numbers
            .iter()
            .copied()
            .fold(None, |acc: Option<f64>, n| Some(acc.map_or(n, |a| a.max(n))))
            .map(Value::Number)
            .unwrap_or(Value::Null),
    }
}

/// Stable sort on one column; string pairs compare lexicographically,
/// everything else numerically
pub fn sort(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let column = validate::require_str(params, "column")?;
    let direction = validate::optional_str(params, "direction").unwrap_or("asc");
    validate::require_one_of("direction", direction, &["asc", "desc"])?;
    if !table.is_empty() {
        validate::require_column(&table_columns(table), column)?;
    }

    let mut out = table.clone();
    out.sort_by(|a, b| {
        let lhs = a.get(column).unwrap_or(&Value::Null);
        let rhs = b.get(column).unwrap_or(&Value::Null);
        let ordering = lhs.compare_raw(rhs);
        if direction == "desc" {
            ordering.reverse()
        } else {
            ordering
        }
    });
    Ok(out)
}

/// Keep the first occurrence per key. With a `columns` param the key is the
/// composite of those columns; without, the whole serialized record.
pub fn distinct(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let key_columns = validate::optional_str_list(params, "columns");
    if let Some(ref cols) = key_columns {
        if !table.is_empty() {
            let available = table_columns(table);
            for c in cols {
                validate::require_column(&available, c)?;
            }
        }
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for row in table {
        let key = match &key_columns {
            Some(cols) => cols
                .iter()
                .map(|c| row.get(c).unwrap_or(&Value::Null).join_key())
                .collect::<Vec<_>>()
                .join("|||"),
            None => serde_json::to_string(row)?,
        };
        if seen.insert(key) {
            out.push(row.clone());
        }
    }
    Ok(out)
}
