//! Reshaping: pivot and unpivot

use crate::error::TabflowError;
use crate::validate;
use crate::value::{table_columns, Record, Table, Value};
use indexmap::IndexMap;
use serde_json::Value as Json;

const AGGREGATIONS: &[&str] = &["sum", "avg", "count", "min", "max"];

/// Spread one column's values into columns.
///
/// `rowKeys` identify each output row, `columnKey` supplies the new column
/// names (first-seen order), `valueColumn` feeds the aggregation (default
/// sum). A missing key/value combination stays Null.
pub fn pivot(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let row_keys = validate::require_str_list(params, "rowKeys")?;
    let column_key = validate::require_str(params, "columnKey")?;
    let value_column = validate::require_str(params, "valueColumn")?;
    let aggregation = validate::optional_str(params, "aggregation").unwrap_or("sum");
    validate::require_one_of("aggregation", aggregation, AGGREGATIONS)?;
    if !table.is_empty() {
        let available = table_columns(table);
        for c in row_keys.iter().chain([column_key.to_string(), value_column.to_string()].iter()) {
            validate::require_column(&available, c)?;
        }
    }

    // new column names in first-seen order
    let mut spread_columns: Vec<String> = Vec::new();
    for row in table {
        let name = row.get(column_key).unwrap_or(&Value::Null).to_text();
        if !spread_columns.contains(&name) {
            spread_columns.push(name);
        }
    }

    struct Group {
        key_values: Vec<Value>,
        cells: IndexMap<String, Vec<f64>>,
        counts: IndexMap<String, usize>,
    }

    let mut groups: IndexMap<String, Group> = IndexMap::new();
    for row in table {
        let key = row_keys
            .iter()
            .map(|c| row.get(c).unwrap_or(&Value::Null).join_key())
            .collect::<Vec<_>>()
            .join("|||");
        let group = groups.entry(key).or_insert_with(|| Group {
            key_values: row_keys
                .iter()
                .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                .collect(),
            cells: IndexMap::new(),
            counts: IndexMap::new(),
        });
        let name = row.get(column_key).unwrap_or(&Value::Null).to_text();
        *group.counts.entry(name.clone()).or_insert(0) += 1;
        if let Some(n) = row.get(value_column).and_then(Value::as_finite_number) {
            group.cells.entry(name).or_default().push(n);
        }
    }

    Ok(groups
        .into_values()
        .map(|group| {
            let mut out = Record::new();
            for (column, value) in row_keys.iter().zip(group.key_values) {
                out.insert(column.clone(), value);
            }
            for name in &spread_columns {
                let cell = match (group.cells.get(name), group.counts.get(name)) {
                    (_, None) => Value::Null,
                    (numbers, Some(&count)) => {
                        aggregate(aggregation, numbers.map(Vec::as_slice).unwrap_or(&[]), count)
                    }
                };
                out.insert(name.clone(), cell);
            }
            out
        })
        .collect())
}

fn aggregate(operation: &str, numbers: &[f64], count: usize) -> Value {
    match operation {
        "count" => Value::Number(count as f64),
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
            .reduce(f64::min)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        _ => numbers
            .iter()
            .copied()
            .reduce(f64::max)
            .map(Value::Number)
            .unwrap_or(Value::Null),
    }
}

/// Melt value columns into (name, value) rows, one per value column
pub fn unpivot(table: &Table, params: &Json) -> Result<Table, TabflowError> {
    let id_columns = validate::require_str_list(params, "idColumns")?;
    let value_columns = validate::require_str_list(params, "valueColumns")?;
    let name_column = validate::optional_str(params, "nameColumn").unwrap_or("name");
    let value_column = validate::optional_str(params, "valueColumn").unwrap_or("value");
    if !table.is_empty() {
        let available = table_columns(table);
        for c in id_columns.iter().chain(value_columns.iter()) {
            validate::require_column(&available, c)?;
        }
    }

    let mut out = Vec::with_capacity(table.len() * value_columns.len());
    for row in table {
        for vc in &value_columns {
            let mut melted = Record::new();
            for id in &id_columns {
                melted.insert(id.clone(), row.get(id).cloned().unwrap_or(Value::Null));
            }
            melted.insert(name_column.to_string(), Value::String(vc.clone()));
            melted.insert(
                value_column.to_string(),
                row.get(vc).cloned().unwrap_or(Value::Null),
            );
            out.push(melted);
        }
    }
    Ok(out)
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

    fn quarterly() -> Table {
        vec![
            row(&[
                ("region", Value::from("north")),
                ("quarter", Value::from("Q1")),
                ("sales", Value::Number(10.0)),
            ]),
            row(&[
                ("region", Value::from("north")),
                ("quarter", Value::from("Q2")),
                ("sales", Value::Number(20.0)),
            ]),
            row(&[
                ("region", Value::from("south")),
                ("quarter", Value::from("Q1")),
                ("sales", Value::Number(5.0)),
            ]),
        ]
    }

    #[test]
    fn pivot_spreads_column_key() {
        let out = pivot(
            &quarterly(),
            &json!({"rowKeys": ["region"], "columnKey": "quarter", "valueColumn": "sales"}),
        )
        .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["Q1"], Value::Number(10.0));
        assert_eq!(out[0]["Q2"], Value::Number(20.0));
        // south never saw Q2
        assert_eq!(out[1]["Q2"], Value::Null);
    }

    #[test]
    fn pivot_count_aggregation() {
        let out = pivot(
            &quarterly(),
            &json!({
                "rowKeys": ["region"], "columnKey": "quarter",
                "valueColumn": "sales", "aggregation": "count"
            }),
        )
        .unwrap();
        assert_eq!(out[0]["Q1"], Value::Number(1.0));
    }

    #[test]
    fn unpivot_melts_value_columns() {
        let table = vec![row(&[
            ("id", Value::from("a")),
            ("q1", Value::Number(1.0)),
            ("q2", Value::Number(2.0)),
        ])];
        let out = unpivot(
            &table,
            &json!({"idColumns": ["id"], "valueColumns": ["q1", "q2"]}),
        )
        .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["name"], Value::from("q1"));
        assert_eq!(out[0]["value"], Value::Number(1.0));
        assert_eq!(out[1]["name"], Value::from("q2"));
    }
}
