//! Hash join and union over tables
//!
//! The right table is indexed by key (multi-value: duplicate keys fan out).
//! Matched pairs shallow-merge with right-hand columns winning; left/outer
//! keep unmatched left rows as-is; right/outer emit each unmatched right row
//! exactly once. Keys are the canonical `Value::join_key` encoding, so the
//! number 1 and the string "1" never match, and Null keys match each other.

use crate::error::TabflowError;
use crate::value::{table_columns, Record, Table, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
    Right,
    Outer,
}

fn require_key(table: &Table, key: &str, side: &str) -> Result<(), TabflowError> {
    if table.is_empty() {
        return Ok(());
    }
    let columns = table_columns(table);
    if columns.iter().any(|c| c == key) {
        return Ok(());
    }
    Err(TabflowError::join(format!(
        "{side} key column '{}' does not exist (available: {})",
        key,
        columns.join(", ")
    )))
}

pub fn join(
    left: &Table,
    right: &Table,
    left_key: &str,
    right_key: &str,
    kind: JoinKind,
) -> Result<Table, TabflowError> {
    require_key(left, left_key, "left")?;
    require_key(right, right_key, "right")?;

    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, row) in right.iter().enumerate() {
        let key = row.get(right_key).unwrap_or(&Value::Null).join_key();
        index.entry(key).or_default().push(i);
    }

    let mut matched_right = vec![false; right.len()];
    let mut out = Vec::new();

    for row in left {
        let key = row.get(left_key).unwrap_or(&Value::Null).join_key();
        match index.get(&key) {
            Some(partners) => {
                for &i in partners {
                    matched_right[i] = true;
                    out.push(merge(row, &right[i]));
                }
            }
            None => {
                if matches!(kind, JoinKind::Left | JoinKind::Outer) {
                    out.push(row.clone());
                }
            }
        }
    }

    if matches!(kind, JoinKind::Right | JoinKind::Outer) {
        for (i, row) in right.iter().enumerate() {
            if !matched_right[i] {
                out.push(row.clone());
            }
        }
    }

    Ok(out)
}

/// Shallow merge: left columns in order, right values overwrite shared
/// names in place, new right columns append
fn merge(left: &Record, right: &Record) -> Record {
    let mut out = left.clone();
    for (key, value) in right {
        out.insert(key.clone(), value.clone());
    }
    out
}

/// Union is plain concatenation; no column reconciliation, no dedup
pub fn union(left: &Table, right: &Table) -> Table {
    let mut out = left.clone();
    out.extend(right.iter().cloned());
    out
}
