//! Transform definitions and dispatch
//!
//! A transform node carries an ordered list of `Transform`s. Application is
//! sequential; disabled entries are skipped; the first failure short-circuits
//! the chain and surfaces as an error value.

use crate::error::TabflowError;
use crate::ops;
use crate::value::Table;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One step in a transform chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transform {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TransformKind,
    #[serde(default = "empty_params")]
    pub params: serde_json::Value,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

fn empty_params() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

fn enabled_default() -> bool {
    true
}

impl Transform {
    pub fn new(kind: TransformKind, params: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            params,
            enabled: true,
        }
    }
}

/// Transform catalog. Serialized in camelCase in pipeline files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransformKind {
    // row filtering
    Filter,
    FilterExpression,
    Limit,
    // column structure
    Select,
    SelectColumns,
    Rename,
    RenameColumns,
    RemoveColumn,
    Cast,
    // text
    Trim,
    Uppercase,
    Lowercase,
    Split,
    Concat,
    Substring,
    PadStart,
    PadEnd,
    Replace,
    ReplaceText,
    ReplaceRegex,
    ExtractRegex,
    FillNull,
    // numeric
    Round,
    Absolute,
    Ceiling,
    Floor,
    MathOperation,
    // dates
    ExtractDate,
    FormatDate,
    DateAdd,
    DateDiff,
    // grouping and order
    GroupBy,
    Sort,
    Distinct,
    // computed columns
    AddColumn,
    ConditionalColumn,
    // window-style over current row order
    Rank,
    RowNumber,
    Lag,
    Lead,
    CumulativeSum,
    Percentile,
    // reshaping
    Pivot,
    Unpivot,
}

/// Apply one transform. Parameters are validated against the incoming table
/// before any row is touched.
pub fn apply(transform: &Transform, table: &Table) -> Result<Table, TabflowError> {
    let p = &transform.params;
    match transform.kind {
        TransformKind::Filter => ops::filter::filter(table, p),
        TransformKind::FilterExpression => ops::filter::filter_expression(table, p),
        TransformKind::Limit => ops::filter::limit(table, p),
        TransformKind::Select => ops::columns::select(table, p),
        TransformKind::SelectColumns => ops::columns::select_columns(table, p),
        TransformKind::Rename => ops::columns::rename(table, p),
        TransformKind::RenameColumns => ops::columns::rename_columns(table, p),
        TransformKind::RemoveColumn => ops::columns::remove_column(table, p),
        TransformKind::Cast => ops::columns::cast(table, p),
        TransformKind::Trim => ops::text::trim(table, p),
        TransformKind::Uppercase => ops::text::uppercase(table, p),
        TransformKind::Lowercase => ops::text::lowercase(table, p),
        TransformKind::Split => ops::text::split(table, p),
        TransformKind::Concat => ops::text::concat(table, p),
        TransformKind::Substring => ops::text::substring(table, p),
        TransformKind::PadStart => ops::text::pad_start(table, p),
        TransformKind::PadEnd => ops::text::pad_end(table, p),
        TransformKind::Replace => ops::text::replace(table, p),
        TransformKind::ReplaceText => ops::text::replace_text(table, p),
        TransformKind::ReplaceRegex => ops::text::replace_regex(table, p),
        TransformKind::ExtractRegex => ops::text::extract_regex(table, p),
        TransformKind::FillNull => ops::text::fill_null(table, p),
        TransformKind::Round => ops::numeric::round(table, p),
        TransformKind::Absolute => ops::numeric::absolute(table, p),
        TransformKind::Ceiling => ops::numeric::ceiling(table, p),
        TransformKind::Floor => ops::numeric::floor(table, p),
        TransformKind::MathOperation => ops::numeric::math_operation(table, p),
        TransformKind::ExtractDate => ops::dates::extract_date(table, p),
        TransformKind::FormatDate => ops::dates::format_date(table, p),
        TransformKind::DateAdd => ops::dates::date_add(table, p),
        TransformKind::DateDiff => ops::dates::date_diff(table, p),
        TransformKind::GroupBy => ops::group::group_by(table, p),
        TransformKind::Sort => ops::group::sort(table, p),
        TransformKind::Distinct => ops::group::distinct(table, p),
        TransformKind::AddColumn => ops::compute::add_column(table, p),
        TransformKind::ConditionalColumn => ops::compute::conditional_column(table, p),
        TransformKind::Rank => ops::window::rank(table, p),
        TransformKind::RowNumber => ops::window::row_number(table, p),
        TransformKind::Lag => ops::window::lag(table, p),
        TransformKind::Lead => ops::window::lead(table, p),
        TransformKind::CumulativeSum => ops::window::cumulative_sum(table, p),
        TransformKind::Percentile => ops::window::percentile(table, p),
        TransformKind::Pivot => ops::pivot::pivot(table, p),
        TransformKind::Unpivot => ops::pivot::unpivot(table, p),
    }
}

/// Apply a chain in order. Disabled transforms are skipped; the first error
/// aborts the chain.
pub fn apply_all(transforms: &[Transform], table: &Table) -> Result<Table, TabflowError> {
    let mut current = table.clone();
    for transform in transforms.iter().filter(|t| t.enabled) {
        current = apply(transform, &current)?;
    }
    Ok(current)
}
