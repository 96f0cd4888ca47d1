//! Cell values, records and tables
//!
//! `Value` is the closed sum every transform and the expression evaluator
//! pattern-match over. Records keep column insertion order for display;
//! the order carries no semantics.

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One cell of a table
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Date(NaiveDate),
}

/// One row: column name -> value, insertion order preserved
pub type Record = IndexMap<String, Value>;

/// The unit data flows in: an ordered sequence of records
pub type Table = Vec<Record>;

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null-ish per filter semantics: Null and "" both count as null
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Null) || matches!(self, Value::String(s) if s.is_empty())
    }

    /// Numeric coercion. Follows loose dynamic-language rules: booleans are
    /// 0/1, empty strings are 0, non-numeric strings are NaN. NaN is a value
    /// here, never an error.
    pub fn as_number(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            Value::Date(_) => f64::NAN,
        }
    }

    /// Numeric coercion for aggregations and numeric transforms: Null is
    /// not a sample, and NaN data is distinguished from "not a number"
    pub fn as_finite_number(&self) -> Option<f64> {
        if matches!(self, Value::Null) {
            return None;
        }
        let n = self.as_number();
        n.is_finite().then_some(n)
    }

    /// String coercion. Null renders as the empty string.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    /// Truthiness for logical operators and expression filters
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Date(_) => true,
        }
    }

    /// Strict equality: same variant, same value (the `===` of the
    /// expression language)
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            _ => self == other,
        }
    }

    /// Loose equality: same-variant comparison, otherwise numeric coercion
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (a, b) if std::mem::discriminant(a) == std::mem::discriminant(b) => a.strict_eq(b),
            (a, b) => {
                let (x, y) = (a.as_number(), b.as_number());
                !x.is_nan() && !y.is_nan() && x == y
            }
        }
    }

    /// Raw ordering for sort: string pairs compare lexicographically, date
    /// pairs chronologically, everything else through numeric coercion.
    /// Incomparable pairs (NaN involved) order as equal.
    pub fn compare_raw(&self, other: &Value) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (self, other) {
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (a, b) => a
                .as_number()
                .partial_cmp(&b.as_number())
                .unwrap_or(Ordering::Equal),
        }
    }

    /// Canonical key for hash joins and distinct. Type-tagged so the number
    /// 1 and the string "1" never collide; Null keys collide with Null keys
    /// on purpose.
    pub fn join_key(&self) -> String {
        match self {
            Value::Null => "z".to_string(),
            Value::Boolean(b) => format!("b:{b}"),
            Value::Number(n) => format!("n:{}", format_number(*n)),
            Value::String(s) => format!("s:{s}"),
            Value::Date(d) => format!("d:{d}"),
        }
    }

    /// Convert a JSON scalar into a cell value. Arrays and objects have no
    /// cell representation and flatten to their JSON text.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            other => Value::String(other.to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

/// Integral floats print without a fraction, mirroring how the numbers
/// entered the system from JSON
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

/// Column set of a table: the first record's keys (tables are treated as
/// uniform for transform purposes)
pub fn table_columns(table: &Table) -> Vec<String> {
    table
        .first()
        .map(|row| row.keys().cloned().collect())
        .unwrap_or_default()
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Number(n) if n.is_finite() => serializer.serialize_f64(*n),
            // JSON has no NaN/Infinity; degrade to null like JSON.stringify
            Value::Number(_) => serializer.serialize_unit(),
            Value::String(s) => serializer.serialize_str(s),
            Value::Date(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a string, number, boolean or null")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Boolean(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Number(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::Number(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Number(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Value, D::Error> {
        d.deserialize_any(ValueVisitor)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_coercion() {
        assert_eq!(Value::from("42").as_number(), 42.0);
        assert_eq!(Value::from(" 3.5 ").as_number(), 3.5);
        assert!(Value::from("abc").as_number().is_nan());
        assert_eq!(Value::Null.as_number(), 0.0);
        assert_eq!(Value::from(true).as_number(), 1.0);
        assert_eq!(Value::from("").as_number(), 0.0);
    }

    #[test]
    fn null_is_not_a_numeric_sample() {
        assert_eq!(Value::Null.as_finite_number(), None);
        assert_eq!(Value::from("abc").as_finite_number(), None);
        assert_eq!(Value::from("").as_finite_number(), Some(0.0));
        assert_eq!(Value::Number(2.5).as_finite_number(), Some(2.5));
    }

    #[test]
    fn text_coercion() {
        assert_eq!(Value::Number(5.0).to_text(), "5");
        assert_eq!(Value::Number(5.25).to_text(), "5.25");
        assert_eq!(Value::Null.to_text(), "");
        assert_eq!(Value::Boolean(true).to_text(), "true");
    }

    #[test]
    fn nullish_covers_empty_string() {
        assert!(Value::Null.is_nullish());
        assert!(Value::from("").is_nullish());
        assert!(!Value::from("x").is_nullish());
        assert!(!Value::Number(0.0).is_nullish());
    }

    #[test]
    fn join_keys_are_type_tagged() {
        assert_ne!(Value::Number(1.0).join_key(), Value::from("1").join_key());
        assert_eq!(Value::Null.join_key(), Value::Null.join_key());
    }

    #[test]
    fn loose_eq_coerces_across_types() {
        assert!(Value::Number(5.0).loose_eq(&Value::from("5")));
        assert!(!Value::Number(5.0).loose_eq(&Value::from("abc")));
        assert!(Value::Null.loose_eq(&Value::Null));
        assert!(!Value::Null.loose_eq(&Value::Number(0.0)));
    }

    #[test]
    fn raw_compare_strings_lexicographic() {
        use std::cmp::Ordering;
        assert_eq!(
            Value::from("10").compare_raw(&Value::from("9")),
            Ordering::Less
        );
        assert_eq!(
            Value::Number(10.0).compare_raw(&Value::Number(9.0)),
            Ordering::Greater
        );
    }

    #[test]
    fn yaml_round_trip() {
        let v: Value = serde_yaml::from_str("42").unwrap();
        assert_eq!(v, Value::Number(42.0));
        let v: Value = serde_yaml::from_str("hello").unwrap();
        assert_eq!(v, Value::String("hello".to_string()));
        let v: Value = serde_yaml::from_str("null").unwrap();
        assert_eq!(v, Value::Null);
    }
}
