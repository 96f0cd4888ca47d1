//! Safe expression evaluator for derived columns
//!
//! Evaluates a restricted arithmetic/logical/string language against one
//! record, without delegating to a general-purpose interpreter. Supported:
//! - column access: `row.name` or `row['name']`, or a bare identifier
//! - arithmetic: `+ - * / % **` (numeric coercion, NaN propagates as a value)
//! - comparison: `> < >= <= == != === !==`
//! - logical: `&& || !`, ternary `cond ? a : b`
//! - whitelisted function calls (`Math.round(...)`, `Number(...)`, ...)
//! - parentheses
//!
//! The parser is a pattern-match cascade over string slices: each precedence
//! level scans for the rightmost top-level operator (outside quotes and
//! balanced parens) and recurses on both sides, which yields left-to-right
//! associativity without a token stream.

use crate::error::TabflowError;
use crate::value::{Record, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static NUMBER_LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+(\.\d+)?$").unwrap());
static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").unwrap());
static BRACKET_ACCESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^row\[['"](.+?)['"]\]$"#).unwrap());
static FUNCTION_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)*)\((.*)\)$").unwrap());

type SafeFn = fn(&[Value]) -> Value;

/// Capability allowlist: any call to a name absent from this map is an error
static FUNCTIONS: Lazy<HashMap<&'static str, SafeFn>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, SafeFn> = HashMap::new();
    m.insert("Math.abs", |a| num1(a, f64::abs));
    m.insert("Math.ceil", |a| num1(a, f64::ceil));
    m.insert("Math.floor", |a| num1(a, f64::floor));
    // round half away from floor, the dynamic-language convention
    m.insert("Math.round", |a| num1(a, |n| (n + 0.5).floor()));
    m.insert("Math.sqrt", |a| num1(a, f64::sqrt));
    m.insert("Math.sin", |a| num1(a, f64::sin));
    m.insert("Math.cos", |a| num1(a, f64::cos));
    m.insert("Math.tan", |a| num1(a, f64::tan));
    m.insert("Math.pow", |a| {
        Value::Number(arg(a, 0).as_number().powf(arg(a, 1).as_number()))
    });
    m.insert("Math.max", |a| {
        Value::Number(
            a.iter()
                .map(Value::as_number)
                .fold(f64::NEG_INFINITY, f64::max),
        )
    });
    m.insert("Math.min", |a| {
        Value::Number(a.iter().map(Value::as_number).fold(f64::INFINITY, f64::min))
    });
    m.insert("String", |a| Value::String(arg(a, 0).to_text()));
    m.insert("Number", |a| Value::Number(arg(a, 0).as_number()));
    m.insert("Boolean", |a| Value::Boolean(arg(a, 0).truthy()));
    m.insert("parseInt", |a| Value::Number(parse_leading(&arg(a, 0), false)));
    m.insert("parseFloat", |a| Value::Number(parse_leading(&arg(a, 0), true)));
    m.insert("toUpperCase", |a| {
        Value::String(arg(a, 0).to_text().to_uppercase())
    });
    m.insert("toLowerCase", |a| {
        Value::String(arg(a, 0).to_text().to_lowercase())
    });
    m.insert("trim", |a| Value::String(arg(a, 0).to_text().trim().to_string()));
    m.insert("length", |a| {
        Value::Number(arg(a, 0).to_text().chars().count() as f64)
    });
    m
});

fn arg(args: &[Value], idx: usize) -> Value {
    args.get(idx).cloned().unwrap_or(Value::Null)
}

fn num1(args: &[Value], f: impl Fn(f64) -> f64) -> Value {
    Value::Number(f(arg(args, 0).as_number()))
}

/// Longest numeric prefix, parseInt/parseFloat style
fn parse_leading(v: &Value, float: bool) -> f64 {
    let text = v.to_text();
    let s = text.trim();
    let mut end = 0;
    let bytes = s.as_bytes();
    if end < bytes.len() && (bytes[end] == b'-' || bytes[end] == b'+') {
        end += 1;
    }
    let mut seen_digit = false;
    let mut seen_dot = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => seen_digit = true,
            b'.' if float && !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }
    if !seen_digit {
        return f64::NAN;
    }
    let prefix = &s[..end];
    if float {
        prefix.parse().unwrap_or(f64::NAN)
    } else {
        let cut = prefix.find('.').unwrap_or(prefix.len());
        prefix[..cut].parse().unwrap_or(f64::NAN)
    }
}

/// Evaluate an expression against one record.
///
/// Missing columns read as Null; arithmetic on non-numeric data yields NaN
/// as a value. Malformed syntax and non-whitelisted function calls fail
/// with an expression error.
pub fn evaluate(expression: &str, record: &Record) -> Result<Value, TabflowError> {
    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return Err(TabflowError::expression("expression must not be empty"));
    }
    eval(trimmed, record)
        .map_err(|e| TabflowError::expression(format!("evaluation of '{expression}' failed: {e}")))
}

fn eval(expr: &str, record: &Record) -> Result<Value, String> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err("empty subexpression".to_string());
    }

    // 1. Parenthesized sub-expression
    if wrapped_in_parens(expr) {
        return eval(&expr[1..expr.len() - 1], record);
    }

    // 2. Ternary
    if let Some((cond, if_true, if_false)) = match_ternary(expr) {
        return if eval(cond, record)?.truthy() {
            eval(if_true, record)
        } else {
            eval(if_false, record)
        };
    }

    // 3. Logical
    if let Some((left, op, right)) = split_binary(expr, &["||", "&&"]) {
        let lhs = eval(left, record)?;
        return match op {
            "&&" => {
                if lhs.truthy() {
                    eval(right, record)
                } else {
                    Ok(lhs)
                }
            }
            _ => {
                if lhs.truthy() {
                    Ok(lhs)
                } else {
                    eval(right, record)
                }
            }
        };
    }

    // 4. Comparison
    if let Some((left, op, right)) =
        split_binary(expr, &["===", "!==", "==", "!=", ">=", "<=", ">", "<"])
    {
        let lhs = eval(left, record)?;
        let rhs = eval(right, record)?;
        return Ok(Value::Boolean(match op {
            "===" => lhs.strict_eq(&rhs),
            "!==" => !lhs.strict_eq(&rhs),
            "==" => lhs.loose_eq(&rhs),
            "!=" => !lhs.loose_eq(&rhs),
            other => relational(&lhs, &rhs, other),
        }));
    }

    // 5. Arithmetic
    if let Some((left, op, right)) = split_binary(expr, &["**", "+", "-", "*", "/", "%"]) {
        let lhs = eval(left, record)?.as_number();
        let rhs = eval(right, record)?.as_number();
        return Ok(Value::Number(match op {
            "+" => lhs + rhs,
            "-" => lhs - rhs,
            "*" => lhs * rhs,
            "/" => lhs / rhs,
            "%" => lhs % rhs,
            _ => lhs.powf(rhs),
        }));
    }

    // 6. Unary
    if let Some(rest) = expr.strip_prefix('!') {
        return Ok(Value::Boolean(!eval(rest, record)?.truthy()));
    }
    if let Some(rest) = expr.strip_prefix('-') {
        if !rest.trim().is_empty() && !NUMBER_LITERAL.is_match(expr) {
            return Ok(Value::Number(-eval(rest, record)?.as_number()));
        }
    }

    // 7. Function call against the allowlist
    if let Some(caps) = FUNCTION_CALL.captures(expr) {
        let name = caps.get(1).unwrap().as_str();
        let args_src = caps.get(2).unwrap().as_str().trim();
        let func = FUNCTIONS
            .get(name)
            .ok_or_else(|| format!("function not allowed: {name}"))?;
        let mut args = Vec::new();
        for piece in split_arguments(args_src) {
            args.push(eval(piece, record)?);
        }
        return Ok(func(&args));
    }

    // 8. Literals and column references
    if NUMBER_LITERAL.is_match(expr) {
        return Ok(Value::Number(expr.parse().map_err(|_| "bad number")?));
    }
    if is_string_literal(expr) {
        return Ok(Value::String(expr[1..expr.len() - 1].to_string()));
    }
    match expr {
        "true" => return Ok(Value::Boolean(true)),
        "false" => return Ok(Value::Boolean(false)),
        "null" | "undefined" => return Ok(Value::Null),
        _ => {}
    }
    if let Some(column) = expr.strip_prefix("row.") {
        return Ok(record.get(column).cloned().unwrap_or(Value::Null));
    }
    if expr.starts_with("row[") {
        let caps = BRACKET_ACCESS
            .captures(expr)
            .ok_or_else(|| format!("invalid column access: {expr}"))?;
        return Ok(record
            .get(caps.get(1).unwrap().as_str())
            .cloned()
            .unwrap_or(Value::Null));
    }
    if IDENTIFIER.is_match(expr) {
        return Ok(record.get(expr).cloned().unwrap_or(Value::Null));
    }

    Err(format!("unsupported expression: {expr}"))
}

/// `> < >= <=`: string pairs compare lexicographically, everything else
/// through numeric coercion; NaN comparisons are false
fn relational(lhs: &Value, rhs: &Value, op: &str) -> bool {
    if let (Value::String(a), Value::String(b)) = (lhs, rhs) {
        return match op {
            ">" => a > b,
            "<" => a < b,
            ">=" => a >= b,
            _ => a <= b,
        };
    }
    let (a, b) = (lhs.as_number(), rhs.as_number());
    if a.is_nan() || b.is_nan() {
        return false;
    }
    match op {
        ">" => a > b,
        "<" => a < b,
        ">=" => a >= b,
        _ => a <= b,
    }
}

/// Character scanner state shared by the slicing helpers
struct Scan {
    chars: Vec<(usize, char)>,
}

impl Scan {
    fn new(expr: &str) -> Self {
        Self {
            chars: expr.char_indices().collect(),
        }
    }

    /// Positions (byte offsets) of chars at top level: outside string
    /// literals and outside balanced parentheses
    fn top_level(&self) -> Vec<(usize, char, i32)> {
        let mut out = Vec::new();
        let mut depth = 0i32;
        let mut in_string = false;
        let mut quote = ' ';
        for (idx, &(byte, ch)) in self.chars.iter().enumerate() {
            let escaped = idx > 0 && self.chars[idx - 1].1 == '\\';
            if (ch == '"' || ch == '\'') && !escaped {
                if in_string && quote == ch {
                    in_string = false;
                } else if !in_string {
                    in_string = true;
                    quote = ch;
                }
                continue;
            }
            if in_string {
                continue;
            }
            if ch == '(' {
                depth += 1;
            }
            if ch == ')' {
                depth -= 1;
            }
            out.push((byte, ch, depth));
        }
        out
    }
}

/// Does the leading '(' pair with the trailing ')'?
fn wrapped_in_parens(expr: &str) -> bool {
    if !expr.starts_with('(') || !expr.ends_with(')') {
        return false;
    }
    let scan = Scan::new(expr);
    let positions = scan.top_level();
    // after the leading '(', depth must not return to 0 until the last char
    for (i, &(byte, _, depth)) in positions.iter().enumerate() {
        if byte == 0 {
            continue;
        }
        if depth == 0 && i + 1 < positions.len() {
            return false;
        }
    }
    true
}

fn is_string_literal(expr: &str) -> bool {
    expr.len() >= 2
        && ((expr.starts_with('"') && expr.ends_with('"'))
            || (expr.starts_with('\'') && expr.ends_with('\'')))
}

/// First top-level `?` and the first top-level `:` after it
fn match_ternary(expr: &str) -> Option<(&str, &str, &str)> {
    let scan = Scan::new(expr);
    let mut question = None;
    let mut colon = None;
    for (byte, ch, depth) in scan.top_level() {
        if depth != 0 {
            continue;
        }
        match ch {
            '?' if question.is_none() => question = Some(byte),
            ':' if question.is_some() && colon.is_none() => colon = Some(byte),
            _ => {}
        }
    }
    let (q, c) = (question?, colon?);
    Some((&expr[..q], &expr[q + 1..c], &expr[c + 1..]))
}

/// Rightmost top-level occurrence of any operator in `ops`.
///
/// Scanning right-to-left and recursing on the left side yields correct
/// left-to-right associativity for same-precedence chains. Longer operators
/// are matched before their prefixes, and a `+`/`-` directly after another
/// operator (or at the start) is unary and skipped here.
fn split_binary<'a>(expr: &'a str, ops: &[&'static str]) -> Option<(&'a str, &'static str, &'a str)> {
    let scan = Scan::new(expr);
    let positions = scan.top_level();
    for i in (0..positions.len()).rev() {
        let (byte, _, depth) = positions[i];
        if depth != 0 {
            continue;
        }
        for &op in ops {
            if !expr[byte..].starts_with(op) {
                continue;
            }
            // part of a longer operator to the left (e.g. the '=' in '>=',
            // the right '*' of '**')
            if let Some(prev) = prev_char(expr, byte) {
                let extends_left = match op {
                    "==" | "===" => matches!(prev, '=' | '!' | '<' | '>'),
                    "*" => prev == '*',
                    ">" | "<" => false,
                    _ => false,
                };
                if extends_left {
                    continue;
                }
            }
            // part of a longer operator to the right ('*' then '*')
            if op == "*" && expr[byte + 1..].starts_with('*') {
                continue;
            }
            // unary sign, not a binary operator
            if (op == "-" || op == "+") && is_unary_position(expr, byte) {
                continue;
            }
            let left = &expr[..byte];
            let right = &expr[byte + op.len()..];
            if left.trim().is_empty() {
                continue;
            }
            return Some((left, op, right));
        }
    }
    None
}

fn prev_char(expr: &str, byte: usize) -> Option<char> {
    expr[..byte].chars().next_back()
}

/// A '-'/'+' is unary when the previous non-space char is another operator
/// or an opening paren, or when there is nothing to its left
fn is_unary_position(expr: &str, byte: usize) -> bool {
    match expr[..byte].trim_end().chars().next_back() {
        None => true,
        Some(c) => matches!(
            c,
            '(' | '?' | ':' | ',' | '+' | '-' | '*' | '/' | '%' | '<' | '>' | '=' | '&' | '|' | '!'
        ),
    }
}

/// Split a function argument list on top-level commas
fn split_arguments(args: &str) -> Vec<&str> {
    if args.trim().is_empty() {
        return Vec::new();
    }
    let scan = Scan::new(args);
    let mut pieces = Vec::new();
    let mut start = 0;
    for (byte, ch, depth) in scan.top_level() {
        if ch == ',' && depth == 0 {
            pieces.push(args[start..byte].trim());
            start = byte + 1;
        }
    }
    pieces.push(args[start..].trim());
    pieces.retain(|p| !p.is_empty());
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn record(pairs: &[(&str, Value)]) -> Record {
        let mut r = IndexMap::new();
        for (k, v) in pairs {
            r.insert(k.to_string(), v.clone());
        }
        r
    }

    fn num(expr: &str, rec: &Record) -> f64 {
        match evaluate(expr, rec).unwrap() {
            Value::Number(n) => n,
            other => panic!("expected number, got {other:?}"),
        }
    }

    #[test]
    fn subtraction_is_left_associative() {
        assert_eq!(num("10 - 3 - 2", &record(&[])), 5.0);
    }

    #[test]
    fn exponent_operator() {
        assert_eq!(num("2 ** 3", &record(&[])), 8.0);
        assert_eq!(num("2 ** 3 ** 2", &record(&[])), 64.0); // left-to-right
    }

    #[test]
    fn ternary_on_column() {
        let rec = record(&[("a", Value::Number(10.0))]);
        assert_eq!(
            evaluate("row.a > 5 ? 'big' : 'small'", &rec).unwrap(),
            Value::from("big")
        );
        let rec = record(&[("a", Value::Number(3.0))]);
        assert_eq!(
            evaluate("row.a > 5 ? 'big' : 'small'", &rec).unwrap(),
            Value::from("small")
        );
    }

    #[test]
    fn flat_arithmetic_groups_with_parens() {
        // one arithmetic level, rightmost split: 2 + 3 * 4 reads (2 + 3) * 4
        assert_eq!(num("2 + 3 * 4", &record(&[])), 20.0);
        assert_eq!(num("2 + (3 * 4)", &record(&[])), 14.0);
        assert_eq!(num("(2 + 3) * 4", &record(&[])), 20.0);
        assert_eq!(num("(1) + (2)", &record(&[])), 3.0);
    }

    #[test]
    fn unary_operators() {
        assert_eq!(num("-5 + 3", &record(&[])), -2.0);
        assert_eq!(num("3 * -2", &record(&[])), -6.0);
        assert_eq!(
            evaluate("!false", &record(&[])).unwrap(),
            Value::Boolean(true)
        );
    }

    #[test]
    fn nan_propagates_as_value() {
        assert!(num("'abc' * 2", &record(&[])).is_nan());
    }

    #[test]
    fn missing_column_reads_null() {
        assert_eq!(evaluate("row.gone", &record(&[])).unwrap(), Value::Null);
        assert_eq!(evaluate("gone", &record(&[])).unwrap(), Value::Null);
    }

    #[test]
    fn bracket_column_access() {
        let rec = record(&[("unit price", Value::Number(7.0))]);
        assert_eq!(num("row['unit price'] * 2", &rec), 14.0);
    }

    #[test]
    fn whitelisted_functions() {
        assert_eq!(num("Math.abs(-4)", &record(&[])), 4.0);
        assert_eq!(num("Math.round(2.5)", &record(&[])), 3.0);
        assert_eq!(num("Math.max(1, 7, 3)", &record(&[])), 7.0);
        assert_eq!(
            evaluate("toUpperCase('abc')", &record(&[])).unwrap(),
            Value::from("ABC")
        );
        assert_eq!(num("length('hello')", &record(&[])), 5.0);
        assert_eq!(num("parseInt('12px')", &record(&[])), 12.0);
    }

    #[test]
    fn unknown_function_is_rejected() {
        let err = evaluate("eval('1')", &record(&[])).unwrap_err();
        assert!(err.to_string().contains("not allowed"));
    }

    #[test]
    fn logical_operators_return_operands() {
        assert_eq!(num("0 || 7", &record(&[])), 7.0);
        assert_eq!(num("1 && 7", &record(&[])), 7.0);
        assert_eq!(
            evaluate("'' || 'fallback'", &record(&[])).unwrap(),
            Value::from("fallback")
        );
    }

    #[test]
    fn equality_flavors() {
        assert_eq!(
            evaluate("5 == '5'", &record(&[])).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            evaluate("5 === '5'", &record(&[])).unwrap(),
            Value::Boolean(false)
        );
        assert_eq!(
            evaluate("5 !== '5'", &record(&[])).unwrap(),
            Value::Boolean(true)
        );
    }

    #[test]
    fn operators_inside_strings_are_skipped() {
        assert_eq!(
            evaluate("'a+b'", &record(&[])).unwrap(),
            Value::from("a+b")
        );
        let rec = record(&[("s", Value::from("x"))]);
        assert_eq!(
            evaluate("row.s == 'a?b' ? 1 : 2", &rec).unwrap(),
            Value::Number(2.0)
        );
    }

    #[test]
    fn malformed_expression_errors() {
        assert!(evaluate("", &record(&[])).is_err());
        assert!(evaluate("@#$", &record(&[])).is_err());
    }
}
