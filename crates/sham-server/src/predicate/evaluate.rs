//! Recursive evaluation of predicate trees.

use super::traverse::traverse;
use super::types::{CompareOp, Predicate};
use fancy_regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;

/// Errors raised while evaluating a predicate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EvalError {
    #[error("Invalid regular expression /{pattern}/: {message}")]
    InvalidRegex { pattern: String, message: String },
    #[error("Invalid flags supplied to RegExp constructor '{0}'")]
    InvalidRegexFlags(String),
    /// Matching gave up, e.g. on the backtracking limit.
    #[error("Regular expression /{pattern}/ could not be run: {message}")]
    RegexExecution { pattern: String, message: String },
}

/// Evaluate `predicate` against a request record.
///
/// `AND`/`OR` short-circuit left to right, so an error in a child that is
/// never reached does not surface.
pub fn evaluate(record: &Value, predicate: &Predicate) -> Result<bool, EvalError> {
    match predicate {
        Predicate::And(children) => {
            for child in children {
                if !evaluate(record, child)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Predicate::Or(children) => {
            for child in children {
                if evaluate(record, child)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Predicate::Not(child) => Ok(!evaluate(record, child)?),
        Predicate::Compare { op, path, value } => {
            let actual = traverse(record, path);
            Ok(compare(*op, actual.as_deref(), value.as_ref()))
        }
        Predicate::Regex {
            path,
            pattern,
            flags,
        } => {
            let regex = build_regex(pattern, flags)?;
            let subject = js_string(traverse(record, path).as_deref());
            regex
                .is_match(&subject)
                .map_err(|e| EvalError::RegexExecution {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })
        }
    }
}

fn compare(op: CompareOp, actual: Option<&Value>, expected: Option<&Value>) -> bool {
    match (actual, expected) {
        (None, None) => op == CompareOp::Eq,
        (Some(actual), Some(expected)) => match op {
            CompareOp::Eq => strict_equals(actual, expected),
            CompareOp::Gt => ordering(actual, expected) == Some(Ordering::Greater),
            CompareOp::Gte => matches!(
                ordering(actual, expected),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            CompareOp::Lt => ordering(actual, expected) == Some(Ordering::Less),
            CompareOp::Lte => matches!(
                ordering(actual, expected),
                Some(Ordering::Less | Ordering::Equal)
            ),
        },
        _ => false,
    }
}

/// Equality without type coercion. Numbers compare by value, so `1` equals
/// `1.0`; arrays and objects compare element-wise.
fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| strict_equals(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).is_some_and(|y| strict_equals(x, y)))
        }
        _ => a == b,
    }
}

/// Ordering for relational operators: numeric for two numbers, lexical for
/// two strings, undefined otherwise.
fn ordering(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Translate JavaScript regex flags into inline flags.
///
/// `i`, `m` and `s` become `(?i)`, `(?m)` and `(?s)`. `y` anchors the match
/// at the start of the subject, as a fresh sticky regex starts at index 0.
/// `g` and `u` do not change the outcome of a single test and are accepted
/// without effect.
fn build_regex(pattern: &str, flags: &str) -> Result<Regex, EvalError> {
    let mut inline = String::with_capacity(flags.len());
    let mut sticky = false;
    let mut seen = String::with_capacity(flags.len());
    for flag in flags.chars() {
        if seen.contains(flag) {
            return Err(EvalError::InvalidRegexFlags(flags.to_string()));
        }
        seen.push(flag);
        match flag {
            'i' | 'm' | 's' => inline.push(flag),
            'y' => sticky = true,
            'g' | 'u' => {}
            _ => return Err(EvalError::InvalidRegexFlags(flags.to_string())),
        }
    }

    let invalid = |e: fancy_regex::Error| EvalError::InvalidRegex {
        pattern: pattern.to_string(),
        message: e.to_string(),
    };

    let mut source = String::new();
    if !inline.is_empty() {
        source.push_str(&format!("(?{inline})"));
    }
    if sticky {
        // The wrapper group would hide an unbalanced `)` in the pattern
        Regex::new(pattern).map_err(invalid)?;
        source.push_str(&format!(r"\A(?:{pattern})"));
    } else {
        source.push_str(pattern);
    }
    Regex::new(&source).map_err(invalid)
}

/// String conversion matching JavaScript's `String(value)`.
pub fn js_string(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => js_number(n),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => js_string(Some(other)),
            })
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::Object(_)) => "[object Object]".to_string(),
    }
}

fn js_number(n: &serde_json::Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{}", f as i64),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}
