//! Dotted-path property lookup over a request record.

use serde_json::Value;
use std::borrow::Cow;

const REQUEST_PREFIX: &str = "request.";

/// Resolve `path` (e.g. `body.user.id`, `headers.content-type`) against `root`.
///
/// A leading `request.` is ignored. Returns `None` ("undefined") when any
/// value being indexed along the way is missing or falsy. Numeric segments
/// index into arrays and strings, and `length` reads the size of either.
/// Never fails.
pub fn traverse<'a>(root: &'a Value, path: &str) -> Option<Cow<'a, Value>> {
    let path = path.strip_prefix(REQUEST_PREFIX).unwrap_or(path);

    let mut current = Cow::Borrowed(root);
    for segment in path.split('.') {
        if !is_truthy(&current) {
            return None;
        }
        current = match current {
            Cow::Borrowed(value) => index(value, segment)?,
            Cow::Owned(value) => Cow::Owned(index(&value, segment)?.into_owned()),
        };
    }
    Some(current)
}

/// One property access. Strings are indexed by UTF-16 code unit.
fn index<'a>(value: &'a Value, segment: &str) -> Option<Cow<'a, Value>> {
    match value {
        Value::Object(map) => map.get(segment).map(Cow::Borrowed),
        Value::Array(items) if segment == "length" => Some(Cow::Owned(Value::from(items.len()))),
        Value::Array(items) => items.get(array_index(segment)?).map(Cow::Borrowed),
        Value::String(text) if segment == "length" => {
            Some(Cow::Owned(Value::from(text.encode_utf16().count())))
        }
        Value::String(text) => {
            let unit = text.encode_utf16().nth(array_index(segment)?)?;
            Some(Cow::Owned(Value::String(String::from_utf16_lossy(&[unit]))))
        }
        _ => None,
    }
}

/// Only canonical decimal segments index (`"1"`, not `"01"` or `"+1"`).
fn array_index(segment: &str) -> Option<usize> {
    let index = segment.parse::<usize>().ok()?;
    (index.to_string() == segment).then_some(index)
}

/// JavaScript truthiness of a JSON value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
