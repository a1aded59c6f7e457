//! Normalised view of an inbound HTTP request.
//!
//! Every request is reduced to a [`RequestRecord`] before it reaches the
//! engine. Predicates resolve their paths against the JSON form of the record.

use hyper::header::HeaderMap;
use hyper::{Method, Uri};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Immutable snapshot of a request as seen by the matchers and the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub method: String,
    pub pathname: String,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    /// Header names are lower-case
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Parsed JSON when the payload looks like an object or array, the raw
    /// text otherwise (`""` when there was no payload)
    #[serde(default = "empty_body")]
    pub body: Value,
}

fn empty_body() -> Value {
    Value::String(String::new())
}

impl RequestRecord {
    pub fn new(method: impl Into<String>, pathname: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            pathname: pathname.into(),
            query: BTreeMap::new(),
            headers: BTreeMap::new(),
            body: empty_body(),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Value>) -> Self {
        self.body = body.into();
        self
    }

    /// Build a record from the parts of a hyper request and its buffered body.
    pub fn from_parts(method: &Method, uri: &Uri, headers: &HeaderMap, body: &[u8]) -> Self {
        let pathname = decode_component(uri.path());
        let query = uri.query().map(parse_query_string).unwrap_or_default();

        let mut header_map: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in headers {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            header_map
                .entry(name.as_str().to_ascii_lowercase())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }

        Self {
            method: method.as_str().to_string(),
            pathname,
            query,
            headers: header_map,
            body: parse_body(&String::from_utf8_lossy(body)),
        }
    }

    /// JSON form used for predicate evaluation.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Parse a raw query string into a map.
///
/// Keys and values are percent-decoded with `+` read as a space. A key with no
/// `=` maps to `""`; the last occurrence of a repeated key wins.
pub fn parse_query_string(query: &str) -> BTreeMap<String, String> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (decode_query_component(key), decode_query_component(value)),
            None => (decode_query_component(pair), String::new()),
        })
        .collect()
}

/// Interpret a request payload: JSON when it is delimited like an object or
/// array and parses, otherwise the raw text.
pub fn parse_body(raw: &str) -> Value {
    let looks_like_json = (raw.starts_with('{') && raw.ends_with('}'))
        || (raw.starts_with('[') && raw.ends_with(']'));
    if looks_like_json {
        if let Ok(parsed) = serde_json::from_str(raw) {
            return parsed;
        }
    }
    Value::String(raw.to_string())
}

fn decode_component(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

fn decode_query_component(raw: &str) -> String {
    decode_component(&raw.replace('+', " "))
}
