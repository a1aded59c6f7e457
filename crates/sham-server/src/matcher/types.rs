//! Matcher and response types.

use crate::predicate::Predicate;
use crate::request::RequestRecord;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

// ============================================================================
// Response spec
// ============================================================================

/// Canned response returned when a matcher fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSpec {
    /// Accepts a number or a numeric string
    #[serde(default = "default_status", deserialize_with = "deserialize_status")]
    pub status: u16,
    /// Replaces the default content-type header entirely when present
    #[serde(
        default,
        deserialize_with = "deserialize_headers",
        skip_serializing_if = "Option::is_none"
    )]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

fn default_status() -> u16 {
    200
}

impl Default for ResponseSpec {
    fn default() -> Self {
        Self {
            status: default_status(),
            headers: None,
            body: None,
        }
    }
}

impl ResponseSpec {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Reply used when no matcher accepts a request and no default is configured.
    pub fn not_found() -> Self {
        Self::new(404)
            .with_header("Content-Type", "text/plain")
            .with_body("Not Found")
    }

    /// Reply used when evaluating a matcher fails.
    pub fn internal_error() -> Self {
        Self::new(500)
            .with_header("Content-Type", "text/plain")
            .with_body("Internal Server Error")
    }
}

fn deserialize_status<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u16::try_from(n).ok())
            .ok_or_else(|| D::Error::custom(format!("invalid status code number: {n}"))),
        Value::String(s) => s
            .trim()
            .parse::<u16>()
            .map_err(|_| D::Error::custom(format!("invalid status code string: {s}"))),
        _ => Err(D::Error::custom("status must be a number or string")),
    }
}

/// Header values may be given as strings, numbers or booleans.
fn deserialize_headers<'de, D>(deserializer: D) -> Result<Option<BTreeMap<String, String>>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let raw: Option<BTreeMap<String, Value>> = Option::deserialize(deserializer)?;
    raw.map(|headers| {
        headers
            .into_iter()
            .map(|(name, value)| match value {
                Value::String(s) => Ok((name, s)),
                Value::Number(n) => Ok((name, n.to_string())),
                Value::Bool(b) => Ok((name, b.to_string())),
                other => Err(D::Error::custom(format!(
                    "header '{name}' must be a string, got {other}"
                ))),
            })
            .collect()
    })
    .transpose()
}

// ============================================================================
// Matcher lifecycle
// ============================================================================

/// How many more times a matcher may fire.
///
/// Serialized as the `times` counter: absent when unlimited, `0` once
/// exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatcherState {
    Unlimited,
    Remaining(u32),
    Exhausted,
}

impl MatcherState {
    pub fn from_times(times: Option<u32>) -> Self {
        match times {
            None => MatcherState::Unlimited,
            Some(0) => MatcherState::Exhausted,
            Some(n) => MatcherState::Remaining(n),
        }
    }

    pub fn is_eligible(&self) -> bool {
        !matches!(self, MatcherState::Exhausted)
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self, MatcherState::Unlimited)
    }

    /// Remaining count, `None` when unlimited.
    pub fn remaining(&self) -> Option<u32> {
        match self {
            MatcherState::Unlimited => None,
            MatcherState::Remaining(n) => Some(*n),
            MatcherState::Exhausted => Some(0),
        }
    }

    /// Transition after a successful match.
    pub fn consume(&mut self) {
        *self = match *self {
            MatcherState::Unlimited => MatcherState::Unlimited,
            MatcherState::Remaining(n) if n > 1 => MatcherState::Remaining(n - 1),
            MatcherState::Remaining(_) | MatcherState::Exhausted => MatcherState::Exhausted,
        };
    }
}

impl Serialize for MatcherState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.remaining() {
            Some(n) => serializer.serialize_u32(n),
            None => serializer.serialize_none(),
        }
    }
}

/// A request whose evaluation against a matcher failed.
#[derive(Debug, Clone, Serialize)]
pub struct MatcherFailure {
    pub request: RequestRecord,
    pub error: String,
}

/// A registered rule: requests satisfying `when` receive `respond`.
#[derive(Debug, Clone, Serialize)]
pub struct Matcher {
    pub id: String,
    pub when: Predicate,
    pub respond: ResponseSpec,
    #[serde(rename = "times", skip_serializing_if = "MatcherState::is_unlimited")]
    pub state: MatcherState,
    /// Requests this matcher answered
    pub calls: Vec<RequestRecord>,
    pub errors: Vec<MatcherFailure>,
}

impl Matcher {
    /// Create a matcher with a fresh id.
    pub fn new(when: Predicate, respond: ResponseSpec, state: MatcherState) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            when,
            respond,
            state,
            calls: Vec::new(),
            errors: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_spec_defaults() {
        let spec: ResponseSpec = serde_json::from_value(json!({})).unwrap();
        assert_eq!(spec, ResponseSpec::default());
        assert_eq!(spec.status, 200);
    }

    #[test]
    fn test_response_spec_status_as_string() {
        let spec: ResponseSpec =
            serde_json::from_value(json!({"status": "201", "headers": {"X-Count": 3}})).unwrap();
        assert_eq!(spec.status, 201);
        assert_eq!(
            spec.headers.unwrap().get("X-Count").map(String::as_str),
            Some("3")
        );

        assert!(serde_json::from_value::<ResponseSpec>(json!({"status": "abc"})).is_err());
        assert!(serde_json::from_value::<ResponseSpec>(json!({"status": 70000})).is_err());
    }

    #[test]
    fn test_state_transitions() {
        let mut state = MatcherState::from_times(Some(2));
        assert!(state.is_eligible());
        state.consume();
        assert_eq!(state, MatcherState::Remaining(1));
        state.consume();
        assert_eq!(state, MatcherState::Exhausted);
        assert!(!state.is_eligible());
        state.consume();
        assert_eq!(state, MatcherState::Exhausted);

        let mut unlimited = MatcherState::from_times(None);
        unlimited.consume();
        assert_eq!(unlimited, MatcherState::Unlimited);
    }

    #[test]
    fn test_matcher_serialization() {
        let mut matcher = Matcher::new(
            Predicate::eq("pathname", "/a"),
            ResponseSpec::new(204),
            MatcherState::from_times(Some(1)),
        );
        let wire = serde_json::to_value(&matcher).unwrap();
        assert_eq!(wire["times"], json!(1));
        assert_eq!(wire["respond"], json!({"status": 204}));
        assert_eq!(wire["when"]["op"], json!("=="));

        matcher.state.consume();
        assert_eq!(serde_json::to_value(&matcher).unwrap()["times"], json!(0));

        matcher.state = MatcherState::Unlimited;
        assert!(serde_json::to_value(&matcher).unwrap().get("times").is_none());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Matcher::new(Predicate::always(), ResponseSpec::default(), MatcherState::Unlimited);
        let b = Matcher::new(Predicate::always(), ResponseSpec::default(), MatcherState::Unlimited);
        assert_ne!(a.id, b.id);
    }
}
