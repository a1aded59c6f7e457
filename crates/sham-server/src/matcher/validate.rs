//! Shape checks for matcher definitions received over the wire.

use super::types::{MatcherState, ResponseSpec};
use crate::predicate::{js_string, Predicate};
use hyper::header::{HeaderName, HeaderValue};
use serde_json::{Map, Value};

/// Rejection reasons for a matcher definition.
///
/// The messages are returned verbatim to HTTP callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("The matcher definition must be an object")]
    NotAnObject,
    #[error("The matcher must contain a valid when property")]
    InvalidWhen,
    #[error("The matcher must contain a valid respond property")]
    InvalidRespond,
    #[error("{0} is not a valid number of times this matcher can match")]
    InvalidTimes(String),
}

/// A validated matcher definition, ready to be stored.
#[derive(Debug, Clone)]
pub struct MatcherDefinition {
    pub when: Predicate,
    pub respond: ResponseSpec,
    pub state: MatcherState,
}

/// Validate a raw definition.
///
/// `when`, `respond` and `times` may also be spelled `predicate`, `response`
/// and `ttl`.
pub fn parse_definition(definition: &Value) -> Result<MatcherDefinition, ValidationError> {
    let fields = definition.as_object().ok_or(ValidationError::NotAnObject)?;

    let when = field(fields, "when", "predicate")
        .filter(|v| v.is_object())
        .and_then(|v| serde_json::from_value::<Predicate>(v.clone()).ok())
        .ok_or(ValidationError::InvalidWhen)?;

    let respond = field(fields, "respond", "response")
        .filter(|v| v.is_object())
        .and_then(|v| serde_json::from_value::<ResponseSpec>(v.clone()).ok())
        .ok_or(ValidationError::InvalidRespond)?;
    validate_headers(&respond)?;

    let times = match field(fields, "times", "ttl") {
        None | Some(Value::Null) => None,
        Some(value) => Some(parse_times(value)?),
    };

    Ok(MatcherDefinition {
        when,
        respond,
        state: MatcherState::from_times(times),
    })
}

/// Validate a `times` counter: an integer of at least 1.
pub fn parse_times(value: &Value) -> Result<u32, ValidationError> {
    value
        .as_u64()
        .filter(|n| *n >= 1)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| ValidationError::InvalidTimes(js_string(Some(value))))
}

/// Reply headers must be sendable as HTTP header names and values.
pub fn validate_headers(respond: &ResponseSpec) -> Result<(), ValidationError> {
    let Some(headers) = &respond.headers else {
        return Ok(());
    };
    let sendable = headers.iter().all(|(name, value)| {
        HeaderName::from_bytes(name.as_bytes()).is_ok() && HeaderValue::from_str(value).is_ok()
    });
    if sendable {
        Ok(())
    } else {
        Err(ValidationError::InvalidRespond)
    }
}

fn field<'a>(fields: &'a Map<String, Value>, name: &str, alias: &str) -> Option<&'a Value> {
    fields.get(name).or_else(|| fields.get(alias))
}
