//! Predicate expression tree and its JSON wire format.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Comparison operator for a `COMPARE` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Strict equality (`==` on the wire)
    Eq,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
}

impl CompareOp {
    /// Wire representation of the operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }

    fn from_wire(op: &str) -> Option<Self> {
        match op {
            "==" => Some(CompareOp::Eq),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Gte),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Lte),
            _ => None,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A boolean expression evaluated against a request record.
///
/// Trees are built fresh per registration or query and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PredicateRaw", into = "PredicateRaw")]
pub enum Predicate {
    /// All children must hold; empty is `true`
    And(Vec<Predicate>),
    /// Any child must hold; empty is `false`
    Or(Vec<Predicate>),
    /// Negates the child
    Not(Box<Predicate>),
    /// Compares the value at `path` with `value` (`None` means undefined)
    Compare {
        op: CompareOp,
        path: String,
        value: Option<Value>,
    },
    /// Tests the string form of the value at `path` against a regex
    Regex {
        path: String,
        pattern: String,
        flags: String,
    },
}

impl Predicate {
    pub fn and(children: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::And(children.into_iter().collect())
    }

    pub fn or(children: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::Or(children.into_iter().collect())
    }

    pub fn not(child: Predicate) -> Self {
        Predicate::Not(Box::new(child))
    }

    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(CompareOp::Eq, path, value)
    }

    pub fn gt(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(CompareOp::Gt, path, value)
    }

    pub fn gte(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(CompareOp::Gte, path, value)
    }

    pub fn lt(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(CompareOp::Lt, path, value)
    }

    pub fn lte(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(CompareOp::Lte, path, value)
    }

    /// `EQ` against undefined: holds only when the path resolves to nothing.
    pub fn undefined(path: impl Into<String>) -> Self {
        Predicate::Compare {
            op: CompareOp::Eq,
            path: path.into(),
            value: None,
        }
    }

    pub fn regex(
        path: impl Into<String>,
        pattern: impl Into<String>,
        flags: impl Into<String>,
    ) -> Self {
        Predicate::Regex {
            path: path.into(),
            pattern: pattern.into(),
            flags: flags.into(),
        }
    }

    /// A predicate every request satisfies.
    pub fn always() -> Self {
        Predicate::And(Vec::new())
    }

    fn compare(op: CompareOp, path: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            op,
            path: path.into(),
            value: Some(value.into()),
        }
    }
}

/// Error raised when a JSON value is not a well-formed predicate tree.
#[derive(Debug, thiserror::Error)]
pub enum PredicateParseError {
    #[error("unknown predicate operator '{0}'")]
    UnknownOperator(String),
    #[error("'{0}' predicate requires a 'values' array")]
    MissingValues(String),
    #[error("'{0}' predicate requires a 'prop' string")]
    MissingProp(String),
    #[error("'!' predicate requires a nested predicate in 'value'")]
    MissingNegated,
    #[error("REGEX predicate requires 'value' as [pattern, flags] or a pattern string")]
    InvalidRegexValue,
    #[error("invalid nested predicate: {0}")]
    Nested(#[from] serde_json::Error),
}

/// Raw wire shape: `{op, prop?, value?, values?}`.
///
/// `value` keeps "absent" and `null` apart so `EQ` against undefined survives
/// a round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PredicateRaw {
    op: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    prop: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    values: Option<Vec<Predicate>>,
}

fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl TryFrom<PredicateRaw> for Predicate {
    type Error = PredicateParseError;

    fn try_from(raw: PredicateRaw) -> Result<Self, Self::Error> {
        match raw.op.as_str() {
            "AND" => raw
                .values
                .map(Predicate::And)
                .ok_or(PredicateParseError::MissingValues(raw.op)),
            "OR" => raw
                .values
                .map(Predicate::Or)
                .ok_or(PredicateParseError::MissingValues(raw.op)),
            "!" => {
                let inner = raw.value.ok_or(PredicateParseError::MissingNegated)?;
                let inner: Predicate = serde_json::from_value(inner)?;
                Ok(Predicate::not(inner))
            }
            "REGEX" => {
                let path = raw.prop.ok_or(PredicateParseError::MissingProp(raw.op))?;
                let (pattern, flags) = match raw.value {
                    Some(Value::String(pattern)) => (pattern, String::new()),
                    Some(Value::Array(parts)) => regex_parts(&parts)?,
                    _ => return Err(PredicateParseError::InvalidRegexValue),
                };
                Ok(Predicate::Regex {
                    path,
                    pattern,
                    flags,
                })
            }
            other => {
                let op = CompareOp::from_wire(other)
                    .ok_or_else(|| PredicateParseError::UnknownOperator(other.to_string()))?;
                let path = raw
                    .prop
                    .ok_or_else(|| PredicateParseError::MissingProp(other.to_string()))?;
                Ok(Predicate::Compare {
                    op,
                    path,
                    value: raw.value,
                })
            }
        }
    }
}

fn regex_parts(parts: &[Value]) -> Result<(String, String), PredicateParseError> {
    match parts {
        [Value::String(pattern)] => Ok((pattern.clone(), String::new())),
        [Value::String(pattern), Value::String(flags)] => Ok((pattern.clone(), flags.clone())),
        [Value::String(pattern), Value::Null] => Ok((pattern.clone(), String::new())),
        _ => Err(PredicateParseError::InvalidRegexValue),
    }
}

impl From<Predicate> for PredicateRaw {
    fn from(predicate: Predicate) -> Self {
        let raw = |op: &str| PredicateRaw {
            op: op.to_string(),
            prop: None,
            value: None,
            values: None,
        };
        match predicate {
            Predicate::And(children) => PredicateRaw {
                values: Some(children),
                ..raw("AND")
            },
            Predicate::Or(children) => PredicateRaw {
                values: Some(children),
                ..raw("OR")
            },
            Predicate::Not(child) => PredicateRaw {
                value: serde_json::to_value(*child).ok(),
                ..raw("!")
            },
            Predicate::Compare { op, path, value } => PredicateRaw {
                prop: Some(path),
                value,
                ..raw(op.as_str())
            },
            Predicate::Regex {
                path,
                pattern,
                flags,
            } => PredicateRaw {
                prop: Some(path),
                value: Some(Value::Array(vec![
                    Value::String(pattern),
                    Value::String(flags),
                ])),
                ..raw("REGEX")
            },
        }
    }
}
