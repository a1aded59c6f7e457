//! Predicate expression language.
//!
//! Predicates select requests both when routing live traffic to a matcher and
//! when asserting over the request ledger afterwards.
//!
//! - `types`: the expression tree and its JSON wire format
//! - `traverse`: dotted-path lookup into a request record
//! - `evaluate`: recursive evaluation with JavaScript-compatible semantics

mod evaluate;
mod traverse;
mod types;

pub use evaluate::{evaluate, js_string, EvalError};
pub use traverse::{is_truthy, traverse};
pub use types::{CompareOp, Predicate, PredicateParseError};
