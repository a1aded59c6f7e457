//! Matchers: registered request rules and the ordered store that holds them.

mod store;
mod types;
mod validate;

pub use store::MatcherStore;
pub use types::{Matcher, MatcherFailure, MatcherState, ResponseSpec};
pub use validate::{
    parse_definition, parse_times, validate_headers, MatcherDefinition, ValidationError,
};
