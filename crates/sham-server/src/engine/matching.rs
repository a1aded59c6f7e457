//! Request routing over the matcher store.

use crate::ledger::{CapturedError, LedgerEntry, RequestLedger};
use crate::matcher::{MatcherFailure, MatcherStore, ResponseSpec};
use crate::predicate::{evaluate, EvalError};
use crate::request::RequestRecord;
use tracing::{debug, warn};

/// Store and ledger, always locked together.
#[derive(Debug, Default)]
pub(crate) struct ShamState {
    pub matchers: MatcherStore,
    pub ledger: RequestLedger,
}

/// A matcher's predicate could not be evaluated.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Critical error occurred when trying to parse matcher: {source}")]
pub struct MatchError {
    pub matcher_id: String,
    #[source]
    pub source: EvalError,
}

/// How a request was resolved.
#[derive(Debug, Clone)]
pub enum RouteOutcome {
    Matched {
        matcher_id: String,
        response: ResponseSpec,
    },
    Failed {
        error: MatchError,
        response: ResponseSpec,
    },
    Unmatched {
        response: ResponseSpec,
    },
}

impl RouteOutcome {
    pub fn response(&self) -> &ResponseSpec {
        match self {
            RouteOutcome::Matched { response, .. }
            | RouteOutcome::Failed { response, .. }
            | RouteOutcome::Unmatched { response } => response,
        }
    }

    pub fn into_response(self) -> ResponseSpec {
        match self {
            RouteOutcome::Matched { response, .. }
            | RouteOutcome::Failed { response, .. }
            | RouteOutcome::Unmatched { response } => response,
        }
    }
}

/// Resolve `request` against the eligible matchers, newest first.
///
/// The first matcher whose predicate holds answers the request and has its
/// counter consumed. A predicate that fails to evaluate stops the walk and
/// produces a 500. Exactly one ledger entry is appended either way.
pub(crate) fn route(
    state: &mut ShamState,
    request: RequestRecord,
    default_reply: Option<&ResponseSpec>,
) -> RouteOutcome {
    let record = request.to_value();

    for matcher in state.matchers.eligible_mut() {
        match evaluate(&record, &matcher.when) {
            Ok(false) => continue,
            Ok(true) => {
                matcher.state.consume();
                matcher.calls.push(request.clone());
                debug!(matcher_id = %matcher.id, remaining = ?matcher.state.remaining(), "Matcher accepted request");

                let response = matcher.respond.clone();
                state
                    .ledger
                    .append(LedgerEntry::new(request, response.clone()).matched_by(&matcher.id));
                return RouteOutcome::Matched {
                    matcher_id: matcher.id.clone(),
                    response,
                };
            }
            Err(source) => {
                let error = MatchError {
                    matcher_id: matcher.id.clone(),
                    source,
                };
                warn!(matcher_id = %matcher.id, "{}", error);

                matcher.errors.push(MatcherFailure {
                    request: request.clone(),
                    error: error.to_string(),
                });
                let response = ResponseSpec::internal_error();
                state.ledger.append(
                    LedgerEntry::new(request, response.clone()).with_error(CapturedError {
                        message: error.to_string(),
                        cause: Some(error.source.to_string()),
                        matcher_id: Some(error.matcher_id.clone()),
                    }),
                );
                return RouteOutcome::Failed { error, response };
            }
        }
    }

    let response = default_reply
        .cloned()
        .unwrap_or_else(ResponseSpec::not_found);
    debug!(method = %request.method, path = %request.pathname, "No matcher accepted request");
    state
        .ledger
        .append(LedgerEntry::new(request, response.clone()));
    RouteOutcome::Unmatched { response }
}
