//! The sham engine: matcher store, request ledger and the routing between them.
//!
//! [`Sham`] is the in-process handle shared by the HTTP server and by Rust
//! callers that embed the engine directly. All state sits behind one mutex so
//! that routing a request (counter decrement plus ledger append) is atomic
//! with respect to CRUD and reset.

mod matching;


pub use matching::{MatchError, RouteOutcome};

use crate::ledger::{CapturedError, Expectation, LedgerEntry, Verdict};
use crate::matcher::{
    parse_definition, validate_headers, Matcher, MatcherDefinition, MatcherState, ResponseSpec,
    ValidationError,
};
use crate::predicate::Predicate;
use crate::request::RequestRecord;
use matching::ShamState;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{info, warn};

/// A programmable HTTP test double.
#[derive(Debug, Default)]
pub struct Sham {
    state: Mutex<ShamState>,
    default_reply: Option<ResponseSpec>,
}

impl Sham {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine that answers unmatched requests with `reply` instead of a 404.
    pub fn with_default_reply(reply: Option<ResponseSpec>) -> Self {
        Self {
            state: Mutex::new(ShamState::default()),
            default_reply: reply,
        }
    }

    pub fn default_reply(&self) -> Option<&ResponseSpec> {
        self.default_reply.as_ref()
    }

    /// Route a request and record it in the ledger.
    pub fn route(&self, request: RequestRecord) -> RouteOutcome {
        let mut state = self.state.lock();
        matching::route(&mut state, request, self.default_reply.as_ref())
    }

    /// Record a request that could not be read in full. It is answered with a
    /// 500 and no matcher is consulted.
    pub fn record_unreadable(&self, request: RequestRecord, cause: &str) -> ResponseSpec {
        warn!(method = %request.method, path = %request.pathname, "Failed to read request: {}", cause);
        let response = ResponseSpec::internal_error();
        let entry = LedgerEntry::new(request, response.clone()).with_error(CapturedError {
            message: format!("Failed to read request body: {cause}"),
            cause: Some(cause.to_string()),
            matcher_id: None,
        });
        self.state.lock().ledger.append(entry);
        response
    }

    /// Validate and register a matcher definition received as JSON.
    pub fn create_matcher(&self, definition: &Value) -> Result<Matcher, ValidationError> {
        let MatcherDefinition {
            when,
            respond,
            state,
        } = parse_definition(definition)?;
        Ok(self.insert(Matcher::new(when, respond, state)))
    }

    /// Register a matcher from typed parts. `times` of `None` never expires.
    pub fn when(
        &self,
        predicate: Predicate,
        response: ResponseSpec,
        times: Option<u32>,
    ) -> Result<Matcher, ValidationError> {
        if times == Some(0) {
            return Err(ValidationError::InvalidTimes("0".to_string()));
        }
        validate_headers(&response)?;
        Ok(self.insert(Matcher::new(
            predicate,
            response,
            MatcherState::from_times(times),
        )))
    }

    fn insert(&self, matcher: Matcher) -> Matcher {
        info!(matcher_id = %matcher.id, times = ?matcher.state.remaining(), "Matcher registered");
        self.state.lock().matchers.insert_front(matcher.clone());
        matcher
    }

    pub fn get_matcher(&self, id: &str) -> Option<Matcher> {
        self.state.lock().matchers.get(id).cloned()
    }

    /// Snapshot of all matchers in priority order, exhausted ones included.
    pub fn matchers(&self) -> Vec<Matcher> {
        self.state.lock().matchers.iter().cloned().collect()
    }

    /// Remove a matcher. Returns whether it existed; deleting twice is fine.
    pub fn delete_matcher(&self, id: &str) -> bool {
        let removed = self.state.lock().matchers.remove(id).is_some();
        if removed {
            info!(matcher_id = %id, "Matcher deleted");
        }
        removed
    }

    /// Snapshot of the ledger in arrival order.
    pub fn requests(&self) -> Vec<LedgerEntry> {
        self.state.lock().ledger.entries().to_vec()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().ledger.len()
    }

    /// Clear matchers and ledger in one step.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.matchers.clear();
        state.ledger.clear();
        info!("Sham reset");
    }

    pub fn verify(&self, expectation: &Expectation) -> Verdict {
        let state = self.state.lock();
        expectation.check(state.ledger.entries())
    }
}
