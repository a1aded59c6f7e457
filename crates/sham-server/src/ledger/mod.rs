//! Request ledger: an append-only log of every routed request.
//!
//! Entries record the normalised request, the matcher that answered it (if
//! any), the response sent and any evaluation error. Expectation queries in
//! [`expectations`] read the ledger and never modify it.

pub mod expectations;
mod format;

pub use expectations::{Expectation, ExpectationKind, Verdict};
pub use format::{indent, stringify_predicate, stringify_request, stringify_requests};

use crate::matcher::ResponseSpec;
use crate::request::RequestRecord;
use serde::Serialize;

/// Error captured while routing a request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matcher_id: Option<String>,
}

/// One routed request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub request: RequestRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matcher_id: Option<String>,
    pub response: ResponseSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CapturedError>,
    /// RFC 3339 receive time
    pub timestamp: String,
}

impl LedgerEntry {
    pub fn new(request: RequestRecord, response: ResponseSpec) -> Self {
        Self {
            request,
            matcher_id: None,
            response,
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn matched_by(mut self, matcher_id: impl Into<String>) -> Self {
        self.matcher_id = Some(matcher_id.into());
        self
    }

    pub fn with_error(mut self, error: CapturedError) -> Self {
        self.error = Some(error);
        self
    }
}

/// Append-only request log.
#[derive(Debug, Default)]
pub struct RequestLedger {
    entries: Vec<LedgerEntry>,
}

impl RequestLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: LedgerEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&LedgerEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry. Only a store reset does this.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_append_preserves_order() {
        let mut ledger = RequestLedger::new();
        ledger.append(LedgerEntry::new(
            RequestRecord::new("GET", "/a"),
            ResponseSpec::not_found(),
        ));
        ledger.append(
            LedgerEntry::new(RequestRecord::new("GET", "/b"), ResponseSpec::new(200))
                .matched_by("m1"),
        );

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.entries()[0].request.pathname, "/a");
        assert_eq!(ledger.last().unwrap().matcher_id.as_deref(), Some("m1"));

        ledger.clear();
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_entry_serialization() {
        let entry = LedgerEntry::new(RequestRecord::new("GET", "/x"), ResponseSpec::internal_error())
            .with_error(CapturedError {
                message: "boom".into(),
                cause: Some("bad regex".into()),
                matcher_id: Some("m1".into()),
            });

        let wire = serde_json::to_value(&entry).unwrap();
        assert_eq!(wire["response"]["status"], json!(500));
        assert_eq!(wire["error"]["matcherId"], json!("m1"));
        assert!(wire.get("matcherId").is_none());
        assert!(chrono::DateTime::parse_from_rfc3339(wire["timestamp"].as_str().unwrap()).is_ok());
    }
}
