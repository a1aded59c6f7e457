//! Read-only assertions over the request ledger.
//!
//! Each query returns a [`Verdict`]. A failing verdict carries a message that
//! lists the expectation together with the requests actually received, ready
//! to be shown to a test author.

use super::format::{indent, stringify_predicate, stringify_request, stringify_requests};
use super::LedgerEntry;
use crate::predicate::{evaluate, EvalError, Predicate};
use serde::Serialize;

/// Outcome of an expectation query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", content = "message", rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail(String),
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    /// Failure message, `None` on pass.
    pub fn message(&self) -> Option<&str> {
        match self {
            Verdict::Pass => None,
            Verdict::Fail(message) => Some(message),
        }
    }

    fn from_eval_error(error: EvalError) -> Self {
        Verdict::Fail(format!("Unable to evaluate expectation: {error}"))
    }
}

/// What an expectation asserts.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpectationKind {
    Called,
    CalledTimes(usize),
    CalledWith(Predicate),
    LastCalledWith(Predicate),
}

/// An expectation, optionally negated.
#[derive(Debug, Clone, PartialEq)]
pub struct Expectation {
    pub kind: ExpectationKind,
    pub negated: bool,
}

impl Expectation {
    pub fn new(kind: ExpectationKind) -> Self {
        Self {
            kind,
            negated: false,
        }
    }

    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    pub fn check(&self, entries: &[LedgerEntry]) -> Verdict {
        match (&self.kind, self.negated) {
            (ExpectationKind::Called, false) => has_been_called(entries),
            (ExpectationKind::Called, true) => not_has_been_called(entries),
            (ExpectationKind::CalledTimes(n), false) => has_been_called_times(entries, *n),
            (ExpectationKind::CalledTimes(n), true) => not_has_been_called_times(entries, *n),
            (ExpectationKind::CalledWith(p), false) => has_been_called_with(entries, p),
            (ExpectationKind::CalledWith(p), true) => not_has_been_called_with(entries, p),
            (ExpectationKind::LastCalledWith(p), false) => has_been_last_called_with(entries, p),
            (ExpectationKind::LastCalledWith(p), true) => {
                not_has_been_last_called_with(entries, p)
            }
        }
    }
}

pub fn has_been_called(entries: &[LedgerEntry]) -> Verdict {
    if entries.is_empty() {
        Verdict::Fail("Expected sham to have been called.".to_string())
    } else {
        Verdict::Pass
    }
}

pub fn not_has_been_called(entries: &[LedgerEntry]) -> Verdict {
    if entries.is_empty() {
        return Verdict::Pass;
    }
    Verdict::Fail(format!(
        "Expected sham not to be called but it was called with:{}",
        all_requests(entries)
    ))
}

pub fn has_been_called_times(entries: &[LedgerEntry], times: usize) -> Verdict {
    if entries.len() == times {
        return Verdict::Pass;
    }
    Verdict::Fail(format!(
        "Expected sham to have been called {times} times, but it was called {} times:{}",
        entries.len(),
        all_requests(entries)
    ))
}

pub fn not_has_been_called_times(entries: &[LedgerEntry], times: usize) -> Verdict {
    if entries.len() != times {
        return Verdict::Pass;
    }
    Verdict::Fail(format!(
        "Expected sham not to have been called {times} times, but it was called {} times:{}",
        entries.len(),
        all_requests(entries)
    ))
}

pub fn has_been_called_with(entries: &[LedgerEntry], predicate: &Predicate) -> Verdict {
    match first_match(entries, predicate) {
        Ok(Some(_)) => Verdict::Pass,
        Ok(None) => Verdict::Fail(format!(
            "Expected sham to have been called with:\n{}\nBut it was called with:{}",
            stringify_predicate(predicate),
            all_requests(entries)
        )),
        Err(e) => Verdict::from_eval_error(e),
    }
}

pub fn not_has_been_called_with(entries: &[LedgerEntry], predicate: &Predicate) -> Verdict {
    match first_match(entries, predicate) {
        Ok(None) => Verdict::Pass,
        Ok(Some(entry)) => Verdict::Fail(format!(
            "Expected sham not to have been called with:\n{}\nBut it was called with:{}",
            stringify_predicate(predicate),
            indent(&stringify_request(&entry.request), 2)
        )),
        Err(e) => Verdict::from_eval_error(e),
    }
}

pub fn has_been_last_called_with(entries: &[LedgerEntry], predicate: &Predicate) -> Verdict {
    let Some(last) = entries.last() else {
        return Verdict::Fail(format!(
            "Expected sham to have been last called with:\n{}\nBut it was never called.",
            stringify_predicate(predicate)
        ));
    };
    match evaluate(&last.request.to_value(), predicate) {
        Ok(true) => Verdict::Pass,
        Ok(false) => Verdict::Fail(format!(
            "Expected sham to have been last called with:\n{}\nBut it was last called with:{}",
            stringify_predicate(predicate),
            indent(&stringify_request(&last.request), 2)
        )),
        Err(e) => Verdict::from_eval_error(e),
    }
}

/// Passes on an empty ledger, unlike its positive counterpart which fails.
pub fn not_has_been_last_called_with(entries: &[LedgerEntry], predicate: &Predicate) -> Verdict {
    let Some(last) = entries.last() else {
        return Verdict::Pass;
    };
    match evaluate(&last.request.to_value(), predicate) {
        Ok(false) => Verdict::Pass,
        Ok(true) => Verdict::Fail(format!(
            "Expected sham not to have been last called with:\n{}\nBut it was last called with:{}",
            stringify_predicate(predicate),
            indent(&stringify_request(&last.request), 2)
        )),
        Err(e) => Verdict::from_eval_error(e),
    }
}

fn first_match<'a>(
    entries: &'a [LedgerEntry],
    predicate: &Predicate,
) -> Result<Option<&'a LedgerEntry>, EvalError> {
    for entry in entries {
        if evaluate(&entry.request.to_value(), predicate)? {
            return Ok(Some(entry));
        }
    }
    Ok(None)
}

fn all_requests(entries: &[LedgerEntry]) -> String {
    stringify_requests(entries.iter().map(|entry| &entry.request))
}
