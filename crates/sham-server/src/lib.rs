// Library exports for the server binary, the client crate, benchmarks and tests

// ===== Matching and bookkeeping engine =====
pub mod engine;
pub mod ledger;
pub mod matcher;
pub mod predicate;
pub mod request;

// ===== Outer surfaces =====
pub mod config;
pub mod server;

pub use engine::{RouteOutcome, Sham};
pub use ledger::{Expectation, ExpectationKind, LedgerEntry, Verdict};
pub use matcher::{Matcher, ResponseSpec};
pub use predicate::Predicate;
pub use request::RequestRecord;
pub use server::{ShamHandle, ShamServer};
