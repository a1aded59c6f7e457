//! HTTP(S) front end for the sham engine.
//!
//! One listener serves both traffic under test and the internal `$` API:
//! - `GET /$health`, `GET|POST /$matchers`, `GET|DELETE /$matchers/:id`
//! - `GET /$requests`, `POST /$reset`, `POST /$shutdown`
//! - `POST /$hasbeencalled[times|with]`, `POST /$hasbeenlastcalledwith`,
//!   each also under `/$not/`
//!
//! Every other request is routed through the matchers.

mod handler;
mod listener;
mod router;
mod tls;
mod types;

pub use listener::{ShamHandle, ShamServer};
pub use router::{ExpectationRoute, InternalRoute};
pub use tls::create_tls_acceptor;
pub use types::render_reply;
