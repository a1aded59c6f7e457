//! Internal `$`-prefixed routes.
//!
//! Internal routes are resolved against the decoded pathname before any
//! matcher is consulted and never reach the ledger. Anything that is not an
//! exact internal route, including unknown `$` paths, is routed to matchers.

use hyper::Method;

/// Expectation endpoints, each with a `/$not/...` variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectationRoute {
    /// POST /$hasbeencalled
    Called,
    /// POST /$hasbeencalledtimes
    CalledTimes,
    /// POST /$hasbeencalledwith
    CalledWith,
    /// POST /$hasbeenlastcalledwith
    LastCalledWith,
}

impl ExpectationRoute {
    fn parse(segment: &str) -> Option<Self> {
        match segment {
            "hasbeencalled" => Some(ExpectationRoute::Called),
            "hasbeencalledtimes" => Some(ExpectationRoute::CalledTimes),
            "hasbeencalledwith" => Some(ExpectationRoute::CalledWith),
            "hasbeenlastcalledwith" => Some(ExpectationRoute::LastCalledWith),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalRoute {
    /// GET /$health
    Health,
    /// GET /$matchers
    ListMatchers,
    /// POST /$matchers
    CreateMatcher,
    /// GET /$matchers/:id
    GetMatcher(String),
    /// DELETE /$matchers/:id
    DeleteMatcher(String),
    /// GET /$requests
    Requests,
    /// POST /$reset
    Reset,
    /// POST /$shutdown
    Shutdown,
    Expectation {
        route: ExpectationRoute,
        negated: bool,
    },
}

impl InternalRoute {
    /// Parse a decoded pathname; `None` means the request belongs to matchers.
    pub fn parse(method: &Method, path: &str) -> Option<Self> {
        let rest = path.strip_prefix("/$")?;

        // Matcher ids may contain anything after the slash
        if let Some(id) = rest.strip_prefix("matchers/") {
            return match *method {
                Method::GET => Some(InternalRoute::GetMatcher(id.to_string())),
                Method::DELETE => Some(InternalRoute::DeleteMatcher(id.to_string())),
                _ => None,
            };
        }

        let segments: Vec<&str> = rest.split('/').collect();
        match (method, segments.as_slice()) {
            (&Method::GET, ["health"]) => Some(InternalRoute::Health),
            (&Method::GET, ["matchers"]) => Some(InternalRoute::ListMatchers),
            (&Method::POST, ["matchers"]) => Some(InternalRoute::CreateMatcher),
            (&Method::GET, ["requests"]) => Some(InternalRoute::Requests),
            (&Method::POST, ["reset"]) => Some(InternalRoute::Reset),
            (&Method::POST, ["shutdown"]) => Some(InternalRoute::Shutdown),
            (&Method::POST, [name]) => {
                ExpectationRoute::parse(name).map(|route| InternalRoute::Expectation {
                    route,
                    negated: false,
                })
            }
            (&Method::POST, ["not", name]) => {
                ExpectationRoute::parse(name).map(|route| InternalRoute::Expectation {
                    route,
                    negated: true,
                })
            }
            _ => None,
        }
    }
}
