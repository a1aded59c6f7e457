//! Per-request handling: normalise, dispatch internal routes, route the rest.

use super::router::{ExpectationRoute, InternalRoute};
use super::types::{json_response, no_content, not_found, render_reply, text_response};
use crate::engine::{RouteOutcome, Sham};
use crate::ledger::{Expectation, ExpectationKind, Verdict};
use crate::predicate::{js_string, Predicate};
use crate::request::RequestRecord;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Shared state for every connection of one server.
pub(crate) struct ServerContext {
    pub sham: Arc<Sham>,
    pub shutdown_tx: broadcast::Sender<()>,
}

pub(crate) async fn handle_request(
    req: Request<Incoming>,
    ctx: Arc<ServerContext>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            let request = RequestRecord::from_parts(&parts.method, &parts.uri, &parts.headers, &[]);
            let response = ctx.sham.record_unreadable(request, &e.to_string());
            return Ok(render_reply(&response));
        }
    };

    let request = RequestRecord::from_parts(&parts.method, &parts.uri, &parts.headers, &body);

    if let Some(route) = InternalRoute::parse(&parts.method, &request.pathname) {
        debug!(method = %request.method, path = %request.pathname, "Routing to internal handler");
        return Ok(handle_internal(route, request.body, &ctx));
    }

    debug!(method = %request.method, path = %request.pathname, "Routing to matchers");
    let outcome = ctx.sham.route(request);
    if let RouteOutcome::Matched { matcher_id, .. } = &outcome {
        debug!(matcher_id = %matcher_id, "Request matched");
    }
    Ok(render_reply(outcome.response()))
}

fn handle_internal(route: InternalRoute, body: Value, ctx: &ServerContext) -> Response<Full<Bytes>> {
    let sham = &ctx.sham;
    match route {
        InternalRoute::Health => text_response(StatusCode::OK, "Success"),
        InternalRoute::ListMatchers => json_response(StatusCode::OK, &sham.matchers()),
        InternalRoute::GetMatcher(id) => match sham.get_matcher(&id) {
            Some(matcher) => json_response(StatusCode::OK, &matcher),
            None => not_found(),
        },
        InternalRoute::CreateMatcher => match sham.create_matcher(&body) {
            Ok(matcher) => json_response(StatusCode::OK, &matcher),
            Err(e) => text_response(StatusCode::BAD_REQUEST, e.to_string()),
        },
        InternalRoute::DeleteMatcher(id) => {
            sham.delete_matcher(&id);
            no_content()
        }
        InternalRoute::Requests => json_response(StatusCode::OK, &sham.requests()),
        InternalRoute::Reset => {
            sham.reset();
            no_content()
        }
        InternalRoute::Shutdown => {
            info!("Shutdown requested over HTTP");
            let _ = ctx.shutdown_tx.send(());
            no_content()
        }
        InternalRoute::Expectation { route, negated } => {
            let kind = match expectation_kind(route, body) {
                Ok(kind) => kind,
                Err(message) => return text_response(StatusCode::BAD_REQUEST, message),
            };
            let expectation = Expectation { kind, negated };
            match sham.verify(&expectation) {
                Verdict::Pass => no_content(),
                Verdict::Fail(message) => text_response(StatusCode::EXPECTATION_FAILED, message),
            }
        }
    }
}

/// Decode an expectation's argument from the request body.
fn expectation_kind(route: ExpectationRoute, body: Value) -> Result<ExpectationKind, String> {
    match route {
        ExpectationRoute::Called => Ok(ExpectationKind::Called),
        ExpectationRoute::CalledTimes => parse_count(&body).map(ExpectationKind::CalledTimes),
        ExpectationRoute::CalledWith => parse_predicate(body).map(ExpectationKind::CalledWith),
        ExpectationRoute::LastCalledWith => {
            parse_predicate(body).map(ExpectationKind::LastCalledWith)
        }
    }
}

/// The count arrives as a bare body, so `3` is read as the text "3".
fn parse_count(body: &Value) -> Result<usize, String> {
    let count = match body {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<usize>().ok(),
        _ => None,
    };
    count.ok_or_else(|| format!("{} is not a valid number of times", js_string(Some(body))))
}

fn parse_predicate(body: Value) -> Result<Predicate, String> {
    serde_json::from_value(body).map_err(|e| format!("Invalid predicate: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count(&json!("3")), Ok(3));
        assert_eq!(parse_count(&json!(" 0 ")), Ok(0));
        assert_eq!(parse_count(&json!(2)), Ok(2));
        assert!(parse_count(&json!("-1")).is_err());
        assert!(parse_count(&json!("three")).is_err());
        assert!(parse_count(&json!({"n": 1})).is_err());
    }

    #[test]
    fn test_bad_count_message_reads_like_plain_text() {
        assert_eq!(
            parse_count(&json!("three")),
            Err("three is not a valid number of times".to_string())
        );
        assert_eq!(
            parse_count(&json!(-1)),
            Err("-1 is not a valid number of times".to_string())
        );
        assert_eq!(
            parse_count(&json!({"n": 1})),
            Err("[object Object] is not a valid number of times".to_string())
        );
    }

    #[test]
    fn test_expectation_kind_from_body() {
        assert_eq!(
            expectation_kind(
                ExpectationRoute::CalledWith,
                json!({"op": "==", "prop": "method", "value": "GET"})
            ),
            Ok(ExpectationKind::CalledWith(Predicate::eq("method", "GET")))
        );
        assert!(expectation_kind(ExpectationRoute::LastCalledWith, json!("nope")).is_err());
        assert_eq!(
            expectation_kind(ExpectationRoute::Called, json!("")),
            Ok(ExpectationKind::Called)
        );
    }

    #[test]
    fn test_internal_dispatch() {
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let ctx = ServerContext {
            sham: Arc::new(Sham::new()),
            shutdown_tx,
        };

        let created = handle_internal(
            InternalRoute::CreateMatcher,
            json!({"when": {"op": "AND", "values": []}, "respond": {"status": 202}}),
            &ctx,
        );
        assert_eq!(created.status(), StatusCode::OK);
        assert_eq!(ctx.sham.matchers().len(), 1);

        let rejected = handle_internal(InternalRoute::CreateMatcher, json!("x"), &ctx);
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

        let missing = handle_internal(InternalRoute::GetMatcher("nope".into()), Value::Null, &ctx);
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let called = handle_internal(
            InternalRoute::Expectation {
                route: ExpectationRoute::Called,
                negated: false,
            },
            json!(""),
            &ctx,
        );
        assert_eq!(called.status(), StatusCode::EXPECTATION_FAILED);

        let shutdown = handle_internal(InternalRoute::Shutdown, json!(""), &ctx);
        assert_eq!(shutdown.status(), StatusCode::NO_CONTENT);
        assert!(shutdown_rx.try_recv().is_ok());
    }
}
