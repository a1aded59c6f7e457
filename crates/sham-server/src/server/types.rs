//! Response helpers and reply rendering.

use crate::matcher::ResponseSpec;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// Create a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string_pretty(body).unwrap_or_else(|_| "{}".to_string());
    build_response_with_headers(status, [("Content-Type", "application/json")], json)
}

/// Create a `text/plain` response
pub fn text_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    build_response_with_headers(status, [("Content-Type", "text/plain")], body)
}

pub fn no_content() -> Response<Full<Bytes>> {
    build_response(StatusCode::NO_CONTENT, Bytes::new())
}

pub fn not_found() -> Response<Full<Bytes>> {
    text_response(StatusCode::NOT_FOUND, "Not Found")
}

/// Build an HTTP response with the given status and body.
pub fn build_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(body.into()))
        .unwrap_or_else(|e| internal_error(&e))
}

/// Build an HTTP response with headers.
///
/// Falls back to a plain 500 if a header name or value is invalid.
pub fn build_response_with_headers(
    status: StatusCode,
    headers: impl IntoIterator<Item = (impl AsRef<str>, impl AsRef<str>)>,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(status);
    for (key, value) in headers {
        builder = builder.header(key.as_ref(), value.as_ref());
    }
    builder
        .body(Full::new(body.into()))
        .unwrap_or_else(|e| internal_error(&e))
}

fn internal_error(cause: &hyper::http::Error) -> Response<Full<Bytes>> {
    warn!("Failed to build response: {}", cause);
    let mut response = Response::new(Full::new(Bytes::from("Internal Server Error")));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}

/// Render a matcher's response spec.
///
/// Structured bodies (objects, arrays, booleans) are sent as JSON and default
/// to `application/json`; strings and numbers are sent as text and default to
/// `text/plain`. Without a body nothing is sent and no header is added.
/// Explicit headers always replace the default.
pub fn render_reply(spec: &ResponseSpec) -> Response<Full<Bytes>> {
    let status = StatusCode::from_u16(spec.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let (default_type, body) = match &spec.body {
        None | Some(Value::Null) => (None, String::new()),
        Some(Value::String(text)) => (Some("text/plain"), text.clone()),
        Some(Value::Number(n)) => (Some("text/plain"), n.to_string()),
        Some(structured) => (Some("application/json"), structured.to_string()),
    };

    match (&spec.headers, default_type) {
        (Some(headers), _) => build_response_with_headers(status, headers, body),
        (None, Some(content_type)) => {
            build_response_with_headers(status, [("Content-Type", content_type)], body)
        }
        (None, None) => build_response(status, body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use serde_json::json;

    async fn body_text(resp: Response<Full<Bytes>>) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn content_type(resp: &Response<Full<Bytes>>) -> Option<&str> {
        resp.headers()
            .get("Content-Type")
            .and_then(|v| v.to_str().ok())
    }

    #[tokio::test]
    async fn test_render_object_body_as_json() {
        let resp = render_reply(&ResponseSpec::new(201).with_body(json!({"id": 1})));
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(content_type(&resp), Some("application/json"));
        assert_eq!(body_text(resp).await, r#"{"id":1}"#);
    }

    #[tokio::test]
    async fn test_render_text_and_number_bodies() {
        let resp = render_reply(&ResponseSpec::default().with_body("hello"));
        assert_eq!(content_type(&resp), Some("text/plain"));
        assert_eq!(body_text(resp).await, "hello");

        let resp = render_reply(&ResponseSpec::default().with_body(42));
        assert_eq!(content_type(&resp), Some("text/plain"));
        assert_eq!(body_text(resp).await, "42");
    }

    #[tokio::test]
    async fn test_render_without_body() {
        let resp = render_reply(&ResponseSpec::new(204));
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert!(content_type(&resp).is_none());
        assert_eq!(body_text(resp).await, "");
    }

    #[tokio::test]
    async fn test_explicit_headers_replace_defaults() {
        let resp = render_reply(
            &ResponseSpec::default()
                .with_header("X-Custom", "1")
                .with_body(json!([1, 2])),
        );
        assert!(content_type(&resp).is_none());
        assert_eq!(resp.headers().get("X-Custom").unwrap(), "1");
        assert_eq!(body_text(resp).await, "[1,2]");
    }

    #[tokio::test]
    async fn test_unsendable_header_renders_server_error() {
        let resp = render_reply(
            &ResponseSpec::new(201)
                .with_header("Bad Header", "x")
                .with_body("hello"),
        );
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(content_type(&resp), Some("text/plain"));
        assert_eq!(body_text(resp).await, "Internal Server Error");
    }

    #[test]
    fn test_render_boolean_as_json() {
        let resp = render_reply(&ResponseSpec::default().with_body(true));
        assert_eq!(content_type(&resp), Some("application/json"));
    }

    #[test]
    fn test_json_response_helper() {
        let resp = json_response(StatusCode::OK, &json!({"a": 1}));
        assert_eq!(content_type(&resp), Some("application/json"));
        assert_eq!(not_found().status(), StatusCode::NOT_FOUND);
        assert_eq!(no_content().status(), StatusCode::NO_CONTENT);
    }
}
