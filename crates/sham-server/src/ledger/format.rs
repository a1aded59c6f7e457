//! Text rendering of recorded requests for expectation failure messages.

use crate::predicate::{is_truthy, Predicate};
use crate::request::RequestRecord;
use serde_json::Value;

/// Render a request as
///
/// ```text
///
/// GET /path?a=1
///   accept: */*,
///   header: value
///   body:
///       {"json":true}
/// ```
pub fn stringify_request(request: &RequestRecord) -> String {
    let mut out = format!(
        "\n{} {}{}",
        request.method,
        request.pathname,
        query_string(request)
    );
    let headers: Vec<String> = request
        .headers
        .iter()
        .map(|(name, value)| format!("\n  {name}: {value}"))
        .collect();
    out.push_str(&headers.join(","));
    if is_truthy(&request.body) {
        let body = match &request.body {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        out.push_str(&indent(&format!("\nbody:\n    {body}"), 2));
    }
    out
}

/// Render several requests, each indented by two spaces and separated by
/// commas.
pub fn stringify_requests<'a>(requests: impl IntoIterator<Item = &'a RequestRecord>) -> String {
    requests
        .into_iter()
        .map(|request| indent(&stringify_request(request), 2))
        .collect::<Vec<_>>()
        .join(",")
}

/// Pretty-printed wire JSON of a predicate, indented by two spaces.
pub fn stringify_predicate(predicate: &Predicate) -> String {
    let json = serde_json::to_string_pretty(predicate).unwrap_or_default();
    indent(&json, 2)
}

/// Prefix every non-empty line with `width` spaces.
pub fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.split('\n')
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{pad}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn query_string(request: &RequestRecord) -> String {
    if request.query.is_empty() {
        return String::new();
    }
    let pairs: Vec<String> = request
        .query
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect();
    format!("?{}", pairs.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_indent_skips_empty_lines() {
        assert_eq!(indent("\na\n\nb", 2), "\n  a\n\n  b");
        assert_eq!(indent("", 4), "");
    }

    #[test]
    fn test_stringify_plain_request() {
        let request = RequestRecord::new("GET", "/users");
        assert_eq!(stringify_request(&request), "\nGET /users");
    }

    #[test]
    fn test_stringify_full_request() {
        let request = RequestRecord::new("POST", "/users")
            .with_query("page", "2")
            .with_query("q", "a b")
            .with_header("Content-Type", "application/json")
            .with_body(json!({"name": "x"}));

        assert_eq!(
            stringify_request(&request),
            "\nPOST /users?page=2&q=a%20b\n  content-type: application/json\n  body:\n      {\"name\":\"x\"}"
        );
    }

    #[test]
    fn test_stringify_requests_indents_each() {
        let a = RequestRecord::new("GET", "/a");
        let b = RequestRecord::new("GET", "/b").with_body("hi");
        assert_eq!(
            stringify_requests([&a, &b]),
            "\n  GET /a,\n  GET /b\n    body:\n        hi"
        );
    }

    #[test]
    fn test_stringify_headers_comma_separated() {
        let request = RequestRecord::new("GET", "/users")
            .with_header("Accept", "application/json")
            .with_header("Host", "localhost");
        assert_eq!(
            stringify_request(&request),
            "\nGET /users\n  accept: application/json,\n  host: localhost"
        );
    }

    #[test]
    fn test_stringify_predicate() {
        let rendered = stringify_predicate(&Predicate::eq("method", "GET"));
        assert_eq!(
            rendered,
            "  {\n    \"op\": \"==\",\n    \"prop\": \"method\",\n    \"value\": \"GET\"\n  }"
        );
    }
}
