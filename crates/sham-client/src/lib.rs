//! HTTP client for a running sham.
//!
//! ```no_run
//! use sham_client::{Predicate, ResponseSpec, ShamClient};
//!
//! # async fn demo() -> Result<(), sham_client::ClientError> {
//! let sham = ShamClient::for_port(8080, false);
//! sham.add_matcher(
//!     Predicate::and([
//!         Predicate::eq("method", "GET"),
//!         Predicate::regex("pathname", "^/users/\\d+$", ""),
//!     ]),
//!     ResponseSpec::default().with_body(serde_json::json!({"name": "test"})),
//!     None,
//! )
//! .await?;
//!
//! // ... exercise the code under test ...
//!
//! sham.has_been_called_with(&Predicate::eq("pathname", "/users/1")).await?;
//! # Ok(())
//! # }
//! ```

use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use sham_server::predicate::Predicate;
pub use sham_server::{RequestRecord, ResponseSpec};

/// Errors returned by [`ShamClient`]
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("{context}: {message} (status: {status})")]
    Status {
        context: &'static str,
        status: u16,
        message: String,
    },
    /// An expectation endpoint answered 417; the message describes the
    /// expectation and the requests actually received
    #[error("{0}")]
    Expectation(String),
}

/// A matcher as returned by the server
#[derive(Debug, Clone, Deserialize)]
pub struct RegisteredMatcher {
    pub id: String,
    pub when: Predicate,
    pub respond: ResponseSpec,
    /// Remaining matches; `None` when unlimited
    #[serde(default)]
    pub times: Option<u32>,
    #[serde(default)]
    pub calls: Vec<RequestRecord>,
    #[serde(default)]
    pub errors: Vec<Value>,
}

/// One ledger entry as returned by `GET /$requests`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedEntry {
    pub request: RequestRecord,
    #[serde(default)]
    pub matcher_id: Option<String>,
    pub response: ResponseSpec,
    #[serde(default)]
    pub error: Option<Value>,
    pub timestamp: String,
}

#[derive(Serialize)]
struct NewMatcher<'a> {
    when: &'a Predicate,
    respond: &'a ResponseSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    times: Option<u32>,
}

/// Client for the internal `$` API of one sham instance
#[derive(Debug, Clone)]
pub struct ShamClient {
    client: Client,
    base_uri: String,
}

impl ShamClient {
    pub fn new(base_uri: &str) -> Self {
        Self::with_client(base_uri, Client::new())
    }

    /// Client for a sham on localhost.
    pub fn for_port(port: u16, https: bool) -> Self {
        let scheme = if https { "https" } else { "http" };
        Self::new(&format!("{scheme}://localhost:{port}"))
    }

    /// Use a preconfigured reqwest client (timeouts, TLS roots, ...).
    pub fn with_client(base_uri: &str, client: Client) -> Self {
        Self {
            client,
            base_uri: base_uri.trim_end_matches('/').to_string(),
        }
    }

    pub fn uri(&self) -> &str {
        &self.base_uri
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_uri, path)
    }

    /// Register a matcher. It takes priority over every existing one.
    pub async fn add_matcher(
        &self,
        when: Predicate,
        respond: ResponseSpec,
        times: Option<u32>,
    ) -> Result<RegisteredMatcher, ClientError> {
        let body = NewMatcher {
            when: &when,
            respond: &respond,
            times,
        };
        self.add_matcher_raw(&serde_json::to_value(&body).unwrap_or(Value::Null))
            .await
    }

    /// Register a matcher from its JSON wire form.
    pub async fn add_matcher_raw(&self, definition: &Value) -> Result<RegisteredMatcher, ClientError> {
        let resp = self
            .client
            .post(self.url("$matchers"))
            .json(definition)
            .send()
            .await?;
        let resp = check(resp, "Error creating matcher").await?;
        Ok(resp.json().await?)
    }

    pub async fn get_matcher(&self, id: &str) -> Result<RegisteredMatcher, ClientError> {
        let resp = self
            .client
            .get(self.url(&format!("$matchers/{id}")))
            .send()
            .await?;
        let resp = check(resp, "Error retrieving matcher").await?;
        Ok(resp.json().await?)
    }

    pub async fn get_matchers(&self) -> Result<Vec<RegisteredMatcher>, ClientError> {
        let resp = self.client.get(self.url("$matchers")).send().await?;
        let resp = check(resp, "Error retrieving matchers").await?;
        Ok(resp.json().await?)
    }

    pub async fn delete_matcher(&self, id: &str) -> Result<(), ClientError> {
        let resp = self
            .client
            .delete(self.url(&format!("$matchers/{id}")))
            .send()
            .await?;
        check(resp, "Error deleting matcher").await?;
        Ok(())
    }

    pub async fn get_requests(&self) -> Result<Vec<RecordedEntry>, ClientError> {
        let resp = self.client.get(self.url("$requests")).send().await?;
        let resp = check(resp, "Error retrieving requests").await?;
        Ok(resp.json().await?)
    }

    /// Drop every matcher and recorded request.
    pub async fn reset(&self) -> Result<(), ClientError> {
        let resp = self.client.post(self.url("$reset")).send().await?;
        check(resp, "Error resetting matchers and requests").await?;
        Ok(())
    }

    /// Ask the sham to stop listening.
    pub async fn close(&self) -> Result<(), ClientError> {
        let resp = self.client.post(self.url("$shutdown")).send().await?;
        check(resp, "Error shutting down the sham").await?;
        Ok(())
    }

    pub async fn health(&self) -> Result<bool, ClientError> {
        let resp = self.client.get(self.url("$health")).send().await?;
        Ok(resp.status().is_success())
    }

    pub async fn has_been_called(&self) -> Result<(), ClientError> {
        self.verify("$hasbeencalled", String::new()).await
    }

    pub async fn not_has_been_called(&self) -> Result<(), ClientError> {
        self.verify("$not/hasbeencalled", String::new()).await
    }

    pub async fn has_been_called_times(&self, times: usize) -> Result<(), ClientError> {
        self.verify("$hasbeencalledtimes", times.to_string()).await
    }

    pub async fn not_has_been_called_times(&self, times: usize) -> Result<(), ClientError> {
        self.verify("$not/hasbeencalledtimes", times.to_string())
            .await
    }

    pub async fn has_been_called_with(&self, predicate: &Predicate) -> Result<(), ClientError> {
        self.verify("$hasbeencalledwith", predicate_body(predicate))
            .await
    }

    pub async fn not_has_been_called_with(&self, predicate: &Predicate) -> Result<(), ClientError> {
        self.verify("$not/hasbeencalledwith", predicate_body(predicate))
            .await
    }

    pub async fn has_been_last_called_with(
        &self,
        predicate: &Predicate,
    ) -> Result<(), ClientError> {
        self.verify("$hasbeenlastcalledwith", predicate_body(predicate))
            .await
    }

    pub async fn not_has_been_last_called_with(
        &self,
        predicate: &Predicate,
    ) -> Result<(), ClientError> {
        self.verify("$not/hasbeenlastcalledwith", predicate_body(predicate))
            .await
    }

    async fn verify(&self, path: &str, body: String) -> Result<(), ClientError> {
        let resp = self.client.post(self.url(path)).body(body).send().await?;
        match resp.status() {
            StatusCode::EXPECTATION_FAILED => Err(ClientError::Expectation(resp.text().await?)),
            _ => check(resp, "Error evaluating expectation").await.map(|_| ()),
        }
    }
}

fn predicate_body(predicate: &Predicate) -> String {
    serde_json::to_string(predicate).unwrap_or_default()
}

/// Pass 2xx responses through, turn anything else into `ClientError::Status`.
async fn check(resp: Response, context: &'static str) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(ClientError::Status {
        context,
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_base_uri() {
        assert_eq!(ShamClient::for_port(8080, false).uri(), "http://localhost:8080");
        assert_eq!(ShamClient::for_port(8443, true).uri(), "https://localhost:8443");
        assert_eq!(ShamClient::new("http://h:1/").url("$health"), "http://h:1/$health");
    }

    #[test]
    fn test_new_matcher_wire_format() {
        let when = Predicate::eq("pathname", "/a");
        let respond = ResponseSpec::new(201);
        let body = NewMatcher {
            when: &when,
            respond: &respond,
            times: Some(2),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "when": {"op": "==", "prop": "pathname", "value": "/a"},
                "respond": {"status": 201},
                "times": 2
            })
        );
    }

    #[test]
    fn test_registered_matcher_parses_server_output() {
        let matcher: RegisteredMatcher = serde_json::from_value(json!({
            "id": "abc",
            "when": {"op": "AND", "values": []},
            "respond": {"status": 200, "body": "ok"},
            "times": 0,
            "calls": [{"method": "GET", "pathname": "/", "query": {}, "headers": {}, "body": ""}],
            "errors": []
        }))
        .unwrap();
        assert_eq!(matcher.times, Some(0));
        assert_eq!(matcher.calls.len(), 1);
        assert_eq!(matcher.when, Predicate::always());
    }

    #[test]
    fn test_status_error_message() {
        let err = ClientError::Status {
            context: "Error creating matcher",
            status: 400,
            message: "The matcher definition must be an object".into(),
        };
        assert_eq!(
            err.to_string(),
            "Error creating matcher: The matcher definition must be an object (status: 400)"
        );
    }
}
