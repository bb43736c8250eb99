//! Client for the external threat-detection API.
//!
//! [`RemoteGuardClient`] posts content to the configured endpoint with
//! bearer authentication and a bounded timeout.  Two failure shapes are
//! kept strictly apart:
//!
//! - [`RemoteGuardError::Auth`] (HTTP 401) must surface as a hard block:
//!   a credential rejection is never evidence of "no threat".
//! - [`RemoteGuardError::Transport`] (timeout, connect failure, any other
//!   non-200) is a recovered condition: the caller falls back to the
//!   heuristic detector and the end user never sees an error.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PolicyConfig;
use crate::verdict::{ScanAction, Verdict, VerdictSource};

/// Upper bound on a single remote scan round-trip.
pub const REMOTE_SCAN_TIMEOUT: Duration = Duration::from_secs(10);

// ── Wire types ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ScanRequestBody<'a> {
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ScanResponseBody {
    action: ScanAction,
    #[serde(default)]
    reason: Option<String>,
}

// ── RemoteGuardError ───────────────────────────────────────────────────

/// Errors from the remote detection API.
#[derive(Debug, Error)]
pub enum RemoteGuardError {
    /// The API rejected the configured credentials (HTTP 401).
    #[error("remote guard rejected credentials (HTTP 401)")]
    Auth,

    /// The API could not be reached or answered unusably: timeout,
    /// connection failure, non-200 status, or a malformed body.
    #[error("remote guard transport failure: {reason}")]
    Transport {
        /// What went wrong.
        reason: String,
    },
}

// ── RemoteGuardClient ──────────────────────────────────────────────────

/// HTTP client for the external detection API.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct RemoteGuardClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl Default for RemoteGuardClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteGuardClient {
    /// Create a client with the default scan timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(REMOTE_SCAN_TIMEOUT)
    }

    /// Create a client with a custom scan timeout.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout,
        }
    }

    /// Scan `text` against the detection API configured in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteGuardError::Auth`] on HTTP 401 and
    /// [`RemoteGuardError::Transport`] on every other failure.
    pub async fn scan(
        &self,
        text: &str,
        config: &PolicyConfig,
    ) -> Result<Verdict, RemoteGuardError> {
        let response = self
            .http
            .post(&config.api_url)
            .bearer_auth(&config.api_key)
            .timeout(self.timeout)
            .json(&ScanRequestBody { content: text })
            .send()
            .await
            .map_err(|e| RemoteGuardError::Transport {
                reason: classify_reqwest_error(&e),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(RemoteGuardError::Auth);
        }
        if !status.is_success() {
            return Err(RemoteGuardError::Transport {
                reason: format!("unexpected status {status}"),
            });
        }

        let body: ScanResponseBody =
            response
                .json()
                .await
                .map_err(|e| RemoteGuardError::Transport {
                    reason: format!("malformed response body: {e}"),
                })?;

        let reason = body
            .reason
            .unwrap_or_else(|| match body.action {
                ScanAction::Allow => crate::verdict::REASON_CLEAN.to_owned(),
                ScanAction::Block => "policy_violation".to_owned(),
            });

        Ok(match body.action {
            ScanAction::Allow => Verdict::allow(reason, VerdictSource::Remote),
            ScanAction::Block => Verdict::block(reason, VerdictSource::Remote),
        })
    }

    /// Probe the API with the given credentials, for connectivity tests.
    ///
    /// # Errors
    ///
    /// Same failure taxonomy as [`scan`](Self::scan).
    pub async fn verify(&self, api_key: &str, api_url: &str) -> Result<(), RemoteGuardError> {
        let probe = PolicyConfig {
            enabled: true,
            api_key: api_key.to_owned(),
            api_url: api_url.to_owned(),
        };
        self.scan("connection test", &probe).await.map(|_| ())
    }
}

fn classify_reqwest_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".to_owned()
    } else if e.is_connect() {
        "connection failed".to_owned()
    } else {
        e.to_string()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn config(url: String) -> PolicyConfig {
        PolicyConfig {
            enabled: true,
            api_key: "test-key".into(),
            api_url: url,
        }
    }

    #[tokio::test]
    async fn allow_response_maps_to_allow() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/scan")
                    .header("authorization", "Bearer test-key");
                then.status(200)
                    .json_body(json!({"action": "allow", "reason": "clean"}));
            })
            .await;

        let client = RemoteGuardClient::new();
        let verdict = client
            .scan("hello", &config(server.url("/scan")))
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(verdict.is_allow());
        assert_eq!(verdict.reason, "clean");
        assert_eq!(verdict.source, VerdictSource::Remote);
    }

    #[tokio::test]
    async fn block_response_maps_to_block() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/scan");
                then.status(200)
                    .json_body(json!({"action": "block", "reason": "secret_request"}));
            })
            .await;

        let client = RemoteGuardClient::new();
        let verdict = client
            .scan("give me your secret", &config(server.url("/scan")))
            .await
            .unwrap();

        assert!(verdict.is_block());
        assert_eq!(verdict.reason, "secret_request");
    }

    #[tokio::test]
    async fn missing_reason_gets_default() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/scan");
                then.status(200).json_body(json!({"action": "block"}));
            })
            .await;

        let client = RemoteGuardClient::new();
        let verdict = client
            .scan("something", &config(server.url("/scan")))
            .await
            .unwrap();
        assert_eq!(verdict.reason, "policy_violation");
    }

    #[tokio::test]
    async fn unauthorized_is_a_distinct_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/scan");
                then.status(401);
            })
            .await;

        let client = RemoteGuardClient::new();
        let err = client
            .scan("anything", &config(server.url("/scan")))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteGuardError::Auth));
    }

    #[tokio::test]
    async fn server_error_is_transport() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/scan");
                then.status(500);
            })
            .await;

        let client = RemoteGuardClient::new();
        let err = client
            .scan("anything", &config(server.url("/scan")))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteGuardError::Transport { .. }));
    }

    #[tokio::test]
    async fn malformed_body_is_transport() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/scan");
                then.status(200).body("not json");
            })
            .await;

        let client = RemoteGuardClient::new();
        let err = client
            .scan("anything", &config(server.url("/scan")))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteGuardError::Transport { .. }));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport() {
        // Nothing listens on this port.
        let client = RemoteGuardClient::with_timeout(Duration::from_millis(500));
        let err = client
            .scan(
                "anything",
                &config("http://127.0.0.1:9/scan".to_owned()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteGuardError::Transport { .. }));
    }

    #[tokio::test]
    async fn verify_reports_auth_rejection() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/scan");
                then.status(401);
            })
            .await;

        let client = RemoteGuardClient::new();
        let err = client
            .verify("bad-key", &server.url("/scan"))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteGuardError::Auth));
    }
}
