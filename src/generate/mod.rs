//! The opaque text-generation backend.
//!
//! The gateway consumes generation through the [`TextGenerator`] trait and
//! never looks inside it.  [`HttpTextGenerator`] talks to an Ollama-style
//! `POST /api/generate` endpoint; backend failures map to the
//! distinguishable categories of [`GeneratorError`] so the HTTP surface can
//! answer with a category-specific message.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on one generation round-trip.
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

// ── GeneratorError ─────────────────────────────────────────────────────

/// Failures of the generation backend, by user-facing category.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// The backend process is not reachable at all.
    #[error("text generation service is unavailable: {reason}")]
    ServiceUnavailable {
        /// What went wrong.
        reason: String,
    },

    /// The requested model is not present on the backend.
    #[error("model '{model}' was not found on the generation backend")]
    ModelNotFound {
        /// The model that was requested.
        model: String,
    },

    /// The backend answered with a server-side error.
    #[error("generation backend error (HTTP {status}): {message}")]
    Backend {
        /// HTTP status returned.
        status: u16,
        /// Body or status text.
        message: String,
    },

    /// Transport-level failure other than an outright refused connection.
    #[error("network error talking to the generation backend: {reason}")]
    Network {
        /// What went wrong.
        reason: String,
    },
}

impl GeneratorError {
    /// Short, category-specific message safe to show an end user.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable { .. } => {
                "The analysis service is currently unavailable. Please try again later."
            }
            Self::ModelNotFound { .. } => {
                "The configured analysis model is not installed on the backend."
            }
            Self::Backend { .. } => "The analysis backend reported an internal error.",
            Self::Network { .. } => "A network error interrupted the analysis request.",
        }
    }
}

// ── TextGenerator ──────────────────────────────────────────────────────

/// An opaque capability that turns a prompt into a completion.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for `prompt` with the named model.
    ///
    /// # Errors
    ///
    /// Returns [`GeneratorError`] categorized by failure shape.
    async fn generate(&self, prompt: &str, model: &str) -> Result<String, GeneratorError>;
}

// ── Wire types ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateRequestBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponseBody {
    response: String,
}

// ── HttpTextGenerator ──────────────────────────────────────────────────

/// HTTP client for an Ollama-style generation backend.
#[derive(Debug, Clone)]
pub struct HttpTextGenerator {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTextGenerator {
    /// Create a client for the given base URL (e.g.
    /// `http://127.0.0.1:11434`) with the default timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, GENERATION_TIMEOUT)
    }

    /// Create a client with a custom request timeout.
    #[must_use]
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            http: reqwest::Client::new(),
            base_url,
            timeout,
        }
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String, GeneratorError> {
        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(&GenerateRequestBody {
                model,
                prompt,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    GeneratorError::ServiceUnavailable {
                        reason: "connection refused".to_owned(),
                    }
                } else if e.is_timeout() {
                    GeneratorError::Network {
                        reason: "request timed out".to_owned(),
                    }
                } else {
                    GeneratorError::Network {
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(GeneratorError::ModelNotFound {
                model: model.to_owned(),
            });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateResponseBody =
            response.json().await.map_err(|e| GeneratorError::Network {
                reason: format!("malformed response body: {e}"),
            })?;
        Ok(body.response)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn successful_generation() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/generate")
                    .json_body_partial(r#"{"model": "llama3.1", "stream": false}"#);
                then.status(200)
                    .json_body(json!({"response": "A balanced meal."}));
            })
            .await;

        let generated = HttpTextGenerator::new(server.base_url())
            .generate("Analyze: chicken salad", "llama3.1")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(generated, "A balanced meal.");
    }

    #[tokio::test]
    async fn missing_model_maps_to_model_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(404).body("model not found");
            })
            .await;

        let err = HttpTextGenerator::new(server.base_url())
            .generate("prompt", "missing-model")
            .await
            .unwrap_err();
        assert!(matches!(err, GeneratorError::ModelNotFound { ref model } if model == "missing-model"));
    }

    #[tokio::test]
    async fn backend_5xx_maps_to_backend_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(500).body("out of memory");
            })
            .await;

        let err = HttpTextGenerator::new(server.base_url())
            .generate("prompt", "llama3.1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GeneratorError::Backend { status: 500, ref message } if message.contains("out of memory")
        ));
    }

    #[tokio::test]
    async fn refused_connection_maps_to_service_unavailable() {
        let err = HttpTextGenerator::with_timeout(
            "http://127.0.0.1:9", // nothing listens here
            Duration::from_millis(500),
        )
        .generate("prompt", "llama3.1")
        .await
        .unwrap_err();
        assert!(matches!(err, GeneratorError::ServiceUnavailable { .. }));
    }

    #[test]
    fn user_messages_are_distinct_per_category() {
        let errors = [
            GeneratorError::ServiceUnavailable {
                reason: String::new(),
            },
            GeneratorError::ModelNotFound {
                model: "m".into(),
            },
            GeneratorError::Backend {
                status: 500,
                message: String::new(),
            },
            GeneratorError::Network {
                reason: String::new(),
            },
        ];
        let messages: std::collections::HashSet<_> =
            errors.iter().map(GeneratorError::user_message).collect();
        assert_eq!(messages.len(), errors.len());
    }

    #[test]
    fn trailing_slash_trimmed() {
        let generator = HttpTextGenerator::new("http://localhost:11434///");
        assert_eq!(generator.base_url, "http://localhost:11434");
    }
}
