//! HTTP surface for the gateway.
//!
//! Thin axum handlers over [`ScanGateway`]: request validation and wire
//! shaping live here, every decision lives in the gateway.  Bodies are
//! JSON with snake_case fields; credentials are accepted on the way in
//! and never echoed back.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::{EventFilter, Pagination, RequestIdentity, SecurityEvent};
use crate::config::PolicyUpdate;
use crate::detect::remote::{RemoteGuardClient, RemoteGuardError};
use crate::gateway::{GatewayError, ScanGateway, ScanOutcome, ScanRequest};
use crate::generate::GeneratorError;
use crate::verdict::Verdict;

// ── AppState ───────────────────────────────────────────────────────────

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    gateway: Arc<ScanGateway>,
    remote: RemoteGuardClient,
}

impl AppState {
    /// Create state around a gateway.
    #[must_use]
    pub fn new(gateway: Arc<ScanGateway>) -> Self {
        Self {
            gateway,
            remote: RemoteGuardClient::new(),
        }
    }
}

/// Build the full router.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/config/security",
            get(get_security_config).post(update_security_config),
        )
        .route("/test-security", post(test_security))
        .route("/generate", post(generate))
        .route(
            "/security/events",
            get(list_events).delete(clear_events),
        )
        .route("/security/reports", get(reports))
        .with_state(state)
}

// ── Wire types ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct SecurityConfigResponse {
    enabled: bool,
    api_url: String,
}

#[derive(Debug, Deserialize)]
struct TestSecurityRequest {
    api_key: String,
    api_url: String,
}

/// Inbound analysis request.  Exactly one of the three text fields must
/// be present; `message` wins when several are.
#[derive(Debug, Deserialize)]
struct GenerateRequest {
    message: Option<String>,
    meal_description: Option<String>,
    workout_description: Option<String>,
    context: Option<String>,
    user_id: Option<String>,
    username: Option<String>,
}

impl GenerateRequest {
    fn text(&self) -> Option<&str> {
        self.message
            .as_deref()
            .or(self.meal_description.as_deref())
            .or(self.workout_description.as_deref())
    }
}

#[derive(Debug, Serialize)]
struct ScanResultEnvelope {
    result: Verdict,
}

#[derive(Debug, Serialize)]
struct SecurityScanPayload {
    completed: bool,
    safe: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    blocked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    input_scan: Option<ScanResultEnvelope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_scan: Option<ScanResultEnvelope>,
}

impl SecurityScanPayload {
    /// The shape for requests that were never scanned (policy disabled).
    /// Honeypot responses use it too; on the wire they are
    /// indistinguishable from an unscanned success.
    fn not_scanned() -> Self {
        Self {
            completed: false,
            safe: true,
            blocked: None,
            input_scan: None,
            output_scan: None,
        }
    }

    fn passed(input: Verdict, output: Option<Verdict>) -> Self {
        Self {
            completed: true,
            safe: true,
            blocked: None,
            input_scan: Some(ScanResultEnvelope { result: input }),
            output_scan: output.map(|result| ScanResultEnvelope { result }),
        }
    }

    fn blocked(input: Verdict, output: Option<Verdict>) -> Self {
        Self {
            completed: true,
            safe: false,
            blocked: Some(true),
            input_scan: Some(ScanResultEnvelope { result: input }),
            output_scan: output.map(|result| ScanResultEnvelope { result }),
        }
    }
}

#[derive(Debug, Serialize)]
struct AnalysisPayload {
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    security_scan: SecurityScanPayload,
}

#[derive(Debug, Serialize)]
struct EventsResponse {
    success: bool,
    events: Vec<SecurityEvent>,
}

#[derive(Debug, Serialize)]
struct ReportsResponse {
    logs: Vec<SecurityEvent>,
    pagination: Pagination,
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    #[serde(rename = "type")]
    event_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReportsQuery {
    page: Option<usize>,
    limit: Option<usize>,
    #[serde(rename = "type")]
    event_type: Option<String>,
}

/// Default page size for report listings.
const DEFAULT_REPORT_LIMIT: usize = 20;

// ── Handlers ───────────────────────────────────────────────────────────

async fn get_security_config(State(state): State<AppState>) -> Json<SecurityConfigResponse> {
    let config = state.gateway.policy().snapshot();
    Json(SecurityConfigResponse {
        enabled: config.enabled,
        api_url: config.api_url,
    })
}

async fn update_security_config(
    State(state): State<AppState>,
    Json(update): Json<PolicyUpdate>,
) -> Response {
    match state.gateway.policy().update(update) {
        Ok(_) => Json(json!({
            "success": true,
            "message": "security configuration updated",
        }))
        .into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "message": e.to_string()})),
        )
            .into_response(),
    }
}

async fn test_security(
    State(state): State<AppState>,
    Json(body): Json<TestSecurityRequest>,
) -> Json<serde_json::Value> {
    match state.remote.verify(&body.api_key, &body.api_url).await {
        Ok(()) => Json(json!({"success": true})),
        Err(RemoteGuardError::Auth) => Json(json!({
            "success": false,
            "error": "authentication failed - invalid credentials",
        })),
        Err(RemoteGuardError::Transport { reason }) => Json(json!({
            "success": false,
            "error": format!("could not reach detection API: {reason}"),
        })),
    }
}

async fn generate(State(state): State<AppState>, Json(body): Json<GenerateRequest>) -> Response {
    let Some(text) = body.text() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "missing required field",
                "details": "one of 'message', 'meal_description', or 'workout_description' is required",
            })),
        )
            .into_response();
    };

    let mut request = ScanRequest::new(text).with_identity(RequestIdentity {
        user_id: body.user_id.clone(),
        username: body.username.clone(),
    });
    if let Some(context) = &body.context {
        request = request.with_context(context.as_str());
    }

    match state.gateway.handle(request).await {
        Ok(ScanOutcome::Generated {
            content,
            model,
            report,
        }) => {
            let security_scan = if report.scan_completed() {
                SecurityScanPayload::passed(report.input_verdict, report.output_verdict)
            } else {
                SecurityScanPayload::not_scanned()
            };
            Json(json!({
                "analysis": AnalysisPayload {
                    content,
                    model: Some(model),
                    security_scan,
                },
            }))
            .into_response()
        }
        Ok(ScanOutcome::Honeypotted { content, .. }) => Json(json!({
            "analysis": AnalysisPayload {
                content,
                model: None,
                security_scan: SecurityScanPayload::not_scanned(),
            },
        }))
        .into_response(),
        Err(GatewayError::Blocked { reason, report, .. }) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "content blocked by security policy",
                "details": reason,
                "security_scan": SecurityScanPayload::blocked(
                    report.input_verdict,
                    report.output_verdict,
                ),
            })),
        )
            .into_response(),
        Err(GatewayError::Generator(e)) => {
            let status = match &e {
                GeneratorError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                GeneratorError::ModelNotFound { .. } => StatusCode::NOT_FOUND,
                GeneratorError::Backend { .. } | GeneratorError::Network { .. } => {
                    StatusCode::BAD_GATEWAY
                }
            };
            (
                status,
                Json(json!({
                    "error": e.user_message(),
                    "details": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Json<EventsResponse> {
    let filter = EventFilter::from_query(query.event_type.as_deref());
    Json(EventsResponse {
        success: true,
        events: state.gateway.audit().list(&filter),
    })
}

async fn clear_events(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.gateway.audit().clear();
    Json(json!({"success": true, "message": "security events cleared"}))
}

async fn reports(
    State(state): State<AppState>,
    Query(query): Query<ReportsQuery>,
) -> Json<ReportsResponse> {
    let filter = EventFilter::from_query(query.event_type.as_deref());
    let (logs, pagination) = state.gateway.audit().page(
        query.page.unwrap_or(1),
        query.limit.unwrap_or(DEFAULT_REPORT_LIMIT),
        &filter,
    );
    Json(ReportsResponse { logs, pagination })
}
