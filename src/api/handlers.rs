//! API handlers. All JSON handlers answer through the envelope in [`super::envelope`].

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::envelope::{ApiErrorResponse, ApiResponse};
use crate::builder::{Environment, SubmissionBuilder};
use crate::config::FormConfig;
use crate::delivery::DeliveryPipeline;
use crate::form::RawForm;
use crate::invitation::{Invitation, RenderedInvitation};
use crate::report::export_file_name;
use crate::types::SubmissionResult;

/// Shared state for every handler.
#[derive(Clone)]
pub struct ApiState {
    pub pipeline: Arc<DeliveryPipeline>,
    pub builder: SubmissionBuilder,
    pub form_rules: Arc<FormConfig>,
    pub invitation: Arc<Invitation>,
}

impl ApiState {
    pub fn new(pipeline: Arc<DeliveryPipeline>, form_rules: FormConfig, invitation: Invitation) -> Self {
        let builder = SubmissionBuilder::new(pipeline.clock().clone());
        Self {
            pipeline,
            builder,
            form_rules: Arc::new(form_rules),
            invitation: Arc::new(invitation),
        }
    }
}

// ============================================================================
// Request / response types
// ============================================================================

/// Body of `POST /submissions`.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub user_type: Option<String>,
    /// Defaults to the request's `User-Agent` header
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub screen_width: Option<u32>,
    #[serde(default)]
    pub screen_height: Option<u32>,
    #[serde(default)]
    pub timezone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub result: SubmissionResult,
    pub invitation: RenderedInvitation,
}

#[derive(Debug, Deserialize)]
pub struct ConnectivityRequest {
    pub online: bool,
}

#[derive(Debug, Serialize)]
pub struct ConnectivityStatus {
    pub online: bool,
    pub remote_enabled: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// Body extraction failures keep axum's status but use the error envelope.
fn json_rejection(rejection: &JsonRejection) -> Response {
    ApiErrorResponse::with_status(rejection.status(), rejection.body_text())
}

/// `POST /api/v1/submissions`
pub async fn submit(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return json_rejection(&rejection),
    };

    let form = RawForm {
        name: request.name,
        user_type: request.user_type,
    };
    let valid = match form.validate(&state.form_rules) {
        Ok(valid) => valid,
        Err(e) => return ApiErrorResponse::bad_request(e.to_string()),
    };

    let defaults = Environment::default();
    let header_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let env = Environment {
        user_agent: request
            .user_agent
            .or(header_agent)
            .unwrap_or(defaults.user_agent),
        screen_width: request.screen_width.unwrap_or(defaults.screen_width),
        screen_height: request.screen_height.unwrap_or(defaults.screen_height),
        timezone: request.timezone.unwrap_or(defaults.timezone),
    };

    let submission = state.builder.build(&valid, &env);
    let invitation = state.invitation.render(&submission, &mut rand::thread_rng());
    let result = state.pipeline.submit(submission).await;

    info!(
        user_type = %valid.user_type,
        local_ok = result.local_ok,
        remote_ok = result.remote_ok,
        queued = result.queued_for_retry,
        "Submission received"
    );

    ApiResponse::ok(SubmitResponse { result, invitation })
}

/// `GET /api/v1/stats`
pub async fn stats(State(state): State<ApiState>) -> Response {
    match state.pipeline.statistics().await {
        Ok(stats) => ApiResponse::ok(stats),
        Err(e) => {
            error!(error = %e, "Failed to compute statistics");
            ApiErrorResponse::internal(e.to_string())
        }
    }
}

/// `GET /api/v1/export.csv`: 204 when the log is empty.
pub async fn export_csv(State(state): State<ApiState>) -> Response {
    let csv = match state.pipeline.export_csv() {
        Ok(csv) => csv,
        Err(e) => {
            error!(error = %e, "Failed to export submissions");
            return ApiErrorResponse::internal(e.to_string());
        }
    };
    if csv.is_empty() {
        return StatusCode::NO_CONTENT.into_response();
    }

    let file_name = export_file_name(state.pipeline.clock().now().date_naive());
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        csv,
    )
        .into_response()
}

/// `POST /api/v1/queue/drain`
pub async fn drain_queue(State(state): State<ApiState>) -> Response {
    let report = state.pipeline.on_reconnect().await;
    ApiResponse::ok(report)
}

/// `GET /api/v1/connectivity`
pub async fn get_connectivity(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(ConnectivityStatus {
        online: state.pipeline.connectivity().is_online(),
        remote_enabled: state.pipeline.remote_enabled(),
    })
}

/// `PUT /api/v1/connectivity`
///
/// Going online wakes the reconciler, which drains the queue.
pub async fn set_connectivity(
    State(state): State<ApiState>,
    body: Result<Json<ConnectivityRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return json_rejection(&rejection),
    };
    let connectivity = state.pipeline.connectivity();
    if connectivity.set_online(request.online) {
        info!(online = request.online, "Connectivity set via API");
    }
    ApiResponse::ok(ConnectivityStatus {
        online: connectivity.is_online(),
        remote_enabled: state.pipeline.remote_enabled(),
    })
}

/// `GET /api/v1/health`
pub async fn health() -> Response {
    ApiResponse::ok(serde_json::json!({ "status": "ok" }))
}
