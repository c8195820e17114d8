//! JSON envelope shared by the page and operator endpoints.
//!
//! Callers branch on `data` vs `error`; `meta` is informational.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;

/// Server time and envelope version.
#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub timestamp: String,
    pub version: &'static str,
}

const ENVELOPE_VERSION: &str = "1";

impl ResponseMeta {
    fn now() -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            version: ENVELOPE_VERSION,
        }
    }
}

/// `{ "data": T, "meta": {..} }`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Response {
        Self::with_status(StatusCode::OK, data)
    }

    pub fn with_status(status: StatusCode, data: T) -> Response {
        let body = Self {
            data,
            meta: ResponseMeta::now(),
        };
        (status, axum::Json(body)).into_response()
    }
}

/// Machine-readable `code` plus the text shown to the guest.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// `{ "error": { "code", "message" }, "meta": {..} }`
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub error: ErrorDetail,
    pub meta: ResponseMeta,
}

impl ApiErrorResponse {
    fn build(status: StatusCode, code: &str, msg: impl Into<String>) -> Response {
        let body = Self {
            error: ErrorDetail {
                code: code.to_string(),
                message: msg.into(),
            },
            meta: ResponseMeta::now(),
        };
        (status, axum::Json(body)).into_response()
    }

    /// Form validation failures; `msg` is displayed next to the form.
    pub fn bad_request(msg: impl Into<String>) -> Response {
        Self::build(StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
    }

    pub fn internal(msg: impl Into<String>) -> Response {
        Self::build(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
    }

    /// Error for an arbitrary status; the code is the reason phrase in
    /// SCREAMING_SNAKE_CASE (`413` -> `PAYLOAD_TOO_LARGE`).
    pub fn with_status(status: StatusCode, msg: impl Into<String>) -> Response {
        let code = status
            .canonical_reason()
            .unwrap_or("ERROR")
            .to_ascii_uppercase()
            .replace([' ', '-'], "_");
        Self::build(status, &code, msg)
    }
}
