//! Control surface endpoints.
//!
//! Shared error mapping lives here; handlers are grouped by concern.

mod asic;
mod health;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hashctl_control::{ControlError, StoreError};
use serde::Serialize;
use tracing::warn;

// ── Shared types ─────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A [`ControlError`] rendered as a JSON error response.
pub struct ApiError(pub ControlError);

impl From<ControlError> for ApiError {
    fn from(e: ControlError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            ControlError::DeviceNotFound(_) => StatusCode::NOT_FOUND,
            ControlError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ControlError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ControlError::Driver(_) => StatusCode::BAD_GATEWAY,
            ControlError::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ControlError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            ControlError::Store(StoreError::Backend(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!(error = %self.0, status = status.as_u16(), "request failed");
        }
        (status, Json(ErrorResponse { error: self.0.to_string() })).into_response()
    }
}

// ── Re-exports ───────────────────────────────────────────────────

pub use asic::{clear_override, raw, set_hashing, set_override, set_power_limit, summaries, summary};
pub use health::health;
