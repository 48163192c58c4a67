//! Per-device summaries and operator commands.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use hashctl_control::DeviceSummary;
use hashctl_schedule::{Override, OverrideRequest};
use serde::Deserialize;

use super::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HashingRequest {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct PowerLimitRequest {
    pub watts: u32,
}

pub async fn summaries(State(state): State<Arc<AppState>>) -> Result<Json<Vec<DeviceSummary>>, ApiError> {
    Ok(Json(state.controller.summaries(Utc::now()).await?))
}

pub async fn summary(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<DeviceSummary>, ApiError> {
    Ok(Json(state.controller.summary(&name, Utc::now()).await?))
}

pub async fn raw(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(state.controller.raw_telemetry(&name).await?))
}

pub async fn set_hashing(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<HashingRequest>,
) -> Result<Json<DeviceSummary>, ApiError> {
    let now = Utc::now();
    state.controller.set_hashing(&name, req.enabled, now).await?;
    Ok(Json(state.controller.summary(&name, now).await?))
}

pub async fn set_power_limit(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<PowerLimitRequest>,
) -> Result<Json<DeviceSummary>, ApiError> {
    let now = Utc::now();
    state.controller.set_power_limit(&name, req.watts, now).await?;
    Ok(Json(state.controller.summary(&name, now).await?))
}

/// Unset fields of the request are derived from the device's schedule.
pub async fn set_override(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<OverrideRequest>,
) -> Result<(StatusCode, Json<Override>), ApiError> {
    let created = state.controller.create_override(&name, &req, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn clear_override(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.controller.clear_override(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}
