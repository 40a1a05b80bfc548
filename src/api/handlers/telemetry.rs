//! Telemetry row CRUD: list, create, fetch, patch, delete

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use super::{parse_range, query_params, DashboardState};
use crate::api::envelope::{ApiErrorResponse, ApiResponse};
use crate::codec::validate_payload;
use crate::config::defaults::DEFAULT_LIST_LIMIT;
use crate::storage::RecordFilter;
use crate::types::{parse_timestamp, Channel, NewTelemetry, TelemetryPatch};

/// Upper bound on `?limit=`.
const MAX_LIST_LIMIT: usize = 100_000;

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTelemetryRequest {
    /// ISO-8601; defaults to now
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(alias = "can_id")]
    pub channel_id: String,
    #[serde(alias = "data")]
    pub payload: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PatchTelemetryRequest {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default, alias = "can_id")]
    pub channel_id: Option<String>,
    #[serde(default, alias = "data")]
    pub payload: Option<String>,
}

// ============================================================================
// Validation helpers
// ============================================================================

fn parse_channel(raw: &str) -> Result<Channel, Response> {
    raw.parse::<Channel>()
        .map_err(|e| ApiErrorResponse::bad_request(e.to_string()))
}

/// Trim and upper-case a payload, rejecting empty, odd-length or non-hex input.
fn normalize_payload(raw: &str) -> Result<String, Response> {
    let payload = raw.trim().to_ascii_uppercase();
    validate_payload(&payload)
        .map_err(|e| ApiErrorResponse::bad_request(format!("Invalid payload '{raw}': {e}")))?;
    Ok(payload)
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    body.map(|Json(v)| v)
        .map_err(|e| ApiErrorResponse::bad_request(format!("Invalid JSON body: {e}")))
}

fn record_id(id: Result<Path<u64>, PathRejection>) -> Result<u64, Response> {
    id.map(|Path(id)| id)
        .map_err(|e| ApiErrorResponse::bad_request(format!("Invalid record id: {e}")))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/telemetry?channel=&start=&end=&limit=
pub async fn list_telemetry(
    State(state): State<DashboardState>,
    q: Result<Query<ListQuery>, QueryRejection>,
) -> Response {
    let q = match query_params(q) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    let channel = match q.channel.as_deref().map(parse_channel).transpose() {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let range = match parse_range(q.start.as_deref(), q.end.as_deref()) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let filter = RecordFilter {
        channel,
        range,
        limit: Some(q.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT)),
    };

    match state.store.query(&filter) {
        Ok(rows) => ApiResponse::ok(rows),
        Err(e) => ApiErrorResponse::from_storage(&e),
    }
}

/// POST /api/v1/telemetry
pub async fn create_telemetry(
    State(state): State<DashboardState>,
    body: Result<Json<CreateTelemetryRequest>, JsonRejection>,
) -> Response {
    let req = match json_body(body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let channel = match parse_channel(&req.channel_id) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let payload = match normalize_payload(&req.payload) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let timestamp = match req.timestamp.as_deref() {
        Some(raw) => match parse_timestamp(raw) {
            Ok(ts) => ts,
            Err(e) => return ApiErrorResponse::bad_request(format!("Invalid timestamp '{raw}': {e}")),
        },
        None => Utc::now(),
    };

    match state.store.insert(NewTelemetry::new(timestamp, channel, payload)) {
        Ok(record) => {
            info!(id = record.id, channel = %record.channel_id, "Telemetry row created");
            ApiResponse::created(record)
        }
        Err(e) => {
            warn!(error = %e, "Failed to create telemetry row");
            ApiErrorResponse::from_storage(&e)
        }
    }
}

/// GET /api/v1/telemetry/:id
pub async fn get_telemetry(
    State(state): State<DashboardState>,
    id: Result<Path<u64>, PathRejection>,
) -> Response {
    let id = match record_id(id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.store.get(id) {
        Ok(Some(record)) => ApiResponse::ok(record),
        Ok(None) => ApiErrorResponse::not_found(format!("Telemetry record {id} not found")),
        Err(e) => ApiErrorResponse::from_storage(&e),
    }
}

/// PATCH /api/v1/telemetry/:id
pub async fn patch_telemetry(
    State(state): State<DashboardState>,
    id: Result<Path<u64>, PathRejection>,
    body: Result<Json<PatchTelemetryRequest>, JsonRejection>,
) -> Response {
    let id = match record_id(id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let req = match json_body(body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let mut patch = TelemetryPatch::default();
    if let Some(raw) = req.timestamp.as_deref() {
        match parse_timestamp(raw) {
            Ok(ts) => patch.timestamp = Some(ts),
            Err(e) => return ApiErrorResponse::bad_request(format!("Invalid timestamp '{raw}': {e}")),
        }
    }
    if let Some(raw) = req.channel_id.as_deref() {
        match parse_channel(raw) {
            Ok(c) => patch.channel_id = Some(c),
            Err(resp) => return resp,
        }
    }
    if let Some(raw) = req.payload.as_deref() {
        match normalize_payload(raw) {
            Ok(p) => patch.payload = Some(p),
            Err(resp) => return resp,
        }
    }
    if patch.is_empty() {
        return ApiErrorResponse::bad_request("Patch must set at least one of timestamp, channel_id, payload");
    }

    match state.store.update(id, &patch) {
        Ok(record) => {
            info!(id, "Telemetry row updated");
            ApiResponse::ok(record)
        }
        Err(e) => ApiErrorResponse::from_storage(&e),
    }
}

/// DELETE /api/v1/telemetry/:id
pub async fn delete_telemetry(
    State(state): State<DashboardState>,
    id: Result<Path<u64>, PathRejection>,
) -> Response {
    let id = match record_id(id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.store.delete(id) {
        Ok(record) => {
            info!(id, "Telemetry row deleted");
            ApiResponse::ok(record)
        }
        Err(e) => ApiErrorResponse::from_storage(&e),
    }
}
