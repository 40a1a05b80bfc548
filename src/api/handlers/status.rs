//! Liveness endpoint

use axum::extract::State;
use axum::response::Response;
use chrono::Utc;
use serde::Serialize;
use tracing::warn;

use super::DashboardState;
use crate::api::envelope::{ApiErrorResponse, ApiResponse};
use crate::storage::StoreStats;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: i64,
    pub catalog_entries: usize,
    pub store: StoreStats,
}

/// GET /health - liveness plus record counts
pub async fn health_check(State(state): State<DashboardState>) -> Response {
    match state.store.stats() {
        Ok(store) => ApiResponse::ok(HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            uptime_secs: (Utc::now() - state.started_at).num_seconds(),
            catalog_entries: state.catalog.len(),
            store,
        }),
        Err(e) => {
            warn!(error = %e, "Health check could not read the store");
            ApiErrorResponse::service_unavailable(format!("Store unavailable: {e}"))
        }
    }
}
