//! API route definitions
//!
//! - /api/v1/telemetry - row CRUD
//! - /api/v1/{rpm,pto,faults} - decoded series
//! - /api/v1/stats/* , /faults/frequency, /anomalies, /summary - dashboard panels
//! - /api/v1/export/:dataset - CSV downloads
//! - /health - liveness

use axum::extract::OriginalUri;
use axum::response::Response;
use axum::{routing::get, Router};

use super::envelope::ApiErrorResponse;
use super::handlers::{self, DashboardState};

/// Unmatched `/api/v1/*` paths answer in the JSON envelope, not with the page.
async fn api_not_found(OriginalUri(uri): OriginalUri) -> Response {
    ApiErrorResponse::not_found(format!("No route for {}", uri.path()))
}

/// Create all API routes for the dashboard
pub fn api_routes(state: DashboardState) -> Router {
    Router::new()
        .route(
            "/telemetry",
            get(handlers::list_telemetry).post(handlers::create_telemetry),
        )
        .route(
            "/telemetry/:id",
            get(handlers::get_telemetry)
                .patch(handlers::patch_telemetry)
                .delete(handlers::delete_telemetry),
        )
        // Decoded series
        .route("/rpm", get(handlers::get_rpm_series))
        .route("/pto", get(handlers::get_pto_series))
        .route("/faults", get(handlers::get_fault_table))
        // Panels
        .route("/stats/rpm", get(handlers::get_rpm_stats))
        .route("/stats/pto", get(handlers::get_pto_stats))
        .route("/stats/faults", get(handlers::get_fault_stats))
        .route("/faults/frequency", get(handlers::get_fault_frequency))
        .route("/anomalies", get(handlers::get_anomalies))
        .route("/summary", get(handlers::get_summary))
        .route("/export/:dataset", get(handlers::export_dataset))
        .fallback(api_not_found)
        .with_state(state)
}

/// Health endpoint at root level
pub fn root_routes(state: DashboardState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .with_state(state)
}
