//! REST API module using Axum
//!
//! Provides HTTP endpoints for the telemetry dashboard:
//! - `/api/v1` CRUD over stored rows plus decoded series, panels and CSV exports
//! - `/health` liveness at the root
//! - Static dashboard served via `rust-embed` (compiled into the binary)

pub mod envelope;
pub mod handlers;
mod routes;

pub use handlers::DashboardState;

use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use rust_embed::Embed;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Environment variable holding a comma-separated list of allowed CORS origins.
pub const CORS_ORIGINS_ENV_VAR: &str = "TELEMETRY_CORS_ORIGINS";

/// Request bodies are single telemetry rows; anything larger is rejected.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Dashboard page and scripts under `dashboard/`.
#[derive(Embed)]
#[folder = "dashboard/"]
struct DashboardAssets;

/// Serve a static asset or fall back to `index.html`.
async fn serve_asset(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');

    if let Some(content) = DashboardAssets::get(path) {
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        return (
            StatusCode::OK,
            [(header::CONTENT_TYPE, mime.as_ref())],
            content.data.into_owned(),
        )
            .into_response();
    }

    if let Some(index) = DashboardAssets::get("index.html") {
        return (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/html")],
            index.data.into_owned(),
        )
            .into_response();
    }

    (StatusCode::OK, "Telemetry server is running. Dashboard assets missing.").into_response()
}

/// Build a CORS layer that is restrictive by default (same-origin only).
///
/// Set `TELEMETRY_CORS_ORIGINS` to a comma-separated list of allowed origins
/// when the dashboard is served from somewhere else.
fn build_cors_layer() -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    match std::env::var(CORS_ORIGINS_ENV_VAR) {
        Ok(origins) => {
            let allowed: Vec<_> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            tracing::info!(origins = %origins, "CORS: allowing configured origins");
            base.allow_origin(allowed)
        }
        Err(_) => base,
    }
}

/// Create the complete application router with API and dashboard serving.
pub fn create_app(state: DashboardState) -> Router {
    let cors = build_cors_layer();

    Router::new()
        .nest("/api/v1", routes::api_routes(state.clone()))
        .merge(routes::root_routes(state))
        .fallback(serve_asset)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}
