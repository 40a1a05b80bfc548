//! Decoded series, analysis panels and CSV exports

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use super::{parse_range, query_params, DashboardState, RangeQuery};
use crate::analysis::{
    detect_anomalies, fault_frequency, fault_stats, fault_table, join_rpm_pto,
    mean_time_between_faults, pto_series, pto_stats, rpm_series, rpm_stats, TelemetryReport,
};
use crate::api::envelope::{ApiErrorResponse, ApiResponse};
use crate::csv_io::to_csv_string;
use crate::storage::StorageError;
use crate::types::{Channel, DecodedFault, FaultStats, PtoSample, RpmSample, TimeRange};

/// `?start=&end=` as extracted, so malformed parameters can be enveloped.
type RangeParams = Result<Query<RangeQuery>, QueryRejection>;

/// Upper bound on `?top=`.
const MAX_TOP: usize = 1_000;

#[derive(Debug, Deserialize)]
pub struct TopQuery {
    #[serde(default)]
    pub top: Option<usize>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

/// Fault panel: severity counts plus mean time between faults.
#[derive(Debug, Serialize)]
pub struct FaultStatsResponse {
    #[serde(flatten)]
    pub stats: FaultStats,
    pub mtbf_seconds: Option<f64>,
}

// ============================================================================
// Internal helpers
// ============================================================================

fn load_rpm(state: &DashboardState, range: TimeRange) -> Result<Vec<RpmSample>, StorageError> {
    Ok(rpm_series(&state.store.channel_samples(Channel::Rpm, range)?))
}

fn load_pto(state: &DashboardState, range: TimeRange) -> Result<Vec<PtoSample>, StorageError> {
    Ok(pto_series(&state.store.channel_samples(Channel::Pto, range)?))
}

fn load_faults(state: &DashboardState, range: TimeRange) -> Result<Vec<DecodedFault>, StorageError> {
    let rows = state.store.channel_samples(Channel::Fault, range)?;
    Ok(fault_table(&rows, &state.catalog))
}

/// Resolve the range, run `f`, and wrap the outcome in the envelope.
fn respond<T, F>(q: RangeParams, f: F) -> Response
where
    T: Serialize,
    F: FnOnce(TimeRange) -> Result<T, StorageError>,
{
    match query_params(q) {
        Ok(q) => respond_in(&q, f),
        Err(resp) => resp,
    }
}

fn respond_in<T, F>(q: &RangeQuery, f: F) -> Response
where
    T: Serialize,
    F: FnOnce(TimeRange) -> Result<T, StorageError>,
{
    let range = match q.time_range() {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match f(range) {
        Ok(data) => ApiResponse::ok(data),
        Err(e) => ApiErrorResponse::from_storage(&e),
    }
}

// ============================================================================
// Series
// ============================================================================

/// GET /api/v1/rpm
pub async fn get_rpm_series(State(state): State<DashboardState>, q: RangeParams) -> Response {
    respond(q, |range| load_rpm(&state, range))
}

/// GET /api/v1/pto
pub async fn get_pto_series(State(state): State<DashboardState>, q: RangeParams) -> Response {
    respond(q, |range| load_pto(&state, range))
}

/// GET /api/v1/faults
pub async fn get_fault_table(State(state): State<DashboardState>, q: RangeParams) -> Response {
    respond(q, |range| load_faults(&state, range))
}

// ============================================================================
// Panels
// ============================================================================

/// GET /api/v1/stats/rpm (`data` is null when there are no RPM rows)
pub async fn get_rpm_stats(State(state): State<DashboardState>, q: RangeParams) -> Response {
    respond(q, |range| Ok(rpm_stats(&load_rpm(&state, range)?)))
}

/// GET /api/v1/stats/pto
pub async fn get_pto_stats(State(state): State<DashboardState>, q: RangeParams) -> Response {
    respond(q, |range| Ok(pto_stats(&load_pto(&state, range)?)))
}

/// GET /api/v1/stats/faults
pub async fn get_fault_stats(State(state): State<DashboardState>, q: RangeParams) -> Response {
    respond(q, |range| {
        let table = load_faults(&state, range)?;
        Ok(FaultStatsResponse {
            stats: fault_stats(&table),
            mtbf_seconds: mean_time_between_faults(&table),
        })
    })
}

/// GET /api/v1/faults/frequency?top=10
pub async fn get_fault_frequency(
    State(state): State<DashboardState>,
    q: Result<Query<TopQuery>, QueryRejection>,
) -> Response {
    let q = match query_params(q) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    let top = q.top.unwrap_or(state.settings.top_n).min(MAX_TOP);
    let range = RangeQuery {
        start: q.start,
        end: q.end,
    };
    respond_in(&range, |range| Ok(fault_frequency(&load_faults(&state, range)?, Some(top))))
}

/// GET /api/v1/anomalies
pub async fn get_anomalies(State(state): State<DashboardState>, q: RangeParams) -> Response {
    respond(q, |range| {
        let joined = join_rpm_pto(&load_rpm(&state, range)?, &load_pto(&state, range)?);
        Ok(detect_anomalies(&joined, &state.settings.rules))
    })
}

/// GET /api/v1/summary
pub async fn get_summary(State(state): State<DashboardState>, q: RangeParams) -> Response {
    respond(q, |range| {
        TelemetryReport::build(&state.store, &state.catalog, range, &state.settings)
    })
}

// ============================================================================
// Exports
// ============================================================================

fn csv_download(name: &str, body: String) -> Response {
    let disposition = format!("attachment; filename=\"{name}.csv\"");
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}

/// GET /api/v1/export/:dataset where dataset is `rpm`, `pto` or `faults`
pub async fn export_dataset(
    State(state): State<DashboardState>,
    Path(dataset): Path<String>,
    q: RangeParams,
) -> Response {
    let q = match query_params(q) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    let range = match parse_range(q.start.as_deref(), q.end.as_deref()) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let csv = match dataset.as_str() {
        "rpm" => load_rpm(&state, range).map(|rows| to_csv_string(&rows)),
        "pto" => load_pto(&state, range).map(|rows| to_csv_string(&rows)),
        "faults" => load_faults(&state, range).map(|rows| to_csv_string(&rows)),
        other => {
            return ApiErrorResponse::not_found(format!(
                "Unknown dataset '{other}' (expected rpm, pto or faults)"
            ))
        }
    };

    match csv {
        Ok(Ok(body)) => csv_download(&dataset, body),
        Ok(Err(e)) => ApiErrorResponse::internal(format!("CSV export failed: {e}")),
        Err(e) => ApiErrorResponse::from_storage(&e),
    }
}
