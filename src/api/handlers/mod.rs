//! API route handlers
//!
//! - Telemetry row CRUD
//! - Decoded series and analysis panels
//! - CSV exports and health

mod analysis;
mod status;
mod telemetry;

pub use analysis::*;
pub use status::*;
pub use telemetry::*;

use axum::extract::rejection::QueryRejection;
use axum::extract::Query;
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

use super::envelope::ApiErrorResponse;
use crate::analysis::ReportSettings;
use crate::catalog::FaultCatalog;
use crate::storage::TelemetryStore;
use crate::types::{parse_timestamp, TimeRange};

// ============================================================================
// API State
// ============================================================================

/// Shared state for API handlers
#[derive(Clone)]
pub struct DashboardState {
    pub store: TelemetryStore,
    /// Loaded once at startup, read-only afterwards
    pub catalog: Arc<FaultCatalog>,
    /// Anomaly thresholds and panel sizes
    pub settings: ReportSettings,
    pub started_at: DateTime<Utc>,
}

impl DashboardState {
    pub fn new(store: TelemetryStore, catalog: FaultCatalog, settings: ReportSettings) -> Self {
        Self {
            store,
            catalog: Arc::new(catalog),
            settings,
            started_at: Utc::now(),
        }
    }
}

// ============================================================================
// Query types
// ============================================================================

/// `?start=&end=` window shared by every read endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

impl RangeQuery {
    pub fn time_range(&self) -> Result<TimeRange, Response> {
        parse_range(self.start.as_deref(), self.end.as_deref())
    }
}

/// Unwrap query parameters, turning a rejection into an enveloped 400.
pub(crate) fn query_params<T>(q: Result<Query<T>, QueryRejection>) -> Result<T, Response> {
    q.map(|Query(v)| v)
        .map_err(|e| ApiErrorResponse::bad_request(format!("Invalid query parameters: {e}")))
}

/// Parse optional ISO-8601 bounds into a [`TimeRange`], rejecting bad
/// timestamps and inverted windows with a 400.
pub(crate) fn parse_range(start: Option<&str>, end: Option<&str>) -> Result<TimeRange, Response> {
    let parse = |name: &str, raw: Option<&str>| -> Result<Option<DateTime<Utc>>, Response> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => parse_timestamp(s)
                .map(Some)
                .map_err(|e| ApiErrorResponse::bad_request(format!("Invalid {name} '{s}': {e}"))),
            None => Ok(None),
        }
    };

    let range = TimeRange::new(parse("start", start)?, parse("end", end)?);
    if let (Some(s), Some(e)) = (range.start, range.end) {
        if s > e {
            return Err(ApiErrorResponse::bad_request("start must not be after end"));
        }
    }
    Ok(range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_parse_range() {
        let range = parse_range(Some("2025-01-01T00:00:00Z"), None).unwrap();
        assert!(range.start.is_some());
        assert!(range.end.is_none());
        assert_eq!(parse_range(Some(""), Some(" ")).unwrap(), TimeRange::ALL);
    }

    #[test]
    fn test_parse_range_rejects_bad_input() {
        let bad = parse_range(Some("not-a-time"), None).unwrap_err();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let inverted =
            parse_range(Some("2025-01-02T00:00:00Z"), Some("2025-01-01T00:00:00Z")).unwrap_err();
        assert_eq!(inverted.status(), StatusCode::BAD_REQUEST);
    }
}
