//! API Regression Tests
//!
//! In-process tests that build the Axum app via `create_app()` and exercise
//! the /api/v1/* endpoints using `tower::ServiceExt::oneshot()`.
//! No binary spawn, no network port.

use vehicle_telemetry::api::{create_app, DashboardState};
use vehicle_telemetry::codec::{encode_fault, encode_rpm};
use vehicle_telemetry::{Channel, FaultCatalog, NewTelemetry, ReportSettings, TelemetryStore};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tower::ServiceExt;

fn create_test_state() -> (DashboardState, TelemetryStore) {
    let store = TelemetryStore::open_temporary().unwrap();
    let state = DashboardState::new(store.clone(), FaultCatalog::builtin(), ReportSettings::default());
    (state, store)
}

fn app() -> (Router, TelemetryStore) {
    let (state, store) = create_test_state();
    (create_app(state), store)
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

/// Four joined ticks: RPM 1000,1000,1200,1000 with PTO off,off,on,on and
/// one critical fault at t0+1s.
fn seed(store: &TelemetryStore) {
    let rpm = [1000.0, 1000.0, 1200.0, 1000.0];
    let pto = ["00A1B2C3", "00D4E5F6", "01123456", "01789ABC"];
    let mut rows = Vec::new();
    for i in 0..4 {
        let ts = t0() + Duration::seconds(i);
        rows.push(NewTelemetry::new(ts, Channel::Pto, pto[i as usize]));
        rows.push(NewTelemetry::new(ts, Channel::Rpm, encode_rpm(rpm[i as usize])));
    }
    rows.push(NewTelemetry::new(t0() + Duration::seconds(1), Channel::Fault, encode_fault(100, 1)));
    store.insert_batch(rows).unwrap();
}

async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn send_json(app: Router, method: &str, uri: &str, body: &str) -> Response {
    app.oneshot(
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

async fn json(resp: Response) -> serde_json::Value {
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// All read endpoints answer 200 on an empty store.
#[tokio::test]
async fn test_v1_get_endpoints_return_200() {
    let endpoints = [
        "/api/v1/telemetry",
        "/api/v1/rpm",
        "/api/v1/pto",
        "/api/v1/faults",
        "/api/v1/stats/rpm",
        "/api/v1/stats/pto",
        "/api/v1/stats/faults",
        "/api/v1/faults/frequency",
        "/api/v1/anomalies",
        "/api/v1/summary",
        "/api/v1/export/rpm",
        "/health",
    ];

    for endpoint in &endpoints {
        let (app, _store) = app();
        let resp = get(app, endpoint).await;
        assert!(
            resp.status().is_success(),
            "GET {endpoint} returned status {}",
            resp.status()
        );
    }
}

#[tokio::test]
async fn test_empty_store_panels() {
    let (app, _store) = app();

    let rpm = json(get(app.clone(), "/api/v1/stats/rpm").await).await;
    assert!(rpm["data"].is_null());

    let pto = json(get(app.clone(), "/api/v1/stats/pto").await).await;
    assert_eq!(pto["data"]["pto_usage_count"], 0);

    let faults = json(get(app, "/api/v1/stats/faults").await).await;
    assert_eq!(faults["data"]["total_faults"], 0);
    assert!(faults["data"]["mtbf_seconds"].is_null());
}

#[tokio::test]
async fn test_telemetry_crud_flow() {
    let (app, _store) = app();

    let resp = send_json(
        app.clone(),
        "POST",
        "/api/v1/telemetry",
        r#"{"timestamp":"2025-01-01T00:00:00Z","channel_id":"0x0CF00400","payload":"0fa00000"}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = json(resp).await;
    let id = created["data"]["id"].as_u64().unwrap();
    assert_eq!(created["data"]["payload"], "0FA00000");
    assert_eq!(created["data"]["channel_id"], "0x0CF00400");

    let fetched = get(app.clone(), &format!("/api/v1/telemetry/{id}")).await;
    assert_eq!(fetched.status(), StatusCode::OK);
    assert_eq!(json(fetched).await["data"]["id"], id);

    let patched = send_json(
        app.clone(),
        "PATCH",
        &format!("/api/v1/telemetry/{id}"),
        r#"{"payload":"12340000"}"#,
    )
    .await;
    assert_eq!(patched.status(), StatusCode::OK);
    assert_eq!(json(patched).await["data"]["payload"], "12340000");

    let deleted = send_json(app.clone(), "DELETE", &format!("/api/v1/telemetry/{id}"), "").await;
    assert_eq!(deleted.status(), StatusCode::OK);

    let gone = get(app, &format!("/api/v1/telemetry/{id}")).await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
    assert_eq!(json(gone).await["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_create_accepts_legacy_field_names() {
    let (app, store) = app();
    let resp = send_json(
        app,
        "POST",
        "/api/v1/telemetry",
        r#"{"can_id":"pto","data":"01ABCDEF"}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(store.count(), 1);
}

#[tokio::test]
async fn test_create_rejects_invalid_input() {
    let bodies = [
        r#"{"channel_id":"0x0CF00400","payload":"XYZ1"}"#,
        r#"{"channel_id":"0x0CF00400","payload":"ABC"}"#,
        r#"{"channel_id":"0x0CF00400","payload":""}"#,
        r#"{"channel_id":"0xDEADBEEF","payload":"0FA00000"}"#,
        r#"{"channel_id":"0x0CF00400","payload":"0FA00000","timestamp":"yesterday"}"#,
        r#"{"channel_id":"#,
    ];

    for body in bodies {
        let (app, store) = app();
        let resp = send_json(app, "POST", "/api/v1/telemetry", body).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body {body}");
        assert_eq!(json(resp).await["error"]["code"], "BAD_REQUEST");
        assert!(store.is_empty());
    }
}

#[tokio::test]
async fn test_patch_rejects_empty_and_missing() {
    let (app, store) = app();
    seed(&store);
    let id = store.query(&Default::default()).unwrap()[0].id;

    let empty = send_json(app.clone(), "PATCH", &format!("/api/v1/telemetry/{id}"), "{}").await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let missing = send_json(app.clone(), "PATCH", "/api/v1/telemetry/999999", r#"{"payload":"00"}"#).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let bad_id = get(app, "/api/v1/telemetry/abc").await;
    assert_eq!(bad_id.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_filters_by_channel_and_limit() {
    let (app, store) = app();
    seed(&store);

    let rpm = json(get(app.clone(), "/api/v1/telemetry?channel=rpm").await).await;
    let rows = rpm["data"].as_array().unwrap();
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|r| r["channel_id"] == "0x0CF00400"));

    // Newest two, oldest first
    let limited = json(get(app.clone(), "/api/v1/telemetry?channel=rpm&limit=2").await).await;
    let rows = limited["data"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["timestamp"], "2025-01-01T00:00:02Z");
    assert_eq!(rows[1]["timestamp"], "2025-01-01T00:00:03Z");

    let bad = get(app, "/api/v1/telemetry?channel=brakes").await;
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_panels_on_seeded_store() {
    let (app, store) = app();
    seed(&store);

    let rpm = json(get(app.clone(), "/api/v1/stats/rpm").await).await;
    assert_eq!(rpm["data"]["min_rpm"].as_f64(), Some(1000.0));
    assert_eq!(rpm["data"]["max_rpm"].as_f64(), Some(1200.0));
    assert_eq!(rpm["data"]["avg_rpm"].as_f64(), Some(1050.0));
    assert_eq!(rpm["data"]["samples"], 4);

    let pto = json(get(app.clone(), "/api/v1/stats/pto").await).await;
    assert_eq!(pto["data"]["pto_usage_count"], 1);
    assert_eq!(pto["data"]["pto_duration_sec"], 2);

    let faults = json(get(app.clone(), "/api/v1/stats/faults").await).await;
    assert_eq!(faults["data"]["total_faults"], 1);
    assert_eq!(faults["data"]["critical_count"], 1);

    let frequency = json(get(app.clone(), "/api/v1/faults/frequency?top=5").await).await;
    let groups = frequency["data"].as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["count"], 1);
    assert_eq!(groups[0]["severity"], "Critical");

    let anomalies = json(get(app.clone(), "/api/v1/anomalies").await).await;
    let list = anomalies["data"].as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["reason"], "SuddenRpmChange");
    assert_eq!(list[0]["timestamp"], "2025-01-01T00:00:02Z");

    let summary = json(get(app, "/api/v1/summary").await).await;
    assert_eq!(summary["data"]["rpm"]["samples"], 4);
    assert_eq!(summary["data"]["anomalies"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_range_filter_and_validation() {
    let (app, store) = app();
    seed(&store);

    let windowed = json(
        get(
            app.clone(),
            "/api/v1/rpm?start=2025-01-01T00:00:01Z&end=2025-01-01T00:00:02Z",
        )
        .await,
    )
    .await;
    assert_eq!(windowed["data"].as_array().unwrap().len(), 2);

    let inverted = get(
        app.clone(),
        "/api/v1/summary?start=2025-01-02T00:00:00Z&end=2025-01-01T00:00:00Z",
    )
    .await;
    assert_eq!(inverted.status(), StatusCode::BAD_REQUEST);

    let garbage = get(app, "/api/v1/anomalies?start=soon").await;
    assert_eq!(garbage.status(), StatusCode::BAD_REQUEST);
}

/// Unparseable query values get the JSON error envelope, not a plain-text 400.
#[tokio::test]
async fn test_malformed_query_values_are_enveloped() {
    let (app, _store) = app();
    for uri in [
        "/api/v1/telemetry?limit=abc",
        "/api/v1/telemetry?limit=-1",
        "/api/v1/faults/frequency?top=x",
    ] {
        let resp = get(app.clone(), uri).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
        let body = json(resp).await;
        assert_eq!(body["error"]["code"], "BAD_REQUEST", "{uri}");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("Invalid query parameters"));
        assert!(body["meta"].is_object());
    }
}

#[tokio::test]
async fn test_export_csv() {
    let (app, store) = app();
    seed(&store);

    let resp = get(app.clone(), "/api/v1/export/rpm").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/csv"));
    let disposition = resp.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.contains("rpm.csv"));

    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("timestamp,rpm"));
    assert_eq!(lines.count(), 4);

    let unknown = get(app, "/api/v1/export/brakes").await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

/// Root /health reports store counts.
#[tokio::test]
async fn test_health_reports_counts() {
    let (app, store) = app();
    seed(&store);

    let resp = get(app, "/health").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json(resp).await;
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["store"]["total_records"], 9);
    assert_eq!(body["data"]["catalog_entries"], 21);
}
