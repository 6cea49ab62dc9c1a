//! Integration tests for the analytics HTTP API
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot`; each
//! test spawns its own ingest actor.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use linkpulse::analytics::{sample, ClickEvent, EventStore, IngestService};
use linkpulse::api::create_api_router;
use linkpulse::cursor::CursorSigner;
use serde_json::{json, Value};
use tower::ServiceExt;

fn create_test_app(store: EventStore) -> Router {
    let ingest = IngestService::spawn(store, 64);
    create_api_router(ingest, CursorSigner::new(Some("test-secret")))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app(EventStore::new());
    let (status, json) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "OK");
}

#[tokio::test]
async fn test_metrics_for_seed_events() {
    let app = create_test_app(EventStore::with_events(sample::seed_events(Utc::now())));

    let (status, json) = send(&app, get("/api/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_clicks"], 5);
    assert_eq!(json["unique_visitors"], 5);
    assert_eq!(json["active_urls"], 5);
    assert_eq!(json["p95_latency"], 75.0);
    assert_eq!(json["error_rate"], 0.0);
    assert_eq!(json["device_breakdown"]["mobile"], 3);
    assert_eq!(json["device_breakdown"]["desktop"], 2);
    assert_eq!(json["geo_distribution"]["TR"], 1);
    assert_eq!(json["top_urls"].as_array().unwrap().len(), 5);
    assert_eq!(json["referrer_sources"][0]["domain"], "default.com");
}

#[tokio::test]
async fn test_metrics_with_filters() {
    let app = create_test_app(EventStore::with_events(sample::seed_events(Utc::now())));

    let (status, json) = send(&app, get("/api/metrics?country=US")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_clicks"], 1);
    assert_eq!(json["top_urls"][0]["url"], "short.url/def456");
    assert_eq!(json["top_urls"][0]["percentage"], 100.0);

    // Seed events carry no channel
    let (status, json) = send(&app, get("/api/metrics?channel=qr")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_clicks"], 0);
    assert_eq!(json["error_rate"], 0.0);
    assert_eq!(json["avg_clicks_per_url"], 0.0);
}

#[tokio::test]
async fn test_empty_filter_values_mean_no_constraint() {
    let app = create_test_app(EventStore::with_events(sample::seed_events(Utc::now())));

    for uri in [
        "/api/metrics?country=",
        "/api/metrics?channel=",
        "/api/metrics?country=&channel=&campaign=&user_id=&tag=",
        "/api/metrics?start=&end=",
    ] {
        let (status, json) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(json["total_clicks"], 5, "{uri}");
    }
}

#[tokio::test]
async fn test_bad_query_values_return_json_errors() {
    let app = create_test_app(EventStore::with_events(sample::seed_events(Utc::now())));

    let (status, json) = send(&app, get("/api/metrics?channel=email")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("Invalid channel"));

    let (status, json) = send(&app, get("/api/metrics/trend?granularity=week")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid query parameters"));

    let (status, json) = send(&app, get("/api/events?limit=many")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_metrics_rejects_bad_windows() {
    let app = create_test_app(EventStore::new());

    let (status, json) = send(&app, get("/api/metrics?start=2024-06-13&end=2024-06-12")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("Start date"));

    let (status, json) = send(&app, get("/api/metrics?start=last-week")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("Invalid start date"));
}

#[tokio::test]
async fn test_log_event_then_query() {
    let app = create_test_app(EventStore::new());

    let event = json!({
        "short_url_id": "short.url/xyz",
        "timestamp": "2024-06-12T10:15:00Z",
        "visitor_hash": "hash42",
        "user_agent": "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)",
        "referrer_url": "https://t.co/abc",
        "utm_campaign": "launch",
        "country_code": "DE",
        "channel": "qr",
        "status_code": 404,
        "latency_ms": 120.0
    });

    let (status, _) = send(&app, post_json("/api/events", event.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(&app, post_json("/api/events", event)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = send(
        &app,
        get("/api/metrics?start=2024-06-12&end=2024-06-12&channel=qr"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_clicks"], 2);
    assert_eq!(json["unique_visitors"], 1);
    assert_eq!(json["error_rate"], 100.0);
    assert_eq!(json["referrer_sources"][0]["domain"], "t.co");
    assert_eq!(
        json["referrer_sources"][0]["utm_campaigns"][0],
        json!({ "name": "launch", "clicks": 2 })
    );
    assert_eq!(json["device_breakdown"]["mobile"], 2);
}

#[tokio::test]
async fn test_log_event_validation() {
    let app = create_test_app(EventStore::new());

    let (status, json) = send(
        &app,
        post_json(
            "/api/events",
            json!({ "short_url_id": "  ", "visitor_hash": "h", "user_agent": "ua" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "short_url_id cannot be empty");

    // Missing required fields is rejected by the JSON extractor
    let (status, json) = send(&app, post_json("/api/events", json!({ "short_url_id": "a" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["error"].as_str().unwrap().starts_with("Invalid event body"));

    let malformed = Request::builder()
        .method("POST")
        .uri("/api/events")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, json) = send(&app, malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());

    let no_content_type = Request::builder()
        .method("POST")
        .uri("/api/events")
        .body(Body::from("{}"))
        .unwrap();
    let (status, json) = send(&app, no_content_type).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_log_event_defaults_timestamp_to_now() {
    let app = create_test_app(EventStore::new());

    let (status, _) = send(
        &app,
        post_json(
            "/api/events",
            json!({ "short_url_id": "short.url/now", "visitor_hash": "h", "user_agent": "ua" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, json) = send(&app, get("/api/metrics")).await;
    assert_eq!(json["total_clicks"], 1);
}

#[tokio::test]
async fn test_trend_and_heatmap() {
    let now = Utc::now();
    let mut store = EventStore::new();
    for hours_ago in [1, 1, 30] {
        store.log_event(ClickEvent::new(
            "short.url/abc",
            now - Duration::hours(hours_ago),
            "h",
            "ua",
        ));
    }
    let app = create_test_app(store);

    let (status, json) = send(&app, get("/api/metrics/trend?granularity=hour")).await;
    assert_eq!(status, StatusCode::OK);
    let points = json.as_array().unwrap();
    assert_eq!(points.len(), 2);
    assert_eq!(points[1]["clicks"], 2);

    let (status, json) = send(&app, get("/api/metrics/trend")).await;
    assert_eq!(status, StatusCode::OK);
    let total: u64 = json
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["clicks"].as_u64().unwrap())
        .sum();
    assert_eq!(total, 3);

    let (status, json) = send(&app, get("/api/metrics/heatmap")).await;
    assert_eq!(status, StatusCode::OK);
    let cells = json.as_array().unwrap();
    assert_eq!(cells.len(), 168);
    let total: u64 = cells.iter().map(|c| c["clicks"].as_u64().unwrap()).sum();
    assert_eq!(total, 3);
}

#[tokio::test]
async fn test_event_log_pagination() {
    let now = Utc::now();
    let mut store = EventStore::new();
    for i in 0..5 {
        store.log_event(ClickEvent::new(
            format!("short.url/{i}"),
            now - Duration::minutes(i),
            "h",
            "ua",
        ));
    }
    let app = create_test_app(store);

    let (status, first) = send(&app, get("/api/events?limit=2")).await;
    assert_eq!(status, StatusCode::OK);
    let events = first["events"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["short_url_id"], "short.url/0");
    assert_eq!(events[0]["seq"], 0);
    assert!(events[0]["visitor_key"].is_string());

    let mut seen = 2;
    let mut cursor = first["next_cursor"].as_str().unwrap().to_string();
    loop {
        let (status, page) = send(&app, get(&format!("/api/events?limit=2&cursor={cursor}"))).await;
        assert_eq!(status, StatusCode::OK);
        seen += page["events"].as_array().unwrap().len();
        match page["next_cursor"].as_str() {
            Some(next) => cursor = next.to_string(),
            None => break,
        }
    }
    assert_eq!(seen, 5);
}

#[tokio::test]
async fn test_event_log_rejects_tampered_cursor() {
    let app = create_test_app(EventStore::with_events(sample::seed_events(Utc::now())));

    let (status, json) = send(&app, get("/api/events?cursor=abc.def")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().starts_with("Invalid cursor"));
}

#[tokio::test]
async fn test_service_unavailable_after_shutdown() {
    let ingest = IngestService::spawn(EventStore::new(), 8);
    let app = create_api_router(ingest.clone(), CursorSigner::new(None));

    ingest.shutdown().await;

    let (status, json) = send(&app, get("/api/metrics")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"], "Analytics service unavailable");
}
