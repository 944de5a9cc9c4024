//! Integration tests for the reading streak endpoints
//!
//! Tests: identity header, event recording and validation, streak lookup,
//! explicit recompute, background recompute and the batch endpoint.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Local, NaiveDate, TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

use api_lib::{
    config::Config,
    web::{build_router, state::AppState},
};
use reading_streak_core::{MemoryStore, StreakStore};

fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://unused".to_string(),
        db_max_connections: 1,
        log_level: tracing::Level::INFO,
        batch_interval: Duration::from_secs(3600),
        batch_concurrency: 2,
        cors_allowed_origin: "http://localhost:3000".to_string(),
    }
}

fn test_app() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = Arc::new(AppState::new(store.clone(), &test_config()));
    (build_router(state), store)
}

/// RFC 3339 timestamp at `hour` on the given server-local day.
fn local_timestamp(date: NaiveDate, hour: u32) -> String {
    Local
        .from_local_datetime(&date.and_hms_opt(hour, 0, 0).unwrap())
        .earliest()
        .unwrap()
        .with_timezone(&Utc)
        .to_rfc3339()
}

fn json_request(method: Method, uri: &str, user: Option<Uuid>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(user) = user {
        builder = builder.header("x-user-id", user.to_string());
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn response_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(json!({}))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, response_json(response).await)
}

#[tokio::test]
async fn test_missing_user_header_is_unauthorized() {
    let (app, _) = test_app();
    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/v1/streak")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_user_header_is_unauthorized() {
    let (app, _) = test_app();
    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/v1/streak")
        .header("x-user-id", "not-a-uuid")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_new_user_streak_is_zero() {
    let (app, _) = test_app();
    let user = Uuid::new_v4();
    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/v1/streak")
        .header("x-user-id", user.to_string())
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], json!(user.to_string()));
    assert_eq!(body["current_streak"], 0);
    assert_eq!(body["longest_streak"], 0);
    assert_eq!(body["last_active_date"], Value::Null);
}

#[tokio::test]
async fn test_record_event_returns_progress() {
    let (app, store) = test_app();
    let user = Uuid::new_v4();
    let date = NaiveDate::from_ymd_opt(2024, 8, 1).unwrap();

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/reading-events",
            Some(user),
            json!({
                "page_number": 2,
                "surah_name": "Al-Baqarah",
                "seconds_open": 150,
                "created_at": local_timestamp(date, 9),
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_seconds"], 150);
    assert_eq!(body["percentage_done"], 50);
    assert_eq!(body["date"], json!("2024-08-01"));

    let (_, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/reading-events",
            Some(user),
            json!({
                "page_number": 3,
                "surah_name": "Al-Baqarah",
                "seconds_open": 5000,
                "created_at": local_timestamp(date, 10),
            }),
        ),
    )
    .await;
    assert_eq!(body["total_seconds"], 750);
    assert_eq!(body["percentage_done"], 100);

    let events = store.events_for(user).await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].seconds_open, 600);
}

#[tokio::test]
async fn test_rejected_events_return_their_code() {
    let (app, store) = test_app();
    let user = Uuid::new_v4();

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/reading-events",
            Some(user),
            json!({ "page_number": 10, "surah_name": "Yasin", "seconds_open": 29 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "ENGAGEMENT_TOO_SHORT");

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/reading-events",
            Some(user),
            json!({ "page_number": 605, "surah_name": "An-Nas", "seconds_open": 60 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "PAGE_OUT_OF_RANGE");

    assert!(store.events_for(user).await.is_empty());
}

#[tokio::test]
async fn test_background_recompute_updates_the_streak() {
    let (app, store) = test_app();
    let user = Uuid::new_v4();

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/reading-events",
            Some(user),
            json!({ "page_number": 300, "surah_name": "Al-Kahf", "seconds_open": 320 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let date: NaiveDate = serde_json::from_value(body["date"].clone()).unwrap();

    let mut streak = None;
    for _ in 0..100 {
        if let Ok(found) = store.get_streak(user).await {
            streak = Some(found);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let streak = streak.expect("background recompute did not run");
    assert_eq!(streak.current_streak, 1);
    assert_eq!(streak.last_active_date, Some(date));

    let summary = store.get_daily_summary(user, date).await.unwrap();
    assert_eq!(summary.total_seconds, 320);
    assert!(summary.threshold_met);
}

#[tokio::test]
async fn test_explicit_recompute_across_days() {
    let (app, _) = test_app();
    let user = Uuid::new_v4();
    let day1 = NaiveDate::from_ymd_opt(2024, 9, 1).unwrap();
    let day2 = NaiveDate::from_ymd_opt(2024, 9, 2).unwrap();

    for (date, seconds) in [(day1, 310), (day2, 400)] {
        let (status, _) = send(
            &app,
            json_request(
                Method::POST,
                "/api/v1/reading-events",
                Some(user),
                json!({
                    "page_number": 50,
                    "surah_name": "Al-Imran",
                    "seconds_open": seconds,
                    "created_at": local_timestamp(date, 12),
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/daily-summary",
            Some(user),
            json!({ "date": "2024-09-01" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_seconds"], 310);
    assert_eq!(body["threshold_met"], true);

    let (_, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/daily-summary",
            Some(user),
            json!({ "date": "2024-09-02" }),
        ),
    )
    .await;
    assert_eq!(body["streak"]["current_streak"], 2);
    assert_eq!(body["streak"]["longest_streak"], 2);
    assert_eq!(body["streak"]["last_active_date"], json!("2024-09-02"));
}

#[tokio::test]
async fn test_batch_endpoint_processes_the_requested_day() {
    let (app, store) = test_app();
    let operator = Uuid::new_v4();
    let readers = [Uuid::new_v4(), Uuid::new_v4()];
    let date = NaiveDate::from_ymd_opt(2024, 10, 5).unwrap();

    for reader in readers {
        send(
            &app,
            json_request(
                Method::POST,
                "/api/v1/reading-events",
                Some(reader),
                json!({
                    "page_number": 1,
                    "surah_name": "Al-Fatihah",
                    "seconds_open": 300,
                    "created_at": local_timestamp(date, 8),
                }),
            ),
        )
        .await;
    }

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/batch/run?date=2024-10-05")
        .header("x-user-id", operator.to_string())
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["date"], json!("2024-10-05"));
    assert_eq!(body["processed"], 2);
    assert_eq!(body["failed"], 0);

    for reader in readers {
        let streak = store.get_streak(reader).await.unwrap();
        assert_eq!(streak.current_streak, 1);
    }
}
