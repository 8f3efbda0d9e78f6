//! Integration tests for the registry API endpoints.
//!
//! Tests drive the Axum `Router` directly via `tower::ServiceExt` against
//! the in-memory store, with a manual clock so history keys are
//! predictable.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::{TimeDelta, TimeZone, Utc};
use indexmap::IndexMap;
use robotlog_api::{AppState, build_router};
use robotlog_core::Clock;
use robotlog_store::{MemoryStore, Registry, RobotStore};
use serde_json::Value;
use tower::ServiceExt;

fn make_test_app() -> (Router, Clock) {
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).single().unwrap();
    let clock = Clock::manual(start);
    let store = MemoryStore::with_clock(clock.clone());
    let state = Arc::new(AppState::new(Registry::new(RobotStore::from(store))));
    (build_router(state), clock)
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_to_map(body: Body) -> IndexMap<String, Value> {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(path: &str) -> Request<Body> {
    Request::get(path).body(Body::empty()).unwrap()
}

fn put(path: &str, body: &Value) -> Request<Body> {
    Request::put(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// =============================================================================
// PUT /robots/{name}
// =============================================================================

#[tokio::test]
async fn test_put_creates_robot_and_returns_snapshot() {
    let (router, _) = make_test_app();

    let response = router
        .oneshot(put(
            "/robots/robby",
            &serde_json::json!({ "robot": { "color": "red", "weight": "100kg" } }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json, serde_json::json!({ "color": "red", "weight": "100kg" }));
}

#[tokio::test]
async fn test_put_returns_every_attribute_in_introduction_order() {
    let (router, _) = make_test_app();

    router
        .clone()
        .oneshot(put(
            "/robots/robby",
            &serde_json::json!({ "robot": { "weight": "100kg", "color": "red" } }),
        ))
        .await
        .unwrap();
    let response = router
        .oneshot(put(
            "/robots/robby",
            &serde_json::json!({ "robot": { "age": "20years", "weight": "50kg" } }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let snapshot = body_to_map(response.into_body()).await;
    let keys: Vec<&str> = snapshot.keys().map(String::as_str).collect();
    assert_eq!(keys, ["weight", "color", "age"]);
    assert_eq!(snapshot["weight"], "50kg");
}

#[tokio::test]
async fn test_put_rejects_non_string_values() {
    let (router, _) = make_test_app();

    let response = router
        .clone()
        .oneshot(put(
            "/robots/robby",
            &serde_json::json!({ "robot": { "weight": 100 } }),
        ))
        .await
        .unwrap();

    assert!(response.status().is_client_error());

    let response = router.oneshot(get("/robots/robby")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_put_requires_robot_wrapper() {
    let (router, _) = make_test_app();

    let response = router
        .oneshot(put("/robots/robby", &serde_json::json!({ "color": "red" })))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

// =============================================================================
// GET /robots/{name}
// =============================================================================

#[tokio::test]
async fn test_get_robot() {
    let (router, _) = make_test_app();

    router
        .clone()
        .oneshot(put(
            "/robots/robby",
            &serde_json::json!({ "robot": { "color": "red" } }),
        ))
        .await
        .unwrap();
    let response = router.oneshot(get("/robots/robby")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json, serde_json::json!({ "color": "red" }));
}

#[tokio::test]
async fn test_get_robot_not_found() {
    let (router, _) = make_test_app();

    let response = router.oneshot(get("/robots/ghost")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["message"], "Robot not found");
    assert_eq!(json["status"], 404);
}

// =============================================================================
// GET /robots/{name}/history
// =============================================================================

#[tokio::test]
async fn test_history_not_found() {
    let (router, _) = make_test_app();

    let response = router.oneshot(get("/robots/ghost/history")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["message"], "Robot not found");
}

#[tokio::test]
async fn test_history_after_create_and_update() {
    let (router, clock) = make_test_app();

    router
        .clone()
        .oneshot(put(
            "/robots/robby",
            &serde_json::json!({ "robot": { "color": "red", "weight": "100kg", "height": "10m" } }),
        ))
        .await
        .unwrap();
    clock.advance(TimeDelta::days(1));
    router
        .clone()
        .oneshot(put(
            "/robots/robby",
            &serde_json::json!({ "robot": { "age": "20years", "weight": "50kg" } }),
        ))
        .await
        .unwrap();

    let response = router.oneshot(get("/robots/robby/history")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let history = body_to_map(response.into_body()).await;
    let keys: Vec<&str> = history.keys().map(String::as_str).collect();
    assert_eq!(keys, ["2024-06-01 10:00:00", "2024-06-02 10:00:00"]);

    assert_eq!(
        history["2024-06-01 10:00:00"],
        serde_json::json!({
            "type": "create",
            "changes": {
                "color": { "old": "", "new": "red" },
                "weight": { "old": "", "new": "100kg" },
                "height": { "old": "", "new": "10m" },
            }
        })
    );
    assert_eq!(
        history["2024-06-02 10:00:00"],
        serde_json::json!({
            "type": "update",
            "changes": {
                "age": { "old": "", "new": "20years" },
                "weight": { "old": "100kg", "new": "50kg" },
            }
        })
    );
}

#[tokio::test]
async fn test_identical_put_adds_no_history() {
    let (router, clock) = make_test_app();
    let body = serde_json::json!({ "robot": { "color": "red" } });

    router.clone().oneshot(put("/robots/robby", &body)).await.unwrap();
    clock.advance(TimeDelta::minutes(1));
    let response = router.clone().oneshot(put("/robots/robby", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router.oneshot(get("/robots/robby/history")).await.unwrap();
    let history = body_to_map(response.into_body()).await;
    assert_eq!(history.len(), 1);
}

// =============================================================================
// GET /robots
// =============================================================================

#[tokio::test]
async fn test_list_robots() {
    let (router, clock) = make_test_app();

    router
        .clone()
        .oneshot(put(
            "/robots/alpha",
            &serde_json::json!({ "robot": { "color": "red" } }),
        ))
        .await
        .unwrap();
    clock.advance(TimeDelta::seconds(5));
    router
        .clone()
        .oneshot(put(
            "/robots/beta",
            &serde_json::json!({ "robot": { "color": "blue" } }),
        ))
        .await
        .unwrap();

    let response = router.oneshot(get("/robots")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    let robots = json.as_array().unwrap();
    assert_eq!(robots.len(), 2);
    assert_eq!(robots[0]["name"], "alpha");
    assert_eq!(robots[1]["name"], "beta");
    assert!(robots[1]["last_update"].is_string());
}

#[tokio::test]
async fn test_list_robots_empty() {
    let (router, _) = make_test_app();

    let response = router.oneshot(get("/robots")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json, serde_json::json!([]));
}
