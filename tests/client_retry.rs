//! Retry, timeout and error-surface behavior of the HTTP client.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use mangia_client::{ApiClient, ApiError};

#[tokio::test]
async fn server_error_surfaces_immediately_without_retry() {
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    let app = Router::new().route(
        "/restaurants/",
        get(move || {
            let h = h.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"detail": "kitchen is closed"})),
                )
            }
        }),
    );
    let base = common::spawn(app).await;
    let client = ApiClient::new(&common::test_config(&base));

    let result: Result<Value, ApiError> = client.get("/restaurants/").await;
    match result {
        Err(ApiError::Http { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "kitchen is closed");
        }
        other => panic!("expected Http error, got {other:?}"),
    }
    // A received response is final: exactly one attempt.
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn non_json_error_body_falls_back_to_status_message() {
    let app = Router::new().route(
        "/restaurants/",
        get(|| async { (StatusCode::BAD_GATEWAY, "upstream died") }),
    );
    let base = common::spawn(app).await;
    let client = ApiClient::new(&common::test_config(&base));

    let result: Result<Value, ApiError> = client.get("/restaurants/").await;
    match result {
        Err(ApiError::Http { status, message }) => {
            assert_eq!(status, 502);
            assert_eq!(message, "HTTP error! status: 502");
        }
        other => panic!("expected Http error, got {other:?}"),
    }
}

#[tokio::test]
async fn timeouts_retry_until_an_attempt_succeeds() {
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    let app = Router::new().route(
        "/slow",
        get(move || {
            let h = h.clone();
            async move {
                // First two attempts exceed the 150ms budget.
                if h.fetch_add(1, Ordering::SeqCst) < 2 {
                    tokio::time::sleep(Duration::from_millis(600)).await;
                }
                Json(json!({"ok": true}))
            }
        }),
    );
    let base = common::spawn(app).await;
    let client = ApiClient::new(&common::test_config(&base));

    let value: Value = client.get("/slow").await.unwrap();
    assert_eq!(value["ok"], true);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn attempts_are_bounded_by_max_retries_plus_one() {
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    let app = Router::new().route(
        "/slow",
        get(move || {
            let h = h.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(600)).await;
                Json(json!({"ok": true}))
            }
        }),
    );
    let base = common::spawn(app).await;
    // max_retries = 2 in the test config.
    let client = ApiClient::new(&common::test_config(&base));

    let result: Result<Value, ApiError> = client.get("/slow").await;
    assert!(matches!(result, Err(ApiError::Timeout(_))));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn connection_refused_surfaces_as_connection_error() {
    // Bind then drop to find a port nobody is listening on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ApiClient::new(&common::test_config(&format!("http://{addr}")));
    let result: Result<Value, ApiError> = client.get("/restaurants/").await;
    match result {
        Err(e @ ApiError::Connection(_)) => assert!(e.is_retryable()),
        other => panic!("expected Connection error, got {other:?}"),
    }
}

#[tokio::test]
async fn idempotency_key_is_reused_across_retries() {
    let keys: Arc<Mutex<Vec<Option<String>>>> = Arc::new(Mutex::new(Vec::new()));
    let k = keys.clone();
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    let app = Router::new().route(
        "/orders/create",
        post(move |headers: HeaderMap| {
            let k = k.clone();
            let h = h.clone();
            async move {
                k.lock().unwrap().push(
                    headers
                        .get("Idempotency-Key")
                        .map(|v| v.to_str().unwrap().to_string()),
                );
                if h.fetch_add(1, Ordering::SeqCst) == 0 {
                    tokio::time::sleep(Duration::from_millis(600)).await;
                }
                Json(json!({"id": 1, "status": "pending"}))
            }
        }),
    );
    let base = common::spawn(app).await;
    let client = ApiClient::new(&common::test_config(&base));

    let _: Value = client
        .post("/orders/create", &json!({"restaurant_id": 1}))
        .await
        .unwrap();

    let keys = keys.lock().unwrap();
    assert_eq!(keys.len(), 2);
    assert!(keys[0].is_some());
    assert_eq!(keys[0], keys[1]);
}

#[tokio::test]
async fn get_requests_carry_no_idempotency_key() {
    let key_seen = Arc::new(Mutex::new(None::<String>));
    let k = key_seen.clone();
    let app = Router::new().route(
        "/restaurants/",
        get(move |headers: HeaderMap| {
            let k = k.clone();
            async move {
                *k.lock().unwrap() = headers
                    .get("Idempotency-Key")
                    .map(|v| v.to_str().unwrap().to_string());
                Json(json!([]))
            }
        }),
    );
    let base = common::spawn(app).await;
    let client = ApiClient::new(&common::test_config(&base));

    let _: Value = client.get("/restaurants/").await.unwrap();
    assert!(key_seen.lock().unwrap().is_none());
}

#[tokio::test]
async fn health_probe_maps_outcomes_to_bool() {
    let app = Router::new().route("/health", get(|| async { Json(json!(true)) }));
    let base = common::spawn(app).await;
    assert!(ApiClient::new(&common::test_config(&base)).health().await);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let dead = ApiClient::new(&common::test_config(&format!("http://{addr}")));
    assert!(!dead.health().await);
}
