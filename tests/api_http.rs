// tests/api_http.rs
//
// HTTP-level tests for the public Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot, with a
// manual clock so timestamps are deterministic.
//
// Covered:
// - GET /health
// - POST /transacao (accepted, rejected, malformed)
// - DELETE /transacao
// - GET /estatistica

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use transaction_stats::{build_app, Clock, Config, ManualClock};

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap()
}

/// Build the same Router the binary uses, on a manual clock.
fn test_router() -> (ManualClock, Router) {
    let clock = ManualClock::new(t0());
    let app = build_app(&Config::default(), Arc::new(clock.clone())).expect("build app");
    (clock, app)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Json) {
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let v = if bytes.is_empty() {
        Json::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Json::Null)
    };
    (status, v)
}

fn post_transaction(payload: &Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/transacao")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST /transacao")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build GET")
}

#[tokio::test]
async fn health_returns_200_and_status_body() {
    let (_clock, app) = test_router();

    let resp = app.clone().oneshot(get("/health")).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK, "health should be 200");
    assert!(
        resp.headers().contains_key("x-request-id"),
        "x-request-id should be generated when absent"
    );

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    let v: Json = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(v, json!({ "status": "healthy" }));
}

#[tokio::test]
async fn request_id_is_propagated() {
    let (_clock, app) = test_router();
    let req = Request::builder()
        .uri("/health")
        .header("x-request-id", "abc-123")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(
        resp.headers().get("x-request-id").and_then(|h| h.to_str().ok()),
        Some("abc-123")
    );
}

#[tokio::test]
async fn valid_transaction_is_created() {
    let (clock, app) = test_router();
    let ts = clock.now() - Duration::seconds(30);

    let (status, v) = send(
        &app,
        post_transaction(&json!({ "valor": 123.45, "dataHora": ts.to_rfc3339() })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "body: {v}");
    assert_eq!(v["success"], json!(true));
    assert_eq!(v["data"]["valor"], json!(123.45));
    let echoed: DateTime<Utc> = v["data"]["dataHora"]
        .as_str()
        .expect("dataHora string")
        .parse()
        .expect("rfc3339");
    assert_eq!(echoed, ts);
    assert!(v.get("error").is_none(), "no error on success");
}

#[tokio::test]
async fn negative_value_is_unprocessable() {
    let (clock, app) = test_router();

    let (status, v) = send(
        &app,
        post_transaction(&json!({ "valor": -10.00, "dataHora": clock.now().to_rfc3339() })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(v["success"], json!(false));
    assert_eq!(v["error"]["code"], json!("invalid_transaction"));
    assert_eq!(v["error"]["reason"], json!("negative_value"));

    let (_, stats) = send(&app, get("/estatistica")).await;
    assert_eq!(stats["count"], json!(0));
}

#[tokio::test]
async fn future_timestamp_is_unprocessable() {
    let (clock, app) = test_router();
    let ts = clock.now() + Duration::hours(1);

    let (status, v) = send(
        &app,
        post_transaction(&json!({ "valor": 100.00, "dataHora": ts.to_rfc3339() })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(v["error"]["reason"], json!("future_timestamp"));
}

#[tokio::test]
async fn oversized_value_is_unprocessable_and_statistics_stay_numeric() {
    let (clock, app) = test_router();
    let huge = json!({ "valor": 1e308, "dataHora": clock.now().to_rfc3339() });

    for _ in 0..2 {
        let (status, v) = send(&app, post_transaction(&huge)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(v["error"]["reason"], json!("value_too_large"));
    }

    let max = json!({ "valor": 1e15, "dataHora": clock.now().to_rfc3339() });
    for _ in 0..2 {
        let (status, _) = send(&app, post_transaction(&max)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, stats) = send(&app, get("/estatistica")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["count"], json!(2));
    for field in ["sum", "avg", "min", "max"] {
        assert!(stats[field].is_number(), "{field} is not numeric: {stats}");
    }
    assert_eq!(stats["sum"].as_f64(), Some(2e15));
}

#[tokio::test]
async fn malformed_payloads_are_bad_requests() {
    let (_clock, app) = test_router();

    for raw in [
        r#"{"valor": 1.0"#,
        r#"{"valor": 1.0}"#,
        r#"{"valor": "abc", "dataHora": "2025-09-06T09:00:00Z"}"#,
        r#"{"valor": 1.0, "dataHora": "yesterday"}"#,
    ] {
        let req = Request::builder()
            .method("POST")
            .uri("/transacao")
            .header("content-type", "application/json")
            .body(Body::from(raw))
            .unwrap();
        let (status, v) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "payload {raw}");
        assert_eq!(v["error"]["code"], json!("invalid_json"), "payload {raw}");
    }
}

#[tokio::test]
async fn missing_content_type_is_bad_request() {
    let (clock, app) = test_router();
    let req = Request::builder()
        .method("POST")
        .uri("/transacao")
        .body(Body::from(
            json!({ "valor": 1.0, "dataHora": clock.now().to_rfc3339() }).to_string(),
        ))
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unsupported_method_is_405() {
    let (_clock, app) = test_router();
    let req = Request::builder()
        .method("PUT")
        .uri("/transacao")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn statistics_over_http() {
    let (clock, app) = test_router();
    let now = clock.now();

    for (valor, age) in [(100.00, 30), (50.00, 45), (25.00, 15)] {
        let ts = now - Duration::seconds(age);
        let (status, _) = send(
            &app,
            post_transaction(&json!({ "valor": valor, "dataHora": ts.to_rfc3339() })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, v) = send(&app, get("/estatistica")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["count"], json!(3));
    assert_eq!(v["sum"].as_f64(), Some(175.0));
    let avg = v["avg"].as_f64().expect("avg");
    assert!((avg - 58.33).abs() < 0.01, "avg={avg}");
    assert_eq!(v["min"].as_f64(), Some(25.0));
    assert_eq!(v["max"].as_f64(), Some(100.0));
}

#[tokio::test]
async fn delete_clears_and_statistics_are_zero() {
    let (clock, app) = test_router();
    let (status, _) = send(
        &app,
        post_transaction(&json!({ "valor": 10.0, "dataHora": clock.now().to_rfc3339() })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    for _ in 0..2 {
        let req = Request::builder()
            .method("DELETE")
            .uri("/transacao")
            .body(Body::empty())
            .unwrap();
        let (status, v) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["success"], json!(true));
        assert!(v["data"]["message"].is_string());
    }

    let (_, v) = send(&app, get("/estatistica")).await;
    assert_eq!(
        v,
        json!({ "count": 0, "sum": 0.0, "avg": 0.0, "min": 0.0, "max": 0.0 })
    );
}

#[tokio::test]
async fn expired_transactions_disappear_from_statistics() {
    let (clock, app) = test_router();
    let (status, _) = send(
        &app,
        post_transaction(&json!({ "valor": 5.0, "dataHora": clock.now().to_rfc3339() })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    clock.advance(Duration::seconds(61));
    let (_, v) = send(&app, get("/estatistica")).await;
    assert_eq!(v["count"], json!(0));
}
