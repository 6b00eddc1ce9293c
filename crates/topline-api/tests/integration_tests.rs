//! # Integration Tests for topline-api
//!
//! Exercises the command gateway end to end without a database: probe
//! endpoints, CQRS boundary enforcement, authentication, validation
//! responses, audit recording policy, idempotent replay, rate limiting,
//! and degraded-mode behavior.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use tower::ServiceExt;

use topline_api::audit::MemoryAuditSink;
use topline_api::auth::Claims;
use topline_api::state::{AppConfig, AppState, SecretString};
use topline_core::CommandResult;
use uuid::Uuid;

const SECRET: &str = "integration-test-secret";

/// Helper: build the test app with auth disabled and no database.
fn test_app() -> axum::Router {
    topline_api::app(AppState::new())
}

/// Helper: build the test app with auth enabled.
fn test_app_with_auth() -> axum::Router {
    let config = AppConfig {
        jwt_secret: Some(SecretString::new(SECRET)),
        ..AppConfig::default()
    };
    topline_api::app(AppState::with_config(config, None))
}

/// Helper: build the test app sharing its audit sink with the test.
fn test_app_with_sink() -> (axum::Router, Arc<MemoryAuditSink>, AppState) {
    let sink = Arc::new(MemoryAuditSink::new());
    let state = AppState::with_audit_sink(AppConfig::default(), None, sink.clone());
    (topline_api::app(state.clone()), sink, state)
}

/// Helper: a signed bearer token expiring in one hour.
fn bearer_token() -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: 42,
        email: "op@plant.example".to_string(),
        roles: vec!["operator".to_string()],
        iat: now,
        exp: now + 3600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

/// Helper: read response body as JSON.
async fn body_json(response: axum::http::Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Helper: a JSON command request.
fn command_request(method: &str, resource: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(format!("/api/command/{resource}"))
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// Poll until the predicate holds or a deadline passes.
async fn wait_for(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within deadline");
}

// -- Probes -------------------------------------------------------------------

#[tokio::test]
async fn test_health_probe_reports_database_state() {
    let app = test_app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "Topline Command Service");
    assert_eq!(body["database"], "disconnected");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_info_returns_static_metadata() {
    let app = test_app();
    let response = app
        .oneshot(Request::builder().uri("/info").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["service"], "Topline Command Service");
    assert_eq!(body["version"], "2.0.0");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!(body["paths"].is_object());
}

// -- CQRS boundary ------------------------------------------------------------

#[tokio::test]
async fn test_read_method_is_redirected_to_query_service() {
    let (app, sink, _state) = test_app_with_sink();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/command/production")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        response.headers().get("allow").unwrap(),
        "POST, PUT, PATCH, DELETE"
    );

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "USE_QUERY_SERVICE");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("http://localhost:2025"));

    // The dispatcher was never invoked: nothing was audited.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(sink.entries().is_empty());
}

#[tokio::test]
async fn test_stray_read_path_still_gets_query_pointer() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/production/list")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "USE_QUERY_SERVICE");
}

#[tokio::test]
async fn test_unknown_write_path_is_404() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/nowhere")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_unknown_resource_is_404() {
    let app = test_app();
    let response = app
        .oneshot(command_request("POST", "shipping", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert!(body["error"]["message"].as_str().unwrap().contains("shipping"));
}

// -- Authentication -----------------------------------------------------------

#[tokio::test]
async fn test_command_without_token_is_401() {
    let app = test_app_with_auth();
    let response = app
        .oneshot(command_request(
            "POST",
            "production",
            serde_json::json!({"lot_number": "LOT-1", "part_number": "P-1", "quantity": 5.0}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_expired_token_is_401() {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: 42,
        email: "op@plant.example".to_string(),
        roles: vec![],
        iat: now - 7200,
        exp: now - 3600,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    let app = test_app_with_auth();
    let mut request = command_request("POST", "production", serde_json::json!({}));
    request.headers_mut().insert(
        "authorization",
        format!("Bearer {token}").parse().unwrap(),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_valid_token_reaches_pipeline() {
    // With a valid token and no database, a well-formed command gets
    // past auth and validation and fails at dispatch with 503.
    let app = test_app_with_auth();
    let mut request = command_request(
        "POST",
        "warehouse",
        serde_json::json!({
            "part_number": "X1",
            "stock_type": "fg",
            "adjustment_quantity": 5.0,
            "reason": "cycle count"
        }),
    );
    request.headers_mut().insert(
        "authorization",
        format!("Bearer {}", bearer_token()).parse().unwrap(),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// -- Validation ---------------------------------------------------------------

#[tokio::test]
async fn test_validation_lists_every_violated_field() {
    let (app, sink, _state) = test_app_with_sink();
    let response = app
        .oneshot(command_request("POST", "inventory", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    assert_eq!(body["status"], "rejected");
    assert_eq!(body["error"]["kind"], "validation");

    let violations = body["error"]["violations"].as_array().unwrap();
    let fields: Vec<&str> = violations
        .iter()
        .map(|v| v["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"part_number"));
    assert!(fields.contains(&"source_location"));
    assert!(fields.contains(&"dest_location"));
    assert!(fields.contains(&"quantity"));

    // The rejected attempt is audited.
    wait_for(|| sink.entries().len() == 1).await;
    let entry = &sink.entries()[0];
    assert_eq!(entry.status, "rejected");
    assert_eq!(entry.action, "POST /api/command/inventory");
}

#[tokio::test]
async fn test_delete_relaxes_validation_to_identifying_fields() {
    let app = test_app();
    let response = app
        .oneshot(command_request("DELETE", "inventory", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    let violations = body["error"]["violations"].as_array().unwrap();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0]["field"], "movement_number");
}

#[tokio::test]
async fn test_malformed_json_body_is_400() {
    let app = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/api/command/production")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

// -- Audit policy -------------------------------------------------------------

#[tokio::test]
async fn test_pre_auth_rejections_are_not_audited() {
    let sink = Arc::new(MemoryAuditSink::new());
    let config = AppConfig {
        jwt_secret: Some(SecretString::new(SECRET)),
        ..AppConfig::default()
    };
    let state = AppState::with_audit_sink(config, None, sink.clone());
    let app = topline_api::app(state);

    let response = app
        .oneshot(command_request(
            "POST",
            "production",
            serde_json::json!({"lot_number": "LOT-1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // No caller identity to attribute: nothing recorded.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(sink.entries().is_empty());
}

#[tokio::test]
async fn test_each_accepted_command_is_audited_exactly_once() {
    let (app, sink, _state) = test_app_with_sink();

    // One invalid command, one valid-but-undeliverable command.
    let _ = app
        .clone()
        .oneshot(command_request("POST", "inventory", serde_json::json!({})))
        .await
        .unwrap();
    let _ = app
        .oneshot(command_request(
            "POST",
            "warehouse",
            serde_json::json!({
                "part_number": "X1",
                "stock_type": "fg",
                "adjustment_quantity": -2.0,
                "reason": "damage write-off"
            }),
        ))
        .await
        .unwrap();

    wait_for(|| sink.entries().len() == 2).await;
    let statuses: Vec<String> = sink.entries().iter().map(|e| e.status.clone()).collect();
    assert!(statuses.contains(&"rejected".to_string()));
    assert!(statuses.contains(&"failed".to_string()));
}

// -- Degraded mode ------------------------------------------------------------

#[tokio::test]
async fn test_valid_command_without_database_is_503() {
    let (app, sink, _state) = test_app_with_sink();
    let response = app
        .oneshot(command_request(
            "POST",
            "warehouse",
            serde_json::json!({
                "part_number": "X1",
                "stock_type": "wip",
                "adjustment_quantity": 3.0,
                "reason": "found during count"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = body_json(response).await;
    assert_eq!(body["status"], "failed");
    assert_eq!(body["error"]["kind"], "unavailable");

    wait_for(|| sink.entries().len() == 1).await;
    assert_eq!(sink.entries()[0].status, "failed");
}

// -- Idempotency --------------------------------------------------------------

#[tokio::test]
async fn test_idempotent_replay_returns_cached_result() {
    let (app, sink, state) = test_app_with_sink();

    // A prior attempt committed; its result is cached for the dev
    // identity (auth disabled → caller id 0).
    let resource_id = Uuid::new_v4();
    state
        .idempotency
        .insert((0, "replay-1".to_string()), CommandResult::success(resource_id));

    let mut request = command_request(
        "POST",
        "warehouse",
        serde_json::json!({
            "part_number": "X1",
            "stock_type": "fg",
            "adjustment_quantity": 5.0,
            "reason": "cycle count"
        }),
    );
    request
        .headers_mut()
        .insert("idempotency-key", "replay-1".parse().unwrap());

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["resource_id"], resource_id.to_string());

    // The replayed attempt is audited with the cached disposition.
    wait_for(|| sink.entries().len() == 1).await;
    assert_eq!(sink.entries()[0].status, "committed");
}

// -- Rate limiting ------------------------------------------------------------

#[tokio::test]
async fn test_rate_limit_rejects_beyond_threshold() {
    let config = AppConfig {
        rate_limit_max_requests: 1,
        ..AppConfig::default()
    };
    let app = topline_api::app(AppState::with_config(config, None));

    let first = app
        .clone()
        .oneshot(command_request("POST", "inventory", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let second = app
        .oneshot(command_request("POST", "inventory", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

    let body = body_json(second).await;
    assert_eq!(body["error"]["code"], "RATE_LIMITED");
}
