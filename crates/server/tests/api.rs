use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use relay::{Authenticator, DryRunBackend, Relay};
use serde_json::{Value, json};
use server::{AppState, create_app};
use storage::NullStore;
use tower::ServiceExt;

const AGENT_KEY: &str = "agent-key";
const LEGACY_TOKEN: &str = "legacy-token";

fn app() -> Router {
    let relay = Relay::new(
        Arc::new(NullStore),
        Arc::new(DryRunBackend),
        Authenticator::new(AGENT_KEY).with_legacy_mentor(LEGACY_TOKEN, "LEGACY1"),
        Duration::from_secs(1),
    );
    create_app(AppState::new(Arc::new(relay)))
}

fn request(method: &str, uri: &str, headers: &[(&str, &str)], body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn register_mentor(app: &Router, name: &str, email: &str) -> String {
    let (status, body) = call(
        app,
        request(
            "POST",
            "/api/mentors/register",
            &[],
            Some(json!({"name": name, "email": email})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["mentor_id"].as_str().unwrap().to_string()
}

async fn issue_license(app: &Router, mentor_id: &str, ea_id: &str) -> String {
    let (status, body) = call(
        app,
        request(
            "POST",
            "/api/licenses",
            &[("x-mentor-id", mentor_id)],
            Some(json!({"ea_id": ea_id})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["license"]["key"].as_str().unwrap().to_string()
}

fn student_body(key: &str) -> Value {
    json!({
        "license_key": key,
        "login": "5012345",
        "password": "hunter2",
        "server": "Broker-Demo",
        "lot_size": 0.05
    })
}

#[tokio::test]
async fn health_reports_ok() {
    let (status, body) = call(&app(), request("GET", "/health", &[], None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn mentor_registration_and_verification() {
    let app = app();
    let mentor_id = register_mentor(&app, "Ana", "ana@example.com").await;
    assert_eq!(mentor_id.len(), 6);

    let (status, body) = call(
        &app,
        request(
            "POST",
            "/api/mentors/register",
            &[],
            Some(json!({"name": "Ana", "email": "ANA@example.com"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["already_registered"], true);
    assert_eq!(body["mentor_id"], mentor_id.as_str());

    let (status, body) = call(
        &app,
        request("GET", "/api/mentors/verify", &[("x-mentor-id", mentor_id.as_str())], None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["mentor"]["email"], "ana@example.com");

    let (status, body) = call(
        &app,
        request("GET", "/api/mentors/verify", &[("x-mentor-id", "000000")], None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = call(&app, request("GET", "/api/mentors/verify", &[], None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, body) = call(
        &app,
        request("POST", "/api/mentors/register", &[], Some(json!({"email": "x"}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"], json!(["name", "email"]));
}

#[tokio::test]
async fn license_lifecycle_is_scoped_by_mentor() {
    let app = app();
    let m1 = register_mentor(&app, "One", "one@example.com").await;
    let m2 = register_mentor(&app, "Two", "two@example.com").await;
    let key = issue_license(&app, &m1, "EA1").await;

    let (status, body) = call(
        &app,
        request("GET", &format!("/api/licenses/{}/validate", key), &[], None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["reason"], "valid");
    assert_eq!(body["license"]["ea_id"], "EA1");

    let deactivate = format!("/api/licenses/{}/deactivate", key);
    let (status, body) = call(&app, request("POST", &deactivate, &[("x-mentor-id", m2.as_str())], None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, _) = call(&app, request("POST", &deactivate, &[("x-mentor-id", m1.as_str())], None)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = call(&app, request("POST", &deactivate, &[("x-mentor-id", m1.as_str())], None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["license"]["active"], false);

    let (_, body) = call(
        &app,
        request("GET", &format!("/api/licenses/{}/validate", key), &[], None),
    )
    .await;
    assert_eq!(body["valid"], false);
    assert_eq!(body["reason"], "inactive");

    let (_, body) = call(&app, request("GET", "/api/licenses", &[("x-mentor-id", m2.as_str())], None)).await;
    assert_eq!(body["count"], 0);
    let (_, body) = call(&app, request("GET", "/api/licenses", &[("x-mentor-id", m1.as_str())], None)).await;
    assert_eq!(body["count"], 1);

    let (status, body) = call(
        &app,
        request(
            "POST",
            "/api/licenses/AB-AAAA-BBBB/deactivate",
            &[("x-mentor-id", m1.as_str())],
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn validation_reasons_for_unknown_keys() {
    let app = app();
    let (status, body) = call(&app, request("GET", "/api/licenses/nope/validate", &[], None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "valid": false, "reason": "invalid_format"}));

    let (_, body) = call(
        &app,
        request("GET", "/api/licenses/AB-AAAA-BBBB/validate", &[], None),
    )
    .await;
    assert_eq!(body["reason"], "not_found");
}

#[tokio::test]
async fn credentials_are_checked() {
    let app = app();
    let body = Some(json!({"ea_id": "EA1"}));

    let (status, _) = call(&app, request("POST", "/api/licenses", &[], body.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(
        &app,
        request(
            "POST",
            "/api/licenses",
            &[("authorization", "Bearer wrong")],
            body.clone(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, resp) = call(
        &app,
        request(
            "POST",
            "/api/licenses",
            &[("authorization", "Bearer legacy-token")],
            body.clone(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(resp["license"]["mentor_id"], "LEGACY1");
    assert!(resp["license"]["key"].as_str().unwrap().starts_with("LEGACY1-"));

    // A valid credential for the wrong capability.
    let (status, _) = call(
        &app,
        request("POST", "/api/licenses", &[("x-agent-key", AGENT_KEY)], body),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signals_round_trip_through_http() {
    let app = app();
    let mentor = register_mentor(&app, "Ana", "ana@example.com").await;
    let auth = [("x-mentor-id", mentor.as_str())];

    let (status, body) = call(
        &app,
        request(
            "POST",
            "/api/signals",
            &auth,
            Some(json!({"direction": "buy", "take_profit": 1.1})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["fields"], json!(["symbol", "stop_loss"]));

    let mut ids = Vec::new();
    for (symbol, ea) in [("eurusd", "EA1"), ("gbpusd", "EA2"), ("xauusd", "EA1")] {
        let (status, body) = call(
            &app,
            request(
                "POST",
                "/api/signals",
                &auth,
                Some(json!({"ea_id": ea, "direction": "sell", "symbol": symbol, "sl": 2.0, "tp": 1.0})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["signal"]["direction"], "SELL");
        assert_eq!(body["signal"]["mentor_id"], mentor.as_str());
        ids.push(body["signal"]["id"].as_str().unwrap().to_string());
    }

    let (_, body) = call(&app, request("GET", "/api/signals?limit=2", &[], None)).await;
    assert_eq!(body["count"], 2);
    assert_eq!(body["signals"][0]["symbol"], "XAUUSD");
    assert_eq!(body["signals"][1]["symbol"], "GBPUSD");

    let (_, body) = call(
        &app,
        request("GET", &format!("/api/signals?since={}", ids[0]), &[], None),
    )
    .await;
    assert_eq!(body["count"], 2);

    let (_, body) = call(&app, request("GET", "/api/signals/ea/EA1", &[], None)).await;
    assert_eq!(body["count"], 2);

    let (status, body) = call(&app, request("GET", "/api/signals?limit=many", &[], None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"], json!(["query"]));
}

#[tokio::test]
async fn malformed_body_is_a_validation_error() {
    let app = app();
    let req = Request::builder()
        .method("POST")
        .uri("/api/mentors/register")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["fields"], json!(["body"]));
}

#[tokio::test]
async fn student_enrollment_and_agent_heartbeats() {
    let app = app();
    let mentor = register_mentor(&app, "Ana", "ana@example.com").await;
    let key = issue_license(&app, &mentor, "EA1").await;

    let (status, body) = call(
        &app,
        request("POST", "/api/students/register", &[], Some(student_body(&key))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["student"]["status"], "active");
    assert_eq!(body["student"]["connected"], false);
    assert!(!body.to_string().contains("hunter2"));

    let (status, body) = call(
        &app,
        request("POST", "/api/students/register", &[], Some(student_body(&key))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, _) = call(
        &app,
        request("GET", "/api/agent/students", &[("x-agent-key", "wrong")], None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let agent = [("x-agent-key", AGENT_KEY)];
    let (status, body) = call(
        &app,
        request(
            "GET",
            &format!("/api/agent/students?mentor_id={}", mentor),
            &agent,
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    let (status, body) = call(
        &app,
        request(
            "POST",
            "/api/agent/heartbeat",
            &agent,
            Some(json!({"license_key": key, "connected": true})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["student"]["connected"], true);

    let (_, body) = call(
        &app,
        request("GET", &format!("/api/students/{}/status", key), &[], None),
    )
    .await;
    assert_eq!(body["student"]["connected"], true);

    let (status, body) = call(
        &app,
        request(
            "POST",
            "/api/agent/heartbeat",
            &agent,
            Some(json!({"license_key": key})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"], json!(["connected"]));

    let (status, _) = call(
        &app,
        request(
            "POST",
            "/api/agent/heartbeat",
            &[],
            Some(json!({"license_key": key, "connected": true})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, body) = call(
        &app,
        request("POST", &format!("/api/students/{}/stop", key), &[], None),
    )
    .await;
    assert_eq!(body["student"]["status"], "stopped");
    let (_, body) = call(&app, request("GET", "/api/agent/students", &agent, None)).await;
    assert_eq!(body["count"], 0);

    let (status, _) = call(
        &app,
        request("POST", "/api/students/AB-AAAA-BBBB/start", &[], None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn student_registration_needs_a_license_key() {
    let (status, body) = call(
        &app(),
        request(
            "POST",
            "/api/students/register",
            &[],
            Some(json!({"login": "1", "password": "p", "server": "s"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"], json!(["license_key"]));
}

#[tokio::test]
async fn legacy_mentor_id_is_reserved() {
    let app = app();
    let (status, body) = call(
        &app,
        request(
            "POST",
            "/api/mentors/register",
            &[],
            Some(json!({"name": "Eve", "email": "eve@example.com", "mentor_id": "LEGACY1"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ne!(body["mentor_id"], "LEGACY1");

    let (status, _) = call(
        &app,
        request("GET", "/api/licenses", &[("x-mentor-id", "LEGACY1")], None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn deactivated_license_leaves_the_agent_roster() {
    let app = app();
    let mentor = register_mentor(&app, "Ana", "ana@example.com").await;
    let key = issue_license(&app, &mentor, "EA1").await;
    let (status, _) = call(
        &app,
        request(
            "POST",
            "/api/students/register",
            &[],
            Some(json!({
                "license_key": key,
                "login": "5001",
                "password": "pw",
                "server": "Demo"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let roster_uri = format!("/api/agent/students?mentor_id={}", mentor);
    let (_, body) = call(
        &app,
        request("GET", &roster_uri, &[("x-agent-key", AGENT_KEY)], None),
    )
    .await;
    assert_eq!(body["students"].as_array().unwrap().len(), 1);

    let (status, _) = call(
        &app,
        request(
            "POST",
            &format!("/api/licenses/{}/deactivate", key),
            &[("x-mentor-id", mentor.as_str())],
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        &app,
        request("GET", &roster_uri, &[("x-agent-key", AGENT_KEY)], None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["students"].as_array().unwrap().is_empty());
}
