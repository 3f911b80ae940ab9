//! API endpoint integration tests

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use mona_agent::api::{ApiServerBuilder, TokenIssuer};
use mona_agent::replay::{ReplayConfig, ReplayService};
use mona_agent::monitor::SystemSample;
use mona_agent::{PersonaManager, SessionMonitor};
use tempfile::TempDir;
use tower::ServiceExt;

mod common;
use common::{livekit_config, persona_dir, utterance};

struct TestApp {
    router: Router,
    replay: Arc<ReplayService>,
    monitor: Arc<SessionMonitor>,
    personas_dir: TempDir,
}

/// Build a test API router over a temp personas directory
fn build_test_app(rate_limit: Option<u32>) -> TestApp {
    let dir = persona_dir();
    let personas = Arc::new(PersonaManager::new(dir.path()));
    let replay = Arc::new(ReplayService::new(ReplayConfig::default()));
    let monitor = Arc::new(SessionMonitor::new());
    let tokens = TokenIssuer::new(&livekit_config(), "rosalia").unwrap();

    let server = ApiServerBuilder::new(tokens, Arc::clone(&replay), personas, Arc::clone(&monitor), 0)
        .default_persona("rosalia")
        .rate_limit(rate_limit)
        .build();

    TestApp {
        router: server.router(),
        replay,
        monitor,
        personas_dir: dir,
    }
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = build_test_app(None);
    let (status, json) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_health_reports_busy_under_load() {
    let app = build_test_app(None);
    app.monitor.record_sample(SystemSample {
        cpu_percent: 40.0,
        memory_percent: 93.0,
        memory_available_mb: 256,
    });

    let (status, json) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["status"], "busy");

    let (_, json) = send(&app, get("/ready")).await;
    assert_eq!(json["monitor"]["status"], "critical");
    assert_eq!(json["monitor"]["system"]["peak_memory_percent"], 93.0);

    app.monitor.record_sample(SystemSample {
        cpu_percent: 40.0,
        memory_percent: 50.0,
        memory_available_mb: 2048,
    });
    let (status, json) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_ready_endpoint() {
    let app = build_test_app(None);
    let (status, json) = send(&app, get("/ready")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["checks"]["personas"]["status"], "ok");
    assert_eq!(json["checks"]["replay"]["status"], "ok");
    assert_eq!(json["monitor"]["status"], "healthy");
}

#[tokio::test]
async fn test_get_token_fills_defaults() {
    let app = build_test_app(None);
    let (status, json) = send(&app, post_json("/getToken", r#"{"user_id": "ana"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["url"], "wss://mona-test.livekit.cloud");
    assert_eq!(json["user_id"], "ana");
    assert_eq!(json["room"], mona_agent::api::room_name_for("ana"));
    assert_eq!(json["metadata"]["io_mode"], "hybrid");
    assert_eq!(json["metadata"]["persona_id"], "rosalia");
    assert_eq!(json["token"].as_str().unwrap().split('.').count(), 3);
}

#[tokio::test]
async fn test_get_token_invalid_json_is_rejected() {
    let app = build_test_app(None);
    let (status, json) = send(&app, post_json("/getToken", "{not json")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid JSON body");
    assert_eq!(app.monitor.health().rejected_requests, 1);
}

#[tokio::test]
async fn test_token_lifecycle() {
    let app = build_test_app(None);
    let body = r#"{"user_id": "luis", "io_mode": "voice", "persona_id": "lola"}"#;

    let (_, first) = send(&app, post_json("/getToken", body)).await;
    let (_, second) = send(&app, post_json("/getToken", body)).await;
    assert_eq!(first["token"], second["token"], "matching request reuses the token");
    assert_eq!(first["metadata"]["io_mode"], "voice");

    let (status, json) = send(&app, get("/userStatus?user_id=luis")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["active"], true);
    assert_eq!(json["session_info"]["room"], first["room"]);
    assert!(json["session_info"].get("token").is_none());

    let (_, json) = send(&app, post_json("/revokeToken", r#"{"user_id": "luis"}"#)).await;
    assert_eq!(json["success"], true);

    let (_, json) = send(&app, get("/userStatus?user_id=luis")).await;
    assert_eq!(json["active"], false);

    let (_, json) = send(&app, post_json("/revokeToken", r#"{"user_id": "luis"}"#)).await;
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_user_status_requires_user_id() {
    let app = build_test_app(None);
    let (status, _) = send(&app, get("/userStatus")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_replay_status_and_wav() {
    let app = build_test_app(None);

    let (status, json) = send(&app, get("/api/replay/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["phase"], "idle");
    assert_eq!(json["current_asset"]["valid"], false);

    let response = app
        .router
        .clone()
        .oneshot(get("/api/replay/last.wav"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.replay.capture(&utterance(1.0, "hola")).await;

    let response = app
        .router
        .clone()
        .oneshot(get("/api/replay/last.wav"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/wav");
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..4], b"RIFF");
    assert!(body.len() >= 44 + 32_000);
}

#[tokio::test]
async fn test_replay_clear() {
    let app = build_test_app(None);
    app.replay.capture(&utterance(1.0, "hola")).await;

    let request = Request::builder()
        .method("DELETE")
        .uri("/api/replay/last.wav")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(!app.replay.current_asset().await.is_valid());
}

#[tokio::test]
async fn test_personas_listing() {
    let app = build_test_app(None);
    let (status, json) = send(&app, get("/api/personas")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["default_id"], "rosalia");
    let ids: Vec<&str> = json["personas"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|p| p["id"].as_str())
        .collect();
    assert_eq!(ids, ["lola", "rosalia"]);
}

#[tokio::test]
async fn test_persona_lookup() {
    let app = build_test_app(None);

    let (status, json) = send(&app, get("/api/personas/lola")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "Lola");
    assert_eq!(json["voice_id"], "es-lola");

    let (status, _) = send(&app, get("/api/personas/nadie")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_persona_reload_picks_up_edits() {
    let app = build_test_app(None);
    let (_, json) = send(&app, get("/api/personas/lola")).await;
    assert_eq!(json["name"], "Lola");

    std::fs::write(
        app.personas_dir.path().join("lola.json"),
        r#"{"name": "Lola Flores", "voice_id": "es-lola-2", "instructions": "Eres Lola, ahora más tranquila."}"#,
    )
    .unwrap();

    let (status, json) = send(&app, post_json("/api/personas/lola/reload", "")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "Lola Flores");
    assert_eq!(json["voice_id"], "es-lola-2");

    std::fs::write(
        app.personas_dir.path().join("lola.json"),
        r#"{"name": "", "voice_id": "v", "instructions": "demasiado corto"}"#,
    )
    .unwrap();
    let (status, _) = send(&app, post_json("/api/personas/lola/reload", "")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_rate_limit_rejects_burst() {
    let app = build_test_app(Some(2));

    assert_eq!(send(&app, get("/health")).await.0, StatusCode::OK);
    assert_eq!(send(&app, get("/health")).await.0, StatusCode::OK);
    let (status, _) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(app.monitor.health().rejected_requests, 1);
}
