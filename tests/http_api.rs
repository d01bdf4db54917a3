use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use lobby_relay::config::{Config, StoreBackend};
use lobby_relay::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt; // for `oneshot`

fn app_with(config: Config) -> Router {
    build_router(Arc::new(AppState::in_memory(config)))
}

fn app() -> Router {
    app_with(Config::default())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn presence_heartbeat_list_leave() {
    let app = app();

    for (id, status) in [("alice", "lobby"), ("bob", "playing")] {
        let (code, body) = send(
            &app,
            post(
                "/presence",
                json!({
                    "action": "heartbeat",
                    "player_id": id,
                    "player_name": id.to_uppercase(),
                    "game": "chess",
                    "status": status,
                    "room_code": "abc123",
                    "joinable": true
                }),
            ),
        )
        .await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body, json!({ "success": true }));
    }

    let (code, body) = send(&app, get("/presence")).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["count"], 2);
    let players = body["players"].as_array().unwrap();
    let alice = players
        .iter()
        .find(|p| p["player_id"] == "alice")
        .unwrap();
    assert_eq!(alice["name"], "ALICE");
    assert_eq!(alice["room_code"], "ABC123");
    assert_eq!(alice["joinable"], true);
    assert!(alice["last_heartbeat"].as_u64().unwrap() > 0);

    let (code, body) = send(
        &app,
        post("/presence", json!({ "action": "leave", "player_id": "alice" })),
    )
    .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (_, body) = send(&app, get("/presence")).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["players"][0]["player_id"], "bob");
}

#[tokio::test]
async fn presence_missing_player_id() {
    let app = app();
    let (code, body) = send(
        &app,
        post("/presence", json!({ "action": "heartbeat", "player_name": "x" })),
    )
    .await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing player_id");
    assert_eq!(body["code"], "validation");
}

#[tokio::test]
async fn presence_leave_unknown_is_success() {
    let app = app();
    let (code, body) = send(
        &app,
        post("/presence", json!({ "action": "leave", "player_id": "nobody" })),
    )
    .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn malformed_bodies_are_validation_errors() {
    let app = app();
    let (code, body) = send(&app, post("/presence", json!({ "action": "explode" }))).await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/signal")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (code, body) = send(&app, request).await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation");
}

#[tokio::test]
async fn plain_text_json_bodies_are_accepted() {
    let app = app();
    let text_post = |uri: &str, body: Value| {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "text/plain;charset=UTF-8")
            .body(Body::from(body.to_string()))
            .unwrap()
    };

    let (code, body) = send(
        &app,
        text_post("/presence", json!({ "action": "heartbeat", "player_id": "p1" })),
    )
    .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (code, _) = send(
        &app,
        text_post(
            "/signal",
            json!({ "action": "offer", "data": { "room": "ABC123", "sdp": "s1" } }),
        ),
    )
    .await;
    assert_eq!(code, StatusCode::OK);

    let no_type = Request::builder()
        .method(Method::POST)
        .uri("/presence")
        .body(Body::from(json!({ "action": "leave", "player_id": "p1" }).to_string()))
        .unwrap();
    let (code, _) = send(&app, no_type).await;
    assert_eq!(code, StatusCode::OK);

    let (_, body) = send(&app, get("/presence")).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn signaling_offer_answer_poll() {
    let app = app();

    let (code, body) = send(
        &app,
        post(
            "/signal",
            json!({ "action": "offer", "data": { "room": "abc123", "sdp": "offer-sdp" } }),
        ),
    )
    .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "room": "ABC123" }));

    let (code, body) = send(&app, get("/signal?room=ABC123")).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["data"]["offer"], "offer-sdp");
    assert!(body["data"]["answer"].is_null());
    assert_eq!(body["data"]["matched"], false);

    let (code, body) = send(
        &app,
        post(
            "/signal",
            json!({ "action": "answer", "data": { "room": "ABC123", "sdp": "answer-sdp" } }),
        ),
    )
    .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));

    let (_, body) = send(&app, get("/signal?room=abc123")).await;
    assert_eq!(body["data"]["answer"], "answer-sdp");
    assert_eq!(body["data"]["matched"], true);
    assert_eq!(body["data"]["room"], "ABC123");
}

#[tokio::test]
async fn signaling_errors_are_distinguishable() {
    let app = app();

    let (code, body) = send(&app, get("/signal?room=ZZZ999")).await;
    assert_eq!(code, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Room not found");
    assert!(body.get("data").is_some_and(Value::is_null));

    let (code, body) = send(&app, get("/signal?room=short")).await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid room code");

    let (code, body) = send(&app, get("/signal")).await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid room code");

    let (code, body) = send(
        &app,
        post(
            "/signal",
            json!({ "action": "answer", "data": { "room": "QQQ111", "sdp": "x" } }),
        ),
    )
    .await;
    assert_eq!(code, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    // answer가 방을 만들지 않았는지 확인
    let (code, _) = send(&app, get("/signal?room=QQQ111")).await;
    assert_eq!(code, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn offer_without_room_gets_generated_code() {
    let app = app();
    let (code, body) = send(
        &app,
        post("/signal", json!({ "action": "offer", "data": { "sdp": "v=0" } })),
    )
    .await;
    assert_eq!(code, StatusCode::OK);
    let room = body["room"].as_str().unwrap().to_string();
    assert_eq!(room.len(), 6);

    let (code, body) = send(&app, get(&format!("/signal?room={room}"))).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["data"]["offer"], "v=0");
}

#[tokio::test]
async fn strict_mode_reports_conflicts() {
    let mut config = Config::default();
    config.signaling.strict = true;
    let app = app_with(config);

    let offer = json!({ "action": "offer", "data": { "room": "ABC123", "sdp": "s1" } });
    let (code, _) = send(&app, post("/signal", offer.clone())).await;
    assert_eq!(code, StatusCode::OK);
    let (code, body) = send(&app, post("/signal", offer)).await;
    assert_eq!(code, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");
}

#[tokio::test]
async fn cors_preflight_is_accepted() {
    let app = app();
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/presence")
        .header(header::ORIGIN, "https://game.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(response.status().is_success());
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let mut config = Config::default();
    config.max_body_bytes = 1024;
    let app = app_with(config);

    let offer = json!({ "action": "offer", "data": { "room": "ABC123", "sdp": "x".repeat(4096) } });
    let response = app.oneshot(post("/signal", offer)).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn health_reports_counts() {
    let app = app();
    send(
        &app,
        post("/presence", json!({ "action": "heartbeat", "player_id": "p1" })),
    )
    .await;

    let (code, body) = send(&app, get("/health")).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["players"], 1);
    assert_eq!(body["rooms"], 0);
}

#[tokio::test]
async fn file_backend_serves_same_contract() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.store.backend = StoreBackend::File;
    config.store.dir = dir.path().to_path_buf();
    let app = build_router(Arc::new(AppState::open(config).await.unwrap()));

    let (code, _) = send(
        &app,
        post("/presence", json!({ "action": "heartbeat", "player_id": "p1" })),
    )
    .await;
    assert_eq!(code, StatusCode::OK);
    assert!(dir.path().join("presence").join("p1.json").exists());

    send(
        &app,
        post(
            "/signal",
            json!({ "action": "offer", "data": { "room": "ABC123", "sdp": "s1" } }),
        ),
    )
    .await;
    send(
        &app,
        post(
            "/signal",
            json!({ "action": "answer", "data": { "room": "ABC123", "sdp": "s2" } }),
        ),
    )
    .await;
    let (_, body) = send(&app, get("/signal?room=ABC123")).await;
    assert_eq!(body["data"]["answer"], "s2");
}

#[tokio::test]
async fn storage_fault_maps_to_503() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.store.backend = StoreBackend::File;
    config.store.dir = dir.path().to_path_buf();
    let app = build_router(Arc::new(AppState::open(config).await.unwrap()));
    tokio::fs::remove_dir_all(dir.path().join("presence"))
        .await
        .unwrap();

    let (code, body) = send(
        &app,
        post("/presence", json!({ "action": "heartbeat", "player_id": "p1" })),
    )
    .await;
    assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "storage");

    // 다른 네임스페이스는 영향받지 않는다
    let (code, _) = send(
        &app,
        post(
            "/signal",
            json!({ "action": "offer", "data": { "room": "ABC123", "sdp": "s1" } }),
        ),
    )
    .await;
    assert_eq!(code, StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn presence_expires_after_window() {
    let app = app();
    send(
        &app,
        post("/presence", json!({ "action": "heartbeat", "player_id": "p1" })),
    )
    .await;
    tokio::time::advance(Duration::from_secs(31)).await;

    let (_, body) = send(&app, get("/presence")).await;
    assert_eq!(body["count"], 0);
}
