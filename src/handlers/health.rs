//! 상태 확인 핸들러

use crate::state::AppState;
use axum::extract::State;
use axum::response::{Html, Json};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub async fn index_handler() -> Html<&'static str> {
    Html(
        "<h1>Lobby Relay</h1>\
         <p>Presence: GET/POST /presence</p>\
         <p>Signaling: GET/POST /signal</p>",
    )
}

/// 저장소 장애 시에도 200을 돌려주되 카운트는 `null`로 표시한다.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let players = state
        .presence
        .list_online()
        .await
        .map(|players| players.len())
        .ok();
    let rooms = state.signaling.live_rooms().await.ok();

    Json(serde_json::json!({
        "status": "ok",
        "server": "lobby-relay",
        "timestamp": SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0),
        "players": players,
        "rooms": rooms,
    }))
}
