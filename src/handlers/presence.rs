//! 접속 현황 핸들러

use crate::error::AppResult;
use crate::protocol::{Ack, PlayerList, PresenceRequest};
use crate::state::AppState;
use super::decode_body;
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;

/// `GET /presence`
pub async fn list_presence(State(state): State<Arc<AppState>>) -> AppResult<Json<PlayerList>> {
    let players = state.presence.list_online().await?;
    Ok(Json(players.into_iter().collect()))
}

/// `POST /presence`
pub async fn post_presence(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> AppResult<Json<Ack>> {
    let request: PresenceRequest = decode_body(&body?)?;

    match request {
        PresenceRequest::Heartbeat(raw) => {
            state.presence.heartbeat(raw).await?;
        }
        PresenceRequest::Leave { player_id } => {
            state.presence.leave(&player_id).await?;
        }
    }
    Ok(Json(Ack::ok()))
}
