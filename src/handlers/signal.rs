//! WebRTC 시그널링 핸들러

use crate::error::AppResult;
use crate::protocol::{Ack, RoomEnvelope, SignalQuery, SignalRequest};
use crate::state::AppState;
use super::decode_body;
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{Query, State};
use axum::Json;
use std::sync::Arc;

/// `GET /signal?room=XXXXXX`
pub async fn get_signal(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SignalQuery>,
) -> AppResult<Json<RoomEnvelope>> {
    let room = state.signaling.get_room(&query.room).await?;
    Ok(Json(RoomEnvelope { data: room.into() }))
}

/// `POST /signal`
pub async fn post_signal(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> AppResult<Json<Ack>> {
    let request: SignalRequest = decode_body(&body?)?;

    match request {
        SignalRequest::Offer(offer) => {
            let code = state
                .signaling
                .create_offer(offer.room.as_deref(), offer.sdp)
                .await?;
            Ok(Json(Ack::with_room(code.as_str())))
        }
        SignalRequest::Answer(answer) => {
            let room = answer.room.unwrap_or_default();
            state.signaling.submit_answer(&room, answer.sdp).await?;
            Ok(Json(Ack::ok()))
        }
    }
}
