//! HTTP 요청/응답 메시지 정의

use crate::presence::{PresenceRecord, RawPresence};
use crate::signaling::SignalingRoom;
use crate::store::Stamped;
use serde::{Deserialize, Serialize};

/// `POST /presence`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum PresenceRequest {
    Heartbeat(RawPresence),
    Leave {
        #[serde(default)]
        player_id: String,
    },
}

/// `POST /signal`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "lowercase")]
pub enum SignalRequest {
    Offer(SdpPayload),
    Answer(SdpPayload),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SdpPayload {
    pub room: Option<String>,
    pub sdp: String,
}

/// `GET /signal?room=`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SignalQuery {
    pub room: String,
}

/// 성공 응답
#[derive(Debug, Clone, Serialize)]
pub struct Ack {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

impl Ack {
    pub fn ok() -> Self {
        Self {
            success: true,
            room: None,
        }
    }

    pub fn with_room(room: impl Into<String>) -> Self {
        Self {
            success: true,
            room: Some(room.into()),
        }
    }
}

/// 공개 접속 현황 형식
#[derive(Debug, Clone, Serialize)]
pub struct PlayerView {
    #[serde(flatten)]
    pub record: PresenceRecord,
    pub last_heartbeat: u64,
}

impl From<Stamped<PresenceRecord>> for PlayerView {
    fn from(stamped: Stamped<PresenceRecord>) -> Self {
        Self {
            record: stamped.value,
            last_heartbeat: stamped.touched_at,
        }
    }
}

/// `GET /presence` 응답
#[derive(Debug, Clone, Serialize)]
pub struct PlayerList {
    pub players: Vec<PlayerView>,
    pub count: usize,
}

impl FromIterator<Stamped<PresenceRecord>> for PlayerList {
    fn from_iter<I: IntoIterator<Item = Stamped<PresenceRecord>>>(iter: I) -> Self {
        let players: Vec<PlayerView> = iter.into_iter().map(PlayerView::from).collect();
        Self {
            count: players.len(),
            players,
        }
    }
}

/// 방 상태. 클라이언트는 `answer`가 채워질 때까지 폴링한다.
#[derive(Debug, Clone, Serialize)]
pub struct RoomView {
    pub room: String,
    pub offer: String,
    pub answer: Option<String>,
    pub created_at: u64,
    pub matched: bool,
}

impl From<Stamped<SignalingRoom>> for RoomView {
    fn from(stamped: Stamped<SignalingRoom>) -> Self {
        let matched = stamped.value.is_matched();
        Self {
            room: stamped.key,
            offer: stamped.value.offer_sdp,
            answer: stamped.value.answer_sdp,
            created_at: stamped.touched_at,
            matched,
        }
    }
}

/// `GET /signal` 응답
#[derive(Debug, Clone, Serialize)]
pub struct RoomEnvelope {
    pub data: RoomView,
}
