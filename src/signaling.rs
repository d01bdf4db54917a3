//! WebRTC offer/answer 중계
//!
//! 방 상태: `ABSENT → OFFERED → MATCHED → EXPIRED`.
//! SDP 내용은 해석하지 않고 그대로 전달한다. 방은 생성 후 TTL(기본 300초)이
//! 지나면 answer 여부와 관계없이 사라진다.

use crate::error::{AppError, AppResult};
use crate::store::{bounded, Modify, Stamped, StoreResult, TtlStore};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

const ROOM_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const GENERATE_ATTEMPTS: usize = 8;

/// 6자리 대문자 영숫자 방 코드
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomCode(String);

impl RoomCode {
    pub const LEN: usize = 6;

    /// 대문자로 바꾼 뒤 `^[A-Z0-9]{6}$` 형식을 검사한다.
    pub fn parse(raw: &str) -> AppResult<Self> {
        let code = raw.to_ascii_uppercase();
        let valid = code.len() == Self::LEN
            && code
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
        if valid {
            Ok(Self(code))
        } else {
            Err(AppError::validation("Invalid room code"))
        }
    }

    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let code = (0..Self::LEN)
            .map(|_| ROOM_CODE_CHARSET[rng.gen_range(0..ROOM_CODE_CHARSET.len())] as char)
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 방 하나의 handshake 슬롯. 생성 시각은 저장소 타임스탬프를 쓴다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalingRoom {
    pub offer_sdp: String,
    pub answer_sdp: Option<String>,
}

impl SignalingRoom {
    pub fn is_matched(&self) -> bool {
        self.answer_sdp.is_some()
    }
}

/// 시그널링 중계기
pub struct SignalingRelay {
    store: Arc<dyn TtlStore<SignalingRoom>>,
    ttl: Duration,
    timeout: Duration,
    strict: bool,
}

impl SignalingRelay {
    pub fn new(store: Arc<dyn TtlStore<SignalingRoom>>, ttl: Duration, timeout: Duration) -> Self {
        Self {
            store,
            ttl,
            timeout,
            strict: false,
        }
    }

    /// 살아있는 방 덮어쓰기와 두 번째 answer를 거부한다.
    pub fn strict(mut self, enabled: bool) -> Self {
        self.strict = enabled;
        self
    }

    /// 방을 생성한다. 코드를 생략하면 서버가 발급한다.
    pub async fn create_offer(&self, room: Option<&str>, sdp: String) -> AppResult<RoomCode> {
        if sdp.is_empty() {
            return Err(AppError::validation("Missing sdp"));
        }

        let Some(raw) = room else {
            return self.create_with_generated_code(sdp).await;
        };

        let code = RoomCode::parse(raw)?;
        let room = SignalingRoom {
            offer_sdp: sdp,
            answer_sdp: None,
        };

        if self.strict {
            let inserted =
                bounded(self.timeout, self.store.insert_new(code.as_str(), room, self.ttl)).await?;
            if !inserted {
                return Err(AppError::Conflict("Room already exists".to_string()));
            }
        } else {
            bounded(self.timeout, self.store.upsert(code.as_str(), room)).await?;
        }

        tracing::info!(room = %code, "Offer stored");
        Ok(code)
    }

    async fn create_with_generated_code(&self, sdp: String) -> AppResult<RoomCode> {
        for _ in 0..GENERATE_ATTEMPTS {
            let code = RoomCode::generate();
            let room = SignalingRoom {
                offer_sdp: sdp.clone(),
                answer_sdp: None,
            };
            if bounded(self.timeout, self.store.insert_new(code.as_str(), room, self.ttl)).await? {
                tracing::info!(room = %code, "Offer stored with generated code");
                return Ok(code);
            }
            tracing::debug!(room = %code, "Generated room code collided, retrying");
        }
        Err(AppError::Conflict("Could not allocate a room code".to_string()))
    }

    /// answer를 기록한다. 방의 생성 시각은 바뀌지 않는다.
    pub async fn submit_answer(&self, room: &str, sdp: String) -> AppResult<()> {
        let code = RoomCode::parse(room)?;
        if sdp.is_empty() {
            return Err(AppError::validation("Missing sdp"));
        }

        let strict = self.strict;
        let apply = Box::new(move |slot: &mut SignalingRoom| {
            if strict && slot.is_matched() {
                return false;
            }
            slot.answer_sdp = Some(sdp);
            true
        });

        match bounded(self.timeout, self.store.modify(code.as_str(), self.ttl, apply)).await? {
            Modify::Applied => {
                tracing::info!(room = %code, "Answer stored");
                Ok(())
            }
            Modify::Missing => Err(AppError::not_found("Room not found")),
            Modify::Rejected => Err(AppError::Conflict("Room already answered".to_string())),
        }
    }

    pub async fn get_room(&self, room: &str) -> AppResult<Stamped<SignalingRoom>> {
        let code = RoomCode::parse(room)?;
        bounded(self.timeout, self.store.get(code.as_str(), self.ttl))
            .await?
            .ok_or_else(|| AppError::not_found("Room not found"))
    }

    pub async fn live_rooms(&self) -> AppResult<usize> {
        Ok(bounded(self.timeout, self.store.list_live(self.ttl)).await?.len())
    }

    pub async fn sweep(&self) -> StoreResult<usize> {
        bounded(self.timeout, self.store.sweep(self.ttl)).await
    }
}
