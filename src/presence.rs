//! 플레이어 접속 현황 (presence)
//!
//! 클라이언트는 주기적으로 heartbeat를 보내고, 마지막 heartbeat 이후
//! TTL(기본 30초)이 지나면 목록에서 사라진다. 살아있음 여부는 저장하지
//! 않고 항상 타임스탬프로부터 계산한다.

use crate::error::{AppError, AppResult};
use crate::store::{bounded, Stamped, StoreResult, TtlStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const MAX_PLAYER_ID_LEN: usize = 64;
pub const MAX_NAME_LEN: usize = 30;
pub const MAX_GAME_LEN: usize = 50;
pub const MAX_GAME_URL_LEN: usize = 200;
pub const MAX_STATUS_LEN: usize = 30;
pub const MAX_ROOM_CODE_LEN: usize = 10;

/// 클라이언트가 보낸 그대로의 heartbeat 필드
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawPresence {
    pub player_id: String,
    pub player_name: String,
    pub game: String,
    pub game_url: String,
    pub status: String,
    pub room_code: Option<String>,
    pub joinable: bool,
    pub spectatable: bool,
}

/// 정제된 접속 레코드. `last_heartbeat`는 저장소가 찍는다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub player_id: String,
    pub name: String,
    pub game: String,
    pub game_url: String,
    pub status: String,
    pub room_code: Option<String>,
    pub joinable: bool,
    pub spectatable: bool,
}

impl PresenceRecord {
    /// 모든 필드를 길이/문자 규칙에 맞게 정제한다.
    pub fn sanitize(raw: RawPresence) -> AppResult<Self> {
        let player_id = sanitize_player_id(&raw.player_id);
        if player_id.is_empty() {
            return Err(AppError::validation("Missing player_id"));
        }

        Ok(Self {
            player_id,
            name: truncate(&raw.player_name, MAX_NAME_LEN),
            game: truncate(&raw.game, MAX_GAME_LEN),
            game_url: truncate(&raw.game_url, MAX_GAME_URL_LEN),
            status: truncate(&raw.status, MAX_STATUS_LEN),
            room_code: raw
                .room_code
                .as_deref()
                .map(sanitize_room_code)
                .filter(|code| !code.is_empty()),
            joinable: raw.joinable,
            spectatable: raw.spectatable,
        })
    }
}

/// 영숫자와 밑줄만 남긴다.
pub fn sanitize_player_id(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .take(MAX_PLAYER_ID_LEN)
        .collect()
}

fn sanitize_room_code(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .take(MAX_ROOM_CODE_LEN)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// 바이트가 아닌 문자 단위로 자른다.
fn truncate(raw: &str, max_chars: usize) -> String {
    raw.chars().take(max_chars).collect()
}

/// 접속 현황 레지스트리
pub struct PresenceRegistry {
    store: Arc<dyn TtlStore<PresenceRecord>>,
    ttl: Duration,
    timeout: Duration,
    sweep_on_heartbeat: bool,
}

impl PresenceRegistry {
    pub fn new(store: Arc<dyn TtlStore<PresenceRecord>>, ttl: Duration, timeout: Duration) -> Self {
        Self {
            store,
            ttl,
            timeout,
            sweep_on_heartbeat: false,
        }
    }

    /// heartbeat 전마다 네임스페이스를 정리한다.
    pub fn sweep_on_heartbeat(mut self, enabled: bool) -> Self {
        self.sweep_on_heartbeat = enabled;
        self
    }

    /// 레코드 전체를 교체하고 타임스탬프를 갱신한다.
    pub async fn heartbeat(&self, raw: RawPresence) -> AppResult<PresenceRecord> {
        let record = PresenceRecord::sanitize(raw)?;

        if self.sweep_on_heartbeat {
            // 정리 실패가 heartbeat를 막지는 않는다
            if let Err(err) = self.sweep().await {
                tracing::warn!(error = %err, "Inline presence sweep failed");
            }
        }

        bounded(self.timeout, self.store.upsert(&record.player_id, record.clone())).await?;
        tracing::debug!(player_id = %record.player_id, status = %record.status, "Heartbeat");
        Ok(record)
    }

    /// 없는 id도 성공으로 처리한다.
    pub async fn leave(&self, player_id: &str) -> AppResult<()> {
        let player_id = sanitize_player_id(player_id);
        if player_id.is_empty() {
            return Ok(());
        }
        bounded(self.timeout, self.store.delete(&player_id)).await?;
        tracing::debug!(player_id = %player_id, "Player left");
        Ok(())
    }

    /// 최근 heartbeat 순으로 정렬된 온라인 플레이어 목록
    pub async fn list_online(&self) -> AppResult<Vec<Stamped<PresenceRecord>>> {
        let mut players = bounded(self.timeout, self.store.list_live(self.ttl)).await?;
        players.sort_by(|a, b| {
            b.touched_at
                .cmp(&a.touched_at)
                .then_with(|| a.key.cmp(&b.key))
        });
        Ok(players)
    }

    pub async fn sweep(&self) -> StoreResult<usize> {
        bounded(self.timeout, self.store.sweep(self.ttl)).await
    }
}
