//! 애플리케이션 상태 관리

use crate::config::{Config, StoreBackend};
use crate::presence::{PresenceRecord, PresenceRegistry};
use crate::signaling::{SignalingRelay, SignalingRoom};
use crate::store::{FileStore, MemoryStore, StoreResult, TtlStore};
use std::sync::Arc;

/// 전역 애플리케이션 상태
///
/// 저장소 인스턴스는 여기서 소유되며 프로세스 수명과 함께한다.
pub struct AppState {
    /// 접속 현황 (player_id -> PresenceRecord)
    pub presence: PresenceRegistry,
    /// 시그널링 방 (room_code -> SignalingRoom)
    pub signaling: SignalingRelay,
    /// 설정
    pub config: Arc<Config>,
}

impl AppState {
    /// 설정된 백엔드로 두 네임스페이스를 연다.
    pub async fn open(config: Config) -> StoreResult<Self> {
        let limit = config.store.max_records;
        let (players, rooms): (
            Arc<dyn TtlStore<PresenceRecord>>,
            Arc<dyn TtlStore<SignalingRoom>>,
        ) = match config.store.backend {
            StoreBackend::Memory => (
                Arc::new(MemoryStore::<PresenceRecord>::with_capacity_limit(limit, config.presence_ttl())),
                Arc::new(MemoryStore::<SignalingRoom>::with_capacity_limit(limit, config.room_ttl())),
            ),
            StoreBackend::File => (
                Arc::new(FileStore::<PresenceRecord>::open(config.store.dir.join("presence")).await?),
                Arc::new(FileStore::<SignalingRoom>::open(config.store.dir.join("signal")).await?),
            ),
        };
        Ok(Self::with_stores(config, players, rooms))
    }

    /// 인메모리 저장소로 구성 (테스트용으로도 쓰인다)
    pub fn in_memory(config: Config) -> Self {
        let limit = config.store.max_records;
        let presence_ttl = config.presence_ttl();
        let room_ttl = config.room_ttl();
        Self::with_stores(
            config,
            Arc::new(MemoryStore::<PresenceRecord>::with_capacity_limit(limit, presence_ttl)),
            Arc::new(MemoryStore::<SignalingRoom>::with_capacity_limit(limit, room_ttl)),
        )
    }

    pub fn with_stores(
        config: Config,
        players: Arc<dyn TtlStore<PresenceRecord>>,
        rooms: Arc<dyn TtlStore<SignalingRoom>>,
    ) -> Self {
        let timeout = config.store_timeout();
        let presence = PresenceRegistry::new(players, config.presence_ttl(), timeout)
            .sweep_on_heartbeat(config.presence.sweep_on_heartbeat);
        let signaling = SignalingRelay::new(rooms, config.room_ttl(), timeout)
            .strict(config.signaling.strict);

        Self {
            presence,
            signaling,
            config: Arc::new(config),
        }
    }
}
