//! 게임 클라이언트용 접속 현황 디렉터리와 WebRTC 시그널링 중계 서버
//!
//! - `/presence`: heartbeat 기반 온라인 플레이어 목록 (TTL 30초)
//! - `/signal`: 방 코드 기반 offer/answer 교환 (TTL 300초)

pub mod config;
pub mod error;
pub mod handlers;
pub mod presence;
pub mod protocol;
pub mod routes;
pub mod signaling;
pub mod state;
pub mod store;
pub mod sweeper;

pub use routes::build_router;
pub use state::AppState;
