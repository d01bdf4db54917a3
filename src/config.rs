//! 환경 변수 기반 설정 관리

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// 서버 설정
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub log_level: String,
    pub max_body_bytes: usize,
    pub store: StoreConfig,
    pub presence: PresenceConfig,
    pub signaling: SignalingConfig,
    pub sweep_interval_secs: u64,
}

/// 저장소 백엔드 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    File,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            other => Err(format!("unknown store backend: {other}")),
        }
    }
}

/// 저장소 설정
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub dir: PathBuf,
    pub timeout_ms: u64,
    /// 네임스페이스당 최대 레코드 수 (`0`이면 무제한)
    pub max_records: usize,
}

/// 접속 현황 설정
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    pub ttl_secs: u64,
    pub sweep_on_heartbeat: bool,
}

/// 시그널링 방 설정
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    pub room_ttl_secs: u64,
    /// 살아있는 방 덮어쓰기, 두 번째 answer를 거부
    pub strict: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5503,
            host: "0.0.0.0".to_string(),
            log_level: "info".to_string(),
            max_body_bytes: 64 * 1024,
            store: StoreConfig {
                backend: StoreBackend::Memory,
                dir: PathBuf::from("./data"),
                timeout_ms: 500,
                max_records: 10_000,
            },
            presence: PresenceConfig {
                ttl_secs: 30,
                sweep_on_heartbeat: false,
            },
            signaling: SignalingConfig {
                room_ttl_secs: 300,
                strict: false,
            },
            sweep_interval_secs: 10,
        }
    }
}

impl Config {
    /// 환경 변수에서 설정 로드
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Self {
            port: env_or("PORT", defaults.port),
            host: env::var("HOST").unwrap_or(defaults.host),
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            max_body_bytes: env_or("MAX_BODY_BYTES", defaults.max_body_bytes),
            store: StoreConfig {
                backend: env_or("STORE_BACKEND", defaults.store.backend),
                dir: env::var("STORE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.store.dir),
                timeout_ms: env_or("STORE_TIMEOUT_MS", defaults.store.timeout_ms),
                max_records: env_or("STORE_MAX_RECORDS", defaults.store.max_records),
            },
            presence: PresenceConfig {
                ttl_secs: env_or("PRESENCE_TTL_SECS", defaults.presence.ttl_secs),
                sweep_on_heartbeat: env_flag("SWEEP_ON_HEARTBEAT", false),
            },
            signaling: SignalingConfig {
                room_ttl_secs: env_or("ROOM_TTL_SECS", defaults.signaling.room_ttl_secs),
                strict: env_flag("STRICT_SIGNALING", false),
            },
            sweep_interval_secs: env_or("SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs),
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store.timeout_ms)
    }

    pub fn presence_ttl(&self) -> Duration {
        Duration::from_secs(self.presence.ttl_secs)
    }

    pub fn room_ttl(&self) -> Duration {
        Duration::from_secs(self.signaling.room_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        // interval()은 0을 허용하지 않는다
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// 값이 없거나 파싱에 실패하면 기본값
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes"))
        .unwrap_or(default)
}
