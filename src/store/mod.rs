//! TTL 레코드 저장소
//!
//! 문자열 키 → (값, 마지막 갱신 시각) 매핑. 만료 판정은 항상 읽기 시점에
//! 수행되며, `sweep`은 저장 공간을 제한하기 위한 최적화일 뿐이다.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// 저장소 장애. 이 계층에서 발생하는 유일한 에러 부류이다.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage call timed out after {0:?}")]
    Timeout(Duration),

    #[error("store capacity of {limit} records exceeded")]
    CapacityExceeded { limit: usize },

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// 저장소가 찍은 타임스탬프와 함께 반환되는 레코드
#[derive(Debug, Clone, PartialEq)]
pub struct Stamped<V> {
    pub key: String,
    pub value: V,
    /// 마지막 갱신 시각 (unix seconds)
    pub touched_at: u64,
}

/// `modify` 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modify {
    /// 키가 없거나 만료됨
    Missing,
    /// 변경 함수가 적용을 거부함
    Rejected,
    Applied,
}

/// 살아있는 값의 복사본을 받아 변경하고, 커밋 여부를 반환한다.
pub type Mutator<V> = Box<dyn FnOnce(&mut V) -> bool + Send>;

/// 교체 가능한 TTL 저장소 백엔드
///
/// 같은 키에 대한 단일 호출은 원자적이다 (필드 단위로 섞이지 않음).
/// 같은 키에 대한 동시 `upsert`는 도착 순서상 마지막 쓰기가 이긴다.
#[async_trait]
pub trait TtlStore<V>: Send + Sync {
    /// 기존 값을 완전히 교체하고 현재 시각을 기록한다.
    async fn upsert(&self, key: &str, value: V) -> StoreResult<()>;

    /// 살아있는 레코드가 없을 때만 삽입한다. 삽입했으면 `true`.
    async fn insert_new(&self, key: &str, value: V, max_age: Duration) -> StoreResult<bool>;

    async fn get(&self, key: &str, max_age: Duration) -> StoreResult<Option<Stamped<V>>>;

    /// 살아있는 레코드를 키 잠금 아래에서 변경한다. 타임스탬프는 유지된다.
    async fn modify(&self, key: &str, max_age: Duration, f: Mutator<V>) -> StoreResult<Modify>;

    /// 없는 키 삭제는 에러가 아니다.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    async fn list_live(&self, max_age: Duration) -> StoreResult<Vec<Stamped<V>>>;

    /// 만료 레코드를 제거하고 제거 개수를 반환한다.
    ///
    /// 스냅샷 이후 갱신된 레코드는 제거하지 않는다.
    async fn sweep(&self, max_age: Duration) -> StoreResult<usize>;
}

/// 저장소 호출을 짧은 타임아웃으로 제한
pub async fn bounded<T, F>(limit: Duration, fut: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| StoreError::Timeout(limit))?
}

pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub(crate) fn unix_secs() -> u64 {
    unix_millis() / 1000
}
