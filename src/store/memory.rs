//! 인메모리 TTL 저장소 (DashMap)

use super::{unix_secs, Modify, Mutator, Stamped, StoreError, StoreResult, TtlStore};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

struct Slot<V> {
    value: V,
    touched: Instant,
    touched_unix: u64,
    /// 갱신마다 증가. sweep의 compare-and-remove 기준
    version: u64,
}

impl<V: Clone> Slot<V> {
    fn is_live(&self, now: Instant, max_age: Duration) -> bool {
        now.saturating_duration_since(self.touched) <= max_age
    }

    fn stamped(&self, key: &str) -> Stamped<V> {
        Stamped {
            key: key.to_string(),
            value: self.value.clone(),
            touched_at: self.touched_unix,
        }
    }
}

/// 샤드 단위 잠금을 갖는 인메모리 저장소
///
/// 서로 다른 키는 전역 잠금 없이 병렬로 처리된다.
pub struct MemoryStore<V> {
    slots: DashMap<String, Slot<V>>,
    /// (최대 레코드 수, 해당 네임스페이스의 TTL)
    capacity: Option<(usize, Duration)>,
    next_version: AtomicU64,
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self {
            slots: DashMap::new(),
            capacity: None,
            next_version: AtomicU64::new(0),
        }
    }
}

impl<V: Clone + Send + Sync + 'static> MemoryStore<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 새 키의 개수를 제한한다. `0`이면 무제한.
    ///
    /// `ttl`이 지난 레코드는 상한 계산에서 제외된다.
    pub fn with_capacity_limit(limit: usize, ttl: Duration) -> Self {
        Self {
            capacity: (limit > 0).then_some((limit, ttl)),
            ..Self::default()
        }
    }

    fn slot(&self, value: V) -> Slot<V> {
        Slot {
            value,
            touched: Instant::now(),
            touched_unix: unix_secs(),
            version: self.next_version.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// 엔트리 잠금을 잡기 전에 호출해야 한다 (`len`은 모든 샤드를 읽는다).
    /// 경합 시 상한을 약간 넘을 수 있다.
    fn check_capacity(&self, key: &str) -> StoreResult<()> {
        let Some((limit, ttl)) = self.capacity else {
            return Ok(());
        };
        if self.slots.len() < limit || self.slots.contains_key(key) {
            return Ok(());
        }

        // 만료 레코드가 자리를 차지하고 있으면 먼저 비운다
        let evicted = self.evict_unchanged(self.stale_snapshot(ttl));
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted stale records at capacity");
        }
        if self.slots.len() >= limit {
            return Err(StoreError::CapacityExceeded { limit });
        }
        Ok(())
    }

    /// 만료된 키와 그 시점의 버전
    fn stale_snapshot(&self, max_age: Duration) -> Vec<(String, u64)> {
        let now = Instant::now();
        self.slots
            .iter()
            .filter(|entry| !entry.is_live(now, max_age))
            .map(|entry| (entry.key().clone(), entry.version))
            .collect()
    }

    /// 스냅샷 이후 버전이 바뀌지 않은 키만 제거한다.
    fn evict_unchanged(&self, stale: Vec<(String, u64)>) -> usize {
        stale
            .into_iter()
            .filter(|(key, version)| {
                self.slots
                    .remove_if(key, |_, slot| slot.version == *version)
                    .is_some()
            })
            .count()
    }
}

#[async_trait]
impl<V: Clone + Send + Sync + 'static> TtlStore<V> for MemoryStore<V> {
    async fn upsert(&self, key: &str, value: V) -> StoreResult<()> {
        self.check_capacity(key)?;
        let slot = self.slot(value);
        self.slots.insert(key.to_string(), slot);
        Ok(())
    }

    async fn insert_new(&self, key: &str, value: V, max_age: Duration) -> StoreResult<bool> {
        self.check_capacity(key)?;
        let slot = self.slot(value);
        match self.slots.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_live(Instant::now(), max_age) {
                    return Ok(false);
                }
                entry.insert(slot);
                Ok(true)
            }
            Entry::Vacant(entry) => {
                entry.insert(slot);
                Ok(true)
            }
        }
    }

    async fn get(&self, key: &str, max_age: Duration) -> StoreResult<Option<Stamped<V>>> {
        let now = Instant::now();
        Ok(self
            .slots
            .get(key)
            .filter(|slot| slot.is_live(now, max_age))
            .map(|slot| slot.stamped(key)))
    }

    async fn modify(&self, key: &str, max_age: Duration, f: Mutator<V>) -> StoreResult<Modify> {
        let Some(mut slot) = self.slots.get_mut(key) else {
            return Ok(Modify::Missing);
        };
        if !slot.is_live(Instant::now(), max_age) {
            return Ok(Modify::Missing);
        }

        let mut next = slot.value.clone();
        if !f(&mut next) {
            return Ok(Modify::Rejected);
        }
        slot.value = next;
        slot.version = self.next_version.fetch_add(1, Ordering::Relaxed);
        Ok(Modify::Applied)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.slots.remove(key);
        Ok(())
    }

    async fn list_live(&self, max_age: Duration) -> StoreResult<Vec<Stamped<V>>> {
        let now = Instant::now();
        Ok(self
            .slots
            .iter()
            .filter(|entry| entry.is_live(now, max_age))
            .map(|entry| entry.stamped(entry.key()))
            .collect())
    }

    async fn sweep(&self, max_age: Duration) -> StoreResult<usize> {
        let stale = self.stale_snapshot(max_age);
        Ok(self.evict_unchanged(stale))
    }
}
