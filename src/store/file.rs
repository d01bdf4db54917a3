//! 디렉터리 기반 TTL 저장소
//!
//! 키 하나당 `<dir>/<key>.json` 파일 하나. 쓰기는 임시 파일에 기록한 뒤
//! `rename`으로 교체하므로 독자는 절대 반쯤 쓰인 레코드를 보지 않는다.
//! 키는 상위 계층에서 `[A-Za-z0-9_]`로 제한되어 파일 이름으로 안전하다.

use super::{unix_millis, Modify, Mutator, Stamped, StoreError, StoreResult, TtlStore};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

const EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";

/// sweep 스냅샷 항목. `touched_ms`가 `None`이면 해석할 수 없는 레코드
#[derive(Debug)]
struct StaleEntry {
    key: String,
    touched_ms: Option<u64>,
}

/// 디렉터리 한 번 훑기의 결과
#[derive(Debug, Default)]
struct Listing {
    keys: Vec<String>,
    temps: Vec<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FileRecord<V> {
    value: V,
    touched_ms: u64,
}

impl<V> FileRecord<V> {
    fn is_live(&self, now_ms: u64, max_age: Duration) -> bool {
        u128::from(now_ms.saturating_sub(self.touched_ms)) <= max_age.as_millis()
    }

    fn into_stamped(self, key: &str) -> Stamped<V> {
        Stamped {
            key: key.to_string(),
            value: self.value,
            touched_at: self.touched_ms / 1000,
        }
    }
}

/// 파일 시스템 저장소. 키 단위 뮤텍스로 같은 키의 쓰기만 직렬화한다.
pub struct FileStore<V> {
    dir: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
    _marker: PhantomData<fn() -> V>,
}

impl<V> FileStore<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// 디렉터리가 없으면 생성한다.
    pub async fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        tracing::info!(dir = %dir.display(), "File store opened");
        Ok(Self {
            dir,
            locks: DashMap::new(),
            _marker: PhantomData,
        })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{EXTENSION}"))
    }

    fn lock(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks.entry(key.to_string()).or_default().clone()
    }

    /// 아무도 잡고 있지 않은 키 잠금을 정리한다.
    fn release_lock(&self, key: &str) {
        self.locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    async fn read(&self, path: &Path) -> StoreResult<Option<FileRecord<V>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn write(&self, key: &str, record: &FileRecord<V>) -> StoreResult<()> {
        let bytes = serde_json::to_vec(record)?;
        let tmp = self.dir.join(format!(".{key}.{}.tmp", Uuid::new_v4()));
        if let Err(err) = tokio::fs::write(&tmp, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        tokio::fs::rename(&tmp, self.path(key)).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<bool> {
        match tokio::fs::remove_file(self.path(key)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// 레코드 키와 임시 파일을 구분해 나열한다.
    async fn scan(&self) -> StoreResult<Listing> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut listing = Listing::default();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(str::to_owned) else {
                continue;
            };
            let extension = path.extension().and_then(|e| e.to_str()).map(str::to_owned);
            match (extension.as_deref(), stem.starts_with('.')) {
                (Some(TEMP_EXTENSION), true) => listing.temps.push(path),
                (Some(EXTENSION), false) => listing.keys.push(stem),
                _ => {}
            }
        }
        Ok(listing)
    }

    /// 만료되었거나 해석할 수 없는 레코드 목록
    async fn stale_snapshot(&self, keys: Vec<String>, max_age: Duration) -> Vec<StaleEntry> {
        let snapshot_ms = unix_millis();
        let mut stale = Vec::new();
        for key in keys {
            match self.read(&self.path(&key)).await {
                Ok(Some(record)) if !record.is_live(snapshot_ms, max_age) => stale.push(StaleEntry {
                    key,
                    touched_ms: Some(record.touched_ms),
                }),
                Err(StoreError::Serialization(_)) => stale.push(StaleEntry {
                    key,
                    touched_ms: None,
                }),
                _ => {}
            }
        }
        stale
    }

    /// 키 잠금 아래에서 다시 읽어, 스냅샷 이후 바뀌지 않은 레코드만 지운다.
    async fn evict_unchanged(&self, stale: Vec<StaleEntry>) -> StoreResult<usize> {
        let mut evicted = 0;
        for entry in stale {
            let removed = {
                let lock = self.lock(&entry.key);
                let _guard = lock.lock().await;
                let current = self.read(&self.path(&entry.key)).await;
                let unchanged = match (entry.touched_ms, current) {
                    (Some(touched_ms), Ok(Some(record))) => record.touched_ms == touched_ms,
                    (None, Err(StoreError::Serialization(err))) => {
                        tracing::warn!(key = %entry.key, error = %err, "Evicting unreadable record");
                        true
                    }
                    _ => false,
                };
                unchanged && self.remove(&entry.key).await?
            };
            self.release_lock(&entry.key);
            if removed {
                evicted += 1;
            }
        }
        Ok(evicted)
    }

    /// 중단된 쓰기가 남긴 임시 파일 중 `max_age`보다 오래된 것을 지운다.
    async fn remove_orphaned_temps(&self, temps: Vec<PathBuf>, max_age: Duration) {
        for path in temps {
            let age = match tokio::fs::metadata(&path).await.and_then(|meta| meta.modified()) {
                Ok(modified) => modified.elapsed().unwrap_or_default(),
                Err(_) => continue,
            };
            if age <= max_age {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => tracing::debug!(path = %path.display(), "Removed orphaned temp file"),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "Failed to remove temp file");
                }
            }
        }
    }
}

#[async_trait]
impl<V> TtlStore<V> for FileStore<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    async fn upsert(&self, key: &str, value: V) -> StoreResult<()> {
        let lock = self.lock(key);
        let _guard = lock.lock().await;
        let record = FileRecord {
            value,
            touched_ms: unix_millis(),
        };
        self.write(key, &record).await
    }

    async fn insert_new(&self, key: &str, value: V, max_age: Duration) -> StoreResult<bool> {
        let lock = self.lock(key);
        let _guard = lock.lock().await;
        let now_ms = unix_millis();
        if let Some(existing) = self.read(&self.path(key)).await? {
            if existing.is_live(now_ms, max_age) {
                return Ok(false);
            }
        }
        let record = FileRecord {
            value,
            touched_ms: now_ms,
        };
        self.write(key, &record).await?;
        Ok(true)
    }

    async fn get(&self, key: &str, max_age: Duration) -> StoreResult<Option<Stamped<V>>> {
        let now_ms = unix_millis();
        Ok(self
            .read(&self.path(key))
            .await?
            .filter(|record| record.is_live(now_ms, max_age))
            .map(|record| record.into_stamped(key)))
    }

    async fn modify(&self, key: &str, max_age: Duration, f: Mutator<V>) -> StoreResult<Modify> {
        let lock = self.lock(key);
        let _guard = lock.lock().await;
        let Some(mut record) = self.read(&self.path(key)).await? else {
            return Ok(Modify::Missing);
        };
        if !record.is_live(unix_millis(), max_age) {
            return Ok(Modify::Missing);
        }
        if !f(&mut record.value) {
            return Ok(Modify::Rejected);
        }
        self.write(key, &record).await?;
        Ok(Modify::Applied)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        {
            let lock = self.lock(key);
            let _guard = lock.lock().await;
            self.remove(key).await?;
        }
        self.release_lock(key);
        Ok(())
    }

    async fn list_live(&self, max_age: Duration) -> StoreResult<Vec<Stamped<V>>> {
        let now_ms = unix_millis();
        let mut live = Vec::new();
        for key in self.scan().await?.keys {
            match self.read(&self.path(&key)).await {
                Ok(Some(record)) if record.is_live(now_ms, max_age) => {
                    live.push(record.into_stamped(&key));
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "Skipping unreadable record");
                }
            }
        }
        Ok(live)
    }

    async fn sweep(&self, max_age: Duration) -> StoreResult<usize> {
        let Listing { keys, temps } = self.scan().await?;
        let stale = self.stale_snapshot(keys, max_age).await;
        let evicted = self.evict_unchanged(stale).await?;
        self.remove_orphaned_temps(temps, max_age).await;
        Ok(evicted)
    }
}
