use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{Cache, CacheError, CacheResult, effective_ttl};
use crate::utils::PeriodicTask;

/// 过期条目清理周期
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

struct CacheEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

type EntryTable = RwLock<HashMap<String, CacheEntry>>;

/// 进程内缓存
///
/// 读取时过期条目视为不存在，真正的删除由后台清理任务完成。
pub struct MemoryCache {
    entries: Arc<EntryTable>,
    default_ttl: Duration,
    sweeper: PeriodicTask,
}

impl MemoryCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_sweep_interval(default_ttl, SWEEP_INTERVAL)
    }

    pub fn with_sweep_interval(default_ttl: Duration, sweep_interval: Duration) -> Self {
        let entries: Arc<EntryTable> = Arc::new(RwLock::new(HashMap::new()));

        let table = Arc::clone(&entries);
        let sweeper = PeriodicTask::spawn("memory cache cleanup", sweep_interval, move || {
            let removed = remove_expired(&table, Instant::now());
            if removed > 0 {
                tracing::info!("MemoryCache cleanup: removed {} expired entries", removed);
            }
        });

        Self {
            entries,
            default_ttl,
            sweeper,
        }
    }

    /// 当前保存的条目数，包含尚未清理的过期条目。
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn purge_expired(&self) -> usize {
        remove_expired(&self.entries, Instant::now())
    }
}

fn remove_expired(entries: &EntryTable, now: Instant) -> usize {
    let mut entries = entries.write().unwrap_or_else(PoisonError::into_inner);
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired(now));
    before - entries.len()
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Vec<u8>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some(entry) if !entry.is_expired(Instant::now()) => Ok(entry.value.clone()),
            _ => Err(CacheError::NotFound),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        let ttl = effective_ttl(ttl, self.default_ttl);
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }

    async fn close(&self) -> CacheResult<()> {
        self.sweeper.stop();
        Ok(())
    }
}
