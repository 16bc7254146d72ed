// 缓存模块
// 统一的缓存接口，以及内存、文件、Redis 三种实现

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{CacheKind, Config};

pub mod file;
pub mod keys;
pub mod memory;
pub mod redis;

pub use file::FileCache;
pub use memory::MemoryCache;
pub use redis::{RedisCache, RedisTimeouts};

pub type CacheResult<T> = Result<T, CacheError>;

/// `NotFound` 同时表示“从未写入”和“已过期”，其余变体都是后端故障。
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache entry not found")]
    NotFound,
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt cache entry: {0}")]
    Corrupt(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("cache is closed")]
    Closed,
    #[error("cache operation timed out")]
    Timeout,
}

impl CacheError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound)
    }
}

/// 缓存后端接口
///
/// 所有实现都必须支持并发调用。`ttl` 为零时使用后端的默认 TTL。
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Vec<u8>>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()>;

    /// 删除不存在的键也返回成功
    async fn delete(&self, key: &str) -> CacheResult<()>;

    async fn close(&self) -> CacheResult<()>;
}

/// 根据配置创建缓存后端，启动时调用一次。
pub async fn build_cache(config: &Config) -> CacheResult<Arc<dyn Cache>> {
    tracing::info!("Initializing {} cache backend", config.cache_type);

    let cache: Arc<dyn Cache> = match config.cache_type {
        CacheKind::Memory => Arc::new(MemoryCache::new(config.cache_ttl)),
        CacheKind::File => {
            Arc::new(FileCache::new(&config.file_storage_path, config.cache_ttl).await?)
        }
        CacheKind::Redis => Arc::new(
            RedisCache::connect(
                &config.redis_addr,
                &config.redis_password,
                config.redis_db,
                config.cache_ttl,
            )
            .await?,
        ),
    };

    Ok(cache)
}

fn effective_ttl(ttl: Duration, default_ttl: Duration) -> Duration {
    if ttl.is_zero() { default_ttl } else { ttl }
}
