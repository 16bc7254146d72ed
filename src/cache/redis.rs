use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use ::redis::aio::MultiplexedConnection;
use ::redis::{AsyncCommands, AsyncConnectionConfig, IntoConnectionInfo};
use async_trait::async_trait;

use super::{Cache, CacheError, CacheResult, effective_ttl};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(3);

/// 建连超时与单条命令的响应超时
#[derive(Debug, Clone, Copy)]
pub struct RedisTimeouts {
    pub connect: Duration,
    pub response: Duration,
}

impl Default for RedisTimeouts {
    fn default() -> Self {
        Self {
            connect: DEFAULT_CONNECT_TIMEOUT,
            response: DEFAULT_RESPONSE_TIMEOUT,
        }
    }
}

/// Redis 缓存，过期由 Redis 自己负责
pub struct RedisCache {
    conn: RwLock<Option<MultiplexedConnection>>,
    default_ttl: Duration,
}

impl RedisCache {
    /// 建立连接并立即 PING，地址不可达、认证失败或无响应时直接返回错误。
    pub async fn connect(
        addr: &str,
        password: &str,
        db: i64,
        default_ttl: Duration,
    ) -> CacheResult<Self> {
        Self::connect_with_timeouts(addr, password, db, default_ttl, RedisTimeouts::default()).await
    }

    /// 之后的每条命令都受 `timeouts.response` 约束，Redis 卡住时按故障返回。
    pub async fn connect_with_timeouts(
        addr: &str,
        password: &str,
        db: i64,
        default_ttl: Duration,
        timeouts: RedisTimeouts,
    ) -> CacheResult<Self> {
        let mut info = format!("redis://{}", addr).into_connection_info()?;
        info.redis.db = db;
        if !password.is_empty() {
            info.redis.password = Some(password.to_string());
        }

        let client = ::redis::Client::open(info)?;
        let config = AsyncConnectionConfig::new()
            .set_connection_timeout(timeouts.connect)
            .set_response_timeout(timeouts.response);

        // 握手（AUTH/SELECT）加上 PING 整体也有上限
        let handshake = async {
            let mut conn = client.get_multiplexed_async_connection_with_config(&config).await?;
            let _: String = ::redis::cmd("PING").query_async(&mut conn).await?;
            Ok::<_, CacheError>(conn)
        };
        let conn = tokio::time::timeout(timeouts.connect + timeouts.response, handshake)
            .await
            .map_err(|_| CacheError::Timeout)??;

        tracing::info!("Connected to Redis at {} (db {})", addr, db);

        Ok(Self {
            conn: RwLock::new(Some(conn)),
            default_ttl,
        })
    }

    fn connection(&self) -> CacheResult<MultiplexedConnection> {
        self.conn
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(CacheError::Closed)
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Vec<u8>> {
        let mut conn = self.connection()?;
        let value: Option<Vec<u8>> = conn.get(key).await?;
        value.ok_or(CacheError::NotFound)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        let ttl = effective_ttl(ttl, self.default_ttl);
        // 毫秒精度，且至少 1ms
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);

        let mut conn = self.connection()?;
        let _: () = conn.pset_ex(key, value, ttl_ms).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.connection()?;
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn close(&self) -> CacheResult<()> {
        let conn = self
            .conn
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if conn.is_some() {
            tracing::info!("Redis cache connection closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 需要真实的 Redis：REDIS_TEST_ADDR=localhost:6379 cargo test
    async fn test_cache() -> Option<RedisCache> {
        let addr = std::env::var("REDIS_TEST_ADDR").ok()?;
        let password = std::env::var("REDIS_TEST_PASSWORD").unwrap_or_default();
        Some(
            RedisCache::connect(&addr, &password, 0, Duration::from_secs(300))
                .await
                .expect("REDIS_TEST_ADDR is set but Redis is unreachable"),
        )
    }

    fn unique_key(name: &str) -> String {
        format!("adstxt-test:{}:{}", name, uuid::Uuid::new_v4())
    }

    #[tokio::test]
    async fn test_connect_fails_fast_when_unreachable() {
        let result =
            RedisCache::connect("127.0.0.1:1", "", 0, Duration::from_secs(300)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_connect_fails_fast_when_server_is_silent() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // 接受连接但从不回复
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let timeouts = RedisTimeouts {
            connect: Duration::from_millis(200),
            response: Duration::from_millis(200),
        };
        let started = std::time::Instant::now();
        let result = RedisCache::connect_with_timeouts(
            &addr.to_string(),
            "",
            0,
            Duration::from_secs(300),
            timeouts,
        )
        .await;

        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(3));
        server.abort();
    }

    #[test]
    fn test_default_timeouts() {
        let timeouts = RedisTimeouts::default();
        assert_eq!(timeouts.connect, Duration::from_secs(5));
        assert_eq!(timeouts.response, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let Some(cache) = test_cache().await else {
            return;
        };
        let key = unique_key("roundtrip");

        cache.set(&key, b"value".to_vec(), Duration::ZERO).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), b"value".to_vec());

        cache.delete(&key).await.unwrap();
        assert!(cache.get(&key).await.unwrap_err().is_not_found());
        cache.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_expiration() {
        let Some(cache) = test_cache().await else {
            return;
        };
        let key = unique_key("expiry");

        cache
            .set(&key, b"value".to_vec(), Duration::from_millis(50))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(cache.get(&key).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_closed_cache_reports_closed() {
        let Some(cache) = test_cache().await else {
            return;
        };

        cache.close().await.unwrap();
        cache.close().await.unwrap();
        assert!(matches!(
            cache.get("anything").await.unwrap_err(),
            CacheError::Closed
        ));
    }
}
