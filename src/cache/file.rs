use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::RwLock;

use super::{Cache, CacheError, CacheResult, effective_ttl};

/// 磁盘上的条目，过期时间随内容一起保存，不依赖文件 mtime
#[derive(Serialize, Deserialize)]
struct FileCacheEntry {
    #[serde(with = "base64_bytes")]
    value: Vec<u8>,
    expiration: DateTime<Utc>,
}

/// 载荷按 base64 字符串保存
mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(de::Error::custom)
    }
}

/// 文件缓存，每个键对应基础目录下的一个 JSON 文件
pub struct FileCache {
    base_path: PathBuf,
    default_ttl: Duration,
    lock: RwLock<()>,
}

impl FileCache {
    /// 基础目录不存在时会被创建。
    pub async fn new(base_path: impl AsRef<Path>, default_ttl: Duration) -> CacheResult<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).await?;

        Ok(Self {
            base_path,
            default_ttl,
            lock: RwLock::new(()),
        })
    }

    /// 键不可信，文件名取键的 SHA-256，任何键都落在基础目录内
    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.base_path.join(format!("{:x}.json", digest))
    }
}

#[async_trait]
impl Cache for FileCache {
    async fn get(&self, key: &str) -> CacheResult<Vec<u8>> {
        let _guard = self.lock.read().await;

        let data = match fs::read(self.entry_path(key)).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(CacheError::NotFound),
            Err(e) => return Err(CacheError::Io(e)),
        };

        let entry: FileCacheEntry = serde_json::from_slice(&data)
            .map_err(|e| CacheError::Corrupt(format!("{}: {}", key, e)))?;

        if Utc::now() >= entry.expiration {
            return Err(CacheError::NotFound);
        }

        Ok(entry.value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        let ttl = effective_ttl(ttl, self.default_ttl);
        let expiration = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let data = serde_json::to_vec(&FileCacheEntry { value, expiration })?;

        let path = self.entry_path(key);
        let tmp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4()));

        let _guard = self.lock.write().await;
        // 先写临时文件再重命名，读者不会看到写了一半的条目
        fs::write(&tmp_path, &data).await?;
        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(CacheError::Io(e));
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let _guard = self.lock.write().await;

        match fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io(e)),
        }
    }

    async fn close(&self) -> CacheResult<()> {
        Ok(())
    }
}
