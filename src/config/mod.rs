use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// 缓存后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Memory,
    File,
    Redis,
}

impl FromStr for CacheKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheKind::Memory),
            "file" => Ok(CacheKind::File),
            "redis" => Ok(CacheKind::Redis),
            other => Err(format!("unknown cache type: {}", other)),
        }
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CacheKind::Memory => "memory",
            CacheKind::File => "file",
            CacheKind::Redis => "redis",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub cache_type: CacheKind,
    pub cache_ttl: Duration,
    pub rate_limit_per_second: u32,
    pub redis_addr: String,
    pub redis_password: String,
    pub redis_db: i64,
    pub file_storage_path: PathBuf,
    pub request_timeout: Duration,
    pub batch_max_domains: usize,
    pub batch_timeout: Duration,
    pub trust_proxy_headers: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_host: "0.0.0.0".to_string(),
            server_port: 8080,
            cache_type: CacheKind::Memory,
            cache_ttl: Duration::from_secs(3600),
            rate_limit_per_second: 10,
            redis_addr: "localhost:6379".to_string(),
            redis_password: String::new(),
            redis_db: 0,
            file_storage_path: PathBuf::from("./cache"),
            request_timeout: Duration::from_secs(10),
            batch_max_domains: 50,
            batch_timeout: Duration::from_secs(30),
            trust_proxy_headers: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// 从任意键值来源读取配置，缺失或无法解析的值使用默认值。
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Config {
            server_host: var("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: parse_or("PORT", var("PORT"), defaults.server_port),
            cache_type: parse_or("CACHE_TYPE", var("CACHE_TYPE"), defaults.cache_type),
            cache_ttl: duration_or("CACHE_TTL", var("CACHE_TTL"), defaults.cache_ttl),
            rate_limit_per_second: parse_or(
                "RATE_LIMIT_PER_SECOND",
                var("RATE_LIMIT_PER_SECOND"),
                defaults.rate_limit_per_second,
            ),
            redis_addr: var("REDIS_ADDR").unwrap_or(defaults.redis_addr),
            redis_password: var("REDIS_PASSWORD").unwrap_or(defaults.redis_password),
            redis_db: parse_or("REDIS_DB", var("REDIS_DB"), defaults.redis_db),
            file_storage_path: var("FILE_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.file_storage_path),
            request_timeout: duration_or(
                "REQUEST_TIMEOUT",
                var("REQUEST_TIMEOUT"),
                defaults.request_timeout,
            ),
            batch_max_domains: parse_or(
                "BATCH_MAX_DOMAINS",
                var("BATCH_MAX_DOMAINS"),
                defaults.batch_max_domains,
            ),
            batch_timeout: duration_or(
                "BATCH_TIMEOUT",
                var("BATCH_TIMEOUT"),
                defaults.batch_timeout,
            ),
            trust_proxy_headers: parse_or(
                "TRUST_PROXY_HEADERS",
                var("TRUST_PROXY_HEADERS"),
                defaults.trust_proxy_headers,
            ),
        }
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid value for {}: {:?}, using default", key, value);
            default
        }),
        None => default,
    }
}

fn duration_or(key: &str, raw: Option<String>, default: Duration) -> Duration {
    match raw {
        Some(value) => parse_duration(&value).unwrap_or_else(|| {
            tracing::warn!("Invalid duration for {}: {:?}, using default", key, value);
            default
        }),
        None => default,
    }
}

/// 解析 `500ms`、`10s`、`5m`、`1h30m` 这类时长，纯数字按秒处理。
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    if let Ok(secs) = input.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    humantime::parse_duration(input).ok()
}
