use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::utils::PeriodicTask;

/// 限流窗口长度
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(1);
/// 空闲客户端清理周期
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);
/// 超过该时长未刷新的客户端会被移除
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub limit: u32,
    pub window: Duration,
    pub cleanup_interval: Duration,
    pub idle_timeout: Duration,
}

impl RateLimitSettings {
    pub fn per_second(limit: u32) -> Self {
        Self {
            limit,
            window: DEFAULT_WINDOW,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

#[derive(Debug)]
struct ClientBucket {
    remaining: u32,
    window_start: Instant,
}

impl ClientBucket {
    fn new(limit: u32, now: Instant) -> Self {
        Self {
            remaining: limit,
            window_start: now,
        }
    }

    fn try_take(&mut self, limit: u32, window: Duration, now: Instant) -> bool {
        if now.duration_since(self.window_start) >= window {
            self.remaining = limit;
            self.window_start = now;
        }

        if self.remaining > 0 {
            self.remaining -= 1;
            true
        } else {
            false
        }
    }

    fn is_idle(&self, idle_timeout: Duration, now: Instant) -> bool {
        now.duration_since(self.window_start) > idle_timeout
    }
}

type ClientTable = RwLock<HashMap<String, Arc<Mutex<ClientBucket>>>>;

/// 按客户端标识划分的固定窗口令牌桶
///
/// 表级锁只负责桶的插入与删除，令牌扣减只锁单个桶，
/// 不同客户端之间不会在同一把锁上竞争。
pub struct RateLimiter {
    settings: RateLimitSettings,
    clients: Arc<ClientTable>,
    reaper: PeriodicTask,
}

impl RateLimiter {
    pub fn new(limit_per_second: u32) -> Self {
        Self::with_settings(RateLimitSettings::per_second(limit_per_second))
    }

    pub fn with_settings(settings: RateLimitSettings) -> Self {
        let clients: Arc<ClientTable> = Arc::new(RwLock::new(HashMap::new()));

        let table = Arc::clone(&clients);
        let idle_timeout = settings.idle_timeout;
        let reaper = PeriodicTask::spawn(
            "rate limiter cleanup",
            settings.cleanup_interval,
            move || {
                let removed = evict_idle_clients(&table, idle_timeout, Instant::now());
                if removed > 0 {
                    tracing::info!("RateLimiter cleanup: removed {} inactive clients", removed);
                }
            },
        );

        Self {
            settings,
            clients,
            reaper,
        }
    }

    pub fn limit(&self) -> u32 {
        self.settings.limit
    }

    /// 判断该客户端本次请求是否放行，从不阻塞等待令牌。
    pub fn allow(&self, client_id: &str) -> bool {
        let now = Instant::now();
        let bucket = self.bucket_for(client_id, now);
        let mut bucket = bucket.lock().unwrap_or_else(PoisonError::into_inner);
        bucket.try_take(self.settings.limit, self.settings.window, now)
    }

    fn bucket_for(&self, client_id: &str, now: Instant) -> Arc<Mutex<ClientBucket>> {
        {
            let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(bucket) = clients.get(client_id) {
                return Arc::clone(bucket);
            }
        }

        // 在写锁内检查并插入，并发的首次请求只会创建一个桶
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        let limit = self.settings.limit;
        Arc::clone(
            clients
                .entry(client_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(ClientBucket::new(limit, now)))),
        )
    }

    pub fn client_count(&self) -> usize {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// 立即执行一次空闲客户端清理，返回移除的数量。
    pub fn evict_idle(&self) -> usize {
        evict_idle_clients(&self.clients, self.settings.idle_timeout, Instant::now())
    }

    /// 停止后台清理任务，已有的桶继续生效。
    pub fn stop(&self) {
        self.reaper.stop();
    }
}

fn evict_idle_clients(clients: &ClientTable, idle_timeout: Duration, now: Instant) -> usize {
    let candidates: Vec<String> = {
        let clients = clients.read().unwrap_or_else(PoisonError::into_inner);
        clients
            .iter()
            .filter(|(_, bucket)| {
                bucket
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .is_idle(idle_timeout, now)
            })
            .map(|(client_id, _)| client_id.clone())
            .collect()
    };

    if candidates.is_empty() {
        return 0;
    }

    let mut clients = clients.write().unwrap_or_else(PoisonError::into_inner);
    let mut removed = 0;
    for client_id in candidates {
        // 快照之后可能又有请求刷新了窗口
        let still_idle = clients.get(&client_id).is_some_and(|bucket| {
            bucket
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_idle(idle_timeout, now)
        });
        if still_idle {
            clients.remove(&client_id);
            removed += 1;
        }
    }
    removed
}
