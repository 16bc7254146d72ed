use std::collections::BTreeMap;
use std::time::Duration;

use axum::{
    extract::{Json, State},
    response::IntoResponse,
};
use chrono::Utc;

use super::model::HealthResponse;
use crate::{
    AppState,
    cache::{Cache, CacheError, CacheResult, keys},
};

const HEALTH_CHECK_TTL: Duration = Duration::from_secs(10);

/// 缓存故障只把状态标记为 degraded，不影响分析接口
#[axum::debug_handler]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let mut checks = BTreeMap::new();

    let status = match probe_cache(state.cache.as_ref()).await {
        Ok(()) => {
            checks.insert("cache".to_string(), "ok".to_string());
            "healthy"
        }
        Err(e) => {
            state.metrics.record_cache_error();
            tracing::warn!("Health check cache probe failed: {}", e);
            checks.insert("cache".to_string(), e.to_string());
            "degraded"
        }
    };

    Json(HealthResponse {
        status: status.to_string(),
        time: Utc::now(),
        checks,
    })
}

#[axum::debug_handler]
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

async fn probe_cache(cache: &dyn Cache) -> CacheResult<()> {
    let key = keys::health_check_key();
    let value = Utc::now().to_rfc3339().into_bytes();

    cache.set(&key, value.clone(), HEALTH_CHECK_TTL).await?;
    let read = cache.get(&key).await?;
    cache.delete(&key).await?;

    if read != value {
        return Err(CacheError::Corrupt("health check value mismatch".to_string()));
    }
    Ok(())
}
