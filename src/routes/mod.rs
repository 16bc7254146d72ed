use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{Method, header},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};

use crate::{
    AppState,
    middleware::{RateLimitState, log_errors, log_requests, rate_limit},
};

pub mod analysis;
pub mod system;

/// 批量请求体上限
pub const MAX_BODY_SIZE: usize = 64 * 1024;

// 中间件从外到内：请求日志 -> 5xx 日志 -> CORS -> 限流。
// CORS 预检在限流之前被应答，429 响应也带 CORS 头。
pub fn create_router(state: AppState, rate_limit_state: RateLimitState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(system::health))
        .route("/metrics", get(system::metrics))
        .route("/api/analyze", get(analysis::analyze_single))
        .route("/api/batch-analysis", post(analysis::analyze_batch))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(from_fn_with_state(rate_limit_state, rate_limit))
        .layer(cors)
        .layer(from_fn(log_errors))
        .layer(from_fn(log_requests))
        .with_state(state)
}
