use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{error::AppError, metrics::Metrics, ratelimit::RateLimiter};

#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
    pub metrics: Arc<Metrics>,
    pub trust_proxy_headers: bool,
}

impl RateLimitState {
    pub fn new(limiter: Arc<RateLimiter>, metrics: Arc<Metrics>, trust_proxy_headers: bool) -> Self {
        Self {
            limiter,
            metrics,
            trust_proxy_headers,
        }
    }
}

/// 客户端标识：连接的对端 IP；信任代理时优先使用 x-real-ip / x-forwarded-for
pub fn client_ip(req: &Request<Body>, trust_proxy_headers: bool) -> String {
    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());

    let forwarded = if trust_proxy_headers {
        req.headers()
            .get("x-real-ip")
            .and_then(|h| h.to_str().ok())
            .filter(|ip| !ip.trim().is_empty())
            .or_else(|| {
                req.headers()
                    .get("x-forwarded-for")
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
            })
    } else {
        None
    };

    forwarded
        .or(remote_ip.as_deref())
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

pub async fn rate_limit(
    State(state): State<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = client_ip(&req, state.trust_proxy_headers);

    if !state.limiter.allow(&ip) {
        state.metrics.record_rate_limited();
        tracing::debug!("Rate limit exceeded for {}", ip);
        return AppError::RateLimited.into_response();
    }

    next.run(req).await
}
