use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use adstxt_api::{
    AppState,
    adstxt::Fetcher,
    analyzer::Analyzer,
    cache::build_cache,
    config::Config,
    metrics::Metrics,
    middleware::RateLimitState,
    ratelimit::RateLimiter,
    routes,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Arc::new(Config::from_env());
    tracing::info!(
        cache = %config.cache_type,
        rate_limit = config.rate_limit_per_second,
        "Configuration loaded"
    );

    // 缓存后端不可用时直接退出
    let cache = build_cache(&config)
        .await
        .expect("Failed to initialize cache");

    let fetcher = Fetcher::new(config.request_timeout).expect("Failed to build HTTP client");
    let metrics = Arc::new(Metrics::new());
    let analyzer = Arc::new(Analyzer::new(
        Arc::clone(&cache),
        Arc::new(fetcher),
        Arc::clone(&metrics),
    ));

    // 设置限流器
    let limiter = Arc::new(RateLimiter::new(config.rate_limit_per_second));
    tracing::info!("Rate limiter allows {} requests/s per client", limiter.limit());
    let rate_limit_state = RateLimitState::new(
        Arc::clone(&limiter),
        Arc::clone(&metrics),
        config.trust_proxy_headers,
    );

    let state = AppState::new(
        Arc::clone(&config),
        Arc::clone(&cache),
        analyzer,
        metrics,
    );
    let app = routes::create_router(state, rate_limit_state);

    // 启动服务器
    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    tracing::info!("Shutting down");
    limiter.stop();
    if let Err(e) = cache.close().await {
        tracing::error!("Failed to close cache: {}", e);
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
