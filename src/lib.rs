use std::sync::Arc;

use analyzer::Analyzer;
use cache::Cache;
use config::Config;
use metrics::Metrics;

pub mod adstxt;
pub mod analyzer;
pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod ratelimit;
pub mod routes;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cache: Arc<dyn Cache>,
    pub analyzer: Arc<Analyzer>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        cache: Arc<dyn Cache>,
        analyzer: Arc<Analyzer>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config,
            cache,
            analyzer,
            metrics,
        }
    }
}
