//! 单域名分析（先查缓存，未命中再下载解析并回写）以及批量并发分析

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adstxt::{AdsTxtSource, AdvertiserCount, FetchError, parse_advertisers, rank_advertisers};
use crate::cache::{Cache, keys};
use crate::metrics::Metrics;

mod batch;

pub use batch::{BatchError, BatchOptions, BatchResult, analyze_batch};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub domain: String,
    pub total_advertisers: usize,
    pub advertisers: Vec<AdvertiserCount>,
    pub cached: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("failed to analyze {domain}: {source}")]
    Fetch {
        domain: String,
        #[source]
        source: FetchError,
    },
}

pub struct Analyzer {
    cache: Arc<dyn Cache>,
    source: Arc<dyn AdsTxtSource>,
    metrics: Arc<Metrics>,
}

impl Analyzer {
    pub fn new(cache: Arc<dyn Cache>, source: Arc<dyn AdsTxtSource>, metrics: Arc<Metrics>) -> Self {
        Self {
            cache,
            source,
            metrics,
        }
    }

    pub async fn analyze(&self, domain: &str) -> Result<AnalysisResult, AnalysisError> {
        let cache_key = keys::analysis_key(domain);

        if let Some(result) = self.lookup(&cache_key, domain).await {
            self.metrics.record_cache_hit();
            return Ok(result);
        }
        self.metrics.record_cache_miss();

        let content = self.source.fetch(domain).await.map_err(|source| {
            self.metrics.record_fetch_error();
            tracing::warn!("Fetch failed for {}: {}", domain, source);
            AnalysisError::Fetch {
                domain: domain.to_string(),
                source,
            }
        })?;

        let advertisers = rank_advertisers(parse_advertisers(&content));
        let result = AnalysisResult {
            domain: domain.to_string(),
            total_advertisers: advertisers.len(),
            advertisers,
            cached: false,
            timestamp: Utc::now(),
        };

        self.store(&cache_key, &result).await;

        Ok(result)
    }

    /// 缓存故障与损坏的条目都按未命中处理。缓存键忽略大小写，
    /// 命中时 `domain` 改写为本次请求的写法。
    async fn lookup(&self, cache_key: &str, domain: &str) -> Option<AnalysisResult> {
        let data = match self.cache.get(cache_key).await {
            Ok(data) => data,
            Err(e) if e.is_not_found() => return None,
            Err(e) => {
                self.metrics.record_cache_error();
                tracing::warn!("Cache read failed for {}: {}", cache_key, e);
                return None;
            }
        };

        match serde_json::from_slice::<AnalysisResult>(&data) {
            Ok(mut result) => {
                result.domain = domain.to_string();
                result.cached = true;
                Some(result)
            }
            Err(e) => {
                self.metrics.record_cache_error();
                tracing::warn!("Discarding undecodable cache entry {}: {}", cache_key, e);
                None
            }
        }
    }

    async fn store(&self, cache_key: &str, result: &AnalysisResult) {
        let data = match serde_json::to_vec(result) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!("Failed to serialize analysis for {}: {}", result.domain, e);
                return;
            }
        };

        if let Err(e) = self.cache.set(cache_key, data, Duration::ZERO).await {
            self.metrics.record_cache_error();
            tracing::warn!("Cache write failed for {}: {}", cache_key, e);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{BrokenCache, StubSource};
    use super::*;
    use crate::cache::MemoryCache;

    const CONTENT: &str = "google.com, pub-1, DIRECT\nAPPNEXUS.com, 2, RESELLER\ngoogle.com, pub-2, DIRECT\n# comment\nnotadomainline";

    fn analyzer_with(cache: Arc<dyn Cache>, source: Arc<StubSource>) -> (Analyzer, Arc<Metrics>) {
        let metrics = Arc::new(Metrics::new());
        (Analyzer::new(cache, source, Arc::clone(&metrics)), metrics)
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new(Duration::from_secs(3600)));
        let source = Arc::new(StubSource::new().with_page("example.com", CONTENT));
        let (analyzer, metrics) = analyzer_with(cache, Arc::clone(&source));

        let first = analyzer.analyze("example.com").await.unwrap();
        assert!(!first.cached);
        assert_eq!(first.domain, "example.com");
        assert_eq!(first.total_advertisers, 2);
        assert_eq!(first.advertisers[0].domain, "google.com");
        assert_eq!(first.advertisers[0].count, 2);
        assert_eq!(first.advertisers[1].domain, "appnexus.com");

        let second = analyzer.analyze("example.com").await.unwrap();
        assert!(second.cached);
        assert_eq!(second.advertisers, first.advertisers);
        assert_eq!(source.calls(), 1);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cache_misses, 1);
        assert_eq!(snapshot.cache_hits, 1);
    }

    #[tokio::test]
    async fn test_hit_reports_requested_spelling() {
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new(Duration::from_secs(3600)));
        let source = Arc::new(
            StubSource::new()
                .with_page("EXAMPLE.com", CONTENT)
                .with_page("example.com", CONTENT),
        );
        let (analyzer, _) = analyzer_with(cache, Arc::clone(&source));

        let first = analyzer.analyze("EXAMPLE.com").await.unwrap();
        assert_eq!(first.domain, "EXAMPLE.com");

        let second = analyzer.analyze("example.com").await.unwrap();
        assert!(second.cached);
        assert_eq!(second.domain, "example.com");
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let cache = Arc::new(MemoryCache::new(Duration::from_secs(3600)));
        cache
            .set(&keys::analysis_key("example.com"), b"not json".to_vec(), Duration::ZERO)
            .await
            .unwrap();
        let source = Arc::new(StubSource::new().with_page("example.com", CONTENT));
        let (analyzer, _) = analyzer_with(cache.clone(), Arc::clone(&source));

        let result = analyzer.analyze("example.com").await.unwrap();
        assert!(!result.cached);
        assert_eq!(source.calls(), 1);

        // 新结果覆盖了损坏的条目
        let stored = cache.get(&keys::analysis_key("example.com")).await.unwrap();
        assert!(serde_json::from_slice::<AnalysisResult>(&stored).is_ok());
    }

    #[tokio::test]
    async fn test_broken_cache_degrades_to_fetch() {
        let source = Arc::new(StubSource::new().with_page("example.com", CONTENT));
        let (analyzer, metrics) = analyzer_with(Arc::new(BrokenCache), Arc::clone(&source));

        let first = analyzer.analyze("example.com").await.unwrap();
        let second = analyzer.analyze("example.com").await.unwrap();
        assert!(!first.cached);
        assert!(!second.cached);
        assert_eq!(source.calls(), 2);
        // 每次读和写各失败一次
        assert_eq!(metrics.snapshot().cache_errors, 4);
    }

    #[tokio::test]
    async fn test_fetch_failure_names_domain() {
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new(Duration::from_secs(3600)));
        let (analyzer, metrics) = analyzer_with(cache, Arc::new(StubSource::new()));

        let err = analyzer.analyze("missing.com").await.unwrap_err();
        assert!(err.to_string().contains("missing.com"));
        assert_eq!(metrics.snapshot().fetch_errors, 1);
    }

    #[tokio::test]
    async fn test_empty_file_has_no_advertisers() {
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new(Duration::from_secs(3600)));
        let source = Arc::new(StubSource::new().with_page("empty.com", "# nothing here\n"));
        let (analyzer, _) = analyzer_with(cache, source);

        let result = analyzer.analyze("empty.com").await.unwrap();
        assert_eq!(result.total_advertisers, 0);
        assert!(result.advertisers.is_empty());
    }
}
