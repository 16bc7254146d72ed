use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::{AnalysisResult, Analyzer};
use crate::adstxt::validate_domain;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub max_domains: usize,
    pub timeout: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_domains: 50,
            timeout: Duration::from_secs(30),
        }
    }
}

/// 成功结果的顺序由完成顺序决定，不作保证
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub results: Vec<AnalysisResult>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
}

impl BatchResult {
    fn record(&mut self, domain: String, outcome: Result<AnalysisResult, String>) {
        match outcome {
            Ok(result) => self.results.push(result),
            Err(message) => {
                self.errors.insert(domain, message);
            }
        }
    }
}

/// 在启动任何并发任务之前就能发现的整体错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    #[error("domains array cannot be empty")]
    Empty,
    #[error("maximum {max} domains per batch request, got {requested}")]
    TooManyDomains { max: usize, requested: usize },
}

/// 每个域名一个任务，共享同一个截止时间；单个域名的失败只记录在
/// `errors` 里，不影响其他域名。所有任务结束后才返回。
pub async fn analyze_batch(
    analyzer: Arc<Analyzer>,
    domains: Vec<String>,
    options: &BatchOptions,
) -> Result<BatchResult, BatchError> {
    if domains.is_empty() {
        return Err(BatchError::Empty);
    }
    if domains.len() > options.max_domains {
        return Err(BatchError::TooManyDomains {
            max: options.max_domains,
            requested: domains.len(),
        });
    }

    let deadline = Instant::now() + options.timeout;

    // 重复的域名只分析一次
    let mut seen = HashSet::new();
    let domains: Vec<String> = domains
        .into_iter()
        .filter(|domain| seen.insert(domain.clone()))
        .collect();

    let outcome = Arc::new(Mutex::new(BatchResult::default()));

    let handles: Vec<_> = domains
        .iter()
        .cloned()
        .map(|domain| {
            let analyzer = Arc::clone(&analyzer);
            let outcome = Arc::clone(&outcome);
            tokio::spawn(async move {
                let result = analyze_one(&analyzer, &domain, deadline).await;
                // 只在写入结果时持锁
                outcome
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .record(domain, result);
            })
        })
        .collect();

    let joined = join_all(handles).await;

    let mut outcome = outcome.lock().unwrap_or_else(PoisonError::into_inner);
    for (domain, joined) in domains.iter().zip(joined) {
        if let Err(e) = joined {
            tracing::error!("Analysis task for {} failed: {}", domain, e);
            outcome
                .errors
                .entry(domain.clone())
                .or_insert_with(|| "internal error during analysis".to_string());
        }
    }
    let result = std::mem::take(&mut *outcome);

    tracing::info!(
        "Batch analysis finished: {} succeeded, {} failed",
        result.results.len(),
        result.errors.len()
    );

    Ok(result)
}

async fn analyze_one(
    analyzer: &Analyzer,
    domain: &str,
    deadline: Instant,
) -> Result<AnalysisResult, String> {
    // 只在开始前检查截止时间，已经开始的下载不会被打断
    if Instant::now() >= deadline {
        return Err("request timeout".to_string());
    }

    validate_domain(domain).map_err(|e| format!("invalid domain: {}", e))?;

    analyzer.analyze(domain).await.map_err(|e| e.to_string())
}
