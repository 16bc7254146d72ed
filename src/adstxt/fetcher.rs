use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, redirect};

/// ads.txt 响应体上限，超出部分被截断
pub const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

pub const USER_AGENT: &str = "AdsTxtBot/1.0";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// 两次读之间（包括等待响应头）的最长间隔
pub const READ_TIMEOUT: Duration = Duration::from_secs(5);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const POOL_MAX_IDLE_PER_HOST: usize = 10;
const MAX_REDIRECTS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("failed to fetch ads.txt for {domain}: {reason}")]
    Unavailable { domain: String, reason: String },
}

/// 获取某个域名 ads.txt 原始内容的来源
#[async_trait]
pub trait AdsTxtSource: Send + Sync {
    async fn fetch(&self, domain: &str) -> Result<String, FetchError>;
}

/// 基于 reqwest 的 ads.txt 下载器，依次尝试 https、http 和 www 前缀
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    max_response_size: usize,
}

impl Fetcher {
    /// `timeout` 作用于每一次尝试。
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        Self::with_timeouts(timeout, READ_TIMEOUT)
    }

    /// `read_timeout` 限制连接上的每次读，卡在响应头之前的服务器也会超时。
    pub fn with_timeouts(timeout: Duration, read_timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(read_timeout)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            max_response_size: MAX_RESPONSE_SIZE,
        })
    }

    pub fn with_max_response_size(mut self, max_response_size: usize) -> Self {
        self.max_response_size = max_response_size;
        self
    }

    fn candidate_urls(domain: &str) -> [String; 3] {
        [
            format!("https://{}/ads.txt", domain),
            format!("http://{}/ads.txt", domain),
            format!("https://www.{}/ads.txt", domain),
        ]
    }

    async fn fetch_url(&self, url: &str) -> Result<String, String> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if response.status() != StatusCode::OK {
            return Err(format!("status code: {}", response.status().as_u16()));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| e.to_string())? {
            let room = self.max_response_size - body.len();
            if chunk.len() >= room {
                body.extend_from_slice(&chunk[..room]);
                tracing::warn!("Truncated ads.txt response from {} at {} bytes", url, body.len());
                break;
            }
            body.extend_from_slice(&chunk);
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[async_trait]
impl AdsTxtSource for Fetcher {
    async fn fetch(&self, domain: &str) -> Result<String, FetchError> {
        let mut last_error = String::from("no attempts made");

        for url in Self::candidate_urls(domain) {
            match self.fetch_url(&url).await {
                Ok(content) => {
                    tracing::debug!("Fetched {} ({} bytes)", url, content.len());
                    return Ok(content);
                }
                Err(e) => {
                    tracing::debug!("Fetching {} failed: {}", url, e);
                    last_error = e;
                }
            }
        }

        Err(FetchError::Unavailable {
            domain: domain.to_string(),
            reason: last_error,
        })
    }
}
