/// 分析结果缓存键前缀
const ANALYSIS_PREFIX: &str = "adstxt:";

/// 健康检查缓存键前缀
const HEALTH_CHECK_PREFIX: &str = "health:check:";

/// 生成分析结果缓存键，域名不区分大小写
pub fn analysis_key(domain: &str) -> String {
    format!("{}{}", ANALYSIS_PREFIX, domain.to_ascii_lowercase())
}

/// 每次健康检查使用独立的键，并发检查互不干扰
pub fn health_check_key() -> String {
    format!("{}{}", HEALTH_CHECK_PREFIX, uuid::Uuid::new_v4())
}
