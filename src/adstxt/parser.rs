use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// 广告商域名及其出现次数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvertiserCount {
    pub domain: String,
    pub count: usize,
}

// 行首的广告商域名，后面紧跟逗号
static LINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-zA-Z0-9][a-zA-Z0-9.-]*\.[a-zA-Z0-9][a-zA-Z0-9-]*),")
        .expect("ads.txt line pattern is valid")
});

/// 统计每个广告商域名出现的次数（小写归一），空行、注释和格式错误的行被跳过。
pub fn parse_advertisers(content: &str) -> HashMap<String, usize> {
    let mut advertisers = HashMap::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(captures) = LINE_PATTERN.captures(line) {
            let domain = captures[1].to_ascii_lowercase();
            *advertisers.entry(domain).or_insert(0) += 1;
        }
    }

    advertisers
}

/// 按次数降序排列，次数相同时按域名升序。
pub fn rank_advertisers(advertisers: HashMap<String, usize>) -> Vec<AdvertiserCount> {
    let mut ranked: Vec<AdvertiserCount> = advertisers
        .into_iter()
        .map(|(domain, count)| AdvertiserCount { domain, count })
        .collect();

    ranked.sort_by(|a, b| match b.count.cmp(&a.count) {
        Ordering::Equal => a.domain.cmp(&b.domain),
        other => other,
    });

    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "google.com, pub-1, DIRECT\nAPPNEXUS.com, 2, RESELLER\ngoogle.com, pub-2, DIRECT\n# comment\nnotadomainline";

    #[test]
    fn test_parse_sample() {
        let parsed = parse_advertisers(SAMPLE);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["google.com"], 2);
        assert_eq!(parsed["appnexus.com"], 1);
    }

    #[test]
    fn test_rank_sample() {
        let ranked = rank_advertisers(parse_advertisers(SAMPLE));
        assert_eq!(
            ranked,
            vec![
                AdvertiserCount {
                    domain: "google.com".to_string(),
                    count: 2
                },
                AdvertiserCount {
                    domain: "appnexus.com".to_string(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn test_case_insensitive_counting() {
        let content = "Example.com, 1, DIRECT\nEXAMPLE.COM, 2, DIRECT\nexample.com, 3, RESELLER\n";
        let parsed = parse_advertisers(content);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed["example.com"], 3);
    }

    #[test]
    fn test_empty_and_comment_only() {
        assert!(parse_advertisers("").is_empty());
        assert!(parse_advertisers("# only\n   \n#another comment\n").is_empty());
    }

    #[test]
    fn test_invalid_lines_are_skipped() {
        let content = "invalid line\n, missing domain\nnodot, 1, DIRECT\n  valid.com, 1, DIRECT  \r\n";
        let parsed = parse_advertisers(content);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed["valid.com"], 1);
    }

    #[test]
    fn test_ties_are_ordered_by_domain() {
        let mut counts = HashMap::new();
        counts.insert("zeta.com".to_string(), 1);
        counts.insert("alpha.com".to_string(), 1);
        counts.insert("mid.com".to_string(), 5);
        counts.insert("beta.com".to_string(), 1);

        let domains: Vec<String> = rank_advertisers(counts)
            .into_iter()
            .map(|a| a.domain)
            .collect();
        assert_eq!(domains, vec!["mid.com", "alpha.com", "beta.com", "zeta.com"]);
    }
}
