//! ads.txt 的获取、解析与域名校验

mod fetcher;
mod parser;
mod validate;

pub use fetcher::{AdsTxtSource, FetchError, Fetcher, MAX_RESPONSE_SIZE, USER_AGENT};
pub use parser::{AdvertiserCount, parse_advertisers, rank_advertisers};
pub use validate::{DomainError, MAX_DOMAIN_LENGTH, validate_domain};
