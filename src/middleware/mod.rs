mod error_handler;
mod rate_limit;

pub use error_handler::{log_errors, log_requests};
pub use rate_limit::{RateLimitState, client_ip, rate_limit};
