/// 域名最大长度（字节）
pub const MAX_DOMAIN_LENGTH: usize = 253;

// 出现在 URL 结构中的字符，出现任何一个都说明输入不是单纯的域名
const FORBIDDEN_CHARS: &[char] = &[
    '/', ':', '@', '?', '#', '[', ']', '!', '$', '&', '\'', '(', ')', '*', '+', ',', ';', '=',
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("domain cannot be empty")]
    Empty,
    #[error("domain exceeds 253 characters")]
    TooLong,
    #[error("domain contains invalid character {0:?}")]
    InvalidCharacter(char),
    #[error("domain must contain a dot")]
    MissingDot,
}

/// 在发起任何网络请求之前拒绝带协议、路径、端口或空白的输入，
/// 避免批量接口被用来探测任意内部主机。
pub fn validate_domain(input: &str) -> Result<(), DomainError> {
    if input.is_empty() {
        return Err(DomainError::Empty);
    }
    if input.len() > MAX_DOMAIN_LENGTH {
        return Err(DomainError::TooLong);
    }
    if let Some(c) = input
        .chars()
        .find(|c| c.is_whitespace() || FORBIDDEN_CHARS.contains(c))
    {
        return Err(DomainError::InvalidCharacter(c));
    }
    if !input.contains('.') {
        return Err(DomainError::MissingDot);
    }
    Ok(())
}
