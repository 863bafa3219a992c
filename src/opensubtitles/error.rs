use thiserror::Error;

use super::retry::RateLimitHint;

/// Failures talking to the subtitle catalogue.
///
/// Retry and re-authentication decisions match on these variants.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 401/403: credentials or token rejected.
    #[error("authentication rejected (HTTP {status})")]
    Unauthorized { status: u16 },

    /// 429 with whatever pacing hint the server sent.
    #[error("rate limited by server")]
    RateLimited { hint: RateLimitHint },

    /// 406, or a negative `remaining` count.
    #[error("download quota exhausted")]
    QuotaExhausted,

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("token cache: {0}")]
    TokenCache(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }
}
