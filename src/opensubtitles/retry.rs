//! Bounded retry with server-driven backoff.
//!
//! Only [`ApiError::RateLimited`] is retried. The wait before the next
//! attempt is the server's `Retry-After`, else its `RateLimit-Reset`
//! countdown, else one second, capped at [`MAX_WAIT`], plus a random jitter.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use reqwest::header::HeaderMap;
use tracing::warn;

use super::error::ApiError;

/// Wait used when the server gives no hint.
pub const FALLBACK_WAIT: Duration = Duration::from_secs(1);

/// Longest single wait honoured, whatever the server asks for.
pub const MAX_WAIT: Duration = Duration::from_secs(60);

const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(500);

/// Pacing information from a 429 response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitHint {
    /// `Retry-After`, in seconds.
    pub retry_after: Option<Duration>,
    /// `RateLimit-Reset` (or `X-RateLimit-Reset`) countdown.
    pub reset_after: Option<Duration>,
}

impl RateLimitHint {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_seconds)
        };

        Self {
            retry_after: header("retry-after"),
            reset_after: header("ratelimit-reset").or_else(|| header("x-ratelimit-reset")),
        }
    }

    /// The server-indicated wait, or [`FALLBACK_WAIT`], never above
    /// [`MAX_WAIT`].
    pub fn wait(&self) -> Duration {
        self.retry_after
            .or(self.reset_after)
            .unwrap_or(FALLBACK_WAIT)
            .min(MAX_WAIT)
    }
}

/// Parse a delay in (possibly fractional) seconds.
///
/// Returns `None` for anything that is not a non-negative number a
/// [`Duration`] can hold, including the HTTP-date form of `Retry-After`.
pub fn parse_seconds(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

/// How many times to try and how much jitter to add to each wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub max_jitter: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }

    /// Login: 5 attempts.
    pub const fn login() -> Self {
        Self::new(5)
    }

    /// Search and download: 3 attempts.
    pub const fn request() -> Self {
        Self::new(3)
    }

    pub const fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Wait before the next attempt for the given hint.
    pub fn wait_for(&self, hint: &RateLimitHint) -> Duration {
        hint.wait() + self.jitter()
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }

    /// Run `op` until it succeeds, fails with something other than a rate
    /// limit, or the attempts are used up. The last error is returned.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Err(ApiError::RateLimited { hint }) if attempt < self.max_attempts => {
                    let wait = self.wait_for(&hint);
                    warn!(
                        retry = attempt,
                        wait_ms = wait.as_millis() as u64,
                        "{label} rate limited, backing off"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(ApiError::RateLimited { hint }) => {
                    warn!("{label} still rate limited after {attempt} attempts");
                    return Err(ApiError::RateLimited { hint });
                }
                other => return other,
            }
        }
    }
}
