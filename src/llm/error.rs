//! Failure classification for the completion provider.
//!
//! A completions call can fail before the HTTP exchange, on a non-success
//! status, or while decoding the body. Each failure is folded into a
//! [`LlmError`] whose kind decides whether a retry can help and how long
//! to wait before one.

use std::fmt;
use std::time::Duration;

/// Ceiling for any computed backoff delay.
const MAX_BACKOFF_SECS: u64 = 60;

/// A classified failure from the completion endpoint.
#[derive(Debug)]
pub struct LlmError {
    pub kind: LlmErrorKind,
    /// Status of the failed response; `None` when the request never
    /// produced one.
    pub status_code: Option<u16>,
    pub message: String,
    /// Server-provided wait hint, taken from a `Retry-After` header.
    pub retry_after: Option<Duration>,
}

impl LlmError {
    /// Classify a non-success HTTP response.
    pub fn from_status(status: u16, body: String, retry_after: Option<Duration>) -> Self {
        Self {
            kind: LlmErrorKind::from_status(status),
            status_code: Some(status),
            message: body,
            retry_after,
        }
    }

    /// The request never reached a response (connect failure, timeout).
    pub fn network_error(message: String) -> Self {
        Self {
            kind: LlmErrorKind::NetworkError,
            status_code: None,
            message,
            retry_after: None,
        }
    }

    /// The response arrived but its body was not the expected shape.
    pub fn parse_error(message: String) -> Self {
        Self {
            kind: LlmErrorKind::ParseError,
            status_code: None,
            message,
            retry_after: None,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }

    /// How long to wait before the given retry attempt.
    ///
    /// A server-provided `Retry-After` always wins. Otherwise the delay
    /// doubles per attempt from a per-kind base, plus a small
    /// deterministic jitter, capped at 60 seconds.
    pub fn suggested_delay(&self, attempt: u32) -> Duration {
        if let Some(hinted) = self.retry_after {
            return hinted;
        }

        let backed_off = self
            .kind
            .base_delay_secs()
            .saturating_mul(2u64.saturating_pow(attempt));
        // jitter stays under a quarter of the backoff
        let quarter = backed_off / 4;
        let jitter = if quarter > 0 {
            u64::from(attempt).wrapping_mul(13) % quarter
        } else {
            0
        };

        Duration::from_secs((backed_off + jitter).min(MAX_BACKOFF_SECS))
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(code) = self.status_code {
            write!(f, " (HTTP {})", code)?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for LlmError {}

/// What went wrong, reduced to what the retry policy needs to know.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// 429: the provider asked for a slower pace.
    RateLimited,
    /// 5xx: a later attempt may go through.
    ServerError,
    /// Other 4xx: the request itself is bad and will stay bad.
    ClientError,
    /// The exchange never completed.
    NetworkError,
    /// The body did not decode as a completions response.
    ParseError,
}

impl LlmErrorKind {
    /// Map an HTTP status onto a kind. Unrecognized statuses are treated
    /// as server-side trouble.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => LlmErrorKind::RateLimited,
            400..=499 => LlmErrorKind::ClientError,
            _ => LlmErrorKind::ServerError,
        }
    }

    /// Whether a retry of the same request can succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmErrorKind::RateLimited | LlmErrorKind::ServerError | LlmErrorKind::NetworkError => {
                true
            }
            LlmErrorKind::ClientError | LlmErrorKind::ParseError => false,
        }
    }

    fn base_delay_secs(&self) -> u64 {
        match self {
            LlmErrorKind::RateLimited => 5,
            LlmErrorKind::ServerError => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LlmErrorKind::RateLimited => "rate limited",
            LlmErrorKind::ServerError => "server error",
            LlmErrorKind::ClientError => "client error",
            LlmErrorKind::NetworkError => "network error",
            LlmErrorKind::ParseError => "parse error",
        };
        f.write_str(label)
    }
}

/// Retry policy for the completion client.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retry attempts allowed after the initial request.
    pub max_retries: u32,
    /// Wall-clock budget across all attempts and waits.
    pub max_retry_duration: Duration,
    pub retry_rate_limits: bool,
    pub retry_server_errors: bool,
    pub retry_network_errors: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_retry_duration: Duration::from_secs(120),
            retry_rate_limits: true,
            retry_server_errors: true,
            retry_network_errors: true,
        }
    }
}

impl RetryConfig {
    /// Whether this policy retries the given failure.
    pub fn should_retry(&self, error: &LlmError) -> bool {
        if !error.is_transient() {
            return false;
        }
        match error.kind {
            LlmErrorKind::RateLimited => self.retry_rate_limits,
            LlmErrorKind::ServerError => self.retry_server_errors,
            LlmErrorKind::NetworkError => self.retry_network_errors,
            LlmErrorKind::ClientError | LlmErrorKind::ParseError => false,
        }
    }
}
