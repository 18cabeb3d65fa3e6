use std::time::Duration;

/// High-level classification of an error for retry purposes.
///
/// Callers map HTTP statuses, response bodies and transport failures into
/// these kinds via the functions in `classify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation timed out (connect/read, or HTTP 408).
    Timeout,
    /// Server asked us to slow down (429, 503, or throttling text in the body).
    Throttled,
    /// Network-level failure (connection reset, DNS, etc.).
    Connection,
    /// Retryable status that is not throttling (409, 500, 502, 504).
    Transient(u16),
    /// Any other error (never retried).
    Other,
}

/// Whether an error is worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Fatal,
    Retryable,
}

impl ErrorKind {
    pub fn verdict(&self) -> Verdict {
        match self {
            ErrorKind::Other => Verdict::Fatal,
            ErrorKind::Timeout
            | ErrorKind::Throttled
            | ErrorKind::Connection
            | ErrorKind::Transient(_) => Verdict::Retryable,
        }
    }
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Exponential backoff policy with a cap and optional server hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Base delay for backoff.
    pub base_delay: Duration,
    /// Upper bound on computed backoff delay.
    pub max_delay: Duration,
    /// Use a numeric server `Retry-After` hint instead of the computed delay.
    pub honor_retry_after: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            honor_retry_after: true,
        }
    }
}

impl RetryPolicy {
    /// Computed delay after failed attempt `attempt` (1-based):
    /// `min(base * 2^(attempt-1), max_delay)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        // Saturate to the cap once 2^(attempt-1) or the product overflows.
        2u32.checked_pow(attempt.saturating_sub(1))
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Decide what to do after failed attempt `attempt` (1-based) with the
    /// given error kind and optional server hint.
    pub fn decide(&self, attempt: u32, kind: ErrorKind, hint: Option<Duration>) -> RetryDecision {
        if attempt >= self.max_attempts || kind.verdict() == Verdict::Fatal {
            return RetryDecision::NoRetry;
        }
        let delay = match hint {
            Some(h) if self.honor_retry_after => h,
            _ => self.backoff(attempt),
        };
        RetryDecision::RetryAfter(delay)
    }
}
