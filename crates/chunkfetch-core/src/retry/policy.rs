use std::collections::BTreeSet;
use std::time::Duration;

/// Classification of a range failure for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection, timeout or short-body failure; no status available.
    Transport,
    /// Non-2xx HTTP status.
    Status(u16),
    /// Aborted through the cancel token. Never retried.
    Cancelled,
    /// Anything that cannot succeed on retry.
    Fatal,
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry; the range is terminally failed.
    NoRetry,
    /// Resubmit the range after the given delay.
    RetryAfter(Duration),
}

impl RetryDecision {
    pub fn should_retry(&self) -> bool {
        matches!(self, RetryDecision::RetryAfter(_))
    }

    pub fn delay(&self) -> Duration {
        match self {
            RetryDecision::RetryAfter(d) => *d,
            RetryDecision::NoRetry => Duration::ZERO,
        }
    }
}

/// How the delay grows between retries of one range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Exactly `delay` before every retry.
    #[default]
    Fixed,
    /// `delay * 2^(retry-1)`, capped at `max_delay`.
    Exponential { max_delay: Duration },
}

/// Per-range retry policy: at most `retries` resubmissions, `delay` apart,
/// for transport errors and for statuses listed in `retry_on`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries per range (not counting the first attempt).
    pub retries: u32,
    /// Wait before resubmitting a retryable failure.
    pub delay: Duration,
    /// HTTP statuses treated as retryable.
    pub retry_on: BTreeSet<u16>,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            delay: Duration::from_millis(1000),
            retry_on: [429, 500, 502, 503, 504].into_iter().collect(),
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    /// Decide what to do after a failed attempt.
    ///
    /// `retries_used` is how many times this range has already been
    /// resubmitted (0 after the first failure).
    pub fn decide(&self, retries_used: u32, kind: ErrorKind) -> RetryDecision {
        if retries_used >= self.retries {
            return RetryDecision::NoRetry;
        }
        match kind {
            ErrorKind::Transport => RetryDecision::RetryAfter(self.delay_for(retries_used + 1)),
            ErrorKind::Status(code) if self.retry_on.contains(&code) => {
                RetryDecision::RetryAfter(self.delay_for(retries_used + 1))
            }
            ErrorKind::Status(_) | ErrorKind::Cancelled | ErrorKind::Fatal => {
                RetryDecision::NoRetry
            }
        }
    }

    /// Delay before the `retry`-th resubmission (1-based).
    fn delay_for(&self, retry: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential { max_delay } => {
                let exp = 1u32 << retry.saturating_sub(1).min(16);
                self.delay.saturating_mul(exp).min(max_delay)
            }
        }
    }
}
