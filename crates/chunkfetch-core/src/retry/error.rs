//! Range fetch error type.

use thiserror::Error;

/// Error returned by a single range fetch.
///
/// Kept typed (not `anyhow`) so the retry policy can classify it before it is
/// turned into a range-error event.
#[derive(Debug, Error)]
pub enum FetchError {
    /// libcurl reported a failure (timeout, connection reset, DNS, ...).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// Transport failure from a non-curl source.
    #[error("transport: {0}")]
    Io(#[from] std::io::Error),
    /// Response had a non-2xx status.
    #[error("HTTP {0}")]
    Http(u16),
    /// Body length did not match the requested range (server closed early or
    /// sent too much).
    #[error("partial transfer: expected {expected} bytes, got {received}")]
    PartialTransfer { expected: u64, received: u64 },
    /// Server answered a ranged request with the full body.
    #[error("server ignored Range request starting at byte {start}")]
    RangeIgnored { start: u64 },
    /// Fetch was aborted through its cancel token.
    #[error("cancelled")]
    Cancelled,
    /// The assembler refused the bytes (disk full, permission denied, ...).
    #[error("output: {0}")]
    Sink(String),
}

impl FetchError {
    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Http(code) => Some(*code),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}
