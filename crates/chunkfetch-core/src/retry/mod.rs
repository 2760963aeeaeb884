//! Retry policy for range fetches.
//!
//! Classifies per-range failures (transport errors, HTTP statuses,
//! cancellation) and decides whether a range is resubmitted and after what
//! delay. The worker pool owns the actual waiting so that a delayed range
//! never blocks a worker.

mod classify;
mod error;
mod policy;

pub use classify::{classify, classify_curl_error};
pub use error::FetchError;
pub use policy::{Backoff, ErrorKind, RetryDecision, RetryPolicy};
