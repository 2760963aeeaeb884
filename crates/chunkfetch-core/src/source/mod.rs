//! Where range bytes come from.
//!
//! `RangeSource` is the seam between the worker pool and the network:
//! `CurlSource` performs real HTTP range GETs with libcurl; tests plug in
//! in-process sources.

mod curl;
mod parse;
mod probe;

pub use self::curl::{CurlOptions, CurlSource};
pub use self::probe::probe;

use crate::control::CancelToken;
use crate::planner::ByteRange;
use crate::retry::FetchError;

/// What the server told us about the resource before planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Probe {
    /// Total size in bytes, if `Content-Length` (or `Content-Range`) gave one.
    pub content_length: Option<u64>,
    /// True if the server can serve byte ranges.
    pub accept_ranges: bool,
}

/// Fetches byte ranges of one resource.
pub trait RangeSource: Send + Sync {
    /// Discover the content length and range support. Returns
    /// `FetchError::Cancelled` once `cancel` is set.
    fn probe(&self, cancel: &CancelToken) -> Result<Probe, FetchError>;

    /// Fetch `range` and return its bytes.
    ///
    /// `on_bytes` is called after every received segment with the number of
    /// bytes received so far for this attempt. Implementations must check
    /// `cancel` between reads and return `FetchError::Cancelled` once it is set.
    fn fetch(
        &self,
        range: &ByteRange,
        cancel: &CancelToken,
        on_bytes: &mut dyn FnMut(u64),
    ) -> Result<Vec<u8>, FetchError>;
}
