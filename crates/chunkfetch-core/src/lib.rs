//! Chunked, parallel HTTP range fetching.
//!
//! A [`Job`] plans a resource into byte ranges, fetches them on a bounded
//! pool of worker threads with per-range retry, writes each range at its
//! offset through an [`Assembler`], and reports progress as [`JobEvent`]s.

pub mod assembler;
pub mod config;
pub mod control;
pub mod events;
pub mod job;
pub mod logging;
pub mod planner;
pub mod pool;
pub mod progress;
pub mod retry;
pub mod source;

#[cfg(test)]
mod testing;

pub use assembler::{Assembler, FileAssembler, MemoryAssembler};
pub use config::{FailureMode, FetchConfig};
pub use control::CancelToken;
pub use events::{Callbacks, JobEvent, JobListener};
pub use job::{Job, JobConfig, JobError, JobOutcome, JobState};
pub use planner::{plan_ranges, ByteRange};
pub use progress::{ProgressSnapshot, ProgressStats};
pub use source::{CurlOptions, CurlSource, Probe, RangeSource};
