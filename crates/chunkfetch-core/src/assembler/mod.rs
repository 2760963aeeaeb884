//! Output assembly: places each completed range's bytes at its offset.
//!
//! Ranges arrive in any order. `write` is idempotent per range id: a second
//! write for an id that was already accepted is ignored. The planner's
//! partition guarantees no two ranges overlap.

mod file;
mod memory;

pub use file::{temp_path, FileAssembler, TEMP_SUFFIX};
pub use memory::MemoryAssembler;

use anyhow::Result;

use crate::planner::ByteRange;

/// Destination for fetched ranges. Shared by all workers of a job.
pub trait Assembler: Send + Sync {
    /// Called once the plan is known, before any write.
    fn prepare(&self, _content_length: Option<u64>, _range_count: usize) -> Result<()> {
        Ok(())
    }

    /// Write `bytes` for `range` at `range.start`. Idempotent per `range.id`.
    fn write(&self, range: &ByteRange, bytes: &[u8]) -> Result<()>;

    /// Called after every range was written, before the job reports finish.
    fn finish(&self) -> Result<()> {
        Ok(())
    }

    /// Called when the job ends cancelled or failed.
    fn abandon(&self) -> Result<()> {
        Ok(())
    }
}

/// Rejects a body whose length disagrees with a bounded range.
fn check_len(range: &ByteRange, bytes: &[u8]) -> Result<()> {
    if let Some(len) = range.len() {
        if bytes.len() as u64 != len {
            anyhow::bail!(
                "range {} is {} bytes but {} were supplied",
                range.id,
                len,
                bytes.len()
            );
        }
    }
    Ok(())
}
