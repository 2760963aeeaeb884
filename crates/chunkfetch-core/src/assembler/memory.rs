//! In-memory assembler.

use anyhow::{Context, Result};
use std::sync::Mutex;

use super::{check_len, Assembler};
use crate::control::lock;
use crate::planner::{ByteRange, RangeBitmap};

#[derive(Default)]
struct Buffer {
    data: Vec<u8>,
    accepted: RangeBitmap,
    range_count: usize,
}

/// Collects the resource into a `Vec<u8>`.
#[derive(Default)]
pub struct MemoryAssembler {
    inner: Mutex<Buffer>,
}

impl MemoryAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the bytes assembled so far. Gaps (ranges not yet written) are zero.
    pub fn bytes(&self) -> Vec<u8> {
        lock(&self.inner).data.clone()
    }

    /// Take the assembled bytes, leaving the buffer empty.
    pub fn take_bytes(&self) -> Vec<u8> {
        std::mem::take(&mut lock(&self.inner).data)
    }

    /// True if range `id` has been written.
    pub fn is_accepted(&self, id: usize) -> bool {
        lock(&self.inner).accepted.contains(id)
    }

    /// Number of ranges written.
    pub fn accepted_count(&self) -> usize {
        lock(&self.inner).accepted.count()
    }
}

impl Assembler for MemoryAssembler {
    fn prepare(&self, content_length: Option<u64>, range_count: usize) -> Result<()> {
        let mut buf = lock(&self.inner);
        buf.accepted = RangeBitmap::new(range_count);
        buf.range_count = range_count;
        buf.data.clear();
        if let Some(len) = content_length {
            let len = usize::try_from(len).context("content too large for memory")?;
            buf.data.resize(len, 0);
        }
        Ok(())
    }

    fn write(&self, range: &ByteRange, bytes: &[u8]) -> Result<()> {
        check_len(range, bytes)?;
        let mut buf = lock(&self.inner);
        if !buf.accepted.insert(range.id) {
            tracing::debug!(range = range.id, "duplicate write ignored");
            return Ok(());
        }
        let start = usize::try_from(range.start).context("offset too large for memory")?;
        let end = start + bytes.len();
        if buf.data.len() < end {
            buf.data.resize(end, 0);
        }
        buf.data[start..end].copy_from_slice(bytes);
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        let buf = lock(&self.inner);
        if !buf.accepted.all(buf.range_count) {
            anyhow::bail!(
                "only {} of {} ranges were written",
                buf.accepted.count(),
                buf.range_count
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::plan_ranges;

    #[test]
    fn out_of_order_writes_reassemble() {
        let body: Vec<u8> = (0u8..=255).cycle().take(1000).collect();
        let ranges = plan_ranges(Some(1000), 300);
        let asm = MemoryAssembler::new();
        asm.prepare(Some(1000), ranges.len()).unwrap();
        for r in ranges.iter().rev() {
            let (s, e) = (r.start as usize, r.end.unwrap() as usize);
            asm.write(r, &body[s..e]).unwrap();
        }
        assert_eq!(asm.bytes(), body);
        assert_eq!(asm.accepted_count(), 4);
    }

    #[test]
    fn second_write_for_same_id_is_ignored() {
        let ranges = plan_ranges(Some(4), 2);
        let asm = MemoryAssembler::new();
        asm.prepare(Some(4), 2).unwrap();
        asm.write(&ranges[0], b"ab").unwrap();
        asm.write(&ranges[0], b"zz").unwrap();
        asm.write(&ranges[1], b"cd").unwrap();
        assert_eq!(asm.take_bytes(), b"abcd");
    }

    #[test]
    fn wrong_length_is_rejected() {
        let ranges = plan_ranges(Some(4), 2);
        let asm = MemoryAssembler::new();
        asm.prepare(Some(4), 2).unwrap();
        assert!(asm.write(&ranges[1], b"c").is_err());
        assert!(!asm.is_accepted(1));
    }

    #[test]
    fn finish_requires_every_range() {
        let ranges = plan_ranges(Some(6), 2);
        let asm = MemoryAssembler::new();
        asm.prepare(Some(6), 3).unwrap();
        asm.write(&ranges[0], b"ab").unwrap();
        asm.write(&ranges[2], b"ef").unwrap();
        assert!(asm.finish().is_err());
        asm.write(&ranges[1], b"cd").unwrap();
        asm.finish().unwrap();
    }

    #[test]
    fn unbounded_range_grows_buffer() {
        let ranges = plan_ranges(None, 2);
        let asm = MemoryAssembler::new();
        asm.prepare(None, 1).unwrap();
        asm.write(&ranges[0], b"hello").unwrap();
        assert_eq!(asm.bytes(), b"hello");
    }
}
