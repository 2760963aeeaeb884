//! Range completion bitmap.

/// One bit per range id (LSB of byte 0 = range 0).
///
/// Used by the assemblers to make `write` idempotent per range id.
#[derive(Debug, Clone, Default)]
pub struct RangeBitmap {
    bytes: Vec<u8>,
}

impl RangeBitmap {
    /// New empty bitmap with capacity for `range_count` bits.
    pub fn new(range_count: usize) -> Self {
        RangeBitmap {
            bytes: vec![0u8; range_count.div_ceil(8)],
        }
    }

    /// Mark range `id` as done. Returns `false` if it was already set.
    pub fn insert(&mut self, id: usize) -> bool {
        let byte_idx = id / 8;
        let bit = 1u8 << (id % 8);
        if byte_idx >= self.bytes.len() {
            self.bytes.resize(byte_idx + 1, 0);
        }
        let was_set = self.bytes[byte_idx] & bit != 0;
        self.bytes[byte_idx] |= bit;
        !was_set
    }

    /// True if range `id` is marked done.
    pub fn contains(&self, id: usize) -> bool {
        self.bytes
            .get(id / 8)
            .map(|&b| b & (1 << (id % 8)) != 0)
            .unwrap_or(false)
    }

    /// Number of ranges marked done.
    pub fn count(&self) -> usize {
        self.bytes.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// True if every range in `[0, range_count)` is marked done.
    pub fn all(&self, range_count: usize) -> bool {
        (0..range_count).all(|id| self.contains(id))
    }
}
