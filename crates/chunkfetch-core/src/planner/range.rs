//! Byte range type and chunk planning.

use serde::Serialize;

/// One contiguous byte interval `[start, end)` of the resource.
///
/// `id` is the position in the plan; ids ascend with `start`. `end` is `None`
/// only when the content length is unknown, in which case the plan holds this
/// single range and it runs to the end of the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ByteRange {
    pub id: usize,
    /// Start offset (inclusive).
    pub start: u64,
    /// End offset (exclusive), `None` if unbounded.
    pub end: Option<u64>,
}

impl ByteRange {
    /// Length in bytes, if bounded.
    pub fn len(&self) -> Option<u64> {
        self.end.map(|end| end.saturating_sub(self.start))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// HTTP Range header value (inclusive end): `bytes=start-(end-1)`.
    /// `None` for an unbounded range starting at 0 (plain GET).
    pub fn range_header_value(&self) -> Option<String> {
        self.curl_range().map(|r| format!("bytes={}", r))
    }

    /// Range in the form curl expects (`start-end`, inclusive, no `bytes=`).
    pub fn curl_range(&self) -> Option<String> {
        match self.end {
            Some(end) if end > self.start => Some(format!("{}-{}", self.start, end - 1)),
            Some(_) => Some(format!("{}-{}", self.start, self.start)),
            None if self.start == 0 => None,
            None => Some(format!("{}-", self.start)),
        }
    }
}

/// Builds the range plan for `content_length` bytes in chunks of `chunk_size`.
///
/// Ranges are `[i*C, min((i+1)*C, L))` for `i` in `0..ceil(L/C)`; only the
/// last one may be shorter. `L = 0` yields no ranges. An unknown length yields
/// a single unbounded range. `chunk_size` of 0 is treated as 1.
pub fn plan_ranges(content_length: Option<u64>, chunk_size: u64) -> Vec<ByteRange> {
    let Some(total) = content_length else {
        return vec![ByteRange {
            id: 0,
            start: 0,
            end: None,
        }];
    };
    let chunk_size = chunk_size.max(1);
    let count = total.div_ceil(chunk_size);

    let mut out = Vec::with_capacity(count as usize);
    let mut offset = 0u64;
    for id in 0..count as usize {
        let end = offset.saturating_add(chunk_size).min(total);
        out.push(ByteRange {
            id,
            start: offset,
            end: Some(end),
        });
        offset = end;
    }
    out
}

/// Plan for servers that cannot serve ranges: one range covering everything.
pub fn plan_single(content_length: Option<u64>) -> Vec<ByteRange> {
    match content_length {
        Some(0) => Vec::new(),
        other => vec![ByteRange {
            id: 0,
            start: 0,
            end: other,
        }],
    }
}
