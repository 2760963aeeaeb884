//! Progress aggregation (per range and per job) and rate/ETA helpers.
//!
//! Each range has its own byte counter, written only by the worker that owns
//! the range. Job-level `loaded` is recomputed from those counters on every
//! update instead of being accumulated, so a retry that resets a range's
//! counter never leaves the job total drifting.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::events::{Emitter, JobEvent};
use crate::planner::ByteRange;

/// `{loaded, total}` for a range or for the whole job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub loaded: u64,
    /// `None` while the length is unknown.
    pub total: Option<u64>,
}

impl ProgressSnapshot {
    /// Fraction complete in `[0.0, 1.0]`. A zero total counts as complete;
    /// an unknown total has no fraction.
    pub fn fraction(&self) -> Option<f64> {
        match self.total {
            Some(0) => Some(1.0),
            Some(total) => Some((self.loaded as f64 / total as f64).min(1.0)),
            None => None,
        }
    }

    /// Rounded percentage, see `fraction`.
    pub fn percent(&self) -> Option<u8> {
        self.fraction().map(|f| (f * 100.0).round() as u8)
    }
}

/// Combines per-range byte counters into job progress and emits both levels.
pub(crate) struct ProgressAggregator {
    loaded: Box<[AtomicU64]>,
    totals: Vec<Option<u64>>,
    content_length: Option<u64>,
    emitter: Arc<Emitter>,
}

impl ProgressAggregator {
    pub(crate) fn new(
        ranges: &[ByteRange],
        content_length: Option<u64>,
        emitter: Arc<Emitter>,
    ) -> Self {
        Self {
            loaded: ranges.iter().map(|_| AtomicU64::new(0)).collect(),
            totals: ranges.iter().map(ByteRange::len).collect(),
            content_length,
            emitter,
        }
    }

    /// Record `loaded` bytes for range `id` and emit range then job progress.
    pub(crate) fn update(&self, id: usize, loaded: u64) {
        let Some(counter) = self.loaded.get(id) else {
            return;
        };
        counter.store(loaded, Ordering::Relaxed);
        // Snapshots are taken under the emitter gate: two workers summing
        // outside it could deliver a larger job total before a smaller one.
        self.emitter.emit_with(|| {
            let range = self.range(id);
            JobEvent::RangeProgress {
                id,
                loaded: range.loaded,
                total: range.total,
            }
        });
        self.emitter.emit_with(|| {
            let job = self.job();
            JobEvent::Progress {
                loaded: job.loaded,
                total: job.total,
            }
        });
    }

    /// Zero a range's counter before a new attempt. Emits nothing; the next
    /// `update` reports the corrected totals.
    pub(crate) fn reset(&self, id: usize) {
        if let Some(counter) = self.loaded.get(id) {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub(crate) fn range(&self, id: usize) -> ProgressSnapshot {
        ProgressSnapshot {
            loaded: self
                .loaded
                .get(id)
                .map(|c| c.load(Ordering::Relaxed))
                .unwrap_or(0),
            total: self.totals.get(id).copied().flatten(),
        }
    }

    /// Job progress: sum of every range's live counter.
    pub(crate) fn job(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            loaded: self.loaded.iter().map(|c| c.load(Ordering::Relaxed)).sum(),
            total: self.content_length,
        }
    }

    /// Emit a job progress event reporting completion. For an unknown length
    /// the total becomes whatever was loaded, so consumers see 100%.
    pub(crate) fn emit_complete(&self) {
        self.emitter.emit_with(|| {
            let job = self.job();
            JobEvent::Progress {
                loaded: job.loaded,
                total: Some(job.total.unwrap_or(job.loaded)),
            }
        });
    }
}

/// Progress plus elapsed time, for rate and ETA display.
#[derive(Debug, Clone, Copy)]
pub struct ProgressStats {
    pub snapshot: ProgressSnapshot,
    /// Seconds since the transfer started.
    pub elapsed_secs: f64,
}

impl ProgressStats {
    /// Download rate in bytes per second (0 if no time has elapsed).
    pub fn bytes_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.snapshot.loaded as f64 / self.elapsed_secs
    }

    /// Estimated seconds remaining (None if the total is unknown or rate is 0).
    pub fn eta_secs(&self) -> Option<f64> {
        let total = self.snapshot.total?;
        let remaining = total.saturating_sub(self.snapshot.loaded);
        if remaining == 0 {
            return Some(0.0);
        }
        let rate = self.bytes_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(remaining as f64 / rate)
    }
}
