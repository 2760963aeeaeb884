//! Bounded worker pool for range fetches.
//!
//! Spawns `min(threads, range_count)` OS threads that pull ranges from a
//! shared `WorkQueue`, fetch them through a `RangeSource`, hand finished bytes
//! to the `Assembler`, and resubmit retryable failures after the retry
//! policy's delay. `run_pool` returns once every worker has been joined.

mod queue;
mod worker;

pub(crate) use queue::WorkQueue;

use serde::Serialize;
use std::sync::mpsc;
use std::sync::Arc;

use crate::assembler::Assembler;
use crate::config::FailureMode;
use crate::control::CancelToken;
use crate::events::Emitter;
use crate::planner::ByteRange;
use crate::progress::ProgressAggregator;
use crate::retry::RetryPolicy;
use crate::source::RangeSource;

/// Lifecycle of one range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RangeState {
    /// Not yet picked up (or aborted by cancellation before finishing).
    Pending,
    Downloading,
    /// Failed with a retryable error; waiting for its retry delay.
    RetryWaiting,
    Finished,
    /// Retries exhausted or non-retryable failure.
    Failed,
}

/// One range plus its mutable state; owned by the queue or by one worker.
#[derive(Debug)]
pub(crate) struct RangeTask {
    pub(crate) range: ByteRange,
    pub(crate) state: RangeState,
    pub(crate) attempts: u32,
}

impl RangeTask {
    pub(crate) fn new(range: ByteRange) -> Self {
        Self {
            range,
            state: RangeState::Pending,
            attempts: 0,
        }
    }
}

/// Final state of one range after the pool ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeReport {
    pub range: ByteRange,
    pub state: RangeState,
    pub attempts: u32,
    /// Last error for a `Failed` range.
    pub error: Option<String>,
}

/// Outcome of a pool run, indexed by range id.
#[derive(Debug, Clone, Default)]
pub struct PoolReport {
    pub ranges: Vec<RangeReport>,
}

impl PoolReport {
    pub fn all_finished(&self) -> bool {
        self.ranges.iter().all(|r| r.state == RangeState::Finished)
    }

    pub fn finished_count(&self) -> usize {
        self.count(RangeState::Finished)
    }

    pub fn failed(&self) -> impl Iterator<Item = &RangeReport> {
        self.ranges.iter().filter(|r| r.state == RangeState::Failed)
    }

    fn count(&self, state: RangeState) -> usize {
        self.ranges.iter().filter(|r| r.state == state).count()
    }
}

/// Pool sizing and failure behaviour.
#[derive(Debug, Clone)]
pub(crate) struct PoolConfig {
    pub(crate) threads: usize,
    pub(crate) retry: RetryPolicy,
    pub(crate) failure_mode: FailureMode,
}

/// Everything a worker touches, shared by reference across the pool.
pub(crate) struct PoolContext {
    pub(crate) queue: Arc<WorkQueue>,
    pub(crate) source: Arc<dyn RangeSource>,
    pub(crate) assembler: Arc<dyn Assembler>,
    pub(crate) progress: Arc<ProgressAggregator>,
    pub(crate) emitter: Arc<Emitter>,
    /// Aborts in-flight fetches (job cancel, or fail-fast).
    pub(crate) cancel: CancelToken,
}

/// Terminal record a worker sends back for one range.
pub(crate) struct Outcome {
    pub(crate) task: RangeTask,
    pub(crate) error: Option<String>,
}

/// Run every range in `ranges` to a terminal state (or until cancelled).
pub(crate) fn run_pool(ranges: Vec<ByteRange>, cfg: &PoolConfig, ctx: &PoolContext) -> PoolReport {
    let count = ranges.len();
    let mut reports: Vec<RangeReport> = ranges
        .iter()
        .map(|r| RangeReport {
            range: *r,
            state: RangeState::Pending,
            attempts: 0,
            error: None,
        })
        .collect();
    if count == 0 {
        return PoolReport { ranges: reports };
    }

    ctx.queue.seed(ranges.into_iter().map(RangeTask::new));
    let (tx, rx) = mpsc::channel::<Outcome>();
    let num_workers = cfg.threads.max(1).min(count);
    tracing::debug!(workers = num_workers, ranges = count, "starting worker pool");

    std::thread::scope(|s| {
        let mut handles = Vec::with_capacity(num_workers);
        for n in 0..num_workers {
            let tx = tx.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("range-worker-{}", n))
                .spawn_scoped(s, move || worker::run(n, cfg, ctx, &tx));
            match spawned {
                Ok(h) => handles.push(h),
                Err(e) => tracing::error!(worker = n, "failed to spawn worker: {}", e),
            }
        }
        drop(tx);
        if handles.is_empty() {
            ctx.queue.close();
        }
        for h in handles {
            if h.join().is_err() {
                tracing::error!("range worker panicked");
            }
        }
    });

    // Leftovers from a closed queue stay Pending in the report.
    for outcome in rx.try_iter() {
        let id = outcome.task.range.id;
        if let Some(report) = reports.get_mut(id) {
            report.state = outcome.task.state;
            report.attempts = outcome.task.attempts;
            report.error = outcome.error;
        }
    }
    PoolReport { ranges: reports }
}
