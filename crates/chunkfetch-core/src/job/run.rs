//! Coordinator thread: probe, plan, run the pool, settle the outcome.

use std::sync::Arc;

use super::{JobConfig, JobError, JobOutcome, JobState, RangeFailure, Shared};
use crate::control::lock;
use crate::events::JobEvent;
use crate::planner::{plan_ranges, plan_single, ByteRange};
use crate::pool::{run_pool, PoolConfig, PoolContext, PoolReport};
use crate::progress::ProgressAggregator;
use crate::retry::FetchError;
use crate::source::Probe;

pub(super) fn run(cfg: &JobConfig, shared: &Shared) -> JobOutcome {
    let result = execute(cfg, shared);
    settle(cfg, shared, result)
}

/// What the coordinator learned before settling the job state.
enum Ran {
    /// Every range was accepted by the assembler.
    Complete,
    Failed(JobError),
    /// Stopped by cancellation before anything failed.
    Stopped,
}

fn discover(cfg: &JobConfig, shared: &Shared) -> Probe {
    if let Some(len) = cfg.content_length {
        return Probe {
            content_length: Some(len),
            accept_ranges: true,
        };
    }
    match shared.source.probe(&shared.cancel) {
        Ok(p) => {
            tracing::debug!(
                content_length = ?p.content_length,
                accept_ranges = p.accept_ranges,
                "probe"
            );
            p
        }
        Err(FetchError::Cancelled) => {
            tracing::debug!(url = %cfg.url, "probe cancelled");
            Probe::default()
        }
        Err(e) => {
            tracing::warn!(url = %cfg.url, "probe failed, fetching as one unbounded range: {}", e);
            Probe::default()
        }
    }
}

fn execute(cfg: &JobConfig, shared: &Shared) -> Ran {
    let probe = discover(cfg, shared);
    if shared.cancel.is_cancelled() {
        return Ran::Stopped;
    }
    let content_length = probe.content_length;
    let ranges: Vec<ByteRange> = if probe.accept_ranges {
        plan_ranges(content_length, cfg.chunk_size)
    } else {
        tracing::info!(url = %cfg.url, "server does not accept ranges, using one request");
        plan_single(content_length)
    };

    if let Err(e) = shared.assembler.prepare(content_length, ranges.len()) {
        return Ran::Failed(JobError::Output(format!("{:#}", e)));
    }

    let progress = Arc::new(ProgressAggregator::new(
        &ranges,
        content_length,
        Arc::clone(&shared.emitter),
    ));
    shared.emitter.emit(JobEvent::Start {
        content_length,
        range_count: ranges.len(),
    });

    if ranges.is_empty() {
        progress.emit_complete();
        return Ran::Complete;
    }

    let pool_cfg = PoolConfig {
        threads: cfg.threads,
        retry: cfg.retry.clone(),
        failure_mode: cfg.failure_mode,
    };
    let ctx = PoolContext {
        queue: Arc::clone(&shared.queue),
        source: Arc::clone(&shared.source),
        assembler: Arc::clone(&shared.assembler),
        progress: Arc::clone(&progress),
        emitter: Arc::clone(&shared.emitter),
        cancel: shared.cancel.clone(),
    };
    let report = run_pool(ranges, &pool_cfg, &ctx);
    tracing::debug!(
        finished = report.finished_count(),
        total = report.ranges.len(),
        "pool drained"
    );

    if report.all_finished() {
        if content_length.is_none() {
            progress.emit_complete();
        }
        return Ran::Complete;
    }
    let failures = failures(&report);
    if !failures.is_empty() {
        return Ran::Failed(JobError::RangesFailed {
            failures,
            total: report.ranges.len(),
        });
    }
    if shared.cancel.is_cancelled() {
        return Ran::Stopped;
    }
    let pending = report.ranges.len() - report.finished_count();
    Ran::Failed(JobError::Incomplete { pending })
}

fn failures(report: &PoolReport) -> Vec<RangeFailure> {
    report
        .failed()
        .map(|r| RangeFailure {
            id: r.range.id,
            start: r.range.start,
            end: r.range.end,
            error: r.error.clone().unwrap_or_default(),
        })
        .collect()
}

/// Decide the terminal state under the state lock, then emit outside it.
fn settle(cfg: &JobConfig, shared: &Shared, ran: Ran) -> JobOutcome {
    let outcome = {
        let mut state = lock(&shared.state);
        let outcome = if *state == JobState::Cancelling {
            JobOutcome::Cancelled
        } else {
            match ran {
                Ran::Complete => match shared.assembler.finish() {
                    Ok(()) => JobOutcome::Finished,
                    Err(e) => JobOutcome::Failed(JobError::Output(format!("{:#}", e))),
                },
                Ran::Failed(e) => JobOutcome::Failed(e),
                // Token set with no cancel request behind it.
                Ran::Stopped => JobOutcome::Failed(JobError::Incomplete { pending: 0 }),
            }
        };
        *state = outcome.state();
        outcome
    };

    if outcome != JobOutcome::Finished {
        if let Err(e) = shared.assembler.abandon() {
            tracing::warn!("discarding partial output failed: {:#}", e);
        }
    }

    match &outcome {
        JobOutcome::Finished => {
            tracing::info!(url = %cfg.url, "job finished");
            shared.emitter.emit(JobEvent::Finish);
        }
        JobOutcome::Failed(e) => {
            tracing::error!(url = %cfg.url, "job failed: {}", e);
            shared.emitter.emit(JobEvent::Error {
                error: e.to_string(),
            });
        }
        JobOutcome::Cancelled => {
            tracing::info!(url = %cfg.url, "job cancelled");
        }
    }
    shared.emitter.close();
    outcome
}
