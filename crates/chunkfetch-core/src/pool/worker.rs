//! Worker loop: one range at a time until the queue runs dry or closes.

use std::sync::mpsc;

use super::{Outcome, PoolConfig, PoolContext, RangeState, RangeTask};
use crate::config::FailureMode;
use crate::events::JobEvent;
use crate::retry::{classify, FetchError, RetryDecision};

pub(super) fn run(n: usize, cfg: &PoolConfig, ctx: &PoolContext, tx: &mpsc::Sender<Outcome>) {
    while let Some(mut task) = ctx.queue.next() {
        let id = task.range.id;
        task.state = RangeState::Downloading;
        task.attempts += 1;
        ctx.progress.reset(id);
        ctx.emitter.emit(JobEvent::RangeStart {
            id,
            attempt: task.attempts,
        });
        tracing::debug!(worker = n, range = id, attempt = task.attempts, "range start");

        let result = ctx
            .source
            .fetch(&task.range, &ctx.cancel, &mut |loaded| ctx.progress.update(id, loaded));

        let result = result.and_then(|bytes| {
            if ctx.cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            ctx.assembler
                .write(&task.range, &bytes)
                .map(|()| bytes.len() as u64)
                .map_err(|e| FetchError::Sink(format!("{:#}", e)))
        });

        match result {
            Ok(len) => {
                task.state = RangeState::Finished;
                // Unbounded or empty bodies may not have reported a final count.
                if ctx.progress.range(id).loaded != len {
                    ctx.progress.update(id, len);
                }
                ctx.emitter.emit(JobEvent::RangeFinish { id });
                tracing::debug!(worker = n, range = id, bytes = len, "range finished");
                let _ = tx.send(Outcome { task, error: None });
                ctx.queue.complete();
            }
            Err(e) if e.is_cancelled() || ctx.cancel.is_cancelled() => {
                tracing::debug!(worker = n, range = id, "range aborted");
                task.state = RangeState::Pending;
                let _ = tx.send(Outcome { task, error: None });
                ctx.queue.complete();
            }
            Err(e) => {
                let retries_used = task.attempts - 1;
                match cfg.retry.decide(retries_used, classify(&e)) {
                    RetryDecision::RetryAfter(delay) => {
                        tracing::warn!(
                            range = id,
                            attempt = task.attempts,
                            status = e.status(),
                            delay_ms = delay.as_millis() as u64,
                            "range failed, retrying: {}",
                            e
                        );
                        task.state = RangeState::RetryWaiting;
                        ctx.emitter.emit(JobEvent::RangeError {
                            id,
                            error: e.to_string(),
                            fatal: false,
                        });
                        ctx.queue.retry_later(task, delay);
                    }
                    RetryDecision::NoRetry => fail(n, cfg, ctx, tx, task, e),
                }
            }
        }
    }
}

fn fail(
    n: usize,
    cfg: &PoolConfig,
    ctx: &PoolContext,
    tx: &mpsc::Sender<Outcome>,
    mut task: RangeTask,
    e: FetchError,
) {
    let id = task.range.id;
    tracing::error!(
        worker = n,
        range = id,
        attempts = task.attempts,
        status = e.status(),
        "range failed: {}",
        e
    );
    task.state = RangeState::Failed;
    let error = if task.attempts > 1 {
        format!("{} (after {} attempts)", e, task.attempts)
    } else {
        e.to_string()
    };
    ctx.emitter.emit(JobEvent::RangeError {
        id,
        error: error.clone(),
        fatal: true,
    });
    let _ = tx.send(Outcome {
        task,
        error: Some(error),
    });
    if cfg.failure_mode == FailureMode::FailFast {
        tracing::debug!(range = id, "fail-fast: stopping remaining ranges");
        ctx.cancel.cancel();
        ctx.queue.close();
    }
    ctx.queue.complete();
}
