//! Shared range queue with delayed re-enqueue.
//!
//! Ranges move through the queue by value, so a range is owned either by the
//! queue or by exactly one worker. Retried ranges wait in a due-time ordered
//! list and are promoted to the back of the ready queue once due; workers
//! never sleep on a retry delay while other ranges are ready.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use super::RangeTask;
use crate::control::lock;

#[derive(Default)]
struct Inner {
    ready: VecDeque<RangeTask>,
    /// Sorted by due time, earliest first.
    delayed: VecDeque<(Instant, RangeTask)>,
    active: usize,
    closed: bool,
}

impl Inner {
    fn promote_due(&mut self, now: Instant) {
        while self.delayed.front().is_some_and(|(due, _)| *due <= now) {
            if let Some((_, task)) = self.delayed.pop_front() {
                self.ready.push_back(task);
            }
        }
    }
}

#[derive(Default)]
pub(crate) struct WorkQueue {
    inner: Mutex<Inner>,
    changed: Condvar,
}

impl WorkQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add fresh ranges in plan order. Ignored once the queue is closed.
    pub(crate) fn seed(&self, tasks: impl IntoIterator<Item = RangeTask>) {
        let mut q = lock(&self.inner);
        if q.closed {
            return;
        }
        q.ready.extend(tasks);
        self.changed.notify_all();
    }

    /// Block until a range is ready (and claim it) or no work can ever arrive.
    ///
    /// Returns `None` when the queue is closed, or when nothing is ready,
    /// nothing is delayed and no worker is active.
    pub(crate) fn next(&self) -> Option<RangeTask> {
        let mut q = lock(&self.inner);
        loop {
            if q.closed {
                return None;
            }
            let now = Instant::now();
            q.promote_due(now);
            if let Some(task) = q.ready.pop_front() {
                q.active += 1;
                return Some(task);
            }
            if q.delayed.is_empty() && q.active == 0 {
                self.changed.notify_all();
                return None;
            }
            q = match q.delayed.front().map(|(due, _)| *due) {
                Some(due) => {
                    let wait = due.saturating_duration_since(now).max(Duration::from_millis(1));
                    self.changed
                        .wait_timeout(q, wait)
                        .unwrap_or_else(|e| e.into_inner())
                        .0
                }
                None => self.changed.wait(q).unwrap_or_else(|e| e.into_inner()),
            };
        }
    }

    /// A claimed range reached a terminal state (or was aborted).
    pub(crate) fn complete(&self) {
        let mut q = lock(&self.inner);
        q.active = q.active.saturating_sub(1);
        self.changed.notify_all();
    }

    /// Release a claimed range and make it ready again after `delay`.
    pub(crate) fn retry_later(&self, task: RangeTask, delay: Duration) {
        let mut q = lock(&self.inner);
        q.active = q.active.saturating_sub(1);
        if !q.closed {
            let due = Instant::now() + delay;
            let at = q.delayed.partition_point(|(d, _)| *d <= due);
            q.delayed.insert(at, (due, task));
        }
        self.changed.notify_all();
    }

    /// Close the queue: drop pending and delayed work and wake every worker.
    /// Returns the ranges that were still waiting. Idempotent.
    pub(crate) fn close(&self) -> Vec<RangeTask> {
        let mut q = lock(&self.inner);
        q.closed = true;
        let mut left: Vec<RangeTask> = q.ready.drain(..).collect();
        left.extend(q.delayed.drain(..).map(|(_, t)| t));
        self.changed.notify_all();
        left
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        lock(&self.inner).closed
    }

    /// Ranges currently claimed by workers.
    #[cfg(test)]
    pub(crate) fn active(&self) -> usize {
        lock(&self.inner).active
    }
}
