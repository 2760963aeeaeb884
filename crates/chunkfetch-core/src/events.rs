//! Job events and the listener contract.
//!
//! The engine holds no presentation state: everything a collaborator sees
//! arrives as a `JobEvent` through a `JobListener`. Events are delivered one
//! at a time, in emission order; once a job is cancelled no further event is
//! delivered.

use serde::Serialize;
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::control::lock;

/// Everything a job reports to its listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum JobEvent {
    /// Plan built; transfer about to begin.
    Start {
        content_length: Option<u64>,
        range_count: usize,
    },
    /// Job-level progress. `total` is `None` while the length is unknown.
    Progress { loaded: u64, total: Option<u64> },
    /// A worker picked up a range (`attempt` is 1 for the first try).
    RangeStart { id: usize, attempt: u32 },
    RangeProgress {
        id: usize,
        loaded: u64,
        total: Option<u64>,
    },
    RangeFinish { id: usize },
    /// A range attempt failed. `fatal` is false when the range will be retried.
    RangeError {
        id: usize,
        error: String,
        fatal: bool,
    },
    /// Every range was accepted by the assembler.
    Finish,
    /// At least one range failed terminally (or the output could not be finalized).
    Error { error: String },
}

impl JobEvent {
    /// True for `Finish` and `Error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobEvent::Finish | JobEvent::Error { .. })
    }
}

/// Receives job events. Called from worker threads, one event at a time.
pub trait JobListener: Send + Sync {
    fn on_event(&self, event: &JobEvent);
}

/// Listener that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl JobListener for NoopListener {
    fn on_event(&self, _event: &JobEvent) {}
}

impl JobListener for std::sync::mpsc::Sender<JobEvent> {
    fn on_event(&self, event: &JobEvent) {
        let _ = self.send(event.clone());
    }
}

impl JobListener for tokio::sync::mpsc::UnboundedSender<JobEvent> {
    fn on_event(&self, event: &JobEvent) {
        let _ = self.send(event.clone());
    }
}

type Handler<T> = Option<Box<dyn Fn(T) + Send + Sync>>;

/// Per-event callbacks, for collaborators that prefer handler functions over
/// matching on `JobEvent`. Unset handlers are skipped.
#[derive(Default)]
pub struct Callbacks {
    on_start: Handler<(Option<u64>, usize)>,
    on_progress: Handler<(u64, Option<u64>)>,
    on_chunk_start: Handler<(usize, u32)>,
    on_chunk_progress: Handler<(usize, u64, Option<u64>)>,
    on_chunk_finish: Handler<usize>,
    on_chunk_error: Option<Box<dyn Fn(usize, &str, bool) + Send + Sync>>,
    on_finish: Handler<()>,
    on_error: Option<Box<dyn Fn(&str) + Send + Sync>>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(content_length, range_count)`
    pub fn on_start(mut self, f: impl Fn(Option<u64>, usize) + Send + Sync + 'static) -> Self {
        self.on_start = Some(Box::new(move |(len, n)| f(len, n)));
        self
    }

    /// `(loaded, total)`
    pub fn on_progress(mut self, f: impl Fn(u64, Option<u64>) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(move |(loaded, total)| f(loaded, total)));
        self
    }

    /// `(id, attempt)`
    pub fn on_chunk_start(mut self, f: impl Fn(usize, u32) + Send + Sync + 'static) -> Self {
        self.on_chunk_start = Some(Box::new(move |(id, attempt)| f(id, attempt)));
        self
    }

    /// `(id, loaded, total)`
    pub fn on_chunk_progress(
        mut self,
        f: impl Fn(usize, u64, Option<u64>) + Send + Sync + 'static,
    ) -> Self {
        self.on_chunk_progress = Some(Box::new(move |(id, loaded, total)| f(id, loaded, total)));
        self
    }

    pub fn on_chunk_finish(mut self, f: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_chunk_finish = Some(Box::new(f));
        self
    }

    /// `(id, error, fatal)`
    pub fn on_chunk_error(mut self, f: impl Fn(usize, &str, bool) + Send + Sync + 'static) -> Self {
        self.on_chunk_error = Some(Box::new(f));
        self
    }

    pub fn on_finish(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_finish = Some(Box::new(move |()| f()));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }
}

impl JobListener for Callbacks {
    fn on_event(&self, event: &JobEvent) {
        match event {
            JobEvent::Start {
                content_length,
                range_count,
            } => {
                if let Some(f) = &self.on_start {
                    f((*content_length, *range_count));
                }
            }
            JobEvent::Progress { loaded, total } => {
                if let Some(f) = &self.on_progress {
                    f((*loaded, *total));
                }
            }
            JobEvent::RangeStart { id, attempt } => {
                if let Some(f) = &self.on_chunk_start {
                    f((*id, *attempt));
                }
            }
            JobEvent::RangeProgress { id, loaded, total } => {
                if let Some(f) = &self.on_chunk_progress {
                    f((*id, *loaded, *total));
                }
            }
            JobEvent::RangeFinish { id } => {
                if let Some(f) = &self.on_chunk_finish {
                    f(*id);
                }
            }
            JobEvent::RangeError { id, error, fatal } => {
                if let Some(f) = &self.on_chunk_error {
                    f(*id, error, *fatal);
                }
            }
            JobEvent::Finish => {
                if let Some(f) = &self.on_finish {
                    f(());
                }
            }
            JobEvent::Error { error } => {
                if let Some(f) = &self.on_error {
                    f(error);
                }
            }
        }
    }
}

thread_local! {
    /// Address of the emitter currently dispatching on this thread (0 = none).
    static DISPATCHING: Cell<usize> = const { Cell::new(0) };
}

/// Serializes delivery to the listener and gates it on cancellation.
///
/// After `close` returns, the listener is never called again: `close` waits
/// for an in-progress delivery on another thread to finish. When `close` is
/// called from inside the listener itself it cannot wait, but every other
/// thread is already blocked on the gate and will observe it closed.
pub(crate) struct Emitter {
    listener: Box<dyn JobListener>,
    gate: Mutex<()>,
    open: AtomicBool,
}

struct DispatchGuard(usize);

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        DISPATCHING.with(|d| d.set(self.0));
    }
}

impl Emitter {
    pub(crate) fn new(listener: Box<dyn JobListener>) -> Self {
        Self {
            listener,
            gate: Mutex::new(()),
            open: AtomicBool::new(true),
        }
    }

    fn addr(&self) -> usize {
        self as *const Self as usize
    }

    pub(crate) fn emit(&self, event: JobEvent) {
        self.emit_with(|| event);
    }

    /// Build the event only once the gate is held. Events whose payload is
    /// read from shared counters go through here, so consecutive deliveries
    /// observe the counters in delivery order.
    pub(crate) fn emit_with(&self, make: impl FnOnce() -> JobEvent) {
        let _gate = lock(&self.gate);
        if !self.open.load(Ordering::Acquire) {
            return;
        }
        let event = make();
        let previous = DISPATCHING.with(|d| d.replace(self.addr()));
        let _reset = DispatchGuard(previous);
        self.listener.on_event(&event);
    }

    /// Stop delivering events. Idempotent.
    pub(crate) fn close(&self) {
        self.open.store(false, Ordering::Release);
        if DISPATCHING.with(|d| d.get()) != self.addr() {
            drop(lock(&self.gate));
        }
    }

    #[cfg(test)]
    pub(crate) fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}
