//! In-process `RangeSource` for engine tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::control::CancelToken;
use crate::events::{JobEvent, JobListener};
use crate::planner::ByteRange;
use crate::retry::FetchError;
use crate::source::{Probe, RangeSource};

/// Scripted failure for one attempt.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Failure {
    Status(u16),
    Transport,
}

/// Serves `body` from memory, in `segment`-sized pieces with `step_delay`
/// between them, optionally failing scripted attempts per range id.
pub(crate) struct TestSource {
    body: Vec<u8>,
    accept_ranges: bool,
    declare_length: bool,
    segment: usize,
    step_delay: Duration,
    script: Mutex<HashMap<usize, VecDeque<Failure>>>,
    in_flight: AtomicUsize,
    pub(crate) max_in_flight: AtomicUsize,
    pub(crate) fetches: AtomicUsize,
    pub(crate) probes: AtomicUsize,
    pub(crate) attempts: Mutex<HashMap<usize, Vec<Instant>>>,
}

impl TestSource {
    pub(crate) fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            accept_ranges: true,
            declare_length: true,
            segment: 16 * 1024,
            step_delay: Duration::ZERO,
            script: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            probes: AtomicUsize::new(0),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn segment(mut self, segment: usize) -> Self {
        self.segment = segment.max(1);
        self
    }

    pub(crate) fn step_delay(mut self, d: Duration) -> Self {
        self.step_delay = d;
        self
    }

    pub(crate) fn no_length(mut self) -> Self {
        self.declare_length = false;
        self
    }

    pub(crate) fn no_ranges(mut self) -> Self {
        self.accept_ranges = false;
        self
    }

    /// Fail the next `times` attempts of range `id` with `failure`.
    pub(crate) fn fail(self, id: usize, failure: Failure, times: usize) -> Self {
        self.script
            .lock()
            .unwrap()
            .entry(id)
            .or_default()
            .extend(std::iter::repeat(failure).take(times));
        self
    }

    pub(crate) fn attempt_times(&self, id: usize) -> Vec<Instant> {
        self.attempts
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RangeSource for TestSource {
    fn probe(&self, cancel: &CancelToken) -> Result<Probe, FetchError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        Ok(Probe {
            content_length: self.declare_length.then_some(self.body.len() as u64),
            accept_ranges: self.accept_ranges,
        })
    }

    fn fetch(
        &self,
        range: &ByteRange,
        cancel: &CancelToken,
        on_bytes: &mut dyn FnMut(u64),
    ) -> Result<Vec<u8>, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.attempts
            .lock()
            .unwrap()
            .entry(range.id)
            .or_default()
            .push(Instant::now());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let scripted = self
            .script
            .lock()
            .unwrap()
            .get_mut(&range.id)
            .and_then(|q| q.pop_front());
        if let Some(failure) = scripted {
            std::thread::sleep(self.step_delay);
            return Err(match failure {
                Failure::Status(code) => FetchError::Http(code),
                Failure::Transport => FetchError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "connection reset",
                )),
            });
        }

        let start = range.start as usize;
        let end = range.end.map(|e| e as usize).unwrap_or(self.body.len());
        let mut out = Vec::with_capacity(end - start);
        for piece in self.body[start..end].chunks(self.segment) {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            std::thread::sleep(self.step_delay);
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            out.extend_from_slice(piece);
            on_bytes(out.len() as u64);
        }
        Ok(out)
    }
}

/// Listener that records every event.
#[derive(Clone, Default)]
pub(crate) struct Recorder {
    pub(crate) events: Arc<Mutex<Vec<JobEvent>>>,
}

impl Recorder {
    pub(crate) fn events(&self) -> Vec<JobEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl JobListener for Recorder {
    fn on_event(&self, event: &JobEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

pub(crate) fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
