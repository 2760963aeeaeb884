//! Job controller: the object external callers hold.
//!
//! `start` moves a job from Pending to Running and hands the work to a
//! coordinator thread (probe, plan, pool, assemble). `cancel` moves Running to
//! Cancelling, silences the event stream and aborts in-flight fetches; the
//! coordinator then settles on Cancelled once every worker has been joined.
//! Terminal states are final.

mod error;
mod run;

pub use error::{JobError, RangeFailure};

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::assembler::Assembler;
use crate::config::FailureMode;
use crate::control::{lock, CancelToken};
use crate::events::{Emitter, JobListener};
use crate::pool::WorkQueue;
use crate::retry::RetryPolicy;
use crate::source::{CurlOptions, CurlSource, RangeSource};

/// Lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobState {
    Pending,
    Running,
    Cancelling,
    Finished,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Finished | JobState::Failed | JobState::Cancelled
        )
    }
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Finished,
    Failed(JobError),
    Cancelled,
}

impl JobOutcome {
    pub fn state(&self) -> JobState {
        match self {
            JobOutcome::Finished => JobState::Finished,
            JobOutcome::Failed(_) => JobState::Failed,
            JobOutcome::Cancelled => JobState::Cancelled,
        }
    }
}

/// Settings for one download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobConfig {
    pub url: String,
    /// Declared length. `None` means probe the server first.
    pub content_length: Option<u64>,
    /// Maximum concurrent range fetches.
    pub threads: usize,
    pub chunk_size: u64,
    pub retry: RetryPolicy,
    pub failure_mode: FailureMode,
}

impl JobConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content_length: None,
            threads: 4,
            chunk_size: 1024 * 1024,
            retry: RetryPolicy::default(),
            failure_mode: FailureMode::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.url).with_context(|| format!("invalid URL {:?}", self.url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("unsupported URL scheme {:?}", url.scheme());
        }
        if self.threads == 0 {
            bail!("threads must be at least 1");
        }
        if self.chunk_size == 0 {
            bail!("chunk size must be at least 1 byte");
        }
        Ok(())
    }
}

/// State shared between the caller's handle and the coordinator thread.
struct Shared {
    state: Mutex<JobState>,
    source: Arc<dyn RangeSource>,
    assembler: Arc<dyn Assembler>,
    emitter: Arc<Emitter>,
    cancel: CancelToken,
    queue: Arc<WorkQueue>,
}

/// One end-to-end download.
///
/// Dropping a running job cancels it and joins its threads; no background
/// work outlives the handle.
pub struct Job {
    config: JobConfig,
    shared: Arc<Shared>,
    coordinator: Mutex<Option<JoinHandle<JobOutcome>>>,
    outcome: Mutex<Option<JobOutcome>>,
}

impl Job {
    pub fn new(
        config: JobConfig,
        source: Arc<dyn RangeSource>,
        assembler: Arc<dyn Assembler>,
        listener: impl JobListener + 'static,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            shared: Arc::new(Shared {
                state: Mutex::new(JobState::Pending),
                source,
                assembler,
                emitter: Arc::new(Emitter::new(Box::new(listener))),
                cancel: CancelToken::new(),
                queue: Arc::new(WorkQueue::new()),
            }),
            coordinator: Mutex::new(None),
            outcome: Mutex::new(None),
        })
    }

    /// Job fetching `config.url` over HTTP with libcurl.
    pub fn http(
        config: JobConfig,
        curl: CurlOptions,
        assembler: Arc<dyn Assembler>,
        listener: impl JobListener + 'static,
    ) -> Result<Self> {
        let source = Arc::new(CurlSource::new(config.url.clone(), curl));
        Self::new(config, source, assembler, listener)
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    pub fn state(&self) -> JobState {
        *lock(&self.shared.state)
    }

    /// Pending -> Running. Fails if the job was already started or cancelled.
    pub fn start(&self) -> Result<()> {
        {
            let mut state = lock(&self.shared.state);
            if *state != JobState::Pending {
                bail!("job cannot be started from state {:?}", *state);
            }
            *state = JobState::Running;
        }
        tracing::info!(
            url = %self.config.url,
            threads = self.config.threads,
            chunk_size = self.config.chunk_size,
            "job start"
        );

        let shared = Arc::clone(&self.shared);
        let config = self.config.clone();
        let spawned = std::thread::Builder::new()
            .name("chunkfetch-job".into())
            .spawn(move || run::run(&config, &shared));
        match spawned {
            Ok(handle) => {
                *lock(&self.coordinator) = Some(handle);
                Ok(())
            }
            Err(e) => {
                *lock(&self.shared.state) = JobState::Failed;
                self.shared.emitter.close();
                Err(e).context("spawn job coordinator")
            }
        }
    }

    /// Request cancellation.
    ///
    /// Running -> Cancelling; no further events are delivered once this
    /// returns. A job that was never started goes straight to Cancelled. In
    /// any other state this is a no-op.
    pub fn cancel(&self) {
        let mut state = lock(&self.shared.state);
        match *state {
            JobState::Running => {
                *state = JobState::Cancelling;
                drop(state);
                tracing::info!(url = %self.config.url, "job cancelling");
                self.shared.emitter.close();
                self.shared.cancel.cancel();
                let dropped = self.shared.queue.close();
                tracing::debug!(dropped = dropped.len(), "cleared queued ranges");
            }
            JobState::Pending => {
                *state = JobState::Cancelled;
                drop(state);
                self.shared.emitter.close();
                *lock(&self.outcome) = Some(JobOutcome::Cancelled);
            }
            _ => {}
        }
    }

    /// Block until the job reaches a terminal state.
    ///
    /// Must not be called from inside a listener.
    pub fn wait(&self) -> Result<JobOutcome> {
        {
            let mut coordinator = lock(&self.coordinator);
            if let Some(handle) = coordinator.take() {
                let outcome = handle
                    .join()
                    .map_err(|_| anyhow!("job coordinator panicked"))?;
                *lock(&self.outcome) = Some(outcome);
            }
        }
        lock(&self.outcome)
            .clone()
            .ok_or_else(|| anyhow!("job was not started"))
    }
}

impl Drop for Job {
    fn drop(&mut self) {
        self.cancel();
        if let Some(handle) = lock(&self.coordinator).take() {
            let _ = handle.join();
        }
    }
}
