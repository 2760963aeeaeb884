use std::fmt;

/// One range that ended Failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeFailure {
    pub id: usize,
    pub start: u64,
    /// Exclusive end, `None` for an unbounded range.
    pub end: Option<u64>,
    pub error: String,
}

impl fmt::Display for RangeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "range {} [{}, {}): {}", self.id, self.start, end, self.error),
            None => write!(f, "range {} [{}, ..): {}", self.id, self.start, self.error),
        }
    }
}

/// Why a job ended Failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    /// Every failed range with its last error, in id order.
    #[error("{} of {total} ranges failed; first: {}", .failures.len(), first(.failures))]
    RangesFailed {
        failures: Vec<RangeFailure>,
        total: usize,
    },
    /// The pool stopped with ranges left over and nothing failed.
    #[error("{pending} ranges were never fetched")]
    Incomplete { pending: usize },
    /// Preparing or finalizing the output failed.
    #[error("output: {0}")]
    Output(String),
}

fn first(failures: &[RangeFailure]) -> String {
    failures
        .first()
        .map(ToString::to_string)
        .unwrap_or_default()
}

impl JobError {
    /// Ids of the ranges that failed, if any.
    pub fn failed_ranges(&self) -> Vec<usize> {
        match self {
            JobError::RangesFailed { failures, .. } => failures.iter().map(|f| f.id).collect(),
            _ => Vec::new(),
        }
    }
}
