//! Recorder - invocation ids and pass/fail bookkeeping

use crate::testing::invoker::{BuildMode, Execution, Outcome};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Sequential invocation identifier, starting at 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct InvocationId(pub u64);

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snapshot of the run's tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
}

impl Counters {
    /// `total == passed + failed`, true between invocations
    pub fn is_consistent(&self) -> bool {
        self.total == self.passed + self.failed
    }

    /// No invocation failed
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Result of one invocation, immutable once built
#[derive(Debug, Clone)]
pub struct InvocationResult {
    pub id: InvocationId,
    pub file: PathBuf,
    pub mode: BuildMode,
    pub command: String,
    pub outcome: Outcome,
    pub duration: Duration,
}

impl InvocationResult {
    pub fn new(id: InvocationId, file: PathBuf, mode: BuildMode, execution: Execution) -> Self {
        Self {
            id,
            file,
            mode,
            command: execution.command,
            outcome: execution.outcome,
            duration: execution.duration,
        }
    }
}

/// Owns the counters for a run
///
/// Mutation goes through `&mut self` only. `begin` is called before an
/// invocation runs and `record` exactly once after it completes.
#[derive(Debug, Default)]
pub struct Recorder {
    counters: Counters,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next invocation id and count it in `total`
    pub fn begin(&mut self) -> InvocationId {
        self.counters.total += 1;
        InvocationId(self.counters.total)
    }

    /// Classify a completed invocation
    pub fn record(&mut self, outcome: &Outcome) {
        if outcome.is_pass() {
            self.counters.passed += 1;
        } else {
            self.counters.failed += 1;
        }
        debug_assert!(self.counters.is_consistent());
    }

    /// Current tallies by value
    pub fn counters(&self) -> Counters {
        self.counters
    }
}
