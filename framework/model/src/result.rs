use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// How a single execution of a scenario against one version ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The process exited cleanly and produced samples
    Succeeded,
    /// The process crashed or exited with a non-zero code. Not retried.
    ExecutionFailed,
    /// The process was killed after exceeding the per-execution timeout
    TimedOut,
    /// The worker that owned this execution died before running it
    RunnerFailed,
    /// The run was stopped before this execution started
    Cancelled,
    /// No distribution could be found for the requested version
    BaselineUnavailable,
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Succeeded)
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunStatus::Succeeded => "succeeded",
            RunStatus::ExecutionFailed => "execution failed",
            RunStatus::TimedOut => "timed out",
            RunStatus::RunnerFailed => "runner failed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::BaselineUnavailable => "baseline unavailable",
        }
    }
}

/// The outcome of running one scenario against one version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunResult {
    pub scenario_id: String,
    /// The version that was executed. [crate::CURRENT_VERSION] for the version under test.
    pub baseline_version: String,
    /// Timing samples in milliseconds, in the order they were reported
    pub samples: Vec<f64>,
    /// Exit code of the test process, if it exited on its own
    pub exit_code: Option<i32>,
    /// Logs, heap dumps and result files left behind by the execution
    pub artifact_paths: BTreeSet<PathBuf>,
    pub status: RunStatus,
    /// The worker that produced this result
    pub worker_id: String,
}

impl RunResult {
    pub fn new(
        scenario_id: impl Into<String>,
        baseline_version: impl Into<String>,
        worker_id: impl Into<String>,
        status: RunStatus,
    ) -> Self {
        Self {
            scenario_id: scenario_id.into(),
            baseline_version: baseline_version.into(),
            samples: Vec::new(),
            exit_code: None,
            artifact_paths: BTreeSet::new(),
            status,
            worker_id: worker_id.into(),
        }
    }

    pub fn with_samples(mut self, samples: Vec<f64>) -> Self {
        self.samples = samples;
        self
    }

    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = Some(exit_code);
        self
    }

    pub fn with_artifacts(mut self, artifacts: impl IntoIterator<Item = PathBuf>) -> Self {
        self.artifact_paths.extend(artifacts);
        self
    }
}

/// A [RunResult] as it is kept in the historical result store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryRecord {
    pub run_id: String,
    pub channel: String,
    /// Unix timestamp in seconds of the start of the run
    pub started_at: i64,
    pub build_id: Option<String>,
    pub branch: Option<String>,
    /// Fingerprint of the run configuration, see [crate::RunSummary::fingerprint]
    pub fingerprint: String,
    pub result: RunResult,
}
