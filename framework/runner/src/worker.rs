use std::sync::Arc;

use perf_tunnel_core::prelude::RunnerFailureError;
use perf_tunnel_model::{RunResult, Scenario};
use serde::{Deserialize, Serialize};

use crate::executor::Executor;
use crate::test_runner::{TestRunner, TestRunnerSettings};

/// Something that runs scenarios one at a time on behalf of the coordinator.
///
/// Each worker is driven from its own thread. A [RunnerFailureError] means the worker is gone and
/// none of its remaining work can run.
pub trait Worker: Send + Sync {
    fn id(&self) -> &str;

    /// Called once before any work is dispatched.
    fn check(&self) -> Result<(), RunnerFailureError>;

    /// Run one scenario against one version.
    fn execute(&self, scenario: &Scenario, version: &str) -> Result<RunResult, RunnerFailureError>;
}

/// Where a worker runs its test processes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSpec {
    /// Prefix for the test command, e.g. `ssh agent-1`. Empty for a local worker.
    #[serde(default)]
    pub launcher: Vec<String>,
}

impl WorkerSpec {
    pub fn local() -> Self {
        Self::default()
    }

    /// Parse a launcher prefix, split on whitespace. An empty string or `local` is a local worker.
    pub fn parse(launcher: &str) -> Self {
        match launcher.trim() {
            "" | "local" => Self::local(),
            launcher => Self {
                launcher: launcher.split_whitespace().map(str::to_string).collect(),
            },
        }
    }

    pub fn is_local(&self) -> bool {
        self.launcher.is_empty()
    }
}

/// A [Worker] that launches test processes through a [TestRunner].
pub struct ProcessWorker {
    id: String,
    runner: TestRunner,
    executor: Arc<Executor>,
}

impl ProcessWorker {
    pub fn new(
        id: impl Into<String>,
        spec: &WorkerSpec,
        settings: TestRunnerSettings,
        executor: Arc<Executor>,
    ) -> Self {
        Self {
            id: id.into(),
            runner: TestRunner::new(settings, spec.launcher.clone()),
            executor,
        }
    }
}

impl Worker for ProcessWorker {
    fn id(&self) -> &str {
        &self.id
    }

    fn check(&self) -> Result<(), RunnerFailureError> {
        let Some(program) = self.runner.launcher().first() else {
            return Ok(());
        };

        match which::which(program) {
            Ok(path) => {
                log::debug!("Worker {} launches through {}", self.id, path.display());
                Ok(())
            }
            Err(e) => Err(RunnerFailureError::new(
                &self.id,
                format!("launcher `{program}` not found: {e}"),
            )),
        }
    }

    fn execute(&self, scenario: &Scenario, version: &str) -> Result<RunResult, RunnerFailureError> {
        self.executor
            .execute_in_place(self.runner.run(scenario, version, &self.id))
            .map_err(|e| RunnerFailureError::new(&self.id, e.to_string()))
    }
}

/// Create one [ProcessWorker] per spec, named `worker-<index>`.
pub fn process_workers(
    specs: &[WorkerSpec],
    settings: &TestRunnerSettings,
    executor: Arc<Executor>,
) -> Vec<Arc<dyn Worker>> {
    specs
        .iter()
        .enumerate()
        .map(|(index, spec)| {
            Arc::new(ProcessWorker::new(
                format!("worker-{index}"),
                spec,
                settings.clone(),
                executor.clone(),
            )) as Arc<dyn Worker>
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_worker_specs() {
        assert!(WorkerSpec::parse("").is_local());
        assert!(WorkerSpec::parse("local").is_local());
        assert_eq!(
            vec!["ssh".to_string(), "agent-1".to_string()],
            WorkerSpec::parse(" ssh  agent-1 ").launcher
        );
    }
}
