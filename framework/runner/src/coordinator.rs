use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use itertools::Itertools;
use parking_lot::Mutex;
use perf_tunnel_catalog::write_catalog_file;
use perf_tunnel_core::prelude::{CancelHandle, CancelListener, RunnerFailureError};
use perf_tunnel_model::{
    ComparisonReport, CoordinatorState, HistoryRecord, RunResult, RunStatus, RunSummary, Scenario,
    WorkerAssignment, CURRENT_VERSION,
};
use perf_tunnel_summariser::report::{
    summary_table, ArtifactSet, BuiltReport, ReportBuilder, ReportContext,
};
use perf_tunnel_summariser::Aggregator;
use sha3::Digest;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

use crate::config::{ChecksMode, PerfConfig};
use crate::monitor::start_monitor;
use crate::progress::start_progress;
use crate::worker::Worker;

pub const RUN_SUMMARY_FILE: &str = "run-summary.json";
pub const RESULTS_FILE: &str = "results.jsonl";
pub const SCENARIO_LIST_FILE: &str = "scenario-list.txt";

/// Everything a coordinated run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub results: Vec<RunResult>,
    pub reports: Vec<ComparisonReport>,
    /// Absent when the report could not be written, see the failure reasons of the summary
    pub report: Option<BuiltReport>,
}

impl RunOutcome {
    pub fn passed(&self) -> bool {
        self.summary.passed()
    }
}

/// Messages from the worker threads to the coordinator.
enum WorkerEvent {
    Result(RunResult),
    Failed(RunnerFailureError),
}

/// Fans scenarios out over a pool of workers and turns their results into a report.
///
/// A run moves through `PENDING -> DISPATCHED -> COLLECTING -> DONE`, or ends in `FAILED` when
/// there is nothing to run. Workers run in parallel, each on its own thread, and run their own
/// scenarios one after the other. A worker that dies takes only its own remaining scenarios with
/// it, they are reported as [RunStatus::RunnerFailed].
pub struct Coordinator {
    config: PerfConfig,
    workers: Vec<Arc<dyn Worker>>,
    state: Mutex<CoordinatorState>,
    sample_fingerprints: BTreeMap<String, String>,
}

impl Coordinator {
    pub fn new(config: PerfConfig, workers: Vec<Arc<dyn Worker>>) -> Self {
        Self {
            config,
            workers,
            state: Mutex::new(CoordinatorState::Pending),
            sample_fingerprints: BTreeMap::new(),
        }
    }

    /// Fingerprints of the sample projects the scenarios run against, recorded with the run.
    pub fn with_sample_fingerprints(mut self, fingerprints: BTreeMap<String, String>) -> Self {
        self.sample_fingerprints = fingerprints;
        self
    }

    pub fn state(&self) -> CoordinatorState {
        *self.state.lock()
    }

    fn transition(&self, summary: &mut RunSummary, next: CoordinatorState) {
        log::debug!("Coordinator {:?} -> {:?}", summary.state, next);
        *self.state.lock() = next;
        summary.state = next;
    }

    /// Run every scenario on the worker pool and write the reports.
    ///
    /// Returns an error only when the outcome could not be written at all. A failed run is
    /// reported through [RunOutcome::passed].
    pub fn run(&self, scenarios: Vec<Scenario>, cancel: &CancelHandle) -> anyhow::Result<RunOutcome> {
        let scenarios = scenarios
            .into_iter()
            .sorted_by(|a, b| a.id.cmp(&b.id))
            .collect::<Vec<_>>();

        let mut summary = RunSummary::new(
            nanoid::nanoid!(),
            self.config.channel.clone(),
            chrono::Utc::now().timestamp(),
            scenarios
                .iter()
                .flat_map(|s| s.baseline_versions.iter().cloned())
                .unique()
                .collect(),
        );
        summary.scenario_ids = scenarios.iter().map(|s| s.id.clone()).collect();
        summary.worker_count = self.workers.len();
        summary.build_id = self.config.build_id.clone();
        summary.branch = self.config.branch.clone();
        summary.sample_fingerprints = self.sample_fingerprints.clone();
        *self.state.lock() = CoordinatorState::Pending;

        log::info!(
            "Starting run {} on channel {} with {} scenarios",
            summary.run_id,
            summary.channel,
            scenarios.len()
        );

        if let Some(reason) = self.precondition_failure(&scenarios) {
            log::error!("{}", reason);
            summary.failure_reasons.push(reason);
            self.transition(&mut summary, CoordinatorState::Failed);
            return self.finish(summary, &scenarios, Vec::new());
        }

        let assignments = assign(&scenarios, &self.workers);
        for assignment in &assignments {
            log::info!(
                "{} runs {} scenarios: {}",
                assignment.worker_id,
                assignment.scenario_ids.len(),
                assignment.scenario_ids.join(", ")
            );
        }

        let total_executions = scenarios
            .iter()
            .map(|s| s.baseline_versions.len() as u64 + 1)
            .sum();
        let progress = start_progress(total_executions, !self.config.no_progress);

        let monitor_stop = CancelHandle::new();
        start_monitor(self.config.cpu_warn_threshold, monitor_stop.new_listener());

        let by_id = scenarios
            .iter()
            .map(|s| (s.id.clone(), Arc::new(s.clone())))
            .collect::<BTreeMap<_, _>>();

        let (sender, mut receiver) = unbounded_channel::<WorkerEvent>();
        let mut handles = Vec::new();
        for (worker, assignment) in self.workers.iter().zip(&assignments) {
            let queue = assignment
                .scenario_ids
                .iter()
                .filter_map(|id| by_id.get(id).cloned())
                .collect::<Vec<_>>();

            if let Err(e) = worker.check() {
                log::error!("{}, marking its scenarios as failed", e);
                report_remaining(&sender, worker.id(), &queue, 0, RunStatus::RunnerFailed);
                send(&sender, WorkerEvent::Failed(e));
                continue;
            }

            let worker = worker.clone();
            let worker_sender = sender.clone();
            let listener = cancel.new_listener();
            let spawned = std::thread::Builder::new()
                .name(worker.id().to_string())
                .spawn(move || run_worker(worker, queue, worker_sender, listener));

            match spawned {
                Ok(handle) => handles.push((assignment.worker_id.clone(), handle)),
                Err(e) => {
                    let error = RunnerFailureError::new(
                        &assignment.worker_id,
                        format!("could not start worker thread: {e}"),
                    );
                    log::error!("{}", error);
                    send(&sender, WorkerEvent::Failed(error));
                }
            }
        }
        drop(sender);
        self.transition(&mut summary, CoordinatorState::Dispatched);

        let store = self.config.result_store();
        let fingerprint = summary.fingerprint();
        let mut results = Vec::new();
        let mut failed_workers = BTreeSet::new();

        self.transition(&mut summary, CoordinatorState::Collecting);
        while let Some(event) = receiver.blocking_recv() {
            match event {
                WorkerEvent::Result(result) => {
                    log::debug!(
                        "{} against {} on {}: {}",
                        result.scenario_id,
                        result.baseline_version,
                        result.worker_id,
                        result.status.label()
                    );
                    if let Some(store) = &store {
                        let record = HistoryRecord {
                            run_id: summary.run_id.clone(),
                            channel: summary.channel.clone(),
                            started_at: summary.started_at,
                            build_id: summary.build_id.clone(),
                            branch: summary.branch.clone(),
                            fingerprint: fingerprint.clone(),
                            result: result.clone(),
                        };
                        if let Err(e) = store.record(&record) {
                            log::warn!(
                                "Could not record result in {}: {:?}",
                                store.path().display(),
                                e
                            );
                        }
                    }
                    progress.inc(1);
                    results.push(result);
                }
                WorkerEvent::Failed(e) => {
                    log::error!("{}", e);
                    failed_workers.insert(e.worker_id().to_string());
                }
            }
        }

        for (worker_id, handle) in handles {
            if let Err(e) = handle.join() {
                log::error!("Worker thread {} panicked: {:?}", worker_id, e);
                failed_workers.insert(worker_id);
            }
        }
        monitor_stop.cancel();
        progress.finish_and_clear();

        results.extend(missing_results(&scenarios, &assignments, &results));
        summary.failed_workers = failed_workers.into_iter().collect();
        self.transition(&mut summary, CoordinatorState::Done);

        self.finish(summary, &scenarios, results)
    }

    /// Why the run cannot start, if it cannot.
    fn precondition_failure(&self, scenarios: &[Scenario]) -> Option<String> {
        if scenarios.is_empty() {
            return Some("Catalog is empty, no scenarios to run".to_string());
        }
        if self.workers.is_empty() {
            return Some("No workers configured".to_string());
        }

        let distributions = &self.config.distributions;
        if !distributions.is_available(CURRENT_VERSION) {
            return Some("Baseline unavailable: no distribution for the current version".to_string());
        }
        let blocked = scenarios.iter().all(|s| {
            s.baseline_versions
                .iter()
                .all(|v| !distributions.is_available(v))
        });
        if blocked {
            let versions = scenarios
                .iter()
                .flat_map(|s| s.baseline_versions.iter())
                .unique()
                .join(", ");
            return Some(format!(
                "Baseline unavailable: none of the requested baselines can be installed ({versions})"
            ));
        }

        None
    }

    /// Aggregate, write every output and decide whether the run passed.
    fn finish(
        &self,
        mut summary: RunSummary,
        scenarios: &[Scenario],
        mut results: Vec<RunResult>,
    ) -> anyhow::Result<RunOutcome> {
        results.sort_by(|a, b| {
            (&a.scenario_id, a.baseline_version != CURRENT_VERSION)
                .cmp(&(&b.scenario_id, b.baseline_version != CURRENT_VERSION))
        });

        let reports = Aggregator::new(self.config.aggregator).aggregate_for(scenarios, &results);

        summary.status_counts = results
            .iter()
            .map(|r| r.status.label().to_string())
            .counts()
            .into_iter()
            .collect();
        summary.regressions = reports
            .iter()
            .filter(|r| r.regression_flag)
            .map(|r| r.scenario_id.clone())
            .collect();

        if summary.state == CoordinatorState::Done {
            if !summary.regressions.is_empty() {
                match self.config.checks {
                    ChecksMode::All => summary.failure_reasons.push(format!(
                        "{} scenarios regressed: {}",
                        summary.regressions.len(),
                        summary.regressions.join(", ")
                    )),
                    ChecksMode::None => log::warn!(
                        "{} scenarios regressed, not failing the run because checks are disabled",
                        summary.regressions.len()
                    ),
                }
            }

            let failed_fraction = summary.failed_workers.len() as f64 / summary.worker_count as f64;
            if failed_fraction > self.config.runner_failure_fraction {
                summary.failure_reasons.push(format!(
                    "{} of {} workers failed: {}",
                    summary.failed_workers.len(),
                    summary.worker_count,
                    summary.failed_workers.join(", ")
                ));
            }

            let cancelled = results
                .iter()
                .filter(|r| r.status == RunStatus::Cancelled)
                .count();
            if cancelled > 0 {
                summary
                    .failure_reasons
                    .push(format!("{cancelled} executions were cancelled"));
            }
        }

        let report_dir = &self.config.report_dir;
        std::fs::create_dir_all(report_dir)
            .with_context(|| format!("Could not create report directory {}", report_dir.display()))?;

        let report = match self.write_report(&summary, scenarios, &results, &reports) {
            Ok(report) => Some(report),
            Err(e) => {
                log::error!("Failed to write the report: {:?}", e);
                summary
                    .failure_reasons
                    .push(format!("Report could not be written: {e}"));
                None
            }
        };

        let summary_path = report_dir.join(RUN_SUMMARY_FILE);
        let json = serde_json::to_string_pretty(&summary).context("Could not serialize run summary")?;
        std::fs::write(&summary_path, json)
            .with_context(|| format!("Could not write {}", summary_path.display()))?;

        if !reports.is_empty() {
            log::info!("Comparison:\n{}", summary_table(&reports));
        }
        if summary.passed() {
            log::info!("Run {} passed", summary.run_id);
        } else {
            log::error!(
                "Run {} failed: {}",
                summary.run_id,
                summary.failure_reasons.join("; ")
            );
        }

        Ok(RunOutcome {
            summary,
            results,
            reports,
            report,
        })
    }

    fn write_report(
        &self,
        summary: &RunSummary,
        scenarios: &[Scenario],
        results: &[RunResult],
        reports: &[ComparisonReport],
    ) -> anyhow::Result<BuiltReport> {
        let report_dir = &self.config.report_dir;

        let results_path = report_dir.join(RESULTS_FILE);
        let mut lines = String::new();
        for result in results {
            lines.push_str(&serde_json::to_string(result)?);
            lines.push('\n');
        }
        std::fs::write(&results_path, lines)
            .with_context(|| format!("Could not write {}", results_path.display()))?;
        write_catalog_file(scenarios, &report_dir.join(SCENARIO_LIST_FILE))?;

        let artifacts = ArtifactSet {
            result_dir: self.config.results_dir.clone(),
            debug_artifacts: results
                .iter()
                .flat_map(|r| r.artifact_paths.iter().cloned())
                .collect::<BTreeSet<PathBuf>>()
                .into_iter()
                .collect(),
        };
        let context = ReportContext {
            title: format!("Performance report - {}", summary.channel),
            channel: summary.channel.clone(),
            generated_at: chrono::DateTime::from_timestamp(summary.started_at, 0)
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
        };

        let built = ReportBuilder::new(report_dir, context).build(reports, &artifacts)?;
        log::info!("HTML report: {}", built.html_report.display());
        log::info!("Result archive: {}", built.result_archive.display());
        Ok(built)
    }
}

/// Partition scenarios round-robin over the workers, in the order of a stable hash of their id.
/// Each worker keeps its scenarios in dispatch order.
pub fn assign(scenarios: &[Scenario], workers: &[Arc<dyn Worker>]) -> Vec<WorkerAssignment> {
    let mut assignments = workers
        .iter()
        .map(|w| WorkerAssignment::new(w.id()))
        .collect::<Vec<_>>();
    if assignments.is_empty() {
        return assignments;
    }

    let count = assignments.len();
    scenarios
        .iter()
        .map(|s| (stable_hash(&s.id), &s.id))
        .sorted()
        .enumerate()
        .for_each(|(index, (_, id))| assignments[index % count].scenario_ids.push(id.clone()));

    assignments
}

/// First 8 bytes of the SHA3-256 of the id, the same on every platform and every run.
pub fn stable_hash(id: &str) -> u64 {
    let mut hasher = sha3::Sha3_256::new();
    Digest::update(&mut hasher, id.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

fn run_worker(
    worker: Arc<dyn Worker>,
    queue: Vec<Arc<Scenario>>,
    sender: UnboundedSender<WorkerEvent>,
    mut listener: CancelListener,
) {
    let worker_id = worker.id().to_string();

    for (position, scenario) in queue.iter().enumerate() {
        if listener.should_stop() {
            log::info!(
                "{} cancelled with {} scenarios left",
                worker_id,
                queue.len() - position
            );
            report_remaining(&sender, &worker_id, &queue, position, RunStatus::Cancelled);
            return;
        }

        // A scenario that has started runs to the end, cancelling only stops new scenarios.
        for (index, version) in scenario.execution_versions().enumerate() {
            match worker.execute(scenario, version) {
                Ok(result) => send(&sender, WorkerEvent::Result(result)),
                Err(e) => {
                    for version in scenario.execution_versions().skip(index) {
                        send(
                            &sender,
                            WorkerEvent::Result(RunResult::new(
                                &scenario.id,
                                version,
                                &worker_id,
                                RunStatus::RunnerFailed,
                            )),
                        );
                    }
                    report_remaining(&sender, &worker_id, &queue, position + 1, RunStatus::RunnerFailed);
                    send(&sender, WorkerEvent::Failed(e));
                    return;
                }
            }
        }
    }

    log::debug!("{} finished its scenarios", worker_id);
}

/// Report every execution of `queue[from..]` with `status`.
fn report_remaining(
    sender: &UnboundedSender<WorkerEvent>,
    worker_id: &str,
    queue: &[Arc<Scenario>],
    from: usize,
    status: RunStatus,
) {
    for scenario in queue.iter().skip(from) {
        for version in scenario.execution_versions() {
            send(
                sender,
                WorkerEvent::Result(RunResult::new(&scenario.id, version, worker_id, status)),
            );
        }
    }
}

fn send(sender: &UnboundedSender<WorkerEvent>, event: WorkerEvent) {
    if sender.send(event).is_err() {
        log::warn!("Coordinator stopped listening for results");
    }
}

/// [RunStatus::RunnerFailed] results for every assigned execution that never reported, which
/// happens when a worker thread panics.
fn missing_results(
    scenarios: &[Scenario],
    assignments: &[WorkerAssignment],
    results: &[RunResult],
) -> Vec<RunResult> {
    let reported = results
        .iter()
        .map(|r| (r.scenario_id.as_str(), r.baseline_version.as_str()))
        .collect::<BTreeSet<_>>();
    let by_id = scenarios
        .iter()
        .map(|s| (s.id.as_str(), s))
        .collect::<BTreeMap<_, _>>();

    let mut missing = Vec::new();
    for assignment in assignments {
        for scenario in assignment
            .scenario_ids
            .iter()
            .filter_map(|id| by_id.get(id.as_str()))
        {
            for version in scenario.execution_versions() {
                if !reported.contains(&(scenario.id.as_str(), version)) {
                    missing.push(RunResult::new(
                        &scenario.id,
                        version,
                        &assignment.worker_id,
                        RunStatus::RunnerFailed,
                    ));
                }
            }
        }
    }

    missing
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedWorker(String);

    impl Worker for NamedWorker {
        fn id(&self) -> &str {
            &self.0
        }

        fn check(&self) -> Result<(), RunnerFailureError> {
            Ok(())
        }

        fn execute(&self, _: &Scenario, _: &str) -> Result<RunResult, RunnerFailureError> {
            Err(RunnerFailureError::new(&self.0, "not used"))
        }
    }

    fn scenario(id: &str) -> Scenario {
        Scenario {
            id: id.to_string(),
            test_class_name: id.to_string(),
            baseline_versions: vec!["last".to_string()],
            channel: "commits".to_string(),
        }
    }

    fn workers(count: usize) -> Vec<Arc<dyn Worker>> {
        (0..count)
            .map(|i| Arc::new(NamedWorker(format!("worker-{i}"))) as Arc<dyn Worker>)
            .collect()
    }

    #[test]
    fn assignment_is_balanced_and_stable() {
        let scenarios = (0..10).map(|i| scenario(&format!("s{i}"))).collect::<Vec<_>>();
        let first = assign(&scenarios, &workers(3));
        let second = assign(&scenarios, &workers(3));

        assert_eq!(first, second);
        assert_eq!(
            vec![4, 3, 3],
            first.iter().map(|a| a.scenario_ids.len()).collect::<Vec<_>>()
        );
        let all = first
            .iter()
            .flat_map(|a| a.scenario_ids.iter().cloned())
            .sorted()
            .collect::<Vec<_>>();
        assert_eq!(
            scenarios.iter().map(|s| s.id.clone()).sorted().collect::<Vec<_>>(),
            all
        );
    }

    #[test]
    fn stable_hash_does_not_depend_on_the_process() {
        assert_eq!(stable_hash("a"), stable_hash("a"));
        assert_ne!(stable_hash("a"), stable_hash("b"));
    }

    #[test]
    fn unreported_executions_are_runner_failures() {
        let scenarios = vec![scenario("a"), scenario("b")];
        let assignments = vec![WorkerAssignment {
            worker_id: "worker-0".to_string(),
            scenario_ids: vec!["a".to_string(), "b".to_string()],
        }];
        let results = vec![
            RunResult::new("a", CURRENT_VERSION, "worker-0", RunStatus::Succeeded),
            RunResult::new("a", "last", "worker-0", RunStatus::Succeeded),
        ];

        let missing = missing_results(&scenarios, &assignments, &results);

        assert_eq!(
            vec![("b", CURRENT_VERSION), ("b", "last")],
            missing
                .iter()
                .map(|r| (r.scenario_id.as_str(), r.baseline_version.as_str()))
                .collect::<Vec<_>>()
        );
        assert!(missing.iter().all(|r| r.status == RunStatus::RunnerFailed));
    }
}
