use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use perf_tunnel_core::prelude::CancelHandle;
use perf_tunnel_model::{RunStatus, Scenario, CURRENT_VERSION};
use perf_tunnel_runner::prelude::{
    execution_dir, process_workers, CommandTemplate, Coordinator, Executor, PerfConfig, Profile,
    ProcessWorker, Worker, WorkerSpec,
};
use pretty_assertions::assert_eq;

fn executor() -> Arc<Executor> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();
    Arc::new(Executor::new(runtime, CancelHandle::new()))
}

fn scenario(id: &str) -> Scenario {
    Scenario {
        id: id.to_string(),
        test_class_name: "org.example.PerfTest".to_string(),
        baseline_versions: vec!["2.0".to_string()],
        channel: "commits".to_string(),
    }
}

/// A config whose test command is the given shell script.
fn config(dir: &Path, script: &str) -> PerfConfig {
    let mut config = PerfConfig::new(Profile::PerformanceTest);
    config.results_dir = dir.join("results");
    config.report_dir = dir.join("report");
    config.command = CommandTemplate(vec!["sh".to_string(), "-c".to_string(), script.to_string()]);
    config.timeout = Duration::from_secs(10);
    config.no_progress = true;
    config
}

fn local_worker(config: &PerfConfig) -> ProcessWorker {
    ProcessWorker::new(
        "worker-0",
        &WorkerSpec::local(),
        config.runner_settings(),
        executor(),
    )
}

#[test]
fn samples_are_read_from_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(
        dir.path(),
        "echo warming up; echo sample_ms=12.5; echo sample_ms=13; echo $PERF_VERSION >&2",
    );
    let worker = local_worker(&config);

    let result = worker.execute(&scenario("a"), "2.0").unwrap();

    assert_eq!(RunStatus::Succeeded, result.status);
    assert_eq!(vec![12.5, 13.0], result.samples);
    assert_eq!(Some(0), result.exit_code);

    let output_dir = execution_dir(&config.results_dir, "a", "2.0");
    let stderr = std::fs::read_to_string(output_dir.join("stderr.log")).unwrap();
    assert_eq!("2.0", stderr.trim());
    assert!(result
        .artifact_paths
        .contains(&output_dir.join("stdout.log")));
}

#[test]
fn heap_dumps_are_collected() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(
        dir.path(),
        "echo sample_ms=1; touch \"$PERF_OUTPUT_DIR/oom.hprof\"",
    );
    let worker = local_worker(&config);

    let result = worker.execute(&scenario("a"), CURRENT_VERSION).unwrap();

    let output_dir = execution_dir(&config.results_dir, "a", CURRENT_VERSION);
    assert!(result.artifact_paths.contains(&output_dir.join("oom.hprof")));
}

#[test]
fn non_zero_exit_is_an_execution_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), "echo sample_ms=5; exit 3");
    let worker = local_worker(&config);

    let result = worker.execute(&scenario("a"), CURRENT_VERSION).unwrap();

    assert_eq!(RunStatus::ExecutionFailed, result.status);
    assert_eq!(Some(3), result.exit_code);
    assert!(result.samples.is_empty());
}

#[test]
fn slow_process_times_out_and_keeps_partial_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(
        dir.path(),
        "touch \"$PERF_OUTPUT_DIR/partial.hprof\"; exec sleep 30",
    );
    config.timeout = Duration::from_millis(500);
    let worker = local_worker(&config);

    let result = worker.execute(&scenario("a"), CURRENT_VERSION).unwrap();

    assert_eq!(RunStatus::TimedOut, result.status);
    assert_eq!(None, result.exit_code);
    assert!(result.samples.is_empty());
    let output_dir = execution_dir(&config.results_dir, "a", CURRENT_VERSION);
    assert!(result
        .artifact_paths
        .contains(&output_dir.join("partial.hprof")));
}

#[test]
fn missing_distribution_is_reported_without_running() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path(), "echo sample_ms=1");
    let distributions = dir.path().join("distributions");
    std::fs::create_dir_all(distributions.join("2.0")).unwrap();
    config.distributions.distributions_dir = Some(distributions);
    let worker = local_worker(&config);

    let installed = worker.execute(&scenario("a"), "2.0").unwrap();
    let missing = worker.execute(&scenario("a"), "1.0").unwrap();

    assert_eq!(RunStatus::Succeeded, installed.status);
    assert_eq!(RunStatus::BaselineUnavailable, missing.status);
    assert!(!execution_dir(&config.results_dir, "a", "1.0").exists());
}

#[test]
fn worker_without_launcher_fails_its_check() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), "echo sample_ms=1");
    let worker = ProcessWorker::new(
        "worker-1",
        &WorkerSpec::parse("perf-tunnel-launcher-that-does-not-exist --host agent-1"),
        config.runner_settings(),
        executor(),
    );

    let error = worker.check().unwrap_err();
    assert_eq!("worker-1", error.worker_id());
}

#[test]
fn unreachable_worker_scenarios_are_runner_failures() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path(), "echo sample_ms=10");
    config.workers = vec![
        WorkerSpec::local(),
        WorkerSpec::parse("perf-tunnel-launcher-that-does-not-exist"),
    ];
    let workers = process_workers(&config.workers, &config.runner_settings(), executor());
    let scenarios = (0..4).map(|i| scenario(&format!("s{i}"))).collect::<Vec<_>>();

    let outcome = Coordinator::new(config, workers)
        .run(scenarios, &CancelHandle::new())
        .unwrap();

    assert_eq!(vec!["worker-1".to_string()], outcome.summary.failed_workers);
    assert_eq!(8, outcome.results.len());
    for result in &outcome.results {
        match result.worker_id.as_str() {
            "worker-0" => assert_eq!(RunStatus::Succeeded, result.status),
            _ => assert_eq!(RunStatus::RunnerFailed, result.status),
        }
    }
    // One failed worker out of two is not over the default fraction
    assert!(outcome.passed());
}
