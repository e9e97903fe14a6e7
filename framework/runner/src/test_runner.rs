use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use perf_tunnel_model::{RunResult, RunStatus, Scenario};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use walkdir::WalkDir;

use crate::distributions::DistributionResolver;

/// Default heap ceiling of a test process
pub const DEFAULT_MAX_HEAP: &str = "3g";

const SAMPLE_PREFIX: &str = "sample_ms=";
const STDOUT_LOG: &str = "stdout.log";
const STDERR_LOG: &str = "stderr.log";
const HEAP_DUMP_EXTENSION: &str = "hprof";

/// How long output readers may keep going once the process is gone. Grandchildren holding on to
/// the pipes are not waited for beyond this.
const OUTPUT_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("Could not prepare output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Could not launch `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("Lost track of the test process: {0}")]
    Wait(std::io::Error),
    #[error("Empty test command")]
    EmptyCommand,
}

/// The test process to launch, as a program followed by its arguments.
///
/// Arguments may contain the placeholders `{scenario_id}`, `{test_class}`, `{version}`,
/// `{distribution}`, `{output_dir}` and `{max_heap}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandTemplate(pub Vec<String>);

impl CommandTemplate {
    /// Split a command line on whitespace.
    pub fn parse(command: &str) -> Self {
        Self(command.split_whitespace().map(str::to_string).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn render(&self, vars: &ExecutionVars) -> Vec<String> {
        self.0.iter().map(|part| vars.substitute(part)).collect()
    }
}

/// Values shared by every execution of a run that the test process reads from its environment.
#[derive(Debug, Clone, Default)]
pub struct ChildEnvironment {
    pub channel: String,
    pub db_url: Option<String>,
    pub db_username: Option<String>,
    pub db_password: Option<String>,
    pub flame_graph_dir: Option<PathBuf>,
    pub ci_url: Option<String>,
    pub ci_username: Option<String>,
    pub ci_password: Option<String>,
}

impl ChildEnvironment {
    fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("PERF_CHANNEL", self.channel.clone()),
            ("PERF_HEAP_DUMP_ON_OOM", "true".to_string()),
        ];
        let optional = [
            ("PERF_DB_URL", self.db_url.clone()),
            ("PERF_DB_USERNAME", self.db_username.clone()),
            ("PERF_DB_PASSWORD", self.db_password.clone()),
            (
                "PERF_FLAME_GRAPH_DIR",
                self.flame_graph_dir.as_ref().map(|p| p.display().to_string()),
            ),
            ("PERF_CI_URL", self.ci_url.clone()),
            ("PERF_CI_USERNAME", self.ci_username.clone()),
            ("PERF_CI_PASSWORD", self.ci_password.clone()),
        ];
        pairs.extend(
            optional
                .into_iter()
                .filter_map(|(name, value)| value.map(|v| (name, v))),
        );
        pairs
    }
}

/// Settings for a [TestRunner].
#[derive(Debug, Clone)]
pub struct TestRunnerSettings {
    pub command: CommandTemplate,
    /// Root of the per-execution output directories, `<results_dir>/<scenario_id>/<version>`
    pub results_dir: PathBuf,
    pub timeout: Duration,
    pub max_heap: String,
    pub distributions: DistributionResolver,
    pub environment: ChildEnvironment,
    /// Mirror the stdout of test processes to the log
    pub verbose: bool,
}

/// Runs a single scenario against a single version in its own process.
///
/// A runner never has more than one process running. Concurrent calls to [TestRunner::run] wait
/// for each other.
#[derive(Debug)]
pub struct TestRunner {
    settings: TestRunnerSettings,
    /// Program and arguments the test command is prefixed with, e.g. `ssh agent-1`
    launcher: Vec<String>,
    run_lock: tokio::sync::Mutex<()>,
}

impl TestRunner {
    pub fn new(settings: TestRunnerSettings, launcher: Vec<String>) -> Self {
        Self {
            settings,
            launcher,
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn launcher(&self) -> &[String] {
        &self.launcher
    }

    /// Run `scenario` against `version`.
    ///
    /// Failures of the test process itself are reported in the returned [RunResult]. An error is
    /// only returned when this runner could not run anything at all.
    pub async fn run(
        &self,
        scenario: &Scenario,
        version: &str,
        worker_id: &str,
    ) -> Result<RunResult, RunnerError> {
        let _guard = self.run_lock.lock().await;

        let Some(distribution) = self.settings.distributions.resolve(version) else {
            log::warn!(
                "No distribution available for version {}, skipping {}",
                version,
                scenario.id
            );
            return Ok(RunResult::new(
                &scenario.id,
                version,
                worker_id,
                RunStatus::BaselineUnavailable,
            ));
        };

        let output_dir = execution_dir(&self.settings.results_dir, &scenario.id, version);
        prepare_output_dir(&output_dir)?;

        let vars = ExecutionVars {
            scenario_id: &scenario.id,
            test_class: &scenario.test_class_name,
            version,
            distribution: &distribution,
            output_dir: &output_dir,
            max_heap: &self.settings.max_heap,
        };
        let mut command_line = self.launcher.clone();
        command_line.extend(self.settings.command.render(&vars));
        let (program, args) = command_line.split_first().ok_or(RunnerError::EmptyCommand)?;

        log::debug!("Running {} against {}: {:?}", scenario.id, version, command_line);

        let mut child = Command::new(program)
            .args(args)
            .envs(vars.env())
            .envs(self.settings.environment.pairs())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                program: program.clone(),
                source,
            })?;

        let stdout_task = child.stdout.take().map(|stdout| {
            tokio::spawn(capture_stdout(
                stdout,
                output_dir.join(STDOUT_LOG),
                scenario.id.clone(),
                self.settings.verbose,
            ))
        });
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(capture_stderr(stderr, output_dir.join(STDERR_LOG))));

        let waited = tokio::time::timeout(self.settings.timeout, child.wait()).await;
        let exit = match waited {
            Ok(status) => Some(status.map_err(RunnerError::Wait)?),
            Err(_) => {
                log::error!(
                    "{} against {} timed out after {:?}",
                    scenario.id,
                    version,
                    self.settings.timeout
                );
                if let Err(e) = child.kill().await {
                    log::warn!("Failed to kill timed out test process: {:?}", e);
                }
                None
            }
        };

        let samples = match stdout_task {
            Some(task) => match tokio::time::timeout(OUTPUT_GRACE, task).await {
                Ok(Ok(samples)) => samples,
                Ok(Err(e)) => {
                    log::warn!("Stdout capture for {} failed: {:?}", scenario.id, e);
                    Vec::new()
                }
                Err(_) => {
                    log::warn!("Stdout of {} still open after exit, ignoring the rest", scenario.id);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        if let Some(task) = stderr_task {
            if tokio::time::timeout(OUTPUT_GRACE, task).await.is_err() {
                log::warn!("Stderr of {} still open after exit, ignoring the rest", scenario.id);
            }
        }

        let result = RunResult::new(&scenario.id, version, worker_id, RunStatus::Succeeded)
            .with_artifacts(collect_artifacts(&output_dir));

        Ok(match exit {
            None => RunResult {
                status: RunStatus::TimedOut,
                ..result
            },
            Some(status) if status.success() => result.with_samples(samples).with_exit_code(0),
            Some(status) => {
                log::error!(
                    "{} against {} failed with {}, see {}",
                    scenario.id,
                    version,
                    status,
                    output_dir.join(STDERR_LOG).display()
                );
                let result = RunResult {
                    status: RunStatus::ExecutionFailed,
                    ..result
                };
                match status.code() {
                    Some(code) => result.with_exit_code(code),
                    None => result,
                }
            }
        })
    }
}

/// Where the files of one execution go.
pub fn execution_dir(results_dir: &Path, scenario_id: &str, version: &str) -> PathBuf {
    results_dir.join(scenario_id).join(version)
}

fn prepare_output_dir(output_dir: &Path) -> Result<(), RunnerError> {
    let to_error = |source| RunnerError::OutputDir {
        path: output_dir.to_path_buf(),
        source,
    };
    if output_dir.exists() {
        std::fs::remove_dir_all(output_dir).map_err(to_error)?;
    }
    std::fs::create_dir_all(output_dir).map_err(to_error)
}

/// Parse a `sample_ms=<float>` line.
pub(crate) fn parse_sample(line: &str) -> Option<f64> {
    let value = line.trim().strip_prefix(SAMPLE_PREFIX)?;
    match value.trim().parse::<f64>() {
        Ok(sample) if sample.is_finite() && sample >= 0.0 => Some(sample),
        _ => {
            log::warn!("Ignoring malformed sample line: {}", line.trim());
            None
        }
    }
}

async fn capture_stdout(
    stdout: impl AsyncRead + Unpin,
    log_path: PathBuf,
    scenario_id: String,
    verbose: bool,
) -> Vec<f64> {
    let mut samples = Vec::new();
    let mut log_file = match tokio::fs::File::create(&log_path).await {
        Ok(file) => Some(file),
        Err(e) => {
            log::warn!("Could not create {}: {:?}", log_path.display(), e);
            None
        }
    };

    let mut lines = BufReader::new(stdout).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::warn!("Failed to read stdout of {}: {:?}", scenario_id, e);
                break;
            }
        };

        if verbose {
            log::info!("[{}] {}", scenario_id, line);
        }
        if let Some(sample) = parse_sample(&line) {
            samples.push(sample);
        }
        if let Some(file) = log_file.as_mut() {
            if let Err(e) = file.write_all(format!("{line}\n").as_bytes()).await {
                log::warn!("Could not write {}: {:?}", log_path.display(), e);
                log_file = None;
            }
        }
    }

    if let Some(mut file) = log_file {
        if let Err(e) = file.flush().await {
            log::warn!("Could not flush {}: {:?}", log_path.display(), e);
        }
    }

    samples
}

async fn capture_stderr(mut stderr: impl AsyncRead + Unpin, log_path: PathBuf) {
    let result = async {
        let mut file = tokio::fs::File::create(&log_path).await?;
        tokio::io::copy(&mut stderr, &mut file).await?;
        file.flush().await
    }
    .await;

    if let Err(e) = result {
        log::warn!("Could not capture stderr to {}: {:?}", log_path.display(), e);
    }
}

/// The logs and heap dumps left in an execution directory.
fn collect_artifacts(output_dir: &Path) -> BTreeSet<PathBuf> {
    let mut artifacts = BTreeSet::new();
    for name in [STDOUT_LOG, STDERR_LOG] {
        let path = output_dir.join(name);
        if path.is_file() {
            artifacts.insert(path);
        }
    }

    artifacts.extend(
        WalkDir::new(output_dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .is_some_and(|ext| ext == HEAP_DUMP_EXTENSION)
            })
            .map(|e| e.into_path()),
    );

    artifacts
}

struct ExecutionVars<'a> {
    scenario_id: &'a str,
    test_class: &'a str,
    version: &'a str,
    distribution: &'a str,
    output_dir: &'a Path,
    max_heap: &'a str,
}

impl ExecutionVars<'_> {
    fn substitute(&self, input: &str) -> String {
        input
            .replace("{scenario_id}", self.scenario_id)
            .replace("{test_class}", self.test_class)
            .replace("{version}", self.version)
            .replace("{distribution}", self.distribution)
            .replace("{output_dir}", &self.output_dir.display().to_string())
            .replace("{max_heap}", self.max_heap)
    }

    fn env(&self) -> Vec<(&'static str, String)> {
        vec![
            ("PERF_SCENARIO_ID", self.scenario_id.to_string()),
            ("PERF_TEST_CLASS", self.test_class.to_string()),
            ("PERF_VERSION", self.version.to_string()),
            ("PERF_DISTRIBUTION", self.distribution.to_string()),
            ("PERF_OUTPUT_DIR", self.output_dir.display().to_string()),
            ("PERF_MAX_HEAP", self.max_heap.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_lines() {
        assert_eq!(Some(12.5), parse_sample("sample_ms=12.5"));
        assert_eq!(Some(3.0), parse_sample("  sample_ms= 3 "));
        assert_eq!(None, parse_sample("sample_ms=fast"));
        assert_eq!(None, parse_sample("sample_ms=-1"));
        assert_eq!(None, parse_sample("Running warmup 1 of 2"));
    }

    #[test]
    fn command_template_is_rendered() {
        let template = CommandTemplate::parse("sh run.sh {scenario_id} --version={version} -Xmx{max_heap}");
        let vars = ExecutionVars {
            scenario_id: "a#clean",
            test_class: "A",
            version: "2.0",
            distribution: "/dist/2.0",
            output_dir: Path::new("/out"),
            max_heap: "3g",
        };

        assert_eq!(
            vec!["sh", "run.sh", "a#clean", "--version=2.0", "-Xmx3g"],
            template.render(&vars)
        );
    }

    #[test]
    fn optional_environment_is_only_set_when_configured() {
        let env = ChildEnvironment {
            channel: "commits".to_string(),
            db_url: Some("jdbc:h2:mem".to_string()),
            ..Default::default()
        };
        let names = env.pairs().into_iter().map(|(name, _)| name).collect::<Vec<_>>();
        assert_eq!(
            vec!["PERF_CHANNEL", "PERF_HEAP_DUMP_ON_OOM", "PERF_DB_URL"],
            names
        );
    }
}
