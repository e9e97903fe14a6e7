use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use perf_tunnel_catalog::{BaselineRequest, CategoryFilter, EXPERIMENT_CATEGORY};
use perf_tunnel_summariser::AggregatorConfig;
use serde::{Deserialize, Serialize};

use crate::distributions::DistributionResolver;
use crate::history::{ResultStore, ADHOC_STORE};
use crate::monitor::DEFAULT_CPU_WARN_THRESHOLD;
use crate::test_runner::{ChildEnvironment, CommandTemplate, TestRunnerSettings, DEFAULT_MAX_HEAP};
use crate::worker::WorkerSpec;

/// Channel used when neither the profile nor the configuration names one
pub const DEFAULT_CHANNEL: &str = "commits";

/// Default fraction of workers that may fail before the run fails
pub const DEFAULT_RUNNER_FAILURE_FRACTION: f64 = 0.5;

/// Default per-execution timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Named preset of filter, channel, checks mode and dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    PerformanceTest,
    PerformanceExperiment,
    FullPerformanceTest,
    PerformanceAdhocTest,
    DistributedPerformanceTest,
    DistributedPerformanceExperiment,
    DistributedFullPerformanceTest,
}

/// Whether flagged regressions fail the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChecksMode {
    /// Any flagged regression fails the run
    All,
    /// Regressions are reported but never fail the run
    None,
}

impl Profile {
    pub const ALL: [Profile; 7] = [
        Profile::PerformanceTest,
        Profile::PerformanceExperiment,
        Profile::FullPerformanceTest,
        Profile::PerformanceAdhocTest,
        Profile::DistributedPerformanceTest,
        Profile::DistributedPerformanceExperiment,
        Profile::DistributedFullPerformanceTest,
    ];

    pub fn filter(&self) -> CategoryFilter {
        match self {
            Profile::PerformanceTest | Profile::DistributedPerformanceTest => {
                CategoryFilter::all().excluding(EXPERIMENT_CATEGORY)
            }
            Profile::PerformanceExperiment | Profile::DistributedPerformanceExperiment => {
                CategoryFilter::all().including(EXPERIMENT_CATEGORY)
            }
            Profile::FullPerformanceTest
            | Profile::PerformanceAdhocTest
            | Profile::DistributedFullPerformanceTest => CategoryFilter::all(),
        }
    }

    /// Channel fixed by the profile. `None` means the configured channel is used.
    pub fn channel(&self) -> Option<&'static str> {
        match self {
            Profile::PerformanceAdhocTest => Some("adhoc"),
            Profile::DistributedPerformanceTest => Some("commits"),
            Profile::DistributedPerformanceExperiment => Some("experiments"),
            Profile::DistributedFullPerformanceTest => Some("historical"),
            _ => None,
        }
    }

    pub fn checks(&self) -> ChecksMode {
        match self {
            Profile::DistributedFullPerformanceTest => ChecksMode::None,
            _ => ChecksMode::All,
        }
    }

    /// Whether the profile sweeps the historical baselines instead of the configured ones.
    pub fn is_historical(&self) -> bool {
        matches!(self, Profile::DistributedFullPerformanceTest)
    }

    pub fn is_distributed(&self) -> bool {
        matches!(
            self,
            Profile::DistributedPerformanceTest
                | Profile::DistributedPerformanceExperiment
                | Profile::DistributedFullPerformanceTest
        )
    }

    /// Local result store the profile writes to regardless of configuration
    pub fn local_store(&self) -> Option<&'static str> {
        match self {
            Profile::PerformanceAdhocTest => Some(ADHOC_STORE),
            _ => None,
        }
    }

    /// Name of the work unit that runs this profile, e.g. `distributedPerformanceTest`
    pub fn unit_name(&self) -> &'static str {
        match self {
            Profile::PerformanceTest => "performanceTest",
            Profile::PerformanceExperiment => "performanceExperiment",
            Profile::FullPerformanceTest => "fullPerformanceTest",
            Profile::PerformanceAdhocTest => "performanceAdhocTest",
            Profile::DistributedPerformanceTest => "distributedPerformanceTest",
            Profile::DistributedPerformanceExperiment => "distributedPerformanceExperiment",
            Profile::DistributedFullPerformanceTest => "distributedFullPerformanceTest",
        }
    }

    /// The channel runs of this profile report to.
    ///
    /// Distributed profiles append `-<branch>` for a non-empty branch name.
    pub fn resolve_channel(&self, configured: Option<&str>, branch: Option<&str>) -> String {
        let channel = self
            .channel()
            .or(configured)
            .unwrap_or(DEFAULT_CHANNEL)
            .to_string();
        match branch.filter(|b| !b.is_empty()) {
            Some(branch) if self.is_distributed() => format!("{channel}-{branch}"),
            _ => channel,
        }
    }
}

/// Settings that can be put in a TOML file instead of passing them on the command line.
///
/// Every field is optional. Command line flags win over the file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub channel: Option<String>,
    pub baselines: Option<String>,
    pub checks: Option<ChecksMode>,
    pub manifest: Option<PathBuf>,
    pub results_dir: Option<PathBuf>,
    pub report_dir: Option<PathBuf>,
    pub samples_file: Option<PathBuf>,
    pub command: Option<CommandTemplate>,
    pub workers: Option<Vec<WorkerSpec>>,
    pub worker_count: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub max_heap: Option<String>,
    pub distributions_dir: Option<PathBuf>,
    pub current_distribution: Option<PathBuf>,
    pub last_release: Option<String>,
    pub db_url: Option<String>,
    pub db_username: Option<String>,
    pub db_password: Option<String>,
    pub flame_graph_dir: Option<PathBuf>,
    pub build_id: Option<String>,
    pub branch: Option<String>,
    pub ci_url: Option<String>,
    pub ci_username: Option<String>,
    pub ci_password: Option<String>,
    pub threshold_pct: Option<f64>,
    pub min_confidence: Option<f64>,
    pub runner_failure_fraction: Option<f64>,
    pub cpu_warn_threshold: Option<f32>,
}

impl FileConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Could not parse config file {}", path.display()))
    }

    /// Fill every unset field from `other`.
    pub fn or(self, other: FileConfig) -> FileConfig {
        FileConfig {
            channel: self.channel.or(other.channel),
            baselines: self.baselines.or(other.baselines),
            checks: self.checks.or(other.checks),
            manifest: self.manifest.or(other.manifest),
            results_dir: self.results_dir.or(other.results_dir),
            report_dir: self.report_dir.or(other.report_dir),
            samples_file: self.samples_file.or(other.samples_file),
            command: self.command.or(other.command),
            workers: self.workers.or(other.workers),
            worker_count: self.worker_count.or(other.worker_count),
            timeout_secs: self.timeout_secs.or(other.timeout_secs),
            max_heap: self.max_heap.or(other.max_heap),
            distributions_dir: self.distributions_dir.or(other.distributions_dir),
            current_distribution: self.current_distribution.or(other.current_distribution),
            last_release: self.last_release.or(other.last_release),
            db_url: self.db_url.or(other.db_url),
            db_username: self.db_username.or(other.db_username),
            db_password: self.db_password.or(other.db_password),
            flame_graph_dir: self.flame_graph_dir.or(other.flame_graph_dir),
            build_id: self.build_id.or(other.build_id),
            branch: self.branch.or(other.branch),
            ci_url: self.ci_url.or(other.ci_url),
            ci_username: self.ci_username.or(other.ci_username),
            ci_password: self.ci_password.or(other.ci_password),
            threshold_pct: self.threshold_pct.or(other.threshold_pct),
            min_confidence: self.min_confidence.or(other.min_confidence),
            runner_failure_fraction: self.runner_failure_fraction.or(other.runner_failure_fraction),
            cpu_warn_threshold: self.cpu_warn_threshold.or(other.cpu_warn_threshold),
        }
    }
}

/// Everything a run needs, resolved once and passed by value to the components.
#[derive(Debug, Clone)]
pub struct PerfConfig {
    pub profile: Profile,
    pub channel: String,
    pub baselines: BaselineRequest,
    pub filter: CategoryFilter,
    pub checks: ChecksMode,
    pub manifest: PathBuf,
    pub results_dir: PathBuf,
    pub report_dir: PathBuf,
    /// `samples.toml` whose fingerprints are recorded with the run, if it exists
    pub samples_file: PathBuf,
    pub command: CommandTemplate,
    pub workers: Vec<WorkerSpec>,
    pub timeout: Duration,
    pub max_heap: String,
    pub distributions: DistributionResolver,
    pub db_url: Option<String>,
    pub db_username: Option<String>,
    pub db_password: Option<String>,
    pub flame_graph_dir: Option<PathBuf>,
    pub build_id: Option<String>,
    pub branch: Option<String>,
    pub ci_url: Option<String>,
    pub ci_username: Option<String>,
    pub ci_password: Option<String>,
    pub aggregator: AggregatorConfig,
    pub runner_failure_fraction: f64,
    pub cpu_warn_threshold: f32,
    pub verbose: bool,
    pub no_progress: bool,
}

impl PerfConfig {
    /// Defaults for a profile, with one local worker.
    pub fn new(profile: Profile) -> Self {
        Self::resolve(profile, FileConfig::default())
    }

    /// Resolve the configuration of a run from the profile and the merged settings.
    pub fn resolve(profile: Profile, settings: FileConfig) -> Self {
        let baselines = if profile.is_historical() {
            BaselineRequest::historical()
        } else {
            settings
                .baselines
                .as_deref()
                .map(BaselineRequest::parse)
                .unwrap_or_default()
        };

        let workers = match (profile.is_distributed(), settings.workers) {
            (false, _) => vec![WorkerSpec::local()],
            (true, Some(workers)) if !workers.is_empty() => workers,
            (true, _) => vec![WorkerSpec::local(); settings.worker_count.unwrap_or(1).max(1)],
        };

        let db_url = profile
            .local_store()
            .map(str::to_string)
            .or(settings.db_url);

        let aggregator_defaults = AggregatorConfig::default();

        Self {
            profile,
            channel: profile
                .resolve_channel(settings.channel.as_deref(), settings.branch.as_deref()),
            baselines,
            filter: profile.filter(),
            checks: settings.checks.unwrap_or_else(|| profile.checks()),
            manifest: settings
                .manifest
                .unwrap_or_else(|| PathBuf::from("perf-tests.toml")),
            results_dir: settings
                .results_dir
                .unwrap_or_else(|| PathBuf::from("build/performance-tests/results")),
            report_dir: settings
                .report_dir
                .unwrap_or_else(|| PathBuf::from("build/performance-tests/report")),
            samples_file: settings
                .samples_file
                .unwrap_or_else(|| PathBuf::from("samples.toml")),
            command: settings.command.unwrap_or_default(),
            workers,
            timeout: settings
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT),
            max_heap: settings
                .max_heap
                .unwrap_or_else(|| DEFAULT_MAX_HEAP.to_string()),
            distributions: DistributionResolver {
                current: settings.current_distribution,
                distributions_dir: settings.distributions_dir,
                last_release: settings.last_release,
            },
            db_url,
            db_username: settings.db_username,
            db_password: settings.db_password,
            flame_graph_dir: settings.flame_graph_dir,
            build_id: settings.build_id,
            branch: settings.branch.filter(|b| !b.is_empty()),
            ci_url: settings.ci_url,
            ci_username: settings.ci_username,
            ci_password: settings.ci_password,
            aggregator: AggregatorConfig {
                threshold_pct: settings
                    .threshold_pct
                    .unwrap_or(aggregator_defaults.threshold_pct),
                min_confidence: settings
                    .min_confidence
                    .unwrap_or(aggregator_defaults.min_confidence),
            },
            runner_failure_fraction: settings
                .runner_failure_fraction
                .unwrap_or(DEFAULT_RUNNER_FAILURE_FRACTION),
            cpu_warn_threshold: settings
                .cpu_warn_threshold
                .unwrap_or(DEFAULT_CPU_WARN_THRESHOLD),
            verbose: false,
            no_progress: false,
        }
    }

    /// The store the coordinator appends results to, if the database URL points at a file.
    pub fn result_store(&self) -> Option<ResultStore> {
        self.db_url.as_deref().and_then(ResultStore::from_url)
    }

    pub fn runner_settings(&self) -> TestRunnerSettings {
        TestRunnerSettings {
            command: self.command.clone(),
            results_dir: self.results_dir.clone(),
            timeout: self.timeout,
            max_heap: self.max_heap.clone(),
            distributions: self.distributions.clone(),
            environment: ChildEnvironment {
                channel: self.channel.clone(),
                db_url: self.db_url.clone(),
                db_username: self.db_username.clone(),
                db_password: self.db_password.clone(),
                flame_graph_dir: self.flame_graph_dir.clone(),
                ci_url: self.ci_url.clone(),
                ci_username: self.ci_username.clone(),
                ci_password: self.ci_password.clone(),
            },
            verbose: self.verbose,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_defaults() {
        let config = PerfConfig::new(Profile::PerformanceTest);
        assert_eq!("commits", config.channel);
        assert_eq!(ChecksMode::All, config.checks);
        assert_eq!(BaselineRequest::Defaults, config.baselines);
        assert_eq!(vec![WorkerSpec::local()], config.workers);
        assert!(config.result_store().is_none());

        let config = PerfConfig::new(Profile::DistributedFullPerformanceTest);
        assert_eq!("historical", config.channel);
        assert_eq!(ChecksMode::None, config.checks);
        assert_eq!(BaselineRequest::historical(), config.baselines);
        assert_eq!(CategoryFilter::all(), config.filter);

        let config = PerfConfig::new(Profile::PerformanceAdhocTest);
        assert_eq!("adhoc", config.channel);
        assert_eq!(
            Some(PathBuf::from(ADHOC_STORE)),
            config.result_store().map(|s| s.path().to_path_buf())
        );
    }

    #[test]
    fn distributed_channel_gets_branch_suffix() {
        let settings = FileConfig {
            channel: Some("ignored".to_string()),
            branch: Some("release".to_string()),
            ..Default::default()
        };

        let distributed = PerfConfig::resolve(Profile::DistributedPerformanceTest, settings.clone());
        assert_eq!("commits-release", distributed.channel);

        let local = PerfConfig::resolve(Profile::PerformanceTest, settings);
        assert_eq!("ignored", local.channel);

        assert_eq!(
            "experiments",
            Profile::DistributedPerformanceExperiment.resolve_channel(None, Some(""))
        );
    }

    #[test]
    fn distributed_profiles_use_the_configured_workers() {
        let settings = FileConfig {
            workers: Some(vec![WorkerSpec::parse("ssh agent-1"), WorkerSpec::parse("ssh agent-2")]),
            ..Default::default()
        };
        assert_eq!(
            2,
            PerfConfig::resolve(Profile::DistributedPerformanceTest, settings.clone())
                .workers
                .len()
        );
        assert_eq!(
            1,
            PerfConfig::resolve(Profile::FullPerformanceTest, settings).workers.len()
        );

        let counted = FileConfig {
            worker_count: Some(3),
            ..Default::default()
        };
        assert_eq!(
            vec![WorkerSpec::local(); 3],
            PerfConfig::resolve(Profile::DistributedPerformanceExperiment, counted).workers
        );
    }

    #[test]
    fn file_config_parses_and_merges() {
        let file: FileConfig = toml::from_str(
            r#"
channel = "nightly"
baselines = "2.0,last"
command = ["sh", "run-test.sh", "{scenario_id}"]
timeout_secs = 60

[[workers]]
launcher = ["ssh", "agent-1"]
"#,
        )
        .unwrap();

        let cli = FileConfig {
            channel: Some("from-cli".to_string()),
            ..Default::default()
        };
        let merged = cli.or(file);
        let config = PerfConfig::resolve(Profile::DistributedPerformanceExperiment, merged.clone());

        assert_eq!(Some("from-cli".to_string()), merged.channel);
        assert_eq!(
            BaselineRequest::Versions(vec!["2.0".to_string(), "last".to_string()]),
            config.baselines
        );
        assert_eq!(Duration::from_secs(60), config.timeout);
        assert_eq!(vec![WorkerSpec::parse("ssh agent-1")], config.workers);
        assert_eq!(3, config.command.0.len());
    }
}
