use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{ChecksMode, FileConfig, Profile};
use crate::test_runner::CommandTemplate;
use crate::worker::WorkerSpec;

#[derive(Parser)]
#[command(about, long_about = None)]
pub struct PerfTunnelCli {
    /// TOML file with default settings. Command line flags take precedence over it.
    #[arg(long, env = "PERF_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the performance tests of a profile and write the comparison report
    Run(RunArgs),
    /// Print the scenarios a profile would run, or write them to a scenario list file
    Catalog {
        #[command(flatten)]
        run: RunArgs,

        /// Write the catalog to this file instead of printing it
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Point every test in the manifest at a single new baseline version
    Rebaseline {
        /// The new baseline version
        version: String,

        #[arg(long, default_value = "perf-tests.toml")]
        manifest: PathBuf,
    },
    /// Print the work units to register with a build engine, as JSON
    WorkUnits {
        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// The profile to run
    #[arg(value_enum, default_value = "performance-test")]
    pub profile: Profile,

    /// Channel to report to, for profiles that do not fix their own
    #[arg(long, env = "PERF_CHANNEL")]
    pub channel: Option<String>,

    /// Comma separated baselines. `defaults` keeps the baselines of each test, `historical`
    /// expands to the historical sweep.
    #[arg(long, env = "PERF_BASELINES")]
    pub baselines: Option<String>,

    /// Override whether regressions fail the run
    #[arg(long, value_enum)]
    pub checks: Option<ChecksMode>,

    /// The test manifest
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Where test processes write their output
    #[arg(long)]
    pub results_dir: Option<PathBuf>,

    /// Where the report, results and run summary are written
    #[arg(long)]
    pub report_dir: Option<PathBuf>,

    /// Sample definitions to generate and fingerprint before the run
    #[arg(long)]
    pub samples_file: Option<PathBuf>,

    /// Caps the number of projects of every generated sample
    #[arg(long)]
    pub max_projects: Option<usize>,

    /// Do not regenerate the samples before the run, only fingerprint them
    #[arg(long, default_value = "false")]
    pub skip_samples: bool,

    /// The test command. Supports `{scenario_id}`, `{test_class}`, `{version}`, `{distribution}`,
    /// `{output_dir}` and `{max_heap}` placeholders.
    #[arg(long)]
    pub command: Option<String>,

    /// Launcher prefix for a remote worker, e.g. `--worker "ssh agent-1"`. Repeat for more
    /// workers. Only used by distributed profiles.
    #[arg(long = "worker")]
    pub workers: Vec<String>,

    /// Number of local workers for distributed profiles when no `--worker` is given
    #[arg(long)]
    pub worker_count: Option<usize>,

    /// Per-execution timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Heap ceiling of the test processes
    #[arg(long)]
    pub max_heap: Option<String>,

    /// Directory with one installed distribution per version
    #[arg(long)]
    pub distributions_dir: Option<PathBuf>,

    /// Distribution of the version under test
    #[arg(long)]
    pub current_distribution: Option<PathBuf>,

    /// The version `last` resolves to
    #[arg(long)]
    pub last_release: Option<String>,

    /// URL of the historical result store. `file:` URLs are written by the coordinator.
    #[arg(long, env = "PERF_DB_URL")]
    pub db_url: Option<String>,

    #[arg(long, env = "PERF_DB_USERNAME")]
    pub db_username: Option<String>,

    #[arg(long, env = "PERF_DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    #[arg(long)]
    pub flame_graph_dir: Option<PathBuf>,

    /// Identifier of the CI build that triggered the run
    #[arg(long, env = "PERF_BUILD_ID")]
    pub build_id: Option<String>,

    #[arg(long, env = "PERF_BRANCH")]
    pub branch: Option<String>,

    #[arg(long, env = "PERF_CI_URL")]
    pub ci_url: Option<String>,

    #[arg(long, env = "PERF_CI_USERNAME")]
    pub ci_username: Option<String>,

    #[arg(long, env = "PERF_CI_PASSWORD", hide_env_values = true)]
    pub ci_password: Option<String>,

    /// Allowed slowdown of the median, in percent
    #[arg(long)]
    pub threshold_pct: Option<f64>,

    /// Minimum confidence, between 0 and 1, before a slowdown counts as a regression
    #[arg(long)]
    pub min_confidence: Option<f64>,

    /// Fraction of workers that may fail before the run fails
    #[arg(long)]
    pub runner_failure_fraction: Option<f64>,

    /// Host CPU load, in percent, above which a warning is logged
    #[arg(long)]
    pub cpu_warn_threshold: Option<f32>,

    /// Mirror the output of the test processes to the log
    #[arg(long, short, default_value = "false")]
    pub verbose: bool,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by anyone and is just adding noise to the logs.
    #[arg(long, default_value = "false")]
    pub no_progress: bool,
}

impl RunArgs {
    /// The settings given on the command line, everything else unset.
    pub fn file_config(&self) -> FileConfig {
        FileConfig {
            channel: self.channel.clone(),
            baselines: self.baselines.clone(),
            checks: self.checks,
            manifest: self.manifest.clone(),
            results_dir: self.results_dir.clone(),
            report_dir: self.report_dir.clone(),
            samples_file: self.samples_file.clone(),
            command: self.command.as_deref().map(CommandTemplate::parse),
            workers: (!self.workers.is_empty())
                .then(|| self.workers.iter().map(|w| WorkerSpec::parse(w)).collect()),
            worker_count: self.worker_count,
            timeout_secs: self.timeout_secs,
            max_heap: self.max_heap.clone(),
            distributions_dir: self.distributions_dir.clone(),
            current_distribution: self.current_distribution.clone(),
            last_release: self.last_release.clone(),
            db_url: self.db_url.clone(),
            db_username: self.db_username.clone(),
            db_password: self.db_password.clone(),
            flame_graph_dir: self.flame_graph_dir.clone(),
            build_id: self.build_id.clone(),
            branch: self.branch.clone(),
            ci_url: self.ci_url.clone(),
            ci_username: self.ci_username.clone(),
            ci_password: self.ci_password.clone(),
            threshold_pct: self.threshold_pct,
            min_confidence: self.min_confidence,
            runner_failure_fraction: self.runner_failure_fraction,
            cpu_warn_threshold: self.cpu_warn_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_command() {
        let cli = PerfTunnelCli::try_parse_from([
            "perf-tunnel",
            "run",
            "distributed-performance-test",
            "--worker",
            "ssh agent-1",
            "--worker",
            "ssh agent-2",
            "--baselines",
            "2.0,last",
            "--command",
            "sh run.sh {scenario_id}",
            "--no-progress",
        ])
        .unwrap();

        let Command::Run(args) = cli.command else {
            panic!("Expected the run command");
        };
        assert_eq!(Profile::DistributedPerformanceTest, args.profile);
        assert!(args.no_progress);

        let file = args.file_config();
        assert_eq!(2, file.workers.unwrap().len());
        assert_eq!(Some("2.0,last".to_string()), file.baselines);
        assert_eq!(
            Some(CommandTemplate::parse("sh run.sh {scenario_id}")),
            file.command
        );
    }

    #[test]
    fn profile_defaults_to_performance_test() {
        let cli = PerfTunnelCli::try_parse_from(["perf-tunnel", "catalog"]).unwrap();
        let Command::Catalog { run, output } = cli.command else {
            panic!("Expected the catalog command");
        };
        assert_eq!(Profile::PerformanceTest, run.profile);
        assert!(output.is_none());
    }
}
