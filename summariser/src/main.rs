use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use perf_tunnel_catalog::read_catalog_file;
use perf_tunnel_model::{RunResult, Scenario};
use perf_tunnel_summariser::report::{summary_table, ArtifactSet, ReportBuilder, ReportContext};
use perf_tunnel_summariser::{load_results, Aggregator, AggregatorConfig};
use std::path::PathBuf;

/// Rebuild comparison reports from the results of an earlier run.
#[derive(Parser)]
#[command(about, long_about = None)]
struct SummariserCli {
    /// JSON lines file with one run result per line
    #[arg(long, env = "RUN_RESULTS_PATH", default_value = "results.jsonl")]
    results: PathBuf,

    /// Skip lines of the results file that are not run results instead of failing
    #[arg(long, default_value = "false")]
    allow_invalid: bool,

    /// Scenario catalog file. When given, baselines that never ran are reported as missing.
    #[arg(long)]
    scenario_list: Option<PathBuf>,

    /// Directory holding the per-scenario result files
    #[arg(long, default_value = "build/performance-tests/results")]
    result_dir: PathBuf,

    /// Where to write the reports
    #[arg(long, default_value = "build/performance-tests/report")]
    output_dir: PathBuf,

    #[arg(long, default_value = "commits")]
    channel: String,

    /// Allowed slowdown of the median, in percent
    #[arg(long, default_value_t = 5.0)]
    threshold_pct: f64,

    /// Minimum confidence, between 0 and 1, before a slowdown counts as a regression
    #[arg(long, default_value_t = 0.99)]
    min_confidence: f64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = SummariserCli::parse();

    log::debug!("Loading results from {}", cli.results.display());
    let results: Vec<RunResult> = load_results(&cli.results, cli.allow_invalid)
        .with_context(|| format!("Failed to load results from {}", cli.results.display()))?;

    let aggregator = Aggregator::new(AggregatorConfig {
        threshold_pct: cli.threshold_pct,
        min_confidence: cli.min_confidence,
    });
    let reports = match &cli.scenario_list {
        Some(path) => {
            let scenarios: Vec<Scenario> = read_catalog_file(path)
                .with_context(|| format!("Failed to read scenario list {}", path.display()))?;
            aggregator.aggregate_for(&scenarios, &results)
        }
        None => aggregator.aggregate(&results),
    };

    let artifacts = ArtifactSet {
        result_dir: cli.result_dir.clone(),
        debug_artifacts: results
            .iter()
            .flat_map(|r| r.artifact_paths.iter().cloned())
            .collect(),
    };
    let built = ReportBuilder::new(
        &cli.output_dir,
        ReportContext {
            title: format!("Performance report - {}", cli.channel),
            channel: cli.channel.clone(),
            generated_at: Utc::now().to_rfc3339(),
        },
    )
    .build(&reports, &artifacts)?;

    log::info!("Comparison:\n{}", summary_table(&reports));
    log::info!("HTML report: {}", built.html_report.display());
    log::info!("CSV report: {}", built.csv_report.display());
    log::info!("Result archive: {}", built.result_archive.display());

    Ok(())
}
