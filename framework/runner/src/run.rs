use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use perf_tunnel_catalog::{ScenarioCatalog, TestManifest};
use perf_tunnel_model::Scenario;
use sample_builder::{prepare_samples, sample_fingerprints, GeneratorOptions};

use crate::config::PerfConfig;
use crate::coordinator::{Coordinator, RunOutcome};
use crate::executor::Executor;
use crate::worker::process_workers;

/// The scenarios selected by the profile of `config`, ordered by id.
pub fn load_scenarios(config: &PerfConfig) -> anyhow::Result<Vec<Scenario>> {
    let manifest = TestManifest::load(&config.manifest)
        .with_context(|| format!("Failed to load test manifest {}", config.manifest.display()))?;
    let catalog = ScenarioCatalog::build(&manifest, &config.baselines, &config.channel)
        .context("Failed to build the scenario catalog")?;

    let scenarios = catalog.list_scenarios(&config.filter);
    log::info!(
        "Selected {} of {} scenarios for {}",
        scenarios.len(),
        catalog.len(),
        config.profile.unit_name()
    );
    Ok(scenarios)
}

/// Generate the configured samples, or only fingerprint them when `regenerate` is false.
///
/// Without a samples file there is nothing to do.
pub fn samples_for_run(
    config: &PerfConfig,
    max_projects: Option<usize>,
    regenerate: bool,
) -> anyhow::Result<BTreeMap<String, String>> {
    if !config.samples_file.is_file() {
        log::debug!(
            "No samples file at {}, running without generated samples",
            config.samples_file.display()
        );
        return Ok(BTreeMap::new());
    }

    let options = GeneratorOptions::default()
        .samples_file(config.samples_file.clone())
        .max_projects(max_projects);
    if regenerate {
        prepare_samples(&options).context("Failed to prepare samples")
    } else {
        sample_fingerprints(&options).context("Failed to fingerprint samples")
    }
}

/// Run the performance tests described by `config` on local or remote test processes.
///
/// Ctrl-C cancels the run: running scenarios finish and the rest are reported as cancelled.
pub fn run(
    config: PerfConfig,
    sample_fingerprints: BTreeMap<String, String>,
) -> anyhow::Result<RunOutcome> {
    if config.command.is_empty() {
        anyhow::bail!("No test command configured, pass --command or set `command` in the config file");
    }

    let scenarios = load_scenarios(&config)?;

    let executor = Arc::new(Executor::with_ctrl_c()?);
    let workers = process_workers(&config.workers, &config.runner_settings(), executor.clone());
    let cancel = executor.cancel_handle().clone();

    Coordinator::new(config, workers)
        .with_sample_fingerprints(sample_fingerprints)
        .run(scenarios, &cancel)
}
