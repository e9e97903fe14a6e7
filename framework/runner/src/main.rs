use anyhow::Context;
use perf_tunnel_catalog::{write_catalog, write_catalog_file, TestManifest};
use perf_tunnel_runner::prelude::{
    init, load_scenarios, run, samples_for_run, work_units, Command, FileConfig, PerfConfig,
    RunArgs,
};

fn main() -> anyhow::Result<()> {
    let cli = init();

    let file_config = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let resolve = |args: &RunArgs| {
        let mut config = PerfConfig::resolve(args.profile, args.file_config().or(file_config.clone()));
        config.verbose = args.verbose;
        config.no_progress = args.no_progress;
        config
    };

    match cli.command {
        Command::Run(args) => {
            let config = resolve(&args);
            let fingerprints = samples_for_run(&config, args.max_projects, !args.skip_samples)?;
            let outcome = run(config, fingerprints)?;

            println!("{}", serde_json::to_string_pretty(&outcome.summary)?);
            if !outcome.passed() {
                anyhow::bail!(
                    "Performance test run failed: {}",
                    outcome.summary.failure_reasons.join("; ")
                );
            }
        }
        Command::Catalog { run, output } => {
            let config = resolve(&run);
            let scenarios = load_scenarios(&config)?;
            match output {
                Some(path) => {
                    write_catalog_file(&scenarios, &path)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    log::info!("Wrote {} scenarios to {}", scenarios.len(), path.display());
                }
                None => write_catalog(&scenarios, &mut std::io::stdout().lock())?,
            }
        }
        Command::Rebaseline { version, manifest } => {
            let mut tests = TestManifest::load(&manifest)?;
            let changed = tests.rebaseline(&version);
            tests.save(&manifest)?;
            log::info!(
                "Rebaselined {} tests in {} to {}",
                changed,
                manifest.display(),
                version
            );
        }
        Command::WorkUnits { run } => {
            let config = resolve(&run);
            println!("{}", serde_json::to_string_pretty(&work_units(&config))?);
        }
    }

    Ok(())
}
