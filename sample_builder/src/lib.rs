use anyhow::Context;
use std::collections::BTreeMap;

mod duplicates;
mod fingerprint;
mod generate;
mod manifest;
mod options;

pub use duplicates::check_no_identical_build_files;
pub use fingerprint::sample_fingerprint;
pub use generate::{generate_sample, SETTINGS_FILE};
pub use manifest::{SampleSpec, SamplesManifest};
pub use options::{GeneratorOptions, DEFAULT_BUILD_FILE_SUFFIX};

pub type SampleBuilderResult<T> = anyhow::Result<T>;

/// Generate every sample listed in the `samples.toml` from the [GeneratorOptions].
/// Each sample appears as `<out_dir>/<sample-name>/project-<n>`.
///
/// Returns the fingerprint of every generated sample, keyed by sample name.
///
/// ```rust,no_run
/// use sample_builder::{prepare_samples, GeneratorOptions};
///
/// let fingerprints = prepare_samples(&GeneratorOptions::default().max_projects(Some(10))).unwrap();
/// ```
pub fn prepare_samples(options: &GeneratorOptions) -> SampleBuilderResult<BTreeMap<String, String>> {
    let manifest = SamplesManifest::load(&options.samples_file)?;
    let template_root = options.template_root();

    let mut fingerprints = BTreeMap::new();
    for spec in &manifest.samples {
        let template_dir = template_root.join(&spec.template_dir);
        let sample_dir = generate_sample(spec, &template_dir, &options.out_dir, options.max_projects)
            .with_context(|| format!("Failed to generate sample - {}", spec.name))?;
        let fingerprint = sample_fingerprint(spec, &template_dir, options.max_projects)?;
        log::info!(
            "Generated sample [{}] in {} ({})",
            spec.name,
            sample_dir.display(),
            fingerprint
        );
        fingerprints.insert(spec.name.clone(), fingerprint);
    }

    Ok(fingerprints)
}

/// Fingerprints of the configured samples without generating them.
pub fn sample_fingerprints(options: &GeneratorOptions) -> SampleBuilderResult<BTreeMap<String, String>> {
    let manifest = SamplesManifest::load(&options.samples_file)?;
    let template_root = options.template_root();

    manifest
        .samples
        .iter()
        .map(|spec| {
            let fingerprint = sample_fingerprint(
                spec,
                &template_root.join(&spec.template_dir),
                options.max_projects,
            )?;
            Ok((spec.name.clone(), fingerprint))
        })
        .collect()
}

/// Remove everything generated under the output directory.
pub fn clean_samples(options: &GeneratorOptions) -> SampleBuilderResult<()> {
    if options.out_dir.exists() {
        log::info!("Removing generated samples in {}", options.out_dir.display());
        std::fs::remove_dir_all(&options.out_dir)
            .with_context(|| format!("Could not remove {}", options.out_dir.display()))?;
    }
    Ok(())
}
