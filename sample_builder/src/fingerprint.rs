use crate::generate::load_templates;
use crate::manifest::SampleSpec;
use sha3::Digest;
use std::path::Path;

/// Fingerprint of the inputs of a sample.
///
/// Two samples with the same fingerprint render to the same projects. It uses the
///     - Sample name
///     - Effective project count and source file count
///     - Relative path and content of every template file
///
/// The fingerprint is computed using [sha3::Sha3_256].
pub fn sample_fingerprint(
    spec: &SampleSpec,
    template_dir: &Path,
    max_projects: Option<usize>,
) -> anyhow::Result<String> {
    let mut hasher = sha3::Sha3_256::new();
    Digest::update(&mut hasher, spec.name.as_bytes());
    Digest::update(
        &mut hasher,
        spec.effective_projects(max_projects).to_le_bytes(),
    );
    Digest::update(&mut hasher, spec.source_files.to_le_bytes());

    for (relative, content) in load_templates(template_dir)? {
        Digest::update(&mut hasher, relative.to_string_lossy().as_bytes());
        Digest::update(&mut hasher, content.as_bytes());
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn spec(projects: usize) -> SampleSpec {
        SampleSpec {
            name: "small".to_string(),
            template_dir: PathBuf::from("template"),
            projects,
            source_files: 1,
        }
    }

    #[test]
    fn fingerprint_tracks_counts_and_templates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("build.gradle"), "a").unwrap();

        let first = sample_fingerprint(&spec(3), dir.path(), None).unwrap();
        assert_eq!(first, sample_fingerprint(&spec(3), dir.path(), None).unwrap());
        assert_eq!(first, sample_fingerprint(&spec(5), dir.path(), Some(3)).unwrap());
        assert_ne!(first, sample_fingerprint(&spec(4), dir.path(), None).unwrap());

        std::fs::write(dir.path().join("build.gradle"), "b").unwrap();
        assert_ne!(first, sample_fingerprint(&spec(3), dir.path(), None).unwrap());
    }
}
