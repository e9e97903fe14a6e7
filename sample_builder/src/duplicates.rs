use anyhow::Context;
use itertools::Itertools;
use sha3::Digest;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Find build files with identical content under `root`.
///
/// Every file whose name ends with `suffix` is hashed. Each returned group holds two or more paths
/// with the same content, sorted. Groups are ordered by their first path. Duplicates are logged at
/// `warn` level.
pub fn check_no_identical_build_files(root: &Path, suffix: &str) -> anyhow::Result<Vec<Vec<PathBuf>>> {
    let mut by_hash = BTreeMap::<String, Vec<PathBuf>>::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Could not walk {}", root.display()))?;
        if !entry.file_type().is_file() || !entry.file_name().to_string_lossy().ends_with(suffix) {
            continue;
        }

        let content = std::fs::read(entry.path())
            .with_context(|| format!("Could not read {}", entry.path().display()))?;
        let mut hasher = sha3::Sha3_256::new();
        Digest::update(&mut hasher, &content);
        by_hash
            .entry(format!("{:x}", hasher.finalize()))
            .or_default()
            .push(entry.into_path());
    }

    let duplicates = by_hash
        .into_values()
        .filter(|paths| paths.len() > 1)
        .map(|paths| paths.into_iter().sorted().collect::<Vec<_>>())
        .sorted()
        .collect::<Vec<_>>();

    for group in &duplicates {
        log::warn!(
            "Identical build files: {}",
            group.iter().map(|p| p.display()).join(", ")
        );
    }

    Ok(duplicates)
}
