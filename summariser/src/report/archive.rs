use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::{ArtifactSet, ReportError};
use crate::junit::all_tests_were_skipped;

const RESULT_FILE_PREFIX: &str = "TEST-";
const RESULT_FILE_SUFFIX: &str = ".xml";
const DEBUG_DIR: &str = "debug";

/// `test-results-<result dir name>.tar.gz`
pub fn archive_name(result_dir: &Path) -> String {
    let name = result_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "results".to_string());
    format!("test-results-{name}.tar.gz")
}

/// Bundle the result files and debug artifacts into a gzipped tarball in `output_dir`.
///
/// Result files in which every test was skipped, or whose root element cannot be read, are left
/// out. Entries are sorted and carry no timestamps so the archive only depends on its inputs.
pub fn build_result_archive(
    artifacts: &ArtifactSet,
    output_dir: &Path,
) -> Result<PathBuf, ReportError> {
    let mut entries: BTreeMap<String, PathBuf> = BTreeMap::new();

    if artifacts.result_dir.is_dir() {
        for entry in WalkDir::new(&artifacts.result_dir) {
            let entry = entry.map_err(|source| ReportError::Walk {
                path: artifacts.result_dir.clone(),
                source,
            })?;
            if !entry.file_type().is_file() || !is_result_file(entry.path()) {
                continue;
            }

            match all_tests_were_skipped(entry.path()) {
                Ok(false) => {}
                Ok(true) => {
                    log::debug!("Skipping {}, all tests were skipped", entry.path().display());
                    continue;
                }
                Err(e) => {
                    log::warn!("Skipping unreadable result file {}: {e}", entry.path().display());
                    continue;
                }
            }

            let name = archive_path(&artifacts.result_dir, entry.path());
            entries.insert(name, entry.path().to_path_buf());
        }
    } else {
        log::warn!(
            "Result directory {} does not exist, archive will only hold debug artifacts",
            artifacts.result_dir.display()
        );
    }

    for artifact in &artifacts.debug_artifacts {
        if !artifact.is_file() {
            log::debug!("Debug artifact {} is gone, not archiving it", artifact.display());
            continue;
        }
        let relative = archive_path(&artifacts.result_dir, artifact);
        entries
            .entry(format!("{DEBUG_DIR}/{relative}"))
            .or_insert_with(|| artifact.clone());
    }

    std::fs::create_dir_all(output_dir)?;
    let archive_path = output_dir.join(archive_name(&artifacts.result_dir));
    let file = std::fs::File::create(&archive_path)?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

    for (name, source) in &entries {
        let content = std::fs::read(source)?;
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);
        header.set_cksum();
        builder.append_data(&mut header, name, content.as_slice())?;
    }

    builder.into_inner()?.finish()?;

    log::info!(
        "Wrote {} entries to result archive {}",
        entries.len(),
        archive_path.display()
    );

    Ok(archive_path)
}

fn is_result_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(RESULT_FILE_PREFIX) && n.ends_with(RESULT_FILE_SUFFIX))
}

/// Path inside the archive, relative to `root` when possible, always with `/` separators.
fn archive_path(root: &Path, path: &Path) -> String {
    let relative = path
        .strip_prefix(root)
        .ok()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| {
            path.file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("artifact"))
        });

    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_is_named_after_result_dir() {
        assert_eq!(
            "test-results-performanceTest.tar.gz",
            archive_name(Path::new("/tmp/build/test-results/performanceTest"))
        );
    }

    #[test]
    fn recognises_result_files() {
        assert!(is_result_file(Path::new("a/TEST-org.example.A.xml")));
        assert!(!is_result_file(Path::new("a/org.example.A.xml")));
        assert!(!is_result_file(Path::new("a/TEST-org.example.A.txt")));
    }

    #[test]
    fn archive_paths_are_relative() {
        assert_eq!(
            "a/current/TEST-x.xml",
            archive_path(Path::new("/r"), Path::new("/r/a/current/TEST-x.xml"))
        );
        assert_eq!(
            "dump.hprof",
            archive_path(Path::new("/r"), Path::new("/elsewhere/dump.hprof"))
        );
    }
}
