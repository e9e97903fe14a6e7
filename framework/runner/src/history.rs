use perf_tunnel_model::{append_jsonl, HistoryRecord, JsonlError};
use std::path::{Path, PathBuf};

/// Local result store used by the adhoc profile.
pub const ADHOC_STORE: &str = "./build/perf-history.jsonl";

/// Historical result store backed by a JSON lines file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultStore {
    path: PathBuf,
}

impl ResultStore {
    /// Open the store a database URL points at.
    ///
    /// `file:` URLs and plain paths are written by the coordinator. For any other scheme `None` is
    /// returned, the URL is only handed to the test processes.
    pub fn from_url(url: &str) -> Option<Self> {
        if let Some(path) = url.strip_prefix("file:") {
            let path = path.strip_prefix("//").unwrap_or(path);
            return (!path.is_empty()).then(|| Self::new(path));
        }

        if url.is_empty() || url.contains("://") || has_scheme(url) {
            return None;
        }

        Some(Self::new(url))
    }

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, record: &HistoryRecord) -> Result<(), JsonlError> {
        append_jsonl(record, &self.path)
    }
}

/// `jdbc:h2:...` style URLs. A single letter before the colon is a Windows drive, not a scheme.
fn has_scheme(url: &str) -> bool {
    match url.split_once(':') {
        Some((scheme, _)) => {
            scheme.len() > 1
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perf_tunnel_model::{load_jsonl, RunResult, RunStatus};

    #[test]
    fn store_from_url() {
        assert_eq!(
            Some(PathBuf::from("/tmp/history.jsonl")),
            ResultStore::from_url("file:///tmp/history.jsonl").map(|s| s.path)
        );
        assert_eq!(
            Some(PathBuf::from("build/history.jsonl")),
            ResultStore::from_url("file:build/history.jsonl").map(|s| s.path)
        );
        assert_eq!(
            Some(PathBuf::from(ADHOC_STORE)),
            ResultStore::from_url(ADHOC_STORE).map(|s| s.path)
        );
        assert_eq!(None, ResultStore::from_url("jdbc:h2:ssl://db.example.com/results"));
        assert_eq!(None, ResultStore::from_url("postgres://db.example.com/results"));
        assert_eq!(None, ResultStore::from_url(""));
    }

    #[test]
    fn records_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("nested").join("history.jsonl"));

        for version in ["current", "2.0"] {
            store
                .record(&HistoryRecord {
                    run_id: "run-1".to_string(),
                    channel: "adhoc".to_string(),
                    started_at: 1_700_000_000,
                    build_id: None,
                    branch: Some("main".to_string()),
                    fingerprint: "abc".to_string(),
                    result: RunResult::new("a", version, "worker-0", RunStatus::Succeeded)
                        .with_samples(vec![1.0]),
                })
                .unwrap();
        }

        let records: Vec<HistoryRecord> = load_jsonl(store.path()).unwrap();
        assert_eq!(2, records.len());
        assert_eq!("2.0", records[1].result.baseline_version);
    }
}
