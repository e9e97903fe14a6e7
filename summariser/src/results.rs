use std::path::Path;

use perf_tunnel_model::{JsonlError, JsonlReader, RunResult};

/// Load the run results written by a coordinated run.
///
/// With `allow_invalid` set, lines that are not run results are skipped with a warning instead
/// of failing the load, for result files that other tools have appended to.
pub fn load_results(path: &Path, allow_invalid: bool) -> Result<Vec<RunResult>, JsonlError> {
    JsonlReader {
        allow_invalid_entries: allow_invalid,
    }
    .parse_from_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use perf_tunnel_model::{append_jsonl, RunStatus};

    #[test]
    fn foreign_lines_are_skipped_only_when_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.jsonl");
        let result = RunResult::new("a", "current", "worker-0", RunStatus::Succeeded)
            .with_samples(vec![10.0])
            .with_exit_code(0);
        append_jsonl(&result, &path).unwrap();
        append_jsonl(&serde_json::json!({"event": "ci-annotation"}), &path).unwrap();

        assert!(matches!(
            load_results(&path, false),
            Err(JsonlError::Invalid { line: 2, .. })
        ));
        pretty_assertions::assert_eq!(vec![result], load_results(&path, true).unwrap());
    }
}
