use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sha3::Digest;
use std::collections::BTreeMap;

/// Lifecycle of a distributed run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoordinatorState {
    /// Catalog loaded, workers not yet assigned
    Pending,
    /// Scenarios partitioned and handed to workers
    Dispatched,
    /// Workers are reporting results
    Collecting,
    /// Every worker has reported, successfully or not
    Done,
    /// The run could not start, see [RunSummary::failure_reasons]
    Failed,
}

/// Summary of a coordinated run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// Chosen by the coordinator. Unique for each run.
    pub run_id: String,
    pub channel: String,
    /// Unix timestamp in seconds
    pub started_at: i64,
    pub state: CoordinatorState,
    /// Requested baselines, in request order
    pub baselines: Vec<String>,
    pub scenario_ids: Vec<String>,
    pub worker_count: usize,
    /// Number of executions per [crate::RunStatus] label
    pub status_counts: BTreeMap<String, usize>,
    /// Workers that died during the run
    pub failed_workers: Vec<String>,
    /// Scenario ids flagged as regressed
    pub regressions: Vec<String>,
    /// Why the run was considered failed. Empty for a passing run.
    pub failure_reasons: Vec<String>,
    /// Input fingerprints of the generated sample projects, by sample name
    pub sample_fingerprints: BTreeMap<String, String>,
    pub build_id: Option<String>,
    pub branch: Option<String>,
}

impl RunSummary {
    pub fn new(run_id: String, channel: String, started_at: i64, baselines: Vec<String>) -> Self {
        Self {
            run_id,
            channel,
            started_at,
            state: CoordinatorState::Pending,
            baselines,
            scenario_ids: Vec::new(),
            worker_count: 0,
            status_counts: BTreeMap::new(),
            failed_workers: Vec::new(),
            regressions: Vec::new(),
            failure_reasons: Vec::new(),
            sample_fingerprints: BTreeMap::new(),
            build_id: None,
            branch: None,
        }
    }

    pub fn passed(&self) -> bool {
        self.state == CoordinatorState::Done && self.failure_reasons.is_empty()
    }

    /// Compute a fingerprint that identifies the configuration of this run.
    ///
    /// Runs with the same fingerprint measured the same scenarios, against the same baselines, on
    /// the same fixtures, so their results can be compared. It uses the
    ///     - Channel
    ///     - Baselines
    ///     - Scenario ids
    ///     - Sample fingerprints
    ///
    /// The fingerprint is computed using [sha3::Sha3_256].
    pub fn fingerprint(&self) -> String {
        let mut hasher = sha3::Sha3_256::new();
        hash_field(&mut hasher, &self.channel);
        self.baselines.iter().for_each(|b| hash_field(&mut hasher, b));
        self.scenario_ids
            .iter()
            .sorted()
            .for_each(|id| hash_field(&mut hasher, id));
        self.sample_fingerprints.iter().for_each(|(k, v)| {
            hash_field(&mut hasher, k);
            hash_field(&mut hasher, v);
        });

        format!("{:x}", hasher.finalize())
    }
}

/// Hash `field` with its length prefixed.
fn hash_field(hasher: &mut sha3::Sha3_256, field: &str) {
    Digest::update(hasher, (field.len() as u64).to_be_bytes());
    Digest::update(hasher, field.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> RunSummary {
        let mut summary = RunSummary::new(
            "run-1".to_string(),
            "commits".to_string(),
            1_700_000_000,
            vec!["2.0".to_string(), "last".to_string()],
        );
        summary.scenario_ids = vec!["b".to_string(), "a".to_string()];
        summary
    }

    #[test]
    fn fingerprint_ignores_run_identity_and_scenario_order() {
        let first = summary();
        let mut second = summary();
        second.run_id = "run-2".to_string();
        second.started_at += 100;
        second.scenario_ids.reverse();

        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn fingerprint_changes_with_fixtures() {
        let first = summary();
        let mut second = summary();
        second
            .sample_fingerprints
            .insert("small-java".to_string(), "abc".to_string());

        assert_ne!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn fingerprint_keeps_field_boundaries() {
        let mut first = summary();
        first.baselines = vec!["ab".to_string(), "c".to_string()];
        let mut second = summary();
        second.baselines = vec!["a".to_string(), "bc".to_string()];
        assert_ne!(first.fingerprint(), second.fingerprint());

        let mut first = summary();
        first.channel = "commits2".to_string();
        first.baselines = vec![".0".to_string(), "last".to_string()];
        assert_ne!(first.fingerprint(), summary().fingerprint());
    }

    #[test]
    fn passed_requires_done_without_reasons() {
        let mut summary = summary();
        assert!(!summary.passed());

        summary.state = CoordinatorState::Done;
        assert!(summary.passed());

        summary.failure_reasons.push("regressed".to_string());
        assert!(!summary.passed());
    }
}
