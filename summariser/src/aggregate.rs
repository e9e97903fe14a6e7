use itertools::Itertools;
use perf_tunnel_model::{
    BaselineComparison, ComparisonReport, RunResult, RunStatus, Scenario, CURRENT_VERSION,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::stats::{delta_pct, sample_stats, slower_confidence};

/// Thresholds used to decide whether a scenario regressed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AggregatorConfig {
    /// How much slower the current median may be than a baseline median, in percent
    pub threshold_pct: f64,
    /// Minimum confidence, between 0 and 1, that the slowdown is real
    pub min_confidence: f64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            threshold_pct: 5.0,
            min_confidence: 0.99,
        }
    }
}

/// Turns the [RunResult]s of a run into one [ComparisonReport] per scenario.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    config: AggregatorConfig,
}

impl Aggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self { config }
    }

    /// Aggregate results, taking the baselines of each scenario from the results themselves.
    ///
    /// A baseline that never produced a result cannot be detected this way, use
    /// [Aggregator::aggregate_for] when the scenarios are known.
    pub fn aggregate(&self, results: &[RunResult]) -> Vec<ComparisonReport> {
        let by_scenario = results
            .iter()
            .into_group_map_by(|r| r.scenario_id.clone())
            .into_iter()
            .collect::<BTreeMap<_, _>>();

        by_scenario
            .into_iter()
            .map(|(scenario_id, results)| {
                let baselines = results
                    .iter()
                    .map(|r| r.baseline_version.as_str())
                    .filter(|v| *v != CURRENT_VERSION)
                    .unique()
                    .collect::<Vec<_>>();
                self.report(&scenario_id, &baselines, &results)
            })
            .collect()
    }

    /// Aggregate results for the given scenarios. Every scenario gets a report, even when it has
    /// no results at all.
    pub fn aggregate_for(
        &self,
        scenarios: &[Scenario],
        results: &[RunResult],
    ) -> Vec<ComparisonReport> {
        let by_scenario = results
            .iter()
            .into_group_map_by(|r| r.scenario_id.as_str());

        scenarios
            .iter()
            .sorted_by(|a, b| a.id.cmp(&b.id))
            .map(|scenario| {
                let results = by_scenario
                    .get(scenario.id.as_str())
                    .cloned()
                    .unwrap_or_default();
                let baselines = scenario
                    .baseline_versions
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>();
                self.report(&scenario.id, &baselines, &results)
            })
            .collect()
    }

    fn report(
        &self,
        scenario_id: &str,
        baselines: &[&str],
        results: &[&RunResult],
    ) -> ComparisonReport {
        let Some(current) = find(results, CURRENT_VERSION) else {
            log::warn!("No result for the current version of {scenario_id}");
            return ComparisonReport::failed(scenario_id, RunStatus::RunnerFailed);
        };

        if let Some(status) =
            execution_failure(current, baselines.iter().filter_map(|v| find(results, v)))
        {
            log::debug!("Not comparing {scenario_id}: {}", status.label());
            return ComparisonReport::failed(scenario_id, status);
        }

        let current_stats = sample_stats(&current.samples);
        let comparisons = baselines
            .iter()
            .map(|version| match find(results, version) {
                Some(result) if !result.samples.is_empty() => {
                    self.compare(&current.samples, version, &result.samples)
                }
                _ => BaselineComparison::missing(*version),
            })
            .collect::<Vec<_>>();

        let baseline_missing = comparisons.iter().all(|c| c.missing);
        let regression_flag = !baseline_missing && comparisons.iter().any(|c| c.regressed);
        let confidence = comparisons
            .iter()
            .filter(|c| !regression_flag || c.regressed)
            .filter_map(|c| c.confidence)
            .reduce(f64::max);

        if regression_flag {
            log::info!("Scenario {scenario_id} regressed");
        }

        ComparisonReport {
            scenario_id: scenario_id.to_string(),
            current_stats,
            baselines: comparisons,
            regression_flag,
            confidence,
            baseline_missing,
            execution_failure: None,
        }
    }

    fn compare(&self, current: &[f64], version: &str, baseline: &[f64]) -> BaselineComparison {
        let current_stats = sample_stats(current);
        let stats = sample_stats(baseline);
        let delta = match (&current_stats, &stats) {
            (Some(c), Some(b)) => delta_pct(c.median, b.median),
            _ => None,
        };
        let confidence = slower_confidence(current, baseline);
        let regressed = delta.is_some_and(|d| d > self.config.threshold_pct)
            && confidence >= self.config.min_confidence;

        BaselineComparison {
            version: version.to_string(),
            stats,
            missing: false,
            delta_pct: delta,
            confidence: Some(confidence),
            regressed,
        }
    }
}

fn find<'a>(results: &[&'a RunResult], version: &str) -> Option<&'a RunResult> {
    results
        .iter()
        .find(|r| r.baseline_version == version)
        .copied()
}

/// The status that prevents a comparison, if any.
///
/// A non-zero exit code is an execution failure whatever status was recorded. Baselines that
/// could not be installed are treated as missing data rather than failures.
fn execution_failure<'a>(
    current: &RunResult,
    mut baselines: impl Iterator<Item = &'a RunResult>,
) -> Option<RunStatus> {
    if let Some(status) = failed_status(current) {
        return Some(status);
    }
    if current.samples.is_empty() {
        return Some(RunStatus::ExecutionFailed);
    }

    baselines.find_map(failed_status)
}

fn failed_status(result: &RunResult) -> Option<RunStatus> {
    if result.exit_code.is_some_and(|code| code != 0) {
        return Some(RunStatus::ExecutionFailed);
    }
    match result.status {
        RunStatus::Succeeded | RunStatus::BaselineUnavailable => None,
        status => Some(status),
    }
}
