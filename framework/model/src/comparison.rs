use serde::{Deserialize, Serialize};

use crate::RunStatus;

/// Summary statistics over a set of timing samples, all values in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SampleStats {
    pub count: usize,
    pub median: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    /// Lower bound of the 95% confidence interval of the mean
    pub ci_lower: f64,
    /// Upper bound of the 95% confidence interval of the mean
    pub ci_upper: f64,
}

/// The comparison of the version under test against one baseline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BaselineComparison {
    pub version: String,
    /// `None` when the baseline produced no samples
    pub stats: Option<SampleStats>,
    /// Set when there was nothing to compare against for this baseline
    pub missing: bool,
    /// Change of the median relative to the baseline, in percent. Positive is slower.
    pub delta_pct: Option<f64>,
    /// Confidence that the current samples are slower than this baseline, between 0 and 1
    pub confidence: Option<f64>,
    pub regressed: bool,
}

impl BaselineComparison {
    pub fn missing(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            stats: None,
            missing: true,
            delta_pct: None,
            confidence: None,
            regressed: false,
        }
    }
}

/// Aggregated outcome for one scenario. Created once per run, never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonReport {
    pub scenario_id: String,
    pub current_stats: Option<SampleStats>,
    pub baselines: Vec<BaselineComparison>,
    pub regression_flag: bool,
    pub confidence: Option<f64>,
    /// True when none of the baselines has data to compare against. A report with this set is
    /// never flagged as a regression.
    pub baseline_missing: bool,
    /// Set when any execution of the scenario did not succeed. No regression is computed then.
    pub execution_failure: Option<RunStatus>,
}

impl ComparisonReport {
    /// A report without any regression analysis because an execution did not succeed.
    pub fn failed(scenario_id: impl Into<String>, status: RunStatus) -> Self {
        Self {
            scenario_id: scenario_id.into(),
            current_stats: None,
            baselines: Vec::new(),
            regression_flag: false,
            confidence: None,
            baseline_missing: false,
            execution_failure: Some(status),
        }
    }
}
