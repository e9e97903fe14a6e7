use perf_tunnel_model::ComparisonReport;
use tabled::{Table, Tabled};

use super::fmt2;

#[derive(Tabled)]
struct ComparisonRow {
    scenario: String,
    baseline: String,
    current_median_ms: String,
    baseline_median_ms: String,
    delta_pct: String,
    confidence: String,
    outcome: String,
}

/// Render the reports as a table for the terminal.
pub fn summary_table(reports: &[ComparisonReport]) -> String {
    let mut rows = Vec::new();
    for report in reports {
        let current_median = fmt2(report.current_stats.as_ref().map(|s| s.median));

        if let Some(status) = report.execution_failure {
            rows.push(ComparisonRow {
                scenario: report.scenario_id.clone(),
                baseline: String::new(),
                current_median_ms: current_median,
                baseline_median_ms: String::new(),
                delta_pct: String::new(),
                confidence: String::new(),
                outcome: status.label().to_string(),
            });
            continue;
        }

        for baseline in &report.baselines {
            let outcome = if baseline.missing {
                "baseline missing"
            } else if baseline.regressed {
                "REGRESSED"
            } else {
                "ok"
            };
            rows.push(ComparisonRow {
                scenario: report.scenario_id.clone(),
                baseline: baseline.version.clone(),
                current_median_ms: current_median.clone(),
                baseline_median_ms: fmt2(baseline.stats.as_ref().map(|s| s.median)),
                delta_pct: fmt2(baseline.delta_pct),
                confidence: fmt2(baseline.confidence.map(|c| c * 100.0)),
                outcome: outcome.to_string(),
            });
        }
    }

    Table::new(rows).to_string()
}
