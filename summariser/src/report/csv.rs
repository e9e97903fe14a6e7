use perf_tunnel_model::ComparisonReport;

use super::fmt2;

const HEADER: &str = "scenarioId,baseline,currentMedian,baselineMedian,deltaPct,regressionFlag";

/// One row per scenario and baseline. A scenario that was not compared gets a single row with
/// only its id and flag filled in.
pub(super) fn render(reports: &[ComparisonReport]) -> String {
    let mut out = String::new();
    out.push_str(HEADER);
    out.push('\n');

    for report in reports {
        let current_median = report.current_stats.as_ref().map(|s| s.median);

        if report.baselines.is_empty() {
            push_row(
                &mut out,
                &[report.scenario_id.as_str(), "", "", "", "", "false"],
            );
            continue;
        }

        for baseline in &report.baselines {
            push_row(
                &mut out,
                &[
                    report.scenario_id.as_str(),
                    baseline.version.as_str(),
                    fmt2(current_median).as_str(),
                    fmt2(baseline.stats.as_ref().map(|s| s.median)).as_str(),
                    fmt2(baseline.delta_pct).as_str(),
                    if baseline.regressed { "true" } else { "false" },
                ],
            );
        }
    }

    out
}

fn push_row(out: &mut String, cells: &[&str]) {
    let row = cells.iter().map(|c| escape(c)).collect::<Vec<_>>().join(",");
    out.push_str(&row);
    out.push('\n');
}

/// Quote a cell when it holds a delimiter, a quote or a line break.
fn escape(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perf_tunnel_model::{BaselineComparison, RunStatus, SampleStats};

    fn stats(median: f64) -> SampleStats {
        SampleStats {
            count: 3,
            median,
            mean: median,
            std_dev: 0.0,
            min: median,
            max: median,
            ci_lower: median,
            ci_upper: median,
        }
    }

    #[test]
    fn renders_rows() {
        let report = ComparisonReport {
            scenario_id: "a#with, comma".to_string(),
            current_stats: Some(stats(100.0)),
            baselines: vec![
                BaselineComparison {
                    version: "2.0".to_string(),
                    stats: Some(stats(90.0)),
                    missing: false,
                    delta_pct: Some(11.111),
                    confidence: Some(0.999),
                    regressed: true,
                },
                BaselineComparison::missing("last"),
            ],
            regression_flag: true,
            confidence: Some(0.999),
            baseline_missing: false,
            execution_failure: None,
        };
        let failed = ComparisonReport::failed("b", RunStatus::TimedOut);

        let csv = render(&[report, failed]);
        assert_eq!(
            "scenarioId,baseline,currentMedian,baselineMedian,deltaPct,regressionFlag\n\
             \"a#with, comma\",2.0,100.00,90.00,11.11,true\n\
             \"a#with, comma\",last,100.00,,,false\n\
             b,,,,,false\n",
            csv
        );
    }
}
