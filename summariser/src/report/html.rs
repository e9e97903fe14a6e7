use perf_tunnel_model::ComparisonReport;
use std::fmt::Write as _;

use super::{fmt2, ReportContext};

const STYLE: &str = "body{font-family:sans-serif}\
table{border-collapse:collapse}\
td,th{border:1px solid #ccc;padding:4px 8px;text-align:right}\
td:first-child,th:first-child{text-align:left}\
tr.regressed{background:#f8d7da}\
tr.failed{background:#fff3cd}\
tr.missing{color:#777}";

pub(super) fn render(context: &ReportContext, reports: &[ComparisonReport]) -> String {
    let regressed = reports.iter().filter(|r| r.regression_flag).count();
    let failed = reports
        .iter()
        .filter(|r| r.execution_failure.is_some())
        .count();

    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = write!(
        out,
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n<h1>{title}</h1>\n\
         <p>Channel: {channel}</p>\n<p>Generated at: {generated_at}</p>\n\
         <p>{total} scenarios, {regressed} regressed, {failed} not compared</p>\n",
        title = escape(&context.title),
        channel = escape(&context.channel),
        generated_at = escape(&context.generated_at),
        total = reports.len(),
    );

    out.push_str(
        "<table>\n<tr><th>Scenario</th><th>Baseline</th><th>Current median (ms)</th>\
         <th>Baseline median (ms)</th><th>Delta (%)</th><th>Confidence</th><th>Outcome</th></tr>\n",
    );

    for report in reports {
        let id = escape(&report.scenario_id);
        let current_median = fmt2(report.current_stats.as_ref().map(|s| s.median));

        if let Some(status) = report.execution_failure {
            let _ = writeln!(
                out,
                "<tr class=\"failed\"><td>{id}</td><td></td><td>{current_median}</td><td></td><td></td><td></td><td>{}</td></tr>",
                status.label(),
            );
            continue;
        }

        if report.baselines.is_empty() {
            let _ = writeln!(
                out,
                "<tr class=\"missing\"><td>{id}</td><td></td><td>{current_median}</td><td></td><td></td><td></td><td>no baselines</td></tr>",
            );
            continue;
        }

        for baseline in &report.baselines {
            let (class, outcome) = if baseline.missing {
                ("missing", "baseline missing")
            } else if baseline.regressed {
                ("regressed", "regressed")
            } else {
                ("ok", "ok")
            };
            let _ = writeln!(
                out,
                "<tr class=\"{class}\"><td>{id}</td><td>{}</td><td>{current_median}</td><td>{}</td><td>{}</td><td>{}</td><td>{outcome}</td></tr>",
                escape(&baseline.version),
                fmt2(baseline.stats.as_ref().map(|s| s.median)),
                fmt2(baseline.delta_pct),
                fmt2(baseline.confidence.map(|c| c * 100.0)),
            );
        }
    }

    out.push_str("</table>\n</body>\n</html>\n");
    out
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use perf_tunnel_model::{BaselineComparison, RunStatus};

    fn context() -> ReportContext {
        ReportContext {
            title: "Performance <commits>".to_string(),
            channel: "commits".to_string(),
            generated_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn escapes_and_marks_rows() {
        let mut missing = ComparisonReport::failed("a", RunStatus::Succeeded);
        missing.execution_failure = None;
        missing.baseline_missing = true;
        missing.baselines = vec![BaselineComparison::missing("2.0")];
        let failed = ComparisonReport::failed("b<script>", RunStatus::TimedOut);

        let html = render(&context(), &[missing, failed]);
        assert!(html.contains("<title>Performance &lt;commits&gt;</title>"));
        assert!(html.contains("Generated at: 2024-01-01T00:00:00Z"));
        assert!(html.contains("<tr class=\"missing\"><td>a</td><td>2.0</td>"));
        assert!(html.contains("<tr class=\"failed\"><td>b&lt;script&gt;</td>"));
        assert!(html.contains("timed out"));
        assert!(html.contains("2 scenarios, 0 regressed, 1 not compared"));
    }

    #[test]
    fn same_input_same_output() {
        let reports = vec![ComparisonReport::failed("a", RunStatus::Cancelled)];
        assert_eq!(render(&context(), &reports), render(&context(), &reports));
    }
}
