mod archive;
mod csv;
mod html;
mod table;

use perf_tunnel_model::ComparisonReport;
use std::path::{Path, PathBuf};

pub use archive::{archive_name, build_result_archive};
pub use table::summary_table;

const HTML_REPORT_FILE: &str = "index.html";
const CSV_REPORT_FILE: &str = "comparison.csv";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not walk {path}: {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
}

/// Describes the report being rendered. Nothing in here is taken from the clock, the caller decides
/// what "generated at" says.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub title: String,
    pub channel: String,
    pub generated_at: String,
}

/// Files that go into the result archive alongside the report.
#[derive(Debug, Clone, Default)]
pub struct ArtifactSet {
    /// Directory holding the per-scenario result files (`TEST-*.xml`). Its name is used to name
    /// the archive.
    pub result_dir: PathBuf,
    /// Heap dumps, logs and any other files worth keeping for debugging
    pub debug_artifacts: Vec<PathBuf>,
}

/// Paths of everything the [ReportBuilder] wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltReport {
    pub html_report: PathBuf,
    pub csv_report: PathBuf,
    pub result_archive: PathBuf,
}

/// Renders comparison reports into an output directory.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    output_dir: PathBuf,
    context: ReportContext,
}

impl ReportBuilder {
    pub fn new(output_dir: impl Into<PathBuf>, context: ReportContext) -> Self {
        Self {
            output_dir: output_dir.into(),
            context,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write the HTML report, the CSV report and the result archive.
    ///
    /// Output is identical for identical inputs.
    pub fn build(
        &self,
        reports: &[ComparisonReport],
        artifacts: &ArtifactSet,
    ) -> Result<BuiltReport, ReportError> {
        std::fs::create_dir_all(&self.output_dir)?;

        let html_report = self.output_dir.join(HTML_REPORT_FILE);
        std::fs::write(&html_report, html::render(&self.context, reports))?;
        log::debug!("Wrote HTML report to {}", html_report.display());

        let csv_report = self.output_dir.join(CSV_REPORT_FILE);
        std::fs::write(&csv_report, csv::render(reports))?;
        log::debug!("Wrote CSV report to {}", csv_report.display());

        let result_archive = build_result_archive(artifacts, &self.output_dir)?;

        Ok(BuiltReport {
            html_report,
            csv_report,
            result_archive,
        })
    }
}

/// Format an optional number with two decimals, empty when absent.
fn fmt2(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_default()
}
