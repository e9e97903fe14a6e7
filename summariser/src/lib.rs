//! Result aggregation and reporting for Perf Tunnel.
//!
//! [Aggregator] turns the raw [perf_tunnel_model::RunResult]s of a run into one
//! [perf_tunnel_model::ComparisonReport] per scenario and [report::ReportBuilder] renders those
//! into HTML, CSV and a result archive for CI.

mod aggregate;
mod junit;
pub mod report;
mod results;
pub mod stats;

pub use aggregate::{Aggregator, AggregatorConfig};
pub use junit::all_tests_were_skipped;
pub use results::load_results;
