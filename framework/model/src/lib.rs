mod comparison;
mod jsonl;
mod result;
mod scenario;
mod summary;

pub use comparison::{BaselineComparison, ComparisonReport, SampleStats};
pub use jsonl::{append_jsonl, load_jsonl, JsonlError, JsonlReader};
pub use result::{HistoryRecord, RunResult, RunStatus};
pub use scenario::{Scenario, WorkerAssignment, CURRENT_VERSION};
pub use summary::{CoordinatorState, RunSummary};
