use serde::{Deserialize, Serialize};

/// Version label used for executions of the version under test, as opposed to a baseline.
pub const CURRENT_VERSION: &str = "current";

/// One performance test case bound to the baseline versions it is compared against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Scenario {
    /// Unique within a catalog
    pub id: String,
    /// The test class that implements the scenario
    pub test_class_name: String,
    /// Baselines in the order they were requested. Never empty.
    pub baseline_versions: Vec<String>,
    /// Bucket used for trend reporting, for example `commits` or `historical`
    pub channel: String,
}

impl Scenario {
    /// Every version this scenario is executed against, the version under test first.
    pub fn execution_versions(&self) -> impl Iterator<Item = &str> {
        std::iter::once(CURRENT_VERSION).chain(self.baseline_versions.iter().map(String::as_str))
    }
}

/// The scenarios one worker is responsible for during a single distributed run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerAssignment {
    pub worker_id: String,
    pub scenario_ids: Vec<String>,
}

impl WorkerAssignment {
    pub fn new(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            scenario_ids: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_version_runs_first() {
        let scenario = Scenario {
            id: "clean-build".to_string(),
            test_class_name: "org.example.CleanBuildPerformanceTest".to_string(),
            baseline_versions: vec!["2.0".to_string(), "last".to_string()],
            channel: "commits".to_string(),
        };

        let versions = scenario.execution_versions().collect::<Vec<_>>();
        assert_eq!(vec![CURRENT_VERSION, "2.0", "last"], versions);
    }
}
