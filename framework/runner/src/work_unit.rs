use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::{ChecksMode, PerfConfig, Profile};

/// Classpath the performance test units run with
pub const PERFORMANCE_TEST_CLASSPATH: &str = "performanceTestRuntimeClasspath";

pub const VERIFICATION_GROUP: &str = "verification";
pub const PROJECT_SETUP_GROUP: &str = "project setup";

/// A unit of work for an external build engine, with its inputs, outputs and ordering edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkUnit {
    pub name: String,
    pub group: Option<String>,
    pub description: Option<String>,
    pub inputs: Vec<PathBuf>,
    pub outputs: Vec<PathBuf>,
    /// Units that must complete before this one
    pub depends_on: Vec<String>,
    /// Units that, when both are scheduled, run before this one
    pub must_run_after: Vec<String>,
    /// Units that run after this one, whether it succeeds or not
    pub finalized_by: Vec<String>,
}

impl WorkUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: None,
            description: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            depends_on: Vec::new(),
            must_run_after: Vec::new(),
            finalized_by: Vec::new(),
        }
    }

    pub fn group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.inputs.push(path.into());
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.outputs.push(path.into());
        self
    }

    pub fn depends_on(mut self, unit: &str) -> Self {
        self.depends_on.push(unit.to_string());
        self
    }

    pub fn must_run_after(mut self, unit: &str) -> Self {
        self.must_run_after.push(unit.to_string());
        self
    }

    pub fn finalized_by(mut self, unit: &str) -> Self {
        self.finalized_by.push(unit.to_string());
        self
    }
}

/// The services consumed from the build engine that schedules the work units.
pub trait BuildEngine {
    fn register(&mut self, unit: WorkUnit) -> anyhow::Result<()>;

    /// Resolve a named classpath (or configuration) to its files.
    fn resolve_classpath(&self, name: &str) -> anyhow::Result<Vec<PathBuf>>;
}

/// Name of the unit that archives the results of a local profile, e.g. `performanceTestResultsZip`
pub fn results_archive_unit_name(profile: Profile) -> String {
    format!("{}ResultsZip", profile.unit_name())
}

/// Every unit needed to prepare, run and archive performance tests.
pub fn work_units(config: &PerfConfig) -> Vec<WorkUnit> {
    let samples_dir = PathBuf::from("build/samples");
    let mut units = vec![
        WorkUnit::new("prepareSamples")
            .group(PROJECT_SETUP_GROUP)
            .description("Generates all sample projects for automated performance tests")
            .input(&config.samples_file)
            .output(&samples_dir),
        WorkUnit::new("cleanSamples")
            .group(PROJECT_SETUP_GROUP)
            .description("Removes all generated sample projects")
            .output(&samples_dir),
        WorkUnit::new("checkNoIdenticalBuildFiles")
            .group(PROJECT_SETUP_GROUP)
            .description("Fails when two generated sample projects have identical build files")
            .input(&samples_dir)
            .must_run_after("prepareSamples"),
        WorkUnit::new("rebaselinePerformanceTests")
            .description("Points every performance test at a new baseline version")
            .input(&config.manifest)
            .output(&config.manifest),
    ];

    for profile in Profile::ALL {
        let mut unit = WorkUnit::new(profile.unit_name())
            .group(VERIFICATION_GROUP)
            .description(&profile_description(profile))
            .input(&config.manifest)
            .input(&config.samples_file)
            .output(&config.report_dir)
            .depends_on("prepareSamples")
            .must_run_after("prepareSamples");

        if !profile.is_distributed() {
            let archive = results_archive_unit_name(profile);
            unit = unit.output(&config.results_dir).finalized_by(&archive);
            units.push(unit);
            units.push(
                WorkUnit::new(&archive)
                    .description("Archives the result files and debug artifacts of the run")
                    .input(&config.results_dir)
                    .output(&config.report_dir),
            );
        } else {
            units.push(unit);
        }
    }

    units
}

fn profile_description(profile: Profile) -> String {
    let checks = match profile.checks() {
        ChecksMode::All => "failing on regressions",
        ChecksMode::None => "reporting regressions only",
    };
    let dispatch = if profile.is_distributed() {
        "on the worker pool"
    } else {
        "locally"
    };
    format!(
        "Runs the {} performance tests {} on the {} channel, {}",
        if profile.is_historical() {
            "historical"
        } else {
            "selected"
        },
        dispatch,
        profile.channel().unwrap_or("configured"),
        checks
    )
}

/// Register every unit with the engine. Performance test units get the resolved performance test
/// classpath as inputs.
pub fn register_work_units<E: BuildEngine + ?Sized>(
    engine: &mut E,
    config: &PerfConfig,
) -> anyhow::Result<usize> {
    let classpath = engine.resolve_classpath(PERFORMANCE_TEST_CLASSPATH)?;
    let profile_units = Profile::ALL.map(|p| p.unit_name());

    let units = work_units(config);
    let count = units.len();
    for mut unit in units {
        if profile_units.contains(&unit.name.as_str()) {
            unit.inputs.extend(classpath.iter().cloned());
        }
        engine.register(unit)?;
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingEngine {
        units: Vec<WorkUnit>,
    }

    impl BuildEngine for RecordingEngine {
        fn register(&mut self, unit: WorkUnit) -> anyhow::Result<()> {
            if self.units.iter().any(|u| u.name == unit.name) {
                anyhow::bail!("Duplicate unit {}", unit.name);
            }
            self.units.push(unit);
            Ok(())
        }

        fn resolve_classpath(&self, name: &str) -> anyhow::Result<Vec<PathBuf>> {
            assert_eq!(PERFORMANCE_TEST_CLASSPATH, name);
            Ok(vec![PathBuf::from("libs/perf-tests.jar")])
        }
    }

    #[test]
    fn registers_every_unit_once() {
        let mut engine = RecordingEngine::default();
        let config = PerfConfig::new(Profile::PerformanceTest);

        let count = register_work_units(&mut engine, &config).unwrap();

        // 4 setup units, 7 profiles, 4 archive units for the local profiles
        assert_eq!(15, count);
        assert_eq!(count, engine.units.len());

        let local = engine
            .units
            .iter()
            .find(|u| u.name == "performanceTest")
            .unwrap();
        assert_eq!(vec!["performanceTestResultsZip".to_string()], local.finalized_by);
        assert!(local.inputs.contains(&PathBuf::from("libs/perf-tests.jar")));
        assert_eq!(vec!["prepareSamples".to_string()], local.depends_on);

        let distributed = engine
            .units
            .iter()
            .find(|u| u.name == "distributedFullPerformanceTest")
            .unwrap();
        assert!(distributed.finalized_by.is_empty());

        let archive = engine
            .units
            .iter()
            .find(|u| u.name == "performanceTestResultsZip")
            .unwrap();
        assert!(archive.inputs.contains(&config.results_dir));
        assert!(!archive.inputs.contains(&PathBuf::from("libs/perf-tests.jar")));
    }

    #[test]
    fn work_units_serialize_to_json() {
        let units = work_units(&PerfConfig::new(Profile::PerformanceTest));
        let json = serde_json::to_value(&units).unwrap();
        assert_eq!("prepareSamples", json[0]["name"]);
        assert_eq!("project setup", json[0]["group"]);
    }
}
