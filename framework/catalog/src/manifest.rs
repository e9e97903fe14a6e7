use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::CatalogError;

/// The `perf-tests.toml` manifest listing the discovered performance test classes.
///
/// ```toml
/// [[test]]
/// class = "org.example.CleanBuildPerformanceTest"
/// categories = ["slow"]
/// scenarios = ["small project", "large project"]
/// baselines = ["2.0", "last"]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestManifest {
    #[serde(default, rename = "test")]
    pub tests: Vec<TestDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestDefinition {
    pub class: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    /// Named scenarios within the class. A class without any is a single scenario.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scenarios: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baselines: Option<Vec<String>>,
}

impl TestDefinition {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            categories: Vec::new(),
            scenarios: Vec::new(),
            baselines: None,
        }
    }

    /// Scenario ids produced by this test, `<class>` or `<class>#<scenario>`.
    pub fn scenario_ids(&self) -> Vec<String> {
        if self.scenarios.is_empty() {
            vec![self.class.clone()]
        } else {
            self.scenarios
                .iter()
                .map(|name| format!("{}#{}", self.class, name))
                .collect()
        }
    }
}

impl TestManifest {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|source| CatalogError::ManifestParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn save(&self, path: &Path) -> Result<(), CatalogError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Point every test at a single new baseline version.
    ///
    /// Returns the number of tests whose baselines changed.
    pub fn rebaseline(&mut self, version: &str) -> usize {
        let target = vec![version.to_string()];
        let mut changed = 0;
        for test in &mut self.tests {
            if test.baselines.as_ref() != Some(&target) {
                test.baselines = Some(target.clone());
                changed += 1;
            }
        }

        log::info!("Rebaselined {changed} of {} tests to {version}", self.tests.len());
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
[[test]]
class = "org.example.CleanBuildPerformanceTest"
categories = ["slow"]
scenarios = ["small", "large"]
baselines = ["2.0", "last"]

[[test]]
class = "org.example.ConfigurationPerformanceTest"
"#;

    #[test]
    fn parse_manifest() {
        let manifest = TestManifest::parse(MANIFEST).unwrap();
        assert_eq!(2, manifest.tests.len());
        assert_eq!(
            vec![
                "org.example.CleanBuildPerformanceTest#small".to_string(),
                "org.example.CleanBuildPerformanceTest#large".to_string()
            ],
            manifest.tests[0].scenario_ids()
        );
        assert_eq!(
            vec!["org.example.ConfigurationPerformanceTest".to_string()],
            manifest.tests[1].scenario_ids()
        );
        assert!(manifest.tests[1].baselines.is_none());
    }

    #[test]
    fn rebaseline_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("perf-tests.toml");

        let mut manifest = TestManifest::parse(MANIFEST).unwrap();
        assert_eq!(2, manifest.rebaseline("3.1"));
        // Already on the target, nothing to do
        assert_eq!(0, manifest.rebaseline("3.1"));
        manifest.save(&path).unwrap();

        let reloaded = TestManifest::load(&path).unwrap();
        pretty_assertions::assert_eq!(manifest, reloaded);
        assert!(reloaded
            .tests
            .iter()
            .all(|t| t.baselines == Some(vec!["3.1".to_string()])));
    }

    #[test]
    fn load_reports_parse_errors_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[[test]]\nclass = 5\n").unwrap();

        let err = TestManifest::load(&path).unwrap_err();
        assert!(matches!(err, CatalogError::ManifestParse { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }
}
