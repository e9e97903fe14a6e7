use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The `samples.toml` file.
///
/// ```toml
/// [[sample]]
/// name = "small-java"
/// template_dir = "templates/java-project"
/// projects = 10
/// source_files = 50
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SamplesManifest {
    #[serde(default, rename = "sample")]
    pub samples: Vec<SampleSpec>,
}

/// Shape of one generated sample.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SampleSpec {
    pub name: String,
    /// Directory holding the template files, relative to the `samples.toml`
    pub template_dir: PathBuf,
    /// Number of projects to generate
    pub projects: usize,
    /// Number of copies made of every template file with `${sourceIndex}` in its path
    #[serde(default = "default_source_files")]
    pub source_files: usize,
}

fn default_source_files() -> usize {
    1
}

impl SamplesManifest {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let manifest: SamplesManifest = toml::from_str(&content)
            .with_context(|| format!("Could not parse {} as a samples manifest", path.display()))?;

        for sample in &manifest.samples {
            sample.validate()?;
        }
        let mut names = manifest.samples.iter().map(|s| &s.name).collect::<Vec<_>>();
        names.sort();
        if let Some(pair) = names.windows(2).find(|pair| pair[0] == pair[1]) {
            anyhow::bail!("Sample [{}] is defined more than once", pair[0]);
        }

        Ok(manifest)
    }
}

impl SampleSpec {
    pub(crate) fn validate(&self) -> anyhow::Result<()> {
        if self.name.is_empty() || self.name.contains(['/', '\\']) || self.name.starts_with('.') {
            anyhow::bail!("Invalid sample name [{}]", self.name);
        }
        if self.projects == 0 {
            anyhow::bail!("Sample [{}] must have at least one project", self.name);
        }
        Ok(())
    }

    /// Number of projects to generate once the optional cap is applied
    pub fn effective_projects(&self, max_projects: Option<usize>) -> usize {
        match max_projects {
            Some(max) => self.projects.min(max.max(1)),
            None => self.projects,
        }
    }
}
