use crate::manifest::SampleSpec;
use anyhow::Context;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Name of the file listing the generated projects of a sample
pub const SETTINGS_FILE: &str = "settings.txt";

const SOURCE_INDEX: &str = "${sourceIndex}";

/// Render a sample into `out_dir/<name>`, replacing anything generated there before.
///
/// Every file under `template_dir` is copied into each `project-<n>` directory with the
/// placeholders `${projectName}`, `${projectIndex}`, `${sourceFiles}` and `${sampleName}`
/// substituted in both the file content and its relative path. A template file whose path
/// contains `${sourceIndex}` is written `source_files` times.
///
/// Returns the directory of the generated sample.
pub fn generate_sample(
    spec: &SampleSpec,
    template_dir: &Path,
    out_dir: &Path,
    max_projects: Option<usize>,
) -> anyhow::Result<PathBuf> {
    spec.validate()?;
    if !template_dir.is_dir() {
        anyhow::bail!(
            "Template directory {} for sample [{}] does not exist",
            template_dir.display(),
            spec.name
        );
    }

    let templates = load_templates(template_dir)?;
    let sample_dir = out_dir.join(&spec.name);
    if sample_dir.exists() {
        std::fs::remove_dir_all(&sample_dir)
            .with_context(|| format!("Could not remove {}", sample_dir.display()))?;
    }

    let projects = spec.effective_projects(max_projects);
    log::debug!(
        "Generating sample [{}] with {} projects into {}",
        spec.name,
        projects,
        sample_dir.display()
    );

    let mut project_names = Vec::with_capacity(projects);
    for index in 1..=projects {
        let project_name = format!("project-{index}");
        let project_dir = sample_dir.join(&project_name);
        let vars = Placeholders {
            project_name: &project_name,
            project_index: index,
            source_files: spec.source_files,
            sample_name: &spec.name,
        };

        for (relative, content) in &templates {
            let relative = relative.to_string_lossy();
            let content = vars.substitute(content);
            if relative.contains(SOURCE_INDEX) {
                for source_index in 1..=spec.source_files {
                    let path = vars
                        .substitute(&relative)
                        .replace(SOURCE_INDEX, &source_index.to_string());
                    let content = content.replace(SOURCE_INDEX, &source_index.to_string());
                    write_file(&project_dir.join(path), &content)?;
                }
            } else {
                write_file(&project_dir.join(vars.substitute(&relative)), &content)?;
            }
        }

        project_names.push(project_name);
    }

    let mut settings = project_names.join("\n");
    settings.push('\n');
    write_file(&sample_dir.join(SETTINGS_FILE), &settings)?;

    Ok(sample_dir)
}

/// Template files as `(relative path, content)`, sorted by path.
pub(crate) fn load_templates(template_dir: &Path) -> anyhow::Result<Vec<(PathBuf, String)>> {
    let mut templates = Vec::new();
    for entry in WalkDir::new(template_dir).sort_by_file_name() {
        let entry = entry.with_context(|| {
            format!("Could not walk template directory {}", template_dir.display())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(template_dir)
            .context("Template file outside of the template directory")?
            .to_path_buf();
        let content = std::fs::read_to_string(entry.path())
            .with_context(|| format!("Could not read template {}", entry.path().display()))?;
        templates.push((relative, content));
    }

    Ok(templates)
}

struct Placeholders<'a> {
    project_name: &'a str,
    project_index: usize,
    source_files: usize,
    sample_name: &'a str,
}

impl Placeholders<'_> {
    fn substitute(&self, input: &str) -> String {
        input
            .replace("${projectName}", self.project_name)
            .replace("${projectIndex}", &self.project_index.to_string())
            .replace("${sourceFiles}", &self.source_files.to_string())
            .replace("${sampleName}", self.sample_name)
    }
}

fn write_file(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Could not create {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("Could not write {}", path.display()))
}
