use std::path::PathBuf;

/// Default suffix of the build files checked by [crate::check_no_identical_build_files]
pub const DEFAULT_BUILD_FILE_SUFFIX: &str = ".gradle";

/// Options for configuring [crate::prepare_samples] and friends
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// The `samples.toml` describing the samples. Template directories are resolved relative to
    /// its parent directory.
    pub samples_file: PathBuf,
    /// Where generated samples are written, one sub-directory per sample
    pub out_dir: PathBuf,
    /// Caps the number of projects of every sample
    pub max_projects: Option<usize>,
    pub build_file_suffix: String,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        GeneratorOptions {
            samples_file: PathBuf::from("samples.toml"),
            out_dir: PathBuf::from("build/samples"),
            max_projects: None,
            build_file_suffix: DEFAULT_BUILD_FILE_SUFFIX.to_string(),
        }
    }
}

impl GeneratorOptions {
    /// Set `samples_file` option
    pub fn samples_file(mut self, path: PathBuf) -> Self {
        self.samples_file = path;
        self
    }

    /// Set `out_dir` option
    pub fn out_dir(mut self, dir: PathBuf) -> Self {
        self.out_dir = dir;
        self
    }

    /// Set `max_projects` option
    pub fn max_projects(mut self, max_projects: Option<usize>) -> Self {
        self.max_projects = max_projects;
        self
    }

    /// Set `build_file_suffix` option
    pub fn build_file_suffix(mut self, suffix: &str) -> Self {
        self.build_file_suffix = suffix.to_string();
        self
    }

    pub(crate) fn template_root(&self) -> PathBuf {
        self.samples_file
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default()
    }
}
