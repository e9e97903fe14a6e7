use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not parse test manifest {path}: {source}")]
    ManifestParse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Could not serialize test manifest: {0}")]
    ManifestSerialize(#[from] toml::ser::Error),
    #[error("Scenario id [{0}] is defined more than once")]
    DuplicateScenario(String),
    #[error("Scenario [{0}] has no baselines")]
    NoBaselines(String),
    #[error("Invalid {field} [{value}]: must be non-empty and must not contain ';', ',' or line breaks")]
    InvalidField { field: &'static str, value: String },
    #[error("Malformed catalog line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}
