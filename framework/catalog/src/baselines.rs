/// The versions swept by a historical run.
pub const HISTORICAL_BASELINES: &[&str] = &[
    "1.1", "1.12", "2.0", "2.1", "2.4", "2.9", "2.12", "2.14.1", "last",
];

/// Used for tests that do not declare their own baselines.
pub const DEFAULT_BASELINES: &[&str] = &["last"];

/// Which baselines the scenarios of a run are compared against.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BaselineRequest {
    /// Use the baselines declared by each test
    #[default]
    Defaults,
    /// Compare every scenario against exactly these versions
    Versions(Vec<String>),
}

impl BaselineRequest {
    /// Parse a comma separated baseline list.
    ///
    /// `defaults` (or an empty value) keeps the per-test baselines and `historical` expands to
    /// [HISTORICAL_BASELINES]. Keywords may be mixed with plain versions, for example
    /// `historical,3.0`. Duplicates are dropped, keeping the first occurrence.
    pub fn parse(value: &str) -> Self {
        let mut versions: Vec<String> = Vec::new();
        let mut push = |version: &str| {
            if !versions.iter().any(|v| v == version) {
                versions.push(version.to_string());
            }
        };

        for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part {
                "defaults" => {}
                "historical" => HISTORICAL_BASELINES.iter().for_each(|v| push(v)),
                version => push(version),
            }
        }

        if versions.is_empty() {
            BaselineRequest::Defaults
        } else {
            BaselineRequest::Versions(versions)
        }
    }

    pub fn historical() -> Self {
        BaselineRequest::Versions(HISTORICAL_BASELINES.iter().map(|v| v.to_string()).collect())
    }

    /// Resolve the baselines for a test that declared `declared`.
    pub fn resolve(&self, declared: Option<&[String]>) -> Vec<String> {
        match self {
            BaselineRequest::Versions(versions) => versions.clone(),
            BaselineRequest::Defaults => match declared {
                Some(declared) => {
                    let mut resolved: Vec<String> = Vec::with_capacity(declared.len());
                    for version in declared {
                        if !resolved.contains(version) {
                            resolved.push(version.clone());
                        }
                    }
                    resolved
                }
                None => DEFAULT_BASELINES.iter().map(|v| v.to_string()).collect(),
            },
        }
    }
}
