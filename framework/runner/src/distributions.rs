use perf_tunnel_model::CURRENT_VERSION;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Version label for the most recent release.
pub const LAST_RELEASE: &str = "last";

/// Maps version labels to the distribution a test process is pinned to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionResolver {
    /// Distribution of the version under test
    pub current: Option<PathBuf>,
    /// Directory with one installed distribution per version, `<dir>/<version>`
    pub distributions_dir: Option<PathBuf>,
    /// The version `last` stands for
    pub last_release: Option<String>,
}

impl DistributionResolver {
    /// The distribution for `version`, or `None` when it is not installed.
    ///
    /// Without a distributions directory nothing is checked and the version label itself is
    /// handed to the test process.
    pub fn resolve(&self, version: &str) -> Option<String> {
        if version == CURRENT_VERSION {
            return Some(
                self.current
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| CURRENT_VERSION.to_string()),
            );
        }

        let version = match (version, &self.last_release) {
            (LAST_RELEASE, Some(last)) => last.as_str(),
            (version, _) => version,
        };

        match &self.distributions_dir {
            None => Some(version.to_string()),
            Some(dir) => {
                let candidate = dir.join(version);
                if candidate.is_dir() {
                    Some(candidate.display().to_string())
                } else {
                    log::debug!(
                        "No distribution for version {} at {}",
                        version,
                        candidate.display()
                    );
                    None
                }
            }
        }
    }

    pub fn is_available(&self, version: &str) -> bool {
        self.resolve(version).is_some()
    }
}
