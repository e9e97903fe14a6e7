//! Builds the list of scenarios to execute from a test manifest and a requested set of baselines.
//!
//! The catalog can be written to, and read back from, a flat delimited file so that downstream
//! tooling does not need to understand the manifest.

mod baselines;
mod catalog;
mod error;
mod file;
mod filter;
mod manifest;

pub use baselines::{BaselineRequest, DEFAULT_BASELINES, HISTORICAL_BASELINES};
pub use catalog::ScenarioCatalog;
pub use error::CatalogError;
pub use file::{read_catalog, read_catalog_file, write_catalog, write_catalog_file};
pub use filter::{CategoryFilter, EXPERIMENT_CATEGORY};
pub use manifest::{TestDefinition, TestManifest};
