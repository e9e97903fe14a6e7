use std::io::{BufRead, Write};
use std::path::Path;

use perf_tunnel_model::Scenario;

use crate::CatalogError;

const COLUMN_DELIMITER: char = ';';
const LIST_DELIMITER: char = ',';
const COLUMNS: usize = 4;

/// Fields are written without quoting, so anything that could be confused with a delimiter is
/// rejected up front.
pub(crate) fn validate_field(field: &'static str, value: &str) -> Result<(), CatalogError> {
    let invalid = value.trim().is_empty()
        || value.trim() != value
        || value.contains([COLUMN_DELIMITER, LIST_DELIMITER, '\n', '\r']);
    if invalid {
        return Err(CatalogError::InvalidField {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Write scenarios as `id;testClass;baseline,baseline;channel`, one per line.
pub fn write_catalog<W: Write>(scenarios: &[Scenario], writer: &mut W) -> Result<(), CatalogError> {
    for scenario in scenarios {
        validate_field("scenario id", &scenario.id)?;
        validate_field("test class", &scenario.test_class_name)?;
        validate_field("channel", &scenario.channel)?;
        if scenario.baseline_versions.is_empty() {
            return Err(CatalogError::NoBaselines(scenario.id.clone()));
        }
        for baseline in &scenario.baseline_versions {
            validate_field("baseline", baseline)?;
        }

        writeln!(
            writer,
            "{}{COLUMN_DELIMITER}{}{COLUMN_DELIMITER}{}{COLUMN_DELIMITER}{}",
            scenario.id,
            scenario.test_class_name,
            scenario
                .baseline_versions
                .join(&LIST_DELIMITER.to_string()),
            scenario.channel,
        )?;
    }
    Ok(())
}

/// Read scenarios written by [write_catalog], preserving their order.
pub fn read_catalog<R: std::io::Read>(reader: R) -> Result<Vec<Scenario>, CatalogError> {
    let mut scenarios = Vec::new();
    for (index, line) in std::io::BufReader::new(reader).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let columns = line.split(COLUMN_DELIMITER).collect::<Vec<_>>();
        if columns.len() != COLUMNS {
            return Err(CatalogError::Malformed {
                line: index + 1,
                reason: format!("expected {COLUMNS} columns, found {}", columns.len()),
            });
        }

        let baseline_versions = columns[2]
            .split(LIST_DELIMITER)
            .filter(|b| !b.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();
        if baseline_versions.is_empty() {
            return Err(CatalogError::Malformed {
                line: index + 1,
                reason: "no baselines".to_string(),
            });
        }

        scenarios.push(Scenario {
            id: columns[0].to_string(),
            test_class_name: columns[1].to_string(),
            baseline_versions,
            channel: columns[3].to_string(),
        });
    }
    Ok(scenarios)
}

pub fn write_catalog_file(scenarios: &[Scenario], path: &Path) -> Result<(), CatalogError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_catalog(scenarios, &mut file)?;
    file.flush()?;
    Ok(())
}

pub fn read_catalog_file(path: &Path) -> Result<Vec<Scenario>, CatalogError> {
    read_catalog(std::fs::File::open(path)?)
}
