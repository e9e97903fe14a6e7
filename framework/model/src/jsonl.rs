use std::io::{BufRead as _, Write as _};
use std::path::Path;

/// Reader for JSON Lines files, one serialized value per line.
#[derive(Debug, Default)]
pub struct JsonlReader {
    /// Whether to skip lines that fail to deserialize instead of failing
    pub allow_invalid_entries: bool,
}

impl JsonlReader {
    pub fn parse<R, T>(&self, reader: R) -> Result<Vec<T>, JsonlError>
    where
        R: std::io::Read,
        T: serde::de::DeserializeOwned,
    {
        let mut values = Vec::new();
        let mut skipped = 0;
        for (index, line) in std::io::BufReader::new(reader).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(value) => values.push(value),
                Err(e) if self.allow_invalid_entries => {
                    log::debug!("Skipping invalid entry on line {}: {e}", index + 1);
                    skipped += 1;
                }
                Err(source) => {
                    return Err(JsonlError::Invalid {
                        line: index + 1,
                        source,
                    })
                }
            }
        }

        if skipped > 0 {
            log::warn!("Skipped {skipped} invalid entries");
        }
        Ok(values)
    }

    pub fn parse_from_file<P, T>(&self, path: P) -> Result<Vec<T>, JsonlError>
    where
        P: AsRef<Path>,
        T: serde::de::DeserializeOwned,
    {
        let file = std::fs::File::open(path)?;
        self.parse(file)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JsonlError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid entry on line {line}: {source}")]
    Invalid {
        line: usize,
        source: serde_json::Error,
    },
    #[error("Could not serialize entry: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Append a value to a JSON Lines file, creating the file and its parent directory if needed.
pub fn append_jsonl<T, P>(value: &T, path: P) -> Result<(), JsonlError>
where
    T: serde::Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    serde_json::to_writer(&mut file, value)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Load every entry of a JSON Lines file, failing on the first malformed line.
pub fn load_jsonl<T, P>(path: P) -> Result<Vec<T>, JsonlError>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<Path>,
{
    JsonlReader::default().parse_from_file(path)
}
