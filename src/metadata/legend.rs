//! Hardware metadata read from a local checkout of the LEGEND metadata repository.
//!
//! Layout below the checkout root:
//! - `hardware/configuration/channelmaps/validity.jsonl`: one JSON record per line,
//!   `{"valid_from": "<timestamp>", "mode": "reset"|"append", "apply": ["<file>", ...]}`
//! - `hardware/configuration/channelmaps/<file>`: channel map fragments (JSON or YAML)
//! - `hardware/detectors/germanium/diodes/<name>.{json,yaml}`
//! - `hardware/detectors/lar/fibers/<name>.{json,yaml}`
use std::{
    env, fs,
    path::{Path, PathBuf},
};

use chrono::NaiveDateTime;
use log::{debug, info};
use serde::Deserialize;
use serde_json::Value;

use super::{deep_merge, read_metadata_file, HardwareMetadata};
use crate::{
    config::TIMESTAMP_FORMAT,
    error::{GeomError, GeomResult},
};

/// Environment variable pointing to the metadata checkout.
pub const METADATA_ENV: &str = "LEGEND_METADATA";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ValidityMode {
    #[default]
    Reset,
    Append,
}

#[derive(Debug, Clone, Deserialize)]
struct ValidityEntry {
    valid_from: String,
    #[serde(default)]
    mode: ValidityMode,
    apply: Vec<String>,
}

fn parse_timestamp(ts: &str) -> GeomResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT)
        .map_err(|e| GeomError::Metadata(format!("invalid timestamp {ts}: {e}")))
}

/// Hardware database in a local directory.
#[derive(Debug, Clone)]
pub struct LegendMetadata {
    root: PathBuf,
}
impl LegendMetadata {
    /// Use the checkout at `root`.
    /// # Errors
    /// This function returns a metadata error if `root` is not a directory.
    pub fn new(root: &Path) -> GeomResult<Self> {
        if !root.is_dir() {
            return Err(GeomError::Metadata(format!(
                "metadata directory {} not found",
                root.display()
            )));
        }
        info!("reading hardware metadata from {}", root.display());
        Ok(Self {
            root: root.to_owned(),
        })
    }
    /// Use the checkout named by the `LEGEND_METADATA` environment variable.
    /// # Errors
    /// This function returns a metadata error if the variable is not set or does not point to a
    /// directory.
    pub fn from_env() -> GeomResult<Self> {
        let root = env::var(METADATA_ENV).map_err(|_| {
            GeomError::Metadata(format!(
                "hardware metadata not available: {METADATA_ENV} is not set"
            ))
        })?;
        Self::new(Path::new(&root))
    }
    fn channelmap_dir(&self) -> PathBuf {
        self.root.join("hardware/configuration/channelmaps")
    }
    /// Files making up the channel map valid at `timestamp`, in application order.
    fn valid_files(&self, timestamp: &str) -> GeomResult<Vec<String>> {
        let ts = parse_timestamp(timestamp)?;
        let path = self.channelmap_dir().join("validity.jsonl");
        let contents = fs::read_to_string(&path).map_err(|e| {
            GeomError::Metadata(format!("cannot read {} : {}", path.display(), e))
        })?;
        let mut entries = contents
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| {
                let entry: ValidityEntry = serde_json::from_str(l).map_err(|e| {
                    GeomError::Metadata(format!("invalid validity record '{l}': {e}"))
                })?;
                Ok((parse_timestamp(&entry.valid_from)?, entry))
            })
            .collect::<GeomResult<Vec<_>>>()?;
        entries.sort_by_key(|(from, _)| *from);
        let mut files: Vec<String> = Vec::new();
        let mut any = false;
        for (from, entry) in entries {
            if from > ts {
                break;
            }
            any = true;
            if entry.mode == ValidityMode::Reset {
                files.clear();
            }
            files.extend(entry.apply);
        }
        if !any {
            return Err(GeomError::Metadata(format!(
                "no channel map valid at {timestamp}"
            )));
        }
        Ok(files)
    }
    fn catalog_entry(&self, dir: &str, name: &str) -> GeomResult<Value> {
        let base = self.root.join(dir);
        for ext in ["json", "yaml", "yml"] {
            let path = base.join(format!("{name}.{ext}"));
            if path.is_file() {
                return read_metadata_file(&path);
            }
        }
        Err(GeomError::Metadata(format!(
            "no hardware metadata for {name} in {}",
            base.display()
        )))
    }
}
impl HardwareMetadata for LegendMetadata {
    fn channelmap(&self, timestamp: &str) -> GeomResult<Value> {
        let mut map = Value::Object(serde_json::Map::new());
        for file in self.valid_files(timestamp)? {
            debug!("applying channel map {file}");
            deep_merge(&mut map, read_metadata_file(&self.channelmap_dir().join(file))?);
        }
        Ok(map)
    }
    fn diode(&self, name: &str) -> GeomResult<Value> {
        self.catalog_entry("hardware/detectors/germanium/diodes", name)
    }
    fn fiber(&self, name: &str) -> GeomResult<Value> {
        self.catalog_entry("hardware/detectors/lar/fibers", name)
    }
}
