#![warn(missing_docs)]
//! Construction options.
//!
//! A [`GeometryConfig`] collects everything that influences one construction run. It can be read
//! from a JSON or YAML file and is then overridden field by field by the command line.
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::error::{GeomError, GeomResult};

/// Format of the metadata timestamps, e.g. `20230311T235840Z`.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";
/// Timestamp used if none is configured.
pub const DEFAULT_TIMESTAMP: &str = "20230311T235840Z";

/// Independently selectable parts of the geometry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum Assembly {
    /// wavelength-shifting reflector
    Wlsr,
    /// germanium detector strings
    Strings,
    /// calibration tubes and sources
    Calibration,
    /// fiber shroud modules
    Fibers,
    /// copper top plate
    Top,
    /// water tank with the muon veto PMTs
    Watertank,
}
impl Assembly {
    /// Assemblies built if nothing else is requested: everything but the water tank.
    #[must_use]
    pub fn defaults() -> BTreeSet<Self> {
        Self::iter().filter(|a| *a != Self::Watertank).collect()
    }
}

/// A single `+name` / `-name` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyChange {
    /// add the assembly to the default set
    Add(Assembly),
    /// remove the assembly from the default set
    Remove(Assembly),
}

/// Validated assembly selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblySelection {
    /// build exactly these assemblies
    ReplaceAll(BTreeSet<Assembly>),
    /// apply the changes to the default set, in order
    Modify(Vec<AssemblyChange>),
}
impl Default for AssemblySelection {
    fn default() -> Self {
        Self::Modify(Vec::new())
    }
}
impl AssemblySelection {
    /// Parse a list of assembly tokens.
    ///
    /// Either all tokens carry a `+`/`-` prefix or none does.
    /// # Errors
    /// This function returns a configuration error for unknown assembly names or a mix of
    /// prefixed and unprefixed tokens.
    pub fn parse<S: AsRef<str>>(tokens: &[S]) -> GeomResult<Self> {
        let tokens: Vec<&str> = tokens
            .iter()
            .map(|t| t.as_ref().trim())
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            return Ok(Self::default());
        }
        let prefixed = tokens
            .iter()
            .filter(|t| t.starts_with('+') || t.starts_with('-'))
            .count();
        let assembly = |name: &str| {
            name.parse::<Assembly>().map_err(|_| {
                GeomError::Configuration(format!(
                    "invalid geometry assembly {name}, expected one of {}",
                    Assembly::iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ")
                ))
            })
        };
        if prefixed == 0 {
            let set = tokens
                .iter()
                .map(|t| assembly(t))
                .collect::<GeomResult<BTreeSet<_>>>()?;
            return Ok(Self::ReplaceAll(set));
        }
        if prefixed != tokens.len() {
            return Err(GeomError::Configuration(format!(
                "cannot mix prefixed and unprefixed assembly names: {}",
                tokens.join(",")
            )));
        }
        let changes = tokens
            .iter()
            .map(|t| {
                let (sign, name) = t.split_at(1);
                let a = assembly(name)?;
                Ok(if sign == "+" {
                    AssemblyChange::Add(a)
                } else {
                    AssemblyChange::Remove(a)
                })
            })
            .collect::<GeomResult<Vec<_>>>()?;
        Ok(Self::Modify(changes))
    }
    /// The resulting set of assemblies.
    #[must_use]
    pub fn resolve(&self) -> BTreeSet<Assembly> {
        match self {
            Self::ReplaceAll(set) => set.clone(),
            Self::Modify(changes) => {
                let mut set = Assembly::defaults();
                for change in changes {
                    match change {
                        AssemblyChange::Add(a) => set.insert(*a),
                        AssemblyChange::Remove(a) => set.remove(a),
                    };
                }
                set
            }
        }
    }
}
impl FromStr for AssemblySelection {
    type Err = GeomError;

    /// Parse a comma separated list, e.g. `+watertank,-fibers`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split(',').collect();
        Self::parse(tokens.as_slice())
    }
}

/// Level of detail of the fiber modules.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FiberDetail {
    /// one tube segment per module
    #[default]
    Segmented,
    /// every single fiber with its claddings
    Detailed,
}

/// Layout of the water tank PMTs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, EnumIter)]
pub enum PmtConfiguration {
    /// the working PMTs of LEGEND-200
    #[default]
    #[strum(serialize = "LEGEND200")]
    Legend200,
    /// additionally the PMTs that were already broken in GERDA
    #[strum(serialize = "GERDA")]
    Gerda,
}

/// A list given either as YAML/JSON sequence or as comma separated string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum TokenList {
    List(Vec<String>),
    Csv(String),
}
fn deserialize_tokens<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(
        Option::<TokenList>::deserialize(deserializer)?.map(|t| match t {
            TokenList::List(l) => l,
            TokenList::Csv(s) => s.split(',').map(str::to_owned).collect(),
        }),
    )
}

/// Source insertion system reading of one calibration tube.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SisTubeConfig {
    /// meterdrive reading in mm
    pub sis_z: f64,
    /// source specification per slot (top to bottom), `null` for an empty slot
    #[serde(default)]
    pub sources: Vec<Option<String>>,
}

/// All options of one construction run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// assembly tokens, see [`AssemblySelection`]
    #[serde(deserialize_with = "deserialize_tokens")]
    pub assemblies: Option<Vec<String>>,
    /// detail level of the fiber modules
    pub fiber_modules: Option<FiberDetail>,
    /// PMT layout name (`LEGEND200` or `GERDA`)
    pub pmt_config: Option<String>,
    /// timestamp selecting the hardware channel map
    pub metadata_timestamp: Option<String>,
    /// channel map override, inline mapping or file path
    pub channelmap: Option<serde_json::Value>,
    /// special metadata override, inline mapping or file path
    pub special_metadata: Option<serde_json::Value>,
    /// use the bundled public stand-in metadata
    pub public_geometry: bool,
    /// source insertion system readings, keyed by calibration tube id
    pub sis: Option<BTreeMap<String, Option<SisTubeConfig>>>,
    /// fail if the envelopes of two assemblies in the argon overlap
    pub check_overlaps: bool,
    /// directory with CAD meshes (not used, all parts are built from primitives)
    pub models_dir: Option<PathBuf>,
    /// any other options, passed to the builders unchanged
    #[serde(flatten)]
    pub runtime: BTreeMap<String, serde_json::Value>,
}

impl GeometryConfig {
    /// Read a configuration from a `.json`, `.yaml` or `.yml` file.
    /// # Errors
    /// This function returns an error if the file cannot be read, has an unknown extension or
    /// cannot be parsed.
    pub fn from_file(path: &Path) -> GeomResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            GeomError::Console(format!("cannot read file {} : {}", path.display(), e))
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&contents).map_err(|e| {
                GeomError::Console(format!("parsing of {} failed: {e}", path.display()))
            }),
            Some("yaml" | "yml") => serde_yaml::from_str(&contents).map_err(|e| {
                GeomError::Console(format!("parsing of {} failed: {e}", path.display()))
            }),
            _ => Err(GeomError::Console(format!(
                "unsupported config file format: {}",
                path.display()
            ))),
        }
    }
    /// The validated assembly selection.
    /// # Errors
    /// see [`AssemblySelection::parse`]
    pub fn assembly_selection(&self) -> GeomResult<AssemblySelection> {
        self.assemblies
            .as_ref()
            .map_or_else(|| Ok(AssemblySelection::default()), |t| AssemblySelection::parse(t.as_slice()))
    }
    /// The validated PMT layout.
    /// # Errors
    /// This function returns a configuration error for unknown layout names.
    pub fn pmt_configuration(&self) -> GeomResult<PmtConfiguration> {
        self.pmt_config.as_ref().map_or(Ok(PmtConfiguration::default()), |name| {
            name.parse().map_err(|_| {
                GeomError::Configuration(format!(
                    "invalid pmt configuration {name}, expected LEGEND200 or GERDA"
                ))
            })
        })
    }
    /// The fiber module detail level.
    #[must_use]
    pub fn fiber_detail(&self) -> FiberDetail {
        self.fiber_modules.unwrap_or_default()
    }
    /// The validated metadata timestamp.
    /// # Errors
    /// This function returns a configuration error if the timestamp is not of the form
    /// `YYYYMMDDTHHMMSSZ`.
    pub fn timestamp(&self) -> GeomResult<String> {
        let ts = self
            .metadata_timestamp
            .clone()
            .unwrap_or_else(|| DEFAULT_TIMESTAMP.to_owned());
        NaiveDateTime::parse_from_str(&ts, TIMESTAMP_FORMAT).map_err(|e| {
            GeomError::Configuration(format!("invalid metadata timestamp {ts}: {e}"))
        })?;
        Ok(ts)
    }
    /// A runtime option, if set.
    #[must_use]
    pub fn runtime_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.runtime.get(key)
    }
}
