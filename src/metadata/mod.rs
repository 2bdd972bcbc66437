#![warn(missing_docs)]
//! Detector metadata and its merging into one consistent record per channel.
//!
//! Three inputs contribute to the geometry:
//! - the hardware channel map (which detector sits where and how it is read out),
//! - the hardware catalog (dimensions of every diode and fiber module),
//! - the special metadata (array layout that is not part of the hardware database).
//!
//! [`resolve`] reads all of them once, checks their consistency and returns an immutable
//! [`InstrumentationMetadata`] for the builders.
pub mod legend;
pub mod public;

use std::{
    collections::BTreeMap,
    fmt::{self, Debug},
    fs,
    path::{Path, PathBuf},
};

use log::{info, warn};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::{
    config::GeometryConfig,
    error::{GeomError, GeomResult},
    materials::DEFAULT_ENRICHMENT,
};
pub use legend::LegendMetadata;
pub use public::PublicMetadataProxy;

const SPECIAL_METADATA: &str = include_str!("../configs/special_metadata.yaml");

/// Access to the hardware database.
pub trait HardwareMetadata {
    /// Channel map valid at `timestamp`.
    /// # Errors
    /// This function returns a metadata error if the channel map cannot be retrieved.
    fn channelmap(&self, timestamp: &str) -> GeomResult<Value>;
    /// Catalog entry of a germanium diode.
    /// # Errors
    /// This function returns a metadata error if the diode is unknown.
    fn diode(&self, name: &str) -> GeomResult<Value>;
    /// Catalog entry of a fiber module.
    /// # Errors
    /// This function returns a metadata error if the module is unknown.
    fn fiber(&self, name: &str) -> GeomResult<Value>;
    /// Hook for sources that need to adapt the array layout to their own content.
    fn adjust_special_metadata(&self, _special: &mut SpecialMetadata) {}
}

/// Where a piece of metadata comes from.
pub enum MetadataSource<'a> {
    /// given inline in the configuration
    Inline(Value),
    /// a JSON or YAML file
    FilePath(PathBuf),
    /// the hardware database
    Remote(&'a dyn HardwareMetadata),
    /// the bundled public stand-in data
    PublicFallback,
}
impl Debug for MetadataSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline(value) => f.debug_tuple("Inline").field(value).finish(),
            Self::FilePath(path) => f.debug_tuple("FilePath").field(path).finish(),
            Self::Remote(_) => write!(f, "Remote"),
            Self::PublicFallback => write!(f, "PublicFallback"),
        }
    }
}
impl MetadataSource<'_> {
    /// Interpret a configuration override: a string is a file path, a mapping is inline data.
    /// # Errors
    /// This function returns a configuration error for any other kind of value.
    pub fn from_override(value: &Value) -> GeomResult<Self> {
        match value {
            Value::String(path) => Ok(Self::FilePath(PathBuf::from(path))),
            Value::Object(_) => Ok(Self::Inline(value.clone())),
            other => Err(GeomError::Configuration(format!(
                "metadata override must be a mapping or a file path, got {other}"
            ))),
        }
    }
    /// Read the metadata (a channel map for remote sources).
    /// # Errors
    /// This function returns a metadata error if the data cannot be read.
    pub fn load(&self, timestamp: &str) -> GeomResult<Value> {
        match self {
            Self::Inline(value) => Ok(value.clone()),
            Self::FilePath(path) => read_metadata_file(path),
            Self::Remote(hardware) => hardware.channelmap(timestamp),
            Self::PublicFallback => PublicMetadataProxy::new()?.channelmap(timestamp),
        }
    }
}

/// Read a `.json` or `.yaml`/`.yml` metadata file.
/// # Errors
/// This function returns a metadata error if the file cannot be read or parsed.
pub fn read_metadata_file(path: &Path) -> GeomResult<Value> {
    let contents = fs::read_to_string(path).map_err(|e| {
        GeomError::Metadata(format!("cannot read metadata file {} : {}", path.display(), e))
    })?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&contents).map_err(|e| {
            GeomError::Metadata(format!("parsing of {} failed: {e}", path.display()))
        }),
        Some("yaml" | "yml") => serde_yaml::from_str(&contents).map_err(|e| {
            GeomError::Metadata(format!("parsing of {} failed: {e}", path.display()))
        }),
        _ => Err(GeomError::Metadata(format!(
            "unsupported metadata file format: {}",
            path.display()
        ))),
    }
}

/// Recursively merge `overlay` into `base`. Mappings are merged key by key, everything else
/// is replaced.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(b), Value::Object(o)) => {
            for (k, v) in o {
                match b.get_mut(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        b.insert(k, v);
                    }
                }
            }
        }
        (b, o) => *b = o,
    }
}

// ---- hardware catalog ----

/// Germanium diode type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiodeType {
    /// broad energy germanium
    Bege,
    /// inverted coaxial point contact
    Icpc,
    /// p-type point contact
    Ppc,
    /// semi-coaxial
    Coax,
}

/// Enrichment, either as plain number or as measurement with uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Enrichment {
    /// `{val: .., unc: ..}`
    Measured {
        /// central value
        val: f64,
        /// uncertainty
        #[serde(default)]
        unc: Option<f64>,
    },
    /// plain fraction
    Value(f64),
}
impl Enrichment {
    /// The enrichment fraction.
    #[must_use]
    pub fn value(&self) -> f64 {
        match self {
            Self::Measured { val, .. } => *val,
            Self::Value(v) => *v,
        }
    }
}

/// Production record of a diode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Production {
    /// crystal manufacturer
    #[serde(default)]
    pub manufacturer: Option<String>,
    /// enrichment in 76Ge
    #[serde(default)]
    pub enrichment: Option<Enrichment>,
}

/// Conical taper at one end of a diode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Taper {
    /// opening angle w.r.t. the diode axis
    pub angle_in_deg: f64,
    /// axial extent
    pub height_in_mm: f64,
}

/// Tapers of a diode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Tapers {
    /// taper at the top (the end opposite to the p+ contact)
    #[serde(default)]
    pub top: Option<Taper>,
    /// taper at the bottom
    #[serde(default)]
    pub bottom: Option<Taper>,
}

/// Central borehole of inverted-coaxial and semi-coaxial diodes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Borehole {
    /// radius of the hole
    pub radius_in_mm: f64,
    /// depth of the hole
    pub depth_in_mm: f64,
}

/// Outer dimensions of a diode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiodeGeometry {
    /// height
    pub height_in_mm: f64,
    /// outer radius
    pub radius_in_mm: f64,
    /// borehole, if any
    #[serde(default)]
    pub borehole: Option<Borehole>,
    /// tapers, if any
    #[serde(default)]
    pub taper: Tapers,
}

/// Catalog entry of a germanium diode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiodeMeta {
    /// name, equal to the channel name
    pub name: String,
    /// diode type
    #[serde(rename = "type")]
    pub kind: DiodeType,
    /// production record
    #[serde(default)]
    pub production: Production,
    /// dimensions
    pub geometry: DiodeGeometry,
}
impl DiodeMeta {
    /// Enrichment of the diode, or the default with a warning.
    #[must_use]
    pub fn enrichment(&self) -> f64 {
        self.production.enrichment.map_or_else(
            || {
                warn!(
                    "{} has no enrichment in metadata, using default {DEFAULT_ENRICHMENT}",
                    self.name
                );
                DEFAULT_ENRICHMENT
            },
            |e| e.value(),
        )
    }
}

/// Barrel of a fiber module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Barrel {
    /// inner barrel
    Inner,
    /// outer barrel
    Outer,
}

/// TPB coating of a fiber module.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TpbCoating {
    /// coating thickness
    pub thickness_in_nm: f64,
}

/// Geometry of a fiber module.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FiberGeometry {
    /// wavelength shifter coating
    pub tpb: TpbCoating,
}

/// Catalog entry of a fiber module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiberMeta {
    /// module name, e.g. `IB001002`
    pub name: String,
    /// barrel
    #[serde(rename = "type")]
    pub barrel: Barrel,
    /// coating
    pub geometry: FiberGeometry,
}

// ---- channel map ----

/// Position of a channel inside its assembly: slot number of a string or end of a fiber
/// module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotPosition {
    /// 1-based slot inside a string
    Index(u32),
    /// `top` or `bottom`
    Name(String),
}

/// Location of a channel.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    /// string id of a germanium detector
    #[serde(default)]
    pub string: Option<u32>,
    /// module name of a SiPM
    #[serde(default)]
    pub fiber: Option<String>,
    /// position inside string or module
    #[serde(default)]
    pub position: Option<SlotPosition>,
}

/// Readout of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Daq {
    /// hardware id, also used as detector uid
    pub rawid: u32,
}

/// One channel map entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelEntry {
    /// channel name
    pub name: String,
    /// subsystem, e.g. `geds` or `spms`
    pub system: String,
    /// location
    #[serde(default)]
    pub location: Location,
    /// readout
    pub daq: Daq,
    /// channel specific production data, merged over the catalog
    #[serde(default)]
    pub production: Option<Value>,
}

// ---- special metadata ----

/// Counterweight hanging in an empty string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counterweight {
    /// radius
    pub radius_in_mm: f64,
    /// height
    pub height_in_mm: f64,
    /// material name
    #[serde(default = "default_counterweight_material")]
    pub material: String,
    /// wrapped in reflecting tetratex foil
    #[serde(default)]
    pub tetratex_wrapped: bool,
}
fn default_counterweight_material() -> String {
    "metal_copper".to_owned()
}

/// Content of a string without detectors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmptyStringContent {
    /// optional counterweight
    #[serde(default)]
    pub counterweight: Option<Counterweight>,
}

/// Layout of one string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringMeta {
    /// distance of the string axis from the array center
    pub radius_in_mm: f64,
    /// angular position, clockwise seen from the top
    pub angle_in_deg: f64,
    /// radius of the nylon mini shroud
    pub minishroud_radius_in_mm: f64,
    /// correction of the computed shroud length
    #[serde(default)]
    pub minishroud_delta_length_in_mm: f64,
    /// distance of the copper rods from the string axis
    pub rod_radius_in_mm: f64,
    /// if set, the string carries no detectors
    #[serde(default)]
    pub empty_string_content: Option<EmptyStringContent>,
}

/// Mounting hardware of one detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HpgeMounting {
    /// warm length of the rod segment of this detector unit
    pub rodlength_in_mm: f64,
    /// baseplate size (`small`, `medium`, `large`, `xlarge`)
    pub baseplate: String,
}

/// Layout of one calibration tube.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationTubeMeta {
    /// distance of the tube axis from the array center
    pub radius_in_mm: f64,
    /// angular position, clockwise seen from the top
    pub angle_in_deg: f64,
    /// tube length
    pub length_in_mm: f64,
    /// outer radius of the tube
    pub tube_radius_in_mm: f64,
}

/// Array layout that is not part of the hardware database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecialMetadata {
    /// per string layout, keyed by string id
    pub hpge_string: BTreeMap<String, StringMeta>,
    /// per detector mounting, keyed by detector name
    pub hpges: BTreeMap<String, HpgeMounting>,
    /// per calibration tube layout, keyed by tube id
    pub calibration: BTreeMap<String, CalibrationTubeMeta>,
}
impl SpecialMetadata {
    /// The bundled defaults as raw data.
    /// # Errors
    /// This function returns a metadata error if the bundled data is corrupt.
    pub fn bundled() -> GeomResult<Value> {
        serde_yaml::from_str(SPECIAL_METADATA)
            .map_err(|e| GeomError::Metadata(format!("bundled special metadata: {e}")))
    }
}

// ---- merged result ----

/// End of a fiber module a SiPM is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SipmPosition {
    /// top end
    Top,
    /// bottom end
    Bottom,
}

/// A germanium channel with its catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct HpgeChannel {
    /// channel name
    pub name: String,
    /// detector uid
    pub rawid: u32,
    /// string id
    pub string: u32,
    /// 1-based slot inside the string
    pub position: u32,
    /// catalog entry
    pub diode: DiodeMeta,
    /// merged record, passed on as detector metadata
    pub record: Value,
}

/// A SiPM channel with the catalog entry of its module.
#[derive(Debug, Clone, PartialEq)]
pub struct SipmChannel {
    /// channel name
    pub name: String,
    /// detector uid
    pub rawid: u32,
    /// module end
    pub position: SipmPosition,
    /// catalog entry of the module
    pub module: FiberMeta,
}

/// All metadata of one construction run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstrumentationMetadata {
    /// germanium channels, ordered by name
    pub hpges: Vec<HpgeChannel>,
    /// SiPM channels, ordered by name
    pub sipms: Vec<SipmChannel>,
    /// array layout
    pub special: SpecialMetadata,
}

/// Select the hardware database of a run.
///
/// The bundled stand-in data is only used if the configuration explicitly asks for it.
/// # Errors
/// This function returns a metadata error if the hardware database is not available and the
/// public geometry was not requested.
pub fn hardware_source(config: &GeometryConfig) -> GeomResult<Box<dyn HardwareMetadata>> {
    if config.public_geometry {
        warn!("building the geometry from public stand-in metadata");
        return Ok(Box::new(PublicMetadataProxy::new()?));
    }
    LegendMetadata::from_env()
        .map(|m| Box::new(m) as Box<dyn HardwareMetadata>)
        .map_err(|e| {
            GeomError::Metadata(format!(
                "{e}. Use the public geometry to build without access to the hardware metadata"
            ))
        })
}

fn parse<T: DeserializeOwned>(value: Value, what: &str) -> GeomResult<T> {
    serde_json::from_value(value).map_err(|e| GeomError::Metadata(format!("{what}: {e}")))
}

fn hpge_channel(
    entry: ChannelEntry,
    hardware: &dyn HardwareMetadata,
) -> GeomResult<HpgeChannel> {
    let (Some(string), Some(SlotPosition::Index(position))) =
        (entry.location.string, entry.location.position.clone())
    else {
        return Err(GeomError::Configuration(format!(
            "germanium channel {} has no string/position location",
            entry.name
        )));
    };
    let mut record = hardware.diode(&entry.name)?;
    if let (Some(production), Value::Object(fields)) = (entry.production, &mut record) {
        match fields.get_mut("production") {
            Some(existing) => deep_merge(existing, production),
            None => {
                fields.insert("production".to_owned(), production);
            }
        }
    }
    let diode: DiodeMeta = parse(record.clone(), &format!("diode {}", entry.name))?;
    if diode.name != entry.name {
        return Err(GeomError::Configuration(format!(
            "hardware metadata of channel {} is named {}",
            entry.name, diode.name
        )));
    }
    Ok(HpgeChannel {
        name: entry.name,
        rawid: entry.daq.rawid,
        string,
        position,
        diode,
        record,
    })
}

fn sipm_channel(
    entry: ChannelEntry,
    hardware: &dyn HardwareMetadata,
    modules: &mut BTreeMap<String, FiberMeta>,
) -> GeomResult<SipmChannel> {
    let (Some(fiber), Some(SlotPosition::Name(position))) =
        (entry.location.fiber.clone(), entry.location.position.clone())
    else {
        return Err(GeomError::Configuration(format!(
            "SiPM channel {} has no fiber/position location",
            entry.name
        )));
    };
    let position = match position.as_str() {
        "top" => SipmPosition::Top,
        "bottom" => SipmPosition::Bottom,
        other => {
            return Err(GeomError::Configuration(format!(
                "SiPM channel {} has invalid position {other}",
                entry.name
            )))
        }
    };
    let module = if let Some(m) = modules.get(&fiber) {
        m.clone()
    } else {
        let m: FiberMeta = parse(hardware.fiber(&fiber)?, &format!("fiber module {fiber}"))?;
        if m.name != fiber {
            return Err(GeomError::Configuration(format!(
                "hardware metadata of fiber module {fiber} is named {}",
                m.name
            )));
        }
        modules.insert(fiber, m.clone());
        m
    };
    Ok(SipmChannel {
        name: entry.name,
        rawid: entry.daq.rawid,
        position,
        module,
    })
}

/// Read the array layout: the bundled defaults with the configured override merged over them.
/// # Errors
/// This function returns an error if the override cannot be read or the result is malformed.
pub fn resolve_special(
    config: &GeometryConfig,
    hardware: Option<&dyn HardwareMetadata>,
) -> GeomResult<SpecialMetadata> {
    let mut special_raw = SpecialMetadata::bundled()?;
    if let Some(value) = &config.special_metadata {
        deep_merge(
            &mut special_raw,
            MetadataSource::from_override(value)?.load(&config.timestamp()?)?,
        );
    }
    let mut special: SpecialMetadata = parse(special_raw, "special metadata")?;
    if let Some(hardware) = hardware {
        hardware.adjust_special_metadata(&mut special);
    }
    Ok(special)
}

/// Read and merge all metadata of a construction run.
/// # Errors
/// This function returns an error if a source cannot be read or the sources are inconsistent.
pub fn resolve(
    config: &GeometryConfig,
    hardware: &dyn HardwareMetadata,
) -> GeomResult<InstrumentationMetadata> {
    let timestamp = config.timestamp()?;
    let source = match &config.channelmap {
        Some(value) => MetadataSource::from_override(value)?,
        None if config.public_geometry => MetadataSource::PublicFallback,
        None => MetadataSource::Remote(hardware),
    };
    let Value::Object(channelmap) = source.load(&timestamp)? else {
        return Err(GeomError::Metadata("channel map is not a mapping".into()));
    };

    let special = resolve_special(config, Some(hardware))?;

    let mut result = InstrumentationMetadata::default();
    let mut modules = BTreeMap::new();
    for (key, value) in channelmap {
        let system = value
            .get("system")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        if system != "geds" && system != "spms" {
            continue;
        }
        let entry: ChannelEntry = parse(value, &format!("channel {key}"))?;
        if entry.name != key {
            return Err(GeomError::Configuration(format!(
                "channel map entry {key} is named {}",
                entry.name
            )));
        }
        if system == "geds" {
            result.hpges.push(hpge_channel(entry, hardware)?);
        } else {
            result.sipms.push(sipm_channel(entry, hardware, &mut modules)?);
        }
    }
    result.special = special;
    info!(
        "merged metadata of {} germanium and {} SiPM channels",
        result.hpges.len(),
        result.sipms.len()
    );
    Ok(result)
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::io::Write;
    #[test]
    fn deep_merge_nested() {
        let mut base = json!({"a": {"b": 1, "c": 2}, "d": [1, 2]});
        deep_merge(&mut base, json!({"a": {"c": 3, "e": 4}, "d": [5]}));
        assert_eq!(base, json!({"a": {"b": 1, "c": 3, "e": 4}, "d": [5]}));
    }
    #[test]
    fn source_from_override() {
        assert_matches!(
            MetadataSource::from_override(&json!("cmap.json")),
            Ok(MetadataSource::FilePath(_))
        );
        assert_matches!(
            MetadataSource::from_override(&json!({"V1": {}})),
            Ok(MetadataSource::Inline(_))
        );
        assert_matches!(
            MetadataSource::from_override(&json!(3)),
            Err(GeomError::Configuration(_))
        );
    }
    #[test]
    fn source_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "hpges:\n  V01001A:\n    rodlength_in_mm: 10.0\n    baseplate: small").unwrap();
        let value = MetadataSource::FilePath(file.path().to_owned())
            .load("20230311T235840Z")
            .unwrap();
        assert_eq!(value["hpges"]["V01001A"]["baseplate"], json!("small"));
        assert_matches!(
            read_metadata_file(Path::new("./missing.json")),
            Err(GeomError::Metadata(_))
        );
    }
    #[test]
    fn bundled_special_metadata() {
        let special: SpecialMetadata = parse(SpecialMetadata::bundled().unwrap(), "").unwrap();
        assert_eq!(special.hpge_string.len(), 12);
        assert_eq!(special.calibration.len(), 4);
        assert!(special.hpge_string["12"].empty_string_content.is_some());
        assert!(special.hpge_string["1"].empty_string_content.is_none());
    }
    #[test]
    fn enrichment_formats() {
        let e: Enrichment = serde_json::from_value(json!({"val": 0.88, "unc": 0.01})).unwrap();
        assert_eq!(e.value(), 0.88);
        let e: Enrichment = serde_json::from_value(json!(0.9)).unwrap();
        assert_eq!(e.value(), 0.9);
    }
    #[test]
    fn enrichment_default_warns() {
        testing_logger::setup();
        let diode = DiodeMeta {
            name: "V00000A".into(),
            kind: DiodeType::Icpc,
            production: Production::default(),
            geometry: DiodeGeometry {
                height_in_mm: 80.,
                radius_in_mm: 38.,
                borehole: None,
                taper: Tapers::default(),
            },
        };
        assert_eq!(diode.enrichment(), DEFAULT_ENRICHMENT);
        crate::utils::test_helper::test_helper::check_warnings(vec![
            "V00000A has no enrichment in metadata, using default 0.9",
        ]);
    }
    #[test]
    fn resolve_public() {
        let config = GeometryConfig {
            public_geometry: true,
            ..Default::default()
        };
        let hardware = hardware_source(&config).unwrap();
        let meta = resolve(&config, hardware.as_ref()).unwrap();
        assert_eq!(meta.hpges.len(), 52);
        assert_eq!(meta.sipms.len(), 58);
        assert_eq!(
            meta.special.hpge_string["7"].minishroud_delta_length_in_mm,
            -200.0
        );
        let ib = meta
            .sipms
            .iter()
            .filter(|s| s.module.barrel == Barrel::Inner)
            .count();
        assert_eq!(ib, 18);
    }
    #[test]
    fn resolve_inline_overrides() {
        let config = GeometryConfig {
            public_geometry: true,
            channelmap: Some(json!({
                "B01001A": {"name": "B01001A", "system": "geds",
                            "location": {"string": 1, "position": 1}, "daq": {"rawid": 7}},
                "PULS01": {"name": "PULS01", "system": "puls"}
            })),
            special_metadata: Some(json!({
                "hpges": {"B01001A": {"rodlength_in_mm": 300.0, "baseplate": "medium"}}
            })),
            ..Default::default()
        };
        let hardware = hardware_source(&config).unwrap();
        let meta = resolve(&config, hardware.as_ref()).unwrap();
        assert_eq!(meta.hpges.len(), 1);
        assert!(meta.sipms.is_empty());
        assert_eq!(meta.hpges[0].rawid, 7);
        assert_eq!(meta.hpges[0].diode.kind, DiodeType::Bege);
        assert_eq!(meta.special.hpges["B01001A"].rodlength_in_mm, 300.0);
        // bundled defaults survive the merge
        assert_eq!(meta.special.calibration.len(), 4);
    }
    struct BareCatalog;
    impl HardwareMetadata for BareCatalog {
        fn channelmap(&self, _timestamp: &str) -> GeomResult<Value> {
            Ok(json!({}))
        }
        fn diode(&self, name: &str) -> GeomResult<Value> {
            Ok(json!({"name": name, "type": "icpc",
                      "geometry": {"height_in_mm": 80.0, "radius_in_mm": 38.0}}))
        }
        fn fiber(&self, name: &str) -> GeomResult<Value> {
            Err(GeomError::Metadata(format!("unknown fiber module {name}")))
        }
    }
    #[test]
    fn channel_production_without_catalog_entry() {
        let entry: ChannelEntry = serde_json::from_value(json!({
            "name": "V01001A", "system": "geds",
            "location": {"string": 1, "position": 1}, "daq": {"rawid": 9},
            "production": {"manufacturer": "Ortec", "enrichment": 0.9}
        }))
        .unwrap();
        let channel = hpge_channel(entry, &BareCatalog).unwrap();
        assert_eq!(channel.diode.production.manufacturer.as_deref(), Some("Ortec"));
        assert_eq!(channel.diode.enrichment(), 0.9);
        assert_eq!(channel.record["production"]["manufacturer"], json!("Ortec"));
    }
    #[test]
    fn resolve_name_mismatch() {
        let config = GeometryConfig {
            public_geometry: true,
            channelmap: Some(json!({
                "B01001A": {"name": "B01001B", "system": "geds",
                            "location": {"string": 1, "position": 1}, "daq": {"rawid": 7}}
            })),
            ..Default::default()
        };
        let hardware = hardware_source(&config).unwrap();
        assert_matches!(
            resolve(&config, hardware.as_ref()),
            Err(GeomError::Configuration(_))
        );
    }
    #[test]
    fn resolve_bad_sipm_position() {
        let config = GeometryConfig {
            public_geometry: true,
            channelmap: Some(json!({
                "S001": {"name": "S001", "system": "spms",
                         "location": {"fiber": "IB001002", "position": "middle"},
                         "daq": {"rawid": 1}}
            })),
            ..Default::default()
        };
        let hardware = hardware_source(&config).unwrap();
        assert_matches!(
            resolve(&config, hardware.as_ref()),
            Err(GeomError::Configuration(_))
        );
    }
}
