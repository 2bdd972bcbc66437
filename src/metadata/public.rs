//! Synthetic stand-in for the hardware database.
//!
//! The real detector metadata is not public. This proxy serves a bundled channel map with the
//! same layout and answers every diode request with a dummy diode of the right type.
use std::collections::BTreeMap;

use serde_json::{json, Value};

use super::{HardwareMetadata, SpecialMetadata};
use crate::error::{GeomError, GeomResult};

const CHANNELMAP: &str = include_str!("../configs/dummy_geom/channelmap.json");
const DIODES: &str = include_str!("../configs/dummy_geom/diodes.json");

/// TPB coating of the stand-in fiber modules.
const FIBER_TPB_NM: f64 = 1000.0;

/// Hardware metadata built from bundled dummy data.
#[derive(Debug, Clone)]
pub struct PublicMetadataProxy {
    channelmap: Value,
    diodes: BTreeMap<String, Value>,
}
impl PublicMetadataProxy {
    /// Load the bundled data.
    /// # Errors
    /// This function returns a metadata error if the bundled data is corrupt.
    pub fn new() -> GeomResult<Self> {
        let channelmap = serde_json::from_str(CHANNELMAP)
            .map_err(|e| GeomError::Metadata(format!("bundled channel map: {e}")))?;
        let diodes = serde_json::from_str(DIODES)
            .map_err(|e| GeomError::Metadata(format!("bundled diode templates: {e}")))?;
        Ok(Self { channelmap, diodes })
    }
}
impl HardwareMetadata for PublicMetadataProxy {
    fn channelmap(&self, _timestamp: &str) -> GeomResult<Value> {
        Ok(self.channelmap.clone())
    }
    /// The template of the diode type, selected by the first letter of the name.
    fn diode(&self, name: &str) -> GeomResult<Value> {
        let letter = name.chars().next().unwrap_or('?');
        let mut diode = self
            .diodes
            .get(&format!("{letter}99000A"))
            .cloned()
            .ok_or_else(|| GeomError::Metadata(format!("no dummy diode for {name}")))?;
        if let Some(fields) = diode.as_object_mut() {
            fields.insert("name".into(), Value::from(name));
        }
        Ok(diode)
    }
    fn fiber(&self, name: &str) -> GeomResult<Value> {
        let barrel = match name.get(..2) {
            Some("IB") => "inner",
            Some("OB") => "outer",
            _ => {
                return Err(GeomError::Metadata(format!(
                    "no dummy fiber module for {name}"
                )))
            }
        };
        Ok(json!({
            "name": name,
            "type": barrel,
            "geometry": {"tpb": {"thickness_in_nm": FIBER_TPB_NM}}
        }))
    }
    /// String 7 holds the short PPC string, its shroud is shortened accordingly.
    fn adjust_special_metadata(&self, special: &mut SpecialMetadata) {
        if let Some(string) = special.hpge_string.get_mut("7") {
            string.minishroud_delta_length_in_mm = -200.0;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;
    #[test]
    fn diode_templates() {
        let proxy = PublicMetadataProxy::new().unwrap();
        let d = proxy.diode("V05123B").unwrap();
        assert_eq!(d["name"], "V05123B");
        assert_eq!(d["type"], "icpc");
        assert_eq!(proxy.diode("P00001A").unwrap()["type"], "ppc");
        assert_matches!(proxy.diode("X00000A"), Err(GeomError::Metadata(_)));
        assert_matches!(proxy.diode(""), Err(GeomError::Metadata(_)));
    }
    #[test]
    fn fibers() {
        let proxy = PublicMetadataProxy::new().unwrap();
        assert_eq!(proxy.fiber("IB001002").unwrap()["type"], "inner");
        let ob = proxy.fiber("OB039040").unwrap();
        assert_eq!(ob["type"], "outer");
        assert_eq!(ob["geometry"]["tpb"]["thickness_in_nm"], 1000.0);
        assert_matches!(proxy.fiber("XB001002"), Err(GeomError::Metadata(_)));
    }
    #[test]
    fn channelmap_layout() {
        let proxy = PublicMetadataProxy::new().unwrap();
        let map = proxy.channelmap("").unwrap();
        let map = map.as_object().unwrap();
        assert_eq!(map.len(), 52 + 58);
        assert_eq!(map["V01001A"]["location"]["string"], 1);
        assert_eq!(map["S001"]["location"]["fiber"], "IB001002");
    }
}
