#![warn(missing_docs)]
//! Sensitive detector tags and the passes that read them from the finished volume tree.
use std::collections::HashSet;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::{
    error::{GeomError, GeomResult},
    geometry::{PvId, Registry},
};

/// Kind of a sensitive detector volume.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    /// HPGe diode
    Germanium,
    /// photosensor (SiPM or PMT cathode)
    Optical,
    /// bulk scintillator (the liquid argon)
    Scintillator,
}
impl DetectorKind {
    /// Name used in the simulator's macro commands.
    #[must_use]
    pub const fn macro_name(&self) -> &'static str {
        match self {
            Self::Germanium => "Germanium",
            Self::Optical => "Optical",
            Self::Scintillator => "Scintillator",
        }
    }
}

/// Tag of a sensitive placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorInfo {
    /// kind of the detector
    pub kind: DetectorKind,
    /// unique numeric id reported by the simulator
    pub uid: u32,
    /// opaque metadata passed through to the simulation output
    pub metadata: Option<serde_json::Value>,
}
impl DetectorInfo {
    /// Create a new tag.
    #[must_use]
    pub const fn new(kind: DetectorKind, uid: u32, metadata: Option<serde_json::Value>) -> Self {
        Self {
            kind,
            uid,
            metadata,
        }
    }
}

/// All tagged placements below the world volume, in depth-first order.
///
/// A placement that is reachable on several paths is reported only once.
/// # Errors
/// This function returns an error if the registry has no world volume.
pub fn walk_detectors(reg: &Registry) -> GeomResult<Vec<(PvId, &DetectorInfo)>> {
    let world = reg
        .world()
        .ok_or_else(|| GeomError::Registry("registry has no world volume".into()))?;
    let mut seen = HashSet::new();
    Ok(reg
        .walk(world)
        .into_iter()
        .filter(|pv| seen.insert(*pv))
        .filter_map(|pv| reg.detector(pv).map(|det| (pv, det)))
        .collect())
}

fn pv_name(reg: &Registry, pv: PvId) -> GeomResult<&str> {
    reg.physical_volume(pv)
        .map(crate::geometry::PhysicalVolume::name)
        .ok_or_else(|| GeomError::Registry("dangling placement in volume tree".into()))
}

/// Create the macro registering all sensitive detectors with the simulator.
/// # Errors
/// This function returns an error if the registry has no world volume.
pub fn generate_detector_macro(reg: &Registry) -> GeomResult<String> {
    let mut mac = String::new();
    for (pv, det) in walk_detectors(reg)? {
        writeln!(
            mac,
            "/RMG/Geometry/RegisterDetector {} {} {}",
            det.kind.macro_name(),
            pv_name(reg, pv)?,
            det.uid
        )
        .map_err(|e| GeomError::Other(e.to_string()))?;
    }
    Ok(mac)
}

/// One group of the auxiliary detector table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorGroup {
    /// kind of all detectors in this group
    pub kind: DetectorKind,
    /// `(placement name, uid, metadata)` in traversal order
    pub detectors: Vec<(String, u32, Option<serde_json::Value>)>,
}

/// Group the sensitive detectors by kind, in order of first appearance.
/// # Errors
/// This function returns an error if the registry has no world volume.
pub fn auxiliary_table(reg: &Registry) -> GeomResult<Vec<DetectorGroup>> {
    let mut groups: Vec<DetectorGroup> = Vec::new();
    for (pv, det) in walk_detectors(reg)? {
        let entry = (pv_name(reg, pv)?.to_owned(), det.uid, det.metadata.clone());
        if let Some(group) = groups.iter_mut().find(|g| g.kind == det.kind) {
            group.detectors.push(entry);
        } else {
            groups.push(DetectorGroup {
                kind: det.kind,
                detectors: vec![entry],
            });
        }
    }
    Ok(groups)
}

/// JSON dump of the auxiliary table: `{kind: {placement: uid}}`.
/// # Errors
/// This function returns an error if the registry has no world volume.
pub fn auxiliary_json(reg: &Registry) -> GeomResult<serde_json::Value> {
    let mut root = serde_json::Map::new();
    for group in auxiliary_table(reg)? {
        let mut dets = serde_json::Map::new();
        for (name, uid, _) in group.detectors {
            dets.insert(name, serde_json::Value::from(uid));
        }
        root.insert(group.kind.to_string(), serde_json::Value::Object(dets));
    }
    Ok(serde_json::Value::Object(root))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        geometry::{Material, Solid},
        millimeter,
        utils::Isometry,
    };
    use std::str::FromStr;

    fn tagged_registry() -> Registry {
        let mut reg = Registry::new();
        reg.add_material(Material::nist("G4_Galactic")).unwrap();
        let cube = || Solid::cuboid(millimeter!(1.), millimeter!(1.), millimeter!(1.)).unwrap();
        let world = reg.add_volume("world", cube(), "G4_Galactic").unwrap();
        reg.set_world(world).unwrap();
        let lar = reg.add_volume("lar", cube(), "G4_Galactic").unwrap();
        let det = reg.add_volume("det", cube(), "G4_Galactic").unwrap();
        let lar_pv = reg.place("lar", lar, world, Isometry::identity()).unwrap();
        reg.tag_detector(lar_pv, DetectorInfo::new(DetectorKind::Scintillator, 0, None))
            .unwrap();
        let g1 = reg.place("V01", det, lar, Isometry::identity()).unwrap();
        let s1 = reg.place("S001", det, lar, Isometry::identity()).unwrap();
        let g2 = reg.place("V02", det, lar, Isometry::identity()).unwrap();
        reg.tag_detector(
            g1,
            DetectorInfo::new(DetectorKind::Germanium, 11, Some(serde_json::json!({"a": 1}))),
        )
        .unwrap();
        reg.tag_detector(s1, DetectorInfo::new(DetectorKind::Optical, 21, None))
            .unwrap();
        reg.tag_detector(g2, DetectorInfo::new(DetectorKind::Germanium, 12, None))
            .unwrap();
        reg
    }
    #[test]
    fn kind_names() {
        assert_eq!(DetectorKind::Germanium.to_string(), "germanium");
        assert_eq!(DetectorKind::Optical.macro_name(), "Optical");
        assert_eq!(
            DetectorKind::from_str("scintillator").unwrap(),
            DetectorKind::Scintillator
        );
    }
    #[test]
    fn walk_detectors_no_world() {
        assert!(walk_detectors(&Registry::new()).is_err());
    }
    #[test]
    fn detector_macro() {
        let reg = tagged_registry();
        let mac = generate_detector_macro(&reg).unwrap();
        assert_eq!(
            mac,
            "/RMG/Geometry/RegisterDetector Scintillator lar 0\n\
             /RMG/Geometry/RegisterDetector Germanium V01 11\n\
             /RMG/Geometry/RegisterDetector Optical S001 21\n\
             /RMG/Geometry/RegisterDetector Germanium V02 12\n"
        );
    }
    #[test]
    fn aux_table() {
        let reg = tagged_registry();
        let table = auxiliary_table(&reg).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table[1].kind, DetectorKind::Germanium);
        assert_eq!(table[1].detectors.len(), 2);
        assert_eq!(table[1].detectors[1].0, "V02");
        let json = auxiliary_json(&reg).unwrap();
        assert_eq!(json["optical"]["S001"], 21);
    }
}
