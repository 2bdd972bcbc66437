#![warn(missing_docs)]
//! Construction of the complete LEGEND-200 geometry.
//!
//! [`construct`] creates the world, the cryostat with its argon fill and (optionally) the water
//! tank, and then calls the builders of all requested assemblies with a shared
//! [`InstrumentationData`] context.
use std::collections::BTreeSet;

use log::{debug, info, warn};
use uom::si::{f64::Length, length::millimeter};

use crate::{
    calibration,
    config::{Assembly, GeometryConfig},
    cryo, fibers,
    error::{GeomError, GeomResult},
    geometry::{find_overlaps, LvId, PvId, Registry, Solid},
    hpge,
    materials::{MaterialKind, MaterialRegistry, SurfaceKind},
    metadata::{self, InstrumentationMetadata},
    meter, top,
    vis_utils::VisColor,
    watertank, wlsr,
};

/// Everything a builder needs to know about the volume it places its parts into.
///
/// The context is created once per construction run and is never changed afterwards; all
/// builders write into the [`Registry`] passed next to it.
#[derive(Debug, Clone, Copy)]
pub struct InstrumentationData<'a> {
    /// volume all instrumentation is placed into (the liquid argon)
    pub mother_lv: LvId,
    /// placement of the mother volume, used for border surfaces
    pub mother_pv: PvId,
    /// materials and optical surfaces
    pub materials: &'a MaterialRegistry,
    /// merged channel map and array layout
    pub metadata: &'a InstrumentationMetadata,
    /// options of this run
    pub config: &'a GeometryConfig,
    /// z coordinate of the top face of the array top plate, in the mother frame
    pub top_plate_z: Length,
}
impl InstrumentationData<'_> {
    /// `top_plate_z` in mm
    #[must_use]
    pub fn top_plate_z_mm(&self) -> f64 {
        self.top_plate_z.get::<millimeter>()
    }
    /// Register (or fetch) a material.
    /// # Errors
    /// see [`MaterialRegistry::get_material`]
    pub fn material(&self, reg: &mut Registry, kind: MaterialKind) -> GeomResult<String> {
        self.materials.get_material(reg, kind)
    }
    /// Register (or fetch) an optical surface.
    /// # Errors
    /// see [`MaterialRegistry::get_surface`]
    pub fn surface(&self, reg: &mut Registry, kind: SurfaceKind) -> GeomResult<String> {
        self.materials.get_surface(reg, kind)
    }
    /// Add border surfaces in both directions between the mother volume and `pv`.
    ///
    /// The surfaces are named `bsurface_lar_{tag}_{pv}` and `bsurface_{tag}_lar_{pv}`.
    /// # Errors
    /// This function returns an error if the surfaces cannot be registered.
    pub fn add_lar_border_surfaces(
        &self,
        reg: &mut Registry,
        tag: &str,
        pv: PvId,
        kind: SurfaceKind,
    ) -> GeomResult<()> {
        let surface = self.surface(reg, kind)?;
        let name = reg
            .physical_volume(pv)
            .map(|p| p.name().to_owned())
            .unwrap_or_default();
        reg.add_border_surface(
            &format!("bsurface_lar_{tag}_{name}"),
            &surface,
            self.mother_pv,
            pv,
        )?;
        reg.add_border_surface(
            &format!("bsurface_{tag}_lar_{name}"),
            &surface,
            pv,
            self.mother_pv,
        )
    }
}

/// Build the geometry with the default materials.
/// # Errors
/// This function returns an error if the configuration is invalid, the metadata cannot be
/// read or is inconsistent, or the geometry cannot be constructed.
pub fn construct(config: &GeometryConfig) -> GeomResult<Registry> {
    construct_with_materials(config, &MaterialRegistry::default())
}

/// Build the geometry with a custom material registry (e.g. with replaced optics).
/// # Errors
/// see [`construct`]
pub fn construct_with_materials(
    config: &GeometryConfig,
    materials: &MaterialRegistry,
) -> GeomResult<Registry> {
    let assemblies = config.assembly_selection()?.resolve();
    let pmt_config = config.pmt_configuration()?;
    info!(
        "constructing assemblies: {}",
        assemblies
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    let metadata = load_metadata(config, &assemblies)?;

    let mut reg = Registry::new();
    let world_material = materials.get_material(&mut reg, MaterialKind::Galactic)?;
    let world = reg.add_volume(
        "world",
        Solid::cuboid(meter!(20.), meter!(20.), meter!(20.))?,
        &world_material,
    )?;
    reg.set_world(world)?;
    reg.set_color(world, VisColor::Invisible);

    let cryostat = cryo::build_cryostat(&mut reg, materials)?;
    let (cryo_mother, cryo_z) = if assemblies.contains(&Assembly::Watertank) {
        let water = watertank::place_water_tank(&mut reg, materials, world, pmt_config)?;
        (water, watertank::cryostat_displacement())
    } else {
        (world, Length::default())
    };
    let lar_pv = cryo::place_cryostat(&mut reg, &cryostat, cryo_mother, cryo_z)?;

    let instr = InstrumentationData {
        mother_lv: cryostat.lar_lv,
        mother_pv: lar_pv,
        materials,
        metadata: &metadata,
        config,
        top_plate_z: cryostat.top_plate_z(),
    };
    if assemblies.contains(&Assembly::Wlsr) {
        wlsr::place_wlsr(&instr, &mut reg)?;
    }
    if assemblies.contains(&Assembly::Strings) {
        hpge::place_hpge_strings(&instr, &mut reg)?;
    }
    if assemblies.contains(&Assembly::Calibration) {
        calibration::place_calibration_system(&instr, &mut reg)?;
    }
    if assemblies.contains(&Assembly::Fibers) {
        fibers::place_fiber_modules(&instr, &mut reg, config.fiber_detail())?;
    }
    if assemblies.contains(&Assembly::Top) {
        top::place_top_plate(&instr, &mut reg)?;
    }
    add_copper_surfaces(&instr, &mut reg)?;
    if config.check_overlaps {
        check_overlaps(&reg)?;
    }
    info!(
        "geometry complete: {} logical and {} physical volumes ({} shared)",
        reg.n_logical_volumes(),
        reg.n_physical_volumes(),
        reg.n_cached()
    );
    Ok(reg)
}

/// Check the envelopes of all assemblies in the argon for overlaps.
/// # Errors
/// This function returns a configuration error naming the first overlapping pair; all pairs
/// are logged.
pub fn check_overlaps(reg: &Registry) -> GeomResult<()> {
    let overlaps = find_overlaps(reg.envelopes());
    for (first, second) in &overlaps {
        warn!("{first} overlaps with {second}");
    }
    match overlaps.first() {
        None => {
            info!("no overlaps between {} assemblies", reg.envelopes().len());
            Ok(())
        }
        Some((first, second)) => Err(GeomError::Configuration(format!(
            "{} overlapping assemblies, e.g. {first} and {second}",
            overlaps.len()
        ))),
    }
}

/// The hardware database is only consulted if an assembly needs channel information.
fn load_metadata(
    config: &GeometryConfig,
    assemblies: &BTreeSet<Assembly>,
) -> GeomResult<InstrumentationMetadata> {
    if assemblies.contains(&Assembly::Strings) || assemblies.contains(&Assembly::Fibers) {
        let hardware = metadata::hardware_source(config)?;
        metadata::resolve(config, hardware.as_ref())
    } else {
        Ok(InstrumentationMetadata {
            special: metadata::resolve_special(config, None)?,
            ..InstrumentationMetadata::default()
        })
    }
}

/// Copper parts placed directly in the argon get a copper surface, unless a builder already
/// attached a surface to them.
fn add_copper_surfaces(instr: &InstrumentationData, reg: &mut Registry) -> GeomResult<()> {
    let copper = MaterialKind::MetalCopper.to_string();
    let mut targets = Vec::new();
    for pv in reg.daughters(instr.mother_lv) {
        let Some((_, lv)) = reg.pv_endpoints(pv) else {
            continue;
        };
        let is_copper = reg
            .logical_volume(lv)
            .is_some_and(|v| v.material() == copper);
        if is_copper && !reg.has_border_surface(instr.mother_pv, pv) {
            targets.push(pv);
        }
    }
    if targets.is_empty() {
        return Ok(());
    }
    let surface = instr.surface(reg, SurfaceKind::ToCopper)?;
    for pv in targets {
        let name = reg
            .physical_volume(pv)
            .map(|p| p.name().to_owned())
            .unwrap_or_default();
        debug!("adding copper surface to {name}");
        reg.add_border_surface(
            &format!("bsurface_lar_cu_{name}"),
            &surface,
            instr.mother_pv,
            pv,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        config::{FiberDetail, SisTubeConfig},
        det_utils::{auxiliary_table, generate_detector_macro, DetectorKind},
        error::GeomError,
        utils::test_helper::test_helper::check_warning_contains,
    };
    use approx::assert_abs_diff_eq;
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn public_config(assemblies: &str) -> GeometryConfig {
        GeometryConfig {
            public_geometry: true,
            assemblies: Some(assemblies.split(',').map(str::to_owned).collect()),
            ..GeometryConfig::default()
        }
    }
    fn count_kind(reg: &Registry, kind: DetectorKind) -> usize {
        auxiliary_table(reg)
            .unwrap()
            .into_iter()
            .find(|g| g.kind == kind)
            .map_or(0, |g| g.detectors.len())
    }
    fn z_of(reg: &Registry, pv: &str) -> f64 {
        reg.physical_volume(reg.pv_by_name(pv).unwrap())
            .unwrap()
            .placement()
            .translation_mm()
            .z
    }
    #[test]
    fn public_default_geometry() {
        let reg = construct(&GeometryConfig {
            public_geometry: true,
            ..GeometryConfig::default()
        })
        .unwrap();
        assert_eq!(count_kind(&reg, DetectorKind::Scintillator), 1);
        assert_eq!(count_kind(&reg, DetectorKind::Germanium), 52);
        assert_eq!(count_kind(&reg, DetectorKind::Optical), 2 * (9 + 20));
        assert!(reg.pv_by_name("top_plate").is_some());
        assert!(reg.pv_by_name("wlsr_outer").is_some());
        assert!(reg.pv_by_name("calibration_tube_1").is_some());
        assert!(reg.pv_by_name("water_tank").is_none());
    }
    #[test]
    fn no_overlaps_in_public_geometry() {
        let reg = construct(&GeometryConfig {
            public_geometry: true,
            check_overlaps: true,
            ..GeometryConfig::default()
        })
        .unwrap();
        let names: Vec<&str> = reg.envelopes().iter().map(|e| e.name()).collect();
        // 11 populated strings, 1 empty string, 4 tubes, 2 barrels, the outer bend, the reflector
        assert_eq!(names.len(), 11 + 1 + 4 + 2 + 1 + 1);
        for name in [
            "wlsr",
            "string_1",
            "string_12",
            "calibration_tube_4",
            "fibers_ib",
            "fibers_ob",
            "fibers_ob_bend",
        ] {
            assert!(names.contains(&name), "no envelope {name}");
        }
        assert!(check_overlaps(&reg).is_ok());
    }
    #[test]
    fn overlapping_assemblies() {
        testing_logger::setup();
        // calibration tube 1 moved onto string 1
        let special = json!({"calibration": {"1": {
            "radius_in_mm": 215.0, "angle_in_deg": 17.143,
            "length_in_mm": 1400.0, "tube_radius_in_mm": 19.0
        }}});
        let config = GeometryConfig {
            special_metadata: Some(special),
            ..public_config("strings,calibration")
        };
        let reg = construct(&config).unwrap();
        assert_matches!(check_overlaps(&reg), Err(GeomError::Configuration(_)));
        check_warning_contains("string_1 overlaps with calibration_tube_1");
        let config = GeometryConfig {
            check_overlaps: true,
            ..config
        };
        assert_matches!(construct(&config), Err(GeomError::Configuration(_)));
    }
    #[test]
    fn missing_hardware_metadata() {
        std::env::remove_var(metadata::legend::METADATA_ENV);
        let config = GeometryConfig {
            assemblies: Some(vec!["strings".into()]),
            ..GeometryConfig::default()
        };
        assert_matches!(construct(&config), Err(GeomError::Metadata(_)));
        // no channel information needed
        let config = GeometryConfig {
            assemblies: Some(vec!["wlsr".into(), "top".into()]),
            ..GeometryConfig::default()
        };
        assert!(construct(&config).is_ok());
    }
    #[test]
    fn invalid_options() {
        assert_matches!(
            construct(&public_config("strings,pipes")),
            Err(GeomError::Configuration(_))
        );
        let config = GeometryConfig {
            pmt_config: Some("LEGEND1000".into()),
            ..public_config("watertank")
        };
        assert_matches!(construct(&config), Err(GeomError::Configuration(_)));
    }
    #[test]
    fn with_watertank() {
        let reg = construct(&public_config("+watertank")).unwrap();
        let cryo = reg.pv_by_name("cryostat").unwrap();
        let (mother, _) = reg.pv_endpoints(cryo).unwrap();
        assert_eq!(reg.logical_volume(mother).unwrap().name(), "water");
        assert_abs_diff_eq!(z_of(&reg, "cryostat"), -153.0, epsilon = 1e-9);
        assert_eq!(count_kind(&reg, DetectorKind::Optical), 58 + 53);
    }
    #[test]
    fn copper_surface_pass() {
        let reg = construct(&public_config("strings,top")).unwrap();
        let lar = reg.pv_by_name("lar").unwrap();
        for name in ["top_plate", "string_1_cu_rod_0", "string_12_cu_rod_0"] {
            let pv = reg.pv_by_name(name).unwrap();
            assert!(reg.has_border_surface(lar, pv), "{name} has no surface");
        }
        // the tetratex wrapped counterweight keeps its own surface only
        let cw = reg.pv_by_name("counterweight_string_12").unwrap();
        assert_eq!(
            reg.border_surfaces()
                .iter()
                .filter(|b| b.pv1 == lar && b.pv2 == cw)
                .count(),
            1
        );
    }
    #[test]
    fn fiber_detail_equivalence() {
        let segmented = construct(&GeometryConfig {
            fiber_modules: Some(FiberDetail::Segmented),
            ..public_config("fibers")
        })
        .unwrap();
        let detailed = construct(&GeometryConfig {
            fiber_modules: Some(FiberDetail::Detailed),
            ..public_config("fibers")
        })
        .unwrap();
        let mac = generate_detector_macro(&segmented).unwrap();
        assert_eq!(mac, generate_detector_macro(&detailed).unwrap());
        assert_eq!(mac.lines().count(), 1 + 58);
        assert!(detailed.n_physical_volumes() > 10 * segmented.n_physical_volumes());
    }
    #[test]
    fn end_to_end_two_slot_string() {
        let channelmap = json!({
            "V01001A": {"name": "V01001A", "system": "geds",
                "location": {"string": 1, "position": 1}, "daq": {"rawid": 11}},
            "V01002A": {"name": "V01002A", "system": "geds",
                "location": {"string": 1, "position": 2}, "daq": {"rawid": 12}},
        });
        let special = json!({"hpges": {
            "V01001A": {"rodlength_in_mm": 300.0, "baseplate": "large"},
            "V01002A": {"rodlength_in_mm": 250.0, "baseplate": "large"},
        }});
        let config = GeometryConfig {
            channelmap: Some(channelmap),
            special_metadata: Some(special),
            ..public_config("strings")
        };
        let reg = construct(&config).unwrap();
        assert_eq!(count_kind(&reg, DetectorKind::Germanium), 2);
        let dz = z_of(&reg, "V01001A") - z_of(&reg, "V01002A");
        assert_abs_diff_eq!(dz, 250.0 * 0.997, epsilon = 1e-9);
        let shroud = reg.pv_by_name("minishroud_string_1").unwrap();
        let (_, shroud_lv) = reg.pv_endpoints(shroud).unwrap();
        let shroud_solid = reg.logical_volume(shroud_lv).unwrap().solid();
        let Some(Solid::Subtraction { first, .. }) = reg.solid(shroud_solid) else {
            panic!("shroud is not a subtraction");
        };
        let Some(Solid::Tubs { z, .. }) = reg.solid(*first) else {
            panic!("shroud outer part is not a tube");
        };
        assert_abs_diff_eq!(
            z.get::<millimeter>(),
            (300.0 + 250.0) * 0.997 + 6.0,
            epsilon = 1e-9
        );
        let cw = reg.pv_by_name("counterweight_string_12").unwrap();
        assert!(reg.detector(cw).is_none());
        assert!(reg.pv_by_name("minishroud_string_2").is_none());
    }
    #[test]
    fn calibration_source() {
        let mut sis = BTreeMap::new();
        sis.insert(
            "1".to_owned(),
            Some(SisTubeConfig {
                sis_z: 8250.0,
                sources: vec![None, None, None, Some("Th228".into())],
            }),
        );
        sis.insert("2".to_owned(), None);
        let config = GeometryConfig {
            sis: Some(sis),
            ..public_config("calibration")
        };
        let reg = construct(&config).unwrap();
        assert!(reg.pv_by_name("source_inner_sis1").is_some());
        assert!(reg.pv_by_name("absorber_sis1").is_some());
        assert!(reg.pv_by_name("absorber_sis2").is_none());
    }
}
