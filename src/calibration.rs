//! Calibration tubes and the source insertion system (SIS).
//!
//! The tubes are open nylon shrouds hanging from the top plate. A SIS reading lowers a
//! tantalum absorber with its holder into a tube; up to four source capsules can be mounted
//! above the holder, only the lowest slot is supported.
use std::{collections::BTreeMap, str::FromStr};

use log::{debug, info};
use strum::{Display, EnumString};

use crate::{
    config::SisTubeConfig,
    core::InstrumentationData,
    error::{GeomError, GeomResult},
    geometry::{CacheKey, Envelope, LvId, Registry, Solid},
    hpge::nylon_mini_shroud,
    materials::{MaterialKind, SurfaceKind},
    metadata::CalibrationTubeMeta,
    degree, millimeter,
    utils::{polar_to_xy, usize_to_f64, AngleSense, Isometry},
    vis_utils::COPPER,
};

/// Distance of the meterdrive reference point above the top plate.
const METERDRIVE_TO_TOP_PLATE: f64 = 7690.0;
/// Height of the funnel guiding the cable into the tube.
const FUNNEL_HEIGHT: f64 = 40.0;
const ABSORBER_RADIUS: f64 = 16.2;
const ABSORBER_HEIGHT: f64 = 37.5;
const HOLDER_RADIUS: f64 = 10.0;
const HOLDER_HEIGHT: f64 = 8.0;
/// Number of source slots along the SIS cable.
pub const SOURCE_SLOTS: usize = 4;
/// Vertical distance of neighbouring source slots.
const SLOT_PITCH: f64 = 100.0;
const CU_CAP_THICKNESS: f64 = 1.5;
/// Wall thickness of the nylon tubes.
const TUBE_WALL: f64 = 0.1;

/// Radioactive source types of the SIS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
pub enum SourceKind {
    /// Th-228 capsule
    #[strum(serialize = "Th228")]
    Th228,
    /// Ra-226 capsule
    #[strum(serialize = "Ra")]
    Ra,
}
impl SourceKind {
    /// outer radius and height of the steel capsule
    fn capsule(self) -> (f64, f64) {
        match self {
            Self::Th228 => (3.2, 8.0),
            Self::Ra => (2.0, 4.4),
        }
    }
    /// radius and height of the active volume inside the capsule
    fn active(self) -> (f64, f64) {
        match self {
            Self::Th228 => (1.0, 2.4),
            Self::Ra => (1.0, 1.5),
        }
    }
}

/// One source of a SIS slot, written `Type` or `Type+Cu`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpec {
    /// source type
    pub kind: SourceKind,
    /// capsule covered by a copper cap
    pub cu_cap: bool,
}
impl FromStr for SourceSpec {
    type Err = GeomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = s.split('+');
        let kind = tokens.next().unwrap_or_default();
        let kind = SourceKind::from_str(kind).map_err(|_| {
            GeomError::Configuration(format!("unknown source type '{kind}' in '{s}'"))
        })?;
        let mut cu_cap = false;
        for token in tokens {
            match token {
                "Cu" if !cu_cap => cu_cap = true,
                other => {
                    return Err(GeomError::Configuration(format!(
                        "unknown source option '{other}' in '{s}'"
                    )))
                }
            }
        }
        Ok(Self { kind, cu_cap })
    }
}

/// z of the absorber top in the mother frame for a given meterdrive reading.
#[must_use]
pub fn sis_to_local_z(top_plate_z: f64, sis_z: f64) -> f64 {
    top_plate_z + METERDRIVE_TO_TOP_PLATE - FUNNEL_HEIGHT - sis_z
}

/// Place all calibration tubes and, if configured, the SIS hardware inside them.
/// # Errors
/// This function returns an error if the SIS configuration refers to an unknown tube, has an
/// invalid source specification or uses a source slot that is not supported.
pub fn place_calibration_system(instr: &InstrumentationData, reg: &mut Registry) -> GeomResult<()> {
    let top = instr.top_plate_z_mm();
    let tubes = &instr.metadata.special.calibration;
    let mut positions = BTreeMap::new();
    for (id, tube) in tubes {
        let lv = nylon_mini_shroud(
            instr,
            reg,
            tube.tube_radius_in_mm,
            tube.length_in_mm,
            true,
        )?;
        let (x, y) = tube_xy(tube);
        let pv = reg.place(
            &format!("calibration_tube_{id}"),
            lv,
            instr.mother_lv,
            Isometry::new_translation(millimeter!(x, y, top - tube.length_in_mm / 2.0))?,
        )?;
        instr.add_lar_border_surfaces(reg, "nms", pv, SurfaceKind::LarToTpb)?;
        reg.add_envelope(Envelope::cylinder(
            &format!("calibration_tube_{id}"),
            (x, y),
            tube.tube_radius_in_mm,
            (top - tube.length_in_mm, top),
        )?);
        positions.insert(id.as_str(), (x, y));
    }
    let Some(sis) = &instr.config.sis else {
        return Ok(());
    };
    for (id, cfg) in sis {
        let Some(cfg) = cfg else {
            continue;
        };
        let (Some(tube), Some(&xy)) = (tubes.get(id), positions.get(id.as_str())) else {
            return Err(GeomError::Configuration(format!(
                "SIS configured for unknown calibration tube {id}"
            )));
        };
        place_sis(instr, reg, tube, xy, cfg, &format!("_sis{id}"))?;
    }
    Ok(())
}

fn tube_xy(tube: &CalibrationTubeMeta) -> (f64, f64) {
    polar_to_xy(
        millimeter!(tube.radius_in_mm),
        degree!(tube.angle_in_deg),
        AngleSense::Clockwise,
    )
}

fn place_sis(
    instr: &InstrumentationData,
    reg: &mut Registry,
    tube: &CalibrationTubeMeta,
    (x, y): (f64, f64),
    cfg: &SisTubeConfig,
    suffix: &str,
) -> GeomResult<()> {
    if cfg.sources.len() > SOURCE_SLOTS {
        return Err(GeomError::Configuration(format!(
            "SIS{suffix} lists {} sources, only {SOURCE_SLOTS} slots exist",
            cfg.sources.len()
        )));
    }
    let sources = cfg
        .sources
        .iter()
        .enumerate()
        .filter_map(|(slot, s)| s.as_deref().map(|s| (slot, s)))
        .map(|(slot, s)| {
            if slot != SOURCE_SLOTS - 1 {
                return Err(GeomError::NotImplemented(format!(
                    "sources are only supported in the lowest SIS slot, got {s} in slot {}",
                    slot + 1
                )));
            }
            Ok((slot, s.parse::<SourceSpec>()?))
        })
        .collect::<GeomResult<Vec<_>>>()?;

    let top = instr.top_plate_z_mm();
    let inner_radius = tube.tube_radius_in_mm - TUBE_WALL;
    if ABSORBER_RADIUS >= inner_radius {
        return Err(GeomError::Configuration(format!(
            "absorber does not fit into a calibration tube of radius {} mm",
            tube.tube_radius_in_mm
        )));
    }
    let absorber_top = sis_to_local_z(top, cfg.sis_z);
    let absorber_bottom = absorber_top - ABSORBER_HEIGHT;
    let tube_bottom = top - tube.length_in_mm + TUBE_WALL;
    if absorber_bottom < tube_bottom || absorber_top + HOLDER_HEIGHT > top {
        return Err(GeomError::Configuration(format!(
            "SIS reading {} mm moves the absorber{suffix} out of its calibration tube",
            cfg.sis_z
        )));
    }
    info!("SIS{suffix}: absorber bottom at z = {absorber_bottom} mm");

    let absorber = absorber_volume(instr, reg)?;
    reg.place(
        &format!("absorber{suffix}"),
        absorber,
        instr.mother_lv,
        Isometry::new_translation(millimeter!(x, y, absorber_top - ABSORBER_HEIGHT / 2.0))?,
    )?;
    let holder = holder_volume(instr, reg)?;
    reg.place(
        &format!("absorber_holder{suffix}"),
        holder,
        instr.mother_lv,
        Isometry::new_translation(millimeter!(x, y, absorber_top + HOLDER_HEIGHT / 2.0))?,
    )?;

    let holder_top = absorber_top + HOLDER_HEIGHT;
    for (slot, spec) in sources {
        let bottom = holder_top + SLOT_PITCH * usize_to_f64(SOURCE_SLOTS - 1 - slot);
        place_source(instr, reg, spec, (x, y, bottom), inner_radius, suffix)?;
    }
    Ok(())
}

fn absorber_volume(instr: &InstrumentationData, reg: &mut Registry) -> GeomResult<LvId> {
    reg.cached_volume(CacheKey::new("sis_absorber"), |reg| {
        let tantalum = instr.material(reg, MaterialKind::MetalTantalum)?;
        reg.add_volume(
            "absorber",
            Solid::cylinder(
                millimeter!(0.0),
                millimeter!(ABSORBER_RADIUS),
                millimeter!(ABSORBER_HEIGHT),
            )?,
            &tantalum,
        )
    })
}

fn holder_volume(instr: &InstrumentationData, reg: &mut Registry) -> GeomResult<LvId> {
    reg.cached_volume(CacheKey::new("sis_holder"), |reg| {
        let copper = instr.material(reg, MaterialKind::MetalCopper)?;
        let lv = reg.add_volume(
            "absorber_holder",
            Solid::cylinder(
                millimeter!(0.0),
                millimeter!(HOLDER_RADIUS),
                millimeter!(HOLDER_HEIGHT),
            )?,
            &copper,
        )?;
        reg.set_color(lv, COPPER);
        Ok(lv)
    })
}

/// Place a source capsule standing on `bottom`, with its active volume inside.
fn place_source(
    instr: &InstrumentationData,
    reg: &mut Registry,
    spec: SourceSpec,
    (x, y, bottom): (f64, f64, f64),
    inner_radius: f64,
    suffix: &str,
) -> GeomResult<()> {
    debug!("placing {} source{suffix}", spec.kind);
    let (r_out, h_out) = spec.kind.capsule();
    let (r_in, h_in) = spec.kind.active();
    let steel = instr.material(reg, MaterialKind::MetalSteel)?;
    let gold = instr.material(reg, MaterialKind::MetalCapsGold)?;

    let outer_name = format!("source_outer{suffix}");
    let outer = reg.add_volume(
        &outer_name,
        Solid::cylinder(millimeter!(0.0), millimeter!(r_out), millimeter!(h_out))?,
        &steel,
    )?;
    let inner_name = format!("source_inner{suffix}");
    let inner = reg.add_volume(
        &inner_name,
        Solid::cylinder(millimeter!(0.0), millimeter!(r_in), millimeter!(h_in))?,
        &gold,
    )?;
    reg.place(&inner_name, inner, outer, Isometry::identity())?;
    reg.place(
        &outer_name,
        outer,
        instr.mother_lv,
        Isometry::new_translation(millimeter!(x, y, bottom + h_out / 2.0))?,
    )?;
    if !spec.cu_cap {
        return Ok(());
    }

    let r_cap = r_out + CU_CAP_THICKNESS;
    let h_cap = h_out + CU_CAP_THICKNESS;
    if r_cap >= inner_radius {
        return Err(GeomError::Configuration(format!(
            "copper cap{suffix} does not fit into its calibration tube"
        )));
    }
    let cap_name = format!("source_cu_cap{suffix}");
    let full = reg.add_solid(
        &format!("{cap_name}_full"),
        Solid::cylinder(millimeter!(0.0), millimeter!(r_cap), millimeter!(h_cap))?,
    )?;
    let cavity = reg.add_solid(
        &format!("{cap_name}_cavity"),
        Solid::cylinder(millimeter!(0.0), millimeter!(r_out), millimeter!(h_out))?,
    )?;
    // open towards the holder
    let cup = reg.add_solid(
        &cap_name,
        Solid::subtraction(
            full,
            cavity,
            Isometry::new_along_z(millimeter!(-CU_CAP_THICKNESS / 2.0))?,
        ),
    )?;
    let copper = instr.material(reg, MaterialKind::MetalCopper)?;
    let cap = reg.add_logical_volume(&cap_name, cup, &copper)?;
    reg.set_color(cap, COPPER);
    reg.place(
        &cap_name,
        cap,
        instr.mother_lv,
        Isometry::new_translation(millimeter!(x, y, bottom + h_cap / 2.0))?,
    )?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        config::GeometryConfig,
        metadata::{self, InstrumentationMetadata},
        utils::test_helper::test_helper::TestContext,
    };
    use approx::assert_abs_diff_eq;
    use assert_matches::assert_matches;

    fn sis_context(tube: &str, sis_z: f64, sources: &[Option<&str>]) -> TestContext {
        let mut sis = BTreeMap::new();
        sis.insert(
            tube.to_owned(),
            Some(SisTubeConfig {
                sis_z,
                sources: sources.iter().map(|s| s.map(str::to_owned)).collect(),
            }),
        );
        let config = GeometryConfig {
            sis: Some(sis),
            ..GeometryConfig::default()
        };
        let metadata = InstrumentationMetadata {
            special: metadata::resolve_special(&config, None).unwrap(),
            ..InstrumentationMetadata::default()
        };
        TestContext::with_metadata(config, metadata)
    }
    fn build(ctx: &mut TestContext) -> GeomResult<()> {
        let (reg, instr) = ctx.split();
        place_calibration_system(&instr, reg)
    }
    #[test]
    fn source_grammar() {
        assert_eq!(
            "Th228".parse::<SourceSpec>().unwrap(),
            SourceSpec {
                kind: SourceKind::Th228,
                cu_cap: false
            }
        );
        assert_eq!(
            "Ra".parse::<SourceSpec>().unwrap(),
            SourceSpec {
                kind: SourceKind::Ra,
                cu_cap: false
            }
        );
        assert_eq!(
            "Ra+Cu".parse::<SourceSpec>().unwrap(),
            SourceSpec {
                kind: SourceKind::Ra,
                cu_cap: true
            }
        );
        assert_matches!("Xe+Cu".parse::<SourceSpec>(), Err(GeomError::Configuration(_)));
        assert_matches!(
            "Th228+Foo".parse::<SourceSpec>(),
            Err(GeomError::Configuration(_))
        );
        assert_matches!(
            "Th228+Cu+Cu".parse::<SourceSpec>(),
            Err(GeomError::Configuration(_))
        );
        assert_matches!("".parse::<SourceSpec>(), Err(GeomError::Configuration(_)));
    }
    #[test]
    fn tubes_only() {
        let mut ctx = TestContext::new();
        build(&mut ctx).unwrap();
        let reg = &ctx.reg;
        for id in 1..=4 {
            assert!(reg.pv_by_name(&format!("calibration_tube_{id}")).is_some());
        }
        // all tubes share one length
        assert_eq!(
            reg.logical_volumes()
                .filter(|(_, lv)| lv.name().starts_with("minishroud_19x"))
                .count(),
            1
        );
        let pv = reg.pv_by_name("calibration_tube_4").unwrap();
        let t = reg.physical_volume(pv).unwrap().placement().translation_mm();
        let phi = 81.43_f64.to_radians();
        assert_abs_diff_eq!(t.x, 155.0 * phi.cos(), epsilon = 1e-9);
        assert_abs_diff_eq!(t.y, -155.0 * phi.sin(), epsilon = 1e-9);
        assert_abs_diff_eq!(t.z, 1950.0 - 700.0, epsilon = 1e-9);
        assert!(reg.pv_by_name("absorber_sis1").is_none());
    }
    #[test]
    fn lowest_slot() {
        let mut ctx = sis_context("1", 8250.0, &[None, None, None, Some("Th228+Cu")]);
        build(&mut ctx).unwrap();
        let reg = &ctx.reg;
        let z = |name: &str| {
            reg.physical_volume(reg.pv_by_name(name).unwrap())
                .unwrap()
                .placement()
                .translation_mm()
                .z
        };
        let absorber_top = sis_to_local_z(1950.0, 8250.0);
        assert_abs_diff_eq!(
            z("absorber_sis1"),
            absorber_top - ABSORBER_HEIGHT / 2.0,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            z("absorber_holder_sis1"),
            absorber_top + HOLDER_HEIGHT / 2.0,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            z("source_outer_sis1"),
            absorber_top + HOLDER_HEIGHT + 4.0,
            epsilon = 1e-9
        );
        assert!(reg.pv_by_name("source_inner_sis1").is_some());
        assert!(reg.pv_by_name("source_cu_cap_sis1").is_some());
        assert!(reg.pv_by_name("absorber_sis2").is_none());
    }
    #[test]
    fn upper_slot_not_implemented() {
        let mut ctx = sis_context("2", 8250.0, &[None, Some("Ra"), None, None]);
        assert_matches!(build(&mut ctx), Err(GeomError::NotImplemented(_)));
    }
    #[test]
    fn invalid_sis() {
        let mut ctx = sis_context("7", 8250.0, &[None, None, None, Some("Ra")]);
        assert_matches!(build(&mut ctx), Err(GeomError::Configuration(_)));
        let mut ctx = sis_context("1", 8250.0, &[None, None, None, Some("Co60")]);
        assert_matches!(build(&mut ctx), Err(GeomError::Configuration(_)));
        let mut ctx = sis_context("1", 8250.0, &[None, None, None, None, Some("Ra")]);
        assert_matches!(build(&mut ctx), Err(GeomError::Configuration(_)));
        // below the end of the tube
        let mut ctx = sis_context("1", 9500.0, &[]);
        assert_matches!(build(&mut ctx), Err(GeomError::Configuration(_)));
    }
}
