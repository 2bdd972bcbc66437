#![warn(missing_docs)]
//! The germanium detector strings.
//!
//! Every string hangs from the top plate: a copper support ring with a PEN tristar on top, three
//! copper rods and a stack of detector units. A unit is a diode resting on a PEN baseplate. The
//! whole stack is enclosed in a TPB coated nylon mini shroud with a separate top cap. Strings
//! without detectors only carry the support structure and an optional counterweight.
pub mod diode;

use std::f64::consts::PI;

use itertools::Itertools;
use log::{debug, info, warn};
use nalgebra::{Rotation3, Vector3};

use crate::{
    core::InstrumentationData,
    det_utils::{DetectorInfo, DetectorKind},
    error::{GeomError, GeomResult},
    geometry::{CacheKey, Envelope, LvId, Registry, Solid},
    materials::{MaterialKind, SurfaceKind},
    metadata::{DiodeType, EmptyStringContent, HpgeChannel, HpgeMounting, StringMeta},
    millimeter, radian,
    utils::{polar_to_xy, AngleSense, Isometry},
    vis_utils::{VisColor, COPPER, MINISHROUD},
};

/// Hanger of a populated string below the top plate.
const STRING_HANGER_OFFSET: f64 = 422.11;
/// Hanger of an empty string below the top plate.
const EMPTY_STRING_HANGER_OFFSET: f64 = 412.77;
/// Copper rods shrink when cooled down.
const ROD_CONTRACTION: f64 = 0.997;
const ROD_RADIUS: f64 = 1.43;

const PEN_THICKNESS: f64 = 1.5;
/// Distance between the rod end of a unit and the centre of its baseplate.
const PEN_OFFSET: f64 = 3.7 + PEN_THICKNESS / 2.0;
/// Gap between baseplate centre and the diode bottom face.
const DIODE_ABOVE_PEN: f64 = 4.0;
const PPC_ABOVE_PEN: f64 = 2.5;

const NMS_THICKNESS: f64 = 0.1;
const NMS_TOP_LENGTH: f64 = 8.0;

const SUPPORT_RING_RMIN: f64 = 20.0;
const SUPPORT_RING_RMAX: f64 = 47.0;
const SUPPORT_RING_THICKNESS: f64 = 3.0;
const TRISTAR_RADIUS: f64 = 30.0;
const TRISTAR_THICKNESS: f64 = 2.0;
/// Tristar centre above the hanger.
const TRISTAR_Z: f64 = 13.0;

/// Position and orientation of one string.
struct StringFrame<'a> {
    id: &'a str,
    x: f64,
    y: f64,
    /// angular position in rad
    angle: f64,
    /// rotation of the string parts around their own axis
    rot: f64,
    /// reference height of the hanger
    z0: f64,
}
impl StringFrame<'_> {
    fn at(&self, z: f64) -> GeomResult<Isometry> {
        Isometry::new_translation(millimeter!(self.x, self.y, z))
    }
    fn rotated_at(&self, z: f64, angle: f64) -> GeomResult<Isometry> {
        Isometry::new(millimeter!(self.x, self.y, z), radian!(0.0, 0.0, angle))
    }
    /// Shell around all parts of the string, from `bottom` up to the tristar.
    fn envelope(&self, radius: f64, bottom: f64) -> GeomResult<Envelope> {
        Envelope::cylinder(
            &format!("string_{}", self.id),
            (self.x, self.y),
            radius.max(SUPPORT_RING_RMAX),
            (bottom, self.z0 + TRISTAR_Z + TRISTAR_THICKNESS / 2.0),
        )
    }
    /// Offsets of the three rods from the string axis.
    fn rod_offsets(&self, rod_radius: f64) -> [(f64, f64); 3] {
        let (sin, cos) = self.angle.sin_cos();
        [0.0, 1.0, 2.0].map(|i: f64| {
            let th = (-30.0 - 120.0 * i).to_radians();
            let (u, v) = (rod_radius * th.cos(), rod_radius * th.sin());
            (sin * u + cos * v, cos * u - sin * v)
        })
    }
}

/// Place all strings listed in the array layout.
/// # Errors
/// This function returns a configuration error if the channel map and the array layout do not
/// match, e.g. a detector sits on an unknown string, a slot is missing or occupied twice or an
/// empty string carries detectors.
pub fn place_hpge_strings(instr: &InstrumentationData, reg: &mut Registry) -> GeomResult<()> {
    let special = &instr.metadata.special;
    let mut by_string = instr
        .metadata
        .hpges
        .iter()
        .into_group_map_by(|channel| channel.string);
    if let Some(unknown) = by_string
        .keys()
        .copied()
        .sorted()
        .find(|id| !special.hpge_string.contains_key(&id.to_string()))
    {
        return Err(GeomError::Configuration(format!(
            "string {unknown} is not part of the array layout"
        )));
    }
    for (id, meta) in &special.hpge_string {
        let string_id = id.parse::<u32>().map_err(|_| {
            GeomError::Configuration(format!("invalid string id {id} in array layout"))
        })?;
        let units = by_string.remove(&string_id).unwrap_or_default();
        match (&meta.empty_string_content, units.is_empty()) {
            (Some(_), false) => {
                return Err(GeomError::Configuration(format!(
                    "string {id} is declared empty but carries {} detectors",
                    units.len()
                )))
            }
            (Some(content), true) => place_empty_string(instr, reg, id, meta, content)?,
            (None, true) => debug!("string {id} carries no detectors"),
            (None, false) => place_string(instr, reg, id, meta, units)?,
        }
    }
    info!("placed {} germanium detectors", instr.metadata.hpges.len());
    Ok(())
}

fn frame<'a>(id: &'a str, meta: &StringMeta, z0: f64) -> StringFrame<'a> {
    let angle = meta.angle_in_deg.to_radians();
    let (x, y) = polar_to_xy(
        millimeter!(meta.radius_in_mm),
        radian!(angle),
        AngleSense::Clockwise,
    );
    StringFrame {
        id,
        x,
        y,
        angle,
        rot: -PI + angle,
        z0,
    }
}

/// Units ordered by slot. Slots have to be numbered 1..n without gaps.
fn ordered_units<'a>(id: &str, mut units: Vec<&'a HpgeChannel>) -> GeomResult<Vec<&'a HpgeChannel>> {
    units.sort_by_key(|u| u.position);
    for (expected, unit) in (1..).zip(&units) {
        if unit.position == expected {
            continue;
        }
        return Err(GeomError::Configuration(if unit.position < expected {
            format!("slot {} of string {id} is occupied twice", unit.position)
        } else {
            format!("slot {expected} of string {id} is empty")
        }));
    }
    Ok(units)
}

fn mounting(instr: &InstrumentationData, unit: &HpgeChannel) -> HpgeMounting {
    instr
        .metadata
        .special
        .hpges
        .get(&unit.name)
        .cloned()
        .unwrap_or_else(|| {
            let baseplate = if unit.diode.kind == DiodeType::Ppc {
                "small"
            } else {
                "medium"
            };
            warn!(
                "no mounting information for {}, using {baseplate} baseplate",
                unit.name
            );
            HpgeMounting {
                rodlength_in_mm: unit.diode.geometry.height_in_mm + 30.0,
                baseplate: baseplate.to_owned(),
            }
        })
}

/// PEN baseplate of a unit.
///
/// Ortec inverted coaxial diodes on medium plates need a slightly wider plate.
fn baseplate_size(unit: &HpgeChannel, mounting: &HpgeMounting) -> GeomResult<&'static str> {
    let size = match mounting.baseplate.as_str() {
        "small" => "small",
        "medium" => {
            let ortec = unit.diode.production.manufacturer.as_deref() == Some("Ortec");
            if unit.name.starts_with('V') && ortec {
                "medium_ortec"
            } else {
                "medium"
            }
        }
        "large" => "large",
        "xlarge" => "xlarge",
        other => {
            return Err(GeomError::Configuration(format!(
                "unknown baseplate {other} of {}",
                unit.name
            )))
        }
    };
    if unit.diode.kind == DiodeType::Ppc && size != "small" {
        return Err(GeomError::Configuration(format!(
            "PPC detector {} needs a small baseplate, got {size}",
            unit.name
        )));
    }
    Ok(size)
}

fn pen_plate(instr: &InstrumentationData, reg: &mut Registry, size: &'static str) -> GeomResult<LvId> {
    reg.cached_volume(CacheKey::new("pen").flag(size), |reg| {
        let (rmin, rmax, color) = match size {
            "small" => (0.0, 33.0, [1.0, 0.0, 0.0, 1.0]),
            "medium" => (0.0, 38.0, [0.0, 1.0, 0.0, 1.0]),
            "medium_ortec" => (0.0, 38.5, [1.0, 0.0, 1.0, 1.0]),
            "large" => (0.0, 42.0, [0.0, 0.0, 1.0, 1.0]),
            "xlarge" => (0.0, 44.0, [1.0, 1.0, 0.0, 1.0]),
            "ppc_small" => (20.0, 33.0, [1.0, 0.0, 0.0, 1.0]),
            other => {
                return Err(GeomError::Configuration(format!(
                    "unknown PEN plate {other}"
                )))
            }
        };
        let pen = instr.material(reg, MaterialKind::Pen)?;
        let lv = reg.add_volume(
            &format!("pen_{size}"),
            Solid::cylinder(
                millimeter!(rmin),
                millimeter!(rmax),
                millimeter!(PEN_THICKNESS),
            )?,
            &pen,
        )?;
        reg.set_color(lv, VisColor::Rgba(color));
        Ok(lv)
    })
}

/// A TPB coated nylon shroud of the given outer radius and length, open at the top if requested.
///
/// Identical shrouds share one volume.
pub(crate) fn nylon_mini_shroud(
    instr: &InstrumentationData,
    reg: &mut Registry,
    radius: f64,
    length: f64,
    open_top: bool,
) -> GeomResult<LvId> {
    let key = CacheKey::new("minishroud")
        .length(millimeter!(radius))
        .length(millimeter!(length))
        .flag(if open_top { "open" } else { "closed" });
    reg.cached_volume(key, |reg| {
        let name = if open_top {
            format!("minishroud_{radius}x{length}_open")
        } else {
            format!("minishroud_{radius}x{length}")
        };
        let outer = reg.add_solid(
            &format!("{name}_outer"),
            Solid::cylinder(millimeter!(0.0), millimeter!(radius), millimeter!(length))?,
        )?;
        let (inner_length, shift) = if open_top {
            (length, NMS_THICKNESS)
        } else {
            (length - 2.0 * NMS_THICKNESS, 0.0)
        };
        let inner = reg.add_solid(
            &format!("{name}_inner"),
            Solid::cylinder(
                millimeter!(0.0),
                millimeter!(radius - NMS_THICKNESS),
                millimeter!(inner_length),
            )?,
        )?;
        let shell = reg.add_solid(
            &name,
            Solid::subtraction(outer, inner, Isometry::new_along_z(millimeter!(shift))?),
        )?;
        let nylon = instr.material(reg, MaterialKind::TpbOnNylon)?;
        let lv = reg.add_logical_volume(&name, shell, &nylon)?;
        reg.set_color(lv, MINISHROUD);
        Ok(lv)
    })
}

fn place_string(
    instr: &InstrumentationData,
    reg: &mut Registry,
    id: &str,
    meta: &StringMeta,
    units: Vec<&HpgeChannel>,
) -> GeomResult<()> {
    let units = ordered_units(id, units)?;
    if meta.rod_radius_in_mm + ROD_RADIUS >= meta.minishroud_radius_in_mm - NMS_THICKNESS {
        return Err(GeomError::Configuration(format!(
            "rods of string {id} do not fit into its mini shroud"
        )));
    }
    let string = frame(id, meta, instr.top_plate_z_mm() - STRING_HANGER_OFFSET);
    debug!("placing string {id} with {} detectors", units.len());
    // plates are turned upside down and aligned with the string
    let pen_rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), -string.rot)
        * Rotation3::from_axis_angle(&Vector3::x_axis(), PI);

    let mut total_rod_length = 0.0;
    for unit in units {
        let mounting = mounting(instr, unit);
        let size = baseplate_size(unit, &mounting)?;
        total_rod_length += mounting.rodlength_in_mm * ROD_CONTRACTION;
        let z_pen = string.z0 - total_rod_length + PEN_OFFSET;
        let is_ppc = unit.diode.kind == DiodeType::Ppc;
        let z_det = z_pen + if is_ppc { PPC_ABOVE_PEN } else { DIODE_ABOVE_PEN };

        let diode_lv = diode::diode_volume(instr, reg, unit)?;
        let det_pv = reg.place(&unit.name, diode_lv, instr.mother_lv, string.at(z_det)?)?;
        reg.tag_detector(
            det_pv,
            DetectorInfo::new(DetectorKind::Germanium, unit.rawid, Some(unit.record.clone())),
        )?;
        instr.add_lar_border_surfaces(reg, "ge", det_pv, SurfaceKind::ToGermanium)?;

        let pen_lv = pen_plate(instr, reg, size)?;
        let pen_pv = reg.place(
            &format!("{}_pen", unit.name),
            pen_lv,
            instr.mother_lv,
            Isometry::from_rotation(millimeter!(string.x, string.y, z_pen), pen_rotation)?,
        )?;
        instr.add_lar_border_surfaces(reg, "pen", pen_pv, SurfaceKind::LarToPen)?;
        if is_ppc {
            let ring_lv = pen_plate(instr, reg, "ppc_small")?;
            let z_ring = z_det + unit.diode.geometry.height_in_mm + PEN_THICKNESS / 2.0;
            let ring_pv = reg.place(
                &format!("{}_pen_top", unit.name),
                ring_lv,
                instr.mother_lv,
                Isometry::from_rotation(millimeter!(string.x, string.y, z_ring), pen_rotation)?,
            )?;
            instr.add_lar_border_surfaces(reg, "pen", ring_pv, SurfaceKind::LarToPen)?;
        }
    }

    let shroud_length = total_rod_length + 6.0 + meta.minishroud_delta_length_in_mm;
    let shroud = nylon_mini_shroud(
        instr,
        reg,
        meta.minishroud_radius_in_mm,
        shroud_length,
        true,
    )?;
    let shroud_pv = reg.place(
        &format!("minishroud_string_{id}"),
        shroud,
        instr.mother_lv,
        string.at(string.z0 - shroud_length / 2.0 + NMS_THICKNESS)?,
    )?;
    instr.add_lar_border_surfaces(reg, "nms", shroud_pv, SurfaceKind::LarToTpb)?;
    let cap = nylon_mini_shroud(instr, reg, meta.minishroud_radius_in_mm, NMS_TOP_LENGTH, false)?;
    let cap_pv = reg.place(
        &format!("minishroud_top_string_{id}"),
        cap,
        instr.mother_lv,
        string.at(string.z0 + NMS_TOP_LENGTH / 2.0 + 0.2)?,
    )?;
    instr.add_lar_border_surfaces(reg, "nms", cap_pv, SurfaceKind::LarToTpb)?;

    let rod_length = total_rod_length + 3.5;
    reg.add_envelope(string.envelope(
        meta.minishroud_radius_in_mm,
        (string.z0 - shroud_length + NMS_THICKNESS).min(string.z0 - rod_length),
    )?);
    place_support(instr, reg, &string, meta, rod_length)
}

fn place_empty_string(
    instr: &InstrumentationData,
    reg: &mut Registry,
    id: &str,
    meta: &StringMeta,
    content: &EmptyStringContent,
) -> GeomResult<()> {
    let string = frame(id, meta, instr.top_plate_z_mm() - EMPTY_STRING_HANGER_OFFSET);
    debug!("placing empty string {id}");
    let rod_length = content
        .counterweight
        .as_ref()
        .map_or(100.0, |cw| cw.height_in_mm + 20.0);
    place_support(instr, reg, &string, meta, rod_length)?;
    let (cw_radius, cw_bottom) = content
        .counterweight
        .as_ref()
        .map_or((0.0, f64::INFINITY), |cw| {
            (cw.radius_in_mm, string.z0 - 10.0 - cw.height_in_mm)
        });
    reg.add_envelope(string.envelope(
        (meta.rod_radius_in_mm + ROD_RADIUS).max(cw_radius),
        cw_bottom.min(string.z0 - rod_length),
    )?);

    let Some(cw) = &content.counterweight else {
        return Ok(());
    };
    let material = instr.materials.get_material_by_name(reg, &cw.material)?;
    let name = format!("counterweight_string_{id}");
    let lv = reg.add_volume(
        &name,
        Solid::cylinder(
            millimeter!(0.0),
            millimeter!(cw.radius_in_mm),
            millimeter!(cw.height_in_mm),
        )?,
        &material,
    )?;
    reg.set_color(lv, VisColor::Rgba([0.5, 0.5, 0.5, 1.0]));
    let pv = reg.place(
        &name,
        lv,
        instr.mother_lv,
        string.at(string.z0 - 10.0 - cw.height_in_mm / 2.0)?,
    )?;
    if cw.tetratex_wrapped {
        let surface = instr.surface(reg, SurfaceKind::ToTetratex)?;
        reg.add_border_surface(
            &format!("bsurface_lar_counterweight_{id}"),
            &surface,
            instr.mother_pv,
            pv,
        )?;
    }
    Ok(())
}

/// Copper support ring, PEN tristar and the three copper rods of a string.
fn place_support(
    instr: &InstrumentationData,
    reg: &mut Registry,
    string: &StringFrame,
    meta: &StringMeta,
    rod_length: f64,
) -> GeomResult<()> {
    let id = string.id;
    let ring = reg.cached_volume(CacheKey::new("string_support_structure"), |reg| {
        let copper = instr.material(reg, MaterialKind::MetalCopper)?;
        let lv = reg.add_volume(
            "string_support_structure",
            Solid::cylinder(
                millimeter!(SUPPORT_RING_RMIN),
                millimeter!(SUPPORT_RING_RMAX),
                millimeter!(SUPPORT_RING_THICKNESS),
            )?,
            &copper,
        )?;
        reg.set_color(lv, COPPER);
        Ok(lv)
    })?;
    reg.place(
        &format!("string_support_structure_string_{id}"),
        ring,
        instr.mother_lv,
        string.rotated_at(string.z0 + 10.5, PI / 6.0 + string.rot)?,
    )?;

    let tristar = reg.cached_volume(CacheKey::new("tristar"), |reg| {
        let pen = instr.material(reg, MaterialKind::Pen)?;
        let lv = reg.add_volume(
            "tristar",
            Solid::cylinder(
                millimeter!(0.0),
                millimeter!(TRISTAR_RADIUS),
                millimeter!(TRISTAR_THICKNESS),
            )?,
            &pen,
        )?;
        reg.set_color(lv, VisColor::Rgba([0.8, 0.8, 0.8, 0.5]));
        Ok(lv)
    })?;
    let tristar_pv = reg.place(
        &format!("tristar_string_{id}"),
        tristar,
        instr.mother_lv,
        string.at(string.z0 + TRISTAR_Z)?,
    )?;
    instr.add_lar_border_surfaces(reg, "pen", tristar_pv, SurfaceKind::LarToPen)?;

    let copper = instr.material(reg, MaterialKind::MetalCopper)?;
    let rod = reg.add_volume(
        &format!("string_{id}_cu_rod"),
        Solid::cylinder(
            millimeter!(0.0),
            millimeter!(ROD_RADIUS),
            millimeter!(rod_length),
        )?,
        &copper,
    )?;
    reg.set_color(rod, COPPER);
    for (i, (dx, dy)) in string.rod_offsets(meta.rod_radius_in_mm).into_iter().enumerate() {
        reg.place(
            &format!("string_{id}_cu_rod_{i}"),
            rod,
            instr.mother_lv,
            Isometry::new_translation(millimeter!(
                string.x + dx,
                string.y + dy,
                string.z0 - rod_length / 2.0
            ))?,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        config::GeometryConfig,
        metadata::{
            self, DiodeGeometry, DiodeMeta, Enrichment, InstrumentationMetadata, Production,
            SpecialMetadata, Tapers,
        },
        utils::test_helper::test_helper::{check_warning_contains, TestContext},
    };
    use approx::assert_abs_diff_eq;
    use assert_matches::assert_matches;

    fn channel(name: &str, string: u32, position: u32, kind: DiodeType) -> HpgeChannel {
        let diode = DiodeMeta {
            name: name.to_owned(),
            kind,
            production: Production {
                manufacturer: Some("Ortec".into()),
                enrichment: Some(Enrichment::Value(0.88)),
            },
            geometry: DiodeGeometry {
                height_in_mm: 60.0,
                radius_in_mm: 35.0,
                borehole: None,
                taper: Tapers::default(),
            },
        };
        HpgeChannel {
            name: name.to_owned(),
            rawid: 1000 + position,
            string,
            position,
            record: serde_json::to_value(&diode).unwrap(),
            diode,
        }
    }
    fn special(mountings: &[(&str, f64, &str)]) -> SpecialMetadata {
        let mut special = metadata::resolve_special(&GeometryConfig::default(), None).unwrap();
        for (name, rod, plate) in mountings {
            special.hpges.insert(
                (*name).to_owned(),
                HpgeMounting {
                    rodlength_in_mm: *rod,
                    baseplate: (*plate).to_owned(),
                },
            );
        }
        special
    }
    fn context(hpges: Vec<HpgeChannel>, special: SpecialMetadata) -> TestContext {
        TestContext::with_metadata(
            GeometryConfig::default(),
            InstrumentationMetadata {
                hpges,
                sipms: Vec::new(),
                special,
            },
        )
    }
    fn z_of(reg: &Registry, pv: &str) -> f64 {
        reg.physical_volume(reg.pv_by_name(pv).unwrap())
            .unwrap()
            .placement()
            .translation_mm()
            .z
    }
    #[test]
    fn unit_stacking() {
        let mut ctx = context(
            vec![
                channel("V01002A", 1, 2, DiodeType::Icpc),
                channel("V01001A", 1, 1, DiodeType::Icpc),
            ],
            special(&[("V01001A", 100.0, "large"), ("V01002A", 80.0, "medium")]),
        );
        let (reg, instr) = ctx.split();
        place_hpge_strings(&instr, reg).unwrap();
        let z0 = 1950.0 - STRING_HANGER_OFFSET;
        assert_abs_diff_eq!(
            z_of(reg, "V01001A"),
            z0 - 99.7 + 4.45 + 4.0,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            z_of(reg, "V01002A_pen"),
            z0 - 179.46 + 4.45,
            epsilon = 1e-9
        );
        let det = reg.pv_by_name("V01001A").unwrap();
        let t = reg.physical_volume(det).unwrap().placement().translation_mm();
        assert_abs_diff_eq!(t.x, 215.0 * 17.143_f64.to_radians().cos(), epsilon = 1e-9);
        assert_abs_diff_eq!(t.y, -215.0 * 17.143_f64.to_radians().sin(), epsilon = 1e-9);
        let info = reg.detector(det).unwrap();
        assert_eq!(info.kind, DetectorKind::Germanium);
        assert_eq!(info.uid, 1001);
        // Ortec ICPC on a medium plate
        assert!(reg.lv_by_name("pen_medium_ortec").is_some());
        assert!(reg.lv_by_name("pen_large").is_some());
        assert!(reg.pv_by_name("minishroud_top_string_1").is_some());
        assert!(reg.pv_by_name("string_1_cu_rod_2").is_some());
        assert!(reg.pv_by_name("minishroud_string_2").is_none());
    }
    #[test]
    fn rods_and_ring() {
        let mut ctx = context(
            vec![channel("V01001A", 1, 1, DiodeType::Icpc)],
            special(&[("V01001A", 100.0, "large")]),
        );
        let (reg, instr) = ctx.split();
        place_hpge_strings(&instr, reg).unwrap();
        let rod = reg.lv_by_name("string_1_cu_rod").unwrap();
        let Some(Solid::Tubs { z, .. }) = reg.solid(reg.logical_volume(rod).unwrap().solid())
        else {
            panic!("rod is not a tube");
        };
        assert_abs_diff_eq!(
            z.get::<uom::si::length::millimeter>(),
            99.7 + 3.5,
            epsilon = 1e-9
        );
        // rods keep their distance from the string axis
        let axis = reg.pv_by_name("V01001A").unwrap();
        let axis = reg.physical_volume(axis).unwrap().placement().translation_mm();
        for i in 0..3 {
            let pv = reg.pv_by_name(&format!("string_1_cu_rod_{i}")).unwrap();
            let t = reg.physical_volume(pv).unwrap().placement().translation_mm();
            assert_abs_diff_eq!((t.x - axis.x).hypot(t.y - axis.y), 45.5, epsilon = 1e-9);
        }
        let ring = reg.pv_by_name("string_support_structure_string_1").unwrap();
        assert!(reg.physical_volume(ring).unwrap().placement().has_rotation());
    }
    #[test]
    fn slot_errors() {
        for positions in [[1, 3], [1, 1]] {
            let mut ctx = context(
                vec![
                    channel("V01001A", 1, positions[0], DiodeType::Icpc),
                    channel("V01002A", 1, positions[1], DiodeType::Icpc),
                ],
                special(&[]),
            );
            let (reg, instr) = ctx.split();
            assert_matches!(
                place_hpge_strings(&instr, reg),
                Err(GeomError::Configuration(_))
            );
        }
    }
    #[test]
    fn layout_errors() {
        // unknown string
        let mut ctx = context(vec![channel("V13001A", 13, 1, DiodeType::Icpc)], special(&[]));
        let (reg, instr) = ctx.split();
        assert_matches!(
            place_hpge_strings(&instr, reg),
            Err(GeomError::Configuration(_))
        );
        // string 12 is declared empty
        let mut ctx = context(vec![channel("V12001A", 12, 1, DiodeType::Icpc)], special(&[]));
        let (reg, instr) = ctx.split();
        assert_matches!(
            place_hpge_strings(&instr, reg),
            Err(GeomError::Configuration(_))
        );
    }
    #[test]
    fn ppc_baseplate() {
        let mut ctx = context(
            vec![channel("P07001A", 7, 1, DiodeType::Ppc)],
            special(&[("P07001A", 50.0, "medium")]),
        );
        let (reg, instr) = ctx.split();
        assert_matches!(
            place_hpge_strings(&instr, reg),
            Err(GeomError::Configuration(_))
        );
        let mut ctx = context(
            vec![channel("P07001A", 7, 1, DiodeType::Ppc)],
            special(&[("P07001A", 50.0, "small")]),
        );
        let (reg, instr) = ctx.split();
        place_hpge_strings(&instr, reg).unwrap();
        let dz = z_of(reg, "P07001A_pen_top") - z_of(reg, "P07001A");
        assert_abs_diff_eq!(dz, 60.0 + 0.75, epsilon = 1e-9);
        assert_abs_diff_eq!(
            z_of(reg, "P07001A") - z_of(reg, "P07001A_pen"),
            PPC_ABOVE_PEN,
            epsilon = 1e-9
        );
    }
    #[test]
    fn missing_mounting() {
        testing_logger::setup();
        let mut ctx = context(vec![channel("B02099A", 2, 1, DiodeType::Bege)], special(&[]));
        let (reg, instr) = ctx.split();
        let bege = mounting(&instr, &instr.metadata.hpges[0]);
        assert_abs_diff_eq!(bege.rodlength_in_mm, 60.0 + 30.0, epsilon = 1e-9);
        assert_eq!(bege.baseplate, "medium");
        let ppc = mounting(&instr, &channel("P02099A", 2, 1, DiodeType::Ppc));
        assert_eq!(ppc.baseplate, "small");
        check_warning_contains("no mounting information for P02099A");

        place_hpge_strings(&instr, reg).unwrap();
        check_warning_contains("no mounting information for B02099A");
        assert!(reg.lv_by_name("pen_medium").is_some());
        let rod = reg.lv_by_name("string_2_cu_rod").unwrap();
        let Some(Solid::Tubs { z, .. }) = reg.solid(reg.logical_volume(rod).unwrap().solid())
        else {
            panic!("rod is not a tube");
        };
        assert_abs_diff_eq!(
            z.get::<uom::si::length::millimeter>(),
            90.0 * ROD_CONTRACTION + 3.5,
            epsilon = 1e-9
        );
    }
    #[test]
    fn diode_cached() {
        let unit = channel("V01001A", 1, 1, DiodeType::Icpc);
        let mut ctx = TestContext::new();
        let (reg, instr) = ctx.split();
        let first = diode::diode_volume(&instr, reg, &unit).unwrap();
        let n = reg.n_logical_volumes();
        assert_eq!(diode::diode_volume(&instr, reg, &unit).unwrap(), first);
        assert_eq!(reg.n_logical_volumes(), n);
        assert!(reg
            .logical_volume(first)
            .unwrap()
            .material()
            .starts_with("enriched_germanium"));
    }
    #[test]
    fn shroud_shared() {
        let mut ctx = TestContext::new();
        let (reg, instr) = ctx.split();
        let a = nylon_mini_shroud(&instr, reg, 48.0, 300.0, true).unwrap();
        assert_eq!(nylon_mini_shroud(&instr, reg, 48.0, 300.0, true).unwrap(), a);
        let closed = nylon_mini_shroud(&instr, reg, 48.0, 300.0, false).unwrap();
        assert_ne!(closed, a);
        let Some(Solid::Subtraction { transform, .. }) =
            reg.solid(reg.logical_volume(a).unwrap().solid())
        else {
            panic!("shroud is not a subtraction");
        };
        assert_abs_diff_eq!(transform.translation_mm().z, NMS_THICKNESS, epsilon = 1e-9);
    }
    #[test]
    fn empty_string() {
        let mut ctx = TestContext::new();
        let (reg, instr) = ctx.split();
        place_hpge_strings(&instr, reg).unwrap();
        let cw = reg.pv_by_name("counterweight_string_12").unwrap();
        assert_abs_diff_eq!(
            z_of(reg, "counterweight_string_12"),
            1950.0 - EMPTY_STRING_HANGER_OFFSET - 10.0 - 190.0,
            epsilon = 1e-9
        );
        assert!(reg.has_border_surface(instr.mother_pv, cw));
        assert!(reg.pv_by_name("string_12_cu_rod_0").is_some());
        assert!(reg.pv_by_name("minishroud_string_12").is_none());
        // no channels at all: only the empty string is built
        assert!(reg.pv_by_name("tristar_string_1").is_none());
    }
}
