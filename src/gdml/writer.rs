//! Serialization of a finished [`Registry`] to GDML text.
use std::{collections::HashSet, fmt::Write as _};

use quick_xml::escape::escape;
use uom::si::{angle::radian, length::millimeter, mass_density::gram_per_cubic_centimeter};

use crate::{
    det_utils::auxiliary_table,
    error::{GeomError, GeomResult},
    geometry::{Composition, ElementComposition, LvId, Registry, Solid},
    optics::Curve,
    utils::Isometry,
};

const GDML_SCHEMA: &str =
    "http://service-spi.web.cern.ch/service-spi/app/releases/GDML/schema/gdml.xsd";

/// Auxiliary type of the per-volume color tag.
pub const COLOR_AUX: &str = "rmg_color";
/// Auxiliary type of a detector group in `<userinfo>`.
pub const DETECTOR_AUX: &str = "RMG_detector";
/// Auxiliary type of the detector metadata block in `<userinfo>`.
pub const DETECTOR_META_AUX: &str = "RMG_detector_meta";

type Attrs<'a> = [(&'a str, String)];

/// Indenting XML text builder.
struct XmlText {
    out: String,
    depth: usize,
}
impl XmlText {
    fn new() -> Self {
        Self {
            out: String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"),
            depth: 0,
        }
    }
    fn tag(&mut self, name: &str, attrs: &Attrs, end: &str) -> GeomResult<()> {
        write!(self.out, "{}<{name}", "  ".repeat(self.depth)).map_err(fmt_err)?;
        for (key, value) in attrs {
            write!(self.out, " {key}=\"{}\"", escape(value.as_str())).map_err(fmt_err)?;
        }
        writeln!(self.out, "{end}>").map_err(fmt_err)
    }
    fn open(&mut self, name: &str, attrs: &Attrs) -> GeomResult<()> {
        self.tag(name, attrs, "")?;
        self.depth += 1;
        Ok(())
    }
    fn empty(&mut self, name: &str, attrs: &Attrs) -> GeomResult<()> {
        self.tag(name, attrs, "/")
    }
    fn close(&mut self, name: &str) -> GeomResult<()> {
        self.depth = self.depth.saturating_sub(1);
        writeln!(self.out, "{}</{name}>", "  ".repeat(self.depth)).map_err(fmt_err)
    }
}

fn fmt_err(e: std::fmt::Error) -> GeomError {
    GeomError::Gdml(e.to_string())
}
fn attr(key: &str, value: impl ToString) -> (&str, String) {
    (key, value.to_string())
}
fn mm(l: uom::si::f64::Length) -> f64 {
    l.get::<millimeter>()
}
fn rad(a: uom::si::f64::Angle) -> f64 {
    a.get::<radian>()
}

/// Name of the matrix holding property `property` of material or surface `owner`.
#[must_use]
pub fn matrix_name(owner: &str, property: &str) -> String {
    format!("{owner}_{property}")
}

/// Create the GDML document of the geometry.
///
/// Volumes are written daughters first, as the format requires every referenced volume to be
/// defined before its use. NIST materials (`G4_*`) are referenced by name only.
/// # Errors
/// This function returns an error if the registry has no world volume or refers to unknown
/// volumes or solids.
pub fn to_gdml(reg: &Registry) -> GeomResult<String> {
    let world = reg
        .world()
        .ok_or_else(|| GeomError::Gdml("registry has no world volume".into()))?;
    let mut xml = XmlText::new();
    xml.open(
        "gdml",
        &[
            attr("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
            attr("xsi:noNamespaceSchemaLocation", GDML_SCHEMA),
        ],
    )?;
    write_define(&mut xml, reg)?;
    write_materials(&mut xml, reg)?;
    write_solids(&mut xml, reg)?;
    write_structure(&mut xml, reg, world)?;
    write_userinfo(&mut xml, reg)?;
    let world_name = reg
        .logical_volume(world)
        .map(|lv| lv.name().to_owned())
        .ok_or_else(|| GeomError::Gdml("dangling world volume".into()))?;
    xml.open("setup", &[attr("name", "Default"), attr("version", "1.0")])?;
    xml.empty("world", &[attr("ref", world_name)])?;
    xml.close("setup")?;
    xml.close("gdml")?;
    Ok(xml.out)
}

fn matrix_values(curve: &Curve) -> String {
    curve
        .energy_points_mev()
        .iter()
        .map(|(e, v)| format!("{e} {v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn write_define(xml: &mut XmlText, reg: &Registry) -> GeomResult<()> {
    xml.open("define", &[])?;
    for mat in reg.materials() {
        for (prop, curve) in mat.properties() {
            xml.empty(
                "matrix",
                &[
                    attr("name", matrix_name(mat.name(), prop)),
                    attr("coldim", 2),
                    attr("values", matrix_values(curve)),
                ],
            )?;
        }
        for (prop, value) in mat.const_properties() {
            xml.empty(
                "matrix",
                &[
                    attr("name", matrix_name(mat.name(), prop)),
                    attr("coldim", 1),
                    attr("values", value),
                ],
            )?;
        }
    }
    for surface in reg.optical_surfaces() {
        for (prop, curve) in &surface.properties {
            xml.empty(
                "matrix",
                &[
                    attr("name", matrix_name(&surface.name, prop)),
                    attr("coldim", 2),
                    attr("values", matrix_values(curve)),
                ],
            )?;
        }
    }
    xml.close("define")
}

fn write_materials(xml: &mut XmlText, reg: &Registry) -> GeomResult<()> {
    xml.open("materials", &[])?;
    for iso in reg.isotopes() {
        xml.open(
            "isotope",
            &[attr("name", &iso.name), attr("N", iso.n), attr("Z", iso.z)],
        )?;
        xml.empty("atom", &[attr("unit", "g/mole"), attr("value", iso.a)])?;
        xml.close("isotope")?;
    }
    for el in reg.elements() {
        match &el.composition {
            ElementComposition::Natural { z, a } => {
                xml.open(
                    "element",
                    &[
                        attr("name", &el.name),
                        attr("formula", &el.symbol),
                        attr("Z", z),
                    ],
                )?;
                xml.empty("atom", &[attr("unit", "g/mole"), attr("value", a)])?;
            }
            ElementComposition::Isotopes(isotopes) => {
                xml.open("element", &[attr("name", &el.name)])?;
                for (iso, n) in isotopes {
                    xml.empty("fraction", &[attr("ref", iso), attr("n", n)])?;
                }
            }
        }
        xml.close("element")?;
    }
    for mat in reg.materials().iter().filter(|m| !m.is_nist()) {
        let mut attrs = vec![attr("name", mat.name())];
        if let Some(state) = mat.state() {
            attrs.push(attr("state", state));
        }
        xml.open("material", &attrs)?;
        if let Some(t) = mat.temperature_k() {
            xml.empty("T", &[attr("unit", "K"), attr("value", t)])?;
        }
        if let Some(p) = mat.pressure_pa() {
            xml.empty("P", &[attr("unit", "pascal"), attr("value", p)])?;
        }
        xml.empty(
            "D",
            &[
                attr("unit", "g/cm3"),
                attr("value", mat.density().get::<gram_per_cubic_centimeter>()),
            ],
        )?;
        match mat.composition() {
            Composition::Nist => {}
            Composition::AtomCounts(atoms) => {
                for (el, n) in atoms {
                    xml.empty("composite", &[attr("n", n), attr("ref", el)])?;
                }
            }
            Composition::MassFractions(fractions) => {
                for (el, n) in fractions {
                    xml.empty("fraction", &[attr("n", n), attr("ref", el)])?;
                }
            }
        }
        let props = mat
            .properties()
            .iter()
            .map(|(p, _)| p)
            .chain(mat.const_properties().iter().map(|(p, _)| p));
        for prop in props {
            xml.empty(
                "property",
                &[attr("name", prop), attr("ref", matrix_name(mat.name(), prop))],
            )?;
        }
        xml.close("material")?;
    }
    xml.close("materials")
}

fn write_transform(xml: &mut XmlText, name: &str, t: &Isometry) -> GeomResult<()> {
    let pos = t.translation_mm();
    xml.empty(
        "position",
        &[
            attr("name", format!("{name}_pos")),
            attr("unit", "mm"),
            attr("x", pos.x),
            attr("y", pos.y),
            attr("z", pos.z),
        ],
    )?;
    if t.has_rotation() {
        let rot = t.gdml_angles();
        xml.empty(
            "rotation",
            &[
                attr("name", format!("{name}_rot")),
                attr("unit", "rad"),
                attr("x", rot.x),
                attr("y", rot.y),
                attr("z", rot.z),
            ],
        )?;
    }
    Ok(())
}

fn solid_attrs<'a>(name: &str, solid: &Solid) -> Vec<(&'a str, String)> {
    let mut attrs = vec![attr("name", name)];
    match solid {
        Solid::Tubs {
            rmin,
            rmax,
            z,
            start_phi,
            delta_phi,
        } => attrs.extend([
            attr("rmin", mm(*rmin)),
            attr("rmax", mm(*rmax)),
            attr("z", mm(*z)),
            attr("startphi", rad(*start_phi)),
            attr("deltaphi", rad(*delta_phi)),
        ]),
        Solid::Box { x, y, z } => {
            attrs.extend([attr("x", mm(*x)), attr("y", mm(*y)), attr("z", mm(*z))]);
        }
        Solid::Cons {
            rmin1,
            rmax1,
            rmin2,
            rmax2,
            z,
            start_phi,
            delta_phi,
        } => attrs.extend([
            attr("rmin1", mm(*rmin1)),
            attr("rmax1", mm(*rmax1)),
            attr("rmin2", mm(*rmin2)),
            attr("rmax2", mm(*rmax2)),
            attr("z", mm(*z)),
            attr("startphi", rad(*start_phi)),
            attr("deltaphi", rad(*delta_phi)),
        ]),
        Solid::Sphere {
            rmin,
            rmax,
            start_phi,
            delta_phi,
            start_theta,
            delta_theta,
        } => attrs.extend([
            attr("rmin", mm(*rmin)),
            attr("rmax", mm(*rmax)),
            attr("startphi", rad(*start_phi)),
            attr("deltaphi", rad(*delta_phi)),
            attr("starttheta", rad(*start_theta)),
            attr("deltatheta", rad(*delta_theta)),
        ]),
        Solid::Ellipsoid {
            ax,
            by,
            cz,
            z_cut1,
            z_cut2,
        } => attrs.extend([
            attr("ax", mm(*ax)),
            attr("by", mm(*by)),
            attr("cz", mm(*cz)),
            attr("zcut1", mm(*z_cut1)),
            attr("zcut2", mm(*z_cut2)),
        ]),
        Solid::Torus {
            rmin,
            rmax,
            rtor,
            start_phi,
            delta_phi,
        } => attrs.extend([
            attr("rmin", mm(*rmin)),
            attr("rmax", mm(*rmax)),
            attr("rtor", mm(*rtor)),
            attr("startphi", rad(*start_phi)),
            attr("deltaphi", rad(*delta_phi)),
        ]),
        Solid::Polycone {
            start_phi,
            delta_phi,
            ..
        }
        | Solid::GenericPolycone {
            start_phi,
            delta_phi,
            ..
        } => attrs.extend([
            attr("startphi", rad(*start_phi)),
            attr("deltaphi", rad(*delta_phi)),
        ]),
        Solid::Union { .. } | Solid::Subtraction { .. } => {}
    }
    match solid {
        Solid::Union { .. } | Solid::Subtraction { .. } => {}
        Solid::Box { .. } | Solid::Ellipsoid { .. } => attrs.push(attr("lunit", "mm")),
        _ => attrs.extend([attr("lunit", "mm"), attr("aunit", "rad")]),
    }
    attrs
}

fn write_solids(xml: &mut XmlText, reg: &Registry) -> GeomResult<()> {
    xml.open("solids", &[])?;
    for surface in reg.optical_surfaces() {
        xml.open(
            "opticalsurface",
            &[
                attr("name", &surface.name),
                attr("model", surface.model),
                attr("finish", surface.finish),
                attr("type", surface.surface_type),
                attr("value", surface.value),
            ],
        )?;
        for (prop, _) in &surface.properties {
            xml.empty(
                "property",
                &[attr("name", prop), attr("ref", matrix_name(&surface.name, prop))],
            )?;
        }
        xml.close("opticalsurface")?;
    }
    // operands are always registered before the boolean solids using them
    for (_, name, solid) in reg.solids() {
        let tag = solid.gdml_tag();
        let attrs = solid_attrs(name, solid);
        match solid {
            Solid::Box { .. }
            | Solid::Tubs { .. }
            | Solid::Cons { .. }
            | Solid::Sphere { .. }
            | Solid::Ellipsoid { .. }
            | Solid::Torus { .. } => xml.empty(tag, &attrs)?,
            Solid::Polycone { planes, .. } => {
                xml.open(tag, &attrs)?;
                for p in planes {
                    xml.empty(
                        "zplane",
                        &[
                            attr("rmin", mm(p.rmin)),
                            attr("rmax", mm(p.rmax)),
                            attr("z", mm(p.z)),
                        ],
                    )?;
                }
                xml.close(tag)?;
            }
            Solid::GenericPolycone { rz, .. } => {
                xml.open(tag, &attrs)?;
                for (r, z) in rz {
                    xml.empty("rzpoint", &[attr("r", mm(*r)), attr("z", mm(*z))])?;
                }
                xml.close(tag)?;
            }
            Solid::Union {
                first,
                second,
                transform,
            }
            | Solid::Subtraction {
                first,
                second,
                transform,
            } => {
                let operand = |id| {
                    reg.solid_name(id)
                        .map(str::to_owned)
                        .ok_or_else(|| GeomError::Gdml(format!("solid {name} has a dangling operand")))
                };
                xml.open(tag, &attrs)?;
                xml.empty("first", &[attr("ref", operand(*first)?)])?;
                xml.empty("second", &[attr("ref", operand(*second)?)])?;
                write_transform(xml, name, transform)?;
                xml.close(tag)?;
            }
        }
    }
    xml.close("solids")
}

/// Logical volumes reachable from `world`, every daughter before its mother.
fn volumes_daughters_first(reg: &Registry, world: LvId) -> Vec<LvId> {
    fn visit(reg: &Registry, lv: LvId, seen: &mut HashSet<LvId>, order: &mut Vec<LvId>) {
        if !seen.insert(lv) {
            return;
        }
        for pv in reg.daughters(lv) {
            if let Some((_, daughter)) = reg.pv_endpoints(pv) {
                visit(reg, daughter, seen, order);
            }
        }
        order.push(lv);
    }
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    visit(reg, world, &mut seen, &mut order);
    order
}

fn write_structure(xml: &mut XmlText, reg: &Registry, world: LvId) -> GeomResult<()> {
    let lv_name = |lv: LvId| {
        reg.logical_volume(lv)
            .map(|v| v.name().to_owned())
            .ok_or_else(|| GeomError::Gdml("dangling logical volume".into()))
    };
    let pv_name = |pv| {
        reg.physical_volume(pv)
            .map(|p| p.name().to_owned())
            .ok_or_else(|| GeomError::Gdml("dangling physical volume".into()))
    };
    xml.open("structure", &[])?;
    for lv in volumes_daughters_first(reg, world) {
        let Some(volume) = reg.logical_volume(lv) else {
            continue;
        };
        let solid = reg
            .solid_name(volume.solid())
            .ok_or_else(|| GeomError::Gdml(format!("volume {} has no solid", volume.name())))?;
        xml.open("volume", &[attr("name", volume.name())])?;
        xml.empty("materialref", &[attr("ref", volume.material())])?;
        xml.empty("solidref", &[attr("ref", solid)])?;
        for pv in reg.daughters(lv) {
            let (Some(placement), Some((_, daughter))) =
                (reg.physical_volume(pv), reg.pv_endpoints(pv))
            else {
                continue;
            };
            xml.open("physvol", &[attr("name", placement.name())])?;
            xml.empty("volumeref", &[attr("ref", lv_name(daughter)?)])?;
            write_transform(xml, placement.name(), placement.placement())?;
            xml.close("physvol")?;
        }
        if let Some(color) = reg.color(lv) {
            xml.empty(
                "auxiliary",
                &[attr("auxtype", COLOR_AUX), attr("auxvalue", color.aux_value())],
            )?;
        }
        xml.close("volume")?;
    }
    for border in reg.border_surfaces() {
        xml.open(
            "bordersurface",
            &[
                attr("name", &border.name),
                attr("surfaceproperty", &border.surface),
            ],
        )?;
        xml.empty("physvolref", &[attr("ref", pv_name(border.pv1)?)])?;
        xml.empty("physvolref", &[attr("ref", pv_name(border.pv2)?)])?;
        xml.close("bordersurface")?;
    }
    for skin in reg.skin_surfaces() {
        xml.open(
            "skinsurface",
            &[
                attr("name", &skin.name),
                attr("surfaceproperty", &skin.surface),
            ],
        )?;
        xml.empty("volumeref", &[attr("ref", lv_name(skin.lv)?)])?;
        xml.close("skinsurface")?;
    }
    xml.close("structure")
}

fn write_userinfo(xml: &mut XmlText, reg: &Registry) -> GeomResult<()> {
    let groups = auxiliary_table(reg)?;
    if groups.is_empty() {
        return Ok(());
    }
    xml.open("userinfo", &[])?;
    let mut meta = Vec::new();
    for group in &groups {
        xml.open(
            "auxiliary",
            &[attr("auxtype", DETECTOR_AUX), attr("auxvalue", group.kind)],
        )?;
        for (pv, uid, metadata) in &group.detectors {
            xml.empty("auxiliary", &[attr("auxtype", pv), attr("auxvalue", uid)])?;
            if let Some(m) = metadata {
                meta.push((pv, m));
            }
        }
        xml.close("auxiliary")?;
    }
    if !meta.is_empty() {
        xml.open(
            "auxiliary",
            &[attr("auxtype", DETECTOR_META_AUX), attr("auxvalue", "")],
        )?;
        for (pv, m) in meta {
            let json = serde_json::to_string(m).map_err(|e| GeomError::Gdml(e.to_string()))?;
            xml.empty("auxiliary", &[attr("auxtype", pv), attr("auxvalue", json)])?;
        }
        xml.close("auxiliary")?;
    }
    xml.close("userinfo")
}
