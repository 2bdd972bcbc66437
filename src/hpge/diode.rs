//! Solids of the germanium diodes.
//!
//! Every diode is a generic polycone built from its (r, z) outline. The origin is on the axis at
//! the bottom face (the face resting on the PEN plate), z runs upwards to the diode height.
use std::f64::consts::TAU;

use log::debug;

use crate::{
    core::InstrumentationData,
    error::{GeomError, GeomResult},
    geometry::{CacheKey, LvId, Registry, Solid},
    metadata::{DiodeGeometry, DiodeType, HpgeChannel, Taper},
    millimeter, radian,
    vis_utils::GERMANIUM,
};

/// Radial reduction of a taper at its narrow end.
fn taper_depth(taper: Option<&Taper>) -> Option<(f64, f64)> {
    taper
        .filter(|t| t.angle_in_deg > 0.0 && t.height_in_mm > 0.0)
        .map(|t| (t.height_in_mm * t.angle_in_deg.to_radians().tan(), t.height_in_mm))
}

/// Closed (r, z) outline of a diode, counter-clockwise starting on the axis.
///
/// Inverted coaxial diodes have their borehole at the top, semi-coaxial ones at the bottom.
/// # Errors
/// This function returns a configuration error if the dimensions are inconsistent.
pub fn diode_outline(kind: DiodeType, geom: &DiodeGeometry) -> GeomResult<Vec<(f64, f64)>> {
    let r = geom.radius_in_mm;
    let h = geom.height_in_mm;
    if !(r > 0.0 && h > 0.0) {
        return Err(GeomError::Configuration(format!(
            "diode dimensions must be positive, got r = {r} mm, h = {h} mm"
        )));
    }
    let borehole = match (kind, geom.borehole) {
        (DiodeType::Icpc | DiodeType::Coax, Some(b)) => {
            if b.radius_in_mm <= 0.0 || b.radius_in_mm >= r || b.depth_in_mm >= h {
                return Err(GeomError::Configuration(format!(
                    "borehole of {} mm x {} mm does not fit into the diode",
                    b.radius_in_mm, b.depth_in_mm
                )));
            }
            Some(b)
        }
        _ => None,
    };
    let top = taper_depth(geom.taper.top.as_ref());
    let bottom = taper_depth(geom.taper.bottom.as_ref());
    if let Some((dr, dz)) = top.into_iter().chain(bottom).find(|(dr, dz)| *dr >= r || *dz >= h) {
        return Err(GeomError::Configuration(format!(
            "taper of {dr} mm x {dz} mm does not fit into the diode"
        )));
    }

    let mut points = Vec::new();
    match (kind, borehole) {
        (DiodeType::Coax, Some(b)) => {
            points.push((0.0, b.depth_in_mm));
            points.push((b.radius_in_mm, b.depth_in_mm));
            points.push((b.radius_in_mm, 0.0));
        }
        _ => points.push((0.0, 0.0)),
    }
    if let Some((dr, dz)) = bottom {
        points.push((r - dr, 0.0));
        points.push((r, dz));
    } else {
        points.push((r, 0.0));
    }
    let top_rim = if let Some((dr, dz)) = top {
        points.push((r, h - dz));
        r - dr
    } else {
        r
    };
    points.push((top_rim, h));
    match (kind, borehole) {
        (DiodeType::Icpc, Some(b)) => {
            if top_rim <= b.radius_in_mm {
                return Err(GeomError::Configuration(
                    "top taper reaches into the borehole".into(),
                ));
            }
            points.push((b.radius_in_mm, h));
            points.push((b.radius_in_mm, h - b.depth_in_mm));
            points.push((0.0, h - b.depth_in_mm));
        }
        _ => points.push((0.0, h)),
    }
    points.dedup_by(|a, b| (a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9);
    Ok(points)
}

/// The logical volume of a diode, built once per detector name.
/// # Errors
/// This function returns an error if the diode dimensions are inconsistent or the volume cannot
/// be registered.
pub fn diode_volume(
    instr: &InstrumentationData,
    reg: &mut Registry,
    channel: &HpgeChannel,
) -> GeomResult<LvId> {
    let diode = &channel.diode;
    reg.cached_volume(CacheKey::new("hpge").flag(&diode.name), |reg| {
        debug!("building diode {} ({:?})", diode.name, diode.kind);
        let rz = diode_outline(diode.kind, &diode.geometry)?
            .into_iter()
            .map(|(r, z)| (millimeter!(r), millimeter!(z)))
            .collect();
        let solid = Solid::generic_polycone(radian!(0.0), radian!(TAU), rz)?;
        let material = instr.materials.enriched_germanium(reg, diode.enrichment())?;
        let lv = reg.add_volume(&diode.name, solid, &material)?;
        reg.set_color(lv, GERMANIUM);
        Ok(lv)
    })
}
