//! The wavelength-shifting reflector (WLSR): a copper cylinder lined with TPB coated tetratex.
use log::debug;

use crate::{
    core::InstrumentationData,
    error::GeomResult,
    geometry::{Envelope, LvId, PvId, Registry, Solid},
    materials::{MaterialKind, SurfaceKind},
    millimeter,
    utils::Isometry,
    vis_utils::VisColor,
};

const WLSR_OUTER_RADIUS: f64 = 1400.0 / 2.0;
const WLSR_TPB_RADIUS: f64 = 1374.0 / 2.0;
/// 600 nm TPB coating (arXiv:2112.06675)
const WLSR_TPB_THICKNESS: f64 = 600.0 * 1e-6;
const WLSR_THICKNESS: f64 = (WLSR_OUTER_RADIUS - WLSR_TPB_RADIUS - WLSR_TPB_THICKNESS) / 2.0;
const WLSR_HEIGHT: f64 = 3000.0;
/// Distance of the reflector centre below the top plate.
const WLSR_BELOW_TOP_PLATE: f64 = 1410.0;

/// Logical volumes of the reflector layers, outermost first.
#[derive(Debug, Clone, Copy)]
pub struct WlsrVolumes {
    /// copper support
    pub outer: LvId,
    /// tetratex foil
    pub ttx: LvId,
    /// TPB coating
    pub tpb: LvId,
}

fn layer(rmax: f64) -> GeomResult<Solid> {
    Solid::cylinder(
        millimeter!(WLSR_TPB_RADIUS),
        millimeter!(rmax),
        millimeter!(WLSR_HEIGHT),
    )
}

/// Construct the three reflector layers.
/// # Errors
/// This function returns an error if the volumes cannot be registered.
pub fn construct_wlsr(instr: &InstrumentationData, reg: &mut Registry) -> GeomResult<WlsrVolumes> {
    let copper = instr.material(reg, MaterialKind::MetalCopper)?;
    let tetratex = instr.material(reg, MaterialKind::Tetratex)?;
    let tpb = instr.material(reg, MaterialKind::TpbOnTetratex)?;
    let outer = reg.add_volume("wlsr_outer", layer(WLSR_OUTER_RADIUS)?, &copper)?;
    let ttx = reg.add_volume(
        "wlsr_ttx",
        layer(WLSR_OUTER_RADIUS - WLSR_THICKNESS)?,
        &tetratex,
    )?;
    let tpb = reg.add_volume(
        "wlsr_tpb",
        layer(WLSR_OUTER_RADIUS - WLSR_THICKNESS - WLSR_TPB_THICKNESS)?,
        &tpb,
    )?;
    reg.set_color(outer, VisColor::Invisible);
    reg.set_color(ttx, VisColor::Rgba([1.0, 1.0, 1.0, 1.0]));
    reg.set_color(tpb, VisColor::Invisible);
    Ok(WlsrVolumes { outer, ttx, tpb })
}

/// Construct the reflector, place it below the top plate and add its optical surface.
///
/// Returns the placements of the tetratex and the TPB layer.
/// # Errors
/// This function returns an error if the volumes or surfaces cannot be registered.
pub fn place_wlsr(instr: &InstrumentationData, reg: &mut Registry) -> GeomResult<(PvId, PvId)> {
    let lvs = construct_wlsr(instr, reg)?;
    let z = instr.top_plate_z_mm() - WLSR_BELOW_TOP_PLATE;
    debug!("placing WLSR at z = {z} mm");
    reg.place(
        "wlsr_outer",
        lvs.outer,
        instr.mother_lv,
        Isometry::new_along_z(millimeter!(z))?,
    )?;
    reg.add_envelope(Envelope::new(
        "wlsr",
        (0.0, 0.0),
        (WLSR_TPB_RADIUS, WLSR_OUTER_RADIUS),
        (z - WLSR_HEIGHT / 2.0, z + WLSR_HEIGHT / 2.0),
    )?);
    let ttx_pv = reg.place("wlsr_ttx", lvs.ttx, lvs.outer, Isometry::identity())?;
    let tpb_pv = reg.place("wlsr_tpb", lvs.tpb, lvs.ttx, Isometry::identity())?;
    // a single surface between TPB and tetratex is enough
    let surface = instr.surface(reg, SurfaceKind::WlsrTpbToTetratex)?;
    reg.add_border_surface("bsurface_tpb_ttx", &surface, tpb_pv, ttx_pv)?;
    Ok((ttx_pv, tpb_pv))
}
