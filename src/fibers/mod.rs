#![warn(missing_docs)]
//! The scintillating fiber shroud: an inner and an outer barrel of wavelength shifting fiber
//! modules, read out by SiPMs at both ends.
//!
//! Two interchangeable [`FiberModel`]s describe the fibers themselves, a coarse one with one
//! tube segment per module ([`segment`]) and a detailed one with every single fiber
//! ([`single`]). The SiPMs and their light-tight wraps are the same for both models, so the
//! registered detectors do not depend on the level of detail.
//!
//! The fibers of the outer barrel are bent radially inwards at their lower end, the SiPM of
//! that end faces the array axis.
pub mod segment;
pub mod single;

use std::{
    collections::BTreeMap,
    f64::consts::{FRAC_PI_2, TAU},
};

use log::{debug, info};

use crate::{
    config::FiberDetail,
    core::InstrumentationData,
    det_utils::{DetectorInfo, DetectorKind},
    error::{GeomError, GeomResult},
    geometry::{CacheKey, Envelope, LvId, Registry, Solid},
    materials::{MaterialKind, SurfaceKind},
    metadata::{Barrel, SipmChannel, SipmPosition},
    millimeter, radian,
    utils::{usize_to_f64, Isometry},
    vis_utils::{VisColor, COPPER, FIBER_COATING},
};

/// Edge length of the square fiber cross section.
pub const FIBER_DIM: f64 = 1.0;
/// First cladding (BCF-91A data sheet).
const FIBER_THICKNESS_CL1: f64 = 0.04 * FIBER_DIM;
/// Second cladding (BCF-91A data sheet).
const FIBER_THICKNESS_CL2: f64 = 0.02 * FIBER_DIM;

/// Dummy SiPM thickness.
const SIPM_HEIGHT: f64 = 1.0;
const SIPM_OUTER_EXTRA: f64 = 0.2;
const SIPM_GAP: f64 = 0.05;
const SIPM_OVERLAP: f64 = 0.1;
/// The SiPM has to cover the square fiber end.
const SIPM_DIM: f64 = FIBER_DIM + 0.01;

/// Upper fiber end below the top plate.
const FIBER_TOP_BELOW_TOP_PLATE: f64 = 10.0;

/// Bent lower end of the outer barrel fibers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bend {
    /// bend radius of the fiber centre line
    pub radius: f64,
    /// straight part after the bend, pointing to the array axis
    pub inner_straight: f64,
    /// every second fiber bends this much lower, the inner ends form two rows
    pub stagger: f64,
}

/// Dimensions of one fiber barrel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarrelLayout {
    /// short name used in volume names
    pub tag: &'static str,
    /// outer radius of the fiber layer
    pub radius: f64,
    /// nominal total fiber length
    pub fiber_length: f64,
    /// fibers per module
    pub fibers_per_module: usize,
    /// modules in the full barrel
    pub n_modules: usize,
    /// bent lower end, if any
    pub bend: Option<Bend>,
    /// z of the upper fiber end
    pub top_z: f64,
}
impl BarrelLayout {
    /// The inner barrel, straight fibers.
    #[must_use]
    pub fn inner(top_plate_z: f64) -> Self {
        Self {
            tag: "ib",
            radius: 269.0 / 2.0,
            fiber_length: 1400.0,
            fibers_per_module: 90,
            n_modules: 9,
            bend: None,
            top_z: top_plate_z - FIBER_TOP_BELOW_TOP_PLATE,
        }
    }
    /// The outer barrel, fibers bent inwards at the bottom.
    #[must_use]
    pub fn outer(top_plate_z: f64) -> Self {
        Self {
            tag: "ob",
            radius: 590.0 / 2.0,
            fiber_length: 1900.0,
            fibers_per_module: 90,
            n_modules: 20,
            bend: Some(Bend {
                radius: 25.0,
                inner_straight: 10.0,
                stagger: 1.5,
            }),
            top_z: top_plate_z - FIBER_TOP_BELOW_TOP_PLATE,
        }
    }
    /// Opening angle of one module.
    #[must_use]
    pub fn segment_angle(&self) -> f64 {
        TAU / usize_to_f64(self.n_modules)
    }
    /// Radius of the fiber centre line.
    #[must_use]
    pub fn centre_radius(&self) -> f64 {
        self.radius - FIBER_DIM / 2.0
    }
    /// Length of the vertical part: the nominal length minus the quarter circle of the bend and
    /// the inner straight part.
    #[must_use]
    pub fn straight_length(&self) -> f64 {
        self.fiber_length
            - self
                .bend
                .map_or(0.0, |b| FRAC_PI_2 * b.radius + b.inner_straight)
    }
    /// z where the vertical part ends.
    #[must_use]
    pub fn bend_start_z(&self) -> f64 {
        self.top_z - self.straight_length()
    }
    /// Rotation of the first module edge.
    #[must_use]
    pub fn start_angle(&self, index: usize) -> f64 {
        self.segment_angle() * usize_to_f64(index)
    }
    fn suffix(&self) -> String {
        format!("_r{}_nmod{}", self.radius, self.n_modules)
    }
    /// Shells around the fibers and SiPMs of the full barrel. A bent barrel gets a second,
    /// wider shell around its lower end.
    /// # Errors
    /// This function returns an error if the dimensions do not form valid shells.
    pub fn envelopes(&self) -> GeomResult<Vec<Envelope>> {
        let r = self.centre_radius();
        let half_width = SIPM_DIM / 2.0 + SIPM_OUTER_EXTRA;
        let sipm_extent = SIPM_GAP + SIPM_HEIGHT + SIPM_OUTER_EXTRA;
        let name = format!("fibers_{}", self.tag);
        let top = self.top_z + sipm_extent;
        let Some(bend) = &self.bend else {
            let bottom = self.top_z - self.fiber_length - sipm_extent;
            return Ok(vec![Envelope::new(
                &name,
                (0.0, 0.0),
                (r - half_width, r + half_width),
                (bottom, top),
            )?]);
        };
        let bend_bottom =
            self.bend_start_z() - bend.radius - bend.stagger - SIPM_DIM - SIPM_OUTER_EXTRA;
        Ok(vec![
            Envelope::new(
                &name,
                (0.0, 0.0),
                (r - half_width, r + half_width),
                (self.bend_start_z(), top),
            )?,
            Envelope::new(
                &format!("{name}_bend"),
                (0.0, 0.0),
                (radial_sipm_range(self, bend).0 - SIPM_OUTER_EXTRA, r + half_width),
                (bend_bottom, self.bend_start_z()),
            )?,
        ])
    }
}

/// One module with the SiPMs at both of its ends.
#[derive(Debug, Clone, Copy)]
pub struct FiberModule<'a> {
    /// module name, e.g. `IB001002`
    pub name: &'a str,
    /// barrel the module belongs to
    pub barrel: Barrel,
    /// TPB coating of the fibers
    pub tpb_thickness_nm: f64,
    /// SiPM at the upper end
    pub top: &'a SipmChannel,
    /// SiPM at the lower end
    pub bottom: &'a SipmChannel,
}

/// A level of detail of the fibers of a module.
pub trait FiberModel {
    /// Place the fibers of `module` (without its SiPMs) into the mother volume.
    /// # Errors
    /// This function returns an error if the volumes cannot be registered.
    fn place_fibers(
        &self,
        instr: &InstrumentationData,
        reg: &mut Registry,
        layout: &BarrelLayout,
        module: &FiberModule,
        index: usize,
    ) -> GeomResult<()>;
}

/// Collect the SiPM channels into modules.
/// # Errors
/// This function returns a configuration error if a module end is read out by two SiPMs or has
/// no SiPM at all.
pub fn group_modules(sipms: &[SipmChannel]) -> GeomResult<Vec<FiberModule<'_>>> {
    let mut ends: BTreeMap<&str, [Option<&SipmChannel>; 2]> = BTreeMap::new();
    for channel in sipms {
        let slots = ends.entry(channel.module.name.as_str()).or_default();
        let (slot, end) = match channel.position {
            SipmPosition::Top => (&mut slots[0], "top"),
            SipmPosition::Bottom => (&mut slots[1], "bottom"),
        };
        if let Some(existing) = slot {
            return Err(GeomError::Configuration(format!(
                "{end} end of fiber module {} is read out by {} and {}",
                channel.module.name, existing.name, channel.name
            )));
        }
        *slot = Some(channel);
    }
    ends.into_iter()
        .map(|(name, slots)| match slots {
            [Some(top), Some(bottom)] => Ok(FiberModule {
                name,
                barrel: top.module.barrel,
                tpb_thickness_nm: top.module.geometry.tpb.thickness_in_nm,
                top,
                bottom,
            }),
            _ => Err(GeomError::Configuration(format!(
                "fiber module {name} needs a SiPM at both ends"
            ))),
        })
        .collect()
}

/// Position of a module in its barrel, from the two fiber numbers in its name.
///
/// `IB001002` covers fibers 1 and 2 and is module 0, `IB003004` is module 1 and so on.
/// Names starting at an even fiber are rounded down, `IB002003` is module 0 as well.
/// # Errors
/// This function returns a configuration error for malformed names and positions outside the
/// barrel.
pub fn module_index(name: &str, n_modules: usize) -> GeomResult<usize> {
    let number = |range: std::ops::Range<usize>| {
        name.get(range)
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or_else(|| GeomError::Configuration(format!("malformed fiber module name {name}")))
    };
    let (first, second) = (number(2..5)?, number(5..8)?);
    if name.len() != 8 || first == 0 {
        return Err(GeomError::Configuration(format!("malformed fiber module name {name}")));
    }
    if second != first + 1 {
        return Err(GeomError::Configuration(format!(
            "fiber module {name} does not cover two consecutive fibers"
        )));
    }
    let index = (first - 1) / 2;
    if index >= n_modules {
        return Err(GeomError::Configuration(format!(
            "fiber module {name} is outside of its barrel of {n_modules} modules"
        )));
    }
    Ok(index)
}

/// Place all fiber modules of the channel map.
/// # Errors
/// This function returns a configuration error if the SiPM channels do not form complete
/// modules or a module name is invalid.
pub fn place_fiber_modules(
    instr: &InstrumentationData,
    reg: &mut Registry,
    detail: FiberDetail,
) -> GeomResult<()> {
    let modules = group_modules(&instr.metadata.sipms)?;
    let model: &dyn FiberModel = match detail {
        FiberDetail::Segmented => &segment::SegmentModel,
        FiberDetail::Detailed => &single::SingleFiberModel,
    };
    let inner = BarrelLayout::inner(instr.top_plate_z_mm());
    let outer = BarrelLayout::outer(instr.top_plate_z_mm());
    for module in &modules {
        let layout = match module.barrel {
            Barrel::Inner => &inner,
            Barrel::Outer => &outer,
        };
        let index = module_index(module.name, layout.n_modules)?;
        debug!("placing fiber module {} at position {index}", module.name);
        model.place_fibers(instr, reg, layout, module, index)?;
        place_sipms(instr, reg, layout, module, index)?;
    }
    for (layout, barrel) in [(&inner, Barrel::Inner), (&outer, Barrel::Outer)] {
        if modules.iter().any(|m| m.barrel == barrel) {
            for envelope in layout.envelopes()? {
                reg.add_envelope(envelope);
            }
        }
    }
    info!("placed {} fiber modules ({detail:?})", modules.len());
    Ok(())
}

/// Register the cladding layers of one fiber shape: cladding 2 containing cladding 1
/// containing the core. `shape` gives the solid for a given cross section edge length.
fn cladded_fiber<F>(
    instr: &InstrumentationData,
    reg: &mut Registry,
    suffix: &str,
    key: CacheKey,
    shape: &F,
) -> GeomResult<LvId>
where
    F: Fn(f64) -> GeomResult<Solid>,
{
    reg.cached_volume(key.flag("cladding"), |reg| {
        let pmma_out = instr.material(reg, MaterialKind::PmmaOut)?;
        let pmma = instr.material(reg, MaterialKind::Pmma)?;
        let ps = instr.material(reg, MaterialKind::PsFibers)?;
        let cl2 = reg.add_volume(&format!("fiber_cl2{suffix}"), shape(FIBER_DIM)?, &pmma_out)?;
        let cl1 = reg.add_volume(
            &format!("fiber_cl1{suffix}"),
            shape(FIBER_DIM - FIBER_THICKNESS_CL1)?,
            &pmma,
        )?;
        let core = reg.add_volume(
            &format!("fiber_core{suffix}"),
            shape(FIBER_DIM - FIBER_THICKNESS_CL1 - FIBER_THICKNESS_CL2)?,
            &ps,
        )?;
        reg.place(&format!("fiber_cl1{suffix}"), cl1, cl2, Isometry::identity())?;
        reg.place(&format!("fiber_core{suffix}"), core, cl1, Isometry::identity())?;
        Ok(cl2)
    })
}

/// A TPB coated fiber of the given shape, shared by all fibers with the same coating.
fn coated_fiber<F>(
    instr: &InstrumentationData,
    reg: &mut Registry,
    suffix: &str,
    key: CacheKey,
    tpb_thickness_nm: f64,
    shape: F,
) -> GeomResult<LvId>
where
    F: Fn(f64) -> GeomResult<Solid>,
{
    let cladding = cladded_fiber(instr, reg, suffix, key.clone(), &shape)?;
    reg.cached_volume(key.value(tpb_thickness_nm).flag("coating"), |reg| {
        let name = format!("fiber_coating{suffix}_tpb{tpb_thickness_nm}");
        let tpb = instr.material(reg, MaterialKind::TpbOnFibers)?;
        let coating = reg.add_volume(&name, shape(FIBER_DIM + tpb_thickness_nm * 1e-6)?, &tpb)?;
        reg.place(
            &format!("fiber_cl2{suffix}_tpb{tpb_thickness_nm}"),
            cladding,
            coating,
            Isometry::identity(),
        )?;
        reg.set_color(coating, FIBER_COATING);
        Ok(coating)
    })
}

fn segment_tubs(rmin: f64, rmax: f64, z: f64, angle: f64) -> GeomResult<Solid> {
    Solid::tubs(
        millimeter!(rmin),
        millimeter!(rmax),
        millimeter!(z),
        radian!(0.0),
        radian!(angle),
    )
}

/// SiPM covering the module end, facing along the barrel axis.
fn axial_sipm(instr: &InstrumentationData, reg: &mut Registry, layout: &BarrelLayout) -> GeomResult<LvId> {
    let key = CacheKey::new("sipm")
        .value(layout.radius)
        .count(layout.n_modules);
    reg.cached_volume(key, |reg| {
        let r = layout.centre_radius();
        let silicon = instr.material(reg, MaterialKind::MetalSilicon)?;
        let lv = reg.add_volume(
            &format!("sipm{}", layout.suffix()),
            segment_tubs(
                r - SIPM_DIM / 2.0,
                r + SIPM_DIM / 2.0,
                SIPM_HEIGHT,
                layout.segment_angle(),
            )?,
            &silicon,
        )?;
        reg.set_color(lv, VisColor::Rgba([0.6, 0.6, 0.6, 1.0]));
        Ok(lv)
    })
}

/// Copper cup around an axial SiPM, open towards the fibers.
fn axial_wrap(
    instr: &InstrumentationData,
    reg: &mut Registry,
    layout: &BarrelLayout,
    top: bool,
) -> GeomResult<LvId> {
    let end = if top { "top" } else { "bottom" };
    let key = CacheKey::new("sipm_wrap")
        .value(layout.radius)
        .count(layout.n_modules)
        .flag(end);
    reg.cached_volume(key, |reg| {
        let name = format!("sipm_outer_{end}{}", layout.suffix());
        let r = layout.centre_radius();
        let angle = layout.segment_angle();
        let outer = reg.add_solid(
            &format!("{name}_outer1"),
            segment_tubs(
                r - SIPM_DIM / 2.0 - SIPM_OUTER_EXTRA,
                r + SIPM_DIM / 2.0 + SIPM_OUTER_EXTRA,
                SIPM_HEIGHT + SIPM_OUTER_EXTRA + SIPM_OVERLAP,
                angle,
            )?,
        )?;
        let hole = reg.add_solid(
            &format!("{name}_outer2"),
            segment_tubs(
                r - SIPM_DIM / 2.0,
                r + SIPM_DIM / 2.0,
                SIPM_HEIGHT + 2.0 * SIPM_GAP + SIPM_OVERLAP,
                angle,
            )?,
        )?;
        let shift = if top { -SIPM_OUTER_EXTRA / 2.0 } else { SIPM_OUTER_EXTRA / 2.0 };
        let wrap = reg.add_solid(
            &name,
            Solid::subtraction(outer, hole, Isometry::new_along_z(millimeter!(shift))?),
        )?;
        let copper = instr.material(reg, MaterialKind::MetalCopper)?;
        let lv = reg.add_logical_volume(&name, wrap, &copper)?;
        reg.set_color(lv, COPPER);
        Ok(lv)
    })
}

/// Radial extent of the SiPM at the inner end of bent fibers.
fn radial_sipm_range(layout: &BarrelLayout, bend: &Bend) -> (f64, f64) {
    let fiber_end = layout.centre_radius() - bend.radius - bend.inner_straight;
    (fiber_end - SIPM_GAP - SIPM_HEIGHT, fiber_end - SIPM_GAP)
}

/// SiPM at the inner end of bent fibers, facing outwards. It covers both rows of fiber ends.
fn radial_sipm(
    instr: &InstrumentationData,
    reg: &mut Registry,
    layout: &BarrelLayout,
    bend: &Bend,
) -> GeomResult<LvId> {
    let key = CacheKey::new("sipm_bent")
        .value(layout.radius)
        .count(layout.n_modules);
    reg.cached_volume(key, |reg| {
        let (rmin, rmax) = radial_sipm_range(layout, bend);
        let silicon = instr.material(reg, MaterialKind::MetalSilicon)?;
        let lv = reg.add_volume(
            &format!("sipm_bent{}", layout.suffix()),
            segment_tubs(rmin, rmax, SIPM_DIM + bend.stagger, layout.segment_angle())?,
            &silicon,
        )?;
        reg.set_color(lv, VisColor::Rgba([0.6, 0.6, 0.6, 1.0]));
        Ok(lv)
    })
}

fn radial_wrap(
    instr: &InstrumentationData,
    reg: &mut Registry,
    layout: &BarrelLayout,
    bend: &Bend,
) -> GeomResult<LvId> {
    let key = CacheKey::new("sipm_wrap_bent")
        .value(layout.radius)
        .count(layout.n_modules);
    reg.cached_volume(key, |reg| {
        let name = format!("sipm_outer_bent{}", layout.suffix());
        let (rmin, rmax) = radial_sipm_range(layout, bend);
        let height = SIPM_DIM + bend.stagger + 2.0 * SIPM_GAP;
        let angle = layout.segment_angle();
        let outer = reg.add_solid(
            &format!("{name}_outer1"),
            segment_tubs(
                rmin - SIPM_GAP - SIPM_OUTER_EXTRA,
                rmax + SIPM_GAP + SIPM_OVERLAP,
                height + 2.0 * SIPM_OUTER_EXTRA,
                angle,
            )?,
        )?;
        let hole = reg.add_solid(
            &format!("{name}_outer2"),
            segment_tubs(
                rmin - SIPM_GAP,
                rmax + 2.0 * SIPM_GAP + SIPM_OVERLAP,
                height,
                angle,
            )?,
        )?;
        let wrap = reg.add_solid(&name, Solid::subtraction(outer, hole, Isometry::identity()))?;
        let copper = instr.material(reg, MaterialKind::MetalCopper)?;
        let lv = reg.add_logical_volume(&name, wrap, &copper)?;
        reg.set_color(lv, COPPER);
        Ok(lv)
    })
}

fn place_sipm(
    instr: &InstrumentationData,
    reg: &mut Registry,
    channel: &SipmChannel,
    (sipm, wrap): (LvId, LvId),
    (z_sipm, z_wrap): (f64, f64),
    rotation: f64,
) -> GeomResult<()> {
    let pv = reg.place(
        &channel.name,
        sipm,
        instr.mother_lv,
        Isometry::new(millimeter!(0.0, 0.0, z_sipm), radian!(0.0, 0.0, rotation))?,
    )?;
    reg.tag_detector(pv, DetectorInfo::new(DetectorKind::Optical, channel.rawid, None))?;
    let surface = instr.surface(reg, SurfaceKind::ToSipmSilicon)?;
    reg.add_border_surface(
        &format!("bsurface_lar_{}", channel.name),
        &surface,
        instr.mother_pv,
        pv,
    )?;
    reg.place(
        &format!("{}_wrap", channel.name),
        wrap,
        instr.mother_lv,
        Isometry::new(millimeter!(0.0, 0.0, z_wrap), radian!(0.0, 0.0, rotation))?,
    )?;
    Ok(())
}

/// SiPMs and wraps at both ends of a module.
fn place_sipms(
    instr: &InstrumentationData,
    reg: &mut Registry,
    layout: &BarrelLayout,
    module: &FiberModule,
    index: usize,
) -> GeomResult<()> {
    let rotation = layout.start_angle(index);
    let top_end = layout.top_z;
    let volumes = (
        axial_sipm(instr, reg, layout)?,
        axial_wrap(instr, reg, layout, true)?,
    );
    place_sipm(
        instr,
        reg,
        module.top,
        volumes,
        (
            top_end + SIPM_GAP + SIPM_HEIGHT / 2.0,
            top_end + SIPM_HEIGHT / 2.0 + SIPM_OUTER_EXTRA / 2.0 - SIPM_OVERLAP / 2.0,
        ),
        rotation,
    )?;
    match &layout.bend {
        None => {
            let bottom_end = top_end - layout.fiber_length;
            let volumes = (
                axial_sipm(instr, reg, layout)?,
                axial_wrap(instr, reg, layout, false)?,
            );
            place_sipm(
                instr,
                reg,
                module.bottom,
                volumes,
                (
                    bottom_end - SIPM_GAP - SIPM_HEIGHT / 2.0,
                    bottom_end - SIPM_HEIGHT / 2.0 - SIPM_OUTER_EXTRA / 2.0 + SIPM_OVERLAP / 2.0,
                ),
                rotation,
            )
        }
        Some(bend) => {
            let z = layout.bend_start_z() - bend.radius - bend.stagger / 2.0;
            let volumes = (
                radial_sipm(instr, reg, layout, bend)?,
                radial_wrap(instr, reg, layout, bend)?,
            );
            place_sipm(instr, reg, module.bottom, volumes, (z, z), rotation)
        }
    }
}
