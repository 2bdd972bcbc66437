//! Detailed fiber model: every fiber is placed on its own.
//!
//! Straight fibers are square boxes. The bend of the outer barrel fibers is a quarter torus
//! followed by a short radial box. Neighbouring fibers would touch inside the bend, so every
//! second fiber has a longer vertical part and bends one stagger distance lower.
use std::f64::consts::{FRAC_PI_2, PI};

use super::{coated_fiber, BarrelLayout, FiberModel, FiberModule};
use crate::{
    core::InstrumentationData,
    error::GeomResult,
    geometry::{CacheKey, Registry, Solid},
    millimeter, radian,
    utils::{usize_to_f64, Isometry},
};

/// Every fiber of a module as a separate volume.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleFiberModel;

/// Angular position of fiber `n` of module `index`.
#[must_use]
pub fn fiber_angle(layout: &BarrelLayout, index: usize, n: usize) -> f64 {
    layout.start_angle(index)
        + layout.segment_angle() / usize_to_f64(layout.fibers_per_module) * (usize_to_f64(n) + 0.5)
}

/// Extra length of the vertical part of fiber `n`.
#[must_use]
pub fn stagger_offset(layout: &BarrelLayout, n: usize) -> f64 {
    match layout.bend {
        Some(bend) if n % 2 == 1 => bend.stagger,
        _ => 0.0,
    }
}

fn box_solid(x: f64, y: f64, z: f64) -> GeomResult<Solid> {
    Solid::cuboid(millimeter!(x), millimeter!(y), millimeter!(z))
}

impl FiberModel for SingleFiberModel {
    fn place_fibers(
        &self,
        instr: &InstrumentationData,
        reg: &mut Registry,
        layout: &BarrelLayout,
        module: &FiberModule,
        index: usize,
    ) -> GeomResult<()> {
        let r = layout.centre_radius();
        let tpb = module.tpb_thickness_nm;
        for n in 0..layout.fibers_per_module {
            let th = fiber_angle(layout, index, n);
            let (sin, cos) = th.sin_cos();
            let delta = stagger_offset(layout, n);
            let length = layout.straight_length() + delta;
            let straight = coated_fiber(
                instr,
                reg,
                &format!("_l{length}"),
                CacheKey::new("fiber_single").value(length),
                tpb,
                |w| box_solid(w, w, length),
            )?;
            reg.place(
                &format!("fiber_{}_{n}", module.name),
                straight,
                instr.mother_lv,
                Isometry::new(
                    millimeter!(r * cos, r * sin, layout.top_z - length / 2.0),
                    radian!(0.0, 0.0, th),
                )?,
            )?;

            let Some(bend) = layout.bend else {
                continue;
            };
            let bend_radius = bend.radius;
            let torus = coated_fiber(
                instr,
                reg,
                &format!("_bend{bend_radius}"),
                CacheKey::new("fiber_single_bend").value(bend_radius),
                tpb,
                |w| {
                    Solid::torus(
                        millimeter!(0.0),
                        millimeter!(w / 2.0),
                        millimeter!(bend_radius),
                        radian!(1.5 * PI),
                        radian!(FRAC_PI_2),
                    )
                },
            )?;
            let z_bend = layout.bend_start_z() - delta;
            let r_centre = r - bend_radius;
            // the torus plane is turned into the vertical plane through the fiber
            reg.place(
                &format!("fiber_{}_{n}_bend", module.name),
                torus,
                instr.mother_lv,
                Isometry::new(
                    millimeter!(r_centre * cos, r_centre * sin, z_bend),
                    radian!(FRAC_PI_2, 0.0, th),
                )?,
            )?;
            let inner_length = bend.inner_straight;
            let inner = coated_fiber(
                instr,
                reg,
                &format!("_inner_l{inner_length}"),
                CacheKey::new("fiber_single_inner").value(inner_length),
                tpb,
                |w| box_solid(inner_length, w, w),
            )?;
            let r_inner = r_centre - inner_length / 2.0;
            reg.place(
                &format!("fiber_{}_{n}_inner", module.name),
                inner,
                instr.mother_lv,
                Isometry::new(
                    millimeter!(r_inner * cos, r_inner * sin, z_bend - bend_radius),
                    radian!(0.0, 0.0, th),
                )?,
            )?;
        }
        Ok(())
    }
}
