//! Coarse fiber model: all fibers of a module merged into one tube segment.
//!
//! The bent end of the outer barrel is a generic polycone band following the bend of the fiber
//! centre line, halfway between the two rows of staggered fiber ends.
use std::f64::consts::FRAC_PI_2;

use super::{coated_fiber, segment_tubs, BarrelLayout, Bend, FiberModel, FiberModule};
use crate::{
    core::InstrumentationData,
    error::GeomResult,
    geometry::{CacheKey, Registry, Solid},
    millimeter, radian,
    utils::{usize_to_f64, Isometry},
};

/// Points per quarter circle of the bent band.
const BEND_STEPS: usize = 16;

/// Merged fibers, one segment per module.
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentModel;

/// (r, z) outline of the bent band with half width `half_width` around the fiber centre line.
///
/// z is relative to the start of the bend. The outline runs down the outer arc, along the inner
/// straight part and back up the inner arc.
#[must_use]
pub fn bend_outline(bend_centre_radius: f64, bend: &Bend, half_width: f64) -> Vec<(f64, f64)> {
    let arc = |radius: f64, step: usize| {
        let phi = FRAC_PI_2 * usize_to_f64(step) / usize_to_f64(BEND_STEPS);
        (
            bend_centre_radius + radius * phi.cos(),
            -radius * phi.sin(),
        )
    };
    let end = bend_centre_radius - bend.inner_straight;
    let mut points: Vec<(f64, f64)> = (0..=BEND_STEPS)
        .map(|s| arc(bend.radius + half_width, s))
        .collect();
    points.push((end, -bend.radius - half_width));
    points.push((end, -bend.radius + half_width));
    points.extend(
        (0..=BEND_STEPS)
            .rev()
            .map(|s| arc(bend.radius - half_width, s)),
    );
    points
}

impl FiberModel for SegmentModel {
    fn place_fibers(
        &self,
        instr: &InstrumentationData,
        reg: &mut Registry,
        layout: &BarrelLayout,
        module: &FiberModule,
        index: usize,
    ) -> GeomResult<()> {
        let angle = layout.segment_angle();
        let r = layout.centre_radius();
        let rotation = layout.start_angle(index);
        let half_stagger = layout.bend.map_or(0.0, |b| b.stagger / 2.0);
        let length = layout.straight_length() + half_stagger;

        let suffix = format!("_r{}_l{length}_nmod{}", layout.radius, layout.n_modules);
        let key = CacheKey::new("fiber_segment")
            .value(layout.radius)
            .value(length)
            .count(layout.n_modules);
        let straight = coated_fiber(
            instr,
            reg,
            &suffix,
            key,
            module.tpb_thickness_nm,
            |w| segment_tubs(r - w / 2.0, r + w / 2.0, length, angle),
        )?;
        reg.place(
            &format!("fiber_{}_s", module.name),
            straight,
            instr.mother_lv,
            Isometry::new(
                millimeter!(0.0, 0.0, layout.top_z - length / 2.0),
                radian!(0.0, 0.0, rotation),
            )?,
        )?;

        let Some(bend) = layout.bend else {
            return Ok(());
        };
        let suffix = format!("_bend_r{}_nmod{}", layout.radius, layout.n_modules);
        let key = CacheKey::new("fiber_segment_bend")
            .value(layout.radius)
            .count(layout.n_modules);
        let bent = coated_fiber(
            instr,
            reg,
            &suffix,
            key,
            module.tpb_thickness_nm,
            |w| {
                let rz = bend_outline(r - bend.radius, &bend, w / 2.0)
                    .into_iter()
                    .map(|(r, z)| (millimeter!(r), millimeter!(z)))
                    .collect();
                Solid::generic_polycone(radian!(0.0), radian!(angle), rz)
            },
        )?;
        reg.place(
            &format!("fiber_{}_s_bend", module.name),
            bent,
            instr.mother_lv,
            Isometry::new(
                millimeter!(0.0, 0.0, layout.bend_start_z() - half_stagger),
                radian!(0.0, 0.0, rotation),
            )?,
        )?;
        Ok(())
    }
}
