//! The copper top plate of the germanium array.
//!
//! The plate is built from primitives: a copper disk with one hole per calibration tube.
use crate::{
    core::InstrumentationData,
    degree,
    error::GeomResult,
    geometry::{PvId, Registry, Solid},
    materials::MaterialKind,
    millimeter,
    utils::{polar_to_xy, AngleSense, Isometry},
    vis_utils::VisColor,
};

/// Thickness of the top plate.
pub const TOP_PLATE_THICKNESS: f64 = 3.0;
const TOP_PLATE_RADIUS: f64 = 310.0;

/// Construct the top plate and place it on top of `top_plate_z`.
/// # Errors
/// This function returns an error if the volumes cannot be registered.
pub fn place_top_plate(instr: &InstrumentationData, reg: &mut Registry) -> GeomResult<PvId> {
    let mut solid = reg.add_solid(
        "top_plate_disk",
        Solid::cylinder(
            millimeter!(0.0),
            millimeter!(TOP_PLATE_RADIUS),
            millimeter!(TOP_PLATE_THICKNESS),
        )?,
    )?;
    for (id, tube) in &instr.metadata.special.calibration {
        let hole = reg.add_solid(
            &format!("top_plate_hole_{id}"),
            Solid::cylinder(
                millimeter!(0.0),
                millimeter!(tube.tube_radius_in_mm),
                millimeter!(TOP_PLATE_THICKNESS + 2.0),
            )?,
        )?;
        let (x, y) = polar_to_xy(
            millimeter!(tube.radius_in_mm),
            degree!(tube.angle_in_deg),
            AngleSense::Clockwise,
        );
        solid = reg.add_solid(
            &format!("top_plate_{id}"),
            Solid::subtraction(
                solid,
                hole,
                Isometry::new_translation(millimeter!(x, y, 0.0))?,
            ),
        )?;
    }
    let copper = instr.material(reg, MaterialKind::MetalCopper)?;
    let lv = reg.add_logical_volume("top_plate", solid, &copper)?;
    reg.set_color(lv, VisColor::Rgba([0.72, 0.45, 0.2, 0.2]));
    reg.place(
        "top_plate",
        lv,
        instr.mother_lv,
        Isometry::new_along_z(millimeter!(
            instr.top_plate_z_mm() + TOP_PLATE_THICKNESS / 2.0
        ))?,
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utils::test_helper::test_helper::TestContext;
    use approx::assert_abs_diff_eq;
    #[test]
    fn plate() {
        let mut ctx = TestContext::new();
        let (reg, instr) = ctx.split();
        let pv = place_top_plate(&instr, reg).unwrap();
        let placement = reg.physical_volume(pv).unwrap().placement();
        assert_abs_diff_eq!(placement.translation_mm().z, 1951.5, epsilon = 1e-9);
        let lv = reg.lv_by_name("top_plate").unwrap();
        assert_eq!(reg.logical_volume(lv).unwrap().material(), "metal_copper");
        let Some(Solid::Subtraction { transform, .. }) =
            reg.solid(reg.logical_volume(lv).unwrap().solid())
        else {
            panic!("top plate has no holes");
        };
        // last hole: tube 4 at 81.43 deg, clockwise
        let t = transform.translation_mm();
        assert_abs_diff_eq!(t.x, 155.0 * 81.43_f64.to_radians().cos(), epsilon = 1e-9);
        assert_abs_diff_eq!(t.y, -155.0 * 81.43_f64.to_radians().sin(), epsilon = 1e-9);
    }
}
