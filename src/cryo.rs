//! The cryostat and its liquid argon fill.
//!
//! Dimensions follow T. Knöpfle and B. Schwingenheuer, JINST 17 P02038 (2022).
//! Both solids are unions of a central tube, the two end caps and the access neck. The origin of
//! both volumes is the centre of the central tube section.
use std::f64::consts::PI;

use uom::si::f64::Length;

use crate::{
    det_utils::{DetectorInfo, DetectorKind},
    error::GeomResult,
    geometry::{LvId, PvId, Registry, Solid, SolidId},
    materials::{MaterialKind, MaterialRegistry},
    millimeter, radian,
    utils::Isometry,
    vis_utils::{VisColor, ARGON},
};

const CRYO_RADIUS: f64 = 3976.0 / 2.0;
pub(crate) const CRYO_WALL: f64 = 12.0;
pub(crate) const CRYO_TUB_HEIGHT: f64 = 3900.0;
pub(crate) const CRYO_TOP_HEIGHT: f64 = 826.0;
pub(crate) const CRYO_BOTTOM_HEIGHT: f64 = 829.0;

pub(crate) const CRYO_ACCESS_RADIUS: f64 = 800.0 / 2.0;
pub(crate) const CRYO_ACCESS_WALL: f64 = 10.0;
pub(crate) const CRYO_ACCESS_HEIGHT: f64 = 1720.0;
pub(crate) const ACCESS_OVERLAP: f64 = 200.0;

/// Distance of the array top plate below the neck reference height.
const TOP_PLATE_BELOW_NECK: f64 = 806.0;

/// Outer radius of the cryostat wall.
pub const CRYO_OUTER_RADIUS: f64 = CRYO_RADIUS + CRYO_WALL;

/// The constructed (not yet placed) cryostat.
#[derive(Debug, Clone, Copy)]
pub struct Cryostat {
    /// steel cryostat
    pub cryostat_lv: LvId,
    /// argon fill
    pub lar_lv: LvId,
    /// height of the neck reference point, i.e. 20 mm below the virtual apex of the top cap
    pub neck_height: Length,
}
impl Cryostat {
    /// z position of the top face of the array top plate in the argon frame.
    #[must_use]
    pub fn top_plate_z(&self) -> Length {
        self.neck_height - millimeter!(TOP_PLATE_BELOW_NECK)
    }
}

fn tube(rmax: f64, z: f64) -> GeomResult<Solid> {
    Solid::cylinder(millimeter!(0.0), millimeter!(rmax), millimeter!(z))
}
fn flipped_at(z: f64) -> GeomResult<Isometry> {
    Isometry::new(millimeter!(0.0, 0.0, z), radian!(0.0, PI, 0.0))
}

fn build_cryostat_solid(reg: &mut Registry) -> GeomResult<SolidId> {
    let tub = reg.add_solid("cryo_tub", tube(CRYO_OUTER_RADIUS, CRYO_TUB_HEIGHT)?)?;
    let top = reg.add_solid(
        "cryo_top",
        tube(CRYO_OUTER_RADIUS, 2.0 * CRYO_TOP_HEIGHT + 2.0 * CRYO_WALL)?,
    )?;
    let bottom = reg.add_solid(
        "cryo_bottom",
        tube(CRYO_OUTER_RADIUS, 2.0 * CRYO_BOTTOM_HEIGHT + 2.0 * CRYO_WALL)?,
    )?;
    let access = reg.add_solid(
        "cryo_access_tub",
        tube(
            CRYO_ACCESS_RADIUS + CRYO_ACCESS_WALL,
            CRYO_ACCESS_HEIGHT + ACCESS_OVERLAP,
        )?,
    )?;
    let cryo1 = reg.add_solid(
        "cryo1",
        Solid::union(
            tub,
            top,
            Isometry::new_along_z(millimeter!(CRYO_TUB_HEIGHT / 2.0))?,
        ),
    )?;
    let cryo2 = reg.add_solid(
        "cryo2",
        Solid::union(cryo1, bottom, flipped_at(-CRYO_TUB_HEIGHT / 2.0)?),
    )?;
    // the neck is anchored at the apex of the top cap
    reg.add_solid(
        "cryostat",
        Solid::union(
            cryo2,
            access,
            flipped_at(CRYO_TUB_HEIGHT / 2.0 + CRYO_TOP_HEIGHT + CRYO_ACCESS_HEIGHT / 2.0)?,
        ),
    )
}

fn build_argon_solid(reg: &mut Registry) -> GeomResult<SolidId> {
    let lar_access_height = CRYO_ACCESS_HEIGHT - 800.0;
    let tub = reg.add_solid("lar_tub", tube(CRYO_RADIUS, CRYO_TUB_HEIGHT)?)?;
    let top = reg.add_solid(
        "lar_top",
        Solid::ellipsoid(
            millimeter!(CRYO_RADIUS),
            millimeter!(CRYO_RADIUS),
            millimeter!(CRYO_TOP_HEIGHT),
            millimeter!(0.0),
            millimeter!(CRYO_TOP_HEIGHT),
        )?,
    )?;
    let bottom = reg.add_solid(
        "lar_bottom",
        Solid::ellipsoid(
            millimeter!(CRYO_RADIUS),
            millimeter!(CRYO_RADIUS),
            millimeter!(CRYO_BOTTOM_HEIGHT),
            millimeter!(0.0),
            millimeter!(CRYO_BOTTOM_HEIGHT),
        )?,
    )?;
    let access = reg.add_solid(
        "lar_access",
        tube(CRYO_ACCESS_RADIUS, lar_access_height + ACCESS_OVERLAP)?,
    )?;
    let lar1 = reg.add_solid(
        "lar1",
        Solid::union(
            tub,
            top,
            Isometry::new_along_z(millimeter!(CRYO_TUB_HEIGHT / 2.0))?,
        ),
    )?;
    let lar2 = reg.add_solid(
        "lar2",
        Solid::union(lar1, bottom, flipped_at(-CRYO_TUB_HEIGHT / 2.0)?),
    )?;
    reg.add_solid(
        "lar",
        Solid::union(
            lar2,
            access,
            flipped_at(CRYO_TUB_HEIGHT / 2.0 + CRYO_TOP_HEIGHT + lar_access_height / 2.0)?,
        ),
    )
}

/// Construct the steel cryostat and the argon volume.
/// # Errors
/// This function returns an error if the volumes cannot be registered.
pub fn build_cryostat(reg: &mut Registry, materials: &MaterialRegistry) -> GeomResult<Cryostat> {
    let steel = materials.get_material(reg, MaterialKind::MetalSteel)?;
    let cryo_solid = build_cryostat_solid(reg)?;
    let cryostat_lv = reg.add_logical_volume("cryostat", cryo_solid, &steel)?;
    reg.set_color(cryostat_lv, VisColor::Invisible);

    let argon = materials.get_material(reg, MaterialKind::LiquidArgon)?;
    let lar_solid = build_argon_solid(reg)?;
    let lar_lv = reg.add_logical_volume("lar", lar_solid, &argon)?;
    reg.set_color(lar_lv, ARGON);
    Ok(Cryostat {
        cryostat_lv,
        lar_lv,
        neck_height: millimeter!(CRYO_TUB_HEIGHT / 2.0 + CRYO_TOP_HEIGHT - 20.0),
    })
}

/// Place the cryostat at `z` inside `mother` and fill it with argon.
///
/// The argon is tagged as scintillator with detector id 0. Returns the argon placement.
/// # Errors
/// This function returns an error if the placements cannot be registered.
pub fn place_cryostat(
    reg: &mut Registry,
    cryostat: &Cryostat,
    mother: LvId,
    z: Length,
) -> GeomResult<PvId> {
    reg.place(
        "cryostat",
        cryostat.cryostat_lv,
        mother,
        Isometry::new_along_z(z)?,
    )?;
    let lar_pv = reg.place(
        "lar",
        cryostat.lar_lv,
        cryostat.cryostat_lv,
        Isometry::identity(),
    )?;
    reg.tag_detector(lar_pv, DetectorInfo::new(DetectorKind::Scintillator, 0, None))?;
    Ok(lar_pv)
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use uom::si::length::millimeter;
    fn built() -> (Registry, Cryostat, PvId) {
        let mut reg = Registry::new();
        let mats = MaterialRegistry::default();
        let world_mat = mats.get_material(&mut reg, MaterialKind::Galactic).unwrap();
        let world = reg
            .add_volume(
                "world",
                Solid::cuboid(millimeter!(1e4), millimeter!(1e4), millimeter!(1e4)).unwrap(),
                &world_mat,
            )
            .unwrap();
        reg.set_world(world).unwrap();
        let cryo = build_cryostat(&mut reg, &mats).unwrap();
        let lar_pv = place_cryostat(&mut reg, &cryo, world, millimeter!(-153.0)).unwrap();
        (reg, cryo, lar_pv)
    }
    #[test]
    fn reference_heights() {
        let (_, cryo, _) = built();
        assert_abs_diff_eq!(cryo.neck_height.get::<millimeter>(), 2756.0, epsilon = 1e-9);
        assert_abs_diff_eq!(cryo.top_plate_z().get::<millimeter>(), 1950.0, epsilon = 1e-9);
    }
    #[test]
    fn solids() {
        let (reg, cryo, _) = built();
        let lar = reg.logical_volume(cryo.lar_lv).unwrap();
        assert_eq!(lar.material(), "liquid_argon");
        let Some(Solid::Union { transform, .. }) = reg.solid(lar.solid()) else {
            panic!("argon is not a union");
        };
        assert_abs_diff_eq!(transform.translation_mm().z, 1950.0 + 826.0 + 460.0, epsilon = 1e-9);
        assert!(transform.has_rotation());
        assert!(reg.solid_by_name("cryo_access_tub").is_some());
        assert_eq!(reg.color(cryo.cryostat_lv), Some(&VisColor::Invisible));
    }
    #[test]
    fn argon_tag() {
        let (reg, _, lar_pv) = built();
        let det = reg.detector(lar_pv).unwrap();
        assert_eq!(det.kind, DetectorKind::Scintillator);
        assert_eq!(det.uid, 0);
        let cryo_pv = reg.pv_by_name("cryostat").unwrap();
        assert_abs_diff_eq!(
            reg.physical_volume(cryo_pv).unwrap().placement().translation_mm().z,
            -153.0,
            epsilon = 1e-9
        );
    }
}
