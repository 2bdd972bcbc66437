//! Water tank of the Cherenkov muon veto.
//!
//! The steel tank is filled with water, has an air buffer below its lid and a steel pillbox
//! carrying the cryostat. All surfaces facing the water are lined with VM2000 reflector foil.
//! The PMTs sit in rings on the floor, on the tank wall and on the pillbox; the cryostat is
//! placed into the water volume by the caller at [`cryostat_displacement`].
use std::f64::consts::{FRAC_PI_2, PI, TAU};

use log::{debug, info};
use nalgebra::{Rotation3, Vector3};
use uom::si::f64::Length;

use crate::{
    config::PmtConfiguration,
    cryo::{
        ACCESS_OVERLAP, CRYO_ACCESS_HEIGHT, CRYO_ACCESS_RADIUS, CRYO_ACCESS_WALL,
        CRYO_BOTTOM_HEIGHT, CRYO_OUTER_RADIUS, CRYO_TOP_HEIGHT, CRYO_TUB_HEIGHT, CRYO_WALL,
    },
    det_utils::{DetectorInfo, DetectorKind},
    error::{GeomError, GeomResult},
    geometry::{LvId, PvId, Registry, Solid, SolidId},
    materials::{MaterialKind, MaterialRegistry, SurfaceKind},
    millimeter, radian,
    utils::{usize_to_f64, Isometry},
    vis_utils::VisColor,
};

/// Channel ids of the working PMTs, in placement order.
pub const PMT_IDS: [&str; 53] = [
    "ch29_312", "ch18_301", "ch16_701", "ch19_302", "ch20_303", "ch21_304", "ch22_305",
    "ch23_306", "ch17_703", "ch24_307", "ch25_308", "ch26_309", "ch27_310", "ch28_311",
    "ch15_208", "ch10_201", "ch11_202", "ch12_203", "ch13_706", "ch14_206", "ch01_704",
    "ch03_705", "ch06_709", "ch08_710", "ch30_401", "ch31_402", "ch32_403", "ch33_404",
    "ch34_409", "ch35_410", "ch43_510", "ch36_501", "ch37_502", "ch38_503", "ch39_504",
    "ch40_507", "ch41_508", "ch42_509", "ch44_602", "ch45_603", "ch46_605", "ch47_606",
    "ch48_607", "ch49_608", "ch50_609", "ch51_610", "ch52_702", "ch00_101", "ch02_102",
    "ch04_708", "ch05_104", "ch07_105", "ch09_707",
];

const TANK_WALL: f64 = 7.0;
const TANK_INNER_HEIGHT: f64 = 8900.0;
const WATER_RADIUS: f64 = 5000.0;
const WATER_HEIGHT: f64 = TANK_INNER_HEIGHT - 2.0 * TANK_WALL;
const FOIL: f64 = 0.04;
const AIR_BUFFER_HEIGHT: f64 = 486.0;

const PILLBOX_OUTER_RADIUS: f64 = 2000.0;
const PILLBOX_WALL: f64 = 1.2;
const PILLBOX_INNER_RADIUS: f64 = PILLBOX_OUTER_RADIUS - PILLBOX_WALL;
const MANHOLE_RADIUS: f64 = 400.0;

const CATHODE_INNER_RADIUS: f64 = 100.0;
const CATHODE_OUTER_RADIUS: f64 = 100.16;
/// Polar opening angle of the photocathode dome.
const CATHODE_THETA: f64 = 80.0 / 180.0 * PI;
const PMT_OUTER_RADIUS: f64 = 101.0;
const GLASS_THICKNESS: f64 = 1.0;
const CONE_WALL: f64 = 4.0;
const CONE_HEIGHT: f64 = 150.0;
const PMT_BASE_HEIGHT: f64 = 30.0;

/// Vertical offset of the cryostat centre inside the water volume.
#[must_use]
pub fn cryostat_displacement() -> Length {
    millimeter!(cryostat_z())
}

fn cryostat_z() -> f64 {
    WATER_HEIGHT / 2.0
        - CRYO_ACCESS_HEIGHT
        - (CRYO_TUB_HEIGHT / 2.0 + CRYO_TOP_HEIGHT)
        - ACCESS_OVERLAP / 2.0
}

/// Height of the pillbox, from the tank floor up to the flat bottom of the cryostat solid.
fn pillbox_height() -> f64 {
    WATER_HEIGHT / 2.0 + cryostat_z() - CRYO_TUB_HEIGHT / 2.0 - (CRYO_BOTTOM_HEIGHT + CRYO_WALL)
}

/// Height of the plane of the cathode dome rim above the sphere centre.
fn cathode_rim_offset() -> f64 {
    CATHODE_OUTER_RADIUS * CATHODE_THETA.cos()
}

/// Radial gap between a flat PMT base of `base_radius` and a curved wall of radius `wall`.
fn base_gap(wall: f64, base_radius: f64) -> f64 {
    wall - (wall * wall - base_radius * base_radius).sqrt()
}

/// How a PMT ring is mounted.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Mount {
    /// standing on the floor, looking up
    Floor,
    /// on a vertical wall at height `z`, looking towards the axis
    Wall(f64),
}

/// One ring of PMT slots.
#[derive(Debug, Clone, PartialEq)]
struct PmtRing {
    slots: usize,
    /// distance of the PMT axis from the tank axis (floor) or of the cathode rim plane (wall)
    radius: f64,
    mount: Mount,
    /// slots are shifted by half a slot width
    half_shift: bool,
    /// slots without PMT
    empty: &'static [usize],
    /// slots with a PMT that was already broken in GERDA
    broken: &'static [usize],
}
impl PmtRing {
    fn angle(&self, k: usize) -> f64 {
        let shift = if self.half_shift { 0.5 } else { 0.0 };
        TAU / usize_to_f64(self.slots) * (usize_to_f64(k) + shift)
    }
}

fn pmt_rings() -> Vec<PmtRing> {
    let cone_base = PMT_OUTER_RADIUS / 3.0 + CONE_WALL;
    let tank_wall = WATER_RADIUS - FOIL;
    let pillbox_wall = PILLBOX_INNER_RADIUS - FOIL;
    let tank_wall_radius =
        tank_wall - base_gap(tank_wall, cone_base) - CONE_HEIGHT - PMT_BASE_HEIGHT;
    let pillbox_wall_radius =
        pillbox_wall - base_gap(pillbox_wall, cone_base) - CONE_HEIGHT - PMT_BASE_HEIGHT;
    let floor = |slots, radius, empty, broken| PmtRing {
        slots,
        radius,
        mount: Mount::Floor,
        half_shift: false,
        empty,
        broken,
    };
    let wall = |radius, z, half_shift, empty, broken| PmtRing {
        slots: if radius > PILLBOX_OUTER_RADIUS { 10 } else { 6 },
        radius,
        mount: Mount::Wall(z),
        half_shift,
        empty,
        broken,
    };
    vec![
        floor(24, 4250.0, &[3, 5, 7, 9, 11, 15, 17, 19, 21, 23], &[]),
        floor(8, 2750.0, &[], &[4, 7]),
        floor(
            6,
            PILLBOX_INNER_RADIUS
                - CONE_HEIGHT
                - cathode_rim_offset()
                - PMT_BASE_HEIGHT
                - FOIL,
            &[0, 3],
            &[],
        ),
        wall(tank_wall_radius, -2450.0, true, &[], &[4, 5, 6, 7]),
        wall(tank_wall_radius, -950.0, false, &[], &[4, 5]),
        wall(tank_wall_radius, 550.0, true, &[], &[0, 3]),
        wall(tank_wall_radius, 2050.0, false, &[0, 2, 3, 4, 5, 6, 7, 8, 9], &[]),
        wall(pillbox_wall_radius, -WATER_HEIGHT / 2.0 + 600.0, true, &[], &[]),
    ]
}

/// Build the water tank with its PMTs into `world`.
///
/// Returns the water volume the cryostat has to be placed into.
/// # Errors
/// This function returns an error if a volume or surface cannot be registered.
pub fn place_water_tank(
    reg: &mut Registry,
    materials: &MaterialRegistry,
    world: LvId,
    pmt_config: PmtConfiguration,
) -> GeomResult<LvId> {
    info!("building the water tank with the {pmt_config} PMT layout");
    let steel = materials.get_material(reg, MaterialKind::StainlessSteel)?;
    let tank = reg.add_volume(
        "water_tank",
        tubs(0.0, WATER_RADIUS + TANK_WALL, TANK_INNER_HEIGHT)?,
        &steel,
    )?;
    reg.place("water_tank", tank, world, Isometry::identity())?;

    let water_material = materials.get_material(reg, MaterialKind::Water)?;
    let water = reg.add_volume("water", tubs(0.0, WATER_RADIUS, WATER_HEIGHT)?, &water_material)?;
    reg.set_color(water, VisColor::Rgba([0.0, 0.0, 1.0, 0.08]));
    let water_pv = reg.place("water_pv", water, tank, Isometry::identity())?;

    let air = materials.get_material(reg, MaterialKind::Air)?;
    let air_buffer = reg.add_volume(
        "air_buffer",
        tubs(
            CRYO_ACCESS_RADIUS + CRYO_ACCESS_WALL,
            WATER_RADIUS - FOIL,
            AIR_BUFFER_HEIGHT,
        )?,
        &air,
    )?;
    reg.place(
        "air_buffer",
        air_buffer,
        water,
        Isometry::new_along_z(millimeter!((WATER_HEIGHT - AIR_BUFFER_HEIGHT) / 2.0))?,
    )?;

    let manhole = manhole_solid(reg)?;
    let pillbox = pierced_tube(reg, "pillbox", PILLBOX_INNER_RADIUS, PILLBOX_OUTER_RADIUS, pillbox_height(), manhole)?;
    let pillbox = reg.add_logical_volume("pillbox", pillbox, &steel)?;
    reg.place("pillbox", pillbox, water, Isometry::new_along_z(millimeter!(pillbox_z()))?)?;

    place_foils(reg, materials, water, water_pv, manhole)?;
    place_pmts(reg, materials, water, pmt_config)?;
    Ok(water)
}

fn tubs(rmin: f64, rmax: f64, z: f64) -> GeomResult<Solid> {
    Solid::cylinder(millimeter!(rmin), millimeter!(rmax), millimeter!(z))
}

fn pillbox_z() -> f64 {
    (pillbox_height() - WATER_HEIGHT) / 2.0
}

/// Arch shaped door through the pillbox along the x axis, standing on the floor.
fn manhole_solid(reg: &mut Registry) -> GeomResult<SolidId> {
    let length = 2.0 * (PILLBOX_OUTER_RADIUS + FOIL);
    let arch = reg.add_solid(
        "manhole_arch",
        Solid::tubs(
            millimeter!(0.0),
            millimeter!(MANHOLE_RADIUS),
            millimeter!(length),
            radian!(0.0),
            radian!(PI),
        )?,
    )?;
    let block = reg.add_solid(
        "manhole_block",
        Solid::cuboid(
            millimeter!(2.0 * MANHOLE_RADIUS),
            millimeter!(MANHOLE_RADIUS),
            millimeter!(length),
        )?,
    )?;
    reg.add_solid(
        "manhole",
        Solid::union(
            arch,
            block,
            Isometry::new_translation(millimeter!(0.0, -MANHOLE_RADIUS / 2.0, 0.0))?,
        ),
    )
}

/// A pillbox-high tube with the manhole cut out.
fn pierced_tube(
    reg: &mut Registry,
    name: &str,
    rmin: f64,
    rmax: f64,
    height: f64,
    manhole: SolidId,
) -> GeomResult<SolidId> {
    let tube = reg.add_solid(&format!("{name}_tube"), tubs(rmin, rmax, height)?)?;
    // door axis along x, arch pointing up
    let rotation = Rotation3::from_axis_angle(&Vector3::y_axis(), FRAC_PI_2)
        * Rotation3::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
    let door_z = MANHOLE_RADIUS - pillbox_height() / 2.0;
    reg.add_solid(
        name,
        Solid::subtraction(
            tube,
            manhole,
            Isometry::from_rotation(millimeter!(0.0, 0.0, door_z), rotation)?,
        ),
    )
}

/// Reflector foils on every surface facing the water.
fn place_foils(
    reg: &mut Registry,
    materials: &MaterialRegistry,
    water: LvId,
    water_pv: PvId,
    manhole: SolidId,
) -> GeomResult<()> {
    let vm2000 = materials.get_material(reg, MaterialKind::Vm2000)?;
    let bottom_z = (FOIL - WATER_HEIGHT) / 2.0;
    let pillbox_top_z = -WATER_HEIGHT / 2.0 + pillbox_height() - FOIL / 2.0;

    let mut foils = Vec::new();
    let mut foil = |reg: &mut Registry, name: &str, solid: SolidId, z: f64| -> GeomResult<()> {
        let lv = reg.add_logical_volume(&format!("{name}_foil"), solid, &vm2000)?;
        let pv = reg.place(&format!("{name}_foil"), lv, water, Isometry::new_along_z(millimeter!(z))?)?;
        foils.push((name.to_owned(), lv, pv));
        Ok(())
    };
    let solid = reg.add_solid("water_tank_tube_foil", tubs(WATER_RADIUS - FOIL, WATER_RADIUS, WATER_HEIGHT)?)?;
    foil(reg, "water_tank_tube", solid, 0.0)?;
    let solid = reg.add_solid(
        "water_tank_bottom_foil",
        tubs(PILLBOX_OUTER_RADIUS + FOIL, WATER_RADIUS - FOIL, FOIL)?,
    )?;
    foil(reg, "water_tank_bottom", solid, bottom_z)?;
    let solid = pierced_tube(
        reg,
        "pillbox_outer_foil",
        PILLBOX_OUTER_RADIUS,
        PILLBOX_OUTER_RADIUS + FOIL,
        pillbox_height(),
        manhole,
    )?;
    foil(reg, "pillbox_outer", solid, pillbox_z())?;
    let solid = pierced_tube(
        reg,
        "pillbox_inner_foil",
        PILLBOX_INNER_RADIUS - FOIL,
        PILLBOX_INNER_RADIUS,
        pillbox_height() - PILLBOX_WALL,
        manhole,
    )?;
    foil(reg, "pillbox_inner", solid, pillbox_z())?;
    let solid = reg.add_solid("pillbox_bottom_foil", tubs(0.0, PILLBOX_INNER_RADIUS - FOIL, FOIL)?)?;
    foil(reg, "pillbox_bottom", solid, bottom_z)?;
    // directly below the cryostat bottom
    let solid = reg.add_solid("pillbox_top_foil", tubs(0.0, PILLBOX_INNER_RADIUS - FOIL, FOIL)?)?;
    foil(reg, "pillbox_top", solid, pillbox_top_z)?;
    let solid = reg.add_solid(
        "cryo_foil",
        tubs(CRYO_OUTER_RADIUS, CRYO_OUTER_RADIUS + FOIL, CRYO_TUB_HEIGHT)?,
    )?;
    foil(reg, "cryo", solid, cryostat_z())?;

    // foil -> water is fully transmitting, water -> foil reflects
    let border = materials.get_surface(reg, SurfaceKind::WaterToVm2000)?;
    let skin = materials.get_surface(reg, SurfaceKind::ToVm2000)?;
    for (name, lv, pv) in foils {
        reg.add_border_surface(&format!("{name}_foil_border_surface"), &border, pv, water_pv)?;
        reg.add_skin_surface(&format!("{name}_foil_skin_surface"), &skin, lv)?;
    }
    Ok(())
}

/// Solids shared by all PMTs.
struct PmtSolids {
    acryl: SolidId,
    air: SolidId,
    glass: SolidId,
    cathode: SolidId,
    cone: LvId,
    base: LvId,
}

fn dome(reg: &mut Registry, name: &str, rmin: f64, rmax: f64) -> GeomResult<SolidId> {
    reg.add_solid(
        name,
        Solid::sphere(
            millimeter!(rmin),
            millimeter!(rmax),
            (radian!(0.0), radian!(TAU)),
            (radian!(0.0), radian!(CATHODE_THETA)),
        )?,
    )
}

fn pmt_solids(reg: &mut Registry, materials: &MaterialRegistry) -> GeomResult<PmtSolids> {
    let cone_outer = PMT_OUTER_RADIUS + CONE_WALL;
    let acryl = dome(reg, "pmt_acryl", CATHODE_INNER_RADIUS, cone_outer + 3.0)?;
    let air = dome(reg, "pmt_air", CATHODE_INNER_RADIUS, cone_outer)?;
    let glass = dome(
        reg,
        "pmt_borosilicate",
        CATHODE_INNER_RADIUS,
        CATHODE_OUTER_RADIUS + GLASS_THICKNESS,
    )?;
    let cathode = dome(reg, "pmt_cathode", CATHODE_INNER_RADIUS, CATHODE_OUTER_RADIUS)?;

    let steel = materials.get_material(reg, MaterialKind::StainlessSteel)?;
    let steel_surface = materials.get_surface(reg, SurfaceKind::ToPmtSteel)?;
    let base_radius = PMT_OUTER_RADIUS / 3.0;
    let cone = reg.add_volume(
        "pmt_cone",
        Solid::cons(
            millimeter!(base_radius),
            millimeter!(base_radius + CONE_WALL),
            millimeter!(PMT_OUTER_RADIUS),
            millimeter!(cone_outer),
            millimeter!(CONE_HEIGHT),
            radian!(0.0),
            radian!(TAU),
        )?,
        &steel,
    )?;
    reg.add_skin_surface("pmt_cone_optical_surface", &steel_surface, cone)?;
    let base = reg.add_volume(
        "pmt_base",
        tubs(0.0, base_radius + CONE_WALL, PMT_BASE_HEIGHT)?,
        &steel,
    )?;
    reg.add_skin_surface("pmt_base_optical_surface", &steel_surface, base)?;
    Ok(PmtSolids {
        acryl,
        air,
        glass,
        cathode,
        cone,
        base,
    })
}

/// Placement of one PMT: cathode centre, cone centre, base centre and orientation.
fn pmt_frame(ring: &PmtRing, k: usize) -> GeomResult<[Isometry; 3]> {
    let phi = ring.angle(k);
    let (sin, cos) = phi.sin_cos();
    // distances of cathode centre, cone centre and base centre from the back of the base
    let cathode = CONE_HEIGHT + PMT_BASE_HEIGHT - cathode_rim_offset();
    let cone = PMT_BASE_HEIGHT + CONE_HEIGHT / 2.0;
    let base = PMT_BASE_HEIGHT / 2.0;
    match ring.mount {
        Mount::Floor => {
            let (x, y) = (ring.radius * cos, ring.radius * sin);
            let floor = -WATER_HEIGHT / 2.0 + FOIL;
            Ok([
                Isometry::new_translation(millimeter!(x, y, floor + cathode))?,
                Isometry::new_translation(millimeter!(x, y, floor + cone))?,
                Isometry::new_translation(millimeter!(x, y, floor + base))?,
            ])
        }
        Mount::Wall(z) => {
            // local z (the viewing direction) points towards the tank axis
            let back = ring.radius + CONE_HEIGHT + PMT_BASE_HEIGHT;
            let at = |d: f64| -> GeomResult<Isometry> {
                let r = back - d;
                Isometry::new(millimeter!(r * cos, r * sin, z), radian!(0.0, -FRAC_PI_2, phi))
            };
            Ok([at(cathode)?, at(cone)?, at(base)?])
        }
    }
}

fn place_pmts(
    reg: &mut Registry,
    materials: &MaterialRegistry,
    water: LvId,
    pmt_config: PmtConfiguration,
) -> GeomResult<()> {
    let solids = pmt_solids(reg, materials)?;
    let cathode_surface = materials.get_surface(reg, SurfaceKind::ToPhotocathode)?;
    let mut working = PMT_IDS.iter();
    let mut slot_count = 0_usize;
    for ring in pmt_rings() {
        for k in 0..ring.slots {
            if ring.empty.contains(&k) {
                continue;
            }
            let broken = ring.broken.contains(&k);
            if broken && pmt_config == PmtConfiguration::Legend200 {
                continue;
            }
            let name = if broken {
                format!("gerda_{slot_count}")
            } else {
                let id = working.next().ok_or_else(|| {
                    GeomError::Other("more working PMT slots than channel ids".into())
                })?;
                (*id).to_owned()
            };
            let [cathode_at, cone_at, base_at] = pmt_frame(&ring, k)?;
            let cathode_lv = place_pmt(reg, materials, &solids, water, &name, cathode_at)?;
            if broken {
                debug!("placed broken PMT {name}");
            } else {
                reg.add_skin_surface(
                    &format!("pmt_cathode_skin_surface_{name}"),
                    &cathode_surface,
                    cathode_lv,
                )?;
            }
            reg.place(&format!("pmt_cone_{name}"), solids.cone, water, cone_at)?;
            reg.place(&format!("pmt_base_{name}"), solids.base, water, base_at)?;
            slot_count += 1;
        }
    }
    if working.next().is_some() {
        return Err(GeomError::Other("fewer working PMT slots than channel ids".into()));
    }
    Ok(())
}

/// Nested acryl, air, glass and cathode of one PMT. Working PMTs are tagged as optical detectors.
fn place_pmt(
    reg: &mut Registry,
    materials: &MaterialRegistry,
    solids: &PmtSolids,
    water: LvId,
    name: &str,
    placement: Isometry,
) -> GeomResult<LvId> {
    let acryl_material = materials.get_material(reg, MaterialKind::Acryl)?;
    let air_material = materials.get_material(reg, MaterialKind::PmtAir)?;
    let glass_material = materials.get_material(reg, MaterialKind::Borosilicate)?;
    let cathode_material = materials.get_material(reg, MaterialKind::Aluminium)?;
    let acryl = reg.add_logical_volume(&format!("pmt_acryl_{name}"), solids.acryl, &acryl_material)?;
    let air = reg.add_logical_volume(&format!("pmt_air_{name}"), solids.air, &air_material)?;
    let glass = reg.add_logical_volume(
        &format!("pmt_borosilicate_{name}"),
        solids.glass,
        &glass_material,
    )?;
    let cathode = reg.add_logical_volume(
        &format!("pmt_cathode_{name}"),
        solids.cathode,
        &cathode_material,
    )?;
    reg.place(&format!("pmt_acryl_{name}"), acryl, water, placement)?;
    reg.place(&format!("pmt_air_{name}"), air, acryl, Isometry::identity())?;
    reg.place(&format!("pmt_borosilicate_{name}"), glass, air, Isometry::identity())?;
    let cathode_pv = reg.place(&format!("pmt_cathode_{name}"), cathode, glass, Isometry::identity())?;
    if let Some(uid) = pmt_uid(name) {
        reg.tag_detector(cathode_pv, DetectorInfo::new(DetectorKind::Optical, uid, None))?;
    }
    Ok(cathode)
}

/// Detector uid of a working PMT, the number after the underscore of its channel id.
fn pmt_uid(name: &str) -> Option<u32> {
    name.strip_prefix("ch")?.split_once('_')?.1.parse().ok()
}
