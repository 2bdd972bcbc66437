#![warn(missing_docs)]
//! Constructive solid geometry primitives.
//!
//! All constructors validate their parameters. Lengths are full lengths along z (as in Geant4's
//! GDML dialect, not the C++ half-lengths), angles are given as start / delta pairs.
use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};
use uom::si::{
    angle::radian,
    f64::{Angle, Length},
    length::millimeter,
};

use crate::{
    error::{GeomError, GeomResult},
    radian,
    utils::Isometry,
};

/// Handle of a solid stored in a [`Registry`](crate::geometry::Registry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SolidId(pub(crate) usize);
impl SolidId {
    /// index of the solid in insertion order.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0
    }
}

/// One z-plane of a [`Solid::Polycone`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZPlane {
    /// axial position
    pub z: Length,
    /// inner radius
    pub rmin: Length,
    /// outer radius
    pub rmax: Length,
}

/// A solid shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Solid {
    /// (segment of a) tube
    Tubs {
        /// inner radius
        rmin: Length,
        /// outer radius
        rmax: Length,
        /// full length
        z: Length,
        /// start angle
        start_phi: Angle,
        /// opening angle
        delta_phi: Angle,
    },
    /// cuboid, given by its full side lengths
    Box {
        /// full length along x
        x: Length,
        /// full length along y
        y: Length,
        /// full length along z
        z: Length,
    },
    /// (segment of a) cone
    Cons {
        /// inner radius at `-z/2`
        rmin1: Length,
        /// outer radius at `-z/2`
        rmax1: Length,
        /// inner radius at `+z/2`
        rmin2: Length,
        /// outer radius at `+z/2`
        rmax2: Length,
        /// full length
        z: Length,
        /// start angle
        start_phi: Angle,
        /// opening angle
        delta_phi: Angle,
    },
    /// (section of a) spherical shell
    Sphere {
        /// inner radius
        rmin: Length,
        /// outer radius
        rmax: Length,
        /// start angle in phi
        start_phi: Angle,
        /// opening angle in phi
        delta_phi: Angle,
        /// start angle in theta
        start_theta: Angle,
        /// opening angle in theta
        delta_theta: Angle,
    },
    /// ellipsoid with optional z cuts
    Ellipsoid {
        /// semi axis x
        ax: Length,
        /// semi axis y
        by: Length,
        /// semi axis z
        cz: Length,
        /// lower z cut
        z_cut1: Length,
        /// upper z cut
        z_cut2: Length,
    },
    /// (segment of a) torus
    Torus {
        /// inner radius of the tube
        rmin: Length,
        /// outer radius of the tube
        rmax: Length,
        /// swept radius
        rtor: Length,
        /// start angle
        start_phi: Angle,
        /// opening angle
        delta_phi: Angle,
    },
    /// polycone defined by z-planes
    Polycone {
        /// start angle
        start_phi: Angle,
        /// opening angle
        delta_phi: Angle,
        /// planes, ascending in z
        planes: Vec<ZPlane>,
    },
    /// polycone defined by an arbitrary (r, z) outline
    GenericPolycone {
        /// start angle
        start_phi: Angle,
        /// opening angle
        delta_phi: Angle,
        /// closed outline as (r, z) pairs
        rz: Vec<(Length, Length)>,
    },
    /// boolean union, `second` is placed with `transform` relative to `first`
    Union {
        /// first operand
        first: SolidId,
        /// second operand
        second: SolidId,
        /// placement of the second operand
        transform: Isometry,
    },
    /// boolean subtraction `first - second`
    Subtraction {
        /// first operand
        first: SolidId,
        /// second operand
        second: SolidId,
        /// placement of the second operand
        transform: Isometry,
    },
}

fn check_positive(what: &str, value: Length) -> GeomResult<()> {
    let v = value.get::<millimeter>();
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(GeomError::Registry(format!(
            "{what} must be positive and finite, got {v} mm"
        )))
    }
}
fn check_non_negative(what: &str, value: Length) -> GeomResult<()> {
    let v = value.get::<millimeter>();
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(GeomError::Registry(format!(
            "{what} must be >= 0 and finite, got {v} mm"
        )))
    }
}
fn check_radii(rmin: Length, rmax: Length) -> GeomResult<()> {
    check_non_negative("rmin", rmin)?;
    check_positive("rmax", rmax)?;
    if rmin >= rmax {
        return Err(GeomError::Registry(format!(
            "rmin ({} mm) must be smaller than rmax ({} mm)",
            rmin.get::<millimeter>(),
            rmax.get::<millimeter>()
        )));
    }
    Ok(())
}
fn check_angles(start: Angle, delta: Angle) -> GeomResult<()> {
    let d = delta.get::<radian>();
    if !start.get::<radian>().is_finite() || !d.is_finite() || d <= 0.0 || d > TAU + 1e-12 {
        return Err(GeomError::Registry(format!(
            "opening angle must be in (0, 2pi], got {d} rad"
        )));
    }
    Ok(())
}

impl Solid {
    /// Create a tube segment.
    /// # Errors
    /// This function returns an error if the radii, the length or the angles are invalid.
    pub fn tubs(
        rmin: Length,
        rmax: Length,
        z: Length,
        start_phi: Angle,
        delta_phi: Angle,
    ) -> GeomResult<Self> {
        check_radii(rmin, rmax)?;
        check_positive("tube length", z)?;
        check_angles(start_phi, delta_phi)?;
        Ok(Self::Tubs {
            rmin,
            rmax,
            z,
            start_phi,
            delta_phi,
        })
    }
    /// Create a full (2π) tube.
    /// # Errors
    /// This function returns an error if the radii or the length are invalid.
    pub fn cylinder(rmin: Length, rmax: Length, z: Length) -> GeomResult<Self> {
        Self::tubs(rmin, rmax, z, radian!(0.0), radian!(TAU))
    }
    /// Create a cuboid from its full side lengths.
    /// # Errors
    /// This function returns an error if a side length is not positive.
    pub fn cuboid(x: Length, y: Length, z: Length) -> GeomResult<Self> {
        check_positive("box x", x)?;
        check_positive("box y", y)?;
        check_positive("box z", z)?;
        Ok(Self::Box { x, y, z })
    }
    /// Create a cone segment.
    /// # Errors
    /// This function returns an error if the radii, the length or the angles are invalid.
    #[allow(clippy::too_many_arguments)]
    pub fn cons(
        rmin1: Length,
        rmax1: Length,
        rmin2: Length,
        rmax2: Length,
        z: Length,
        start_phi: Angle,
        delta_phi: Angle,
    ) -> GeomResult<Self> {
        check_radii(rmin1, rmax1)?;
        check_radii(rmin2, rmax2)?;
        check_positive("cone length", z)?;
        check_angles(start_phi, delta_phi)?;
        Ok(Self::Cons {
            rmin1,
            rmax1,
            rmin2,
            rmax2,
            z,
            start_phi,
            delta_phi,
        })
    }
    /// Create a spherical shell section.
    /// # Errors
    /// This function returns an error if the radii or the angles are invalid.
    pub fn sphere(
        rmin: Length,
        rmax: Length,
        (start_phi, delta_phi): (Angle, Angle),
        (start_theta, delta_theta): (Angle, Angle),
    ) -> GeomResult<Self> {
        check_radii(rmin, rmax)?;
        check_angles(start_phi, delta_phi)?;
        check_angles(start_theta, delta_theta)?;
        Ok(Self::Sphere {
            rmin,
            rmax,
            start_phi,
            delta_phi,
            start_theta,
            delta_theta,
        })
    }
    /// Create an ellipsoid cut at `z_cut1 <= z <= z_cut2`.
    /// # Errors
    /// This function returns an error if a semi axis is not positive or the cuts are not ordered.
    pub fn ellipsoid(
        ax: Length,
        by: Length,
        cz: Length,
        z_cut1: Length,
        z_cut2: Length,
    ) -> GeomResult<Self> {
        check_positive("ellipsoid ax", ax)?;
        check_positive("ellipsoid by", by)?;
        check_positive("ellipsoid cz", cz)?;
        if z_cut1 >= z_cut2 {
            return Err(GeomError::Registry(
                "ellipsoid lower z cut must be below the upper z cut".into(),
            ));
        }
        Ok(Self::Ellipsoid {
            ax,
            by,
            cz,
            z_cut1,
            z_cut2,
        })
    }
    /// Create a torus segment.
    /// # Errors
    /// This function returns an error if the radii or the angles are invalid.
    pub fn torus(
        rmin: Length,
        rmax: Length,
        rtor: Length,
        start_phi: Angle,
        delta_phi: Angle,
    ) -> GeomResult<Self> {
        check_radii(rmin, rmax)?;
        check_positive("torus radius", rtor)?;
        if rmax > rtor {
            return Err(GeomError::Registry(
                "torus tube radius must not exceed the swept radius".into(),
            ));
        }
        check_angles(start_phi, delta_phi)?;
        Ok(Self::Torus {
            rmin,
            rmax,
            rtor,
            start_phi,
            delta_phi,
        })
    }
    /// Create a polycone from z-planes.
    /// # Errors
    /// This function returns an error if less than two planes are given, the planes are not
    /// ascending in z or have invalid radii.
    pub fn polycone(start_phi: Angle, delta_phi: Angle, planes: Vec<ZPlane>) -> GeomResult<Self> {
        check_angles(start_phi, delta_phi)?;
        if planes.len() < 2 {
            return Err(GeomError::Registry(
                "polycone needs at least two z-planes".into(),
            ));
        }
        for p in &planes {
            check_non_negative("polycone rmin", p.rmin)?;
            check_non_negative("polycone rmax", p.rmax)?;
            if p.rmin > p.rmax {
                return Err(GeomError::Registry(
                    "polycone rmin must not exceed rmax".into(),
                ));
            }
        }
        if planes.windows(2).any(|w| w[1].z < w[0].z) {
            return Err(GeomError::Registry(
                "polycone planes must be ascending in z".into(),
            ));
        }
        Ok(Self::Polycone {
            start_phi,
            delta_phi,
            planes,
        })
    }
    /// Create a polycone from an (r, z) outline.
    /// # Errors
    /// This function returns an error if less than three points are given or a radius is negative.
    pub fn generic_polycone(
        start_phi: Angle,
        delta_phi: Angle,
        rz: Vec<(Length, Length)>,
    ) -> GeomResult<Self> {
        check_angles(start_phi, delta_phi)?;
        if rz.len() < 3 {
            return Err(GeomError::Registry(
                "generic polycone needs at least three (r, z) points".into(),
            ));
        }
        for (r, _) in &rz {
            check_non_negative("generic polycone r", *r)?;
        }
        Ok(Self::GenericPolycone {
            start_phi,
            delta_phi,
            rz,
        })
    }
    /// Boolean union of two registered solids.
    #[must_use]
    pub const fn union(first: SolidId, second: SolidId, transform: Isometry) -> Self {
        Self::Union {
            first,
            second,
            transform,
        }
    }
    /// Boolean subtraction of two registered solids.
    #[must_use]
    pub const fn subtraction(first: SolidId, second: SolidId, transform: Isometry) -> Self {
        Self::Subtraction {
            first,
            second,
            transform,
        }
    }
    /// Solids referenced by this solid (boolean operands).
    #[must_use]
    pub fn operands(&self) -> Vec<SolidId> {
        match self {
            Self::Union { first, second, .. } | Self::Subtraction { first, second, .. } => {
                vec![*first, *second]
            }
            _ => Vec::new(),
        }
    }
    /// Name of the corresponding GDML element.
    #[must_use]
    pub const fn gdml_tag(&self) -> &'static str {
        match self {
            Self::Tubs { .. } => "tube",
            Self::Box { .. } => "box",
            Self::Cons { .. } => "cone",
            Self::Sphere { .. } => "sphere",
            Self::Ellipsoid { .. } => "ellipsoid",
            Self::Torus { .. } => "torus",
            Self::Polycone { .. } => "polycone",
            Self::GenericPolycone { .. } => "genericPolycone",
            Self::Union { .. } => "union",
            Self::Subtraction { .. } => "subtraction",
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{degree, millimeter};
    use assert_matches::assert_matches;
    #[test]
    fn tubs() {
        let t = Solid::cylinder(millimeter!(0.), millimeter!(10.), millimeter!(5.)).unwrap();
        assert_eq!(t.gdml_tag(), "tube");
        assert!(t.operands().is_empty());
        assert_matches!(
            Solid::cylinder(millimeter!(10.), millimeter!(10.), millimeter!(5.)),
            Err(GeomError::Registry(_))
        );
        assert!(Solid::cylinder(millimeter!(0.), millimeter!(10.), millimeter!(0.)).is_err());
        assert!(Solid::cylinder(millimeter!(-1.), millimeter!(10.), millimeter!(1.)).is_err());
        assert!(Solid::tubs(
            millimeter!(0.),
            millimeter!(10.),
            millimeter!(1.),
            degree!(0.),
            degree!(0.)
        )
        .is_err());
    }
    #[test]
    fn cuboid() {
        assert!(Solid::cuboid(millimeter!(1.), millimeter!(1.), millimeter!(1.)).is_ok());
        assert!(Solid::cuboid(millimeter!(1.), millimeter!(f64::NAN), millimeter!(1.)).is_err());
    }
    #[test]
    fn polycone() {
        let planes = vec![
            ZPlane {
                z: millimeter!(0.),
                rmin: millimeter!(1.),
                rmax: millimeter!(2.),
            },
            ZPlane {
                z: millimeter!(1.),
                rmin: millimeter!(1.),
                rmax: millimeter!(3.),
            },
        ];
        assert!(Solid::polycone(degree!(0.), degree!(360.), planes.clone()).is_ok());
        let reversed: Vec<ZPlane> = planes.into_iter().rev().collect();
        assert!(Solid::polycone(degree!(0.), degree!(360.), reversed).is_err());
    }
    #[test]
    fn generic_polycone() {
        let rz = vec![
            (millimeter!(0.), millimeter!(0.)),
            (millimeter!(1.), millimeter!(0.)),
        ];
        assert!(Solid::generic_polycone(degree!(0.), degree!(360.), rz).is_err());
    }
    #[test]
    fn torus() {
        assert!(Solid::torus(
            millimeter!(0.),
            millimeter!(1.),
            millimeter!(40.),
            degree!(-90.),
            degree!(90.)
        )
        .is_ok());
        assert!(Solid::torus(
            millimeter!(0.),
            millimeter!(50.),
            millimeter!(40.),
            degree!(0.),
            degree!(90.)
        )
        .is_err());
    }
    #[test]
    fn ellipsoid() {
        assert!(Solid::ellipsoid(
            millimeter!(1.),
            millimeter!(1.),
            millimeter!(1.),
            millimeter!(0.5),
            millimeter!(0.1)
        )
        .is_err());
    }
    #[test]
    fn operands() {
        let u = Solid::union(SolidId(0), SolidId(1), Isometry::identity());
        assert_eq!(u.operands(), vec![SolidId(0), SolidId(1)]);
        assert_eq!(u.gdml_tag(), "union");
    }
}
