//! Rigid transformations used for placing volumes inside their mother volume.
#![warn(missing_docs)]
use nalgebra::{Isometry3, Point3, Rotation3, Translation3, UnitQuaternion, Vector3};
use num::Zero;
use serde::{Deserialize, Serialize};
use uom::si::{
    angle::radian,
    f64::{Angle, Length},
    length::millimeter,
};

use crate::{
    error::{GeomError, GeomResult},
    millimeter,
};

/// Placement of a daughter volume relative to its mother.
///
/// The rotation is stored as an *active* rotation: a point `p` given in the daughter frame lands
/// at `R * p + t` in the mother frame. The translation is kept in millimeters internally.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Isometry {
    transform: Isometry3<f64>,
}
impl Isometry {
    /// Create a new [`Isometry`] from a translation and a set of rotation angles.
    ///
    /// The angles are applied as roll (around x), pitch (around y) and yaw (around z) in this order,
    /// i.e. the resulting rotation matrix is `Rz * Ry * Rx`.
    /// # Errors
    /// This function returns an error if one of the given values is not finite.
    pub fn new(translation: Point3<Length>, axisangles: Point3<Angle>) -> GeomResult<Self> {
        let angles = Vector3::new(
            axisangles.x.get::<radian>(),
            axisangles.y.get::<radian>(),
            axisangles.z.get::<radian>(),
        );
        if angles.iter().any(|a| !a.is_finite()) {
            return Err(GeomError::Other("rotation angles must be finite".into()));
        }
        let rotation = Rotation3::from_euler_angles(angles.x, angles.y, angles.z);
        Self::from_rotation(translation, rotation)
    }
    /// Create a new [`Isometry`] from a translation and an arbitrary rotation matrix.
    /// # Errors
    /// This function returns an error if the translation is not finite.
    pub fn from_rotation(translation: Point3<Length>, rotation: Rotation3<f64>) -> GeomResult<Self> {
        let t = Vector3::new(
            translation.x.get::<millimeter>(),
            translation.y.get::<millimeter>(),
            translation.z.get::<millimeter>(),
        );
        if t.iter().any(|c| !c.is_finite()) {
            return Err(GeomError::Other("translation must be finite".into()));
        }
        Ok(Self {
            transform: Isometry3::from_parts(
                Translation3::from(t),
                UnitQuaternion::from_rotation_matrix(&rotation),
            ),
        })
    }
    /// Create a pure translation.
    /// # Errors
    /// This function returns an error if the translation is not finite.
    pub fn new_translation(translation: Point3<Length>) -> GeomResult<Self> {
        Self::from_rotation(translation, Rotation3::identity())
    }
    /// Create a translation along the z axis only.
    /// # Errors
    /// This function returns an error if the given value is not finite.
    pub fn new_along_z(z: Length) -> GeomResult<Self> {
        Self::new_translation(Point3::new(Length::zero(), Length::zero(), z))
    }
    /// The identity transformation.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            transform: Isometry3::identity(),
        }
    }
    /// Returns the translation part of this [`Isometry`].
    #[must_use]
    pub fn translation(&self) -> Point3<Length> {
        let t = self.translation_mm();
        millimeter!(t.x, t.y, t.z)
    }
    /// Returns the translation part in millimeters.
    #[must_use]
    pub fn translation_mm(&self) -> Vector3<f64> {
        self.transform.translation.vector
    }
    /// Returns the (active) rotation part of this [`Isometry`].
    #[must_use]
    pub fn rotation(&self) -> Rotation3<f64> {
        self.transform.rotation.to_rotation_matrix()
    }
    /// Combine two transformations: `other` is expressed in the frame of `self`.
    #[must_use]
    pub fn append(&self, other: &Self) -> Self {
        Self {
            transform: self.transform * other.transform,
        }
    }
    /// Transform a point (in millimeters) from the daughter into the mother frame.
    #[must_use]
    pub fn transform_point_mm(&self, p: &Point3<f64>) -> Point3<f64> {
        self.transform.transform_point(p)
    }
    /// `true` if this transformation does not rotate.
    #[must_use]
    pub fn has_rotation(&self) -> bool {
        self.transform.rotation.angle() > 1e-12
    }
    /// Rotation angles as written to GDML.
    ///
    /// GDML (and Geant4's `G4PVPlacement`) store the *frame* rotation, i.e. the inverse of the
    /// active rotation, as x/y/z angles.
    #[must_use]
    pub fn gdml_angles(&self) -> Vector3<f64> {
        let (x, y, z) = self.rotation().inverse().euler_angles();
        Vector3::new(x, y, z)
    }
    /// Rebuild an [`Isometry`] from a GDML position (mm) and rotation (rad).
    #[must_use]
    pub fn from_gdml(position_mm: Vector3<f64>, angles_rad: Vector3<f64>) -> Self {
        let frame = Rotation3::from_euler_angles(angles_rad.x, angles_rad.y, angles_rad.z);
        Self {
            transform: Isometry3::from_parts(
                Translation3::from(position_mm),
                UnitQuaternion::from_rotation_matrix(&frame.inverse()),
            ),
        }
    }
}
impl Default for Isometry {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{degree, radian};
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;
    #[test]
    fn new() {
        let iso = Isometry::new(millimeter!(1., 2., 3.), degree!(0., 0., 90.)).unwrap();
        assert_abs_diff_eq!(iso.translation_mm(), Vector3::new(1., 2., 3.), epsilon = 1e-9);
        let p = iso.transform_point_mm(&Point3::new(1., 0., 0.));
        assert_abs_diff_eq!(p, Point3::new(1., 3., 3.), epsilon = 1e-12);
        assert!(iso.has_rotation());
    }
    #[test]
    fn new_not_finite() {
        assert!(Isometry::new(millimeter!(f64::NAN, 0., 0.), degree!(0., 0., 0.)).is_err());
        assert!(Isometry::new(millimeter!(0., 0., 0.), degree!(0., f64::INFINITY, 0.)).is_err());
    }
    #[test]
    fn identity() {
        let iso = Isometry::identity();
        assert!(!iso.has_rotation());
        assert_abs_diff_eq!(iso.translation_mm(), Vector3::zeros(), epsilon = 1e-9);
        assert_eq!(Isometry::default(), iso);
    }
    #[test]
    fn append() {
        let outer = Isometry::new(millimeter!(0., 0., 10.), degree!(0., 0., 90.)).unwrap();
        let inner = Isometry::new_translation(millimeter!(5., 0., 0.)).unwrap();
        let combined = outer.append(&inner);
        assert_abs_diff_eq!(
            combined.translation_mm(),
            Vector3::new(0., 5., 10.),
            epsilon = 1e-12
        );
    }
    #[test]
    fn gdml_angles() {
        let iso = Isometry::new(millimeter!(0., 0., 0.), radian!(0., 0., FRAC_PI_2)).unwrap();
        let angles = iso.gdml_angles();
        assert_abs_diff_eq!(angles, Vector3::new(0., 0., -FRAC_PI_2), epsilon = 1e-12);
        let back = Isometry::from_gdml(iso.translation_mm(), angles);
        assert_abs_diff_eq!(
            back.rotation().matrix(),
            iso.rotation().matrix(),
            epsilon = 1e-12
        );
    }
}
