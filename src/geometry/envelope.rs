//! Coarse overlap check between assemblies.
//!
//! Every assembly placed into the argon registers a vertical cylindrical shell that contains
//! all of its parts. Two assemblies overlap if their shells share any volume. The shells are
//! conservative, so a reported overlap does not always mean that two solids touch.
use nalgebra::Point2;

use crate::error::{GeomError, GeomResult};

/// Distances below this are treated as touching, not overlapping (mm).
const TOLERANCE: f64 = 1e-6;

/// A vertical cylindrical shell containing one assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    name: String,
    centre: Point2<f64>,
    rmin: f64,
    rmax: f64,
    zmin: f64,
    zmax: f64,
}
impl Envelope {
    /// A shell around the axis through `(x, y)`. All lengths in mm.
    /// # Errors
    /// This function returns an error if the radii or the z range are empty or not finite.
    pub fn new(
        name: &str,
        (x, y): (f64, f64),
        (rmin, rmax): (f64, f64),
        (zmin, zmax): (f64, f64),
    ) -> GeomResult<Self> {
        let values = [x, y, rmin, rmax, zmin, zmax];
        if values.iter().any(|v| !v.is_finite()) || rmin < 0.0 || rmin >= rmax || zmin >= zmax {
            return Err(GeomError::Registry(format!("invalid envelope of {name}")));
        }
        Ok(Self {
            name: name.to_owned(),
            centre: Point2::new(x, y),
            rmin,
            rmax,
            zmin,
            zmax,
        })
    }
    /// A full cylinder around the axis through `(x, y)`.
    /// # Errors
    /// see [`Envelope::new`]
    pub fn cylinder(
        name: &str,
        xy: (f64, f64),
        radius: f64,
        z_range: (f64, f64),
    ) -> GeomResult<Self> {
        Self::new(name, xy, (0.0, radius), z_range)
    }
    /// name of the enclosed assembly
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
    /// Returns `true` if both shells share a volume.
    ///
    /// The distances of the points of `self` to the axis of `other` form the interval
    /// `[lo, hi]`; the shells overlap if it meets `[other.rmin, other.rmax]`.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        if self.zmax <= other.zmin + TOLERANCE || other.zmax <= self.zmin + TOLERANCE {
            return false;
        }
        let d = nalgebra::distance(&self.centre, &other.centre);
        let hi = d + self.rmax;
        let lo = if d >= self.rmax {
            d - self.rmax
        } else if d >= self.rmin {
            0.0
        } else {
            self.rmin - d
        };
        hi > other.rmin + TOLERANCE && lo < other.rmax - TOLERANCE
    }
}

/// All pairs of overlapping envelopes, by name, in registration order.
#[must_use]
pub fn find_overlaps(envelopes: &[Envelope]) -> Vec<(String, String)> {
    let mut overlaps = Vec::new();
    for (i, first) in envelopes.iter().enumerate() {
        for second in &envelopes[i + 1..] {
            if first.overlaps(second) {
                overlaps.push((first.name.clone(), second.name.clone()));
            }
        }
    }
    overlaps
}
