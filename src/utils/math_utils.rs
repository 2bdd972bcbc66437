//! Small numeric helpers shared by the placement code.
use uom::si::{
    angle::radian,
    f64::{Angle, Length},
    length::millimeter,
};

#[must_use]
pub const fn usize_to_f64(value: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let newval = value as f64;
    newval
}

/// Sense of rotation used when converting a (radius, angle) pair into x/y coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleSense {
    /// mathematically positive, `y = r sin(a)`
    CounterClockwise,
    /// `y = -r sin(a)`: increasing angles run clockwise when looking from the top.
    Clockwise,
}

/// Convert a polar position into x/y coordinates (in mm).
#[must_use]
pub fn polar_to_xy(radius: Length, angle: Angle, sense: AngleSense) -> (f64, f64) {
    let r = radius.get::<millimeter>();
    let a = angle.get::<radian>();
    match sense {
        AngleSense::CounterClockwise => (r * a.cos(), r * a.sin()),
        AngleSense::Clockwise => (r * a.cos(), -r * a.sin()),
    }
}

/// Exact bit pattern of a length in millimeters, used for building cache keys.
#[must_use]
pub fn length_bits(value: Length) -> u64 {
    value.get::<millimeter>().to_bits()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{degree, millimeter};
    use approx::assert_abs_diff_eq;
    #[test]
    fn usize_to_f64_test() {
        assert_eq!(usize_to_f64(20), 20.0);
    }
    #[test]
    fn polar_to_xy_sense() {
        let (x, y) = polar_to_xy(millimeter!(100.), degree!(90.), AngleSense::Clockwise);
        assert_abs_diff_eq!(x, 0., epsilon = 1e-12);
        assert_abs_diff_eq!(y, -100., epsilon = 1e-12);
        let (_, y) = polar_to_xy(millimeter!(100.), degree!(90.), AngleSense::CounterClockwise);
        assert_abs_diff_eq!(y, 100., epsilon = 1e-12);
    }
    #[test]
    fn length_bits_distinct() {
        assert_eq!(length_bits(millimeter!(1.5)), length_bits(millimeter!(1.5)));
        assert_ne!(length_bits(millimeter!(1.5)), length_bits(millimeter!(1.5000001)));
    }
}
