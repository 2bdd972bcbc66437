#![warn(missing_docs)]
//! Wavelength dependent optical property curves.
//!
//! [`OpticsLibrary`] supplies every named curve the material and surface definitions attach.
//! Any curve can be substituted for the rest of a construction run with
//! [`OpticsLibrary::replace`].
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::error::{GeomError, GeomResult};

/// `h*c` in eV nm.
const HC_EV_NM: f64 = 1_239.841_98;

/// Sampled property as function of the vacuum wavelength.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    /// `(wavelength in nm, value)`, ascending in wavelength
    points: Vec<(f64, f64)>,
}
impl Curve {
    /// Create a new curve from `(wavelength in nm, value)` pairs.
    ///
    /// The points are sorted by wavelength.
    /// # Errors
    /// This function returns an error if no points are given, a wavelength is not positive or a
    /// value is not finite.
    pub fn new(mut points: Vec<(f64, f64)>) -> GeomResult<Self> {
        if points.is_empty() {
            return Err(GeomError::Other("a property curve needs at least one point".into()));
        }
        if points
            .iter()
            .any(|(l, v)| !l.is_finite() || *l <= 0.0 || !v.is_finite())
        {
            return Err(GeomError::Other(
                "property curve points must have positive wavelengths and finite values".into(),
            ));
        }
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(Self { points })
    }
    /// Constant value over the full optical range used in the simulation.
    #[must_use]
    pub fn flat(value: f64) -> Self {
        Self {
            points: vec![(100.0, value), (650.0, value)],
        }
    }
    /// Sample a function on the default wavelength grid.
    #[must_use]
    pub fn sampled(f: impl Fn(f64) -> f64) -> Self {
        Self {
            points: WAVELENGTH_GRID.iter().map(|l| (*l, f(*l))).collect(),
        }
    }
    /// The `(wavelength in nm, value)` pairs.
    #[must_use]
    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }
    /// The points as `(photon energy in MeV, value)`, ascending in energy.
    #[must_use]
    pub fn energy_points_mev(&self) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .rev()
            .map(|(l, v)| (HC_EV_NM / l * 1e-6, *v))
            .collect()
    }
    /// Multiply all values by `factor`.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            points: self.points.iter().map(|(l, v)| (*l, v * factor)).collect(),
        }
    }
    /// Linear interpolation, clamped to the outermost points.
    #[must_use]
    pub fn value_at(&self, wavelength: f64) -> f64 {
        let first = self.points[0];
        let last = self.points[self.points.len() - 1];
        if wavelength <= first.0 {
            return first.1;
        }
        if wavelength >= last.0 {
            return last.1;
        }
        self.points
            .windows(2)
            .find(|w| wavelength <= w[1].0)
            .map_or(last.1, |w| {
                let t = (wavelength - w[0].0) / (w[1].0 - w[0].0);
                w[0].1 + t * (w[1].1 - w[0].1)
            })
    }
}

const WAVELENGTH_GRID: [f64; 24] = [
    100., 112., 116., 120., 124., 126., 128., 130., 132., 136., 140., 160., 200., 250., 300.,
    350., 380., 400., 420., 450., 500., 550., 600., 650.,
];

fn gaussian(center: f64, sigma: f64) -> impl Fn(f64) -> f64 {
    move |l| (-0.5 * ((l - center) / sigma).powi(2)).exp()
}
fn step(edge: f64, below: f64, above: f64) -> impl Fn(f64) -> f64 {
    move |l| if l < edge { below } else { above }
}

/// Names of all curves provided by the [`OpticsLibrary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[allow(missing_docs)]
pub enum OpticsProperty {
    LarRindex,
    LarAbsLength,
    LarRayleighLength,
    LarScintSpectrum,
    TpbRindex,
    TpbWlsAbsLength,
    TpbWlsEmission,
    PenRindex,
    PenAbsLength,
    PenWlsAbsLength,
    PenWlsEmission,
    NylonRindex,
    NylonAbsLength,
    PmmaRindex,
    PmmaAbsLength,
    FiberCoreRindex,
    FiberCoreAbsLength,
    FiberCoreWlsAbsLength,
    FiberCoreWlsEmission,
    TetratexReflectivity,
    CopperReflectivity,
    GermaniumReflectivity,
    SiliconReflectivity,
    SipmEfficiency,
    WaterRindex,
    WaterAbsLength,
    Vm2000Reflectivity,
    Vm2000WlsEmission,
    PmtSteelReflectivity,
    PhotocathodeEfficiency,
    BorosilicateRindex,
}

impl OpticsProperty {
    fn default_curve(self) -> Curve {
        match self {
            Self::LarRindex => Curve::sampled(|l| {
                // Sellmeier fit with one UV and one IR resonance, frozen below the UV pole
                let l2 = l.max(115.0).powi(2);
                (1.0 + 0.335 + 0.099 * l2 / (l2 - 106.6 * 106.6) + 0.008 * l2 / (l2 - 908.3 * 908.3))
                    .sqrt()
            }),
            Self::LarAbsLength => Curve::flat(600.0),
            Self::LarRayleighLength => Curve::sampled(|l| 900.0 * (l / 128.0).powi(4)),
            Self::LarScintSpectrum => Curve::sampled(gaussian(128.0, 2.929)),
            Self::TpbRindex => Curve::flat(1.67),
            Self::TpbWlsAbsLength => Curve::sampled(step(380.0, 0.0004, 1.0e6)),
            Self::TpbWlsEmission => Curve::sampled(gaussian(425.0, 30.0)),
            Self::PenRindex => Curve::flat(1.51),
            Self::PenAbsLength => Curve::sampled(step(400.0, 0.2, 15.0)),
            Self::PenWlsAbsLength => Curve::sampled(step(380.0, 0.001, 1.0e6)),
            Self::PenWlsEmission => Curve::sampled(gaussian(445.0, 35.0)),
            Self::NylonRindex => Curve::flat(1.53),
            Self::NylonAbsLength => Curve::sampled(step(300.0, 0.1, 10.0)),
            Self::PmmaRindex => Curve::flat(1.49),
            Self::PmmaAbsLength => Curve::flat(50_000.0),
            Self::FiberCoreRindex => Curve::flat(1.6),
            Self::FiberCoreAbsLength => Curve::flat(3_500.0),
            Self::FiberCoreWlsAbsLength => Curve::sampled(|l| {
                if (380.0..=480.0).contains(&l) {
                    0.7
                } else {
                    1.0e6
                }
            }),
            Self::FiberCoreWlsEmission => Curve::sampled(gaussian(494.0, 20.0)),
            Self::TetratexReflectivity => Curve::sampled(step(200.0, 0.1, 0.95)),
            Self::CopperReflectivity => Curve::sampled(step(300.0, 0.3, 0.5)),
            Self::GermaniumReflectivity => Curve::sampled(step(300.0, 0.2, 0.4)),
            Self::SiliconReflectivity => Curve::flat(0.3),
            Self::SipmEfficiency => Curve {
                points: vec![
                    (100., 0.0),
                    (280., 0.19),
                    (310., 0.30),
                    (350., 0.32),
                    (400., 0.33),
                    (435., 0.32),
                    (505., 0.27),
                    (525., 0.19),
                    (595., 0.12),
                    (670., 0.07),
                ],
            },
            Self::WaterRindex => Curve::flat(1.33),
            Self::WaterAbsLength => Curve::sampled(step(250.0, 1_000.0, 50_000.0)),
            Self::Vm2000Reflectivity => Curve::sampled(step(370.0, 0.15, 0.98)),
            Self::Vm2000WlsEmission => Curve::sampled(gaussian(420.0, 25.0)),
            Self::PmtSteelReflectivity => Curve::flat(0.5),
            Self::PhotocathodeEfficiency => Curve::sampled(|l| {
                if (280.0..=650.0).contains(&l) {
                    0.25 * gaussian(400.0, 90.0)(l)
                } else {
                    0.0
                }
            }),
            Self::BorosilicateRindex => Curve::flat(1.49),
        }
    }
}

/// Collection of optical property curves.
#[derive(Debug, Clone)]
pub struct OpticsLibrary {
    curves: HashMap<OpticsProperty, Curve>,
}
impl Default for OpticsLibrary {
    fn default() -> Self {
        Self {
            curves: OpticsProperty::iter()
                .map(|p| (p, p.default_curve()))
                .collect(),
        }
    }
}
impl OpticsLibrary {
    /// Library with the default curves.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// Returns the curve of a property.
    #[must_use]
    pub fn curve(&self, property: OpticsProperty) -> Curve {
        self.curves
            .get(&property)
            .cloned()
            .unwrap_or_else(|| property.default_curve())
    }
    /// Substitute the curve of a property.
    pub fn replace(&mut self, property: OpticsProperty, curve: Curve) {
        log::debug!("replacing optical property {property}");
        self.curves.insert(property, curve);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;
    #[test]
    fn curve_new() {
        assert!(Curve::new(vec![]).is_err());
        assert!(Curve::new(vec![(0.0, 1.0)]).is_err());
        assert!(Curve::new(vec![(100.0, f64::NAN)]).is_err());
        let c = Curve::new(vec![(200.0, 2.0), (100.0, 1.0)]).unwrap();
        assert_eq!(c.points(), &[(100.0, 1.0), (200.0, 2.0)]);
    }
    #[test]
    fn energy_points() {
        let c = Curve::new(vec![(100.0, 1.0), (200.0, 2.0)]).unwrap();
        let e = c.energy_points_mev();
        assert_abs_diff_eq!(e[0].0, HC_EV_NM / 200.0 * 1e-6, epsilon = 1e-9);
        assert_abs_diff_eq!(e[0].1, 2.0, epsilon = 1e-9);
        assert!(e[0].0 < e[1].0);
    }
    #[test]
    fn value_at() {
        let c = Curve::new(vec![(100.0, 1.0), (200.0, 3.0)]).unwrap();
        assert_abs_diff_eq!(c.value_at(50.0), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(c.value_at(150.0), 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(c.value_at(250.0), 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(c.scaled(0.5).value_at(200.0), 1.5, epsilon = 1e-9);
    }
    #[test]
    fn lar_rindex() {
        let lib = OpticsLibrary::new();
        let n = lib.curve(OpticsProperty::LarRindex);
        assert!(n.value_at(128.0) > n.value_at(400.0));
        assert_abs_diff_eq!(n.value_at(400.0), 1.20, epsilon = 0.01);
    }
    #[test]
    fn replace() {
        let mut lib = OpticsLibrary::new();
        lib.replace(OpticsProperty::LarAbsLength, Curve::flat(1.0));
        assert_eq!(lib.curve(OpticsProperty::LarAbsLength), Curve::flat(1.0));
    }
    #[test]
    fn all_curves_valid() {
        let lib = OpticsLibrary::new();
        for p in OpticsProperty::iter() {
            let c = lib.curve(p);
            assert!(Curve::new(c.points().to_vec()).is_ok(), "{p}");
        }
    }
}
