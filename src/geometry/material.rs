//! Chemical definitions (isotopes, elements, materials) stored in the registry.
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uom::si::{f64::MassDensity, mass_density::gram_per_cubic_centimeter};

use crate::{
    error::{GeomError, GeomResult},
    optics::Curve,
};

/// A single isotope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Isotope {
    pub name: String,
    /// atomic number
    pub z: u32,
    /// number of nucleons
    pub n: u32,
    /// molar mass in g/mole
    pub a: f64,
}

/// Composition of an [`Element`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ElementComposition {
    /// natural element with an effective molar mass in g/mole
    Natural { z: u32, a: f64 },
    /// element made of isotopes with the given abundances (fractions)
    Isotopes(Vec<(String, f64)>),
}

/// A chemical element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub name: String,
    pub symbol: String,
    pub composition: ElementComposition,
}
impl Element {
    #[must_use]
    pub fn natural(name: &str, symbol: &str, z: u32, a: f64) -> Self {
        Self {
            name: name.to_owned(),
            symbol: symbol.to_owned(),
            composition: ElementComposition::Natural { z, a },
        }
    }
    /// Create an element from isotope abundances.
    ///
    /// # Errors
    /// This function returns an error if the abundances do not add up to one.
    pub fn from_isotopes(name: &str, symbol: &str, isotopes: Vec<(String, f64)>) -> GeomResult<Self> {
        let sum: f64 = isotopes.iter().map(|(_, f)| f).sum();
        if isotopes.is_empty() || (sum - 1.0).abs() > 1e-6 {
            return Err(GeomError::Registry(format!(
                "isotope abundances of element {name} must add up to 1, got {sum}"
            )));
        }
        Ok(Self {
            name: name.to_owned(),
            symbol: symbol.to_owned(),
            composition: ElementComposition::Isotopes(isotopes),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum MaterialState {
    Solid,
    Liquid,
    Gas,
}

/// How a [`Material`] is composed of elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Composition {
    /// Geant4 predefined (NIST) material, only referenced by name
    Nist,
    /// number of atoms per molecule, by element name
    AtomCounts(Vec<(String, u32)>),
    /// mass fractions, by element name
    MassFractions(Vec<(String, f64)>),
}

/// A material with optional optical properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    name: String,
    density: MassDensity,
    state: Option<MaterialState>,
    temperature_k: Option<f64>,
    pressure_pa: Option<f64>,
    composition: Composition,
    properties: Vec<(String, Curve)>,
    const_properties: Vec<(String, f64)>,
}
impl Material {
    /// Reference a Geant4 predefined material.
    #[must_use]
    pub fn nist(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            density: MassDensity::new::<gram_per_cubic_centimeter>(0.0),
            state: None,
            temperature_k: None,
            pressure_pa: None,
            composition: Composition::Nist,
            properties: Vec::new(),
            const_properties: Vec::new(),
        }
    }
    /// Create a compound from the number of atoms per molecule.
    ///
    /// # Errors
    /// This function returns an error if the density is not positive or no atoms are given.
    pub fn from_atom_counts(
        name: &str,
        density: MassDensity,
        atoms: &[(&str, u32)],
    ) -> GeomResult<Self> {
        if atoms.is_empty() || atoms.iter().any(|(_, n)| *n == 0) {
            return Err(GeomError::Registry(format!(
                "material {name} needs at least one element with a non-zero atom count"
            )));
        }
        Self::compound(
            name,
            density,
            Composition::AtomCounts(atoms.iter().map(|(e, n)| ((*e).to_owned(), *n)).collect()),
        )
    }
    /// Create a mixture from mass fractions.
    ///
    /// # Errors
    /// This function returns an error if the density is not positive or the mass fractions do not
    /// add up to one.
    pub fn from_mass_fractions(
        name: &str,
        density: MassDensity,
        fractions: &[(&str, f64)],
    ) -> GeomResult<Self> {
        let sum: f64 = fractions.iter().map(|(_, f)| f).sum();
        if fractions.is_empty() || (sum - 1.0).abs() > 1e-6 {
            return Err(GeomError::Registry(format!(
                "mass fractions of material {name} must add up to 1, got {sum}"
            )));
        }
        Self::compound(
            name,
            density,
            Composition::MassFractions(
                fractions.iter().map(|(e, f)| ((*e).to_owned(), *f)).collect(),
            ),
        )
    }
    fn compound(name: &str, density: MassDensity, composition: Composition) -> GeomResult<Self> {
        let rho = density.get::<gram_per_cubic_centimeter>();
        if !rho.is_finite() || rho <= 0.0 {
            return Err(GeomError::Registry(format!(
                "density of material {name} must be positive, got {rho} g/cm3"
            )));
        }
        Ok(Self {
            name: name.to_owned(),
            density,
            state: None,
            temperature_k: None,
            pressure_pa: None,
            composition,
            properties: Vec::new(),
            const_properties: Vec::new(),
        })
    }
    #[must_use]
    pub fn with_state(mut self, state: MaterialState) -> Self {
        self.state = Some(state);
        self
    }
    #[must_use]
    pub fn with_conditions(mut self, temperature_k: f64, pressure_pa: f64) -> Self {
        self.temperature_k = Some(temperature_k);
        self.pressure_pa = Some(pressure_pa);
        self
    }
    /// Attach (or replace) a wavelength dependent optical property.
    pub fn add_property(&mut self, name: &str, curve: Curve) {
        self.properties.retain(|(n, _)| n != name);
        self.properties.push((name.to_owned(), curve));
    }
    /// Attach (or replace) a constant optical property.
    pub fn add_const_property(&mut self, name: &str, value: f64) {
        self.const_properties.retain(|(n, _)| n != name);
        self.const_properties.push((name.to_owned(), value));
    }
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
    #[must_use]
    pub const fn density(&self) -> MassDensity {
        self.density
    }
    #[must_use]
    pub const fn state(&self) -> Option<MaterialState> {
        self.state
    }
    #[must_use]
    pub const fn temperature_k(&self) -> Option<f64> {
        self.temperature_k
    }
    #[must_use]
    pub const fn pressure_pa(&self) -> Option<f64> {
        self.pressure_pa
    }
    #[must_use]
    pub const fn composition(&self) -> &Composition {
        &self.composition
    }
    #[must_use]
    pub const fn is_nist(&self) -> bool {
        matches!(self.composition, Composition::Nist)
    }
    #[must_use]
    pub fn properties(&self) -> &[(String, Curve)] {
        &self.properties
    }
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Curve> {
        self.properties.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }
    #[must_use]
    pub fn const_properties(&self) -> &[(String, f64)] {
        &self.const_properties
    }
    /// Element names used by this material.
    #[must_use]
    pub fn element_names(&self) -> Vec<&str> {
        match &self.composition {
            Composition::Nist => Vec::new(),
            Composition::AtomCounts(a) => a.iter().map(|(e, _)| e.as_str()).collect(),
            Composition::MassFractions(f) => f.iter().map(|(e, _)| e.as_str()).collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::gram_per_cubic_centimeter;
    use assert_matches::assert_matches;
    #[test]
    fn mass_fractions() {
        let m = Material::from_mass_fractions(
            "tetratex",
            gram_per_cubic_centimeter!(0.35),
            &[("fluorine", 0.76), ("carbon", 0.24)],
        )
        .unwrap();
        assert_eq!(m.element_names(), vec!["fluorine", "carbon"]);
        assert!(!m.is_nist());
        assert_matches!(
            Material::from_mass_fractions(
                "bad",
                gram_per_cubic_centimeter!(0.35),
                &[("fluorine", 0.7)]
            ),
            Err(GeomError::Registry(_))
        );
    }
    #[test]
    fn atom_counts() {
        assert!(Material::from_atom_counts(
            "water",
            gram_per_cubic_centimeter!(1.0),
            &[("hydrogen", 2), ("oxygen", 1)]
        )
        .is_ok());
        assert!(Material::from_atom_counts("x", gram_per_cubic_centimeter!(0.0), &[("h", 1)]).is_err());
        assert!(Material::from_atom_counts("x", gram_per_cubic_centimeter!(1.0), &[]).is_err());
    }
    #[test]
    fn properties_replace() {
        let mut m = Material::nist("G4_AIR");
        assert!(m.is_nist());
        m.add_const_property("RESOLUTIONSCALE", 1.0);
        m.add_const_property("RESOLUTIONSCALE", 2.0);
        assert_eq!(m.const_properties(), &[("RESOLUTIONSCALE".to_owned(), 2.0)]);
        m.add_property("RINDEX", Curve::flat(1.0));
        assert!(m.property("RINDEX").is_some());
        assert!(m.property("ABSLENGTH").is_none());
    }
    #[test]
    fn element_isotopes() {
        assert!(Element::from_isotopes(
            "enr",
            "Ge",
            vec![("Ge76".into(), 0.9), ("Ge74".into(), 0.1)]
        )
        .is_ok());
        assert!(Element::from_isotopes("enr", "Ge", vec![("Ge76".into(), 0.9)]).is_err());
    }
}
