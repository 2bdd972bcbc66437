//! Materials and optical surfaces used by the detector components.
//!
//! [`MaterialRegistry`] builds every material lazily on first request and stores it in the
//! geometry [`Registry`]. Later requests for the same material return the already registered
//! definition, so each material exists exactly once per construction run.
pub mod surfaces;

use std::f64::consts::PI;

use log::debug;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use uom::si::{f64::MassDensity, mass_density::gram_per_cubic_centimeter};

use crate::{
    error::{GeomError, GeomResult},
    geometry::{Element, Isotope, Material, MaterialState, Registry},
    gram_per_cubic_centimeter,
    optics::{Curve, OpticsLibrary, OpticsProperty},
};

pub use surfaces::SurfaceKind;

/// Temperature of the liquid argon in the cryostat (K).
pub const LAR_TEMPERATURE: f64 = 88.8;

/// Default enrichment in 76Ge, if the detector metadata has none.
pub const DEFAULT_ENRICHMENT: f64 = 0.9;

/// All materials that can be requested by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize)]
pub enum MaterialKind {
    #[strum(serialize = "liquid_argon")]
    LiquidArgon,
    #[strum(serialize = "metal_steel")]
    MetalSteel,
    #[strum(serialize = "metal_silicon")]
    MetalSilicon,
    #[strum(serialize = "metal_tantalum")]
    MetalTantalum,
    #[strum(serialize = "metal_copper")]
    MetalCopper,
    #[strum(serialize = "metal_caps_gold")]
    MetalCapsGold,
    #[strum(serialize = "peek")]
    Peek,
    #[strum(serialize = "pmma")]
    Pmma,
    #[strum(serialize = "pmma_cl2")]
    PmmaOut,
    #[strum(serialize = "ps_fibers")]
    PsFibers,
    #[strum(serialize = "tpb_on_fibers")]
    TpbOnFibers,
    #[strum(serialize = "tpb_on_tetratex")]
    TpbOnTetratex,
    #[strum(serialize = "tpb_on_nylon")]
    TpbOnNylon,
    #[strum(serialize = "tetratex")]
    Tetratex,
    #[strum(serialize = "nylon")]
    Nylon,
    #[strum(serialize = "pen")]
    Pen,
    #[strum(serialize = "Water")]
    Water,
    #[strum(serialize = "vm2000")]
    Vm2000,
    #[strum(serialize = "acryl")]
    Acryl,
    #[strum(serialize = "PMT_air")]
    PmtAir,
    #[strum(serialize = "borosilicate")]
    Borosilicate,
    #[strum(serialize = "G4_Galactic")]
    Galactic,
    #[strum(serialize = "G4_AIR")]
    Air,
    #[strum(serialize = "G4_STAINLESS-STEEL")]
    StainlessSteel,
    #[strum(serialize = "G4_Al")]
    Aluminium,
}

/// `(name, symbol, Z, A in g/mole)` of all natural elements in use.
const ELEMENTS: [(&str, &str, u32, f64); 19] = [
    ("Hydrogen", "H", 1, 1.00794),
    ("Boron", "B", 5, 10.811),
    ("Carbon", "C", 6, 12.011),
    ("Nitrogen", "N", 7, 14.01),
    ("Oxygen", "O", 8, 16.00),
    ("Fluorine", "F", 9, 19.00),
    ("Sodium", "Na", 11, 22.99),
    ("Aluminium", "Al", 13, 26.981_539),
    ("Silicon", "Si", 14, 28.09),
    ("argon", "Ar", 18, 39.95),
    ("Chromium", "Cr", 24, 51.9961),
    ("Manganese", "Mn", 25, 54.938_05),
    ("Iron", "Fe", 26, 55.845),
    ("Indium", "In", 49, 114.82),
    ("Cobalt", "Co", 27, 58.9332),
    ("Nickel", "Ni", 28, 58.6934),
    ("Copper", "Cu", 29, 63.55),
    ("Tantalum", "Ta", 73, 180.94),
    ("Gold", "Au", 79, 196.967),
];

const GE76_MOLAR_MASS: f64 = 75.921_402_7;
const GE74_MOLAR_MASS: f64 = 73.921_177_8;
const GE_NATURAL_MOLAR_MASS: f64 = 72.630;
const GE_NATURAL_DENSITY: f64 = 5.323;

/// Lazily constructs materials and optical surfaces.
#[derive(Debug, Clone, Default)]
pub struct MaterialRegistry {
    optics: OpticsLibrary,
}

impl MaterialRegistry {
    #[must_use]
    pub const fn new(optics: OpticsLibrary) -> Self {
        Self { optics }
    }
    #[must_use]
    pub const fn optics(&self) -> &OpticsLibrary {
        &self.optics
    }
    fn curve(&self, property: OpticsProperty) -> Curve {
        self.optics.curve(property)
    }

    /// Make sure the element with the given symbol is registered and return its name.
    fn element(reg: &mut Registry, symbol: &str) -> GeomResult<&'static str> {
        let &(name, _, z, a) = ELEMENTS
            .iter()
            .find(|(_, s, _, _)| *s == symbol)
            .ok_or_else(|| GeomError::Configuration(format!("unknown element {symbol}")))?;
        if reg.element(name).is_none() {
            reg.add_element(Element::natural(name, symbol, z, a))?;
        }
        Ok(name)
    }
    fn atoms(
        reg: &mut Registry,
        name: &str,
        density: MassDensity,
        atoms: &[(&str, u32)],
    ) -> GeomResult<Material> {
        let mut named = Vec::with_capacity(atoms.len());
        for (symbol, n) in atoms {
            named.push((Self::element(reg, symbol)?, *n));
        }
        Material::from_atom_counts(name, density, &named)
    }
    fn fractions(
        reg: &mut Registry,
        name: &str,
        density: MassDensity,
        fractions: &[(&str, f64)],
    ) -> GeomResult<Material> {
        let mut named = Vec::with_capacity(fractions.len());
        for (symbol, f) in fractions {
            named.push((Self::element(reg, symbol)?, *f));
        }
        Material::from_mass_fractions(name, density, &named)
    }

    /// Returns the name of the requested material, registering it on first use.
    /// # Errors
    /// This function returns an error if the material definition cannot be registered.
    pub fn get_material(&self, reg: &mut Registry, kind: MaterialKind) -> GeomResult<String> {
        let name = kind.to_string();
        if reg.material(&name).is_some() {
            return Ok(name);
        }
        debug!("defining material {name}");
        let material = self.build_material(reg, kind, &name)?;
        reg.add_material(material)?;
        Ok(name)
    }
    /// Like [`MaterialRegistry::get_material`], but looked up by the material name.
    /// # Errors
    /// This function returns a configuration error if no material of that name is defined.
    pub fn get_material_by_name(&self, reg: &mut Registry, name: &str) -> GeomResult<String> {
        let kind = name
            .parse::<MaterialKind>()
            .map_err(|_| GeomError::Configuration(format!("undefined material {name}")))?;
        self.get_material(reg, kind)
    }

    #[allow(clippy::too_many_lines)]
    fn build_material(
        &self,
        reg: &mut Registry,
        kind: MaterialKind,
        name: &str,
    ) -> GeomResult<Material> {
        let m = match kind {
            MaterialKind::LiquidArgon => {
                let mut lar = Self::atoms(reg, name, gram_per_cubic_centimeter!(1.390), &[("Ar", 1)])?
                    .with_state(MaterialState::Liquid)
                    .with_conditions(LAR_TEMPERATURE, 1.0e5);
                lar.add_property("RINDEX", self.curve(OpticsProperty::LarRindex));
                lar.add_property("ABSLENGTH", self.curve(OpticsProperty::LarAbsLength));
                lar.add_property("RAYLEIGH", self.curve(OpticsProperty::LarRayleighLength));
                lar.add_property(
                    "SCINTILLATIONCOMPONENT1",
                    self.curve(OpticsProperty::LarScintSpectrum),
                );
                lar.add_property(
                    "SCINTILLATIONCOMPONENT2",
                    self.curve(OpticsProperty::LarScintSpectrum),
                );
                // photons per MeV, time constants in ns
                lar.add_const_property("SCINTILLATIONYIELD", 51_000.0);
                lar.add_const_property("RESOLUTIONSCALE", 1.0);
                lar.add_const_property("SCINTILLATIONTIMECONSTANT1", 6.0);
                lar.add_const_property("SCINTILLATIONTIMECONSTANT2", 1_300.0);
                lar.add_const_property("SCINTILLATIONYIELD1", 0.23);
                lar.add_const_property("SCINTILLATIONYIELD2", 0.77);
                lar
            }
            MaterialKind::MetalSteel => Self::fractions(
                reg,
                name,
                gram_per_cubic_centimeter!(7.9),
                &[
                    ("Si", 0.01),
                    ("Cr", 0.20),
                    ("Mn", 0.02),
                    ("Fe", 0.67),
                    ("Ni", 0.10),
                ],
            )?,
            MaterialKind::MetalSilicon => {
                Self::atoms(reg, name, gram_per_cubic_centimeter!(2.330), &[("Si", 1)])?
            }
            MaterialKind::MetalTantalum => {
                Self::atoms(reg, name, gram_per_cubic_centimeter!(16.69), &[("Ta", 1)])?
            }
            MaterialKind::MetalCopper => {
                Self::atoms(reg, name, gram_per_cubic_centimeter!(8.960), &[("Cu", 1)])?
            }
            MaterialKind::MetalCapsGold => {
                // the gold foil of the source capsule, smeared over the capsule's inner volume
                let foil = PI * (2.54 / 8.0_f64).powi(2) * 50e-4;
                let capsule = PI * 0.2_f64.powi(2) * 0.4;
                Self::atoms(
                    reg,
                    name,
                    gram_per_cubic_centimeter!(19.3 * foil / capsule),
                    &[("Au", 1)],
                )?
            }
            MaterialKind::Peek => Self::atoms(
                reg,
                name,
                gram_per_cubic_centimeter!(1.320),
                &[("C", 19), ("H", 12), ("O", 3)],
            )?,
            MaterialKind::Pmma | MaterialKind::PmmaOut => {
                let mut pmma = Self::atoms(
                    reg,
                    name,
                    gram_per_cubic_centimeter!(1.2),
                    &[("H", 8), ("C", 5), ("O", 2)],
                )?;
                // the outer cladding is fluorinated and has a lower refractive index
                let rindex = if kind == MaterialKind::Pmma {
                    self.curve(OpticsProperty::PmmaRindex)
                } else {
                    self.curve(OpticsProperty::PmmaRindex).scaled(1.42 / 1.49)
                };
                pmma.add_property("RINDEX", rindex);
                pmma.add_property("ABSLENGTH", self.curve(OpticsProperty::PmmaAbsLength));
                pmma
            }
            MaterialKind::PsFibers => {
                let mut ps = Self::atoms(
                    reg,
                    name,
                    gram_per_cubic_centimeter!(1.050),
                    &[("H", 8), ("C", 8)],
                )?;
                ps.add_property("RINDEX", self.curve(OpticsProperty::FiberCoreRindex));
                ps.add_property("ABSLENGTH", self.curve(OpticsProperty::FiberCoreAbsLength));
                ps.add_property(
                    "WLSABSLENGTH",
                    self.curve(OpticsProperty::FiberCoreWlsAbsLength),
                );
                ps.add_property(
                    "WLSCOMPONENT",
                    self.curve(OpticsProperty::FiberCoreWlsEmission),
                );
                ps.add_const_property("WLSTIMECONSTANT", 12.0);
                ps
            }
            MaterialKind::TpbOnFibers | MaterialKind::TpbOnTetratex | MaterialKind::TpbOnNylon => {
                let mut tpb = Self::atoms(
                    reg,
                    name,
                    gram_per_cubic_centimeter!(1.08),
                    &[("H", 22), ("C", 28)],
                )?
                .with_state(MaterialState::Solid);
                tpb.add_property("RINDEX", self.curve(OpticsProperty::TpbRindex));
                tpb.add_property("WLSABSLENGTH", self.curve(OpticsProperty::TpbWlsAbsLength));
                tpb.add_property("WLSCOMPONENT", self.curve(OpticsProperty::TpbWlsEmission));
                tpb.add_const_property("WLSTIMECONSTANT", 0.01);
                if kind == MaterialKind::TpbOnNylon {
                    // reduced quantum efficiency of TPB in the nylon matrix
                    tpb.add_const_property("WLSMEANNUMBERPHOTONS", 1.2 * 0.7);
                    tpb.add_property("ABSLENGTH", self.curve(OpticsProperty::NylonAbsLength));
                } else {
                    tpb.add_const_property("WLSMEANNUMBERPHOTONS", 1.2);
                }
                tpb
            }
            MaterialKind::Tetratex => Self::fractions(
                reg,
                name,
                gram_per_cubic_centimeter!(0.35),
                &[("F", 0.76), ("C", 0.24)],
            )?,
            MaterialKind::Nylon => {
                let mut nylon = Self::atoms(
                    reg,
                    name,
                    gram_per_cubic_centimeter!(1.15),
                    &[("H", 2), ("N", 2), ("O", 3), ("C", 13)],
                )?;
                nylon.add_property("RINDEX", self.curve(OpticsProperty::NylonRindex));
                nylon.add_property("ABSLENGTH", self.curve(OpticsProperty::NylonAbsLength));
                nylon
            }
            MaterialKind::Pen => {
                let mut pen = Self::atoms(
                    reg,
                    name,
                    gram_per_cubic_centimeter!(1.3),
                    &[("C", 14), ("H", 10), ("O", 4)],
                )?;
                pen.add_property("RINDEX", self.curve(OpticsProperty::PenRindex));
                pen.add_property("ABSLENGTH", self.curve(OpticsProperty::PenAbsLength));
                pen.add_property("WLSABSLENGTH", self.curve(OpticsProperty::PenWlsAbsLength));
                pen.add_property("WLSCOMPONENT", self.curve(OpticsProperty::PenWlsEmission));
                pen.add_const_property("WLSTIMECONSTANT", 20.0);
                pen.add_const_property("WLSMEANNUMBERPHOTONS", 0.69);
                pen
            }
            MaterialKind::Water => {
                let mut water = Self::atoms(
                    reg,
                    name,
                    gram_per_cubic_centimeter!(1.0),
                    &[("H", 2), ("O", 1)],
                )?;
                water.add_property("RINDEX", self.curve(OpticsProperty::WaterRindex));
                water.add_property("ABSLENGTH", self.curve(OpticsProperty::WaterAbsLength));
                water
            }
            MaterialKind::Vm2000 => {
                let mut vm2000 = Self::atoms(
                    reg,
                    name,
                    gram_per_cubic_centimeter!(1.15),
                    &[("H", 2), ("N", 2), ("O", 3), ("C", 13)],
                )?;
                vm2000.add_property("WLSCOMPONENT", self.curve(OpticsProperty::Vm2000WlsEmission));
                vm2000
            }
            MaterialKind::Acryl => {
                let mut acryl = Self::atoms(
                    reg,
                    name,
                    gram_per_cubic_centimeter!(1.18),
                    &[("H", 2), ("C", 1)],
                )?;
                acryl.add_property("RINDEX", self.curve(OpticsProperty::PmmaRindex));
                acryl
            }
            MaterialKind::PmtAir => {
                let mut air = Self::atoms(
                    reg,
                    name,
                    gram_per_cubic_centimeter!(0.001_225),
                    &[("N", 3), ("O", 1)],
                )?;
                air.add_property("RINDEX", Curve::flat(1.0));
                air
            }
            MaterialKind::Borosilicate => {
                let mut glass = Self::fractions(
                    reg,
                    name,
                    gram_per_cubic_centimeter!(2.23),
                    &[
                        ("Si", 0.376),
                        ("O", 0.543),
                        ("B", 0.04),
                        ("Na", 0.029),
                        ("Al", 0.012),
                    ],
                )?;
                glass.add_property("RINDEX", self.curve(OpticsProperty::BorosilicateRindex));
                glass
            }
            MaterialKind::Galactic
            | MaterialKind::Air
            | MaterialKind::StainlessSteel
            | MaterialKind::Aluminium => Material::nist(name),
        };
        Ok(m)
    }

    /// Returns the name of an enriched germanium material, registering it on first use.
    ///
    /// The material is made of 76Ge (fraction `enrichment`) and 74Ge; its density is scaled from
    /// natural germanium by the molar mass.
    /// # Errors
    /// This function returns a configuration error if the enrichment is not in `[0, 1]`.
    pub fn enriched_germanium(&self, reg: &mut Registry, enrichment: f64) -> GeomResult<String> {
        if !(0.0..=1.0).contains(&enrichment) {
            return Err(GeomError::Configuration(format!(
                "germanium enrichment must be in [0, 1], got {enrichment}"
            )));
        }
        let name = format!("enriched_germanium{enrichment}");
        if reg.material(&name).is_some() {
            return Ok(name);
        }
        reg.add_isotope(Isotope {
            name: "Ge76".into(),
            z: 32,
            n: 76,
            a: GE76_MOLAR_MASS,
        })?;
        reg.add_isotope(Isotope {
            name: "Ge74".into(),
            z: 32,
            n: 74,
            a: GE74_MOLAR_MASS,
        })?;
        let element_name = format!("element_enriched_germanium{enrichment}");
        let mut isotopes = Vec::new();
        if enrichment > 0.0 {
            isotopes.push(("Ge76".to_owned(), enrichment));
        }
        if enrichment < 1.0 {
            isotopes.push(("Ge74".to_owned(), 1.0 - enrichment));
        }
        reg.add_element(Element::from_isotopes(&element_name, "EnrGe", isotopes)?)?;
        let molar_mass = enrichment * GE76_MOLAR_MASS + (1.0 - enrichment) * GE74_MOLAR_MASS;
        let density = GE_NATURAL_DENSITY * molar_mass / GE_NATURAL_MOLAR_MASS;
        reg.add_material(
            Material::from_atom_counts(
                &name,
                MassDensity::new::<gram_per_cubic_centimeter>(density),
                &[(element_name.as_str(), 1)],
            )?
            .with_state(MaterialState::Solid),
        )?;
        debug!("defined {name} with density {density:.3} g/cm3");
        Ok(name)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::Composition;
    use approx::assert_relative_eq;
    use assert_matches::assert_matches;
    use strum::IntoEnumIterator;
    #[test]
    fn names() {
        assert_eq!(MaterialKind::PmmaOut.to_string(), "pmma_cl2");
        assert_eq!(MaterialKind::Water.to_string(), "Water");
        assert_eq!(
            "G4_STAINLESS-STEEL".parse::<MaterialKind>().unwrap(),
            MaterialKind::StainlessSteel
        );
    }
    #[test]
    fn get_material_cached() {
        let mats = MaterialRegistry::default();
        let mut reg = Registry::new();
        let n1 = mats.get_material(&mut reg, MaterialKind::LiquidArgon).unwrap();
        let n2 = mats.get_material(&mut reg, MaterialKind::LiquidArgon).unwrap();
        assert_eq!(n1, "liquid_argon");
        assert_eq!(n1, n2);
        assert_eq!(reg.materials().len(), 1);
        assert_eq!(reg.elements().len(), 1);
        let lar = reg.material("liquid_argon").unwrap();
        assert_eq!(lar.state(), Some(MaterialState::Liquid));
        assert_relative_eq!(lar.temperature_k().unwrap(), 88.8);
        assert!(lar.property("RINDEX").is_some());
    }
    #[test]
    fn all_materials() {
        let mats = MaterialRegistry::default();
        let mut reg = Registry::new();
        for kind in MaterialKind::iter() {
            mats.get_material(&mut reg, kind).unwrap();
        }
        assert_eq!(reg.materials().len(), MaterialKind::iter().count());
        assert!(reg.material("G4_Galactic").unwrap().is_nist());
        assert_matches!(
            reg.material("metal_steel").unwrap().composition(),
            Composition::MassFractions(_)
        );
    }
    #[test]
    fn by_name() {
        let mats = MaterialRegistry::default();
        let mut reg = Registry::new();
        assert_eq!(
            mats.get_material_by_name(&mut reg, "metal_copper").unwrap(),
            "metal_copper"
        );
        assert_matches!(
            mats.get_material_by_name(&mut reg, "unobtainium"),
            Err(GeomError::Configuration(_))
        );
    }
    #[test]
    fn tpb_on_nylon_efficiency() {
        let mats = MaterialRegistry::default();
        let mut reg = Registry::new();
        mats.get_material(&mut reg, MaterialKind::TpbOnNylon).unwrap();
        mats.get_material(&mut reg, MaterialKind::TpbOnFibers).unwrap();
        let qe = |name: &str| {
            reg.material(name)
                .unwrap()
                .const_properties()
                .iter()
                .find(|(n, _)| n == "WLSMEANNUMBERPHOTONS")
                .unwrap()
                .1
        };
        assert_relative_eq!(qe("tpb_on_nylon"), qe("tpb_on_fibers") * 0.7);
    }
    #[test]
    fn enriched_germanium() {
        let mats = MaterialRegistry::default();
        let mut reg = Registry::new();
        let a = mats.enriched_germanium(&mut reg, 0.9).unwrap();
        let b = mats.enriched_germanium(&mut reg, 0.9).unwrap();
        let c = mats.enriched_germanium(&mut reg, 0.88).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(reg.isotopes().len(), 2);
        let rho = reg
            .material(&a)
            .unwrap()
            .density()
            .get::<gram_per_cubic_centimeter>();
        assert!(rho > GE_NATURAL_DENSITY);
        assert!(mats.enriched_germanium(&mut reg, 1.5).is_err());
        assert!(mats.enriched_germanium(&mut reg, 1.0).is_ok());
    }
}
