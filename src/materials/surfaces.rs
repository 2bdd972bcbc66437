//! Optical surfaces between the detector components.
//!
//! All surfaces use the `unified` model; the roughness values below are tuned for it and are not
//! transferable to other models.
use log::debug;
use strum::{Display, EnumIter, EnumString};

use super::MaterialRegistry;
use crate::{
    error::{GeomError, GeomResult},
    geometry::{OpticalSurface, Registry, SurfaceFinish, SurfaceType},
    optics::{Curve, OpticsProperty},
};

/// All optical surfaces that can be requested by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum SurfaceKind {
    ToCopper,
    ToGermanium,
    ToTetratex,
    ToSipmSilicon,
    LarToTpb,
    LarToPen,
    WlsrTpbToTetratex,
    ToVm2000,
    WaterToVm2000,
    ToPmtSteel,
    ToPhotocathode,
}
impl SurfaceKind {
    /// Name of the optical surface in the geometry output.
    #[must_use]
    pub fn surface_name(&self) -> String {
        match self {
            Self::ToVm2000 => "water_tank_foil_surface".to_owned(),
            Self::WaterToVm2000 => "WaterTankFoilBorder".to_owned(),
            Self::ToPmtSteel => "pmt_steel_surface".to_owned(),
            Self::ToPhotocathode => "pmt_cathode_surface".to_owned(),
            other => format!("surface_{other}"),
        }
    }
}

impl MaterialRegistry {
    /// Returns the name of the requested optical surface, registering it on first use.
    /// # Errors
    /// This function returns an error if the surface cannot be registered.
    pub fn get_surface(&self, reg: &mut Registry, kind: SurfaceKind) -> GeomResult<String> {
        let name = kind.surface_name();
        if reg.optical_surface(&name).is_some() {
            return Ok(name);
        }
        debug!("defining optical surface {name}");
        reg.add_optical_surface(self.build_surface(kind, &name))?;
        Ok(name)
    }
    /// Like [`MaterialRegistry::get_surface`], but looked up by the surface kind name
    /// (e.g. `to_copper`).
    /// # Errors
    /// This function returns a configuration error if no surface of that name is defined.
    pub fn get_surface_by_name(&self, reg: &mut Registry, name: &str) -> GeomResult<String> {
        let kind = name
            .parse::<SurfaceKind>()
            .map_err(|_| GeomError::Configuration(format!("undefined optical surface {name}")))?;
        self.get_surface(reg, kind)
    }

    fn build_surface(&self, kind: SurfaceKind, name: &str) -> OpticalSurface {
        let optics = self.optics();
        match kind {
            SurfaceKind::ToCopper => OpticalSurface::unified(
                name,
                SurfaceFinish::Ground,
                SurfaceType::DielectricMetal,
                0.5,
            )
            .with_property(
                "REFLECTIVITY",
                optics.curve(OpticsProperty::CopperReflectivity),
            ),
            SurfaceKind::ToGermanium => OpticalSurface::unified(
                name,
                SurfaceFinish::Ground,
                SurfaceType::DielectricMetal,
                0.3,
            )
            .with_property(
                "REFLECTIVITY",
                optics.curve(OpticsProperty::GermaniumReflectivity),
            ),
            // lambertian reflection only
            SurfaceKind::ToTetratex | SurfaceKind::WlsrTpbToTetratex => OpticalSurface::unified(
                name,
                SurfaceFinish::GroundFrontPainted,
                SurfaceType::DielectricDielectric,
                0.0,
            )
            .with_property(
                "REFLECTIVITY",
                optics.curve(OpticsProperty::TetratexReflectivity),
            ),
            SurfaceKind::ToSipmSilicon => OpticalSurface::unified(
                name,
                SurfaceFinish::Ground,
                SurfaceType::DielectricMetal,
                0.05,
            )
            .with_property(
                "REFLECTIVITY",
                optics.curve(OpticsProperty::SiliconReflectivity),
            )
            .with_property("EFFICIENCY", optics.curve(OpticsProperty::SipmEfficiency)),
            SurfaceKind::LarToTpb => OpticalSurface::unified(
                name,
                SurfaceFinish::Ground,
                SurfaceType::DielectricDielectric,
                0.3,
            ),
            SurfaceKind::LarToPen => {
                let flat = |v: f64| Curve::new(vec![(650.0, v), (115.0, v)]).unwrap_or_else(|_| Curve::flat(v));
                OpticalSurface::unified(
                    name,
                    SurfaceFinish::Ground,
                    SurfaceType::DielectricDielectric,
                    0.01,
                )
                .with_property("SPECULARSPIKECONSTANT", flat(0.6))
                .with_property("SPECULARLOBECONSTANT", flat(0.4))
            }
            SurfaceKind::ToVm2000 | SurfaceKind::WaterToVm2000 => OpticalSurface::unified(
                name,
                SurfaceFinish::Polished,
                SurfaceType::DielectricMetal,
                0.3,
            )
            .with_property(
                "REFLECTIVITY",
                optics.curve(OpticsProperty::Vm2000Reflectivity),
            ),
            SurfaceKind::ToPmtSteel => OpticalSurface::unified(
                name,
                SurfaceFinish::Polished,
                SurfaceType::DielectricMetal,
                0.3,
            )
            .with_property(
                "REFLECTIVITY",
                optics.curve(OpticsProperty::PmtSteelReflectivity),
            )
            .with_property("EFFICIENCY", Curve::flat(0.0)),
            SurfaceKind::ToPhotocathode => OpticalSurface::unified(
                name,
                SurfaceFinish::Polished,
                SurfaceType::DielectricMetal,
                0.01,
            )
            .with_property("REFLECTIVITY", Curve::flat(0.0))
            .with_property(
                "EFFICIENCY",
                optics.curve(OpticsProperty::PhotocathodeEfficiency),
            ),
        }
    }
}
