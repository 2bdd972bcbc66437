//! Optical surface definitions and their attachment to volumes.
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::optics::Curve;

use super::registry::{LvId, PvId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum SurfaceModel {
    Glisur,
    Unified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum SurfaceFinish {
    Polished,
    PolishedFrontPainted,
    Ground,
    GroundFrontPainted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum SurfaceType {
    DielectricMetal,
    DielectricDielectric,
}

/// Optical properties of a boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpticalSurface {
    pub name: String,
    pub model: SurfaceModel,
    pub finish: SurfaceFinish,
    pub surface_type: SurfaceType,
    /// roughness parameter (sigma alpha for the unified model)
    pub value: f64,
    pub properties: Vec<(String, Curve)>,
}
impl OpticalSurface {
    #[must_use]
    pub fn unified(name: &str, finish: SurfaceFinish, surface_type: SurfaceType, value: f64) -> Self {
        Self {
            name: name.to_owned(),
            model: SurfaceModel::Unified,
            finish,
            surface_type,
            value,
            properties: Vec::new(),
        }
    }
    #[must_use]
    pub fn with_property(mut self, name: &str, curve: Curve) -> Self {
        self.properties.retain(|(n, _)| n != name);
        self.properties.push((name.to_owned(), curve));
        self
    }
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Curve> {
        self.properties.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }
}

/// Surface between two placements; photons travel from `pv1` into `pv2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorderSurface {
    pub name: String,
    pub surface: String,
    pub pv1: PvId,
    pub pv2: PvId,
}

/// Surface surrounding every placement of a logical volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkinSurface {
    pub name: String,
    pub surface: String,
    pub lv: LvId,
}
