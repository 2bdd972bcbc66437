//! Visualization attributes attached to logical volumes.
use std::collections::HashSet;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::{
    error::{GeomError, GeomResult},
    geometry::{LvId, Registry},
};

/// Color of a logical volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum VisColor {
    /// red, green, blue, alpha in `[0, 1]`
    Rgba([f64; 4]),
    /// not shown at all
    Invisible,
}

pub const COPPER: VisColor = VisColor::Rgba([0.72, 0.45, 0.2, 1.0]);
pub const GERMANIUM: VisColor = VisColor::Rgba([0.0, 1.0, 1.0, 1.0]);
pub const MINISHROUD: VisColor = VisColor::Rgba([1.0, 0.86, 0.86, 0.2]);
pub const FIBER_COATING: VisColor = VisColor::Rgba([0.0, 1.0, 0.0, 1.0]);
pub const ARGON: VisColor = VisColor::Rgba([0.0, 0.0, 0.0, 0.03]);

impl VisColor {
    /// Value stored in the `rmg_color` auxiliary of the GDML output.
    #[must_use]
    pub fn aux_value(&self) -> String {
        match self {
            Self::Rgba([r, g, b, a]) => format!("{r},{g},{b},{a}"),
            Self::Invisible => "-1".to_owned(),
        }
    }
    /// Parse an `rmg_color` auxiliary value.
    /// # Errors
    /// This function returns an error if the value is neither `-1` nor four comma separated
    /// numbers.
    pub fn from_aux_value(value: &str) -> GeomResult<Self> {
        if value.trim() == "-1" {
            return Ok(Self::Invisible);
        }
        let parts = value
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<Vec<f64>, _>>()
            .map_err(|e| GeomError::Gdml(format!("invalid color {value}: {e}")))?;
        let rgba: [f64; 4] = parts
            .try_into()
            .map_err(|_| GeomError::Gdml(format!("invalid color {value}: expected 4 values")))?;
        Ok(Self::Rgba(rgba))
    }
}

/// Logical volumes reachable from the world, each once, world first.
fn reachable_volumes(reg: &Registry) -> GeomResult<Vec<LvId>> {
    let world = reg
        .world()
        .ok_or_else(|| GeomError::Registry("registry has no world volume".into()))?;
    let mut seen = HashSet::from([world]);
    let mut lvs = vec![world];
    for pv in reg.walk(world) {
        if let Some((_, lv)) = reg.pv_endpoints(pv) {
            if seen.insert(lv) {
                lvs.push(lv);
            }
        }
    }
    Ok(lvs)
}

/// Create a Geant4 macro applying the colors of all volumes.
/// # Errors
/// This function returns an error if the registry has no world volume.
pub fn generate_color_macro(reg: &Registry) -> GeomResult<String> {
    let mut mac = String::new();
    for lv in reachable_volumes(reg)? {
        let (Some(color), Some(volume)) = (reg.color(lv), reg.logical_volume(lv)) else {
            continue;
        };
        let line = match color {
            VisColor::Rgba([r, g, b, a]) => {
                format!("/vis/geometry/set/colour {} 0 {r} {g} {b} {a}", volume.name())
            }
            VisColor::Invisible => {
                format!("/vis/geometry/set/visibility {} 0 false", volume.name())
            }
        };
        writeln!(mac, "{line}").map_err(|e| GeomError::Other(e.to_string()))?;
    }
    Ok(mac)
}
