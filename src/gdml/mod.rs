#![warn(missing_docs)]
//! GDML export of the finished geometry and a reader for the auxiliary side channel.
//!
//! Detector tags and volume colors travel inside the file as `<auxiliary>` elements, so a
//! simulation reading only the GDML file can recover them.
use std::{fs, path::Path};

use log::info;

use crate::{
    error::{GeomError, GeomResult},
    geometry::Registry,
};

pub mod reader;
pub mod writer;

pub use reader::{parse_gdml, GdmlPlacement, GdmlSummary};
pub use writer::to_gdml;

/// Write the geometry to a GDML file.
/// # Errors
/// This function returns an error if the document cannot be created or the file cannot be
/// written.
pub fn write_gdml(reg: &Registry, path: &Path) -> GeomResult<()> {
    let text = to_gdml(reg)?;
    info!("exporting GDML geometry to {}", path.display());
    fs::write(path, text)
        .map_err(|e| GeomError::Gdml(format!("cannot write {}: {e}", path.display())))
}

/// Read the summary of a GDML file.
/// # Errors
/// This function returns an error if the file cannot be read or parsed.
pub fn read_gdml(path: &Path) -> GeomResult<GdmlSummary> {
    let text = fs::read_to_string(path)
        .map_err(|e| GeomError::Gdml(format!("cannot read {}: {e}", path.display())))?;
    parse_gdml(&text)
}
