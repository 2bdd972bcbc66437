//! This is the documentation for the **l200geom** package. It procedurally builds the geometry
//! of the LEGEND-200 experiment (cryostat, germanium strings, fiber shroud, calibration system,
//! reflector, top plate and water tank) from hardware metadata and exports it as GDML together
//! with the Geant4 macros a simulation needs.
//!
//! The entry point is [`core::construct`], which returns the finished [`geometry::Registry`].
pub mod calibration;
pub mod config;
pub mod console;
pub mod core;
pub mod cryo;
pub mod det_utils;
pub mod error;
pub mod fibers;
pub mod gdml;
pub mod geometry;
pub mod hpge;
pub mod materials;
pub mod metadata;
pub mod optics;
pub mod top;
pub mod utils;
pub mod vis_utils;
pub mod watertank;
pub mod wlsr;

