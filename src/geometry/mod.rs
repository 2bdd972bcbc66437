//! In-memory geometry kernel: solids, volumes, placements, materials and optical surfaces.
pub mod envelope;
pub mod material;
pub mod registry;
pub mod solid;
pub mod surface;

pub use envelope::{find_overlaps, Envelope};
pub use material::{Composition, Element, ElementComposition, Isotope, Material, MaterialState};
pub use registry::{CacheKey, LogicalVolume, LvId, PhysicalVolume, PvId, Registry};
pub use solid::{Solid, SolidId, ZPlane};
pub use surface::{
    BorderSurface, OpticalSurface, SkinSurface, SurfaceFinish, SurfaceModel, SurfaceType,
};
