//! Module for additional computational capabilities
pub mod geom_transformation;
pub mod math_utils;
pub mod test_helper;
pub mod uom_macros;
pub use geom_transformation::Isometry;
pub use math_utils::{polar_to_xy, usize_to_f64, AngleSense};
