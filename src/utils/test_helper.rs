//! Helpers for unit tests: log assertions and a ready-made construction context.
//!
//! Only compiled for tests.

#[cfg(test)]
pub mod test_helper {
    use log::Level;

    use crate::{
        config::GeometryConfig,
        core::InstrumentationData,
        cryo,
        geometry::{LvId, PvId, Registry, Solid},
        materials::{MaterialKind, MaterialRegistry},
        metadata::{self, InstrumentationMetadata, PublicMetadataProxy},
        millimeter,
    };

    /// Assert that exactly the given messages were logged with `level`, in this order.
    pub fn check_logged(level: Level, expected: &[&str]) {
        testing_logger::validate(|captured_logs| {
            let bodies: Vec<&str> = captured_logs
                .iter()
                .filter(|l| l.level == level)
                .map(|l| l.body.as_str())
                .collect();
            assert_eq!(bodies, expected);
        });
    }
    pub fn check_warnings(expected_warnings: Vec<&str>) {
        check_logged(Level::Warn, &expected_warnings);
    }
    /// Assert that at least one warning containing `fragment` was logged.
    pub fn check_warning_contains(fragment: &str) {
        testing_logger::validate(|captured_logs| {
            assert!(
                captured_logs
                    .iter()
                    .any(|l| l.level == Level::Warn && l.body.contains(fragment)),
                "no warning containing '{fragment}'"
            );
        });
    }

    /// A world with the cryostat (centred at the origin) and everything a builder needs.
    pub struct TestContext {
        pub reg: Registry,
        pub materials: MaterialRegistry,
        pub metadata: InstrumentationMetadata,
        pub config: GeometryConfig,
        pub lar_lv: LvId,
        pub lar_pv: PvId,
        top_plate_z: f64,
    }
    impl TestContext {
        /// Context without any channels, only the bundled array layout.
        pub fn new() -> Self {
            let config = GeometryConfig::default();
            let metadata = InstrumentationMetadata {
                special: metadata::resolve_special(&config, None).unwrap(),
                ..InstrumentationMetadata::default()
            };
            Self::with_metadata(config, metadata)
        }
        /// Context with the public stand-in channels, overridden by `config`.
        pub fn public(config: GeometryConfig) -> Self {
            let config = GeometryConfig {
                public_geometry: true,
                ..config
            };
            let metadata =
                metadata::resolve(&config, &PublicMetadataProxy::new().unwrap()).unwrap();
            Self::with_metadata(config, metadata)
        }
        pub fn with_metadata(config: GeometryConfig, metadata: InstrumentationMetadata) -> Self {
            let mut reg = Registry::new();
            let materials = MaterialRegistry::default();
            let vacuum = materials.get_material(&mut reg, MaterialKind::Galactic).unwrap();
            let world = reg
                .add_volume(
                    "world",
                    Solid::cuboid(millimeter!(2e4), millimeter!(2e4), millimeter!(2e4)).unwrap(),
                    &vacuum,
                )
                .unwrap();
            reg.set_world(world).unwrap();
            let cryostat = cryo::build_cryostat(&mut reg, &materials).unwrap();
            let lar_pv =
                cryo::place_cryostat(&mut reg, &cryostat, world, millimeter!(0.0)).unwrap();
            Self {
                reg,
                materials,
                metadata,
                config,
                lar_lv: cryostat.lar_lv,
                lar_pv,
                top_plate_z: cryostat
                    .top_plate_z()
                    .get::<uom::si::length::millimeter>(),
            }
        }
        /// The registry and a builder context borrowing the rest.
        pub fn split(&mut self) -> (&mut Registry, InstrumentationData<'_>) {
            (
                &mut self.reg,
                InstrumentationData {
                    mother_lv: self.lar_lv,
                    mother_pv: self.lar_pv,
                    materials: &self.materials,
                    metadata: &self.metadata,
                    config: &self.config,
                    top_plate_z: millimeter!(self.top_plate_z),
                },
            )
        }
    }
}
