#![warn(missing_docs)]
//! Command line interface of `legend-pygeom-l200`.
//!
//! [`PartialArgs`] is what clap parses. [`Args`] is the validated form with the configuration
//! file already merged in. Options given on the command line override the configuration file.
use std::{
    fs,
    path::{Path, PathBuf},
};

use clap::Parser;
use log::{info, LevelFilter};

use crate::{
    config::{FiberDetail, GeometryConfig},
    core::construct,
    det_utils::{auxiliary_json, generate_detector_macro},
    error::{GeomError, GeomResult},
    gdml::to_gdml,
    vis_utils::generate_color_macro,
};

/// Raw command line arguments.
#[derive(Parser, Debug, Default)]
#[command(name = "legend-pygeom-l200", author, version, about, long_about = None)]
pub struct PartialArgs {
    /// file name for the output GDML geometry
    pub filename: Option<String>,

    /// increase the program verbosity
    #[arg(short, long)]
    pub verbose: bool,

    /// increase the program verbosity to maximum
    #[arg(short, long)]
    pub debug: bool,

    /// file name of a Geant4 macro with the visualization attributes
    #[arg(long)]
    pub vis_macro_file: Option<String>,

    /// file name of a Geant4 macro registering the active detectors
    #[arg(long)]
    pub det_macro_file: Option<String>,

    /// file name of a JSON dump of the detector table
    #[arg(long)]
    pub aux_file: Option<String>,

    /// assemblies to build, e.g. `strings,calibration` or `+watertank,-fibers`
    #[arg(long)]
    pub assemblies: Option<String>,

    /// fiber shroud model: coarse segments (`segmented`) or single fibers (`detailed`)
    #[arg(long)]
    pub fiber_modules: Option<String>,

    /// PMT layout of the water tank (`LEGEND200` or `GERDA`)
    #[arg(long)]
    pub pmt_config: Option<String>,

    /// JSON or YAML file with geometry options
    #[arg(long)]
    pub config: Option<String>,

    /// build from the bundled public stand-in metadata
    #[arg(long)]
    pub public_geom: bool,

    /// timestamp (`YYYYMMDDTHHMMSSZ`) selecting the hardware channel map
    #[arg(long)]
    pub timestamp: Option<String>,

    /// fail if assemblies in the argon overlap
    #[arg(long)]
    pub check_overlaps: bool,
}
impl PartialArgs {
    /// Log level selected by `--verbose` / `--debug`.
    #[must_use]
    pub const fn log_level(&self) -> LevelFilter {
        if self.debug {
            LevelFilter::Debug
        } else if self.verbose {
            LevelFilter::Info
        } else {
            LevelFilter::Warn
        }
    }
}

/// Validated arguments of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Args {
    /// output GDML file
    pub filename: PathBuf,
    /// output detector macro
    pub det_macro_file: Option<PathBuf>,
    /// output visualization macro
    pub vis_macro_file: Option<PathBuf>,
    /// output JSON detector table
    pub aux_file: Option<PathBuf>,
    /// geometry options after merging the command line over the configuration file
    pub config: GeometryConfig,
}

impl TryFrom<PartialArgs> for Args {
    type Error = GeomError;

    fn try_from(part_args: PartialArgs) -> GeomResult<Self> {
        let filename = part_args
            .filename
            .filter(|f| !f.is_empty())
            .ok_or_else(|| GeomError::Console("no output file specified".into()))?;

        let mut config = match &part_args.config {
            Some(path) => GeometryConfig::from_file(Path::new(path))?,
            None => GeometryConfig::default(),
        };
        if let Some(assemblies) = part_args.assemblies {
            config.assemblies = Some(assemblies.split(',').map(str::to_owned).collect());
        }
        if let Some(detail) = part_args.fiber_modules {
            config.fiber_modules = Some(detail.parse::<FiberDetail>().map_err(|_| {
                GeomError::Console(format!(
                    "invalid fiber model {detail}, expected segmented or detailed"
                ))
            })?);
        }
        if let Some(pmt_config) = part_args.pmt_config {
            config.pmt_config = Some(pmt_config);
        }
        if let Some(timestamp) = part_args.timestamp {
            config.metadata_timestamp = Some(timestamp);
        }
        if part_args.public_geom {
            config.public_geometry = true;
        }
        if part_args.check_overlaps {
            config.check_overlaps = true;
        }
        // fail before the (slow) construction starts
        config.assembly_selection()?;
        config.pmt_configuration()?;
        config.timestamp()?;

        Ok(Self {
            filename: PathBuf::from(filename),
            det_macro_file: part_args.det_macro_file.map(PathBuf::from),
            vis_macro_file: part_args.vis_macro_file.map(PathBuf::from),
            aux_file: part_args.aux_file.map(PathBuf::from),
            config,
        })
    }
}

fn write_file(path: &Path, contents: &str) -> GeomResult<()> {
    fs::write(path, contents)
        .map_err(|e| GeomError::Console(format!("cannot write file {} : {e}", path.display())))
}

/// Build the geometry and write all requested files.
///
/// Nothing is written unless the geometry and every output could be created.
/// # Errors
/// This function returns an error if the construction fails or a file cannot be written.
pub fn run(args: &Args) -> GeomResult<()> {
    let registry = construct(&args.config)?;
    let mut outputs = vec![(args.filename.as_path(), to_gdml(&registry)?)];
    if let Some(path) = &args.det_macro_file {
        outputs.push((path.as_path(), generate_detector_macro(&registry)?));
    }
    if let Some(path) = &args.vis_macro_file {
        outputs.push((path.as_path(), generate_color_macro(&registry)?));
    }
    if let Some(path) = &args.aux_file {
        let aux = auxiliary_json(&registry)?;
        let text =
            serde_json::to_string_pretty(&aux).map_err(|e| GeomError::Console(e.to_string()))?;
        outputs.push((path.as_path(), text));
    }
    for (path, contents) in outputs {
        info!("writing {}", path.display());
        write_file(path, &contents)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Assembly;
    use assert_matches::assert_matches;
    use std::io::Write;
    use tempfile::{tempdir, Builder};

    fn parse(args: &[&str]) -> GeomResult<Args> {
        let partial = PartialArgs::try_parse_from(
            std::iter::once("legend-pygeom-l200").chain(args.iter().copied()),
        )
        .map_err(|e| GeomError::Console(e.to_string()))?;
        Args::try_from(partial)
    }
    fn config_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }
    #[test]
    fn defaults() {
        let args = parse(&["out.gdml"]).unwrap();
        assert_eq!(args.filename, PathBuf::from("out.gdml"));
        assert_eq!(args.config.fiber_detail(), FiberDetail::Segmented);
        assert_eq!(
            args.config.assembly_selection().unwrap().resolve(),
            Assembly::defaults()
        );
        assert!(args.det_macro_file.is_none());
        assert!(!args.config.check_overlaps);
        let args = parse(&["out.gdml", "--check-overlaps"]).unwrap();
        assert!(args.config.check_overlaps);
    }
    #[test]
    fn missing_filename() {
        assert_matches!(parse(&[]), Err(GeomError::Console(_)));
        assert_matches!(parse(&["--public-geom"]), Err(GeomError::Console(_)));
    }
    #[test]
    fn log_levels() {
        assert_eq!(PartialArgs::default().log_level(), LevelFilter::Warn);
        let p = PartialArgs::try_parse_from(["x", "-v"]).unwrap();
        assert_eq!(p.log_level(), LevelFilter::Info);
        let p = PartialArgs::try_parse_from(["x", "-v", "--debug"]).unwrap();
        assert_eq!(p.log_level(), LevelFilter::Debug);
    }
    #[test]
    fn command_line_overrides_config() {
        let file = config_file("assemblies: wlsr,fibers\nfiber_modules: detailed\n");
        let path = file.path().to_str().unwrap();
        let args = parse(&["out.gdml", "--config", path]).unwrap();
        assert_eq!(args.config.fiber_detail(), FiberDetail::Detailed);
        assert_eq!(
            args.config.assembly_selection().unwrap().resolve(),
            [Assembly::Wlsr, Assembly::Fibers].into_iter().collect()
        );
        let args = parse(&["out.gdml", "--config", path, "--fiber-modules", "segmented"]).unwrap();
        assert_eq!(args.config.fiber_detail(), FiberDetail::Segmented);
        assert_eq!(args.config.assemblies.as_ref().unwrap().len(), 2);
        let args = parse(&[
            "out.gdml",
            "--config",
            path,
            "--assemblies",
            "strings,calibration",
        ])
        .unwrap();
        assert_eq!(args.config.fiber_detail(), FiberDetail::Detailed);
        assert_eq!(
            args.config.assemblies,
            Some(vec!["strings".to_owned(), "calibration".to_owned()])
        );
    }
    #[test]
    fn invalid_options() {
        assert_matches!(
            parse(&["out.gdml", "--fiber-modules", "fancy"]),
            Err(GeomError::Console(_))
        );
        assert_matches!(
            parse(&["out.gdml", "--assemblies", "strings,+top"]),
            Err(GeomError::Configuration(_))
        );
        assert_matches!(
            parse(&["out.gdml", "--pmt-config", "LEGEND1000"]),
            Err(GeomError::Configuration(_))
        );
        assert_matches!(
            parse(&["out.gdml", "--timestamp", "yesterday"]),
            Err(GeomError::Configuration(_))
        );
        assert_matches!(
            parse(&["out.gdml", "--config", "geometry.toml"]),
            Err(GeomError::Console(_))
        );
    }
    #[test]
    fn writes_all_outputs() {
        let dir = tempdir().unwrap();
        let out = |name: &str| dir.path().join(name).to_str().unwrap().to_owned();
        let args = parse(&[
            &out("l200.gdml"),
            "--public-geom",
            "--assemblies",
            "wlsr,top",
            "--det-macro-file",
            &out("det.mac"),
            "--vis-macro-file",
            &out("vis.mac"),
            "--aux-file",
            &out("aux.json"),
        ])
        .unwrap();
        run(&args).unwrap();
        let gdml = fs::read_to_string(out("l200.gdml")).unwrap();
        assert!(gdml.contains("<world ref=\"world\"/>"));
        let det = fs::read_to_string(out("det.mac")).unwrap();
        assert_eq!(det, "/RMG/Geometry/RegisterDetector Scintillator lar 0\n");
        assert!(fs::read_to_string(out("vis.mac")).unwrap().contains("world"));
        let aux: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out("aux.json")).unwrap()).unwrap();
        assert_eq!(aux["scintillator"]["lar"], 0);
    }
    #[test]
    fn no_output_on_failure() {
        let dir = tempdir().unwrap();
        let gdml = dir.path().join("l200.gdml");
        let file = config_file("sis:\n  \"9\":\n    sis_z: 8000\n");
        let args = parse(&[
            gdml.to_str().unwrap(),
            "--public-geom",
            "--assemblies",
            "calibration",
            "--config",
            file.path().to_str().unwrap(),
        ])
        .unwrap();
        assert_matches!(run(&args), Err(GeomError::Configuration(_)));
        assert!(!gdml.exists());
    }
}
