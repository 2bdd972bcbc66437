use clap::Parser;
use l200geom::{
    console::{run, Args, PartialArgs},
    error::GeomResult,
};

fn main() -> GeomResult<()> {
    let partial = PartialArgs::parse();
    env_logger::Builder::new()
        .filter_level(partial.log_level())
        .parse_default_env()
        .init();
    let args = Args::try_from(partial)?;
    run(&args)
}
