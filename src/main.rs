use std::process::ExitCode;

use clap::Parser;

use epigimp::{cli, logger};

fn main() -> ExitCode {
    let args = cli::CliArgs::parse();
    logger::init(args.verbose);
    tracing::info!("epigimp {} starting", env!("CARGO_PKG_VERSION"));
    cli::run(args)
}
