//! epub-scrub CLI entrypoint.
//!
//! Parses arguments, validates them and hands the files to the batch
//! driver. Exits with 0 when at least one file was processed.

use std::process::ExitCode;

use clap::Parser;

mod cli;

fn main() -> ExitCode {
    let args = cli::CliArgs::parse();
    cli::run(args)
}
