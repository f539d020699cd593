// Headless entry point. All editing happens through the library; this binary
// only parses arguments and maps the outcome to an exit code.

use std::process::ExitCode;

use canvasfe::cli::{self, CliArgs};
use clap::Parser;

fn main() -> ExitCode {
    cli::run(CliArgs::parse())
}
