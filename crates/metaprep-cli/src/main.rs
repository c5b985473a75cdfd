use std::process::ExitCode;

use clap::Parser;
use metaprep_cli::{execute, init_logging, Cli};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);
    ExitCode::from(execute(&cli))
}
