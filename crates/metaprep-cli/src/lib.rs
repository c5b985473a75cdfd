//! Command-line front end: argument parsing, configuration overlay and
//! exit codes.

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, ValueEnum};
use metaprep_compiler::{MetaprepError, Options, TimingHook};
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// Exit code of a successful run.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit code of a rendered diagnostic or an I/O failure during the run.
pub const EXIT_FAILURE: u8 = 1;
/// Exit code of unusable arguments or configuration, including a
/// configuration file that cannot be read or parsed.
pub const EXIT_CONFIG: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    Auto,
    Always,
    Never,
}

#[derive(Parser, Debug)]
#[command(name = "metaprep")]
#[command(about = "Run the #meta directives of C sources and write the code they generate")]
#[command(version)]
pub struct Cli {
    /// Source files to scan, in order
    pub sources: Vec<PathBuf>,

    /// Directory include paths are resolved under
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<PathBuf>,

    /// JSON file with default options
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write every compiled directive as one script to this file
    #[arg(long)]
    pub dump: Option<PathBuf>,

    /// Do not prefix generated files with a receipt comment
    #[arg(long = "no-receipt")]
    pub no_receipt: bool,

    /// Write the run manifest (JSON) to this file
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Color diagnostics
    #[arg(long, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// The configuration file, if any, overlaid with the command line.
    pub fn options(&self) -> anyhow::Result<Options> {
        let mut options = match &self.config {
            Some(path) => Options::load(path)?,
            None => Options::default(),
        };
        if !self.sources.is_empty() {
            options.sources = self.sources.clone();
        }
        if let Some(dir) = &self.output_dir {
            options.output_dir = dir.clone();
        }
        if let Some(dump) = &self.dump {
            options.dump_path = Some(dump.clone());
        }
        if self.no_receipt {
            options.receipt = false;
        }
        options.color = match self.color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => options.color || std::io::stderr().is_terminal(),
        };
        if options.sources.is_empty() {
            bail!("no source files given");
        }
        Ok(options)
    }

    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Install the tracing subscriber; `RUST_LOG` wins over `-v`.
pub fn init_logging(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Run with parsed arguments and map the outcome to an exit code.
pub fn execute(cli: &Cli) -> u8 {
    let options = match cli.options() {
        Ok(options) => options,
        Err(e) => {
            error!("{e:#}");
            return EXIT_CONFIG;
        }
    };
    colored::control::set_override(options.color);

    let mut hook = TimingHook::new();
    match metaprep_compiler::run(&options, &mut hook) {
        Ok(report) => {
            debug!("timings:\n{}", hook.table());
            if let Some(path) = &cli.manifest {
                if let Err(e) = report.manifest.write(path) {
                    error!("{e}");
                    return EXIT_FAILURE;
                }
            }
            info!(
                "{} meta-directive(s) processed in {:.3}ms",
                report.manifest.directives.len(),
                report.manifest.elapsed_ms()
            );
            EXIT_SUCCESS
        }
        Err(MetaprepError::Diagnostic(diagnostic)) => {
            eprint!("{}", diagnostic.render(options.color));
            EXIT_FAILURE
        }
        Err(e) => {
            error!("{e}");
            EXIT_FAILURE
        }
    }
}
