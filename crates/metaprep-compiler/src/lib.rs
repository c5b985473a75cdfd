//! metaprep driver.
//!
//! Runs the whole meta-preprocessing pipeline over a set of source files:
//!
//! 1. [`scanner`] finds the `#meta` directives of every unit
//! 2. [`resolver`] validates export/import declarations
//! 3. [`scheduler`] orders directives after what they import
//! 4. [`source_map`] compiles every directive body before anything runs
//! 5. [`engine`] executes them in order, writing generated files
//!
//! Any failure other than plain I/O is a [`Diagnostic`] pointing at the
//! source lines involved.

pub mod config;
pub mod diagnostics;
pub mod directive;
pub mod engine;
pub mod hook;
pub mod manifest;
pub mod resolver;
pub mod scanner;
pub mod scheduler;
pub mod source_map;
pub mod symbols;

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

pub use config::Options;
pub use diagnostics::{Diagnostic, DiagnosticKind, Frame};
pub use directive::{DeclKind, Declaration, Include, MetaDirective, ScanMode, SourceUnit};
pub use engine::Engine;
pub use hook::{Instrumentation, NoHook, TimingHook};
pub use manifest::{Manifest, ManifestEntry};
pub use resolver::DependencyGraph;
pub use source_map::{CompiledUnit, UnitMap};
pub use symbols::SymbolTable;

/// Why a run stopped.
#[derive(Debug, Error)]
pub enum MetaprepError {
    /// A located failure; render it with [`Diagnostic::render`].
    #[error("{0}")]
    Diagnostic(Box<Diagnostic>),

    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration in {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl From<Diagnostic> for MetaprepError {
    fn from(diagnostic: Diagnostic) -> Self {
        MetaprepError::Diagnostic(Box::new(diagnostic))
    }
}

impl MetaprepError {
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            MetaprepError::Diagnostic(diagnostic) => Some(diagnostic),
            _ => None,
        }
    }
}

/// What a successful run did.
#[derive(Debug)]
pub struct RunReport {
    pub directives: Vec<MetaDirective>,
    pub graph: DependencyGraph,
    /// Indices into `directives`, in execution order.
    pub schedule: Vec<usize>,
    pub manifest: Manifest,
    pub symbols: SymbolTable,
}

impl RunReport {
    /// `path:line` of each directive, in execution order.
    pub fn schedule_labels(&self) -> Vec<String> {
        self.schedule
            .iter()
            .map(|&index| self.directives[index].label())
            .collect()
    }
}

/// Read `options.sources` from disk and run them.
pub fn run(options: &Options, hook: &mut dyn Instrumentation) -> Result<RunReport, MetaprepError> {
    let units = options
        .sources
        .iter()
        .map(|path| {
            SourceUnit::read(path).map_err(|source| MetaprepError::Read {
                path: path.clone(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    run_units(units, options, hook)
}

/// Run in-memory units; `options.sources` is ignored.
pub fn run_units(
    units: Vec<SourceUnit>,
    options: &Options,
    hook: &mut dyn Instrumentation,
) -> Result<RunReport, MetaprepError> {
    let mut directives = scanner::scan(&units, &options.output_dir)?;
    let graph = resolver::resolve(&mut directives)?;
    let schedule = scheduler::schedule(&directives)?;
    let compiled = directives
        .iter()
        .map(source_map::compile)
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(path) = &options.dump_path {
        dump(path, &compiled, &schedule)?;
    }

    let (symbols, manifest) = Engine::new(&directives, &compiled, options.receipt).run(&schedule, hook)?;
    debug!(
        "processed {} meta-directive(s) in {:.3}ms",
        manifest.directives.len(),
        manifest.elapsed_ms()
    );
    Ok(RunReport {
        directives,
        graph,
        schedule,
        manifest,
        symbols,
    })
}

/// Every compiled unit, in execution order, as one script.
fn dump(path: &std::path::Path, compiled: &[CompiledUnit], schedule: &[usize]) -> Result<(), MetaprepError> {
    let text = schedule
        .iter()
        .map(|&index| compiled[index].script.source.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    debug!("dumping {} unit(s) to {}", schedule.len(), path.display());
    engine::write_output(path, &text)
}
