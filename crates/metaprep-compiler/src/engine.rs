//! Execution engine: runs scheduled directives and writes their output.

use std::path::Path;
use std::time::Instant;

use metaprep_codegen::{Emitter, OutputTarget};
use metaprep_eval::{EvalError, Evaluator, FrameSite};
use metaprep_types::ErrorCode;
use tracing::debug;

use crate::diagnostics::{Diagnostic, DiagnosticKind, Frame};
use crate::directive::MetaDirective;
use crate::hook::Instrumentation;
use crate::manifest::{digest, Manifest, ManifestEntry};
use crate::source_map::CompiledUnit;
use crate::symbols::SymbolTable;
use crate::MetaprepError;

/// Label of a directive's top-level frame.
const TOP_LEVEL: &str = "<meta-directive>";

/// Runs directives one at a time against one emitter and symbol table.
pub struct Engine<'r> {
    directives: &'r [MetaDirective],
    units: &'r [CompiledUnit],
    emitter: Emitter,
    symbols: SymbolTable,
    manifest: Manifest,
}

impl<'r> Engine<'r> {
    /// `units[i]` is the compiled body of `directives[i]`.
    pub fn new(directives: &'r [MetaDirective], units: &'r [CompiledUnit], receipt: bool) -> Self {
        Self {
            directives,
            units,
            emitter: Emitter::with_receipt(receipt),
            symbols: SymbolTable::new(),
            manifest: Manifest::default(),
        }
    }

    /// Run every directive in `order`. Output of directives that finished
    /// stays on disk when a later one fails.
    pub fn run(
        mut self,
        order: &[usize],
        hook: &mut dyn Instrumentation,
    ) -> Result<(SymbolTable, Manifest), MetaprepError> {
        for &index in order {
            self.execute(index, hook)?;
        }
        Ok((self.symbols, self.manifest))
    }

    fn execute(&mut self, index: usize, hook: &mut dyn Instrumentation) -> Result<(), MetaprepError> {
        let directive = &self.directives[index];
        let unit = &self.units[index];
        let started = Instant::now();

        let mut env = self.symbols.namespace_for(directive);
        let target = directive.include.as_ref().map(|include| OutputTarget {
            path: include.path.clone(),
            source: directive.path().display().to_string(),
            line: include.line,
        });
        self.emitter.reset(directive.label(), target);
        hook.before(directive);

        let result = Evaluator::new(&mut self.emitter).run(&unit.program, index, &mut env);
        if let Err(error) = result {
            return Err(self.runtime(&error));
        }

        if let Err(name) = self.symbols.merge(directive, &env) {
            let line = directive
                .definitions()
                .find(|decl| decl.name == name)
                .map_or(directive.header_line, |decl| decl.line);
            return Err(Diagnostic::new(
                ErrorCode::UNBOUND_EXPORT,
                DiagnosticKind::UnboundExport,
                name,
                vec![Frame::at(&directive.file, line, None)],
            )
            .into());
        }

        let generated = self.emitter.finish();
        let mut entry = ManifestEntry {
            source: directive.path().to_path_buf(),
            line: directive.header_line,
            output: None,
            exports: directive.definitions().map(|decl| decl.name.clone()).collect(),
            elapsed_ms: 0.0,
            sha256: None,
        };
        if let Some(generated) = &generated {
            write_output(&generated.path, &generated.text)?;
            debug!(
                "{}: wrote {} bytes to {}",
                directive.label(),
                generated.text.len(),
                generated.path.display()
            );
            entry.output = Some(generated.path.clone());
            entry.sha256 = Some(digest(&generated.text));
        }
        hook.after(directive, generated.as_ref().map(|g| g.text.as_str()));

        entry.elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.manifest.directives.push(entry);
        Ok(())
    }

    /// Resolve an evaluation trace to source frames.
    fn runtime(&self, error: &EvalError) -> MetaprepError {
        let frames = error
            .trace
            .iter()
            .map(|frame| match frame.site {
                FrameSite::Unit(unit) => {
                    let directive = &self.directives[unit];
                    let line = self.units[unit].map.source_line(frame.line);
                    let label = frame.label.clone().unwrap_or_else(|| TOP_LEVEL.to_string());
                    Frame::at(&directive.file, line, Some(label))
                }
                FrameSite::Native => {
                    Frame::native(frame.label.clone().unwrap_or_else(|| "<native>".to_string()))
                }
            })
            .collect();
        Diagnostic::from_eval(error, frames).into()
    }
}

/// Write `text` to `path`, creating missing parent directories.
pub(crate) fn write_output(path: &Path, text: &str) -> Result<(), MetaprepError> {
    let write = || -> std::io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, text)
    };
    write().map_err(|source| MetaprepError::Write {
        path: path.to_path_buf(),
        source,
    })
}
