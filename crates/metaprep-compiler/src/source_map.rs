//! Compiled units: directive bodies turned into stand-alone scripts, with
//! the line mapping back to their source files.
//!
//! A unit is a short preamble followed by the body:
//!
//! ```text
//! # colors.h:12
//! global COLORS
//! global PALETTE
//! <body line 1>
//! <body line 2>
//! ```
//!
//! The `global` lines declare the directive's exports in advance, so a
//! `let` anywhere in the body binds them in the directive namespace.

use std::path::PathBuf;

use metaprep_parser::parse_source;
use metaprep_types::ast::Program;
use metaprep_types::SourceFile;
use tracing::debug;

use crate::diagnostics::{Diagnostic, DiagnosticKind, Frame};
use crate::directive::MetaDirective;

/// Maps unit lines of one compiled unit to its source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitMap {
    pub path: PathBuf,
    pub header_line: u32,
    pub body_line: u32,
    pub preamble_len: u32,
}

impl UnitMap {
    /// Source line of unit line `line`. Preamble lines map to the header.
    pub fn source_line(&self, line: u32) -> u32 {
        if line > self.preamble_len {
            self.body_line + (line - self.preamble_len - 1)
        } else {
            self.header_line
        }
    }
}

/// A directive body, parsed and ready to run.
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    pub map: UnitMap,
    /// The synthesized script.
    pub script: SourceFile,
    pub program: Program,
}

/// The preamble and body of `directive` as one script.
pub fn synthesize(directive: &MetaDirective) -> (String, UnitMap) {
    let mut lines = vec![format!("# {}", directive.label())];
    lines.extend(directive.definitions().map(|decl| format!("global {}", decl.name)));
    let map = UnitMap {
        path: directive.path().to_path_buf(),
        header_line: directive.header_line,
        body_line: directive.body_line,
        preamble_len: lines.len() as u32,
    };
    lines.extend(directive.body.iter().cloned());
    let mut text = lines.join("\n");
    text.push('\n');
    (text, map)
}

/// Lex and parse one directive. The first syntax error is reported at its
/// source line.
pub fn compile(directive: &MetaDirective) -> Result<CompiledUnit, Diagnostic> {
    let (text, map) = synthesize(directive);
    let script = SourceFile::new(directive.label(), text);
    let parsed = parse_source(&script);

    if let Some(error) = parsed.errors.first() {
        debug!(
            "{}: {} syntax error(s)",
            directive.label(),
            parsed.errors.total_errors
        );
        let line = map.source_line(error.span.start_line);
        let mut message = error.message.clone();
        if let Some(suggestion) = &error.suggestion {
            message.push_str(&format!("; {suggestion}"));
        }
        return Err(Diagnostic::new(
            error.code,
            DiagnosticKind::Syntax,
            message,
            vec![Frame::at(&directive.file, line, None)],
        ));
    }
    let Some(program) = parsed.program else {
        return Err(Diagnostic::new(
            metaprep_types::ErrorCode::UNEXPECTED_TOKEN,
            DiagnosticKind::Syntax,
            "meta-directive body could not be parsed",
            vec![Frame::at(&directive.file, directive.header_line, None)],
        ));
    };
    Ok(CompiledUnit {
        map,
        script,
        program,
    })
}
