//! Fatal diagnostics and their rendering with source context.
//!
//! Every failure of a run that is not plain I/O becomes a [`Diagnostic`]:
//! an error code, a kind deciding the heading, a message, and frames
//! (closest first). A frame either points into a source file, carrying a
//! window of the surrounding lines, or names a native site only.
//!
//! ```text
//!    |
//!  4 | let table = [1, 2]
//!  5 | Meta.line(table[7]) <- colors.h : 5
//!  6 | */
//!    |
//!
//! [ERROR] Key exception.
//!         > index 7 is out of range for a list of length 2.
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use colored::Colorize;
use metaprep_eval::{ErrorKind, EvalError};
use metaprep_types::{ErrorCode, SourceFile};
use serde::Serialize;

/// Lines shown on each side of a frame's line.
pub const WINDOW_MARGIN: u32 = 3;

/// Width of the divider between frames.
const DIVIDER_WIDTH: usize = 80;

/// Decides the heading of a rendered diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Header, delimiter, resolution and scheduling failures.
    Structural,
    Syntax,
    Name,
    Attribute,
    Key,
    Value,
    Assertion,
    Type,
    /// The message is the identifier that was never bound.
    UnboundExport,
    Other,
}

impl From<ErrorKind> for DiagnosticKind {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Name => DiagnosticKind::Name,
            ErrorKind::Attribute => DiagnosticKind::Attribute,
            ErrorKind::Key => DiagnosticKind::Key,
            ErrorKind::Value => DiagnosticKind::Value,
            ErrorKind::Assertion => DiagnosticKind::Assertion,
            ErrorKind::Type => DiagnosticKind::Type,
            ErrorKind::Other => DiagnosticKind::Other,
        }
    }
}

/// One location of a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    /// `None` for native frames.
    pub path: Option<PathBuf>,
    pub line: u32,
    pub label: Option<String>,
    #[serde(skip)]
    pub window: Vec<(u32, String)>,
}

impl Frame {
    /// A frame at `line` of `file`.
    pub fn at(file: &SourceFile, line: u32, label: Option<String>) -> Self {
        Self {
            path: Some(file.path().to_path_buf()),
            line,
            label,
            window: file
                .window(line, WINDOW_MARGIN)
                .into_iter()
                .map(|(n, text)| (n, text.to_string()))
                .collect(),
        }
    }

    /// A frame that ran outside any source, e.g. a builtin.
    pub fn native(label: impl Into<String>) -> Self {
        Self {
            path: None,
            line: 0,
            label: Some(label.into()),
            window: Vec::new(),
        }
    }

    pub fn is_native(&self) -> bool {
        self.path.is_none()
    }

    /// `path : line [: label]`
    fn marker(&self, path: &Path) -> String {
        match &self.label {
            Some(label) => format!("{} : {} : {label}", path.display(), self.line),
            None => format!("{} : {}", path.display(), self.line),
        }
    }
}

/// A fatal error of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub kind: DiagnosticKind,
    pub message: String,
    /// Closest first.
    pub frames: Vec<Frame>,
}

impl Diagnostic {
    pub fn new(
        code: ErrorCode,
        kind: DiagnosticKind,
        message: impl Into<String>,
        frames: Vec<Frame>,
    ) -> Self {
        Self {
            code,
            kind,
            message: message.into(),
            frames,
        }
    }

    /// A header, resolution or scheduling failure.
    pub fn structural(code: ErrorCode, message: impl Into<String>, frames: Vec<Frame>) -> Self {
        Self::new(code, DiagnosticKind::Structural, message, frames)
    }

    /// A runtime failure whose trace has already been resolved to frames.
    pub fn from_eval(error: &EvalError, frames: Vec<Frame>) -> Self {
        Self::new(
            ErrorCode::RUNTIME_FAILURE,
            error.kind.into(),
            error.message.clone(),
            frames,
        )
    }

    /// The summary line, without the `[ERROR]` tag.
    pub fn heading(&self) -> String {
        match self.kind {
            DiagnosticKind::Structural => "Meta-preprocessor exception.".to_string(),
            DiagnosticKind::Syntax => "Syntax exception.".to_string(),
            DiagnosticKind::Name => "Name exception.".to_string(),
            DiagnosticKind::Attribute => "Attribute exception.".to_string(),
            DiagnosticKind::Key => "Key exception.".to_string(),
            DiagnosticKind::Value => "Value exception.".to_string(),
            DiagnosticKind::Assertion => "Assert exception.".to_string(),
            DiagnosticKind::Type => "Type exception.".to_string(),
            DiagnosticKind::UnboundExport => {
                format!("Meta-directive did not define \"{}\".", self.message)
            }
            DiagnosticKind::Other => "Runtime exception.".to_string(),
        }
    }

    /// The message as printed under the heading; `None` when the heading
    /// already says everything.
    fn detail(&self) -> Option<String> {
        match self.kind {
            DiagnosticKind::UnboundExport => None,
            _ if self.message.is_empty() => None,
            _ => Some(format!("{}.", self.message.trim_end_matches('.'))),
        }
    }

    /// Render with source windows, optionally with ANSI colors.
    pub fn render(&self, color: bool) -> String {
        let paint = Paint { color };
        let width = self
            .frames
            .iter()
            .flat_map(|frame| frame.window.iter().map(|(n, _)| *n))
            .max()
            .unwrap_or(0)
            .to_string()
            .len();
        let gutter = " ".repeat(width);

        let mut out = String::new();
        for (index, frame) in self.frames.iter().enumerate() {
            if index > 0 {
                out.push_str(&format!("{gutter} {}\n", paint.dim(":")));
                out.push_str(&format!(
                    "{gutter} {}\n",
                    paint.dim(&format!(": {}", ".".repeat(DIVIDER_WIDTH)))
                ));
                out.push_str(&format!("{gutter} {}\n", paint.dim(":")));
            } else {
                out.push_str(&format!("{gutter} {}\n", paint.dim("|")));
            }

            let Some(path) = &frame.path else {
                let label = frame.label.as_deref().unwrap_or("<native>");
                out.push_str(&format!("{gutter} {} {}\n", paint.dim("|"), paint.marker(&format!("<- {label}"))));
                continue;
            };
            for (number, text) in &frame.window {
                let line = format!("{number:>width$} {} {text}", paint.dim("|"));
                if *number == frame.line {
                    out.push_str(&format!("{} {}\n", paint.strong(&line), paint.marker(&format!("<- {}", frame.marker(path)))));
                } else {
                    out.push_str(&format!("{line}\n"));
                }
            }
            if frame.window.is_empty() {
                out.push_str(&format!("{gutter} {} {}\n", paint.dim("|"), paint.marker(&format!("<- {}", frame.marker(path)))));
            }
        }
        if !self.frames.is_empty() {
            out.push_str(&format!("{gutter} {}\n\n", paint.dim("|")));
        }

        out.push_str(&format!("{} {}\n", paint.error("[ERROR]"), self.heading()));
        if let Some(detail) = self.detail() {
            out.push_str(&format!("        > {detail}\n"));
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.heading())?;
        if let Some(detail) = self.detail() {
            write!(f, " {detail}")?;
        }
        if let Some(frame) = self.frames.iter().find(|frame| !frame.is_native()) {
            if let Some(path) = &frame.path {
                write!(f, " ({}:{})", path.display(), frame.line)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

// ── Colors ───────────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
struct Paint {
    color: bool,
}

impl Paint {
    fn dim(self, text: &str) -> String {
        if self.color {
            text.dimmed().to_string()
        } else {
            text.to_string()
        }
    }

    fn strong(self, text: &str) -> String {
        if self.color {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn marker(self, text: &str) -> String {
        if self.color {
            text.yellow().to_string()
        } else {
            text.to_string()
        }
    }

    fn error(self, text: &str) -> String {
        if self.color {
            text.red().bold().to_string()
        } else {
            text.to_string()
        }
    }
}
