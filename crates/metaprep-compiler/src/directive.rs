//! Source units and the meta-directives found in them.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use metaprep_types::SourceFile;
use serde::Serialize;

/// How a source file carries its directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Directives live in `/* #meta ... */` comments of a host file.
    HostAnnotated,
    /// The file is a script; everything after the header is the body.
    WholeScript,
}

/// Extension of whole-script files.
pub const SCRIPT_EXTENSION: &str = "mps";

impl ScanMode {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(SCRIPT_EXTENSION) => ScanMode::WholeScript,
            _ => ScanMode::HostAnnotated,
        }
    }
}

/// A source file read once, with its scan mode.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub file: Rc<SourceFile>,
    pub mode: ScanMode,
}

impl SourceUnit {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let file = SourceFile::new(path, text);
        let mode = ScanMode::for_path(file.path());
        Self {
            file: Rc::new(file),
            mode,
        }
    }

    pub fn read(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Ok(Self::new(path, text))
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

// ── Declarations ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclKind {
    Export,
    Import,
    /// An export that every directive without its own `global` list sees.
    Global,
    /// An import added by the resolver.
    Implicit,
}

impl DeclKind {
    /// Kinds that can be written in a header.
    pub fn from_header(word: &str) -> Option<Self> {
        match word {
            "export" => Some(DeclKind::Export),
            "import" => Some(DeclKind::Import),
            "global" => Some(DeclKind::Global),
            _ => None,
        }
    }

    pub fn defines(self) -> bool {
        matches!(self, DeclKind::Export | DeclKind::Global)
    }

    pub fn imports(self) -> bool {
        matches!(self, DeclKind::Import | DeclKind::Implicit)
    }
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeclKind::Export => "export",
            DeclKind::Import => "import",
            DeclKind::Global => "global",
            DeclKind::Implicit => "implicit",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub kind: DeclKind,
    pub name: String,
    /// Header line of the declaration; for implicit imports, the first
    /// header line of the directive.
    pub line: u32,
}

/// The output file a directive generates into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Include {
    /// Already joined with the output directory.
    pub path: PathBuf,
    pub line: u32,
}

// ── Directive ────────────────────────────────────────────────────────────────

/// One meta-directive; identified by its file and first header line.
#[derive(Debug, Clone)]
pub struct MetaDirective {
    pub file: Rc<SourceFile>,
    pub header_line: u32,
    pub include: Option<Include>,
    pub decls: Vec<Declaration>,
    /// Dedented body lines.
    pub body: Vec<String>,
    /// Source line of the first body line.
    pub body_line: u32,
}

impl MetaDirective {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// `path:line`
    pub fn label(&self) -> String {
        format!("{}:{}", self.path().display(), self.header_line)
    }

    /// Declarations this directive must bind (`export` and `global`).
    pub fn definitions(&self) -> impl Iterator<Item = &Declaration> + '_ {
        self.decls.iter().filter(|d| d.kind.defines())
    }

    /// Explicit and implicit imports.
    pub fn imports(&self) -> impl Iterator<Item = &Declaration> + '_ {
        self.decls.iter().filter(|d| d.kind.imports())
    }

    pub fn defines(&self, name: &str) -> bool {
        self.definitions().any(|d| d.name == name)
    }

    pub fn declares(&self, name: &str) -> bool {
        self.decls.iter().any(|d| d.name == name)
    }

    /// Whether the header named any identifier itself.
    pub fn has_explicit_identifiers(&self) -> bool {
        self.decls.iter().any(|d| d.kind != DeclKind::Implicit)
    }

    pub fn has_global_list(&self) -> bool {
        self.decls.iter().any(|d| d.kind == DeclKind::Global)
    }
}
