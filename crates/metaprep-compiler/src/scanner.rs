//! Directive scanner: finds `#meta` directives in source units.
//!
//! A host-annotated unit carries directives in block comments, optionally
//! preceded by the include line naming the generated file:
//!
//! ```c
//! #include "colors.meta"
//! /* #meta export COLORS
//!     let COLORS = ["RED", "GREEN"]
//!     Meta.enums("Color", "u8", COLORS)
//! */
//! ```
//!
//! A whole-script unit (`.mps`) is a header followed by a body that runs to
//! the end of the file.

use std::path::Path;
use std::sync::LazyLock;

use metaprep_lexer::ALL_KEYWORDS;
use metaprep_types::text::dedent_lines;
use metaprep_types::{ErrorCode, SourceFile};
use regex::Regex;
use tracing::{debug, warn};

use crate::diagnostics::{Diagnostic, Frame};
use crate::directive::{DeclKind, Declaration, Include, MetaDirective, ScanMode, SourceUnit};

/// Name bound to the code-generation handle in every directive.
pub const RESERVED_NAME: &str = "Meta";

/// Body comment prefix ignored when dedenting.
const BODY_COMMENT: &str = "#";

static INCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(//\s*)?#\s*include\s*(?:"([^"]+)"|<([^>]+)>)"#).expect("valid include pattern")
});

static FIRST_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*/\*\s*#\s*meta\b(.*)$").expect("valid header pattern"));

static HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*#\s*meta\b(.*)$").expect("valid header pattern"));

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier pattern"));

/// Scan every unit in order.
pub fn scan(units: &[SourceUnit], output_dir: &Path) -> Result<Vec<MetaDirective>, Diagnostic> {
    let mut directives = Vec::new();
    for unit in units {
        let found = Scanner::new(unit, output_dir).scan()?;
        debug!(
            "scanned {}: {} meta-directive(s)",
            unit.path().display(),
            found.len()
        );
        directives.extend(found);
    }
    Ok(directives)
}

struct Scanner<'a> {
    unit: &'a SourceUnit,
    lines: Vec<&'a str>,
    pos: usize,
    output_dir: &'a Path,
}

impl<'a> Scanner<'a> {
    fn new(unit: &'a SourceUnit, output_dir: &'a Path) -> Self {
        Self {
            unit,
            lines: unit.file.lines().collect(),
            pos: 0,
            output_dir,
        }
    }

    fn file(&self) -> &SourceFile {
        &self.unit.file
    }

    /// 1-based number of the current line.
    fn line_number(&self) -> u32 {
        self.pos as u32 + 1
    }

    fn scan(mut self) -> Result<Vec<MetaDirective>, Diagnostic> {
        let mut directives = Vec::new();
        while self.pos < self.lines.len() {
            let include = self.includes();
            if self.pos >= self.lines.len() {
                break;
            }
            if self.header_remainder(true).is_none() {
                if let Some((include, commented)) = include {
                    if commented {
                        warn!(
                            "{}:{}: include line is not followed by a meta-directive",
                            self.file().path().display(),
                            include.line
                        );
                    }
                }
                self.pos += 1;
                continue;
            }
            let directive = self.directive(include.map(|(include, _)| include))?;
            directives.push(directive);
        }
        Ok(directives)
    }

    /// Consume consecutive include lines; the last one wins. The flag tells
    /// whether it was commented out.
    fn includes(&mut self) -> Option<(Include, bool)> {
        let mut pending = None;
        while let Some(caps) = self.lines.get(self.pos).copied().and_then(|line| INCLUDE.captures(line)) {
            let target = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
            let include = Include {
                path: self.output_dir.join(target),
                line: self.line_number(),
            };
            pending = Some((include, caps.get(1).is_some()));
            self.pos += 1;
        }
        pending
    }

    /// The remainder of the current line after `#meta`, if it is a header line.
    /// Past the first line only a bare `#meta` or one naming a declaration
    /// kind continues the header, so `# meta ...` body comments stay body.
    fn header_remainder(&self, first: bool) -> Option<&'a str> {
        let line: &'a str = self.lines.get(self.pos).copied()?;
        let host = self.unit.mode == ScanMode::HostAnnotated;
        let caps = if host {
            FIRST_HEADER
                .captures(line)
                .or_else(|| if first { None } else { HEADER.captures(line) })
        } else {
            HEADER.captures(line)
        }?;
        let remainder = caps.get(1).map(|m| m.as_str())?;
        (first || continues_header(remainder)).then_some(remainder)
    }

    fn directive(&mut self, include: Option<Include>) -> Result<MetaDirective, Diagnostic> {
        let host = self.unit.mode == ScanMode::HostAnnotated;
        let header_line = self.line_number();
        let mut decls = Vec::new();
        let mut closed = false;

        let mut first = true;
        while let Some(remainder) = self.header_remainder(first) {
            first = false;
            let remainder = match remainder.find("*/") {
                Some(at) if host => {
                    closed = true;
                    &remainder[..at]
                }
                _ => remainder,
            };
            decls.extend(self.header(remainder)?);
            self.pos += 1;
            if closed {
                break;
            }
        }
        self.check_duplicates(&decls)?;

        let body_line = self.line_number();
        let body: Vec<String> = if closed {
            Vec::new()
        } else if host {
            self.host_body(header_line)?
        } else {
            let rest = self.lines[self.pos..].iter().map(|l| l.to_string()).collect();
            self.pos = self.lines.len();
            rest
        };

        Ok(MetaDirective {
            file: self.unit.file.clone(),
            header_line,
            include,
            decls,
            body,
            body_line,
        })
    }

    /// Lines up to the closing `*/`, which ends the body mid-line.
    fn host_body(&mut self, header_line: u32) -> Result<Vec<String>, Diagnostic> {
        let mut body = Vec::new();
        while let Some(line) = self.lines.get(self.pos).copied() {
            self.pos += 1;
            match line.find("*/") {
                Some(at) => {
                    body.push(&line[..at]);
                    return Ok(dedent_lines(&body, Some(BODY_COMMENT)));
                }
                None => body.push(line),
            }
        }
        Err(Diagnostic::structural(
            ErrorCode::UNTERMINATED_BODY,
            "meta-directive is not terminated; expected \"*/\"",
            vec![Frame::at(self.file(), header_line, None)],
        ))
    }

    /// Parse one header line's remainder: empty, or `<kind> <id>, <id>, ...`.
    fn header(&self, remainder: &str) -> Result<Vec<Declaration>, Diagnostic> {
        let line = self.line_number();
        let text = remainder.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let (word, rest) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
        let fail = |code, message: String| {
            Diagnostic::structural(code, message, vec![Frame::at(self.file(), line, None)])
        };

        let kind = DeclKind::from_header(word).ok_or_else(|| {
            fail(
                ErrorCode::UNKNOWN_HEADER_KIND,
                format!("unknown header kind \"{word}\"; expected export, import or global"),
            )
        })?;
        if rest.trim().is_empty() {
            return Err(fail(
                ErrorCode::EMPTY_IDENTIFIER_LIST,
                format!("\"{kind}\" lists no identifiers"),
            ));
        }

        let mut decls = Vec::new();
        for name in rest.split(',').map(str::trim) {
            if !IDENTIFIER.is_match(name) {
                return Err(fail(
                    ErrorCode::INVALID_IDENTIFIER,
                    format!("\"{name}\" is not a valid identifier"),
                ));
            }
            if name == RESERVED_NAME || ALL_KEYWORDS.contains(&name) {
                return Err(fail(
                    ErrorCode::RESERVED_IDENTIFIER,
                    format!("\"{name}\" is reserved and cannot be declared"),
                ));
            }
            decls.push(Declaration {
                kind,
                name: name.to_string(),
                line,
            });
        }
        Ok(decls)
    }

    /// The same identifier listed twice within one kind.
    fn check_duplicates(&self, decls: &[Declaration]) -> Result<(), Diagnostic> {
        for (index, decl) in decls.iter().enumerate() {
            let same = |other: &&Declaration| other.kind == decl.kind && other.name == decl.name;
            if decls[..index].iter().any(|other| same(&other)) {
                continue;
            }
            let lines: Vec<u32> = decls[index..].iter().filter(same).map(|d| d.line).collect();
            if lines.len() > 1 {
                let frames = lines
                    .into_iter()
                    .map(|line| Frame::at(self.file(), line, None))
                    .collect();
                return Err(Diagnostic::structural(
                    ErrorCode::DUPLICATE_IDENTIFIER,
                    format!("\"{}\" is listed more than once as {}", decl.name, decl.kind),
                    frames,
                ));
            }
        }
        Ok(())
    }
}

/// Whether a `#meta` line after the first belongs to the header.
fn continues_header(remainder: &str) -> bool {
    let text = remainder.split("*/").next().unwrap_or("").trim();
    match text.split_whitespace().next() {
        None => true,
        Some(word) => DeclKind::from_header(word).is_some(),
    }
}
