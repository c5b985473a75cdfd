//! Scope inference: which delimiters surround a generated block.
//!
//! The rules are checked in order against the header's leading keyword
//! (an optional `#` followed by word characters); the first match wins.
//!
//! | Header                                   | Opening | Closing    | Extra indent |
//! |------------------------------------------|---------|------------|--------------|
//! | `#define ...`                            |         |            | (macro mode) |
//! | `#if`, `#ifdef`, `#ifndef`, `#elif`, `#else` |     | `#endif`   |              |
//! | `assert`, `static_assert`, `_Static_assert` | `(`  | `);`       |              |
//! | `struct`, `union`, `enum`                | `{`     | `};`       |              |
//! | `case`                                   | `{`     | `} break;` |              |
//! | anything ending in `=`                   | `{`     | `};`       | yes          |
//! | anything else, or no header              | `{`     | `}`        |              |

/// Delimiters inferred for a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiters {
    pub opening: Option<&'static str>,
    pub closing: Option<&'static str>,
    /// The delimiters themselves sit one level deeper than the header.
    pub indented: bool,
    /// Lines inside the scope are macro continuation lines.
    pub defines_macro: bool,
}

impl Delimiters {
    const fn new(opening: Option<&'static str>, closing: Option<&'static str>) -> Self {
        Self {
            opening,
            closing,
            indented: false,
            defines_macro: false,
        }
    }
}

enum Rule {
    Keywords(&'static [&'static str]),
    EndsWithAssign,
    Always,
}

impl Rule {
    fn matches(&self, header: Option<&str>) -> bool {
        match (self, header) {
            (Rule::Keywords(keywords), Some(header)) => {
                let keyword = leading_keyword(header);
                keywords.contains(&keyword)
            }
            (Rule::EndsWithAssign, Some(header)) => header.trim_end().ends_with('='),
            (Rule::Always, _) => true,
            _ => false,
        }
    }
}

const RULES: &[(Rule, Delimiters)] = &[
    (
        Rule::Keywords(&["#define"]),
        Delimiters {
            opening: None,
            closing: None,
            indented: false,
            defines_macro: true,
        },
    ),
    (
        Rule::Keywords(&["#if", "#ifdef", "#ifndef", "#elif", "#else"]),
        Delimiters::new(None, Some("#endif")),
    ),
    (
        Rule::Keywords(&["assert", "static_assert", "_Static_assert"]),
        Delimiters::new(Some("("), Some(");")),
    ),
    (
        Rule::Keywords(&["struct", "union", "enum"]),
        Delimiters::new(Some("{"), Some("};")),
    ),
    (
        Rule::Keywords(&["case"]),
        Delimiters::new(Some("{"), Some("} break;")),
    ),
    (
        Rule::EndsWithAssign,
        Delimiters {
            opening: Some("{"),
            closing: Some("};"),
            indented: true,
            defines_macro: false,
        },
    ),
    (Rule::Always, Delimiters::new(Some("{"), Some("}"))),
];

/// Infer the delimiters for a scope opened with `header`.
pub fn infer(header: Option<&str>) -> Delimiters {
    RULES
        .iter()
        .find(|(rule, _)| rule.matches(header))
        .map(|(_, delimiters)| *delimiters)
        .unwrap_or(Delimiters::new(Some("{"), Some("}")))
}

/// `#define X` → `#define`, `  struct S` → `struct`, `if (x)` → `if`.
fn leading_keyword(header: &str) -> &str {
    let trimmed = header.trim_start();
    let body_start = usize::from(trimmed.starts_with('#'));
    let end = trimmed[body_start..]
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .map_or(trimmed.len(), |i| i + body_start);
    &trimmed[..end]
}

// ─── Scope Requests ───────────────────────────────────────────────────────────

/// A scope to open, with any inferred delimiter overridden.
///
/// An override of `""` suppresses that delimiter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    pub header: Option<String>,
    pub opening: Option<String>,
    pub closing: Option<String>,
    pub indented: Option<bool>,
}

impl Scope {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: Some(header.into()),
            ..Default::default()
        }
    }

    /// A bare `{ ... }` block with no header line.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn opening(mut self, opening: impl Into<String>) -> Self {
        self.opening = Some(opening.into());
        self
    }

    pub fn closing(mut self, closing: impl Into<String>) -> Self {
        self.closing = Some(closing.into());
        self
    }

    pub fn indented(mut self, indented: bool) -> Self {
        self.indented = Some(indented);
        self
    }
}

/// The exit side of an entered scope; hand it back to `Emitter::exit`.
#[derive(Debug)]
#[must_use = "an open scope must be closed with Emitter::exit"]
pub struct OpenScope {
    pub(crate) closing: Option<String>,
    pub(crate) indented: bool,
    pub(crate) defines_macro: bool,
}
