//! The emission context shared by every directive of a run.
//!
//! One [`Emitter`] lives for the whole run. Its working state (buffer,
//! indentation, macro mode, overload groups, pending sections, target) is
//! reset at the start of each directive with [`Emitter::reset`] and consumed
//! by [`Emitter::finish`] at its end. The overload ownership ledger is the
//! only state that survives between directives.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use indexmap::IndexMap;
use metaprep_types::text::dedent_lines;

use crate::macros::OverloadGroup;
use crate::scope::{infer, OpenScope, Scope};

/// Spaces per indentation level.
pub const INDENT_WIDTH: usize = 4;

/// Where a directive's generated text goes, and the include line that named it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub path: PathBuf,
    /// Source file holding the include line.
    pub source: String,
    /// 1-based line of the include line.
    pub line: u32,
}

/// The finished text of one directive, ready to be written to `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub path: PathBuf,
    pub text: String,
}

/// A caller that owns an [`Emitter`] and runs its own callbacks, such as the
/// script evaluator. The closure helpers ([`with_scope`], [`with_section`],
/// [`chain`](crate::chain::chain)) take any context so those callbacks can
/// reach their owner.
pub trait EmitContext {
    fn emitter(&mut self) -> &mut Emitter;
}

impl EmitContext for Emitter {
    fn emitter(&mut self) -> &mut Emitter {
        self
    }
}

/// Run `body` inside `scope`. The exit side is emitted even when `body` fails.
pub fn with_scope<C, T, E>(
    cx: &mut C,
    scope: Scope,
    body: impl FnOnce(&mut C) -> Result<T, E>,
) -> Result<T, E>
where
    C: EmitContext + ?Sized,
{
    let open = cx.emitter().enter(scope);
    let result = body(cx);
    cx.emitter().exit(open);
    result
}

/// Run `body` inside a deferred section.
pub fn with_section<C, T, E>(
    cx: &mut C,
    text: impl Into<String>,
    body: impl FnOnce(&mut C) -> Result<T, E>,
) -> Result<T, E>
where
    C: EmitContext + ?Sized,
{
    cx.emitter().begin_section(text);
    let result = body(cx);
    cx.emitter().end_section();
    result
}

#[derive(Debug)]
struct PendingSection {
    text: String,
    indent: usize,
    flushed: bool,
}

/// Line-oriented builder of generated target source.
#[derive(Debug)]
pub struct Emitter {
    output: String,
    indent: usize,
    within_macro: bool,
    pub(crate) overloads: IndexMap<String, OverloadGroup>,
    /// Run-level ledger: overloaded macro name → directive that owns it.
    pub(crate) owners: HashMap<String, String>,
    sections: Vec<PendingSection>,
    target: Option<OutputTarget>,
    owner: String,
    receipt: bool,
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Emitter {
    pub fn new() -> Self {
        Self::with_receipt(true)
    }

    /// An emitter that prefixes (or not) each generated file with a receipt comment.
    pub fn with_receipt(receipt: bool) -> Self {
        Self {
            output: String::new(),
            indent: 0,
            within_macro: false,
            overloads: IndexMap::new(),
            owners: HashMap::new(),
            sections: Vec::new(),
            target: None,
            owner: String::new(),
            receipt,
        }
    }

    /// Start a new directive. `owner` names it (`path:line`) for the overload ledger.
    pub fn reset(&mut self, owner: impl Into<String>, target: Option<OutputTarget>) {
        self.output.clear();
        self.indent = 0;
        self.within_macro = false;
        self.overloads.clear();
        self.sections.clear();
        self.target = target;
        self.owner = owner.into();
    }

    // ── State ─────────────────────────────────────────────────────────────────

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn indent(&self) -> usize {
        self.indent
    }

    pub fn within_macro(&self) -> bool {
        self.within_macro
    }

    pub fn target(&self) -> Option<&OutputTarget> {
        self.target.as_ref()
    }

    pub(crate) fn owner(&self) -> &str {
        &self.owner
    }

    // ── Lines ─────────────────────────────────────────────────────────────────

    /// Emit a text fragment.
    ///
    /// The fragment is dedented on its own: a leading blank line and one
    /// trailing whitespace-only line are dropped, so a multi-line literal can
    /// be written indented with the code around it.
    pub fn line(&mut self, text: &str) {
        for line in fragment_lines(text) {
            self.push_line(&line);
        }
    }

    /// Emit several fragments, each dedented independently.
    pub fn lines<I, S>(&mut self, fragments: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for fragment in fragments {
            self.line(fragment.as_ref());
        }
    }

    /// Emit one empty line.
    pub fn blank(&mut self) {
        self.push_line("");
    }

    fn push_line(&mut self, line: &str) {
        self.flush_sections();
        self.write_raw(self.indent, line);
    }

    fn write_raw(&mut self, indent: usize, line: &str) {
        let mut full = " ".repeat(indent * INDENT_WIDTH);
        full.push_str(line);
        if self.within_macro {
            full.push_str(" \\");
        }
        self.output.push_str(full.trim_end());
        self.output.push('\n');
    }

    // ── Scopes ────────────────────────────────────────────────────────────────

    /// Emit the entry side of `scope` and return its exit side.
    pub fn enter(&mut self, scope: Scope) -> OpenScope {
        let inferred = infer(scope.header.as_deref());
        if inferred.defines_macro {
            self.within_macro = true;
        }
        let opening = scope.opening.or(inferred.opening.map(String::from));
        let closing = scope.closing.or(inferred.closing.map(String::from));
        let indented = scope.indented.unwrap_or(inferred.indented);

        if let Some(header) = &scope.header {
            self.line(header);
        }
        if indented {
            self.indent += 1;
        }
        if let Some(opening) = &opening {
            self.line(opening);
        }
        self.indent += 1;

        OpenScope {
            closing,
            indented,
            defines_macro: inferred.defines_macro,
        }
    }

    /// Emit the exit side of a scope opened with [`Emitter::enter`].
    ///
    /// Leaving a macro scope ends macro mode and emits one blank line.
    pub fn exit(&mut self, open: OpenScope) {
        self.indent = self.indent.saturating_sub(1);
        if let Some(closing) = &open.closing {
            self.line(closing);
        }
        if open.indented {
            self.indent = self.indent.saturating_sub(1);
        }
        if open.defines_macro {
            self.within_macro = false;
            self.blank();
        }
    }

    /// [`with_scope`] on the emitter itself.
    pub fn scoped<T, E>(
        &mut self,
        scope: Scope,
        body: impl FnOnce(&mut Self) -> Result<T, E>,
    ) -> Result<T, E> {
        with_scope(self, scope, body)
    }

    // ── Sections ──────────────────────────────────────────────────────────────

    /// Open a deferred section: `text` is emitted only once a line is emitted
    /// before the matching [`Emitter::end_section`].
    pub fn begin_section(&mut self, text: impl Into<String>) {
        self.sections.push(PendingSection {
            text: text.into(),
            indent: self.indent,
            flushed: false,
        });
    }

    pub fn end_section(&mut self) {
        self.sections.pop();
    }

    /// [`with_section`] on the emitter itself.
    pub fn section<T, E>(
        &mut self,
        text: impl Into<String>,
        body: impl FnOnce(&mut Self) -> Result<T, E>,
    ) -> Result<T, E> {
        with_section(self, text, body)
    }

    /// Emit pending section headers, outermost first.
    fn flush_sections(&mut self) {
        let mut pending = Vec::new();
        for section in self.sections.iter_mut().filter(|s| !s.flushed) {
            section.flushed = true;
            pending.push((section.indent, section.text.clone()));
        }
        for (indent, text) in pending {
            for line in fragment_lines(&text) {
                self.write_raw(indent, &line);
            }
        }
    }

    // ── Finalization ──────────────────────────────────────────────────────────

    /// Finish the current directive.
    ///
    /// Produces the receipt comment, the dispatchers of every overload group
    /// this directive registered, then the directive's own text. Returns
    /// `None` (discarding the text) when the directive has no output target.
    pub fn finish(&mut self) -> Option<Generated> {
        self.finish_at(Local::now())
    }

    /// [`Emitter::finish`] with an explicit receipt timestamp.
    pub fn finish_at(&mut self, now: DateTime<Local>) -> Option<Generated> {
        let body = std::mem::take(&mut self.output);
        self.indent = 0;
        self.within_macro = false;
        self.sections.clear();
        let Some(target) = self.target.take() else {
            self.overloads.clear();
            return None;
        };

        if self.receipt {
            let receipt = receipt_line(&target, now);
            self.write_raw(0, &receipt);
        }
        self.emit_dispatchers();
        self.output.push_str(&body);
        self.overloads.clear();

        Some(Generated {
            path: target.path,
            text: std::mem::take(&mut self.output),
        })
    }
}

/// `// [path:line] 2024-01-31 12:00:00`
pub fn receipt_line(target: &OutputTarget, now: DateTime<Local>) -> String {
    format!(
        "// [{}:{}] {}",
        target.source,
        target.line,
        now.format("%Y-%m-%d %H:%M:%S")
    )
}

/// Split a fragment into dedented lines.
fn fragment_lines(text: &str) -> Vec<String> {
    let mut lines: Vec<&str> = text.lines().collect();
    if lines.first().is_some_and(|l| l.trim().is_empty()) {
        lines.remove(0);
    }
    if lines.len() > 1 && lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    dedent_lines(&lines, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emitter() -> Emitter {
        let mut emitter = Emitter::with_receipt(false);
        emitter.reset("test.c:1", None);
        emitter
    }

    #[test]
    fn test_line_dedents_literal() {
        let mut e = emitter();
        e.line(
            "
            int x;
            if (x)
                x = 1;
            ",
        );
        assert_eq!(e.output(), "int x;\nif (x)\n    x = 1;\n");
    }

    #[test]
    fn test_line_keeps_inner_blank_lines() {
        let mut e = emitter();
        e.line("a\n\nb");
        assert_eq!(e.output(), "a\n\nb\n");
    }

    #[test]
    fn test_empty_fragment_emits_nothing() {
        let mut e = emitter();
        e.line("");
        assert_eq!(e.output(), "");
        e.blank();
        assert_eq!(e.output(), "\n");
    }

    #[test]
    fn test_scoped_struct() {
        let mut e = emitter();
        e.scoped(Scope::new("struct Point"), |e| {
            e.line("int x;");
            Ok::<_, ()>(())
        })
        .unwrap();
        assert_eq!(e.output(), "struct Point\n{\n    int x;\n};\n");
    }

    #[test]
    fn test_scoped_closes_on_failure() {
        let mut e = emitter();
        let result: Result<(), &str> = e.scoped(Scope::new("if (x)"), |e| {
            e.line("y();");
            Err("boom")
        });
        assert_eq!(result, Err("boom"));
        assert_eq!(e.output(), "if (x)\n{\n    y();\n}\n");
        assert_eq!(e.indent(), 0);
    }

    #[test]
    fn test_macro_scope() {
        let mut e = emitter();
        let open = e.enter(Scope::new("#define TWICE(x)"));
        e.line("(x) + \n(x)");
        e.exit(open);
        assert!(!e.within_macro());
        assert_eq!(e.output(), "#define TWICE(x) \\\n    (x) + \\\n    (x) \\\n\n");
    }

    #[test]
    fn test_initializer_scope_is_indented() {
        let mut e = emitter();
        let open = e.enter(Scope::new("static const int T[] ="));
        e.line("1,");
        e.exit(open);
        assert_eq!(e.output(), "static const int T[] =\n    {\n        1,\n    };\n");
    }

    #[test]
    fn test_override_delimiters() {
        let mut e = emitter();
        let open = e.enter(Scope::new("do").closing("}\nwhile (false)"));
        e.line("x();");
        e.exit(open);
        assert_eq!(e.output(), "do\n{\n    x();\n}\nwhile (false)\n");
    }

    #[test]
    fn test_empty_override_suppresses() {
        let mut e = emitter();
        let open = e.enter(Scope::new("#if A").closing(""));
        e.line("a");
        e.exit(open);
        assert_eq!(e.output(), "#if A\n    a\n");
    }

    #[test]
    fn test_section_only_when_used() {
        let mut e = emitter();
        e.section("// Unused", |_| Ok::<_, ()>(())).unwrap();
        e.section("// Used", |e| {
            e.section("// Inner", |e| {
                e.line("x;");
                Ok::<_, ()>(())
            })
        })
        .unwrap();
        assert_eq!(e.output(), "// Used\n// Inner\nx;\n");
    }

    #[test]
    fn test_finish_without_target_discards() {
        let mut e = emitter();
        e.line("int x;");
        assert_eq!(e.finish(), None);
        assert_eq!(e.output(), "");
    }

    #[test]
    fn test_finish_with_receipt() {
        let mut e = Emitter::new();
        let target = OutputTarget {
            path: PathBuf::from("out/a.h"),
            source: "src/a.c".into(),
            line: 3,
        };
        e.reset("src/a.c:4", Some(target));
        e.line("int x;");
        let generated = e.finish().unwrap();
        assert_eq!(generated.path, PathBuf::from("out/a.h"));
        let mut lines = generated.text.lines();
        assert!(lines.next().unwrap().starts_with("// [src/a.c:3] "));
        assert_eq!(lines.next(), Some("int x;"));
    }

    #[test]
    fn test_reset_clears_state() {
        let mut e = emitter();
        let _open = e.enter(Scope::new("#define X"));
        e.line("1");
        e.reset("test.c:9", None);
        assert_eq!(e.output(), "");
        assert_eq!(e.indent(), 0);
        assert!(!e.within_macro());
    }
}
