//! Dependency resolver: validates the export/import declarations of all
//! directives and derives the implicit imports and the dependency graph.
//!
//! Checks run in a fixed order, and the first failing one aborts the run
//! before anything executes:
//!
//! 1. two directives generating into the same file
//! 2. an identifier defined (`export` or `global`) by two directives
//! 3. an import nobody defines
//! 4. a directive importing what it defines itself

use std::collections::HashMap;
use std::path::PathBuf;

use metaprep_types::text::{coalesce, did_you_mean};
use metaprep_types::ErrorCode;
use serde::Serialize;
use tracing::debug;

use crate::diagnostics::{Diagnostic, Frame};
use crate::directive::{DeclKind, Declaration, MetaDirective};

/// Edges between directives, by index into the scanned directives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyGraph {
    /// `(provider, consumer)`: the consumer imports something the provider defines.
    pub edges: Vec<(usize, usize)>,
}

impl DependencyGraph {
    /// Directives that `consumer` depends on.
    pub fn providers(&self, consumer: usize) -> impl Iterator<Item = usize> + '_ {
        self.edges
            .iter()
            .filter(move |(_, c)| *c == consumer)
            .map(|(p, _)| *p)
    }

    /// Directives that depend on `provider`.
    pub fn consumers(&self, provider: usize) -> impl Iterator<Item = usize> + '_ {
        self.edges
            .iter()
            .filter(move |(p, _)| *p == provider)
            .map(|(_, c)| *c)
    }
}

/// Validate declarations, add implicit imports, and build the graph.
pub fn resolve(directives: &mut [MetaDirective]) -> Result<DependencyGraph, Diagnostic> {
    check_outputs(directives)?;
    let definers = check_definitions(directives)?;
    check_imports(directives, &definers)?;
    check_self_imports(directives)?;
    add_implicit_imports(directives);
    let graph = build_graph(directives, &definers);
    debug!(
        "resolved {} meta-directive(s), {} identifier(s), {} dependency edge(s)",
        directives.len(),
        definers.len(),
        graph.edges.len()
    );
    Ok(graph)
}

fn check_outputs(directives: &[MetaDirective]) -> Result<(), Diagnostic> {
    let targets = directives.iter().filter_map(|d| {
        d.include
            .as_ref()
            .map(|include| (include.path.clone(), Frame::at(&d.file, include.line, None)))
    });
    for (path, frames) in coalesce::<PathBuf, Frame>(targets) {
        if frames.len() > 1 {
            return Err(Diagnostic::structural(
                ErrorCode::DUPLICATE_OUTPUT,
                format!(
                    "multiple meta-directives output to \"{}\"",
                    path.display()
                ),
                frames,
            ));
        }
    }
    Ok(())
}

/// Identifier → index of the directive defining it, in first-seen order.
fn check_definitions(directives: &[MetaDirective]) -> Result<Vec<(String, usize)>, Diagnostic> {
    let definitions = directives.iter().enumerate().flat_map(|(index, d)| {
        d.definitions().map(move |decl| (decl.name.clone(), (index, decl)))
    });
    let mut definers = Vec::new();
    for (name, sites) in coalesce(definitions) {
        if sites.len() > 1 {
            let frames = sites
                .iter()
                .map(|(index, decl)| decl_frame(&directives[*index], decl))
                .collect();
            return Err(Diagnostic::structural(
                ErrorCode::DUPLICATE_EXPORT,
                format!("\"{name}\" is exported by multiple meta-directives"),
                frames,
            ));
        }
        definers.push((name, sites[0].0));
    }
    Ok(definers)
}

fn check_imports(directives: &[MetaDirective], definers: &[(String, usize)]) -> Result<(), Diagnostic> {
    for directive in directives {
        for decl in directive.imports() {
            if definers.iter().any(|(name, _)| *name == decl.name) {
                continue;
            }
            let mut message = format!("no meta-directive exports \"{}\"", decl.name);
            let close = did_you_mean(&decl.name, definers.iter().map(|(name, _)| name.as_str()));
            if !close.is_empty() {
                let close: Vec<String> = close.iter().map(|name| format!("\"{name}\"")).collect();
                message.push_str(&format!("; did you mean {}?", close.join(" or ")));
            }
            return Err(Diagnostic::structural(
                ErrorCode::UNRESOLVED_IMPORT,
                message,
                vec![decl_frame(directive, decl)],
            ));
        }
    }
    Ok(())
}

fn check_self_imports(directives: &[MetaDirective]) -> Result<(), Diagnostic> {
    for directive in directives {
        if let Some(decl) = directive.imports().find(|decl| directive.defines(&decl.name)) {
            return Err(Diagnostic::structural(
                ErrorCode::SELF_IMPORT,
                format!("meta-directive imports \"{}\", which it exports itself", decl.name),
                vec![decl_frame(directive, decl)],
            ));
        }
    }
    Ok(())
}

/// A header without identifiers imports every defined identifier; a
/// directive without its own `global` list imports every global.
fn add_implicit_imports(directives: &mut [MetaDirective]) {
    let defined: Vec<String> = directives
        .iter()
        .flat_map(|d| d.definitions().map(|decl| decl.name.clone()))
        .collect();
    let globals: Vec<String> = directives
        .iter()
        .flat_map(|d| d.decls.iter())
        .filter(|decl| decl.kind == DeclKind::Global)
        .map(|decl| decl.name.clone())
        .collect();

    for directive in directives.iter_mut() {
        let mut implicit = Vec::new();
        if !directive.has_explicit_identifiers() {
            implicit.extend(defined.iter().cloned());
        }
        if !directive.has_global_list() {
            implicit.extend(globals.iter().cloned());
        }
        let line = directive.header_line;
        for name in implicit {
            if !directive.declares(&name) {
                directive.decls.push(Declaration {
                    kind: DeclKind::Implicit,
                    name,
                    line,
                });
            }
        }
    }
}

fn build_graph(directives: &[MetaDirective], definers: &[(String, usize)]) -> DependencyGraph {
    let definers: HashMap<&str, usize> = definers.iter().map(|(name, index)| (name.as_str(), *index)).collect();
    let mut graph = DependencyGraph::default();
    for (consumer, directive) in directives.iter().enumerate() {
        for decl in directive.imports() {
            if let Some(&provider) = definers.get(decl.name.as_str()) {
                if !graph.edges.contains(&(provider, consumer)) {
                    graph.edges.push((provider, consumer));
                }
            }
        }
    }
    graph
}

fn decl_frame(directive: &MetaDirective, decl: &Declaration) -> Frame {
    Frame::at(&directive.file, decl.line, Some(decl.kind.to_string()))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::directive::SourceUnit;
    use crate::scanner::scan;

    fn directives(units: &[(&str, &str)]) -> Vec<MetaDirective> {
        let units: Vec<SourceUnit> = units.iter().map(|(p, t)| SourceUnit::new(*p, *t)).collect();
        scan(&units, Path::new(".")).unwrap()
    }

    fn imports(directive: &MetaDirective) -> Vec<(&str, DeclKind)> {
        directive.imports().map(|d| (d.name.as_str(), d.kind)).collect()
    }

    #[test]
    fn test_graph_edges() {
        let mut found = directives(&[(
            "a.c",
            "/* #meta import A */\n/* #meta export A */\n/* #meta export B\n#meta import A */\n",
        )]);
        let graph = resolve(&mut found).unwrap();
        assert_eq!(graph.edges, vec![(1, 0), (1, 2)]);
        assert_eq!(graph.providers(2).collect::<Vec<_>>(), vec![1]);
        assert_eq!(graph.consumers(1).collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn test_duplicate_output() {
        let mut found = directives(&[
            ("a.c", "#include \"x.h\"\n/* #meta */\n"),
            ("b.c", "int y;\n#include \"x.h\"\n/* #meta */\n"),
        ]);
        let err = resolve(&mut found).unwrap_err();
        assert_eq!(err.code, ErrorCode::DUPLICATE_OUTPUT);
        let sites: Vec<(PathBuf, u32)> = err
            .frames
            .iter()
            .map(|f| (f.path.clone().unwrap(), f.line))
            .collect();
        assert_eq!(sites, vec![(PathBuf::from("a.c"), 1), (PathBuf::from("b.c"), 2)]);
    }

    #[test]
    fn test_duplicate_export_names_both() {
        let mut found = directives(&[
            ("a.c", "/* #meta export FOO */\n"),
            ("b.c", "\n/* #meta global FOO */\n"),
        ]);
        let err = resolve(&mut found).unwrap_err();
        assert_eq!(err.code, ErrorCode::DUPLICATE_EXPORT);
        assert!(err.message.contains("\"FOO\""));
        assert_eq!(err.frames.len(), 2);
        assert_eq!(err.frames[1].line, 2);
    }

    #[test]
    fn test_unresolved_import_suggests() {
        let mut found = directives(&[(
            "a.c",
            "/* #meta export COLORS */\n/* #meta import COLOURS */\n",
        )]);
        let err = resolve(&mut found).unwrap_err();
        assert_eq!(err.code, ErrorCode::UNRESOLVED_IMPORT);
        assert!(err.message.contains("did you mean \"COLORS\"?"), "{}", err.message);
        assert_eq!(err.frames[0].line, 2);
    }

    #[test]
    fn test_self_import() {
        let mut found = directives(&[("a.c", "/* #meta export X\n#meta import X */\n")]);
        let err = resolve(&mut found).unwrap_err();
        assert_eq!(err.code, ErrorCode::SELF_IMPORT);
        assert_eq!(err.frames[0].line, 2);
    }

    #[test]
    fn test_check_order_output_before_exports() {
        let mut found = directives(&[
            ("a.c", "#include \"x.h\"\n/* #meta export A */\n"),
            ("b.c", "#include \"x.h\"\n/* #meta export A */\n"),
        ]);
        let err = resolve(&mut found).unwrap_err();
        assert_eq!(err.code, ErrorCode::DUPLICATE_OUTPUT);
    }

    #[test]
    fn test_bare_header_imports_everything() {
        let mut found = directives(&[(
            "a.c",
            "/* #meta */\n/* #meta export A, B */\n/* #meta global G */\n",
        )]);
        resolve(&mut found).unwrap();
        assert_eq!(
            imports(&found[0]),
            vec![("A", DeclKind::Implicit), ("B", DeclKind::Implicit), ("G", DeclKind::Implicit)]
        );
        assert_eq!(found[0].decls[0].line, 1);
    }

    #[test]
    fn test_globals_reach_directives_without_global_list() {
        let mut found = directives(&[(
            "a.c",
            "/* #meta global G, H */\n/* #meta export A\n#meta import G */\n/* #meta global K */\n",
        )]);
        resolve(&mut found).unwrap();
        assert_eq!(
            imports(&found[1]),
            vec![("G", DeclKind::Import), ("H", DeclKind::Implicit), ("K", DeclKind::Implicit)]
        );
        assert!(imports(&found[0]).is_empty());
        assert!(imports(&found[2]).is_empty());
    }
}
