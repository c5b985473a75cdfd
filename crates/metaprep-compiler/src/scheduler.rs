//! Scheduler: orders directives so each runs after everything it imports.

use std::collections::HashSet;

use metaprep_types::ErrorCode;
use tracing::debug;

use crate::diagnostics::{Diagnostic, Frame};
use crate::directive::MetaDirective;

/// Indices of `directives` in execution order.
///
/// Each step picks the first unscheduled directive, in input order, whose
/// imports are all defined by directives already scheduled.
pub fn schedule(directives: &[MetaDirective]) -> Result<Vec<usize>, Diagnostic> {
    let mut order = Vec::with_capacity(directives.len());
    let mut scheduled = vec![false; directives.len()];
    let mut available: HashSet<&str> = HashSet::new();

    while order.len() < directives.len() {
        let next = directives.iter().enumerate().find(|(index, directive)| {
            !scheduled[*index]
                && directive
                    .imports()
                    .all(|decl| available.contains(decl.name.as_str()))
        });
        let Some((index, directive)) = next else {
            return Err(circular(directives, &scheduled));
        };
        scheduled[index] = true;
        order.push(index);
        available.extend(directive.definitions().map(|decl| decl.name.as_str()));
    }

    debug!(
        "schedule: {}",
        order
            .iter()
            .map(|&index| directives[index].label())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(order)
}

fn circular(directives: &[MetaDirective], scheduled: &[bool]) -> Diagnostic {
    let stuck: Vec<&MetaDirective> = directives
        .iter()
        .zip(scheduled)
        .filter(|(directive, done)| !**done && directive.has_explicit_identifiers())
        .map(|(directive, _)| directive)
        .collect();
    let labels: Vec<String> = stuck.iter().map(|d| d.label()).collect();
    Diagnostic::structural(
        ErrorCode::CIRCULAR_DEPENDENCY,
        format!("circular dependency between meta-directives {}", labels.join(", ")),
        stuck
            .iter()
            .map(|d| Frame::at(&d.file, d.header_line, None))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::directive::SourceUnit;
    use crate::resolver::resolve;
    use crate::scanner::scan;

    fn resolved(text: &str) -> Vec<MetaDirective> {
        let mut found = scan(&[SourceUnit::new("a.c", text)], Path::new(".")).unwrap();
        resolve(&mut found).unwrap();
        found
    }

    #[test]
    fn test_input_order_when_independent() {
        let found = resolved("/* #meta export A */\n/* #meta export B */\n/* #meta export C */\n");
        assert_eq!(schedule(&found).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_imports_run_first() {
        let found = resolved(
            "/* #meta export C\n#meta import B */\n/* #meta export B\n#meta import A */\n/* #meta export A */\n",
        );
        assert_eq!(schedule(&found).unwrap(), vec![2, 1, 0]);
    }

    #[test]
    fn test_first_selectable_wins() {
        let found = resolved(
            "/* #meta import A */\n/* #meta export X */\n/* #meta export A */\n/* #meta export Y */\n",
        );
        assert_eq!(schedule(&found).unwrap(), vec![1, 2, 0, 3]);
    }

    #[test]
    fn test_bare_directive_runs_last() {
        let found = resolved("/* #meta */\n/* #meta export A */\n/* #meta export B */\n");
        assert_eq!(schedule(&found).unwrap(), vec![1, 2, 0]);
    }

    #[test]
    fn test_cycle_names_both() {
        let found = resolved(
            "/* #meta export A\n#meta import B */\n/* #meta export B\n#meta import A */\n/* #meta export C */\n",
        );
        let err = schedule(&found).unwrap_err();
        assert_eq!(err.code, ErrorCode::CIRCULAR_DEPENDENCY);
        assert!(err.message.contains("a.c:1, a.c:3"), "{}", err.message);
        let lines: Vec<u32> = err.frames.iter().map(|f| f.line).collect();
        assert_eq!(lines, vec![1, 3]);
    }

    #[test]
    fn test_cycle_omits_bare_directives() {
        let found = resolved("/* #meta export A\n#meta import B */\n/* #meta export B\n#meta import A */\n/* #meta */\n");
        let err = schedule(&found).unwrap_err();
        assert_eq!(err.frames.len(), 2);
    }
}
