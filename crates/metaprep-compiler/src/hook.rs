//! Instrumentation around each directive's execution.

use std::time::{Duration, Instant};

use metaprep_types::text::{justify, Justify};
use tracing::{debug, info};

use crate::directive::MetaDirective;

/// Called exactly twice per executed directive: before its body runs and
/// after its output has been written.
pub trait Instrumentation {
    fn before(&mut self, _directive: &MetaDirective) {}

    /// `generated` is the finished text, or `None` without an output target.
    fn after(&mut self, _directive: &MetaDirective, _generated: Option<&str>) {}
}

/// Does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHook;

impl Instrumentation for NoHook {}

/// Logs each directive and keeps how long it took.
#[derive(Debug, Default)]
pub struct TimingHook {
    started: Option<Instant>,
    timings: Vec<(String, Duration)>,
}

impl TimingHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timings(&self) -> &[(String, Duration)] {
        &self.timings
    }

    /// One row per directive, slowest first.
    pub fn table(&self) -> String {
        let mut timings: Vec<&(String, Duration)> = self.timings.iter().collect();
        timings.sort_by(|a, b| b.1.cmp(&a.1));
        let rows: Vec<Vec<(Justify, String)>> = timings
            .iter()
            .map(|(label, elapsed)| {
                vec![
                    (Justify::Left, label.clone()),
                    (Justify::Right, format!("{:.3}s", elapsed.as_secs_f64())),
                ]
            })
            .collect();
        justify(&rows)
            .into_iter()
            .map(|row| row.join(" : "))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Instrumentation for TimingHook {
    fn before(&mut self, directive: &MetaDirective) {
        info!("meta-preprocessing {}", directive.label());
        self.started = Some(Instant::now());
    }

    fn after(&mut self, directive: &MetaDirective, generated: Option<&str>) {
        let elapsed = self.started.take().map(|t| t.elapsed()).unwrap_or_default();
        debug!(
            "{} finished in {:.3}s ({} bytes generated)",
            directive.label(),
            elapsed.as_secs_f64(),
            generated.map_or(0, str::len)
        );
        self.timings.push((directive.label(), elapsed));
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::directive::SourceUnit;
    use crate::scanner::scan;

    #[test]
    fn test_timing_hook_records_each_directive() {
        let found = scan(
            &[SourceUnit::new("a.c", "/* #meta */\n/* #meta */\n")],
            Path::new("."),
        )
        .unwrap();
        let mut hook = TimingHook::new();
        for directive in &found {
            hook.before(directive);
            hook.after(directive, Some("int x;\n"));
        }
        let labels: Vec<&str> = hook.timings().iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["a.c:1", "a.c:2"]);
        assert_eq!(hook.table().lines().count(), 2);
        assert!(hook.table().contains("a.c:1 : "));
    }
}
