//! Text utilities shared by the directive scanner and the emitter.

use std::collections::HashSet;
use std::hash::Hash;

// ── Dedent ───────────────────────────────────────────────────────────────────

/// Options for [`dedent`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DedentOptions<'a> {
    /// Drop the first line when it is blank, as in a literal that opens
    /// with a newline right after its quotes.
    pub skip_leading_blank: bool,
    /// Lines starting with this prefix (after indentation) do not count
    /// towards the common indentation.
    pub comment_prefix: Option<&'a str>,
    /// Prepended to every non-blank line after dedenting.
    pub indent: &'a str,
}

/// Remove the common leading whitespace of `text`.
///
/// Blank lines become empty and never constrain the indentation. When
/// `skip_leading_blank` is set, one trailing whitespace-only line is also
/// dropped (the line holding a literal's closing quotes). The result has
/// no trailing newline.
pub fn dedent(text: &str, options: DedentOptions<'_>) -> String {
    let mut lines: Vec<&str> = text.lines().collect();
    if options.skip_leading_blank {
        if lines.first().is_some_and(|l| l.trim().is_empty()) {
            lines.remove(0);
        }
        if lines.len() > 1 && lines.last().is_some_and(|l| l.trim().is_empty()) {
            lines.pop();
        }
    }
    dedent_lines(&lines, options.comment_prefix)
        .into_iter()
        .map(|line| {
            if line.is_empty() {
                line
            } else {
                format!("{}{line}", options.indent)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Dedent a sequence of lines by their common leading whitespace.
pub fn dedent_lines<S: AsRef<str>>(lines: &[S], comment_prefix: Option<&str>) -> Vec<String> {
    let common = lines
        .iter()
        .map(AsRef::as_ref)
        .filter(|line| !line.trim().is_empty())
        .filter(|line| comment_prefix.is_none_or(|p| !line.trim_start().starts_with(p)))
        .map(leading_whitespace)
        .min()
        .unwrap_or(0);

    lines
        .iter()
        .map(|line| {
            let line = line.as_ref();
            if line.trim().is_empty() {
                return String::new();
            }
            let strip = common.min(leading_whitespace(line));
            line.chars().skip(strip).collect::<String>().trim_end().to_string()
        })
        .collect()
}

/// Number of leading whitespace characters.
fn leading_whitespace(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

// ── Justify ──────────────────────────────────────────────────────────────────

/// How a cell is padded within its column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Justify {
    /// Passed through untouched; does not widen the column.
    None,
    Left,
    Right,
    Center,
}

/// Pad cells so each justified column lines up across rows.
pub fn justify(rows: &[Vec<(Justify, String)>]) -> Vec<Vec<String>> {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..columns)
        .map(|column| {
            rows.iter()
                .filter_map(|row| row.get(column))
                .filter(|(just, _)| *just != Justify::None)
                .map(|(_, value)| value.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    rows.iter()
        .map(|row| {
            row.iter()
                .zip(&widths)
                .map(|((just, value), &width)| match just {
                    Justify::None => value.clone(),
                    Justify::Left => format!("{value:<width$}"),
                    Justify::Right => format!("{value:>width$}"),
                    Justify::Center => format!("{value:^width$}"),
                })
                .collect()
        })
        .collect()
}

// ── Grouping ─────────────────────────────────────────────────────────────────

/// Group values by key, keeping keys in first-seen order.
pub fn coalesce<K: PartialEq, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Vec<(K, Vec<V>)> {
    let mut groups: Vec<(K, Vec<V>)> = Vec::new();
    for (key, value) in pairs {
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => groups.push((key, vec![value])),
        }
    }
    groups
}

/// The first item that occurs more than once.
pub fn find_dupe<T: Eq + Hash>(items: impl IntoIterator<Item = T>) -> Option<T> {
    let mut seen = HashSet::new();
    for item in items {
        if seen.contains(&item) {
            return Some(item);
        }
        seen.insert(item);
    }
    None
}

/// Candidates close to `given`, best first.
pub fn did_you_mean<'a>(given: &str, options: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    let mut scored: Vec<(f64, &str)> = options
        .into_iter()
        .map(|option| (strsim::jaro_winkler(given, option), option))
        .filter(|(score, _)| *score >= 0.8)
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    scored.into_iter().take(3).map(|(_, option)| option).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal() -> DedentOptions<'static> {
        DedentOptions {
            skip_leading_blank: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_dedent_literal() {
        let text = "\n        if (x)\n            y();\n    ";
        assert_eq!(dedent(text, literal()), "if (x)\n    y();");
    }

    #[test]
    fn test_dedent_keeps_leading_blank_without_flag() {
        assert_eq!(dedent("\n  a", DedentOptions::default()), "\na");
    }

    #[test]
    fn test_dedent_ignores_comment_lines() {
        let lines = ["    let x = 1", "# note", "      let y = 2"];
        assert_eq!(
            dedent_lines(&lines, Some("#")),
            vec!["let x = 1", "# note", "  let y = 2"]
        );
    }

    #[test]
    fn test_dedent_with_indent() {
        let options = DedentOptions {
            indent: "    ",
            ..literal()
        };
        assert_eq!(dedent("a\n\n b", options), "    a\n\n     b");
    }

    #[test]
    fn test_dedent_tabs() {
        assert_eq!(dedent("\tx\n\t\ty", DedentOptions::default()), "x\n\ty");
    }

    #[test]
    fn test_justify_columns() {
        let rows = vec![
            vec![(Justify::Left, "A".to_string()), (Justify::Right, "1".to_string())],
            vec![(Justify::Left, "BBB".to_string()), (Justify::Right, "100".to_string())],
        ];
        let out = justify(&rows);
        assert_eq!(out[0], vec!["A  ", "  1"]);
        assert_eq!(out[1], vec!["BBB", "100"]);
    }

    #[test]
    fn test_justify_none_does_not_widen() {
        let rows = vec![
            vec![(Justify::None, "long long".to_string())],
            vec![(Justify::Left, "ab".to_string())],
        ];
        let out = justify(&rows);
        assert_eq!(out[0][0], "long long");
        assert_eq!(out[1][0], "ab");
    }

    #[test]
    fn test_coalesce_order() {
        let groups = coalesce([("b", 1), ("a", 2), ("b", 3)]);
        assert_eq!(groups, vec![("b", vec![1, 3]), ("a", vec![2])]);
    }

    #[test]
    fn test_find_dupe() {
        assert_eq!(find_dupe(["x", "y", "x"]), Some("x"));
        assert_eq!(find_dupe(["x", "y"]), None);
    }

    #[test]
    fn test_did_you_mean() {
        let found = did_you_mean("COLOR", ["COLORS", "SHAPES", "colour"]);
        assert_eq!(found.first(), Some(&"COLORS"));
        assert!(!found.contains(&"SHAPES"));
    }
}
