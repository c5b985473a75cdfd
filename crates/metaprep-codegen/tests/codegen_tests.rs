use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{Local, TimeZone};
use metaprep_codegen::*;
use proptest::prelude::*;

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn target() -> OutputTarget {
    OutputTarget {
        path: PathBuf::from("build/pick.h"),
        source: "src/pick.c".to_string(),
        line: 2,
    }
}

fn emitter() -> Emitter {
    let mut e = Emitter::with_receipt(false);
    e.reset("src/pick.c:3", Some(target()));
    e
}

/// Just enough of a C preprocessor to expand the macros we generate.
struct Preprocessor {
    defs: HashMap<String, (Option<Vec<String>>, String)>,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Read an identifier starting at `i`, returning it and the index after it.
fn read_ident(chars: &[char], mut i: usize) -> (String, usize) {
    let start = i;
    while i < chars.len() && is_ident(chars[i]) {
        i += 1;
    }
    (chars[start..i].iter().collect(), i)
}

fn paste(text: &str) -> String {
    let mut out = String::new();
    let mut rest = text;
    while let Some(at) = rest.find("##") {
        out.push_str(rest[..at].trim_end());
        rest = rest[at + 2..].trim_start();
    }
    out.push_str(rest);
    out
}

impl Preprocessor {
    fn parse(text: &str) -> Self {
        let mut logical = Vec::new();
        let mut current = String::new();
        for line in text.lines() {
            match line.strip_suffix('\\') {
                Some(continued) => {
                    current.push_str(continued);
                    current.push(' ');
                }
                None => {
                    current.push_str(line);
                    logical.push(std::mem::take(&mut current));
                }
            }
        }

        let mut defs = HashMap::new();
        for line in logical {
            let Some(rest) = line.trim().strip_prefix("#define ") else {
                continue;
            };
            let chars: Vec<char> = rest.chars().collect();
            let (name, mut i) = read_ident(&chars, 0);
            let params = if chars.get(i) == Some(&'(') {
                let close = i + chars[i..].iter().position(|c| *c == ')').unwrap();
                let list: String = chars[i + 1..close].iter().collect();
                i = close + 1;
                Some(list.split(',').map(|p| p.trim().to_string()).collect())
            } else {
                None
            };
            let body: String = chars[i..].iter().collect();
            defs.insert(name, (params, body.trim().to_string()));
        }
        Self { defs }
    }

    fn substitute(body: &str, params: &[String], args: &[String]) -> String {
        let chars: Vec<char> = body.chars().collect();
        let mut out = String::new();
        let mut i = 0;
        while i < chars.len() {
            if is_ident_start(chars[i]) {
                let (word, next) = read_ident(&chars, i);
                match params.iter().position(|p| *p == word) {
                    Some(k) => out.push_str(&args[k]),
                    None => out.push_str(&word),
                }
                i = next;
            } else {
                out.push(chars[i]);
                i += 1;
            }
        }
        paste(&out)
    }

    fn expand(&self, text: &str) -> String {
        self.expand_at(text, 0)
    }

    fn expand_at(&self, text: &str, depth: usize) -> String {
        assert!(depth < 32, "runaway expansion of {text}");
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::new();
        let mut i = 0;
        while i < chars.len() {
            if !is_ident_start(chars[i]) {
                out.push(chars[i]);
                i += 1;
                continue;
            }
            let (word, next) = read_ident(&chars, i);
            i = next;
            match self.defs.get(&word) {
                Some((None, body)) => out.push_str(&self.expand_at(body, depth + 1)),
                Some((Some(params), body)) if chars.get(i) == Some(&'(') => {
                    let mut level = 0;
                    let mut args = vec![String::new()];
                    i += 1;
                    while i < chars.len() {
                        match chars[i] {
                            ')' if level == 0 => break,
                            ',' if level == 0 => args.push(String::new()),
                            c => {
                                if c == '(' {
                                    level += 1;
                                } else if c == ')' {
                                    level -= 1;
                                }
                                args.last_mut().unwrap().push(c);
                            }
                        }
                        i += 1;
                    }
                    i += 1;
                    let args: Vec<String> = args.iter().map(|a| a.trim().to_string()).collect();
                    let replaced = Self::substitute(body, params, &args);
                    out.push_str(&self.expand_at(&replaced, depth + 1));
                }
                _ => out.push_str(&word),
            }
        }
        out
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Overloaded macros
// ══════════════════════════════════════════════════════════════════════════════

fn pick_header() -> String {
    let mut e = emitter();
    e.define(&MacroDef::new("PICK", "A").params(["N", "X"]).overload("N", "1"))
        .unwrap();
    e.define(&MacroDef::new("PICK", "B").params(["N", "X"]).overload("N", "2"))
        .unwrap();
    e.finish().unwrap().text
}

#[test]
fn test_overload_dispatcher_comes_first() {
    let text = pick_header();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            "#define PICK(N, X) __MACRO_OVERLOAD__PICK__##N(X)",
            "#define __MACRO_OVERLOAD__PICK__1(X) A",
            "#define __MACRO_OVERLOAD__PICK__2(X) B",
        ]
    );
}

#[test]
fn test_overload_expansion_selects_variant() {
    let cpp = Preprocessor::parse(&pick_header());
    assert_eq!(cpp.expand("PICK(1, Y)"), "A");
    assert_eq!(cpp.expand("PICK(2, Y)"), "B");
}

#[test]
fn test_overload_on_two_keys() {
    let mut e = emitter();
    for (a, b, body) in [("0", "0", "zero"), ("0", "1", "low"), ("1", "1", "both")] {
        e.define(
            &MacroDef::new("SEL", body)
                .params(["A", "B", "V"])
                .overload("A", a)
                .overload("B", b),
        )
        .unwrap();
    }
    let cpp = Preprocessor::parse(&e.finish().unwrap().text);
    assert_eq!(cpp.expand("SEL(0, 1, v)"), "low");
    assert_eq!(cpp.expand("SEL(1, 1, v)"), "both");
}

#[test]
fn test_overload_variant_uses_rest_params() {
    let mut e = emitter();
    e.define(
        &MacroDef::new("GET", "(obj).first")
            .params(["WHICH", "obj"])
            .overload("WHICH", "FIRST"),
    )
    .unwrap();
    let cpp = Preprocessor::parse(&e.finish().unwrap().text);
    assert_eq!(cpp.expand("GET(FIRST, p)"), "(p).first");
}

#[test]
fn test_dispatchers_do_not_leak_into_next_directive() {
    let mut e = emitter();
    e.define(&MacroDef::new("P", "a").params(["N"]).overload("N", "1"))
        .unwrap();
    e.finish();
    e.reset("src/other.c:1", Some(target()));
    e.line("int x;");
    assert_eq!(e.finish().unwrap().text, "int x;\n");
}

// ══════════════════════════════════════════════════════════════════════════════
// Enumerations
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_enum_count_under_every_style() {
    for style in [
        CountStyle::None,
        CountStyle::Define,
        CountStyle::Enum,
        CountStyle::Constexpr,
    ] {
        let mut e = emitter();
        let def = EnumDef::new("Color", Some("u8"))
            .members(["RED", "GREEN", "BLUE"])
            .count(style);
        e.enums(&def).unwrap();
        let out = e.output().to_string();
        let members: Vec<&str> = out
            .lines()
            .map(str::trim)
            .filter(|l| l.starts_with("Color_") && l.ends_with(','))
            .collect();
        assert_eq!(members, vec!["Color_RED,", "Color_GREEN,", "Color_BLUE,"], "{style}");
        let expected = match style {
            CountStyle::None => None,
            CountStyle::Define => Some("#define Color_COUNT 3"),
            CountStyle::Enum => Some("enum : u8 { Color_COUNT = 3 };"),
            CountStyle::Constexpr => Some("static constexpr u8 Color_COUNT = 3;"),
        };
        assert_eq!(out.lines().last().filter(|l| l.contains("COUNT")), expected, "{style}");
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Finalization
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_receipt_format() {
    let mut e = Emitter::new();
    e.reset("src/pick.c:3", Some(target()));
    e.line("int x;");
    let now = Local.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
    let generated = e.finish_at(now).unwrap();
    assert_eq!(generated.text, "// [src/pick.c:2] 2024-05-06 07:08:09\nint x;\n");
}

#[test]
fn test_generation_determinism_100_iterations() {
    let first = pick_header();
    for i in 0..100 {
        assert_eq!(first, pick_header(), "Determinism failure at iteration {i}");
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Line emission properties
// ══════════════════════════════════════════════════════════════════════════════

fn arb_fragment() -> impl Strategy<Value = Vec<(usize, String)>> {
    prop::collection::vec((0usize..6, "[a-z_;(){}=][a-z0-9_;(){}= ]{0,16}"), 1..6)
}

fn render(lines: &[(usize, String)], extra: usize, literal: bool) -> String {
    let body: Vec<String> = lines
        .iter()
        .map(|(indent, text)| format!("{}{}", " ".repeat(indent + extra), text))
        .collect();
    let mut fragment = body.join("\n");
    if literal {
        fragment = format!("\n{fragment}\n{}", " ".repeat(extra));
    }
    let mut e = Emitter::with_receipt(false);
    e.reset("p.c:1", None);
    e.line(&fragment);
    e.output().to_string()
}

proptest! {
    #[test]
    fn line_emission_ignores_uniform_indentation(lines in arb_fragment(), extra in 0usize..12) {
        prop_assert_eq!(render(&lines, 0, false), render(&lines, extra, false));
    }

    #[test]
    fn literal_fragments_match_plain_ones(lines in arb_fragment(), extra in 0usize..12) {
        prop_assert_eq!(render(&lines, 0, false), render(&lines, extra, true));
    }

    #[test]
    fn emitted_lines_have_no_trailing_whitespace(lines in arb_fragment(), extra in 0usize..12) {
        let out = render(&lines, extra, true);
        prop_assert!(out.lines().all(|l| l == l.trim_end()));
    }
}
