//! Integration tests for the directive evaluator.
//!
//! Covers:
//! - bindings, scoping and `global`
//! - control flow and function values
//! - value semantics (aliasing, deep copies)
//! - the `Meta` bindings of every generation primitive
//! - error kinds and traces

use metaprep_codegen::Emitter;
use metaprep_eval::{
    Env, ErrorKind, EvalError, Evaluator, FrameSite, Value, MAX_CALL_DEPTH, MAX_REPEAT_LEN,
};
use metaprep_parser::parse_source;
use metaprep_types::ast::Program;
use metaprep_types::SourceFile;

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn parse(source: &str) -> Program {
    let sf = SourceFile::new("test.mps", source);
    let result = parse_source(&sf);
    if result.errors.has_errors() {
        panic!(
            "parse errors:\n{}",
            result
                .errors
                .errors
                .iter()
                .map(|e| format!("  [{}] {}", e.code, e.message))
                .collect::<Vec<_>>()
                .join("\n")
        );
    }
    result.program.expect("no program after successful parse")
}

/// Run `source` in a fresh namespace; returns the namespace and the output.
fn run_in(source: &str, env: &mut Env) -> Result<String, EvalError> {
    let program = parse(source);
    let mut emitter = Emitter::with_receipt(false);
    emitter.reset("test.mps:1", None);
    Evaluator::new(&mut emitter).run(&program, 0, env)?;
    Ok(emitter.output().to_string())
}

fn run(source: &str) -> (Env, String) {
    let mut env = Env::new();
    let out = run_in(source, &mut env).unwrap_or_else(|e| panic!("evaluation failed: {e}"));
    (env, out)
}

fn output(source: &str) -> String {
    run(source).1
}

fn value(source: &str, name: &str) -> Value {
    run(source)
        .0
        .namespace_get(name)
        .unwrap_or_else(|| panic!("'{name}' is not bound"))
}

fn error(source: &str) -> EvalError {
    match run_in(source, &mut Env::new()) {
        Ok(out) => panic!("expected an error, got output {out:?}"),
        Err(err) => err,
    }
}

fn ints(ns: &[i64]) -> Value {
    Value::list(ns.iter().map(|n| Value::Int(*n)).collect())
}

// ══════════════════════════════════════════════════════════════════════════════
// Bindings and scoping
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn let_binds_in_namespace() {
    assert_eq!(value("let X = 1", "X"), Value::Int(1));
}

#[test]
fn block_scopes_do_not_leak() {
    let (env, _) = run("if true {\n  let inner = 1\n}");
    assert_eq!(env.namespace_get("inner"), None);
}

#[test]
fn global_binds_from_inside_functions() {
    let src = "global COUNT\nfn init() {\n  let COUNT = 3\n}\ninit()";
    assert_eq!(value(src, "COUNT"), Value::Int(3));
}

#[test]
fn set_updates_outer_binding() {
    let src = "let total = 0\nfor n in [1, 2, 3] {\n  set total = total + n\n}";
    assert_eq!(value(src, "total"), Value::Int(6));
}

#[test]
fn set_without_let_is_name_error() {
    let err = error("set missing = 1");
    assert_eq!(err.kind, ErrorKind::Name);
    assert!(err.message.contains("'let'"));
}

#[test]
fn closures_capture_variables() {
    let src = "\
fn counter() {
  let n = 0
  return fn() {
    set n = n + 1
    n
  }
}
let next = counter()
next()
let second = next()";
    assert_eq!(value(src, "second"), Value::Int(2));
}

#[test]
fn recursion() {
    let src = "\
fn fact(n) {
  if n <= 1 {
    return 1
  }
  return n * fact(n - 1)
}
let X = fact(10)";
    assert_eq!(value(src, "X"), Value::Int(3628800));
}

#[test]
fn runaway_recursion_is_an_error() {
    let err = error("fn f(n) {\n  if n == 0 {\n    return 0\n  }\n  return f(n - 1) + 1\n}\nf(1000)");
    assert!(err.message.contains("maximum call depth"), "{}", err.message);
    assert!(err.trace.len() >= MAX_CALL_DEPTH);
}

#[test]
fn recursion_within_depth_limit() {
    let src = format!(
        "fn f(n) {{\n  if n == 0 {{\n    return 0\n  }}\n  return f(n - 1) + 1\n}}\nlet X = f({})",
        MAX_CALL_DEPTH - 1
    );
    assert_eq!(value(&src, "X"), Value::Int(MAX_CALL_DEPTH as i64 - 1));
}

#[test]
fn oversized_repetition_is_an_error() {
    let err = error("let s = \"ab\" * 9223372036854775807");
    assert_eq!(err.kind, ErrorKind::Value);
    assert!(err.message.contains("repetition too large"), "{}", err.message);

    let err = error("let l = [1, 2] * 9000000000");
    assert!(err.message.contains("repetition too large"), "{}", err.message);

    let src = format!("let X = len(\"a\" * {MAX_REPEAT_LEN})");
    assert_eq!(value(&src, "X"), Value::Int(MAX_REPEAT_LEN as i64));
    assert_eq!(value("let X = \"ab\" * -1", "X"), Value::Str(String::new()));
}

// ══════════════════════════════════════════════════════════════════════════════
// Control flow
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn loops_with_break_and_continue() {
    let src = "\
let seen = []
let i = 0
while true {
  set i = i + 1
  if i % 2 == 0 {
    continue
  }
  if i > 7 {
    break
  }
  seen.push(i)
}";
    assert_eq!(value(src, "seen"), ints(&[1, 3, 5, 7]));
}

#[test]
fn for_with_index_over_records_and_strings() {
    let src = "\
let pairs = []
let rec = {a: 1, b: 2}
for key, i in rec {
  pairs.push(\"${i}${key}\")
}
let letters = []
for c in \"xy\" {
  letters.push(c)
}";
    let (env, _) = run(src);
    assert_eq!(env.namespace_get("pairs").unwrap().to_string(), "[\"0a\", \"1b\"]");
    assert_eq!(env.namespace_get("letters").unwrap().to_string(), "[\"x\", \"y\"]");
}

#[test]
fn break_outside_loop_is_an_error() {
    assert_eq!(error("break").kind, ErrorKind::Other);
}

#[test]
fn lambda_value_is_trailing_expression() {
    let src = "let double = fn(x) { x * 2 }\nlet Y = double(21)";
    assert_eq!(value(src, "Y"), Value::Int(42));
}

#[test]
fn logical_operators_return_operands() {
    assert_eq!(value("let X = nil or \"fallback\"", "X"), Value::str("fallback"));
    assert_eq!(value("let X = 0 and fail(\"never\")", "X"), Value::Int(0));
}

#[test]
fn named_arguments_bind_by_name() {
    let src = "fn sub(a, b) {\n  return a - b\n}\nlet X = sub(b: 1, a: 10)";
    assert_eq!(value(src, "X"), Value::Int(9));
}

// ══════════════════════════════════════════════════════════════════════════════
// Values
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn lists_alias_on_assignment() {
    let src = "let a = [1]\nlet b = a\nb.push(2)";
    assert_eq!(value(src, "a"), ints(&[1, 2]));
}

#[test]
fn records_support_fields_and_keys() {
    let src = "\
let r = {name: \"Red\", value: 1}
set r.value = 2
set r[\"extra\"] = true
let n = r.name
let has = r.has(\"extra\")";
    let (env, _) = run(src);
    assert_eq!(env.namespace_get("n"), Some(Value::str("Red")));
    assert_eq!(env.namespace_get("has"), Some(Value::Bool(true)));
    assert_eq!(
        env.namespace_get("r").unwrap().to_string(),
        "{name: \"Red\", value: 2, extra: true}"
    );
}

#[test]
fn record_function_fields_are_callable() {
    let src = "let ops = {twice: fn(x) { x * 2 }}\nlet X = ops.twice(4)";
    assert_eq!(value(src, "X"), Value::Int(8));
}

#[test]
fn interpolation_and_triple_quoted_strings() {
    let src = "let n = 3\nlet X = \"\"\"\n    count = ${n + 1};\n\"\"\"";
    let x = value(src, "X");
    assert!(x.to_string().contains("count = 4;"), "{x}");
}

#[test]
fn deep_copy_isolates_imported_values() {
    let (first, _) = run("let SHARED = [[1], {k: [2]}]");
    let shared = first.namespace_get("SHARED").unwrap();

    let mut second = Env::new();
    second.define_namespace("SHARED", shared.deep_copy());
    run_in("SHARED[0].push(9)\nSHARED[1].k.push(9)", &mut second).unwrap();

    assert_eq!(shared.to_string(), "[[1], {k: [2]}]");
    assert_eq!(
        second.namespace_get("SHARED").unwrap().to_string(),
        "[[1, 9], {k: [2, 9]}]"
    );
}

#[test]
fn builtins_are_shadowable() {
    assert_eq!(value("let len = 5\nlet X = len", "X"), Value::Int(5));
}

// ══════════════════════════════════════════════════════════════════════════════
// Meta bindings
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn meta_line_dedents_fragments() {
    let src = "Meta.line(\"\"\"\n    int x;\n    int y;\n\"\"\")";
    assert_eq!(output(src), "int x;\nint y;\n");
}

#[test]
fn meta_line_without_arguments_is_blank() {
    assert_eq!(output("Meta.line(\"a\")\nMeta.line()\nMeta.line(\"b\")"), "a\n\nb\n");
}

#[test]
fn meta_enter_infers_struct_delimiters() {
    let src = "\
Meta.enter(\"struct Point\", fn() {
  Meta.line(\"int x;\")
})";
    assert_eq!(output(src), "struct Point\n{\n    int x;\n};\n");
}

#[test]
fn meta_enter_closes_scope_on_error() {
    let src = "\
Meta.enter(\"if (x)\", fn() {
  fail(\"boom\")
})";
    let mut emitter = Emitter::with_receipt(false);
    emitter.reset("t:1", None);
    let program = parse(src);
    let err = Evaluator::new(&mut emitter)
        .run(&program, 0, &mut Env::new())
        .unwrap_err();
    assert_eq!(err.message, "boom");
    assert_eq!(emitter.output(), "if (x)\n{\n}\n");
    assert_eq!(emitter.indent(), 0);
}

#[test]
fn meta_enter_overrides() {
    let src = "Meta.enter(\"case 1:\", fn() { Meta.line(\"f();\") }, opening: \"\", closing: \"break;\", indented: true)";
    assert_eq!(output(src), "case 1:\n        f();\n    break;\n");
}

#[test]
fn meta_enums_with_collector() {
    let src = "\
Meta.enums(\"Shape\", nil, fn(members) {
  for name in [\"CIRCLE\", \"SQUARE\"] {
    members.push(name)
  }
}, count: \"define\")";
    let out = output(src);
    assert!(out.starts_with("enum Shape\n{\n"), "{out}");
    assert!(out.contains("    Shape_CIRCLE,\n    Shape_SQUARE,\n"), "{out}");
    assert!(out.ends_with("#define Shape_COUNT 2\n"), "{out}");
}

#[test]
fn meta_enums_rejects_empty() {
    let err = error("Meta.enums(\"E\", \"u8\", [])");
    assert_eq!(err.kind, ErrorKind::Value);
    assert!(err.message.contains("no members"));
}

#[test]
fn meta_enums_rejects_duplicate_member() {
    let err = error("Meta.enums(\"Color\", \"u8\", [\"RED\", \"RED\"])");
    assert_eq!(err.kind, ErrorKind::Value);
    assert!(err.message.contains("duplicate member 'RED'"), "{}", err.message);
}

#[test]
fn meta_enums_rejects_unknown_count_style() {
    let err = error("Meta.enums(\"E\", \"u8\", [\"A\"], count: \"sometimes\")");
    assert_eq!(err.kind, ErrorKind::Value);
}

#[test]
fn meta_define_forms() {
    let src = "\
Meta.define(\"VERSION\", 3)
Meta.define(\"MAX\", \"a, b\", \"((a) > (b) ? (a) : (b))\")
Meta.define(\"SWAP\", [\"x\", \"y\"], \"\"\"
    tmp = x;
    x = y;
    y = tmp;
\"\"\", do_while: true)";
    let out = output(src);
    assert!(out.starts_with("#define VERSION 3\n#define MAX(a, b) ((a) > (b) ? (a) : (b))\n"), "{out}");
    assert!(out.contains("#define SWAP(x, y) \\\n"), "{out}");
    assert!(out.contains("while (false)"), "{out}");
}

#[test]
fn meta_define_overloads() {
    let src = "\
Meta.define(\"PICK\", [\"N\", \"X\"], \"A\", overload: {N: 1})
Meta.define(\"PICK\", [\"N\", \"X\"], \"B\", overload: {N: 2})";
    let out = output(src);
    assert_eq!(
        out,
        "#define __MACRO_OVERLOAD__PICK__1(X) A\n#define __MACRO_OVERLOAD__PICK__2(X) B\n"
    );
}

#[test]
fn meta_define_overload_key_must_be_param() {
    let err = error("Meta.define(\"P\", [\"N\"], \"A\", overload: {M: 1})");
    assert_eq!(err.kind, ErrorKind::Value);
    assert!(err.message.contains("not in its parameter list"), "{}", err.message);
}

#[test]
fn meta_lut_rows() {
    let src = "\
Meta.lut(\"PINS\", [
  [0, [\"port\", 1], [\"bit\", 4]],
  [10, {port: 12, bit: 0}],
])";
    let out = output(src);
    assert!(out.starts_with("static const struct { typeof(1) port; typeof(4) bit; } PINS[] =\n"), "{out}");
    assert!(out.contains("[0]  = { .port = 1,  .bit = 4 },"), "{out}");
    assert!(out.contains("[10] = { .port = 12, .bit = 0 },"), "{out}");
}

#[test]
fn meta_lut_duplicate_index() {
    let err = error("Meta.lut(\"int\", \"T\", [[1, {a: 1}], [1, {a: 2}]])");
    assert!(err.message.contains("duplicate index"), "{}", err.message);
}

#[test]
fn meta_ifs_elif_chain() {
    let src = "\
Meta.ifs([\"A\", \"B\"], \"#elif\", fn(x) { \"defined(${x})\" }, fn(x) {
  Meta.line(\"#define HAVE_${x} 1\")
}, otherwise: fn() { Meta.line(\"#error none\") })";
    assert_eq!(
        output(src),
        "#if defined(A)\n    #define HAVE_A 1\n#elif defined(B)\n    #define HAVE_B 1\n#else\n    #error none\n#endif\n"
    );
}

#[test]
fn meta_section_only_when_used() {
    let src = "\
Meta.section(\"// empty\", fn() { })
Meta.section(\"// used\", fn() { Meta.line(\"int x;\") })";
    assert_eq!(output(src), "// used\nint x;\n");
}

#[test]
fn meta_unknown_method_suggests() {
    let err = error("Meta.lines(\"x\")");
    assert_eq!(err.kind, ErrorKind::Attribute);
    assert!(err.message.contains("did you mean 'line'"), "{}", err.message);
}

// ══════════════════════════════════════════════════════════════════════════════
// Errors and traces
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn assertion_carries_message() {
    let err = error("let x = 1\nassert x == 2, \"x is ${x}\"");
    assert_eq!(err.kind, ErrorKind::Assertion);
    assert_eq!(err.message, "x is 1");
    assert_eq!(err.trace[0].line, 2);
}

#[test]
fn error_kinds() {
    assert_eq!(error("let x = y").kind, ErrorKind::Name);
    assert_eq!(error("let r = {}\nlet x = r.missing").kind, ErrorKind::Attribute);
    assert_eq!(error("let r = {}\nlet x = r[\"missing\"]").kind, ErrorKind::Key);
    assert_eq!(error("let x = [1][3]").kind, ErrorKind::Key);
    assert_eq!(error("let x = 1 / 0").kind, ErrorKind::Value);
    assert_eq!(error("let x = 1 + \"a\"").kind, ErrorKind::Type);
    assert_eq!(error("fail(\"custom\")").kind, ErrorKind::Other);
}

#[test]
fn trace_walks_outward_through_calls() {
    let src = "\
fn inner() {
  let r = {}
  return r.nope
}
fn outer() {
  return inner()
}
outer()";
    let err = error(src);
    let lines: Vec<(u32, Option<&str>)> = err
        .trace
        .iter()
        .map(|f| (f.line, f.label.as_deref()))
        .collect();
    assert_eq!(
        lines,
        vec![(3, Some("inner")), (6, Some("outer")), (8, None)]
    );
}

#[test]
fn trace_includes_native_frames() {
    let src = "\
Meta.enter(\"struct S\", fn() {
  Meta.line(missing)
})";
    let err = error(src);
    let sites: Vec<(&FrameSite, Option<&str>)> = err
        .trace
        .iter()
        .map(|f| (&f.site, f.label.as_deref()))
        .collect();
    assert_eq!(
        sites,
        vec![
            (&FrameSite::Unit(0), Some("<lambda>")),
            (&FrameSite::Native, Some("Meta.enter")),
            (&FrameSite::Unit(0), None),
        ]
    );
    assert_eq!(err.trace[0].line, 2);
}

#[test]
fn table_builtin_row_error() {
    let err = error("let t = table([\"a\", \"b\"], [1, 2], [3])");
    assert_eq!(err.kind, ErrorKind::Value);
    assert_eq!(err.message, "Row 2 has 1 entries but the header defines 2 columns.");
}

#[test]
fn evaluation_determinism_100_iterations() {
    let src = "\
Meta.enums(\"Color\", \"u8\", [\"RED\", [\"GREEN\", 4], \"BLUE\"])
Meta.define(\"SQ\", \"x\", \"((x) * (x))\")";
    let first = output(src);
    for i in 0..100 {
        assert_eq!(first, output(src), "Determinism failure at iteration {i}");
    }
}
