//! Builtin functions and the methods of lists, strings and records.
//!
//! Builtins never call back into script code, so they need no evaluator.
//! `Meta` methods live in [`crate::meta`].

use std::cmp::Ordering;
use std::collections::VecDeque;

use indexmap::IndexMap;

use crate::error::{EvalError, EvalResult};
use crate::value::{List, Record, Value};

// ══════════════════════════════════════════════════════════════════════════════
// Arguments
// ══════════════════════════════════════════════════════════════════════════════

/// Call arguments, consumed parameter by parameter.
///
/// Each [`Args::take`] looks for a named argument first and otherwise uses
/// the next positional one. [`Args::finish`] rejects whatever is left.
pub struct Args {
    callee: String,
    positional: VecDeque<Value>,
    named: IndexMap<String, Value>,
}

impl Args {
    pub fn new(callee: impl Into<String>, positional: Vec<Value>, named: IndexMap<String, Value>) -> Self {
        Self {
            callee: callee.into(),
            positional: positional.into(),
            named,
        }
    }

    pub fn callee(&self) -> &str {
        &self.callee
    }

    /// Positional arguments not yet taken.
    pub fn remaining(&self) -> usize {
        self.positional.len()
    }

    pub fn take(&mut self, name: &str) -> Option<Value> {
        self.named
            .shift_remove(name)
            .or_else(|| self.positional.pop_front())
    }

    /// Only a named argument; positional ones are left alone.
    pub fn take_named(&mut self, name: &str) -> Option<Value> {
        self.named.shift_remove(name)
    }

    pub fn required(&mut self, name: &str) -> EvalResult<Value> {
        self.take(name).ok_or_else(|| {
            EvalError::type_error(format!("{}() missing argument '{name}'", self.callee))
        })
    }

    /// Every positional argument not yet taken.
    pub fn rest(&mut self) -> Vec<Value> {
        self.positional.drain(..).collect()
    }

    pub fn finish(self) -> EvalResult<()> {
        if let Some(name) = self.named.keys().next() {
            return Err(EvalError::type_error(format!(
                "{}() got an unexpected argument '{name}'",
                self.callee
            )));
        }
        if !self.positional.is_empty() {
            return Err(EvalError::type_error(format!(
                "{}() got {} more argument(s) than it takes",
                self.callee,
                self.positional.len()
            )));
        }
        Ok(())
    }
}

// ── Conversions ──────────────────────────────────────────────────────────────

fn mismatch(what: &str, expected: &str, got: &Value) -> EvalError {
    EvalError::type_error(format!("{what} must be {expected}, not {}", got.type_name()))
}

pub fn expect_str(value: &Value, what: &str) -> EvalResult<String> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        other => Err(mismatch(what, "a string", other)),
    }
}

pub fn expect_int(value: &Value, what: &str) -> EvalResult<i64> {
    match value {
        Value::Int(n) => Ok(*n),
        other => Err(mismatch(what, "an int", other)),
    }
}

pub fn expect_list(value: &Value, what: &str) -> EvalResult<List> {
    match value {
        Value::List(items) => Ok(items.clone()),
        other => Err(mismatch(what, "a list", other)),
    }
}

pub fn expect_record(value: &Value, what: &str) -> EvalResult<Record> {
    match value {
        Value::Record(fields) => Ok(fields.clone()),
        other => Err(mismatch(what, "a record", other)),
    }
}

/// Order numbers with numbers and strings with strings.
pub fn compare(left: &Value, right: &Value) -> EvalResult<Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).ok_or_else(|| {
                EvalError::value("cannot order NaN")
            }),
            _ => Err(EvalError::type_error(format!(
                "cannot order {} and {}",
                left.type_name(),
                right.type_name()
            ))),
        },
    }
}

/// Resolve a possibly negative index against a length.
pub fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let i = if index < 0 { index + len } else { index };
    (0..len).contains(&i).then_some(i as usize)
}

// ══════════════════════════════════════════════════════════════════════════════
// Builtin functions
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Len,
    Range,
    Str,
    Int,
    Float,
    Upper,
    Lower,
    Join,
    Keys,
    Min,
    Max,
    Abs,
    CStr,
    CRepr,
    Table,
    Fail,
    Log,
    TypeOf,
}

const BUILTINS: &[(&str, Builtin)] = &[
    ("len", Builtin::Len),
    ("range", Builtin::Range),
    ("str", Builtin::Str),
    ("int", Builtin::Int),
    ("float", Builtin::Float),
    ("upper", Builtin::Upper),
    ("lower", Builtin::Lower),
    ("join", Builtin::Join),
    ("keys", Builtin::Keys),
    ("min", Builtin::Min),
    ("max", Builtin::Max),
    ("abs", Builtin::Abs),
    ("c_str", Builtin::CStr),
    ("c_repr", Builtin::CRepr),
    ("table", Builtin::Table),
    ("fail", Builtin::Fail),
    ("log", Builtin::Log),
    ("type_of", Builtin::TypeOf),
];

impl Builtin {
    pub fn from_name(name: &str) -> Option<Builtin> {
        BUILTINS.iter().find(|(n, _)| *n == name).map(|(_, b)| *b)
    }

    pub fn name(self) -> &'static str {
        BUILTINS
            .iter()
            .find(|(_, b)| *b == self)
            .map_or("?", |(n, _)| n)
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        BUILTINS.iter().map(|(n, _)| *n)
    }

    pub fn call(self, mut args: Args) -> EvalResult<Value> {
        let result = match self {
            Builtin::Len => {
                let value = args.required("value")?;
                Value::Int(length(&value)? as i64)
            }
            Builtin::Range => range(&mut args)?,
            Builtin::Str => Value::Str(args.required("value")?.to_string()),
            Builtin::Int => to_int(&args.required("value")?)?,
            Builtin::Float => to_float(&args.required("value")?)?,
            Builtin::Upper => Value::Str(expect_str(&args.required("text")?, "text")?.to_uppercase()),
            Builtin::Lower => Value::Str(expect_str(&args.required("text")?, "text")?.to_lowercase()),
            Builtin::Join => {
                let items = expect_list(&args.required("items")?, "items")?;
                let sep = match args.take("sep") {
                    Some(sep) => expect_str(&sep, "sep")?,
                    None => ", ".to_string(),
                };
                let parts: Vec<String> = items.borrow().iter().map(Value::to_string).collect();
                Value::Str(parts.join(&sep))
            }
            Builtin::Keys => {
                let record = expect_record(&args.required("record")?, "record")?;
                let keys = record.borrow().keys().map(|k| Value::str(k.as_str())).collect();
                Value::list(keys)
            }
            Builtin::Min => extremum(&mut args, Ordering::Less)?,
            Builtin::Max => extremum(&mut args, Ordering::Greater)?,
            Builtin::Abs => match args.required("value")? {
                Value::Int(n) => Value::Int(
                    n.checked_abs()
                        .ok_or_else(|| EvalError::value("integer overflow in abs()"))?,
                ),
                Value::Float(f) => Value::Float(f.abs()),
                other => return Err(mismatch("abs() argument", "a number", &other)),
            },
            Builtin::CStr => Value::Str(c_str(&expect_str(&args.required("text")?, "text")?)),
            Builtin::CRepr => Value::Str(args.required("value")?.c_repr()?),
            Builtin::Table => table(&mut args)?,
            Builtin::Fail => {
                let message = args.take("message").map(|m| m.to_string()).unwrap_or_default();
                return Err(EvalError::other(message));
            }
            Builtin::Log => {
                let parts: Vec<String> = args.rest().iter().map(Value::to_string).collect();
                tracing::info!(target: "metaprep::script", "{}", parts.join(" "));
                Value::Nil
            }
            Builtin::TypeOf => Value::str(args.required("value")?.type_name()),
        };
        args.finish()?;
        Ok(result)
    }
}

fn length(value: &Value) -> EvalResult<usize> {
    match value {
        Value::Str(s) => Ok(s.chars().count()),
        Value::List(items) => Ok(items.borrow().len()),
        Value::Record(fields) => Ok(fields.borrow().len()),
        other => Err(EvalError::type_error(format!("{} has no length", other.type_name()))),
    }
}

fn range(args: &mut Args) -> EvalResult<Value> {
    let first = expect_int(&args.required("start")?, "range() bound")?;
    let (start, stop) = match args.take("stop") {
        Some(stop) => (first, expect_int(&stop, "range() bound")?),
        None => (0, first),
    };
    let step = match args.take("step") {
        Some(step) => expect_int(&step, "range() step")?,
        None => 1,
    };
    if step == 0 {
        return Err(EvalError::value("range() step must not be zero"));
    }
    let mut items = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        items.push(Value::Int(i));
        i = match i.checked_add(step) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(Value::list(items))
}

fn to_int(value: &Value) -> EvalResult<Value> {
    match value {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
        Value::Str(s) => {
            let s = s.trim();
            let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(hex) => i64::from_str_radix(hex, 16).ok(),
                None => s.parse().ok(),
            };
            parsed
                .map(Value::Int)
                .ok_or_else(|| EvalError::value(format!("invalid int literal \"{s}\"")))
        }
        other => Err(EvalError::value(format!("cannot convert {other} to an int"))),
    }
}

fn to_float(value: &Value) -> EvalResult<Value> {
    match value {
        Value::Int(n) => Ok(Value::Float(*n as f64)),
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Str(s) => s
            .trim()
            .parse()
            .map(Value::Float)
            .map_err(|_| EvalError::value(format!("invalid float literal \"{s}\""))),
        other => Err(EvalError::value(format!("cannot convert {other} to a float"))),
    }
}

/// `min(list)` or `min(a, b, ...)`.
fn extremum(args: &mut Args, wanted: Ordering) -> EvalResult<Value> {
    let which = if wanted == Ordering::Less { "min" } else { "max" };
    let candidates = match args.rest() {
        single if single.len() == 1 => match &single[0] {
            Value::List(items) => items.borrow().clone(),
            _ => single,
        },
        many => many,
    };
    let mut best: Option<Value> = None;
    for candidate in candidates {
        best = match best {
            Some(current) if compare(&candidate, &current)? != wanted => Some(current),
            _ => Some(candidate),
        };
    }
    best.ok_or_else(|| EvalError::value(format!("{which}() of an empty sequence")))
}

/// Quote `text` as a C string literal.
pub fn c_str(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_ascii_control() => out.push_str(&format!("\\{:03o}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// `table(header, row, ...)`: a list of records, one per non-nil row.
fn table(args: &mut Args) -> EvalResult<Value> {
    let header = expect_list(&args.required("header")?, "table() header")?;
    let header: Vec<String> = header
        .borrow()
        .iter()
        .map(|column| expect_str(column, "table() column"))
        .collect::<EvalResult<_>>()?;
    let mut records = Vec::new();
    for (i, row) in args.rest().iter().enumerate() {
        if matches!(row, Value::Nil) {
            continue;
        }
        let row = expect_list(row, "table() row")?;
        let row = row.borrow();
        if row.len() != header.len() {
            return Err(EvalError::value(format!(
                "Row {} has {} entries but the header defines {} columns.",
                i + 1,
                row.len(),
                header.len()
            )));
        }
        let fields = header.iter().cloned().zip(row.iter().cloned()).collect();
        records.push(Value::record(fields));
    }
    Ok(Value::list(records))
}

// ══════════════════════════════════════════════════════════════════════════════
// Methods
// ══════════════════════════════════════════════════════════════════════════════

/// Call a method of a list, string or record.
pub fn call_method(receiver: &Value, method: &str, mut args: Args) -> EvalResult<Value> {
    let result = match receiver {
        Value::List(items) => list_method(items, method, &mut args)?,
        Value::Str(s) => str_method(s, method, &mut args)?,
        Value::Record(fields) => record_method(fields, method, &mut args)?,
        other => {
            return Err(EvalError::attribute(format!(
                "{} has no method '{method}'",
                other.type_name()
            )))
        }
    };
    args.finish()?;
    Ok(result)
}

fn no_method(kind: &str, method: &str) -> EvalError {
    EvalError::attribute(format!("{kind} has no method '{method}'"))
}

fn list_method(items: &List, method: &str, args: &mut Args) -> EvalResult<Value> {
    Ok(match method {
        "push" => {
            let value = args.required("value")?;
            items.borrow_mut().push(value);
            Value::Nil
        }
        "pop" => {
            let mut items = items.borrow_mut();
            let index = match args.take("index") {
                Some(index) => expect_int(&index, "pop() index")?,
                None => -1,
            };
            let at = resolve_index(index, items.len())
                .ok_or_else(|| EvalError::key(format!("pop index {index} out of range")))?;
            items.remove(at)
        }
        "extend" => {
            let other = expect_list(&args.required("items")?, "extend() argument")?;
            let copied = other.borrow().clone();
            items.borrow_mut().extend(copied);
            Value::Nil
        }
        "contains" => {
            let value = args.required("value")?;
            Value::Bool(items.borrow().contains(&value))
        }
        "index" => {
            let value = args.required("value")?;
            let found = items.borrow().iter().position(|v| *v == value);
            match found {
                Some(i) => Value::Int(i as i64),
                None => return Err(EvalError::value(format!("{value:?} is not in list"))),
            }
        }
        "reverse" => {
            items.borrow_mut().reverse();
            Value::Nil
        }
        other => return Err(no_method("list", other)),
    })
}

fn text_arg(args: &mut Args, name: &str) -> EvalResult<String> {
    let what = format!("{}() argument", args.callee());
    expect_str(&args.required(name)?, &what)
}

fn str_method(s: &str, method: &str, args: &mut Args) -> EvalResult<Value> {
    Ok(match method {
        "upper" => Value::str(s.to_uppercase()),
        "lower" => Value::str(s.to_lowercase()),
        "strip" => Value::str(s.trim()),
        "split" => {
            let parts: Vec<Value> = match args.take("sep") {
                Some(sep) => {
                    let sep = expect_str(&sep, "split() separator")?;
                    if sep.is_empty() {
                        return Err(EvalError::value("empty separator"));
                    }
                    s.split(sep.as_str()).map(Value::str).collect()
                }
                None => s.split_whitespace().map(Value::str).collect(),
            };
            Value::list(parts)
        }
        "replace" => {
            let from = text_arg(args, "old")?;
            let to = text_arg(args, "new")?;
            Value::str(s.replace(&from, &to))
        }
        "starts_with" => Value::Bool(s.starts_with(&text_arg(args, "prefix")?)),
        "ends_with" => Value::Bool(s.ends_with(&text_arg(args, "suffix")?)),
        "contains" => Value::Bool(s.contains(&text_arg(args, "text")?)),
        other => return Err(no_method("string", other)),
    })
}

fn record_method(fields: &Record, method: &str, args: &mut Args) -> EvalResult<Value> {
    Ok(match method {
        "keys" => Value::list(fields.borrow().keys().map(|k| Value::str(k.as_str())).collect()),
        "values" => Value::list(fields.borrow().values().cloned().collect()),
        "get" => {
            let key = expect_str(&args.required("key")?, "get() key")?;
            let default = args.take("default").unwrap_or(Value::Nil);
            fields.borrow().get(&key).cloned().unwrap_or(default)
        }
        "has" => {
            let key = expect_str(&args.required("key")?, "has() key")?;
            Value::Bool(fields.borrow().contains_key(&key))
        }
        other => return Err(no_method("record", other)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn call(builtin: &str, positional: Vec<Value>) -> EvalResult<Value> {
        let builtin = Builtin::from_name(builtin).unwrap();
        builtin.call(Args::new(builtin.name(), positional, IndexMap::new()))
    }

    fn ints(ns: &[i64]) -> Value {
        Value::list(ns.iter().map(|n| Value::Int(*n)).collect())
    }

    #[test]
    fn test_range_forms() {
        assert_eq!(call("range", vec![Value::Int(3)]).unwrap(), ints(&[0, 1, 2]));
        assert_eq!(call("range", vec![Value::Int(1), Value::Int(3)]).unwrap(), ints(&[1, 2]));
        assert_eq!(
            call("range", vec![Value::Int(5), Value::Int(0), Value::Int(-2)]).unwrap(),
            ints(&[5, 3, 1])
        );
        assert_eq!(
            call("range", vec![Value::Int(0), Value::Int(1), Value::Int(0)])
                .unwrap_err()
                .kind,
            ErrorKind::Value
        );
    }

    #[test]
    fn test_c_str_escapes() {
        assert_eq!(c_str("a\"b\\\n\u{1}"), "\"a\\\"b\\\\\\n\\001\"");
    }

    #[test]
    fn test_table_skips_nil_rows() {
        let header = Value::list(vec![Value::str("name"), Value::str("size")]);
        let row = Value::list(vec![Value::str("A"), Value::Int(1)]);
        let table = call("table", vec![header, Value::Nil, row]).unwrap();
        assert_eq!(table.to_string(), "[{name: \"A\", size: 1}]");
    }

    #[test]
    fn test_table_row_length_mismatch() {
        let header = Value::list(vec![Value::str("name"), Value::str("size")]);
        let err = call("table", vec![header, Value::Nil, ints(&[1])]).unwrap_err();
        assert_eq!(
            err.message,
            "Row 2 has 1 entries but the header defines 2 columns."
        );
    }

    #[test]
    fn test_min_max() {
        assert_eq!(call("min", vec![ints(&[3, 1, 2])]).unwrap(), Value::Int(1));
        assert_eq!(
            call("max", vec![Value::Int(3), Value::Float(4.5)]).unwrap(),
            Value::Float(4.5)
        );
        assert!(call("min", vec![ints(&[])]).is_err());
    }

    #[test]
    fn test_int_parsing() {
        assert_eq!(call("int", vec![Value::str(" 0x10 ")]).unwrap(), Value::Int(16));
        assert_eq!(call("int", vec![Value::Float(-2.7)]).unwrap(), Value::Int(-2));
        assert_eq!(call("int", vec![Value::str("x")]).unwrap_err().kind, ErrorKind::Value);
    }

    #[test]
    fn test_extra_arguments_rejected() {
        let err = call("len", vec![Value::str("a"), Value::str("b")]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Type);
    }

    #[test]
    fn test_list_methods() {
        let list = ints(&[1, 2, 3]);
        let pop = |args: Vec<Value>| call_method(&list, "pop", Args::new("pop", args, IndexMap::new()));
        assert_eq!(pop(vec![]).unwrap(), Value::Int(3));
        assert_eq!(pop(vec![Value::Int(0)]).unwrap(), Value::Int(1));
        assert_eq!(list, ints(&[2]));
        assert_eq!(pop(vec![Value::Int(4)]).unwrap_err().kind, ErrorKind::Key);
    }

    #[test]
    fn test_unknown_method_is_attribute_error() {
        let err = call_method(&Value::str("x"), "frobnicate", Args::new("frobnicate", vec![], IndexMap::new()))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Attribute);
    }

    #[test]
    fn test_builtin_names_round_trip() {
        for name in Builtin::names() {
            assert_eq!(Builtin::from_name(name).map(Builtin::name), Some(name));
        }
    }
}
