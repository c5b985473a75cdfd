//! Runtime values of the directive language.
//!
//! Lists and records are shared, mutable containers: assigning one to a
//! second name aliases it. Values crossing from one directive to another
//! are isolated with [`Value::deep_copy`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use metaprep_types::ast::FnDecl;

use crate::builtins::Builtin;
use crate::env::Env;
use crate::error::{EvalError, EvalResult};

pub type List = Rc<RefCell<Vec<Value>>>;
pub type Record = Rc<RefCell<IndexMap<String, Value>>>;

/// A function value: a declaration plus the scopes it closes over.
pub struct Closure {
    pub decl: Rc<FnDecl>,
    pub env: Env,
    /// Index of the compiled unit the declaration came from.
    pub unit: usize,
}

impl Closure {
    /// `name` for declarations, `<lambda>` for anonymous functions.
    pub fn label(&self) -> String {
        self.decl
            .name
            .as_ref()
            .map_or_else(|| "<lambda>".to_string(), |n| n.name.clone())
    }
}

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(List),
    Record(Record),
    Function(Rc<Closure>),
    Builtin(Builtin),
    /// The code-generation handle.
    Meta,
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn record(fields: IndexMap<String, Value>) -> Self {
        Value::Record(Rc::new(RefCell::new(fields)))
    }

    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Record(_) => "record",
            Value::Function(_) | Value::Builtin(_) => "function",
            Value::Meta => "Meta",
        }
    }

    /// `nil`, `false`, zero and empty containers are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Record(fields) => !fields.borrow().is_empty(),
            Value::Function(_) | Value::Builtin(_) | Value::Meta => true,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    // ── Copying ───────────────────────────────────────────────────────────────

    /// Copy lists and records recursively; functions and `Meta` stay shared.
    ///
    /// Aliasing inside the copied structure is preserved, so a list that
    /// appears twice (or contains itself) is copied once.
    pub fn deep_copy(&self) -> Value {
        self.deep_copy_with(&mut HashMap::new())
    }

    fn deep_copy_with(&self, copied: &mut HashMap<usize, Value>) -> Value {
        match self {
            Value::List(items) => {
                let key = Rc::as_ptr(items) as usize;
                if let Some(copy) = copied.get(&key) {
                    return copy.clone();
                }
                let copy = Rc::new(RefCell::new(Vec::new()));
                copied.insert(key, Value::List(copy.clone()));
                let inner: Vec<Value> = items
                    .borrow()
                    .iter()
                    .map(|v| v.deep_copy_with(copied))
                    .collect();
                *copy.borrow_mut() = inner;
                Value::List(copy)
            }
            Value::Record(fields) => {
                let key = Rc::as_ptr(fields) as usize;
                if let Some(copy) = copied.get(&key) {
                    return copy.clone();
                }
                let copy = Rc::new(RefCell::new(IndexMap::new()));
                copied.insert(key, Value::Record(copy.clone()));
                let inner: IndexMap<String, Value> = fields
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.deep_copy_with(copied)))
                    .collect();
                *copy.borrow_mut() = inner;
                Value::Record(copy)
            }
            other => other.clone(),
        }
    }

    // ── Rendering ─────────────────────────────────────────────────────────────

    /// Render as C source text.
    ///
    /// Booleans are lowercase, integral floats print as integers, `nil` is
    /// `none`, lists become `{ a, b }`, records `{ .k = v }`. Strings are
    /// inserted verbatim.
    pub fn c_repr(&self) -> EvalResult<String> {
        Ok(match self {
            Value::Nil => "none".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.clone(),
            Value::List(items) => {
                let items = items.borrow();
                if items.is_empty() {
                    "{}".to_string()
                } else {
                    let parts = items.iter().map(Value::c_repr).collect::<EvalResult<Vec<_>>>()?;
                    format!("{{ {} }}", parts.join(", "))
                }
            }
            Value::Record(fields) => {
                let fields = fields.borrow();
                if fields.is_empty() {
                    "{}".to_string()
                } else {
                    let parts = fields
                        .iter()
                        .map(|(k, v)| Ok(format!(".{k} = {}", v.c_repr()?)))
                        .collect::<EvalResult<Vec<_>>>()?;
                    format!("{{ {} }}", parts.join(", "))
                }
            }
            Value::Function(_) | Value::Builtin(_) | Value::Meta => {
                return Err(EvalError::value(format!(
                    "a {} has no C representation",
                    self.type_name()
                )))
            }
        })
    }

    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s:?}"),
            other => write!(f, "{other}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{x:.1}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                let items = items.try_borrow().map_err(|_| fmt::Error)?;
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.fmt_nested(f)?;
                }
                write!(f, "]")
            }
            Value::Record(fields) => {
                let fields = fields.try_borrow().map_err(|_| fmt::Error)?;
                write!(f, "{{")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: ")?;
                    v.fmt_nested(f)?;
                }
                write!(f, "}}")
            }
            Value::Function(closure) => write!(f, "<fn {}>", closure.label()),
            Value::Builtin(builtin) => write!(f, "<builtin {}>", builtin.name()),
            Value::Meta => write!(f, "<Meta>"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_nested(f)
    }
}

/// Structural equality; ints and floats compare by numeric value.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) | (Value::Meta, Value::Meta) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_f64() == other.as_f64()
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Record(a), Value::Record(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            _ => false,
        }
    }
}
