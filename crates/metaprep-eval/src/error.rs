//! Runtime error types for the directive evaluator.

use std::fmt;

use metaprep_codegen::CodegenError;
use thiserror::Error;

/// What kind of failure a script raised; decides the diagnostic heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unknown or unbound name.
    Name,
    /// Unknown field or method.
    Attribute,
    /// Missing record key or out-of-range index.
    Key,
    /// A well-typed argument with an unusable value, including toolkit
    /// validation failures.
    Value,
    /// `assert` failed.
    Assertion,
    /// Operand or argument of the wrong type.
    Type,
    /// `fail(...)` and everything else.
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Name => "Name",
            ErrorKind::Attribute => "Attribute",
            ErrorKind::Key => "Key",
            ErrorKind::Value => "Value",
            ErrorKind::Assertion => "Assert",
            ErrorKind::Type => "Type",
            ErrorKind::Other => "Other",
        };
        write!(f, "{s}")
    }
}

/// Where a frame of the trace ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSite {
    /// Script code of the compiled unit with this index.
    Unit(usize),
    /// A builtin or `Meta` method; rendered by name only.
    Native,
}

/// One frame of a runtime trace. `line` is in unit coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFrame {
    pub site: FrameSite,
    pub line: u32,
    /// Function name, `<lambda>`, `Meta.enter`, ...; `None` at the top level.
    pub label: Option<String>,
}

/// A failure raised while a directive body runs.
///
/// `trace` lists frames closest first. It is captured when the error
/// unwinds out of the innermost frame and left alone afterwards.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct EvalError {
    pub kind: ErrorKind,
    pub message: String,
    pub trace: Vec<TraceFrame>,
}

impl EvalError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            trace: Vec::new(),
        }
    }

    pub fn name(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Name, message)
    }

    pub fn attribute(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Attribute, message)
    }

    pub fn key(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Key, message)
    }

    pub fn value(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Value, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Other, message)
    }
}

impl From<CodegenError> for EvalError {
    fn from(err: CodegenError) -> Self {
        EvalError::value(err.to_string())
    }
}

/// Result alias for evaluator operations.
pub type EvalResult<T> = Result<T, EvalError>;
