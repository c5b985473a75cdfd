use crate::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of errors reported before fail-fast.
pub const MAX_ERRORS: usize = 20;

/// Error category, determined by error code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Malformed meta-script inside a directive body.
    Syntax,
    /// Malformed directive header or body delimiters.
    Header,
    /// Conflicts between directives found before execution.
    Resolution,
    /// Failures raised while a directive body runs.
    Execution,
    /// A directive finished without binding something it promised.
    Export,
}

/// Numeric error code (E100–E599).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    // ── Syntax errors (E100–E199) ──
    pub const UNEXPECTED_TOKEN: Self = Self(100);
    pub const UNTERMINATED_STRING: Self = Self(101);
    pub const INVALID_ESCAPE: Self = Self(102);
    pub const INVALID_NUMBER: Self = Self(103);
    pub const INVALID_ASSIGN_TARGET: Self = Self(104);
    pub const UNEXPECTED_CHARACTER: Self = Self(105);

    // ── Header errors (E200–E299) ──
    pub const UNKNOWN_HEADER_KIND: Self = Self(200);
    pub const EMPTY_IDENTIFIER_LIST: Self = Self(201);
    pub const INVALID_IDENTIFIER: Self = Self(202);
    pub const RESERVED_IDENTIFIER: Self = Self(203);
    pub const DUPLICATE_IDENTIFIER: Self = Self(204);
    pub const UNTERMINATED_BODY: Self = Self(205);

    // ── Resolution errors (E300–E399) ──
    pub const DUPLICATE_OUTPUT: Self = Self(300);
    pub const DUPLICATE_EXPORT: Self = Self(301);
    pub const UNRESOLVED_IMPORT: Self = Self(302);
    pub const SELF_IMPORT: Self = Self(303);
    pub const CIRCULAR_DEPENDENCY: Self = Self(304);

    // ── Execution errors (E400–E499) ──
    pub const RUNTIME_FAILURE: Self = Self(400);
    pub const GENERATION_FAILURE: Self = Self(401);

    // ── Export errors (E500–E599) ──
    pub const UNBOUND_EXPORT: Self = Self(500);

    /// Get the category for this error code.
    pub fn category(self) -> ErrorCategory {
        match self.0 {
            100..=199 => ErrorCategory::Syntax,
            200..=299 => ErrorCategory::Header,
            300..=399 => ErrorCategory::Resolution,
            400..=499 => ErrorCategory::Execution,
            500..=599 => ErrorCategory::Export,
            _ => ErrorCategory::Execution,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax => write!(f, "syntax"),
            Self::Header => write!(f, "header"),
            Self::Resolution => write!(f, "resolution"),
            Self::Execution => write!(f, "execution"),
            Self::Export => write!(f, "export"),
        }
    }
}

/// A structured error from the meta-script front end.
///
/// Spans are in the coordinates of the unit that was lexed; the compiler
/// maps them back to the directive's source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptError {
    /// Name of the unit the error was found in.
    pub unit: String,
    pub code: ErrorCode,
    /// Error category (derived from code).
    pub category: ErrorCategory,
    pub message: String,
    #[serde(flatten)]
    pub span: Span,
    /// The exact unit line for context.
    pub source_line: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ScriptError {
    /// Create a new error.
    pub fn new(
        unit: impl Into<String>,
        code: ErrorCode,
        message: impl Into<String>,
        span: Span,
        source_line: impl Into<String>,
    ) -> Self {
        Self {
            unit: unit.into(),
            code,
            category: code.category(),
            message: message.into(),
            span,
            source_line: source_line.into(),
            suggestion: None,
        }
    }

    /// Attach a fix suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} [{}] {}",
            self.span, self.code, self.category, self.message
        )
    }
}

impl std::error::Error for ScriptError {}

/// Errors collected while lexing and parsing one unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompileErrors {
    pub errors: Vec<ScriptError>,
    pub total_errors: usize,
}

impl CompileErrors {
    /// Create an empty result (no errors).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Check if there are any errors.
    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    /// Add an error, respecting the MAX_ERRORS limit.
    pub fn push_error(&mut self, error: ScriptError) {
        if self.errors.len() < MAX_ERRORS {
            self.errors.push(error);
        }
        self.total_errors += 1;
    }

    /// The earliest recorded error, by position.
    pub fn first(&self) -> Option<&ScriptError> {
        self.errors
            .iter()
            .min_by_key(|e| (e.span.start_line, e.span.start_col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_category() {
        assert_eq!(ErrorCode::UNEXPECTED_TOKEN.category(), ErrorCategory::Syntax);
        assert_eq!(ErrorCode::UNTERMINATED_BODY.category(), ErrorCategory::Header);
        assert_eq!(
            ErrorCode::CIRCULAR_DEPENDENCY.category(),
            ErrorCategory::Resolution
        );
        assert_eq!(ErrorCode::RUNTIME_FAILURE.category(), ErrorCategory::Execution);
        assert_eq!(ErrorCode::UNBOUND_EXPORT.category(), ErrorCategory::Export);
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(format!("{}", ErrorCode::DUPLICATE_EXPORT), "E301");
        assert_eq!(format!("{}", ErrorCode::UNEXPECTED_TOKEN), "E100");
    }

    #[test]
    fn test_script_error_display() {
        let err = ScriptError::new(
            "colors.h:3",
            ErrorCode::UNEXPECTED_TOKEN,
            "expected '}', found end of input",
            Span::new(4, 1, 4, 1),
            "",
        );
        assert_eq!(
            err.to_string(),
            "4:1: E100 [syntax] expected '}', found end of input"
        );
    }

    #[test]
    fn test_script_error_json_serialization() {
        let err = ScriptError::new(
            "colors.h:3",
            ErrorCode::INVALID_ASSIGN_TARGET,
            "cannot assign to a call",
            Span::new(5, 5, 5, 12),
            "set f() = 1",
        )
        .with_suggestion("assign to a variable, field or index");

        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"start_line\":5"));
        assert!(json.contains("\"suggestion\""));
        let back: ScriptError = serde_json::from_str(&json).unwrap();
        assert_eq!(back.code, err.code);
        assert_eq!(back.span, err.span);
    }

    #[test]
    fn test_compile_errors_max_limit() {
        let mut errs = CompileErrors::empty();
        for i in 0..25 {
            errs.push_error(ScriptError::new(
                "unit",
                ErrorCode::UNEXPECTED_TOKEN,
                format!("Error {i}"),
                Span::point(i as u32 + 1, 1),
                "",
            ));
        }
        assert_eq!(errs.errors.len(), 20);
        assert_eq!(errs.total_errors, 25);
        assert!(errs.has_errors());
        assert_eq!(errs.first().map(|e| e.span.start_line), Some(1));
    }

    #[test]
    fn test_compile_errors_empty() {
        let errs = CompileErrors::empty();
        assert!(!errs.has_errors());
        assert!(errs.first().is_none());
    }
}
