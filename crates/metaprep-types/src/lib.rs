//! Shared types for metaprep.
//!
//! This crate defines the meta-script AST, source spans, structured
//! script errors, and the text utilities shared by the scanner and the
//! code-generation toolkit.

mod error;
mod span;
pub mod ast;
pub mod text;

pub use error::{CompileErrors, ErrorCategory, ErrorCode, ScriptError, MAX_ERRORS};
pub use span::{SourceFile, Span};

/// Result type used by the script front end.
pub type Result<T> = std::result::Result<T, ScriptError>;
