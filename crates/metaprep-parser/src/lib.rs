//! metaprep parser: converts a meta-script token stream into an AST.

mod parse_expr;
mod parse_stmt;
mod parser;

pub use parser::{parse_source, ParseResult, Parser};
