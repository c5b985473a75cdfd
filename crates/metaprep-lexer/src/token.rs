//! Token types for the meta-script lexer.
//!
//! Defines [`TokenKind`] covering every lexeme of the directive language
//! and [`Token`], which pairs a kind with a source [`Span`].

use metaprep_types::Span;
use std::fmt;

/// Reserved words of the meta-script language.
///
/// These cannot be used as variable names, and the directive scanner
/// rejects them as exported or imported identifiers.
pub const ALL_KEYWORDS: &[&str] = &[
    "let", "set", "fn", "return", "if", "else", "for", "in", "while", "break",
    "continue", "assert", "global", "true", "false", "nil", "and", "or", "not",
];

// ─────────────────────────────────────────────────────────────────────
// Token
// ─────────────────────────────────────────────────────────────────────

/// A single token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

// ─────────────────────────────────────────────────────────────────────
// TokenKind
// ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // ── Literals ──────────────────────────────────────────────
    /// `42`, `0x2A`
    Int(i64),
    /// `3.5`
    Float(f64),
    /// Complete string literal with no interpolation.
    StringLiteral(String),
    True,
    False,
    Nil,

    // ── String Interpolation ─────────────────────────────────
    /// Text before the first `${` of an interpolated string.
    StringStart(String),
    /// Text between a `}` and the next `${`.
    StringPart(String),
    /// Text after the last `}` up to the closing quotes.
    StringEnd(String),
    /// The `${` that opens an interpolation expression.
    InterpolationStart,
    /// The `}` that closes an interpolation expression.
    InterpolationEnd,

    Identifier(String),

    // ── Keywords ─────────────────────────────────────────────
    Let,
    Set,
    Fn,
    Return,
    If,
    Else,
    For,
    In,
    While,
    Break,
    Continue,
    Assert,
    Global,
    And,
    Or,
    Not,

    // ── Operators ────────────────────────────────────────────
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    BangEq,
    Less,
    Greater,
    LessEq,
    GreaterEq,

    // ── Punctuation ──────────────────────────────────────────
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Dot,
    Eq,

    // ── Special ──────────────────────────────────────────────
    /// Statement separator.
    Newline,
    Eof,
}

impl TokenKind {
    /// Look up a reserved word. Returns `None` for user identifiers.
    pub fn from_keyword(s: &str) -> Option<TokenKind> {
        Some(match s {
            "let" => TokenKind::Let,
            "set" => TokenKind::Set,
            "fn" => TokenKind::Fn,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "while" => TokenKind::While,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "assert" => TokenKind::Assert,
            "global" => TokenKind::Global,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "nil" => TokenKind::Nil,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            _ => return None,
        })
    }

    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Let
                | TokenKind::Set
                | TokenKind::Fn
                | TokenKind::Return
                | TokenKind::If
                | TokenKind::Else
                | TokenKind::For
                | TokenKind::In
                | TokenKind::While
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::Assert
                | TokenKind::Global
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Nil
                | TokenKind::And
                | TokenKind::Or
                | TokenKind::Not
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Int(n) => write!(f, "{n}"),
            TokenKind::Float(n) => write!(f, "{n}"),
            TokenKind::StringLiteral(s) => write!(f, "\"{s}\""),
            TokenKind::True => f.write_str("true"),
            TokenKind::False => f.write_str("false"),
            TokenKind::Nil => f.write_str("nil"),
            TokenKind::StringStart(_) => f.write_str("string start"),
            TokenKind::StringPart(_) => f.write_str("string part"),
            TokenKind::StringEnd(_) => f.write_str("string end"),
            TokenKind::InterpolationStart => f.write_str("${"),
            TokenKind::InterpolationEnd => f.write_str("interpolation end"),
            TokenKind::Identifier(s) => f.write_str(s),
            TokenKind::Let => f.write_str("let"),
            TokenKind::Set => f.write_str("set"),
            TokenKind::Fn => f.write_str("fn"),
            TokenKind::Return => f.write_str("return"),
            TokenKind::If => f.write_str("if"),
            TokenKind::Else => f.write_str("else"),
            TokenKind::For => f.write_str("for"),
            TokenKind::In => f.write_str("in"),
            TokenKind::While => f.write_str("while"),
            TokenKind::Break => f.write_str("break"),
            TokenKind::Continue => f.write_str("continue"),
            TokenKind::Assert => f.write_str("assert"),
            TokenKind::Global => f.write_str("global"),
            TokenKind::And => f.write_str("and"),
            TokenKind::Or => f.write_str("or"),
            TokenKind::Not => f.write_str("not"),
            TokenKind::Plus => f.write_str("+"),
            TokenKind::Minus => f.write_str("-"),
            TokenKind::Star => f.write_str("*"),
            TokenKind::Slash => f.write_str("/"),
            TokenKind::Percent => f.write_str("%"),
            TokenKind::EqEq => f.write_str("=="),
            TokenKind::BangEq => f.write_str("!="),
            TokenKind::Less => f.write_str("<"),
            TokenKind::Greater => f.write_str(">"),
            TokenKind::LessEq => f.write_str("<="),
            TokenKind::GreaterEq => f.write_str(">="),
            TokenKind::LParen => f.write_str("("),
            TokenKind::RParen => f.write_str(")"),
            TokenKind::LBrace => f.write_str("{"),
            TokenKind::RBrace => f.write_str("}"),
            TokenKind::LBracket => f.write_str("["),
            TokenKind::RBracket => f.write_str("]"),
            TokenKind::Comma => f.write_str(","),
            TokenKind::Colon => f.write_str(":"),
            TokenKind::Dot => f.write_str("."),
            TokenKind::Eq => f.write_str("="),
            TokenKind::Newline => f.write_str("newline"),
            TokenKind::Eof => f.write_str("end of input"),
        }
    }
}
