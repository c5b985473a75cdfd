//! Core parser infrastructure: token cursor, error reporting, helpers.

use metaprep_lexer::token::{Token, TokenKind};
use metaprep_lexer::Lexer;
use metaprep_types::ast::{Ident, Program};
use metaprep_types::{CompileErrors, ErrorCode, ScriptError, SourceFile, Span, MAX_ERRORS};

/// The meta-script parser.
///
/// Consumes a token stream produced by the lexer and builds an AST.
/// Collects errors and attempts recovery when possible.
pub struct Parser<'src> {
    tokens: Vec<Token>,
    /// Current index into `tokens`.
    pos: usize,
    source_file: &'src SourceFile,
    unit_name: String,
    errors: CompileErrors,
    /// Current expression nesting depth.
    pub(crate) expr_depth: u32,
}

/// Deepest expression nesting accepted before the parser gives up.
const MAX_EXPR_DEPTH: u32 = 64;

/// Result of parsing.
pub struct ParseResult {
    pub program: Option<Program>,
    pub errors: CompileErrors,
}

/// Lex and parse a whole unit, merging the errors of both stages.
pub fn parse_source(source_file: &SourceFile) -> ParseResult {
    let lexed = Lexer::new(source_file).lex();
    let mut result = Parser::new(lexed.tokens, source_file).parse();
    if lexed.errors.has_errors() {
        let mut errors = lexed.errors;
        for error in result.errors.errors {
            errors.push_error(error);
        }
        result.errors = errors;
        result.program = None;
    }
    result
}

impl<'src> Parser<'src> {
    pub fn new(tokens: Vec<Token>, source_file: &'src SourceFile) -> Self {
        Self {
            tokens,
            pos: 0,
            unit_name: source_file.path.display().to_string(),
            source_file,
            errors: CompileErrors::empty(),
            expr_depth: 0,
        }
    }

    // ── Token Cursor ──────────────────────────────────────────────────────────

    /// Returns the current token without advancing.
    pub(crate) fn peek(&self) -> &Token {
        static EOF: Token = Token {
            kind: TokenKind::Eof,
            span: Span {
                start_line: 1,
                start_col: 1,
                end_line: 1,
                end_col: 1,
            },
        };
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .unwrap_or(&EOF)
    }

    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    /// Advance the cursor by one and return the consumed token.
    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    /// Returns the previously consumed token's span.
    pub(crate) fn previous_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            Span::point(1, 1)
        }
    }

    pub(crate) fn current_span(&self) -> Span {
        self.peek().span
    }

    pub(crate) fn at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    /// Check if the current token matches the given kind exactly.
    pub(crate) fn check_exact(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    /// If the current token matches, advance and return `true`.
    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check_exact(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Look ahead by `n` tokens from current position.
    pub(crate) fn look_ahead(&self, n: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    /// The first token kind at or after the cursor that is not a newline.
    pub(crate) fn peek_past_newlines(&self) -> &TokenKind {
        self.tokens[self.pos.min(self.tokens.len())..]
            .iter()
            .map(|t| &t.kind)
            .find(|k| **k != TokenKind::Newline)
            .unwrap_or(&TokenKind::Eof)
    }

    // ── Newline Handling ──────────────────────────────────────────────────────

    pub(crate) fn skip_newlines(&mut self) {
        while self.check_exact(&TokenKind::Newline) {
            self.advance();
        }
    }

    /// Expect the end of a statement: a newline, a closing brace or the end of input.
    pub(crate) fn expect_newline_or_eof(&mut self) {
        if self.at_end() || self.check_exact(&TokenKind::RBrace) {
            return;
        }
        if self.check_exact(&TokenKind::Newline) {
            self.advance();
            self.skip_newlines();
        } else {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("expected newline, got '{}'", self.peek_kind()),
            );
        }
    }

    // ── Expect Helpers ────────────────────────────────────────────────────────

    /// Expect a specific token kind. Returns the token if matched, or emits an error.
    pub(crate) fn expect(&mut self, expected: &TokenKind) -> Option<Token> {
        if self.check_exact(expected) {
            Some(self.advance())
        } else {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("expected '{}', got '{}'", expected, self.peek_kind()),
            );
            None
        }
    }

    pub(crate) fn expect_identifier(&mut self) -> Option<Ident> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                let span = self.advance().span;
                Some(Ident::new(name, span))
            }
            kind => {
                let message = if kind.is_keyword() {
                    format!("'{kind}' is a reserved word and cannot be used as a name")
                } else {
                    format!("expected identifier, got '{kind}'")
                };
                self.error_at_current(ErrorCode::UNEXPECTED_TOKEN, message);
                None
            }
        }
    }

    /// Expect a name after `.` or a record key; keywords are allowed here.
    pub(crate) fn expect_field_name(&mut self) -> Option<Ident> {
        let kind = self.peek_kind().clone();
        match &kind {
            TokenKind::Identifier(name) | TokenKind::StringLiteral(name) => {
                let name = name.clone();
                let span = self.advance().span;
                Some(Ident::new(name, span))
            }
            _ if kind.is_keyword() => {
                let span = self.advance().span;
                Some(Ident::new(kind.to_string(), span))
            }
            _ => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected field name, got '{}'", self.peek_kind()),
                );
                None
            }
        }
    }

    // ── Error Reporting ───────────────────────────────────────────────────────

    pub(crate) fn error_at_current(&mut self, code: ErrorCode, message: impl Into<String>) {
        let span = self.current_span();
        self.error_at(code, message, span);
    }

    pub(crate) fn error_at(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
        let source_line = self.source_file.line(span.start_line).unwrap_or("");
        let error = ScriptError::new(&self.unit_name, code, message, span, source_line);
        self.errors.push_error(error);
    }

    /// Returns `true` if we've hit the error limit and should stop.
    pub(crate) fn too_many_errors(&self) -> bool {
        self.errors.total_errors >= MAX_ERRORS
    }

    // ── Synchronization ───────────────────────────────────────────────────────

    /// Skip tokens until the start of the next statement.
    pub(crate) fn synchronize(&mut self) {
        while !self.at_end() {
            if self.check_exact(&TokenKind::Newline) {
                self.advance();
                self.skip_newlines();
                return;
            }
            match self.peek_kind() {
                TokenKind::Let
                | TokenKind::Set
                | TokenKind::Fn
                | TokenKind::If
                | TokenKind::For
                | TokenKind::While
                | TokenKind::Return
                | TokenKind::Assert
                | TokenKind::Global
                | TokenKind::RBrace => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ── Public API ────────────────────────────────────────────────────────────

    /// Parse the token stream into a `Program` AST.
    pub fn parse(mut self) -> ParseResult {
        self.skip_newlines();
        let start = self.current_span();
        let mut stmts = Vec::new();
        while !self.at_end() {
            if self.too_many_errors() {
                break;
            }
            if self.check_exact(&TokenKind::RBrace) {
                self.error_at_current(ErrorCode::UNEXPECTED_TOKEN, "unmatched '}'");
                self.advance();
                continue;
            }
            match self.parse_statement() {
                Some(stmt) => stmts.push(stmt),
                None => self.synchronize(),
            }
            self.skip_newlines();
        }
        let span = start.merge(self.previous_span());
        let program = if self.errors.has_errors() {
            None
        } else {
            Some(Program { stmts, span })
        };
        ParseResult {
            program,
            errors: self.errors,
        }
    }

    pub(crate) fn enter_expression(&mut self) -> bool {
        self.expr_depth += 1;
        if self.expr_depth > MAX_EXPR_DEPTH {
            self.error_at_current(
                ErrorCode::UNEXPECTED_TOKEN,
                format!("expressions nest deeper than {MAX_EXPR_DEPTH} levels"),
            );
            self.expr_depth -= 1;
            return false;
        }
        true
    }
}
