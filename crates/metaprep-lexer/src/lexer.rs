//! Meta-script lexer: converts a unit's text to a token stream.
//!
//! Features:
//! - String interpolation with `${expr}` via a mode stack
//! - Triple-quoted multi-line strings (`"""..."""`), also interpolating
//! - `#` line comments stripped
//! - Error recovery: collects up to 20 errors instead of stopping at the first
//! - Newline-separated statements (no semicolons)

use metaprep_types::{CompileErrors, ErrorCode, ScriptError, SourceFile, Span, MAX_ERRORS};

use crate::token::{Token, TokenKind};

/// Lexer mode: top-level code, string text, or an interpolation inside a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    /// Inside a string literal, scanning text until the closing quotes or `${`.
    String { triple: bool },
    /// Inside `${...}`. `brace_depth` counts nested `{` so the closing `}`
    /// of the interpolation can be told apart.
    Interpolation { brace_depth: u32, triple: bool },
}

/// The meta-script lexer.
///
/// Converts source text into a vector of [`Token`]s, collecting up to
/// [`MAX_ERRORS`] errors along the way.
pub struct Lexer<'src> {
    source: &'src [u8],
    source_file: &'src SourceFile,
    unit_name: String,
    /// Current byte offset into `source`.
    pos: usize,
    line: u32,
    col: u32,
    errors: CompileErrors,
    mode_stack: Vec<Mode>,
    /// Tokens to emit before the next scan (used for interpolation).
    pending: Vec<Token>,
}

/// Result of lexing: tokens + any errors collected.
pub struct LexResult {
    /// The token stream (always ends with [`TokenKind::Eof`]).
    pub tokens: Vec<Token>,
    pub errors: CompileErrors,
}

impl<'src> Lexer<'src> {
    pub fn new(source_file: &'src SourceFile) -> Self {
        Self {
            source: source_file.source.as_bytes(),
            source_file,
            unit_name: source_file.path.display().to_string(),
            pos: 0,
            line: 1,
            col: 1,
            errors: CompileErrors::empty(),
            mode_stack: vec![Mode::Normal],
            pending: Vec::new(),
        }
    }

    /// Lex the entire unit into a token stream.
    pub fn lex(mut self) -> LexResult {
        let mut tokens = Vec::new();

        loop {
            if self.errors.total_errors >= MAX_ERRORS {
                break;
            }

            if let Some(pending) = self.pending.pop() {
                tokens.push(pending);
                continue;
            }

            let token = match self.current_mode() {
                Mode::Normal | Mode::Interpolation { .. } => self.scan_normal(),
                Mode::String { triple } => self.scan_string_text(triple, false),
            };

            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            tokens.push(Token::new(TokenKind::Eof, self.current_span()));
        }

        LexResult {
            tokens,
            errors: self.errors,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Mode stack helpers
    // ─────────────────────────────────────────────────────────────

    fn current_mode(&self) -> Mode {
        *self.mode_stack.last().unwrap_or(&Mode::Normal)
    }

    fn push_mode(&mut self, mode: Mode) {
        self.mode_stack.push(mode);
    }

    fn pop_mode(&mut self) {
        if self.mode_stack.len() > 1 {
            self.mode_stack.pop();
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Character-level helpers
    // ─────────────────────────────────────────────────────────────

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.source.get(self.pos).copied()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
        } else if ch & 0xC0 != 0x80 {
            // Continuation bytes of a UTF-8 sequence do not advance the column.
            self.col += 1;
        }
        Some(ch)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn at_triple_quote(&self) -> bool {
        self.peek() == Some(b'"') && self.peek_at(1) == Some(b'"') && self.peek_at(2) == Some(b'"')
    }

    fn current_span(&self) -> Span {
        Span::point(self.line, self.col)
    }

    fn span_from(&self, start_line: u32, start_col: u32) -> Span {
        Span::new(
            start_line,
            start_col,
            self.line,
            self.col.saturating_sub(1).max(1),
        )
    }

    fn token_at(&self, start_line: u32, start_col: u32, kind: TokenKind) -> Token {
        Token::new(kind, self.span_from(start_line, start_col))
    }

    fn emit_error(&mut self, code: ErrorCode, message: impl Into<String>, span: Span) {
        let source_line = self.source_file.line(span.start_line).unwrap_or("");
        let err = ScriptError::new(&self.unit_name, code, message, span, source_line);
        self.errors.push_error(err);
    }

    fn emit_error_with_suggestion(
        &mut self,
        code: ErrorCode,
        message: impl Into<String>,
        span: Span,
        suggestion: impl Into<String>,
    ) {
        let source_line = self.source_file.line(span.start_line).unwrap_or("");
        let err = ScriptError::new(&self.unit_name, code, message, span, source_line)
            .with_suggestion(suggestion);
        self.errors.push_error(err);
    }

    // ─────────────────────────────────────────────────────────────
    // Whitespace & comments
    // ─────────────────────────────────────────────────────────────

    /// Skip spaces and tabs (not newlines, those are tokens).
    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r')) {
            self.advance();
        }
    }

    /// Skip a `#` comment up to (not including) the newline.
    fn skip_comment(&mut self) -> bool {
        if self.peek() != Some(b'#') {
            return false;
        }
        while self.peek().is_some_and(|ch| ch != b'\n') {
            self.advance();
        }
        true
    }

    // ─────────────────────────────────────────────────────────────
    // Normal-mode scanning
    // ─────────────────────────────────────────────────────────────

    fn scan_normal(&mut self) -> Token {
        loop {
            self.skip_whitespace();
            if !self.skip_comment() {
                break;
            }
        }

        if self.errors.total_errors >= MAX_ERRORS {
            return Token::new(TokenKind::Eof, self.current_span());
        }

        if self.at_end() {
            if self.mode_stack.len() > 1 {
                self.emit_error(
                    ErrorCode::UNTERMINATED_STRING,
                    "Unterminated string literal",
                    self.current_span(),
                );
            }
            return Token::new(TokenKind::Eof, self.current_span());
        }

        let start_line = self.line;
        let start_col = self.col;
        let Some(ch) = self.advance() else {
            return Token::new(TokenKind::Eof, self.current_span());
        };

        match ch {
            b'\n' => self.token_at(start_line, start_col, TokenKind::Newline),

            b'"' => {
                if self.peek() == Some(b'"') && self.peek_at(1) == Some(b'"') {
                    self.advance();
                    self.advance();
                    self.scan_string_text(true, true)
                        .with_start(start_line, start_col)
                } else {
                    self.scan_string_text(false, true)
                        .with_start(start_line, start_col)
                }
            }

            b'0'..=b'9' => self.scan_number(start_line, start_col),

            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.scan_identifier(start_line, start_col),

            b'+' => self.token_at(start_line, start_col, TokenKind::Plus),
            b'-' => self.token_at(start_line, start_col, TokenKind::Minus),
            b'*' => self.token_at(start_line, start_col, TokenKind::Star),
            b'/' => self.token_at(start_line, start_col, TokenKind::Slash),
            b'%' => self.token_at(start_line, start_col, TokenKind::Percent),
            b'(' => self.token_at(start_line, start_col, TokenKind::LParen),
            b')' => self.token_at(start_line, start_col, TokenKind::RParen),
            b'[' => self.token_at(start_line, start_col, TokenKind::LBracket),
            b']' => self.token_at(start_line, start_col, TokenKind::RBracket),
            b',' => self.token_at(start_line, start_col, TokenKind::Comma),
            b':' => self.token_at(start_line, start_col, TokenKind::Colon),
            b'.' => self.token_at(start_line, start_col, TokenKind::Dot),

            b'=' => {
                if self.peek() == Some(b'=') {
                    self.advance();
                    self.token_at(start_line, start_col, TokenKind::EqEq)
                } else {
                    self.token_at(start_line, start_col, TokenKind::Eq)
                }
            }

            b'!' => {
                if self.peek() == Some(b'=') {
                    self.advance();
                    self.token_at(start_line, start_col, TokenKind::BangEq)
                } else {
                    let span = self.span_from(start_line, start_col);
                    self.emit_error_with_suggestion(
                        ErrorCode::UNEXPECTED_CHARACTER,
                        "Unexpected character '!'",
                        span,
                        "Use 'not' for boolean negation, or '!=' for inequality",
                    );
                    self.scan_normal()
                }
            }

            b'<' => {
                if self.peek() == Some(b'=') {
                    self.advance();
                    self.token_at(start_line, start_col, TokenKind::LessEq)
                } else {
                    self.token_at(start_line, start_col, TokenKind::Less)
                }
            }

            b'>' => {
                if self.peek() == Some(b'=') {
                    self.advance();
                    self.token_at(start_line, start_col, TokenKind::GreaterEq)
                } else {
                    self.token_at(start_line, start_col, TokenKind::Greater)
                }
            }

            b'{' => {
                if let Some(Mode::Interpolation { brace_depth, .. }) = self.mode_stack.last_mut() {
                    *brace_depth += 1;
                }
                self.token_at(start_line, start_col, TokenKind::LBrace)
            }

            b'}' => {
                if let Mode::Interpolation {
                    brace_depth,
                    triple,
                } = self.current_mode()
                {
                    if brace_depth == 0 {
                        self.pop_mode();
                        self.push_mode(Mode::String { triple });
                        return self.token_at(start_line, start_col, TokenKind::InterpolationEnd);
                    }
                    if let Some(Mode::Interpolation { brace_depth, .. }) =
                        self.mode_stack.last_mut()
                    {
                        *brace_depth -= 1;
                    }
                }
                self.token_at(start_line, start_col, TokenKind::RBrace)
            }

            _ => {
                // Skip the rest of a multi-byte character before reporting it.
                while self.peek().is_some_and(|b| b & 0xC0 == 0x80) {
                    self.advance();
                }
                let text = String::from_utf8_lossy(&self.source[self.offset_of(start_line, start_col)..self.pos])
                    .into_owned();
                let span = self.span_from(start_line, start_col);
                self.emit_error(
                    ErrorCode::UNEXPECTED_CHARACTER,
                    format!("Unexpected character '{text}'"),
                    span,
                );
                self.scan_normal()
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Number literals
    // ─────────────────────────────────────────────────────────────

    fn scan_number(&mut self, start_line: u32, start_col: u32) -> Token {
        let start = self.offset_of(start_line, start_col);

        if self.source[start] == b'0' && matches!(self.peek(), Some(b'x' | b'X')) {
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit() || c == b'_') {
                self.advance();
            }
            let digits: String = String::from_utf8_lossy(&self.source[start + 2..self.pos])
                .chars()
                .filter(|&c| c != '_')
                .collect();
            return self.int_token(i64::from_str_radix(&digits, 16).ok(), start_line, start_col);
        }

        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == b'_') {
            self.advance();
        }

        let mut is_float = false;
        if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit() || c == b'_') {
                self.advance();
            }
        }

        let text: String = String::from_utf8_lossy(&self.source[start..self.pos])
            .chars()
            .filter(|&c| c != '_')
            .collect();

        if is_float {
            let span = self.span_from(start_line, start_col);
            match text.parse::<f64>() {
                Ok(value) => Token::new(TokenKind::Float(value), span),
                Err(_) => {
                    self.emit_error(
                        ErrorCode::INVALID_NUMBER,
                        format!("Invalid number literal '{text}'"),
                        span,
                    );
                    Token::new(TokenKind::Float(0.0), span)
                }
            }
        } else {
            self.int_token(text.parse::<i64>().ok(), start_line, start_col)
        }
    }

    fn int_token(&mut self, value: Option<i64>, start_line: u32, start_col: u32) -> Token {
        let span = self.span_from(start_line, start_col);
        match value {
            Some(value) => Token::new(TokenKind::Int(value), span),
            None => {
                let text = String::from_utf8_lossy(
                    &self.source[self.offset_of(start_line, start_col)..self.pos],
                )
                .into_owned();
                self.emit_error(
                    ErrorCode::INVALID_NUMBER,
                    format!("Invalid integer literal '{text}'"),
                    span,
                );
                Token::new(TokenKind::Int(0), span)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Identifiers & keywords
    // ─────────────────────────────────────────────────────────────

    fn scan_identifier(&mut self, start_line: u32, start_col: u32) -> Token {
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_') {
            self.advance();
        }

        let span = self.span_from(start_line, start_col);
        let start = self.offset_of(start_line, start_col);
        let text = String::from_utf8_lossy(&self.source[start..self.pos]);

        let kind = TokenKind::from_keyword(&text)
            .unwrap_or_else(|| TokenKind::Identifier(text.into_owned()));

        Token::new(kind, span)
    }

    // ─────────────────────────────────────────────────────────────
    // String literals & interpolation
    // ─────────────────────────────────────────────────────────────

    /// Scan string text up to the closing quotes or the next `${`.
    ///
    /// `opening` is true right after the opening quotes, false when
    /// resuming after an interpolation. The token kind follows from the
    /// pair: a string that closes without interpolating is a
    /// `StringLiteral`, one that opens an interpolation is `StringStart`
    /// or `StringPart`, and text that closes after an interpolation is
    /// `StringEnd`.
    fn scan_string_text(&mut self, triple: bool, opening: bool) -> Token {
        let start_line = self.line;
        let start_col = self.col;
        let mut buf: Vec<u8> = Vec::new();

        loop {
            let closing = if triple {
                self.at_triple_quote()
            } else {
                self.peek() == Some(b'"')
            };

            if closing {
                let quotes = if triple { 3 } else { 1 };
                for _ in 0..quotes {
                    self.advance();
                }
                let text = String::from_utf8_lossy(&buf).into_owned();
                let kind = if opening {
                    TokenKind::StringLiteral(text)
                } else {
                    self.pop_mode();
                    TokenKind::StringEnd(text)
                };
                return Token::new(kind, self.span_from(start_line, start_col));
            }

            match self.peek() {
                None => return self.unterminated_string(buf, opening, start_line, start_col),
                Some(b'\n') if !triple => {
                    return self.unterminated_string(buf, opening, start_line, start_col)
                }
                Some(b'\\') => {
                    if let Some(escaped) = self.scan_escape_sequence() {
                        let mut utf8 = [0u8; 4];
                        buf.extend_from_slice(escaped.encode_utf8(&mut utf8).as_bytes());
                    }
                }
                Some(b'$') if self.peek_at(1) == Some(b'{') => {
                    self.advance();
                    self.advance();
                    let interp_span = self.span_from(self.line, self.col.saturating_sub(2));
                    if !opening {
                        self.pop_mode();
                    }
                    self.push_mode(Mode::Interpolation {
                        brace_depth: 0,
                        triple,
                    });
                    self.pending
                        .push(Token::new(TokenKind::InterpolationStart, interp_span));
                    let text = String::from_utf8_lossy(&buf).into_owned();
                    let kind = if opening {
                        TokenKind::StringStart(text)
                    } else {
                        TokenKind::StringPart(text)
                    };
                    return Token::new(kind, self.span_from(start_line, start_col));
                }
                Some(ch) => {
                    self.advance();
                    buf.push(ch);
                }
            }
        }
    }

    fn unterminated_string(
        &mut self,
        buf: Vec<u8>,
        opening: bool,
        start_line: u32,
        start_col: u32,
    ) -> Token {
        let span = self.span_from(start_line, start_col);
        self.emit_error(
            ErrorCode::UNTERMINATED_STRING,
            "Unterminated string literal",
            span,
        );
        let text = String::from_utf8_lossy(&buf).into_owned();
        if opening {
            Token::new(TokenKind::StringLiteral(text), span)
        } else {
            self.pop_mode();
            Token::new(TokenKind::StringEnd(text), span)
        }
    }

    /// Scan an escape sequence starting at the `\`.
    /// Returns the unescaped character, or `None` at end of input.
    fn scan_escape_sequence(&mut self) -> Option<char> {
        let start_line = self.line;
        let start_col = self.col;
        self.advance();

        match self.advance() {
            Some(b'"') => Some('"'),
            Some(b'\\') => Some('\\'),
            Some(b'n') => Some('\n'),
            Some(b't') => Some('\t'),
            Some(b'r') => Some('\r'),
            Some(b'0') => Some('\0'),
            Some(b'$') => Some('$'),
            Some(ch) => {
                let span = self.span_from(start_line, start_col);
                self.emit_error_with_suggestion(
                    ErrorCode::INVALID_ESCAPE,
                    format!("Invalid escape sequence '\\{}'", ch as char),
                    span,
                    "Write '\\\\' for a literal backslash",
                );
                Some(ch as char)
            }
            None => {
                let span = self.span_from(start_line, start_col);
                self.emit_error(
                    ErrorCode::UNTERMINATED_STRING,
                    "Unexpected end of input in escape sequence",
                    span,
                );
                None
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Byte-offset helper
    // ─────────────────────────────────────────────────────────────

    /// Byte offset of a 1-based line/col position on the current line
    /// or an earlier one.
    fn offset_of(&self, line: u32, col: u32) -> usize {
        let mut offset = 0usize;
        let mut current_line = 1u32;
        while current_line < line {
            match self.source.get(offset) {
                Some(b'\n') => {
                    current_line += 1;
                    offset += 1;
                }
                Some(_) => offset += 1,
                None => return offset,
            }
        }
        // Columns count characters; walk them so multi-byte text is skipped whole.
        let mut remaining = col.saturating_sub(1);
        while remaining > 0 {
            match self.source.get(offset) {
                Some(_) => {
                    offset += 1;
                    while self.source.get(offset).is_some_and(|b| b & 0xC0 == 0x80) {
                        offset += 1;
                    }
                    remaining -= 1;
                }
                None => break,
            }
        }
        offset
    }
}

impl Token {
    /// Widen a string token's span to start at its opening quotes.
    fn with_start(mut self, line: u32, col: u32) -> Token {
        self.span.start_line = line;
        self.span.start_col = col;
        self
    }
}
