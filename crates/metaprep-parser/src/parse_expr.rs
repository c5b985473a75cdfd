//! Expression parsing with full operator precedence.
//!
//! Precedence (lowest → highest):
//! 6. `or`
//! 5. `and`
//! 4. `==`, `!=`, `<`, `>`, `<=`, `>=` (no chaining)
//! 3. `+`, `-`
//! 2. `*`, `/`, `%`
//! 1. unary `-`, `not`
//! 0. postfix `.field`, `(args)`, `[index]`

use metaprep_lexer::token::TokenKind;
use metaprep_types::ast::*;
use metaprep_types::{ErrorCode, Span};

use crate::parser::Parser;

impl<'src> Parser<'src> {
    // ══════════════════════════════════════════════════════════════════════════
    // Entry Point
    // ══════════════════════════════════════════════════════════════════════════

    pub(crate) fn parse_expression(&mut self) -> Option<Expr> {
        if !self.enter_expression() {
            return None;
        }
        let result = self.parse_or();
        self.expr_depth -= 1;
        result
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Precedence Chain
    // ══════════════════════════════════════════════════════════════════════════

    fn binary(left: Expr, op: BinOp, right: Expr) -> Expr {
        let span = left.span.merge(right.span);
        Expr::new(
            ExprKind::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            },
            span,
        )
    }

    /// `OrExpr = AndExpr { "or" AndExpr }`
    fn parse_or(&mut self) -> Option<Expr> {
        let mut left = self.parse_and()?;
        while self.eat(&TokenKind::Or) {
            self.skip_newlines();
            let right = self.parse_and()?;
            left = Self::binary(left, BinOp::Or, right);
        }
        Some(left)
    }

    /// `AndExpr = CompExpr { "and" CompExpr }`
    fn parse_and(&mut self) -> Option<Expr> {
        let mut left = self.parse_comparison()?;
        while self.eat(&TokenKind::And) {
            self.skip_newlines();
            let right = self.parse_comparison()?;
            left = Self::binary(left, BinOp::And, right);
        }
        Some(left)
    }

    /// `CompExpr = AddExpr [ CompOp AddExpr ]`
    ///
    /// Comparison operators do not chain: `a < b < c` is a parse error.
    fn parse_comparison(&mut self) -> Option<Expr> {
        let mut left = self.parse_add()?;
        if let Some(op) = self.match_comparison_op() {
            self.advance();
            let right = self.parse_add()?;
            left = Self::binary(left, op, right);
            if self.match_comparison_op().is_some() {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    "comparison operators cannot be chained; use 'and' to combine: a < b and b < c",
                );
            }
        }
        Some(left)
    }

    fn match_comparison_op(&self) -> Option<BinOp> {
        match self.peek_kind() {
            TokenKind::EqEq => Some(BinOp::Eq),
            TokenKind::BangEq => Some(BinOp::NotEq),
            TokenKind::Less => Some(BinOp::Less),
            TokenKind::Greater => Some(BinOp::Greater),
            TokenKind::LessEq => Some(BinOp::LessEq),
            TokenKind::GreaterEq => Some(BinOp::GreaterEq),
            _ => None,
        }
    }

    /// `AddExpr = MulExpr { ("+" | "-") MulExpr }`
    fn parse_add(&mut self) -> Option<Expr> {
        let mut left = self.parse_mul()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_mul()?;
            left = Self::binary(left, op, right);
        }
        Some(left)
    }

    /// `MulExpr = UnaryExpr { ("*" | "/" | "%") UnaryExpr }`
    fn parse_mul(&mut self) -> Option<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Self::binary(left, op, right);
        }
        Some(left)
    }

    /// `UnaryExpr = { "not" | "-" } PostfixExpr`
    fn parse_unary(&mut self) -> Option<Expr> {
        let start = self.current_span();
        let op = match self.peek_kind() {
            TokenKind::Not => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.parse_postfix_expression(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        let span = start.merge(operand.span);
        Some(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    /// `PostfixExpr = PrimaryExpr { "." Name | "(" ArgList ")" | "[" Expr "]" }`
    pub(crate) fn parse_postfix_expression(&mut self) -> Option<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let field = self.expect_field_name()?;
                    let span = expr.span.merge(field.span);
                    expr = Expr::new(
                        ExprKind::Field {
                            object: Box::new(expr),
                            field,
                        },
                        span,
                    );
                }
                TokenKind::LParen => {
                    self.advance();
                    let args = self.parse_arg_list()?;
                    self.expect(&TokenKind::RParen)?;
                    let span = expr.span.merge(self.previous_span());
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        span,
                    );
                }
                TokenKind::LBracket => {
                    self.advance();
                    self.skip_newlines();
                    let index = self.parse_expression()?;
                    self.skip_newlines();
                    self.expect(&TokenKind::RBracket)?;
                    let span = expr.span.merge(self.previous_span());
                    expr = Expr::new(
                        ExprKind::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                _ => break,
            }
        }
        Some(expr)
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Primary Expressions
    // ══════════════════════════════════════════════════════════════════════════

    fn parse_primary(&mut self) -> Option<Expr> {
        let start = self.current_span();
        let literal = match self.peek_kind().clone() {
            TokenKind::Int(n) => ExprKind::Int(n),
            TokenKind::Float(n) => ExprKind::Float(n),
            TokenKind::StringLiteral(s) => ExprKind::Str(s),
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),
            TokenKind::Nil => ExprKind::Nil,
            TokenKind::StringStart(s) => {
                self.advance();
                return self.parse_string_interpolation(s, start);
            }
            TokenKind::LBracket => return self.parse_list_literal(),
            TokenKind::LBrace => return self.parse_record_literal(),
            TokenKind::LParen => {
                self.advance();
                self.skip_newlines();
                let inner = self.parse_expression()?;
                self.skip_newlines();
                self.expect(&TokenKind::RParen)?;
                let span = start.merge(self.previous_span());
                return Some(Expr::new(ExprKind::Paren(Box::new(inner)), span));
            }
            TokenKind::Fn => {
                let decl = self.parse_fn(false)?;
                let span = decl.span;
                return Some(Expr::new(ExprKind::Lambda(decl), span));
            }
            TokenKind::Identifier(name) => ExprKind::Identifier(name),
            other => {
                self.error_at_current(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("expected expression, got '{other}'"),
                );
                return None;
            }
        };
        self.advance();
        Some(Expr::new(literal, start))
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Calls
    // ══════════════════════════════════════════════════════════════════════════

    /// Comma-separated arguments; `name: value` makes a named argument.
    fn parse_arg_list(&mut self) -> Option<Vec<Arg>> {
        let mut args: Vec<Arg> = Vec::new();
        self.skip_newlines();
        while !self.check_exact(&TokenKind::RParen) {
            let name = match (self.peek_kind(), self.look_ahead(1)) {
                (TokenKind::Identifier(_), TokenKind::Colon) => {
                    let name = self.expect_identifier()?;
                    self.advance(); // eat `:`
                    self.skip_newlines();
                    Some(name)
                }
                _ => None,
            };
            let value = self.parse_expression()?;
            match &name {
                None if args.iter().any(|a| a.name.is_some()) => {
                    self.error_at(
                        ErrorCode::UNEXPECTED_TOKEN,
                        "positional argument follows a named argument",
                        value.span,
                    );
                }
                Some(n) if args.iter().any(|a| a.name.as_ref().is_some_and(|m| m.name == n.name)) => {
                    self.error_at(
                        ErrorCode::UNEXPECTED_TOKEN,
                        format!("argument '{}' is given twice", n.name),
                        n.span,
                    );
                }
                _ => {}
            }
            args.push(Arg { name, value });
            self.skip_newlines();
            if !self.eat(&TokenKind::Comma) {
                break;
            }
            self.skip_newlines();
        }
        Some(args)
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Literals
    // ══════════════════════════════════════════════════════════════════════════

    /// `[expr, ...]`
    fn parse_list_literal(&mut self) -> Option<Expr> {
        let start = self.current_span();
        self.advance(); // eat `[`
        self.skip_newlines();
        let mut elements = Vec::new();
        while !self.check_exact(&TokenKind::RBracket) {
            elements.push(self.parse_expression()?);
            self.skip_newlines();
            if !self.eat(&TokenKind::Comma) {
                break;
            }
            self.skip_newlines();
        }
        self.expect(&TokenKind::RBracket)?;
        let span = start.merge(self.previous_span());
        Some(Expr::new(ExprKind::List(elements), span))
    }

    /// `{ key: expr, ... }` or `{}`
    fn parse_record_literal(&mut self) -> Option<Expr> {
        let start = self.current_span();
        self.advance(); // eat `{`
        self.skip_newlines();
        let mut fields: Vec<RecordField> = Vec::new();
        while !self.check_exact(&TokenKind::RBrace) {
            let key = self.expect_field_name()?;
            if fields.iter().any(|f| f.key.name == key.name) {
                self.error_at(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("record key '{}' is given twice", key.name),
                    key.span,
                );
            }
            self.expect(&TokenKind::Colon)?;
            self.skip_newlines();
            let value = self.parse_expression()?;
            fields.push(RecordField { key, value });
            self.skip_newlines();
            if !self.eat(&TokenKind::Comma) {
                break;
            }
            self.skip_newlines();
        }
        self.expect(&TokenKind::RBrace)?;
        let span = start.merge(self.previous_span());
        Some(Expr::new(ExprKind::Record(fields), span))
    }

    /// `"text ${expr} more ${expr} end"`, called after `StringStart`.
    fn parse_string_interpolation(&mut self, start_text: String, start_span: Span) -> Option<Expr> {
        let mut parts = Vec::new();
        if !start_text.is_empty() {
            parts.push(StringPart::Literal(start_text));
        }
        loop {
            self.expect(&TokenKind::InterpolationStart)?;
            self.skip_newlines();
            let expr = self.parse_expression()?;
            self.skip_newlines();
            parts.push(StringPart::Expr(expr));
            self.expect(&TokenKind::InterpolationEnd)?;
            match self.peek_kind().clone() {
                TokenKind::StringPart(s) => {
                    self.advance();
                    if !s.is_empty() {
                        parts.push(StringPart::Literal(s));
                    }
                }
                TokenKind::StringEnd(s) => {
                    self.advance();
                    if !s.is_empty() {
                        parts.push(StringPart::Literal(s));
                    }
                    break;
                }
                _ => {
                    self.error_at_current(
                        ErrorCode::UNTERMINATED_STRING,
                        "unterminated string interpolation",
                    );
                    return None;
                }
            }
        }
        let span = start_span.merge(self.previous_span());
        Some(Expr::new(ExprKind::Interpolation(parts), span))
    }
}
