//! Statement parsing.

use std::rc::Rc;

use crate::parser::Parser;
use metaprep_lexer::token::TokenKind;
use metaprep_types::ast::*;
use metaprep_types::ErrorCode;

impl<'src> Parser<'src> {
    /// Parse a block of statements: `{ stmts... }`
    pub(crate) fn parse_block(&mut self) -> Option<Block> {
        let start = self.current_span();
        self.expect(&TokenKind::LBrace)?;
        self.skip_newlines();
        let mut stmts = Vec::new();
        while !self.check_exact(&TokenKind::RBrace) && !self.at_end() {
            if self.too_many_errors() {
                break;
            }
            if let Some(stmt) = self.parse_statement() {
                stmts.push(stmt);
            } else {
                self.synchronize();
            }
            self.skip_newlines();
        }
        self.expect(&TokenKind::RBrace)?;
        let span = start.merge(self.previous_span());
        Some(Block { stmts, span })
    }

    /// Parse a single statement.
    pub(crate) fn parse_statement(&mut self) -> Option<Stmt> {
        self.skip_newlines();
        if self.at_end() || self.check_exact(&TokenKind::RBrace) {
            return None;
        }
        match self.peek_kind() {
            TokenKind::Let => self.parse_let_stmt(),
            TokenKind::Set => self.parse_set_stmt(),
            TokenKind::Fn if matches!(self.look_ahead(1), TokenKind::Identifier(_)) => {
                let decl = self.parse_fn(true)?;
                self.expect_newline_or_eof();
                Some(Stmt::Function(decl))
            }
            TokenKind::If => {
                let stmt = self.parse_if_stmt()?;
                self.expect_newline_or_eof();
                Some(Stmt::If(stmt))
            }
            TokenKind::For => self.parse_for_stmt(),
            TokenKind::While => self.parse_while_stmt(),
            TokenKind::Break => {
                let span = self.advance().span;
                self.expect_newline_or_eof();
                Some(Stmt::Break(span))
            }
            TokenKind::Continue => {
                let span = self.advance().span;
                self.expect_newline_or_eof();
                Some(Stmt::Continue(span))
            }
            TokenKind::Return => self.parse_return_stmt(),
            TokenKind::Assert => self.parse_assert_stmt(),
            TokenKind::Global => self.parse_global_stmt(),
            _ => {
                let expr = self.parse_expression()?;
                let span = expr.span;
                if self.check_exact(&TokenKind::Eq) {
                    self.error_at_current(
                        ErrorCode::UNEXPECTED_TOKEN,
                        "assignment needs 'let' for a new name or 'set' for an existing one",
                    );
                    return None;
                }
                self.expect_newline_or_eof();
                Some(Stmt::Expr(ExprStmt { expr, span }))
            }
        }
    }

    /// `let name = expr`
    fn parse_let_stmt(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        self.advance();
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::Eq)?;
        let value = self.parse_expression()?;
        let span = start.merge(self.previous_span());
        self.expect_newline_or_eof();
        Some(Stmt::Let(LetStmt { name, value, span }))
    }

    /// `set place = expr`, where place is a name, field or index.
    fn parse_set_stmt(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        self.advance();
        let target = self.parse_postfix_expression()?;
        if !matches!(
            target.kind,
            ExprKind::Identifier(_) | ExprKind::Field { .. } | ExprKind::Index { .. }
        ) {
            self.error_at(
                ErrorCode::INVALID_ASSIGN_TARGET,
                "can only assign to a name, a field or an index",
                target.span,
            );
            return None;
        }
        self.expect(&TokenKind::Eq)?;
        let value = self.parse_expression()?;
        let span = start.merge(self.previous_span());
        self.expect_newline_or_eof();
        Some(Stmt::Set(SetStmt {
            target,
            value,
            span,
        }))
    }

    /// `fn [name](params) { body }`, with the name required for declarations.
    pub(crate) fn parse_fn(&mut self, named: bool) -> Option<Rc<FnDecl>> {
        let start = self.current_span();
        self.advance(); // eat `fn`
        let name = if named {
            Some(self.expect_identifier()?)
        } else {
            None
        };
        self.expect(&TokenKind::LParen)?;
        let mut params: Vec<Ident> = Vec::new();
        self.skip_newlines();
        while !self.check_exact(&TokenKind::RParen) {
            let param = self.expect_identifier()?;
            if params.iter().any(|p| p.name == param.name) {
                self.error_at(
                    ErrorCode::UNEXPECTED_TOKEN,
                    format!("parameter '{}' is listed twice", param.name),
                    param.span,
                );
            }
            params.push(param);
            self.skip_newlines();
            if !self.eat(&TokenKind::Comma) {
                break;
            }
            self.skip_newlines();
        }
        self.expect(&TokenKind::RParen)?;
        let body = self.parse_block()?;
        let span = start.merge(self.previous_span());
        Some(Rc::new(FnDecl {
            name,
            params,
            body,
            span,
        }))
    }

    /// `if cond { ... } [else { ... } | else if ...]`
    ///
    /// `else` may start the line after the closing brace.
    pub(crate) fn parse_if_stmt(&mut self) -> Option<IfStmt> {
        let start = self.current_span();
        self.advance(); // eat `if`
        let condition = self.parse_expression()?;
        let then_block = self.parse_block()?;
        let else_branch = if *self.peek_past_newlines() == TokenKind::Else {
            self.skip_newlines();
            self.advance(); // eat `else`
            if self.check_exact(&TokenKind::If) {
                Some(ElseBranch::ElseIf(Box::new(self.parse_if_stmt()?)))
            } else {
                Some(ElseBranch::Block(self.parse_block()?))
            }
        } else {
            None
        };
        let span = start.merge(self.previous_span());
        Some(IfStmt {
            condition,
            then_block,
            else_branch,
            span,
        })
    }

    /// `for item [, index] in expr { ... }`
    fn parse_for_stmt(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        self.advance(); // eat `for`
        let item = self.expect_identifier()?;
        let index = if self.eat(&TokenKind::Comma) {
            Some(self.expect_identifier()?)
        } else {
            None
        };
        self.expect(&TokenKind::In)?;
        let iterable = self.parse_expression()?;
        let body = self.parse_block()?;
        let span = start.merge(self.previous_span());
        self.expect_newline_or_eof();
        Some(Stmt::For(ForStmt {
            item,
            index,
            iterable,
            body,
            span,
        }))
    }

    /// `while cond { ... }`
    fn parse_while_stmt(&mut self) -> Option<Stmt> {
        let start = self.current_span();
        self.advance(); // eat `while`
        let condition = self.parse_expression()?;
        let body = self.parse_block()?;
        let span = start.merge(self.previous_span());
        self.expect_newline_or_eof();
        Some(Stmt::While(WhileStmt {
            condition,
            body,
            span,
        }))
    }

    /// `return [expr]`
    fn parse_return_stmt(&mut self) -> Option<Stmt> {
        let start = self.advance().span;
        let value = match self.peek_kind() {
            TokenKind::Newline | TokenKind::RBrace | TokenKind::Eof => None,
            _ => Some(self.parse_expression()?),
        };
        let span = start.merge(self.previous_span());
        self.expect_newline_or_eof();
        Some(Stmt::Return(ReturnStmt { value, span }))
    }

    /// `assert expr [, message]`
    fn parse_assert_stmt(&mut self) -> Option<Stmt> {
        let start = self.advance().span;
        let condition = self.parse_expression()?;
        let message = if self.eat(&TokenKind::Comma) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        let span = start.merge(self.previous_span());
        self.expect_newline_or_eof();
        Some(Stmt::Assert(AssertStmt {
            condition,
            message,
            span,
        }))
    }

    /// `global a, b, c`
    fn parse_global_stmt(&mut self) -> Option<Stmt> {
        let start = self.advance().span;
        let mut names = vec![self.expect_identifier()?];
        while self.eat(&TokenKind::Comma) {
            names.push(self.expect_identifier()?);
        }
        let span = start.merge(self.previous_span());
        self.expect_newline_or_eof();
        Some(Stmt::Global(GlobalStmt { names, span }))
    }
}
