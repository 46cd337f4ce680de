//! Statement parsing

use crate::ast::*;
use crate::parser::Parser;
use crate::token::TokenKind;

impl Parser {
    /// Parse a statement
    pub(super) fn parse_statement(&mut self) -> Result<Stmt, ()> {
        match self.peek().kind {
            TokenKind::If => self.parse_if_stmt(),
            TokenKind::While => self.parse_while_stmt(),
            TokenKind::Return => self.parse_return_stmt(),
            TokenKind::LeftBrace => Ok(Stmt::Block(self.parse_block()?)),
            TokenKind::Identifier if self.peek_at(1).kind == TokenKind::Colon => {
                self.parse_var_decl()
            }
            _ => self.parse_assign_or_expr_stmt(),
        }
    }

    /// Parse a variable declaration
    ///
    /// Syntax: `name : type = expr;` or `name : type;`
    fn parse_var_decl(&mut self) -> Result<Stmt, ()> {
        let name = self.identifier("a variable name")?;
        self.consume(TokenKind::Colon, "Expected ':' after variable name")?;
        let type_ref = self.parse_type_ref()?;

        let init = if self.match_token(TokenKind::Equal) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        let end_span = self
            .consume(TokenKind::Semicolon, "Expected ';' after variable declaration")?
            .span;

        Ok(Stmt::VarDecl(VarDecl {
            span: name.span.merge(end_span),
            name,
            type_ref,
            init,
        }))
    }

    /// Parse an assignment or an expression statement
    fn parse_assign_or_expr_stmt(&mut self) -> Result<Stmt, ()> {
        let expr = self.parse_expression()?;
        let expr_span = expr.span();

        if self.check(TokenKind::Equal) {
            if !Self::is_place(&expr) {
                self.error("Invalid assignment target: expected a variable or field");
                return Err(());
            }
            self.advance();
            let value = self.parse_expression()?;
            let end_span = self
                .consume(TokenKind::Semicolon, "Expected ';' after assignment")?
                .span;

            return Ok(Stmt::Assign(Assign {
                target: expr,
                value,
                span: expr_span.merge(end_span),
            }));
        }

        let end_span = self
            .consume(TokenKind::Semicolon, "Expected ';' after expression")?
            .span;

        Ok(Stmt::Expr(ExprStmt {
            expr,
            span: expr_span.merge(end_span),
        }))
    }

    /// A variable or a field chain rooted at one
    fn is_place(expr: &Expr) -> bool {
        match expr {
            Expr::Identifier(_) => true,
            Expr::Member(m) => m.args.is_none() && Self::is_place(&m.target),
            _ => false,
        }
    }

    fn parse_if_stmt(&mut self) -> Result<Stmt, ()> {
        let if_span = self.consume(TokenKind::If, "Expected 'if'")?.span;

        self.consume(TokenKind::LeftParen, "Expected '(' after 'if'")?;
        let cond = self.parse_expression()?;
        self.consume(TokenKind::RightParen, "Expected ')' after if condition")?;

        let then_block = self.parse_block()?;
        let then_span = then_block.span;

        let else_block = if self.match_token(TokenKind::Else) {
            if self.check(TokenKind::If) {
                // else if: wrap the nested if in a synthetic block
                let nested = self.parse_if_stmt()?;
                let span = nested.span();
                Some(Block {
                    statements: vec![nested],
                    span,
                })
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };

        let end_span = else_block.as_ref().map_or(then_span, |b| b.span);

        Ok(Stmt::If(IfStmt {
            cond,
            then_block,
            else_block,
            span: if_span.merge(end_span),
        }))
    }

    fn parse_while_stmt(&mut self) -> Result<Stmt, ()> {
        let while_span = self.consume(TokenKind::While, "Expected 'while'")?.span;

        self.consume(TokenKind::LeftParen, "Expected '(' after 'while'")?;
        let cond = self.parse_expression()?;
        self.consume(TokenKind::RightParen, "Expected ')' after while condition")?;

        let body = self.parse_block()?;
        let body_span = body.span;

        Ok(Stmt::While(WhileStmt {
            cond,
            body,
            span: while_span.merge(body_span),
        }))
    }

    fn parse_return_stmt(&mut self) -> Result<Stmt, ()> {
        let return_span = self.consume(TokenKind::Return, "Expected 'return'")?.span;

        let value = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };

        let end_span = self
            .consume(TokenKind::Semicolon, "Expected ';' after return")?
            .span;

        Ok(Stmt::Return(ReturnStmt {
            value,
            span: return_span.merge(end_span),
        }))
    }

    /// Parse a block
    pub(super) fn parse_block(&mut self) -> Result<Block, ()> {
        let start_span = self.consume(TokenKind::LeftBrace, "Expected '{'")?.span;
        let mut statements = Vec::new();

        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(_) => self.synchronize(),
            }
        }

        let end_span = self.consume(TokenKind::RightBrace, "Expected '}'")?.span;

        Ok(Block {
            statements,
            span: start_span.merge(end_span),
        })
    }
}
