//! Expression parsing (Pratt parsing)

use crate::ast::*;
use crate::diagnostic::{error_codes, Diagnostic};
use crate::parser::{Parser, Precedence};
use crate::token::TokenKind;

/// Magnitude of `i32::MIN`; only valid as the operand of a unary minus
const MIN_INT_MAGNITUDE: i64 = 1 << 31;

/// Binary operator and binding power for an infix token
fn binary_operator(kind: TokenKind) -> Option<(BinaryOp, Precedence)> {
    let entry = match kind {
        TokenKind::PipePipe => (BinaryOp::Or, Precedence::Or),
        TokenKind::AmpAmp => (BinaryOp::And, Precedence::And),
        TokenKind::EqualEqual => (BinaryOp::Eq, Precedence::Equality),
        TokenKind::BangEqual => (BinaryOp::Ne, Precedence::Equality),
        TokenKind::Less => (BinaryOp::Lt, Precedence::Comparison),
        TokenKind::LessEqual => (BinaryOp::Le, Precedence::Comparison),
        TokenKind::Greater => (BinaryOp::Gt, Precedence::Comparison),
        TokenKind::GreaterEqual => (BinaryOp::Ge, Precedence::Comparison),
        TokenKind::Plus => (BinaryOp::Add, Precedence::Term),
        TokenKind::Minus => (BinaryOp::Sub, Precedence::Term),
        TokenKind::Star => (BinaryOp::Mul, Precedence::Factor),
        TokenKind::Slash => (BinaryOp::Div, Precedence::Factor),
        TokenKind::Percent => (BinaryOp::Mod, Precedence::Factor),
        _ => return None,
    };
    Some(entry)
}

impl Parser {
    /// Parse an expression
    pub(super) fn parse_expression(&mut self) -> Result<Expr, ()> {
        self.parse_precedence(Precedence::Lowest)
    }

    /// Parse expression with given precedence
    pub(super) fn parse_precedence(&mut self, precedence: Precedence) -> Result<Expr, ()> {
        let mut left = self.parse_prefix()?;

        while precedence < self.current_precedence() {
            left = self.parse_infix(left)?;
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expr, ()> {
        match self.peek().kind {
            TokenKind::Int => self.parse_int(),
            TokenKind::Float => self.parse_float(),
            TokenKind::String => {
                let token = self.advance();
                Ok(Expr::Literal(Literal::String(token.lexeme.clone()), token.span))
            }
            TokenKind::True | TokenKind::False => {
                let token = self.advance();
                Ok(Expr::Literal(
                    Literal::Bool(token.kind == TokenKind::True),
                    token.span,
                ))
            }
            TokenKind::Identifier => self.parse_identifier(),
            TokenKind::LeftParen => self.parse_group(),
            TokenKind::Minus | TokenKind::Bang => self.parse_unary(),
            _ => {
                self.error("Expected expression");
                Err(())
            }
        }
    }

    fn parse_infix(&mut self, left: Expr) -> Result<Expr, ()> {
        if self.check(TokenKind::Dot) {
            return self.parse_member(left);
        }
        match binary_operator(self.peek().kind) {
            Some((op, precedence)) => self.parse_binary(left, op, precedence),
            None => Ok(left),
        }
    }

    pub(super) fn current_precedence(&self) -> Precedence {
        let kind = self.peek().kind;
        if kind == TokenKind::Dot {
            return Precedence::Call;
        }
        binary_operator(kind).map_or(Precedence::Lowest, |(_, p)| p)
    }

    fn parse_int(&mut self) -> Result<Expr, ()> {
        let token = self.advance();
        let span = token.span;
        match token.lexeme.parse::<i32>() {
            Ok(value) => Ok(Expr::Literal(Literal::Int(value), span)),
            Err(_) => {
                let message = format!("Integer literal '{}' does not fit in 32 bits", token.lexeme);
                self.diagnostics.push(
                    Diagnostic::error_with_code(error_codes::INVALID_NUMBER, message, span)
                        .with_help("2147483648 is only accepted directly after a unary minus"),
                );
                Err(())
            }
        }
    }

    fn parse_float(&mut self) -> Result<Expr, ()> {
        let token = self.advance();
        let span = token.span;
        match token.lexeme.parse::<f32>() {
            Ok(value) => Ok(Expr::Literal(Literal::Float(value), span)),
            Err(_) => {
                self.error("Invalid float literal");
                Err(())
            }
        }
    }

    /// Identifier, or a call when followed by `(`
    fn parse_identifier(&mut self) -> Result<Expr, ()> {
        let token = self.advance();
        let callee = Identifier {
            name: token.lexeme.clone(),
            span: token.span,
        };

        if !self.check(TokenKind::LeftParen) {
            return Ok(Expr::Identifier(callee));
        }

        let (args, end_span) = self.parse_arguments()?;
        Ok(Expr::Call(CallExpr {
            span: callee.span.merge(end_span),
            callee,
            args,
        }))
    }

    /// Parse `( expr, ... )`, returning the arguments and the closing paren span
    fn parse_arguments(&mut self) -> Result<(Vec<Expr>, crate::span::Span), ()> {
        self.consume(TokenKind::LeftParen, "Expected '('")?;
        let mut args = Vec::new();

        if !self.check(TokenKind::RightParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }

        let end_span = self
            .consume(TokenKind::RightParen, "Expected ')' after arguments")?
            .span;
        Ok((args, end_span))
    }

    fn parse_group(&mut self) -> Result<Expr, ()> {
        let start_span = self.consume(TokenKind::LeftParen, "Expected '('")?.span;
        let expr = self.parse_expression()?;
        let end_span = self.consume(TokenKind::RightParen, "Expected ')'")?.span;

        Ok(Expr::Group(GroupExpr {
            expr: Box::new(expr),
            span: start_span.merge(end_span),
        }))
    }

    fn parse_unary(&mut self) -> Result<Expr, ()> {
        let op_token = self.advance();
        let op_span = op_token.span;
        let op = if op_token.kind == TokenKind::Minus {
            UnaryOp::Negate
        } else {
            UnaryOp::Not
        };

        // `-2147483648` folds to i32::MIN unless a member access follows
        if op == UnaryOp::Negate
            && self.peek().kind == TokenKind::Int
            && self.peek_at(1).kind != TokenKind::Dot
            && self.peek().lexeme.parse::<i64>() == Ok(MIN_INT_MAGNITUDE)
        {
            let literal_span = self.advance().span;
            return Ok(Expr::Literal(Literal::Int(i32::MIN), op_span.merge(literal_span)));
        }

        let operand = self.parse_precedence(Precedence::Unary)?;
        let operand_span = operand.span();

        Ok(Expr::Unary(UnaryExpr {
            op,
            expr: Box::new(operand),
            span: op_span.merge(operand_span),
        }))
    }

    fn parse_binary(&mut self, left: Expr, op: BinaryOp, precedence: Precedence) -> Result<Expr, ()> {
        self.advance();
        let right = self.parse_precedence(precedence)?;
        let span = left.span().merge(right.span());

        Ok(Expr::Binary(BinaryExpr {
            op,
            left: Box::new(left),
            right: Box::new(right),
            span,
        }))
    }

    /// `target.field` or `target.method(args)`
    fn parse_member(&mut self, target: Expr) -> Result<Expr, ()> {
        self.consume(TokenKind::Dot, "Expected '.'")?;
        let member = self.identifier("a field or method name")?;

        let (args, end_span) = if self.check(TokenKind::LeftParen) {
            let (args, end) = self.parse_arguments()?;
            (Some(args), end)
        } else {
            (None, member.span)
        };

        Ok(Expr::Member(MemberExpr {
            span: target.span().merge(end_span),
            target: Box::new(target),
            member,
            args,
        }))
    }
}
