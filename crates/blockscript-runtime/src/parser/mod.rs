//! Parsing (tokens to AST)
//!
//! Pratt parsing for expressions, recursive descent for items and statements.
//! Errors are collected as diagnostics and the parser resynchronizes at the
//! next statement boundary so one typo doesn't hide the rest.

mod expr;
mod stmt;

use crate::ast::*;
use crate::diagnostic::{error_codes, Diagnostic};
use crate::token::{Token, TokenKind};

/// Parser state for building AST from tokens
pub struct Parser {
    pub(super) tokens: Vec<Token>,
    pub(super) current: usize,
    pub(super) diagnostics: Vec<Diagnostic>,
}

/// Operator precedence levels for Pratt parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(super) enum Precedence {
    Lowest,
    Or,         // ||
    And,        // &&
    Equality,   // == !=
    Comparison, // < <= > >=
    Term,       // + -
    Factor,     // * / %
    Unary,      // ! -
    Call,       // . ()
}

impl Parser {
    /// Create a new parser for the given tokens
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            current: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Parse tokens into an AST
    pub fn parse(&mut self) -> (Program, Vec<Diagnostic>) {
        let mut items = Vec::new();

        while !self.is_at_end() {
            match self.parse_item() {
                Ok(item) => items.push(item),
                Err(_) => self.synchronize(),
            }
        }

        (Program { items }, std::mem::take(&mut self.diagnostics))
    }

    // === Top-level parsing ===

    fn parse_item(&mut self) -> Result<Item, ()> {
        if self.check(TokenKind::Struct) {
            Ok(Item::Struct(self.parse_struct()?))
        } else if self.check(TokenKind::Identifier) {
            Ok(Item::Function(self.parse_function()?))
        } else {
            self.error("Expected 'struct' or a function declaration");
            Err(())
        }
    }

    /// Parse a struct declaration
    ///
    /// Syntax: `struct Name { field : type; ... };` (trailing `;` optional)
    fn parse_struct(&mut self) -> Result<StructDecl, ()> {
        let struct_span = self.consume(TokenKind::Struct, "Expected 'struct'")?.span;
        let name = self.identifier("a struct name")?;

        self.consume(TokenKind::LeftBrace, "Expected '{' after struct name")?;

        let mut fields = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            let field_name = self.identifier("a field name")?;
            self.consume(TokenKind::Colon, "Expected ':' after field name")?;
            let type_ref = self.parse_type_ref()?;
            let end = self
                .consume(TokenKind::Semicolon, "Expected ';' after field declaration")?
                .span;
            fields.push(FieldDecl {
                span: field_name.span.merge(end),
                name: field_name,
                type_ref,
            });
        }

        let mut end_span = self.consume(TokenKind::RightBrace, "Expected '}'")?.span;
        if self.check(TokenKind::Semicolon) {
            end_span = self.advance().span;
        }

        Ok(StructDecl {
            name,
            fields,
            span: struct_span.merge(end_span),
        })
    }

    /// Parse a function declaration
    ///
    /// Syntax: `name(a : type, ...) : return_type { body }`
    fn parse_function(&mut self) -> Result<FunctionDecl, ()> {
        let name = self.identifier("a function name")?;

        self.consume(TokenKind::LeftParen, "Expected '(' after function name")?;

        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                let param_name = self.identifier("a parameter name")?;
                self.consume(TokenKind::Colon, "Expected ':' after parameter name")?;
                let type_ref = self.parse_type_ref()?;

                params.push(Param {
                    span: param_name.span.merge(type_ref.span),
                    name: param_name,
                    type_ref,
                });

                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.consume(TokenKind::RightParen, "Expected ')' after parameters")?;
        self.consume(TokenKind::Colon, "Expected ':' and a return type after parameters")?;
        let return_type = self.parse_type_ref()?;

        let body = self.parse_block()?;

        Ok(FunctionDecl {
            span: name.span.merge(body.span),
            name,
            params,
            return_type,
            body,
        })
    }

    pub(super) fn parse_type_ref(&mut self) -> Result<TypeRef, ()> {
        let id = self.identifier("a type name")?;
        Ok(TypeRef {
            name: id.name,
            span: id.span,
        })
    }

    // === Helper methods ===

    /// Advance to next token and return reference to previous
    pub(super) fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        &self.tokens[self.current - 1]
    }

    /// Peek at current token
    pub(super) fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    /// Peek `n` tokens ahead, clamped to EOF
    pub(super) fn peek_at(&self, n: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.current + n).min(last)]
    }

    pub(super) fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.peek().kind == kind
    }

    pub(super) fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume token of given kind or error
    pub(super) fn consume(&mut self, kind: TokenKind, message: &str) -> Result<&Token, ()> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            self.error(message);
            Err(())
        }
    }

    pub(super) fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len() || self.tokens[self.current].kind == TokenKind::Eof
    }

    /// Record a syntax error at the current token
    pub(super) fn error(&mut self, message: &str) {
        let token = self.peek();
        let message = if token.kind == TokenKind::Eof {
            format!("{} (found end of file)", message)
        } else {
            format!("{} (found '{}')", message, token.lexeme)
        };
        let span = token.span;
        self.diagnostics.push(
            Diagnostic::error_with_code(error_codes::SYNTAX_ERROR, message, span)
                .with_label("syntax error")
                .with_help("check your syntax for typos or missing tokens"),
        );
    }

    /// Consume an identifier, rejecting keywords with a targeted message
    pub(super) fn identifier(&mut self, context: &str) -> Result<Identifier, ()> {
        let current = self.peek();
        if current.kind == TokenKind::Identifier {
            let token = self.advance();
            Ok(Identifier {
                name: token.lexeme.clone(),
                span: token.span,
            })
        } else if TokenKind::is_keyword(&current.lexeme).is_some() {
            let message = format!("Cannot use keyword '{}' as {}", current.lexeme, context);
            self.error(&message);
            Err(())
        } else {
            self.error(&format!("Expected {}", context));
            Err(())
        }
    }

    /// Skip tokens until a likely statement or item boundary
    pub(super) fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.tokens[self.current - 1].kind == TokenKind::Semicolon {
                return;
            }

            match self.peek().kind {
                TokenKind::Struct
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Return
                | TokenKind::RightBrace => return,
                _ => {
                    self.advance();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use pretty_assertions::assert_eq;

    fn parse_source(source: &str) -> (Program, Vec<Diagnostic>) {
        let (tokens, _) = Lexer::new(source).tokenize();
        Parser::new(tokens).parse()
    }

    #[test]
    fn test_parser_creation() {
        let (program, diagnostics) = parse_source("");
        assert!(program.items.is_empty());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_parse_struct() {
        let (program, diagnostics) =
            parse_source("struct Light { pos : float3; intensity : float; };");
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        match &program.items[0] {
            Item::Struct(s) => {
                assert_eq!(s.name.name, "Light");
                let fields: Vec<_> = s
                    .fields
                    .iter()
                    .map(|f| (f.name.name.as_str(), f.type_ref.name.as_str()))
                    .collect();
                assert_eq!(fields, vec![("pos", "float3"), ("intensity", "float")]);
            }
            other => panic!("expected struct, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_function_decl() {
        let (program, diagnostics) = parse_source("add(a : int, b : int) : int { return a + b; }");
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        match &program.items[0] {
            Item::Function(f) => {
                assert_eq!(f.name.name, "add");
                assert_eq!(f.params.len(), 2);
                assert_eq!(f.return_type.name, "int");
                assert_eq!(f.body.statements.len(), 1);
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_return_type_is_error() {
        let (_, diagnostics) = parse_source("f() { return; }");
        assert!(diagnostics[0].message.contains("return type"));
    }

    #[test]
    fn test_keyword_as_name() {
        let (_, diagnostics) = parse_source("while() : void { }");
        assert!(diagnostics[0].message.contains("Expected 'struct' or a function"));
        let (_, diagnostics) = parse_source("f(if : int) : void { }");
        assert!(diagnostics[0].message.contains("Cannot use keyword 'if'"));
    }

    #[test]
    fn test_recovery_reports_multiple_errors() {
        let source = "f() : void {\n  x : int = ;\n  y : int = 1 +;\n}\ng() : void { }";
        let (program, diagnostics) = parse_source(source);
        assert_eq!(diagnostics.len(), 2);
        assert!(program
            .items
            .iter()
            .any(|i| matches!(i, Item::Function(f) if f.name.name == "g")));
    }

    #[test]
    fn test_recovery_no_infinite_loop_on_eof() {
        let (_, diagnostics) = parse_source("f(a : int");
        assert!(!diagnostics.is_empty());
    }
}
