//! Literal scanning for the lexer

use crate::diagnostic::error_codes;
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

impl Lexer {
    /// Scan a string literal; the token lexeme holds the unescaped contents
    pub(super) fn string(&mut self) -> Token {
        let mut value = String::new();
        let mut error_token = None;

        while !self.is_at_end() && self.peek() != '"' {
            if self.peek() == '\\' {
                self.advance();
                if self.is_at_end() {
                    return self.error_token_with_code(
                        error_codes::UNTERMINATED_STRING,
                        "Unterminated string literal",
                    );
                }

                let escape_char = self.advance();
                match escape_char {
                    'n' => value.push('\n'),
                    'r' => value.push('\r'),
                    't' => value.push('\t'),
                    '\\' => value.push('\\'),
                    '"' => value.push('"'),
                    other => {
                        // Keep scanning so the closing quote is still consumed
                        if error_token.is_none() {
                            error_token = Some(self.error_token_with_code(
                                error_codes::INVALID_ESCAPE,
                                &format!("Invalid escape sequence '\\{}'", other),
                            ));
                        }
                    }
                }
            } else {
                value.push(self.advance());
            }
        }

        if self.is_at_end() {
            return self.error_token_with_code(
                error_codes::UNTERMINATED_STRING,
                "Unterminated string literal",
            );
        }

        self.advance(); // closing "

        match error_token {
            Some(err) => err,
            None => self.make_token(TokenKind::String, &value),
        }
    }

    /// Scan an integer or float literal (`42`, `1.5`, `2.0e3`)
    pub(super) fn number(&mut self) -> Token {
        let start = self.current - 1;
        let mut is_float = false;

        while !self.is_at_end() && self.peek().is_ascii_digit() {
            self.advance();
        }

        if self.peek() == '.' && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            while !self.is_at_end() && self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        if self.peek() == 'e' || self.peek() == 'E' {
            is_float = true;
            self.advance();
            if self.peek() == '+' || self.peek() == '-' {
                self.advance();
            }
            if self.is_at_end() || !self.peek().is_ascii_digit() {
                return self.error_token_with_code(
                    error_codes::INVALID_NUMBER,
                    "Invalid number: exponent requires digits",
                );
            }
            while !self.is_at_end() && self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let lexeme: String = self.chars[start..self.current].iter().collect();

        if is_float {
            if lexeme.parse::<f32>().is_err() {
                return self.error_token_with_code(
                    error_codes::INVALID_NUMBER,
                    &format!("Invalid float literal '{}'", lexeme),
                );
            }
            self.make_token(TokenKind::Float, &lexeme)
        } else {
            // 2147483648 survives lexing so the parser can fold `-2147483648`
            if !matches!(lexeme.parse::<u32>(), Ok(v) if v <= 1 << 31) {
                return self.error_token_with_code(
                    error_codes::INVALID_NUMBER,
                    &format!("Integer literal '{}' does not fit in 32 bits", lexeme),
                );
            }
            self.make_token(TokenKind::Int, &lexeme)
        }
    }

    /// Scan an identifier or keyword
    pub(super) fn identifier(&mut self) -> Token {
        let start = self.current - 1;

        while !self.is_at_end() {
            let c = self.peek();
            if c.is_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        let lexeme: String = self.chars[start..self.current].iter().collect();
        let kind = TokenKind::is_keyword(&lexeme).unwrap_or(TokenKind::Identifier);

        self.make_token(kind, &lexeme)
    }
}

#[cfg(test)]
mod tests {
    use crate::diagnostic::error_codes;
    use crate::lexer::Lexer;
    use crate::token::TokenKind;
    use rstest::rstest;

    #[rstest]
    #[case("42", TokenKind::Int)]
    #[case("0", TokenKind::Int)]
    #[case("1.5", TokenKind::Float)]
    #[case("2.0e3", TokenKind::Float)]
    #[case("3e-2", TokenKind::Float)]
    fn test_number_kinds(#[case] source: &str, #[case] expected: TokenKind) {
        let (tokens, diagnostics) = Lexer::new(source).tokenize();
        assert!(diagnostics.is_empty());
        assert_eq!(tokens[0].kind, expected);
        assert_eq!(tokens[0].lexeme, source);
    }

    #[test]
    fn test_trailing_dot_is_member_access() {
        let (tokens, _) = Lexer::new("1.x").tokenize();
        assert_eq!(tokens[0].kind, TokenKind::Int);
        assert_eq!(tokens[1].kind, TokenKind::Dot);
    }

    #[test]
    fn test_integer_overflow_is_reported() {
        let (_, diagnostics) = Lexer::new("4294967296").tokenize();
        assert_eq!(diagnostics[0].code, error_codes::INVALID_NUMBER);
    }

    #[test]
    fn test_min_int_magnitude_lexes() {
        let (tokens, diagnostics) = Lexer::new("2147483648").tokenize();
        assert!(diagnostics.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Int);

        let (_, diagnostics) = Lexer::new("2147483649").tokenize();
        assert_eq!(diagnostics[0].code, error_codes::INVALID_NUMBER);
    }

    #[test]
    fn test_string_escapes() {
        let (tokens, diagnostics) = Lexer::new(r#""a\tb\n\"q\"""#).tokenize();
        assert!(diagnostics.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].lexeme, "a\tb\n\"q\"");
    }

    #[test]
    fn test_invalid_escape() {
        let (tokens, diagnostics) = Lexer::new(r#""bad\q" x"#).tokenize();
        assert_eq!(tokens[0].kind, TokenKind::Error);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(diagnostics[0].code, error_codes::INVALID_ESCAPE);
    }

    #[test]
    fn test_unterminated_string() {
        let (tokens, diagnostics) = Lexer::new("\"open").tokenize();
        assert_eq!(tokens[0].kind, TokenKind::Error);
        assert_eq!(diagnostics[0].code, error_codes::UNTERMINATED_STRING);
    }

    #[test]
    fn test_keywords_and_identifiers() {
        let (tokens, _) = Lexer::new("while whilex _tmp").tokenize();
        assert_eq!(tokens[0].kind, TokenKind::While);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[2].kind, TokenKind::Identifier);
    }
}
