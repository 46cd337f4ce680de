//! Diagnostic system for compile errors and warnings
//!
//! Lexer, parser, type checker and declaration errors all flow through the
//! unified Diagnostic type so tooling can render or serialize them uniformly.

use crate::span::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Diagnostic schema version
pub const DIAG_VERSION: u32 = 1;

/// Severity level of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    /// Fatal error that prevents compilation
    Error,
    /// Warning that doesn't prevent compilation
    Warning,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticLevel::Error => write!(f, "error"),
            DiagnosticLevel::Warning => write!(f, "warning"),
        }
    }
}

/// A diagnostic message (error or warning)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Diagnostic schema version
    pub diag_version: u32,
    /// Severity level
    pub level: DiagnosticLevel,
    /// Error code (e.g., "BS2001")
    pub code: String,
    /// Main diagnostic message
    pub message: String,
    /// File path
    pub file: String,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based)
    pub column: usize,
    /// Length of error span
    pub length: usize,
    /// Source line string
    pub snippet: String,
    /// Short label for caret range
    pub label: String,
    /// Additional notes (optional)
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub notes: Vec<String>,
    /// Suggested fix (optional)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub help: Option<String>,
    /// Character offset of the span start, resolved into line/column by `locate`
    #[serde(skip)]
    offset: usize,
}

impl Diagnostic {
    fn new(level: DiagnosticLevel, code: &str, message: String, span: Span) -> Self {
        Self {
            diag_version: DIAG_VERSION,
            level,
            code: code.to_string(),
            message,
            file: "<unknown>".to_string(),
            line: 1,
            column: span.start + 1,
            length: span.len(),
            snippet: String::new(),
            label: String::new(),
            notes: Vec::new(),
            help: None,
            offset: span.start,
        }
    }

    /// Create a new error diagnostic with code
    pub fn error_with_code(code: &str, message: impl Into<String>, span: Span) -> Self {
        Self::new(DiagnosticLevel::Error, code, message.into(), span)
    }

    /// Create a new warning diagnostic with code
    pub fn warning_with_code(code: &str, message: impl Into<String>, span: Span) -> Self {
        Self::new(DiagnosticLevel::Warning, code, message.into(), span)
    }

    /// Set the file path
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = file.into();
        self
    }

    /// Set the label (caret description)
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Add a note
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Add a help message
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Resolve line, column and snippet against the source the span points into
    pub fn locate(mut self, source: &str) -> Self {
        let mut line = 1;
        let mut line_start = 0;
        for (i, c) in source.chars().enumerate() {
            if i >= self.offset {
                break;
            }
            if c == '\n' {
                line += 1;
                line_start = i + 1;
            }
        }
        self.line = line;
        self.column = self.offset - line_start + 1;
        self.snippet = source.lines().nth(line - 1).unwrap_or("").to_string();
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagnosticLevel::Error
    }

    /// Format as human-readable string
    pub fn to_human_string(&self) -> String {
        let mut output = String::new();

        // Header: error[BS2001]: Type mismatch
        output.push_str(&format!(
            "{}[{}]: {}\n",
            self.level, self.code, self.message
        ));

        // Location: --> shaders/light.bs:12:9
        output.push_str(&format!(
            "  --> {}:{}:{}\n",
            self.file, self.line, self.column
        ));

        if !self.snippet.is_empty() {
            output.push_str("   |\n");
            output.push_str(&format!("{:>2} | {}\n", self.line, self.snippet));

            if self.length > 0 {
                let padding = " ".repeat(self.column.saturating_sub(1));
                let carets = "^".repeat(self.length);
                output.push_str(&format!("   | {}{}", padding, carets));

                if !self.label.is_empty() {
                    output.push_str(&format!(" {}", self.label));
                }
                output.push('\n');
            }
        }

        for note in &self.notes {
            output.push_str(&format!("   = note: {}\n", note));
        }

        if let Some(help) = &self.help {
            output.push_str(&format!("   = help: {}\n", help));
        }

        output
    }

    /// Format as JSON string
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] {}:{}: {}",
            self.level, self.code, self.line, self.column, self.message
        )
    }
}

/// Error code registry
pub mod error_codes {
    // BS1xxx - Lexical and Syntax Errors
    pub const SYNTAX_ERROR: &str = "BS1000";
    pub const UNEXPECTED_CHARACTER: &str = "BS1001";
    pub const UNTERMINATED_STRING: &str = "BS1002";
    pub const INVALID_ESCAPE: &str = "BS1003";
    pub const UNTERMINATED_COMMENT: &str = "BS1004";
    pub const INVALID_NUMBER: &str = "BS1005";

    // BS2xxx - Type Errors
    pub const TYPE_MISMATCH: &str = "BS2001";
    pub const UNKNOWN_TYPE: &str = "BS2002";
    pub const UNDEFINED_VARIABLE: &str = "BS2003";
    pub const NO_MATCHING_FUNCTION: &str = "BS2004";
    pub const INVALID_OPERAND: &str = "BS2005";
    pub const MISSING_RETURN: &str = "BS2006";
    pub const NOT_ASSIGNABLE: &str = "BS2007";
    pub const UNKNOWN_FIELD: &str = "BS2008";
    pub const CONSTRUCTOR_ARITY: &str = "BS2009";
    pub const VOID_VALUE: &str = "BS2010";
    pub const DUPLICATE_VARIABLE: &str = "BS2011";

    // BS3xxx - Declaration Errors
    pub const DUPLICATE_FUNCTION: &str = "BS3001";
    pub const DUPLICATE_TYPE: &str = "BS3002";
    pub const DUPLICATE_FIELD: &str = "BS3003";
    pub const EMPTY_STRUCT: &str = "BS3004";
    pub const VOID_ARGUMENT: &str = "BS3005";
    pub const DUPLICATE_ARGUMENT: &str = "BS3006";
    pub const NAME_TOO_LONG: &str = "BS3007";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_resolves_line_and_column() {
        let source = "a : int = 1;\n  b : flot = 2;\n";
        let diag = Diagnostic::error_with_code(error_codes::UNKNOWN_TYPE, "unknown type 'flot'", Span::new(19, 23))
            .locate(source);
        assert_eq!(diag.line, 2);
        assert_eq!(diag.column, 7);
        assert_eq!(diag.snippet, "  b : flot = 2;");
        assert_eq!(diag.length, 4);
    }

    #[test]
    fn test_human_string_has_caret_and_help() {
        let diag = Diagnostic::error_with_code(error_codes::SYNTAX_ERROR, "Expected ';'", Span::new(4, 5))
            .with_label("syntax error")
            .with_help("terminate the statement with ';'")
            .locate("x = 1 y");
        let text = diag.to_human_string();
        assert!(text.starts_with("error[BS1000]: Expected ';'\n"));
        assert!(text.contains("    ^ syntax error"));
        assert!(text.contains("= help: terminate the statement with ';'"));
    }

    #[test]
    fn test_json_omits_empty_optionals() {
        let diag = Diagnostic::warning_with_code("BS2011", "shadowed", Span::new(0, 1));
        let json = diag.to_json_string().unwrap();
        assert!(json.contains("\"level\": \"warning\""));
        assert!(!json.contains("notes"));
        assert!(!json.contains("help"));
        assert!(!json.contains("offset"));
    }
}
