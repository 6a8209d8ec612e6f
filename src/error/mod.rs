//! Error types and diagnostics for markup parsing.
//!
//! Errors carry line, column, and byte offset information so editor tooling
//! can point at the offending token. Line and column are derived on demand
//! from [`crate::util::lines::LineIndex`]; they are never stored on AST nodes.
//!
//! Two engines report problems differently:
//!
//! - the single-pass parser returns a fatal [`ParseError`] for input it
//!   cannot structure, and records non-fatal [`ParseDiagnostic`]s on the
//!   resulting `Document`;
//! - the event engine delivers [`EventError`]s through its completion
//!   callback and lets the caller decide how severe they are.

use std::fmt;

use crate::tokenizer::TokenKind;

/// Severity level for a parse diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorSeverity {
    /// A non-fatal issue that doesn't prevent parsing. Fatal problems are
    /// returned as [`ParseError`] instead.
    Warning,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// Source location within the parsed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number (in characters, not bytes).
    pub column: u32,
    /// 0-based byte offset from the start of the input.
    pub byte_offset: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A non-fatal finding recorded while building a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDiagnostic {
    /// The severity of this diagnostic.
    pub severity: ErrorSeverity,
    /// Human-readable message.
    pub message: String,
    /// Where in the source the finding starts.
    pub location: SourceLocation,
}

impl fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} at {}",
            self.severity, self.message, self.location
        )
    }
}

/// The error returned when the single-pass parser rejects its input.
///
/// The token fields are `None` for failures that happen before tokenization,
/// such as undecodable byte input.
#[derive(Debug, Clone)]
pub struct ParseError {
    /// The primary error message.
    pub message: String,
    /// Where in the source the offending token starts.
    pub location: SourceLocation,
    /// Literal text of the offending token.
    pub token: Option<String>,
    /// Kind of the offending token.
    pub token_kind: Option<TokenKind>,
    /// Name of the innermost tag being parsed when the error occurred.
    pub open_tag: Option<String>,
    /// Diagnostics collected before the fatal error.
    pub diagnostics: Vec<ParseDiagnostic>,
}

impl ParseError {
    /// Creates an error that is not tied to a token.
    pub(crate) fn without_token(message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            message: message.into(),
            location,
            token: None,
            token_kind: None,
            open_tag: None,
            diagnostics: Vec::new(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error at {}: {}", self.location, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Errors reported by the event-driven engine.
///
/// These never abort the driver by themselves; they reach the builder's
/// completion callback, and the tree built so far stays inspectable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// A close tag did not match the innermost open element.
    UnexpectedClosingTag {
        /// The element that was actually open, if any.
        expected: Option<String>,
        /// The name carried by the close tag.
        found: String,
    },
    /// An element name with more than one namespace separator.
    InvalidElementName(String),
    /// The input ended before a tag was terminated.
    UnterminatedTag {
        /// Raw name of the unterminated tag.
        name: String,
    },
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedClosingTag {
                expected: Some(expected),
                found,
            } => write!(f, "unexpected closing tag </{found}>, expected </{expected}>"),
            Self::UnexpectedClosingTag {
                expected: None,
                found,
            } => write!(f, "unexpected closing tag </{found}>, no element is open"),
            Self::InvalidElementName(name) => write!(f, "invalid element name \"{name}\""),
            Self::UnterminatedTag { name } => {
                write!(f, "unexpected end of input inside tag <{name}>")
            }
        }
    }
}

impl std::error::Error for EventError {}
