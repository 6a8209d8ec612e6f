//! Single-pass markup parser.
//!
//! The parser consumes a token sequence once, left to right, and builds the
//! AST directly. Open tags are tracked on an explicit stack instead of the
//! call stack, so nesting depth is bounded only by memory.
//!
//! The parser is lenient in the way HTML parsers are:
//! - a close tag closes the nearest open tag of the same name and abandons
//!   everything opened inside it;
//! - a close tag with no open counterpart is ignored;
//! - tags registered as self-closing never take children;
//! - tags registered as non-nesting close an open tag of the same name.
//!
//! The only fatal condition is a token that cannot appear where it does,
//! such as a quoted value glued to an attribute name.

mod single_pass;

use std::collections::HashSet;

use crate::error::ParseError;
use crate::tokenizer::{Token, TokenSource, Tokenizer};
use crate::tree::Document;

use single_pass::Parser;

/// HTML void elements.
const DEFAULT_SELF_CLOSING: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Elements that end an open element of the same name.
const DEFAULT_NON_NESTING: &[&str] = &["li", "option", "p"];

/// Parse options shared by both engines.
///
/// Use the builder pattern to configure options:
///
/// ```
/// use xmlast::parser::ParseOptions;
///
/// let opts = ParseOptions::xml()
///     .self_closing_tags(["br"])
///     .decode_entities(false);
/// assert!(opts.is_self_closing("br"));
/// assert!(!opts.is_non_nesting("p"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Tag names that never have children, even without `/>`.
    pub self_closing_tags: HashSet<String>,
    /// Tag names that close an open tag of the same name when reopened.
    pub non_nesting_tags: HashSet<String>,
    /// If true, character references in text and attribute values are
    /// decoded. Spans and syntax images always keep the raw text.
    pub decode_entities: bool,
}

impl Default for ParseOptions {
    /// HTML-flavored defaults: void elements self-close and `li`, `option`
    /// and `p` do not nest.
    fn default() -> Self {
        Self {
            self_closing_tags: DEFAULT_SELF_CLOSING.iter().map(|s| (*s).to_string()).collect(),
            non_nesting_tags: DEFAULT_NON_NESTING.iter().map(|s| (*s).to_string()).collect(),
            decode_entities: true,
        }
    }
}

impl ParseOptions {
    /// Options with no tag policies, for plain XML.
    #[must_use]
    pub fn xml() -> Self {
        Self {
            self_closing_tags: HashSet::new(),
            non_nesting_tags: HashSet::new(),
            decode_entities: true,
        }
    }

    /// Replaces the set of self-closing tag names.
    #[must_use]
    pub fn self_closing_tags<I>(mut self, names: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.self_closing_tags = names.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the set of non-nesting tag names.
    #[must_use]
    pub fn non_nesting_tags<I>(mut self, names: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.non_nesting_tags = names.into_iter().map(Into::into).collect();
        self
    }

    /// Enables or disables character reference decoding.
    #[must_use]
    pub fn decode_entities(mut self, yes: bool) -> Self {
        self.decode_entities = yes;
        self
    }

    /// Returns true if `name` is registered as self-closing.
    #[must_use]
    pub fn is_self_closing(&self, name: &str) -> bool {
        self.self_closing_tags.contains(name)
    }

    /// Returns true if `name` is registered as non-nesting.
    #[must_use]
    pub fn is_non_nesting(&self, name: &str) -> bool {
        self.non_nesting_tags.contains(name)
    }
}

/// Parses a markup string with default options.
///
/// # Errors
///
/// Returns `ParseError` if a token appears where the grammar forbids it.
///
/// # Examples
///
/// ```
/// use xmlast::parser::parse_str;
///
/// let doc = parse_str("<p>a<p>b").unwrap();
/// assert_eq!(doc.element_name(doc.root_element().unwrap()), Some("p"));
///
/// let err = parse_str("<a x\"1\">").unwrap_err();
/// assert!(err.message.contains("when parsing tag \"a\""));
/// ```
pub fn parse_str(input: &str) -> Result<Document, ParseError> {
    parse_str_with_options(input, &ParseOptions::default())
}

/// Parses a markup string with the given options.
///
/// # Errors
///
/// Returns `ParseError` if a token appears where the grammar forbids it.
pub fn parse_str_with_options(input: &str, options: &ParseOptions) -> Result<Document, ParseError> {
    parse_with(&Tokenizer, input, options)
}

/// Parses a markup string, tokenizing it with `source`.
///
/// # Errors
///
/// Returns `ParseError` if a token appears where the grammar forbids it.
pub fn parse_with<S: TokenSource + ?Sized>(
    source: &S,
    input: &str,
    options: &ParseOptions,
) -> Result<Document, ParseError> {
    let tokens = source.tokenize(input);
    parse_tokens(input, &tokens, options)
}

/// Parses an already tokenized input.
///
/// `tokens` must be offsets into `input`, in order.
///
/// # Errors
///
/// Returns `ParseError` if a token appears where the grammar forbids it.
pub fn parse_tokens(
    input: &str,
    tokens: &[Token<'_>],
    options: &ParseOptions,
) -> Result<Document, ParseError> {
    Parser::new(input, tokens, options).parse()
}
