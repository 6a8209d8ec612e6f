//! Event-driven parsing.
//!
//! Instead of building the tree itself, [`EventParser`] scans the input and
//! fires callbacks on a [`Handler`] as it meets tags, text and processing
//! instructions. [`builder::AstBuilder`] is the handler that turns those
//! events into the same AST the single-pass parser produces, and
//! [`parse_events`] wires the two together.
//!
//! # Examples
//!
//! ```
//! use xmlast::sax::{EventParser, Handler};
//!
//! struct Counter {
//!     elements: usize,
//! }
//!
//! impl Handler for Counter {
//!     fn on_open_tag(&mut self, _name: &str, _attributes: &[(String, String)]) {
//!         self.elements += 1;
//!     }
//! }
//!
//! let mut counter = Counter { elements: 0 };
//! EventParser::default().run("<root><a/><b/><c/></root>", &mut counter);
//! assert_eq!(counter.elements, 4);
//! ```

pub mod builder;

use std::cell::Cell;
use std::rc::Rc;

use log::debug;

use crate::entities::decode_entities;
use crate::error::EventError;
use crate::parser::ParseOptions;
use crate::tokenizer::{unquote, Token, TokenKind, TokenSource, Tokenizer};
use crate::tree::{Document, Span};

pub use builder::{AstBuilder, BuilderOptions};

/// The span of the construct the driver is currently reporting.
///
/// The driver hands a cursor to its handler in
/// [`Handler::on_parser_init`]; handlers read it from inside any callback.
#[derive(Debug, Clone, Default)]
pub struct PositionCursor(Rc<Cell<Span>>);

impl PositionCursor {
    /// Returns the span of the current event.
    #[must_use]
    pub fn get(&self) -> Span {
        self.0.get()
    }

    pub(crate) fn set(&self, span: Span) {
        self.0.set(span);
    }
}

/// Receiver of parsing events.
///
/// All methods have default no-op implementations so you only need to
/// override what you need. A run ends with exactly one of
/// [`on_end`](Handler::on_end) or [`on_error`](Handler::on_error).
#[allow(unused_variables)]
pub trait Handler {
    /// Called first, with the cursor the driver updates before every event.
    fn on_parser_init(&mut self, cursor: PositionCursor) {}

    /// Called when the handler should drop all state from a previous run.
    fn on_reset(&mut self) {}

    /// Called for every start tag, with its raw name and attributes.
    ///
    /// Attributes are `(key, value)` pairs in source order. Only the first
    /// occurrence of a key is kept and a bare attribute has an empty value.
    fn on_open_tag(&mut self, name: &str, attributes: &[(String, String)]) {}

    /// Called for every end tag, and right after `on_open_tag` for
    /// self-closing tags.
    fn on_close_tag(&mut self, name: &str) {}

    /// Called for character data between tags.
    fn on_text(&mut self, data: &str) {}

    /// Called for `<?name ...?>`. `data` is everything between `<` and `>`.
    fn on_processing_instruction(&mut self, name: &str, data: &str) {}

    /// Called when the input cannot be scanned any further.
    fn on_error(&mut self, error: EventError) {}

    /// Called once the whole input has been reported.
    fn on_end(&mut self) {}
}

/// A handler that ignores every event.
pub struct DefaultHandler;

impl Handler for DefaultHandler {}

/// The event driver.
///
/// Comments and declarations are skipped. Text and attribute values are
/// decoded when [`ParseOptions::decode_entities`] is set, and tags named in
/// [`ParseOptions::self_closing_tags`] are closed right after they open.
#[derive(Debug, Clone, Default)]
pub struct EventParser {
    options: ParseOptions,
    cursor: PositionCursor,
}

impl EventParser {
    /// Creates a driver with the given options.
    #[must_use]
    pub fn new(options: ParseOptions) -> Self {
        Self {
            options,
            cursor: PositionCursor::default(),
        }
    }

    /// Returns the options of this driver.
    #[must_use]
    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Scans `input` with the default tokenizer and reports it to `handler`.
    pub fn run<H: Handler + ?Sized>(&self, input: &str, handler: &mut H) {
        let tokens = Tokenizer.tokenize(input);
        self.run_tokens(input, &tokens, handler);
    }

    /// Reports an already tokenized input to `handler`.
    pub fn run_tokens<H: Handler + ?Sized>(
        &self,
        input: &str,
        tokens: &[Token<'_>],
        handler: &mut H,
    ) {
        let len = input.len();
        handler.on_parser_init(self.cursor.clone());

        let mut index = 0;
        while let Some(&token) = tokens.get(index) {
            match token.kind {
                TokenKind::Literal => {
                    self.cursor.set(Span::new(token.start, token.end));
                    handler.on_text(&self.decode(token.value));
                }
                TokenKind::OpenTag => {
                    let start = token.start.saturating_sub(1);
                    let Some(offset) = tokens[index..]
                        .iter()
                        .position(|t| t.kind == TokenKind::OpenTagEnd)
                    else {
                        debug!(target: "xmlast.sax", "input ended inside <{}>", token.value);
                        self.cursor.set(Span::new(start, len));
                        handler.on_error(EventError::UnterminatedTag {
                            name: token.value.to_string(),
                        });
                        return;
                    };
                    let end_index = index + offset;
                    let end = tokens[end_index];
                    self.cursor
                        .set(Span::new(start, (end.end + 1).min(len)));
                    self.report_tag(input, token, &tokens[index + 1..end_index], end, handler);
                    index = end_index;
                }
                TokenKind::CloseTag => {
                    self.cursor.set(Span::new(
                        token.start.saturating_sub(2),
                        (token.end + 1).min(len),
                    ));
                    handler.on_close_tag(token.value.trim());
                }
                _ => {
                    debug!(target: "xmlast.sax", "skipping stray {} token at {}", token.kind, token.start);
                }
            }
            index += 1;
        }

        self.cursor.set(Span::new(0, len));
        handler.on_end();
    }

    /// Reports one complete start tag. `body` holds the tokens between the
    /// name and `end`.
    fn report_tag<H: Handler + ?Sized>(
        &self,
        input: &str,
        open: Token<'_>,
        body: &[Token<'_>],
        end: Token<'_>,
        handler: &mut H,
    ) {
        let name = open.value;
        if name.starts_with('?') {
            let data = input.get(open.start..end.end).unwrap_or(name);
            handler.on_processing_instruction(name, data);
            return;
        }
        if matches!(name, "" | "!" | "!--") {
            return;
        }

        let attributes = self.collect_attributes(body);
        handler.on_open_tag(name, &attributes);
        if end.value == "/" || self.options.is_self_closing(name) {
            handler.on_close_tag(name);
        }
    }

    /// Pairs up attribute keys and values, first occurrence winning.
    fn collect_attributes(&self, body: &[Token<'_>]) -> Vec<(String, String)> {
        let mut attributes: Vec<(String, String)> = Vec::new();
        let mut tokens = body
            .iter()
            .filter(|t| t.kind != TokenKind::Whitespace)
            .peekable();

        while let Some(key) = tokens.next() {
            if key.kind == TokenKind::AttrValueEq {
                continue;
            }
            let value = if tokens.next_if(|t| t.kind == TokenKind::AttrValueEq).is_some() {
                tokens
                    .next_if(|t| t.kind != TokenKind::AttrValueEq)
                    .map_or_else(String::new, |t| self.decode(unquote(t.value)))
            } else {
                String::new()
            };
            if attributes.iter().all(|(k, _)| k != key.value) {
                attributes.push((key.value.to_string(), value));
            }
        }
        attributes
    }

    fn decode(&self, raw: &str) -> String {
        if self.options.decode_entities {
            decode_entities(raw).into_owned()
        } else {
            raw.to_string()
        }
    }
}

/// Builds a tree with the event engine, in XML mode (no tag policies).
///
/// Returns the tree and zero or one error: the last one reported.
///
/// # Examples
///
/// ```
/// use xmlast::sax::parse_events;
///
/// let (doc, errors) = parse_events("<a><b>x</b></a>");
/// assert!(errors.is_empty());
/// assert_eq!(doc.element_name(doc.root_element().unwrap()), Some("a"));
///
/// let (_, errors) = parse_events("<a></b>");
/// assert_eq!(errors.len(), 1);
/// ```
#[must_use]
pub fn parse_events(input: &str) -> (Document, Vec<EventError>) {
    parse_events_with_options(input, &ParseOptions::xml(), BuilderOptions::default())
}

/// Builds a tree with the event engine and the given options.
#[must_use]
pub fn parse_events_with_options(
    input: &str,
    options: &ParseOptions,
    builder_options: BuilderOptions,
) -> (Document, Vec<EventError>) {
    let mut last_error: Option<EventError> = None;
    let doc = {
        let mut builder = AstBuilder::with_options(
            |error: Option<&EventError>, _: &Document| {
                if let Some(error) = error {
                    last_error = Some(error.clone());
                }
            },
            builder_options,
        );
        EventParser::new(options.clone()).run(input, &mut builder);
        builder.into_document()
    };
    (doc, last_error.into_iter().collect())
}
