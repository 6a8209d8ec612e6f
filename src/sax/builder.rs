//! Builds the AST from parsing events.
//!
//! [`AstBuilder`] keeps its own stack of open elements. Problems it notices
//! (a close tag that does not match, an invalid element name) do not stop
//! it: they are handed to the completion callback, which decides what they
//! mean, and building goes on.

use std::fmt;

use log::debug;

use crate::error::EventError;
use crate::tree::{
    AttributeData, AttributeSyntax, Document, ElementData, NodeId, NodeKind, Span, SyntaxToken,
};
use crate::util::qname::split_qualified;

use super::{Handler, PositionCursor};

/// Which positions the builder records.
///
/// Without them every span the builder creates is empty at offset 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuilderOptions {
    /// Record where elements and text runs start.
    pub with_start_indices: bool,
    /// Record where elements and text runs end.
    pub with_end_indices: bool,
}

impl BuilderOptions {
    /// Records both start and end positions.
    #[must_use]
    pub fn with_indices() -> Self {
        Self {
            with_start_indices: true,
            with_end_indices: true,
        }
    }
}

#[derive(Debug)]
struct OpenElement {
    id: NodeId,
    /// The raw tag name, compared with close tags.
    name: String,
}

type Callback<'cb> = Box<dyn FnMut(Option<&EventError>, &Document) + 'cb>;

/// The [`Handler`] that assembles a [`Document`].
///
/// The callback receives every error as it happens and is called one last
/// time with `None` when the input ends.
///
/// # Examples
///
/// ```
/// use xmlast::sax::{AstBuilder, EventParser};
///
/// let mut errors = Vec::new();
/// let mut builder = AstBuilder::new(|error, _doc| {
///     if let Some(error) = error {
///         errors.push(error.to_string());
///     }
/// });
/// EventParser::default().run("<a><b></a>", &mut builder);
/// let doc = builder.into_document();
///
/// assert_eq!(doc.element_name(doc.root_element().unwrap()), Some("a"));
/// assert_eq!(errors, ["unexpected closing tag </a>, expected </b>"]);
/// ```
pub struct AstBuilder<'cb> {
    callback: Callback<'cb>,
    options: BuilderOptions,
    cursor: Option<PositionCursor>,
    doc: Document,
    root_element: Option<NodeId>,
    stack: Vec<OpenElement>,
    done: bool,
}

impl fmt::Debug for AstBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AstBuilder")
            .field("options", &self.options)
            .field("root_element", &self.root_element)
            .field("stack", &self.stack)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl<'cb> AstBuilder<'cb> {
    /// Creates a builder that records no positions.
    pub fn new<F>(callback: F) -> Self
    where
        F: FnMut(Option<&EventError>, &Document) + 'cb,
    {
        Self::with_options(callback, BuilderOptions::default())
    }

    /// Creates a builder with the given options.
    pub fn with_options<F>(callback: F, options: BuilderOptions) -> Self
    where
        F: FnMut(Option<&EventError>, &Document) + 'cb,
    {
        Self {
            callback: Box::new(callback),
            options,
            cursor: None,
            doc: Document::new(),
            root_element: None,
            stack: Vec::new(),
            done: false,
        }
    }

    /// Returns the tree built so far.
    #[must_use]
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Consumes the builder and returns the tree.
    #[must_use]
    pub fn into_document(self) -> Document {
        self.doc
    }

    /// Returns true once [`Handler::on_end`] has been handled.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    fn report(&mut self, error: Option<&EventError>) {
        (self.callback)(error, &self.doc);
    }

    /// The span for a new node: the current event position, trimmed to what
    /// the options ask for.
    fn current_span(&self) -> Span {
        let Some(span) = self.cursor.as_ref().map(PositionCursor::get) else {
            return Span::default();
        };
        let start = if self.options.with_start_indices {
            span.start
        } else {
            0
        };
        let end = if self.options.with_end_indices {
            span.end
        } else {
            start
        };
        Span::new(start, end.max(start))
    }

    /// Creates an element with its attributes. The driver does not report
    /// attribute positions, so attributes share the span of their tag.
    fn create_element(&mut self, name: &str, attributes: &[(String, String)]) -> NodeId {
        let (prefix, local) = match split_qualified(name) {
            Some((prefix, local)) => (prefix, Some(local)),
            None => {
                let error = EventError::InvalidElementName(name.to_string());
                debug!(target: "xmlast.sax", "{error}");
                self.report(Some(&error));
                (None, None)
            }
        };
        let span = self.current_span();
        let id = self
            .doc
            .create_node(NodeKind::Element(ElementData::new(prefix, local)), span);

        for (key, value) in attributes {
            let data = AttributeData {
                key: key.clone(),
                value: Some(value.clone()),
                syntax: AttributeSyntax {
                    key: Some(SyntaxToken {
                        image: key.clone(),
                        span,
                    }),
                    value: Some(SyntaxToken {
                        image: format!("\"{value}\""),
                        span,
                    }),
                },
            };
            let attr = self.doc.create_node(NodeKind::Attribute(data), span);
            self.doc.attach(id, attr);
        }
        self.doc.bind_namespaces(id);
        id
    }

    fn create_prolog(&mut self, data: &str) {
        let found: Vec<(&str, &str)> = ["version", "encoding"]
            .into_iter()
            .filter_map(|key| declared_value(data, key).map(|value| (key, value)))
            .collect();
        if found.is_empty() {
            return;
        }

        let span = self.current_span();
        let prolog = self.doc.create_node(
            NodeKind::Prolog {
                attributes: Vec::new(),
            },
            span,
        );
        for (key, value) in found {
            let mut attr = AttributeData::new(key);
            attr.value = Some(value.to_string());
            let id = self.doc.create_node(NodeKind::PrologAttribute(attr), span);
            self.doc.attach(prolog, id);
        }
        self.doc.set_prolog(Some(prolog));
    }
}

/// Finds `key="value"` (or with single quotes) in a declaration and returns
/// the value of the first occurrence.
fn declared_value<'d>(data: &'d str, key: &str) -> Option<&'d str> {
    let mut rest = data;
    while let Some(found) = rest.find(key) {
        let after = &rest[found + key.len()..];
        if let Some(quoted) = after.strip_prefix('=') {
            if let Some(quote @ ('"' | '\'')) = quoted.chars().next() {
                let value = &quoted[1..];
                if let Some(close) = value.find(quote) {
                    return Some(&value[..close]);
                }
            }
        }
        rest = after;
    }
    None
}

impl Handler for AstBuilder<'_> {
    fn on_parser_init(&mut self, cursor: PositionCursor) {
        self.cursor = Some(cursor);
    }

    fn on_reset(&mut self) {
        self.doc = Document::new();
        self.root_element = None;
        self.stack.clear();
        self.cursor = None;
        self.done = false;
    }

    fn on_open_tag(&mut self, name: &str, attributes: &[(String, String)]) {
        let id = self.create_element(name, attributes);
        match self.stack.last() {
            Some(parent) => {
                let parent = parent.id;
                self.doc.attach(parent, id);
            }
            None if self.root_element.is_none() => self.root_element = Some(id),
            None => {
                debug!(target: "xmlast.sax", "<{name}> is outside the root element");
            }
        }
        self.stack.push(OpenElement {
            id,
            name: name.to_string(),
        });
    }

    fn on_close_tag(&mut self, name: &str) {
        let popped = self.stack.pop();
        match popped {
            Some(open) if open.name == name => {
                if self.options.with_end_indices {
                    if let Some(cursor) = &self.cursor {
                        let end = cursor.get().end.max(self.doc.span(open.id).start);
                        self.doc.set_end(open.id, end);
                    }
                }
            }
            other => {
                let error = EventError::UnexpectedClosingTag {
                    expected: other.map(|open| open.name),
                    found: name.to_string(),
                };
                debug!(target: "xmlast.sax", "{error}");
                self.report(Some(&error));
            }
        }
    }

    fn on_text(&mut self, data: &str) {
        let Some(parent) = self.stack.last().map(|open| open.id) else {
            return;
        };
        let span = self.current_span();
        let text = self.doc.create_node(
            NodeKind::Text {
                text: Some(data.to_string()),
            },
            span,
        );
        self.doc.attach(parent, text);
    }

    fn on_processing_instruction(&mut self, _name: &str, data: &str) {
        // The closing `?` must be on the same line as `?xml`.
        let is_declaration = data.find("?xml").is_some_and(|at| {
            data[at + 1..]
                .split(['\n', '\r', '\u{2028}', '\u{2029}'])
                .next()
                .is_some_and(|line| line.contains('?'))
        });
        if is_declaration {
            self.create_prolog(data);
        }
    }

    fn on_error(&mut self, error: EventError) {
        debug!(target: "xmlast.sax", "driver error: {error}");
        self.report(Some(&error));
    }

    fn on_end(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        // The driver points the cursor at the whole input before ending.
        let root = self.doc.root();
        self.doc.node_mut(root).span = self.current_span();
        self.doc.set_root_element(self.root_element);
        self.report(None);
    }
}
