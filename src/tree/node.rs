//! Node type definitions.
//!
//! `NodeKind` carries the payload of every node in the AST. Ownership links
//! (which element holds which attributes, texts and sub-elements) live in
//! the payloads as `NodeId` lists; the upward link lives in `NodeData`.

use std::collections::BTreeMap;

use super::NodeId;

/// Namespace map key of the default (unprefixed) namespace.
///
/// A prefix can never contain a colon, so this key cannot collide with a
/// real prefix.
pub const DEFAULT_NS: &str = "::DEFAULT";

/// A half-open byte range `[start, end)` of the parsed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Offset of the first byte.
    pub start: usize,
    /// Offset one past the last byte.
    pub end: usize,
}

impl Span {
    /// Creates a span from its bounds.
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Returns true if `other` lies entirely inside this span.
    #[must_use]
    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Returns the length in bytes (0 for an inverted span).
    #[must_use]
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Returns true if the span covers no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The verbatim text of one token, with its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxToken {
    /// The token exactly as written, quotes included.
    pub image: String,
    /// Where the token sits in the input.
    pub span: Span,
}

/// Raw syntax records of an attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSyntax {
    /// The key token.
    pub key: Option<SyntaxToken>,
    /// The value token (quotes included), absent for a bare attribute.
    pub value: Option<SyntaxToken>,
}

/// Payload shared by element attributes and prolog attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeData {
    /// The attribute name as written.
    pub key: String,
    /// The decoded value without quotes, `None` for a bare attribute.
    pub value: Option<String>,
    /// The tokens the attribute was parsed from.
    pub syntax: AttributeSyntax,
}

impl AttributeData {
    /// Creates an attribute with a key and no value yet.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
            syntax: AttributeSyntax::default(),
        }
    }
}

/// Payload of an element node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementData {
    /// Namespace prefix (e.g., `"svg"` in `svg:rect`), if any.
    pub prefix: Option<String>,
    /// Local name. `None` when the tag name was not a valid qualified name.
    ///
    /// Comment and declaration blocks keep their raw marker (`"!--"`, `"!"`
    /// or `""`) here.
    pub name: Option<String>,
    /// Namespaces declared on this element, prefix to URI.
    pub namespaces: BTreeMap<String, String>,
    /// Attribute nodes in source order, duplicates included.
    pub attributes: Vec<NodeId>,
    /// Child elements in source order.
    pub children: Vec<NodeId>,
    /// Text runs in source order.
    pub texts: Vec<NodeId>,
}

impl ElementData {
    /// Creates an element payload from an already split name.
    #[must_use]
    pub fn new(prefix: Option<&str>, name: Option<&str>) -> Self {
        Self {
            prefix: prefix.map(str::to_string),
            name: name.map(str::to_string),
            ..Self::default()
        }
    }

    /// Returns true for comment and declaration blocks, whose content is kept
    /// as a single raw text run.
    #[must_use]
    pub fn is_opaque(&self) -> bool {
        self.prefix.is_none() && matches!(self.name.as_deref(), Some("" | "!" | "!--"))
    }
}

/// The kind of an AST node and its associated data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The document node. There is exactly one per `Document`.
    Document {
        /// The XML declaration, if one was found.
        prolog: Option<NodeId>,
        /// The root element, `None` when there is none.
        root_element: Option<NodeId>,
    },

    /// The XML declaration, `<?xml version="1.0" encoding="UTF-8"?>`.
    Prolog {
        /// `version` then `encoding`, whichever are present.
        attributes: Vec<NodeId>,
    },

    /// An attribute of the XML declaration.
    PrologAttribute(AttributeData),

    /// An element, including comment and declaration blocks.
    Element(ElementData),

    /// An attribute of an element.
    Attribute(AttributeData),

    /// A contiguous run of character data.
    Text {
        /// The decoded text.
        text: Option<String>,
    },
}

impl NodeKind {
    /// Returns a short name for the kind, used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Document { .. } => "document",
            Self::Prolog { .. } => "prolog",
            Self::PrologAttribute(_) => "prolog attribute",
            Self::Element(_) => "element",
            Self::Attribute(_) => "attribute",
            Self::Text { .. } => "text",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_contains() {
        let outer = Span::new(0, 10);
        assert!(outer.contains(Span::new(0, 10)));
        assert!(outer.contains(Span::new(3, 4)));
        assert!(!outer.contains(Span::new(3, 11)));
        assert!(!Span::new(2, 5).contains(outer));
    }

    #[test]
    fn test_span_len() {
        assert_eq!(Span::new(2, 5).len(), 3);
        assert!(Span::new(4, 4).is_empty());
        assert_eq!(Span::new(5, 2).len(), 0);
    }

    #[test]
    fn test_opaque_elements() {
        assert!(ElementData::new(None, Some("!--")).is_opaque());
        assert!(ElementData::new(None, Some("!")).is_opaque());
        assert!(ElementData::new(None, Some("")).is_opaque());
        assert!(!ElementData::new(None, Some("div")).is_opaque());
        assert!(!ElementData::new(None, None).is_opaque());
    }
}
