//! Arena-based markup AST.
//!
//! All nodes live in a contiguous `Vec<NodeData>` owned by the `Document`
//! and are referenced by `NodeId`, a newtype over `NonZeroU32`. Parents own
//! their children through `NodeId` lists in the node payload, and every node
//! stores its parent as a plain index, so upward navigation is O(1) and the
//! tree can never form reference cycles.
//!
//! Every node carries a [`Span`] of byte offsets into the parsed input.
//! Line and column numbers are not stored; derive them on demand with
//! [`crate::util::lines::LineIndex`].

mod node;
pub mod walk;

pub use node::{
    AttributeData, AttributeSyntax, ElementData, NodeKind, Span, SyntaxToken, DEFAULT_NS,
};

use std::num::NonZeroU32;

use crate::error::{ParseDiagnostic, ParseError, SourceLocation};

/// A typed index into the document's node arena.
///
/// `NodeId` is a newtype over `NonZeroU32`, meaning it can never be zero
/// and `Option<NodeId>` has the same size as `NodeId` (niche optimization).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(NonZeroU32);

impl NodeId {
    /// Creates a `NodeId` from a raw index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is 0.
    #[allow(clippy::expect_used, clippy::cast_possible_truncation)]
    fn from_index(index: usize) -> Self {
        Self(NonZeroU32::new(index as u32).expect("NodeId index must be non-zero"))
    }

    /// Returns the raw index as a `usize` for indexing into the arena.
    fn as_index(self) -> usize {
        self.0.get() as usize
    }

    /// Converts this `NodeId` to its raw, always non-zero, value.
    #[must_use]
    pub fn into_raw(self) -> u32 {
        self.0.get()
    }

    /// Creates a `NodeId` from a raw `u32`, if non-zero.
    #[must_use]
    pub fn from_raw(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }
}

/// Storage for a single node in the document arena.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// What kind of node this is and its payload.
    pub kind: NodeKind,
    /// Owning node. `None` for the document node and for root-level content
    /// that was never attached.
    pub parent: Option<NodeId>,
    /// Byte range of the node in the input.
    pub span: Span,
}

impl NodeData {
    fn new(kind: NodeKind, span: Span) -> Self {
        Self {
            kind,
            parent: None,
            span,
        }
    }
}

/// A parsed markup document.
///
/// The `Document` owns all nodes in an arena and provides methods for
/// navigation. Nodes that ended up outside the tree (for instance extra
/// root-level elements) stay in the arena with no parent.
///
/// # Examples
///
/// ```
/// use xmlast::Document;
///
/// let doc = Document::parse_str("<root a=\"1\"><child/></root>").unwrap();
/// let root = doc.root_element().unwrap();
/// assert_eq!(doc.element_name(root), Some("root"));
/// assert_eq!(doc.attribute(root, "a"), Some("1"));
/// ```
#[derive(Debug, Clone)]
pub struct Document {
    /// The node arena. Index 0 is unused (placeholder for `NonZeroU32`).
    nodes: Vec<NodeData>,
    /// The document node id.
    root: NodeId,
    /// Non-fatal findings collected during parsing.
    pub diagnostics: Vec<ParseDiagnostic>,
}

impl Document {
    /// Creates a new empty document holding only the document node.
    #[must_use]
    pub fn new() -> Self {
        let document = || NodeKind::Document {
            prolog: None,
            root_element: None,
        };
        let mut nodes = Vec::with_capacity(64);
        // Index 0: placeholder (NodeId uses NonZeroU32)
        nodes.push(NodeData::new(document(), Span::default()));
        // Index 1: the document node
        nodes.push(NodeData::new(document(), Span::default()));
        Self {
            nodes,
            root: NodeId::from_index(1),
            diagnostics: Vec::new(),
        }
    }

    /// Parses markup text with the default options.
    ///
    /// The text is parsed as given: a leading byte order mark stays in the
    /// input, so spans are offsets into `input` itself.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the single-pass parser meets a token it cannot
    /// place.
    ///
    /// # Examples
    ///
    /// ```
    /// use xmlast::Document;
    ///
    /// let doc = Document::parse_str("<ul><li>a<li>b</ul>").unwrap();
    /// let ul = doc.root_element().unwrap();
    /// assert_eq!(doc.children(ul).len(), 2);
    /// ```
    pub fn parse_str(input: &str) -> Result<Self, ParseError> {
        crate::parser::parse_str(input)
    }

    /// Parses markup from raw bytes, detecting the encoding.
    ///
    /// The bytes are transcoded to UTF-8 first (see
    /// [`crate::encoding::decode_to_utf8`]); spans refer to the transcoded
    /// text. A UTF-8 byte order mark is kept in front of it, so for UTF-8
    /// input the spans are byte offsets into `input`.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the bytes cannot be decoded or the text cannot
    /// be parsed.
    ///
    /// # Examples
    ///
    /// ```
    /// use xmlast::Document;
    ///
    /// let doc = Document::parse_bytes(b"\xEF\xBB\xBF<root/>").unwrap();
    /// let root = doc.root_element().unwrap();
    /// assert_eq!(doc.element_name(root), Some("root"));
    /// ```
    pub fn parse_bytes(input: &[u8]) -> Result<Self, ParseError> {
        let mut utf8 = crate::encoding::decode_to_utf8(input)
            .map_err(|e| ParseError::without_token(e.message, SourceLocation::default()))?;
        if crate::encoding::sniff_bom(input) == Some(("UTF-8", 3)) {
            utf8.insert(0, '\u{FEFF}');
        }
        Self::parse_str(&utf8)
    }

    // --- Navigation ---

    /// Returns the document node id.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the root element, if the document has one.
    #[must_use]
    pub fn root_element(&self) -> Option<NodeId> {
        match self.node(self.root).kind {
            NodeKind::Document { root_element, .. } => root_element,
            _ => None,
        }
    }

    /// Returns the prolog node, if the document has one.
    #[must_use]
    pub fn prolog(&self) -> Option<NodeId> {
        match self.node(self.root).kind {
            NodeKind::Document { prolog, .. } => prolog,
            _ => None,
        }
    }

    /// Returns a reference to the `NodeData` for the given node.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not refer to a node of this document.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.as_index()]
    }

    /// Returns the parent of a node.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Returns the byte span of a node.
    #[must_use]
    pub fn span(&self, id: NodeId) -> Span {
        self.node(id).span
    }

    /// Returns the element payload, or `None` for other node kinds.
    #[must_use]
    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.node(id).kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    /// Returns the attribute payload of an attribute or prolog attribute.
    #[must_use]
    pub fn attribute_data(&self, id: NodeId) -> Option<&AttributeData> {
        match &self.node(id).kind {
            NodeKind::Attribute(data) | NodeKind::PrologAttribute(data) => Some(data),
            _ => None,
        }
    }

    /// Returns the local name of an element. `None` for other kinds and for
    /// elements whose name was invalid.
    #[must_use]
    pub fn element_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).and_then(|e| e.name.as_deref())
    }

    /// Returns `prefix:name` (or just `name`) of an element.
    #[must_use]
    pub fn qualified_name(&self, id: NodeId) -> Option<String> {
        let element = self.element(id)?;
        let name = element.name.as_deref()?;
        Some(match element.prefix.as_deref() {
            Some(prefix) => format!("{prefix}:{name}"),
            None => name.to_string(),
        })
    }

    /// Returns the child elements of an element (empty for other kinds).
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.element(id).map_or(&[], |e| e.children.as_slice())
    }

    /// Returns the text runs of an element (empty for other kinds).
    #[must_use]
    pub fn texts(&self, id: NodeId) -> &[NodeId] {
        self.element(id).map_or(&[], |e| e.texts.as_slice())
    }

    /// Returns the attribute nodes of an element or the prolog.
    #[must_use]
    pub fn attributes(&self, id: NodeId) -> &[NodeId] {
        match &self.node(id).kind {
            NodeKind::Element(data) => &data.attributes,
            NodeKind::Prolog { attributes } => attributes,
            _ => &[],
        }
    }

    /// Returns the value of the first attribute called `key`.
    ///
    /// A bare attribute (`<input disabled>`) yields `Some("")`.
    #[must_use]
    pub fn attribute(&self, id: NodeId, key: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .filter_map(|&attr| self.attribute_data(attr))
            .find(|a| a.key == key)
            .map(|a| a.value.as_deref().unwrap_or(""))
    }

    /// Returns every attribute called `key`, duplicates included, in source
    /// order.
    pub fn attributes_named<'a, 'k>(
        &'a self,
        id: NodeId,
        key: &'k str,
    ) -> impl Iterator<Item = &'a AttributeData> + 'k
    where
        'a: 'k,
    {
        self.attributes(id)
            .iter()
            .filter_map(move |&attr| self.attribute_data(attr))
            .filter(move |a| a.key == key)
    }

    /// Returns the decoded text of a text run.
    #[must_use]
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Text { text } => text.as_deref(),
            _ => None,
        }
    }

    /// Returns the concatenated text of an element and its descendants, in
    /// source order. Comment and declaration blocks contribute nothing.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        let mut runs = Vec::new();
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            let Some(element) = self.element(current) else {
                continue;
            };
            if element.is_opaque() {
                continue;
            }
            runs.extend(element.texts.iter().copied());
            pending.extend(element.children.iter().copied());
        }
        runs.sort_by_key(|&run| self.span(run).start);
        runs.into_iter().filter_map(|run| self.text(run)).collect()
    }

    /// Returns an iterator over a node and its ancestors (walking up to the
    /// document node).
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: Some(id),
        }
    }

    /// Returns the total number of nodes in the arena (including the
    /// document node, excluding the placeholder).
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len() - 1
    }

    // --- Construction ---

    /// Allocates a new node in the arena and returns its `NodeId`.
    ///
    /// The node starts out detached; link it with [`Document::attach`],
    /// [`Document::set_root_element`] or [`Document::set_prolog`].
    pub fn create_node(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let index = self.nodes.len();
        self.nodes.push(NodeData::new(kind, span));
        NodeId::from_index(index)
    }

    /// Returns a mutable reference to the `NodeData` for the given node.
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.as_index()]
    }

    /// Returns the mutable element payload of `id`, if it is an element.
    pub(crate) fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.node_mut(id).kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    /// Sets the end offset of a node's span.
    pub(crate) fn set_end(&mut self, id: NodeId, end: usize) {
        self.node_mut(id).span.end = end;
    }

    /// Appends `child` to the list of `parent` that matches its kind and
    /// records `parent` as its owner.
    ///
    /// Elements go to `children`, text runs to `texts`, attributes to
    /// `attributes`; prolog attributes go to a prolog. Attaching an element
    /// or prolog to the document node sets the root element or prolog.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if `child` already has a parent or if
    /// `parent` cannot own a node of `child`'s kind.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(
            self.node(child).parent.is_none(),
            "child already has a parent; detach it first"
        );

        if parent == self.root {
            match self.node(child).kind {
                NodeKind::Element(_) => return self.set_root_element(Some(child)),
                NodeKind::Prolog { .. } => return self.set_prolog(Some(child)),
                _ => {}
            }
        }

        let slot = match self.node(child).kind {
            NodeKind::Element(_) => Some(Slot::Children),
            NodeKind::Text { .. } => Some(Slot::Texts),
            NodeKind::Attribute(_) => Some(Slot::Attributes),
            NodeKind::PrologAttribute(_) => Some(Slot::PrologAttributes),
            _ => None,
        };
        let list = match (&mut self.node_mut(parent).kind, slot) {
            (NodeKind::Element(data), Some(Slot::Children)) => Some(&mut data.children),
            (NodeKind::Element(data), Some(Slot::Texts)) => Some(&mut data.texts),
            (NodeKind::Element(data), Some(Slot::Attributes)) => Some(&mut data.attributes),
            (NodeKind::Prolog { attributes }, Some(Slot::PrologAttributes)) => Some(attributes),
            _ => None,
        };
        debug_assert!(list.is_some(), "node cannot own a child of this kind");
        let Some(list) = list else {
            return;
        };
        list.push(child);
        self.node_mut(child).parent = Some(parent);
    }

    /// Sets (or clears) the document's root element.
    ///
    /// The previous root element, if any, is detached from the document.
    pub fn set_root_element(&mut self, element: Option<NodeId>) {
        let root = self.root;
        let previous = match &mut self.node_mut(root).kind {
            NodeKind::Document { root_element, .. } => std::mem::replace(root_element, element),
            _ => None,
        };
        if let Some(previous) = previous.filter(|&p| Some(p) != element) {
            self.node_mut(previous).parent = None;
        }
        if let Some(element) = element {
            self.node_mut(element).parent = Some(root);
        }
    }

    /// Sets (or clears) the document's prolog.
    ///
    /// The previous prolog, if any, is detached from the document.
    pub fn set_prolog(&mut self, prolog: Option<NodeId>) {
        let root = self.root;
        let previous = match &mut self.node_mut(root).kind {
            NodeKind::Document {
                prolog: current, ..
            } => std::mem::replace(current, prolog),
            _ => None,
        };
        if let Some(previous) = previous.filter(|&p| Some(p) != prolog) {
            self.node_mut(previous).parent = None;
        }
        if let Some(prolog) = prolog {
            self.node_mut(prolog).parent = Some(root);
        }
    }

    /// Records the namespace declarations among an element's attributes.
    ///
    /// `xmlns="uri"` binds the default namespace ([`DEFAULT_NS`]) and
    /// `xmlns:p="uri"` binds `p`. A later declaration of the same prefix
    /// overrides an earlier one.
    pub(crate) fn bind_namespaces(&mut self, element: NodeId) {
        let bindings: Vec<(String, String)> = self
            .attributes(element)
            .iter()
            .filter_map(|&attr| self.attribute_data(attr))
            .filter_map(|attr| {
                let prefix = if attr.key == "xmlns" {
                    DEFAULT_NS
                } else {
                    attr.key.strip_prefix("xmlns:").filter(|p| !p.is_empty())?
                };
                Some((
                    prefix.to_string(),
                    attr.value.clone().unwrap_or_default(),
                ))
            })
            .collect();
        if let Some(data) = self.element_mut(element) {
            data.namespaces.extend(bindings);
        }
    }

    // --- Checks ---

    /// Verifies the ownership links of every attached node.
    ///
    /// Every node listed by a parent must point back at that parent, every
    /// node with a parent must be listed by it exactly once, and no span may
    /// end before it starts.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violation found.
    pub fn check_consistency(&self) -> Result<(), String> {
        for index in 1..self.nodes.len() {
            let id = NodeId::from_index(index);
            let data = self.node(id);

            if data.span.end < data.span.start {
                return Err(format!(
                    "{} #{index} ends at {} before it starts at {}",
                    data.kind.name(),
                    data.span.end,
                    data.span.start
                ));
            }

            for owned in self.owned(id) {
                if self.parent(owned) != Some(id) {
                    return Err(format!(
                        "{} #{} is owned by #{index} but points at {:?}",
                        self.node(owned).kind.name(),
                        owned.into_raw(),
                        self.parent(owned).map(NodeId::into_raw)
                    ));
                }
            }

            if let Some(parent) = data.parent {
                let listed = self.owned(parent).iter().filter(|&&o| o == id).count();
                if listed != 1 {
                    return Err(format!(
                        "{} #{index} points at #{} which lists it {listed} times",
                        data.kind.name(),
                        parent.into_raw()
                    ));
                }
            }
        }
        Ok(())
    }

    /// Verifies that every attached node lies inside its parent's span.
    ///
    /// # Errors
    ///
    /// Returns a description of the first node sticking out of its parent.
    pub fn check_spans(&self) -> Result<(), String> {
        for index in 1..self.nodes.len() {
            let id = NodeId::from_index(index);
            let Some(parent) = self.parent(id) else {
                continue;
            };
            let (outer, inner) = (self.span(parent), self.span(id));
            if !outer.contains(inner) {
                return Err(format!(
                    "{} #{index} at {}..{} is outside its parent #{} at {}..{}",
                    self.node(id).kind.name(),
                    inner.start,
                    inner.end,
                    parent.into_raw(),
                    outer.start,
                    outer.end
                ));
            }
        }
        Ok(())
    }

    /// All nodes `id` owns, in no particular order.
    fn owned(&self, id: NodeId) -> Vec<NodeId> {
        match &self.node(id).kind {
            NodeKind::Document {
                prolog,
                root_element,
            } => prolog.iter().chain(root_element.iter()).copied().collect(),
            NodeKind::Prolog { attributes } => attributes.clone(),
            NodeKind::Element(data) => data
                .attributes
                .iter()
                .chain(&data.children)
                .chain(&data.texts)
                .copied()
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// The payload list a child node is stored in.
#[derive(Clone, Copy)]
enum Slot {
    Children,
    Texts,
    Attributes,
    PrologAttributes,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over a node and its ancestors.
pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.node(current).parent;
        Some(current)
    }
}
