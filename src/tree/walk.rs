//! Depth-first traversal of the element structure.
//!
//! [`walk`] visits the document node, its root element and every nested
//! element, calling [`Walker::enter`] before a node's children and
//! [`Walker::leave`] after them. Attributes and text runs are not visited;
//! reach them through the `Document` accessors.
//!
//! The traversal keeps its own stack, so deeply nested documents cannot
//! overflow the call stack.

use super::{Document, NodeId, NodeKind};

/// Callbacks for [`walk`]. Both default to doing nothing.
///
/// `index` is the node's position among its parent's child elements (0 for
/// the document node and the root element).
#[allow(unused_variables)]
pub trait Walker {
    /// Called before the children of `node` are visited.
    fn enter(&mut self, doc: &Document, node: NodeId, parent: Option<NodeId>, index: usize) {}

    /// Called after the children of `node` are visited.
    fn leave(&mut self, doc: &Document, node: NodeId, parent: Option<NodeId>, index: usize) {}
}

enum Step {
    Enter(NodeId, Option<NodeId>, usize),
    Leave(NodeId, Option<NodeId>, usize),
}

/// Walks the tree below `start` (a document or element node).
///
/// `start` itself is reported with no parent.
///
/// # Examples
///
/// ```
/// use xmlast::tree::walk::{walk, Walker};
/// use xmlast::{Document, NodeId};
///
/// struct Names(Vec<String>);
///
/// impl Walker for Names {
///     fn enter(&mut self, doc: &Document, node: NodeId, _: Option<NodeId>, _: usize) {
///         if let Some(name) = doc.element_name(node) {
///             self.0.push(name.to_string());
///         }
///     }
/// }
///
/// let doc = Document::parse_str("<a><b/><c><d/></c></a>").unwrap();
/// let mut names = Names(Vec::new());
/// walk(&doc, doc.root(), &mut names);
/// assert_eq!(names.0, ["a", "b", "c", "d"]);
/// ```
pub fn walk<W: Walker + ?Sized>(doc: &Document, start: NodeId, walker: &mut W) {
    let mut steps = vec![Step::Enter(start, None, 0)];

    while let Some(step) = steps.pop() {
        match step {
            Step::Enter(node, parent, index) => {
                walker.enter(doc, node, parent, index);
                steps.push(Step::Leave(node, parent, index));
                match &doc.node(node).kind {
                    NodeKind::Document {
                        root_element: Some(root),
                        ..
                    } => steps.push(Step::Enter(*root, Some(node), index)),
                    NodeKind::Element(data) => {
                        // Pushed in reverse so the first child is entered first.
                        for (i, &child) in data.children.iter().enumerate().rev() {
                            steps.push(Step::Enter(child, Some(node), i));
                        }
                    }
                    _ => {}
                }
            }
            Step::Leave(node, parent, index) => walker.leave(doc, node, parent, index),
        }
    }
}
