//! # xmlast
//!
//! A lenient markup parser that turns XML or HTML-flavored text into a
//! position-annotated abstract syntax tree.
//!
//! Two engines build the same tree shape:
//!
//! - [`parser`]: a single pass over the token stream, tolerant of unclosed
//!   and stray tags, with configurable self-closing and non-nesting tags.
//! - [`sax`]: an event driver plus an [`sax::AstBuilder`] handler that
//!   reports mismatched tags through a callback instead of failing.
//!
//! Character references are decoded with a compact trie in [`entities`].
//!
//! ## Quick Start
//!
//! ```
//! use xmlast::Document;
//!
//! let doc = Document::parse_str("<root><child>Hello &amp; bye</child></root>").unwrap();
//! let root = doc.root_element().unwrap();
//! assert_eq!(doc.element_name(root), Some("root"));
//! assert_eq!(doc.text_content(root), "Hello & bye");
//! ```

pub mod encoding;
pub mod entities;
pub mod error;
pub mod parser;
pub mod sax;
pub mod tokenizer;
pub mod tree;
pub mod util;

// Re-export primary types at the crate root for convenience.
pub use error::{EventError, ParseError};
pub use parser::{parse_str, ParseOptions};
pub use tree::{Document, NodeId, NodeKind, Span};
