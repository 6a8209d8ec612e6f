//! The single-pass parser state machine.
//!
//! One `Parser` value carries all state of one parse: the token cursor, the
//! open-tag stack, root-level siblings and the text run being accumulated.
//! Nothing is shared between parses.

use std::borrow::Cow;
use std::mem;

use log::{debug, trace};

use crate::entities::decode_entities;
use crate::error::{ErrorSeverity, ParseDiagnostic, ParseError, SourceLocation};
use crate::tokenizer::{unquote, Token, TokenKind};
use crate::tree::{
    AttributeData, AttributeSyntax, Document, ElementData, NodeId, NodeKind, Span, SyntaxToken,
};
use crate::util::lines::LineIndex;
use crate::util::qname::split_qualified;

use super::ParseOptions;

/// An entry of the open-tag stack.
#[derive(Debug, Clone, Copy)]
struct OpenTag<'a> {
    id: NodeId,
    /// The raw tag name, used to match close tags.
    name: &'a str,
}

/// States of the open-tag attribute machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrState {
    BeforeAttr,
    InName,
    AfterName,
    AfterEqual,
    InValue,
}

/// An attribute parsed from a tag, not yet placed in the arena.
#[derive(Debug)]
struct PendingAttribute {
    data: AttributeData,
    span: Span,
}

/// Result of scanning the inside of an open tag.
struct TagBody<'a> {
    attributes: Vec<PendingAttribute>,
    /// The `OpenTagEnd` token, `None` when the input ran out first.
    end: Option<Token<'a>>,
}

pub(super) struct Parser<'a, 't> {
    input: &'a str,
    tokens: &'t [Token<'a>],
    options: &'t ParseOptions,
    index: usize,
    stack: Vec<OpenTag<'a>>,
    /// Nodes created while no tag was open, in source order.
    siblings: Vec<NodeId>,
    /// The text run literal tokens are currently appended to.
    text_run: Option<NodeId>,
    /// Built on the first error or diagnostic.
    lines: Option<LineIndex>,
    doc: Document,
}

impl<'a, 't> Parser<'a, 't> {
    pub(super) fn new(input: &'a str, tokens: &'t [Token<'a>], options: &'t ParseOptions) -> Self {
        Self {
            input,
            tokens,
            options,
            index: 0,
            stack: Vec::new(),
            siblings: Vec::new(),
            text_run: None,
            lines: None,
            doc: Document::new(),
        }
    }

    /// Clears all per-parse state.
    fn reset(&mut self) {
        self.index = 0;
        self.stack.clear();
        self.siblings.clear();
        self.text_run = None;
        self.lines = None;
        self.doc = Document::new();
    }

    /// Main parse entry point. Consumes every token once.
    pub(super) fn parse(&mut self) -> Result<Document, ParseError> {
        self.reset();
        let root = self.doc.root();
        self.doc.node_mut(root).span = Span::new(0, self.input.len());

        while let Some(token) = self.tokens.get(self.index).copied() {
            trace!(target: "xmlast.parser", "token {} {:?} @{}", token.kind, token.value, token.start);
            match token.kind {
                TokenKind::Literal => self.push_literal(token),
                TokenKind::OpenTag => {
                    self.close_text_run();
                    self.parse_open_tag(token)?;
                }
                TokenKind::CloseTag => {
                    self.close_text_run();
                    self.parse_close_tag(token);
                }
                _ => {
                    let tag = self.stack.last().map(|open| open.name);
                    return Err(self.unexpected(token, tag));
                }
            }
            self.index += 1;
        }

        self.close_text_run();
        while self.pop_open_tag().is_some() {}
        self.finish_root();
        Ok(mem::take(&mut self.doc))
    }

    // --- Attachment ---

    /// Attaches a new node at the current tree position.
    ///
    /// `raw_name` is the tag name of an element node, used for the
    /// non-nesting policy.
    fn push_node(&mut self, id: NodeId, raw_name: Option<&str>) {
        loop {
            let Some(top) = self.stack.last().copied() else {
                self.siblings.push(id);
                return;
            };
            if raw_name.is_some_and(|name| name == top.name && self.options.is_non_nesting(name))
            {
                debug!(target: "xmlast.parser", "<{}> implicitly closes an open <{}>", top.name, top.name);
                self.pop_open_tag();
                continue;
            }
            self.doc.attach(top.id, id);
            self.extend_open_tag(self.doc.span(id).end);
            return;
        }
    }

    /// Grows the innermost open tag so that its span reaches `end`.
    ///
    /// Only the top of the stack is kept current; outer tags catch up in
    /// [`Self::pop_open_tag`].
    fn extend_open_tag(&mut self, end: usize) {
        if let Some(top) = self.stack.last() {
            if self.doc.span(top.id).end < end {
                self.doc.set_end(top.id, end);
            }
        }
    }

    /// Pops the innermost open tag, carrying its end to the new top.
    fn pop_open_tag(&mut self) -> Option<OpenTag<'a>> {
        let popped = self.stack.pop()?;
        self.extend_open_tag(self.doc.span(popped.id).end);
        Some(popped)
    }

    // --- Text ---

    fn push_literal(&mut self, token: Token<'a>) {
        if let Some(run) = self.text_run {
            if let NodeKind::Text { text: Some(text) } = &mut self.doc.node_mut(run).kind {
                text.push_str(token.value);
            }
            self.doc.set_end(run, token.end);
            self.extend_open_tag(token.end);
        } else {
            let run = self.doc.create_node(
                NodeKind::Text {
                    text: Some(token.value.to_string()),
                },
                Span::new(token.start, token.end),
            );
            self.push_node(run, None);
            self.text_run = Some(run);
        }
    }

    /// Finishes the open text run, decoding its references.
    fn close_text_run(&mut self) {
        let Some(run) = self.text_run.take() else {
            return;
        };
        if !self.options.decode_entities {
            return;
        }
        if let NodeKind::Text { text: Some(text) } = &mut self.doc.node_mut(run).kind {
            decode_in_place(text);
        }
    }

    // --- Tags ---

    fn parse_open_tag(&mut self, token: Token<'a>) -> Result<(), ParseError> {
        let name = token.value;
        let start = token.start.saturating_sub(1);

        if name.starts_with('?') {
            return self.parse_instruction(token, start);
        }
        if matches!(name, "" | "!" | "!--") {
            self.parse_opaque(token, start);
            return Ok(());
        }

        let (prefix, local) = match split_qualified(name) {
            Some((prefix, local)) => (prefix, Some(local)),
            None => {
                debug!(target: "xmlast.parser", "invalid element name {name:?} at {start}");
                (None, None)
            }
        };
        let id = self.doc.create_node(
            NodeKind::Element(ElementData::new(prefix, local)),
            Span::new(start, token.end),
        );
        self.push_node(id, Some(name));

        let body = self.parse_tag_body(name)?;
        for pending in body.attributes {
            let attr = self
                .doc
                .create_node(NodeKind::Attribute(pending.data), pending.span);
            self.doc.attach(id, attr);
        }
        self.doc.bind_namespaces(id);

        let Some(end) = body.end else {
            debug!(target: "xmlast.parser", "input ended inside <{name}>");
            let end = self.input.len();
            self.doc.set_end(id, end);
            self.extend_open_tag(end);
            return Ok(());
        };
        let tag_end = end.end + 1;
        self.doc.set_end(id, tag_end);
        self.extend_open_tag(tag_end);
        if end.value.is_empty() && !self.options.is_self_closing(name) {
            self.stack.push(OpenTag { id, name });
        }
        Ok(())
    }

    /// Parses a comment, declaration or empty tag: everything up to the tag
    /// end becomes one raw text run.
    fn parse_opaque(&mut self, token: Token<'a>, start: usize) {
        let name = token.value;
        let id = self.doc.create_node(
            NodeKind::Element(ElementData::new(None, Some(name))),
            Span::new(start, token.end),
        );
        self.push_node(id, Some(name));

        let mut last = None;
        let mut run: Option<NodeId> = None;
        while let Some(next) = self.tokens.get(self.index + 1).copied() {
            self.index += 1;
            last = Some(next);
            if next.kind == TokenKind::OpenTagEnd {
                break;
            }
            match run {
                Some(run) => {
                    if let NodeKind::Text { text: Some(text) } = &mut self.doc.node_mut(run).kind {
                        text.push_str(next.value);
                    }
                    self.doc.set_end(run, next.end);
                }
                None => {
                    let text = self.doc.create_node(
                        NodeKind::Text {
                            text: Some(next.value.to_string()),
                        },
                        Span::new(next.start, next.end),
                    );
                    self.doc.attach(id, text);
                    run = Some(text);
                }
            }
        }

        if let Some(last) = last {
            let end = (last.end + 1).min(self.input.len());
            self.doc.set_end(id, end);
            self.extend_open_tag(end);
        }
    }

    /// Parses a processing instruction. `<?xml ...?>` yields the prolog;
    /// any other instruction is skipped.
    fn parse_instruction(&mut self, token: Token<'a>, start: usize) -> Result<(), ParseError> {
        let body = self.parse_tag_body(token.value)?;

        if token.value != "?xml" {
            debug!(target: "xmlast.parser", "skipping processing instruction <{}>", token.value);
            return Ok(());
        }
        if self.doc.prolog().is_some() {
            debug!(target: "xmlast.parser", "ignoring repeated XML declaration at {start}");
            return Ok(());
        }

        let mut version = None;
        let mut encoding = None;
        for pending in body.attributes {
            match pending.data.key.as_str() {
                "version" if version.is_none() => version = Some(pending),
                "encoding" if encoding.is_none() => encoding = Some(pending),
                _ => {}
            }
        }
        if version.is_none() && encoding.is_none() {
            return Ok(());
        }

        let end = body
            .end
            .map_or(self.input.len(), |end| (end.end + 1).min(self.input.len()));
        let prolog = self.doc.create_node(
            NodeKind::Prolog {
                attributes: Vec::new(),
            },
            Span::new(start, end),
        );
        for pending in [version, encoding].into_iter().flatten() {
            let attr = self
                .doc
                .create_node(NodeKind::PrologAttribute(pending.data), pending.span);
            self.doc.attach(prolog, attr);
        }
        self.doc.set_prolog(Some(prolog));
        Ok(())
    }

    /// Runs the attribute state machine up to the tag end.
    ///
    /// `tag` is the raw name of the tag, for error messages.
    fn parse_tag_body(&mut self, tag: &str) -> Result<TagBody<'a>, ParseError> {
        let mut state = AttrState::BeforeAttr;
        let mut attributes: Vec<PendingAttribute> = Vec::new();

        while let Some(token) = self.tokens.get(self.index + 1).copied() {
            self.index += 1;
            if token.kind == TokenKind::OpenTagEnd {
                self.finish_attributes(&mut attributes);
                return Ok(TagBody {
                    attributes,
                    end: Some(token),
                });
            }
            let whitespace = token.kind == TokenKind::Whitespace;
            let equals = token.kind == TokenKind::AttrValueEq;

            state = match state {
                AttrState::BeforeAttr if whitespace => AttrState::BeforeAttr,
                AttrState::BeforeAttr => {
                    attributes.push(start_attribute(token));
                    AttrState::InName
                }
                AttrState::InName if whitespace => AttrState::AfterName,
                AttrState::InName if equals => AttrState::AfterEqual,
                AttrState::InName => return Err(self.unexpected(token, Some(tag))),
                AttrState::AfterName if whitespace => AttrState::AfterName,
                AttrState::AfterName if equals => AttrState::AfterEqual,
                AttrState::AfterName => {
                    attributes.push(start_attribute(token));
                    AttrState::InName
                }
                AttrState::AfterEqual if whitespace => AttrState::AfterEqual,
                AttrState::AfterEqual => {
                    if let Some(attr) = attributes.last_mut() {
                        set_value(attr, token);
                    }
                    if token.kind == TokenKind::AttrValueNq {
                        AttrState::InValue
                    } else {
                        AttrState::BeforeAttr
                    }
                }
                AttrState::InValue if whitespace => AttrState::BeforeAttr,
                AttrState::InValue => {
                    if let Some(attr) = attributes.last_mut() {
                        append_value(attr, token);
                    }
                    AttrState::InValue
                }
            };
        }

        self.finish_attributes(&mut attributes);
        Ok(TagBody {
            attributes,
            end: None,
        })
    }

    fn finish_attributes(&self, attributes: &mut [PendingAttribute]) {
        if !self.options.decode_entities {
            return;
        }
        for attr in attributes {
            if let Some(value) = attr.data.value.as_mut() {
                decode_in_place(value);
            }
        }
    }

    fn parse_close_tag(&mut self, token: Token<'a>) {
        let name = token.value.trim();
        let Some(position) = self.stack.iter().rposition(|open| open.name == name) else {
            debug!(target: "xmlast.parser", "ignoring unmatched close tag </{name}> at {}", token.start);
            return;
        };

        for abandoned in &self.stack[position + 1..] {
            debug!(target: "xmlast.parser", "</{name}> abandons open <{}>", abandoned.name);
        }
        while self.stack.len() > position + 1 {
            self.pop_open_tag();
        }
        let end = (token.end + 1).min(self.input.len());
        self.extend_open_tag(end);
        self.pop_open_tag();
    }

    // --- Finishing ---

    /// Picks the root element among the root-level siblings and reports
    /// everything else that carries content.
    fn finish_root(&mut self) {
        let siblings = mem::take(&mut self.siblings);
        let mut root = None;

        for id in siblings {
            let message = match &self.doc.node(id).kind {
                NodeKind::Element(data) if data.is_opaque() => continue,
                NodeKind::Element(_) if root.is_none() => {
                    root = Some(id);
                    continue;
                }
                NodeKind::Element(_) => "element outside the root element",
                NodeKind::Text { text } => {
                    let blank = text
                        .as_deref()
                        .map_or(true, |t| t.trim_start_matches('\u{FEFF}').trim().is_empty());
                    if blank {
                        continue;
                    }
                    "text outside the root element"
                }
                _ => continue,
            };
            let start = self.doc.span(id).start;
            debug!(target: "xmlast.parser", "{message} at {start}");
            let location = self.location(start);
            self.doc.diagnostics.push(ParseDiagnostic {
                severity: ErrorSeverity::Warning,
                message: message.to_string(),
                location,
            });
        }

        self.doc.set_root_element(root);
    }

    // --- Errors ---

    fn location(&mut self, offset: usize) -> SourceLocation {
        let input = self.input;
        self.lines
            .get_or_insert_with(|| LineIndex::new(input))
            .location(input, offset)
    }

    fn unexpected(&mut self, token: Token<'a>, tag: Option<&str>) -> ParseError {
        let mut message = format!("unexpected token \"{}\" ({})", token.value, token.kind);
        if let Some(tag) = tag {
            message.push_str(&format!(" when parsing tag \"{tag}\""));
        }
        ParseError {
            message,
            location: self.location(token.start),
            token: Some(token.value.to_string()),
            token_kind: Some(token.kind),
            open_tag: tag.map(str::to_string),
            diagnostics: mem::take(&mut self.doc.diagnostics),
        }
    }
}

fn start_attribute(token: Token<'_>) -> PendingAttribute {
    let span = Span::new(token.start, token.end);
    PendingAttribute {
        data: AttributeData {
            key: token.value.to_string(),
            value: None,
            syntax: AttributeSyntax {
                key: Some(SyntaxToken {
                    image: token.value.to_string(),
                    span,
                }),
                value: None,
            },
        },
        span,
    }
}

fn set_value(attr: &mut PendingAttribute, token: Token<'_>) {
    let value = if token.kind == TokenKind::AttrValueQuoted {
        unquote(token.value)
    } else {
        token.value
    };
    attr.data.value = Some(value.to_string());
    attr.data.syntax.value = Some(SyntaxToken {
        image: token.value.to_string(),
        span: Span::new(token.start, token.end),
    });
    attr.span.end = token.end;
}

fn append_value(attr: &mut PendingAttribute, token: Token<'_>) {
    if let Some(value) = attr.data.value.as_mut() {
        value.push_str(token.value);
    }
    if let Some(syntax) = attr.data.syntax.value.as_mut() {
        syntax.image.push_str(token.value);
        syntax.span.end = token.end;
    }
    attr.span.end = token.end;
}

/// Replaces `text` with its decoded form when it contains references.
fn decode_in_place(text: &mut String) {
    let decoded = match decode_entities(text) {
        Cow::Owned(decoded) => decoded,
        Cow::Borrowed(_) => return,
    };
    *text = decoded;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::{parse_str, parse_str_with_options, parse_tokens};
    use super::*;
    use crate::tokenizer::tokenize;
    use pretty_assertions::assert_eq;

    fn names(doc: &Document, ids: &[NodeId]) -> Vec<String> {
        ids.iter()
            .map(|&id| doc.qualified_name(id).unwrap_or_else(|| "#invalid".to_string()))
            .collect()
    }

    fn texts(doc: &Document, id: NodeId) -> Vec<&str> {
        doc.texts(id).iter().filter_map(|&t| doc.text(t)).collect()
    }

    #[test]
    fn test_simple_tree() {
        let doc = parse_str("<a><b>x</b><c/></a>").unwrap();
        let a = doc.root_element().unwrap();
        assert_eq!(doc.element_name(a), Some("a"));
        assert_eq!(names(&doc, doc.children(a)), vec!["b", "c"]);
        assert_eq!(texts(&doc, doc.children(a)[0]), vec!["x"]);
        assert!(doc.check_consistency().is_ok());
        assert!(doc.check_spans().is_ok());
    }

    #[test]
    fn test_spans() {
        let input = "<a x=\"1\">hi<b/></a>";
        let doc = parse_str(input).unwrap();
        let a = doc.root_element().unwrap();
        assert_eq!(doc.span(doc.root()), Span::new(0, input.len()));
        assert_eq!(doc.span(a), Span::new(0, input.len()));

        let b = doc.children(a)[0];
        assert_eq!(&input[doc.span(b).start..doc.span(b).end], "<b/>");

        let text = doc.texts(a)[0];
        assert_eq!(doc.span(text), Span::new(9, 11));

        let x = doc.attributes(a)[0];
        assert_eq!(doc.span(x), Span::new(3, 8));
        let syntax = &doc.attribute_data(x).unwrap().syntax;
        assert_eq!(syntax.key.as_ref().unwrap().image, "x");
        assert_eq!(syntax.value.as_ref().unwrap().image, "\"1\"");
        assert_eq!(syntax.value.as_ref().unwrap().span, Span::new(5, 8));
    }

    #[test]
    fn test_attribute_forms() {
        let doc = parse_str("<a x='1' y=2 z w = \"4\" x=\"dup\">").unwrap();
        let a = doc.root_element().unwrap();
        let pairs: Vec<_> = doc
            .attributes(a)
            .iter()
            .map(|&id| {
                let data = doc.attribute_data(id).unwrap();
                (data.key.as_str(), data.value.as_deref())
            })
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("x", Some("1")),
                ("y", Some("2")),
                ("z", None),
                ("w", Some("4")),
                ("x", Some("dup")),
            ]
        );
        assert_eq!(doc.attribute(a, "x"), Some("1"));
    }

    #[test]
    fn test_unquoted_value_accumulates_fragments() {
        let doc = parse_str("<a href=x\"y\"z>").unwrap();
        let a = doc.root_element().unwrap();
        let href = doc.attribute_data(doc.attributes(a)[0]).unwrap();
        assert_eq!(href.value.as_deref(), Some("x\"y\"z"));
        assert_eq!(href.syntax.value.as_ref().unwrap().image, "x\"y\"z");
    }

    #[test]
    fn test_attribute_values_are_decoded() {
        let doc = parse_str("<a t=\"&lt;&#65;&amp;\">").unwrap();
        let a = doc.root_element().unwrap();
        let t = doc.attribute_data(doc.attributes(a)[0]).unwrap();
        assert_eq!(t.value.as_deref(), Some("<A&"));
        assert_eq!(t.syntax.value.as_ref().unwrap().image, "\"&lt;&#65;&amp;\"");
    }

    #[test]
    fn test_decoding_can_be_disabled() {
        let opts = ParseOptions::default().decode_entities(false);
        let doc = parse_str_with_options("<a t=\"&lt;\">&amp;</a>", &opts).unwrap();
        let a = doc.root_element().unwrap();
        assert_eq!(doc.attribute(a, "t"), Some("&lt;"));
        assert_eq!(texts(&doc, a), vec!["&amp;"]);
    }

    #[test]
    fn test_text_is_decoded() {
        let doc = parse_str("<a>1 &lt; 2 &amp;&amp; 3 &gt; 2</a>").unwrap();
        let a = doc.root_element().unwrap();
        assert_eq!(texts(&doc, a), vec!["1 < 2 && 3 > 2"]);
    }

    #[test]
    fn test_text_runs_split_by_elements() {
        let doc = parse_str("<a>x<b/>y</a>").unwrap();
        let a = doc.root_element().unwrap();
        assert_eq!(texts(&doc, a), vec!["x", "y"]);
    }

    #[test]
    fn test_stray_quote_after_name_is_fatal() {
        let err = parse_str("<root>\n  <a x\"1\"></a>\n</root>").unwrap_err();
        assert_eq!(
            err.message,
            "unexpected token \"\"1\"\" (AttrValueQuoted) when parsing tag \"a\""
        );
        assert_eq!((err.location.line, err.location.column), (2, 7));
        assert_eq!(err.token.as_deref(), Some("\"1\""));
        assert_eq!(err.token_kind, Some(TokenKind::AttrValueQuoted));
        assert_eq!(err.open_tag.as_deref(), Some("a"));
        assert_eq!(err.to_string(), format!("parse error at 2:7: {}", err.message));
    }

    #[test]
    fn test_unexpected_token_at_document_level() {
        let input = "<a>";
        let mut tokens = tokenize(input);
        tokens.push(Token {
            kind: TokenKind::Whitespace,
            start: 3,
            end: 3,
            value: "",
        });
        let err = parse_tokens(input, &tokens, &ParseOptions::default()).unwrap_err();
        assert!(err.message.starts_with("unexpected token \"\" (Whitespace)"));
        assert_eq!(err.open_tag.as_deref(), Some("a"));
    }

    #[test]
    fn test_self_closing_by_policy() {
        let doc = parse_str("<div><br><span>x</span></div>").unwrap();
        let div = doc.root_element().unwrap();
        assert_eq!(names(&doc, doc.children(div)), vec!["br", "span"]);
        let br = doc.children(div)[0];
        assert!(doc.children(br).is_empty());
        assert!(doc.texts(br).is_empty());
    }

    #[test]
    fn test_self_closing_policy_off_for_xml() {
        let doc = parse_str_with_options("<div><br><span/></br></div>", &ParseOptions::xml())
            .unwrap();
        let div = doc.root_element().unwrap();
        let br = doc.children(div)[0];
        assert_eq!(names(&doc, doc.children(br)), vec!["span"]);
    }

    #[test]
    fn test_non_nesting_pops_several_levels() {
        let doc = parse_str("<ul><li>a<li>b<li>c</ul>").unwrap();
        let ul = doc.root_element().unwrap();
        assert_eq!(names(&doc, doc.children(ul)), vec!["li", "li", "li"]);
        for (i, expected) in ["a", "b", "c"].into_iter().enumerate() {
            assert_eq!(texts(&doc, doc.children(ul)[i]), vec![expected]);
        }
        assert!(doc.check_spans().is_ok());
    }

    #[test]
    fn test_close_tag_abandons_inner_tags() {
        let doc = parse_str("<a><b><c>x</a><d/>").unwrap();
        let a = doc.root_element().unwrap();
        let b = doc.children(a)[0];
        let c = doc.children(b)[0];
        assert_eq!(texts(&doc, c), vec!["x"]);
        assert_eq!(doc.span(a), Span::new(0, 14));
        // <d/> comes after </a> and is root-level content.
        assert_eq!(doc.diagnostics.len(), 1);
        assert_eq!(doc.diagnostics[0].message, "element outside the root element");
        assert!(doc.check_spans().is_ok());
    }

    #[test]
    fn test_close_tag_name_is_trimmed() {
        let doc = parse_str("<a><b></b ></a>").unwrap();
        let a = doc.root_element().unwrap();
        assert_eq!(doc.span(doc.children(a)[0]), Span::new(3, 11));
    }

    #[test]
    fn test_unclosed_tags_still_contain_children() {
        let doc = parse_str("<a><b>text").unwrap();
        let a = doc.root_element().unwrap();
        let b = doc.children(a)[0];
        assert_eq!(doc.span(b).end, 10);
        assert_eq!(doc.span(a).end, 10);
        assert!(doc.check_spans().is_ok());
    }

    #[test]
    fn test_outer_tags_catch_up_when_inner_tags_close() {
        let doc = parse_str("<a><b><c>xyz</c></b>tail").unwrap();
        let a = doc.root_element().unwrap();
        let b = doc.children(a)[0];
        let c = doc.children(b)[0];
        assert_eq!(doc.span(c), Span::new(6, 16));
        assert_eq!(doc.span(b), Span::new(3, 20));
        assert_eq!(doc.span(a), Span::new(0, 24));

        let doc = parse_str("<a><b><c>x</a>").unwrap();
        let a = doc.root_element().unwrap();
        assert_eq!(doc.span(a), Span::new(0, 14));
        let c = doc.children(doc.children(a)[0])[0];
        assert_eq!(doc.span(c), Span::new(6, 10));
        assert!(doc.check_spans().is_ok());
    }

    #[test]
    fn test_unclosed_nesting_reaches_end_of_input() {
        let input = format!("{}leaf", "<d>".repeat(50_000));
        let doc = parse_str(&input).unwrap();
        let mut id = doc.root_element().unwrap();
        loop {
            assert_eq!(doc.span(id).end, input.len());
            match doc.children(id).first() {
                Some(&child) => id = child,
                None => break,
            }
        }
        assert!(doc.check_spans().is_ok());
    }

    #[test]
    fn test_comment_and_doctype_blocks() {
        let input = "<!DOCTYPE html><html><!-- a < b --><body/></html>";
        let doc = parse_str(input).unwrap();
        let html = doc.root_element().unwrap();
        assert_eq!(doc.element_name(html), Some("html"));

        let comment = doc.children(html)[0];
        assert!(doc.element(comment).unwrap().is_opaque());
        assert_eq!(doc.element_name(comment), Some("!--"));
        assert_eq!(texts(&doc, comment), vec![" a < b "]);
        assert_eq!(&input[doc.span(comment).start..doc.span(comment).end], "<!-- a < b -->");
        assert_eq!(names(&doc, doc.children(html)), vec!["!--", "body"]);
        assert!(doc.diagnostics.is_empty());
        assert!(doc.check_spans().is_ok());
    }

    #[test]
    fn test_comment_text_is_not_decoded() {
        let doc = parse_str("<a><!--&amp;--></a>").unwrap();
        let comment = doc.children(doc.root_element().unwrap())[0];
        assert_eq!(texts(&doc, comment), vec!["&amp;"]);
    }

    #[test]
    fn test_unterminated_comment_runs_to_end() {
        let input = "<a><!-- open";
        let doc = parse_str(input).unwrap();
        let comment = doc.children(doc.root_element().unwrap())[0];
        assert_eq!(doc.span(comment).end, input.len());
        assert!(doc.check_spans().is_ok());
    }

    #[test]
    fn test_empty_tag_block() {
        let doc = parse_str("<a><></a>").unwrap();
        let a = doc.root_element().unwrap();
        let empty = doc.children(a)[0];
        assert_eq!(doc.element_name(empty), Some(""));
        assert_eq!(doc.span(empty), Span::new(3, 5));
    }

    #[test]
    fn test_prolog() {
        let input = "<?xml version=\"1.0\" standalone='yes' encoding='UTF-8'?>\n<root/>";
        let doc = parse_str(input).unwrap();
        let prolog = doc.prolog().unwrap();
        assert_eq!(doc.parent(prolog), Some(doc.root()));
        assert_eq!(doc.span(prolog), Span::new(0, 55));
        let keys: Vec<_> = doc
            .attributes(prolog)
            .iter()
            .map(|&id| {
                let data = doc.attribute_data(id).unwrap();
                (data.key.as_str(), data.value.as_deref())
            })
            .collect();
        assert_eq!(keys, vec![("version", Some("1.0")), ("encoding", Some("UTF-8"))]);
        assert_eq!(doc.element_name(doc.root_element().unwrap()), Some("root"));
        assert!(doc.diagnostics.is_empty());
        assert!(doc.check_consistency().is_ok());
    }

    #[test]
    fn test_prolog_order_is_fixed() {
        let doc = parse_str("<?xml encoding=\"UTF-16\" version=\"1.1\"?><r/>").unwrap();
        let keys: Vec<_> = doc
            .attributes(doc.prolog().unwrap())
            .iter()
            .map(|&id| doc.attribute_data(id).unwrap().key.clone())
            .collect();
        assert_eq!(keys, vec!["version", "encoding"]);
    }

    #[test]
    fn test_other_instructions_are_skipped() {
        let doc = parse_str("<?xml-stylesheet href=\"a.css\"?><?xml foo=\"x\"?><r/>").unwrap();
        assert_eq!(doc.prolog(), None);
        assert_eq!(doc.element_name(doc.root_element().unwrap()), Some("r"));
        assert!(doc.diagnostics.is_empty());
    }

    #[test]
    fn test_namespaces_and_prefixes() {
        let doc =
            parse_str("<svg:svg xmlns=\"urn:d\" xmlns:svg=\"urn:svg\"><svg:rect/></svg:svg>")
                .unwrap();
        let svg = doc.root_element().unwrap();
        let data = doc.element(svg).unwrap();
        assert_eq!(data.prefix.as_deref(), Some("svg"));
        assert_eq!(data.name.as_deref(), Some("svg"));
        assert_eq!(
            data.namespaces.get(crate::tree::DEFAULT_NS).map(String::as_str),
            Some("urn:d")
        );
        assert_eq!(data.namespaces.get("svg").map(String::as_str), Some("urn:svg"));
        assert_eq!(names(&doc, doc.children(svg)), vec!["svg:rect"]);
    }

    #[test]
    fn test_invalid_element_name() {
        let doc = parse_str("<a:b:c>x</a:b:c>").unwrap();
        let root = doc.root_element().unwrap();
        assert_eq!(doc.element_name(root), None);
        assert_eq!(doc.span(root), Span::new(0, 16));
    }

    #[test]
    fn test_empty_prefix_or_local_name() {
        let input = "<:a><b:/></:a>";
        let doc = parse_str(input).unwrap();
        let root = doc.root_element().unwrap();
        let data = doc.element(root).unwrap();
        assert_eq!((data.prefix.as_deref(), data.name.as_deref()), (Some(""), Some("a")));
        assert_eq!(doc.span(root), Span::new(0, input.len()));

        let b = doc.element(doc.children(root)[0]).unwrap();
        assert_eq!((b.prefix.as_deref(), b.name.as_deref()), (Some("b"), Some("")));
        assert!(doc.diagnostics.is_empty());
    }

    #[test]
    fn test_root_level_leftovers_are_reported() {
        let doc = parse_str("lead<a/>  <b/>tail").unwrap();
        assert_eq!(doc.element_name(doc.root_element().unwrap()), Some("a"));
        let messages: Vec<_> = doc.diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "text outside the root element",
                "element outside the root element",
                "text outside the root element",
            ]
        );
        assert!(doc
            .diagnostics
            .iter()
            .all(|d| d.severity == ErrorSeverity::Warning));
        assert_eq!(doc.diagnostics[1].location.column, 11);
    }

    #[test]
    fn test_empty_input() {
        let doc = parse_str("").unwrap();
        assert_eq!(doc.root_element(), None);
        assert_eq!(doc.node_count(), 1);
    }

    #[test]
    fn test_text_only_input() {
        let doc = parse_str("just text").unwrap();
        assert_eq!(doc.root_element(), None);
        assert_eq!(doc.diagnostics.len(), 1);
    }

    #[test]
    fn test_unterminated_open_tag() {
        let doc = parse_str("<a><b x=\"1\"").unwrap();
        let a = doc.root_element().unwrap();
        let b = doc.children(a)[0];
        assert_eq!(doc.attribute(b, "x"), Some("1"));
        assert!(doc.children(b).is_empty());
        assert!(doc.check_consistency().is_ok());
    }

    #[test]
    fn test_parser_is_reusable() {
        let tokens = tokenize("<a><b/></a>");
        let options = ParseOptions::default();
        let mut parser = Parser::new("<a><b/></a>", &tokens, &options);
        let first = parser.parse().unwrap();
        let second = parser.parse().unwrap();
        assert_eq!(first.node_count(), second.node_count());
        assert_eq!(second.node_count(), 3);
    }
}
