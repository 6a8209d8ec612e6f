//! Markup tokenizer.
//!
//! Both parsing engines consume an ordered, finite sequence of [`Token`]s.
//! Any [`TokenSource`] honoring the conventions below can feed them; the
//! crate ships [`Tokenizer`] as the default source.
//!
//! # Token conventions
//!
//! Offsets are byte offsets into the input, `end` exclusive, and `value` is
//! the exact slice `input[start..end]` except where noted.
//!
//! | Kind | Covers |
//! | --- | --- |
//! | `Literal` | character data between tags, or the body of a comment / declaration |
//! | `OpenTag` | the tag name after `<` (`"!--"`, `"!"`, `"?xml"` and `""` included) |
//! | `OpenTagEnd` | what precedes the closing `>`: `""`, `"/"`, `"?"` or `"--"`; `end` is the offset of `>` |
//! | `CloseTag` | the text between `</` and `>`; `end` is the offset of `>` |
//! | `Whitespace` | a whitespace run inside a tag |
//! | `AttrValueEq` | a `=` inside a tag |
//! | `AttrValueNq` | an unquoted run inside a tag (attribute names included) |
//! | `AttrValueQuoted` | a quoted value, quotes included |
//!
//! A tag cut off by the end of input simply has no `OpenTagEnd`.

use std::fmt;

use memchr::{memchr, memchr2, memmem};

/// Kind of a lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Character data.
    Literal,
    /// Start of a tag; the value is the raw tag name.
    OpenTag,
    /// End of an open tag.
    OpenTagEnd,
    /// A whole close tag; the value is its (untrimmed) name.
    CloseTag,
    /// Whitespace between attributes.
    Whitespace,
    /// The `=` between an attribute name and its value.
    AttrValueEq,
    /// Unquoted text inside a tag.
    AttrValueNq,
    /// A single- or double-quoted attribute value.
    AttrValueQuoted,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Literal => "Literal",
            Self::OpenTag => "OpenTag",
            Self::OpenTagEnd => "OpenTagEnd",
            Self::CloseTag => "CloseTag",
            Self::Whitespace => "Whitespace",
            Self::AttrValueEq => "AttrValueEq",
            Self::AttrValueNq => "AttrValueNq",
            Self::AttrValueQuoted => "AttrValueQuoted",
        };
        f.write_str(name)
    }
}

/// A classified, positioned lexical unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// What kind of token this is.
    pub kind: TokenKind,
    /// Byte offset of the first byte.
    pub start: usize,
    /// Byte offset one past the last byte.
    pub end: usize,
    /// Literal text of the token.
    pub value: &'a str,
}

/// Anything that can turn text into a token sequence.
pub trait TokenSource {
    /// Tokenizes the whole input.
    fn tokenize<'a>(&self, input: &'a str) -> Vec<Token<'a>>;
}

/// The default lenient tokenizer.
///
/// Never fails: a `<` that cannot start a tag is kept as character data, and
/// unterminated constructs run to the end of input.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tokenizer;

impl TokenSource for Tokenizer {
    fn tokenize<'a>(&self, input: &'a str) -> Vec<Token<'a>> {
        Scanner::new(input).run()
    }
}

/// Tokenizes `input` with the default [`Tokenizer`].
///
/// # Examples
///
/// ```
/// use xmlast::tokenizer::{tokenize, TokenKind};
///
/// let tokens = tokenize("<a>x</a>");
/// let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
/// assert_eq!(
///     kinds,
///     [TokenKind::OpenTag, TokenKind::OpenTagEnd, TokenKind::Literal, TokenKind::CloseTag]
/// );
/// ```
#[must_use]
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    Tokenizer.tokenize(input)
}

/// Strips the quotes of an `AttrValueQuoted` value. A value cut off by the
/// end of input only loses its opening quote; other text is returned as is.
///
/// # Examples
///
/// ```
/// use xmlast::tokenizer::unquote;
///
/// assert_eq!(unquote("\"a b\""), "a b");
/// assert_eq!(unquote("'x"), "x");
/// assert_eq!(unquote("plain"), "plain");
/// ```
#[must_use]
pub fn unquote(raw: &str) -> &str {
    match raw.chars().next() {
        Some(quote @ ('"' | '\'')) => {
            let inner = &raw[1..];
            inner.strip_suffix(quote).unwrap_or(inner)
        }
        _ => raw,
    }
}

/// How a `<` starts a construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagStart {
    Open,
    Close,
    Comment,
    Declaration,
    Instruction,
    Empty,
}

struct Scanner<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    tokens: Vec<Token<'a>>,
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0C)
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b':' || b >= 0x80
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            tokens: Vec::with_capacity(input.len() / 4 + 1),
        }
    }

    fn run(mut self) -> Vec<Token<'a>> {
        let mut text_start = 0;
        while let Some(offset) = memchr(b'<', &self.bytes[self.pos..]) {
            let lt = self.pos + offset;
            let Some(start) = self.classify(lt) else {
                self.pos = lt + 1;
                continue;
            };
            self.push(TokenKind::Literal, text_start, lt);
            match start {
                TagStart::Open => self.scan_open_tag(lt, false),
                TagStart::Instruction => self.scan_open_tag(lt, true),
                TagStart::Close => self.scan_close_tag(lt),
                TagStart::Comment => self.scan_comment(lt),
                TagStart::Declaration => self.scan_declaration(lt),
                TagStart::Empty => {
                    self.push(TokenKind::OpenTag, lt + 1, lt + 1);
                    self.push_tag_end(lt + 1, lt + 1);
                    self.pos = lt + 2;
                }
            }
            text_start = self.pos;
        }
        self.push(TokenKind::Literal, text_start, self.bytes.len());
        self.tokens
    }

    fn classify(&self, lt: usize) -> Option<TagStart> {
        let next = *self.bytes.get(lt + 1)?;
        match next {
            b'/' => self
                .bytes
                .get(lt + 2)
                .is_some_and(|&b| is_name_start(b))
                .then_some(TagStart::Close),
            b'!' if self.bytes[lt..].starts_with(b"<!--") => Some(TagStart::Comment),
            b'!' => Some(TagStart::Declaration),
            b'?' => Some(TagStart::Instruction),
            b'>' => Some(TagStart::Empty),
            b if is_name_start(b) => Some(TagStart::Open),
            _ => None,
        }
    }

    /// Pushes a token unless it would be an empty literal.
    fn push(&mut self, kind: TokenKind, start: usize, end: usize) {
        if kind == TokenKind::Literal && start >= end {
            return;
        }
        self.tokens.push(Token {
            kind,
            start,
            end,
            value: &self.input[start..end],
        });
    }

    fn push_tag_end(&mut self, start: usize, gt: usize) {
        self.push(TokenKind::OpenTagEnd, start, gt);
    }

    fn scan_open_tag(&mut self, lt: usize, instruction: bool) {
        let name_start = lt + 1;
        let mut end = if instruction { lt + 2 } else { name_start };
        while let Some(&b) = self.bytes.get(end) {
            if is_whitespace(b) || b == b'>' || b == b'/' {
                break;
            }
            if instruction && b == b'?' && self.bytes.get(end + 1) == Some(&b'>') {
                break;
            }
            end += 1;
        }
        self.push(TokenKind::OpenTag, name_start, end);
        self.pos = end;
        self.scan_attributes(instruction);
    }

    fn scan_attributes(&mut self, instruction: bool) {
        while let Some(&b) = self.bytes.get(self.pos) {
            let start = self.pos;
            let next = self.bytes.get(start + 1).copied();
            match b {
                b'>' => {
                    self.push_tag_end(start, start);
                    self.pos = start + 1;
                    return;
                }
                b'/' if next == Some(b'>') => {
                    self.push_tag_end(start, start + 1);
                    self.pos = start + 2;
                    return;
                }
                b'?' if instruction && next == Some(b'>') => {
                    self.push_tag_end(start, start + 1);
                    self.pos = start + 2;
                    return;
                }
                b'=' => {
                    self.push(TokenKind::AttrValueEq, start, start + 1);
                    self.pos = start + 1;
                }
                b'"' | b'\'' => {
                    let end = memchr(b, &self.bytes[start + 1..])
                        .map_or(self.bytes.len(), |offset| start + 1 + offset + 1);
                    self.push(TokenKind::AttrValueQuoted, start, end);
                    self.pos = end;
                }
                b if is_whitespace(b) => {
                    let mut end = start + 1;
                    while self.bytes.get(end).is_some_and(|&b| is_whitespace(b)) {
                        end += 1;
                    }
                    self.push(TokenKind::Whitespace, start, end);
                    self.pos = end;
                }
                _ => {
                    let end = self.unquoted_end(start + 1, instruction);
                    self.push(TokenKind::AttrValueNq, start, end);
                    self.pos = end;
                }
            }
        }
    }

    fn unquoted_end(&self, mut end: usize, instruction: bool) -> usize {
        while let Some(&b) = self.bytes.get(end) {
            let closes_tag = self.bytes.get(end + 1) == Some(&b'>')
                && (b == b'/' || (instruction && b == b'?'));
            if is_whitespace(b) || matches!(b, b'>' | b'=' | b'"' | b'\'') || closes_tag {
                break;
            }
            end += 1;
        }
        end
    }

    fn scan_close_tag(&mut self, lt: usize) {
        let name_start = lt + 2;
        match memchr(b'>', &self.bytes[name_start..]) {
            Some(offset) => {
                let gt = name_start + offset;
                self.push(TokenKind::CloseTag, name_start, gt);
                self.pos = gt + 1;
            }
            None => {
                self.push(TokenKind::CloseTag, name_start, self.bytes.len());
                self.pos = self.bytes.len();
            }
        }
    }

    fn scan_comment(&mut self, lt: usize) {
        let body = lt + 4;
        self.push(TokenKind::OpenTag, lt + 1, body);
        match memmem::find(&self.bytes[body..], b"-->") {
            Some(offset) => {
                let dashes = body + offset;
                self.push(TokenKind::Literal, body, dashes);
                self.push_tag_end(dashes, dashes + 2);
                self.pos = dashes + 3;
            }
            None => {
                self.push(TokenKind::Literal, body, self.bytes.len());
                self.pos = self.bytes.len();
            }
        }
    }

    fn scan_declaration(&mut self, lt: usize) {
        let body = lt + 2;
        self.push(TokenKind::OpenTag, lt + 1, body);
        // A quoted system literal may contain '>'.
        let mut cursor = body;
        loop {
            match memchr2(b'>', b'"', &self.bytes[cursor..]) {
                Some(offset) if self.bytes[cursor + offset] == b'"' => {
                    let quote = cursor + offset;
                    match memchr(b'"', &self.bytes[quote + 1..]) {
                        Some(close) => cursor = quote + 1 + close + 1,
                        None => cursor = self.bytes.len(),
                    }
                }
                Some(offset) => {
                    let gt = cursor + offset;
                    self.push(TokenKind::Literal, body, gt);
                    self.push_tag_end(gt, gt);
                    self.pos = gt + 1;
                    return;
                }
                None => {
                    self.push(TokenKind::Literal, body, self.bytes.len());
                    self.pos = self.bytes.len();
                    return;
                }
            }
        }
    }
}
