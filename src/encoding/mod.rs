//! Byte input decoding.
//!
//! Markup handed over as bytes is turned into a UTF-8 `String` before it
//! reaches the tokenizer. The encoding is chosen in this order:
//!
//! 1. A byte order mark, which also decides between UTF-16 byte orders.
//! 2. The `encoding` pseudo-attribute of a leading `<?xml ...?>` declaration,
//!    read from the raw bytes since a declaration is always ASCII.
//! 3. UTF-8.
//!
//! Transcoding is done by `encoding_rs`.

use std::fmt;

use encoding_rs::{Encoding, UTF_8};
use log::debug;
use memchr::memmem;

/// The longest prefix searched for an XML declaration.
const DECLARATION_LIMIT: usize = 256;

/// An error that occurs while decoding byte input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingError {
    /// A human-readable description of the error.
    pub message: String,
}

impl EncodingError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "encoding error: {}", self.message)
    }
}

impl std::error::Error for EncodingError {}

/// Sniffs a byte order mark.
///
/// Returns the encoding name and the length of the mark, or `None` if the
/// input does not start with one.
///
/// # Examples
///
/// ```
/// use xmlast::encoding::sniff_bom;
///
/// assert_eq!(sniff_bom(b"\xEF\xBB\xBF<a/>"), Some(("UTF-8", 3)));
/// assert_eq!(sniff_bom(b"\xFF\xFE<\x00"), Some(("UTF-16LE", 2)));
/// assert_eq!(sniff_bom(b"<a/>"), None);
/// ```
#[must_use]
pub fn sniff_bom(bytes: &[u8]) -> Option<(&'static str, usize)> {
    Encoding::for_bom(bytes).map(|(encoding, len)| (encoding.name(), len))
}

/// Reads the `encoding` value of an XML declaration at the start of `bytes`.
///
/// Both quote styles are accepted. Returns `None` when there is no
/// declaration or it names no encoding.
///
/// # Examples
///
/// ```
/// use xmlast::encoding::declared_encoding;
///
/// let input = b"<?xml version='1.0' encoding='ISO-8859-1'?><a/>";
/// assert_eq!(declared_encoding(input), Some("ISO-8859-1"));
/// assert_eq!(declared_encoding(b"<a/>"), None);
/// ```
#[must_use]
pub fn declared_encoding(bytes: &[u8]) -> Option<&str> {
    let head = &bytes[..bytes.len().min(DECLARATION_LIMIT)];
    if !head.starts_with(b"<?xml") {
        return None;
    }
    let declaration = &head[..memmem::find(head, b"?>")?];
    let at = memmem::find(declaration, b"encoding")?;

    let rest = skip_whitespace(&declaration[at + b"encoding".len()..]);
    let rest = skip_whitespace(rest.strip_prefix(b"=")?);
    let (&quote, rest) = rest.split_first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let value = &rest[..memchr::memchr(quote, rest)?];
    std::str::from_utf8(value).ok().filter(|v| v.is_ascii())
}

fn skip_whitespace(bytes: &[u8]) -> &[u8] {
    let skip = bytes
        .iter()
        .take_while(|&&b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
        .count();
    &bytes[skip..]
}

/// Transcodes `bytes` from the encoding named by `label` into UTF-8.
///
/// Labels are matched the way `encoding_rs` matches them, so `latin1`,
/// `ISO-8859-1` and `windows-1252` all resolve.
///
/// # Errors
///
/// Returns `EncodingError` if the label is unknown or the bytes are
/// malformed for the encoding.
///
/// # Examples
///
/// ```
/// use xmlast::encoding::transcode;
///
/// assert_eq!(transcode(b"caf\xE9", "latin1").unwrap(), "caf\u{e9}");
/// assert!(transcode(b"x", "no-such-encoding").is_err());
/// ```
pub fn transcode(bytes: &[u8], label: &str) -> Result<String, EncodingError> {
    let encoding = Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| EncodingError::new(format!("unsupported encoding \"{label}\"")))?;
    decode_with(encoding, bytes)
}

fn decode_with(encoding: &'static Encoding, bytes: &[u8]) -> Result<String, EncodingError> {
    if encoding == UTF_8 {
        return std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|e| EncodingError::new(format!("input is not valid UTF-8: {e}")));
    }
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(EncodingError::new(format!(
            "malformed byte sequence for {}",
            encoding.name()
        )));
    }
    Ok(text.into_owned())
}

/// Decodes markup bytes into a UTF-8 string.
///
/// A byte order mark wins over a declared encoding and is not part of the
/// result. A declaration naming UTF-16 on input that has no mark is read as
/// UTF-8, since the declaration itself could only be found because the bytes
/// are ASCII compatible.
///
/// # Errors
///
/// Returns `EncodingError` if the chosen encoding is unknown or the bytes are
/// malformed for it.
///
/// # Examples
///
/// ```
/// use xmlast::encoding::decode_to_utf8;
///
/// let text = decode_to_utf8(b"\xEF\xBB\xBF<a>x</a>").unwrap();
/// assert_eq!(text, "<a>x</a>");
/// ```
pub fn decode_to_utf8(bytes: &[u8]) -> Result<String, EncodingError> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        debug!(target: "xmlast.parser", "byte order mark selects {}", encoding.name());
        return decode_with(encoding, &bytes[bom_len..]);
    }

    match declared_encoding(bytes) {
        Some(label) => {
            let encoding = Encoding::for_label(label.trim().as_bytes())
                .ok_or_else(|| EncodingError::new(format!("unsupported encoding \"{label}\"")))?;
            let encoding = encoding.output_encoding();
            debug!(target: "xmlast.parser", "declaration selects {}", encoding.name());
            decode_with(encoding, bytes)
        }
        None => decode_with(UTF_8, bytes),
    }
}
