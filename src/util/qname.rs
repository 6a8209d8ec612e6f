//! `QName` (qualified name) handling.
//!
//! A tag name is either `localname` or `prefix:localname`, where either part
//! may be empty. A name with more than one colon is not a valid element name
//! and the AST records it with an "invalid name" marker.
//!
//! See <https://www.w3.org/TR/xml-names/#NT-QName>

/// Splits a raw tag name into its optional prefix and local name.
///
/// Returns `None` when the name has more than one colon.
///
/// # Examples
///
/// ```
/// use xmlast::util::qname::split_qualified;
///
/// assert_eq!(split_qualified("svg:rect"), Some((Some("svg"), "rect")));
/// assert_eq!(split_qualified("div"), Some((None, "div")));
/// assert_eq!(split_qualified(":a"), Some((Some(""), "a")));
/// assert_eq!(split_qualified("a:b:c"), None);
/// ```
#[must_use]
pub fn split_qualified(raw: &str) -> Option<(Option<&str>, &str)> {
    let mut parts = raw.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(name), None, None) => Some((None, name)),
        (Some(prefix), Some(name), None) => Some((Some(prefix), name)),
        _ => None,
    }
}
