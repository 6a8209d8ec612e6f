//! Character reference decoding.
//!
//! Named references are resolved by walking a compact binary trie stored as
//! a flat array of 16-bit words. The array is generated offline; its layout
//! and bit fields must stay exactly as they are. Each branch node packs:
//!
//! | Bits | Field |
//! | --- | --- |
//! | 15 | [`HAS_VALUE`]: the node terminates a reference and is followed by its value |
//! | 8–14 | [`BRANCH_LENGTH`]: number of outgoing branches |
//! | 7 | [`MULTI_BYTE`]: the value occupies two words (a surrogate pair) |
//! | 0–6 | [`JUMP_TABLE`]: offset of a dense jump table, 0 for binary search |
//!
//! A word `<= 128` is a single-character node: the next input character
//! must equal it.
//!
//! Numeric references go through [`decode_code_point`], which applies the
//! HTML legacy remapping of the C1 control range.

use std::borrow::Cow;

use memchr::memchr;

/// Set on nodes that terminate a reference.
pub const HAS_VALUE: u16 = 0b1000_0000_0000_0000;
/// Number of branches of a node.
pub const BRANCH_LENGTH: u16 = 0b0111_1111_0000_0000;
/// Set when the value is stored as two UTF-16 code units.
pub const MULTI_BYTE: u16 = 0b0000_0000_1000_0000;
/// Jump table offset of a dense node.
pub const JUMP_TABLE: u16 = 0b0000_0000_0111_1111;

/// Character codes in a dense jump table are stored relative to this base.
pub const JUMP_OFFSET_BASE: u32 = b'0' as u32 - 1;

/// The substitute for invalid or unrepresentable code points.
pub const REPLACEMENT_CHARACTER: char = '\u{FFFD}';

/// Decode trie for the five predefined XML entities.
pub const XML_DECODE_TREE: &[u16] = &[
    1024, 97, 103, 108, 113, 9, 23, 27, 31, 1086, 15, 0, 0, 19, 112, 59, 32768, 38, 111, 115, 59,
    32768, 39, 116, 59, 32768, 62, 116, 59, 32768, 60, 117, 111, 116, 59, 32768, 34,
];

/// Finds the trie index reached from node `current` on character `ch`.
///
/// `node_idx` is the index of the first word after `current`'s header.
/// Returns `None` when `ch` has no branch.
///
/// Dispatch order is fixed: single-character node, no branches, one branch,
/// dense jump table, binary search. Jump table slots hold 1-based indices;
/// binary search entries are followed by `branch_count` 0-based targets.
///
/// # Examples
///
/// ```
/// use xmlast::entities::{determine_branch, XML_DECODE_TREE};
///
/// // From the root, 'g' leads to the "gt" subtree.
/// let root = XML_DECODE_TREE[0];
/// assert_eq!(determine_branch(XML_DECODE_TREE, root, 1, u32::from('g')), Some(23));
/// assert_eq!(determine_branch(XML_DECODE_TREE, root, 1, u32::from('z')), None);
/// ```
#[must_use]
pub fn determine_branch(tree: &[u16], current: u16, node_idx: usize, ch: u32) -> Option<usize> {
    if current <= 128 {
        return (ch == u32::from(current)).then_some(node_idx);
    }

    let branch_count = usize::from((current & BRANCH_LENGTH) >> 8);

    if branch_count == 0 {
        return None;
    }

    if branch_count == 1 {
        let only = u32::from(*tree.get(node_idx)?);
        return (ch == only).then_some(node_idx + 1);
    }

    let jump_offset = u32::from(current & JUMP_TABLE);
    if jump_offset != 0 {
        let value = i64::from(ch) - i64::from(JUMP_OFFSET_BASE) - i64::from(jump_offset);
        if value < 0 || value > branch_count as i64 {
            return None;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let slot = *tree.get(node_idx + value as usize)?;
        return usize::from(slot).checked_sub(1);
    }

    let mut lo = node_idx;
    let mut hi = node_idx + branch_count - 1;
    while lo <= hi {
        let mid = (lo + hi) >> 1;
        let mid_val = u32::from(*tree.get(mid)?);
        if mid_val < ch {
            lo = mid + 1;
        } else if mid_val > ch {
            if mid == 0 {
                return None;
            }
            hi = mid - 1;
        } else {
            return tree.get(mid + branch_count).map(|&target| usize::from(target));
        }
    }

    None
}

/// Applies the HTML parsing remap to a numeric reference.
///
/// Surrogates and values above U+10FFFF become U+FFFD; 0 and the C1
/// controls with a Windows-1252 meaning are mapped to that character;
/// everything else passes through.
#[must_use]
pub fn replace_code_point(code_point: u32) -> u32 {
    if (0xD800..=0xDFFF).contains(&code_point) || code_point > 0x10_FFFF {
        return 0xFFFD;
    }

    match code_point {
        0 => 65533,
        128 => 8364,
        130 => 8218,
        131 => 402,
        132 => 8222,
        133 => 8230,
        134 => 8224,
        135 => 8225,
        136 => 710,
        137 => 8240,
        138 => 352,
        139 => 8249,
        140 => 338,
        142 => 381,
        145 => 8216,
        146 => 8217,
        147 => 8220,
        148 => 8221,
        149 => 8226,
        150 => 8211,
        151 => 8212,
        152 => 732,
        153 => 8482,
        154 => 353,
        155 => 8250,
        156 => 339,
        158 => 382,
        159 => 376,
        other => other,
    }
}

/// Resolves a numeric character reference to a character. Never fails.
///
/// # Examples
///
/// ```
/// use xmlast::entities::decode_code_point;
///
/// assert_eq!(decode_code_point(0x41), 'A');
/// assert_eq!(decode_code_point(0x80), '€');
/// assert_eq!(decode_code_point(0xD800), '\u{FFFD}');
/// ```
#[must_use]
pub fn decode_code_point(code_point: u32) -> char {
    char::from_u32(replace_code_point(code_point)).unwrap_or(REPLACEMENT_CHARACTER)
}

/// Number of value words that follow a node header.
fn value_words(node: u16) -> usize {
    if node <= 128 || node & HAS_VALUE == 0 {
        0
    } else if node & MULTI_BYTE != 0 {
        2
    } else {
        1
    }
}

/// Reads the value stored after the terminal node at `idx`.
fn trie_value(tree: &[u16], idx: usize) -> Option<char> {
    let node = *tree.get(idx)?;
    if node & MULTI_BYTE != 0 {
        let units = [*tree.get(idx + 1)?, *tree.get(idx + 2)?];
        char::decode_utf16(units).next()?.ok()
    } else {
        char::from_u32(u32::from(*tree.get(idx + 1)?))
    }
}

/// Resolves a named reference at the start of `reference` (which begins
/// with `&`) against `tree`, returning the character and the bytes consumed.
///
/// The longest name that reaches a value wins.
#[must_use]
pub fn decode_named(tree: &[u16], reference: &str) -> Option<(char, usize)> {
    let mut tree_idx = 0;
    let mut current = *tree.first()?;
    let mut matched = None;

    for (i, &b) in reference.as_bytes().iter().enumerate().skip(1) {
        let Some(next) =
            determine_branch(tree, current, tree_idx + 1 + value_words(current), u32::from(b))
        else {
            break;
        };
        tree_idx = next;
        current = *tree.get(tree_idx)?;
        if current > 128 && current & HAS_VALUE != 0 {
            matched = Some((tree_idx, i + 1));
        }
    }

    let (value_idx, consumed) = matched?;
    Some((trie_value(tree, value_idx)?, consumed))
}

/// Resolves `&#NNN;` or `&#xHH;` at the start of `reference`.
fn decode_numeric(reference: &str) -> Option<(char, usize)> {
    let bytes = reference.as_bytes();
    let (radix, digits_start) = match bytes.get(2) {
        Some(b'x' | b'X') => (16, 3),
        _ => (10, 2),
    };
    let digits = bytes
        .get(digits_start..)?
        .iter()
        .take_while(|b| char::from(**b).is_digit(radix))
        .count();
    if digits == 0 || bytes.get(digits_start + digits) != Some(&b';') {
        return None;
    }
    // Overlong digit runs saturate and land outside the Unicode range.
    let code_point = bytes[digits_start..digits_start + digits]
        .iter()
        .filter_map(|b| char::from(*b).to_digit(radix))
        .fold(0u32, |acc, d| acc.saturating_mul(radix).saturating_add(d));
    Some((decode_code_point(code_point), digits_start + digits + 1))
}

/// Decodes every character reference in `input`.
///
/// Unknown or unterminated references are kept verbatim. Returns the input
/// unchanged (borrowed) when it contains no `&`.
///
/// # Examples
///
/// ```
/// use xmlast::entities::decode_entities;
///
/// assert_eq!(decode_entities("a &lt; b &amp;&#x41;"), "a < b &A");
/// assert_eq!(decode_entities("&unknown;"), "&unknown;");
/// ```
#[must_use]
pub fn decode_entities(input: &str) -> Cow<'_, str> {
    let bytes = input.as_bytes();
    let Some(first) = memchr(b'&', bytes) else {
        return Cow::Borrowed(input);
    };

    let mut out = String::with_capacity(input.len());
    let mut copied = 0;
    let mut pos = first;
    loop {
        let rest = &input[pos..];
        let decoded = if rest.as_bytes().get(1) == Some(&b'#') {
            decode_numeric(rest)
        } else {
            decode_named(XML_DECODE_TREE, rest)
        };
        match decoded {
            Some((ch, consumed)) => {
                out.push_str(&input[copied..pos]);
                out.push(ch);
                pos += consumed;
                copied = pos;
            }
            None => pos += 1,
        }
        match memchr(b'&', &bytes[pos..]) {
            Some(offset) => pos += offset,
            None => break,
        }
    }
    out.push_str(&input[copied..]);
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_code_point_passthrough() {
        assert_eq!(decode_code_point(0x41), 'A');
        assert_eq!(decode_code_point(0x1F600), '😀');
    }

    #[test]
    fn test_decode_code_point_legacy_range() {
        assert_eq!(decode_code_point(128), '€');
        assert_eq!(decode_code_point(133), '…');
        assert_eq!(decode_code_point(159), 'Ÿ');
        // 129 has no Windows-1252 meaning and passes through.
        assert_eq!(decode_code_point(129), '\u{81}');
    }

    #[test]
    fn test_decode_code_point_invalid() {
        assert_eq!(decode_code_point(0), REPLACEMENT_CHARACTER);
        assert_eq!(decode_code_point(0xD800), REPLACEMENT_CHARACTER);
        assert_eq!(decode_code_point(0xDFFF), REPLACEMENT_CHARACTER);
        assert_eq!(decode_code_point(0x11_0000), REPLACEMENT_CHARACTER);
    }

    #[test]
    fn test_leaf_node() {
        let tree = [0u16; 4];
        assert_eq!(determine_branch(&tree, u16::from(b'p'), 2, u32::from('p')), Some(2));
        assert_eq!(determine_branch(&tree, u16::from(b'p'), 2, u32::from('q')), None);
    }

    #[test]
    fn test_empty_branch_node() {
        assert_eq!(determine_branch(XML_DECODE_TREE, HAS_VALUE, 17, u32::from('a')), None);
    }

    #[test]
    fn test_single_branch_node() {
        // One branch on 'x' leading to the word after it.
        let tree = [1 << 8, u16::from(b'x'), 0];
        assert_eq!(determine_branch(&tree, tree[0], 1, u32::from('x')), Some(2));
        assert_eq!(determine_branch(&tree, tree[0], 1, u32::from('y')), None);
    }

    #[test]
    fn test_jump_table_node_in_xml_tree() {
        // The "a" node dispatches 'm' and 'p' through a jump table.
        let node = XML_DECODE_TREE[9];
        assert_ne!(node & JUMP_TABLE, 0);
        assert_eq!(determine_branch(XML_DECODE_TREE, node, 10, u32::from('m')), Some(14));
        assert_eq!(determine_branch(XML_DECODE_TREE, node, 10, u32::from('p')), Some(18));
        assert_eq!(determine_branch(XML_DECODE_TREE, node, 10, u32::from('n')), None);
        assert_eq!(determine_branch(XML_DECODE_TREE, node, 10, u32::from('a')), None);
    }

    #[test]
    fn test_binary_search_node_in_xml_tree() {
        let root = XML_DECODE_TREE[0];
        assert_eq!(determine_branch(XML_DECODE_TREE, root, 1, u32::from('a')), Some(9));
        assert_eq!(determine_branch(XML_DECODE_TREE, root, 1, u32::from('l')), Some(27));
        assert_eq!(determine_branch(XML_DECODE_TREE, root, 1, u32::from('q')), Some(31));
        assert_eq!(determine_branch(XML_DECODE_TREE, root, 1, u32::from('b')), None);
    }

    #[test]
    fn test_dense_and_binary_nodes_agree() {
        const TARGET_A: u16 = 40;
        const TARGET_B: u16 = 77;
        // 'a' - JUMP_OFFSET_BASE == 50, so a jump offset of 50 puts 'a' in slot 0.
        let dense_node = (2 << 8) | 50;
        let dense = [dense_node, TARGET_A + 1, TARGET_B + 1];
        let binary_node = 2 << 8;
        let binary = [binary_node, u16::from(b'a'), u16::from(b'b'), TARGET_A, TARGET_B];

        for ch in 0..=0xFFFF_u32 {
            let from_dense = determine_branch(&dense, dense_node, 1, ch);
            let from_binary = determine_branch(&binary, binary_node, 1, ch);
            assert_eq!(from_dense, from_binary, "mismatch for {ch:#x}");
            let expected = match ch {
                0x61 => Some(usize::from(TARGET_A)),
                0x62 => Some(usize::from(TARGET_B)),
                _ => None,
            };
            assert_eq!(from_dense, expected, "wrong target for {ch:#x}");
        }
    }

    #[test]
    fn test_decode_named_all_xml_entities() {
        assert_eq!(decode_named(XML_DECODE_TREE, "&amp;"), Some(('&', 5)));
        assert_eq!(decode_named(XML_DECODE_TREE, "&apos;"), Some(('\'', 6)));
        assert_eq!(decode_named(XML_DECODE_TREE, "&gt;"), Some(('>', 4)));
        assert_eq!(decode_named(XML_DECODE_TREE, "&lt;x"), Some(('<', 4)));
        assert_eq!(decode_named(XML_DECODE_TREE, "&quot;"), Some(('"', 6)));
    }

    #[test]
    fn test_decode_named_requires_semicolon() {
        assert_eq!(decode_named(XML_DECODE_TREE, "&amp"), None);
        assert_eq!(decode_named(XML_DECODE_TREE, "&am;"), None);
        assert_eq!(decode_named(XML_DECODE_TREE, "&"), None);
    }

    #[test]
    fn test_decode_entities_mixed() {
        assert_eq!(
            decode_entities("&lt;a href=&quot;x&quot;&gt; &amp;&apos;"),
            "<a href=\"x\"> &'"
        );
        assert_eq!(decode_entities("&#65;&#x42;&#X43;"), "ABC");
        assert_eq!(decode_entities("&#128;"), "€");
        assert_eq!(decode_entities("&#xD800;"), "\u{FFFD}");
    }

    #[test]
    fn test_decode_entities_leaves_malformed_references() {
        assert_eq!(decode_entities("a & b"), "a & b");
        assert_eq!(decode_entities("&#;&#x;&#65"), "&#;&#x;&#65");
        assert_eq!(decode_entities("&nbsp;"), "&nbsp;");
        assert_eq!(decode_entities("&&amp;"), "&&");
    }

    #[test]
    fn test_decode_entities_overlong_number() {
        assert_eq!(decode_entities("&#99999999999999999999;"), "\u{FFFD}");
    }

    #[test]
    fn test_decode_entities_borrows_without_references() {
        assert!(matches!(decode_entities("plain text"), Cow::Borrowed(_)));
        assert!(matches!(decode_entities("&amp;"), Cow::Owned(_)));
    }
}
