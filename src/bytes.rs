//! Byte-level helpers for the XML reader

use atoi::{FromRadix10Checked, FromRadix16Checked};
use bstr::ByteSlice;
use memchr::memchr;
use std::borrow::Cow;

/// Longest entity reference we try to resolve, including `&` and `;`
const MAX_ENTITY_LEN: usize = 12;

#[inline(always)]
pub fn is_xml_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n')
}

/// Bytes allowed in element and attribute names (non-ASCII bytes included)
#[inline(always)]
pub fn is_name_byte(b: u8) -> bool {
    !is_xml_space(b) && !matches!(b, b'<' | b'>' | b'/' | b'=' | b'"' | b'\'' | b'?' | b'!')
}

/// Trim leading and trailing XML whitespace
#[inline]
pub fn trim_xml_space(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !is_xml_space(*b))
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !is_xml_space(*b))
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}

/// Count newlines before `pos` (1-based line number of `pos`)
#[inline]
pub fn line_at(bytes: &[u8], pos: usize) -> usize {
    memchr::memchr_iter(b'\n', &bytes[..pos.min(bytes.len())]).count() + 1
}

/// Decode character and predefined entity references
///
/// Unknown or malformed references are kept verbatim. Invalid UTF-8 is
/// replaced with U+FFFD.
pub fn decode_entities(raw: &[u8]) -> Cow<'_, str> {
    if memchr(b'&', raw).is_none() {
        return raw.to_str_lossy();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(amp) = memchr(b'&', rest) {
        out.push_str(&rest[..amp].to_str_lossy());
        rest = &rest[amp..];

        let window = &rest[..rest.len().min(MAX_ENTITY_LEN)];
        match memchr(b';', window).and_then(|semi| Some((semi, resolve_entity(&rest[1..semi])?))) {
            Some((semi, ch)) => {
                out.push(ch);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(&rest.to_str_lossy());

    Cow::Owned(out)
}

fn resolve_entity(name: &[u8]) -> Option<char> {
    match name {
        b"amp" => Some('&'),
        b"lt" => Some('<'),
        b"gt" => Some('>'),
        b"quot" => Some('"'),
        b"apos" => Some('\''),
        [b'#', b'x' | b'X', hex @ ..] => {
            let (value, used) = u32::from_radix_16_checked(hex);
            if used != hex.len() || hex.is_empty() {
                return None;
            }
            char::from_u32(value?)
        }
        [b'#', dec @ ..] => {
            let (value, used) = u32::from_radix_10_checked(dec);
            if used != dec.len() || dec.is_empty() {
                return None;
            }
            char::from_u32(value?)
        }
        _ => None,
    }
}
