//! HTML escaping for source text, attribute values and page file names.
//!
//! Body text only needs `<`, `>` and `&` replaced; attribute values also need
//! both quote characters. Every other byte passes through untouched, which
//! keeps non-UTF-8 source files renderable byte for byte.

use std::borrow::Cow;
use std::io::{self, Write};

/// Replacement for a byte appearing in element content, if it needs one.
#[inline]
pub fn body_entity(byte: u8) -> Option<&'static str> {
    match byte {
        b'<' => Some("&lt;"),
        b'>' => Some("&gt;"),
        b'&' => Some("&amp;"),
        _ => None,
    }
}

/// Replacement for a byte appearing inside a quoted attribute value.
#[inline]
pub fn attr_entity(byte: u8) -> Option<&'static str> {
    match byte {
        b'"' => Some("&quot;"),
        b'\'' => Some("&apos;"),
        other => body_entity(other),
    }
}

fn write_escaped<W: Write>(
    out: &mut W,
    bytes: &[u8],
    entity: fn(u8) -> Option<&'static str>,
) -> io::Result<()> {
    let mut run_start = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        if let Some(replacement) = entity(byte) {
            out.write_all(&bytes[run_start..i])?;
            out.write_all(replacement.as_bytes())?;
            run_start = i + 1;
        }
    }
    out.write_all(&bytes[run_start..])
}

/// Write `bytes` as element content.
pub fn write_escaped_body<W: Write>(out: &mut W, bytes: &[u8]) -> io::Result<()> {
    write_escaped(out, bytes, body_entity)
}

/// Write `value` escaped for use inside a single- or double-quoted attribute.
pub fn write_escaped_attr<W: Write>(out: &mut W, value: &str) -> io::Result<()> {
    write_escaped(out, value.as_bytes(), attr_entity)
}

/// Escaped copy of `value` for attribute contexts. Borrows when nothing
/// needs replacing.
///
/// Meant for tag producers: [`crate::Tag`] attributes are written verbatim,
/// so values interpolated into them go through here first.
pub fn escape_attr(value: &str) -> Cow<'_, str> {
    let Some(first) = value.bytes().position(|b| attr_entity(b).is_some()) else {
        return Cow::Borrowed(value);
    };
    let mut escaped = String::with_capacity(value.len() + 16);
    escaped.push_str(&value[..first]);
    for c in value[first..].chars() {
        // All escaped characters are ASCII, so a char never splits an entity lookup.
        match u8::try_from(c).ok().and_then(attr_entity) {
            Some(replacement) => escaped.push_str(replacement),
            None => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// Map a source file name to the name its page is stored under.
///
/// `:` is not allowed in file names on every platform the pages get served
/// from, so it becomes `.`. The viewer scripts apply the same substitution
/// when they build links.
pub fn escape_attr_for_filename(name: &str) -> Cow<'_, str> {
    if name.contains(':') {
        Cow::Owned(name.replace(':', "."))
    } else {
        Cow::Borrowed(name)
    }
}
