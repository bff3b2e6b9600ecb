use std::cmp::Reverse;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::RenderError;

/// One markup range over the source buffer.
///
/// `attributes` is emitted verbatim, so whoever builds the tag is responsible
/// for escaping it (see [`crate::escape::escape_attr`]). A zero `length`
/// marks a point: the element is opened and closed in place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    name: SmolStr,
    #[serde(default)]
    attributes: String,
    start: usize,
    #[serde(default, alias = "len")]
    length: usize,
}

impl Tag {
    pub fn new(
        name: impl Into<SmolStr>,
        attributes: impl Into<String>,
        start: usize,
        length: usize,
    ) -> Self {
        Self {
            name: name.into(),
            attributes: attributes.into(),
            start,
            length,
        }
    }

    /// Zero-length point marker.
    pub fn marker(name: impl Into<SmolStr>, attributes: impl Into<String>, at: usize) -> Self {
        Self::new(name, attributes, at, 0)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &str {
        &self.attributes
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Exclusive end offset.
    pub fn end(&self) -> usize {
        self.start.saturating_add(self.length)
    }

    pub fn is_marker(&self) -> bool {
        self.length == 0
    }

    /// Write the opening markup. Markers are closed straight away since HTML5
    /// has no self-closing `<span/>` or `<a/>`.
    pub fn open<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(b"<")?;
        out.write_all(self.name.as_bytes())?;
        if !self.attributes.is_empty() {
            out.write_all(b" ")?;
            out.write_all(self.attributes.as_bytes())?;
        }
        if self.is_marker() {
            out.write_all(b"></")?;
            out.write_all(self.name.as_bytes())?;
        }
        out.write_all(b">")
    }

    pub fn close<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(b"</")?;
        out.write_all(self.name.as_bytes())?;
        out.write_all(b">")
    }

    /// Order in which tags sharing a start offset must be opened: markers
    /// first, then outer (longer) ranges before the ranges they contain.
    fn open_order(&self) -> (usize, bool, Reverse<usize>) {
        (self.start, self.length != 0, Reverse(self.length))
    }
}

/// Tags kept in the order the interval renderer consumes them.
///
/// Producers walk the syntax tree in whatever order is convenient for them,
/// and macro expansions tend to report the same range more than once. A
/// `TagSet` sorts on insert and drops exact duplicates. Tags that compare
/// equal in open order keep their insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    tags: Vec<Tag>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tag, returning `false` if an identical one was already there.
    pub fn insert(&mut self, tag: Tag) -> bool {
        let same_start_from = self.tags.partition_point(|t| t.start < tag.start);
        let same_start_to = self.tags.partition_point(|t| t.start <= tag.start);
        if self.tags[same_start_from..same_start_to].contains(&tag) {
            return false;
        }
        let key = tag.open_order();
        let at = self.tags[same_start_from..same_start_to]
            .partition_point(|t| t.open_order() <= key)
            + same_start_from;
        self.tags.insert(at, tag);
        true
    }

    pub fn add(
        &mut self,
        name: impl Into<SmolStr>,
        attributes: impl Into<String>,
        start: usize,
        length: usize,
    ) -> bool {
        self.insert(Tag::new(name, attributes, start, length))
    }

    pub fn as_slice(&self) -> &[Tag] {
        &self.tags
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.tags.iter()
    }

    pub fn into_vec(self) -> Vec<Tag> {
        self.tags
    }

    /// Drop every tag reaching past `len`, returning how many were removed.
    /// Tag files can go stale when the source changes after indexing.
    pub fn retain_within(&mut self, len: usize) -> usize {
        let before = self.tags.len();
        self.tags.retain(|tag| tag.end() <= len);
        before - self.tags.len()
    }
}

impl Extend<Tag> for TagSet {
    fn extend<I: IntoIterator<Item = Tag>>(&mut self, iter: I) {
        for tag in iter {
            self.insert(tag);
        }
    }
}

impl FromIterator<Tag> for TagSet {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        let mut set = TagSet::new();
        set.extend(iter);
        set
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

/// Load the tags recorded for one source file.
///
/// The file holds a JSON array of tag objects. A missing file means the
/// source had nothing to annotate and yields an empty set.
pub fn load_tags(path: &Path) -> Result<TagSet, RenderError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no tag file, rendering plain text");
            return Ok(TagSet::new());
        }
        Err(source) => {
            return Err(RenderError::ReadTags {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let tags: Vec<Tag> =
        serde_json::from_slice(&bytes).map_err(|source| RenderError::DecodeTags {
            path: path.to_path_buf(),
            source,
        })?;
    let raw = tags.len();
    let set: TagSet = tags.into_iter().collect();
    if set.len() != raw {
        tracing::debug!(
            path = %path.display(),
            dropped = raw - set.len(),
            "dropped duplicate tags"
        );
    }
    Ok(set)
}
