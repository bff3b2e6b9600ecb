//! Interval renderer
//!
//! Turns a source buffer plus a sorted list of [`Tag`] ranges into table
//! rows, one per source line. The scan is a single pass over the bytes:
//! the cursor jumps from event to event (the next tag start, the end of the
//! innermost open tag, or the end of the buffer), and plain text between
//! events is copied in one write per run, broken only where a byte needs
//! escaping or a line ends.
//!
//! Rows must be valid markup on their own, so a tag that spans a newline is
//! closed at the end of the row and opened again at the start of the next
//! one. The tags are never modified; the renderer only keeps indices of the
//! ones currently open.
//!
//! Tags must be sorted by start (see [`crate::TagSet`]) and properly nested.
//! Partially overlapping or out-of-bounds ranges break that contract; debug
//! builds assert on them, release builds clamp offsets to the buffer and
//! produce unspecified but well-formed-per-row output.

use std::io::{self, Write};

use crate::annotations::LineAnnotations;
use crate::config::LineStyles;
use crate::escape;
use crate::tag::Tag;

#[cfg(test)]
mod tests;

const ROW_END: &[u8] = b"</td></tr>\n";

/// Summary of one render, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Rows emitted. Always at least one.
    pub lines: usize,
    /// Tags opened for the first time (reopens after a line break are not
    /// counted).
    pub tags: usize,
    /// Deepest nesting reached.
    pub max_depth: usize,
}

/// Position of the scan plus the start of the text run that has been
/// scanned but not yet written.
#[derive(Debug)]
struct RenderCursor {
    pos: usize,
    line: usize,
    pending: usize,
}

impl RenderCursor {
    fn new() -> Self {
        Self {
            pos: 0,
            line: 1,
            pending: 0,
        }
    }

    /// Write the pending run up to the cursor.
    fn flush<W: Write>(&mut self, source: &[u8], out: &mut W) -> io::Result<()> {
        if self.pending < self.pos {
            out.write_all(&source[self.pending..self.pos])?;
        }
        self.pending = self.pos;
        Ok(())
    }

    /// Flush, then drop the byte under the cursor from the pending run.
    fn flush_and_skip<W: Write>(&mut self, source: &[u8], out: &mut W) -> io::Result<()> {
        self.flush(source, out)?;
        self.pending = self.pos + 1;
        Ok(())
    }
}

/// Indices of the open tags, outermost first.
#[derive(Debug, Default)]
struct OpenTagStack {
    open: Vec<usize>,
}

impl OpenTagStack {
    fn push(&mut self, index: usize) {
        self.open.push(index);
    }

    fn pop(&mut self) -> Option<usize> {
        self.open.pop()
    }

    fn top(&self) -> Option<usize> {
        self.open.last().copied()
    }

    fn depth(&self) -> usize {
        self.open.len()
    }

    /// Close everything, innermost first, without forgetting what was open.
    fn close_all<W: Write>(&self, tags: &[Tag], out: &mut W) -> io::Result<()> {
        for &index in self.open.iter().rev() {
            tags[index].close(out)?;
        }
        Ok(())
    }

    /// Open everything again, outermost first.
    fn reopen_all<W: Write>(&self, tags: &[Tag], out: &mut W) -> io::Result<()> {
        for &index in &self.open {
            tags[index].open(out)?;
        }
        Ok(())
    }
}

/// Renders one source buffer. Holds nothing but borrows, so a renderer is
/// cheap to build per file and independent renderers can run in parallel.
#[derive(Debug, Clone, Copy)]
pub struct IntervalRenderer<'a> {
    source: &'a [u8],
    tags: &'a [Tag],
    annotations: &'a LineAnnotations,
    styles: &'a LineStyles,
}

impl<'a> IntervalRenderer<'a> {
    pub fn new(
        source: &'a [u8],
        tags: &'a [Tag],
        annotations: &'a LineAnnotations,
        styles: &'a LineStyles,
    ) -> Self {
        debug_assert!(
            tags.windows(2).all(|pair| pair[0].start() <= pair[1].start()),
            "tags must be sorted by start offset"
        );
        debug_assert!(
            tags.iter().all(|tag| tag.end() <= source.len()),
            "tag ranges must lie within the source buffer"
        );
        Self {
            source,
            tags,
            annotations,
            styles,
        }
    }

    fn tag_start(&self, index: usize) -> usize {
        self.tags
            .get(index)
            .map_or(self.source.len(), |tag| tag.start().min(self.source.len()))
    }

    fn tag_end(&self, index: Option<usize>) -> usize {
        index.map_or(self.source.len(), |i| {
            self.tags[i].end().min(self.source.len())
        })
    }

    fn open_row<W: Write>(&self, out: &mut W, line: usize) -> io::Result<()> {
        let class = self.annotations.classify(line);
        out.write_all(b"<tr style=\"background-color:")?;
        escape::write_escaped_attr(out, self.styles.row_color(class))?;
        out.write_all(b";\"><th")?;
        if let Some(color) = self.styles.header_color(class) {
            out.write_all(b" style=\"background-color:")?;
            escape::write_escaped_attr(out, color)?;
            out.write_all(b";\"")?;
        }
        write!(out, " id=\"{line}\">{line}</th><td>")
    }

    /// Write the rows for the whole buffer to `out`.
    ///
    /// The only failure is an I/O error from `out`, which aborts the render
    /// part way through.
    pub fn render<W: Write>(&self, out: &mut W) -> io::Result<RenderStats> {
        let end = self.source.len();
        let mut cursor = RenderCursor::new();
        let mut stack = OpenTagStack::default();
        let mut stats = RenderStats::default();

        let mut next_tag = 0;
        let mut next_start = self.tag_start(next_tag);
        let mut next_end = end;
        let mut next = next_start;

        self.open_row(out, cursor.line)?;

        loop {
            if cursor.pos >= next {
                cursor.flush(self.source, out)?;

                while let Some(top) = stack.top() {
                    if cursor.pos < next_end {
                        break;
                    }
                    stack.pop();
                    self.tags[top].close(out)?;
                    next_end = self.tag_end(stack.top());
                }

                if cursor.pos >= end {
                    // Only point markers can sit exactly at the end; anything
                    // else left over is out of bounds.
                    for tag in &self.tags[next_tag..] {
                        if tag.is_marker() && tag.start() == end {
                            tag.open(out)?;
                            stats.tags += 1;
                        }
                    }
                    break;
                }

                while next_tag < self.tags.len() && cursor.pos >= next_start {
                    let tag = &self.tags[next_tag];
                    tag.open(out)?;
                    stats.tags += 1;
                    if !tag.is_marker() {
                        debug_assert!(
                            tag.end() <= next_end,
                            "tag `{}` at {} overlaps its parent without nesting",
                            tag.name(),
                            tag.start()
                        );
                        stack.push(next_tag);
                        next_end = self.tag_end(Some(next_tag));
                        stats.max_depth = stats.max_depth.max(stack.depth());
                    }
                    next_tag += 1;
                    next_start = self.tag_start(next_tag);
                }

                next = next_start.min(next_end);
            }

            let byte = self.source[cursor.pos];
            if byte == b'\n' {
                cursor.flush_and_skip(self.source, out)?;
                stack.close_all(self.tags, out)?;
                out.write_all(ROW_END)?;
                cursor.line += 1;
                self.open_row(out, cursor.line)?;
                stack.reopen_all(self.tags, out)?;
            } else if let Some(entity) = escape::body_entity(byte) {
                cursor.flush_and_skip(self.source, out)?;
                out.write_all(entity.as_bytes())?;
            }
            cursor.pos += 1;
        }

        out.write_all(ROW_END)?;
        stats.lines = cursor.line;
        Ok(stats)
    }

    /// Render into a freshly allocated buffer.
    pub fn render_to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.source.len() * 2);
        // Writing into a Vec cannot fail.
        let _ = self.render(&mut out);
        out
    }
}
