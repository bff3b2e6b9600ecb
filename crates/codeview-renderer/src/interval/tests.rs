use super::*;
use crate::tag::TagSet;

const PLAIN_ROW: &str = "<tr style=\"background-color:lightcoral;\"><th id=\"";

/// Helper: render with default styles
fn render(source: &str, tags: &[Tag], annotations: &LineAnnotations) -> String {
    let styles = LineStyles::default();
    let renderer = IntervalRenderer::new(source.as_bytes(), tags, annotations, &styles);
    String::from_utf8(renderer.render_to_vec()).unwrap()
}

/// Helper: the contents of each `<td>` cell, one entry per row
fn cells(rendered: &str) -> Vec<&str> {
    rendered
        .lines()
        .map(|row| {
            let start = row.find("<td>").expect("row has a cell") + "<td>".len();
            let end = row.rfind("</td></tr>").expect("row is closed");
            &row[start..end]
        })
        .collect()
}

fn cells_of(source: &str, tags: &[Tag]) -> Vec<String> {
    let rendered = render(source, tags, &LineAnnotations::default());
    cells(&rendered).into_iter().map(str::to_string).collect()
}

#[test]
fn test_plain_lines() {
    let rendered = render("ab\ncd", &[], &LineAnnotations::default());
    assert_eq!(
        rendered,
        format!("{PLAIN_ROW}1\">1</th><td>ab</td></tr>\n{PLAIN_ROW}2\">2</th><td>cd</td></tr>\n")
    );
}

#[test]
fn test_reserved_characters_are_escaped() {
    assert_eq!(cells_of("a<b", &[]), ["a&lt;b"]);
    assert_eq!(cells_of("x && y > z", &[]), ["x &amp;&amp; y &gt; z"]);
    // quotes only matter inside attributes
    assert_eq!(cells_of("\"it's\"", &[]), ["\"it's\""]);
}

#[test]
fn test_single_tag() {
    let tags = [Tag::new("span", "", 1, 3)];
    assert_eq!(cells_of("hello", &tags), ["h<span>ell</span>o"]);
}

#[test]
fn test_tag_across_newline_is_split_per_row() {
    let tags = [Tag::new("span", "", 1, 3)];
    assert_eq!(cells_of("ab\ncd", &tags), ["a<span>b</span>", "<span>c</span>d"]);
}

#[test]
fn test_line_classification() {
    let annotations = LineAnnotations::new([2], [1]);
    let rendered = render("x\ny", &[], &annotations);
    insta::assert_snapshot!(rendered, @r#"
    <tr style="background-color:lightcoral;"><th style="background-color:gold;" id="1">1</th><td>x</td></tr>
    <tr style="background-color:aquamarine;"><th id="2">2</th><td>y</td></tr>
    "#);
}

#[test]
fn test_custom_styles_are_attribute_escaped() {
    let styles = LineStyles {
        common: "green".into(),
        uncommon: "red\"><script>".into(),
        covered: "gold".into(),
    };
    let annotations = LineAnnotations::default();
    let renderer = IntervalRenderer::new(b"x", &[], &annotations, &styles);
    let rendered = String::from_utf8(renderer.render_to_vec()).unwrap();
    assert!(rendered.starts_with(
        "<tr style=\"background-color:red&quot;&gt;&lt;script&gt;;\"><th id=\"1\">"
    ));
}

#[test]
fn test_attributes_are_emitted_verbatim() {
    let tags = [Tag::new("a", "href=\"#l2\" class=\"ref\"", 0, 3)];
    assert_eq!(
        cells_of("foo()", &tags),
        ["<a href=\"#l2\" class=\"ref\">foo</a>()"]
    );
}

#[test]
fn test_markers() {
    let tags = [Tag::marker("a", "id=\"m\"", 1)];
    assert_eq!(cells_of("x=1", &tags), ["x<a id=\"m\"></a>=1"]);

    // a marker at the very end still renders
    let tags = [Tag::marker("a", "", 2)];
    assert_eq!(cells_of("ab", &tags), ["ab<a></a>"]);

    // markers are not carried over line breaks
    let tags = [Tag::marker("i", "", 0), Tag::new("b", "", 0, 3)];
    assert_eq!(cells_of("a\nb", &tags), ["<i></i><b>a</b>", "<b>b</b>"]);
}

#[test]
fn test_tags_sharing_offsets() {
    // same start: input order is nesting order
    let tags = [Tag::new("o", "", 0, 6), Tag::new("i", "", 0, 3)];
    assert_eq!(cells_of("abcdef", &tags), ["<o><i>abc</i>def</o>"]);

    // same end: closed innermost first
    let tags = [Tag::new("o", "", 0, 4), Tag::new("i", "", 2, 2)];
    assert_eq!(cells_of("abcd", &tags), ["<o>ab<i>cd</i></o>"]);

    // same start and end
    let tags = [Tag::new("a", "", 0, 3), Tag::new("b", "", 0, 3)];
    assert_eq!(cells_of("xyz", &tags), ["<a><b>xyz</b></a>"]);
}

#[test]
fn test_adjacent_tags() {
    let tags = [Tag::new("x", "", 0, 2), Tag::new("y", "", 2, 2)];
    assert_eq!(cells_of("abcd", &tags), ["<x>ab</x><y>cd</y>"]);
}

#[test]
fn test_nested_tags_across_lines() {
    let tags = [
        Tag::new("span", "class=\"o\"", 1, 5),
        Tag::new("b", "", 3, 1),
    ];
    assert_eq!(
        cells_of("f{\nx\n}", &tags),
        [
            "f<span class=\"o\">{</span>",
            "<span class=\"o\"><b>x</b></span>",
            "<span class=\"o\">}</span>",
        ]
    );
}

#[test]
fn test_multi_line_tag_reopens_on_every_row() {
    let tags = [Tag::new("s", "title=\"t\"", 1, 6)];
    assert_eq!(
        cells_of("ab\ncd\nef", &tags),
        [
            "a<s title=\"t\">b</s>",
            "<s title=\"t\">cd</s>",
            "<s title=\"t\">e</s>f"
        ]
    );
}

#[test]
fn test_tag_starting_on_newline() {
    let tags = [Tag::new("i", "", 1, 2)];
    assert_eq!(cells_of("a\nb", &tags), ["a<i></i>", "<i>b</i>"]);
}

#[test]
fn test_escaping_inside_tags() {
    let tags = [Tag::new("q", "", 1, 3)];
    assert_eq!(cells_of("a<&>b", &tags), ["a<q>&lt;&amp;&gt;</q>b"]);
}

#[test]
fn test_empty_and_trailing_newline() {
    assert_eq!(cells_of("", &[]), [""]);
    assert_eq!(cells_of("ab\n", &[]), ["ab", ""]);
    assert_eq!(cells_of("\n\n", &[]), ["", "", ""]);
}

#[test]
fn test_non_ascii_bytes_pass_through() {
    let source = "// caf\u{e9} <\u{4f60}>";
    assert_eq!(cells_of(source, &[]), ["// caf\u{e9} &lt;\u{4f60}&gt;"]);

    let annotations = LineAnnotations::default();
    let styles = LineStyles::default();
    let source = [b'a', 0xff, b'\n', 0xfe];
    let renderer = IntervalRenderer::new(&source, &[], &annotations, &styles);
    let out = renderer.render_to_vec();
    assert!(out.windows(3).any(|w| w == b"a\xff<"));
    assert!(out.windows(2).any(|w| w == b">\xfe"));
}

#[test]
fn test_stats() {
    let tags = [
        Tag::new("a", "", 0, 7),
        Tag::new("b", "", 1, 3),
        Tag::new("c", "", 2, 1),
        Tag::marker("m", "", 5),
    ];
    let annotations = LineAnnotations::default();
    let styles = LineStyles::default();
    let renderer = IntervalRenderer::new(b"abc\ndef", &tags, &annotations, &styles);
    let stats = renderer.render(&mut io::sink()).unwrap();
    assert_eq!(
        stats,
        RenderStats {
            lines: 2,
            tags: 4,
            max_depth: 3
        }
    );
}

#[test]
fn test_sink_errors_are_returned() {
    struct FailAfter(usize);

    impl Write for FailAfter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.0 == 0 {
                return Err(io::Error::other("disk full"));
            }
            self.0 -= 1;
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let annotations = LineAnnotations::default();
    let styles = LineStyles::default();
    let renderer = IntervalRenderer::new(b"a\nb\nc", &[], &annotations, &styles);
    let err = renderer.render(&mut FailAfter(5)).unwrap_err();
    assert_eq!(err.to_string(), "disk full");
}

// Property checks over pseudo-random inputs. The generator is a fixed-seed
// LCG so failures are reproducible.

struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next() % n as u64) as usize
    }
}

fn random_source(rng: &mut Lcg, len: usize) -> String {
    const ALPHABET: &[u8] = b"abc xyz<>&\"'\n\n";
    (0..len)
        .map(|_| ALPHABET[rng.below(ALPHABET.len())] as char)
        .collect()
}

fn random_tags(rng: &mut Lcg, len: usize) -> TagSet {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    let mut set = TagSet::new();
    for n in 0..24 {
        let start = rng.below(len + 1);
        let end = start + rng.below(len - start + 1);
        let attributes = format!("class=\"c{n}\"");
        if start == end {
            set.add("m", attributes, start, 0);
            continue;
        }
        let nests = ranges.iter().all(|&(a, b)| {
            end <= a || start >= b || (a <= start && end <= b) || (start <= a && b <= end)
        });
        if nests && !ranges.contains(&(start, end)) {
            ranges.push((start, end));
            set.add("span", attributes, start, end - start);
        }
    }
    set
}

/// Markup tokens of a row, in order: `(is_close, name, full_token)`.
fn markup(row: &str) -> Vec<(bool, &str, &str)> {
    let mut tokens = Vec::new();
    let mut rest = row;
    while let Some(open) = rest.find('<') {
        let close = rest[open..].find('>').expect("unterminated markup") + open;
        let token = &rest[open..=close];
        let inner = &token[1..token.len() - 1];
        let (is_close, inner) = match inner.strip_prefix('/') {
            Some(name) => (true, name),
            None => (false, inner),
        };
        let name = inner.split(' ').next().unwrap_or(inner);
        tokens.push((is_close, name, token));
        rest = &rest[close + 1..];
    }
    tokens
}

fn assert_balanced(row: &str) {
    let mut stack = Vec::new();
    for (is_close, name, _) in markup(row) {
        if is_close {
            assert_eq!(stack.pop(), Some(name), "mismatched close in {row}");
        } else {
            stack.push(name);
        }
    }
    assert!(stack.is_empty(), "unclosed markup in {row}");
}

fn strip_markup(cell: &str) -> String {
    let mut text = String::new();
    let mut in_markup = false;
    for c in cell.chars() {
        match c {
            '<' => in_markup = true,
            '>' if in_markup => in_markup = false,
            c if !in_markup => text.push(c),
            _ => {}
        }
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[test]
fn test_rows_are_balanced_and_round_trip() {
    let mut rng = Lcg(0x5eed);
    for _ in 0..200 {
        let len = rng.below(48);
        let source = random_source(&mut rng, len);
        let tags = random_tags(&mut rng, len);
        let rendered = render(&source, tags.as_slice(), &LineAnnotations::default());

        let rows: Vec<&str> = rendered.lines().collect();
        assert_eq!(rows.len(), source.split('\n').count());
        for row in &rows {
            assert_balanced(row);
        }

        let text: Vec<String> = cells(&rendered).into_iter().map(strip_markup).collect();
        let expected: Vec<&str> = source.split('\n').collect();
        assert_eq!(text, expected, "source {source:?} tags {tags:?}");
    }
}

#[test]
fn test_spanning_tags_reopen_identically() {
    let mut rng = Lcg(42);
    for _ in 0..200 {
        let len = 1 + rng.below(40);
        let source = random_source(&mut rng, len);
        let tags = random_tags(&mut rng, len);
        let rendered = render(&source, tags.as_slice(), &LineAnnotations::default());
        let rows: Vec<&str> = cells(&rendered);

        // byte offset at which each row starts
        let mut row_starts = vec![0];
        row_starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );

        for tag in tags.iter().filter(|t| !t.is_marker()) {
            let mut open = Vec::new();
            tag.open(&mut open).unwrap();
            let open = String::from_utf8(open).unwrap();

            let first = row_starts.partition_point(|&s| s <= tag.start()) - 1;
            let last = row_starts.partition_point(|&s| s < tag.end()) - 1;
            for row in &rows[first + 1..=last] {
                let tokens = markup(row);
                assert!(
                    tokens.iter().any(|&(is_close, _, token)| !is_close && token == open),
                    "{open} missing from continuation row {row:?}"
                );
            }
        }
    }
}
