use std::io::{self, Write};

use crate::config::PageConfig;
use crate::escape::{escape_attr_for_filename, write_escaped_attr, write_escaped_body};

/// Per-page values shared by the document sections.
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    pub filename: &'a str,
    pub root_path: &'a str,
    pub data_path: &'a str,
    pub config: &'a PageConfig,
}

pub fn write_head<W: Write>(out: &mut W, context: &PageContext<'_>) -> io::Result<()> {
    let config = context.config;
    let data = context.data_path;
    let basename = context.filename.rsplit('/').next().unwrap_or(context.filename);

    out.write_all(b"<!doctype html>\n<html>\n<head>\n")?;
    out.write_all(
        b"<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
    )?;

    out.write_all(b"<title>")?;
    write_escaped_body(out, basename.as_bytes())?;
    out.write_all(b" source code [")?;
    write_escaped_body(out, context.filename.as_bytes())?;
    out.write_all(b"] - ")?;
    write_escaped_body(out, config.site_name.as_bytes())?;
    out.write_all(b"</title>\n")?;

    if !config.interesting_definitions.is_empty() {
        let joined = config
            .interesting_definitions
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",");
        out.write_all(b"<meta name=\"woboq:interestingDefinitions\" content=\"")?;
        write_escaped_attr(out, &joined)?;
        out.write_all(b"\"/>\n")?;
    }

    for (rel, file, title) in [
        ("stylesheet", "qtcreator.css", "QtCreator"),
        ("alternate stylesheet", "kdevelop.css", "KDevelop"),
    ] {
        write!(out, "<link rel=\"{rel}\" href=\"")?;
        write_escaped_attr(out, data)?;
        writeln!(out, "/{file}\" title=\"{title}\"/>")?;
    }
    for script in ["jquery/jquery.min.js", "jquery/jquery-ui.min.js"] {
        out.write_all(b"<script type=\"text/javascript\" src=\"")?;
        write_escaped_attr(out, data)?;
        writeln!(out, "/{script}\"></script>")?;
    }

    out.write_all(b"<script>var file = '")?;
    write_js_string(out, context.filename)?;
    out.write_all(b"'; var root_path = '")?;
    write_js_string(out, context.root_path)?;
    out.write_all(b"'; var data_path = '")?;
    write_js_string(out, data)?;
    out.write_all(b"'; var ecma_script_api_version = 2;")?;
    if !config.projects.is_empty() {
        out.write_all(b"var projects = {")?;
        for (i, (name, url)) in config.projects.iter().enumerate() {
            if i > 0 {
                out.write_all(b", ")?;
            }
            out.write_all(b"\"")?;
            write_js_string(out, name)?;
            out.write_all(b"\" : \"")?;
            write_js_string(out, url)?;
            out.write_all(b"\"")?;
        }
        out.write_all(b"};")?;
    }
    out.write_all(b"</script>\n")?;

    out.write_all(b"<script src='")?;
    write_escaped_attr(out, data)?;
    out.write_all(b"/codebrowser.js'></script>\n</head>\n")
}

/// Header linking every directory of `filename` to its index page.
///
/// `proj/src/a.c` becomes `proj` → `..`, `src` → `./`, then the page itself.
pub fn write_breadcrumb<W: Write>(out: &mut W, filename: &str) -> io::Result<()> {
    out.write_all(
        b"<body><div id='header'><h1 id='breadcrumb'><span>Browse the source code of </span>",
    )?;

    let mut components: Vec<&str> = filename.split('/').collect();
    let file = components.pop().unwrap_or(filename);
    let depth = components.len();
    for (i, dir) in components.into_iter().enumerate() {
        if i + 1 == depth {
            out.write_all(b"<a href='./'>")?;
        } else {
            out.write_all(b"<a href='..")?;
            for _ in 0..depth - i - 2 {
                out.write_all(b"/..")?;
            }
            out.write_all(b"'>")?;
        }
        write_escaped_body(out, dir.as_bytes())?;
        out.write_all(b"</a>/")?;
    }

    out.write_all(b"<a href='")?;
    write_escaped_attr(out, &escape_attr_for_filename(file))?;
    out.write_all(b".html'>")?;
    write_escaped_body(out, file.as_bytes())?;
    out.write_all(b"</a></h1></div>\n")
}

pub fn write_content_start<W: Write>(out: &mut W, context: &PageContext<'_>) -> io::Result<()> {
    out.write_all(b"<hr/><div id='content'>")?;
    write_warning(out, context)
}

pub fn write_footer<W: Write>(out: &mut W, context: &PageContext<'_>) -> io::Result<()> {
    write_warning(out, context)?;
    out.write_all(b"<p id='footer'>\n")?;
    out.write_all(context.config.footer.as_bytes())?;
    out.write_all(b"</p></div></body></html>\n")
}

fn write_warning<W: Write>(out: &mut W, context: &PageContext<'_>) -> io::Result<()> {
    match context.config.warning.as_deref() {
        Some(warning) if !warning.is_empty() => {
            out.write_all(b"<p class=\"warnmsg\">")?;
            out.write_all(warning.as_bytes())?;
            out.write_all(b"</p>\n")
        }
        _ => Ok(()),
    }
}

/// Escape for a quoted JavaScript string literal inside a `<script>` block.
fn write_js_string<W: Write>(out: &mut W, value: &str) -> io::Result<()> {
    let bytes = value.as_bytes();
    let mut run_start = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        let replacement: &[u8] = match byte {
            b'\\' => b"\\\\",
            b'\'' => b"\\'",
            b'"' => b"\\\"",
            b'\n' => b"\\n",
            b'\r' => b"\\r",
            b'<' => b"\\x3c",
            _ => continue,
        };
        out.write_all(&bytes[run_start..i])?;
        out.write_all(replacement)?;
        run_start = i + 1;
    }
    out.write_all(&bytes[run_start..])
}
