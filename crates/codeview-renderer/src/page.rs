//! Source pages
//!
//! Wraps the rows produced by the [`IntervalRenderer`] in a complete HTML
//! document: head with the viewer scripts, breadcrumb header, optional
//! warning, footer. Pages are laid out under the output prefix mirroring the
//! source tree, `<prefix>/<filename>.html`, and link back to the shared data
//! directory relative to their own depth.

pub mod document;


use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::annotations::LineAnnotations;
use crate::config::PageConfig;
use crate::error::RenderError;
use crate::escape::escape_attr_for_filename;
use crate::interval::{IntervalRenderer, RenderStats};
use crate::tag::Tag;

/// One source file and everything attached to it.
#[derive(Debug, Clone, Copy)]
pub struct SourcePage<'a> {
    filename: &'a str,
    source: &'a [u8],
    tags: &'a [Tag],
    annotations: &'a LineAnnotations,
}

impl<'a> SourcePage<'a> {
    /// `filename` is the `/`-separated path of the file relative to the
    /// output root; it names the page and drives the relative links.
    pub fn new(
        filename: &'a str,
        source: &'a [u8],
        tags: &'a [Tag],
        annotations: &'a LineAnnotations,
    ) -> Self {
        Self {
            filename,
            source,
            tags,
            annotations,
        }
    }

    pub fn filename(&self) -> &'a str {
        self.filename
    }

    /// Write the whole document to `out`.
    pub fn write_to<W: Write>(&self, config: &PageConfig, out: &mut W) -> io::Result<RenderStats> {
        let root = root_path(self.filename);
        let data_path = resolve_data_path(&config.data_path, &root);
        let context = document::PageContext {
            filename: self.filename,
            root_path: &root,
            data_path: &data_path,
            config,
        };

        document::write_head(out, &context)?;
        document::write_breadcrumb(out, self.filename)?;
        document::write_content_start(out, &context)?;

        out.write_all(b"<table class=\"code\">\n")?;
        let renderer =
            IntervalRenderer::new(self.source, self.tags, self.annotations, &config.styles);
        let stats = renderer.render(out)?;
        out.write_all(b"</table><hr/>")?;

        document::write_footer(out, &context)?;
        Ok(stats)
    }
}

/// Where the page for `filename` lives under `prefix`.
pub fn output_path(prefix: &Path, filename: &str) -> PathBuf {
    prefix.join(format!("{}.html", escape_attr_for_filename(filename)))
}

/// Relative path from the page for `filename` back up to the output root.
///
/// The first path component is the project directory, which sits directly
/// under the root, so `proj/a.c` gives `..` and `proj/src/a.c` gives `../..`.
pub fn root_path(filename: &str) -> String {
    let depth = filename.matches('/').count();
    let mut root = String::from("..");
    for _ in 1..depth {
        root.push_str("/..");
    }
    root
}

/// Data paths starting with `.` are relative to the output root and need
/// rebasing onto the page's own directory.
pub fn resolve_data_path<'a>(data_path: &'a str, root_path: &str) -> Cow<'a, str> {
    if data_path.starts_with('.') {
        Cow::Owned(format!("{root_path}/{data_path}"))
    } else {
        Cow::Borrowed(data_path)
    }
}

/// Render `page` to `<prefix>/<filename>.html`, creating parent directories.
///
/// The document is written to a temporary sibling first and only renamed
/// into place once it is complete, so a failed render never leaves a page
/// that looks finished.
pub fn write_page(
    prefix: &Path,
    page: &SourcePage<'_>,
    config: &PageConfig,
) -> Result<PathBuf, RenderError> {
    let path = output_path(prefix, page.filename());
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| RenderError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let partial = partial_path(&path);
    let file = File::create(&partial).map_err(|source| RenderError::CreateFile {
        path: partial.clone(),
        source,
    })?;

    let written = write_and_flush(page, config, file);
    let stats = match written {
        Ok(stats) => stats,
        Err(source) => {
            tracing::warn!(file = page.filename(), error = %source, "abandoning partially written page");
            let _ = fs::remove_file(&partial);
            return Err(RenderError::Write { path, source });
        }
    };

    fs::rename(&partial, &path).map_err(|source| {
        let _ = fs::remove_file(&partial);
        RenderError::Persist {
            path: path.clone(),
            source,
        }
    })?;

    tracing::debug!(
        file = page.filename(),
        output = %path.display(),
        lines = stats.lines,
        tags = stats.tags,
        max_depth = stats.max_depth,
        "wrote page"
    );
    Ok(path)
}

fn write_and_flush(page: &SourcePage<'_>, config: &PageConfig, file: File) -> io::Result<RenderStats> {
    let mut out = BufWriter::new(file);
    let stats = page.write_to(config, &mut out)?;
    out.flush()?;
    out.into_inner().map_err(|err| err.into_error())?.sync_all()?;
    Ok(stats)
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}
