//! Per-line annotations read from sidecar files.
//!
//! Two sidecars may sit next to a rendered file: `<name>.common` lists the
//! lines that are commonly reached, `<name>.coverage` the lines hit by a
//! coverage run. Both are plain whitespace-separated line numbers. Neither
//! has to exist.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bitflags::bitflags;

pub const COMMON_SUFFIX: &str = ".common";
pub const COVERAGE_SUFFIX: &str = ".coverage";

bitflags! {
    /// Classification of a single source line.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LineClass: u8 {
        const COMMON = 1 << 0;
        const COVERED = 1 << 1;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineAnnotations {
    common: BTreeSet<usize>,
    covered: BTreeSet<usize>,
}

impl LineAnnotations {
    pub fn new(
        common: impl IntoIterator<Item = usize>,
        covered: impl IntoIterator<Item = usize>,
    ) -> Self {
        Self {
            common: common.into_iter().collect(),
            covered: covered.into_iter().collect(),
        }
    }

    /// Load both sidecars for `filename` from `dir`. Only the last path
    /// component of `filename` is used to name the sidecars.
    pub fn load_for(dir: &Path, filename: &str) -> Self {
        let (common_path, coverage_path) = sidecar_paths(dir, filename);
        let annotations = Self {
            common: load_line_set(&common_path),
            covered: load_line_set(&coverage_path),
        };
        tracing::debug!(
            file = filename,
            common = annotations.common.len(),
            covered = annotations.covered.len(),
            "loaded line annotations"
        );
        annotations
    }

    /// Classify a 1-based line number.
    pub fn classify(&self, line: usize) -> LineClass {
        let mut class = LineClass::empty();
        class.set(LineClass::COMMON, self.common.contains(&line));
        class.set(LineClass::COVERED, self.covered.contains(&line));
        class
    }

    pub fn common_lines(&self) -> &BTreeSet<usize> {
        &self.common
    }

    pub fn covered_lines(&self) -> &BTreeSet<usize> {
        &self.covered
    }

    pub fn is_empty(&self) -> bool {
        self.common.is_empty() && self.covered.is_empty()
    }
}

pub fn sidecar_paths(dir: &Path, filename: &str) -> (PathBuf, PathBuf) {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    (
        dir.join(format!("{base}{COMMON_SUFFIX}")),
        dir.join(format!("{base}{COVERAGE_SUFFIX}")),
    )
}

/// Read a set of line numbers from `path`.
///
/// A missing or unreadable file is an empty set: annotations are optional
/// decoration and never stop a page from rendering.
pub fn load_line_set(path: &Path) -> BTreeSet<usize> {
    match fs::read(path) {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes);
            let (lines, stray) = parse_line_set(&text);
            if let Some(token) = stray {
                tracing::warn!(
                    path = %path.display(),
                    token,
                    read = lines.len(),
                    "stopped reading line numbers at a non-numeric token"
                );
            }
            lines
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeSet::new(),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "ignoring unreadable annotation file");
            BTreeSet::new()
        }
    }
}

/// Parse whitespace-separated line numbers. Parsing stops at the first token
/// that is not a number, which is returned alongside what was read so far.
pub fn parse_line_set(text: &str) -> (BTreeSet<usize>, Option<&str>) {
    let mut lines = BTreeSet::new();
    for token in text.split_ascii_whitespace() {
        match token.parse::<usize>() {
            Ok(line) => {
                lines.insert(line);
            }
            Err(_) => return (lines, Some(token)),
        }
    }
    (lines, None)
}
