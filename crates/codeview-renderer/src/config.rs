use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use kdl::{KdlDocument, KdlNode};
use smol_str::SmolStr;

use crate::annotations::LineClass;
use crate::error::RenderError;

/// Background colors used for the per-line classifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineStyles {
    /// Row background for lines in the common set.
    pub common: SmolStr,
    /// Row background for every other line.
    pub uncommon: SmolStr,
    /// Line-number cell background for covered lines.
    pub covered: SmolStr,
}

impl Default for LineStyles {
    fn default() -> Self {
        Self {
            common: SmolStr::new_static("aquamarine"),
            uncommon: SmolStr::new_static("lightcoral"),
            covered: SmolStr::new_static("gold"),
        }
    }
}

impl LineStyles {
    /// Every row gets one of the two row colors.
    pub fn row_color(&self, class: LineClass) -> &str {
        if class.contains(LineClass::COMMON) {
            &self.common
        } else {
            &self.uncommon
        }
    }

    /// The line-number cell is only colored for covered lines.
    pub fn header_color(&self, class: LineClass) -> Option<&str> {
        class
            .contains(LineClass::COVERED)
            .then_some(self.covered.as_str())
    }
}

/// Everything about a page that does not come from the source file itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageConfig {
    /// Shown in the page title after the file name.
    pub site_name: SmolStr,
    /// Where stylesheets and scripts live. A path starting with `.` is
    /// relative to the output root and gets rebased for every page.
    pub data_path: String,
    /// Raw HTML placed in the footer paragraph.
    pub footer: String,
    /// Raw HTML shown above and below the code when set.
    pub warning: Option<String>,
    pub styles: LineStyles,
    /// Definitions the viewer should offer as entry points for this page.
    pub interesting_definitions: BTreeSet<String>,
    /// Other projects the viewer can link into, by name.
    pub projects: BTreeMap<String, String>,
    /// Directory holding the `.common` / `.coverage` sidecars.
    pub annotations_dir: PathBuf,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            site_name: SmolStr::new_static("Code Browser"),
            data_path: "../data".to_string(),
            footer: String::new(),
            warning: None,
            styles: LineStyles::default(),
            interesting_definitions: BTreeSet::new(),
            projects: BTreeMap::new(),
            annotations_dir: PathBuf::from("."),
        }
    }
}

impl PageConfig {
    pub fn with_site_name(mut self, name: impl Into<SmolStr>) -> Self {
        self.site_name = name.into();
        self
    }

    pub fn with_data_path(mut self, path: impl Into<String>) -> Self {
        self.data_path = path.into();
        self
    }

    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = footer.into();
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }

    pub fn with_styles(mut self, styles: LineStyles) -> Self {
        self.styles = styles;
        self
    }

    pub fn with_project(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.projects.insert(name.into(), url.into());
        self
    }

    pub fn with_interesting_definition(mut self, name: impl Into<String>) -> Self {
        self.interesting_definitions.insert(name.into());
        self
    }

    pub fn with_annotations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.annotations_dir = dir.into();
        self
    }

    /// Read a KDL config file and apply it on top of `self`.
    pub fn merge_file(self, path: &Path) -> Result<Self, RenderError> {
        let text = std::fs::read_to_string(path).map_err(|source| RenderError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        self.merge_kdl(&text, path)
    }

    /// Apply a KDL config document on top of `self`. `path` is only used for
    /// error reporting. Relative `annotations` paths are resolved against the
    /// directory containing `path`.
    ///
    /// ```kdl
    /// site-name "Code Browser"
    /// data-path "../data"
    /// footer "Generated by codeview"
    /// warning "Built from a partial compile"
    /// annotations "./annotations"
    /// project "linux" "https://example.org/linux"
    /// style common="aquamarine" uncommon="lightcoral" covered="gold"
    /// ```
    pub fn merge_kdl(mut self, text: &str, path: &Path) -> Result<Self, RenderError> {
        let doc: KdlDocument = text.parse().map_err(|source| RenderError::ParseConfig {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().unwrap_or(Path::new("."));

        for node in doc.nodes() {
            let name = node.name().value();
            match name {
                "site-name" => self.site_name = string_arg(node, 0, path)?.into(),
                "data-path" => self.data_path = string_arg(node, 0, path)?.to_string(),
                "footer" => self.footer = string_arg(node, 0, path)?.to_string(),
                "warning" => self.warning = Some(string_arg(node, 0, path)?.to_string()),
                "annotations" => self.annotations_dir = base_dir.join(string_arg(node, 0, path)?),
                "project" => {
                    let project = string_arg(node, 0, path)?.to_string();
                    let url = string_arg(node, 1, path)?.to_string();
                    self.projects.insert(project, url);
                }
                "interesting" => {
                    for entry in node.entries().iter().filter(|e| e.name().is_none()) {
                        let value = entry.value().as_string().ok_or_else(|| {
                            config_value(path, name, "definitions must be strings")
                        })?;
                        self.interesting_definitions.insert(value.to_string());
                    }
                }
                "style" => {
                    for entry in node.entries() {
                        let Some(key) = entry.name() else {
                            return Err(config_value(
                                path,
                                name,
                                "expected properties like common=\"aquamarine\"",
                            ));
                        };
                        let color = entry
                            .value()
                            .as_string()
                            .ok_or_else(|| config_value(path, name, "colors must be strings"))?;
                        match key.value() {
                            "common" => self.styles.common = color.into(),
                            "uncommon" => self.styles.uncommon = color.into(),
                            "covered" => self.styles.covered = color.into(),
                            other => {
                                return Err(config_value(
                                    path,
                                    name,
                                    &format!("unknown style `{other}`"),
                                ));
                            }
                        }
                    }
                }
                other => {
                    tracing::warn!(path = %path.display(), node = other, "ignoring unknown config node");
                }
            }
        }
        Ok(self)
    }
}

fn string_arg<'a>(node: &'a KdlNode, index: usize, path: &Path) -> Result<&'a str, RenderError> {
    node.entries()
        .iter()
        .filter(|entry| entry.name().is_none())
        .nth(index)
        .and_then(|entry| entry.value().as_string())
        .ok_or_else(|| {
            config_value(
                path,
                node.name().value(),
                &format!("expected a string argument at position {}", index + 1),
            )
        })
}

fn config_value(path: &Path, node: &str, message: &str) -> RenderError {
    RenderError::ConfigValue {
        path: path.to_path_buf(),
        node: node.to_string(),
        message: message.to_string(),
    }
}
