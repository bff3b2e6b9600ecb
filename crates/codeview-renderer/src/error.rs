use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while producing a source page.
///
/// The interval renderer itself only ever fails on sink I/O; everything here
/// carries the path of the file involved so the caller can report which page
/// was abandoned.
#[derive(Debug, Error, Diagnostic)]
pub enum RenderError {
    #[error("failed to create directory {}", path.display())]
    #[diagnostic(code(codeview::page::create_dir))]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create {}", path.display())]
    #[diagnostic(code(codeview::page::create_file))]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}", path.display())]
    #[diagnostic(code(codeview::page::write))]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to move finished page into place at {}", path.display())]
    #[diagnostic(code(codeview::page::persist))]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read source file {}", path.display())]
    #[diagnostic(code(codeview::source::read))]
    ReadSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read tag file {}", path.display())]
    #[diagnostic(code(codeview::tags::read))]
    ReadTags {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed tag file {}", path.display())]
    #[diagnostic(
        code(codeview::tags::decode),
        help("expected a JSON array of {{\"name\", \"attributes\", \"start\", \"length\"}} objects")
    )]
    DecodeTags {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read config file {}", path.display())]
    #[diagnostic(code(codeview::config::read))]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}", path.display())]
    #[diagnostic(code(codeview::config::parse))]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: kdl::KdlError,
    },

    #[error("invalid `{node}` entry in {}: {message}", path.display())]
    #[diagnostic(code(codeview::config::value))]
    ConfigValue {
        path: PathBuf,
        node: String,
        message: String,
    },
}
