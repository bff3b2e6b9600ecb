//! Codeview renderer
//!
//! Renders a source file plus a set of markup ranges over it into an HTML
//! code page: one table row per source line, every tag closed at the end of
//! its row and reopened at the start of the next, lines colored by the
//! common/coverage annotations that sit beside the source.
//!
//! The interval renderer itself is in [`interval`]; [`page`] wraps its rows
//! in a document and writes it out under an output prefix.

pub mod annotations;
pub mod config;
pub mod error;
pub mod escape;
pub mod interval;
pub mod page;
pub mod tag;

pub use annotations::{LineAnnotations, LineClass};
pub use config::{LineStyles, PageConfig};
pub use error::RenderError;
pub use interval::{IntervalRenderer, RenderStats};
pub use page::{SourcePage, output_path, write_page};
pub use tag::{Tag, TagSet, load_tags};
