//! Document model
//!
//! - `SourceDocument`: a loaded input, read-only after `load`
//! - `PageSet`: deep copies of selected pages in an owned arena
//! - `OutputDocument`: a destination document, serialized with a `CompressionProfile`
//!
//! Nothing in this module touches the filesystem.

mod clone;
mod output;
mod source;

pub use clone::{ClonedPage, PageSet};
pub use output::{CompressionProfile, OutputDocument};
pub use source::{SourceDocument, DEFAULT_PAGE_SIZE};
