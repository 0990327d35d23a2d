//! PDF document assembly
//!
//! Merge many PDFs into one, split one into many, and re-save with structural
//! compression. Every operation reads immutable `SourceDocument`s and produces
//! new `OutputArtifact`s; nothing here touches the filesystem except the
//! external office converter.

pub mod artifact;
pub mod compress;
pub mod convert;
pub mod document;
pub mod error;
pub mod images;
pub mod merge;
pub mod planner;
pub mod size;
pub mod split;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use artifact::{ArtifactKind, OutputArtifact};
pub use compress::{compress, CompressionReport};
pub use convert::{
    convert_document, DocumentConverter, OfficeConverter, SourceFormat, UnavailableConverter,
};
pub use document::{CompressionProfile, OutputDocument, PageSet, SourceDocument};
pub use error::{ErrorKind, HexonError};
pub use images::{images_to_pdf, ImageInput, ImageKind};
pub use merge::merge;
pub use planner::{parse_ranges, MergePlan, RangeSpec, SplitPlan, SplitRequest, SplitType};
pub use size::{compression_ratio, format_file_size, format_ratio, SizeStats};
pub use split::{split, FailedOutput, SplitOutput, SplitReport};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::create_test_pdf;

    #[test]
    fn test_split_then_merge_restores_page_order() {
        let pdf = create_test_pdf(5, "Cycle");
        let source = SourceDocument::load(&pdf).unwrap();
        let report = split(&source, &SplitPlan::single(5).unwrap()).unwrap();

        let parts: Vec<SourceDocument> = report
            .outputs
            .iter()
            .map(|o| SourceDocument::load(&o.artifact.bytes).unwrap())
            .collect();
        let merged = merge(&parts).unwrap();

        let doc = lopdf::Document::load_mem(&merged.bytes).unwrap();
        assert_eq!(
            fixtures::page_texts(&doc),
            (1..=5).map(|i| format!("Cycle-Page-{}", i)).collect::<Vec<_>>()
        );
    }
}
