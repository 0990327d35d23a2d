//! PDF Merge algorithm
//!
//! Combines multiple PDFs into a single document.

use tracing::{info, instrument};

use crate::artifact::{ArtifactKind, OutputArtifact};
use crate::document::{CompressionProfile, OutputDocument, SourceDocument};
use crate::error::HexonError;

/// Merge documents in order into one new document
///
/// The algorithm:
/// 1. Create an empty output with the highest version among the sources
/// 2. For each source, copy all of its pages in original order
/// 3. Append each copy to the output, shifting object ids past the current maximum
/// 4. Serialize with the `Medium` profile
#[instrument(skip_all, fields(sources = sources.len()))]
pub fn merge(sources: &[SourceDocument]) -> Result<OutputArtifact, HexonError> {
    if sources.is_empty() {
        return Err(HexonError::MergeError("No documents to merge".into()));
    }

    let version = highest_version(sources.iter().map(SourceDocument::version));
    let mut output = OutputDocument::new(version);

    for (i, source) in sources.iter().enumerate() {
        let indices: Vec<usize> = (0..source.page_count() as usize).collect();
        let pages = source.copy_pages(&indices).map_err(|e| match e {
            HexonError::SerializeError(msg) => {
                HexonError::SerializeError(format!("Document {}: {}", i + 1, msg))
            }
            other => other,
        })?;
        output.append(pages)?;
    }

    let page_count = output.page_count();
    let bytes = output.serialize(CompressionProfile::Medium)?;
    let artifact = OutputArtifact::new(ArtifactKind::Merged, bytes, page_count);

    info!(
        pages = page_count,
        bytes = artifact.byte_len(),
        name = %artifact.name,
        "Merged documents"
    );
    Ok(artifact)
}

/// Highest `major.minor` version string, `1.7` when nothing parses
fn highest_version<'a>(versions: impl Iterator<Item = &'a str>) -> &'a str {
    versions
        .filter_map(|v| parse_version(v).map(|parsed| (parsed, v)))
        .max_by_key(|(parsed, _)| *parsed)
        .map(|(_, v)| v)
        .unwrap_or("1.7")
}

fn parse_version(version: &str) -> Option<(u32, u32)> {
    let (major, minor) = version.trim().split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}
