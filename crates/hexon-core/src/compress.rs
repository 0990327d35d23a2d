//! Structural re-save
//!
//! Compression here never re-encodes images or fonts. The whole document,
//! catalog and outlines included, is written back with a `CompressionProfile`.

use tracing::{info, instrument};

use crate::artifact::{ArtifactKind, OutputArtifact};
use crate::document::{CompressionProfile, OutputDocument, SourceDocument};
use crate::error::HexonError;
use crate::size::{compression_ratio, SizeStats};

/// Result of a compression run
#[derive(Debug, Clone)]
pub struct CompressionReport {
    pub artifact: OutputArtifact,
    pub original_size: u64,
    pub compressed_size: u64,
    /// Size reduction in percent; zero or negative when nothing was saved
    pub ratio: f64,
    pub profile: CompressionProfile,
}

impl CompressionReport {
    pub fn size_stats(&self) -> SizeStats {
        SizeStats::new(self.original_size, self.compressed_size, self.profile)
    }
}

#[instrument(skip_all, fields(profile = profile.as_str(), original = source.byte_len()))]
pub fn compress(
    source: &SourceDocument,
    profile: CompressionProfile,
) -> Result<CompressionReport, HexonError> {
    let page_count = source.page_count();
    let bytes = OutputDocument::from_source(source).serialize(profile)?;

    let original_size = source.byte_len() as u64;
    let compressed_size = bytes.len() as u64;
    let ratio = compression_ratio(original_size, compressed_size);
    let artifact = OutputArtifact::new(ArtifactKind::Compressed, bytes, page_count);

    info!(compressed = compressed_size, ratio, name = %artifact.name, "Compressed document");
    Ok(CompressionReport {
        artifact,
        original_size,
        compressed_size,
        ratio,
        profile,
    })
}
