//! Output artifacts and their names

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Process-wide suffix that keeps names unique within one millisecond
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Operation that produced an artifact; doubles as the file name prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Merged,
    Split,
    Compressed,
    ImagePdf,
    Converted,
}

impl ArtifactKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            ArtifactKind::Merged => "merged",
            ArtifactKind::Split => "split",
            ArtifactKind::Compressed => "compressed",
            ArtifactKind::ImagePdf => "imagepdf",
            ArtifactKind::Converted => "converted",
        }
    }

    /// `<prefix>_<unix-millis>_<seq>.pdf`
    pub fn next_name(&self) -> String {
        let millis = chrono::Utc::now().timestamp_millis();
        let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
        format!("{}_{}_{:04}.pdf", self.prefix(), millis, seq)
    }
}

/// A finished PDF, ready for the caller to persist
#[derive(Debug, Clone, PartialEq)]
pub struct OutputArtifact {
    pub name: String,
    pub bytes: Vec<u8>,
    pub page_count: u32,
}

impl OutputArtifact {
    pub fn new(kind: ArtifactKind, bytes: Vec<u8>, page_count: u32) -> Self {
        OutputArtifact {
            name: kind.next_name(),
            bytes,
            page_count,
        }
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }
}
