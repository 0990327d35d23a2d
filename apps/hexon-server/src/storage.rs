//! Artifact persistence
//!
//! Artifacts are written to a temporary file in the output directory and
//! renamed into place, so a visible artifact is always complete.

use std::io::Write;
use std::path::{Path, PathBuf};

use hexon_core::OutputArtifact;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::ServerError;

/// URL prefix under which artifacts are served
pub const PUBLIC_PREFIX: &str = "/uploads";

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Use `dir` as the artifact directory, creating it if needed
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(ArtifactStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write an artifact and return its public path
    pub fn persist(&self, artifact: &OutputArtifact) -> Result<String, ServerError> {
        let mut file = NamedTempFile::new_in(&self.dir)
            .map_err(|e| ServerError::Internal(format!("Create temp file: {}", e)))?;
        file.write_all(&artifact.bytes)
            .and_then(|_| file.flush())
            .map_err(|e| ServerError::Internal(format!("Write artifact: {}", e)))?;

        let target = self.dir.join(&artifact.name);
        file.persist(&target)
            .map_err(|e| ServerError::Internal(format!("Persist artifact: {}", e.error)))?;

        debug!(path = %target.display(), bytes = artifact.byte_len(), "Persisted artifact");
        Ok(public_path(&artifact.name))
    }

    /// Persist several artifacts off the async runtime
    ///
    /// Each artifact is written on its own, so one failed write leaves the
    /// others in place. Fails only when the blocking task itself dies.
    pub async fn persist_all(
        &self,
        artifacts: Vec<OutputArtifact>,
    ) -> Result<Vec<Persisted>, ServerError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || {
            artifacts
                .into_iter()
                .map(|artifact| {
                    let path = store.persist(&artifact);
                    if let Err(err) = &path {
                        warn!(name = %artifact.name, %err, "Artifact not persisted");
                    }
                    Persisted { artifact, path }
                })
                .collect()
        })
        .await
        .map_err(|e| ServerError::Internal(format!("Persist task failed: {}", e)))
    }

    pub async fn persist_one(&self, artifact: OutputArtifact) -> Result<String, ServerError> {
        self.persist_all(vec![artifact])
            .await?
            .pop()
            .ok_or_else(|| ServerError::Internal("Artifact was not persisted".into()))?
            .path
    }
}

/// An artifact and the outcome of writing it
#[derive(Debug)]
pub struct Persisted {
    pub artifact: OutputArtifact,
    /// Public path on success
    pub path: Result<String, ServerError>,
}

pub fn public_path(name: &str) -> String {
    format!("{}/{}", PUBLIC_PREFIX, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexon_core::ArtifactKind;

    #[test]
    fn test_persist_writes_complete_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path().join("out")).unwrap();
        let artifact = OutputArtifact::new(ArtifactKind::Merged, b"%PDF-1.7 body".to_vec(), 1);

        let path = store.persist(&artifact).unwrap();
        assert_eq!(path, format!("/uploads/{}", artifact.name));

        let written = std::fs::read(store.dir().join(&artifact.name)).unwrap();
        assert_eq!(written, artifact.bytes);
        // Only the final file remains
        assert_eq!(std::fs::read_dir(store.dir()).unwrap().count(), 1);
    }

    #[test]
    fn test_persist_all_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let artifacts: Vec<OutputArtifact> = (0..3)
            .map(|i| OutputArtifact::new(ArtifactKind::Split, vec![i; 4], 1))
            .collect();
        let names: Vec<String> = artifacts.iter().map(|a| a.name.clone()).collect();

        let persisted = tokio_test::block_on(store.persist_all(artifacts)).unwrap();
        let paths: Vec<String> = persisted.into_iter().map(|p| p.path.unwrap()).collect();
        let expected: Vec<String> = names.iter().map(|n| public_path(n)).collect();
        assert_eq!(paths, expected);
    }

    #[test]
    fn test_failed_write_keeps_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let artifacts: Vec<OutputArtifact> = (0..3)
            .map(|i| OutputArtifact::new(ArtifactKind::Split, vec![i; 4], 1))
            .collect();
        // A directory squatting on the target name makes the rename fail
        std::fs::create_dir(store.dir().join(&artifacts[1].name)).unwrap();

        let persisted = tokio_test::block_on(store.persist_all(artifacts)).unwrap();
        assert!(persisted[0].path.is_ok());
        assert!(matches!(persisted[1].path, Err(ServerError::Internal(_))));
        assert!(persisted[2].path.is_ok());

        for written in [&persisted[0], &persisted[2]] {
            let bytes = std::fs::read(store.dir().join(&written.artifact.name)).unwrap();
            assert_eq!(bytes, written.artifact.bytes);
        }
        // Two artifacts and the squatting directory, no temp files left behind
        assert_eq!(std::fs::read_dir(store.dir()).unwrap().count(), 3);
    }
}
