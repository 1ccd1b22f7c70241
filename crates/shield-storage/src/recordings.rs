//! Local recordings directory.

use std::path::{Path, PathBuf};

use tracing::debug;

use shield_models::ClipMetadata;

use crate::error::StorageResult;

/// Directory where event clips are written before delivery.
///
/// Clips are kept after upload; nothing in this crate deletes them.
#[derive(Debug, Clone)]
pub struct RecordingsDir {
    root: PathBuf,
}

impl RecordingsDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory (and parents) if missing.
    pub async fn ensure(&self) -> StorageResult<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        debug!("Recordings directory ready at {}", self.root.display());
        Ok(())
    }

    /// Path of the clip file for `metadata`.
    pub fn clip_path(&self, metadata: &ClipMetadata) -> PathBuf {
        self.root.join(metadata.file_name())
    }
}
