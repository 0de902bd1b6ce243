// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Request artifact storage
//!
//! Uploads are written to `<uploads>/<id>.jpg` for the duration of one
//! request; annotated results are kept at `<results>/result_<id>.jpg`.
//! Orphaned uploads (process killed mid-request) are not reaped.

use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Fixed extension for stored uploads, whatever the real format
pub const UPLOAD_EXTENSION: &str = "jpg";

/// File name prefix of persisted results
pub const RESULT_PREFIX: &str = "result_";

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    uploads_dir: PathBuf,
    results_dir: PathBuf,
}

impl ArtifactStore {
    /// Create the store, creating both directories if needed
    pub async fn new(uploads_dir: impl Into<PathBuf>, results_dir: impl Into<PathBuf>) -> Result<Self> {
        let uploads_dir = uploads_dir.into();
        let results_dir = results_dir.into();

        tokio::fs::create_dir_all(&uploads_dir)
            .await
            .with_context(|| format!("Failed to create uploads directory {}", uploads_dir.display()))?;
        tokio::fs::create_dir_all(&results_dir)
            .await
            .with_context(|| format!("Failed to create results directory {}", results_dir.display()))?;

        info!(
            "📁 Artifact store ready (uploads: {}, results: {})",
            uploads_dir.display(),
            results_dir.display()
        );

        Ok(Self {
            uploads_dir,
            results_dir,
        })
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    pub fn upload_path(&self, file_id: &str) -> PathBuf {
        self.uploads_dir
            .join(format!("{}.{}", file_id, UPLOAD_EXTENSION))
    }

    pub fn result_path(&self, file_id: &str) -> PathBuf {
        self.results_dir
            .join(format!("{}{}.{}", RESULT_PREFIX, file_id, UPLOAD_EXTENSION))
    }

    pub async fn save_upload(&self, file_id: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.upload_path(file_id);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to save upload to {}", path.display()))?;
        debug!("📥 Saved upload {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    pub async fn read_upload(&self, file_id: &str) -> Result<Vec<u8>> {
        let path = self.upload_path(file_id);
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read upload {}", path.display()))
    }

    pub async fn save_result(&self, file_id: &str, jpeg: &[u8]) -> Result<PathBuf> {
        let path = self.result_path(file_id);
        tokio::fs::write(&path, jpeg)
            .await
            .with_context(|| format!("Failed to save result to {}", path.display()))?;
        debug!("💾 Saved result {} ({} bytes)", path.display(), jpeg.len());
        Ok(path)
    }

    /// Delete a stored upload; a file that is already gone is not an error
    pub async fn remove_upload(&self, file_id: &str) -> Result<()> {
        let path = self.upload_path(file_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("🗑️ Removed upload {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Upload {} already removed", path.display());
                Ok(())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to remove upload {}", path.display())),
        }
    }
}
