use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::model::Snapshot;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes each snapshot to the well-known file read by the RTD display.
pub struct Publisher {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl Publisher {
    pub fn new(path: PathBuf) -> Self {
        let tmp_path = tmp_sibling(&path);
        Self { path, tmp_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the published snapshot in one step: write the JSON to a temp
    /// file next to the target, then rename it over the target. A concurrent
    /// reader sees either the previous complete snapshot or the new one.
    pub async fn publish(&self, snapshot: &Snapshot) -> Result<(), PublishError> {
        let json = serde_json::to_string_pretty(snapshot)?;
        tokio::fs::write(&self.tmp_path, json).await?;
        tokio::fs::rename(&self.tmp_path, &self.path).await?;
        debug!("published snapshot to {}", self.path.display());
        Ok(())
    }
}

// rename(2) is only atomic within one filesystem, so the temp file must live
// in the same directory as the target.
fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "snapshot".into());
    name.push(".tmp");
    path.with_file_name(name)
}
