use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use uuid::Uuid;

pub const ARTIFACT_PREFIX: &str = "word-file-";
pub const ARTIFACT_EXTENSION: &str = "docx";
/// How long generated files are kept by default.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60 * 60);

/// `word-file-<yyyymmddHHMMSSmmm>-<8 hex>.docx`, stamped with `now` in UTC.
pub fn artifact_name(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}{}-{}.{}",
        ARTIFACT_PREFIX,
        now.format("%Y%m%d%H%M%S%3f"),
        &suffix[..8],
        ARTIFACT_EXTENSION
    )
}

/// Where finished documents are kept.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn persist(&self, name: &str, bytes: &[u8]) -> Result<()>;
}

/// Stores artifacts as plain files in one directory.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path the artifact `name` is stored at. Names must be plain file names.
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            bail!("invalid artifact name '{}'", name);
        }
        Ok(self.root.join(name))
    }

    /// Deletes generated artifacts last modified more than `max_age` ago and
    /// returns how many were removed. Files that cannot be inspected or removed
    /// are logged and left alone.
    pub async fn sweep_expired(&self, max_age: Duration) -> Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;

        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_artifact = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(ARTIFACT_PREFIX));
            if !is_artifact {
                continue;
            }

            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    warn!("Cannot read modification time of {}: {}", path.display(), e);
                    continue;
                }
            };
            let age = now.duration_since(modified).unwrap_or_default();
            if age <= max_age {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!("Removed expired artifact {} (age {:?})", path.display(), age);
                    removed += 1;
                }
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }

        info!("Retention sweep removed {} artifact(s) from {}", removed, self.root.display());
        Ok(removed)
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn persist(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(name)?;
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(&path, bytes).await?;
        info!("Stored {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}
