//! Local folder source
//!
//! Lists regular files directly inside one directory (not recursive). The
//! key is the file name.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{ItemSource, Snapshot, SourceError, TempItem};

pub struct FolderSource {
    dir: PathBuf,
}

impl FolderSource {
    /// Open the folder, creating it if missing
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, SourceError> {
        let dir = dir.into();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                SourceError::Unavailable(format!("cannot create {}: {e}", dir.display()))
            })?;
            info!(dir = %dir.display(), "Created watch folder");
        }
        if !dir.is_dir() {
            return Err(SourceError::Unavailable(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ItemSource for FolderSource {
    fn describe(&self) -> String {
        format!("folder {}", self.dir.display())
    }

    async fn list(&self) -> Result<Snapshot, SourceError> {
        let mut snapshot = Snapshot::new();
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| SourceError::List(format!("{}: {e}", self.dir.display())))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SourceError::List(e.to_string()))?
        {
            // Files can vanish between readdir and stat
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let Ok(modified) = meta.modified() else {
                continue;
            };
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                debug!(name = ?entry.file_name(), "Skipping non UTF-8 file name");
                continue;
            };
            snapshot.insert(name, DateTime::<Utc>::from(modified));
        }

        Ok(snapshot)
    }

    async fn fetch(&self, key: &str) -> Result<TempItem, SourceError> {
        let item = TempItem::create(key)?;
        tokio::fs::copy(self.dir.join(key), item.path())
            .await
            .map_err(|e| SourceError::Fetch {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_regular_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"x").unwrap();
        std::fs::write(dir.path().join("b.txt"), b"y").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.png"), b"z").unwrap();

        let source = FolderSource::open(dir.path()).unwrap();
        let snapshot = source.list().await.unwrap();

        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains("a.png"));
        assert!(snapshot.contains("b.txt"));
        assert!(!snapshot.contains("nested"));
    }

    #[tokio::test]
    async fn test_open_creates_missing_folder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("incoming");
        let source = FolderSource::open(&path).unwrap();
        assert!(path.is_dir());
        assert!(source.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_copies_into_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("note.txt"), b"hello").unwrap();
        let source = FolderSource::open(dir.path()).unwrap();

        let item = source.fetch("note.txt").await.unwrap();
        assert_eq!(std::fs::read(item.path()).unwrap(), b"hello");
        assert_ne!(item.path(), dir.path().join("note.txt"));

        let missing = source.fetch("gone.txt").await;
        assert!(matches!(missing, Err(SourceError::Fetch { .. })));
    }

    #[tokio::test]
    async fn test_listing_fails_when_folder_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watch");
        let source = FolderSource::open(&path).unwrap();
        std::fs::remove_dir(&path).unwrap();
        assert!(matches!(source.list().await, Err(SourceError::List(_))));
    }
}
