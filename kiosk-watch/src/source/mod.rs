//! Snapshot sources - where uploaded files come from
//!
//! # Contents
//!
//! - [`Snapshot`] - one full listing (key -> last modified)
//! - [`ItemSource`] - list/fetch contract implemented per backend
//! - [`TempItem`] - fetched bytes in a temporary file, removed on drop
//! - [`S3Source`] / [`FolderSource`] - the two backends

pub mod folder;
pub mod s3;

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use thiserror::Error;

pub use folder::FolderSource;
pub use s3::{S3Settings, S3Source};

/// Listing or download failure
#[derive(Debug, Error)]
pub enum SourceError {
    /// Source could not be set up (bad endpoint, credentials, folder)
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    /// Listing the container failed
    #[error("Listing failed: {0}")]
    List(String),

    /// Downloading a single item failed
    #[error("Fetch of {key} failed: {message}")]
    Fetch { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Full listing of the watched container at one instant
///
/// Keys iterate in lexicographic order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    items: BTreeMap<String, DateTime<Utc>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, modified: DateTime<Utc>) {
        self.items.insert(key.into(), modified);
    }

    pub fn get(&self, key: &str) -> Option<DateTime<Utc>> {
        self.items.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, DateTime<Utc>)> {
        self.items.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<K: Into<String>> FromIterator<(K, DateTime<Utc>)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (K, DateTime<Utc>)>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Storage backend contract
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Human readable container name, for logs
    fn describe(&self) -> String;

    /// List the container; idempotent and side-effect free
    async fn list(&self) -> Result<Snapshot, SourceError>;

    /// Download one item into a temporary file owned by the caller
    async fn fetch(&self, key: &str) -> Result<TempItem, SourceError>;
}

/// A fetched item on local disk
///
/// The backing file is deleted when the value is dropped, on every path.
#[derive(Debug)]
pub struct TempItem {
    key: String,
    file: NamedTempFile,
}

impl TempItem {
    /// Create an empty temporary file whose suffix matches the key's extension
    pub fn create(key: &str) -> Result<Self, SourceError> {
        let suffix = Path::new(key)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        let file = tempfile::Builder::new()
            .prefix("kiosk-")
            .suffix(&suffix)
            .tempfile()?;

        Ok(Self {
            key: key.to_string(),
            file,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}
