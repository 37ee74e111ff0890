use kiosk_printer::{PrintError, RenderError};
use thiserror::Error;

use crate::source::SourceError;

/// Invalid option combination
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("S3 source needs a bucket (--bucket / KIOSK_BUCKET)")]
    MissingBucket,

    #[error("Poll interval must be positive")]
    ZeroPollInterval,

    #[error("--max-attempts must be at least 1")]
    ZeroMaxAttempts,

    #[error("Recency window of {0} s is out of range")]
    RecencyOutOfRange(u64),

    #[error("No file extensions to watch")]
    NoExtensions,

    #[error("Font size and line height must be positive")]
    InvalidTextMetrics,
}

/// Collaborator unavailable before the loop starts
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Snapshot source: {0}")]
    Source(#[from] SourceError),

    #[error("Printer: {0}")]
    Printer(#[from] PrintError),

    #[error("Text renderer: {0}")]
    Renderer(#[from] RenderError),
}

pub type Result<T> = std::result::Result<T, StartupError>;
