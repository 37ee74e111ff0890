//! Error types for the printer library

use thiserror::Error;

/// Printer error types
#[derive(Debug, Error)]
pub enum PrintError {
    /// IO error during printing or preview output
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bitmap could not be decoded or encoded
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Printer is offline or unreachable
    #[error("Printer offline: {0}")]
    Offline(String),

    /// Invalid printer configuration
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Empty or malformed bitmap handed to a printer
    #[error("Invalid bitmap: {0}")]
    InvalidBitmap(String),

    /// Driver printing is not available on this platform
    #[error("Printing not supported: {0}")]
    NotSupported(String),

    /// Windows-specific printing error
    #[cfg(windows)]
    #[error("Windows printer error: {0}")]
    WindowsPrinter(String),
}

/// Result type for printer operations
pub type PrintResult<T> = Result<T, PrintError>;

/// Text rendering error types
#[derive(Debug, Error)]
pub enum RenderError {
    /// Template image could not be loaded
    #[error("Template error: {0}")]
    Template(#[from] image::ImageError),

    /// No usable font file was found or it failed to parse
    #[error("Font error: {0}")]
    Font(String),

    /// IO error while reading font files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Text region does not fit the template
    #[error("Invalid text region: {0}")]
    InvalidRegion(String),
}

/// Result type for render operations
pub type RenderResult<T> = Result<T, RenderError>;
