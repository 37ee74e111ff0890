//! Core - configuration, startup errors and the poll loop
//!
//! # Module structure
//!
//! - [`WatchConfig`] - validated runtime configuration (from [`Cli`])
//! - [`Watcher`] - list / detect / deliver loop
//! - [`StartupError`] - collaborator unavailable before the loop starts

pub mod config;
pub mod error;
pub mod watcher;

pub use config::{Cli, OutputConfig, SourceConfig, TextConfig, WatchConfig};
pub use error::{ConfigError, Result, StartupError};
pub use watcher::{IterationReport, WatchStats, Watcher};
