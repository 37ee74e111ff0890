//! Configuration
//!
//! Every flag can also be set through a `KIOSK_*` environment variable (a
//! `.env` file is loaded first). The parsed [`Cli`] is turned into an
//! immutable [`WatchConfig`] once at startup.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | KIOSK_SOURCE | s3 | `s3` or `folder` |
//! | KIOSK_BUCKET | - | bucket name (s3) |
//! | KIOSK_FOLDER | incoming | watched directory (folder) |
//! | KIOSK_PROFILE | image | `image` or `text` |
//! | KIOSK_POLL_INTERVAL_MS | 1000 | listing interval |
//! | KIOSK_LEDGER | printed_files.txt | processed-set ledger |
//! | KIOSK_RECENCY_SECS | 60 | max item age, 0 disables |
//! | KIOSK_OUTPUT | gdi | `gdi` or `preview` |

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use chrono::TimeDelta;
use clap::{Parser, ValueEnum};
use kiosk_printer::{
    DEFAULT_FONT_SIZE, DEFAULT_LINE_HEIGHT, PaperSize, TextEncoding, TextRegion,
};

use super::error::ConfigError;
use crate::delivery::is_text_key;
use crate::source::S3Settings;
use crate::source::s3::{DEFAULT_ENDPOINT, DEFAULT_REGION};
use crate::tracking::OnModify;
use crate::tracking::detector::normalize_suffix;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    S3,
    Folder,
}

/// Default extension allow-list
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ContentProfile {
    /// `.jpg .jpeg .png .gif`
    Image,
    /// `.txt`, rendered onto the template
    Text,
}

impl ContentProfile {
    pub fn extensions(&self) -> Vec<String> {
        let list: &[&str] = match self {
            Self::Image => &[".jpg", ".jpeg", ".png", ".gif"],
            Self::Text => &[".txt"],
        };
        list.iter().map(|s| s.to_string()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputKind {
    /// Windows print spooler
    Gdi,
    /// PNG files in the preview directory
    Preview,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "kiosk-watch", version, about = "Silently print files uploaded to a bucket or folder")]
pub struct Cli {
    #[arg(long, env = "KIOSK_SOURCE", value_enum, default_value_t = SourceKind::S3)]
    pub source: SourceKind,

    #[arg(long, env = "KIOSK_BUCKET")]
    pub bucket: Option<String>,

    #[arg(long, env = "KIOSK_S3_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    #[arg(long, env = "KIOSK_S3_REGION", default_value = DEFAULT_REGION)]
    pub region: String,

    /// Only watch keys under this prefix
    #[arg(long, env = "KIOSK_S3_PREFIX")]
    pub prefix: Option<String>,

    #[arg(long, env = "KIOSK_FOLDER", default_value = "incoming")]
    pub folder: PathBuf,

    #[arg(long, env = "KIOSK_PROFILE", value_enum, default_value_t = ContentProfile::Image)]
    pub profile: ContentProfile,

    /// Overrides the profile's extension list
    #[arg(long, env = "KIOSK_EXTENSIONS", value_delimiter = ',')]
    pub extensions: Vec<String>,

    #[arg(long, env = "KIOSK_POLL_INTERVAL_MS", default_value_t = 1000)]
    pub poll_interval_ms: u64,

    #[arg(long, env = "KIOSK_LEDGER", default_value = "printed_files.txt")]
    pub ledger: PathBuf,

    /// Ignore items modified longer ago than this; 0 disables
    #[arg(long, env = "KIOSK_RECENCY_SECS", default_value_t = 60)]
    pub recency_secs: u64,

    /// Treat everything in the first listing as new
    #[arg(long, env = "KIOSK_PROCESS_BACKLOG")]
    pub process_backlog: bool,

    #[arg(long, env = "KIOSK_ON_MODIFY", value_enum, default_value_t = OnModify::Ignore)]
    pub on_modify: OnModify,

    /// Give up on a key after this many failed deliveries
    #[arg(long, env = "KIOSK_MAX_ATTEMPTS")]
    pub max_attempts: Option<u32>,

    #[arg(long, env = "KIOSK_OUTPUT", value_enum, default_value_t = OutputKind::Gdi)]
    pub output: OutputKind,

    #[arg(long, env = "KIOSK_PREVIEW_DIR", default_value = "previews")]
    pub preview_dir: PathBuf,

    /// Printer name; default printer when unset
    #[arg(long, env = "KIOSK_PRINTER")]
    pub printer: Option<String>,

    /// a4, a5, a6 or <w>x<h>mm
    #[arg(long, env = "KIOSK_PAPER")]
    pub paper: Option<PaperSize>,

    #[arg(long, env = "KIOSK_DOC_PREFIX", default_value = "kiosk: ")]
    pub doc_prefix: String,

    #[arg(long, env = "KIOSK_TEMPLATE", default_value = "src/A5-front.png")]
    pub template: PathBuf,

    #[arg(long, env = "KIOSK_FONT")]
    pub font: Option<PathBuf>,

    #[arg(long, env = "KIOSK_EMOJI_FONT")]
    pub emoji_font: Option<PathBuf>,

    #[arg(long, env = "KIOSK_FONT_SIZE", default_value_t = DEFAULT_FONT_SIZE)]
    pub font_size: f32,

    #[arg(long, env = "KIOSK_LINE_HEIGHT", default_value_t = DEFAULT_LINE_HEIGHT)]
    pub line_height: f32,

    /// left,top,right,bottom
    #[arg(long, env = "KIOSK_TEXT_REGION", default_value = "52,140,776,960")]
    pub text_region: TextRegion,

    #[arg(
        long,
        env = "KIOSK_ENCODINGS",
        value_delimiter = ',',
        default_value = "utf-8,windows-1251,utf-16le"
    )]
    pub encodings: Vec<TextEncoding>,

    #[arg(long, env = "KIOSK_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "KIOSK_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceConfig {
    S3(S3Settings),
    Folder(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutputConfig {
    Gdi { printer: Option<String> },
    Preview { dir: PathBuf },
}

/// Text rendering settings, present when `.txt` items are watched
#[derive(Debug, Clone, PartialEq)]
pub struct TextConfig {
    pub template: PathBuf,
    pub font: Option<PathBuf>,
    pub emoji_font: Option<PathBuf>,
    pub font_size: f32,
    pub line_height: f32,
    pub region: TextRegion,
    pub encodings: Vec<TextEncoding>,
}

/// Validated, immutable runtime configuration
#[derive(Debug, Clone, PartialEq)]
pub struct WatchConfig {
    pub source: SourceConfig,
    pub extensions: Vec<String>,
    pub poll_interval: Duration,
    pub ledger_path: PathBuf,
    pub recency_window: Option<TimeDelta>,
    pub process_backlog: bool,
    pub on_modify: OnModify,
    pub max_attempts: Option<u32>,
    pub output: OutputConfig,
    pub paper: Option<PaperSize>,
    pub doc_prefix: String,
    pub text: Option<TextConfig>,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
}

impl TryFrom<Cli> for WatchConfig {
    type Error = ConfigError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let source = match cli.source {
            SourceKind::S3 => {
                let bucket = cli
                    .bucket
                    .filter(|b| !b.trim().is_empty())
                    .ok_or(ConfigError::MissingBucket)?;
                SourceConfig::S3(S3Settings {
                    bucket,
                    endpoint: cli.endpoint,
                    region: cli.region,
                    prefix: cli.prefix.filter(|p| !p.is_empty()),
                })
            }
            SourceKind::Folder => SourceConfig::Folder(cli.folder),
        };

        let mut extensions: Vec<String> = if cli.extensions.is_empty() {
            cli.profile.extensions()
        } else {
            cli.extensions.iter().map(|e| normalize_suffix(e)).collect()
        };
        let mut seen = HashSet::new();
        extensions.retain(|e| e.len() > 1 && seen.insert(e.clone()));
        if extensions.is_empty() {
            return Err(ConfigError::NoExtensions);
        }

        if cli.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        if cli.max_attempts == Some(0) {
            return Err(ConfigError::ZeroMaxAttempts);
        }

        let recency_window = match cli.recency_secs {
            0 => None,
            secs => Some(
                i64::try_from(secs)
                    .ok()
                    .and_then(TimeDelta::try_seconds)
                    .ok_or(ConfigError::RecencyOutOfRange(secs))?,
            ),
        };

        let wants_text = extensions.iter().any(|e| is_text_key(e));
        let text = if wants_text {
            if !(cli.font_size > 0.0 && cli.line_height > 0.0) {
                return Err(ConfigError::InvalidTextMetrics);
            }
            let encodings = if cli.encodings.is_empty() {
                TextEncoding::default_chain()
            } else {
                cli.encodings
            };
            Some(TextConfig {
                template: cli.template,
                font: cli.font,
                emoji_font: cli.emoji_font,
                font_size: cli.font_size,
                line_height: cli.line_height,
                region: cli.text_region,
                encodings,
            })
        } else {
            None
        };

        let output = match cli.output {
            OutputKind::Gdi => OutputConfig::Gdi {
                printer: cli.printer.filter(|p| !p.trim().is_empty()),
            },
            OutputKind::Preview => OutputConfig::Preview {
                dir: cli.preview_dir,
            },
        };

        Ok(Self {
            source,
            extensions,
            poll_interval: Duration::from_millis(cli.poll_interval_ms),
            ledger_path: cli.ledger,
            recency_window,
            process_backlog: cli.process_backlog,
            on_modify: cli.on_modify,
            max_attempts: cli.max_attempts,
            output,
            paper: cli.paper,
            doc_prefix: cli.doc_prefix,
            text,
            log_level: cli.log_level,
            log_dir: cli.log_dir,
        })
    }
}
