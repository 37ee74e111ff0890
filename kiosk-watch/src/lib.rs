//! kiosk-watch - silent printing of newly uploaded files
//!
//! # Architecture
//!
//! Every poll interval the watched container (S3 bucket or local folder) is
//! listed and compared with the previous listing. Keys that are new or
//! modified, match the extension allow-list and are not in the ledger yet
//! are delivered one at a time: fetched into a temporary file, rendered onto
//! the template when they are text, and submitted to the printer. Only a
//! successful submission is recorded in the ledger.
//!
//! # Module structure
//!
//! ```text
//! kiosk-watch/src/
//! ├── core/          # config, startup errors, poll loop
//! ├── source/        # snapshot sources (S3, folder), temp items
//! ├── tracking/      # ledger, change detector, retry queue
//! ├── delivery/      # fetch -> render -> submit -> record
//! └── utils/         # logging
//! ```

pub mod core;
pub mod delivery;
pub mod source;
pub mod tracking;
pub mod utils;

pub use crate::core::{Cli, StartupError, WatchConfig, WatchStats, Watcher};
pub use delivery::{DeliveryError, DeliveryStage, Pipeline};
pub use source::{FolderSource, ItemSource, S3Source, Snapshot, SourceError, TempItem};
pub use tracking::{Detector, ExtensionFilter, Ledger, OnModify, RetryQueue};
pub use utils::init_logger;
