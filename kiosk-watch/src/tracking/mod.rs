//! Delivery bookkeeping - what was printed, what changed, what to retry

pub mod detector;
pub mod ledger;
pub mod retry;

pub use detector::{Detector, ExtensionFilter, OnModify};
pub use ledger::{Ledger, LedgerError};
pub use retry::{RetryDecision, RetryQueue};
