//! Change detector
//!
//! Pure function of two snapshots, the ledger set and the current time.

use std::collections::HashSet;

use chrono::{DateTime, TimeDelta, Utc};

use crate::source::Snapshot;

/// What to do with a delivered key whose timestamp later increases
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OnModify {
    /// The ledger wins: a delivered key is never selected again
    #[default]
    Ignore,
    /// A strictly newer timestamp selects the key again
    Reprint,
}

/// Case-insensitive suffix allow-list; empty allows everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionFilter {
    suffixes: Vec<String>,
}

impl ExtensionFilter {
    /// Suffixes are normalised to lowercase with a leading dot
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let suffixes = suffixes
            .into_iter()
            .map(|s| normalize_suffix(s.as_ref()))
            .filter(|s| s.len() > 1)
            .collect();
        Self { suffixes }
    }

    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    pub fn allows(&self, key: &str) -> bool {
        if self.suffixes.is_empty() {
            return true;
        }
        let key = key.to_lowercase();
        self.suffixes.iter().any(|s| key.ends_with(s.as_str()))
    }
}

pub fn normalize_suffix(s: &str) -> String {
    let s = s.trim().to_lowercase();
    if s.starts_with('.') { s } else { format!(".{s}") }
}

#[derive(Debug, Clone, Default)]
pub struct Detector {
    filter: ExtensionFilter,
    recency_window: Option<TimeDelta>,
    on_modify: OnModify,
}

impl Detector {
    pub fn new(filter: ExtensionFilter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    /// Skip items modified longer ago than `window`
    pub fn with_recency_window(mut self, window: Option<TimeDelta>) -> Self {
        self.recency_window = window;
        self
    }

    pub fn with_on_modify(mut self, on_modify: OnModify) -> Self {
        self.on_modify = on_modify;
        self
    }

    pub fn filter(&self) -> &ExtensionFilter {
        &self.filter
    }

    /// Keys of `current` that are new or modified relative to `previous`,
    /// not already delivered and recent enough, in listing order
    pub fn select(
        &self,
        previous: &Snapshot,
        current: &Snapshot,
        ledger: &HashSet<String>,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        current
            .iter()
            .filter(|(key, _)| self.filter.allows(key))
            .filter(|(key, modified)| {
                let (is_new, is_modified) = match previous.get(key) {
                    None => (true, false),
                    Some(before) => (false, *modified > before),
                };
                if !(is_new || is_modified) {
                    return false;
                }
                if ledger.contains(*key) {
                    return self.on_modify == OnModify::Reprint && is_modified;
                }
                true
            })
            .filter(|(_, modified)| match self.recency_window {
                Some(window) => now - *modified <= window,
                None => true,
            })
            .map(|(key, _)| key.to_string())
            .collect()
    }
}
