//! Processed-set ledger
//!
//! Append-only text file, one `key,YYYY-MM-DD HH:MM:SS` line per successful
//! delivery. Only the part before the first comma is read back, so a key
//! containing a comma is not recognised after a restart.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::{info, warn};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
#[error("Ledger append to {path} failed: {source}")]
pub struct LedgerError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

pub struct Ledger {
    path: PathBuf,
    keys: HashSet<String>,
    /// Cleared after the first failed append; the run continues in memory
    durable: bool,
}

impl Ledger {
    /// Load the ledger, starting empty if the file is missing or unreadable
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let keys = match std::fs::read(&path) {
            Ok(bytes) => {
                let keys = parse_keys(&String::from_utf8_lossy(&bytes));
                info!(path = %path.display(), count = keys.len(), "Ledger loaded");
                keys
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Ledger not found, starting empty");
                HashSet::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ledger unreadable, starting empty");
                HashSet::new()
            }
        };

        Self {
            path,
            keys,
            durable: true,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn keys(&self) -> &HashSet<String> {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Whether appends still reach the file
    pub fn is_durable(&self) -> bool {
        self.durable
    }

    /// Mark `key` as delivered
    ///
    /// The key is always added in memory. A failed append is returned once;
    /// later records stay in memory only.
    pub fn record(&mut self, key: &str, at: DateTime<Local>) -> Result<(), LedgerError> {
        self.keys.insert(key.to_string());

        if !self.durable {
            return Ok(());
        }

        let line = format!("{},{}\n", key, at.format(TIMESTAMP_FORMAT));
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(line.as_bytes()));

        result.map_err(|source| {
            self.durable = false;
            LedgerError {
                path: self.path.clone(),
                source,
            }
        })
    }
}

/// Keys of every non-empty line (text before the first comma)
pub fn parse_keys(contents: &str) -> HashSet<String> {
    contents
        .lines()
        .filter_map(|line| line.split_once(','))
        .map(|(key, _)| key.to_string())
        .filter(|key| !key.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_load_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("printed_files.txt");
        std::fs::write(&path, "note.txt,2024-01-01 00:00:00\n").unwrap();

        let ledger = Ledger::load(&path);
        assert_eq!(ledger.len(), 1);
        assert!(ledger.contains("note.txt"));
    }

    #[test]
    fn test_missing_file_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::load(dir.path().join("absent.txt"));
        assert!(ledger.is_empty());
        assert!(ledger.is_durable());
    }

    #[test]
    fn test_unreadable_path_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be read as a file
        let ledger = Ledger::load(dir.path());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_record_then_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("printed_files.txt");
        let at = Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();

        let mut ledger = Ledger::load(&path);
        ledger.record("badges/anna.png", at).unwrap();
        assert!(ledger.contains("badges/anna.png"));

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "badges/anna.png,2024-03-05 14:07:09\n");

        let reloaded = Ledger::load(&path);
        assert!(reloaded.contains("badges/anna.png"));
    }

    #[test]
    fn test_append_failure_keeps_key_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("printed_files.txt");

        let mut ledger = Ledger::load(&path);
        let err = ledger.record("a.png", Local::now()).unwrap_err();
        assert_eq!(err.path, path);
        assert!(ledger.contains("a.png"));
        assert!(!ledger.is_durable());

        // Degraded: later records stay in memory without erroring again
        ledger.record("b.png", Local::now()).unwrap();
        assert!(ledger.contains("b.png"));
    }

    #[test]
    fn test_parse_keys_skips_malformed_lines() {
        let keys = parse_keys("a.txt,2024-01-01 00:00:00\n\nno-comma\n,2024-01-01 00:00:00\nb,c,d\n");
        assert_eq!(keys.len(), 2);
        assert!(keys.contains("a.txt"));
        assert!(keys.contains("b"));
    }
}
