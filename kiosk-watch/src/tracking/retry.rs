//! Retry queue for failed deliveries
//!
//! The detector only sees changes between two listings, so a key whose
//! delivery failed would never come back on an unchanged listing. Failed keys
//! are kept here and handed back every iteration while they are still listed.

use std::collections::BTreeMap;

use crate::source::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again next iteration
    Retry { attempts: u32 },
    /// Attempt cap reached; key dropped from the queue
    GiveUp { attempts: u32 },
}

#[derive(Debug, Default)]
pub struct RetryQueue {
    attempts: BTreeMap<String, u32>,
    max_attempts: Option<u32>,
}

impl RetryQueue {
    /// `None` retries forever
    pub fn new(max_attempts: Option<u32>) -> Self {
        Self {
            attempts: BTreeMap::new(),
            max_attempts,
        }
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    pub fn attempts(&self, key: &str) -> u32 {
        self.attempts.get(key).copied().unwrap_or(0)
    }

    /// Keys to attempt again; keys no longer listed are forgotten
    pub fn due(&mut self, current: &Snapshot) -> Vec<String> {
        self.attempts.retain(|key, _| current.contains(key));
        self.attempts.keys().cloned().collect()
    }

    pub fn record_failure(&mut self, key: &str) -> RetryDecision {
        let attempts = {
            let entry = self.attempts.entry(key.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };

        match self.max_attempts {
            Some(max) if attempts >= max => {
                self.attempts.remove(key);
                RetryDecision::GiveUp { attempts }
            }
            _ => RetryDecision::Retry { attempts },
        }
    }

    pub fn record_success(&mut self, key: &str) {
        self.attempts.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_unbounded_retry() {
        let mut queue = RetryQueue::new(None);
        for n in 1..=5 {
            assert_eq!(
                queue.record_failure("a.png"),
                RetryDecision::Retry { attempts: n }
            );
        }
        assert_eq!(queue.attempts("a.png"), 5);
    }

    #[test]
    fn test_capped_retry_gives_up() {
        let mut queue = RetryQueue::new(Some(2));
        assert_eq!(
            queue.record_failure("a.png"),
            RetryDecision::Retry { attempts: 1 }
        );
        assert_eq!(
            queue.record_failure("a.png"),
            RetryDecision::GiveUp { attempts: 2 }
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_due_forgets_unlisted_keys() {
        let mut queue = RetryQueue::new(None);
        queue.record_failure("a.png");
        queue.record_failure("b.png");

        let current: Snapshot = [("a.png", Utc::now())].into_iter().collect();
        assert_eq!(queue.due(&current), vec!["a.png"]);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_success_clears_key() {
        let mut queue = RetryQueue::new(Some(3));
        queue.record_failure("a.png");
        queue.record_success("a.png");
        assert_eq!(queue.attempts("a.png"), 0);
        assert!(queue.is_empty());
    }
}
