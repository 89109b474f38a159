//! The bounded log ring referenced throughout §8: newest entries pushed in, oldest dropped
//! once the ring is at capacity. `VecDeque::push_back` plus an occasional `pop_front` keeps
//! insertion O(1) amortized, which a `Vec`-with-`split_off` truncation strategy would not.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

pub const LOG_RING_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp_millis: u64,
    pub severity: Severity,
    pub message: String,
}

impl LogEntry {
    pub fn new(timestamp_millis: u64, severity: Severity, message: impl Into<String>) -> Self {
        Self { timestamp_millis, severity, message: message.into() }
    }
}

/// §8 invariant 6: never exceeds `LOG_RING_CAPACITY` entries, O(1) amortized insertion.
#[derive(Debug, Clone, Default)]
pub struct LogRing {
    entries: VecDeque<LogEntry>,
}

impl LogRing {
    pub fn new() -> Self {
        Self { entries: VecDeque::with_capacity(LOG_RING_CAPACITY) }
    }

    pub fn push(&mut self, entry: LogEntry) {
        if self.entries.len() >= LOG_RING_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Newest-last snapshot, matching the ordering the Overlay View Model (C10) reads.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_exceeds_capacity() {
        let mut ring = LogRing::new();
        for i in 0..(LOG_RING_CAPACITY * 3) {
            ring.push(LogEntry::new(i as u64, Severity::Info, format!("entry {i}")));
        }
        assert_eq!(ring.len(), LOG_RING_CAPACITY);
    }

    #[test]
    fn drops_oldest_first() {
        let mut ring = LogRing::new();
        for i in 0..(LOG_RING_CAPACITY + 5) {
            ring.push(LogEntry::new(i as u64, Severity::Info, format!("entry {i}")));
        }
        let snapshot = ring.snapshot();
        assert_eq!(snapshot.first().unwrap().timestamp_millis, 5);
        assert_eq!(snapshot.last().unwrap().timestamp_millis, (LOG_RING_CAPACITY + 4) as u64);
    }

    #[test]
    fn snapshot_is_newest_last() {
        let mut ring = LogRing::new();
        ring.push(LogEntry::new(1, Severity::Info, "a"));
        ring.push(LogEntry::new(2, Severity::Warn, "b"));
        let snapshot = ring.snapshot();
        assert_eq!(snapshot[0].message, "a");
        assert_eq!(snapshot[1].message, "b");
    }
}
