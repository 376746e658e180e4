//! In-memory response log holding the most recent entries.

use super::{LogEntry, ResponseSink};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Bounded ring buffer of log entries; the oldest entry is dropped when full.
#[derive(Debug)]
pub struct MemoryResponseLog {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
}

impl MemoryResponseLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    /// Snapshot of the retained entries, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResponseSink for MemoryResponseLog {
    fn record(&self, entry: LogEntry) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response_log::LogMetadata;
    use crate::types::BackendKind;

    fn entry(prompt: &str) -> LogEntry {
        LogEntry::new(
            BackendKind::Gemini,
            "gemini-1.5-flash",
            prompt,
            "img.jpg",
            None,
            LogMetadata {
                processing_time_ms: 1,
                tokens: None,
            },
            None,
        )
    }

    #[test]
    fn test_ring_buffer_drops_oldest() {
        let log = MemoryResponseLog::new(2);
        assert!(log.is_empty());
        log.record(entry("one"));
        log.record(entry("two"));
        log.record(entry("three"));

        let prompts: Vec<String> = log.entries().into_iter().map(|e| e.prompt).collect();
        assert_eq!(prompts, vec!["two", "three"]);
        assert_eq!(log.len(), 2);
    }
}
