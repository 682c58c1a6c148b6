use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Run-wide progress counters shared by every connection
#[derive(Debug, Default)]
pub struct RunProgress {
    connections: AtomicUsize,
    connections_expected: AtomicUsize,
    replies: AtomicUsize,
    replies_expected: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub connections: usize,
    pub connections_expected: usize,
    pub replies: usize,
    pub replies_expected: usize,
}

impl RunProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_connections(&self, total: usize) {
        self.connections_expected.store(total, Ordering::Relaxed);
    }

    pub fn connection_established(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn expect_replies(&self, additional: usize) {
        self.replies_expected.fetch_add(additional, Ordering::Relaxed);
    }

    pub fn reply_matched(&self) {
        self.replies.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            connections: self.connections.load(Ordering::Relaxed),
            connections_expected: self.connections_expected.load(Ordering::Relaxed),
            replies: self.replies.load(Ordering::Relaxed),
            replies_expected: self.replies_expected.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let progress = RunProgress::new();
        progress.expect_connections(4);
        progress.connection_established();
        progress.connection_established();
        progress.expect_replies(10);
        progress.expect_replies(10);
        progress.reply_matched();

        assert_eq!(
            progress.snapshot(),
            ProgressSnapshot {
                connections: 2,
                connections_expected: 4,
                replies: 1,
                replies_expected: 20,
            }
        );
    }
}
