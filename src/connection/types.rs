use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Timing of one tagged request within a batch
#[derive(Debug, Clone, PartialEq)]
pub struct RequestRecord {
    pub sequence_id: usize,
    pub start: Instant,
    pub received: Option<Instant>,
    pub finish: Option<Instant>,
}

impl RequestRecord {
    pub fn started(sequence_id: usize, start: Instant) -> Self {
        Self {
            sequence_id,
            start,
            received: None,
            finish: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.received.is_some() && self.finish.is_some()
    }

    /// Stamp the reply; only the first reply for a tag is kept
    pub fn complete(&mut self, now: Instant) -> bool {
        if self.received.is_some() || self.finish.is_some() {
            return false;
        }
        self.received = Some(now);
        self.finish = Some(now);
        true
    }

    /// `finish - start` for complete records
    pub fn round_trip(&self) -> Option<Duration> {
        match (self.received, self.finish) {
            (Some(_), Some(finish)) => Some(finish.saturating_duration_since(self.start)),
            _ => None,
        }
    }
}

/// Which detector condition resolved a batch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Termination {
    /// Success count reached the batch size
    AllAcknowledged,
    /// Every record carries all timestamps
    AllComplete,
    /// Success count stopped moving and was either good enough or out of time
    Stagnated,
}

/// A resolved batch for one connection
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub connection_id: usize,
    pub records: Vec<RequestRecord>,
    pub termination: Termination,
    /// Detector ticks spent waiting for replies
    pub ticks: u32,
}

impl BatchOutcome {
    pub fn completed(&self) -> usize {
        self.records.iter().filter(|r| r.is_complete()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_reply_wins() {
        let start = Instant::now();
        let mut record = RequestRecord::started(3, start);
        assert!(!record.is_complete());
        assert_eq!(record.round_trip(), None);

        let first = start + Duration::from_millis(10);
        assert!(record.complete(first));
        assert!(!record.complete(first + Duration::from_millis(50)));

        assert_eq!(record.finish, Some(first));
        assert_eq!(record.round_trip(), Some(Duration::from_millis(10)));
    }
}
