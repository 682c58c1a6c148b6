use crate::connection::BatchOutcome;
use std::time::Duration;

/// Everything one round produced, handed to the aggregator
#[derive(Debug, Clone)]
pub struct RoundData {
    pub index: usize,
    pub cumulative_connections: usize,
    /// One resolved batch per connection, ordered by connection id
    pub batches: Vec<BatchOutcome>,
    pub connect_time: Duration,
}

impl RoundData {
    pub fn connection_count(&self) -> usize {
        self.batches.len()
    }
}
