use crate::connection::Termination;
use crate::pool::RoundData;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Connections per termination reason in one round
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TerminationCounts {
    pub all_acknowledged: usize,
    pub all_complete: usize,
    pub stagnated: usize,
}

impl TerminationCounts {
    fn add(&mut self, termination: Termination) {
        match termination {
            Termination::AllAcknowledged => self.all_acknowledged += 1,
            Termination::AllComplete => self.all_complete += 1,
            Termination::Stagnated => self.stagnated += 1,
        }
    }
}

/// Summary of one round's completed requests
///
/// Latency fields are `None` when nothing completed: an empty round has no
/// average rather than an average of zero.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundStats {
    pub completed: usize,
    pub attempted: usize,
    pub earliest_start: Option<Instant>,
    pub latest_finish: Option<Instant>,
    pub min_round_trip: Option<Duration>,
    pub max_round_trip: Option<Duration>,
    pub avg_round_trip: Option<Duration>,
    pub terminations: TerminationCounts,
}

impl RoundStats {
    pub fn success_ratio(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        self.completed as f64 / self.attempted as f64
    }

    /// Time from the earliest completed request's start to the latest finish
    pub fn elapsed(&self) -> Option<Duration> {
        match (self.earliest_start, self.latest_finish) {
            (Some(start), Some(finish)) => Some(finish.saturating_duration_since(start)),
            _ => None,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.completed == 0
    }
}

/// Reduces a round's raw records into [`RoundStats`]
#[derive(Debug, Clone, Copy)]
pub struct StatsAggregator {
    requests_per_connection: usize,
}

impl StatsAggregator {
    pub fn new(requests_per_connection: usize) -> Self {
        Self {
            requests_per_connection,
        }
    }

    pub fn reduce(&self, round: &RoundData) -> RoundStats {
        let mut completed = 0usize;
        let mut earliest_start: Option<Instant> = None;
        let mut latest_finish: Option<Instant> = None;
        let mut min_round_trip: Option<Duration> = None;
        let mut max_round_trip: Option<Duration> = None;
        let mut total_round_trip = Duration::ZERO;
        let mut terminations = TerminationCounts::default();

        for batch in &round.batches {
            terminations.add(batch.termination);

            for record in &batch.records {
                let (Some(finish), Some(round_trip)) = (record.finish, record.round_trip()) else {
                    continue;
                };

                earliest_start = Some(earliest_start.map_or(record.start, |s| s.min(record.start)));
                latest_finish = Some(latest_finish.map_or(finish, |f| f.max(finish)));
                min_round_trip = Some(min_round_trip.map_or(round_trip, |m| m.min(round_trip)));
                max_round_trip = Some(max_round_trip.map_or(round_trip, |m| m.max(round_trip)));
                total_round_trip += round_trip;
                completed += 1;
            }
        }

        let avg_round_trip = (completed > 0)
            .then(|| Duration::from_nanos((total_round_trip.as_nanos() / completed as u128) as u64));

        RoundStats {
            completed,
            attempted: self.requests_per_connection * round.connection_count(),
            earliest_start,
            latest_finish,
            min_round_trip,
            max_round_trip,
            avg_round_trip,
            terminations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{BatchOutcome, RequestRecord};

    fn record(id: usize, base: Instant, start_ms: u64, rtt_ms: Option<u64>) -> RequestRecord {
        let start = base + Duration::from_millis(start_ms);
        let mut record = RequestRecord::started(id, start);
        if let Some(rtt) = rtt_ms {
            record.complete(start + Duration::from_millis(rtt));
        }
        record
    }

    fn round(batches: Vec<BatchOutcome>) -> RoundData {
        RoundData {
            index: 0,
            cumulative_connections: batches.len(),
            batches,
            connect_time: Duration::ZERO,
        }
    }

    fn batch(id: usize, records: Vec<RequestRecord>, termination: Termination) -> BatchOutcome {
        BatchOutcome {
            connection_id: id,
            records,
            termination,
            ticks: 1,
        }
    }

    #[test]
    fn test_average_of_known_round_trips() {
        let base = Instant::now();
        let data = round(vec![batch(
            0,
            vec![
                record(0, base, 0, Some(10)),
                record(1, base, 1, Some(20)),
                record(2, base, 2, Some(30)),
            ],
            Termination::AllAcknowledged,
        )]);

        let stats = StatsAggregator::new(3).reduce(&data);
        assert_eq!(stats.completed, 3);
        assert_eq!(stats.attempted, 3);
        assert_eq!(stats.avg_round_trip, Some(Duration::from_millis(20)));
        assert_eq!(stats.min_round_trip, Some(Duration::from_millis(10)));
        assert_eq!(stats.max_round_trip, Some(Duration::from_millis(30)));
        assert_eq!(stats.earliest_start, Some(base));
        assert_eq!(stats.elapsed(), Some(Duration::from_millis(32)));
        assert_eq!(stats.success_ratio(), 1.0);
    }

    #[test]
    fn test_incomplete_records_ignored() {
        let base = Instant::now();
        let data = round(vec![
            batch(
                0,
                vec![record(0, base, 0, Some(5)), record(1, base, 0, None)],
                Termination::Stagnated,
            ),
            batch(
                1,
                vec![record(0, base, 0, None), record(1, base, 0, None)],
                Termination::Stagnated,
            ),
        ]);

        let stats = StatsAggregator::new(2).reduce(&data);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.attempted, 4);
        assert_eq!(stats.success_ratio(), 0.25);
        assert_eq!(stats.terminations.stagnated, 2);
    }

    #[test]
    fn test_empty_round_is_degenerate_not_zero() {
        let base = Instant::now();
        let data = round(vec![batch(
            0,
            vec![record(0, base, 0, None)],
            Termination::Stagnated,
        )]);

        let stats = StatsAggregator::new(1).reduce(&data);
        assert!(stats.is_degenerate());
        assert_eq!(stats.avg_round_trip, None);
        assert_eq!(stats.min_round_trip, None);
        assert_eq!(stats.elapsed(), None);
        assert_eq!(stats.success_ratio(), 0.0);
    }

    #[test]
    fn test_attempted_uses_full_batch_size() {
        // A batch cut short still counts every request it should have sent
        let base = Instant::now();
        let data = round(vec![batch(
            0,
            vec![record(0, base, 0, Some(1))],
            Termination::AllComplete,
        )]);

        let stats = StatsAggregator::new(10).reduce(&data);
        assert_eq!(stats.attempted, 10);
        assert_eq!(stats.terminations.all_complete, 1);
    }
}
