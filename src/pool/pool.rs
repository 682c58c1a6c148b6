use crate::channel::Transport;
use crate::config::BenchConfig;
use crate::connection::Connection;
use crate::metrics;
use crate::pool::error::ConnectError;
use crate::pool::types::RoundData;
use crate::stats::RunProgress;
use futures::future::{join_all, try_join_all};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Grows the connection population round over round and fans out batches
pub struct ConnectionPool<T: Transport> {
    transport: T,
    config: Arc<BenchConfig>,
    progress: Arc<RunProgress>,
    connections: Vec<Connection<T::Sink>>,
}

impl<T: Transport> ConnectionPool<T> {
    pub fn new(transport: T, config: Arc<BenchConfig>, progress: Arc<RunProgress>) -> Self {
        Self {
            transport,
            config,
            progress,
            connections: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Connect this round's new connections concurrently
    ///
    /// Returns the elapsed time from the first open to the last successful
    /// connect. Any failure aborts the ramp-up; nothing is retried.
    pub async fn ramp_up(&mut self, round: usize) -> Result<Duration, ConnectError> {
        let added = self.config.connections_per_round;
        let existing = added * round;
        debug_assert_eq!(
            existing,
            self.connections.len(),
            "rounds must ramp up in order"
        );
        self.progress
            .expect_connections(self.config.cumulative_connections(round));

        let started = Instant::now();
        let transport = &self.transport;
        let config = &self.config;
        let progress = &self.progress;

        let opened = try_join_all((existing..existing + added).map(|connection_id| async move {
            Connection::connect(connection_id, transport, config.clone(), progress.clone())
                .await
                .map_err(|source| ConnectError {
                    connection_id,
                    source,
                })
        }))
        .await?;
        let connect_time = started.elapsed();

        self.connections.extend(opened);
        metrics::record_connect_time(connect_time);
        tracing::info!(
            round,
            added,
            total = self.connections.len(),
            "Connected in {:?}",
            connect_time
        );
        Ok(connect_time)
    }

    /// Run one batch on every connection and wait for all of them to resolve
    pub async fn dispatch(&mut self, round: usize, connect_time: Duration) -> RoundData {
        let cumulative_connections = self.connections.len();
        debug_assert_eq!(
            cumulative_connections,
            self.config.cumulative_connections(round)
        );
        self.progress
            .expect_replies(self.config.attempted_requests(round));

        let batches = join_all(self.connections.iter_mut().map(|conn| conn.send_batch())).await;

        RoundData {
            index: round,
            cumulative_connections,
            batches,
            connect_time,
        }
    }

    /// Close every connection, best effort
    pub async fn close_all(&mut self) {
        let count = self.connections.len();
        join_all(self.connections.drain(..).map(Connection::close)).await;
        tracing::info!("Closed {} connections", count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{EchoBehaviour, MemoryTransport};
    use crate::connection::Termination;

    fn config(per_round: usize, requests: usize) -> Arc<BenchConfig> {
        Arc::new(BenchConfig {
            target_address: "memory".into(),
            connections_per_round: per_round,
            requests_per_connection: requests,
            max_stagnant_ticks: 20,
            ..Default::default()
        })
    }

    fn pool(transport: MemoryTransport, config: Arc<BenchConfig>) -> ConnectionPool<MemoryTransport> {
        ConnectionPool::new(transport, config, Arc::new(RunProgress::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_ramp_up_is_cumulative() {
        let mut pool = pool(MemoryTransport::echo(), config(3, 2));

        for round in 0..4 {
            pool.ramp_up(round).await.unwrap();
            assert_eq!(pool.len(), 3 * (round + 1));
        }
        assert_eq!(pool.transport().channels_opened(), 12);
        pool.close_all().await;
        assert!(pool.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_covers_every_connection() {
        let mut pool = pool(MemoryTransport::echo(), config(2, 3));
        pool.ramp_up(0).await.unwrap();
        pool.ramp_up(1).await.unwrap();

        let round = pool.dispatch(1, Duration::ZERO).await;
        assert_eq!(round.cumulative_connections, 4);
        assert_eq!(round.connection_count(), 4);
        for (id, batch) in round.batches.iter().enumerate() {
            assert_eq!(batch.connection_id, id);
            assert_eq!(batch.completed(), 3);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_waits_for_slowest_connection() {
        let transport = MemoryTransport::echo().with_behaviour(1, EchoBehaviour::Silent);
        let mut pool = pool(transport, config(2, 3));
        pool.ramp_up(0).await.unwrap();

        let started = Instant::now();
        let round = pool.dispatch(0, Duration::ZERO).await;

        assert_eq!(round.batches[0].termination, Termination::AllAcknowledged);
        assert_eq!(round.batches[1].termination, Termination::Stagnated);
        assert_eq!(round.batches[1].ticks, 20);
        assert_eq!(started.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_connect_failure_is_fatal() {
        let transport = MemoryTransport::echo().failing_open_at(4);
        let mut pool = pool(transport, config(3, 1));

        pool.ramp_up(0).await.unwrap();
        let err = pool.ramp_up(1).await.unwrap_err();
        assert_eq!(err.connection_id, 4);
        assert_eq!(pool.len(), 3);
    }
}
