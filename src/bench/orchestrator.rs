use crate::bench::error::{BenchError, BenchResult};
use crate::bench::types::RunPhase;
use crate::channel::Transport;
use crate::config::BenchConfig;
use crate::metrics::RoundTimer;
use crate::pool::ConnectionPool;
use crate::stats::{ProgressSnapshot, ReportSink, RoundReport, RunProgress, StatsAggregator};
use parking_lot::RwLock;
use std::sync::Arc;

/// Drives the configured number of rounds against one transport
pub struct Benchmarker<T: Transport> {
    run_id: String,
    config: Arc<BenchConfig>,
    pool: ConnectionPool<T>,
    aggregator: StatsAggregator,
    progress: Arc<RunProgress>,
    reporter: Arc<dyn ReportSink>,
    phase: RwLock<RunPhase>,
}

impl<T: Transport> Benchmarker<T> {
    pub fn new(
        transport: T,
        config: BenchConfig,
        reporter: Arc<dyn ReportSink>,
    ) -> BenchResult<Self> {
        config.validate()?;

        let config = Arc::new(config);
        let progress = Arc::new(RunProgress::new());
        let pool = ConnectionPool::new(transport, config.clone(), progress.clone());

        Ok(Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            aggregator: StatsAggregator::new(config.requests_per_connection),
            config,
            pool,
            progress,
            reporter,
            phase: RwLock::new(RunPhase::Idle),
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub fn phase(&self) -> RunPhase {
        *self.phase.read()
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    /// Run every round, then close all connections
    ///
    /// Connections are closed even when a connect failure aborts the run.
    pub async fn run(&mut self) -> BenchResult<Vec<RoundReport>> {
        if self.phase() != RunPhase::Idle {
            return Err(BenchError::AlreadyRan);
        }

        tracing::info!(
            run_id = %self.run_id,
            target = %self.config.target_address,
            transport = ?self.config.transport,
            "Starting {} rounds of {} connections x {} requests",
            self.config.total_rounds,
            self.config.connections_per_round,
            self.config.requests_per_connection
        );
        self.reporter.run_started(&self.run_id, &self.config);

        let outcome = self.run_rounds().await;
        if let Err(e) = &outcome {
            tracing::error!(run_id = %self.run_id, "Run aborted: {}", e);
        }

        self.set_phase(RunPhase::Closing);
        self.pool.close_all().await;
        self.set_phase(RunPhase::Done);
        outcome
    }

    async fn run_rounds(&mut self) -> BenchResult<Vec<RoundReport>> {
        let total_rounds = self.config.total_rounds;
        let mut reports = Vec::with_capacity(total_rounds);

        for round in 0..total_rounds {
            self.reporter.round_started(round, total_rounds);

            self.set_phase(RunPhase::RampingUp { round });
            let connect_time = self.pool.ramp_up(round).await?;
            self.reporter.connection_time(round, connect_time);

            self.set_phase(RunPhase::Dispatching { round });
            let timer = RoundTimer::start(round);
            let data = self.pool.dispatch(round, connect_time).await;

            self.set_phase(RunPhase::Aggregating { round });
            let stats = self.aggregator.reduce(&data);
            let duration = timer.stop(stats.completed, stats.attempted);

            let report = RoundReport::new(
                &self.run_id,
                round,
                total_rounds,
                data.connection_count(),
                connect_time,
                &stats,
            );
            tracing::info!(
                round,
                completed = stats.completed,
                attempted = stats.attempted,
                stagnated = stats.terminations.stagnated,
                "Round finished in {:?}",
                duration
            );
            self.reporter.round_report(&report);
            reports.push(report);
        }

        Ok(reports)
    }

    fn set_phase(&self, phase: RunPhase) {
        *self.phase.write() = phase;
        let progress = self.progress.snapshot();
        tracing::info!(
            ?phase,
            round = ?phase.round(),
            connections = progress.connections,
            connections_expected = progress.connections_expected,
            replies = progress.replies,
            replies_expected = progress.replies_expected,
            "Phase changed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{EchoBehaviour, MemoryTransport};
    use crate::config::ConfigError;
    use crate::stats::ConsoleReporter;
    use std::time::Duration;
    use tokio::time::Instant;

    struct NullReporter;

    impl ReportSink for NullReporter {
        fn connection_time(&self, _round: usize, _elapsed: Duration) {}
        fn round_report(&self, _report: &RoundReport) {}
    }

    fn config(per_round: usize, requests: usize, rounds: usize) -> BenchConfig {
        BenchConfig {
            target_address: "memory".into(),
            connections_per_round: per_round,
            requests_per_connection: requests,
            total_rounds: rounds,
            max_stagnant_ticks: 20,
            ..Default::default()
        }
    }

    fn bench(transport: MemoryTransport, config: BenchConfig) -> Benchmarker<MemoryTransport> {
        Benchmarker::new(transport, config, Arc::new(NullReporter)).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_round_all_echoed() {
        let mut bench = bench(MemoryTransport::echo(), config(2, 3, 1));
        let reports = bench.run().await.unwrap();

        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.completed, 6);
        assert_eq!(report.attempted, 6);
        assert_eq!(report.success_percent, 100.0);
        assert_eq!(report.terminations.all_acknowledged, 2);
        assert_eq!(bench.phase(), RunPhase::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_connection_halves_success() {
        let transport = MemoryTransport::echo().with_behaviour(1, EchoBehaviour::Silent);
        let mut bench = bench(transport, config(2, 3, 1));

        let started = Instant::now();
        let reports = bench.run().await.unwrap();

        let report = &reports[0];
        assert_eq!(report.completed, 3);
        assert_eq!(report.success_percent, 50.0);
        assert_eq!(report.terminations.stagnated, 1);
        assert_eq!(started.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connections_grow_every_round() {
        let transport = MemoryTransport::echo();
        let mut bench = bench(transport.clone(), config(2, 3, 3));
        let reports = bench.run().await.unwrap();

        for (k, report) in reports.iter().enumerate() {
            assert_eq!(report.round, k + 1);
            assert_eq!(report.connections, 2 * (k + 1));
            assert_eq!(report.attempted, 3 * 2 * (k + 1));
            assert_eq!(report.completed, report.attempted);
        }
        assert_eq!(transport.channels_opened(), 6);
        assert_eq!(transport.channels_closed(), 6);
        assert_eq!(transport.frames_sent(), 3 * (2 + 4 + 6));

        let progress = bench.progress();
        assert_eq!(progress.connections, 6);
        assert_eq!(progress.replies, progress.replies_expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_aborts_and_closes_pool() {
        let transport = MemoryTransport::echo().failing_open_at(3);
        let mut bench = bench(transport.clone(), config(2, 1, 5));

        let err = bench.run().await.unwrap_err();
        match err {
            BenchError::Connect(e) => assert_eq!(e.connection_id, 3),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(transport.channels_closed(), 2);
        assert_eq!(bench.phase(), RunPhase::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_silent_round_has_no_latency() {
        let mut bench = bench(MemoryTransport::new(EchoBehaviour::Silent), config(1, 2, 1));
        let reports = bench.run().await.unwrap();

        assert_eq!(reports[0].completed, 0);
        assert_eq!(reports[0].avg_round_trip_ms, None);
        assert_eq!(reports[0].elapsed_ms, None);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let result = Benchmarker::new(
            MemoryTransport::echo(),
            config(0, 3, 1),
            Arc::new(NullReporter),
        );
        assert!(matches!(
            result,
            Err(BenchError::Config(ConfigError::ZeroValue("connections_per_round")))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_run_rejected() {
        let mut bench = bench(MemoryTransport::echo(), config(1, 1, 1));
        bench.run().await.unwrap();
        assert!(matches!(bench.run().await, Err(BenchError::AlreadyRan)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_console_output_per_round() {
        let reporter = Arc::new(ConsoleReporter::new(Vec::new()));
        let mut bench =
            Benchmarker::new(MemoryTransport::echo(), config(1, 2, 2), reporter.clone()).unwrap();
        bench.run().await.unwrap();
        drop(bench);

        let reporter = Arc::try_unwrap(reporter).ok().unwrap();
        let text = String::from_utf8(reporter.into_inner()).unwrap();
        assert!(text.contains("Test: 1/2"));
        assert!(text.contains("Test: 2/2"));
        assert!(text.contains("Count: 2/2 (100.0%)"));
        assert!(text.contains("Count: 4/4 (100.0%)"));
        assert_eq!(text.matches("Connection Time:").count(), 2);
    }
}
