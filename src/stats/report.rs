//! Round reports and the sinks they are written to

use crate::config::BenchConfig;
use crate::stats::aggregator::{RoundStats, TerminationCounts};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::time::Duration;

/// Serializable per-round summary; latencies in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundReport {
    pub run_id: String,
    /// 1-based round number
    pub round: usize,
    pub total_rounds: usize,
    pub connections: usize,
    pub connect_time_ms: f64,
    pub completed: usize,
    pub attempted: usize,
    pub success_percent: f64,
    pub elapsed_ms: Option<f64>,
    pub min_round_trip_ms: Option<f64>,
    pub max_round_trip_ms: Option<f64>,
    pub avg_round_trip_ms: Option<f64>,
    pub terminations: TerminationCounts,
    pub timestamp: i64,
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

impl RoundReport {
    pub fn new(
        run_id: &str,
        round_index: usize,
        total_rounds: usize,
        connections: usize,
        connect_time: Duration,
        stats: &RoundStats,
    ) -> Self {
        Self {
            run_id: run_id.to_string(),
            round: round_index + 1,
            total_rounds,
            connections,
            connect_time_ms: millis(connect_time),
            completed: stats.completed,
            attempted: stats.attempted,
            success_percent: stats.success_ratio() * 100.0,
            elapsed_ms: stats.elapsed().map(millis),
            min_round_trip_ms: stats.min_round_trip.map(millis),
            max_round_trip_ms: stats.max_round_trip.map(millis),
            avg_round_trip_ms: stats.avg_round_trip.map(millis),
            terminations: stats.terminations,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    /// Human-readable lines: counts first, then latencies
    pub fn summary_lines(&self) -> [String; 2] {
        let elapsed = self
            .elapsed_ms
            .map_or_else(|| "n/a".to_string(), |ms| format!("{ms:.0}"));
        let counts = format!(
            "Count: {}/{} ({:.1}%) | Time Elapse: {}",
            self.completed, self.attempted, self.success_percent, elapsed
        );

        let latency = match (
            self.max_round_trip_ms,
            self.min_round_trip_ms,
            self.avg_round_trip_ms,
        ) {
            (Some(max), Some(min), Some(avg)) => format!(
                "Longest Trip: {max:.2} | Shortest Trip: {min:.2} | Average Trip: {avg:.2}"
            ),
            _ => "Longest Trip: n/a | Shortest Trip: n/a | Average Trip: n/a (no completed requests)"
                .to_string(),
        };

        [counts, latency]
    }
}

/// Where round progress and results are reported
pub trait ReportSink: Send + Sync {
    fn run_started(&self, _run_id: &str, _config: &BenchConfig) {}

    fn round_started(&self, _round: usize, _total_rounds: usize) {}

    fn connection_time(&self, round: usize, elapsed: Duration);

    fn round_report(&self, report: &RoundReport);
}

/// Plain-text reporter in the classic two-line format
pub struct ConsoleReporter<W: Write + Send> {
    out: Mutex<W>,
}

impl ConsoleReporter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn emit(&self, text: &str) {
        let mut out = self.out.lock();
        if let Err(e) = writeln!(out, "{text}").and_then(|_| out.flush()) {
            tracing::warn!("Failed to write report: {}", e);
        }
    }
}

impl<W: Write + Send> ReportSink for ConsoleReporter<W> {
    fn round_started(&self, round: usize, total_rounds: usize) {
        self.emit(&format!("\nTest: {}/{}", round + 1, total_rounds));
    }

    fn connection_time(&self, _round: usize, elapsed: Duration) {
        self.emit(&format!("Connection Time: {:.0}", millis(elapsed)));
    }

    fn round_report(&self, report: &RoundReport) {
        let [counts, latency] = report.summary_lines();
        self.emit(&counts);
        self.emit(&latency);
    }
}

/// One JSON object per round
pub struct JsonReporter<W: Write + Send> {
    out: Mutex<W>,
}

impl JsonReporter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write + Send> JsonReporter<W> {
    fn emit<T: Serialize>(&self, value: &T) {
        let mut out = self.out.lock();
        let written = serde_json::to_writer(&mut *out, value)
            .map_err(std::io::Error::from)
            .and_then(|_| writeln!(out))
            .and_then(|_| out.flush());
        if let Err(e) = written {
            tracing::warn!("Failed to write report: {}", e);
        }
    }
}

#[derive(Serialize)]
struct RunHeader<'a> {
    run_id: &'a str,
    config: &'a BenchConfig,
}

impl<W: Write + Send> ReportSink for JsonReporter<W> {
    fn run_started(&self, run_id: &str, config: &BenchConfig) {
        self.emit(&RunHeader { run_id, config });
    }

    fn connection_time(&self, _round: usize, _elapsed: Duration) {}

    fn round_report(&self, report: &RoundReport) {
        self.emit(report);
    }
}
