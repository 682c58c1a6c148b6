//! Metrics recorder for load rounds
//!
//! Every function is a no-op until a recorder is installed.

use crate::connection::Termination;
use ::metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize metric descriptions (call once at startup)
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    describe_counter!("echoload_requests_sent_total", "Tagged requests sent");
    describe_counter!(
        "echoload_replies_matched_total",
        "Replies matched to an outstanding request"
    );
    describe_counter!(
        "echoload_replies_duplicate_total",
        "Replies ignored because the request was already complete"
    );
    describe_counter!(
        "echoload_replies_late_total",
        "Replies that arrived while no batch was open or carried an unknown tag"
    );
    describe_counter!(
        "echoload_requests_abandoned_total",
        "Requests still outstanding when their batch resolved"
    );
    describe_counter!(
        "echoload_batches_resolved_total",
        "Batches resolved, labelled by termination reason"
    );

    describe_gauge!("echoload_live_connections", "Currently open connections");

    describe_histogram!(
        "echoload_round_trip_seconds",
        "Round-trip time of matched requests"
    );
    describe_histogram!(
        "echoload_connect_seconds",
        "Time to connect all connections added in a round"
    );
    describe_histogram!(
        "echoload_round_duration_seconds",
        "Dispatch phase duration per round"
    );
    describe_histogram!(
        "echoload_round_success_ratio",
        "Completed over attempted requests per round"
    );
}

// ============== Request Operations ==============

pub fn record_request_sent() {
    counter!("echoload_requests_sent_total").increment(1);
}

pub fn record_reply(round_trip: Duration) {
    counter!("echoload_replies_matched_total").increment(1);
    histogram!("echoload_round_trip_seconds").record(round_trip.as_secs_f64());
}

pub fn record_duplicate_reply() {
    counter!("echoload_replies_duplicate_total").increment(1);
}

pub fn record_late_reply() {
    counter!("echoload_replies_late_total").increment(1);
}

pub fn record_batch_resolved(termination: Termination, abandoned: usize) {
    let reason = match termination {
        Termination::AllAcknowledged => "all_acknowledged",
        Termination::AllComplete => "all_complete",
        Termination::Stagnated => "stagnated",
    };
    counter!("echoload_batches_resolved_total", "reason" => reason).increment(1);
    counter!("echoload_requests_abandoned_total").increment(abandoned as u64);
}

// ============== Connection Operations ==============

pub fn connection_opened() {
    gauge!("echoload_live_connections").increment(1.0);
}

pub fn connection_closed() {
    gauge!("echoload_live_connections").decrement(1.0);
}

pub fn record_connect_time(elapsed: Duration) {
    histogram!("echoload_connect_seconds").record(elapsed.as_secs_f64());
}

// ============== Round Operations ==============

pub fn record_round(round: usize, duration: Duration, completed: usize, attempted: usize) {
    histogram!("echoload_round_duration_seconds", "round" => round.to_string())
        .record(duration.as_secs_f64());

    let ratio = if attempted > 0 {
        completed as f64 / attempted as f64
    } else {
        0.0
    };
    histogram!("echoload_round_success_ratio").record(ratio);
}

/// Times the dispatch phase of a round
pub struct RoundTimer {
    round: usize,
    start_time: Instant,
}

impl RoundTimer {
    pub fn start(round: usize) -> Self {
        Self {
            round,
            start_time: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Stop timing and record the round outcome
    pub fn stop(self, completed: usize, attempted: usize) -> Duration {
        let duration = self.elapsed();
        record_round(self.round, duration, completed, attempted);
        duration
    }
}
