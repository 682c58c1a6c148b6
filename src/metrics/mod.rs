//! Metrics and observability module
//!
//! Prometheus-compatible metrics for a load run.
//!
//! Key metrics exposed:
//! - Requests sent, replies matched, duplicates and late replies ignored
//! - Requests abandoned by the stagnation detector
//! - Live connections and connect time per round
//! - Round-trip latency and round duration distributions

pub mod exporter;
pub mod recorder;

pub use exporter::{start_metrics_server, MetricsConfig, MetricsError};
pub use recorder::{
    connection_closed, connection_opened, init_metrics, record_batch_resolved,
    record_connect_time, record_duplicate_reply, record_late_reply, record_reply,
    record_request_sent, record_round, RoundTimer,
};
