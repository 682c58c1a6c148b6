use crate::config::types::{BenchConfig, TransportKind};
use std::net::SocketAddr;
use std::time::Duration;

/// How round reports are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Escalating echo load against a WebSocket or QUIC datagram endpoint
#[derive(clap::Parser, Debug, Clone)]
#[clap(name = "echoload")]
#[clap(version)]
pub struct Cli {
    /// Target endpoint: a ws:// URL for websocket, host:port for datagram.
    #[arg(env = "ECHOLOAD_TARGET")]
    pub target: String,

    /// Channel flavour used for every connection.
    #[arg(long, value_enum, default_value_t = TransportKind::Websocket, env = "ECHOLOAD_TRANSPORT")]
    pub transport: TransportKind,

    /// Connections added at the start of every round.
    #[arg(long, default_value_t = 50, env = "ECHOLOAD_CONNECTIONS")]
    pub connections: usize,

    /// Tagged requests each connection sends per round.
    /// Defaults to 100 for websocket and 10 for datagram.
    #[arg(long, env = "ECHOLOAD_REQUESTS")]
    pub requests: Option<usize>,

    /// Number of rounds to run.
    #[arg(long, default_value_t = 5, env = "ECHOLOAD_ROUNDS")]
    pub rounds: usize,

    /// Detector ticks after which a stalled batch is abandoned.
    /// Defaults to 100 for websocket and 20 for datagram.
    #[arg(long, env = "ECHOLOAD_MAX_STAGNANT_TICKS")]
    pub max_stagnant_ticks: Option<u32>,

    /// Success ratio above which a stalled batch resolves early.
    #[arg(long, default_value_t = 0.9, env = "ECHOLOAD_SUCCESS_RATIO")]
    pub success_ratio: f64,

    /// Detector tick length in milliseconds.
    #[arg(long, default_value_t = 1000, env = "ECHOLOAD_TICK_MS")]
    pub tick_ms: u64,

    /// Accept any server certificate on datagram targets (INSECURE).
    #[arg(long, env = "ECHOLOAD_INSECURE")]
    pub insecure: bool,

    /// Report format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Expose Prometheus metrics on this address.
    #[arg(long, env = "ECHOLOAD_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,

    /// Default log filter when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    pub fn bench_config(&self) -> BenchConfig {
        BenchConfig {
            target_address: self.target.clone(),
            transport: self.transport,
            connections_per_round: self.connections,
            requests_per_connection: self
                .requests
                .unwrap_or_else(|| self.transport.default_requests_per_connection()),
            total_rounds: self.rounds,
            max_stagnant_ticks: self
                .max_stagnant_ticks
                .unwrap_or_else(|| self.transport.default_max_stagnant_ticks()),
            success_ratio_threshold: self.success_ratio,
            tick_interval: Duration::from_millis(self.tick_ms),
            insecure_skip_verify: self.insecure,
        }
    }
}
