use crate::config::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Number of detector samples kept to decide whether a batch stopped progressing
pub const STAGNATION_WINDOW: usize = 20;

/// Largest batch the single-byte datagram tag can address (tags 0-9)
pub const DATAGRAM_MAX_REQUESTS: usize = 10;

/// Channel flavour used to reach the target
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Message-framed WebSocket channel carrying JSON tags
    Websocket,
    /// QUIC datagrams carrying the fixed 7-byte tag frame
    Datagram,
}

impl TransportKind {
    /// Stagnation ceiling observed for each flavour
    pub fn default_max_stagnant_ticks(self) -> u32 {
        match self {
            TransportKind::Websocket => 100,
            TransportKind::Datagram => 20,
        }
    }

    /// Largest batch the flavour's request framing can tag by default
    pub fn default_requests_per_connection(self) -> usize {
        match self {
            TransportKind::Websocket => 100,
            TransportKind::Datagram => DATAGRAM_MAX_REQUESTS,
        }
    }
}

/// Immutable settings for one benchmark run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    pub target_address: String,
    pub transport: TransportKind,
    pub connections_per_round: usize,
    pub requests_per_connection: usize,
    pub total_rounds: usize,
    pub max_stagnant_ticks: u32,
    pub success_ratio_threshold: f64,
    #[serde(with = "duration_millis")]
    pub tick_interval: Duration,
    /// Skip TLS certificate verification for datagram targets (INSECURE)
    pub insecure_skip_verify: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            target_address: "ws://127.0.0.1:8080".to_string(),
            transport: TransportKind::Websocket,
            connections_per_round: 50,
            requests_per_connection: 100,
            total_rounds: 5,
            max_stagnant_ticks: TransportKind::Websocket.default_max_stagnant_ticks(),
            success_ratio_threshold: 0.9,
            tick_interval: Duration::from_secs(1),
            insecure_skip_verify: false,
        }
    }
}

impl BenchConfig {
    /// Defaults for the given transport flavour and target
    pub fn for_transport(transport: TransportKind, target_address: impl Into<String>) -> Self {
        Self {
            target_address: target_address.into(),
            transport,
            max_stagnant_ticks: transport.default_max_stagnant_ticks(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.target_address.trim().is_empty() {
            return Err(ConfigError::EmptyTarget);
        }
        if self.connections_per_round == 0 {
            return Err(ConfigError::ZeroValue("connections_per_round"));
        }
        if self.requests_per_connection == 0 {
            return Err(ConfigError::ZeroValue("requests_per_connection"));
        }
        if self.total_rounds == 0 {
            return Err(ConfigError::ZeroValue("total_rounds"));
        }
        if self.max_stagnant_ticks == 0 {
            return Err(ConfigError::ZeroValue("max_stagnant_ticks"));
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::ZeroValue("tick_interval"));
        }
        if !(self.success_ratio_threshold > 0.0 && self.success_ratio_threshold <= 1.0) {
            return Err(ConfigError::RatioOutOfRange(self.success_ratio_threshold));
        }
        if self.transport == TransportKind::Datagram
            && self.requests_per_connection > DATAGRAM_MAX_REQUESTS
        {
            return Err(ConfigError::TagOutOfRange {
                max: DATAGRAM_MAX_REQUESTS,
                requested: self.requests_per_connection,
            });
        }
        Ok(())
    }

    /// Total connections alive once `round` has ramped up
    pub fn cumulative_connections(&self, round: usize) -> usize {
        self.connections_per_round * (round + 1)
    }

    /// Requests expected across all connections of `round`
    pub fn attempted_requests(&self, round: usize) -> usize {
        self.requests_per_connection * self.cumulative_connections(round)
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
