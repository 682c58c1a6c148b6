//! Escalating echo load against WebSocket and QUIC datagram endpoints.
//!
//! Every round adds a fixed number of persistent connections, sends a batch
//! of tagged requests on every connection, and waits until each batch has
//! either been fully answered or stopped making progress. Round-trip times
//! of the answered requests are reduced into one report per round.

pub mod bench;
pub mod channel;
pub mod config;
pub mod connection;
pub mod echo;
pub mod metrics;
pub mod pool;
pub mod stats;
