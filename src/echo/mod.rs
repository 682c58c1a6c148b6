//! Bundled echo targets
//!
//! A WebSocket echo that stamps each tagged request with a server timestamp
//! and a QUIC datagram echo that returns every datagram verbatim. Both are
//! used by the integration tests and by the `echoload-echo` binary.

mod datagram;
mod websocket;

pub use datagram::{make_server_endpoint, spawn_datagram_echo};
pub use websocket::{router, spawn_websocket_echo, stamp_reply};

use std::net::SocketAddr;
use tokio::task::JoinHandle;

/// A running echo server task
pub struct EchoServer {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl EchoServer {
    pub(crate) fn new(local_addr: SocketAddr, task: JoinHandle<()>) -> Self {
        Self { local_addr, task }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting; established sessions may linger until their peer closes
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Wait until the server task exits
    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            if !e.is_cancelled() {
                tracing::error!("Echo server task failed: {}", e);
            }
        }
    }
}
