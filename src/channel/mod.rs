//! Duplex channel capability consumed by benchmark connections
//!
//! A transport opens channels to the target; every channel is split into an
//! outbound [`FrameSink`] and an inbound frame queue fed by a reader task the
//! transport owns. Connection and detector logic is written once against
//! these traits and never against a concrete flavour.

pub mod codec;
pub mod datagram;
pub mod error;
pub mod memory;
pub mod websocket;

pub use codec::WireFormat;
pub use datagram::DatagramTransport;
pub use error::{ChannelError, ChannelResult};
pub use memory::{EchoBehaviour, MemoryTransport};
pub use websocket::WebSocketTransport;

use bytes::Bytes;
use std::future::Future;
use tokio::sync::mpsc;

/// Frames delivered by the channel's reader task, in arrival order
pub type InboundFrames = mpsc::UnboundedReceiver<Bytes>;

/// A freshly opened channel
pub struct OpenChannel<S> {
    pub sink: S,
    pub inbound: InboundFrames,
}

/// Outbound half of a duplex channel
pub trait FrameSink: Send + 'static {
    /// Hand one frame to the transport without waiting for any reply
    fn send(&mut self, frame: Bytes) -> impl Future<Output = ChannelResult<()>> + Send;

    /// Close the channel; failures are logged, never returned
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Opens duplex channels of one flavour
pub trait Transport: Send + Sync + 'static {
    type Sink: FrameSink;

    /// How request tags are framed on this transport
    fn wire_format(&self) -> WireFormat;

    fn open(
        &self,
        address: &str,
    ) -> impl Future<Output = ChannelResult<OpenChannel<Self::Sink>>> + Send;
}

/// Install the ring crypto provider for rustls/quinn (idempotent)
pub fn install_crypto_provider() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
