//! In-process loopback transport
//!
//! Simulates a far end per opened channel without any sockets, so the round
//! engine can be exercised deterministically (including under paused time).

use crate::channel::codec::WireFormat;
use crate::channel::error::{ChannelError, ChannelResult};
use crate::channel::{FrameSink, OpenChannel, Transport};
use bytes::Bytes;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// How the simulated far end treats the frames of one channel
#[derive(Debug, Clone, PartialEq)]
pub enum EchoBehaviour {
    /// Echo every frame immediately
    Echo,
    /// Echo every frame after a fixed delay
    Delayed(Duration),
    /// Echo every frame twice
    Duplicate,
    /// Never answer
    Silent,
    /// Echo only the first `n` frames of every batch of sends
    EchoFirst(usize),
    /// Drop each frame with the given probability (0.0 - 1.0)
    Lossy(f64),
}

/// Loopback transport with scripted far-end behaviour per channel
///
/// Channels are numbered in the order `open` is called; behaviour for a
/// channel without an explicit override is the transport default.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    wire: WireFormat,
    default_behaviour: EchoBehaviour,
    overrides: Arc<Mutex<HashMap<usize, EchoBehaviour>>>,
    fail_open_at: Option<usize>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    sent: Arc<AtomicUsize>,
}

impl MemoryTransport {
    pub fn new(default_behaviour: EchoBehaviour) -> Self {
        Self {
            wire: WireFormat::Json,
            default_behaviour,
            overrides: Arc::new(Mutex::new(HashMap::new())),
            fail_open_at: None,
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
            sent: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn echo() -> Self {
        Self::new(EchoBehaviour::Echo)
    }

    pub fn with_wire_format(mut self, wire: WireFormat) -> Self {
        self.wire = wire;
        self
    }

    /// Script the behaviour of the channel opened `index`-th (0-based)
    pub fn with_behaviour(self, index: usize, behaviour: EchoBehaviour) -> Self {
        self.overrides.lock().insert(index, behaviour);
        self
    }

    /// Make the `index`-th open fail
    pub fn failing_open_at(mut self, index: usize) -> Self {
        self.fail_open_at = Some(index);
        self
    }

    pub fn channels_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn channels_closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn frames_sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }

    fn behaviour_for(&self, index: usize) -> EchoBehaviour {
        self.overrides
            .lock()
            .get(&index)
            .cloned()
            .unwrap_or_else(|| self.default_behaviour.clone())
    }
}

pub struct MemorySink {
    behaviour: EchoBehaviour,
    far_end: Option<mpsc::UnboundedSender<Bytes>>,
    echoed_in_batch: usize,
    last_tag_seen: Option<usize>,
    wire: WireFormat,
    sent: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl Transport for MemoryTransport {
    type Sink = MemorySink;

    fn wire_format(&self) -> WireFormat {
        self.wire
    }

    async fn open(&self, address: &str) -> ChannelResult<OpenChannel<MemorySink>> {
        let index = self.opened.fetch_add(1, Ordering::SeqCst);
        if self.fail_open_at == Some(index) {
            return Err(ChannelError::ConnectFailed(format!(
                "{address}: simulated refusal for channel {index}"
            )));
        }

        let (tx, inbound) = mpsc::unbounded_channel();
        Ok(OpenChannel {
            sink: MemorySink {
                behaviour: self.behaviour_for(index),
                far_end: Some(tx),
                echoed_in_batch: 0,
                last_tag_seen: None,
                wire: self.wire,
                sent: self.sent.clone(),
                closed: self.closed.clone(),
            },
            inbound,
        })
    }
}

impl MemorySink {
    fn deliver(&self, frame: Bytes) {
        if let Some(tx) = &self.far_end {
            let _ = tx.send(frame);
        }
    }
}

impl FrameSink for MemorySink {
    async fn send(&mut self, frame: Bytes) -> ChannelResult<()> {
        if self.far_end.is_none() {
            return Err(ChannelError::Closed("memory channel closed".into()));
        }
        self.sent.fetch_add(1, Ordering::SeqCst);

        // A tag that does not increase marks the start of a new batch
        let tag = self.wire.decode_tag(&frame);
        if tag.is_some() && tag <= self.last_tag_seen {
            self.echoed_in_batch = 0;
        }
        self.last_tag_seen = tag;

        match self.behaviour.clone() {
            EchoBehaviour::Echo => self.deliver(frame),
            EchoBehaviour::Duplicate => {
                self.deliver(frame.clone());
                self.deliver(frame);
            }
            EchoBehaviour::Silent => {}
            EchoBehaviour::EchoFirst(n) => {
                if self.echoed_in_batch < n {
                    self.echoed_in_batch += 1;
                    self.deliver(frame);
                }
            }
            EchoBehaviour::Lossy(loss_rate) => {
                if rand::thread_rng().gen::<f64>() >= loss_rate {
                    self.deliver(frame);
                }
            }
            EchoBehaviour::Delayed(delay) => {
                if let Some(tx) = self.far_end.clone() {
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = tx.send(frame);
                    });
                }
            }
        }
        Ok(())
    }

    async fn close(&mut self) {
        if self.far_end.take().is_some() {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}
