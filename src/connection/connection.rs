use crate::channel::{ChannelResult, FrameSink, InboundFrames, Transport, WireFormat};
use crate::config::BenchConfig;
use crate::connection::detector::StagnationDetector;
use crate::connection::types::{BatchOutcome, RequestRecord};
use crate::metrics;
use crate::stats::RunProgress;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Records of the batch in flight, shared with the inbound handler
#[derive(Debug, Default)]
struct BatchState {
    records: Vec<RequestRecord>,
    success_count: usize,
    open: bool,
}

/// One persistent channel to the target plus its per-round bookkeeping
pub struct Connection<S: FrameSink> {
    id: usize,
    sink: S,
    wire: WireFormat,
    batch: Arc<Mutex<BatchState>>,
    detector: StagnationDetector,
    keep_alive: Arc<AtomicBool>,
    handler: JoinHandle<()>,
    config: Arc<BenchConfig>,
}

impl<S: FrameSink> Connection<S> {
    /// Open the channel and start matching replies against the open batch
    pub async fn connect<T>(
        id: usize,
        transport: &T,
        config: Arc<BenchConfig>,
        progress: Arc<RunProgress>,
    ) -> ChannelResult<Self>
    where
        T: Transport<Sink = S>,
    {
        let channel = transport.open(&config.target_address).await?;
        let wire = transport.wire_format();
        let batch = Arc::new(Mutex::new(BatchState::default()));
        let keep_alive = Arc::new(AtomicBool::new(true));

        let handler = tokio::spawn(handle_inbound(
            id,
            channel.inbound,
            wire,
            batch.clone(),
            keep_alive.clone(),
            progress.clone(),
        ));

        progress.connection_established();
        metrics::connection_opened();
        tracing::debug!(connection = id, "Connected to {}", config.target_address);

        Ok(Self {
            id,
            sink: channel.sink,
            wire,
            batch,
            detector: StagnationDetector::new(&config),
            keep_alive,
            handler,
            config,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        self.keep_alive.load(Ordering::SeqCst)
    }

    /// Replies matched in the current (or last) batch
    pub fn success_count(&self) -> usize {
        self.batch.lock().success_count
    }

    /// Fire the round's requests in tag order, then wait for the detector
    pub async fn send_batch(&mut self) -> BatchOutcome {
        let batch_size = self.config.requests_per_connection;
        {
            let mut batch = self.batch.lock();
            batch.records = Vec::with_capacity(batch_size);
            batch.success_count = 0;
            batch.open = true;
        }
        self.detector.reset();

        for sequence_id in 0..batch_size {
            let frame = match self.wire.encode_request(sequence_id) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(connection = self.id, "Stopping batch early: {}", e);
                    break;
                }
            };

            self.batch
                .lock()
                .records
                .push(RequestRecord::started(sequence_id, Instant::now()));

            // Fire-and-forget: a failed send is just an incomplete record
            if let Err(e) = self.sink.send(frame).await {
                tracing::warn!(
                    connection = self.id,
                    sequence_id,
                    "Request send failed: {}",
                    e
                );
            }
            metrics::record_request_sent();
        }

        let tick = self.config.tick_interval;
        let mut ticker = interval_at(Instant::now() + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let termination = loop {
            ticker.tick().await;
            let (success_count, all_complete) = {
                let batch = self.batch.lock();
                let all_complete = batch.records.len() == batch_size
                    && batch.records.iter().all(RequestRecord::is_complete);
                (batch.success_count, all_complete)
            };
            if let Some(termination) = self.detector.tick(success_count, all_complete) {
                break termination;
            }
        };

        let records = {
            let mut batch = self.batch.lock();
            batch.open = false;
            std::mem::take(&mut batch.records)
        };

        let outcome = BatchOutcome {
            connection_id: self.id,
            records,
            termination,
            ticks: self.detector.ticks(),
        };
        let abandoned = batch_size - outcome.completed();
        metrics::record_batch_resolved(termination, abandoned);
        tracing::debug!(
            connection = self.id,
            ?termination,
            ticks = outcome.ticks,
            abandoned,
            "Batch resolved"
        );
        outcome
    }

    /// Close the channel; consuming `self` guarantees it happens once
    pub async fn close(mut self) {
        self.keep_alive.store(false, Ordering::SeqCst);
        self.handler.abort();
        self.sink.close().await;
        metrics::connection_closed();
        tracing::debug!(connection = self.id, "Connection closed");
    }
}

impl<S: FrameSink> Drop for Connection<S> {
    fn drop(&mut self) {
        self.keep_alive.store(false, Ordering::SeqCst);
        self.handler.abort();
    }
}

enum Reply {
    Matched(Option<std::time::Duration>),
    Duplicate,
    Unknown,
    Late,
}

/// First write wins: a reply only stamps a record that has none yet
fn apply_reply(batch: &Mutex<BatchState>, tag: usize, now: Instant) -> Reply {
    let mut state = batch.lock();
    if !state.open {
        return Reply::Late;
    }
    let Some(record) = state.records.get_mut(tag) else {
        return Reply::Unknown;
    };
    if !record.complete(now) {
        return Reply::Duplicate;
    }
    let round_trip = record.round_trip();
    state.success_count += 1;
    Reply::Matched(round_trip)
}

async fn handle_inbound(
    id: usize,
    mut inbound: InboundFrames,
    wire: WireFormat,
    batch: Arc<Mutex<BatchState>>,
    keep_alive: Arc<AtomicBool>,
    progress: Arc<RunProgress>,
) {
    while let Some(frame) = inbound.recv().await {
        let Some(tag) = wire.decode_tag(&frame) else {
            tracing::debug!(connection = id, "Ignoring untagged frame");
            metrics::record_late_reply();
            continue;
        };

        match apply_reply(&batch, tag, Instant::now()) {
            Reply::Matched(round_trip) => {
                progress.reply_matched();
                if let Some(round_trip) = round_trip {
                    metrics::record_reply(round_trip);
                }
            }
            Reply::Duplicate => metrics::record_duplicate_reply(),
            Reply::Unknown => {
                tracing::debug!(connection = id, tag, "Reply for unknown tag");
                metrics::record_late_reply();
            }
            Reply::Late => metrics::record_late_reply(),
        }
    }

    if keep_alive.load(Ordering::SeqCst) {
        tracing::warn!(connection = id, "Channel closed by the remote end");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{EchoBehaviour, MemoryTransport};
    use crate::connection::types::Termination;
    use std::time::Duration;

    fn config(requests: usize, max_stagnant_ticks: u32) -> Arc<BenchConfig> {
        Arc::new(BenchConfig {
            target_address: "memory".into(),
            requests_per_connection: requests,
            max_stagnant_ticks,
            ..Default::default()
        })
    }

    async fn connect(
        transport: &MemoryTransport,
        config: Arc<BenchConfig>,
    ) -> Connection<crate::channel::memory::MemorySink> {
        Connection::connect(0, transport, config, Arc::new(RunProgress::new()))
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_instant_echo_resolves_after_one_tick() {
        let transport = MemoryTransport::echo();
        let mut conn = connect(&transport, config(3, 100)).await;

        let start = Instant::now();
        let outcome = conn.send_batch().await;

        assert_eq!(outcome.termination, Termination::AllAcknowledged);
        assert_eq!(outcome.ticks, 1);
        assert_eq!(outcome.completed(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert_eq!(conn.success_count(), 3);
        conn.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_peer_resolves_at_ceiling() {
        let transport = MemoryTransport::new(EchoBehaviour::Silent);
        let mut conn = connect(&transport, config(5, 20)).await;

        let start = Instant::now();
        let outcome = conn.send_batch().await;

        assert_eq!(outcome.termination, Termination::Stagnated);
        assert_eq!(outcome.ticks, 20);
        assert_eq!(outcome.completed(), 0);
        assert_eq!(outcome.records.len(), 5);
        assert_eq!(start.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_replies_counted_once() {
        let transport = MemoryTransport::new(EchoBehaviour::Duplicate);
        let mut conn = connect(&transport, config(4, 100)).await;

        let outcome = conn.send_batch().await;
        assert_eq!(outcome.termination, Termination::AllAcknowledged);
        assert_eq!(conn.success_count(), 4);
        for (i, record) in outcome.records.iter().enumerate() {
            assert_eq!(record.sequence_id, i);
            assert!(record.is_complete());
            assert!(record.finish.unwrap() >= record.start);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_replies_complete_within_batch() {
        let transport = MemoryTransport::new(EchoBehaviour::Delayed(Duration::from_millis(2500)));
        let mut conn = connect(&transport, config(3, 100)).await;

        let outcome = conn.send_batch().await;
        assert_eq!(outcome.termination, Termination::AllAcknowledged);
        assert_eq!(outcome.ticks, 3);
        for record in &outcome.records {
            assert_eq!(record.round_trip(), Some(Duration::from_millis(2500)));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_replies_above_ratio_resolve_after_full_window() {
        let transport = MemoryTransport::new(EchoBehaviour::EchoFirst(19));
        let mut conn = connect(&transport, config(20, 100)).await;

        let start = Instant::now();
        let outcome = conn.send_batch().await;
        // 19/20 = 0.95 > 0.9 once a full window of samples agrees
        assert_eq!(outcome.termination, Termination::Stagnated);
        assert_eq!(outcome.ticks, 21);
        assert_eq!(start.elapsed(), Duration::from_secs(21));
        assert_eq!(outcome.completed(), 19);
        assert!(!outcome.records[19].is_complete());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_reused_across_batches() {
        let transport = MemoryTransport::echo();
        let mut conn = connect(&transport, config(5, 100)).await;

        let first = conn.send_batch().await;
        let second = conn.send_batch().await;
        assert_eq!(first.completed(), 5);
        assert_eq!(second.completed(), 5);
        assert!(second.records[0].start > first.records[0].start);
        assert_eq!(transport.channels_opened(), 1);
        assert_eq!(transport.frames_sent(), 10);
        assert_eq!(conn.id(), 0);
        assert!(conn.is_alive());
        conn.close().await;
        assert_eq!(transport.channels_closed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_binary_wire_batch() {
        let transport = MemoryTransport::echo().with_wire_format(WireFormat::Binary);
        let mut conn = connect(&transport, config(10, 20)).await;

        let outcome = conn.send_batch().await;
        assert_eq!(outcome.termination, Termination::AllAcknowledged);
        assert_eq!(outcome.completed(), 10);
    }

    #[test]
    fn test_apply_reply_first_write_wins() {
        let start = Instant::now();
        let batch = Mutex::new(BatchState {
            records: vec![RequestRecord::started(0, start)],
            success_count: 0,
            open: true,
        });

        let first = start + Duration::from_millis(5);
        assert!(matches!(
            apply_reply(&batch, 0, first),
            Reply::Matched(Some(rtt)) if rtt == Duration::from_millis(5)
        ));
        assert!(matches!(
            apply_reply(&batch, 0, first + Duration::from_millis(5)),
            Reply::Duplicate
        ));
        assert!(matches!(apply_reply(&batch, 3, first), Reply::Unknown));

        let state = batch.lock();
        assert_eq!(state.success_count, 1);
        assert_eq!(state.records[0].finish, Some(first));
    }

    #[test]
    fn test_apply_reply_outside_batch_is_late() {
        let batch = Mutex::new(BatchState::default());
        assert!(matches!(apply_reply(&batch, 0, Instant::now()), Reply::Late));
    }

    #[tokio::test]
    async fn test_connect_failure_propagates() {
        let transport = MemoryTransport::echo().failing_open_at(0);
        let result = Connection::connect(
            7,
            &transport,
            config(1, 1),
            Arc::new(RunProgress::new()),
        )
        .await;
        assert!(result.is_err());
    }
}
