//! Per-type queues and worker tasks.
//!
//! The dispatcher owns one unbounded FIFO queue per message type and spawns
//! exactly one worker per queue. The read loop only ever enqueues; decode
//! and listener work happen on the worker, so a slow listener can never
//! stall socket reads.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::{BridgeMessage, Listener, ListenerRegistry};
use crate::codec::{ActivityUpdate, CombatPayload};
use crate::error::Result;
use crate::watchdog::LivenessWatchdog;
use crate::wire::{MessageType, PooledBuffer, RawMessageType};

/// Routes raw frame payloads to the queue matching their type byte.
pub(crate) struct Dispatcher {
    queues: HashMap<RawMessageType, mpsc::UnboundedSender<PooledBuffer>>,
}

impl Dispatcher {
    /// Build queues from the registry and spawn one worker per type.
    ///
    /// The heartbeat queue always exists because the watchdog is its
    /// built-in consumer; other types get a queue only when a listener was
    /// registered, and frames for queue-less types are dropped by the read
    /// loop after draining.
    pub(crate) fn spawn(
        mut registry: ListenerRegistry,
        watchdog: Arc<LivenessWatchdog>,
        cancel: CancellationToken,
    ) -> Self {
        let mut types: Vec<MessageType> = registry.registered_types().collect();
        if !types.contains(&MessageType::Heartbeat) {
            types.push(MessageType::Heartbeat);
        }

        let mut queues = HashMap::new();
        for message_type in types {
            let listeners = registry.take(message_type);
            let (tx, rx) = mpsc::unbounded_channel();
            queues.insert(message_type.as_byte(), tx);

            let watchdog = Arc::clone(&watchdog);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                worker_loop(message_type, listeners, watchdog, rx, cancel).await;
            });
        }

        Self { queues }
    }

    /// Whether a queue exists for this type byte.
    pub(crate) fn accepts(&self, message_type: RawMessageType) -> bool {
        self.queues.contains_key(&message_type)
    }

    /// Enqueue a payload for its type's worker.
    ///
    /// Returns false when no queue exists (unregistered type) or the worker
    /// has shut down; the caller releases the buffer either way.
    pub(crate) fn route(&self, message_type: RawMessageType, buffer: PooledBuffer) -> bool {
        match self.queues.get(&message_type) {
            Some(tx) => tx.send(buffer).is_ok(),
            None => false,
        }
    }
}

/// Drain one type's queue in order: decode, feed the watchdog for
/// heartbeats, then await every listener sequentially.
async fn worker_loop(
    message_type: MessageType,
    listeners: Vec<Arc<dyn Listener>>,
    watchdog: Arc<LivenessWatchdog>,
    mut rx: mpsc::UnboundedReceiver<PooledBuffer>,
    cancel: CancellationToken,
) {
    debug!(%message_type, listeners = listeners.len(), "type worker started");
    let mut processed = 0u64;

    loop {
        let buffer = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(%message_type, processed, "type worker cancelled");
                break;
            }
            buffer = rx.recv() => match buffer {
                Some(buffer) => buffer,
                None => {
                    debug!(%message_type, processed, "type queue closed");
                    break;
                }
            },
        };

        let decoded = decode(message_type, &buffer);
        // Return the buffer to the pool before any listener runs; decoded
        // values are owned and outlive it.
        drop(buffer);

        let message = match decoded {
            Ok(message) => message,
            Err(e) => {
                // Frame-local failure: the boundary was already established
                // by length-prefixing, so the stream stays up.
                warn!(%message_type, error = %e, "discarding undecodable frame");
                continue;
            }
        };

        if let BridgeMessage::Heartbeat(update) = &message {
            watchdog.record_heartbeat(update.active);
        }

        processed += 1;
        trace!(%message_type, processed, "dispatching");

        for listener in &listeners {
            if cancel.is_cancelled() {
                break;
            }
            if let Err(e) = listener.on_message(&message, &cancel).await {
                // Fail-fast: remaining listeners are skipped for this value.
                warn!(%message_type, error = %e, "listener failed, aborting dispatch for value");
                break;
            }
        }
    }
}

fn decode(message_type: MessageType, payload: &[u8]) -> Result<BridgeMessage> {
    match message_type {
        MessageType::CombatEvent => {
            CombatPayload::decode(payload).map(|p| BridgeMessage::Combat(Arc::new(p)))
        }
        MessageType::Heartbeat => ActivityUpdate::decode(payload).map(BridgeMessage::Heartbeat),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{combat_payload_bytes, skill_only_payload};
    use crate::wire::BufferPool;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc as test_mpsc;

    /// Records every combat event id it sees, in order.
    struct RecordingListener {
        label: &'static str,
        log: Arc<Mutex<Vec<(&'static str, u64)>>>,
        tx: test_mpsc::UnboundedSender<u64>,
    }

    #[async_trait]
    impl Listener for RecordingListener {
        async fn on_message(
            &self,
            message: &BridgeMessage,
            _cancel: &CancellationToken,
        ) -> Result<()> {
            if let BridgeMessage::Combat(payload) = message {
                self.log.lock().unwrap().push((self.label, payload.id));
                let _ = self.tx.send(payload.id);
            }
            Ok(())
        }
    }

    /// Cancels the shared token from inside dispatch, then reports in.
    struct CancellingListener {
        tx: test_mpsc::UnboundedSender<()>,
    }

    #[async_trait]
    impl Listener for CancellingListener {
        async fn on_message(
            &self,
            _message: &BridgeMessage,
            cancel: &CancellationToken,
        ) -> Result<()> {
            cancel.cancel();
            let _ = self.tx.send(());
            Ok(())
        }
    }

    /// Fails on every invocation.
    struct FailingListener;

    #[async_trait]
    impl Listener for FailingListener {
        async fn on_message(
            &self,
            _message: &BridgeMessage,
            _cancel: &CancellationToken,
        ) -> Result<()> {
            Err(crate::BridgeError::listener("intentional failure"))
        }
    }

    fn rent_with(pool: &Arc<BufferPool>, bytes: &[u8]) -> PooledBuffer {
        let mut buf = pool.rent(bytes.len());
        buf.copy_from_slice(bytes);
        buf
    }

    async fn recv_n(rx: &mut test_mpsc::UnboundedReceiver<u64>, n: usize) -> Vec<u64> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let id = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("timed out waiting for dispatch")
                .expect("listener channel closed");
            out.push(id);
        }
        out
    }

    #[tokio::test]
    async fn same_type_events_dispatch_in_wire_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (tx, mut rx) = test_mpsc::unbounded_channel();

        let mut registry = ListenerRegistry::new();
        registry.register(
            MessageType::CombatEvent,
            RecordingListener { label: "a", log: Arc::clone(&log), tx },
        );

        let cancel = CancellationToken::new();
        let dispatcher =
            Dispatcher::spawn(registry, Arc::new(LivenessWatchdog::new()), cancel.clone());
        let pool = BufferPool::new();

        for id in 0..50u64 {
            let bytes = combat_payload_bytes(id);
            assert!(dispatcher.route(MessageType::CombatEvent.as_byte(), rent_with(&pool, &bytes)));
        }

        let seen = recv_n(&mut rx, 50).await;
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
        cancel.cancel();
    }

    #[tokio::test]
    async fn listeners_run_sequentially_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (tx_a, _rx_a) = test_mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = test_mpsc::unbounded_channel();

        let mut registry = ListenerRegistry::new();
        registry.register(
            MessageType::CombatEvent,
            RecordingListener { label: "first", log: Arc::clone(&log), tx: tx_a },
        );
        registry.register(
            MessageType::CombatEvent,
            RecordingListener { label: "second", log: Arc::clone(&log), tx: tx_b },
        );

        let cancel = CancellationToken::new();
        let dispatcher =
            Dispatcher::spawn(registry, Arc::new(LivenessWatchdog::new()), cancel.clone());
        let pool = BufferPool::new();

        for id in 0..3u64 {
            dispatcher.route(MessageType::CombatEvent.as_byte(), rent_with(&pool, &combat_payload_bytes(id)));
        }
        recv_n(&mut rx_b, 3).await;

        let entries = log.lock().unwrap().clone();
        assert_eq!(
            entries,
            vec![
                ("first", 0),
                ("second", 0),
                ("first", 1),
                ("second", 1),
                ("first", 2),
                ("second", 2),
            ]
        );
        cancel.cancel();
    }

    #[tokio::test]
    async fn failing_listener_aborts_remaining_for_that_value_only() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (tx, mut rx) = test_mpsc::unbounded_channel();

        let mut registry = ListenerRegistry::new();
        registry.register(MessageType::CombatEvent, FailingListener);
        registry.register(
            MessageType::CombatEvent,
            RecordingListener { label: "after", log: Arc::clone(&log), tx },
        );

        let cancel = CancellationToken::new();
        let dispatcher =
            Dispatcher::spawn(registry, Arc::new(LivenessWatchdog::new()), cancel.clone());
        let pool = BufferPool::new();

        dispatcher.route(MessageType::CombatEvent.as_byte(), rent_with(&pool, &combat_payload_bytes(1)));
        // Give the worker time to process; the second listener must be skipped.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(log.lock().unwrap().is_empty());
        assert!(rx.try_recv().is_err());
        cancel.cancel();
    }

    #[tokio::test]
    async fn cancellation_between_listeners_skips_the_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (cancelled_tx, mut cancelled_rx) = test_mpsc::unbounded_channel();
        let (tx, mut rx) = test_mpsc::unbounded_channel();

        let mut registry = ListenerRegistry::new();
        registry.register(MessageType::CombatEvent, CancellingListener { tx: cancelled_tx });
        registry.register(
            MessageType::CombatEvent,
            RecordingListener { label: "after", log: Arc::clone(&log), tx },
        );

        let cancel = CancellationToken::new();
        let dispatcher =
            Dispatcher::spawn(registry, Arc::new(LivenessWatchdog::new()), cancel.clone());
        let pool = BufferPool::new();

        dispatcher.route(MessageType::CombatEvent.as_byte(), rent_with(&pool, &combat_payload_bytes(1)));

        // The first listener ran and cancelled; the check between listener
        // invocations must keep the second one from ever seeing the value.
        tokio::time::timeout(Duration::from_secs(2), cancelled_rx.recv())
            .await
            .expect("timed out waiting for the cancelling listener")
            .expect("cancelling listener channel closed");
        assert!(cancel.is_cancelled());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(log.lock().unwrap().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn undecodable_frame_is_skipped_and_stream_continues() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (tx, mut rx) = test_mpsc::unbounded_channel();

        let mut registry = ListenerRegistry::new();
        registry.register(
            MessageType::CombatEvent,
            RecordingListener { label: "a", log: Arc::clone(&log), tx },
        );

        let cancel = CancellationToken::new();
        let dispatcher =
            Dispatcher::spawn(registry, Arc::new(LivenessWatchdog::new()), cancel.clone());
        let pool = BufferPool::new();

        // Zero-length payload for a known type: routed, decoder rejects it.
        dispatcher.route(MessageType::CombatEvent.as_byte(), pool.rent(0));
        dispatcher.route(MessageType::CombatEvent.as_byte(), rent_with(&pool, &combat_payload_bytes(9)));

        assert_eq!(recv_n(&mut rx, 1).await, vec![9]);
        cancel.cancel();
    }

    #[tokio::test]
    async fn heartbeat_worker_feeds_watchdog_without_listeners() {
        let registry = ListenerRegistry::new();
        let watchdog = Arc::new(LivenessWatchdog::new());
        let cancel = CancellationToken::new();
        let dispatcher = Dispatcher::spawn(registry, Arc::clone(&watchdog), cancel.clone());
        let pool = BufferPool::new();

        assert!(dispatcher.accepts(MessageType::Heartbeat.as_byte()));
        dispatcher.route(MessageType::Heartbeat.as_byte(), rent_with(&pool, &[0x00, 0x01]));

        // Worker is async; wait for the flag to land.
        for _ in 0..50 {
            if watchdog.hud_is_active() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(watchdog.hud_is_active());
        assert!(watchdog.poll());
        cancel.cancel();
    }

    #[tokio::test]
    async fn unregistered_type_has_no_queue() {
        let registry = ListenerRegistry::new();
        let cancel = CancellationToken::new();
        let dispatcher =
            Dispatcher::spawn(registry, Arc::new(LivenessWatchdog::new()), cancel.clone());
        let pool = BufferPool::new();

        assert!(!dispatcher.accepts(MessageType::CombatEvent.as_byte()));
        assert!(!dispatcher.accepts(0x7F));
        assert!(!dispatcher.route(0x7F, rent_with(&pool, &skill_only_payload("x"))));
        cancel.cancel();
    }

    #[tokio::test]
    async fn cancellation_stops_workers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (tx, mut rx) = test_mpsc::unbounded_channel();

        let mut registry = ListenerRegistry::new();
        registry.register(
            MessageType::CombatEvent,
            RecordingListener { label: "a", log: Arc::clone(&log), tx },
        );

        let cancel = CancellationToken::new();
        let dispatcher =
            Dispatcher::spawn(registry, Arc::new(LivenessWatchdog::new()), cancel.clone());
        let pool = BufferPool::new();

        dispatcher.route(MessageType::CombatEvent.as_byte(), rent_with(&pool, &combat_payload_bytes(1)));
        recv_n(&mut rx, 1).await;

        cancel.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Queued after cancellation: the worker no longer picks it up.
        dispatcher.route(MessageType::CombatEvent.as_byte(), rent_with(&pool, &combat_payload_bytes(2)));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
    }
}
