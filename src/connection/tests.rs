//! Integration tests for the read loop and dispatch plumbing.
//!
//! These drive the real frame reader over an in-memory duplex stream, so
//! framing, routing, ordering, and failure classification are all exercised
//! without a TCP socket.

use super::reader::{self, ReadLoopEnd};
use crate::dispatch::{BridgeMessage, Dispatcher, Listener, ListenerRegistry};
use crate::error::{BridgeError, Result, SocketErrorKind};
use crate::test_utils::{combat_frame, frame_bytes, heartbeat_frame};
use crate::watchdog::LivenessWatchdog;
use crate::wire::{BufferPool, FrameHeader, MessageType};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Forwards every observed message into an inspection channel.
struct CollectListener {
    tx: mpsc::UnboundedSender<BridgeMessage>,
}

#[async_trait]
impl Listener for CollectListener {
    async fn on_message(&self, message: &BridgeMessage, _cancel: &CancellationToken) -> Result<()> {
        let _ = self.tx.send(message.clone());
        Ok(())
    }
}

struct Harness {
    writer: tokio::io::DuplexStream,
    messages: mpsc::UnboundedReceiver<BridgeMessage>,
    cancel: CancellationToken,
    read_loop: tokio::task::JoinHandle<ReadLoopEnd>,
}

/// Spin up a dispatcher with collect listeners for both types and a read
/// loop over the read half of a duplex pipe.
fn harness(max_payload_size: u32) -> Harness {
    let _ = tracing_subscriber::fmt::try_init();

    let (tx, messages) = mpsc::unbounded_channel();
    let mut registry = ListenerRegistry::new();
    registry.register(MessageType::CombatEvent, CollectListener { tx: tx.clone() });
    registry.register(MessageType::Heartbeat, CollectListener { tx });

    let cancel = CancellationToken::new();
    let watchdog = Arc::new(LivenessWatchdog::new());
    let dispatcher = Arc::new(Dispatcher::spawn(registry, watchdog, cancel.clone()));
    let pool = BufferPool::new();

    let (writer, read_half) = tokio::io::duplex(64 * 1024);
    let read_loop = tokio::spawn(reader::run(
        read_half,
        pool,
        dispatcher,
        max_payload_size,
        cancel.clone(),
    ));

    Harness { writer, messages, cancel, read_loop }
}

async fn next_message(rx: &mut mpsc::UnboundedReceiver<BridgeMessage>) -> BridgeMessage {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for message")
        .expect("message channel closed")
}

fn combat_id(message: &BridgeMessage) -> Option<u64> {
    match message {
        BridgeMessage::Combat(payload) => Some(payload.id),
        BridgeMessage::Heartbeat(_) => None,
    }
}

#[tokio::test]
async fn frames_arrive_in_wire_order() {
    let mut h = harness(u32::MAX);

    for id in 0..20u64 {
        h.writer.write_all(&combat_frame(id)).await.unwrap();
    }

    for expected in 0..20u64 {
        let message = next_message(&mut h.messages).await;
        assert_eq!(combat_id(&message), Some(expected));
    }
    h.cancel.cancel();
}

#[tokio::test]
async fn interleaved_types_no_loss_no_duplication() {
    let mut h = harness(u32::MAX);

    // Alternate combat and heartbeat frames on the wire.
    for id in 0..10u64 {
        h.writer.write_all(&combat_frame(id)).await.unwrap();
        h.writer.write_all(&heartbeat_frame(id % 2 == 0)).await.unwrap();
    }

    let mut combat_ids = Vec::new();
    let mut heartbeats = 0;
    while combat_ids.len() < 10 || heartbeats < 10 {
        match next_message(&mut h.messages).await {
            BridgeMessage::Combat(payload) => combat_ids.push(payload.id),
            BridgeMessage::Heartbeat(_) => heartbeats += 1,
        }
    }

    // No cross-type ordering asserted; within-type order and counts are exact.
    assert_eq!(combat_ids, (0..10).collect::<Vec<_>>());
    assert_eq!(heartbeats, 10);
    assert!(
        tokio::time::timeout(Duration::from_millis(100), h.messages.recv()).await.is_err(),
        "no duplicate deliveries expected"
    );
    h.cancel.cancel();
}

#[tokio::test]
async fn unknown_type_is_drained_and_stream_stays_aligned() {
    let mut h = harness(u32::MAX);

    // A frame of unregistered type 0x42 precedes a valid combat frame; its
    // declared length must be trusted and drained or everything after it
    // would misparse.
    h.writer.write_all(&frame_bytes(0x42, &[0xAA; 37])).await.unwrap();
    h.writer.write_all(&combat_frame(7)).await.unwrap();

    let message = next_message(&mut h.messages).await;
    assert_eq!(combat_id(&message), Some(7));
    h.cancel.cancel();
}

#[tokio::test]
async fn zero_length_payload_reaches_decoder_and_fails_cleanly() {
    let mut h = harness(u32::MAX);

    // Known type, empty payload: routed to the decoder, which must report a
    // decode failure rather than crash, and later frames still flow.
    h.writer.write_all(&frame_bytes(MessageType::CombatEvent.as_byte(), &[])).await.unwrap();
    h.writer.write_all(&combat_frame(3)).await.unwrap();

    let message = next_message(&mut h.messages).await;
    assert_eq!(combat_id(&message), Some(3));
    h.cancel.cancel();
}

#[tokio::test]
async fn clean_eof_at_frame_boundary() {
    let mut h = harness(u32::MAX);

    h.writer.write_all(&combat_frame(1)).await.unwrap();
    let message = next_message(&mut h.messages).await;
    assert_eq!(combat_id(&message), Some(1));

    drop(h.writer);
    let end = h.read_loop.await.unwrap();
    assert!(matches!(end, ReadLoopEnd::CleanEof), "got {end:?}");
}

#[tokio::test]
async fn severed_mid_frame_is_a_socket_failure() {
    let mut h = harness(u32::MAX);

    // Header promises 100 payload bytes; deliver 10 and hang up.
    let header = FrameHeader::new(100, MessageType::CombatEvent.as_byte());
    h.writer.write_all(&header.encode()).await.unwrap();
    h.writer.write_all(&[0u8; 10]).await.unwrap();
    drop(h.writer);

    let end = h.read_loop.await.unwrap();
    match end {
        ReadLoopEnd::Failed(BridgeError::Socket { kind, .. }) => {
            assert_eq!(kind, SocketErrorKind::SeveredMidFrame);
        }
        other => panic!("expected socket failure, got {other:?}"),
    }
}

#[tokio::test]
async fn oversized_declared_length_is_protocol_corruption() {
    let mut h = harness(1024);

    let header = FrameHeader::new(10_000, MessageType::CombatEvent.as_byte());
    h.writer.write_all(&header.encode()).await.unwrap();

    let end = h.read_loop.await.unwrap();
    match end {
        ReadLoopEnd::Failed(error) => {
            assert!(matches!(error, BridgeError::Protocol { .. }), "got {error}");
            assert!(!error.is_retryable());
        }
        other => panic!("expected protocol failure, got {other:?}"),
    }
}

#[tokio::test]
async fn cancellation_ends_read_loop_without_error() {
    let h = harness(u32::MAX);

    h.cancel.cancel();
    let end = h.read_loop.await.unwrap();
    assert!(matches!(end, ReadLoopEnd::Cancelled), "got {end:?}");
    info!("read loop wound down cleanly");
}

#[tokio::test]
async fn split_writes_reassemble_into_frames() {
    let mut h = harness(u32::MAX);

    // Deliver a single frame one byte at a time; header accumulation must
    // absorb arbitrarily fragmented socket reads.
    let frame = combat_frame(11);
    for byte in frame {
        h.writer.write_all(&[byte]).await.unwrap();
        h.writer.flush().await.unwrap();
    }

    let message = next_message(&mut h.messages).await;
    assert_eq!(combat_id(&message), Some(11));
    h.cancel.cancel();
}
