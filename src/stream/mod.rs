//! Stream-style consumption of decoded combat events.
//!
//! Most consumers want a plain `Stream` rather than implementing
//! [`Listener`] by hand. [`combat_channel`] bridges the two: register the
//! returned listener, then pull events off the stream.
//!
//! ```rust,no_run
//! use arcbridge::{ListenerRegistry, MessageType, stream};
//! use futures::StreamExt;
//!
//! # async fn run() {
//! let (listener, mut events) = stream::combat_channel();
//! let mut registry = ListenerRegistry::new();
//! registry.register(MessageType::CombatEvent, listener);
//!
//! while let Some(event) = events.next().await {
//!     println!("skill {:?} id {}", event.skill_name, event.id);
//! }
//! # }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::codec::CombatPayload;
use crate::dispatch::{BridgeMessage, Listener};
use crate::error::Result;

/// Listener half of a combat event channel.
///
/// Forwards every combat event into the paired stream; ignores other
/// message types. Forwarding never blocks the dispatching worker, and a
/// dropped stream simply turns the listener into a no-op.
pub struct CombatChannelListener {
    tx: mpsc::UnboundedSender<Arc<CombatPayload>>,
}

#[async_trait]
impl Listener for CombatChannelListener {
    async fn on_message(&self, message: &BridgeMessage, _cancel: &CancellationToken) -> Result<()> {
        if let BridgeMessage::Combat(payload) = message {
            // Receiver gone means the consumer left; not a dispatch failure.
            let _ = self.tx.send(Arc::clone(payload));
        }
        Ok(())
    }
}

/// Create a listener/stream pair for combat events.
pub fn combat_channel() -> (CombatChannelListener, impl Stream<Item = Arc<CombatPayload>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CombatChannelListener { tx }, UnboundedReceiverStream::new(rx))
}
