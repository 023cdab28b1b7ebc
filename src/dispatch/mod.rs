//! Listener registration and per-type dispatch.
//!
//! Consumers register once at startup: a message type maps to an ordered
//! list of asynchronous listeners. One worker task drains one queue per
//! type, so processing is strictly in receipt order within a type while
//! different types proceed fully concurrently.
//!
//! Dispatch is deliberately an explicit registry of handler lists rather
//! than an event-multicast mechanism, so ordering is a stated, testable
//! property of this module.

mod worker;

pub(crate) use worker::Dispatcher;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::codec::{ActivityUpdate, CombatPayload};
use crate::error::Result;
use crate::wire::MessageType;

/// A decoded value handed to listeners.
///
/// Fully owned; holding one past the dispatch call is always safe.
#[derive(Debug, Clone)]
pub enum BridgeMessage {
    /// A composite combat event (message type 0).
    Combat(Arc<CombatPayload>),
    /// A heartbeat activity update (message type 1).
    Heartbeat(ActivityUpdate),
}

/// An asynchronous consumer of decoded bridge messages.
///
/// Listeners for one message type are invoked sequentially in registration
/// order and each call is awaited to completion, so a slow listener delays
/// later listeners of the same value but never another type's queue. The
/// cancellation token is the shared shutdown signal; implementations should
/// treat it cooperatively.
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    /// Handle one decoded value.
    ///
    /// Returning an error aborts the remaining listeners for this value
    /// (fail-fast, no per-listener isolation); the connection and other
    /// queues are unaffected.
    async fn on_message(&self, message: &BridgeMessage, cancel: &CancellationToken) -> Result<()>;
}

/// Ordered listener lists keyed by message type.
///
/// Built once by the lifecycle owner and handed to [`Bridge::new`];
/// listeners are appended, never reordered or removed.
///
/// [`Bridge::new`]: crate::Bridge::new
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: HashMap<MessageType, Vec<Arc<dyn Listener>>>,
}

impl ListenerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener for a message type.
    pub fn register(&mut self, message_type: MessageType, listener: impl Listener) {
        self.listeners.entry(message_type).or_default().push(Arc::new(listener));
    }

    /// Message types with at least one listener.
    pub fn registered_types(&self) -> impl Iterator<Item = MessageType> + '_ {
        self.listeners.keys().copied()
    }

    /// Number of listeners registered for a type.
    pub fn listener_count(&self, message_type: MessageType) -> usize {
        self.listeners.get(&message_type).map_or(0, Vec::len)
    }

    pub(crate) fn take(&mut self, message_type: MessageType) -> Vec<Arc<dyn Listener>> {
        self.listeners.remove(&message_type).unwrap_or_default()
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (message_type, listeners) in &self.listeners {
            map.entry(&message_type, &listeners.len());
        }
        map.finish()
    }
}
