//! Async client for a local combat-telemetry bridge.
//!
//! Connects to a companion combat-logging process over a loopback TCP
//! socket, decodes its length-prefixed binary event stream, and fans
//! decoded events out to registered consumers.
//!
//! # Features
//!
//! - **Ordered dispatch**: strict FIFO within a message type, full
//!   concurrency across types
//! - **Buffer reuse**: pooled payload buffers, no per-frame allocation in
//!   steady state
//! - **Crash tolerance**: the companion process may appear, vanish, and
//!   restart at any time; the bridge degrades to idle instead of breaking
//! - **Liveness tracking**: a heartbeat watchdog distinguishes "connected
//!   but idle" from "actively streaming"
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use arcbridge::{Bridge, BridgeConfig, ListenerRegistry, LivenessWatchdog, MessageType, stream};
//! use futures::StreamExt;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> arcbridge::Result<()> {
//!     let (listener, mut events) = stream::combat_channel();
//!     let mut registry = ListenerRegistry::new();
//!     registry.register(MessageType::CombatEvent, listener);
//!
//!     let watchdog = Arc::new(LivenessWatchdog::new());
//!     let cancel = CancellationToken::new();
//!     let (bridge, _notifications) = Bridge::new(registry, Arc::clone(&watchdog), cancel);
//!
//!     bridge.initialize(&BridgeConfig::for_process(std::process::id())).await?;
//!
//!     while let Some(event) = events.next().await {
//!         if let Some(ev) = &event.ev {
//!             println!("skill {} hit for {}", ev.skill_id, ev.value);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod codec;
mod config;
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod wire;

// Bridge architecture
pub mod connection;
pub mod dispatch;
pub mod stream;
pub mod watchdog;

// Core exports
pub use codec::{ActivityUpdate, Agent, CombatEvent, CombatPayload};
pub use config::{BridgeConfig, DEFAULT_MAX_PAYLOAD_SIZE, bridge_port};
pub use error::{BridgeError, Result, SocketErrorKind};
pub use wire::{FRAME_HEADER_SIZE, FrameHeader, MessageType};

// Main API exports
pub use connection::{Bridge, BridgeNotification};
pub use dispatch::{BridgeMessage, Listener, ListenerRegistry};
pub use watchdog::{HEARTBEAT_LEEWAY, LivenessWatchdog};
