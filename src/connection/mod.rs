//! Connection lifecycle management.
//!
//! [`Bridge`] owns socket connect/disconnect and the background read loop.
//! It does not reconnect on its own: when the companion process dies the
//! bridge degrades to idle and the lifecycle owner calls [`Bridge::initialize`]
//! again once the process is back, typically driven by watching the game
//! client restart.

mod reader;
#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::dispatch::{Dispatcher, ListenerRegistry};
use crate::error::{BridgeError, Result};
use crate::watchdog::LivenessWatchdog;
use crate::wire::BufferPool;

use reader::ReadLoopEnd;

/// Lifecycle events surfaced to the owning collaborator.
#[derive(Debug, Clone)]
pub enum BridgeNotification {
    /// The connection transitioned to disconnected. Sent exactly once per
    /// connected-to-disconnected transition, whether requested or implicit.
    Disconnected,
    /// The read loop failed; carries the classified failure. Always followed
    /// by `Disconnected`.
    Error(Arc<BridgeError>),
}

/// Connection slot states. `initialize` claims the slot before awaiting
/// the socket connect, so two calls in flight cannot both open a stream.
const DISCONNECTED: u8 = 0;
const CONNECTING: u8 = 1;
const CONNECTED: u8 = 2;

/// Shared connection state mutated by `disconnect` and the reader task.
struct Shared {
    state: AtomicU8,
    /// Bumped on every `initialize`; a reader task from a superseded
    /// connection must not tear down its successor.
    generation: AtomicU64,
    /// Cancellation for the current connection's read loop only.
    conn_cancel: Mutex<Option<CancellationToken>>,
    notify: mpsc::UnboundedSender<BridgeNotification>,
}

impl Shared {
    /// Idempotent disconnect: the first caller per connection wins and emits
    /// the single `Disconnected` notification.
    fn finish_disconnect(&self, generation: u64) {
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        if self
            .state
            .compare_exchange(CONNECTED, DISCONNECTED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            if let Some(cancel) = self.conn_cancel.lock().expect("connection state poisoned").take()
            {
                cancel.cancel();
            }
            let _ = self.notify.send(BridgeNotification::Disconnected);
            info!("bridge disconnected");
        }
    }

    fn report_error(&self, generation: u64, error: BridgeError) {
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        let _ = self.notify.send(BridgeNotification::Error(Arc::new(error)));
    }
}

/// The combat-telemetry bridge client.
///
/// Construction wires the explicit dependencies (listener registry, liveness
/// watchdog, shared cancellation signal) and spawns the per-type workers;
/// [`initialize`](Bridge::initialize) then opens the socket and starts the
/// read loop. The same bridge can be re-initialized after a disconnect,
/// reusing workers, registrations, and the notification channel.
///
/// # Example
///
/// ```rust,no_run
/// use arcbridge::{Bridge, BridgeConfig, ListenerRegistry, LivenessWatchdog};
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn run() -> arcbridge::Result<()> {
/// let registry = ListenerRegistry::new();
/// let watchdog = Arc::new(LivenessWatchdog::new());
/// let cancel = CancellationToken::new();
///
/// let (bridge, mut notifications) = Bridge::new(registry, Arc::clone(&watchdog), cancel);
/// bridge.initialize(&BridgeConfig::for_process(std::process::id())).await?;
///
/// while let Some(event) = notifications.recv().await {
///     println!("bridge event: {event:?}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct Bridge {
    dispatcher: Arc<Dispatcher>,
    pool: Arc<BufferPool>,
    cancel: CancellationToken,
    shared: Arc<Shared>,
}

impl Bridge {
    /// Wire up a bridge and spawn its per-type workers.
    ///
    /// Returns the bridge plus the receiver for lifecycle notifications.
    /// `cancel` is the single shared shutdown signal: it is checked at the
    /// top of the read loop, before each queue dequeue, and between listener
    /// invocations.
    pub fn new(
        registry: ListenerRegistry,
        watchdog: Arc<LivenessWatchdog>,
        cancel: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<BridgeNotification>) {
        let (notify, notifications) = mpsc::unbounded_channel();
        let dispatcher = Arc::new(Dispatcher::spawn(registry, watchdog, cancel.clone()));
        let bridge = Self {
            dispatcher,
            pool: BufferPool::new(),
            cancel,
            shared: Arc::new(Shared {
                state: AtomicU8::new(DISCONNECTED),
                generation: AtomicU64::new(0),
                conn_cancel: Mutex::new(None),
                notify,
            }),
        };
        (bridge, notifications)
    }

    /// Connect to the companion endpoint and start the read loop.
    ///
    /// Fails if already connected or if the endpoint is unreachable. Socket
    /// errors after this returns surface as an [`BridgeNotification::Error`]
    /// followed by [`BridgeNotification::Disconnected`].
    pub async fn initialize(&self, config: &BridgeConfig) -> Result<()> {
        // Claim the connection slot before the connect await; a concurrent
        // initialize must fail here rather than open a second stream.
        if self
            .shared
            .state
            .compare_exchange(DISCONNECTED, CONNECTING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(BridgeError::connection_failed("already connected"));
        }

        let endpoint = config.endpoint();
        info!(%endpoint, "connecting to bridge");
        let stream = match TcpStream::connect(endpoint).await {
            Ok(stream) => stream,
            Err(e) => {
                self.shared.state.store(DISCONNECTED, Ordering::SeqCst);
                return Err(BridgeError::connection_failed_with_source(
                    format!("could not reach companion at {endpoint}"),
                    Box::new(e),
                ));
            }
        };

        let conn_cancel = self.cancel.child_token();
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut slot = self.shared.conn_cancel.lock().expect("connection state poisoned");
            *slot = Some(conn_cancel.clone());
        }
        self.shared.state.store(CONNECTED, Ordering::SeqCst);
        info!(%endpoint, generation, "bridge connected");

        self.spawn_read_loop(stream, config.max_payload_size, conn_cancel, generation);
        Ok(())
    }

    fn spawn_read_loop(
        &self,
        stream: TcpStream,
        max_payload_size: u32,
        conn_cancel: CancellationToken,
        generation: u64,
    ) {
        let pool = Arc::clone(&self.pool);
        let dispatcher = Arc::clone(&self.dispatcher);
        let shared = Arc::clone(&self.shared);

        tokio::spawn(async move {
            let end = reader::run(stream, pool, dispatcher, max_payload_size, conn_cancel).await;
            match end {
                ReadLoopEnd::Cancelled => debug!("read loop ended by cancellation"),
                ReadLoopEnd::CleanEof => debug!("companion closed the stream"),
                ReadLoopEnd::Failed(error) => {
                    warn!(%error, "read loop failed");
                    shared.report_error(generation, error);
                }
            }
            // Every exit path is an implicit disconnect; at most one
            // notification fires thanks to the state transition.
            shared.finish_disconnect(generation);
        });
    }

    /// Disconnect if connected; a no-op otherwise.
    ///
    /// Exactly one [`BridgeNotification::Disconnected`] is emitted per
    /// connected-to-disconnected transition regardless of how many times
    /// this is called.
    pub fn disconnect(&self) {
        self.shared.finish_disconnect(self.shared.generation.load(Ordering::SeqCst));
    }

    /// Whether the socket is currently open.
    ///
    /// Note this only means the transport is up; use the watchdog's
    /// `render_present` to know whether the source is actively streaming.
    pub fn is_connected(&self) -> bool {
        self.shared.state.load(Ordering::SeqCst) == CONNECTED
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        debug!("dropping bridge");
        self.shared.finish_disconnect(self.shared.generation.load(Ordering::SeqCst));
    }
}
