//! Liveness watchdog derived from heartbeat recency.
//!
//! Distinguishes three bridge states the socket alone cannot: not connected,
//! connected but idle (the companion is up while the game sits on a loading
//! screen), and actively streaming. The heartbeat worker feeds the watchdog;
//! an unrelated polling context (typically a render loop) calls [`poll`] once
//! per tick and reads the derived flag.
//!
//! [`poll`]: LivenessWatchdog::poll

use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// How stale the last heartbeat may be before the source is considered idle.
pub const HEARTBEAT_LEEWAY: Duration = Duration::from_millis(1000);

#[derive(Debug)]
struct WatchdogState {
    /// Activity flag carried by the most recent heartbeat.
    hud_active: bool,
    /// When the most recent heartbeat arrived.
    last_seen: Option<Instant>,
    /// Derived flag as of the last `poll`.
    render_present: bool,
}

/// Tracks heartbeat recency and classifies bridge health.
///
/// Writers (the heartbeat worker) and readers (a polling thread) are
/// unrelated tasks; a single mutex around the whole state is sufficient
/// given the low update frequency.
#[derive(Debug)]
pub struct LivenessWatchdog {
    state: Mutex<WatchdogState>,
    leeway: Duration,
}

impl LivenessWatchdog {
    /// Watchdog with the standard 1000 ms leeway.
    pub fn new() -> Self {
        Self::with_leeway(HEARTBEAT_LEEWAY)
    }

    /// Watchdog with a custom leeway (tests tighten this).
    pub fn with_leeway(leeway: Duration) -> Self {
        Self {
            state: Mutex::new(WatchdogState {
                hud_active: false,
                last_seen: None,
                render_present: false,
            }),
            leeway,
        }
    }

    /// Record a heartbeat: set the activity flag and restart the recency
    /// timer.
    pub fn record_heartbeat(&self, active: bool) {
        let mut state = self.state.lock().expect("watchdog poisoned");
        state.hud_active = active;
        state.last_seen = Some(Instant::now());
    }

    /// The activity flag from the most recent heartbeat.
    pub fn hud_is_active(&self) -> bool {
        self.state.lock().expect("watchdog poisoned").hud_active
    }

    /// Recompute and return the derived liveness flag.
    ///
    /// True iff a heartbeat arrived within the leeway window. Meant to be
    /// called once per external tick; [`render_present`] returns the value
    /// computed by the most recent poll without recomputing.
    ///
    /// [`render_present`]: LivenessWatchdog::render_present
    pub fn poll(&self) -> bool {
        let mut state = self.state.lock().expect("watchdog poisoned");
        state.render_present = match state.last_seen {
            Some(seen) => seen.elapsed() < self.leeway,
            None => false,
        };
        state.render_present
    }

    /// The derived flag as of the last [`poll`](LivenessWatchdog::poll).
    pub fn render_present(&self) -> bool {
        self.state.lock().expect("watchdog poisoned").render_present
    }
}

impl Default for LivenessWatchdog {
    fn default() -> Self {
        Self::new()
    }
}
