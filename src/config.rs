//! Bridge endpoint configuration.
//!
//! The companion process listens on a loopback port derived from the host
//! game-client process id: the low 16 bits of the pid with bits 14 and 15
//! forced on. The forced bits keep the port in the 49152-65535 range so it
//! can never collide with a well-known or ephemeral-range service, and the
//! pid mask makes the port predictable per game-client instance when several
//! clients run at once.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Port mask forcing bits 14 and 15 on.
const PORT_HIGH_BITS: u16 = (1 << 14) | (1 << 15);

/// Derive the bridge port for a given game-client process id.
pub fn bridge_port(process_id: u32) -> u16 {
    (process_id & 0xFFFF) as u16 | PORT_HIGH_BITS
}

/// Configuration for a bridge connection.
///
/// The transport is loopback-only; there is deliberately no way to point the
/// bridge at a remote host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Port the companion process listens on.
    pub port: u16,
    /// Upper bound on a declared frame payload length, in bytes.
    ///
    /// A length above this is treated as stream corruption and tears the
    /// connection down. Defaults to [`DEFAULT_MAX_PAYLOAD_SIZE`].
    pub max_payload_size: u32,
}

/// Default maximum payload size (4 MiB). Real combat payloads are a few
/// hundred bytes at most; anything near this bound means the stream is
/// desynchronized.
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 4 * 1024 * 1024;

impl BridgeConfig {
    /// Configuration targeting the companion instance paired with the given
    /// game-client process id.
    pub fn for_process(process_id: u32) -> Self {
        Self { port: bridge_port(process_id), max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE }
    }

    /// Configuration for an explicit port (used by tests and simulators).
    pub fn for_port(port: u16) -> Self {
        Self { port, max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE }
    }

    /// The loopback socket address to connect to.
    pub fn endpoint(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), self.port)
    }
}
