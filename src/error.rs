//! Error types for the combat-telemetry bridge.
//!
//! All errors implement the `std::error::Error` trait and carry structured
//! context for debugging and recovery guidance.
//!
//! ## Error Categories
//!
//! - **Connection Errors**: failure to reach the companion process
//! - **Socket Errors**: classified transport failures inside the read loop
//! - **Protocol Errors**: frame-level violations (oversized length, bad header)
//! - **Decode Errors**: a single payload that does not match its layout
//! - **Listener Errors**: a registered consumer rejected a decoded value
//!
//! ## Recovery and Retry
//!
//! Errors expose whether they are worth retrying:
//!
//! ```rust
//! use arcbridge::BridgeError;
//!
//! let error = BridgeError::connection_failed("companion process not running");
//! if error.is_retryable() {
//!     println!("Can retry this operation");
//! }
//! ```

use thiserror::Error;

/// Result type alias for bridge operations.
pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

/// Classification of a transport failure observed by the read loop.
///
/// The raw `std::io::Error` is preserved as the error source; this enum is
/// what gets carried in the error notification so collaborators can react
/// without string-matching OS messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SocketErrorKind {
    /// Connection refused: the companion process is not listening.
    Refused,
    /// Connection reset by the peer mid-stream.
    Reset,
    /// Connection aborted locally (socket disposed while reading).
    Aborted,
    /// The peer closed the stream inside a frame.
    SeveredMidFrame,
    /// Anything else the OS reported.
    Other,
}

impl SocketErrorKind {
    /// Classify a raw I/O error into a transport failure category.
    pub fn classify(err: &std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::ConnectionRefused => SocketErrorKind::Refused,
            ErrorKind::ConnectionReset => SocketErrorKind::Reset,
            ErrorKind::ConnectionAborted | ErrorKind::NotConnected => SocketErrorKind::Aborted,
            ErrorKind::UnexpectedEof => SocketErrorKind::SeveredMidFrame,
            _ => SocketErrorKind::Other,
        }
    }
}

impl std::fmt::Display for SocketErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SocketErrorKind::Refused => "connection refused",
            SocketErrorKind::Reset => "connection reset",
            SocketErrorKind::Aborted => "connection aborted",
            SocketErrorKind::SeveredMidFrame => "stream severed mid-frame",
            SocketErrorKind::Other => "socket error",
        };
        f.write_str(name)
    }
}

/// Main error type for bridge operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BridgeError {
    #[error("Failed to connect to bridge: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Socket failure ({kind})")]
    Socket {
        kind: SocketErrorKind,
        #[source]
        source: std::io::Error,
    },

    #[error("Protocol violation: {details}")]
    Protocol { details: String },

    #[error("Decode error in {context}: {details}")]
    Decode { context: String, details: String },

    #[error("Listener rejected event: {reason}")]
    Listener {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl BridgeError {
    /// Returns whether this error is potentially recoverable through retry.
    ///
    /// Transport-level failures are retryable because the companion process
    /// restarts routinely; protocol and decode failures are not, since the
    /// same bytes would fail again.
    pub fn is_retryable(&self) -> bool {
        match self {
            BridgeError::Connection { .. } => true,
            BridgeError::Socket { .. } => true,
            BridgeError::Protocol { .. } => false,
            BridgeError::Decode { .. } => false,
            BridgeError::Listener { .. } => false,
        }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        BridgeError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        BridgeError::Connection { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for classified socket errors.
    pub fn socket(source: std::io::Error) -> Self {
        BridgeError::Socket { kind: SocketErrorKind::classify(&source), source }
    }

    /// Helper constructor for protocol violations.
    pub fn protocol(details: impl Into<String>) -> Self {
        BridgeError::Protocol { details: details.into() }
    }

    /// Helper constructor for decode errors with field context.
    pub fn decode(context: impl Into<String>, details: impl Into<String>) -> Self {
        BridgeError::Decode { context: context.into(), details: details.into() }
    }

    /// Helper constructor for listener failures.
    pub fn listener(reason: impl Into<String>) -> Self {
        BridgeError::Listener { reason: reason.into(), source: None }
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::socket(err)
    }
}
