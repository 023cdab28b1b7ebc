//! Frame read loop.
//!
//! One task per connection: it suspends only on socket I/O and hands every
//! complete payload to the dispatcher, so decode and listener work can never
//! block reads. Partial reads are absorbed by `read_exact`, which accumulates
//! the exact 5 header bytes and then the exact declared payload length before
//! a frame is considered complete.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::Dispatcher;
use crate::error::{BridgeError, Result};
use crate::wire::{BufferPool, FRAME_HEADER_SIZE, FrameHeader};

/// Outcome of a read loop that ended.
#[derive(Debug)]
pub(crate) enum ReadLoopEnd {
    /// Cancellation was requested; not an error.
    Cancelled,
    /// The peer shut the stream down cleanly at a frame boundary.
    CleanEof,
    /// A transport or protocol failure tore the stream down.
    Failed(BridgeError),
}

/// Run the frame read loop until cancellation, EOF, or failure.
///
/// Generic over the reader so tests can drive it with an in-memory duplex
/// stream instead of a TCP socket.
pub(crate) async fn run<R>(
    mut stream: R,
    pool: Arc<BufferPool>,
    dispatcher: Arc<Dispatcher>,
    max_payload_size: u32,
    cancel: CancellationToken,
) -> ReadLoopEnd
where
    R: AsyncRead + Unpin,
{
    debug!("frame read loop started");
    let mut frames = 0u64;
    let mut dropped = 0u64;

    loop {
        if cancel.is_cancelled() {
            debug!(frames, dropped, "read loop cancelled");
            return ReadLoopEnd::Cancelled;
        }

        let header = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(frames, dropped, "read loop cancelled during header read");
                return ReadLoopEnd::Cancelled;
            }
            header = read_header(&mut stream) => match header {
                Ok(Some(header)) => header,
                Ok(None) => {
                    debug!(frames, dropped, "stream closed at frame boundary");
                    return ReadLoopEnd::CleanEof;
                }
                Err(e) => {
                    warn!(error = %e, "header read failed");
                    return ReadLoopEnd::Failed(e);
                }
            },
        };

        if let Err(e) = header.validate(max_payload_size) {
            warn!(length = header.payload_length, "declared payload length over cap");
            return ReadLoopEnd::Failed(e);
        }

        // The payload is always fully drained, registered type or not; the
        // declared length is the only thing keeping the stream aligned.
        let mut buffer = pool.rent(header.payload_length as usize);
        let read = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(frames, dropped, "read loop cancelled during payload read");
                return ReadLoopEnd::Cancelled;
            }
            read = stream.read_exact(&mut buffer) => read,
        };
        if let Err(e) = read {
            warn!(error = %e, "payload read failed mid-frame");
            return ReadLoopEnd::Failed(BridgeError::socket(e));
        }

        frames += 1;
        trace!(frames, message_type = header.message_type, length = header.payload_length, "frame read");

        if !dispatcher.route(header.message_type, buffer) {
            // No queue for this type: buffer already released via drop.
            dropped += 1;
            trace!(message_type = header.message_type, dropped, "dropped frame for unregistered type");
        }
    }
}

/// Read one 5-byte header.
///
/// Returns `Ok(None)` on a clean EOF before any header byte arrives, which
/// is an orderly shutdown rather than framing corruption.
async fn read_header<R>(stream: &mut R) -> Result<Option<FrameHeader>>
where
    R: AsyncRead + Unpin,
{
    let mut header_bytes = [0u8; FRAME_HEADER_SIZE];

    // First byte separately: EOF here is a frame boundary, EOF later is not.
    match stream.read(&mut header_bytes[..1]).await {
        Ok(0) => return Ok(None),
        Ok(_) => {}
        Err(e) => return Err(BridgeError::socket(e)),
    }
    stream.read_exact(&mut header_bytes[1..]).await.map_err(BridgeError::socket)?;

    Ok(Some(FrameHeader::decode(&header_bytes).expect("buffer is exactly header sized")))
}
