//! Wire transport layer: frame header codec and payload buffer pool.

mod frame;
mod pool;

pub use frame::{FRAME_HEADER_SIZE, FrameHeader, MessageType, RawMessageType};
pub use pool::{BufferPool, PooledBuffer};
