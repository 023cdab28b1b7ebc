//! Reusable payload buffer pool.
//!
//! The read loop rents one buffer per frame and the decode step drops it
//! immediately after decoding, so in steady state the same few buffers cycle
//! between the reader task and the per-type workers without fresh
//! allocations.
//!
//! # Design
//!
//! - A mutexed free list of `BytesMut` buffers; rent and return are each a
//!   single short critical section, safe from any task.
//! - [`PooledBuffer`] is an RAII guard: dropping it returns the buffer to
//!   the pool exactly once, including on decode-error paths.
//! - The free list is capped; surplus returns are simply dropped so a burst
//!   of large frames cannot pin memory forever.

use bytes::BytesMut;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

/// Number of buffers retained when idle.
const FREE_LIST_CAP: usize = 16;

/// Initial capacity of a freshly allocated pool buffer.
const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;

/// Shared pool of reusable payload buffers.
#[derive(Debug)]
pub struct BufferPool {
    free: Mutex<Vec<BytesMut>>,
}

impl BufferPool {
    /// Create an empty pool.
    pub fn new() -> Arc<Self> {
        Arc::new(Self { free: Mutex::new(Vec::with_capacity(FREE_LIST_CAP)) })
    }

    /// Rent a zeroed buffer of exactly `len` bytes.
    ///
    /// Reuses a pooled buffer when one is available, allocating otherwise.
    pub fn rent(self: &Arc<Self>, len: usize) -> PooledBuffer {
        let mut buf = {
            let mut free = self.free.lock().expect("buffer pool poisoned");
            free.pop().unwrap_or_else(|| BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY))
        };
        buf.clear();
        buf.resize(len, 0);
        PooledBuffer { buf: Some(buf), pool: Arc::clone(self) }
    }

    /// Number of buffers currently idle in the pool.
    pub fn idle_count(&self) -> usize {
        self.free.lock().expect("buffer pool poisoned").len()
    }

    fn put_back(&self, buf: BytesMut) {
        let mut free = self.free.lock().expect("buffer pool poisoned");
        if free.len() < FREE_LIST_CAP {
            free.push(buf);
        }
        // Surplus buffers fall out of scope here.
    }
}

/// A rented buffer that returns itself to the pool on drop.
///
/// Derefs to `[u8]` over exactly the rented length.
#[derive(Debug)]
pub struct PooledBuffer {
    buf: Option<BytesMut>,
    pool: Arc<BufferPool>,
}

impl PooledBuffer {
    /// Length of the rented payload.
    pub fn len(&self) -> usize {
        self.buf.as_ref().map_or(0, |b| b.len())
    }

    /// Whether the rented payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or(&[])
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or(&mut [])
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.put_back(buf);
        }
    }
}
