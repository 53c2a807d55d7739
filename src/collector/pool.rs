//! Reusable response buffers shared by the collection cycles.

use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

/// Idle buffers kept around between cycles. Two cycles run concurrently,
/// so a couple of spares is enough.
const MAX_IDLE_BUFFERS: usize = 4;

/// Buffers larger than this are released instead of pooled, so one huge
/// `show stat` answer does not pin its memory forever.
const MAX_POOLED_CAPACITY: usize = 4 * 1024 * 1024;

/// Thread-safe pool of byte buffers.
#[derive(Debug, Default)]
pub struct BufferPool {
    idle: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes an empty buffer from the pool, allocating one if none is idle.
    pub fn acquire(&self) -> PooledBuffer<'_> {
        let buf = self
            .idle
            .lock()
            .ok()
            .and_then(|mut idle| idle.pop())
            .unwrap_or_default();
        PooledBuffer { pool: self, buf }
    }

    /// Number of idle buffers currently held.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }

    fn release(&self, mut buf: Vec<u8>) {
        if buf.capacity() > MAX_POOLED_CAPACITY {
            return;
        }
        buf.clear();
        if let Ok(mut idle) = self.idle.lock()
            && idle.len() < MAX_IDLE_BUFFERS
        {
            idle.push(buf);
        }
    }
}

/// A buffer borrowed from a `BufferPool`; returned to it on drop.
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buf: Vec<u8>,
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}
