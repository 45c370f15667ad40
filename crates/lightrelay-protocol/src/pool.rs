//! Reusable send buffers.
//!
//! Every outbound frame is written into a buffer of exactly the transport's
//! maximum packet size. Buffers are pulled from a [`BufferPool`] for the
//! duration of one send and go back to the pool when the guard drops, so
//! steady-state relaying does not allocate per frame.

use std::ops::{Deref, DerefMut};

use parking_lot::Mutex;

/// A thread-safe stack of fixed-size byte buffers.
pub struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
    buffer_size: usize,
    max_idle: usize,
}

impl BufferPool {
    /// Creates an empty pool. Buffers are allocated lazily; at most
    /// `max_idle` are kept once returned.
    pub fn new(buffer_size: usize, max_idle: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::with_capacity(max_idle)),
            buffer_size,
            max_idle,
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Number of buffers currently waiting in the pool.
    pub fn idle(&self) -> usize {
        self.buffers.lock().len()
    }

    /// Takes a buffer from the pool, allocating one if the pool is empty.
    ///
    /// The contents are whatever the previous user left behind. Callers
    /// only read back the prefix they wrote.
    pub fn acquire(&self) -> PooledBuffer<'_> {
        let buf = self
            .buffers
            .lock()
            .pop()
            .unwrap_or_else(|| vec![0u8; self.buffer_size]);
        PooledBuffer {
            pool: self,
            buf: Some(buf),
        }
    }

    fn release(&self, buf: Vec<u8>) {
        let mut buffers = self.buffers.lock();
        if buffers.len() < self.max_idle {
            buffers.push(buf);
        }
    }
}

/// A buffer borrowed from a [`BufferPool`]. Returned on drop.
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buf: Option<Vec<u8>>,
}

impl Deref for PooledBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or_default()
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or_default()
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_returns_buffer_of_configured_size() {
        let pool = BufferPool::new(512, 4);
        let buf = pool.acquire();
        assert_eq!(buf.len(), 512);
    }

    #[test]
    fn test_drop_returns_buffer_to_pool() {
        let pool = BufferPool::new(64, 4);
        assert_eq!(pool.idle(), 0);
        {
            let mut buf = pool.acquire();
            buf[0] = 42;
        }
        assert_eq!(pool.idle(), 1);

        let buf = pool.acquire();
        assert_eq!(buf[0], 42, "the same allocation should be reused");
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_release_beyond_max_idle_discards() {
        let pool = BufferPool::new(16, 1);
        let a = pool.acquire();
        let b = pool.acquire();
        drop(a);
        drop(b);
        assert_eq!(pool.idle(), 1);
    }
}
