//! Scratch buffer pool for the scanning hot path

use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};

/// Largest capacity a released buffer may keep and still be pooled (2 MiB)
pub const DEFAULT_MAX_CAPACITY: usize = 2 * 1024 * 1024;

/// Number of idle buffers retained by default
pub const DEFAULT_MAX_BUFFERS: usize = 32;

/// Pool of reusable byte buffers
///
/// Buffers come out empty and go back empty. A buffer that grew past
/// `max_capacity` is dropped on release instead of being retained.
#[derive(Debug)]
pub struct BufferPool {
    /// Idle buffers, all zero-length
    free: Mutex<Vec<Vec<u8>>>,

    /// Capacity ceiling for retained buffers
    max_capacity: usize,

    /// Maximum number of idle buffers
    max_buffers: usize,
}

impl BufferPool {
    /// Create a new pool
    ///
    /// # Arguments
    /// * `max_capacity` - Buffers with more capacity than this are dropped on release
    /// * `max_buffers` - Maximum number of idle buffers kept around
    pub fn new(max_capacity: usize, max_buffers: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(max_buffers)),
            max_capacity,
            max_buffers,
        }
    }

    /// Borrow a zero-length buffer; it returns to the pool when dropped
    pub fn acquire(&self) -> PooledBuffer<'_> {
        let buf = self.free.lock().pop().unwrap_or_default();
        debug_assert!(buf.is_empty());
        PooledBuffer {
            pool: self,
            buf: Some(buf),
        }
    }

    /// Hand a buffer back to the pool
    ///
    /// Ownership moves into the pool, so the former holder cannot touch it.
    pub fn release(&self, mut buf: Vec<u8>) {
        if buf.capacity() > self.max_capacity {
            tracing::trace!(capacity = buf.capacity(), "dropping oversized scratch buffer");
            return;
        }
        buf.clear();

        let mut free = self.free.lock();
        if free.len() < self.max_buffers {
            free.push(buf);
        }
    }

    /// Number of idle buffers currently held
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CAPACITY, DEFAULT_MAX_BUFFERS)
    }
}

/// A buffer on loan from a [`BufferPool`]
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buf: Option<Vec<u8>>,
}

impl PooledBuffer<'_> {
    /// Detach the buffer from the pool entirely
    pub fn into_inner(mut self) -> Vec<u8> {
        self.buf.take().unwrap_or_default()
    }
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        // Only `into_inner` and `drop` take the buffer, and both consume self.
        self.buf.as_ref().unwrap_or(&EMPTY)
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        self.buf.get_or_insert_with(Vec::new)
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}

static EMPTY: Vec<u8> = Vec::new();

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_acquired_buffer_is_empty_after_reuse() {
        let pool = BufferPool::new(1024, 4);

        {
            let mut buf = pool.acquire();
            buf.extend_from_slice(b"sui_image_params");
        }
        assert_eq!(pool.idle(), 1);

        let buf = pool.acquire();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 16);
    }

    #[test]
    fn test_oversized_buffer_not_retained() {
        let pool = BufferPool::new(64, 4);

        {
            let mut buf = pool.acquire();
            buf.resize(1024, 0);
        }
        assert_eq!(pool.idle(), 0);

        pool.release(Vec::with_capacity(8));
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_idle_count_capped() {
        let pool = BufferPool::new(1024, 2);
        for _ in 0..5 {
            pool.release(Vec::with_capacity(16));
        }
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn test_into_inner_detaches() {
        let pool = BufferPool::default();
        let mut buf = pool.acquire();
        buf.push(7);
        let owned = buf.into_inner();
        assert_eq!(owned, vec![7]);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_concurrent_acquire_release() {
        let pool = Arc::new(BufferPool::new(4096, 8));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let mut buf = pool.acquire();
                        assert!(buf.is_empty());
                        buf.extend(std::iter::repeat(i as u8).take(64));
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert!(pool.idle() <= 8);
    }
}
