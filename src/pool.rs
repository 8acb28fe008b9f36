//! Shared pool of overflow buffers.
//!
//! Overflow buffers are rented by producer threads while encoding and handed
//! back by the consumer thread after every sink has seen the message. The
//! pool is the only allocator state shared between those threads.
//!
//! A rented buffer is a [`PooledBuffer`], a move-only handle. Returning it
//! consumes the handle, so a buffer cannot be given back twice or touched
//! after it went back.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::Mutex;

/// Smallest buffer the pool hands out.
pub const MIN_BUFFER_SIZE: usize = 256;

/// Size classes: 256 B .. 256 MiB in powers of two.
const SIZE_CLASSES: usize = 21;

/// Buffers retained per size class; extra returns are freed.
const MAX_RETAINED_PER_CLASS: usize = 64;

lazy_static! {
    /// Process-wide pool used when no explicit pool is configured.
    static ref SHARED_POOL: Arc<BufferPool> = Arc::new(BufferPool::new());
}

/// An owned, pooled byte buffer.
///
/// The usable length is fixed at rent time and is at least the requested
/// size. Contents of a freshly rented buffer are unspecified.
#[derive(Debug)]
pub struct PooledBuffer {
    data: Vec<u8>,
}

impl PooledBuffer {
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Thread-safe pool of byte buffers bucketed by power-of-two size.
pub struct BufferPool {
    classes: Vec<Mutex<Vec<Vec<u8>>>>,
    rented: AtomicUsize,
    returned: AtomicUsize,
}

impl BufferPool {
    pub fn new() -> Self {
        Self {
            classes: (0..SIZE_CLASSES).map(|_| Mutex::new(Vec::new())).collect(),
            rented: AtomicUsize::new(0),
            returned: AtomicUsize::new(0),
        }
    }

    /// The process-wide pool.
    pub fn shared() -> Arc<BufferPool> {
        SHARED_POOL.clone()
    }

    /// Rents a buffer of at least `min_len` bytes.
    pub fn rent(&self, min_len: usize) -> PooledBuffer {
        self.rented.fetch_add(1, Ordering::Relaxed);

        let size = min_len.max(MIN_BUFFER_SIZE).next_power_of_two();
        let data = match Self::class_index(size) {
            Some(index) => self.classes[index]
                .lock()
                .pop()
                .unwrap_or_else(|| vec![0u8; size]),
            // oversized requests bypass the buckets
            None => vec![0u8; min_len],
        };
        PooledBuffer { data }
    }

    /// Returns a buffer to the pool, consuming the handle.
    pub fn give_back(&self, buffer: PooledBuffer) {
        self.returned.fetch_add(1, Ordering::Relaxed);

        let len = buffer.data.len();
        if !len.is_power_of_two() {
            return;
        }
        if let Some(index) = Self::class_index(len) {
            let mut class = self.classes[index].lock();
            if class.len() < MAX_RETAINED_PER_CLASS {
                class.push(buffer.data);
            }
        }
    }

    /// Number of buffers rented since creation.
    pub fn rented(&self) -> usize {
        self.rented.load(Ordering::Relaxed)
    }

    /// Number of buffers given back since creation.
    pub fn returned(&self) -> usize {
        self.returned.load(Ordering::Relaxed)
    }

    /// Buffers currently out of the pool.
    pub fn outstanding(&self) -> usize {
        self.rented().saturating_sub(self.returned())
    }

    fn class_index(size: usize) -> Option<usize> {
        if size < MIN_BUFFER_SIZE {
            return None;
        }
        let index = (size.trailing_zeros() - MIN_BUFFER_SIZE.trailing_zeros()) as usize;
        (index < SIZE_CLASSES).then_some(index)
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("rented", &self.rented())
            .field("returned", &self.returned())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rent_rounds_up_to_class() {
        let pool = BufferPool::new();
        assert_eq!(pool.rent(1).len(), 256);
        assert_eq!(pool.rent(257).len(), 512);
        assert_eq!(pool.rent(4096).len(), 4096);
    }

    #[test]
    fn test_returned_buffer_is_reused() {
        let pool = BufferPool::new();
        let mut buffer = pool.rent(300);
        buffer.as_mut_slice()[0] = 0xAB;
        pool.give_back(buffer);

        let again = pool.rent(400);
        assert_eq!(again.len(), 512);
        assert_eq!(again.as_slice()[0], 0xAB);
        pool.give_back(again);
    }

    #[test]
    fn test_balance_counters() {
        let pool = BufferPool::new();
        let a = pool.rent(10);
        let b = pool.rent(10_000);
        assert_eq!(pool.outstanding(), 2);
        pool.give_back(a);
        pool.give_back(b);
        assert_eq!(pool.rented(), 2);
        assert_eq!(pool.returned(), 2);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_oversized_request() {
        let pool = BufferPool::new();
        let huge = (MIN_BUFFER_SIZE << SIZE_CLASSES) + 1;
        let buffer = pool.rent(huge);
        assert!(buffer.len() >= huge);
        pool.give_back(buffer);
        assert_eq!(pool.outstanding(), 0);
    }
}
