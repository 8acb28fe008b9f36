use std::fmt;

use crate::pool::{BufferPool, PooledBuffer};

/// Nominal footprint of one message: pointer, packed lengths and inline bytes.
pub const MESSAGE_SIZE: usize = 256;

/// Bytes available to the inline region.
pub const INLINE_CAPACITY: usize = MESSAGE_SIZE - 8 - 4;

/// Largest overflow stream the 24-bit outer length can describe.
pub const MAX_OUTER_LEN: usize = 0xFF_FFFF;

/// An encoded token stream.
///
/// Small messages live entirely in the inline region. Once a message outgrows
/// it, the whole stream lives in a pooled overflow buffer and the inline
/// region is unused. The overflow buffer is owned by the message until it is
/// [released](LogMessage::release) back to its pool.
pub enum LogMessage {
    Inline {
        data: [u8; INLINE_CAPACITY],
        len: u8,
    },
    Overflow {
        buffer: PooledBuffer,
        len: usize,
    },
}

impl LogMessage {
    /// A message with no tokens.
    pub fn empty() -> Self {
        LogMessage::Inline {
            data: [0u8; INLINE_CAPACITY],
            len: 0,
        }
    }

    /// Copies an inline stream. Returns `None` if it does not fit.
    pub fn from_inline(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > INLINE_CAPACITY {
            return None;
        }
        let mut data = [0u8; INLINE_CAPACITY];
        data[..bytes.len()].copy_from_slice(bytes);
        Some(LogMessage::Inline {
            data,
            len: bytes.len() as u8,
        })
    }

    /// Wraps an overflow buffer holding `len` stream bytes.
    pub fn from_overflow(buffer: PooledBuffer, len: usize) -> Self {
        debug_assert!(len <= buffer.len());
        let len = len.min(buffer.len());
        LogMessage::Overflow { buffer, len }
    }

    /// Bytes used in the inline region.
    pub fn inner_len(&self) -> usize {
        match self {
            LogMessage::Inline { len, .. } => *len as usize,
            LogMessage::Overflow { .. } => 0,
        }
    }

    /// Bytes used in the overflow region.
    pub fn outer_len(&self) -> usize {
        match self {
            LogMessage::Inline { .. } => 0,
            LogMessage::Overflow { len, .. } => *len,
        }
    }

    pub fn is_overflow(&self) -> bool {
        matches!(self, LogMessage::Overflow { .. })
    }

    /// The encoded stream of the active region.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            LogMessage::Inline { data, len } => &data[..*len as usize],
            LogMessage::Overflow { buffer, len } => &buffer.as_slice()[..*len],
        }
    }

    /// Packed `inner << 24 | outer` length word used by the file store.
    ///
    /// `None` when the overflow stream is too long for 24 bits.
    pub fn length_descriptor(&self) -> Option<u32> {
        let outer = self.outer_len();
        if outer > MAX_OUTER_LEN {
            return None;
        }
        Some(((self.inner_len() as u32) << 24) | outer as u32)
    }

    /// Splits a length word into `(inner, outer)`.
    pub fn split_descriptor(descriptor: u32) -> (usize, usize) {
        (
            (descriptor >> 24) as usize,
            (descriptor & MAX_OUTER_LEN as u32) as usize,
        )
    }

    /// Takes the overflow buffer out of the message, if any.
    pub fn into_overflow_buffer(self) -> Option<PooledBuffer> {
        match self {
            LogMessage::Inline { .. } => None,
            LogMessage::Overflow { buffer, .. } => Some(buffer),
        }
    }

    /// Consumes the message and returns its overflow buffer to `pool`.
    pub fn release(self, pool: &BufferPool) {
        if let Some(buffer) = self.into_overflow_buffer() {
            pool.give_back(buffer);
        }
    }
}

impl Default for LogMessage {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for LogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogMessage")
            .field("inner_len", &self.inner_len())
            .field("outer_len", &self.outer_len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_capacity() {
        assert_eq!(INLINE_CAPACITY, 244);
        assert!(LogMessage::from_inline(&[0u8; INLINE_CAPACITY]).is_some());
        assert!(LogMessage::from_inline(&[0u8; INLINE_CAPACITY + 1]).is_none());
    }

    #[test]
    fn test_descriptor_packing() {
        let inline = LogMessage::from_inline(&[1, 2, 3]).unwrap();
        assert_eq!(inline.length_descriptor(), Some(3 << 24));

        let pool = BufferPool::new();
        let overflow = LogMessage::from_overflow(pool.rent(1000), 1000);
        let descriptor = overflow.length_descriptor().unwrap();
        assert_eq!(LogMessage::split_descriptor(descriptor), (0, 1000));
        overflow.release(&pool);
        assert_eq!(pool.outstanding(), 0);
    }
}
