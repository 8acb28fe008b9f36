//! Token stream encoder.
//!
//! [`MessageWriter`] appends tokens to the inline region of a message and
//! moves to a pooled overflow buffer once the inline region is exhausted.
//! On that switch every byte written so far is copied into the overflow
//! buffer, which from then on holds the complete stream from offset zero.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::clock;
use crate::loggable::{Decimal, LogValue};
use crate::message::{LogMessage, INLINE_CAPACITY};
use crate::pool::{BufferPool, PooledBuffer, MIN_BUFFER_SIZE};
use crate::token::TokenType;

/// Longest name, format or event string, in bytes.
pub const MAX_SHORT_STRING: usize = u8::MAX as usize;

macro_rules! append_fixed {
    ($(#[$doc:meta])* $fn_name:ident, $ty:ty, $token:ident) => {
        $(#[$doc])*
        pub fn $fn_name(&mut self, name: &str, value: Option<$ty>, format: Option<&str>) {
            match value {
                None => self.append_null(name),
                Some(v) => {
                    self.write_value_header(TokenType::$token, name, format);
                    self.write_bytes(&v.to_le_bytes());
                }
            }
        }
    };
}

/// Encodes one message. Finish it with [`MessageWriter::finish`].
///
/// Dropping an unfinished writer returns any overflow buffer to the pool.
pub struct MessageWriter<'p> {
    pool: &'p BufferPool,
    inline: [u8; INLINE_CAPACITY],
    overflow: Option<PooledBuffer>,
    pos: usize,
}

impl<'p> MessageWriter<'p> {
    pub fn new(pool: &'p BufferPool) -> Self {
        Self {
            pool,
            inline: [0u8; INLINE_CAPACITY],
            overflow: None,
            pos: 0,
        }
    }

    /// Bytes written so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos == 0
    }

    /// Whether the writer has moved to an overflow buffer.
    #[inline]
    pub fn is_overflow(&self) -> bool {
        self.overflow.is_some()
    }

    // ---- raw writes ----

    #[inline]
    fn ensure_available(&mut self, required: usize) {
        let capacity = match &self.overflow {
            None => INLINE_CAPACITY,
            Some(buffer) => buffer.len(),
        };
        if capacity - self.pos >= required {
            return;
        }
        self.grow(required);
    }

    fn grow(&mut self, required: usize) {
        let needed = self.pos + required;
        let buffer = match self.overflow.take() {
            None => {
                let mut buffer = self.pool.rent(needed.max(MIN_BUFFER_SIZE));
                buffer.as_mut_slice()[..self.pos].copy_from_slice(&self.inline[..self.pos]);
                buffer
            }
            Some(old) => {
                let mut buffer = self.pool.rent(needed.max(old.len() + old.len() / 2));
                buffer.as_mut_slice()[..self.pos].copy_from_slice(&old.as_slice()[..self.pos]);
                self.pool.give_back(old);
                buffer
            }
        };
        self.overflow = Some(buffer);
    }

    fn write_bytes(&mut self, src: &[u8]) {
        self.ensure_available(src.len());
        let start = self.pos;
        let dest = match &mut self.overflow {
            Some(buffer) => buffer.as_mut_slice(),
            None => &mut self.inline[..],
        };
        dest[start..start + src.len()].copy_from_slice(src);
        self.pos += src.len();
    }

    #[inline]
    fn write_u8(&mut self, value: u8) {
        self.write_bytes(&[value]);
    }

    fn write_short_string(&mut self, value: &str) {
        let value = truncate_to_boundary(value, MAX_SHORT_STRING);
        self.write_u8(value.len() as u8);
        self.write_bytes(value.as_bytes());
    }

    fn write_value_header(&mut self, token: TokenType, name: &str, format: Option<&str>) {
        self.write_u8(token.as_u8());
        self.write_short_string(name);
        if token.has_format() {
            self.write_short_string(format.unwrap_or(""));
        }
    }

    // ---- tokens ----

    /// Appends raw template text using the smallest length prefix that fits.
    pub fn append_literal(&mut self, text: &str) {
        let len = text.len();
        if len <= u8::MAX as usize {
            self.write_u8(TokenType::Literal1.as_u8());
            self.write_u8(len as u8);
        } else if len <= u16::MAX as usize {
            self.write_u8(TokenType::Literal2.as_u8());
            self.write_bytes(&(len as u16).to_le_bytes());
        } else {
            let text = truncate_to_boundary(text, u32::MAX as usize);
            self.write_u8(TokenType::Literal4.as_u8());
            self.write_bytes(&(text.len() as u32).to_le_bytes());
            self.write_bytes(text.as_bytes());
            return;
        }
        self.write_bytes(text.as_bytes());
    }

    pub fn append_null(&mut self, name: &str) {
        self.write_u8(TokenType::Null.as_u8());
        self.write_short_string(name);
    }

    pub fn append_bool(&mut self, name: &str, value: Option<bool>) {
        match value {
            None => self.append_null(name),
            Some(true) => self.write_value_header(TokenType::BoolTrue, name, None),
            Some(false) => self.write_value_header(TokenType::BoolFalse, name, None),
        }
    }

    pub fn append_char(&mut self, name: &str, value: Option<char>) {
        match value {
            None => self.append_null(name),
            Some(c) => {
                self.write_value_header(TokenType::Char, name, None);
                self.write_bytes(&(c as u32).to_le_bytes());
            }
        }
    }

    append_fixed!(append_byte, u8, Byte);
    append_fixed!(append_short, i16, Short);
    append_fixed!(append_ushort, u16, UShort);
    append_fixed!(append_int, i32, Int);
    append_fixed!(append_uint, u32, UInt);
    append_fixed!(append_long, i64, Long);
    append_fixed!(append_ulong, u64, ULong);
    append_fixed!(append_float, f32, Float);
    append_fixed!(append_double, f64, Double);

    pub fn append_decimal(&mut self, name: &str, value: Option<Decimal>, format: Option<&str>) {
        match value {
            None => self.append_null(name),
            Some(v) => {
                self.write_value_header(TokenType::Decimal, name, format);
                self.write_bytes(&v.mantissa().to_le_bytes());
                self.write_u8(v.scale());
            }
        }
    }

    /// Appends a timestamp, normalized to UTC ticks whatever its timezone.
    pub fn append_date_time<Tz: TimeZone>(
        &mut self,
        name: &str,
        value: Option<DateTime<Tz>>,
        format: Option<&str>,
    ) {
        match value {
            None => self.append_null(name),
            Some(v) => {
                let ticks = clock::to_ticks(v.with_timezone(&Utc));
                self.write_value_header(TokenType::DateTime, name, format);
                self.write_bytes(&ticks.to_le_bytes());
            }
        }
    }

    pub fn append_guid(&mut self, name: &str, value: Option<Uuid>) {
        match value {
            None => self.append_null(name),
            Some(v) => {
                self.write_value_header(TokenType::Guid, name, None);
                self.write_bytes(v.as_bytes());
            }
        }
    }

    pub fn append_string(&mut self, name: &str, value: Option<&str>, format: Option<&str>) {
        let Some(value) = value else {
            self.append_null(name);
            return;
        };
        let value = truncate_to_boundary(value, u32::MAX as usize);
        let len = value.len();
        if len <= u8::MAX as usize {
            self.write_value_header(TokenType::String1, name, format);
            self.write_u8(len as u8);
        } else if len <= u16::MAX as usize {
            self.write_value_header(TokenType::String2, name, format);
            self.write_bytes(&(len as u16).to_le_bytes());
        } else {
            self.write_value_header(TokenType::String4, name, format);
            self.write_bytes(&(len as u32).to_le_bytes());
        }
        self.write_bytes(value.as_bytes());
    }

    /// Appends a value through its [`LogValue`] implementation.
    ///
    /// Scalar values write their tokens directly; structured values are
    /// bracketed by `LogValue` / `LogValueEndMembers`.
    pub fn append_log_value<V: LogValue + ?Sized>(
        &mut self,
        name: &str,
        value: &V,
        format: Option<&str>,
    ) {
        if value.is_scalar() {
            value.write_members(self, name, format);
            return;
        }
        self.write_u8(TokenType::LogValue.as_u8());
        self.write_short_string(name);
        value.write_members(self, name, format);
        self.write_u8(TokenType::LogValueEndMembers.as_u8());
    }

    /// Terminates the stream and hands the encoded message over.
    ///
    /// The `End` tag is omitted when the stream exactly fills the inline
    /// region.
    pub fn finish(mut self) -> LogMessage {
        if self.overflow.is_some() || self.pos < INLINE_CAPACITY {
            self.write_u8(TokenType::End.as_u8());
        }
        match self.overflow.take() {
            None => LogMessage::Inline {
                data: self.inline,
                len: self.pos as u8,
            },
            Some(buffer) => LogMessage::from_overflow(buffer, self.pos),
        }
    }
}

impl Drop for MessageWriter<'_> {
    fn drop(&mut self) {
        if let Some(buffer) = self.overflow.take() {
            self.pool.give_back(buffer);
        }
    }
}

/// Longest prefix of `value` within `max` bytes that ends on a char boundary.
pub(crate) fn truncate_to_boundary(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}
