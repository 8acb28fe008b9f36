//! Token stream decoder.
//!
//! [`visit`] walks a [`LogMessage`] and calls back into a [`MessageVisitor`]
//! once per token. Every callback returns [`ControlFlow`]; `Break` halts the
//! walk immediately, letting a filter stop as soon as it has its answer.
//!
//! Decoding never fails loudly. A truncated payload, invalid UTF-8 or an
//! unknown tag ends the walk with [`VisitOutcome::Malformed`], so one corrupt
//! message cannot take down a whole read or render pass.

use std::ops::ControlFlow;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::clock;
use crate::loggable::Decimal;
use crate::message::LogMessage;
use crate::token::TokenType;

/// Nesting state handed to every value callback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisitContext {
    depth: usize,
    first_member: bool,
}

impl VisitContext {
    /// Number of structured values currently open.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether the current token is a member of a structured value.
    pub fn is_log_value_member(&self) -> bool {
        self.depth > 0
    }

    /// Whether the current token is the first member of its structured value.
    ///
    /// Renderers use this to decide whether a separator goes before the name.
    pub fn is_first_member(&self) -> bool {
        self.depth > 0 && self.first_member
    }
}

/// How a walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitOutcome {
    /// Reached `End` or the end of the stream.
    Completed,
    /// A callback returned `Break`.
    Stopped,
    /// The stream was corrupt; tokens before the fault were delivered.
    Malformed,
}

/// Callbacks for a decoded token stream.
///
/// Only [`visit_literal`](MessageVisitor::visit_literal) is required. Narrow
/// integer and float callbacks forward to their widened counterparts unless
/// overridden; every other callback defaults to `Continue`.
#[allow(unused_variables)]
pub trait MessageVisitor {
    fn visit_literal(&mut self, text: &str) -> ControlFlow<()>;

    fn visit_null(&mut self, cx: &VisitContext, name: &str) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_bool(&mut self, cx: &VisitContext, name: &str, value: bool) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_char(&mut self, cx: &VisitContext, name: &str, value: char) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_byte(
        &mut self,
        cx: &VisitContext,
        name: &str,
        format: Option<&str>,
        value: u8,
    ) -> ControlFlow<()> {
        self.visit_int(cx, name, format, value as i32)
    }

    fn visit_short(
        &mut self,
        cx: &VisitContext,
        name: &str,
        format: Option<&str>,
        value: i16,
    ) -> ControlFlow<()> {
        self.visit_int(cx, name, format, value as i32)
    }

    fn visit_ushort(
        &mut self,
        cx: &VisitContext,
        name: &str,
        format: Option<&str>,
        value: u16,
    ) -> ControlFlow<()> {
        self.visit_int(cx, name, format, value as i32)
    }

    fn visit_int(
        &mut self,
        cx: &VisitContext,
        name: &str,
        format: Option<&str>,
        value: i32,
    ) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_uint(
        &mut self,
        cx: &VisitContext,
        name: &str,
        format: Option<&str>,
        value: u32,
    ) -> ControlFlow<()> {
        self.visit_long(cx, name, format, value as i64)
    }

    fn visit_long(
        &mut self,
        cx: &VisitContext,
        name: &str,
        format: Option<&str>,
        value: i64,
    ) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_ulong(
        &mut self,
        cx: &VisitContext,
        name: &str,
        format: Option<&str>,
        value: u64,
    ) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_float(
        &mut self,
        cx: &VisitContext,
        name: &str,
        format: Option<&str>,
        value: f32,
    ) -> ControlFlow<()> {
        self.visit_double(cx, name, format, value as f64)
    }

    fn visit_double(
        &mut self,
        cx: &VisitContext,
        name: &str,
        format: Option<&str>,
        value: f64,
    ) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_decimal(
        &mut self,
        cx: &VisitContext,
        name: &str,
        format: Option<&str>,
        value: Decimal,
    ) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_date_time(
        &mut self,
        cx: &VisitContext,
        name: &str,
        format: Option<&str>,
        value: DateTime<Utc>,
    ) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_guid(&mut self, cx: &VisitContext, name: &str, value: Uuid) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_string(
        &mut self,
        cx: &VisitContext,
        name: &str,
        format: Option<&str>,
        value: &str,
    ) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn begin_log_value(&mut self, cx: &VisitContext, name: &str) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn end_log_value(&mut self, cx: &VisitContext) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

/// Walks every token of `message`.
pub fn visit<V: MessageVisitor + ?Sized>(message: &LogMessage, visitor: &mut V) -> VisitOutcome {
    visit_bytes(message.as_bytes(), visitor)
}

/// Walks a raw token stream.
pub fn visit_bytes<V: MessageVisitor + ?Sized>(data: &[u8], visitor: &mut V) -> VisitOutcome {
    let mut reader = TokenReader::new(data);
    let mut cx = VisitContext::default();

    loop {
        // running out of bytes without `End` means the inline region was full
        let Some(tag) = reader.read_u8() else {
            return VisitOutcome::Completed;
        };
        let token = match TokenType::from_u8(tag) {
            Some(TokenType::End) => return VisitOutcome::Completed,
            Some(TokenType::None) | None => return VisitOutcome::Malformed,
            Some(token) => token,
        };
        match dispatch(token, &mut reader, &mut cx, visitor) {
            None => return VisitOutcome::Malformed,
            Some(ControlFlow::Break(())) => return VisitOutcome::Stopped,
            Some(ControlFlow::Continue(())) => {}
        }
    }
}

macro_rules! fixed_value {
    ($reader:ident, $cx:ident, $visitor:ident, $ty:ty, $callback:ident) => {{
        let name = $reader.read_short_str()?;
        let format = $reader.read_format()?;
        let value = <$ty>::from_le_bytes($reader.read_array()?);
        let flow = $visitor.$callback($cx, name, format, value);
        $cx.first_member = false;
        flow
    }};
}

fn dispatch<V: MessageVisitor + ?Sized>(
    token: TokenType,
    reader: &mut TokenReader<'_>,
    cx: &mut VisitContext,
    visitor: &mut V,
) -> Option<ControlFlow<()>> {
    let flow = match token {
        TokenType::Literal1 => {
            let len = reader.read_u8()? as usize;
            visitor.visit_literal(reader.read_str(len)?)
        }
        TokenType::Literal2 => {
            let len = u16::from_le_bytes(reader.read_array()?) as usize;
            visitor.visit_literal(reader.read_str(len)?)
        }
        TokenType::Literal4 => {
            let len = u32::from_le_bytes(reader.read_array()?) as usize;
            visitor.visit_literal(reader.read_str(len)?)
        }
        TokenType::Null => {
            let name = reader.read_short_str()?;
            let flow = visitor.visit_null(cx, name);
            cx.first_member = false;
            flow
        }
        TokenType::BoolTrue | TokenType::BoolFalse => {
            let name = reader.read_short_str()?;
            let flow = visitor.visit_bool(cx, name, token == TokenType::BoolTrue);
            cx.first_member = false;
            flow
        }
        TokenType::Char => {
            let name = reader.read_short_str()?;
            let value = char::from_u32(u32::from_le_bytes(reader.read_array()?))?;
            let flow = visitor.visit_char(cx, name, value);
            cx.first_member = false;
            flow
        }
        TokenType::Byte => fixed_value!(reader, cx, visitor, u8, visit_byte),
        TokenType::Short => fixed_value!(reader, cx, visitor, i16, visit_short),
        TokenType::UShort => fixed_value!(reader, cx, visitor, u16, visit_ushort),
        TokenType::Int => fixed_value!(reader, cx, visitor, i32, visit_int),
        TokenType::UInt => fixed_value!(reader, cx, visitor, u32, visit_uint),
        TokenType::Long => fixed_value!(reader, cx, visitor, i64, visit_long),
        TokenType::ULong => fixed_value!(reader, cx, visitor, u64, visit_ulong),
        TokenType::Float => fixed_value!(reader, cx, visitor, f32, visit_float),
        TokenType::Double => fixed_value!(reader, cx, visitor, f64, visit_double),
        TokenType::Decimal => {
            let name = reader.read_short_str()?;
            let format = reader.read_format()?;
            let mantissa = i128::from_le_bytes(reader.read_array()?);
            let scale = reader.read_u8()?;
            let flow = visitor.visit_decimal(cx, name, format, Decimal::new(mantissa, scale));
            cx.first_member = false;
            flow
        }
        TokenType::DateTime => {
            let name = reader.read_short_str()?;
            let format = reader.read_format()?;
            let value = clock::from_ticks(i64::from_le_bytes(reader.read_array()?))?;
            let flow = visitor.visit_date_time(cx, name, format, value);
            cx.first_member = false;
            flow
        }
        TokenType::Guid => {
            let name = reader.read_short_str()?;
            let value = Uuid::from_bytes(reader.read_array()?);
            let flow = visitor.visit_guid(cx, name, value);
            cx.first_member = false;
            flow
        }
        TokenType::String1 | TokenType::String2 | TokenType::String4 => {
            let name = reader.read_short_str()?;
            let format = reader.read_format()?;
            let len = match token {
                TokenType::String1 => reader.read_u8()? as usize,
                TokenType::String2 => u16::from_le_bytes(reader.read_array()?) as usize,
                _ => u32::from_le_bytes(reader.read_array()?) as usize,
            };
            let value = reader.read_str(len)?;
            let flow = visitor.visit_string(cx, name, format, value);
            cx.first_member = false;
            flow
        }
        TokenType::LogValue => {
            let name = reader.read_short_str()?;
            let flow = visitor.begin_log_value(cx, name);
            cx.depth += 1;
            cx.first_member = true;
            flow
        }
        TokenType::LogValueEndMembers => {
            if cx.depth == 0 {
                return None;
            }
            cx.depth -= 1;
            // the closed value was itself a member of its parent
            cx.first_member = false;
            visitor.end_log_value(cx)
        }
        TokenType::None | TokenType::End => return None,
    };
    Some(flow)
}

/// Bounds-checked cursor over a token stream.
struct TokenReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> TokenReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn read_u8(&mut self) -> Option<u8> {
        let value = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(value)
    }

    fn read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let slice = self.data.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        self.read_bytes(N)?.try_into().ok()
    }

    fn read_str(&mut self, len: usize) -> Option<&'a str> {
        std::str::from_utf8(self.read_bytes(len)?).ok()
    }

    fn read_short_str(&mut self) -> Option<&'a str> {
        let len = self.read_u8()? as usize;
        self.read_str(len)
    }

    /// Reads a format slot; an empty format is reported as absent.
    fn read_format(&mut self) -> Option<Option<&'a str>> {
        let format = self.read_short_str()?;
        Some((!format.is_empty()).then_some(format))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::BufferPool;
    use crate::writer::MessageWriter;

    #[derive(Default)]
    struct Members {
        seen: Vec<(String, usize, bool)>,
    }

    impl MessageVisitor for Members {
        fn visit_literal(&mut self, _text: &str) -> ControlFlow<()> {
            ControlFlow::Continue(())
        }

        fn visit_int(
            &mut self,
            cx: &VisitContext,
            name: &str,
            _format: Option<&str>,
            _value: i32,
        ) -> ControlFlow<()> {
            self.seen.push((name.to_string(), cx.depth(), cx.is_first_member()));
            ControlFlow::Continue(())
        }

        fn begin_log_value(&mut self, cx: &VisitContext, name: &str) -> ControlFlow<()> {
            self.seen.push((name.to_string(), cx.depth(), cx.is_first_member()));
            ControlFlow::Continue(())
        }
    }

    #[test]
    fn test_first_member_tracking() {
        let pool = BufferPool::new();
        let mut writer = MessageWriter::new(&pool);
        writer.append_int("top", Some(0), None);
        // hand-rolled nesting: outer { a, inner { b }, c }
        writer.append_log_value("outer", &Outer, None);
        let message = writer.finish();

        let mut members = Members::default();
        assert_eq!(visit(&message, &mut members), VisitOutcome::Completed);
        let expected = vec![
            ("top".to_string(), 0, false),
            ("outer".to_string(), 0, false),
            ("a".to_string(), 1, true),
            ("inner".to_string(), 1, false),
            ("b".to_string(), 2, true),
            ("c".to_string(), 1, false),
        ];
        assert_eq!(members.seen, expected);
    }

    struct Inner;
    struct Outer;

    impl crate::LogValue for Inner {
        fn write_members(&self, writer: &mut MessageWriter<'_>, _: &str, _: Option<&str>) {
            writer.append_int("b", Some(2), None);
        }
    }

    impl crate::LogValue for Outer {
        fn write_members(&self, writer: &mut MessageWriter<'_>, _: &str, _: Option<&str>) {
            writer.append_int("a", Some(1), None);
            writer.append_log_value("inner", &Inner, None);
            writer.append_int("c", Some(3), None);
        }
    }

    #[test]
    fn test_truncated_stream_is_malformed() {
        let data = [TokenType::Int.as_u8(), 1, b'n', 0, 1, 2];
        let mut members = Members::default();
        assert_eq!(visit_bytes(&data, &mut members), VisitOutcome::Malformed);
        assert!(members.seen.is_empty());
    }

    #[test]
    fn test_unknown_tag_stops() {
        let data = [TokenType::Literal1.as_u8(), 0, 0x7F, TokenType::End.as_u8()];
        let mut members = Members::default();
        assert_eq!(visit_bytes(&data, &mut members), VisitOutcome::Malformed);
    }

    #[test]
    fn test_unbalanced_end_members() {
        let data = [TokenType::LogValueEndMembers.as_u8()];
        let mut members = Members::default();
        assert_eq!(visit_bytes(&data, &mut members), VisitOutcome::Malformed);
    }

    #[test]
    fn test_empty_stream_completes() {
        let mut members = Members::default();
        assert_eq!(visit(&LogMessage::empty(), &mut members), VisitOutcome::Completed);
    }
}
