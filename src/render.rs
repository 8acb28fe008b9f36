//! Plain-text rendering of decoded messages.

use std::fmt::Write as _;
use std::io::{self, Write};
use std::ops::ControlFlow;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::event::LogEvent;
use crate::loggable::Decimal;
use crate::message::LogMessage;
use crate::sink::Sink;
use crate::visitor::{self, MessageVisitor, VisitContext};

const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Renders a token stream as human-readable text.
///
/// Literals are copied verbatim, strings are quoted, structured values
/// render as `{X: 1, Y: 2}`. Integer formats `X`/`x` (with an optional
/// width, e.g. `X8`) render hex, `F<n>` fixes float precision, and datetime
/// formats are strftime patterns applied in local time.
#[derive(Debug, Default)]
pub struct TextRenderer {
    out: String,
}

impl TextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renders `message`, replacing any previous output.
    pub fn render(&mut self, message: &LogMessage) -> &str {
        self.out.clear();
        visitor::visit(message, self);
        &self.out
    }

    pub fn into_string(self) -> String {
        self.out
    }

    fn member_prefix(&mut self, cx: &VisitContext, name: &str) {
        if cx.is_log_value_member() {
            if !cx.is_first_member() {
                self.out.push_str(", ");
            }
            self.out.push_str(name);
            self.out.push_str(": ");
        }
    }

    /// `bits` is the two's complement pattern at the token's own width,
    /// used when a hex format is requested.
    fn push_signed(&mut self, format: Option<&str>, value: i64, bits: u64) {
        match hex_format(format) {
            Some((upper, width)) if upper => {
                let _ = write!(self.out, "{:0width$X}", bits, width = width);
            }
            Some((_, width)) => {
                let _ = write!(self.out, "{:0width$x}", bits, width = width);
            }
            None => {
                let _ = write!(self.out, "{value}");
            }
        }
    }

    fn push_unsigned(&mut self, format: Option<&str>, value: u64) {
        match hex_format(format) {
            Some((upper, width)) if upper => {
                let _ = write!(self.out, "{:0width$X}", value, width = width);
            }
            Some((_, width)) => {
                let _ = write!(self.out, "{:0width$x}", value, width = width);
            }
            None => {
                let _ = write!(self.out, "{value}");
            }
        }
    }
}

/// Parses `X`, `x`, `X8` style formats into (uppercase, width).
fn hex_format(format: Option<&str>) -> Option<(bool, usize)> {
    let format = format?;
    let mut chars = format.chars();
    let upper = match chars.next()? {
        'X' => true,
        'x' => false,
        _ => return None,
    };
    let rest = chars.as_str();
    let width = if rest.is_empty() { 0 } else { rest.parse().ok()? };
    Some((upper, width))
}

/// Parses `F2` style formats into a precision.
fn fixed_precision(format: Option<&str>) -> Option<usize> {
    let format = format?;
    let rest = format.strip_prefix('F').or_else(|| format.strip_prefix('f'))?;
    if rest.is_empty() {
        return Some(2);
    }
    rest.parse().ok()
}

fn is_valid_strftime(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

impl MessageVisitor for TextRenderer {
    fn visit_literal(&mut self, text: &str) -> ControlFlow<()> {
        self.out.push_str(text);
        ControlFlow::Continue(())
    }

    fn visit_null(&mut self, cx: &VisitContext, name: &str) -> ControlFlow<()> {
        self.member_prefix(cx, name);
        self.out.push_str("NULL");
        ControlFlow::Continue(())
    }

    fn visit_bool(&mut self, cx: &VisitContext, name: &str, value: bool) -> ControlFlow<()> {
        self.member_prefix(cx, name);
        let _ = write!(self.out, "{value}");
        ControlFlow::Continue(())
    }

    fn visit_char(&mut self, cx: &VisitContext, name: &str, value: char) -> ControlFlow<()> {
        self.member_prefix(cx, name);
        let _ = write!(self.out, "'{value}'");
        ControlFlow::Continue(())
    }

    fn visit_short(
        &mut self,
        cx: &VisitContext,
        name: &str,
        format: Option<&str>,
        value: i16,
    ) -> ControlFlow<()> {
        self.member_prefix(cx, name);
        self.push_signed(format, value as i64, value as u16 as u64);
        ControlFlow::Continue(())
    }

    fn visit_int(
        &mut self,
        cx: &VisitContext,
        name: &str,
        format: Option<&str>,
        value: i32,
    ) -> ControlFlow<()> {
        self.member_prefix(cx, name);
        self.push_signed(format, value as i64, value as u32 as u64);
        ControlFlow::Continue(())
    }

    fn visit_long(
        &mut self,
        cx: &VisitContext,
        name: &str,
        format: Option<&str>,
        value: i64,
    ) -> ControlFlow<()> {
        self.member_prefix(cx, name);
        self.push_signed(format, value, value as u64);
        ControlFlow::Continue(())
    }

    fn visit_ulong(
        &mut self,
        cx: &VisitContext,
        name: &str,
        format: Option<&str>,
        value: u64,
    ) -> ControlFlow<()> {
        self.member_prefix(cx, name);
        self.push_unsigned(format, value);
        ControlFlow::Continue(())
    }

    fn visit_double(
        &mut self,
        cx: &VisitContext,
        name: &str,
        format: Option<&str>,
        value: f64,
    ) -> ControlFlow<()> {
        self.member_prefix(cx, name);
        match fixed_precision(format) {
            Some(precision) => {
                let _ = write!(self.out, "{value:.precision$}");
            }
            None => {
                let _ = write!(self.out, "{value}");
            }
        }
        ControlFlow::Continue(())
    }

    fn visit_decimal(
        &mut self,
        cx: &VisitContext,
        name: &str,
        _format: Option<&str>,
        value: Decimal,
    ) -> ControlFlow<()> {
        self.member_prefix(cx, name);
        let _ = write!(self.out, "{value}");
        ControlFlow::Continue(())
    }

    fn visit_date_time(
        &mut self,
        cx: &VisitContext,
        name: &str,
        format: Option<&str>,
        value: DateTime<Utc>,
    ) -> ControlFlow<()> {
        self.member_prefix(cx, name);
        let format = format
            .filter(|f| is_valid_strftime(f))
            .unwrap_or(DEFAULT_TIME_FORMAT);
        let _ = write!(self.out, "{}", value.with_timezone(&Local).format(format));
        ControlFlow::Continue(())
    }

    fn visit_guid(&mut self, cx: &VisitContext, name: &str, value: Uuid) -> ControlFlow<()> {
        self.member_prefix(cx, name);
        let _ = write!(self.out, "{value}");
        ControlFlow::Continue(())
    }

    fn visit_string(
        &mut self,
        cx: &VisitContext,
        name: &str,
        _format: Option<&str>,
        value: &str,
    ) -> ControlFlow<()> {
        self.member_prefix(cx, name);
        let _ = write!(self.out, "\"{value}\"");
        ControlFlow::Continue(())
    }

    fn begin_log_value(&mut self, cx: &VisitContext, name: &str) -> ControlFlow<()> {
        self.member_prefix(cx, name);
        self.out.push('{');
        ControlFlow::Continue(())
    }

    fn end_log_value(&mut self, _cx: &VisitContext) -> ControlFlow<()> {
        self.out.push('}');
        ControlFlow::Continue(())
    }
}

/// Renders a message to a new string.
pub fn render_message(message: &LogMessage) -> String {
    let mut renderer = TextRenderer::new();
    renderer.render(message);
    renderer.into_string()
}

/// Formats one event and its message as a single text line (no newline).
///
/// `[I2024-01-02 10:11:12.345 main.rs run:42] message`
pub fn format_line(renderer: &mut TextRenderer, event: &LogEvent, message: &LogMessage) -> String {
    let time = event.time.with_timezone(&Local).format(DEFAULT_TIME_FORMAT);
    let body = renderer.render(message);
    if event.member.is_empty() {
        return format!(
            "[{}{} {}:{}] {}",
            event.level.as_char(),
            time,
            event.file_name(),
            event.line,
            body
        );
    }
    format!(
        "[{}{} {} {}:{}] {}",
        event.level.as_char(),
        time,
        event.file_name(),
        event.member,
        event.line,
        body
    )
}

/// Sink writing one rendered line per record to any `Write`.
pub struct TextSink<W: Write + Send> {
    output: W,
    renderer: TextRenderer,
}

impl<W: Write + Send> TextSink<W> {
    pub fn new(output: W) -> Self {
        Self {
            output,
            renderer: TextRenderer::new(),
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.output
    }

    pub fn into_inner(self) -> W {
        self.output
    }
}

impl TextSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> Sink for TextSink<W> {
    fn log(&mut self, event: &LogEvent, message: &LogMessage) -> Result<()> {
        let line = format_line(&mut self.renderer, event, message);
        self.output.write_all(line.as_bytes())?;
        self.output.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.output.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "text"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::BufferPool;
    use crate::writer::MessageWriter;
    use crate::LogValue;

    struct Point {
        x: i32,
        y: i32,
    }

    impl LogValue for Point {
        fn write_members(&self, writer: &mut MessageWriter<'_>, _: &str, _: Option<&str>) {
            writer.append_int("X", Some(self.x), None);
            writer.append_int("Y", Some(self.y), None);
        }
    }

    #[test]
    fn test_render_mixed_message() {
        let pool = BufferPool::new();
        let mut writer = MessageWriter::new(&pool);
        writer.append_literal("user=");
        writer.append_string("user", Some("ann"), None);
        writer.append_literal(" id=");
        writer.append_ulong("id", Some(255), Some("X4"));
        writer.append_literal(" at ");
        writer.append_log_value("p", &Point { x: 1, y: -2 }, None);
        writer.append_literal(" ratio=");
        writer.append_double("ratio", Some(0.5), Some("F3"));
        writer.append_literal(" tag=");
        writer.append_char("tag", None);
        let message = writer.finish();

        assert_eq!(
            render_message(&message),
            "user=\"ann\" id=00FF at {X: 1, Y: -2} ratio=0.500 tag=NULL"
        );
    }

    #[test]
    fn test_negative_hex_keeps_token_width() {
        let pool = BufferPool::new();
        let mut writer = MessageWriter::new(&pool);
        writer.append_short("s", Some(-2), Some("X"));
        writer.append_literal(" ");
        writer.append_int("i", Some(-2), Some("X"));
        writer.append_literal(" ");
        writer.append_long("l", Some(-2), Some("x"));
        writer.append_literal(" ");
        writer.append_int("d", Some(-2), None);
        let message = writer.finish();

        assert_eq!(
            render_message(&message),
            "FFFE FFFFFFFE fffffffffffffffe -2"
        );
    }

    #[test]
    fn test_invalid_time_format_falls_back() {
        assert!(is_valid_strftime("%Y/%m/%d"));
        assert!(!is_valid_strftime("%Q%"));
    }

    #[test]
    fn test_text_sink_line() {
        let pool = BufferPool::new();
        let mut writer = MessageWriter::new(&pool);
        writer.append_literal("ready");
        let message = writer.finish();
        let event = LogEvent::new(crate::LogLevel::Warn, "app".into(), "src/main.rs", "boot", 9);

        let mut sink = TextSink::new(Vec::new());
        sink.log(&event, &message).unwrap();
        sink.flush().unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert!(text.starts_with("[W"));
        assert!(text.ends_with(" main.rs boot:9] ready\n"));
    }
}
