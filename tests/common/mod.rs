#![allow(dead_code)]

use std::ops::ControlFlow;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use nanolog::{
    visit, Decimal, LogEvent, LogMessage, MessageVisitor, Result, Sink, VisitContext, VisitOutcome,
};
use parking_lot::Mutex;
use uuid::Uuid;

/// Routes library diagnostics to the test output; `RUST_LOG` selects them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One decoded token, as seen by a visitor.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Literal(String),
    Null(String),
    Bool(String, bool),
    Char(String, char),
    Byte(String, Option<String>, u8),
    Short(String, Option<String>, i16),
    UShort(String, Option<String>, u16),
    Int(String, Option<String>, i32),
    UInt(String, Option<String>, u32),
    Long(String, Option<String>, i64),
    ULong(String, Option<String>, u64),
    Float(String, Option<String>, f32),
    Double(String, Option<String>, f64),
    Decimal(String, Option<String>, Decimal),
    DateTime(String, Option<String>, DateTime<Utc>),
    Guid(String, Uuid),
    Str(String, Option<String>, String),
    Begin(String),
    End,
}

fn owned(format: Option<&str>) -> Option<String> {
    format.map(str::to_string)
}

/// Visitor recording every token in order.
#[derive(Debug, Default)]
pub struct Recorder {
    pub tokens: Vec<Token>,
}

impl Recorder {
    fn push(&mut self, token: Token) -> ControlFlow<()> {
        self.tokens.push(token);
        ControlFlow::Continue(())
    }
}

impl MessageVisitor for Recorder {
    fn visit_literal(&mut self, text: &str) -> ControlFlow<()> {
        self.push(Token::Literal(text.to_string()))
    }

    fn visit_null(&mut self, _: &VisitContext, name: &str) -> ControlFlow<()> {
        self.push(Token::Null(name.to_string()))
    }

    fn visit_bool(&mut self, _: &VisitContext, name: &str, value: bool) -> ControlFlow<()> {
        self.push(Token::Bool(name.to_string(), value))
    }

    fn visit_char(&mut self, _: &VisitContext, name: &str, value: char) -> ControlFlow<()> {
        self.push(Token::Char(name.to_string(), value))
    }

    fn visit_byte(
        &mut self,
        _: &VisitContext,
        name: &str,
        f: Option<&str>,
        v: u8,
    ) -> ControlFlow<()> {
        self.push(Token::Byte(name.to_string(), owned(f), v))
    }

    fn visit_short(
        &mut self,
        _: &VisitContext,
        name: &str,
        f: Option<&str>,
        v: i16,
    ) -> ControlFlow<()> {
        self.push(Token::Short(name.to_string(), owned(f), v))
    }

    fn visit_ushort(
        &mut self,
        _: &VisitContext,
        name: &str,
        f: Option<&str>,
        v: u16,
    ) -> ControlFlow<()> {
        self.push(Token::UShort(name.to_string(), owned(f), v))
    }

    fn visit_int(
        &mut self,
        _: &VisitContext,
        name: &str,
        f: Option<&str>,
        v: i32,
    ) -> ControlFlow<()> {
        self.push(Token::Int(name.to_string(), owned(f), v))
    }

    fn visit_uint(
        &mut self,
        _: &VisitContext,
        name: &str,
        f: Option<&str>,
        v: u32,
    ) -> ControlFlow<()> {
        self.push(Token::UInt(name.to_string(), owned(f), v))
    }

    fn visit_long(
        &mut self,
        _: &VisitContext,
        name: &str,
        f: Option<&str>,
        v: i64,
    ) -> ControlFlow<()> {
        self.push(Token::Long(name.to_string(), owned(f), v))
    }

    fn visit_ulong(
        &mut self,
        _: &VisitContext,
        name: &str,
        f: Option<&str>,
        v: u64,
    ) -> ControlFlow<()> {
        self.push(Token::ULong(name.to_string(), owned(f), v))
    }

    fn visit_float(
        &mut self,
        _: &VisitContext,
        name: &str,
        f: Option<&str>,
        v: f32,
    ) -> ControlFlow<()> {
        self.push(Token::Float(name.to_string(), owned(f), v))
    }

    fn visit_double(
        &mut self,
        _: &VisitContext,
        name: &str,
        f: Option<&str>,
        v: f64,
    ) -> ControlFlow<()> {
        self.push(Token::Double(name.to_string(), owned(f), v))
    }

    fn visit_decimal(
        &mut self,
        _: &VisitContext,
        name: &str,
        f: Option<&str>,
        v: Decimal,
    ) -> ControlFlow<()> {
        self.push(Token::Decimal(name.to_string(), owned(f), v))
    }

    fn visit_date_time(
        &mut self,
        _: &VisitContext,
        name: &str,
        f: Option<&str>,
        v: DateTime<Utc>,
    ) -> ControlFlow<()> {
        self.push(Token::DateTime(name.to_string(), owned(f), v))
    }

    fn visit_guid(&mut self, _: &VisitContext, name: &str, value: Uuid) -> ControlFlow<()> {
        self.push(Token::Guid(name.to_string(), value))
    }

    fn visit_string(
        &mut self,
        _: &VisitContext,
        name: &str,
        f: Option<&str>,
        v: &str,
    ) -> ControlFlow<()> {
        self.push(Token::Str(name.to_string(), owned(f), v.to_string()))
    }

    fn begin_log_value(&mut self, _: &VisitContext, name: &str) -> ControlFlow<()> {
        self.push(Token::Begin(name.to_string()))
    }

    fn end_log_value(&mut self, _: &VisitContext) -> ControlFlow<()> {
        self.push(Token::End)
    }
}

/// Decodes `message` into its token list, asserting it is well formed.
pub fn tokens(message: &LogMessage) -> Vec<Token> {
    let mut recorder = Recorder::default();
    assert_eq!(visit(message, &mut recorder), VisitOutcome::Completed);
    recorder.tokens
}

/// What a [`CollectingSink`] saw for one record.
#[derive(Debug, Clone)]
pub struct Received {
    pub event: LogEvent,
    pub tokens: Vec<Token>,
    pub overflow: bool,
}

/// Sink decoding every record it receives into a shared list.
#[derive(Clone, Default)]
pub struct CollectingSink {
    pub received: Arc<Mutex<Vec<Received>>>,
    pub flushes: Arc<Mutex<usize>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Received> {
        std::mem::take(&mut *self.received.lock())
    }
}

impl Sink for CollectingSink {
    fn log(&mut self, event: &LogEvent, message: &LogMessage) -> Result<()> {
        self.received.lock().push(Received {
            event: event.clone(),
            tokens: tokens(message),
            overflow: message.is_overflow(),
        });
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        *self.flushes.lock() += 1;
        Ok(())
    }

    fn name(&self) -> &str {
        "collecting"
    }
}
