//! Per-category logging entry points.
//!
//! A [`Logger`] checks the level before any encoding happens. The template
//! macros go one step further: when the level is disabled the arguments are
//! never evaluated, so a disabled call costs one comparison.
//!
//! ```
//! use nanolog::{info, LogLevel, LoggerOptions, LoggingContext, TextSink};
//!
//! let context = LoggingContext::start(
//!     LoggerOptions::new().add_sink(TextSink::new(Vec::new())),
//! )
//! .unwrap();
//! let logger = context.logger("app");
//!
//! let score = 42;
//! let user = "ann";
//! info!(logger, "score=" {score} " user=" {name = user} " hex=" {score; "X4"});
//! context.stop();
//! ```

use std::borrow::Cow;
use std::fmt;
use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::context::LoggingContext;
use crate::event::LogEvent;
use crate::level::LogLevel;
use crate::loggable::LogValue;
use crate::writer::MessageWriter;

/// Entry point bound to one category.
///
/// Caches its resolved level next to the filter version it was resolved at,
/// packed as `version << 8 | level` in a single atomic.
pub struct Logger {
    context: Arc<LoggingContext>,
    category: Arc<str>,
    cached: AtomicU64,
}

impl Logger {
    pub fn new(context: Arc<LoggingContext>, category: &str) -> Self {
        Self {
            context,
            category: Arc::from(category),
            // version 0 is never issued, so the first check always resolves
            cached: AtomicU64::new(0),
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn context(&self) -> &Arc<LoggingContext> {
        &self.context
    }

    /// Minimum enabled level, re-resolved only after a filter change.
    pub fn level(&self) -> LogLevel {
        let filter = self.context.filter();
        let version = filter.version();
        let cached = self.cached.load(Ordering::Acquire);
        if cached >> 8 == version {
            if let Some(level) = LogLevel::from_u8(cached as u8) {
                return level;
            }
        }
        let level = filter.resolve(&self.category);
        self.cached
            .store((version << 8) | level.as_u8() as u64, Ordering::Release);
        level
    }

    #[inline]
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level >= self.level()
    }

    /// Logs plain text with an explicit source location.
    pub fn log_text(
        &self,
        level: LogLevel,
        text: &str,
        file: &'static str,
        member: &'static str,
        line: u32,
    ) {
        let mut builder = MessageBuilder::new(self, level);
        builder.append_literal(text);
        builder.submit(file, member, line);
    }

    #[track_caller]
    pub fn log(&self, level: LogLevel, text: &str) {
        let caller = Location::caller();
        self.log_text(level, text, caller.file(), "", caller.line());
    }

    #[track_caller]
    pub fn trace(&self, text: &str) {
        self.log(LogLevel::Trace, text);
    }

    #[track_caller]
    pub fn debug(&self, text: &str) {
        self.log(LogLevel::Debug, text);
    }

    #[track_caller]
    pub fn info(&self, text: &str) {
        self.log(LogLevel::Info, text);
    }

    #[track_caller]
    pub fn warn(&self, text: &str) {
        self.log(LogLevel::Warn, text);
    }

    #[track_caller]
    pub fn error(&self, text: &str) {
        self.log(LogLevel::Error, text);
    }

    #[track_caller]
    pub fn fatal(&self, text: &str) {
        self.log(LogLevel::Fatal, text);
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("category", &self.category)
            .finish()
    }
}

/// Template builder for one message.
///
/// Constructed with the enabled check already done; when the level is off
/// every append is a no-op and nothing is allocated.
pub struct MessageBuilder<'a> {
    logger: &'a Logger,
    level: LogLevel,
    writer: Option<MessageWriter<'a>>,
}

impl<'a> MessageBuilder<'a> {
    pub fn new(logger: &'a Logger, level: LogLevel) -> Self {
        let writer = logger
            .is_enabled(level)
            .then(|| MessageWriter::new(logger.context.pool()));
        Self {
            logger,
            level,
            writer,
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// Direct access to the underlying writer, `None` when disabled.
    pub fn writer(&mut self) -> Option<&mut MessageWriter<'a>> {
        self.writer.as_mut()
    }

    pub fn append_literal(&mut self, text: &str) -> &mut Self {
        if let Some(writer) = &mut self.writer {
            writer.append_literal(text);
        }
        self
    }

    pub fn append_value<V: LogValue + ?Sized>(&mut self, name: &str, value: &V) -> &mut Self {
        if let Some(writer) = &mut self.writer {
            writer.append_log_value(name, value, None);
        }
        self
    }

    pub fn append_formatted<V: LogValue + ?Sized>(
        &mut self,
        name: &str,
        value: &V,
        format: &str,
    ) -> &mut Self {
        if let Some(writer) = &mut self.writer {
            writer.append_log_value(name, value, Some(format));
        }
        self
    }

    /// Finishes the message and queues it with the given source location.
    pub fn submit(
        self,
        file: impl Into<Cow<'static, str>>,
        member: impl Into<Cow<'static, str>>,
        line: u32,
    ) {
        let Some(writer) = self.writer else {
            return;
        };
        let message = writer.finish();
        let event = LogEvent::new(
            self.level,
            Arc::clone(&self.logger.category),
            file,
            member,
            line,
        );
        self.logger.context.enqueue(event, message);
    }
}

/// Logs a template at an explicit level.
///
/// Parts are string literals, `{expr}`, `{name = expr}` and
/// `{expr; "format"}`. Values are named after their expression unless a
/// name is given. Nothing is evaluated when the level is disabled.
#[macro_export]
macro_rules! log_message {
    ($logger:expr, $level:expr, $($parts:tt)+) => {{
        let mut __builder = $crate::MessageBuilder::new(&$logger, $level);
        if __builder.is_enabled() {
            $crate::__append_parts!(__builder; $($parts)+);
            __builder.submit(file!(), module_path!(), line!());
        }
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __append_parts {
    ($builder:ident;) => {};
    ($builder:ident; { $name:ident = $value:expr } $($rest:tt)*) => {
        $builder.append_value(stringify!($name), &$value);
        $crate::__append_parts!($builder; $($rest)*);
    };
    ($builder:ident; { $value:expr ; $format:literal } $($rest:tt)*) => {
        $builder.append_formatted(stringify!($value), &$value, $format);
        $crate::__append_parts!($builder; $($rest)*);
    };
    ($builder:ident; { $value:expr } $($rest:tt)*) => {
        $builder.append_value(stringify!($value), &$value);
        $crate::__append_parts!($builder; $($rest)*);
    };
    ($builder:ident; $text:literal $($rest:tt)*) => {
        $builder.append_literal($text);
        $crate::__append_parts!($builder; $($rest)*);
    };
}

#[macro_export]
macro_rules! trace {
    ($logger:expr, $($parts:tt)+) => {
        $crate::log_message!($logger, $crate::LogLevel::Trace, $($parts)+)
    };
}

#[macro_export]
macro_rules! debug {
    ($logger:expr, $($parts:tt)+) => {
        $crate::log_message!($logger, $crate::LogLevel::Debug, $($parts)+)
    };
}

#[macro_export]
macro_rules! info {
    ($logger:expr, $($parts:tt)+) => {
        $crate::log_message!($logger, $crate::LogLevel::Info, $($parts)+)
    };
}

#[macro_export]
macro_rules! warn {
    ($logger:expr, $($parts:tt)+) => {
        $crate::log_message!($logger, $crate::LogLevel::Warn, $($parts)+)
    };
}

#[macro_export]
macro_rules! error {
    ($logger:expr, $($parts:tt)+) => {
        $crate::log_message!($logger, $crate::LogLevel::Error, $($parts)+)
    };
}

#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($parts:tt)+) => {
        $crate::log_message!($logger, $crate::LogLevel::Fatal, $($parts)+)
    };
}
