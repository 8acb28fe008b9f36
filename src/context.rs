use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::event::LogEvent;
use crate::logger::Logger;
use crate::message::LogMessage;
use crate::options::{LevelFilter, LoggerOptions};
use crate::pool::BufferPool;
use crate::processor::LogProcessor;
use crate::render::TextSink;
use crate::sink::Sink;

/// Everything the loggers of one process share: the level filter, the
/// overflow pool and the dispatch pipeline.
///
/// Created once at startup and handed to every [`Logger`].
///
/// ```
/// use nanolog::{LogLevel, LoggerOptions, LoggingContext, TextSink};
///
/// let context = LoggingContext::start(
///     LoggerOptions::new()
///         .with_level(LogLevel::Debug)
///         .add_sink(TextSink::new(Vec::new())),
/// )
/// .unwrap();
/// let logger = context.logger("app");
/// logger.info("ready");
/// context.stop();
/// ```
///
/// Records only enter the pipeline through a [`Logger`], so every queued
/// overflow buffer belongs to this context's pool:
///
/// ```compile_fail
/// use nanolog::{BufferPool, LogEvent, LogLevel, LoggerOptions, LoggingContext, MessageWriter};
///
/// let context = LoggingContext::start(LoggerOptions::new()).unwrap();
/// let other = BufferPool::new();
/// let message = MessageWriter::new(&other).finish();
/// let event = LogEvent::new(LogLevel::Info, "app".into(), "main.rs", "main", 1);
/// context.enqueue(event, message);
/// ```
pub struct LoggingContext {
    filter: LevelFilter,
    pool: Arc<BufferPool>,
    processor: LogProcessor,
}

impl LoggingContext {
    /// Starts the pipeline. Without registered sinks, records go to stdout.
    pub fn start(mut options: LoggerOptions) -> Result<Arc<Self>> {
        let filter = options.build_filter();
        let pool = options.pool.take().unwrap_or_else(BufferPool::shared);
        let mut sinks = std::mem::take(&mut options.sinks);
        if sinks.is_empty() {
            sinks.push(Box::new(TextSink::stdout()) as Box<dyn Sink>);
        }
        let processor = LogProcessor::start(
            sinks,
            options.queue_capacity,
            Arc::clone(&pool),
            options.on_sink_error.take(),
        )?;
        Ok(Arc::new(Self {
            filter,
            pool,
            processor,
        }))
    }

    /// A logger for `category`.
    pub fn logger(self: &Arc<Self>, category: &str) -> Logger {
        Logger::new(Arc::clone(self), category)
    }

    pub fn filter(&self) -> &LevelFilter {
        &self.filter
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Hands a finished record to the pipeline. `message` must have been
    /// written against [`Self::pool`].
    pub(crate) fn enqueue(&self, event: LogEvent, message: LogMessage) {
        self.processor.enqueue(event, message);
    }

    pub fn is_running(&self) -> bool {
        self.processor.is_running()
    }

    /// Drains all queued records and stops the pipeline.
    ///
    /// Records logged afterwards are dropped.
    pub fn stop(&self) {
        self.processor.stop();
    }
}

impl fmt::Debug for LoggingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingContext")
            .field("filter", &self.filter)
            .field("pool", &self.pool)
            .field("processor", &self.processor)
            .finish()
    }
}
