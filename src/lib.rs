//! # NanoLog
//!
//! A low-overhead structured logging engine built from three pieces:
//!
//! * **Binary token codec**: [`MessageWriter`] encodes literal text and named,
//!   typed values into a self-describing token stream; [`MessageVisitor`]
//!   decodes it back into typed callbacks.
//! * **Dispatch pipeline**: a bounded queue drained by one consumer thread
//!   that hands every record to the registered [`Sink`]s.
//! * **Paginated file store**: [`FileSink`] frames records into fixed-size
//!   pages inside rotating, sequence-numbered files; [`RecordReader`] reads
//!   them back.
//!
//! [`Logger`]s sit in front of the pipeline and filter by level before any
//! encoding work happens.
//!
//! ## Key Features
//!
//! * Small messages are encoded without allocating; larger ones borrow a
//!   pooled overflow buffer that is returned once every sink has seen them
//! * Disabled log calls cost one comparison and evaluate no arguments
//! * Sink I/O runs on a dedicated thread, never on the logging thread
//! * Damaged pages in a log file are skipped, not fatal
//!
//! ## Quick Start
//!
//! ```
//! use nanolog::{info, LogLevel, LoggerOptions, LoggingContext, TextSink};
//!
//! let context = LoggingContext::start(
//!     LoggerOptions::new()
//!         .with_level(LogLevel::Debug)
//!         .add_sink(TextSink::new(Vec::new())),
//! )
//! .unwrap();
//!
//! let logger = context.logger("app");
//! let score = 42;
//! info!(logger, "score=" {score});
//! logger.warn("plain text works too");
//!
//! context.stop();
//! ```

pub mod bridge;
pub mod clock;
pub mod context;
pub mod error;
pub mod event;
pub mod file_sink;
pub mod file_store;
pub mod level;
pub mod loggable;
pub mod logger;
pub mod message;
pub mod options;
pub mod pool;
pub mod processor;
pub mod record;
pub mod record_reader;
pub mod record_writer;
pub mod render;
pub mod search;
pub mod sink;
pub mod token;
pub mod visitor;
pub mod writer;

pub use bridge::LogBridge;
pub use context::LoggingContext;
pub use error::{NanoLogError, Result};
pub use event::LogEvent;
pub use file_sink::FileSink;
pub use file_store::{FileStoreConfig, FileStoreStats};
pub use level::LogLevel;
pub use loggable::{Decimal, LogValue};
pub use logger::{Logger, MessageBuilder};
pub use message::{LogMessage, INLINE_CAPACITY};
pub use options::{LevelFilter, LoggerOptions};
pub use pool::{BufferPool, PooledBuffer};
pub use processor::{LogItem, LogProcessor};
pub use record_reader::{LogList, RecordReader};
pub use record_writer::RecordWriter;
pub use render::{render_message, TextRenderer, TextSink};
pub use search::{extract_tokens, TokenNode, TokenTreeVisitor, TokenValue};
pub use sink::Sink;
pub use token::TokenType;
pub use visitor::{visit, MessageVisitor, VisitContext, VisitOutcome};
pub use writer::MessageWriter;
