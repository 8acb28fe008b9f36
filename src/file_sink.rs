use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;
use crate::event::LogEvent;
use crate::file_store::{FileStoreConfig, FileStoreStats};
use crate::message::LogMessage;
use crate::record_writer::RecordWriter;
use crate::sink::Sink;

/// Sink persisting records into a rotating, page-framed log folder.
///
/// The sink moves into the pipeline, so keep [`FileSink::stats`] around to
/// observe it afterwards.
///
/// ```no_run
/// use nanolog::{FileSink, FileStoreConfig, LoggerOptions, LoggingContext};
///
/// let sink = FileSink::new(FileStoreConfig::new("logs")).unwrap();
/// let stats = sink.stats();
/// let context = LoggingContext::start(LoggerOptions::new().add_sink(sink)).unwrap();
/// context.logger("app").info("started");
/// context.stop();
/// println!("files: {:?}, dropped: {}", stats.files(), stats.dropped_records());
/// ```
#[derive(Debug)]
pub struct FileSink {
    writer: RecordWriter,
}

impl FileSink {
    pub fn new(config: FileStoreConfig) -> Result<Self> {
        Ok(Self {
            writer: RecordWriter::new(config)?,
        })
    }

    pub fn config(&self) -> &FileStoreConfig {
        self.writer.config()
    }

    pub fn stats(&self) -> Arc<FileStoreStats> {
        Arc::clone(self.writer.stats())
    }

    pub fn files(&self) -> Vec<PathBuf> {
        self.writer.stats().files()
    }

    pub fn current_sequence(&self) -> Option<u64> {
        self.writer.stats().current_sequence()
    }

    pub fn dropped_records(&self) -> u64 {
        self.writer.stats().dropped_records()
    }
}

impl Sink for FileSink {
    fn log(&mut self, event: &LogEvent, message: &LogMessage) -> Result<()> {
        self.writer.write(event, message)
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()
    }

    fn name(&self) -> &str {
        "file"
    }
}
