//! Page-framed record writer.
//!
//! Records are written into a one-page buffer. Each record starts with a
//! header flagged `First` (or `Full` when it ends on the same page). When a
//! page fills in the middle of a record the fragment is closed, the page is
//! written at its page-aligned offset and the record continues on the next
//! page behind a `Middle` header. The final fragment is `Last`.
//!
//! Record body:
//!
//! ```text
//! [level:1][utc ticks:8][category][file][member][line:4][descriptor:4][message]
//! ```
//!
//! The three strings are u8-length-prefixed UTF-8. The descriptor packs the
//! inline and overflow lengths of the message that follows.

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;

use crate::clock;
use crate::error::{NanoLogError, Result};
use crate::event::LogEvent;
use crate::file_store::{self, FileStoreConfig, FileStoreStats};
use crate::message::LogMessage;
use crate::record::{RecordFlag, RecordHeader, HEADER_SIZE};
use crate::writer::{truncate_to_boundary, MAX_SHORT_STRING};

/// Fixed part of a record body: level, ticks, three string lengths, line
/// and descriptor.
const FIXED_BODY_SIZE: usize = 1 + 8 + 3 + 4 + 4;

pub struct RecordWriter {
    config: FileStoreConfig,
    stats: Arc<FileStoreStats>,
    file: Option<File>,
    next_sequence: u64,
    page: Vec<u8>,
    /// Offset of the buffered page within the file.
    page_pos: u64,
    /// Offset within the buffered page.
    write_pos: usize,
    /// Offset of the open fragment's header within the page.
    fragment_start: usize,
    fragment_opens_record: bool,
}

impl RecordWriter {
    /// Prepares a writer for `config.folder`; the first file is created on
    /// the first write, numbered after the newest existing file.
    pub fn new(config: FileStoreConfig) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.folder)?;
        let next_sequence = file_store::list_log_files(&config.folder)?
            .last()
            .map_or(0, |(sequence, _)| sequence + 1);

        Ok(Self {
            page: vec![0; config.page_size],
            config,
            stats: Arc::new(FileStoreStats::default()),
            file: None,
            next_sequence,
            page_pos: 0,
            write_pos: 0,
            fragment_start: 0,
            fragment_opens_record: true,
        })
    }

    pub fn config(&self) -> &FileStoreConfig {
        &self.config
    }

    pub fn stats(&self) -> &Arc<FileStoreStats> {
        &self.stats
    }

    /// Appends one record, creating or rotating the file as needed.
    ///
    /// When no file can be created the record is dropped and counted, and
    /// `FileUnavailable` is returned. The next write tries again.
    pub fn write(&mut self, event: &LogEvent, message: &LogMessage) -> Result<()> {
        let descriptor = message
            .length_descriptor()
            .ok_or(NanoLogError::MessageTooLarge {
                len: message.as_bytes().len(),
            })?;

        let category = truncate_to_boundary(&event.category, MAX_SHORT_STRING);
        let file = truncate_to_boundary(&event.file, MAX_SHORT_STRING);
        let member = truncate_to_boundary(&event.member, MAX_SHORT_STRING);
        let payload = message.as_bytes();
        let body_len = FIXED_BODY_SIZE + category.len() + file.len() + member.len() + payload.len();

        if self.file.is_none() {
            self.open_next_file()?;
        } else if self.record_end(body_len) > self.config.max_file_size && self.has_data() {
            self.rotate()?;
        }

        let result = self.write_body(event, [category, file, member], descriptor, payload);
        if let Err(err) = &result {
            // the file now ends in a torn record; continue in a fresh one
            tracing::error!(error = %err, "log file write failed, closing file");
            self.close_file();
        }
        result
    }

    fn write_body(
        &mut self,
        event: &LogEvent,
        strings: [&str; 3],
        descriptor: u32,
        payload: &[u8],
    ) -> Result<()> {
        if self.config.page_size - self.write_pos <= HEADER_SIZE {
            self.advance_page()?;
        }
        self.open_fragment(true);
        self.put(&[event.level.as_u8()])?;
        self.put(&clock::to_ticks(event.time).to_le_bytes())?;
        for value in strings {
            self.put(&[value.len() as u8])?;
            self.put(value.as_bytes())?;
        }
        self.put(&event.line.to_le_bytes())?;
        self.put(&descriptor.to_le_bytes())?;
        self.put(payload)?;
        self.close_fragment(true);
        Ok(())
    }

    /// Writes the partially filled page so readers can see it.
    pub fn flush(&mut self) -> Result<()> {
        if self.write_pos == 0 {
            return Ok(());
        }
        self.write_page()?;
        if let Some(file) = &mut self.file {
            file.flush()?;
        }
        Ok(())
    }

    fn has_data(&self) -> bool {
        self.page_pos > 0 || self.write_pos > 0
    }

    /// File offset just past a record body of `body_len` bytes written from
    /// the current position.
    fn record_end(&self, body_len: usize) -> u64 {
        let page_size = self.config.page_size;
        let mut page_pos = self.page_pos;
        let mut write_pos = self.write_pos;
        let mut remaining = body_len;
        loop {
            if page_size - write_pos <= HEADER_SIZE {
                page_pos += page_size as u64;
                write_pos = 0;
            }
            let take = remaining.min(page_size - write_pos - HEADER_SIZE);
            remaining -= take;
            write_pos += HEADER_SIZE + take;
            if remaining == 0 {
                return page_pos + write_pos as u64;
            }
            page_pos += page_size as u64;
            write_pos = 0;
        }
    }

    fn open_fragment(&mut self, opens_record: bool) {
        self.fragment_start = self.write_pos;
        self.fragment_opens_record = opens_record;
        self.write_pos += HEADER_SIZE;
    }

    fn close_fragment(&mut self, closes_record: bool) {
        let flag = RecordFlag::for_fragment(self.fragment_opens_record, closes_record);
        let size = (self.write_pos - self.fragment_start) as u16;
        let header = RecordHeader::new(flag, size).encode();
        self.page[self.fragment_start..self.fragment_start + HEADER_SIZE].copy_from_slice(&header);
    }

    /// Copies `bytes` into the page, continuing on new pages as they fill.
    fn put(&mut self, mut bytes: &[u8]) -> Result<()> {
        while !bytes.is_empty() {
            let room = self.config.page_size - self.write_pos;
            if room == 0 {
                self.close_fragment(false);
                self.advance_page()?;
                self.open_fragment(false);
                continue;
            }
            let take = room.min(bytes.len());
            self.page[self.write_pos..self.write_pos + take].copy_from_slice(&bytes[..take]);
            self.write_pos += take;
            bytes = &bytes[take..];
        }
        Ok(())
    }

    fn write_page(&mut self) -> Result<()> {
        let file = self.file.as_mut().ok_or_else(|| NanoLogError::FileUnavailable {
            path: self.config.folder.clone(),
        })?;
        file.seek(SeekFrom::Start(self.page_pos))?;
        file.write_all(&self.page)?;
        Ok(())
    }

    fn advance_page(&mut self) -> Result<()> {
        self.write_page()?;
        self.page_pos += self.config.page_size as u64;
        self.page.fill(0);
        self.write_pos = 0;
        Ok(())
    }

    fn rotate(&mut self) -> Result<()> {
        let flushed = self.flush();
        self.close_file();
        flushed?;
        self.open_next_file()
    }

    fn close_file(&mut self) {
        if self.file.take().is_some() {
            self.stats.file_closed();
        }
        self.page.fill(0);
        self.page_pos = 0;
        self.write_pos = 0;
    }

    fn open_next_file(&mut self) -> Result<()> {
        let sequence = self.next_sequence;
        let path = self.file_path(sequence);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => {
                tracing::debug!(sequence, path = %path.display(), "opened log file");
                self.file = Some(file);
                self.next_sequence += 1;
                self.stats.file_opened(sequence, path);
                Ok(())
            }
            Err(err) => {
                tracing::error!(
                    path = %path.display(),
                    error = %err,
                    "cannot create log file, dropping record"
                );
                self.stats.record_dropped();
                Err(NanoLogError::FileUnavailable { path })
            }
        }
    }

    fn file_path(&self, sequence: u64) -> PathBuf {
        self.config
            .folder
            .join(file_store::make_file_name(sequence, chrono::Local::now()))
    }
}

impl Drop for RecordWriter {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            tracing::warn!(error = %err, "failed to flush log file on close");
        }
    }
}

impl std::fmt::Debug for RecordWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordWriter")
            .field("config", &self.config)
            .field("next_sequence", &self.next_sequence)
            .field("page_pos", &self.page_pos)
            .field("write_pos", &self.write_pos)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::LogLevel;
    use crate::pool::BufferPool;
    use crate::writer::MessageWriter;

    fn config(dir: &std::path::Path) -> FileStoreConfig {
        FileStoreConfig::new(dir)
            .with_page_size(128)
            .with_max_file_size(1024)
    }

    fn event() -> LogEvent {
        LogEvent::new(LogLevel::Info, "app".into(), "w.rs", "run", 3)
    }

    #[test]
    fn test_small_record_is_full_fragment() {
        let dir = tempfile::tempdir().unwrap();
        let pool = BufferPool::new();
        let mut writer = RecordWriter::new(config(dir.path())).unwrap();
        let mut message = MessageWriter::new(&pool);
        message.append_literal("hi");
        writer.write(&event(), &message.finish()).unwrap();
        writer.flush().unwrap();

        let path = writer.stats().files()[0].clone();
        let bytes = fs::read(path).unwrap();
        assert_eq!(bytes.len(), 128);
        let header = RecordHeader::decode([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert_eq!(header.valid_flag(), Some(RecordFlag::Full));
        // header + fixed body + "app" + "w.rs" + "run" + literal "hi" + End
        assert_eq!(header.size as usize, HEADER_SIZE + FIXED_BODY_SIZE + 10 + 4 + 1);
    }

    #[test]
    fn test_record_end_accounts_for_headers() {
        let dir = tempfile::tempdir().unwrap();
        let writer = RecordWriter::new(config(dir.path())).unwrap();
        assert_eq!(writer.record_end(10), 14);
        // 124 bytes fit the first page, the rest goes behind a second header
        assert_eq!(writer.record_end(130), 128 + 4 + 6);
    }

    #[test]
    fn test_sequence_continues_after_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("0000000000000004-240101-00"), b"").unwrap();
        let pool = BufferPool::new();
        let mut writer = RecordWriter::new(config(dir.path())).unwrap();
        writer.write(&event(), &MessageWriter::new(&pool).finish()).unwrap();
        assert_eq!(writer.stats().current_sequence(), Some(5));
    }
}
