//! Reader for page-framed log files.
//!
//! Mirrors [`RecordWriter`](crate::record_writer::RecordWriter): each page is
//! scanned header by header; a record that opens with a `First` fragment is
//! followed onto the next pages through their `Middle`/`Last` headers until
//! its body is complete.
//!
//! Damage is contained rather than fatal:
//!
//! * a header without the marker byte makes the rest of its page unreadable,
//!   the scan moves on to the next page
//! * a missing or broken continuation abandons the partial record and the
//!   page holding the broken header is scanned from its start
//! * an `Empty` header, or the end of the data, ends the file

use std::borrow::Cow;
use std::fs;
use std::path::Path;
use std::slice;
use std::sync::Arc;

use crate::clock;
use crate::error::Result;
use crate::event::LogEvent;
use crate::file_store::{self, DEFAULT_PAGE_SIZE};
use crate::level::LogLevel;
use crate::message::{LogMessage, INLINE_CAPACITY};
use crate::pool::BufferPool;
use crate::processor::LogItem;
use crate::record::{RecordFlag, RecordHeader, HEADER_SIZE};

/// Decoded records. Overflow buffers go back to the pool on drop.
pub struct LogList {
    items: Vec<LogItem>,
    pool: Arc<BufferPool>,
    skipped_pages: usize,
}

impl LogList {
    pub fn new(pool: Arc<BufferPool>) -> Self {
        Self {
            items: Vec::new(),
            pool,
            skipped_pages: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&LogItem> {
        self.items.get(index)
    }

    pub fn iter(&self) -> slice::Iter<'_, LogItem> {
        self.items.iter()
    }

    /// Pages or records dropped because they were damaged.
    pub fn skipped_pages(&self) -> usize {
        self.skipped_pages
    }
}

impl<'a> IntoIterator for &'a LogList {
    type Item = &'a LogItem;
    type IntoIter = slice::Iter<'a, LogItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl Drop for LogList {
    fn drop(&mut self) {
        for item in self.items.drain(..) {
            item.message.release(&self.pool);
        }
    }
}

impl std::fmt::Debug for LogList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogList")
            .field("len", &self.items.len())
            .field("skipped_pages", &self.skipped_pages)
            .finish()
    }
}

/// Reads log files written with a given page size.
#[derive(Debug, Clone)]
pub struct RecordReader {
    page_size: usize,
    pool: Arc<BufferPool>,
}

impl RecordReader {
    pub fn new(page_size: usize, pool: Arc<BufferPool>) -> Self {
        Self { page_size, pool }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Reads every record of one file.
    pub fn read_file(&self, path: &Path) -> Result<LogList> {
        let mut list = LogList::new(Arc::clone(&self.pool));
        let data = fs::read(path)?;
        self.read_bytes(&data, &mut list);
        Ok(list)
    }

    /// Reads all log files of `folder` in sequence order.
    pub fn read_folder(&self, folder: &Path) -> Result<LogList> {
        let mut list = LogList::new(Arc::clone(&self.pool));
        for (sequence, path) in file_store::list_log_files(folder)? {
            tracing::trace!(sequence, path = %path.display(), "reading log file");
            let data = fs::read(&path)?;
            self.read_bytes(&data, &mut list);
        }
        Ok(list)
    }

    /// Decodes the records of one file image and appends them to `list`.
    pub fn read_bytes(&self, data: &[u8], list: &mut LogList) {
        let page_size = self.page_size;
        let mut page_start = 0;
        let mut pos = 0;

        'pages: while page_start < data.len() {
            let page_end = (page_start + page_size).min(data.len());
            while page_end.saturating_sub(pos) > HEADER_SIZE {
                let header = read_header(data, pos);
                if header.is_end_of_data() {
                    break 'pages;
                }
                let flag = match header.valid_flag() {
                    Some(flag) if fragment_fits(&header, pos, page_end) => flag,
                    _ => {
                        tracing::warn!(offset = pos, "corrupt record header, skipping page");
                        list.skipped_pages += 1;
                        break;
                    }
                };
                if !flag.opens_record() {
                    // tail of a record whose start was lost
                    pos += header.size as usize;
                    continue;
                }

                let mut cursor = FragmentCursor {
                    data,
                    page_size,
                    page_start,
                    pos: pos + HEADER_SIZE,
                    fragment_end: pos + header.size as usize,
                    closes_record: flag.closes_record(),
                };
                match read_record(&mut cursor, &self.pool) {
                    Ok(item) => list.items.push(item),
                    Err(Fault::Invalid) => {
                        tracing::warn!(offset = pos, "undecodable record, skipping it");
                        list.skipped_pages += 1;
                    }
                    Err(Fault::BrokenContinuation { page_start: broken }) => {
                        tracing::warn!(
                            offset = broken,
                            "broken record continuation, rescanning page"
                        );
                        list.skipped_pages += 1;
                        page_start = broken;
                        pos = broken;
                        continue 'pages;
                    }
                    Err(Fault::EndOfData) => break 'pages,
                }
                pos = cursor.fragment_end;
                if cursor.page_start != page_start {
                    // the record ended on a later page, scan on from there
                    page_start = cursor.page_start;
                    continue 'pages;
                }
            }
            page_start += page_size;
            pos = page_start;
        }
    }
}

impl Default for RecordReader {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE, BufferPool::shared())
    }
}

fn read_header(data: &[u8], pos: usize) -> RecordHeader {
    let mut bytes = [0u8; HEADER_SIZE];
    bytes.copy_from_slice(&data[pos..pos + HEADER_SIZE]);
    RecordHeader::decode(bytes)
}

fn fragment_fits(header: &RecordHeader, pos: usize, page_end: usize) -> bool {
    let size = header.size as usize;
    size > HEADER_SIZE && pos + size <= page_end
}

#[derive(Debug)]
enum Fault {
    /// The bytes were read but do not describe a record.
    Invalid,
    /// A continuation header was missing or damaged on the page at this offset.
    BrokenContinuation { page_start: usize },
    /// The data ended inside the record.
    EndOfData,
}

/// Reads a record body across its fragments.
struct FragmentCursor<'a> {
    data: &'a [u8],
    page_size: usize,
    page_start: usize,
    pos: usize,
    fragment_end: usize,
    closes_record: bool,
}

impl<'a> FragmentCursor<'a> {
    /// Moves to the continuation fragment on the next page.
    fn next_fragment(&mut self) -> std::result::Result<(), Fault> {
        if self.closes_record {
            // the record claims to be complete but its fields are not
            return Err(Fault::Invalid);
        }
        let next = self.page_start + self.page_size;
        let page_end = (next + self.page_size).min(self.data.len());
        if next + HEADER_SIZE > self.data.len() {
            return Err(Fault::EndOfData);
        }
        let header = read_header(self.data, next);
        let continues = matches!(
            header.valid_flag(),
            Some(RecordFlag::Middle) | Some(RecordFlag::Last)
        );
        if !continues || !fragment_fits(&header, next, page_end) {
            return Err(Fault::BrokenContinuation { page_start: next });
        }
        self.page_start = next;
        self.pos = next + HEADER_SIZE;
        self.fragment_end = next + header.size as usize;
        self.closes_record = header.valid_flag() == Some(RecordFlag::Last);
        Ok(())
    }

    fn read_into(&mut self, out: &mut [u8]) -> std::result::Result<(), Fault> {
        let mut filled = 0;
        while filled < out.len() {
            if self.pos == self.fragment_end {
                self.next_fragment()?;
                continue;
            }
            let take = (self.fragment_end - self.pos).min(out.len() - filled);
            out[filled..filled + take].copy_from_slice(&self.data[self.pos..self.pos + take]);
            self.pos += take;
            filled += take;
        }
        Ok(())
    }

    fn read_array<const N: usize>(&mut self) -> std::result::Result<[u8; N], Fault> {
        let mut bytes = [0u8; N];
        self.read_into(&mut bytes)?;
        Ok(bytes)
    }

    fn read_short_str(&mut self) -> std::result::Result<String, Fault> {
        let [len] = self.read_array::<1>()?;
        let mut bytes = vec![0u8; len as usize];
        self.read_into(&mut bytes)?;
        String::from_utf8(bytes).map_err(|_| Fault::Invalid)
    }
}

fn read_record(
    cursor: &mut FragmentCursor<'_>,
    pool: &Arc<BufferPool>,
) -> std::result::Result<LogItem, Fault> {
    let [level] = cursor.read_array::<1>()?;
    let ticks = i64::from_le_bytes(cursor.read_array()?);
    let category = cursor.read_short_str()?;
    let file = cursor.read_short_str()?;
    let member = cursor.read_short_str()?;
    let line = u32::from_le_bytes(cursor.read_array()?);
    let descriptor = u32::from_le_bytes(cursor.read_array()?);
    let (inner, outer) = LogMessage::split_descriptor(descriptor);

    let message = if outer > 0 {
        if inner > 0 {
            return Err(Fault::Invalid);
        }
        let mut buffer = pool.rent(outer);
        if let Err(fault) = cursor.read_into(&mut buffer.as_mut_slice()[..outer]) {
            pool.give_back(buffer);
            return Err(fault);
        }
        LogMessage::from_overflow(buffer, outer)
    } else {
        if inner > INLINE_CAPACITY {
            return Err(Fault::Invalid);
        }
        let mut bytes = [0u8; INLINE_CAPACITY];
        cursor.read_into(&mut bytes[..inner])?;
        LogMessage::from_inline(&bytes[..inner]).ok_or(Fault::Invalid)?
    };

    let level = LogLevel::from_u8(level);
    let time = clock::from_ticks(ticks);
    let (Some(level), Some(time)) = (level, time) else {
        message.release(pool);
        return Err(Fault::Invalid);
    };
    let event = LogEvent::with_time(
        time,
        level,
        Arc::from(category),
        Cow::Owned(file),
        Cow::Owned(member),
        line,
    );
    Ok(LogItem { event, message })
}
