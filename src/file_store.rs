//! Layout of a log folder: configuration, file naming and shared counters.
//!
//! A folder holds sequentially numbered files named
//! `<sequence as 16 hex digits>-<yyMMdd-HH>`. The sequence orders the files;
//! the creation hour is informational.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Local};
use parking_lot::Mutex;

use crate::error::{NanoLogError, Result};

pub const DEFAULT_MAX_FILE_SIZE: u64 = 32 * 1024 * 1024;
pub const DEFAULT_PAGE_SIZE: usize = 4096;

pub const MIN_PAGE_SIZE: usize = 64;
/// Record sizes are stored in 16 bits.
pub const MAX_PAGE_SIZE: usize = u16::MAX as usize;

const SEQUENCE_DIGITS: usize = 16;

/// Where and how records are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStoreConfig {
    pub folder: PathBuf,
    pub max_file_size: u64,
    pub page_size: usize,
}

impl FileStoreConfig {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(NanoLogError::invalid_config(format!(
                "page size {} outside {}..={}",
                self.page_size, MIN_PAGE_SIZE, MAX_PAGE_SIZE
            )));
        }
        let page = self.page_size as u64;
        if self.max_file_size < page || self.max_file_size % page != 0 {
            return Err(NanoLogError::invalid_config(format!(
                "max file size {} must be a non-zero multiple of the page size {}",
                self.max_file_size, self.page_size
            )));
        }
        Ok(())
    }
}

/// `0000000000000007-240102-13`
pub fn make_file_name(sequence: u64, created: DateTime<Local>) -> String {
    format!("{:016x}-{}", sequence, created.format("%y%m%d-%H"))
}

/// Sequence number of a log file name, `None` for foreign files.
pub fn parse_sequence(name: &str) -> Option<u64> {
    let digits = name.get(..SEQUENCE_DIGITS)?;
    if name.as_bytes().get(SEQUENCE_DIGITS) != Some(&b'-') {
        return None;
    }
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

/// Log files of `folder` as `(sequence, path)`, oldest first.
///
/// A missing folder has no files.
pub fn list_log_files(folder: &Path) -> Result<Vec<(u64, PathBuf)>> {
    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if let Some(sequence) = name.to_str().and_then(parse_sequence) {
            files.push((sequence, entry.path()));
        }
    }
    files.sort_by_key(|(sequence, _)| *sequence);
    Ok(files)
}

/// Counters shared between a writer and whoever watches it.
#[derive(Debug, Default)]
pub struct FileStoreStats {
    dropped: AtomicU64,
    // sequence + 1, 0 while no file is open
    current: AtomicU64,
    files: Mutex<Vec<PathBuf>>,
}

impl FileStoreStats {
    /// Records dropped because no file could be written.
    pub fn dropped_records(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Sequence of the open file.
    pub fn current_sequence(&self) -> Option<u64> {
        self.current.load(Ordering::Acquire).checked_sub(1)
    }

    /// Files created by this writer, in creation order.
    pub fn files(&self) -> Vec<PathBuf> {
        self.files.lock().clone()
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn file_opened(&self, sequence: u64, path: PathBuf) {
        self.files.lock().push(path);
        self.current.store(sequence.saturating_add(1), Ordering::Release);
    }

    pub(crate) fn file_closed(&self) {
        self.current.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_file_name_round_trip() {
        let created = Local.with_ymd_and_hms(2024, 1, 2, 13, 45, 0).unwrap();
        let name = make_file_name(7, created);
        assert_eq!(name, "0000000000000007-240102-13");
        assert_eq!(parse_sequence(&name), Some(7));
    }

    #[test]
    fn test_foreign_names_are_ignored() {
        assert_eq!(parse_sequence("notes.txt"), None);
        assert_eq!(parse_sequence("000000000000000g-240102-13"), None);
        assert_eq!(parse_sequence("0000000000000001_240102-13"), None);
        assert_eq!(parse_sequence("00000000000000ff-"), Some(255));
    }

    #[test]
    fn test_validate() {
        assert!(FileStoreConfig::new("x").validate().is_ok());
        assert!(FileStoreConfig::new("x").with_page_size(32).validate().is_err());
        assert!(FileStoreConfig::new("x").with_page_size(70_000).validate().is_err());
        assert!(FileStoreConfig::new("x")
            .with_page_size(256)
            .with_max_file_size(1000)
            .validate()
            .is_err());
        assert!(FileStoreConfig::new("x")
            .with_page_size(256)
            .with_max_file_size(1024)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_list_sorted_by_sequence() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["000000000000000a-240101-00", "0000000000000002-240101-00", "readme.md"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        let files = list_log_files(dir.path()).unwrap();
        let sequences: Vec<u64> = files.iter().map(|(seq, _)| *seq).collect();
        assert_eq!(sequences, vec![2, 10]);
        assert!(list_log_files(&dir.path().join("missing")).unwrap().is_empty());
    }
}
