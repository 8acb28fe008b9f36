mod common;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use common::{init_tracing, tokens, Token};
use nanolog::file_store::{list_log_files, parse_sequence};
use nanolog::{
    extract_tokens, BufferPool, FileStoreConfig, LogEvent, LogLevel, LogMessage, MessageWriter,
    NanoLogError, RecordReader, RecordWriter,
};

const PAGE: usize = 128;

fn small_config(folder: PathBuf) -> FileStoreConfig {
    FileStoreConfig::new(folder).with_page_size(PAGE)
}

fn numbered(pool: &BufferPool, n: i32) -> LogMessage {
    let mut writer = MessageWriter::new(pool);
    writer.append_int("n", Some(n), None);
    writer.finish()
}

fn event(category: &str, line: u32) -> LogEvent {
    LogEvent::new(LogLevel::Info, Arc::from(category), "src/store.rs", "write", line)
}

#[test]
fn test_records_spanning_pages_read_back_intact() {
    let dir = tempfile::tempdir().unwrap();
    let pool = BufferPool::new();
    let mut writer = RecordWriter::new(small_config(dir.path().to_path_buf())).unwrap();

    let mut written = Vec::new();
    for i in 0..40u32 {
        let category = "c".repeat((i as usize * 3) % 61);
        let level = LogLevel::ALL[i as usize % LogLevel::ALL.len()];
        let event =
            LogEvent::new(level, Arc::from(category.as_str()), "src/span.rs", "spanning", i);

        let mut message = MessageWriter::new(&pool);
        message.append_literal("record ");
        message.append_uint("index", Some(i), None);
        message.append_string("pad", Some(&"p".repeat(150 + i as usize)), None);
        if i % 7 == 0 {
            message.append_string("blob", Some(&"b".repeat(1000)), None);
        }
        let message = message.finish();

        writer.write(&event, &message).unwrap();
        written.push((event, tokens(&message)));
        message.release(&pool);
    }
    writer.flush().unwrap();
    assert_eq!(pool.outstanding(), 0);

    let reader = RecordReader::new(PAGE, Arc::new(BufferPool::new()));
    let list = reader.read_folder(dir.path()).unwrap();
    assert_eq!(list.skipped_pages(), 0);
    assert_eq!(list.len(), written.len());

    for (item, (event, expected)) in list.iter().zip(&written) {
        assert_eq!(item.event.level, event.level);
        assert_eq!(item.event.ticks(), event.ticks());
        assert_eq!(item.event.category, event.category);
        assert_eq!(item.event.file, event.file);
        assert_eq!(item.event.member, event.member);
        assert_eq!(item.event.line, event.line);
        assert_eq!(&tokens(&item.message), expected);
    }
}

#[test]
fn test_files_rotate_with_consecutive_sequences() {
    let dir = tempfile::tempdir().unwrap();
    let pool = BufferPool::new();
    let config = small_config(dir.path().to_path_buf()).with_max_file_size(512);
    let mut writer = RecordWriter::new(config).unwrap();

    for n in 0..60 {
        writer.write(&event("rotate", n as u32), &numbered(&pool, n)).unwrap();
    }
    writer.flush().unwrap();

    let files = list_log_files(dir.path()).unwrap();
    assert!(files.len() > 1, "expected several files, got {}", files.len());
    assert_eq!(writer.stats().files().len(), files.len());
    for (expected, (sequence, path)) in files.iter().enumerate() {
        assert_eq!(*sequence, expected as u64);
        let name = path.file_name().unwrap().to_str().unwrap();
        assert_eq!(parse_sequence(name), Some(*sequence));
        assert!(fs::metadata(path).unwrap().len() <= 512);
    }

    let reader = RecordReader::new(PAGE, Arc::new(BufferPool::new()));
    let mut total = 0;
    for (_, path) in &files {
        let list = reader.read_file(path).unwrap();
        assert_eq!(list.skipped_pages(), 0, "{} had damaged pages", path.display());
        total += list.len();
    }
    assert_eq!(total, 60);

    let all = reader.read_folder(dir.path()).unwrap();
    for (n, item) in all.iter().enumerate() {
        let tree = extract_tokens(&item.message);
        assert_eq!(tree.get("n").unwrap().as_i64().unwrap(), n as i64);
    }
}

#[test]
fn test_oversized_record_gets_its_own_file() {
    let dir = tempfile::tempdir().unwrap();
    let pool = BufferPool::new();
    let config = small_config(dir.path().to_path_buf()).with_max_file_size(512);
    let mut writer = RecordWriter::new(config).unwrap();

    writer.write(&event("big", 1), &numbered(&pool, 1)).unwrap();
    let mut big = MessageWriter::new(&pool);
    big.append_string("blob", Some(&"x".repeat(1000)), None);
    let big = big.finish();
    writer.write(&event("big", 2), &big).unwrap();
    big.release(&pool);
    writer.write(&event("big", 3), &numbered(&pool, 3)).unwrap();
    writer.flush().unwrap();

    let files = list_log_files(dir.path()).unwrap();
    assert_eq!(files.len(), 3);
    assert!(fs::metadata(&files[1].1).unwrap().len() > 512);

    let list = RecordReader::new(PAGE, Arc::new(BufferPool::new()))
        .read_folder(dir.path())
        .unwrap();
    let lines: Vec<u32> = list.iter().map(|item| item.event.line).collect();
    assert_eq!(lines, vec![1, 2, 3]);
}

#[test]
fn test_corrupt_page_loses_only_nearby_records() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let pool = BufferPool::new();
    let mut writer = RecordWriter::new(small_config(dir.path().to_path_buf())).unwrap();

    let count = 20;
    for n in 0..count {
        writer.write(&event("app", n as u32), &numbered(&pool, n)).unwrap();
    }
    writer.flush().unwrap();

    let path = writer.stats().files()[0].clone();
    let mut data = fs::read(&path).unwrap();
    assert!(data.len() >= 4 * PAGE);
    data[PAGE] = 0x13;
    fs::write(&path, &data).unwrap();

    let list = RecordReader::new(PAGE, Arc::new(BufferPool::new()))
        .read_file(&path)
        .unwrap();
    assert!(list.skipped_pages() >= 1);
    assert!(list.len() < count as usize);
    assert!(list.len() >= 2, "records on the first page should survive");

    let mut previous = -1;
    for item in &list {
        let n = extract_tokens(&item.message).get("n").unwrap().as_i64().unwrap();
        assert!(n > previous, "records out of order: {n} after {previous}");
        assert_eq!(item.event.line as i64, n, "fields of record {n} do not match");
        previous = n;
    }
    assert_eq!(previous, count as i64 - 1, "the last record should survive");
}

#[test]
fn test_missing_folder_drops_record_until_recreated() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let folder = dir.path().join("logs");
    let pool = BufferPool::new();
    let mut writer = RecordWriter::new(small_config(folder.clone())).unwrap();
    fs::remove_dir_all(&folder).unwrap();

    let err = writer.write(&event("app", 1), &numbered(&pool, 1)).unwrap_err();
    assert!(matches!(err, NanoLogError::FileUnavailable { .. }), "got {err:?}");
    assert_eq!(writer.stats().dropped_records(), 1);
    assert_eq!(writer.stats().current_sequence(), None);

    fs::create_dir_all(&folder).unwrap();
    writer.write(&event("app", 2), &numbered(&pool, 2)).unwrap();
    writer.flush().unwrap();
    assert_eq!(writer.stats().dropped_records(), 1);
    assert_eq!(writer.stats().current_sequence(), Some(0));

    let list = RecordReader::new(PAGE, Arc::new(BufferPool::new()))
        .read_folder(&folder)
        .unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(
        tokens(&list.get(0).unwrap().message),
        vec![Token::Int("n".into(), None, 2)]
    );
}

#[test]
fn test_new_writer_appends_after_existing_files() {
    let dir = tempfile::tempdir().unwrap();
    let pool = BufferPool::new();
    {
        let mut writer = RecordWriter::new(small_config(dir.path().to_path_buf())).unwrap();
        writer.write(&event("first", 1), &numbered(&pool, 1)).unwrap();
    }
    let mut writer = RecordWriter::new(small_config(dir.path().to_path_buf())).unwrap();
    writer.write(&event("second", 2), &numbered(&pool, 2)).unwrap();
    drop(writer);

    let sequences: Vec<u64> = list_log_files(dir.path())
        .unwrap()
        .into_iter()
        .map(|(sequence, _)| sequence)
        .collect();
    assert_eq!(sequences, vec![0, 1]);

    let list = RecordReader::new(PAGE, Arc::new(BufferPool::new()))
        .read_folder(dir.path())
        .unwrap();
    let categories: Vec<&str> = list.iter().map(|item| &*item.event.category).collect();
    assert_eq!(categories, vec!["first", "second"]);
}
