use std::fs;

use batchstamp_engine::{ensure_output_dir, AtomicFileWriter, BatchLog, PersistError};
use chrono::{Local, TimeZone};
use tempfile::TempDir;

#[test]
fn batch_log_is_named_after_start_time_and_appends_lines() {
    let temp = TempDir::new().unwrap();
    let started = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();

    let mut log = BatchLog::open(&temp.path().join("logs"), started).unwrap();
    assert_eq!(
        log.path().file_name().unwrap(),
        "batchstamp_20240309_140507.log"
    );
    log.append("Found /docs/a.ddoc").unwrap();
    log.append("[1/1] DONE /docs/a.ddoc -> /docs/a.asics").unwrap();
    let path = log.close().unwrap();

    assert_eq!(
        fs::read_to_string(path).unwrap(),
        "Found /docs/a.ddoc\n[1/1] DONE /docs/a.ddoc -> /docs/a.asics\n"
    );
}

#[test]
fn batches_started_in_the_same_second_get_separate_logs() {
    let temp = TempDir::new().unwrap();
    let started = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();

    let mut first = BatchLog::open(temp.path(), started).unwrap();
    let mut second = BatchLog::open(temp.path(), started).unwrap();
    first.append("[1/1] DONE a.ddoc -> a.asics").unwrap();
    second.append("[1/1] DONE b.ddoc -> b.asics").unwrap();
    let first = first.close().unwrap();
    let second = second.close().unwrap();

    assert_eq!(first.file_name().unwrap(), "batchstamp_20240309_140507.log");
    assert_eq!(second.file_name().unwrap(), "batchstamp_20240309_140507_1.log");
    assert_eq!(
        fs::read_to_string(first).unwrap(),
        "[1/1] DONE a.ddoc -> a.asics\n"
    );
    assert_eq!(
        fs::read_to_string(second).unwrap(),
        "[1/1] DONE b.ddoc -> b.asics\n"
    );
}

#[test]
fn batch_log_lines_are_visible_before_close() {
    let temp = TempDir::new().unwrap();
    let mut log = BatchLog::open(temp.path(), Local::now()).unwrap();
    log.append("Found x.bdoc").unwrap();

    assert_eq!(fs::read_to_string(log.path()).unwrap(), "Found x.bdoc\n");
}

#[test]
fn batch_log_fails_when_dir_is_a_file() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("blocker");
    fs::write(&blocker, "x").unwrap();

    let err = BatchLog::open(&blocker, Local::now()).err().expect("open fails");
    assert!(matches!(err, PersistError::OutputDir(_)));
}

#[test]
fn output_dir_is_created_on_demand() {
    let temp = TempDir::new().unwrap();
    let nested = temp.path().join("a/b");
    ensure_output_dir(&nested).unwrap();
    assert!(nested.is_dir());
}

#[test]
fn stamp_write_replaces_previous_output() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("contract.asics");
    let (writer, name) = AtomicFileWriter::for_target(&target).unwrap();
    assert_eq!(name, "contract.asics");

    writer.write(&name, b"first").unwrap();
    let written = writer.write(&name, b"second").unwrap();

    assert_eq!(written, target);
    assert_eq!(fs::read(&target).unwrap(), b"second");
    let leftovers = fs::read_dir(temp.path()).unwrap().count();
    assert_eq!(leftovers, 1);
}

#[test]
fn stamp_write_into_file_path_fails_cleanly() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("blocker");
    fs::write(&blocker, "x").unwrap();

    let writer = AtomicFileWriter::new(blocker.clone());
    assert!(writer.write("a.asics", b"data").is_err());
    assert_eq!(fs::read(&blocker).unwrap(), b"x");
}
