//! End-to-end mirroring scenarios, against a live supervisor pipeline
//! (watcher + debounce timer + processor threads), not unit-level dispatch.
//!
//! Grounded in the teacher's `tests/watch_buffering_tests.rs`: real temp
//! directories, a `write_and_sync` helper for deterministic file writes, and
//! sleep-then-assert against a background pipeline rather than mocking the
//! watcher.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sfct::config::Job;
use sfct::logger::{Logger, Severity};
use sfct::supervisor::spawn_job;
use tempfile::TempDir;

/// Matches the teacher's `write_and_sync`: ensures a write is fully
/// committed to disk before returning, so a subsequent watcher event always
/// observes stable content.
fn write_and_sync(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::fs::OpenOptions;
    use std::io::Write;
    let mut file = OpenOptions::new().write(true).create(true).truncate(true).open(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

fn short_debounce_job(name: &str, src: std::path::PathBuf, dst: std::path::PathBuf) -> Job {
    let mut job = Job::new(name, src, dst);
    job.debounce_window = Duration::from_millis(50);
    job.retry_backoff = Duration::from_millis(50);
    job
}

fn run_for(job: Job, log_dir: &Path, duration: Duration) {
    let logger = Arc::new(Logger::open(&log_dir.join("Applog.txt"), Severity::Fatal).unwrap());
    let shutdown = Arc::new(AtomicBool::new(false));
    let handles = spawn_job(job, shutdown.clone(), logger).unwrap();
    std::thread::sleep(duration);
    shutdown.store(true, Ordering::SeqCst);
    handles.join();
}

#[test]
fn scenario_add_mirrors_new_file() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    fs::create_dir_all(&src).unwrap();

    write_and_sync(&src.join("a.txt"), b"hello").unwrap();

    run_for(short_debounce_job("add", src, dst.clone()), dir.path(), Duration::from_millis(400));

    assert_eq!(fs::read_to_string(dst.join("a.txt")).unwrap(), "hello");
}

#[test]
fn scenario_update_with_update_flag_overwrites_older_destination() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(&dst).unwrap();

    write_and_sync(&dst.join("a.txt"), b"hello").unwrap();
    std::thread::sleep(Duration::from_millis(20));
    write_and_sync(&src.join("a.txt"), b"world").unwrap();

    let mut job = short_debounce_job("update", src, dst.clone());
    job.copy_flags.update_existing = true;
    run_for(job, dir.path(), Duration::from_millis(400));

    assert_eq!(fs::read_to_string(dst.join("a.txt")).unwrap(), "world");
}

#[test]
fn scenario_subtree_move_is_mirrored_via_recovery_sweep() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    let staging = dir.path().join("staging");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(staging.join("DIR/one/two")).unwrap();
    write_and_sync(&staging.join("DIR/one/two/three.bin"), b"payload").unwrap();

    let job = short_debounce_job("move", src.clone(), dst.clone());
    let logger = Arc::new(Logger::open(&dir.path().join("Applog.txt"), Severity::Fatal).unwrap());
    let shutdown = Arc::new(AtomicBool::new(false));
    let handles = spawn_job(job, shutdown.clone(), logger).unwrap();

    std::thread::sleep(Duration::from_millis(100));
    fs::rename(staging.join("DIR"), src.join("DIR")).unwrap();
    // Give the periodic recovery sweep (not just the watcher) a chance to
    // run: a whole-subtree move may only surface as one top-level event.
    std::thread::sleep(Duration::from_millis(500));

    shutdown.store(true, Ordering::SeqCst);
    handles.join();

    assert_eq!(fs::read_to_string(dst.join("DIR/one/two/three.bin")).unwrap(), "payload");
}

#[test]
fn scenario_rename_moves_destination_entry() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    fs::create_dir_all(&src).unwrap();

    write_and_sync(&src.join("a.txt"), b"data").unwrap();

    let job = short_debounce_job("rename", src.clone(), dst.clone());
    let logger = Arc::new(Logger::open(&dir.path().join("Applog.txt"), Severity::Fatal).unwrap());
    let shutdown = Arc::new(AtomicBool::new(false));
    let handles = spawn_job(job, shutdown.clone(), logger).unwrap();

    std::thread::sleep(Duration::from_millis(150));
    fs::rename(src.join("a.txt"), src.join("b.txt")).unwrap();
    std::thread::sleep(Duration::from_millis(250));

    shutdown.store(true, Ordering::SeqCst);
    handles.join();

    assert!(dst.join("b.txt").exists());
    assert!(!dst.join("a.txt").exists());
}

#[test]
fn scenario_delete_with_sync_propagates_removal() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    fs::create_dir_all(&src).unwrap();

    write_and_sync(&src.join("a.txt"), b"gone-soon").unwrap();

    let mut job = short_debounce_job("sync-delete", src.clone(), dst.clone());
    job.sync = true;
    let logger = Arc::new(Logger::open(&dir.path().join("Applog.txt"), Severity::Fatal).unwrap());
    let shutdown = Arc::new(AtomicBool::new(false));
    let handles = spawn_job(job, shutdown.clone(), logger).unwrap();

    std::thread::sleep(Duration::from_millis(150));
    assert!(dst.join("a.txt").exists());
    fs::remove_file(src.join("a.txt")).unwrap();
    std::thread::sleep(Duration::from_millis(250));

    shutdown.store(true, Ordering::SeqCst);
    handles.join();

    assert!(!dst.join("a.txt").exists());
}

#[test]
fn scenario_delete_without_sync_leaves_destination_untouched() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    fs::create_dir_all(&src).unwrap();

    write_and_sync(&src.join("a.txt"), b"sticks-around").unwrap();

    // sync == false is the default (the `-sync_add` additive-monitor mode).
    let job = short_debounce_job("sync-add-delete", src.clone(), dst.clone());
    let logger = Arc::new(Logger::open(&dir.path().join("Applog.txt"), Severity::Fatal).unwrap());
    let shutdown = Arc::new(AtomicBool::new(false));
    let handles = spawn_job(job, shutdown.clone(), logger).unwrap();

    std::thread::sleep(Duration::from_millis(150));
    assert!(dst.join("a.txt").exists());
    fs::remove_file(src.join("a.txt")).unwrap();
    std::thread::sleep(Duration::from_millis(250));

    shutdown.store(true, Ordering::SeqCst);
    handles.join();

    assert!(dst.join("a.txt").exists());
}
