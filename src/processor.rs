//! The processor: drains a job's ready queue and applies each event to the
//! destination tree, plus the periodic recovery sweep that catches anything
//! the watcher missed (buffer overflow, startup drift, a dropped event).
//!
//! Grounded in the original `queue_system.hpp`'s `process()` main loop,
//! `process_entry()`'s dispatch matrix (event kind x live source entry
//! type), and `check()`'s top-directory recovery sweep.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use ahash::AHashSet;

use crate::config::CopyFlags;
use crate::error::{ErrorKind as SfctErrorKind, Result, SfctError};
use crate::event::{EntryType, Event, EventKind};
use crate::fsops;
use crate::logger::{LogRecord, Logger, Severity};
use crate::quiescence::is_entry_in_transit;
use crate::queue::EventQueue;

/// Outcome of dispatching a single event, used by the supervisor to decide
/// whether to retry, sweep, or just log and move on.
#[derive(Debug)]
pub enum Outcome {
    Applied,
    Retried,
    Failed(SfctError),
}

/// Per-job processor state: the memo of already-mirrored (src, dst) pairs
/// (the "Seen-Set") and the set of top-level directories known to exist,
/// used to scope recovery sweeps to what's actually changed.
pub struct Processor {
    pub src_root: PathBuf,
    pub dst_root: PathBuf,
    copy_flags: CopyFlags,
    sync: bool,
    seen: AHashSet<(PathBuf, PathBuf)>,
    seen_top_dirs: AHashSet<PathBuf>,
    logger: std::sync::Arc<Logger>,
    /// Sole mutator of the rename-pairing cell (§4.G): stashes the mirrored
    /// `dst` of the most recent `RenameOld` half until a matching `RenameNew`
    /// consumes it, or a second `RenameOld` overwrites it (the first half's
    /// pairing was broken and its destination keeps its old name).
    pending_rename_old: Option<PathBuf>,
}

impl Processor {
    pub fn new(src_root: PathBuf, dst_root: PathBuf, logger: std::sync::Arc<Logger>) -> Self {
        Self::with_flags(src_root, dst_root, CopyFlags::default(), false, logger)
    }

    pub fn with_flags(
        src_root: PathBuf,
        dst_root: PathBuf,
        copy_flags: CopyFlags,
        sync: bool,
        logger: std::sync::Arc<Logger>,
    ) -> Self {
        Processor {
            src_root,
            dst_root,
            copy_flags,
            sync,
            seen: AHashSet::default(),
            seen_top_dirs: AHashSet::default(),
            logger,
            pending_rename_old: None,
        }
    }

    fn log(&self, severity: Severity, message: String) {
        self.logger.log(LogRecord {
            severity,
            file: "src/processor.rs",
            line: 0,
            function: "Processor::dispatch".to_string(),
            message,
        });
    }

    /// Drains ready events (and due retries) from `queue` until `timeout`
    /// elapses with nothing to do, applying the dispatch matrix to each.
    pub fn run_once(&mut self, queue: &EventQueue, timeout: Duration) -> Option<Outcome> {
        let event = queue.pop_ready(timeout)?;
        Some(self.dispatch(event, queue))
    }

    /// The core dispatch matrix: `(event kind) x (live source entry type)`,
    /// mirroring `process_entry()`'s switch. The event's kind is a hint
    /// from the watcher; the live entry type is re-derived here because
    /// the filesystem may have changed again since the event was queued.
    pub fn dispatch(&mut self, event: Event, queue: &EventQueue) -> Outcome {
        let entry_type = classify(&event.src);

        if matches!(entry_type, EntryType::File) && is_entry_in_transit(&event.src) {
            queue.push_retry(event);
            return Outcome::Retried;
        }

        let result = match (event.kind, entry_type) {
            (EventKind::RenameOld, _) => self.handle_rename_old(&event),
            (EventKind::RenameNew, _) => self.handle_rename_new(&event, entry_type),
            (EventKind::Removed, EntryType::Missing) => self.handle_remove(&event),
            (EventKind::Removed, _) => {
                // The watcher said "removed" but the entry is back (quick
                // delete+recreate); treat it as an update instead of
                // trusting the stale event kind.
                self.handle_upsert(&event, entry_type)
            }
            // A genuinely missing source at recovery time (the sweep
            // synthesized this entry from a destination-side scan that
            // found no source counterpart) is a removal.
            (EventKind::Recovered, EntryType::Missing) => self.handle_remove(&event),
            // `Added`/`Updated` with a vanished live source is NOT a
            // removal: the source disappeared between being queued (e.g.
            // while parked in the retry lane for quiescence) and dispatch,
            // so there is nothing to mirror and nothing to delete either —
            // a real `Removed` raw event will follow if this is a genuine
            // delete. Skip rather than destroy destination state.
            (EventKind::Added | EventKind::Updated, EntryType::Missing) => {
                self.log(Severity::Debug, format!("source vanished before dispatch, skipping {:?}", event.src));
                Ok(())
            }
            (_, EntryType::File) | (_, EntryType::Directory) | (_, EntryType::Symlink) => {
                self.handle_upsert(&event, entry_type)
            }
        };

        match result {
            Ok(()) => {
                self.seen.insert((event.src.clone(), event.dst.clone()));
                if let Some(top) = top_level_component(&self.src_root, &event.src) {
                    self.seen_top_dirs.insert(top);
                }
                Outcome::Applied
            }
            Err(e) => match e.kind() {
                SfctErrorKind::Transient => {
                    self.log(Severity::Debug, format!("transient failure on {:?}: {e}", event.src));
                    queue.push_retry(event);
                    Outcome::Retried
                }
                SfctErrorKind::Integrity => {
                    self.log(Severity::Warning, format!("integrity failure on {:?}: {e}", event.src));
                    Outcome::Failed(e)
                }
                SfctErrorKind::Invariant | SfctErrorKind::Programmer => {
                    self.log(Severity::Fatal, format!("{} failure on {:?}: {e}", e.kind(), event.src));
                    Outcome::Failed(e)
                }
            },
        }
    }

    fn handle_upsert(&self, event: &Event, entry_type: EntryType) -> Result<()> {
        match entry_type {
            EntryType::File => {
                fsops::copy_file_flagged(&event.src, &event.dst, self.copy_flags)?;
            }
            EntryType::Directory => {
                fsops::create_parent_dirs(&event.dst)?;
                std::fs::create_dir_all(&event.dst)
                    .map_err(|e| SfctError::Io("SFCT-IO-009", event.dst.clone(), e))?;
            }
            EntryType::Symlink => {
                #[cfg(unix)]
                fsops::copy_symlink(&event.src, &event.dst)?;
            }
            EntryType::Missing => {}
        }
        Ok(())
    }

    fn handle_remove(&self, event: &Event) -> Result<()> {
        if event.dst.is_dir() {
            fsops::remove_all(&event.dst)
        } else {
            fsops::remove_entry(&event.dst)
        }
    }

    /// The "old" half of a rename pair: stashes this half's mirrored `dst`
    /// in the pending cell and performs no filesystem mutation. A second
    /// `RenameOld` arriving before it's consumed overwrites the cell — the
    /// first half's destination keeps its old name, matching the watcher
    /// reporting two renames on the same path without an intervening new-half.
    fn handle_rename_old(&mut self, event: &Event) -> Result<()> {
        self.pending_rename_old = Some(event.dst.clone());
        Ok(())
    }

    /// The "new" half: consumes the pending cell and performs the actual
    /// move. If no `RenameOld` is pending (the pairing was broken, e.g. the
    /// old half arrived in an earlier debounce batch and was already
    /// consumed, or the watcher only delivered one half), falls back to a
    /// recursive copy of the live entry under its new name.
    fn handle_rename_new(&mut self, event: &Event, entry_type: EntryType) -> Result<()> {
        let Some(old_dst) = self.pending_rename_old.take() else {
            return self.handle_upsert_recursive(event, entry_type);
        };
        if !old_dst.exists() {
            return self.handle_upsert_recursive(event, entry_type);
        }
        fsops::rename_or_move(&old_dst, &event.dst)
    }

    /// Upsert that also covers directories moved as a whole (the recursive
    /// copy fallback for a broken rename pairing), unlike `handle_upsert`
    /// which only creates an empty directory node for `EntryType::Directory`.
    fn handle_upsert_recursive(&self, event: &Event, entry_type: EntryType) -> Result<()> {
        match entry_type {
            EntryType::Directory => {
                fsops::create_parent_dirs(&event.dst)?;
                fsops::copy_dir_recursive(&event.src, &event.dst)
            }
            _ => self.handle_upsert(event, entry_type),
        }
    }

    /// Recovery sweep: walks the source tree under each top-level directory
    /// already seen by this processor and re-injects any drift as
    /// synthesized `Recovered` events. Mirrors `check()`'s top-directory
    /// scan, scoped by `seen_top_dirs` rather than the whole tree to keep
    /// a sweep cheap on a large mirror. Catches whole-subtree moves the
    /// watcher only reported as a single top-level event.
    pub fn recovery_sweep(&self, queue: &EventQueue) {
        for top in &self.seen_top_dirs {
            let abs = self.src_root.join(top);
            self.diff_sweep(&abs, queue);
        }
    }

    /// Full source-vs-destination diff of the entire job root, triggered
    /// by a watcher `BufferOverflow` (§4.F). Per the "single scheduled
    /// recovery, not two code paths" decision (DESIGN.md), this is the
    /// same walk `recovery_sweep` uses per top directory, just rooted at
    /// `src_root` instead of a single already-seen child.
    pub fn full_diff_sweep(&self, queue: &EventQueue) {
        let src_root = self.src_root.clone();
        self.diff_sweep(&src_root, queue);
        if self.sync {
            self.prune_unmatched_destination(queue);
        }
    }

    /// Walks `root` (a subtree of `src_root`) and synthesizes a `Recovered`
    /// event for any entry not already memoised in the Seen-Set or missing
    /// from the destination.
    fn diff_sweep(&self, root: &Path, queue: &EventQueue) {
        if !root.exists() {
            return;
        }
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            let src = entry.path().to_path_buf();
            let dst = match fsops::mirrored_path(&self.src_root, &self.dst_root, &src) {
                Ok(d) => d,
                Err(_) => continue,
            };
            if self.seen.contains(&(src.clone(), dst.clone())) && dst.exists() {
                continue;
            }
            queue.add_to_queue(Event::new(EventKind::Recovered, src, dst));
        }
    }

    /// Walks the destination tree looking for entries with no surviving
    /// source counterpart and synthesizes `Removed` events for them. Only
    /// called for jobs with `sync` set — an overflow on an additive-only
    /// (`sync_add`) job must not start deleting destination content it
    /// never agreed to prune.
    fn prune_unmatched_destination(&self, queue: &EventQueue) {
        if !self.dst_root.exists() {
            return;
        }
        for entry in walkdir::WalkDir::new(&self.dst_root).into_iter().filter_map(|e| e.ok()) {
            let dst = entry.path().to_path_buf();
            let rel = match dst.strip_prefix(&self.dst_root) {
                Ok(r) => r,
                Err(_) => continue,
            };
            if rel.as_os_str().is_empty() {
                continue;
            }
            let src = self.src_root.join(rel);
            if !src.exists() {
                queue.add_to_queue(Event::new(EventKind::Removed, src, dst));
            }
        }
    }
}

fn classify(path: &Path) -> EntryType {
    match path.symlink_metadata() {
        Ok(meta) => {
            if meta.file_type().is_symlink() {
                EntryType::Symlink
            } else if meta.is_dir() {
                EntryType::Directory
            } else {
                EntryType::File
            }
        }
        Err(_) => EntryType::Missing,
    }
}

fn top_level_component(root: &Path, entry: &Path) -> Option<PathBuf> {
    let rel = entry.strip_prefix(root).ok()?;
    rel.components().next().map(|c| PathBuf::from(c.as_os_str()))
}

/// A bounded FIFO of the most recent processing outcomes, used by the
/// console status line to show "last N operations" without retaining the
/// entire run's history in memory.
pub struct RecentOutcomes {
    capacity: usize,
    buf: VecDeque<(Instant, String)>,
}

impl RecentOutcomes {
    pub fn new(capacity: usize) -> Self {
        RecentOutcomes { capacity, buf: VecDeque::with_capacity(capacity) }
    }

    pub fn push(&mut self, message: String) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back((Instant::now(), message));
    }

    pub fn latest(&self) -> Option<&str> {
        self.buf.back().map(|(_, m)| m.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn logger() -> std::sync::Arc<Logger> {
        std::sync::Arc::new(Logger::open(&std::env::temp_dir().join(format!("sfct-test-{}.log", uuid::Uuid::new_v4())), Severity::Debug).unwrap())
    }

    #[test]
    fn added_file_is_copied() {
        let dir = tempdir().unwrap();
        let src_root = dir.path().join("src");
        let dst_root = dir.path().join("dst");
        fs::create_dir_all(&src_root).unwrap();
        let src_file = src_root.join("a.txt");
        fs::write(&src_file, b"hello").unwrap();

        let mut proc = Processor::new(src_root.clone(), dst_root.clone(), logger());
        let queue = EventQueue::new(src_root, dst_root.clone(), Duration::from_millis(5), Duration::from_millis(5));
        let event = Event::new(EventKind::Added, src_file, dst_root.join("a.txt"));
        let outcome = proc.dispatch(event, &queue);
        assert!(matches!(outcome, Outcome::Applied));
        assert_eq!(fs::read_to_string(dst_root.join("a.txt")).unwrap(), "hello");
    }

    #[test]
    fn removed_file_deletes_destination() {
        let dir = tempdir().unwrap();
        let src_root = dir.path().join("src");
        let dst_root = dir.path().join("dst");
        fs::create_dir_all(&src_root).unwrap();
        fs::create_dir_all(&dst_root).unwrap();
        let dst_file = dst_root.join("gone.txt");
        fs::write(&dst_file, b"bye").unwrap();

        let mut proc = Processor::new(src_root.clone(), dst_root.clone(), logger());
        let queue = EventQueue::new(src_root.clone(), dst_root, Duration::from_millis(5), Duration::from_millis(5));
        let event = Event::new(EventKind::Removed, src_root.join("gone.txt"), dst_file.clone());
        let outcome = proc.dispatch(event, &queue);
        assert!(matches!(outcome, Outcome::Applied));
        assert!(!dst_file.exists());
    }

    #[test]
    fn rename_old_then_new_moves_destination_entry() {
        let dir = tempdir().unwrap();
        let src_root = dir.path().join("src");
        let dst_root = dir.path().join("dst");
        fs::create_dir_all(&src_root).unwrap();
        fs::create_dir_all(&dst_root).unwrap();
        let old_dst = dst_root.join("old.txt");
        fs::write(&old_dst, b"data").unwrap();
        let new_src = src_root.join("new.txt");
        fs::write(&new_src, b"data").unwrap();

        let mut proc = Processor::new(src_root.clone(), dst_root.clone(), logger());
        let queue = EventQueue::new(src_root.clone(), dst_root.clone(), Duration::from_millis(5), Duration::from_millis(5));

        let old_event = Event::new(EventKind::RenameOld, src_root.join("old.txt"), old_dst.clone());
        let outcome = proc.dispatch(old_event, &queue);
        assert!(matches!(outcome, Outcome::Applied));
        assert!(old_dst.exists(), "RenameOld half must not mutate the filesystem");

        let new_event = Event::new(EventKind::RenameNew, new_src, dst_root.join("new.txt"));
        let outcome = proc.dispatch(new_event, &queue);
        assert!(matches!(outcome, Outcome::Applied));
        assert!(!old_dst.exists());
        assert!(dst_root.join("new.txt").exists());
    }

    #[test]
    fn rename_new_without_pending_old_falls_back_to_upsert() {
        let dir = tempdir().unwrap();
        let src_root = dir.path().join("src");
        let dst_root = dir.path().join("dst");
        fs::create_dir_all(&src_root).unwrap();
        let new_src = src_root.join("new.txt");
        fs::write(&new_src, b"data").unwrap();

        let mut proc = Processor::new(src_root.clone(), dst_root.clone(), logger());
        let queue = EventQueue::new(src_root.clone(), dst_root.clone(), Duration::from_millis(5), Duration::from_millis(5));
        // No RenameOld was ever dispatched, so the pairing cell is empty.
        let event = Event::new(EventKind::RenameNew, new_src, dst_root.join("new.txt"));
        let outcome = proc.dispatch(event, &queue);
        assert!(matches!(outcome, Outcome::Applied));
        assert!(dst_root.join("new.txt").exists());
    }

    #[test]
    fn rename_new_with_vanished_pending_old_destination_falls_back_to_upsert() {
        let dir = tempdir().unwrap();
        let src_root = dir.path().join("src");
        let dst_root = dir.path().join("dst");
        fs::create_dir_all(&src_root).unwrap();
        fs::create_dir_all(&dst_root).unwrap();
        let new_src = src_root.join("new.txt");
        fs::write(&new_src, b"data").unwrap();

        let mut proc = Processor::new(src_root.clone(), dst_root.clone(), logger());
        let queue = EventQueue::new(src_root.clone(), dst_root.clone(), Duration::from_millis(5), Duration::from_millis(5));
        // The old half's destination was stashed but never actually created.
        let old_event = Event::new(EventKind::RenameOld, src_root.join("vanished.txt"), dst_root.join("vanished.txt"));
        proc.dispatch(old_event, &queue);

        let new_event = Event::new(EventKind::RenameNew, new_src, dst_root.join("new.txt"));
        let outcome = proc.dispatch(new_event, &queue);
        assert!(matches!(outcome, Outcome::Applied));
        assert!(dst_root.join("new.txt").exists());
    }

    #[test]
    fn added_with_vanished_source_is_skipped_not_deleted() {
        let dir = tempdir().unwrap();
        let src_root = dir.path().join("src");
        let dst_root = dir.path().join("dst");
        fs::create_dir_all(&src_root).unwrap();
        fs::create_dir_all(&dst_root).unwrap();
        // The destination already holds a real file (e.g. from an earlier
        // run); the source never existed at dispatch time (deleted while
        // parked in the retry lane).
        let dst_file = dst_root.join("ghost.txt");
        fs::write(&dst_file, b"still here").unwrap();

        let mut proc = Processor::new(src_root.clone(), dst_root.clone(), logger());
        let queue = EventQueue::new(src_root.clone(), dst_root.clone(), Duration::from_millis(5), Duration::from_millis(5));
        let event = Event::new(EventKind::Added, src_root.join("ghost.txt"), dst_file.clone());
        let outcome = proc.dispatch(event, &queue);
        assert!(matches!(outcome, Outcome::Applied));
        assert!(dst_file.exists(), "Added x Missing must not delete the destination");
    }

    #[test]
    fn updated_with_vanished_source_is_skipped_not_deleted() {
        let dir = tempdir().unwrap();
        let src_root = dir.path().join("src");
        let dst_root = dir.path().join("dst");
        fs::create_dir_all(&src_root).unwrap();
        fs::create_dir_all(&dst_root).unwrap();
        let dst_file = dst_root.join("ghost.txt");
        fs::write(&dst_file, b"still here").unwrap();

        let mut proc = Processor::new(src_root.clone(), dst_root.clone(), logger());
        let queue = EventQueue::new(src_root.clone(), dst_root.clone(), Duration::from_millis(5), Duration::from_millis(5));
        let event = Event::new(EventKind::Updated, src_root.join("ghost.txt"), dst_file.clone());
        let outcome = proc.dispatch(event, &queue);
        assert!(matches!(outcome, Outcome::Applied));
        assert!(dst_file.exists());
    }

    #[test]
    fn recovered_with_missing_source_deletes_destination() {
        let dir = tempdir().unwrap();
        let src_root = dir.path().join("src");
        let dst_root = dir.path().join("dst");
        fs::create_dir_all(&src_root).unwrap();
        fs::create_dir_all(&dst_root).unwrap();
        let dst_file = dst_root.join("stray.txt");
        fs::write(&dst_file, b"stray").unwrap();

        let mut proc = Processor::new(src_root.clone(), dst_root.clone(), logger());
        let queue = EventQueue::new(src_root.clone(), dst_root.clone(), Duration::from_millis(5), Duration::from_millis(5));
        let event = Event::new(EventKind::Recovered, src_root.join("stray.txt"), dst_file.clone());
        let outcome = proc.dispatch(event, &queue);
        assert!(matches!(outcome, Outcome::Applied));
        assert!(!dst_file.exists());
    }

    #[test]
    fn recent_outcomes_caps_at_capacity() {
        let mut ring = RecentOutcomes::new(2);
        ring.push("a".into());
        ring.push("b".into());
        ring.push("c".into());
        assert_eq!(ring.buf.len(), 2);
        assert_eq!(ring.latest(), Some("c"));
    }
}
