//! Filesystem watcher: subscribes to OS-level change notifications for a
//! set of source roots and forwards typed [`RawEvent`]s into an [`EventQueue`].
//!
//! Grounded structurally in the teacher's watcher module (the `notify`
//! crate subscription, channel plumbing, and config shape) but rebuilt to
//! consume `notify`'s raw [`notify::Event`] stream directly rather than
//! `notify-debouncer-mini`'s pre-coalesced output. The debouncer's dedup
//! collapses distinct event kinds into an undifferentiated "path changed"
//! signal and drops ordering between a rename's two halves; this watcher
//! needs both (strict RenamedOld/RenamedNew pairing per the processor's
//! rename-pairing cell), so debouncing is instead performed in `queue.rs`
//! over the raw kind-tagged stream. Semantically this plays the role of
//! the original `DirectorySignal` constructor/`monitor()` loop, minus its
//! Windows-only IOCP machinery which `notify` already abstracts away.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::Instant;

use notify::{Config, EventKind as NotifyEventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::{Result, SfctError, SFCT_WCH_001_SUBSCRIBE_FAILED};
use crate::event::{RawEvent, RawKind};
use crate::queue::EventQueue;

/// One watched source root, handed to the supervisor per configured job.
pub struct WatcherConfig {
    pub root: PathBuf,
    pub recursive: bool,
}

/// Owns the underlying OS watcher and the raw-event receiver. Dropping
/// this value tears down the subscription.
pub struct FileSystemWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<notify::Event>>,
    root: PathBuf,
}

impl FileSystemWatcher {
    pub fn new(config: &WatcherConfig) -> Result<Self> {
        let (tx, rx) = channel();
        let mut watcher = RecommendedWatcher::new(tx, Config::default())
            .map_err(|e| SfctError::WatchSubscribe(SFCT_WCH_001_SUBSCRIBE_FAILED, config.root.clone(), e.to_string()))?;
        let mode = if config.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(&config.root, mode)
            .map_err(|e| SfctError::WatchSubscribe(SFCT_WCH_001_SUBSCRIBE_FAILED, config.root.clone(), e.to_string()))?;
        Ok(FileSystemWatcher { _watcher: watcher, rx, root: config.root.clone() })
    }

    /// Blocks for the next batch of OS notifications (with a timeout so the
    /// caller can check a shutdown flag) and pushes each as a raw event into
    /// `queue`. Returns `Ok(false)` once the channel disconnects.
    ///
    /// A `notify::Error` surfaced mid-stream (the native backend's own
    /// queue overflowed, e.g. inotify's `IN_Q_OVERFLOW`) is conservatively
    /// treated as [`RawKind::BufferOverflow`] rather than swallowed: a
    /// false-positive sweep costs one extra full diff, a missed overflow
    /// costs silent drift (§4.C).
    pub fn pump_once(&self, queue: &EventQueue, timeout: std::time::Duration) -> Result<bool> {
        let event = match self.rx.recv_timeout(timeout) {
            Ok(Ok(event)) => event,
            Ok(Err(_)) => {
                queue.add_raw(RawEvent {
                    kind: RawKind::BufferOverflow,
                    path: self.root.clone(),
                    observed_at: Instant::now(),
                });
                return Ok(true);
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => return Ok(true),
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => return Ok(false),
        };
        if is_rename_both(&event.kind) {
            for raw in both_rename_raws(&event.paths) {
                queue.add_raw(raw);
            }
        } else if let Some(kind) = translate_kind(&event.kind) {
            for path in event.paths {
                let raw = RawEvent { kind, path, observed_at: Instant::now() };
                queue.add_raw(raw);
            }
        }
        Ok(true)
    }

    pub fn root_is_watchable(root: &Path) -> bool {
        root.is_dir()
    }
}

fn translate_kind(kind: &NotifyEventKind) -> Option<RawKind> {
    use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
    match kind {
        NotifyEventKind::Create(CreateKind::Any)
        | NotifyEventKind::Create(CreateKind::File)
        | NotifyEventKind::Create(CreateKind::Folder) => Some(RawKind::Added),
        NotifyEventKind::Modify(ModifyKind::Data(_)) | NotifyEventKind::Modify(ModifyKind::Any) => Some(RawKind::Modified),
        NotifyEventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(RawKind::RenamedOld),
        NotifyEventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(RawKind::RenamedNew),
        NotifyEventKind::Remove(RemoveKind::Any)
        | NotifyEventKind::Remove(RemoveKind::File)
        | NotifyEventKind::Remove(RemoveKind::Folder) => Some(RawKind::Removed),
        _ => None,
    }
}

fn is_rename_both(kind: &NotifyEventKind) -> bool {
    use notify::event::{ModifyKind, RenameMode};
    matches!(kind, NotifyEventKind::Modify(ModifyKind::Name(RenameMode::Both)))
}

/// Some backends (`PollWatcher`, FSEvents) deliver both halves of a rename
/// as a single event carrying `[from, to]` in `paths`, instead of the
/// separate `From`/`To` events `translate_kind` handles. Synthesize the
/// usual `RenamedOld`/`RenamedNew` pair from it rather than dropping the
/// rename on the floor. An event that doesn't carry exactly two paths (a
/// backend quirk) degrades to an `Added` for whatever paths are present,
/// since there's no "old" half to pair.
fn both_rename_raws(paths: &[PathBuf]) -> Vec<RawEvent> {
    if paths.len() == 2 {
        vec![
            RawEvent { kind: RawKind::RenamedOld, path: paths[0].clone(), observed_at: Instant::now() },
            RawEvent { kind: RawKind::RenamedNew, path: paths[1].clone(), observed_at: Instant::now() },
        ]
    } else {
        paths
            .iter()
            .map(|p| RawEvent { kind: RawKind::Added, path: p.clone(), observed_at: Instant::now() })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_kind_maps_rename_halves() {
        use notify::event::{ModifyKind, RenameMode};
        assert_eq!(
            translate_kind(&NotifyEventKind::Modify(ModifyKind::Name(RenameMode::From))),
            Some(RawKind::RenamedOld)
        );
        assert_eq!(
            translate_kind(&NotifyEventKind::Modify(ModifyKind::Name(RenameMode::To))),
            Some(RawKind::RenamedNew)
        );
    }

    #[test]
    fn translate_kind_ignores_access_events() {
        use notify::event::AccessKind;
        assert_eq!(translate_kind(&NotifyEventKind::Access(AccessKind::Any)), None);
    }

    #[test]
    fn rename_both_is_detected_and_synthesizes_a_pair() {
        use notify::event::{ModifyKind, RenameMode};
        let kind = NotifyEventKind::Modify(ModifyKind::Name(RenameMode::Both));
        assert!(is_rename_both(&kind));
        assert!(translate_kind(&kind).is_none());

        let paths = vec![PathBuf::from("/src/old.txt"), PathBuf::from("/src/new.txt")];
        let raws = both_rename_raws(&paths);
        assert_eq!(raws.len(), 2);
        assert_eq!(raws[0].kind, RawKind::RenamedOld);
        assert_eq!(raws[0].path, PathBuf::from("/src/old.txt"));
        assert_eq!(raws[1].kind, RawKind::RenamedNew);
        assert_eq!(raws[1].path, PathBuf::from("/src/new.txt"));
    }

    #[test]
    fn rename_both_with_unexpected_path_count_degrades_to_added() {
        let paths = vec![PathBuf::from("/src/only.txt")];
        let raws = both_rename_raws(&paths);
        assert_eq!(raws.len(), 1);
        assert_eq!(raws[0].kind, RawKind::Added);
    }
}
