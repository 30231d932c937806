//! Event model: the typed unit of work flowing from the watcher through
//! the debounced queue into the processor's dispatch matrix.
//!
//! Grounded in the original `obj.hpp`'s `file_queue_info`/`file_queue_status`,
//! narrowed to the kinds the spec actually distinguishes (the original carried
//! separate directory_* and other_* variants which collapse here since our
//! dispatch matrix keys off the live filesystem entry's type rather than a
//! type baked into the event itself).

use std::path::PathBuf;
use std::time::Instant;

/// The raw kind of filesystem change observed by the watcher, before
/// debouncing collapses repeated events for the same path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawKind {
    Added,
    Modified,
    Removed,
    RenamedOld,
    RenamedNew,
    /// The watcher's native notification buffer overflowed; some number of
    /// changes under this root were lost. `RawEvent::path` carries the
    /// watched root itself, not a specific changed path.
    BufferOverflow,
}

/// A single observation from the OS-level watcher, timestamped for
/// debounce-window bucketing.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub kind: RawKind,
    pub path: PathBuf,
    pub observed_at: Instant,
}

/// The coalesced kind handed to the processor after debouncing. Unlike the
/// prior design, a rename's two halves are *not* paired here: `RenameOld`
/// and `RenameNew` are dispatched as separate events, and the Processor is
/// the sole owner of the `pending_rename_old` cell that pairs them (§4.F,
/// §4.G's "sole mutator" requirement).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Added,
    Updated,
    Removed,
    /// The "old" half of an OS rename pair: stashes `dst` as the pending
    /// rename-from cell and performs no filesystem mutation on its own.
    RenameOld,
    /// The "new" half of an OS rename pair: consumes the pending cell and
    /// performs the actual `rename()`, or falls back to a recursive copy
    /// if no matching `RenameOld` is pending.
    RenameNew,
    /// Recovery-sweep synthesized entry: not from the watcher at all.
    Recovered,
}

/// The live type of a source filesystem entry, re-derived at processing
/// time rather than trusted from the event (the entry may have changed
/// again since it was queued).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryType {
    File,
    Directory,
    Symlink,
    Missing,
}

/// A unit of mirroring work. Identity and hashing are keyed only on
/// `(src, dst)`, matching the original `file_queue_info`'s equality —
/// two events for the same pair are the same unit of work regardless
/// of which kind triggered them most recently.
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: EventKind,
    pub src: PathBuf,
    pub dst: PathBuf,
}

impl Event {
    pub fn new(kind: EventKind, src: PathBuf, dst: PathBuf) -> Self {
        Event { kind, src, dst }
    }

    pub fn identity(&self) -> (&PathBuf, &PathBuf) {
        (&self.src, &self.dst)
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.src == other.src && self.dst == other.dst
    }
}
impl Eq for Event {}

impl std::hash::Hash for Event {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.src.hash(state);
        self.dst.hash(state);
    }
}
