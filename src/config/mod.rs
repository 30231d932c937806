//! Job configuration: the in-memory model a parsed script (or, in future,
//! a hand-built config) resolves into before the supervisor spawns threads.
//!
//! Grounded in the original `args.hpp`'s `command`/`copy`/`monitor` enums —
//! narrowed here to the flag sets the mirroring daemon actually dispatches
//! on, dropping the console-GUI-only combinations.

pub mod script;

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// A single `monitor { ... }` job: one watched source tree mirrored to one
/// destination tree.
///
/// `sync`/`sync_add` mirrors `args.hpp`'s `monitor` enum: `sync` makes the
/// job delete-propagating (a `Removed` raw event is materialised as
/// `FileRemoved`), `sync_add` makes it additive-only (the same raw event
/// is dropped at event-construction time — see `queue.rs`).
#[derive(Debug, Clone)]
pub struct Job {
    pub name: String,
    pub src: PathBuf,
    pub dst: PathBuf,
    pub recursive: bool,
    pub sync: bool,
    pub copy_flags: CopyFlags,
    pub debounce_window: Duration,
    pub retry_backoff: Duration,
}

impl Job {
    pub fn new(name: impl Into<String>, src: PathBuf, dst: PathBuf) -> Self {
        Job {
            name: name.into(),
            src,
            dst,
            recursive: true,
            sync: false,
            copy_flags: CopyFlags::default(),
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

/// Flags recognized on a `copy`/`fast_copy`/`monitor` statement, mirroring
/// the original's `copy` enum (`-recursive`, `-update`, `-overwrite`,
/// `-single`). `copy_flags` is the derived set actually consulted by the
/// path & copy primitives (§4.A): `recursive`, `update_existing`,
/// `overwrite_existing`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyFlags {
    pub recursive: bool,
    pub update_existing: bool,
    pub overwrite_existing: bool,
}

/// A `copy`/`fast_copy { ... }` bulk-copy statement (§4.I).
#[derive(Debug, Clone)]
pub struct BulkCopyJob {
    pub name: String,
    pub fast: bool,
    pub flags: CopyFlags,
    pub src: PathBuf,
    pub dst: PathBuf,
}

/// Flags recognized on a `benchmark { ... }` statement (§4.J).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BenchmarkFlags {
    pub create: bool,
    pub four_k: bool,
    pub fast: bool,
}

/// A `benchmark { ... }` statement.
#[derive(Debug, Clone)]
pub struct BenchmarkJob {
    pub name: String,
    pub flags: BenchmarkFlags,
    pub src: PathBuf,
    pub dst: PathBuf,
}

/// The fully resolved contents of a parsed `sfct_list.txt`, sorted into
/// the three kinds of work the daemon can run.
#[derive(Debug, Clone, Default)]
pub struct RunPlan {
    pub monitor_jobs: Vec<Job>,
    pub copy_jobs: Vec<BulkCopyJob>,
    pub benchmark_jobs: Vec<BenchmarkJob>,
}
