//! Quiescence probing: is this entry still being written to?
//!
//! Grounded in the original `sfct_api.cpp`'s `is_entry_in_transit`, which
//! compared a file's size/mtime across a short settle window before
//! trusting it was safe to copy, and also required the file to still be
//! openable for a shared read at the end of the window — a writer holding
//! an exclusive lock (common on network shares and some Windows editors)
//! can leave size/mtime stable mid-write. We use mtime + length, sampled
//! twice across a fixed window, plus a read-share open attempt.

use std::fs::File;
use std::path::Path;
use std::thread::sleep;
use std::time::{Duration, SystemTime};

/// The settle window used by the original implementation.
pub const SETTLE_WINDOW: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    len: u64,
    modified: Option<SystemTime>,
}

fn fingerprint(path: &Path) -> Option<Fingerprint> {
    let meta = std::fs::metadata(path).ok()?;
    Some(Fingerprint {
        len: meta.len(),
        modified: meta.modified().ok(),
    })
}

/// A plain open-for-read succeeds under a shared/advisory lock on every
/// platform this targets; it only fails while a writer holds the file
/// exclusively.
fn can_open_for_read(path: &Path) -> bool {
    File::open(path).is_ok()
}

/// Blocks for up to [`SETTLE_WINDOW`], returning `true` if the entry is
/// still "in transit" and unsafe to copy yet: either its size/mtime were
/// still changing at the end of the probe, or it can't currently be
/// opened for a shared read.
pub fn is_entry_in_transit(path: &Path) -> bool {
    let before = match fingerprint(path) {
        Some(f) => f,
        None => return false,
    };
    sleep(SETTLE_WINDOW);
    let after = match fingerprint(path) {
        Some(f) => f,
        None => return false,
    };
    if before != after {
        return true;
    }
    !can_open_for_read(path)
}
