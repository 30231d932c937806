//! Bulk copy mode: one-shot synchronous tree copy, outside the
//! watch/debounce/processor pipeline entirely.
//!
//! Grounded in the original `directory_copy.cpp` (the plain recursive walk
//! + per-entry copy) and `FastFileCopy.cpp` (the `-fast` variant, which
//! skips the quiescence probe and per-file existence checks in exchange
//! for throughput — safe only when the caller knows the source tree is
//! not being concurrently written).

use std::time::Instant;

use serde::Serialize;

use crate::config::BulkCopyJob;
use crate::error::{Result, SfctError};
use crate::fsops;
use crate::quiescence::is_entry_in_transit;

/// Summary of a completed bulk copy, reported back to the console/CLI.
/// `Serialize` backs the CLI's `--json` report output.
#[derive(Debug, Default, Serialize)]
pub struct CopyReport {
    pub files_copied: u64,
    pub dirs_created: u64,
    pub files_skipped: u64,
    pub bytes_copied: u64,
    pub elapsed: Option<std::time::Duration>,
}

/// Runs a single `copy`/`fast_copy` job to completion. `-recursive`/`-single`
/// (`job.flags.recursive`) controls whether the walk descends past the top
/// level; `-update`/`-overwrite` are honoured via `copy_file_flagged`
/// (§4.A). `-fast` skips the per-file quiescence probe, trading safety
/// against a concurrently-written source for throughput.
pub fn run(job: &BulkCopyJob) -> Result<CopyReport> {
    let start = Instant::now();
    let mut report = CopyReport::default();

    if !job.src.is_dir() {
        return Err(SfctError::NotFound("SFCT-IO-003", job.src.clone()));
    }

    let mut walker = walkdir::WalkDir::new(&job.src);
    if !job.flags.recursive {
        walker = walker.max_depth(1);
    }

    for entry in walker.into_iter().filter_map(|e| e.ok()) {
        let src_path = entry.path();
        if src_path == job.src {
            continue;
        }
        let dst_path = fsops::mirrored_path(&job.src, &job.dst, src_path)?;

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&dst_path).map_err(|e| SfctError::Io("SFCT-IO-009", dst_path.clone(), e))?;
            report.dirs_created += 1;
            continue;
        }

        if !job.fast && is_entry_in_transit(src_path) {
            report.files_skipped += 1;
            continue;
        }

        if entry.file_type().is_symlink() {
            #[cfg(unix)]
            fsops::copy_symlink(src_path, &dst_path)?;
            report.files_copied += 1;
            continue;
        }

        match fsops::copy_file_flagged(src_path, &dst_path, job.flags)? {
            Some(bytes) => {
                report.bytes_copied += bytes;
                report.files_copied += 1;
            }
            None => report.files_skipped += 1,
        }
    }

    report.elapsed = Some(start.elapsed());
    Ok(report)
}
