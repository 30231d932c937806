//! Benchmark mode: measures copy throughput against a scratch source tree.
//!
//! Grounded in the original `benchmark.cpp`'s three knobs: `-create`
//! (generate the scratch file set before timing instead of reusing
//! whatever is already in `src`), `-4k` (many small 4 KiB files, to
//! stress per-file overhead rather than raw bandwidth), and `-fast`
//! (route the timed copy through the fast-copy path instead of the
//! normal quiescence-checked one).

use std::path::Path;
use std::time::Instant;

use serde::Serialize;

use crate::config::{BenchmarkFlags, BenchmarkJob, BulkCopyJob, CopyFlags};
use crate::error::{Result, SfctError};

const FOUR_K: usize = 4 * 1024;
const DEFAULT_FILE_SIZE: usize = 1024 * 1024;
const DEFAULT_FILE_COUNT: usize = 64;

#[derive(Debug, Serialize)]
pub struct BenchmarkReport {
    pub files_written: u64,
    pub bytes_written: u64,
    pub elapsed: std::time::Duration,
    pub throughput_mb_per_sec: f64,
}

/// Runs a single `benchmark { ... }` job: optionally seeds `src` with
/// generated files, then times a copy from `src` to `dst`.
pub fn run(job: &BenchmarkJob) -> Result<BenchmarkReport> {
    if job.flags.create {
        seed_scratch_tree(&job.src, &job.flags)?;
    }

    let copy_job = BulkCopyJob {
        name: job.name.clone(),
        fast: job.flags.fast,
        flags: CopyFlags { recursive: true, overwrite_existing: true, ..Default::default() },
        src: job.src.clone(),
        dst: job.dst.clone(),
    };

    let start = Instant::now();
    let copy_report = crate::bulk_copy::run(&copy_job)?;
    let elapsed = start.elapsed();

    let secs = elapsed.as_secs_f64().max(1e-9);
    let mb = copy_report.bytes_copied as f64 / (1024.0 * 1024.0);

    Ok(BenchmarkReport {
        files_written: copy_report.files_copied,
        bytes_written: copy_report.bytes_copied,
        elapsed,
        throughput_mb_per_sec: mb / secs,
    })
}

/// Generates the scratch file set under `src`, sized per `-4k` (many
/// small files) or the default (fewer, larger files).
fn seed_scratch_tree(src: &Path, flags: &BenchmarkFlags) -> Result<()> {
    std::fs::create_dir_all(src).map_err(|e| SfctError::Io("SFCT-IO-005", src.to_path_buf(), e))?;

    let (file_size, file_count) = if flags.four_k {
        (FOUR_K, DEFAULT_FILE_COUNT * 16)
    } else {
        (DEFAULT_FILE_SIZE, DEFAULT_FILE_COUNT)
    };

    let payload = vec![0xABu8; file_size];
    for i in 0..file_count {
        let path = src.join(format!("bench_{i:05}.bin"));
        std::fs::write(&path, &payload).map_err(|e| SfctError::Io("SFCT-IO-006", path, e))?;
    }
    Ok(())
}
