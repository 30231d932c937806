//! Supervisor: wires a watcher, debounce timer, and processor together for
//! each configured job, and owns the shutdown signal shared across all of
//! them.
//!
//! Grounded in `watch_cmd.rs`'s `run_watch()` for the `Arc<AtomicBool>`
//! shutdown flag plumbed through `signal-hook`, and in the original
//! `DirectorySignal::monitor()` loop for the per-job thread shape (one
//! watcher + one debounce timer + one processor per mirrored tree).

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;

use crate::config::Job;
use crate::error::Result;
use crate::logger::{LogRecord, Logger, Severity};
use crate::processor::Processor;
use crate::queue::EventQueue;
use crate::watcher::{FileSystemWatcher, WatcherConfig};

/// Default period between recovery sweeps, independent of debounce timing.
pub const RECOVERY_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Named thread handles for one job, joined in the ordered teardown
/// sequence mandated by §4.G: stop Watchers, `drain_and_stop` the queue,
/// join the Processor, join the timer.
pub struct JobHandles {
    pub job_name: String,
    queue: EventQueue,
    shutdown: Arc<AtomicBool>,
    watcher: JoinHandle<()>,
    timer: JoinHandle<()>,
    processor: JoinHandle<()>,
}

/// Starts watcher + debounce-timer + processor threads for a single job
/// and returns a handle the caller can join after shutdown is signaled.
pub fn spawn_job(job: Job, shutdown: Arc<AtomicBool>, logger: Arc<Logger>) -> Result<JobHandles> {
    let watcher_config = WatcherConfig { root: job.src.clone(), recursive: job.recursive };
    let watcher = FileSystemWatcher::new(&watcher_config)?;
    let queue = EventQueue::with_sync(job.src.clone(), job.dst.clone(), job.debounce_window, job.retry_backoff, job.sync);

    let watcher_handle = {
        let queue = queue.clone();
        let shutdown = shutdown.clone();
        std::thread::spawn(move || {
            while !shutdown.load(Ordering::SeqCst) {
                match watcher.pump_once(&queue, Duration::from_millis(200)) {
                    Ok(true) => continue,
                    Ok(false) => break,
                    Err(_) => break,
                }
            }
        })
    };

    let timer_handle = {
        let queue = queue.clone();
        std::thread::spawn(move || {
            queue.run_debounce_timer();
        })
    };

    let processor_handle = {
        let queue = queue.clone();
        let src = job.src.clone();
        let dst = job.dst.clone();
        let copy_flags = job.copy_flags;
        let sync = job.sync;
        let job_name = job.name.clone();
        let logger = logger.clone();
        std::thread::spawn(move || {
            let mut processor = Processor::with_flags(src, dst, copy_flags, sync, logger.clone());
            // Startup drift may have accumulated while the daemon was not
            // running; treat it the same as a watcher BufferOverflow (§5:
            // "will re-sync on next start via the BufferOverflow-style
            // initial diff").
            processor.full_diff_sweep(&queue);
            let mut last_sweep = std::time::Instant::now();
            while !queue.is_shutting_down() || !queue.is_empty() {
                // A BufferOverflow takes priority over the periodic sweep:
                // it means events were actually lost, not just due for a
                // routine re-check (§4.F / DESIGN.md open question 2 — one
                // scheduled recovery mechanism, triggered early on overflow).
                if queue.take_overflow() {
                    logger.log(LogRecord {
                        severity: Severity::Warning,
                        file: file!(),
                        line: line!(),
                        function: "spawn_job".into(),
                        message: format!("job '{job_name}': the monitoring buffer has overflowed, running a full diff sweep"),
                    });
                    processor.full_diff_sweep(&queue);
                    last_sweep = std::time::Instant::now();
                }
                processor.run_once(&queue, Duration::from_millis(200));
                if last_sweep.elapsed() >= RECOVERY_SWEEP_INTERVAL {
                    processor.recovery_sweep(&queue);
                    last_sweep = std::time::Instant::now();
                }
                if queue.is_shutting_down() && queue.is_empty() {
                    break;
                }
            }
        })
    };

    Ok(JobHandles {
        job_name: job.name.clone(),
        queue,
        shutdown,
        watcher: watcher_handle,
        timer: timer_handle,
        processor: processor_handle,
    })
}

impl JobHandles {
    /// Ordered teardown (§4.G): (a) stop Watchers, (b) `drain_and_stop`
    /// the queue, (c) join the Processor, (d) join the timer.
    pub fn join(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.watcher.join();
        self.queue.drain_and_stop();
        let _ = self.processor.join();
        let _ = self.timer.join();
    }
}

/// Installs SIGINT/SIGTERM handlers that flip a shared `AtomicBool`,
/// the same flag shape `watch_cmd.rs` used around `run_watch_pipeline`.
pub fn install_shutdown_signal() -> Result<Arc<AtomicBool>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    flag::register(SIGINT, shutdown.clone())
        .map_err(|e| crate::error::SfctError::WatchSubscribe("SFCT-WCH-001", PathBuf::from("SIGINT"), e.to_string()))?;
    flag::register(SIGTERM, shutdown.clone())
        .map_err(|e| crate::error::SfctError::WatchSubscribe("SFCT-WCH-001", PathBuf::from("SIGTERM"), e.to_string()))?;
    Ok(shutdown)
}

/// Runs every configured job until `shutdown` is set, then waits for all
/// job threads to drain their queues and exit.
pub fn run_all(jobs: Vec<Job>, shutdown: Arc<AtomicBool>, logger: Arc<Logger>) -> Result<()> {
    let mut handles = Vec::new();
    for job in jobs {
        handles.push(spawn_job(job, shutdown.clone(), logger.clone())?);
    }
    for handle in handles {
        handle.join();
    }
    Ok(())
}
