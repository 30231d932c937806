//! Console status line: a single live-updating line showing per-job
//! throughput while the daemon runs in the foreground.
//!
//! Grounded in the original `ConsoleTM.cpp`'s single-line terminal
//! repaint loop. The teacher repo already depends on `indicatif` but
//! never uses it; this is where that dependency earns its place rather
//! than sitting dormant.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// One status line per monitored job, grouped under a shared draw target
/// so updates don't scroll the terminal.
pub struct StatusLine {
    bar: ProgressBar,
}

impl StatusLine {
    pub fn new(multi: &indicatif::MultiProgress, job_name: &str) -> Self {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix(job_name.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));
        StatusLine { bar }
    }

    pub fn set_message(&self, message: impl Into<String>) {
        self.bar.set_message(message.into());
    }

    pub fn finish(&self, message: impl Into<String>) {
        self.bar.finish_with_message(message.into());
    }
}

/// Owns every job's status line for the lifetime of a `monitor` run.
pub struct Console {
    multi: Arc<indicatif::MultiProgress>,
}

impl Console {
    pub fn new() -> Self {
        Console { multi: Arc::new(indicatif::MultiProgress::new()) }
    }

    pub fn add_job(&self, job_name: &str) -> StatusLine {
        StatusLine::new(&self.multi, job_name)
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}
