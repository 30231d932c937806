//! Structured logging sink.
//!
//! Writes to an `Applog.txt` file using a fixed line format, mirroring
//! the original project's hand-rolled logger rather than pulling in a
//! generic logging facade: the line format is part of the external
//! contract (tooling greps it) and doesn't map onto `log`/`tracing`
//! output cleanly.
//!
//! Format:
//! `[yyyy-mm-dd HH:MM:SS.ffffff][SEVERITY]File: <file> Line: <line> Function: <function> Message: <message>`

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Fatal,
}

impl Severity {
    fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Fatal => "FATAL",
        }
    }
}

/// A single structured log line, captured with the caller's location.
pub struct LogRecord {
    pub severity: Severity,
    pub file: &'static str,
    pub line: u32,
    pub function: String,
    pub message: String,
}

impl LogRecord {
    pub fn format(&self) -> String {
        let now = Local::now();
        format!(
            "[{}][{}]File: {} Line: {} Function: {} Message: {}",
            now.format("%Y-%m-%d %H:%M:%S%.6f"),
            self.severity.as_str(),
            self.file,
            self.line,
            self.function,
            self.message,
        )
    }
}

/// Sink backed by a single append-only file, guarded by a mutex the
/// way the original logger guarded its `ofstream` with a global lock.
pub struct Logger {
    file: Mutex<File>,
    min_severity: Severity,
}

impl Logger {
    pub fn open(path: &Path, min_severity: Severity) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Logger {
            file: Mutex::new(file),
            min_severity,
        })
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from("Applog.txt")
    }

    pub fn log(&self, record: LogRecord) {
        if record.severity < self.min_severity {
            return;
        }
        let line = record.format();
        let mut guard = match self.file.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Best-effort: a failing log write must never take down the daemon.
        let _ = writeln!(guard, "{line}");
        let _ = guard.flush();
    }
}

/// Emits a [`LogRecord`] at the caller's source location.
#[macro_export]
macro_rules! log_record {
    ($logger:expr, $severity:expr, $($arg:tt)*) => {{
        $logger.log($crate::logger::LogRecord {
            severity: $severity,
            file: file!(),
            line: line!(),
            function: {
                fn f() {}
                fn type_name_of<T>(_: T) -> &'static str { std::any::type_name::<T>() }
                let name = type_name_of(f);
                name.strip_suffix("::f").unwrap_or(name).to_string()
            },
            message: format!($($arg)*),
        });
    }};
}
