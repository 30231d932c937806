//! Error taxonomy for the mirroring daemon.
//!
//! Error codes follow the pattern: SFCT-{CATEGORY}-{3-digit number}
//!
//! Categories:
//! - IO:  filesystem access failures (copy, remove, rename, stat)
//! - CFG: script/job configuration failures (tokenizer, validator)
//! - WCH: watcher subscription failures
//! - INT: integrity failures requiring a recovery sweep
//!
//! Each code is stable and should not be reused.

use std::fmt;
use std::path::PathBuf;

/// Symbol-stable error codes, grepable across log files and releases.
pub const SFCT_IO_001_NOT_A_FILE: &str = "SFCT-IO-001";
pub const SFCT_IO_002_PERMISSION_DENIED: &str = "SFCT-IO-002";
pub const SFCT_IO_003_NOT_FOUND: &str = "SFCT-IO-003";
pub const SFCT_IO_004_RENAME_FAILED: &str = "SFCT-IO-004";
pub const SFCT_CFG_001_MISSING_SCRIPT: &str = "SFCT-CFG-001";
pub const SFCT_CFG_002_PARSE_ERROR: &str = "SFCT-CFG-002";
pub const SFCT_CFG_003_INVALID_COMBINATION: &str = "SFCT-CFG-003";
pub const SFCT_CFG_004_BAD_ROOT: &str = "SFCT-CFG-004";
pub const SFCT_WCH_001_SUBSCRIBE_FAILED: &str = "SFCT-WCH-001";
pub const SFCT_WCH_002_BUFFER_OVERFLOW: &str = "SFCT-WCH-002";
pub const SFCT_INT_001_RENAME_PAIR_BROKEN: &str = "SFCT-INT-001";
pub const SFCT_INT_002_PARTIAL_REMOVE: &str = "SFCT-INT-002";

/// The four error kinds named in the processor's error handling policy.
///
/// Each kind carries its own recovery policy: `Transient` retries,
/// `Integrity` triggers a recovery sweep, `Invariant` disables the
/// affected job, `Programmer` drops the event and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transient,
    Integrity,
    Invariant,
    Programmer,
}

impl ErrorKind {
    pub fn severity(&self) -> crate::logger::Severity {
        use crate::logger::Severity;
        match self {
            ErrorKind::Transient => Severity::Debug,
            ErrorKind::Integrity => Severity::Warning,
            ErrorKind::Invariant => Severity::Fatal,
            ErrorKind::Programmer => Severity::Fatal,
        }
    }
}

/// Errors surfaced by the path & copy primitives (§4.A) and the watcher.
#[derive(Debug, thiserror::Error)]
pub enum SfctError {
    #[error("[{0}] not a regular file: {1}")]
    NotAFile(&'static str, PathBuf),

    #[error("[{0}] permission denied: {1}")]
    PermissionDenied(&'static str, PathBuf),

    #[error("[{0}] path not found: {1}")]
    NotFound(&'static str, PathBuf),

    #[error("[{0}] io error on {1}: {2}")]
    Io(&'static str, PathBuf, #[source] std::io::Error),

    #[error("[{0}] rename failed: {1} -> {2}")]
    RenameFailed(&'static str, PathBuf, PathBuf),

    #[error("[{0}] missing script file: {1}")]
    MissingScript(&'static str, PathBuf),

    #[error("[{0}] script parse error at line {1}: {2}")]
    ScriptParse(&'static str, usize, String),

    #[error("[{0}] invalid flag combination for `{1}`")]
    InvalidCombination(&'static str, String),

    #[error("[{0}] source/destination root invalid: {1}")]
    BadRoot(&'static str, PathBuf),

    #[error("[{0}] watcher subscription failed for {1}: {2}")]
    WatchSubscribe(&'static str, PathBuf, String),
}

impl SfctError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SfctError::NotAFile(..) => ErrorKind::Programmer,
            SfctError::PermissionDenied(..) => ErrorKind::Transient,
            SfctError::NotFound(..) => ErrorKind::Transient,
            SfctError::Io(..) => ErrorKind::Transient,
            SfctError::RenameFailed(..) => ErrorKind::Integrity,
            SfctError::MissingScript(..) => ErrorKind::Invariant,
            SfctError::ScriptParse(..) => ErrorKind::Programmer,
            SfctError::InvalidCombination(..) => ErrorKind::Programmer,
            SfctError::BadRoot(..) => ErrorKind::Invariant,
            SfctError::WatchSubscribe(..) => ErrorKind::Invariant,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            SfctError::NotAFile(c, ..) => c,
            SfctError::PermissionDenied(c, ..) => c,
            SfctError::NotFound(c, ..) => c,
            SfctError::Io(c, ..) => c,
            SfctError::RenameFailed(c, ..) => c,
            SfctError::MissingScript(c, ..) => c,
            SfctError::ScriptParse(c, ..) => c,
            SfctError::InvalidCombination(c, ..) => c,
            SfctError::BadRoot(c, ..) => c,
            SfctError::WatchSubscribe(c, ..) => c,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Transient => "transient",
            ErrorKind::Integrity => "integrity",
            ErrorKind::Invariant => "invariant",
            ErrorKind::Programmer => "programmer",
        };
        write!(f, "{}", s)
    }
}

pub type Result<T> = std::result::Result<T, SfctError>;
