//! Build metadata, captured by `build.rs` at compile time.

pub const COMMIT_SHA: &str = env!("SFCT_COMMIT_SHA");
pub const BUILD_DATE: &str = env!("SFCT_BUILD_DATE");
pub const RUSTC_VERSION: &str = env!("SFCT_RUSTC_VERSION");
pub const CARGO_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn version_string() -> String {
    format!("sfct {CARGO_VERSION} ({COMMIT_SHA} {BUILD_DATE}, rustc {RUSTC_VERSION})")
}
