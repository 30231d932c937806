//! CLI argument parsing for sfct.
//!
//! The daemon's primary mode takes no arguments at all: it looks for
//! `sfct_list.txt` in the current directory and runs every statement in
//! it. A handful of flags exist to override the script path or force a
//! single-shot mode for scripting contexts (cron, CI).

use std::path::PathBuf;

use anyhow::{anyhow, Result};

#[derive(Debug, Clone)]
pub struct Args {
    pub script_path: PathBuf,
    pub dry_run: bool,
    pub log_path: PathBuf,
    /// Print `copy`/`fast_copy`/`benchmark` reports as JSON instead of a
    /// human-readable line, for scripting contexts (cron, CI).
    pub json: bool,
}

pub fn print_usage() {
    eprintln!("sfct - deterministic directory mirroring daemon");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  sfct                         run every job in ./sfct_list.txt");
    eprintln!("  sfct --script <PATH>         run every job in PATH instead");
    eprintln!("  sfct --log <PATH>            write the structured log to PATH (default ./Applog.txt)");
    eprintln!("  sfct --dry-run               parse and validate the script without running jobs");
    eprintln!("  sfct --json                  print copy/benchmark reports as JSON");
    eprintln!("  sfct --help                  show this message");
}

pub fn parse_args() -> Result<Args> {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    let mut script_path = PathBuf::from("sfct_list.txt");
    let mut log_path = PathBuf::from("Applog.txt");
    let mut dry_run = false;
    let mut json = false;

    let mut i = 0;
    while i < raw.len() {
        match raw[i].as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--script" => {
                i += 1;
                let value = raw.get(i).ok_or_else(|| anyhow!("--script requires a path argument"))?;
                script_path = PathBuf::from(value);
            }
            "--log" => {
                i += 1;
                let value = raw.get(i).ok_or_else(|| anyhow!("--log requires a path argument"))?;
                log_path = PathBuf::from(value);
            }
            "--dry-run" => dry_run = true,
            "--json" => json = true,
            other => return Err(anyhow!("unrecognized argument: {other}")),
        }
        i += 1;
    }

    Ok(Args { script_path, dry_run, log_path, json })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_script_path_is_sfct_list_txt() {
        let args = Args {
            script_path: PathBuf::from("sfct_list.txt"),
            dry_run: false,
            log_path: PathBuf::from("Applog.txt"),
            json: false,
        };
        assert_eq!(args.script_path, PathBuf::from("sfct_list.txt"));
    }
}
