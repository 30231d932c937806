//! sfct - deterministic directory mirroring daemon.
//!
//! Reads `sfct_list.txt`, spawns a watcher/debounce/processor pipeline for
//! every `monitor` statement, runs every `copy`/`fast_copy`/`benchmark`
//! statement to completion, and waits for SIGINT/SIGTERM to shut down the
//! monitor jobs cleanly.

mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use sfct::logger::{LogRecord, Logger, Severity};
use sfct::{benchmark, bulk_copy, config, console, supervisor};

fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {e}");
            cli::print_usage();
            return ExitCode::from(1);
        }
    };

    let logger = match Logger::open(&args.log_path, Severity::Info) {
        Ok(l) => Arc::new(l),
        Err(e) => {
            eprintln!("Error: cannot open log file {}: {e}", args.log_path.display());
            return ExitCode::from(1);
        }
    };

    let source = match std::fs::read_to_string(&args.script_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: cannot read script {}: {e}", args.script_path.display());
            return ExitCode::from(1);
        }
    };

    let plan = match config::script::parse(&source, &logger) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(1);
        }
    };

    if args.dry_run {
        println!(
            "ok: {} monitor job(s), {} copy job(s), {} benchmark job(s)",
            plan.monitor_jobs.len(),
            plan.copy_jobs.len(),
            plan.benchmark_jobs.len()
        );
        return ExitCode::SUCCESS;
    }

    let console = console::Console::new();

    for job in &plan.copy_jobs {
        let line = console.add_job(&job.name);
        line.set_message("copying...");
        match bulk_copy::run(job) {
            Ok(report) => {
                line.finish(format!("{} file(s), {} byte(s)", report.files_copied, report.bytes_copied));
                if args.json {
                    if let Ok(json) = serde_json::to_string_pretty(&report) {
                        println!("{json}");
                    }
                }
                logger.log(LogRecord {
                    severity: Severity::Info,
                    file: file!(),
                    line: line!(),
                    function: "main".into(),
                    message: format!("copy job '{}' finished: {:?}", job.name, report),
                });
            }
            Err(e) => {
                line.finish(format!("failed: {e}"));
                logger.log(LogRecord {
                    severity: Severity::Warning,
                    file: file!(),
                    line: line!(),
                    function: "main".into(),
                    message: format!("copy job '{}' failed: {e}", job.name),
                });
            }
        }
    }

    for job in &plan.benchmark_jobs {
        let line = console.add_job(&job.name);
        line.set_message("benchmarking...");
        match benchmark::run(job) {
            Ok(report) => {
                line.finish(format!("{:.2} MB/s", report.throughput_mb_per_sec));
                if args.json {
                    if let Ok(json) = serde_json::to_string_pretty(&report) {
                        println!("{json}");
                    }
                }
                logger.log(LogRecord {
                    severity: Severity::Info,
                    file: file!(),
                    line: line!(),
                    function: "main".into(),
                    message: format!("benchmark job '{}' finished: {:?}", job.name, report),
                });
            }
            Err(e) => {
                line.finish(format!("failed: {e}"));
            }
        }
    }

    if plan.monitor_jobs.is_empty() {
        return ExitCode::SUCCESS;
    }

    let shutdown = match supervisor::install_shutdown_signal() {
        Ok(flag) => flag,
        Err(e) => {
            eprintln!("Error: cannot install shutdown signal handlers: {e}");
            return ExitCode::from(1);
        }
    };

    for job in &plan.monitor_jobs {
        console.add_job(&job.name).set_message("watching");
    }

    if let Err(e) = supervisor::run_all(plan.monitor_jobs, shutdown, logger) {
        eprintln!("Error: {e}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}
