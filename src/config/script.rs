//! Tokenizer and parser for `sfct_list.txt`.
//!
//! Grammar:
//! ```text
//! script     := statement*
//! statement  := command flag* '{' field* '}'
//! command    := "monitor" | "copy" | "fast_copy" | "benchmark"
//! flag       := "-recursive" | "-single" | "-update" | "-overwrite"
//!             | "-sync" | "-sync_add" | "-create" | "-4k" | "-fast"
//! field      := ("src" | "dst") path ';'
//! ```
//!
//! Grounded in the original `args.hpp`'s enum-classified lookup maps
//! (`args_maps::Find()` returning an `optional<variant<command, copy, ...>>`):
//! tokens are classified against static tables the same way, rather than
//! hand-matching strings inline at every call site. Flag vocabulary and
//! the validated-combination table follow `args.hpp`'s `copy`/`monitor`
//! enums and this spec's §6 exactly: `copy`/`fast_copy` accept
//! `{recursive|single} x {update|overwrite}`; `monitor` additionally
//! accepts `{sync|sync_add}`; `benchmark` accepts any subset of
//! `{create, 4k, fast}`.

use std::path::PathBuf;

use crate::config::{BenchmarkFlags, BenchmarkJob, BulkCopyJob, CopyFlags, Job, RunPlan};
use crate::error::{Result, SfctError, SFCT_CFG_002_PARSE_ERROR, SFCT_CFG_003_INVALID_COMBINATION};
use crate::logger::{LogRecord, Logger, Severity};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Command(Command),
    Flag(String),
    Keyword(Keyword),
    Path(String),
    LBrace,
    RBrace,
    Semicolon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Monitor,
    Copy,
    FastCopy,
    Benchmark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keyword {
    Src,
    Dst,
}

fn classify_word(word: &str) -> Token {
    match word {
        "monitor" => Token::Command(Command::Monitor),
        "copy" => Token::Command(Command::Copy),
        "fast_copy" => Token::Command(Command::FastCopy),
        "benchmark" => Token::Command(Command::Benchmark),
        "src" => Token::Keyword(Keyword::Src),
        "dst" => Token::Keyword(Keyword::Dst),
        w if w.starts_with('-') => Token::Flag(w.trim_start_matches('-').to_string()),
        other => Token::Path(other.to_string()),
    }
}

/// Splits `source` into tokens, one pass, no backtracking. Comments begin
/// with `#` and run to end of line.
fn tokenize(source: &str) -> Vec<(Token, usize)> {
    let mut tokens = Vec::new();
    for (line_no, line) in source.lines().enumerate() {
        let line = match line.split_once('#') {
            Some((before, _)) => before,
            None => line,
        };
        for raw in split_statement_line(line) {
            match raw.as_str() {
                "{" => tokens.push((Token::LBrace, line_no + 1)),
                "}" => tokens.push((Token::RBrace, line_no + 1)),
                ";" => tokens.push((Token::Semicolon, line_no + 1)),
                word => tokens.push((classify_word(word), line_no + 1)),
            }
        }
    }
    tokens
}

/// Splits a line into words while keeping `{`, `}`, and `;` as standalone
/// tokens even when glued to adjacent text (`dst /path;`).
fn split_statement_line(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    for ch in line.chars() {
        match ch {
            '{' | '}' | ';' => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
                words.push(ch.to_string());
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn parse_err(line: usize, msg: &str) -> SfctError {
    SfctError::ScriptParse(SFCT_CFG_002_PARSE_ERROR, line, msg.to_string())
}

/// Returns the token at `i`, or a parse error pointing at the last known
/// line if the document ended mid-statement.
fn at<'a>(tokens: &'a [(Token, usize)], i: usize) -> Result<&'a (Token, usize)> {
    tokens.get(i).ok_or_else(|| {
        let last_line = tokens.last().map(|(_, l)| *l).unwrap_or(1);
        parse_err(last_line, "unexpected end of script")
    })
}

/// The recognized flag set, classified the way `args_maps::Find` would
/// (a static lookup, not inline string matching scattered through the
/// validator).
#[derive(Debug, Default)]
struct FlagSet {
    recursive: bool,
    single: bool,
    update: bool,
    overwrite: bool,
    sync: bool,
    sync_add: bool,
    create: bool,
    four_k: bool,
    fast: bool,
    unknown: Vec<String>,
}

impl FlagSet {
    fn collect(flags: &[String]) -> Self {
        let mut set = FlagSet::default();
        for f in flags {
            match f.as_str() {
                "recursive" => set.recursive = true,
                "single" => set.single = true,
                "update" => set.update = true,
                "overwrite" => set.overwrite = true,
                "sync" => set.sync = true,
                "sync_add" => set.sync_add = true,
                "create" => set.create = true,
                "4k" => set.four_k = true,
                "fast" => set.fast = true,
                other => set.unknown.push(other.to_string()),
            }
        }
        set
    }
}

/// Validates the `{recursive|single} x {update|overwrite}` combination
/// shared by `copy`, `fast_copy`, and `monitor`, per §6's combination
/// table.
fn validate_copy_combination(set: &FlagSet) -> Result<()> {
    if let Some(bad) = set.unknown.first() {
        return Err(SfctError::InvalidCombination(SFCT_CFG_003_INVALID_COMBINATION, format!("unrecognized flag `-{bad}`")));
    }
    if set.recursive && set.single {
        return Err(SfctError::InvalidCombination(SFCT_CFG_003_INVALID_COMBINATION, "-recursive with -single".into()));
    }
    if set.update && set.overwrite {
        return Err(SfctError::InvalidCombination(SFCT_CFG_003_INVALID_COMBINATION, "-update with -overwrite".into()));
    }
    if set.sync && set.sync_add {
        return Err(SfctError::InvalidCombination(SFCT_CFG_003_INVALID_COMBINATION, "-sync with -sync_add".into()));
    }
    if set.create || set.four_k || set.fast {
        return Err(SfctError::InvalidCombination(SFCT_CFG_003_INVALID_COMBINATION, "benchmark-only flag on a copy/monitor statement".into()));
    }
    Ok(())
}

fn validate_benchmark_combination(set: &FlagSet) -> Result<()> {
    if let Some(bad) = set.unknown.first() {
        return Err(SfctError::InvalidCombination(SFCT_CFG_003_INVALID_COMBINATION, format!("unrecognized flag `-{bad}`")));
    }
    if set.recursive || set.single || set.update || set.overwrite || set.sync || set.sync_add {
        return Err(SfctError::InvalidCombination(SFCT_CFG_003_INVALID_COMBINATION, "copy/monitor-only flag on a benchmark statement".into()));
    }
    Ok(())
}

/// Advances `i` to the next top-level `Command` token (or the end of the
/// document), so that one malformed block doesn't take the rest of the
/// script down with it. The caller has already consumed at least the
/// failed block's own command token, so this never returns without
/// making progress.
fn skip_to_next_command(tokens: &[(Token, usize)], i: &mut usize) {
    while *i < tokens.len() {
        if matches!(tokens[*i].0, Token::Command(_)) {
            return;
        }
        *i += 1;
    }
}

/// Parses the single statement starting at `*i` (which must be a
/// `Command` token), advancing `*i` past it and pushing the resulting job
/// onto `plan`. On success, `*i` points just past the closing `}`. On
/// failure, `*i` may be left anywhere inside the broken block — the
/// caller is responsible for resynchronizing with [`skip_to_next_command`].
fn parse_statement(tokens: &[(Token, usize)], i: &mut usize, anon_counter: &mut usize, plan: &mut RunPlan) -> Result<()> {
    let (command, line) = match at(tokens, *i)? {
        (Token::Command(c), line) => (*c, *line),
        (_, line) => return Err(parse_err(*line, "expected a command (monitor/copy/fast_copy/benchmark)")),
    };
    *i += 1;

    let mut flag_tokens = Vec::new();
    while let (Token::Flag(f), _) = at(tokens, *i)? {
        flag_tokens.push(f.clone());
        *i += 1;
    }
    let flags = FlagSet::collect(&flag_tokens);

    match at(tokens, *i)? {
        (Token::LBrace, _) => *i += 1,
        (_, line) => return Err(parse_err(*line, "expected `{`")),
    }

    let mut src: Option<PathBuf> = None;
    let mut dst: Option<PathBuf> = None;
    loop {
        match at(tokens, *i)? {
            (Token::RBrace, _) => {
                *i += 1;
                break;
            }
            (Token::Keyword(kw), kw_line) => {
                let kw = *kw;
                let kw_line = *kw_line;
                *i += 1;
                let path = match at(tokens, *i)? {
                    (Token::Path(p), _) => p.clone(),
                    (_, line) => return Err(parse_err(*line, "expected a path")),
                };
                *i += 1;
                if let (Token::Semicolon, _) = at(tokens, *i)? {
                    *i += 1;
                } else {
                    return Err(parse_err(kw_line, "expected `;` after path"));
                }
                match kw {
                    Keyword::Src => src = Some(PathBuf::from(path)),
                    Keyword::Dst => dst = Some(PathBuf::from(path)),
                }
            }
            (_, line) => return Err(parse_err(*line, "expected `src`, `dst`, or `}`")),
        }
    }

    let (Some(src), Some(dst)) = (src, dst) else {
        return Err(parse_err(line, "statement is missing `src` or `dst`"));
    };

    *anon_counter += 1;
    let name = format!("job-{anon_counter}");

    match command {
        Command::Monitor => {
            validate_copy_combination(&flags)?;
            let mut job = Job::new(name, src, dst);
            job.recursive = !flags.single;
            job.sync = flags.sync;
            job.copy_flags = CopyFlags {
                recursive: job.recursive,
                update_existing: flags.update,
                overwrite_existing: flags.overwrite,
            };
            plan.monitor_jobs.push(job);
        }
        Command::Copy | Command::FastCopy => {
            validate_copy_combination(&flags)?;
            let copy_flags = CopyFlags {
                recursive: !flags.single,
                update_existing: flags.update,
                overwrite_existing: flags.overwrite,
            };
            plan.copy_jobs.push(BulkCopyJob {
                name,
                fast: matches!(command, Command::FastCopy),
                flags: copy_flags,
                src,
                dst,
            });
        }
        Command::Benchmark => {
            validate_benchmark_combination(&flags)?;
            let bench_flags = BenchmarkFlags {
                create: flags.create,
                four_k: flags.four_k,
                fast: flags.fast,
            };
            plan.benchmark_jobs.push(BenchmarkJob { name, flags: bench_flags, src, dst });
        }
    }
    Ok(())
}

/// Parses a full `sfct_list.txt` document into a [`RunPlan`].
///
/// A malformed block (a missing `;`, a bad flag combination, a dangling
/// `src` with no `dst`, ...) invalidates only that block: the error is
/// logged and the tokenizer resumes at the next top-level command
/// keyword, so one typo doesn't take down every other job in the file.
/// The whole document only fails to parse if it yields zero valid jobs
/// across all three job kinds.
pub fn parse(source: &str, logger: &Logger) -> Result<RunPlan> {
    let tokens = tokenize(source);
    let mut plan = RunPlan::default();
    let mut i = 0;
    let mut anon_counter = 0usize;

    while i < tokens.len() {
        if !matches!(tokens[i].0, Token::Command(_)) {
            let line = tokens[i].1;
            log_skipped_block(logger, parse_err(line, "expected a command (monitor/copy/fast_copy/benchmark)"));
            skip_to_next_command(&tokens, &mut i);
            continue;
        }
        if let Err(e) = parse_statement(&tokens, &mut i, &mut anon_counter, &mut plan) {
            log_skipped_block(logger, e);
            skip_to_next_command(&tokens, &mut i);
        }
    }

    if plan.monitor_jobs.is_empty() && plan.copy_jobs.is_empty() && plan.benchmark_jobs.is_empty() {
        return Err(parse_err(tokens.last().map(|(_, l)| *l).unwrap_or(1), "no valid job blocks in script"));
    }
    Ok(plan)
}

fn log_skipped_block(logger: &Logger, err: SfctError) {
    logger.log(LogRecord {
        severity: Severity::Warning,
        file: file!(),
        line: line!(),
        function: "config::script::parse".into(),
        message: format!("dropping malformed block: {err}"),
    });
}
