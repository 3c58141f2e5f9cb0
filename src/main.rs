use std::fs;
use std::path::Path;
use std::process;

use chrono::{TimeZone, Utc};
use slog::{error, info, Logger};

use cellar::bench::{CommitInfo, Entry};
use cellar::common;
use cellar::config::Config;
use cellar::detect::{self, FindingKind, Status};
use cellar::errors::{Error, Result};
use cellar::extract;
use cellar::history::lock::StoreLock;
use cellar::history::{AppendOutcome, HistoryStore};

mod args;

use args::Command;

pub fn main() {
    let log = common::new_logger();
    let cmd = args::parse_args();

    let code = match run(cmd, &log) {
        Ok(code) => code,
        Err(e) => {
            error!(log, "{}", e);
            exit_code(&e)
        }
    };
    process::exit(code);
}

fn exit_code(e: &Error) -> i32 {
    match e {
        Error::Busy(_) => 3,
        _ => 2,
    }
}

fn run(cmd: Command, log: &Logger) -> Result<i32> {
    match cmd {
        Command::Append {
            group,
            input,
            store,
            commit,
            tool,
            repo_url,
            date,
            lock_retries,
        } => {
            append(
                log,
                &group,
                &input,
                &store,
                &commit,
                &tool,
                &repo_url,
                date,
                lock_retries,
            )?;
            Ok(0)
        }
        Command::Check {
            group,
            store,
            threshold,
            config,
            baseline,
            verbose,
        } => check(
            log,
            &group,
            &store,
            threshold,
            config.as_deref(),
            baseline.as_deref(),
            verbose,
        ),
        Command::Groups { store } => {
            let store = HistoryStore::load(&store)?;
            for name in store.groups() {
                println!("{}", name);
            }
            Ok(0)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn append(
    log: &Logger,
    group: &str,
    input: &Path,
    store_path: &Path,
    commit_path: &Path,
    tool: &str,
    repo_url: &str,
    date: Option<i64>,
    lock_retries: u32,
) -> Result<()> {
    let raw = fs::read_to_string(input).map_err(|e| Error::io(input, e))?;
    let benches = extract::extract(tool, &raw)?;

    let commit_raw = fs::read_to_string(commit_path).map_err(|e| Error::io(commit_path, e))?;
    let commit: CommitInfo =
        serde_json::from_str(&commit_raw).map_err(|e| Error::InvalidCommit(e.to_string()))?;

    let date = match date {
        Some(ms) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| Error::BadInput(format!("date {} out of range", ms)))?,
        None => Utc::now(),
    };
    let entry = Entry::new(commit, date, tool, benches)?;

    // Read-modify-write under the store lock; a failed save leaves the prior
    // snapshot intact and the lock is released on drop either way.
    let _lock = StoreLock::acquire(store_path, lock_retries, log)?;
    let mut store = HistoryStore::load_or_new(store_path, repo_url)?;
    let outcome = store.append(group, entry)?;
    store.save(store_path)?;

    info!(
        log,
        "{} entry in group '{}', now {} entries",
        match outcome {
            AppendOutcome::Appended => "appended",
            AppendOutcome::Replaced => "replaced rerun",
        },
        group,
        store.entries(group)?.len()
    );
    Ok(())
}

fn check(
    log: &Logger,
    group: &str,
    store_path: &Path,
    threshold: Option<f64>,
    config_path: Option<&Path>,
    baseline: Option<&str>,
    verbose: bool,
) -> Result<i32> {
    let mut cfg = match config_path {
        Some(p) => Config::from_file(p)?,
        None => Config::default(),
    };
    if let Some(t) = threshold {
        cfg.regression_threshold = t;
    }

    let store = HistoryStore::load(store_path)?;
    let report = detect::evaluate(store.entries(group)?, baseline, &cfg)?;

    if report.status == Status::InsufficientHistory {
        info!(
            log,
            "fewer than two entries in group '{}', nothing to compare", group
        );
        return Ok(0);
    }

    for finding in &report.findings {
        match finding.kind {
            FindingKind::Regression { .. } => println!("{}", finding),
            _ if verbose => println!("{}", finding),
            _ => {}
        }
    }

    if report.has_regressions() {
        Ok(1)
    } else {
        Ok(0)
    }
}
