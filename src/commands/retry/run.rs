use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::info;

use crate::cli::RetryArgs;
use crate::commands::import::{SqliteStore, read_error_report};
use crate::util::{utc_compact_string, write_json_pretty};

use super::handler::{RetryHandler, RetryPolicy, ThreadSleeper};

pub fn run(args: RetryArgs) -> Result<()> {
    let started_ts = Utc::now();
    let manifest_dir = args.cache_root.join("manifests");

    let error_report_path = match args.error_report_path.clone() {
        Some(path) => path,
        None => latest_error_report(&manifest_dir)?,
    };

    let records = read_error_report(&error_report_path)?;
    info!(
        path = %error_report_path.display(),
        records = records.len(),
        "loaded error report"
    );

    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| args.cache_root.join("regbook.sqlite"));
    let mut store = SqliteStore::open(&db_path)?;

    let policy = RetryPolicy {
        max_attempts: args.max_attempts,
        base_delay_secs: args.base_delay_secs,
    };
    let sleeper = ThreadSleeper;

    let mut handler = RetryHandler::new(&mut store, policy, &sleeper)?;
    handler.process_to_exhaustion(records);
    let report = handler.into_report();

    let report_path = args.retry_report_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!(
            "retry_report_{}.json",
            utc_compact_string(started_ts)
        ))
    });
    write_json_pretty(&report_path, &report)?;

    info!(path = %report_path.display(), "wrote retry report");
    info!(
        total_retries = report.retry_stats.total_retries,
        successful = report.retry_stats.successful_retries,
        failed = report.retry_stats.failed_retries,
        permanent = report.retry_stats.permanent_failures,
        "retry completed"
    );

    Ok(())
}

/// Error report filenames embed a sortable UTC stamp, so the lexicographic
/// maximum is the most recent run.
fn latest_error_report(manifest_dir: &Path) -> Result<PathBuf> {
    let entries = fs::read_dir(manifest_dir)
        .with_context(|| format!("failed to read {}", manifest_dir.display()))?;

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| {
                    name.starts_with("import_errors_") && name.ends_with(".tsv")
                })
        })
        .collect();
    candidates.sort();

    match candidates.pop() {
        Some(path) => Ok(path),
        None => bail!(
            "no error report found under {}; pass --error-report-path",
            manifest_dir.display()
        ),
    }
}
