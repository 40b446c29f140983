use std::fs;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::ImportArgs;
use crate::commands::parse::DocumentBuilder;
use crate::model::{ImportPaths, ImportRunManifest, ProgressStatus, SourceFileEntry};
use crate::util::{
    ensure_directory, now_utc_string, sha256_file, utc_compact_string, write_json_pretty,
};

use super::error_log::write_error_report;
use super::importer::HierarchicalImporter;
use super::progress::{CancelToken, ProgressSink, ProgressUpdate, TracingProgressSink};
use super::store::{DB_SCHEMA_VERSION, SqliteStore};

pub fn run(args: ImportArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let started = Instant::now();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let sink = TracingProgressSink;
    let cancel = CancelToken::new();

    let cache_root = args.cache_root.clone();
    let manifest_dir = cache_root.join("manifests");
    ensure_directory(&manifest_dir)?;

    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| cache_root.join("regbook.sqlite"));
    let manifest_path = args.import_manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!(
            "import_run_{}.json",
            utc_compact_string(started_ts)
        ))
    });

    info!(input = %args.input.display(), run_id = %run_id, "starting import");
    report(&sink, 0, "import run started", ProgressStatus::Started, started);

    report(
        &sink,
        5,
        "loading source document",
        ProgressStatus::Loading,
        started,
    );
    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let sha256 = sha256_file(&args.input)?;
    let line_count = text.lines().count();

    report(
        &sink,
        10,
        "analyzing document structure",
        ProgressStatus::Analyzing,
        started,
    );

    // Parse phase occupies the 10-60% band; one milestone per 10% of lines.
    let mut builder = DocumentBuilder::new()?;
    let mut next_percent = 10_usize;
    for (index, line) in text.lines().enumerate() {
        builder.feed_line(line);
        if line_count > 0 {
            let done = (index + 1) * 100 / line_count;
            while next_percent <= 100 && done >= next_percent {
                report(
                    &sink,
                    (10 + next_percent / 2) as u8,
                    &format!("parsed {next_percent}% of lines"),
                    ProgressStatus::Parsing,
                    started,
                );
                next_percent += 10;
            }
        }
    }
    let outcome = builder.finish();

    for error in &outcome.errors {
        warn!(
            line = error.line_number,
            state = %error.state,
            message = %error.message,
            "parse error"
        );
    }

    let parse_statistics = outcome.statistics.clone();
    let parse_errors = outcome.errors.len();
    report(
        &sink,
        60,
        &format!(
            "parsing complete: {} editions, {} regulations, {} articles",
            parse_statistics.editions, parse_statistics.regulations, parse_statistics.articles
        ),
        ProgressStatus::ParsingComplete,
        started,
    );

    let document = outcome.arena.to_document();

    let mut store = SqliteStore::open(&db_path)?;
    let output = HierarchicalImporter::new(&mut store)?
        .with_progress(&sink)
        .with_cancellation(cancel.clone())
        .import(&document);

    let error_report_path = if output.errors.is_empty() {
        None
    } else {
        let path = args.error_report_path.clone().unwrap_or_else(|| {
            manifest_dir.join(format!(
                "import_errors_{}.tsv",
                utc_compact_string(started_ts)
            ))
        });
        write_error_report(&path, &output.errors)?;
        warn!(
            path = %path.display(),
            errors = output.errors.len(),
            "wrote error report for retry triage"
        );
        Some(path)
    };

    let status = if !output.success {
        "completed_with_transaction_errors"
    } else if output.total_errors > 0 {
        "completed_with_partial_failures"
    } else {
        "completed"
    };

    let warnings = output
        .errors
        .iter()
        .map(|record| format!("{}: {}", record.record_type, record.errors.join("; ")))
        .collect();

    let manifest = ImportRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        db_schema_version: DB_SCHEMA_VERSION.to_string(),
        status: status.to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: render_import_command(&args),
        source: SourceFileEntry {
            path: args.input.display().to_string(),
            sha256,
            line_count,
        },
        paths: ImportPaths {
            cache_root: cache_root.display().to_string(),
            manifest_dir: manifest_dir.display().to_string(),
            db_path: db_path.display().to_string(),
            error_report_path: error_report_path
                .as_ref()
                .map(|path| path.display().to_string()),
        },
        parse_statistics,
        parse_errors,
        import: output.clone(),
        warnings,
        notes: vec![
            "Import committed one transaction per edition subtree.".to_string(),
            "Failed records can be re-attempted with the retry command.".to_string(),
        ],
    };

    write_json_pretty(&manifest_path, &manifest)?;

    info!(path = %manifest_path.display(), "wrote import run manifest");
    info!(
        success = output.success,
        total_processed = output.total_processed,
        total_errors = output.total_errors,
        status = status,
        "import completed"
    );

    Ok(())
}

fn report(
    sink: &dyn ProgressSink,
    percentage: u8,
    message: &str,
    status: ProgressStatus,
    started: Instant,
) {
    let update = ProgressUpdate {
        percentage,
        message: message.to_string(),
        status,
        elapsed_seconds: started.elapsed().as_secs_f64(),
        data: None,
    };
    if let Err(err) = sink.on_progress(update) {
        warn!(error = %err, "progress sink failed; continuing");
    }
}

fn render_import_command(args: &ImportArgs) -> String {
    let mut command = vec![
        "regbook".to_string(),
        "import".to_string(),
        "--input".to_string(),
        args.input.display().to_string(),
        "--cache-root".to_string(),
        args.cache_root.display().to_string(),
    ];

    if let Some(path) = &args.db_path {
        command.push("--db-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.import_manifest_path {
        command.push("--import-manifest-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.error_report_path {
        command.push("--error-report-path".to_string());
        command.push(path.display().to_string());
    }

    command.join(" ")
}
