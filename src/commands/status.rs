use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::cli::StatusArgs;

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_dir = args.cache_root.join("manifests");
    let db_path = args
        .db_path
        .unwrap_or_else(|| args.cache_root.join("regbook.sqlite"));

    info!(cache_root = %args.cache_root.display(), "status requested");

    if db_path.exists() {
        let connection = Connection::open(&db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?;

        let editions = count_rows(&connection, "SELECT COUNT(*) FROM editions")?;
        let chapters = count_rows(&connection, "SELECT COUNT(*) FROM chapters")?;
        let regulations = count_rows(&connection, "SELECT COUNT(*) FROM regulations")?;
        let articles = count_rows(&connection, "SELECT COUNT(*) FROM articles")?;
        let clauses = count_rows(&connection, "SELECT COUNT(*) FROM clauses")?;
        let schema_version = metadata_value(&connection, "db_schema_version")?;
        let updated_at = metadata_value(&connection, "db_updated_at")?;

        info!(
            db = %db_path.display(),
            schema_version = %schema_version.unwrap_or_default(),
            updated_at = %updated_at.unwrap_or_default(),
            editions,
            chapters,
            regulations,
            articles,
            clauses,
            "store status"
        );
    } else {
        warn!(db = %db_path.display(), "store not found; run import first");
    }

    for prefix in ["import_run_", "retry_report_", "benchmark_report_"] {
        match latest_manifest(&manifest_dir, prefix)? {
            Some(path) => info!(kind = prefix.trim_end_matches('_'), path = %path, "latest manifest"),
            None => info!(kind = prefix.trim_end_matches('_'), "no manifest yet"),
        }
    }

    Ok(())
}

fn count_rows(connection: &Connection, sql: &str) -> Result<i64> {
    let count = connection.query_row(sql, [], |row| row.get(0))?;
    Ok(count)
}

fn metadata_value(connection: &Connection, key: &str) -> Result<Option<String>> {
    use rusqlite::OptionalExtension;

    let value = connection
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

fn latest_manifest(manifest_dir: &Path, prefix: &str) -> Result<Option<String>> {
    let Ok(entries) = fs::read_dir(manifest_dir) else {
        return Ok(None);
    };

    let mut candidates: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str().map(ToOwned::to_owned))
        .filter(|name| name.starts_with(prefix))
        .collect();
    candidates.sort();

    Ok(candidates
        .pop()
        .map(|name| manifest_dir.join(name).display().to_string()))
}
