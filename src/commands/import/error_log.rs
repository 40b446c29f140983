use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::model::ImportErrorRecord;
use crate::util::ensure_directory;

const HEADER: &str = "type\ttimestamp\terrors\tdata";
const ERROR_SEPARATOR: &str = " | ";

/// Writes failures as one tab-delimited record per line for offline triage
/// and the retry command. `data` is compact JSON, so it never carries raw
/// tabs or newlines.
pub fn write_error_report(path: &Path, records: &[ImportErrorRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let mut file = File::create(path)
        .with_context(|| format!("failed to create error report: {}", path.display()))?;
    writeln!(file, "{HEADER}")
        .with_context(|| format!("failed to write error report: {}", path.display()))?;

    for record in records {
        let errors = record
            .errors
            .iter()
            .map(|message| scrub_delimiters(message))
            .collect::<Vec<_>>()
            .join(ERROR_SEPARATOR);
        let data = serde_json::to_string(&record.data)
            .context("failed to serialize error record data")?;

        writeln!(
            file,
            "{}\t{}\t{}\t{}",
            scrub_delimiters(&record.record_type),
            record.timestamp,
            errors,
            data
        )
        .with_context(|| format!("failed to write error report: {}", path.display()))?;
    }

    Ok(())
}

pub fn read_error_report(path: &Path) -> Result<Vec<ImportErrorRecord>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read error report: {}", path.display()))?;

    let mut records = Vec::new();
    for (index, line) in raw.lines().enumerate() {
        if index == 0 {
            if line != HEADER {
                bail!(
                    "unexpected error report header in {}: {line}",
                    path.display()
                );
            }
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }

        let mut fields = line.splitn(4, '\t');
        let (Some(record_type), Some(timestamp), Some(errors), Some(data)) = (
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
        ) else {
            bail!(
                "malformed error report line {} in {}",
                index + 1,
                path.display()
            );
        };

        let data = serde_json::from_str(data).with_context(|| {
            format!(
                "failed to parse error record data on line {} in {}",
                index + 1,
                path.display()
            )
        })?;

        records.push(ImportErrorRecord {
            record_type: record_type.to_string(),
            timestamp: timestamp.to_string(),
            errors: errors
                .split(ERROR_SEPARATOR)
                .filter(|message| !message.is_empty())
                .map(ToOwned::to_owned)
                .collect(),
            data,
        });
    }

    Ok(records)
}

fn scrub_delimiters(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}
