use std::fs;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::ParseArgs;
use crate::util::{utc_compact_string, write_json_pretty};

use super::builder::DocumentBuilder;

pub fn run(args: ParseArgs) -> Result<()> {
    let started_ts = Utc::now();

    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    info!(input = %args.input.display(), "starting parse");

    let outcome = DocumentBuilder::parse(&text)?;

    for error in &outcome.errors {
        warn!(
            line = error.line_number,
            state = %error.state,
            message = %error.message,
            "parse error"
        );
    }

    let output = outcome.into_output();

    let output_path = args.output.unwrap_or_else(|| {
        args.cache_root.join("manifests").join(format!(
            "parse_output_{}.json",
            utc_compact_string(started_ts)
        ))
    });
    write_json_pretty(&output_path, &output)?;

    info!(path = %output_path.display(), "wrote parse output");
    info!(
        total_lines = output.statistics.total_lines,
        editions = output.statistics.editions,
        chapters = output.statistics.chapters,
        regulations = output.statistics.regulations,
        articles = output.statistics.articles,
        clauses = output.statistics.clauses,
        skipped_lines = output.statistics.skipped_lines,
        error_lines = output.statistics.error_lines,
        success_rate = output.metadata.success_rate_percent,
        "parse completed"
    );

    Ok(())
}
