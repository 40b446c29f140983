use std::fs;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use crate::cli::BenchArgs;
use crate::util::{utc_compact_string, write_json_pretty};

use super::harness::BenchmarkHarness;

pub fn run(args: BenchArgs) -> Result<()> {
    let started_ts = Utc::now();

    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    info!(input = %args.input.display(), "starting benchmark");

    let harness = BenchmarkHarness::new(args.checkpoint_interval);
    let report = harness.run(&args.input.display().to_string(), &text)?;

    let report_path = args.report_path.clone().unwrap_or_else(|| {
        args.cache_root.join("manifests").join(format!(
            "benchmark_report_{}.json",
            utc_compact_string(started_ts)
        ))
    });
    write_json_pretty(&report_path, &report)?;

    info!(path = %report_path.display(), "wrote benchmark report");
    info!(
        total_lines = report.statistics.total_lines,
        duration_ms = report.duration_ms,
        lines_per_second = format!("{:.0}", report.metrics.lines_per_second),
        bytes_per_line = format!("{:.0}", report.metrics.bytes_per_line),
        success_rate = format!("{:.2}", report.metrics.success_rate_percent),
        speed = %report.grades.speed,
        memory = %report.grades.memory,
        accuracy = %report.grades.accuracy,
        overall = %report.grades.overall,
        "benchmark completed"
    );

    Ok(())
}
