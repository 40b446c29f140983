use std::time::Instant;

use anyhow::Result;

use crate::commands::parse::DocumentBuilder;
use crate::model::{BenchmarkCheckpoint, BenchmarkGrades, BenchmarkMetrics, BenchmarkReport};
use crate::util::now_utc_string;

/// Wraps a parse run with wall-clock and resident-memory sampling.
/// Checkpoints land every `checkpoint_interval` lines and on every newly
/// recorded parse error.
#[derive(Debug)]
pub struct BenchmarkHarness {
    checkpoint_interval: usize,
}

impl BenchmarkHarness {
    pub fn new(checkpoint_interval: usize) -> Self {
        Self {
            checkpoint_interval: checkpoint_interval.max(1),
        }
    }

    pub fn run(&self, input_label: &str, text: &str) -> Result<BenchmarkReport> {
        let started = Instant::now();
        let start_memory = resident_memory_bytes();

        let mut builder = DocumentBuilder::new()?;
        let mut checkpoints = Vec::new();
        let mut seen_errors = 0_usize;

        for line in text.lines() {
            builder.feed_line(line);

            let processed = builder.lines_processed();
            if processed % self.checkpoint_interval == 0 {
                checkpoints.push(make_checkpoint(
                    format!("processed {processed} lines"),
                    started,
                    processed,
                ));
            }

            let error_count = builder.error_count();
            if error_count > seen_errors {
                checkpoints.push(make_checkpoint(
                    format!("error recorded at line {processed}"),
                    started,
                    processed,
                ));
                seen_errors = error_count;
            }
        }

        let outcome = builder.finish();
        let duration = started.elapsed();
        let end_memory = resident_memory_bytes();

        let total_lines = outcome.statistics.total_lines;
        let seconds = duration.as_secs_f64();
        let lines_per_second = if seconds > 0.0 {
            total_lines as f64 / seconds
        } else {
            total_lines as f64
        };
        let avg_line_latency_micros = if total_lines > 0 {
            duration.as_micros() as f64 / total_lines as f64
        } else {
            0.0
        };
        let memory_delta_bytes = end_memory as i64 - start_memory as i64;
        let bytes_per_line = if total_lines > 0 {
            memory_delta_bytes.max(0) as f64 / total_lines as f64
        } else {
            0.0
        };
        let error_rate_percent = if total_lines > 0 {
            100.0 * outcome.statistics.error_lines as f64 / total_lines as f64
        } else {
            0.0
        };
        let success_rate_percent = 100.0 - error_rate_percent;

        let speed = speed_score(lines_per_second);
        let memory = memory_score(bytes_per_line);
        let accuracy = accuracy_score(success_rate_percent);
        let overall = ((speed + memory + accuracy) as f64 / 3.0).round() as u8;

        Ok(BenchmarkReport {
            generated_at: now_utc_string(),
            input_path: input_label.to_string(),
            duration_ms: duration.as_millis() as u64,
            statistics: outcome.statistics,
            checkpoints,
            metrics: BenchmarkMetrics {
                lines_per_second,
                avg_line_latency_micros,
                memory_delta_bytes,
                bytes_per_line,
                error_rate_percent,
                success_rate_percent,
            },
            grades: BenchmarkGrades {
                speed: letter_for(speed).to_string(),
                memory: letter_for(memory).to_string(),
                accuracy: accuracy_letter(accuracy, success_rate_percent).to_string(),
                overall: letter_for(overall).to_string(),
            },
        })
    }
}

fn make_checkpoint(message: String, started: Instant, lines: usize) -> BenchmarkCheckpoint {
    BenchmarkCheckpoint {
        message,
        timestamp_offset_ms: started.elapsed().as_millis() as u64,
        memory_bytes: resident_memory_bytes(),
        lines_processed: lines,
    }
}

/// VmRSS from /proc/self/status. Anything unreadable (other platforms, a
/// locked-down procfs) degrades to 0 rather than failing the benchmark.
fn resident_memory_bytes() -> u64 {
    let Ok(status) = std::fs::read_to_string("/proc/self/status") else {
        return 0;
    };

    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            let kilobytes = rest
                .trim()
                .trim_end_matches("kB")
                .trim()
                .parse::<u64>()
                .unwrap_or(0);
            return kilobytes * 1024;
        }
    }

    0
}

pub(crate) fn speed_score(lines_per_second: f64) -> u8 {
    match lines_per_second {
        rate if rate >= 1000.0 => 5,
        rate if rate >= 500.0 => 4,
        rate if rate >= 200.0 => 3,
        rate if rate >= 50.0 => 2,
        _ => 1,
    }
}

pub(crate) fn memory_score(bytes_per_line: f64) -> u8 {
    match bytes_per_line {
        bytes if bytes <= 500.0 => 5,
        bytes if bytes <= 1000.0 => 4,
        bytes if bytes <= 2000.0 => 3,
        bytes if bytes <= 5000.0 => 2,
        _ => 1,
    }
}

pub(crate) fn accuracy_score(success_rate_percent: f64) -> u8 {
    match success_rate_percent {
        rate if rate >= 99.0 => 5,
        rate if rate >= 95.0 => 4,
        rate if rate >= 90.0 => 3,
        rate if rate >= 80.0 => 2,
        _ => 1,
    }
}

pub(crate) fn letter_for(score: u8) -> &'static str {
    match score {
        5 => "A",
        4 => "B",
        3 => "C",
        2 => "D",
        _ => "F",
    }
}

pub(crate) fn accuracy_letter(score: u8, success_rate_percent: f64) -> &'static str {
    if success_rate_percent >= 99.0 {
        return "A+";
    }
    letter_for(score)
}
