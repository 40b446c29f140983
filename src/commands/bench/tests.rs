use super::harness::{accuracy_letter, accuracy_score, letter_for, memory_score, speed_score};
use super::*;

#[test]
fn clean_document_reports_perfect_accuracy() {
    let text = "제1편 총칙\n제1장 목적\n1-1-1 학칙\n제1조 (목적) 본문\n① 첫 항";
    let report = BenchmarkHarness::new(2)
        .run("sample", text)
        .expect("benchmark runs");

    assert_eq!(report.statistics.total_lines, 5);
    assert_eq!(report.metrics.error_rate_percent, 0.0);
    assert_eq!(report.metrics.success_rate_percent, 100.0);
    assert_eq!(report.grades.accuracy, "A+");
    assert!(report.metrics.lines_per_second > 0.0);
}

#[test]
fn interval_checkpoints_land_on_the_configured_boundary() {
    let text = "제1편 총칙\n제1장 목적\n1-1-1 학칙\n제1조 (목적) 본문\n① 첫 항";
    let report = BenchmarkHarness::new(2)
        .run("sample", text)
        .expect("benchmark runs");

    assert_eq!(report.checkpoints.len(), 2);
    assert!(
        report
            .checkpoints
            .iter()
            .all(|checkpoint| checkpoint.lines_processed % 2 == 0)
    );
}

#[test]
fn every_recorded_error_produces_a_checkpoint() {
    // chapter before any edition: one structural error mid-stream
    let text = "제1장 고아 장\n1-1-1 학칙";
    let report = BenchmarkHarness::new(1000)
        .run("sample", text)
        .expect("benchmark runs");

    assert_eq!(report.checkpoints.len(), 1);
    assert!(report.checkpoints[0].message.contains("error"));
    assert_eq!(report.checkpoints[0].lines_processed, 1);
    assert!(report.metrics.error_rate_percent > 0.0);
}

#[test]
fn speed_grades_follow_the_lines_per_second_ladder() {
    assert_eq!(speed_score(1200.0), 5);
    assert_eq!(speed_score(1000.0), 5);
    assert_eq!(speed_score(700.0), 4);
    assert_eq!(speed_score(250.0), 3);
    assert_eq!(speed_score(60.0), 2);
    assert_eq!(speed_score(10.0), 1);
}

#[test]
fn memory_grades_follow_the_bytes_per_line_ladder() {
    assert_eq!(memory_score(0.0), 5);
    assert_eq!(memory_score(500.0), 5);
    assert_eq!(memory_score(900.0), 4);
    assert_eq!(memory_score(1500.0), 3);
    assert_eq!(memory_score(4000.0), 2);
    assert_eq!(memory_score(9000.0), 1);
}

#[test]
fn accuracy_grade_tops_out_at_a_plus() {
    assert_eq!(accuracy_score(100.0), 5);
    assert_eq!(accuracy_letter(accuracy_score(99.2), 99.2), "A+");
    assert_eq!(accuracy_letter(accuracy_score(96.0), 96.0), "B");
    assert_eq!(letter_for(1), "F");
}
