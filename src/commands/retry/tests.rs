use std::cell::RefCell;
use std::collections::BTreeSet;
use std::time::Duration;

use serde_json::json;

use super::cleaner::coerce_int;
use super::*;
use crate::commands::import::{SqliteStore, StorePort};
use crate::model::ImportErrorRecord;

#[derive(Default)]
struct RecordingSleeper {
    delays: RefCell<Vec<u64>>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, delay: Duration) {
        self.delays.borrow_mut().push(delay.as_secs());
    }
}

fn record(record_type: &str, data: serde_json::Value) -> ImportErrorRecord {
    ImportErrorRecord {
        record_type: record_type.to_string(),
        timestamp: "2026-08-06T00:00:00Z".to_string(),
        errors: vec!["seed failure".to_string()],
        data,
    }
}

#[test]
fn retry_succeeds_after_cleaning_coercible_fields() {
    let mut store = SqliteStore::open_in_memory().expect("store opens");
    let sleeper = RecordingSleeper::default();
    let mut handler = RetryHandler::new(&mut store, RetryPolicy::default(), &sleeper)
        .expect("handler builds");

    let still_failing = handler.process(&[record(
        "edition",
        json!({"number": " 2 ", "title": "  총칙  ", "sortOrder": 2}),
    )]);
    let report = handler.into_report();

    assert!(still_failing.is_empty());
    assert_eq!(report.retry_stats.total_retries, 1);
    assert_eq!(report.retry_stats.successful_retries, 1);
    assert_eq!(report.retry_stats.permanent_failures, 0);
    assert!(sleeper.delays.borrow().is_empty());

    assert!(store.find_edition_id(2).expect("lookup").is_some());
}

#[test]
fn permanent_after_exactly_three_attempts_never_a_fourth() {
    let mut store = SqliteStore::open_in_memory().expect("store opens");
    let sleeper = RecordingSleeper::default();
    let mut handler = RetryHandler::new(&mut store, RetryPolicy::default(), &sleeper)
        .expect("handler builds");

    let bad = record("edition", json!({"number": "없음", "title": "제목"}));
    handler.process_to_exhaustion(vec![bad.clone()]);

    // the record is now permanent; another pass must not attempt it again
    let after = handler.process(&[bad]);
    assert!(after.is_empty());

    let report = handler.into_report();
    assert_eq!(report.retry_stats.total_retries, 3);
    assert_eq!(report.retry_stats.failed_retries, 3);
    assert_eq!(report.retry_stats.successful_retries, 0);
    assert_eq!(report.retry_stats.permanent_failures, 1);

    assert_eq!(report.permanent_failure_records.len(), 1);
    let permanent = &report.permanent_failure_records[0];
    assert_eq!(permanent.attempts, 3);
    assert!(!permanent.last_error.is_empty());

    // backoff before the second and third attempts: 2^1 and 2^2 seconds
    assert_eq!(sleeper.delays.borrow().as_slice(), &[2, 4]);
}

#[test]
fn custom_policy_bounds_attempts_and_backoff_base() {
    let mut store = SqliteStore::open_in_memory().expect("store opens");
    let sleeper = RecordingSleeper::default();
    let policy = RetryPolicy {
        max_attempts: 2,
        base_delay_secs: 3,
    };
    let mut handler =
        RetryHandler::new(&mut store, policy, &sleeper).expect("handler builds");

    handler.process_to_exhaustion(vec![record(
        "edition",
        json!({"number": "없음", "title": "제목"}),
    )]);
    let report = handler.into_report();

    assert_eq!(report.retry_stats.total_retries, 2);
    assert_eq!(report.retry_stats.permanent_failures, 1);
    assert_eq!(sleeper.delays.borrow().as_slice(), &[3]);
}

#[test]
fn attempt_counter_survives_record_reserialization() {
    let mut store = SqliteStore::open_in_memory().expect("store opens");
    let sleeper = RecordingSleeper::default();
    let mut handler = RetryHandler::new(&mut store, RetryPolicy::default(), &sleeper)
        .expect("handler builds");

    let original = record("edition", json!({"number": "없음", "title": "제목"}));
    let serialized = serde_json::to_string(&original).expect("record serializes");
    let round_tripped: ImportErrorRecord =
        serde_json::from_str(&serialized).expect("record deserializes");

    handler.process(&[original]);
    assert_eq!(handler.attempts_for(&round_tripped), 1);
}

#[test]
fn chapter_retry_creates_placeholder_edition() {
    let mut store = SqliteStore::open_in_memory().expect("store opens");
    let sleeper = RecordingSleeper::default();
    let mut handler = RetryHandler::new(&mut store, RetryPolicy::default(), &sleeper)
        .expect("handler builds");

    let still_failing = handler.process(&[record(
        "chapter",
        json!({"editionNumber": 3, "number": 1, "title": "외톨이 장"}),
    )]);
    drop(handler);

    assert!(still_failing.is_empty());
    let edition_id = store
        .find_edition_id(3)
        .expect("lookup")
        .expect("placeholder edition exists");
    assert!(
        store
            .find_chapter_id(edition_id, 1)
            .expect("lookup")
            .is_some()
    );
}

#[test]
fn regulation_retry_sanitizes_code_and_resolves_parents() {
    let mut store = SqliteStore::open_in_memory().expect("store opens");
    let sleeper = RecordingSleeper::default();
    let mut handler = RetryHandler::new(&mut store, RetryPolicy::default(), &sleeper)
        .expect("handler builds");

    let still_failing = handler.process(&[record(
        "regulation",
        json!({
            "editionNumber": 5,
            "chapterNumber": 2,
            "code": "규정 제 5-2-7호",
            "title": "  세칙  ",
            "sortOrder": 1,
        }),
    )]);
    drop(handler);

    assert!(still_failing.is_empty());
    assert!(store.find_edition_id(5).expect("lookup").is_some());
    assert!(
        store
            .find_regulation_id("5-2-7")
            .expect("lookup")
            .is_some()
    );
}

#[test]
fn clause_with_missing_regulation_exhausts_to_permanent() {
    let mut store = SqliteStore::open_in_memory().expect("store opens");
    let sleeper = RecordingSleeper::default();
    let mut handler = RetryHandler::new(&mut store, RetryPolicy::default(), &sleeper)
        .expect("handler builds");

    handler.process_to_exhaustion(vec![record(
        "clause",
        json!({
            "regulationCode": "9-9-9",
            "articleNumber": 1,
            "number": 1,
            "content": "내용",
            "clauseType": "paragraph",
        }),
    )]);
    let report = handler.into_report();

    assert_eq!(report.retry_stats.permanent_failures, 1);
    assert_eq!(report.permanent_failure_records[0].category, "data_format");
    assert!(!report.recommendations.is_empty());
}

#[test]
fn transaction_records_are_not_retryable_per_node() {
    let mut store = SqliteStore::open_in_memory().expect("store opens");
    let sleeper = RecordingSleeper::default();
    let mut handler = RetryHandler::new(&mut store, RetryPolicy::default(), &sleeper)
        .expect("handler builds");

    handler.process_to_exhaustion(vec![record("transaction", json!({"editionNumber": 1}))]);
    let report = handler.into_report();

    assert_eq!(report.retry_stats.permanent_failures, 1);
    assert_eq!(report.permanent_failure_records[0].category, "unknown");
}

#[test]
fn sanitize_code_recovers_or_synthesizes_the_shape() {
    let cleaner = DataCleaner::new().expect("cleaner builds");

    assert_eq!(cleaner.sanitize_code("제 1-2-3 호", 0, 0), "1-2-3");
    assert_eq!(cleaner.sanitize_code("1장 2절 3관", 0, 0), "1-2-3");
    assert_eq!(cleaner.sanitize_code("제12호", 3, 4), "3-4-12");
    assert_eq!(cleaner.sanitize_code("없음", 1, 2), "1-2-0");
}

#[test]
fn coerce_int_handles_numbers_strings_and_prefixes() {
    assert_eq!(coerce_int(&json!(5)), Some(5));
    assert_eq!(coerce_int(&json!(3.7)), Some(3));
    assert_eq!(coerce_int(&json!("7")), Some(7));
    assert_eq!(coerce_int(&json!(" 8 ")), Some(8));
    assert_eq!(coerce_int(&json!("9절")), Some(9));
    assert_eq!(coerce_int(&json!("없음")), None);
}

#[test]
fn failure_messages_categorize_by_keyword() {
    assert_eq!(
        categorize_failure("UNIQUE constraint failed: regulations.code"),
        "constraint"
    );
    assert_eq!(
        categorize_failure("field 'title' is empty after cleaning"),
        "validation"
    );
    assert_eq!(
        categorize_failure("regulation code '1-1' does not match the edition-chapter-ordinal shape"),
        "data_format"
    );
    assert_eq!(categorize_failure("something else entirely"), "unknown");
}

#[test]
fn recommendations_cover_observed_categories() {
    let categories: BTreeSet<String> = ["constraint", "validation"]
        .iter()
        .map(|category| category.to_string())
        .collect();
    let recommendations = recommendations_for(&categories);

    assert_eq!(recommendations.len(), 2);
    assert!(recommendations[0].contains("natural keys"));
}
