use std::collections::{BTreeSet, HashMap, HashSet};
use std::thread;
use std::time::Duration;

use anyhow::{Result, bail};
use serde_json::Value;
use tracing::{info, warn};

use crate::commands::import::{
    ArticleRow, ChapterRow, ClauseRow, EditionRow, RegulationRow, StorePort,
};
use crate::model::{ClauseType, ImportErrorRecord, PermanentFailureRecord, RetryReport, RetryStats};
use crate::util::{now_utc_string, sha256_text};

use super::cleaner::{DataCleaner, categorize_failure, coerce_int, recommendations_for};

const UNCATEGORIZED_TITLE: &str = "Uncategorized";

/// Injectable sleep so tests can observe backoff without waiting it out.
pub trait Sleeper {
    fn sleep(&self, delay: Duration);
}

#[derive(Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, delay: Duration) {
        thread::sleep(delay);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 2,
        }
    }
}

/// Re-attempts failed import records with cleaning and exponential backoff.
/// Attempt counters are keyed by a structural hash of `(type, data)`, so the
/// ceiling holds across passes and across re-serialization of the records.
pub struct RetryHandler<'a> {
    store: &'a mut dyn StorePort,
    cleaner: DataCleaner,
    policy: RetryPolicy,
    sleeper: &'a dyn Sleeper,
    attempts: HashMap<String, u32>,
    permanent_keys: HashSet<String>,
    permanent_records: Vec<PermanentFailureRecord>,
    stats: RetryStats,
}

impl<'a> RetryHandler<'a> {
    pub fn new(
        store: &'a mut dyn StorePort,
        policy: RetryPolicy,
        sleeper: &'a dyn Sleeper,
    ) -> Result<Self> {
        Ok(Self {
            store,
            cleaner: DataCleaner::new()?,
            policy,
            sleeper,
            attempts: HashMap::new(),
            permanent_keys: HashSet::new(),
            permanent_records: Vec::new(),
            stats: RetryStats::default(),
        })
    }

    pub fn attempts_for(&self, record: &ImportErrorRecord) -> u32 {
        self.attempts.get(&record_key(record)).copied().unwrap_or(0)
    }

    /// One pass: each active record gets at most one attempt. Returns the
    /// records that failed again but have retry budget left.
    pub fn process(&mut self, records: &[ImportErrorRecord]) -> Vec<ImportErrorRecord> {
        let mut still_failing = Vec::new();

        for record in records {
            let key = record_key(record);
            if self.permanent_keys.contains(&key) {
                continue;
            }

            let prior_attempts = self.attempts.get(&key).copied().unwrap_or(0);
            if prior_attempts >= self.policy.max_attempts {
                continue;
            }

            if prior_attempts >= 1 {
                let delay_secs = self.policy.base_delay_secs.pow(prior_attempts);
                self.sleeper.sleep(Duration::from_secs(delay_secs));
            }

            let attempt_number = prior_attempts + 1;
            self.attempts.insert(key.clone(), attempt_number);
            self.stats.total_retries += 1;

            let cleaned = self.cleaner.clean(&record.record_type, &record.data);
            match self.persist(&record.record_type, &cleaned) {
                Ok(()) => {
                    self.stats.successful_retries += 1;
                    info!(
                        record_type = %record.record_type,
                        attempt = attempt_number,
                        "retry succeeded"
                    );
                }
                Err(err) => {
                    self.stats.failed_retries += 1;
                    let message = format!("{err:#}");
                    warn!(
                        record_type = %record.record_type,
                        attempt = attempt_number,
                        error = %message,
                        "retry failed"
                    );

                    if attempt_number >= self.policy.max_attempts {
                        self.stats.permanent_failures += 1;
                        self.permanent_keys.insert(key);
                        self.permanent_records.push(PermanentFailureRecord {
                            record: record.clone(),
                            attempts: attempt_number,
                            category: categorize_failure(&message).to_string(),
                            last_error: message,
                            failed_at: now_utc_string(),
                        });
                    } else {
                        still_failing.push(record.clone());
                    }
                }
            }
        }

        still_failing
    }

    /// Drives passes until every record has either succeeded or exhausted
    /// its retry budget.
    pub fn process_to_exhaustion(&mut self, records: Vec<ImportErrorRecord>) {
        let mut active = records;
        while !active.is_empty() {
            active = self.process(&active);
        }
    }

    pub fn into_report(self) -> RetryReport {
        let categories: BTreeSet<String> = self
            .permanent_records
            .iter()
            .map(|record| record.category.clone())
            .collect();

        RetryReport {
            retry_stats: self.stats,
            recommendations: recommendations_for(&categories),
            permanent_failure_records: self.permanent_records,
            generated_at: now_utc_string(),
        }
    }

    fn persist(&mut self, record_type: &str, data: &Value) -> Result<()> {
        match record_type {
            "edition" => self.persist_edition(data),
            "chapter" => self.persist_chapter(data),
            "regulation" => self.persist_regulation(data),
            "article" => self.persist_article(data),
            "clause" => self.persist_clause(data),
            "transaction" => {
                bail!("transaction failures cover a whole edition subtree; run a fresh import")
            }
            other => bail!("unknown record type '{other}'"),
        }
    }

    fn persist_edition(&mut self, data: &Value) -> Result<()> {
        let number = require_int(data, "number")?;
        let title = require_string(data, "title")?;

        self.store.upsert_edition(&EditionRow {
            number,
            title,
            description: None,
            sort_order: optional_int(data, "sortOrder").unwrap_or(0),
        })?;
        Ok(())
    }

    fn persist_chapter(&mut self, data: &Value) -> Result<()> {
        let number = require_int(data, "number")?;
        let title = require_string(data, "title")?;
        let edition_number = optional_int(data, "editionNumber").unwrap_or(0);
        let edition_id = self.resolve_edition(edition_number)?;

        self.store.upsert_chapter(&ChapterRow {
            edition_id,
            number,
            title,
            description: None,
            sort_order: optional_int(data, "sortOrder").unwrap_or(0),
        })?;
        Ok(())
    }

    fn persist_regulation(&mut self, data: &Value) -> Result<()> {
        let code = require_string(data, "code")?;
        let title = require_string(data, "title")?;
        let edition_number = optional_int(data, "editionNumber").unwrap_or(0);
        let chapter_number = optional_int(data, "chapterNumber").unwrap_or(0);

        let edition_id = self.resolve_edition(edition_number)?;
        let chapter_id = self.resolve_chapter(edition_id, chapter_number)?;

        let number = code
            .rsplit('-')
            .next()
            .and_then(|segment| segment.parse::<i64>().ok())
            .unwrap_or(0);
        let content = data
            .get("content")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(ToOwned::to_owned);

        self.store.upsert_regulation(&RegulationRow {
            chapter_id,
            code,
            number,
            title,
            content,
            status: "active".to_string(),
            sort_order: optional_int(data, "sortOrder").unwrap_or(0),
        })?;
        Ok(())
    }

    fn persist_article(&mut self, data: &Value) -> Result<()> {
        let number = require_int(data, "number")?;
        let regulation_code = require_string(data, "regulationCode")?;
        let Some(regulation_id) = self.store.find_regulation_id(&regulation_code)? else {
            bail!("parent regulation '{regulation_code}' not found");
        };

        let title = data
            .get("title")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(ToOwned::to_owned);
        let content = data
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        self.store.upsert_article(&ArticleRow {
            regulation_id,
            number,
            title,
            content,
            sort_order: optional_int(data, "sortOrder").unwrap_or(0),
        })?;
        Ok(())
    }

    fn persist_clause(&mut self, data: &Value) -> Result<()> {
        let number = require_int(data, "number")?;
        let regulation_code = require_string(data, "regulationCode")?;
        let article_number = require_int(data, "articleNumber")?;

        let Some(regulation_id) = self.store.find_regulation_id(&regulation_code)? else {
            bail!("parent regulation '{regulation_code}' not found");
        };
        let Some(article_id) = self.store.find_article_id(regulation_id, article_number)? else {
            bail!("parent article {article_number} of regulation '{regulation_code}' not found");
        };

        let clause_type = data
            .get("clauseType")
            .and_then(Value::as_str)
            .and_then(ClauseType::from_str)
            .unwrap_or(ClauseType::Paragraph);
        let content = data
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        self.store.upsert_clause(&ClauseRow {
            article_id,
            number,
            content,
            clause_type: clause_type.as_str().to_string(),
            sort_order: optional_int(data, "sortOrder").unwrap_or(0),
        })?;
        Ok(())
    }

    /// Natural-key parent resolution, creating the placeholder ancestor when
    /// it is still missing (the importer's missing-parent policy, replayed
    /// at retry time).
    fn resolve_edition(&mut self, number: i64) -> Result<i64> {
        if let Some(id) = self.store.find_edition_id(number)? {
            return Ok(id);
        }

        let upsert = self.store.upsert_edition(&EditionRow {
            number,
            title: placeholder_title(number),
            description: None,
            sort_order: 0,
        })?;
        Ok(upsert.id)
    }

    fn resolve_chapter(&mut self, edition_id: i64, number: i64) -> Result<i64> {
        if let Some(id) = self.store.find_chapter_id(edition_id, number)? {
            return Ok(id);
        }

        let upsert = self.store.upsert_chapter(&ChapterRow {
            edition_id,
            number,
            title: placeholder_title(number),
            description: None,
            sort_order: 0,
        })?;
        Ok(upsert.id)
    }
}

fn placeholder_title(number: i64) -> String {
    if number == 0 {
        UNCATEGORIZED_TITLE.to_string()
    } else {
        format!("{UNCATEGORIZED_TITLE} {number}")
    }
}

/// Stable structural identity: serde_json maps are key-ordered, so the same
/// logical record hashes the same across runs and serializations.
fn record_key(record: &ImportErrorRecord) -> String {
    let data = serde_json::to_string(&record.data).unwrap_or_default();
    sha256_text(&format!("{}\n{}", record.record_type, data))
}

fn require_int(data: &Value, field: &str) -> Result<i64> {
    match data.get(field).and_then(coerce_int) {
        Some(number) => Ok(number),
        None => bail!("field '{field}' is missing or not numeric"),
    }
}

fn optional_int(data: &Value, field: &str) -> Option<i64> {
    data.get(field).and_then(coerce_int)
}

fn require_string(data: &Value, field: &str) -> Result<String> {
    let text = data
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if text.is_empty() {
        bail!("field '{field}' is empty after cleaning");
    }
    Ok(text.to_string())
}
