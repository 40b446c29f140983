use std::time::Instant;

use anyhow::{Context, Result};
use regex::Regex;
use serde_json::json;
use tracing::warn;

use crate::model::{
    ImportErrorRecord, ImportOutput, ImportStats, LevelCounters, ParsedArticle, ParsedChapter,
    ParsedClause, ParsedDocumentData, ParsedEdition, ParsedRegulation, ProgressStatus,
};
use crate::util::now_utc_string;

use super::progress::{CancelToken, ProgressSink, ProgressUpdate};
use super::store::{ArticleRow, ChapterRow, ClauseRow, EditionRow, RegulationRow, StorePort};

/// True when the failure chain bottoms out in a SQLite constraint violation.
/// Those stay node-scoped; anything else aborts the edition transaction.
pub fn is_constraint_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<rusqlite::Error>()
            .is_some_and(|sqlite_err| {
                matches!(
                    sqlite_err,
                    rusqlite::Error::SqliteFailure(failure, _)
                        if failure.code == rusqlite::ErrorCode::ConstraintViolation
                )
            })
    })
}

/// Walks a parsed document into the store, one transaction per edition
/// subtree. Node failures are recorded and skipped with their descendants;
/// sibling processing continues.
pub struct HierarchicalImporter<'a> {
    store: &'a mut dyn StorePort,
    progress: Option<&'a dyn ProgressSink>,
    cancel: Option<CancelToken>,
    code_shape: Regex,
    started: Instant,
}

impl<'a> HierarchicalImporter<'a> {
    pub fn new(store: &'a mut dyn StorePort) -> Result<Self> {
        Ok(Self {
            store,
            progress: None,
            cancel: None,
            code_shape: Regex::new(r"^(\d+)-(\d+)-(\d+)$")
                .context("failed to compile regulation code shape regex")?,
            started: Instant::now(),
        })
    }

    pub fn with_progress(mut self, sink: &'a dyn ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn with_cancellation(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn import(&mut self, document: &ParsedDocumentData) -> ImportOutput {
        self.started = Instant::now();
        let mut stats = ImportStats::default();
        let mut errors = Vec::new();
        let mut success = true;
        let mut cancelled = false;
        let total = document.editions.len();

        for (index, edition) in document.editions.iter().enumerate() {
            if self
                .cancel
                .as_ref()
                .is_some_and(|token| token.is_cancelled())
            {
                cancelled = true;
                warn!(
                    remaining = total - index,
                    "import cancelled between edition transactions"
                );
                break;
            }

            if let Err(err) =
                self.import_edition(edition, (index + 1) as i64, &mut stats, &mut errors)
            {
                if let Err(rollback_err) = self.store.rollback_edition_tx() {
                    warn!(error = %rollback_err, "rollback failed after transaction error");
                }
                success = false;
                stats.editions.failed += 1;
                errors.push(ImportErrorRecord {
                    record_type: "transaction".to_string(),
                    timestamp: now_utc_string(),
                    errors: vec![format!("{err:#}")],
                    data: json!({
                        "editionNumber": edition.number,
                        "editionTitle": edition.title,
                    }),
                });
                warn!(edition = edition.number, error = %err, "edition transaction failed");
            }

            self.report(
                percent_done(index + 1, total),
                &format!("imported edition {} of {}", index + 1, total),
                ProgressStatus::Importing,
                None,
            );
        }

        let total_errors = errors.len();
        let output = ImportOutput {
            success,
            total_processed: stats.total_processed(),
            total_errors,
            stats,
            errors,
        };

        let (status, message) = if cancelled {
            (ProgressStatus::Cancelled, "import cancelled")
        } else {
            (ProgressStatus::Completed, "import completed")
        };
        self.report(100, message, status, Some(output.clone()));

        output
    }

    fn import_edition(
        &mut self,
        edition: &ParsedEdition,
        sort_order: i64,
        stats: &mut ImportStats,
        errors: &mut Vec<ImportErrorRecord>,
    ) -> Result<()> {
        let messages = validate_edition(edition);
        if !messages.is_empty() {
            stats.editions.failed += 1;
            errors.push(node_error("edition", edition_data(edition), messages));
            return Ok(());
        }

        self.store.begin_edition_tx()?;

        let mut delta_stats = ImportStats::default();
        let mut delta_errors = Vec::new();
        let result =
            self.import_edition_subtree(edition, sort_order, &mut delta_stats, &mut delta_errors);

        match result {
            Ok(()) => {
                self.store.commit_edition_tx()?;
                stats.merge(&delta_stats);
                errors.append(&mut delta_errors);
                Ok(())
            }
            Err(err) => {
                // node errors seen before the abort are kept; the rolled-back
                // row counters are not
                errors.append(&mut delta_errors);
                Err(err)
            }
        }
    }

    fn import_edition_subtree(
        &mut self,
        edition: &ParsedEdition,
        sort_order: i64,
        stats: &mut ImportStats,
        errors: &mut Vec<ImportErrorRecord>,
    ) -> Result<()> {
        let row = EditionRow {
            number: edition.number,
            title: edition.title.clone(),
            description: None,
            sort_order,
        };

        let edition_id = match self.store.upsert_edition(&row) {
            Ok(upsert) => {
                count(&mut stats.editions, upsert.created);
                upsert.id
            }
            Err(err) if is_constraint_violation(&err) => {
                stats.editions.failed += 1;
                errors.push(node_error(
                    "edition",
                    edition_data(edition),
                    vec![format!("{err:#}")],
                ));
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        for (index, chapter) in edition.chapters.iter().enumerate() {
            self.import_chapter(
                edition,
                chapter,
                edition_id,
                (index + 1) as i64,
                stats,
                errors,
            )?;
        }

        Ok(())
    }

    fn import_chapter(
        &mut self,
        edition: &ParsedEdition,
        chapter: &ParsedChapter,
        edition_id: i64,
        sort_order: i64,
        stats: &mut ImportStats,
        errors: &mut Vec<ImportErrorRecord>,
    ) -> Result<()> {
        let messages = validate_chapter(chapter);
        if !messages.is_empty() {
            stats.chapters.failed += 1;
            errors.push(node_error("chapter", chapter_data(edition, chapter), messages));
            return Ok(());
        }

        let row = ChapterRow {
            edition_id,
            number: chapter.number,
            title: chapter.title.clone(),
            description: None,
            sort_order,
        };

        let chapter_id = match self.store.upsert_chapter(&row) {
            Ok(upsert) => {
                count(&mut stats.chapters, upsert.created);
                upsert.id
            }
            Err(err) if is_constraint_violation(&err) => {
                stats.chapters.failed += 1;
                errors.push(node_error(
                    "chapter",
                    chapter_data(edition, chapter),
                    vec![format!("{err:#}")],
                ));
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        for (index, regulation) in chapter.regulations.iter().enumerate() {
            self.import_regulation(
                edition,
                chapter,
                regulation,
                chapter_id,
                (index + 1) as i64,
                stats,
                errors,
            )?;
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn import_regulation(
        &mut self,
        edition: &ParsedEdition,
        chapter: &ParsedChapter,
        regulation: &ParsedRegulation,
        chapter_id: i64,
        sort_order: i64,
        stats: &mut ImportStats,
        errors: &mut Vec<ImportErrorRecord>,
    ) -> Result<()> {
        let (messages, number) = self.validate_regulation(edition, chapter, regulation);
        if !messages.is_empty() {
            stats.regulations.failed += 1;
            errors.push(node_error(
                "regulation",
                regulation_data(edition, chapter, regulation, sort_order),
                messages,
            ));
            return Ok(());
        }

        let row = RegulationRow {
            chapter_id,
            code: regulation.code.clone(),
            number,
            title: regulation.title.clone(),
            content: if regulation.content.is_empty() {
                None
            } else {
                Some(regulation.content.clone())
            },
            status: "active".to_string(),
            sort_order,
        };

        let regulation_id = match self.store.upsert_regulation(&row) {
            Ok(upsert) => {
                count(&mut stats.regulations, upsert.created);
                upsert.id
            }
            Err(err) if is_constraint_violation(&err) => {
                stats.regulations.failed += 1;
                errors.push(node_error(
                    "regulation",
                    regulation_data(edition, chapter, regulation, sort_order),
                    vec![format!("{err:#}")],
                ));
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        for (index, article) in regulation.articles.iter().enumerate() {
            self.import_article(
                regulation,
                article,
                regulation_id,
                (index + 1) as i64,
                stats,
                errors,
            )?;
        }

        Ok(())
    }

    fn import_article(
        &mut self,
        regulation: &ParsedRegulation,
        article: &ParsedArticle,
        regulation_id: i64,
        sort_order: i64,
        stats: &mut ImportStats,
        errors: &mut Vec<ImportErrorRecord>,
    ) -> Result<()> {
        let row = ArticleRow {
            regulation_id,
            number: article.number,
            title: article.title.clone(),
            content: article.content.clone(),
            sort_order,
        };

        let article_id = match self.store.upsert_article(&row) {
            Ok(upsert) => {
                count(&mut stats.articles, upsert.created);
                upsert.id
            }
            Err(err) if is_constraint_violation(&err) => {
                stats.articles.failed += 1;
                errors.push(node_error(
                    "article",
                    article_data(regulation, article, sort_order),
                    vec![format!("{err:#}")],
                ));
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        for (index, clause) in article.clauses.iter().enumerate() {
            self.import_clause(
                regulation,
                article,
                clause,
                article_id,
                (index + 1) as i64,
                stats,
                errors,
            )?;
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn import_clause(
        &mut self,
        regulation: &ParsedRegulation,
        article: &ParsedArticle,
        clause: &ParsedClause,
        article_id: i64,
        sort_order: i64,
        stats: &mut ImportStats,
        errors: &mut Vec<ImportErrorRecord>,
    ) -> Result<()> {
        let row = ClauseRow {
            article_id,
            number: clause.number,
            content: clause.content.clone(),
            clause_type: clause.clause_type.as_str().to_string(),
            sort_order,
        };

        match self.store.upsert_clause(&row) {
            Ok(upsert) => {
                count(&mut stats.clauses, upsert.created);
                Ok(())
            }
            Err(err) if is_constraint_violation(&err) => {
                stats.clauses.failed += 1;
                errors.push(node_error(
                    "clause",
                    clause_data(regulation, article, clause, sort_order),
                    vec![format!("{err:#}")],
                ));
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Code shape plus the invariant that the first two segments agree with
    /// the ancestor numbers. Returns the regulation-local ordinal.
    fn validate_regulation(
        &self,
        edition: &ParsedEdition,
        chapter: &ParsedChapter,
        regulation: &ParsedRegulation,
    ) -> (Vec<String>, i64) {
        let mut messages = Vec::new();
        let mut number = 0_i64;

        match self.code_shape.captures(&regulation.code) {
            Some(captures) => {
                let edition_segment: i64 = captures[1].parse().unwrap_or(-1);
                let chapter_segment: i64 = captures[2].parse().unwrap_or(-1);
                number = captures[3].parse().unwrap_or(0);

                if edition_segment != edition.number || chapter_segment != chapter.number {
                    messages.push(format!(
                        "regulation code '{}' does not agree with ancestors {}-{}",
                        regulation.code, edition.number, chapter.number
                    ));
                }
            }
            None => messages.push(format!(
                "regulation code '{}' does not match the edition-chapter-ordinal shape",
                regulation.code
            )),
        }

        if regulation.title.trim().is_empty() {
            messages.push("regulation title must not be empty".to_string());
        }

        (messages, number)
    }

    fn report(
        &self,
        percentage: u8,
        message: &str,
        status: ProgressStatus,
        data: Option<ImportOutput>,
    ) {
        let Some(sink) = self.progress else {
            return;
        };

        let update = ProgressUpdate {
            percentage,
            message: message.to_string(),
            status,
            elapsed_seconds: self.started.elapsed().as_secs_f64(),
            data,
        };
        if let Err(err) = sink.on_progress(update) {
            warn!(error = %err, "progress sink failed; continuing");
        }
    }
}

fn validate_edition(edition: &ParsedEdition) -> Vec<String> {
    let mut messages = Vec::new();
    if edition.number < 0 {
        messages.push(format!("edition number {} must not be negative", edition.number));
    }
    if edition.title.trim().is_empty() {
        messages.push("edition title must not be empty".to_string());
    }
    messages
}

fn validate_chapter(chapter: &ParsedChapter) -> Vec<String> {
    let mut messages = Vec::new();
    if chapter.number < 0 {
        messages.push(format!("chapter number {} must not be negative", chapter.number));
    }
    if chapter.title.trim().is_empty() {
        messages.push("chapter title must not be empty".to_string());
    }
    messages
}

fn node_error(level: &str, data: serde_json::Value, messages: Vec<String>) -> ImportErrorRecord {
    ImportErrorRecord {
        record_type: level.to_string(),
        timestamp: now_utc_string(),
        errors: messages,
        data,
    }
}

fn edition_data(edition: &ParsedEdition) -> serde_json::Value {
    json!({
        "number": edition.number,
        "title": edition.title,
        "chapterCount": edition.chapters.len(),
    })
}

fn chapter_data(edition: &ParsedEdition, chapter: &ParsedChapter) -> serde_json::Value {
    json!({
        "editionNumber": edition.number,
        "number": chapter.number,
        "title": chapter.title,
        "regulationCount": chapter.regulations.len(),
    })
}

fn regulation_data(
    edition: &ParsedEdition,
    chapter: &ParsedChapter,
    regulation: &ParsedRegulation,
    sort_order: i64,
) -> serde_json::Value {
    json!({
        "editionNumber": edition.number,
        "chapterNumber": chapter.number,
        "code": regulation.code,
        "title": regulation.title,
        "content": regulation.content,
        "sortOrder": sort_order,
    })
}

fn article_data(
    regulation: &ParsedRegulation,
    article: &ParsedArticle,
    sort_order: i64,
) -> serde_json::Value {
    json!({
        "regulationCode": regulation.code,
        "number": article.number,
        "title": article.title,
        "content": article.content,
        "sortOrder": sort_order,
    })
}

fn clause_data(
    regulation: &ParsedRegulation,
    article: &ParsedArticle,
    clause: &ParsedClause,
    sort_order: i64,
) -> serde_json::Value {
    json!({
        "regulationCode": regulation.code,
        "articleNumber": article.number,
        "number": clause.number,
        "content": clause.content,
        "clauseType": clause.clause_type.as_str(),
        "sortOrder": sort_order,
    })
}

fn count(level: &mut LevelCounters, created: bool) {
    if created {
        level.created += 1;
    } else {
        level.updated += 1;
    }
}

fn percent_done(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done * 100) / total).min(100) as u8
}
