use anyhow::{Context, Result};
use regex::Regex;

use crate::model::{
    ClauseType, ParseErrorRecord, ParseMetadata, ParseOutput, ParseStatistics,
};
use crate::util::now_utc_string;

use super::classify::{LineClassifier, LineToken, normalize_line};
use super::tree::DocumentArena;

const UNCATEGORIZED_TITLE: &str = "Uncategorized";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    Initial,
    Edition,
    Chapter,
    Regulation,
    Article,
    Clause,
    Skip,
}

impl ParserState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Edition => "edition",
            Self::Chapter => "chapter",
            Self::Regulation => "regulation",
            Self::Article => "article",
            Self::Clause => "clause",
            Self::Skip => "skip",
        }
    }
}

/// Missing parent context is a recoverable condition; the caller decides to
/// synthesize a placeholder instead of dropping the node.
struct MissingParent;

#[derive(Debug)]
pub struct ParseOutcome {
    pub arena: DocumentArena,
    pub statistics: ParseStatistics,
    pub errors: Vec<ParseErrorRecord>,
    pub heading_lines: usize,
    pub content_lines: usize,
}

impl ParseOutcome {
    pub fn into_output(self) -> ParseOutput {
        let total_errors = self.errors.len();
        let success_rate_percent = if self.statistics.total_lines == 0 {
            100.0
        } else {
            let failed = self.statistics.error_lines.min(self.statistics.total_lines);
            let rate = 100.0
                * (self.statistics.total_lines - failed) as f64
                / self.statistics.total_lines as f64;
            (rate * 100.0).round() / 100.0
        };

        ParseOutput {
            data: self.arena.to_document(),
            statistics: self.statistics,
            errors: self.errors,
            metadata: ParseMetadata {
                parsed_at: now_utc_string(),
                parser_version: env!("CARGO_PKG_VERSION").to_string(),
                total_errors,
                success_rate_percent,
            },
        }
    }
}

/// Line-oriented state machine recovering the five-level hierarchy. Feed
/// lines one at a time; `finish` runs the post-pass validation and closes
/// the run. One builder per document, no shared state between instances.
#[derive(Debug)]
pub struct DocumentBuilder {
    classifier: LineClassifier,
    code_shape: Regex,
    arena: DocumentArena,
    state: ParserState,
    line_number: usize,
    current_edition: Option<usize>,
    current_chapter: Option<usize>,
    current_regulation: Option<usize>,
    current_article: Option<usize>,
    current_clause: Option<usize>,
    heading_lines: usize,
    content_lines: usize,
    skipped_lines: usize,
    errors: Vec<ParseErrorRecord>,
}

impl DocumentBuilder {
    pub fn new() -> Result<Self> {
        Self::with_classifier(LineClassifier::new()?)
    }

    pub fn with_classifier(classifier: LineClassifier) -> Result<Self> {
        Ok(Self {
            classifier,
            code_shape: Regex::new(r"^\d+-\d+-\d+$")
                .context("failed to compile regulation code shape regex")?,
            arena: DocumentArena::default(),
            state: ParserState::Initial,
            line_number: 0,
            current_edition: None,
            current_chapter: None,
            current_regulation: None,
            current_article: None,
            current_clause: None,
            heading_lines: 0,
            content_lines: 0,
            skipped_lines: 0,
            errors: Vec::new(),
        })
    }

    pub fn parse(text: &str) -> Result<ParseOutcome> {
        let mut builder = Self::new()?;
        for line in text.lines() {
            builder.feed_line(line);
        }
        Ok(builder.finish())
    }

    pub fn lines_processed(&self) -> usize {
        self.line_number
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn feed_line(&mut self, raw: &str) {
        self.line_number += 1;
        let line = normalize_line(raw);
        if line.is_empty() {
            self.skipped_lines += 1;
            return;
        }

        match self.classifier.classify(&line) {
            LineToken::Noise => self.skipped_lines += 1,
            LineToken::Edition { number, title } => self.open_edition(number, title),
            LineToken::Chapter { number, title } => self.open_chapter(number, title),
            LineToken::Regulation { code, title } => self.open_regulation(code, title),
            LineToken::Article {
                number,
                title,
                body,
            } => self.open_article(number, title, body),
            LineToken::Clause {
                number,
                body,
                clause_type,
            } => self.open_clause(number, body, clause_type),
            LineToken::Appendix | LineToken::Attachment => {
                self.skipped_lines += 1;
                self.state = ParserState::Skip;
            }
            LineToken::Content => self.append_content(&line),
        }
    }

    pub fn finish(mut self) -> ParseOutcome {
        for regulation in &self.arena.regulations {
            if !self.code_shape.is_match(&regulation.code) {
                self.errors.push(ParseErrorRecord {
                    message: format!(
                        "validation_error: regulation '{}' has malformed code '{}'",
                        regulation.title, regulation.code
                    ),
                    line_number: regulation.line_number,
                    state: "validation".to_string(),
                    timestamp: now_utc_string(),
                });
                continue;
            }

            let chapter = &self.arena.chapters[regulation.chapter];
            let edition = &self.arena.editions[chapter.edition];
            let mut segments = regulation
                .code
                .split('-')
                .map(|segment| segment.parse::<i64>().unwrap_or(-1));
            let edition_segment = segments.next().unwrap_or(-1);
            let chapter_segment = segments.next().unwrap_or(-1);
            if edition_segment != edition.number || chapter_segment != chapter.number {
                self.errors.push(ParseErrorRecord {
                    message: format!(
                        "validation_error: regulation code '{}' does not agree with ancestors {}-{}",
                        regulation.code, edition.number, chapter.number
                    ),
                    line_number: regulation.line_number,
                    state: "validation".to_string(),
                    timestamp: now_utc_string(),
                });
            }
        }

        let statistics = ParseStatistics {
            total_lines: self.line_number,
            editions: self.arena.editions.len(),
            chapters: self.arena.chapters.len(),
            regulations: self.arena.regulations.len(),
            articles: self.arena.articles.len(),
            clauses: self.arena.clauses.len(),
            skipped_lines: self.skipped_lines,
            error_lines: self.errors.len(),
        };

        ParseOutcome {
            arena: self.arena,
            statistics,
            errors: self.errors,
            heading_lines: self.heading_lines,
            content_lines: self.content_lines,
        }
    }

    fn open_edition(&mut self, number: i64, title: String) {
        self.heading_lines += 1;
        let title = fallback_title(title, || format!("제{number}편"));
        let index = self.arena.push_edition(number, title, false);
        self.current_edition = Some(index);
        self.current_chapter = None;
        self.current_regulation = None;
        self.current_article = None;
        self.current_clause = None;
        self.state = ParserState::Edition;
    }

    fn open_chapter(&mut self, number: i64, title: String) {
        self.heading_lines += 1;
        let (edition, recovered) = match self.require_edition() {
            Ok(index) => (index, false),
            Err(MissingParent) => {
                self.record_error(format!(
                    "chapter {number} appeared before any edition heading; attached to the uncategorized edition"
                ));
                (self.synthesize_edition(), true)
            }
        };

        let title = fallback_title(title, || format!("제{number}장"));
        let index = self.arena.push_chapter(edition, number, title, false);
        self.current_edition = Some(edition);
        self.current_chapter = Some(index);
        self.current_regulation = None;
        self.current_article = None;
        self.current_clause = None;
        self.state = if recovered {
            ParserState::Skip
        } else {
            ParserState::Chapter
        };
    }

    fn open_regulation(&mut self, code: String, title: String) {
        self.heading_lines += 1;
        let (chapter, recovered) = match self.require_chapter() {
            Ok(index) => (index, false),
            Err(MissingParent) => {
                self.record_error(format!(
                    "regulation {code} appeared with no open chapter; attached to the uncategorized chapter"
                ));
                (self.synthesize_chapter(), true)
            }
        };

        let title = fallback_title(title, || format!("규정 {code}"));
        let index = self
            .arena
            .push_regulation(chapter, code, title, self.line_number);
        self.current_chapter = Some(chapter);
        self.current_regulation = Some(index);
        self.current_article = None;
        self.current_clause = None;
        self.state = if recovered {
            ParserState::Skip
        } else {
            ParserState::Regulation
        };
    }

    fn open_article(&mut self, number: i64, title: Option<String>, body: String) {
        self.heading_lines += 1;
        let (regulation, recovered) = match self.require_regulation() {
            Ok(index) => (index, false),
            Err(MissingParent) => {
                self.record_error(format!(
                    "article {number} appeared with no open regulation; attached to a placeholder regulation"
                ));
                (self.synthesize_regulation(), true)
            }
        };

        let index = self.arena.push_article(regulation, number, title, body);
        self.current_regulation = Some(regulation);
        self.current_article = Some(index);
        self.current_clause = None;
        self.state = if recovered {
            ParserState::Skip
        } else {
            ParserState::Article
        };
    }

    fn open_clause(&mut self, number: i64, body: String, clause_type: ClauseType) {
        self.heading_lines += 1;
        let (article, recovered) = match self.require_article() {
            Ok(index) => (index, false),
            Err(MissingParent) => {
                self.record_error(format!(
                    "clause {number} appeared with no open article; attached to a placeholder article"
                ));
                (self.synthesize_article(), true)
            }
        };

        let index = self.arena.push_clause(article, number, body, clause_type);
        self.current_article = Some(article);
        self.current_clause = Some(index);
        self.state = if recovered {
            ParserState::Skip
        } else {
            ParserState::Clause
        };
    }

    /// Content attaches to the deepest open node, but only while the machine
    /// is anchored below the regulation level. Everywhere else the line has
    /// no home and is counted skipped.
    fn append_content(&mut self, line: &str) {
        match self.state {
            ParserState::Regulation | ParserState::Article | ParserState::Clause => {
                if let Some(index) = self.current_clause {
                    DocumentArena::append_content(&mut self.arena.clauses[index].content, line);
                } else if let Some(index) = self.current_article {
                    DocumentArena::append_content(&mut self.arena.articles[index].content, line);
                } else if let Some(index) = self.current_regulation {
                    DocumentArena::append_content(
                        &mut self.arena.regulations[index].content,
                        line,
                    );
                } else {
                    self.skipped_lines += 1;
                    self.state = ParserState::Skip;
                    return;
                }
                self.content_lines += 1;
            }
            _ => {
                self.skipped_lines += 1;
                self.state = ParserState::Skip;
            }
        }
    }

    fn require_edition(&self) -> Result<usize, MissingParent> {
        self.current_edition.ok_or(MissingParent)
    }

    fn require_chapter(&self) -> Result<usize, MissingParent> {
        self.current_chapter.ok_or(MissingParent)
    }

    fn require_regulation(&self) -> Result<usize, MissingParent> {
        self.current_regulation.ok_or(MissingParent)
    }

    fn require_article(&self) -> Result<usize, MissingParent> {
        self.current_article.ok_or(MissingParent)
    }

    fn synthesize_edition(&mut self) -> usize {
        if let Some(index) = self
            .arena
            .editions
            .iter()
            .position(|edition| edition.synthetic)
        {
            return index;
        }
        self.arena
            .push_edition(0, UNCATEGORIZED_TITLE.to_string(), true)
    }

    fn synthesize_chapter(&mut self) -> usize {
        let edition = match self.current_edition {
            Some(index) => index,
            None => {
                let index = self.synthesize_edition();
                self.current_edition = Some(index);
                index
            }
        };

        if let Some(index) = self.arena.synthetic_chapter_of(edition) {
            return index;
        }
        self.arena
            .push_chapter(edition, 0, UNCATEGORIZED_TITLE.to_string(), true)
    }

    fn synthesize_regulation(&mut self) -> usize {
        let chapter = match self.current_chapter {
            Some(index) => index,
            None => {
                let index = self.synthesize_chapter();
                self.current_chapter = Some(index);
                index
            }
        };

        let edition_number = self.arena.editions[self.arena.chapters[chapter].edition].number;
        let chapter_number = self.arena.chapters[chapter].number;
        let code = format!("{edition_number}-{chapter_number}-0");

        if let Some(index) = self.arena.chapters[chapter]
            .regulations
            .iter()
            .copied()
            .find(|&regulation| self.arena.regulations[regulation].code == code)
        {
            return index;
        }
        self.arena.push_regulation(
            chapter,
            code,
            UNCATEGORIZED_TITLE.to_string(),
            self.line_number,
        )
    }

    fn synthesize_article(&mut self) -> usize {
        let regulation = match self.current_regulation {
            Some(index) => index,
            None => {
                let index = self.synthesize_regulation();
                self.current_regulation = Some(index);
                index
            }
        };

        if let Some(index) = self.arena.regulations[regulation]
            .articles
            .iter()
            .copied()
            .find(|&article| self.arena.articles[article].number == 0)
        {
            return index;
        }
        self.arena
            .push_article(regulation, 0, None, String::new())
    }

    fn record_error(&mut self, message: String) {
        self.errors.push(ParseErrorRecord {
            message,
            line_number: self.line_number,
            state: self.state.as_str().to_string(),
            timestamp: now_utc_string(),
        });
    }
}

fn fallback_title(title: String, fallback: impl FnOnce() -> String) -> String {
    if title.is_empty() { fallback() } else { title }
}
