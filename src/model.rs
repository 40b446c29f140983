use serde::{Deserialize, Serialize};

/// Clause sub-levels of the document hierarchy. `Subitem` never comes out of
/// the parser; it is accepted at the import boundary for rows written by
/// other tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClauseType {
    Paragraph,
    Subparagraph,
    Item,
    Subitem,
}

impl ClauseType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Paragraph => "paragraph",
            Self::Subparagraph => "subparagraph",
            Self::Item => "item",
            Self::Subitem => "subitem",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "paragraph" => Some(Self::Paragraph),
            "subparagraph" => Some(Self::Subparagraph),
            "item" => Some(Self::Item),
            "subitem" => Some(Self::Subitem),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedClause {
    pub number: i64,
    pub content: String,
    #[serde(rename = "type")]
    pub clause_type: ClauseType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedArticle {
    pub number: i64,
    pub title: Option<String>,
    pub content: String,
    pub clauses: Vec<ParsedClause>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedRegulation {
    pub code: String,
    pub title: String,
    pub content: String,
    pub articles: Vec<ParsedArticle>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedChapter {
    pub number: i64,
    pub title: String,
    pub regulations: Vec<ParsedRegulation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedEdition {
    pub number: i64,
    pub title: String,
    pub chapters: Vec<ParsedChapter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedDocumentData {
    pub editions: Vec<ParsedEdition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseStatistics {
    pub total_lines: usize,
    pub editions: usize,
    pub chapters: usize,
    pub regulations: usize,
    pub articles: usize,
    pub clauses: usize,
    pub skipped_lines: usize,
    pub error_lines: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseErrorRecord {
    pub message: String,
    pub line_number: usize,
    pub state: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseMetadata {
    pub parsed_at: String,
    pub parser_version: String,
    pub total_errors: usize,
    pub success_rate_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseOutput {
    pub data: ParsedDocumentData,
    pub statistics: ParseStatistics,
    pub errors: Vec<ParseErrorRecord>,
    pub metadata: ParseMetadata,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelCounters {
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

impl LevelCounters {
    pub fn merge(&mut self, other: Self) {
        self.created += other.created;
        self.updated += other.updated;
        self.failed += other.failed;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportStats {
    pub editions: LevelCounters,
    pub chapters: LevelCounters,
    pub regulations: LevelCounters,
    pub articles: LevelCounters,
    pub clauses: LevelCounters,
}

impl ImportStats {
    pub fn merge(&mut self, other: &ImportStats) {
        self.editions.merge(other.editions);
        self.chapters.merge(other.chapters);
        self.regulations.merge(other.regulations);
        self.articles.merge(other.articles);
        self.clauses.merge(other.clauses);
    }

    pub fn total_processed(&self) -> usize {
        [
            self.editions,
            self.chapters,
            self.regulations,
            self.articles,
            self.clauses,
        ]
        .iter()
        .map(|level| level.created + level.updated + level.failed)
        .sum()
    }
}

/// One persisted failure. `data` carries the raw node plus the ancestor
/// natural keys the retry handler needs to re-resolve parent links.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportErrorRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub timestamp: String,
    pub errors: Vec<String>,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutput {
    pub success: bool,
    pub stats: ImportStats,
    pub total_processed: usize,
    pub total_errors: usize,
    pub errors: Vec<ImportErrorRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Started,
    Loading,
    Analyzing,
    Parsing,
    ParsingComplete,
    Importing,
    Completed,
    Failed,
    Cancelled,
}

impl ProgressStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Loading => "loading",
            Self::Analyzing => "analyzing",
            Self::Parsing => "parsing",
            Self::ParsingComplete => "parsing_complete",
            Self::Importing => "importing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryStats {
    pub total_retries: usize,
    pub successful_retries: usize,
    pub failed_retries: usize,
    pub permanent_failures: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermanentFailureRecord {
    pub record: ImportErrorRecord,
    pub attempts: u32,
    pub last_error: String,
    pub category: String,
    pub failed_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryReport {
    pub retry_stats: RetryStats,
    pub permanent_failure_records: Vec<PermanentFailureRecord>,
    pub recommendations: Vec<String>,
    pub generated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkCheckpoint {
    pub message: String,
    pub timestamp_offset_ms: u64,
    pub memory_bytes: u64,
    pub lines_processed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkMetrics {
    pub lines_per_second: f64,
    pub avg_line_latency_micros: f64,
    pub memory_delta_bytes: i64,
    pub bytes_per_line: f64,
    pub error_rate_percent: f64,
    pub success_rate_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkGrades {
    pub speed: String,
    pub memory: String,
    pub accuracy: String,
    pub overall: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkReport {
    pub generated_at: String,
    pub input_path: String,
    pub duration_ms: u64,
    pub statistics: ParseStatistics,
    pub checkpoints: Vec<BenchmarkCheckpoint>,
    pub metrics: BenchmarkMetrics,
    pub grades: BenchmarkGrades,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFileEntry {
    pub path: String,
    pub sha256: String,
    pub line_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportPaths {
    pub cache_root: String,
    pub manifest_dir: String,
    pub db_path: String,
    pub error_report_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub db_schema_version: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub source: SourceFileEntry,
    pub paths: ImportPaths,
    pub parse_statistics: ParseStatistics,
    pub parse_errors: usize,
    pub import: ImportOutput,
    pub warnings: Vec<String>,
    pub notes: Vec<String>,
}
