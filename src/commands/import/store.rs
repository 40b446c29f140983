use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

use crate::util::now_utc_string;

pub const DB_SCHEMA_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, Copy)]
pub struct Upsert {
    pub id: i64,
    pub created: bool,
}

#[derive(Debug, Clone)]
pub struct EditionRow {
    pub number: i64,
    pub title: String,
    pub description: Option<String>,
    pub sort_order: i64,
}

#[derive(Debug, Clone)]
pub struct ChapterRow {
    pub edition_id: i64,
    pub number: i64,
    pub title: String,
    pub description: Option<String>,
    pub sort_order: i64,
}

#[derive(Debug, Clone)]
pub struct RegulationRow {
    pub chapter_id: i64,
    pub code: String,
    pub number: i64,
    pub title: String,
    pub content: Option<String>,
    pub status: String,
    pub sort_order: i64,
}

#[derive(Debug, Clone)]
pub struct ArticleRow {
    pub regulation_id: i64,
    pub number: i64,
    pub title: Option<String>,
    pub content: String,
    pub sort_order: i64,
}

#[derive(Debug, Clone)]
pub struct ClauseRow {
    pub article_id: i64,
    pub number: i64,
    pub content: String,
    pub clause_type: String,
    pub sort_order: i64,
}

/// Persistence port the importer and retry handler are handed. Upserts key on
/// the natural key of each level; `begin`/`commit`/`rollback` scope one
/// edition subtree.
pub trait StorePort {
    fn begin_edition_tx(&mut self) -> Result<()>;
    fn commit_edition_tx(&mut self) -> Result<()>;
    fn rollback_edition_tx(&mut self) -> Result<()>;

    fn upsert_edition(&mut self, row: &EditionRow) -> Result<Upsert>;
    fn upsert_chapter(&mut self, row: &ChapterRow) -> Result<Upsert>;
    fn upsert_regulation(&mut self, row: &RegulationRow) -> Result<Upsert>;
    fn upsert_article(&mut self, row: &ArticleRow) -> Result<Upsert>;
    fn upsert_clause(&mut self, row: &ClauseRow) -> Result<Upsert>;

    fn find_edition_id(&mut self, number: i64) -> Result<Option<i64>>;
    fn find_chapter_id(&mut self, edition_id: i64, number: i64) -> Result<Option<i64>>;
    fn find_regulation_id(&mut self, code: &str) -> Result<Option<i64>>;
    fn find_article_id(&mut self, regulation_id: i64, number: i64) -> Result<Option<i64>>;
}

#[derive(Debug)]
pub struct SqliteStore {
    connection: Connection,
    in_transaction: bool,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let connection = Connection::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        Self::from_connection(connection)
    }

    pub fn open_in_memory() -> Result<Self> {
        let connection =
            Connection::open_in_memory().context("failed to open in-memory store")?;
        Self::from_connection(connection)
    }

    fn from_connection(connection: Connection) -> Result<Self> {
        configure_connection(&connection)?;
        ensure_schema(&connection)?;
        Ok(Self {
            connection,
            in_transaction: false,
        })
    }
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    connection
        .pragma_update(None, "foreign_keys", "ON")
        .context("failed to set foreign_keys=ON")?;
    Ok(())
}

fn ensure_schema(connection: &Connection) -> Result<()> {
    connection.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS editions (
          edition_id INTEGER PRIMARY KEY,
          number INTEGER NOT NULL UNIQUE,
          title TEXT NOT NULL CHECK(length(title) > 0),
          description TEXT,
          sort_order INTEGER NOT NULL DEFAULT 0,
          created_at TEXT NOT NULL,
          updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS chapters (
          chapter_id INTEGER PRIMARY KEY,
          edition_id INTEGER NOT NULL REFERENCES editions(edition_id) ON DELETE CASCADE,
          number INTEGER NOT NULL,
          title TEXT NOT NULL CHECK(length(title) > 0),
          description TEXT,
          sort_order INTEGER NOT NULL DEFAULT 0,
          UNIQUE(edition_id, number)
        );

        CREATE TABLE IF NOT EXISTS regulations (
          regulation_id INTEGER PRIMARY KEY,
          chapter_id INTEGER NOT NULL REFERENCES chapters(chapter_id) ON DELETE CASCADE,
          code TEXT NOT NULL UNIQUE,
          number INTEGER NOT NULL,
          title TEXT NOT NULL CHECK(length(title) > 0),
          content TEXT,
          status TEXT NOT NULL DEFAULT 'active' CHECK(status IN ('active', 'repealed')),
          sort_order INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS articles (
          article_id INTEGER PRIMARY KEY,
          regulation_id INTEGER NOT NULL REFERENCES regulations(regulation_id) ON DELETE CASCADE,
          number INTEGER NOT NULL,
          title TEXT,
          content TEXT NOT NULL,
          sort_order INTEGER NOT NULL DEFAULT 0,
          UNIQUE(regulation_id, number)
        );

        CREATE TABLE IF NOT EXISTS clauses (
          clause_id INTEGER PRIMARY KEY,
          article_id INTEGER NOT NULL REFERENCES articles(article_id) ON DELETE CASCADE,
          number INTEGER NOT NULL,
          content TEXT NOT NULL,
          clause_type TEXT NOT NULL
            CHECK(clause_type IN ('paragraph', 'subparagraph', 'item', 'subitem')),
          sort_order INTEGER NOT NULL DEFAULT 0,
          UNIQUE(article_id, number)
        );

        CREATE INDEX IF NOT EXISTS idx_chapters_edition ON chapters(edition_id, sort_order);
        CREATE INDEX IF NOT EXISTS idx_regulations_chapter ON regulations(chapter_id, sort_order);
        CREATE INDEX IF NOT EXISTS idx_articles_regulation ON articles(regulation_id, sort_order);
        CREATE INDEX IF NOT EXISTS idx_clauses_article ON clauses(article_id, sort_order);
        ",
    )?;

    let now = now_utc_string();
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now],
    )?;

    Ok(())
}

impl StorePort for SqliteStore {
    fn begin_edition_tx(&mut self) -> Result<()> {
        self.connection
            .execute_batch("BEGIN IMMEDIATE")
            .context("failed to begin edition transaction")?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit_edition_tx(&mut self) -> Result<()> {
        self.connection
            .execute_batch("COMMIT")
            .context("failed to commit edition transaction")?;
        self.in_transaction = false;
        Ok(())
    }

    fn rollback_edition_tx(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Ok(());
        }
        self.connection
            .execute_batch("ROLLBACK")
            .context("failed to roll back edition transaction")?;
        self.in_transaction = false;
        Ok(())
    }

    fn upsert_edition(&mut self, row: &EditionRow) -> Result<Upsert> {
        let existing = self.find_edition_id(row.number)?;
        let now = now_utc_string();
        self.connection.execute(
            "INSERT INTO editions(number, title, description, sort_order, created_at, updated_at)
             VALUES(?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(number) DO UPDATE SET
               title=excluded.title,
               description=excluded.description,
               sort_order=excluded.sort_order,
               updated_at=excluded.updated_at",
            params![row.number, row.title, row.description, row.sort_order, now],
        )?;

        let id = match existing {
            Some(id) => id,
            None => self.connection.last_insert_rowid(),
        };
        Ok(Upsert {
            id,
            created: existing.is_none(),
        })
    }

    fn upsert_chapter(&mut self, row: &ChapterRow) -> Result<Upsert> {
        let existing = self.find_chapter_id(row.edition_id, row.number)?;
        self.connection.execute(
            "INSERT INTO chapters(edition_id, number, title, description, sort_order)
             VALUES(?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(edition_id, number) DO UPDATE SET
               title=excluded.title,
               description=excluded.description,
               sort_order=excluded.sort_order",
            params![
                row.edition_id,
                row.number,
                row.title,
                row.description,
                row.sort_order
            ],
        )?;

        let id = match existing {
            Some(id) => id,
            None => self.connection.last_insert_rowid(),
        };
        Ok(Upsert {
            id,
            created: existing.is_none(),
        })
    }

    fn upsert_regulation(&mut self, row: &RegulationRow) -> Result<Upsert> {
        let existing = self.find_regulation_id(&row.code)?;
        self.connection.execute(
            "INSERT INTO regulations(chapter_id, code, number, title, content, status, sort_order)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(code) DO UPDATE SET
               chapter_id=excluded.chapter_id,
               number=excluded.number,
               title=excluded.title,
               content=excluded.content,
               status=excluded.status,
               sort_order=excluded.sort_order",
            params![
                row.chapter_id,
                row.code,
                row.number,
                row.title,
                row.content,
                row.status,
                row.sort_order
            ],
        )?;

        let id = match existing {
            Some(id) => id,
            None => self.connection.last_insert_rowid(),
        };
        Ok(Upsert {
            id,
            created: existing.is_none(),
        })
    }

    fn upsert_article(&mut self, row: &ArticleRow) -> Result<Upsert> {
        let existing = self.find_article_id(row.regulation_id, row.number)?;
        self.connection.execute(
            "INSERT INTO articles(regulation_id, number, title, content, sort_order)
             VALUES(?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(regulation_id, number) DO UPDATE SET
               title=excluded.title,
               content=excluded.content,
               sort_order=excluded.sort_order",
            params![
                row.regulation_id,
                row.number,
                row.title,
                row.content,
                row.sort_order
            ],
        )?;

        let id = match existing {
            Some(id) => id,
            None => self.connection.last_insert_rowid(),
        };
        Ok(Upsert {
            id,
            created: existing.is_none(),
        })
    }

    fn upsert_clause(&mut self, row: &ClauseRow) -> Result<Upsert> {
        let existing: Option<i64> = self
            .connection
            .query_row(
                "SELECT clause_id FROM clauses WHERE article_id = ?1 AND number = ?2",
                params![row.article_id, row.number],
                |sqlite_row| sqlite_row.get(0),
            )
            .optional()?;
        self.connection.execute(
            "INSERT INTO clauses(article_id, number, content, clause_type, sort_order)
             VALUES(?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(article_id, number) DO UPDATE SET
               content=excluded.content,
               clause_type=excluded.clause_type,
               sort_order=excluded.sort_order",
            params![
                row.article_id,
                row.number,
                row.content,
                row.clause_type,
                row.sort_order
            ],
        )?;

        let id = match existing {
            Some(id) => id,
            None => self.connection.last_insert_rowid(),
        };
        Ok(Upsert {
            id,
            created: existing.is_none(),
        })
    }

    fn find_edition_id(&mut self, number: i64) -> Result<Option<i64>> {
        let id = self
            .connection
            .query_row(
                "SELECT edition_id FROM editions WHERE number = ?1",
                params![number],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn find_chapter_id(&mut self, edition_id: i64, number: i64) -> Result<Option<i64>> {
        let id = self
            .connection
            .query_row(
                "SELECT chapter_id FROM chapters WHERE edition_id = ?1 AND number = ?2",
                params![edition_id, number],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn find_regulation_id(&mut self, code: &str) -> Result<Option<i64>> {
        let id = self
            .connection
            .query_row(
                "SELECT regulation_id FROM regulations WHERE code = ?1",
                params![code],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn find_article_id(&mut self, regulation_id: i64, number: i64) -> Result<Option<i64>> {
        let id = self
            .connection
            .query_row(
                "SELECT article_id FROM articles WHERE regulation_id = ?1 AND number = ?2",
                params![regulation_id, number],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }
}
