//! Database initialization
//!
//! Creates the paper store on first run. Every statement is idempotent so the
//! same sequence runs on each startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Open (creating if needed) the database file and ensure the schema exists
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Per-connection pragmas, applied to every connection the pool opens
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        // WAL allows concurrent readers while a save is in progress
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database with the schema applied
///
/// An in-memory SQLite database lives per connection, so the pool is capped
/// at one connection.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Create all tables (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_papers_table(pool).await?;
    create_paper_authors_table(pool).await?;
    create_topics_table(pool).await?;
    create_paper_topics_table(pool).await?;
    create_documents_table(pool).await?;
    create_action_log_table(pool).await?;

    debug!("Database schema verified");
    Ok(())
}

async fn create_papers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS papers (
            paper_id INTEGER PRIMARY KEY,
            title TEXT NOT NULL DEFAULT '',
            abstract TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'draft'
                CHECK (status IN ('draft', 'submitted', 'withdrawn')),
            submission_class TEXT NOT NULL DEFAULT '',
            submission_doc INTEGER,
            final_doc INTEGER,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_papers_title ON papers(title)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_paper_authors_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS paper_authors (
            paper_id INTEGER NOT NULL REFERENCES papers(paper_id) ON DELETE CASCADE,
            ord INTEGER NOT NULL,
            first TEXT NOT NULL DEFAULT '',
            last TEXT NOT NULL DEFAULT '',
            email TEXT NOT NULL DEFAULT '',
            affiliation TEXT NOT NULL DEFAULT '',
            PRIMARY KEY (paper_id, ord)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_topics_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS topics (
            topic_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE COLLATE NOCASE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_paper_topics_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS paper_topics (
            paper_id INTEGER NOT NULL REFERENCES papers(paper_id) ON DELETE CASCADE,
            topic_id INTEGER NOT NULL REFERENCES topics(topic_id) ON DELETE CASCADE,
            PRIMARY KEY (paper_id, topic_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_documents_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            document_id INTEGER PRIMARY KEY AUTOINCREMENT,
            paper_id INTEGER NOT NULL REFERENCES papers(paper_id) ON DELETE CASCADE,
            dtype TEXT NOT NULL CHECK (dtype IN ('submission', 'final')),
            filename TEXT,
            mimetype TEXT NOT NULL,
            size INTEGER NOT NULL,
            hash TEXT NOT NULL,
            content BLOB NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_action_log_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS action_log (
            log_id INTEGER PRIMARY KEY AUTOINCREMENT,
            paper_id INTEGER,
            action TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Ensure each named topic exists; returns how many were inserted
pub async fn seed_topics(pool: &SqlitePool, names: &[String]) -> Result<u64> {
    let mut inserted = 0;
    for name in names {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        inserted += sqlx::query("INSERT OR IGNORE INTO topics (name) VALUES (?)")
            .bind(name)
            .execute(pool)
            .await?
            .rows_affected();
    }
    if inserted > 0 {
        info!("Seeded {} topic(s)", inserted);
    }
    Ok(inserted)
}
