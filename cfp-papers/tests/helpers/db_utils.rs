//! Database Test Utilities
//!
//! Temporary databases seeded from `tests/fixtures/papers.json`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use cfp_common::config::ServiceConfig;
use cfp_common::db::{init_database, seed_topics};
use cfp_papers::paper::PaperStatus;
use cfp_papers::{build_router, AppState};
use serde::Deserialize;
use serde_json::Value;
use sqlx::SqlitePool;
use tempfile::TempDir;

#[derive(Debug, Deserialize)]
struct Fixture {
    topics: Vec<String>,
    papers: Vec<Value>,
}

/// Temporary database plus the configuration the fixtures expect
///
/// `_dir` must stay alive for the duration of the test.
pub struct TestDb {
    pub _dir: TempDir,
    pub pool: SqlitePool,
    pub config: ServiceConfig,
}

impl TestDb {
    pub fn state(&self) -> AppState {
        AppState::new(self.pool.clone(), self.config.clone())
    }

    pub fn app(&self) -> axum::Router {
        build_router(self.state())
    }
}

/// Configuration used by every integration test
pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        submission_classes: vec!["poster".to_string()],
        max_document_bytes: 1024 * 1024,
        ..ServiceConfig::default()
    }
}

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/papers.json")
}

/// Create a temporary database holding the fixture papers
pub async fn create_test_db() -> Result<TestDb> {
    let dir = TempDir::new()?;
    let pool = init_database(&dir.path().join("test_cfp.db")).await?;
    let config = test_config();
    load_fixture_papers(&pool, &config).await?;
    Ok(TestDb {
        _dir: dir,
        pool,
        config,
    })
}

/// Empty every table and reload the fixture papers
pub async fn reset_db(pool: &SqlitePool, config: &ServiceConfig) -> Result<()> {
    for table in [
        "action_log",
        "paper_topics",
        "paper_authors",
        "documents",
        "papers",
        "topics",
    ] {
        sqlx::query(&format!("DELETE FROM {}", table))
            .execute(pool)
            .await?;
    }
    load_fixture_papers(pool, config).await
}

/// Save every fixture paper through the save pipeline
///
/// Fails with the collected messages when a fixture does not save cleanly.
pub async fn load_fixture_papers(pool: &SqlitePool, config: &ServiceConfig) -> Result<()> {
    let text = std::fs::read_to_string(fixture_path()).context("reading fixture papers")?;
    let fixture: Fixture = serde_json::from_str(&text)?;
    seed_topics(pool, &fixture.topics).await?;

    let config = Arc::new(config.clone());
    for paper in &fixture.papers {
        let mut ps = PaperStatus::new(pool.clone(), config.clone());
        let prepared = ps.prepare_save_json(paper).await?;
        if !prepared || !ps.execute_save().await {
            let problems: Vec<String> = ps
                .messages()
                .iter()
                .map(|mi| format!("    {}: {}", mi.field.as_deref().unwrap_or(""), mi.message))
                .collect();
            bail!(
                "failed to create paper {}:\n{}",
                paper["title"],
                problems.join("\n")
            );
        }
    }
    Ok(())
}
