//! Paper records and their storage

pub mod document;
pub mod export;
pub mod status;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

pub use document::{DocumentImporter, DocumentJson, DocumentRow, DocumentType};
pub use export::paper_json;
pub use status::{FormData, FormFile, PaperStatus};

/// Submission lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperState {
    #[default]
    Draft,
    Submitted,
    Withdrawn,
}

impl PaperState {
    pub fn as_str(self) -> &'static str {
        match self {
            PaperState::Draft => "draft",
            PaperState::Submitted => "submitted",
            PaperState::Withdrawn => "withdrawn",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(PaperState::Draft),
            "submitted" => Some(PaperState::Submitted),
            "withdrawn" => Some(PaperState::Withdrawn),
            _ => None,
        }
    }
}

/// One author of a paper, in display order
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Author {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub first: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub affiliation: String,
}

impl Author {
    pub fn name(&self) -> String {
        match (self.first.is_empty(), self.last.is_empty()) {
            (false, false) => format!("{} {}", self.first, self.last),
            (false, true) => self.first.clone(),
            _ => self.last.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_empty() && self.last.is_empty() && self.email.is_empty()
    }
}

/// A stored paper with everything needed for export and search
#[derive(Debug, Clone, PartialEq)]
pub struct PaperRow {
    pub paper_id: i64,
    pub title: String,
    pub abstract_text: String,
    pub status: PaperState,
    pub submission_class: String,
    pub authors: Vec<Author>,
    pub topics: Vec<String>,
    pub submission: Option<DocumentRow>,
    pub final_doc: Option<DocumentRow>,
}

impl PaperRow {
    pub fn document(&self, dtype: DocumentType) -> Option<&DocumentRow> {
        match dtype {
            DocumentType::Submission => self.submission.as_ref(),
            DocumentType::Final => self.final_doc.as_ref(),
        }
    }
}

type PaperTuple = (i64, String, String, String, String, Option<i64>, Option<i64>);

const PAPER_COLUMNS: &str =
    "paper_id, title, abstract, status, submission_class, submission_doc, final_doc";

/// Load one paper, or `None` if it does not exist
pub async fn fetch_paper(db: &SqlitePool, paper_id: i64) -> sqlx::Result<Option<PaperRow>> {
    let row: Option<PaperTuple> =
        sqlx::query_as(&format!("SELECT {PAPER_COLUMNS} FROM papers WHERE paper_id = ?"))
            .bind(paper_id)
            .fetch_optional(db)
            .await?;
    match row {
        Some(row) => Ok(Some(hydrate(db, row).await?)),
        None => Ok(None),
    }
}

/// Load every paper in id order
pub async fn fetch_all_papers(db: &SqlitePool) -> sqlx::Result<Vec<PaperRow>> {
    let rows: Vec<PaperTuple> =
        sqlx::query_as(&format!("SELECT {PAPER_COLUMNS} FROM papers ORDER BY paper_id"))
            .fetch_all(db)
            .await?;
    let mut papers = Vec::with_capacity(rows.len());
    for row in rows {
        papers.push(hydrate(db, row).await?);
    }
    Ok(papers)
}

async fn hydrate(db: &SqlitePool, row: PaperTuple) -> sqlx::Result<PaperRow> {
    let (paper_id, title, abstract_text, status, submission_class, submission_doc, final_doc) = row;

    let authors = sqlx::query_as::<_, (String, String, String, String)>(
        "SELECT first, last, email, affiliation FROM paper_authors WHERE paper_id = ? ORDER BY ord",
    )
    .bind(paper_id)
    .fetch_all(db)
    .await?
    .into_iter()
    .map(|(first, last, email, affiliation)| Author {
        first,
        last,
        email,
        affiliation,
    })
    .collect();

    let topics = sqlx::query_scalar::<_, String>(
        "SELECT t.name FROM paper_topics pt JOIN topics t ON pt.topic_id = t.topic_id
         WHERE pt.paper_id = ? ORDER BY t.name COLLATE NOCASE",
    )
    .bind(paper_id)
    .fetch_all(db)
    .await?;

    let submission = match submission_doc {
        Some(id) => document::fetch_document(db, id).await?,
        None => None,
    };
    let final_doc = match final_doc {
        Some(id) => document::fetch_document(db, id).await?,
        None => None,
    };

    Ok(PaperRow {
        paper_id,
        title,
        abstract_text,
        status: PaperState::parse(&status).unwrap_or_default(),
        submission_class,
        authors,
        topics,
        submission,
        final_doc,
    })
}

/// Canonical names of known topics, matched case-insensitively
pub async fn lookup_topics(db: &SqlitePool, names: &[String]) -> sqlx::Result<Vec<Option<String>>> {
    let mut found = Vec::with_capacity(names.len());
    for name in names {
        let canonical: Option<String> =
            sqlx::query_scalar("SELECT name FROM topics WHERE name = ? COLLATE NOCASE")
                .bind(name.trim())
                .fetch_optional(db)
                .await?;
        found.push(canonical);
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_parse_round_trip() {
        for state in [PaperState::Draft, PaperState::Submitted, PaperState::Withdrawn] {
            assert_eq!(PaperState::parse(state.as_str()), Some(state));
        }
        assert_eq!(PaperState::parse(" Submitted "), Some(PaperState::Submitted));
        assert_eq!(PaperState::parse("accepted"), None);
    }

    #[test]
    fn test_author_name() {
        let a = Author {
            first: "Ada".into(),
            last: "Lovelace".into(),
            ..Default::default()
        };
        assert_eq!(a.name(), "Ada Lovelace");
        let b = Author {
            last: "Hopper".into(),
            ..Default::default()
        };
        assert_eq!(b.name(), "Hopper");
        assert!(Author::default().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_missing_paper() {
        let db = cfp_common::db::init_memory_database().await.unwrap();
        assert_eq!(fetch_paper(&db, 1).await.unwrap(), None);
        assert!(fetch_all_papers(&db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_topics_case_insensitive() {
        let db = cfp_common::db::init_memory_database().await.unwrap();
        cfp_common::db::seed_topics(&db, &["Networking".to_string()])
            .await
            .unwrap();

        let found = lookup_topics(&db, &["networking".to_string(), "Graphics".to_string()])
            .await
            .unwrap();
        assert_eq!(found, vec![Some("Networking".to_string()), None]);
    }
}
