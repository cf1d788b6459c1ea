//! Paper documents (submission and final versions)

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use cfp_common::MessageSet;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

/// Which version of the paper a document is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentType {
    Submission,
    Final,
}

impl DocumentType {
    pub const ALL: [DocumentType; 2] = [DocumentType::Submission, DocumentType::Final];

    /// JSON key and database `dtype`
    pub fn key(self) -> &'static str {
        match self {
            DocumentType::Submission => "submission",
            DocumentType::Final => "final",
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            DocumentType::Submission => "submission_doc",
            DocumentType::Final => "final_doc",
        }
    }
}

/// Stored document metadata (content stays in the database)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRow {
    pub document_id: i64,
    pub filename: Option<String>,
    pub mimetype: String,
    pub size: i64,
    /// `sha2-` followed by the hex SHA-256 of the content
    pub hash: String,
}

pub async fn fetch_document(db: &SqlitePool, document_id: i64) -> sqlx::Result<Option<DocumentRow>> {
    let row: Option<(i64, Option<String>, String, i64, String)> = sqlx::query_as(
        "SELECT document_id, filename, mimetype, size, hash FROM documents WHERE document_id = ?",
    )
    .bind(document_id)
    .fetch_optional(db)
    .await?;
    Ok(row.map(|(document_id, filename, mimetype, size, hash)| DocumentRow {
        document_id,
        filename,
        mimetype,
        size,
        hash,
    }))
}

/// Document content fetched for download
pub async fn fetch_document_content(
    db: &SqlitePool,
    document_id: i64,
) -> sqlx::Result<Option<Vec<u8>>> {
    sqlx::query_scalar("SELECT content FROM documents WHERE document_id = ?")
        .bind(document_id)
        .fetch_optional(db)
        .await
}

/// Incoming document description
///
/// Exactly one content source must be present by the time the document is
/// saved; `content_file` references are turned into `content` by a
/// [`DocumentImporter`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentJson {
    pub content: Option<Vec<u8>>,
    pub content_file: Option<String>,
    pub filename: Option<String>,
    pub mimetype: Option<String>,
}

impl DocumentJson {
    /// Parse a JSON document object, reporting problems at `field`
    pub fn from_json(j: &Map<String, Value>, field: &str, messages: &mut MessageSet) -> Option<Self> {
        let mut doc = DocumentJson::default();
        let mut sources = 0;

        match j.get("content") {
            Some(Value::String(s)) => {
                doc.content = Some(s.as_bytes().to_vec());
                sources += 1;
            }
            Some(Value::Null) | None => {}
            Some(_) => {
                messages.error_at(Some(field), "Format error [content]");
                return None;
            }
        }
        match j.get("content_base64") {
            Some(Value::String(s)) => match BASE64.decode(s.trim()) {
                Ok(bytes) => {
                    doc.content = Some(bytes);
                    sources += 1;
                }
                Err(_) => {
                    messages.error_at(Some(field), "Format error [content_base64]");
                    return None;
                }
            },
            Some(Value::Null) | None => {}
            Some(_) => {
                messages.error_at(Some(field), "Format error [content_base64]");
                return None;
            }
        }
        match j.get("content_file") {
            Some(Value::String(s)) => {
                doc.content_file = Some(s.clone());
                sources += 1;
            }
            Some(Value::Null) | None => {}
            Some(_) => {
                messages.error_at(Some(field), "Format error [content_file]");
                return None;
            }
        }

        if sources > 1 {
            messages.error_at(Some(field), "Document has more than one content source");
            return None;
        }

        doc.filename = string_member(j, "filename");
        doc.mimetype = string_member(j, "mimetype");
        Some(doc)
    }
}

fn string_member(j: &Map<String, Value>, key: &str) -> Option<String> {
    j.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Hook that resolves `content_file` references while a paper is prepared
pub trait DocumentImporter: Send + Sync {
    /// Fill in `doc.content`; return false after reporting an error at `field`
    fn import(&self, doc: &mut DocumentJson, field: &str, messages: &mut MessageSet) -> bool;
}

/// Document content ready to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub content: Vec<u8>,
    pub filename: Option<String>,
    pub mimetype: String,
    pub hash: String,
}

impl NewDocument {
    pub fn new(content: Vec<u8>, filename: Option<String>, mimetype: Option<String>) -> Self {
        let mimetype = mimetype.unwrap_or_else(|| sniff_mimetype(&content).to_string());
        let hash = content_hash(&content);
        Self {
            content,
            filename,
            mimetype,
            hash,
        }
    }

    pub fn size(&self) -> i64 {
        self.content.len() as i64
    }
}

/// `sha2-` prefixed hex SHA-256
pub fn content_hash(content: &[u8]) -> String {
    format!("sha2-{:x}", Sha256::digest(content))
}

pub fn sniff_mimetype(content: &[u8]) -> &'static str {
    if content.starts_with(b"%PDF-") {
        "application/pdf"
    } else {
        "application/octet-stream"
    }
}
