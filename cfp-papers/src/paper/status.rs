//! Paper save pipeline
//!
//! `PaperStatus` turns one incoming paper (JSON object or web form) into a
//! validated change set, then writes it in a single transaction. Preparing
//! never aborts early: every problem is recorded in the message set so a
//! client sees all of them at once.

use std::sync::Arc;

use cfp_common::config::ServiceConfig;
use cfp_common::params::simplify_whitespace;
use cfp_common::MessageSet;
use serde_json::{Map, Value};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use super::document::{DocumentImporter, DocumentJson, DocumentType, NewDocument};
use super::{fetch_paper, lookup_topics, Author, PaperRow, PaperState};
use crate::pid::{json_pid, Pidish};

/// Top-level keys understood in paper JSON
const KNOWN_KEYS: &[&str] = &[
    "object",
    "pid",
    "id",
    "__original_pid",
    "title",
    "abstract",
    "authors",
    "topics",
    "status",
    "submission_class",
    "submission",
    "final",
];

/// Uploaded file from a multipart form
#[derive(Debug, Clone, Default)]
pub struct FormFile {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub content: Vec<u8>,
}

/// Decoded web form (urlencoded or multipart)
#[derive(Debug, Clone, Default)]
pub struct FormData {
    pub fields: Vec<(String, String)>,
    pub files: Vec<FormFile>,
}

impl FormData {
    /// Last value of a field
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn file(&self, name: &str) -> Option<&FormFile> {
        self.files.iter().rev().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DocumentChange {
    Set(NewDocument),
    Remove,
}

#[derive(Debug, Default)]
struct PendingChanges {
    title: Option<String>,
    abstract_text: Option<String>,
    authors: Option<Vec<Author>>,
    /// Requested topic names, resolved against known topics in `finish_prepare`
    topics: Option<Vec<String>>,
    create_topics: Vec<String>,
    status: Option<PaperState>,
    submission_class: Option<String>,
    documents: Vec<(DocumentType, DocumentChange)>,
}

/// Validates and saves one paper
pub struct PaperStatus {
    db: SqlitePool,
    config: Arc<ServiceConfig>,
    add_topics: bool,
    importer: Option<Arc<dyn DocumentImporter>>,
    messages: MessageSet,
    prow: Option<PaperRow>,
    /// Requested id for a paper that does not exist yet
    new_pid: Option<i64>,
    changes: PendingChanges,
    changed: Vec<&'static str>,
    saved: Option<PaperRow>,
}

impl std::fmt::Debug for PaperStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaperStatus")
            .field("pid", &self.prow.as_ref().map(|p| p.paper_id).or(self.new_pid))
            .field("changed", &self.changed)
            .field("messages", &self.messages)
            .finish()
    }
}

impl PaperStatus {
    pub fn new(db: SqlitePool, config: Arc<ServiceConfig>) -> Self {
        Self {
            db,
            config,
            add_topics: false,
            importer: None,
            messages: MessageSet::new(),
            prow: None,
            new_pid: None,
            changes: PendingChanges::default(),
            changed: Vec::new(),
            saved: None,
        }
    }

    /// Create unknown topics instead of ignoring them
    pub fn set_add_topics(mut self, add_topics: bool) -> Self {
        self.add_topics = add_topics;
        self
    }

    /// Resolve `content_file` document references through `importer`
    pub fn on_document_import(mut self, importer: Arc<dyn DocumentImporter>) -> Self {
        self.importer = Some(importer);
        self
    }

    /// Prepare a save from a paper JSON object
    ///
    /// Returns `Ok(false)` when validation failed; `Err` only for storage
    /// failures.
    pub async fn prepare_save_json(&mut self, jp: &Value) -> cfp_common::Result<bool> {
        let Some(obj) = jp.as_object() else {
            self.messages.error_at(None, "Expected object");
            return Ok(false);
        };

        match json_pid(obj) {
            None => {
                self.messages.error_at(Some("pid"), "Bad `pid`");
                return Ok(false);
            }
            Some(Pidish::Id(pid)) => {
                self.prow = fetch_paper(&self.db, pid).await?;
                if self.prow.is_none() {
                    self.new_pid = Some(pid);
                }
            }
            Some(Pidish::New) => {}
        }

        for key in obj.keys() {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                self.messages
                    .warning_at(Some(key.as_str()), "Unknown field ignored");
            }
        }
        if let Some(object) = obj.get("object") {
            if object != "paper" {
                self.messages.error_at(Some("object"), "Expected paper object");
            }
        }

        if let Some(title) = self.json_string(obj, "title") {
            self.changes.title = Some(simplify_whitespace(&title));
        }
        if let Some(abstract_text) = self.json_string(obj, "abstract") {
            self.changes.abstract_text = Some(abstract_text.trim().to_string());
        }
        match obj.get("authors") {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => self.parse_json_authors(items),
            Some(_) => self.format_error("authors"),
        }
        match obj.get("topics") {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => {
                let mut names = Vec::with_capacity(items.len());
                for item in items {
                    match item.as_str() {
                        Some(name) => names.push(name.to_string()),
                        None => self.format_error("topics"),
                    }
                }
                self.changes.topics = Some(names);
            }
            Some(_) => self.format_error("topics"),
        }
        if let Some(status) = self.json_string(obj, "status") {
            self.set_status(&status);
        }
        if let Some(sclass) = self.json_string(obj, "submission_class") {
            self.changes.submission_class = Some(sclass.trim().to_string());
        }
        for dtype in DocumentType::ALL {
            match obj.get(dtype.key()) {
                None => {}
                Some(Value::Null) => self.changes.documents.push((dtype, DocumentChange::Remove)),
                Some(Value::Object(dj)) => {
                    if let Some(doc) = DocumentJson::from_json(dj, dtype.key(), &mut self.messages) {
                        self.set_document(dtype, doc);
                    }
                }
                Some(_) => self.format_error(dtype.key()),
            }
        }

        self.finish_prepare().await
    }

    /// Prepare a save from a web form
    ///
    /// `prow` is the edited paper; without it a new paper in submission class
    /// `sclass` is created. Fields missing from the form keep their values.
    pub async fn prepare_save_form(
        &mut self,
        form: &FormData,
        prow: Option<PaperRow>,
        sclass: Option<&str>,
    ) -> cfp_common::Result<bool> {
        self.prow = prow;
        if self.prow.is_none() {
            if let Some(sclass) = sclass.map(str::trim).filter(|s| !s.is_empty()) {
                self.changes.submission_class = Some(sclass.to_string());
            }
        }

        if let Some(title) = form.get("title") {
            self.changes.title = Some(simplify_whitespace(title));
        }
        if let Some(abstract_text) = form.get("abstract") {
            self.changes.abstract_text = Some(abstract_text.trim().to_string());
        }
        if let Some(authors) = form.get("authors") {
            let mut parsed = Vec::new();
            for (i, line) in authors.lines().filter(|l| !l.trim().is_empty()).enumerate() {
                let author = parse_author_line(line);
                if self.check_author(i + 1, &author) {
                    parsed.push(author);
                }
            }
            self.changes.authors = Some(parsed);
        }
        let topic_values = form.get_all("topics");
        if !topic_values.is_empty() {
            let names = topic_values
                .iter()
                .flat_map(|v| v.split(','))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            self.changes.topics = Some(names);
        }
        if let Some(status) = form.get("status") {
            self.set_status(status);
        }
        for dtype in DocumentType::ALL {
            let remove = form
                .get(&format!("remove_{}", dtype.key()))
                .and_then(cfp_common::params::friendly_boolean)
                .unwrap_or(false);
            if remove {
                self.changes.documents.push((dtype, DocumentChange::Remove));
                continue;
            }
            // browsers submit empty file inputs as a nameless, empty part
            let Some(file) = form.file(dtype.key()) else {
                continue;
            };
            if file.content.is_empty() && file.filename.as_deref().unwrap_or("").is_empty() {
                continue;
            }
            let doc = DocumentJson {
                content: Some(file.content.clone()),
                content_file: None,
                filename: file.filename.clone().filter(|f| !f.is_empty()),
                mimetype: file
                    .content_type
                    .clone()
                    .filter(|ct| ct != "application/octet-stream"),
            };
            self.set_document(dtype, doc);
        }

        self.finish_prepare().await
    }

    fn json_string(&mut self, obj: &Map<String, Value>, key: &'static str) -> Option<String> {
        match obj.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                self.format_error(key);
                None
            }
        }
    }

    fn format_error(&mut self, field: &str) {
        self.messages.error_at(Some(field), "Format error");
    }

    fn set_status(&mut self, status: &str) {
        match PaperState::parse(status) {
            Some(state) => self.changes.status = Some(state),
            None => {
                self.messages
                    .error_at(Some("status"), format!("Unknown status ‘{}’", status.trim()));
            }
        }
    }

    fn parse_json_authors(&mut self, items: &[Value]) {
        let mut authors = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let author = match item {
                Value::String(line) => parse_author_line(line),
                Value::Object(aj) => {
                    let field = |k: &str| {
                        aj.get(k)
                            .and_then(Value::as_str)
                            .map(simplify_whitespace)
                            .unwrap_or_default()
                    };
                    let mut author = Author {
                        first: field("first"),
                        last: field("last"),
                        email: field("email"),
                        affiliation: field("affiliation"),
                    };
                    if author.first.is_empty() && author.last.is_empty() {
                        (author.first, author.last) = split_name(&field("name"));
                    }
                    author
                }
                _ => {
                    self.messages
                        .error_at(Some("authors"), format!("Author {}: Format error", i + 1));
                    continue;
                }
            };
            if self.check_author(i + 1, &author) {
                authors.push(author);
            }
        }
        self.changes.authors = Some(authors);
    }

    fn check_author(&mut self, n: usize, author: &Author) -> bool {
        if author.is_empty() {
            self.messages
                .error_at(Some("authors"), format!("Author {}: Name or email required", n));
            false
        } else if !author.email.is_empty() && !is_valid_email(&author.email) {
            self.messages.error_at(
                Some("authors"),
                format!("Author {}: Invalid email address ‘{}’", n, author.email),
            );
            false
        } else {
            true
        }
    }

    fn set_document(&mut self, dtype: DocumentType, mut doc: DocumentJson) {
        let field = dtype.key();
        if doc.content_file.is_some() {
            match &self.importer {
                Some(importer) => {
                    if !importer.import(&mut doc, field, &mut self.messages) {
                        return;
                    }
                }
                None => {
                    self.messages.error_at(Some(field), "Document files not allowed");
                    return;
                }
            }
        }
        let Some(content) = doc.content.take() else {
            self.messages.error_at(Some(field), "Document content missing");
            return;
        };
        if content.is_empty() {
            self.messages.error_at(Some(field), "Empty document");
            return;
        }
        if content.len() as u64 > self.config.max_document_bytes {
            self.messages.error_at(Some(field), "Document too large");
            return;
        }
        let doc = NewDocument::new(content, doc.filename, doc.mimetype);
        self.changes.documents.retain(|(t, _)| *t != dtype);
        self.changes.documents.push((dtype, DocumentChange::Set(doc)));
    }

    async fn finish_prepare(&mut self) -> cfp_common::Result<bool> {
        let is_new = self.prow.is_none();

        match &self.changes.title {
            Some(title) if title.is_empty() => {
                self.messages.error_at(Some("title"), "Entry required");
            }
            None if is_new => {
                self.messages.error_at(Some("title"), "Entry required");
            }
            _ => {}
        }

        if let Some(sclass) = &self.changes.submission_class {
            if !self.config.has_submission_class(sclass) {
                self.messages.error_at(
                    Some("submission_class"),
                    format!("Submission class ‘{}’ not found", sclass),
                );
            }
        }

        if let Some(requested) = self.changes.topics.take() {
            let known = lookup_topics(&self.db, &requested).await?;
            let mut resolved: Vec<String> = Vec::new();
            for (name, canonical) in requested.iter().zip(known) {
                let name = match canonical {
                    Some(canonical) => canonical,
                    None if self.add_topics => {
                        let name = simplify_whitespace(name);
                        self.changes.create_topics.push(name.clone());
                        name
                    }
                    None => {
                        self.messages.warning_at(
                            Some("topics"),
                            format!("Unknown topic ‘{}’ ignored", name.trim()),
                        );
                        continue;
                    }
                };
                if !resolved.iter().any(|t| t.eq_ignore_ascii_case(&name)) {
                    resolved.push(name);
                }
            }
            resolved.sort_by_key(|t| t.to_ascii_lowercase());
            self.changes.topics = Some(resolved);
        }

        let state = self
            .changes
            .status
            .or(self.prow.as_ref().map(|p| p.status))
            .unwrap_or_default();
        if state == PaperState::Submitted {
            let abstract_text = self
                .changes
                .abstract_text
                .as_deref()
                .or(self.prow.as_ref().map(|p| p.abstract_text.as_str()))
                .unwrap_or("");
            if abstract_text.is_empty() && self.config.require_abstract {
                self.messages.error_at(Some("abstract"), "Entry required");
            }
            let has_authors = match &self.changes.authors {
                Some(authors) => !authors.is_empty(),
                None => self.prow.as_ref().is_some_and(|p| !p.authors.is_empty()),
            };
            if !has_authors {
                self.messages.error_at(Some("authors"), "Entry required");
            }
        }

        self.changed = self.compute_changed_keys();
        Ok(!self.messages.has_error())
    }

    fn compute_changed_keys(&self) -> Vec<&'static str> {
        let prow = self.prow.as_ref();
        let c = &self.changes;
        let mut keys = Vec::new();
        if prow.is_none() {
            keys.push("pid");
        }
        if c.title.as_ref().is_some_and(|t| prow.map_or(true, |p| &p.title != t)) {
            keys.push("title");
        }
        if c.abstract_text
            .as_ref()
            .is_some_and(|a| prow.map_or(!a.is_empty(), |p| &p.abstract_text != a))
        {
            keys.push("abstract");
        }
        if c.authors
            .as_ref()
            .is_some_and(|a| prow.map_or(!a.is_empty(), |p| &p.authors != a))
        {
            keys.push("authors");
        }
        if c.topics
            .as_ref()
            .is_some_and(|t| prow.map_or(!t.is_empty(), |p| &p.topics != t))
        {
            keys.push("topics");
        }
        if c.status.is_some_and(|s| prow.map_or(s != PaperState::Draft, |p| p.status != s)) {
            keys.push("status");
        }
        if c.submission_class
            .as_ref()
            .is_some_and(|s| prow.map_or(!s.is_empty(), |p| &p.submission_class != s))
        {
            keys.push("submission_class");
        }
        for dtype in DocumentType::ALL {
            let Some((_, change)) = c.documents.iter().rev().find(|(t, _)| *t == dtype) else {
                continue;
            };
            let existing = prow.and_then(|p| p.document(dtype));
            let differs = match change {
                DocumentChange::Set(doc) => existing.map_or(true, |e| e.hash != doc.hash),
                DocumentChange::Remove => existing.is_some(),
            };
            if differs {
                keys.push(dtype.key());
            }
        }
        keys
    }

    /// Fields the prepared save changes, in declaration order
    pub fn changed_keys(&self) -> Vec<String> {
        self.changed.iter().map(|k| k.to_string()).collect()
    }

    pub fn has_change(&self) -> bool {
        !self.changed.is_empty()
    }

    pub fn is_new(&self) -> bool {
        self.prow.is_none()
    }

    /// Write the prepared changes; returns false after recording an error
    pub async fn execute_save(&mut self) -> bool {
        match self.save_changes().await {
            Ok(pid) => match fetch_paper(&self.db, pid).await {
                Ok(saved) => {
                    self.saved = saved;
                    true
                }
                Err(e) => {
                    warn!("Failed to reload paper #{} after save: {}", pid, e);
                    self.messages.error_at(None, format!("Database error: {}", e));
                    false
                }
            },
            Err(e) => {
                warn!("Paper save failed: {}", e);
                self.messages.error_at(None, format!("Database error: {}", e));
                false
            }
        }
    }

    async fn save_changes(&self) -> sqlx::Result<i64> {
        if let (Some(prow), false) = (&self.prow, self.has_change()) {
            return Ok(prow.paper_id);
        }

        let c = &self.changes;
        let mut tx = self.db.begin().await?;

        let pid = match (&self.prow, self.new_pid) {
            (Some(prow), _) => prow.paper_id,
            (None, Some(pid)) => {
                sqlx::query("INSERT INTO papers (paper_id) VALUES (?)")
                    .bind(pid)
                    .execute(&mut *tx)
                    .await?;
                pid
            }
            (None, None) => sqlx::query("INSERT INTO papers DEFAULT VALUES")
                .execute(&mut *tx)
                .await?
                .last_insert_rowid(),
        };

        sqlx::query(
            "UPDATE papers SET title = COALESCE(?, title), abstract = COALESCE(?, abstract),
                status = COALESCE(?, status), submission_class = COALESCE(?, submission_class),
                updated_at = CURRENT_TIMESTAMP
             WHERE paper_id = ?",
        )
        .bind(c.title.as_deref())
        .bind(c.abstract_text.as_deref())
        .bind(c.status.map(PaperState::as_str))
        .bind(c.submission_class.as_deref())
        .bind(pid)
        .execute(&mut *tx)
        .await?;

        if let Some(authors) = &c.authors {
            sqlx::query("DELETE FROM paper_authors WHERE paper_id = ?")
                .bind(pid)
                .execute(&mut *tx)
                .await?;
            for (ord, author) in authors.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO paper_authors (paper_id, ord, first, last, email, affiliation)
                     VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(pid)
                .bind(ord as i64)
                .bind(&author.first)
                .bind(&author.last)
                .bind(&author.email)
                .bind(&author.affiliation)
                .execute(&mut *tx)
                .await?;
            }
        }

        if let Some(topics) = &c.topics {
            for name in &c.create_topics {
                sqlx::query("INSERT OR IGNORE INTO topics (name) VALUES (?)")
                    .bind(name)
                    .execute(&mut *tx)
                    .await?;
            }
            sqlx::query("DELETE FROM paper_topics WHERE paper_id = ?")
                .bind(pid)
                .execute(&mut *tx)
                .await?;
            for name in topics {
                sqlx::query(
                    "INSERT OR IGNORE INTO paper_topics (paper_id, topic_id)
                     SELECT ?, topic_id FROM topics WHERE name = ? COLLATE NOCASE",
                )
                .bind(pid)
                .bind(name)
                .execute(&mut *tx)
                .await?;
            }
        }

        for (dtype, change) in &c.documents {
            let document_id = match change {
                DocumentChange::Set(doc) => Some(
                    sqlx::query(
                        "INSERT INTO documents (paper_id, dtype, filename, mimetype, size, hash, content)
                         VALUES (?, ?, ?, ?, ?, ?, ?)",
                    )
                    .bind(pid)
                    .bind(dtype.key())
                    .bind(doc.filename.as_deref())
                    .bind(&doc.mimetype)
                    .bind(doc.size())
                    .bind(&doc.hash)
                    .bind(&doc.content)
                    .execute(&mut *tx)
                    .await?
                    .last_insert_rowid(),
                ),
                DocumentChange::Remove => None,
            };
            sqlx::query(&format!(
                "UPDATE papers SET {} = ? WHERE paper_id = ?",
                dtype.column()
            ))
            .bind(document_id)
            .bind(pid)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("Saved paper #{} ({})", pid, self.changed.join(", "));
        Ok(pid)
    }

    /// Record the save in the action log
    pub async fn log_save_activity(&self, via: &str) {
        let Some(saved) = &self.saved else {
            return;
        };
        let verb = if self.is_new() { "created" } else { "edited" };
        let action = format!("Paper {} {}", verb, via);
        info!("#{} {} ({})", saved.paper_id, action, self.changed.join(", "));
        let result = sqlx::query("INSERT INTO action_log (paper_id, action) VALUES (?, ?)")
            .bind(saved.paper_id)
            .bind(&action)
            .execute(&self.db)
            .await;
        if let Err(e) = result {
            warn!("Failed to record action log for #{}: {}", saved.paper_id, e);
        }
    }

    /// Paper as stored after a successful `execute_save`
    pub fn saved_prow(&self) -> Option<&PaperRow> {
        self.saved.as_ref()
    }

    pub fn messages(&self) -> &MessageSet {
        &self.messages
    }

    pub fn take_messages(&mut self) -> MessageSet {
        std::mem::take(&mut self.messages)
    }
}

/// Parse `First Last <email> (Affiliation)`; every part is optional
pub fn parse_author_line(line: &str) -> Author {
    let mut rest = line.trim();
    let mut author = Author::default();

    if rest.ends_with(')') {
        if let Some(open) = rest.rfind('(') {
            author.affiliation = simplify_whitespace(&rest[open + 1..rest.len() - 1]);
            rest = rest[..open].trim_end();
        }
    }
    if rest.ends_with('>') {
        if let Some(open) = rest.rfind('<') {
            author.email = rest[open + 1..rest.len() - 1].trim().to_string();
            rest = rest[..open].trim_end();
        }
    } else if rest.contains('@') && !rest.contains(char::is_whitespace) {
        author.email = rest.to_string();
        rest = "";
    }
    (author.first, author.last) = split_name(rest);
    author
}

/// Split a display name into first and last parts
///
/// `Last, First` is honored; otherwise the final word is the last name.
pub fn split_name(name: &str) -> (String, String) {
    let name = simplify_whitespace(name);
    if let Some((last, first)) = name.split_once(',') {
        return (first.trim().to_string(), last.trim().to_string());
    }
    match name.rsplit_once(' ') {
        Some((first, last)) => (first.to_string(), last.to_string()),
        None => (String::new(), name),
    }
}

pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn status() -> PaperStatus {
        let db = cfp_common::db::init_memory_database().await.unwrap();
        cfp_common::db::seed_topics(&db, &["Networking".to_string(), "Storage".to_string()])
            .await
            .unwrap();
        PaperStatus::new(db, Arc::new(ServiceConfig::default()))
    }

    fn fields(ps: &PaperStatus) -> Vec<(Option<String>, String)> {
        ps.messages()
            .iter()
            .map(|mi| (mi.field.clone(), mi.message.clone()))
            .collect()
    }

    #[test]
    fn test_parse_author_line() {
        let a = parse_author_line("Grace Brewster Hopper <grace@navy.mil> (US Navy)");
        assert_eq!(a.first, "Grace Brewster");
        assert_eq!(a.last, "Hopper");
        assert_eq!(a.email, "grace@navy.mil");
        assert_eq!(a.affiliation, "US Navy");

        let a = parse_author_line("Lovelace, Ada");
        assert_eq!((a.first.as_str(), a.last.as_str()), ("Ada", "Lovelace"));

        let a = parse_author_line("solo@example.com");
        assert_eq!(a.email, "solo@example.com");
        assert!(a.first.is_empty() && a.last.is_empty());
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("a@b.org"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@b.org"));
        assert!(!is_valid_email("a b@c.org"));
        assert!(!is_valid_email("a@@b.org"));
    }

    #[tokio::test]
    async fn test_new_paper_requires_title() {
        let mut ps = status().await;
        let ok = ps.prepare_save_json(&json!({"abstract": "x"})).await.unwrap();
        assert!(!ok);
        assert!(ps.messages().has_error_at("title"));
    }

    #[tokio::test]
    async fn test_submitted_requires_abstract_and_authors() {
        let mut ps = status().await;
        let ok = ps
            .prepare_save_json(&json!({"title": "T", "status": "submitted"}))
            .await
            .unwrap();
        assert!(!ok);
        assert!(ps.messages().has_error_at("abstract"));
        assert!(ps.messages().has_error_at("authors"));
    }

    #[tokio::test]
    async fn test_unknown_fields_and_topics_warn() {
        let mut ps = status().await;
        let ok = ps
            .prepare_save_json(&json!({
                "title": "T",
                "colour": "blue",
                "topics": ["networking", "Quantum"]
            }))
            .await
            .unwrap();
        assert!(ok);
        let msgs = fields(&ps);
        assert!(msgs.contains(&(Some("colour".to_string()), "Unknown field ignored".to_string())));
        assert!(msgs.contains(&(
            Some("topics".to_string()),
            "Unknown topic ‘Quantum’ ignored".to_string()
        )));
        assert_eq!(ps.changed_keys(), vec!["pid", "title", "topics"]);
    }

    #[tokio::test]
    async fn test_save_new_paper_and_reload() {
        let mut ps = status().await.set_add_topics(true);
        let ok = ps
            .prepare_save_json(&json!({
                "title": "  A   Study ",
                "abstract": "We study.",
                "status": "submitted",
                "authors": [{"name": "Ada Lovelace", "email": "ada@example.org"}],
                "topics": ["Storage", "Quantum"],
                "submission": {"content": "%PDF-1.4 body", "filename": "a.pdf"}
            }))
            .await
            .unwrap();
        assert!(ok, "{:?}", ps.messages());
        assert!(ps.execute_save().await);

        let saved = ps.saved_prow().unwrap();
        assert_eq!(saved.paper_id, 1);
        assert_eq!(saved.title, "A Study");
        assert_eq!(saved.status, PaperState::Submitted);
        assert_eq!(saved.authors[0].last, "Lovelace");
        assert_eq!(saved.topics, vec!["Quantum", "Storage"]);
        let doc = saved.submission.as_ref().unwrap();
        assert_eq!(doc.mimetype, "application/pdf");
        assert_eq!(doc.filename.as_deref(), Some("a.pdf"));
        assert_eq!(
            ps.changed_keys(),
            vec!["pid", "title", "abstract", "authors", "topics", "status", "submission"]
        );
    }

    #[tokio::test]
    async fn test_explicit_pid_creates_paper() {
        let mut ps = status().await;
        assert!(ps.prepare_save_json(&json!({"pid": 30, "title": "T"})).await.unwrap());
        assert!(ps.execute_save().await);
        assert_eq!(ps.saved_prow().unwrap().paper_id, 30);
    }

    #[tokio::test]
    async fn test_unchanged_edit_has_no_change() {
        let mut ps = status().await;
        assert!(ps.prepare_save_json(&json!({"title": "Same"})).await.unwrap());
        assert!(ps.execute_save().await);
        let db = ps.db.clone();

        let mut ps = PaperStatus::new(db, Arc::new(ServiceConfig::default()));
        assert!(ps
            .prepare_save_json(&json!({"pid": 1, "title": "Same"}))
            .await
            .unwrap());
        assert!(!ps.has_change());
        assert!(ps.execute_save().await);
        assert_eq!(ps.saved_prow().unwrap().title, "Same");
    }

    #[tokio::test]
    async fn test_content_file_without_archive() {
        let mut ps = status().await;
        let ok = ps
            .prepare_save_json(&json!({"title": "T", "final": {"content_file": "f.pdf"}}))
            .await
            .unwrap();
        assert!(!ok);
        assert_eq!(
            fields(&ps),
            vec![(Some("final".to_string()), "Document files not allowed".to_string())]
        );
    }

    #[tokio::test]
    async fn test_bad_status_and_authors() {
        let mut ps = status().await;
        let ok = ps
            .prepare_save_json(&json!({
                "title": "T",
                "status": "accepted",
                "authors": [{"email": "not-an-email"}, {}]
            }))
            .await
            .unwrap();
        assert!(!ok);
        let msgs = fields(&ps);
        assert!(msgs.contains(&(Some("status".to_string()), "Unknown status ‘accepted’".to_string())));
        assert!(msgs.contains(&(
            Some("authors".to_string()),
            "Author 1: Invalid email address ‘not-an-email’".to_string()
        )));
        assert!(msgs.contains(&(
            Some("authors".to_string()),
            "Author 2: Name or email required".to_string()
        )));
    }

    #[tokio::test]
    async fn test_form_save() {
        let mut ps = status().await;
        let form = FormData {
            fields: vec![
                ("title".to_string(), "Form Paper".to_string()),
                ("authors".to_string(), "Ada Lovelace <ada@example.org>\n\n".to_string()),
                ("topics".to_string(), "Networking, Storage".to_string()),
            ],
            files: vec![FormFile {
                name: "submission".to_string(),
                filename: Some("paper.pdf".to_string()),
                content_type: Some("application/octet-stream".to_string()),
                content: b"%PDF-1.7".to_vec(),
            }],
        };
        assert!(ps.prepare_save_form(&form, None, None).await.unwrap());
        assert!(ps.execute_save().await);
        let saved = ps.saved_prow().unwrap();
        assert_eq!(saved.authors.len(), 1);
        assert_eq!(saved.topics, vec!["Networking", "Storage"]);
        assert_eq!(saved.submission.as_ref().unwrap().mimetype, "application/pdf");
    }

    #[tokio::test]
    async fn test_form_unknown_sclass() {
        let mut ps = status().await;
        let form = FormData {
            fields: vec![("title".to_string(), "T".to_string())],
            files: vec![],
        };
        assert!(!ps.prepare_save_form(&form, None, Some("poster")).await.unwrap());
        assert!(ps.messages().has_error_at("submission_class"));
    }
}
