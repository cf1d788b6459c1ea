//! The `/api/paper` endpoint
//!
//! GET returns one paper or the results of a search. POST saves one paper
//! (`p` set, or a JSON object body) or a batch (JSON array body). Bodies
//! may be web forms, JSON, or a ZIP holding a JSON manifest plus the
//! document files it references.

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::StatusCode;
use cfp_common::config::ServiceConfig;
use cfp_common::params::friendly_boolean_opt;
use cfp_common::{JsonResult, MessageItem, MessageSet, PaperWhyNot};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::archive::{ZipContent, ZipDocumentImporter};
use crate::error::{ApiError, ApiResult};
use crate::paper::{fetch_paper, paper_json, FormData, PaperRow, PaperStatus};
use crate::pid::{analyze_json_pid, PidFlags, Pidish};
use crate::search::PaperSearch;

/// Query parameters accepted by `/api/paper`
///
/// `notify`, `disableusers` and `forceShow` are accepted for client
/// compatibility and have no effect.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaperQuery {
    pub p: Option<String>,
    pub q: Option<String>,
    pub t: Option<String>,
    pub sort: Option<String>,
    pub sclass: Option<String>,
    pub dryrun: Option<String>,
    pub addtopics: Option<String>,
    pub ignorepid: Option<String>,
    pub matchtitle: Option<String>,
    pub notify: Option<String>,
    pub disableusers: Option<String>,
    #[serde(rename = "forceShow")]
    pub force_show: Option<String>,
}

/// POST behavior switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaperApiOptions {
    pub dry_run: bool,
    pub add_topics: bool,
    pub pid_flags: PidFlags,
}

impl PaperApiOptions {
    pub fn from_query(query: &PaperQuery) -> Self {
        let flag = |v: &Option<String>| friendly_boolean_opt(v.as_deref()).unwrap_or(false);
        let mut pid_flags = PidFlags::empty();
        pid_flags.set(PidFlags::IGNORE_PID, flag(&query.ignorepid));
        pid_flags.set(PidFlags::MATCH_TITLE, flag(&query.matchtitle));
        Self {
            dry_run: flag(&query.dryrun),
            add_topics: flag(&query.addtopics),
            pid_flags,
        }
    }
}

/// A POST body, classified by content type
#[derive(Debug)]
pub enum PostBody {
    Form(FormData),
    Json(Bytes),
    Zip(Bytes),
    /// Any other content type
    Unsupported(String),
}

/// Content type without parameters, lowercased
pub fn body_content_type(header: Option<&str>) -> String {
    header
        .unwrap_or("")
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

pub enum PaperRequest {
    Get,
    Post(PostBody),
}

/// Run one `/api/paper` request
pub async fn run(
    db: &SqlitePool,
    config: Arc<ServiceConfig>,
    query: &PaperQuery,
    request: PaperRequest,
) -> ApiResult<JsonResult> {
    let mut jr = match request {
        PaperRequest::Get => run_get(db, query).await?,
        PaperRequest::Post(body) => {
            let options = PaperApiOptions::from_query(query);
            PaperApi::new(db.clone(), config, options)
                .run_post(query.p.as_deref(), query.sclass.as_deref(), body)
                .await?
        }
    };
    jr.strip_empty_message_list();
    Ok(jr)
}

/// Resolve `p` to a stored paper
pub async fn resolve_paper(db: &SqlitePool, p: &str) -> ApiResult<Result<PaperRow, PaperWhyNot>> {
    let pid = match p.trim().strip_prefix('#').unwrap_or(p.trim()).parse::<i64>() {
        Ok(pid) if pid > 0 => pid,
        _ => return Ok(Err(PaperWhyNot::InvalidId(p.to_string()))),
    };
    Ok(fetch_paper(db, pid).await?.ok_or(PaperWhyNot::NotFound(pid)))
}

pub async fn run_get(db: &SqlitePool, query: &PaperQuery) -> ApiResult<JsonResult> {
    if let Some(p) = &query.p {
        return Ok(match resolve_paper(db, p).await? {
            Ok(prow) => JsonResult::ok(json!({"ok": true, "papers": [paper_json(&prow)]})),
            Err(whynot) => JsonResult::paper_error(&whynot),
        });
    }

    let Some(q) = &query.q else {
        return Ok(JsonResult::make_parameter_error("p"));
    };

    let srch = PaperSearch::new(q, query.t.as_deref(), query.sort.as_deref());
    let papers: Vec<Value> = srch.sorted_papers(db).await?.iter().map(paper_json).collect();
    debug!("Search {:?} matched {} papers", q, papers.len());
    Ok(JsonResult::ok(json!({
        "ok": true,
        "message_list": srch.messages().message_list(),
        "papers": papers,
    })))
}

/// State of one POST request
pub struct PaperApi {
    db: SqlitePool,
    config: Arc<ServiceConfig>,
    options: PaperApiOptions,
    single: bool,
    ok: bool,
    messages: MessageSet,
    change_lists: Vec<Option<Vec<String>>>,
    papers: Vec<Option<Value>>,
    valid: Vec<bool>,
    npapers: usize,
    landmark: Option<String>,
    importer: Option<Arc<ZipDocumentImporter>>,
}

impl PaperApi {
    pub fn new(db: SqlitePool, config: Arc<ServiceConfig>, options: PaperApiOptions) -> Self {
        Self {
            db,
            config,
            options,
            single: false,
            ok: true,
            messages: MessageSet::new(),
            change_lists: Vec::new(),
            papers: Vec::new(),
            valid: Vec::new(),
            npapers: 0,
            landmark: None,
            importer: None,
        }
    }

    /// Save the paper(s) in `body`; `p` targets one paper or `new`
    pub async fn run_post(
        mut self,
        p: Option<&str>,
        sclass: Option<&str>,
        body: PostBody,
    ) -> ApiResult<JsonResult> {
        let mut prow = None;
        if let Some(p) = p {
            self.single = true;
            if p != "new" {
                match resolve_paper(&self.db, p).await? {
                    Ok(row) => prow = Some(row),
                    Err(whynot) => return Ok(JsonResult::paper_error(&whynot)),
                }
            }
        }

        let text = match body {
            PostBody::Form(form) => return self.run_post_form(form, prow, sclass).await,
            PostBody::Json(bytes) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => text,
                Err(e) => {
                    return Err(ApiError::BadRequest(format!("Invalid JSON: {}", e)));
                }
            },
            PostBody::Zip(bytes) => {
                let archive = ZipContent::open(bytes)?;
                let (docdir, manifest) = archive.analyze();
                let Some(manifest) = manifest else {
                    return Err(ApiError::BadRequest("ZIP `data.json` not found".to_string()));
                };
                debug!("ZIP manifest {} (prefix {:?})", manifest, docdir);
                let text = archive.read_to_string(&manifest, self.config.max_body_bytes as u64)?;
                self.importer = Some(Arc::new(ZipDocumentImporter::new(
                    archive,
                    docdir,
                    self.config.max_document_bytes,
                )));
                text
            }
            PostBody::Unsupported(ct) => {
                debug!("Rejecting POST body of type {:?}", ct);
                return Err(ApiError::BadRequest("POST data must be JSON or ZIP".to_string()));
            }
        };

        let jp: Value = serde_json::from_str(&text)
            .map_err(|e| ApiError::BadRequest(format!("Invalid JSON: {}", e)))?;
        match jp {
            Value::Object(obj) => {
                self.single = true;
                self.run_post_single_json(prow, obj).await
            }
            _ if self.single => Err(ApiError::BadRequest("Expected object".to_string())),
            Value::Array(items) => self.run_post_multi_json(items).await,
            _ => Err(ApiError::BadRequest("Expected array of objects".to_string())),
        }
    }

    async fn run_post_form(
        mut self,
        form: FormData,
        prow: Option<PaperRow>,
        sclass: Option<&str>,
    ) -> ApiResult<JsonResult> {
        let sclass = sclass.or(form.get("sclass"));
        if prow.is_none() {
            if let Some(sclass) = sclass {
                if !self.config.has_submission_class(sclass) {
                    return Ok(JsonResult::make_message_list(vec![MessageItem::error(
                        format!("Submission class ‘{}’ not found", sclass),
                    )]));
                }
            }
        }

        let mut ps = self.paper_status();
        let prepared = ps.prepare_save_form(&form, prow, sclass).await?;
        self.execute_save(prepared, ps).await;
        Ok(self.make_result())
    }

    async fn run_post_single_json(
        mut self,
        prow: Option<PaperRow>,
        mut obj: Map<String, Value>,
    ) -> ApiResult<JsonResult> {
        let expected = prow.as_ref().map(|p| p.paper_id);
        if let Some(pid) = expected {
            if !obj.contains_key("pid") && !obj.contains_key("id") {
                obj.insert("pid".to_string(), json!(pid));
            }
        }
        if self.set_json_landmark(0, &mut obj, expected.map(Pidish::Id)).await? {
            let mut ps = self.paper_status();
            let prepared = ps.prepare_save_json(&Value::Object(obj)).await?;
            self.execute_save(prepared, ps).await;
        } else {
            self.execute_fail();
        }
        Ok(self.make_result())
    }

    async fn run_post_multi_json(mut self, items: Vec<Value>) -> ApiResult<JsonResult> {
        info!("Batch save of {} papers", items.len());
        for (index, item) in items.into_iter().enumerate() {
            let Value::Object(mut obj) = item else {
                self.messages
                    .error_at(None, "Expected object")
                    .landmark = Some(format!("index {}", index));
                self.execute_fail();
                continue;
            };
            if self.set_json_landmark(index, &mut obj, None).await? {
                let mut ps = self.paper_status();
                let prepared = ps.prepare_save_json(&Value::Object(obj)).await?;
                self.execute_save(prepared, ps).await;
            } else {
                self.execute_fail();
            }
        }
        Ok(self.make_result())
    }

    fn paper_status(&self) -> PaperStatus {
        let ps = PaperStatus::new(self.db.clone(), self.config.clone())
            .set_add_topics(self.options.add_topics);
        match &self.importer {
            Some(importer) => ps.on_document_import(importer.clone()),
            None => ps,
        }
    }

    /// Check the object's target and set the landmark for its messages
    async fn set_json_landmark(
        &mut self,
        index: usize,
        obj: &mut Map<String, Value>,
        expected: Option<Pidish>,
    ) -> ApiResult<bool> {
        let pidish = analyze_json_pid(&self.db, obj, self.options.pid_flags).await?;
        let message = match pidish {
            None => "Bad `pid`",
            Some(pidish) if expected.is_some_and(|e| e != pidish) => "`pid` does not match",
            Some(pidish) => {
                self.landmark = Some(pidish.landmark(index));
                return Ok(true);
            }
        };
        let single = self.single;
        let mi = self.messages.error_at(None, message);
        if !single {
            mi.landmark = Some(format!("index {}", index));
        }
        Ok(false)
    }

    async fn execute_save(&mut self, prepared: bool, mut ps: PaperStatus) {
        let mut ok = prepared;
        self.ok = self.ok && prepared;
        if self.ok && !self.options.dry_run {
            ok = ps.execute_save().await;
            self.ok = ok;
        }

        let landmark = if self.single { None } else { self.landmark.clone() };
        for mut mi in ps.take_messages() {
            if landmark.is_some() {
                mi.landmark = landmark.clone();
            }
            self.messages.append_item(mi);
        }
        self.change_lists.push(Some(ps.changed_keys()));

        if self.ok && !self.options.dry_run {
            if ps.has_change() {
                ps.log_save_activity("via API").await;
            }
            self.papers.push(ps.saved_prow().map(paper_json));
            self.npapers += 1;
        } else {
            self.papers.push(None);
        }
        self.valid.push(ok);
    }

    fn execute_fail(&mut self) {
        self.ok = false;
        self.change_lists.push(None);
        self.papers.push(None);
        self.valid.push(false);
    }

    fn make_result(self) -> JsonResult {
        let mut content = Map::new();
        content.insert("ok".to_string(), json!(self.ok));
        content.insert("message_list".to_string(), json!(self.messages.message_list()));
        if self.single {
            content.insert("change_list".to_string(), json!(self.change_lists.first().cloned().flatten()));
            if self.npapers > 0 {
                content.insert("paper".to_string(), json!(self.papers.first().cloned().flatten()));
            }
        } else {
            content.insert("change_lists".to_string(), json!(self.change_lists));
            if self.npapers > 0 {
                content.insert("papers".to_string(), json!(self.papers));
            }
            content.insert("valid".to_string(), json!(self.valid));
        }
        JsonResult::new(StatusCode::OK, content)
    }
}
