//! `/api/paper` handlers
//!
//! Handlers only classify the request body; everything else happens in
//! [`crate::paper_api`].

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Query, Request, State},
    http::header::CONTENT_TYPE,
    routing::get,
    Form, Router,
};
use cfp_common::JsonResult;

use crate::error::{ApiError, ApiResult};
use crate::paper::{FormData, FormFile};
use crate::paper_api::{self, body_content_type, PaperQuery, PaperRequest, PostBody};
use crate::AppState;

/// GET /api/paper?p=N or ?q=QUERY
pub async fn get_paper(
    State(state): State<AppState>,
    Query(query): Query<PaperQuery>,
) -> ApiResult<JsonResult> {
    paper_api::run(&state.db, state.config.clone(), &query, PaperRequest::Get).await
}

/// POST /api/paper
///
/// Accepts form data, JSON, or a ZIP archive.
pub async fn post_paper(
    State(state): State<AppState>,
    Query(query): Query<PaperQuery>,
    request: Request,
) -> ApiResult<JsonResult> {
    let ct = body_content_type(
        request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
    );
    let body = match ct.as_str() {
        "application/x-www-form-urlencoded" => {
            let Form(fields) = Form::<Vec<(String, String)>>::from_request(request, &state)
                .await
                .map_err(|r| ApiError::Rejected(r.status(), r.body_text()))?;
            PostBody::Form(FormData {
                fields,
                files: Vec::new(),
            })
        }
        "multipart/form-data" => {
            let multipart = Multipart::from_request(request, &state)
                .await
                .map_err(|r| ApiError::Rejected(r.status(), r.body_text()))?;
            PostBody::Form(read_multipart(multipart).await?)
        }
        "application/json" => PostBody::Json(read_bytes(request, &state).await?),
        "application/zip" => PostBody::Zip(read_bytes(request, &state).await?),
        _ => PostBody::Unsupported(ct),
    };
    paper_api::run(&state.db, state.config.clone(), &query, PaperRequest::Post(body)).await
}

async fn read_bytes(request: Request, state: &AppState) -> ApiResult<Bytes> {
    Bytes::from_request(request, state)
        .await
        .map_err(|r| ApiError::Rejected(r.status(), r.body_text()))
}

/// Split a multipart body into text fields and uploaded files
async fn read_multipart(mut multipart: Multipart) -> ApiResult<FormData> {
    let mut form = FormData::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Rejected(e.status(), e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(filename) => {
                let content_type = field.content_type().map(str::to_string);
                let content = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Rejected(e.status(), e.body_text()))?;
                form.files.push(FormFile {
                    name,
                    filename: Some(filename),
                    content_type,
                    content: content.to_vec(),
                });
            }
            None => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Rejected(e.status(), e.body_text()))?;
                form.fields.push((name, value));
            }
        }
    }
    Ok(form)
}

/// Build paper routes
pub fn paper_routes() -> Router<AppState> {
    Router::new().route("/api/paper", get(get_paper).post(post_paper))
}
