//! Document download

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use cfp_common::JsonResult;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::paper::document::fetch_document_content;
use crate::paper::DocumentType;
use crate::paper_api::resolve_paper;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DocumentQuery {
    pub p: Option<String>,
    pub dt: Option<String>,
}

/// GET /api/document?p=N&dt=submission|final
pub async fn get_document(
    State(state): State<AppState>,
    Query(query): Query<DocumentQuery>,
) -> ApiResult<Response> {
    let Some(p) = &query.p else {
        return Ok(JsonResult::make_parameter_error("p").into_response());
    };
    let dtype = match query.dt.as_deref().unwrap_or("submission") {
        "submission" => DocumentType::Submission,
        "final" => DocumentType::Final,
        _ => {
            return Ok(JsonResult::make_error(StatusCode::BAD_REQUEST, "Unknown document type")
                .into_response())
        }
    };
    let prow = match resolve_paper(&state.db, p).await? {
        Ok(prow) => prow,
        Err(whynot) => return Ok(JsonResult::paper_error(&whynot).into_response()),
    };
    let Some(doc) = prow.document(dtype) else {
        return Ok(JsonResult::make_error(StatusCode::NOT_FOUND, "Document not found").into_response());
    };
    let Some(content) = fetch_document_content(&state.db, doc.document_id).await? else {
        return Ok(JsonResult::make_error(StatusCode::NOT_FOUND, "Document not found").into_response());
    };
    Ok(([(header::CONTENT_TYPE, doc.mimetype.clone())], content).into_response())
}

pub fn document_routes() -> Router<AppState> {
    Router::new().route("/api/document", get(get_document))
}
