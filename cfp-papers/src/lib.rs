//! cfp-papers library - conference paper submission API
//!
//! Serves `/api/paper` (retrieve, search, and save papers as JSON, web forms,
//! or ZIP archives) and `/api/document` over a SQLite paper store.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use cfp_common::config::ServiceConfig;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod archive;
pub mod error;
pub mod paper;
pub mod paper_api;
pub mod pid;
pub mod search;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Service configuration
    pub config: Arc<ServiceConfig>,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, config: ServiceConfig) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    let body_limit = state.config.max_body_bytes;

    Router::new()
        .merge(api::paper_routes())
        .merge(api::document_routes())
        .merge(api::health_routes())
        .route("/api/buildinfo", get(api::get_build_info))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
