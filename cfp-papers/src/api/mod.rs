//! HTTP API handlers for cfp-papers

pub mod buildinfo;
pub mod document;
pub mod health;
pub mod paper;

pub use buildinfo::get_build_info;
pub use document::document_routes;
pub use health::health_routes;
pub use paper::paper_routes;
