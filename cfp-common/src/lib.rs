//! # CFP Common Library
//!
//! Shared code for the conference paper services:
//! - Error type and result alias
//! - Configuration loading and root folder resolution
//! - Message lists attached to API responses
//! - `JsonResult` response shape
//! - Request parameter helpers
//! - Database initialization

pub mod config;
pub mod db;
pub mod error;
pub mod json_result;
pub mod messages;
pub mod params;

pub use error::{Error, Result};
pub use json_result::{JsonResult, PaperWhyNot};
pub use messages::{MessageItem, MessageSet, Severity};
