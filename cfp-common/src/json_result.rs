//! JSON API results
//!
//! Every API endpoint answers with a JSON object carrying at least `ok`.
//! Errors are reported as `{ok: false, message_list: [...]}` with an HTTP
//! status code; partial failures stay `200` with messages attached.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};

use crate::messages::{MessageItem, Severity};

/// JSON response body plus HTTP status
#[derive(Debug, Clone)]
pub struct JsonResult {
    pub status: StatusCode,
    pub content: Map<String, Value>,
}

impl JsonResult {
    pub fn new(status: StatusCode, content: Map<String, Value>) -> Self {
        Self { status, content }
    }

    /// `200` result from a JSON object literal
    ///
    /// Non-object values are wrapped as `{ok: true, value: ...}`.
    pub fn ok(content: Value) -> Self {
        match content {
            Value::Object(map) => Self::new(StatusCode::OK, map),
            other => {
                let mut map = Map::new();
                map.insert("ok".to_string(), Value::Bool(true));
                map.insert("value".to_string(), other);
                Self::new(StatusCode::OK, map)
            }
        }
    }

    /// Error result with a single error message
    pub fn make_error(status: StatusCode, message: impl Into<String>) -> Self {
        Self::make_error_item(status, MessageItem::error(message))
    }

    fn make_error_item(status: StatusCode, item: MessageItem) -> Self {
        let mut map = Map::new();
        map.insert("ok".to_string(), Value::Bool(false));
        map.insert("message_list".to_string(), json!([item]));
        Self::new(status, map)
    }

    /// `400` result for a missing request parameter
    pub fn make_parameter_error(param: &str) -> Self {
        Self::make_error_item(
            StatusCode::BAD_REQUEST,
            MessageItem::error_at(param, "Parameter missing"),
        )
    }

    /// Result carrying a message list; `ok` unless some message is an error
    pub fn make_message_list(items: Vec<MessageItem>) -> Self {
        let failed = items.iter().any(|mi| mi.status >= Severity::Error);
        let status = if failed {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::OK
        };
        let mut map = Map::new();
        map.insert("ok".to_string(), Value::Bool(!failed));
        map.insert("message_list".to_string(), json!(items));
        Self::new(status, map)
    }

    /// Result explaining why a paper could not be loaded
    pub fn paper_error(whynot: &PaperWhyNot) -> Self {
        let mut result = match whynot {
            PaperWhyNot::InvalidId(_) => Self::make_error_item(
                StatusCode::BAD_REQUEST,
                MessageItem::error_at("p", whynot.message()),
            ),
            PaperWhyNot::NotFound(_) => Self::make_error_item(
                StatusCode::NOT_FOUND,
                MessageItem::error_at("p", whynot.message()),
            ),
        };
        if let PaperWhyNot::NotFound(pid) = whynot {
            result.content.insert("pid".to_string(), json!(pid));
        }
        result
    }

    pub fn is_ok(&self) -> bool {
        self.content.get("ok").and_then(Value::as_bool).unwrap_or(false)
    }

    /// Remove `message_list` when it holds no messages
    pub fn strip_empty_message_list(&mut self) {
        let empty = matches!(
            self.content.get("message_list"),
            Some(Value::Array(items)) if items.is_empty()
        );
        if empty {
            self.content.remove("message_list");
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.content)
    }
}

impl IntoResponse for JsonResult {
    fn into_response(self) -> Response {
        (self.status, Json(Value::Object(self.content))).into_response()
    }
}

/// Reason a requested paper is unavailable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaperWhyNot {
    /// `p` was not a positive integer
    InvalidId(String),
    /// No paper has this id
    NotFound(i64),
}

impl PaperWhyNot {
    pub fn message(&self) -> String {
        match self {
            PaperWhyNot::InvalidId(p) => format!("Invalid submission ID ‘{}’", p),
            PaperWhyNot::NotFound(pid) => format!("Submission #{} not found", pid),
        }
    }
}
