//! Message lists returned alongside API results
//!
//! Validation problems are never fatal on their own: they are collected into a
//! [`MessageSet`] and reported back to the client as `message_list`, each item
//! optionally tied to a field and to a landmark (`#12`, `index 3`) that tells
//! batch clients which input produced it.

use serde::{Serialize, Serializer};

/// Message severity, serialized as an integer `status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Inform,
    Plain,
    Warning,
    Error,
}

impl Severity {
    pub fn as_i32(self) -> i32 {
        match self {
            Severity::Inform => -1,
            Severity::Plain => 0,
            Severity::Warning => 1,
            Severity::Error => 2,
        }
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.as_i32())
    }
}

/// One entry of a `message_list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
    pub status: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub landmark: Option<String>,
}

impl MessageItem {
    pub fn new(field: Option<&str>, message: impl Into<String>, status: Severity) -> Self {
        Self {
            field: field.map(str::to_string),
            message: message.into(),
            status,
            landmark: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(None, message, Severity::Error)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(None, message, Severity::Warning)
    }

    pub fn inform(message: impl Into<String>) -> Self {
        Self::new(None, message, Severity::Inform)
    }

    pub fn error_at(field: &str, message: impl Into<String>) -> Self {
        Self::new(Some(field), message, Severity::Error)
    }

    pub fn warning_at(field: &str, message: impl Into<String>) -> Self {
        Self::new(Some(field), message, Severity::Warning)
    }

    pub fn with_landmark(mut self, landmark: impl Into<String>) -> Self {
        self.landmark = Some(landmark.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.status >= Severity::Error
    }
}

/// Ordered collection of messages
#[derive(Debug, Clone, Default)]
pub struct MessageSet {
    items: Vec<MessageItem>,
}

impl MessageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item and return a mutable reference so callers can decorate it
    pub fn append_item(&mut self, item: MessageItem) -> &mut MessageItem {
        self.items.push(item);
        let last = self.items.len() - 1;
        &mut self.items[last]
    }

    pub fn append_set(&mut self, other: MessageSet) {
        self.items.extend(other.items);
    }

    pub fn error_at(&mut self, field: Option<&str>, message: impl Into<String>) -> &mut MessageItem {
        self.append_item(MessageItem::new(field, message, Severity::Error))
    }

    pub fn warning_at(
        &mut self,
        field: Option<&str>,
        message: impl Into<String>,
    ) -> &mut MessageItem {
        self.append_item(MessageItem::new(field, message, Severity::Warning))
    }

    pub fn has_error(&self) -> bool {
        self.items.iter().any(MessageItem::is_error)
    }

    pub fn has_error_at(&self, field: &str) -> bool {
        self.items
            .iter()
            .any(|mi| mi.is_error() && mi.field.as_deref() == Some(field))
    }

    pub fn max_severity(&self) -> Severity {
        self.items
            .iter()
            .map(|mi| mi.status)
            .max()
            .unwrap_or(Severity::Plain)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MessageItem> {
        self.items.iter()
    }

    pub fn message_list(&self) -> &[MessageItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<MessageItem> {
        self.items
    }
}

impl IntoIterator for MessageSet {
    type Item = MessageItem;
    type IntoIter = std::vec::IntoIter<MessageItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
