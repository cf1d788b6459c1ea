//! Paper id resolution for JSON paper objects
//!
//! A paper object names its target with `pid` (or the legacy `id`). Batch
//! imports can ask to drop incoming ids or to find the target by title.

use bitflags::bitflags;
use cfp_common::params::simplify_whitespace;
use serde_json::{Map, Value};
use sqlx::SqlitePool;

bitflags! {
    /// Options for [`analyze_json_pid`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PidFlags: u8 {
        /// Discard `pid`/`id`, keeping the original under `__original_pid`
        const IGNORE_PID = 1;
        /// Without an id, target the single paper whose title matches
        const MATCH_TITLE = 2;
    }
}

/// Resolved target of a paper object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pidish {
    Id(i64),
    New,
}

impl Pidish {
    /// Landmark used to attribute messages in batch responses
    pub fn landmark(self, index: usize) -> String {
        match self {
            Pidish::Id(pid) => format!("#{}", pid),
            Pidish::New => format!("index {}", index),
        }
    }
}

/// Read the target of a paper object without modifying it
///
/// Returns `None` when the id is present but malformed.
pub fn json_pid(j: &Map<String, Value>) -> Option<Pidish> {
    let pid = match j.get("pid") {
        Some(Value::Null) | None => j.get("id"),
        some => some,
    };
    match pid {
        None | Some(Value::Null) => Some(Pidish::New),
        Some(Value::String(s)) if s == "new" => Some(Pidish::New),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(pid) if pid > 0 => Some(Pidish::Id(pid)),
            _ => None,
        },
        Some(_) => None,
    }
}

/// Apply `flags` to a paper object and resolve its target
///
/// `IGNORE_PID` and `MATCH_TITLE` modify `j` in place so later stages see the
/// rewritten id.
pub async fn analyze_json_pid(
    db: &SqlitePool,
    j: &mut Map<String, Value>,
    flags: PidFlags,
) -> sqlx::Result<Option<Pidish>> {
    if flags.contains(PidFlags::IGNORE_PID) {
        match j.remove("pid") {
            None | Some(Value::Null) => {}
            Some(pid) => {
                j.insert("__original_pid".to_string(), pid);
            }
        }
        j.remove("id");
    }

    if !has_id(j) && flags.contains(PidFlags::MATCH_TITLE) {
        if let Some(Value::String(title)) = j.get("title") {
            let pids = paper_ids_with_title(db, &simplify_whitespace(title)).await?;
            if let [pid] = pids.as_slice() {
                j.insert("pid".to_string(), Value::from(*pid));
            }
        }
    }

    Ok(json_pid(j))
}

/// A null `pid` or `id` counts as absent
fn has_id(j: &Map<String, Value>) -> bool {
    ["pid", "id"]
        .iter()
        .any(|k| !matches!(j.get(*k), None | Some(Value::Null)))
}

async fn paper_ids_with_title(db: &SqlitePool, title: &str) -> sqlx::Result<Vec<i64>> {
    sqlx::query_scalar("SELECT paper_id FROM papers WHERE title = ? ORDER BY paper_id")
        .bind(title)
        .fetch_all(db)
        .await
}
