//! Assertion helpers
//!
//! Id lists are compared in their expanded textual form, so expectations can
//! use `N-M` ranges: `"1-3 5"` equals `[1, 2, 3, 5]`.

use cfp_common::Severity;
use cfp_papers::paper::PaperStatus;
use cfp_papers::search::PaperSearch;
use serde_json::Value;
use sqlx::SqlitePool;

/// Expand `N-M` ranges in a space-separated id list
pub fn expand_int_list(list: &str) -> Vec<i64> {
    let mut ids = Vec::new();
    for word in list.split_whitespace() {
        match word.split_once('-') {
            Some((lo, hi)) => {
                let lo: i64 = lo.parse().expect("range start");
                let hi: i64 = hi.parse().expect("range end");
                ids.extend(lo..=hi);
            }
            None => ids.push(word.parse().expect("integer")),
        }
    }
    ids
}

#[track_caller]
pub fn assert_int_list_eq(actual: &[i64], expected: &str) {
    let expected = expand_int_list(expected);
    assert_eq!(actual, expected.as_slice(), "id lists differ");
}

/// Run a search over all collections unless `q` names one with `t`
pub async fn assert_search_ids(db: &SqlitePool, q: &str, t: Option<&str>, expected: &str) {
    let srch = PaperSearch::new(q, t.or(Some("all")), None);
    let ids = srch.sorted_paper_ids(db).await.expect("search should run");
    assert_eq!(
        ids,
        expand_int_list(expected),
        "search {:?} returned unexpected papers",
        q
    );
}

/// `fields` lists the `field` of each message in order (`""` for none)
#[track_caller]
pub fn assert_message_fields(result: &Value, fields: &[&str]) {
    let actual: Vec<&str> = result["message_list"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|mi| mi["field"].as_str().unwrap_or(""))
                .collect()
        })
        .unwrap_or_default();
    assert_eq!(actual, fields, "message fields differ in {}", result);
}

#[track_caller]
pub fn assert_change_list(change_list: &Value, keys: &[&str]) {
    let actual: Vec<&str> = change_list
        .as_array()
        .unwrap_or_else(|| panic!("expected change list, got {}", change_list))
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(actual, keys);
}

/// Fail with every message when `ps` reports anything above `max`
#[track_caller]
pub fn assert_paper_status(ps: &PaperStatus, max: Severity) {
    let problems: Vec<String> = ps
        .messages()
        .iter()
        .filter(|mi| mi.status > max)
        .map(|mi| format!("{}: {}", mi.field.as_deref().unwrap_or(""), mi.message))
        .collect();
    assert!(problems.is_empty(), "unexpected messages:\n{}", problems.join("\n"));
}
