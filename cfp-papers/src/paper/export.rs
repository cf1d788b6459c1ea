//! Paper JSON export

use serde_json::{json, Map, Value};

use super::{DocumentRow, DocumentType, PaperRow};

/// JSON representation of a stored paper
///
/// The same shape is accepted back by the save pipeline, apart from
/// documents, which export metadata instead of content.
pub fn paper_json(prow: &PaperRow) -> Value {
    let mut pj = Map::new();
    pj.insert("object".to_string(), json!("paper"));
    pj.insert("pid".to_string(), json!(prow.paper_id));
    pj.insert("title".to_string(), json!(prow.title));
    pj.insert("status".to_string(), json!(prow.status.as_str()));
    if !prow.submission_class.is_empty() {
        pj.insert("submission_class".to_string(), json!(prow.submission_class));
    }
    if !prow.abstract_text.is_empty() {
        pj.insert("abstract".to_string(), json!(prow.abstract_text));
    }
    pj.insert("authors".to_string(), json!(prow.authors));
    if !prow.topics.is_empty() {
        pj.insert("topics".to_string(), json!(prow.topics));
    }
    for dtype in DocumentType::ALL {
        if let Some(doc) = prow.document(dtype) {
            pj.insert(dtype.key().to_string(), document_json(doc));
        }
    }
    Value::Object(pj)
}

fn document_json(doc: &DocumentRow) -> Value {
    let mut dj = json!({
        "docid": doc.document_id,
        "mimetype": doc.mimetype,
        "size": doc.size,
        "hash": doc.hash,
    });
    if let Some(filename) = &doc.filename {
        dj["filename"] = json!(filename);
    }
    dj
}
