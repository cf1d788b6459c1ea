//! Paper search
//!
//! Queries are space-separated terms that must all match. Supported terms:
//! `#N`, `N` and `N-M` id terms, `ti:`, `ab:`, `au:` and `topic:` keyword
//! terms, and bare words matched against title, abstract and authors.
//! Double quotes group words into one phrase.

use cfp_common::MessageSet;
use sqlx::SqlitePool;

use crate::paper::{fetch_all_papers, PaperRow, PaperState};

/// Paper collection selected with `t`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Collection {
    #[default]
    Submitted,
    All,
    Draft,
    Withdrawn,
}

impl Collection {
    pub fn parse(t: &str) -> Option<Self> {
        match t {
            "s" | "submitted" => Some(Collection::Submitted),
            "all" => Some(Collection::All),
            "draft" => Some(Collection::Draft),
            "withdrawn" => Some(Collection::Withdrawn),
            _ => None,
        }
    }

    fn contains(self, state: PaperState) -> bool {
        match self {
            Collection::Submitted => state == PaperState::Submitted,
            Collection::All => true,
            Collection::Draft => state == PaperState::Draft,
            Collection::Withdrawn => state == PaperState::Withdrawn,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Id,
    Title,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Term {
    Ids(i64, i64),
    Title(String),
    Abstract(String),
    Author(String),
    Topic(String),
    Any(String),
}

impl Term {
    fn matches(&self, prow: &PaperRow) -> bool {
        match self {
            Term::Ids(lo, hi) => (*lo..=*hi).contains(&prow.paper_id),
            Term::Title(w) => contains_ci(&prow.title, w),
            Term::Abstract(w) => contains_ci(&prow.abstract_text, w),
            Term::Author(w) => author_matches(prow, w),
            Term::Topic(w) => prow.topics.iter().any(|t| contains_ci(t, w)),
            Term::Any(w) => {
                contains_ci(&prow.title, w)
                    || contains_ci(&prow.abstract_text, w)
                    || author_matches(prow, w)
            }
        }
    }
}

fn author_matches(prow: &PaperRow, w: &str) -> bool {
    prow.authors.iter().any(|a| {
        contains_ci(&a.name(), w) || contains_ci(&a.email, w) || contains_ci(&a.affiliation, w)
    })
}

/// `needle` is already lowercase
fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// A parsed search request
#[derive(Debug, Clone)]
pub struct PaperSearch {
    terms: Vec<Term>,
    collection: Collection,
    sort: SortKey,
    reverse: bool,
    messages: MessageSet,
}

impl PaperSearch {
    /// Parse `q`, `t` and `sort`; problems become warnings
    pub fn new(q: &str, t: Option<&str>, sort: Option<&str>) -> Self {
        let mut messages = MessageSet::new();

        let collection = match t.map(str::trim).filter(|t| !t.is_empty()) {
            None => Collection::default(),
            Some(t) => Collection::parse(t).unwrap_or_else(|| {
                messages.warning_at(Some("t"), format!("Unknown collection ‘{}’", t));
                Collection::default()
            }),
        };

        let (sort, reverse) = match sort.map(str::trim).filter(|s| !s.is_empty()) {
            None => (SortKey::Id, false),
            Some(s) => {
                let (key, reverse) = match s.strip_prefix('-') {
                    Some(key) => (key, true),
                    None => (s, false),
                };
                match key {
                    "id" | "pid" => (SortKey::Id, reverse),
                    "title" => (SortKey::Title, reverse),
                    _ => {
                        messages.warning_at(Some("sort"), format!("Unknown sort ‘{}’", s));
                        (SortKey::Id, false)
                    }
                }
            }
        };

        let mut terms = Vec::new();
        for word in split_query(q) {
            if let Some(term) = parse_term(&word, &mut messages) {
                terms.push(term);
            }
        }

        Self {
            terms,
            collection,
            sort,
            reverse,
            messages,
        }
    }

    pub fn matches(&self, prow: &PaperRow) -> bool {
        self.collection.contains(prow.status) && self.terms.iter().all(|t| t.matches(prow))
    }

    /// Matching papers in the requested order
    pub async fn sorted_papers(&self, db: &SqlitePool) -> sqlx::Result<Vec<PaperRow>> {
        let mut papers: Vec<PaperRow> = fetch_all_papers(db)
            .await?
            .into_iter()
            .filter(|p| self.matches(p))
            .collect();
        match self.sort {
            SortKey::Id => papers.sort_by_key(|p| p.paper_id),
            SortKey::Title => {
                papers.sort_by(|a, b| {
                    a.title
                        .to_lowercase()
                        .cmp(&b.title.to_lowercase())
                        .then(a.paper_id.cmp(&b.paper_id))
                });
            }
        }
        if self.reverse {
            papers.reverse();
        }
        Ok(papers)
    }

    pub async fn sorted_paper_ids(&self, db: &SqlitePool) -> sqlx::Result<Vec<i64>> {
        Ok(self
            .sorted_papers(db)
            .await?
            .into_iter()
            .map(|p| p.paper_id)
            .collect())
    }

    pub fn messages(&self) -> &MessageSet {
        &self.messages
    }
}

/// Split on whitespace outside double quotes, removing the quotes
fn split_query(q: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut quoted = false;
    let mut any = false;
    for ch in q.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                any = true;
            }
            c if c.is_whitespace() && !quoted => {
                if any {
                    words.push(std::mem::take(&mut word));
                    any = false;
                }
            }
            c => {
                word.push(c);
                any = true;
            }
        }
    }
    if any {
        words.push(word);
    }
    words.retain(|w| !w.trim().is_empty());
    words
}

fn parse_term(word: &str, messages: &mut MessageSet) -> Option<Term> {
    if let Some(ids) = parse_id_term(word) {
        return Some(ids);
    }
    if word == "OR" || word == "NOT" {
        messages.warning_at(Some("q"), format!("Search operator ‘{}’ not supported", word));
        return None;
    }
    if let Some((kw, value)) = word.split_once(':') {
        if !kw.is_empty() && kw.chars().all(|c| c.is_ascii_alphabetic()) {
            let value = value.trim().to_lowercase();
            let term = match kw.to_ascii_lowercase().as_str() {
                "ti" | "title" => Term::Title(value),
                "ab" | "abstract" => Term::Abstract(value),
                "au" | "author" | "authors" => Term::Author(value),
                "topic" | "topics" => Term::Topic(value),
                _ => {
                    messages.warning_at(Some("q"), format!("Unknown search keyword ‘{}’", kw));
                    return None;
                }
            };
            return Some(term);
        }
    }
    Some(Term::Any(word.to_lowercase()))
}

fn parse_id_term(word: &str) -> Option<Term> {
    let word = word.strip_prefix('#').unwrap_or(word);
    let parse = |s: &str| -> Option<i64> {
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            s.parse().ok()
        } else {
            None
        }
    };
    match word.split_once('-') {
        Some((lo, hi)) => {
            let (lo, hi) = (parse(lo)?, parse(hi)?);
            Some(Term::Ids(lo.min(hi), lo.max(hi)))
        }
        None => parse(word).map(|n| Term::Ids(n, n)),
    }
}
