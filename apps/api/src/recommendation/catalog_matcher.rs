//! Catalog matcher: links recommendation records to authoritative catalog rows.
//!
//! Records are enriched, never filtered. Exact code match wins; otherwise the
//! record title is scanned for any catalog code as a substring, in catalog order.
//! Only the catalog supplies codes and links: an unmatched record ends up with neither.
//! The title scan is O(records × catalog), fine for a bounded catalog snapshot.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::catalog::CatalogEntry;
use crate::recommendation::record::RecommendationRecord;

/// Upper-cased, trimmed code lookup over a catalog snapshot.
pub struct CatalogIndex<'a> {
    by_code: HashMap<String, &'a CatalogEntry>,
    /// Keys in catalog order so the title scan is deterministic.
    ordered: Vec<(String, &'a CatalogEntry)>,
}

impl<'a> CatalogIndex<'a> {
    pub fn build(catalog: &'a [CatalogEntry]) -> Self {
        let mut by_code = HashMap::with_capacity(catalog.len());
        let mut ordered = Vec::with_capacity(catalog.len());
        for entry in catalog {
            let key = code_key(&entry.code);
            // A blank code would match every title.
            if key.is_empty() || by_code.contains_key(&key) {
                continue;
            }
            by_code.insert(key.clone(), entry);
            ordered.push((key, entry));
        }
        Self { by_code, ordered }
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn lookup_code(&self, code: &str) -> Option<&'a CatalogEntry> {
        self.by_code.get(&code_key(code)).copied()
    }

    /// First catalog entry whose code appears inside `title`.
    pub fn find_in_title(&self, title: &str) -> Option<&'a CatalogEntry> {
        let title = title.to_uppercase();
        self.ordered
            .iter()
            .find(|(key, _)| title.contains(key.as_str()))
            .map(|(_, entry)| *entry)
    }
}

fn code_key(code: &str) -> String {
    code.trim().to_uppercase()
}

/// How many records were linked, and how.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchSummary {
    pub by_code: usize,
    pub by_title: usize,
    pub unmatched: usize,
}

/// Attaches canonical code, link and catalog row id to every record that can be matched,
/// and strips model-supplied code and link from the rest.
pub fn attach_links(records: &mut [RecommendationRecord], catalog: &[CatalogEntry]) -> MatchSummary {
    let index = CatalogIndex::build(catalog);
    let mut summary = MatchSummary::default();

    for record in records.iter_mut() {
        let by_code = record
            .code
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .and_then(|c| index.lookup_code(c));

        if let Some(entry) = by_code {
            apply(record, entry);
            summary.by_code += 1;
            continue;
        }

        match index.find_in_title(&record.title) {
            Some(entry) => {
                apply(record, entry);
                summary.by_title += 1;
            }
            None => {
                record.code = None;
                record.link = None;
                record.course_id = None;
                summary.unmatched += 1;
            }
        }
    }

    summary
}

fn apply(record: &mut RecommendationRecord, entry: &CatalogEntry) {
    record.code = Some(entry.code.trim().to_string());
    record.link = entry
        .link
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from);
    record.course_id = Some(entry.id);
}
