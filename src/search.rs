//! Search index: one entry per documentable plus one per alias.

use crate::model::{ExtractedDocument, Kind};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct SearchEntry {
    pub name: String,
    pub kind: Kind,
    pub title: String,
    /// Relative to the output root.
    pub url: String,
    /// Name of the documentable an alias points at.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_of: Option<String>,
}

/// Entries contributed by one document.
pub fn fragment(doc: &ExtractedDocument, ext: &str) -> Vec<SearchEntry> {
    let mut entries = Vec::new();
    for d in &doc.documentables {
        let url = match d.anchor {
            Some(ref anchor) => format!("{}.{}#{}", doc.page, ext, anchor),
            None => format!("{}.{}", doc.page, ext),
        };
        for alias in &d.aliases {
            entries.push(SearchEntry {
                name: alias.clone(),
                kind: d.kind,
                title: d.title.clone(),
                url: url.clone(),
                alias_of: Some(d.name.clone()),
            });
        }
        entries.push(SearchEntry {
            name: d.name.clone(),
            kind: d.kind,
            title: d.title.clone(),
            url,
            alias_of: None,
        });
    }
    entries
}

/// Merge per-document fragments into one sorted, duplicate-free index.
pub fn merge(fragments: Vec<Vec<SearchEntry>>) -> Vec<SearchEntry> {
    let mut entries: Vec<SearchEntry> = fragments.into_iter().flatten().collect();
    entries.sort();
    entries.dedup();
    entries
}
