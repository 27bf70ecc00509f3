//! Global documentable registry.
//!
//! Built in two phases: each document contributes its entries (computed
//! independently, in any order), the builder collects them, and `freeze`
//! sorts everything by (source path, extraction order) before indexing. The
//! frozen registry is read-only, so resolution never depends on the order
//! documents were loaded in.

use crate::model::{ExtractedDocument, Kind};
use std::collections::HashMap;

pub type EntryId = usize;

/// Registry view of one documentable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub kind: Kind,
    /// Source path relative to the corpus root.
    pub source: String,
    pub page: String,
    pub anchor: Option<String>,
    /// Position in the document's extraction order (0 = document root).
    pub ordinal: usize,
}

impl Entry {
    /// `page#anchor (kind)`, used in diagnostics.
    pub fn describe(&self) -> String {
        match self.anchor {
            Some(ref anchor) => format!("{}#{} ({})", self.page, anchor, self.kind),
            None => format!("{} ({})", self.page, self.kind),
        }
    }
}

/// One document's local contribution.
pub fn contribution(doc: &ExtractedDocument) -> Vec<Entry> {
    doc.documentables
        .iter()
        .enumerate()
        .map(|(ordinal, d)| Entry {
            name: d.name.clone(),
            kind: d.kind,
            source: doc.source.path.clone(),
            page: doc.page.clone(),
            anchor: d.anchor.clone(),
            ordinal,
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entries: Vec<Entry>,
}

impl RegistryBuilder {
    /// Append a contribution. Never overwrites: same-named entries accumulate.
    pub fn extend(&mut self, entries: Vec<Entry>) {
        self.entries.extend(entries);
    }

    pub fn freeze(mut self) -> Registry {
        self.entries.sort_by(|a, b| {
            a.source
                .cmp(&b.source)
                .then(a.ordinal.cmp(&b.ordinal))
        });

        let mut registry = Registry {
            entries: Vec::new(),
            by_key: HashMap::new(),
            by_name: HashMap::new(),
            by_folded_name: HashMap::new(),
            pages: HashMap::new(),
            folded_pages: HashMap::new(),
        };

        for (id, entry) in self.entries.iter().enumerate() {
            registry
                .by_key
                .entry((entry.name.clone(), entry.kind))
                .or_default()
                .push(id);
            registry.by_name.entry(entry.name.clone()).or_default().push(id);
            registry
                .by_folded_name
                .entry(entry.name.to_lowercase())
                .or_default()
                .push(id);
            if entry.ordinal == 0 {
                registry.pages.entry(entry.page.clone()).or_insert(id);
                registry
                    .folded_pages
                    .entry(entry.page.to_lowercase())
                    .or_default()
                    .push(id);
            }
        }
        registry.entries = self.entries;
        registry
    }
}

/// Outcome of a name lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(EntryId),
    /// Every candidate, first-declared first.
    Ambiguous(Vec<EntryId>),
    NotFound,
}

fn pick(ids: &[EntryId]) -> Lookup {
    match ids {
        [] => Lookup::NotFound,
        [id] => Lookup::Found(*id),
        _ => Lookup::Ambiguous(ids.to_vec()),
    }
}

/// Frozen (name, kind) → documentables mapping.
#[derive(Debug)]
pub struct Registry {
    entries: Vec<Entry>,
    by_key: HashMap<(String, Kind), Vec<EntryId>>,
    by_name: HashMap<String, Vec<EntryId>>,
    by_folded_name: HashMap<String, Vec<EntryId>>,
    pages: HashMap<String, EntryId>,
    folded_pages: HashMap<String, Vec<EntryId>>,
}

impl Registry {
    pub fn get(&self, id: EntryId) -> &Entry {
        &self.entries[id]
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Every entry registered under exactly (name, kind).
    pub fn candidates(&self, name: &str, kind: Kind) -> &[EntryId] {
        self.by_key
            .get(&(name.to_string(), kind))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Root entry of a page path, exact match first, then case-insensitive
    /// when that is unambiguous.
    pub fn page(&self, page: &str) -> Option<EntryId> {
        if let Some(&id) = self.pages.get(page) {
            return Some(id);
        }
        match self.folded_pages.get(&page.to_lowercase()).map(Vec::as_slice) {
            Some([id]) => Some(*id),
            _ => None,
        }
    }

    /// Name lookup. Exact spelling is tried before a case-insensitive
    /// fallback; at each step a matching `hint` kind narrows the candidates
    /// before all kinds are considered.
    pub fn lookup(&self, name: &str, hint: Option<Kind>) -> Lookup {
        if let Some(kind) = hint {
            let exact = self.candidates(name, kind);
            if !exact.is_empty() {
                return pick(exact);
            }
        }
        if let Some(ids) = self.by_name.get(name) {
            return pick(ids);
        }

        let folded = match self.by_folded_name.get(&name.to_lowercase()) {
            Some(ids) => ids,
            None => return Lookup::NotFound,
        };
        if let Some(kind) = hint {
            let hinted: Vec<EntryId> = folded
                .iter()
                .copied()
                .filter(|&id| self.entries[id].kind == kind)
                .collect();
            if !hinted.is_empty() {
                return pick(&hinted);
            }
        }
        pick(folded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(source: &str, ordinal: usize, name: &str, kind: Kind) -> Entry {
        let page = source.trim_end_matches(".rakudoc").to_string();
        Entry {
            name: name.to_string(),
            kind,
            source: source.to_string(),
            page,
            anchor: (ordinal > 0).then(|| name.to_lowercase()),
            ordinal,
        }
    }

    fn sample(order: &[usize]) -> Registry {
        let contributions = vec![
            vec![
                entry("b.rakudoc", 0, "b", Kind::Language),
                entry("b.rakudoc", 1, "Widget", Kind::Routine),
            ],
            vec![
                entry("a.rakudoc", 0, "a", Kind::Language),
                entry("a.rakudoc", 1, "Widget", Kind::Routine),
                entry("a.rakudoc", 2, "Str", Kind::Class),
            ],
            vec![
                entry("c.rakudoc", 0, "c", Kind::Language),
                entry("c.rakudoc", 1, "Str", Kind::Routine),
            ],
        ];
        let mut builder = RegistryBuilder::default();
        for &i in order {
            builder.extend(contributions[i].clone());
        }
        builder.freeze()
    }

    #[test]
    fn freeze_is_order_independent() {
        let one = sample(&[0, 1, 2]);
        let two = sample(&[2, 0, 1]);
        assert_eq!(one.entries(), two.entries());
        assert_eq!(one.lookup("Widget", None), two.lookup("Widget", None));
    }

    #[test]
    fn ambiguous_lists_first_declared_first() {
        let reg = sample(&[0, 1, 2]);
        match reg.lookup("Widget", None) {
            Lookup::Ambiguous(ids) => {
                assert_eq!(ids.len(), 2);
                assert_eq!(reg.get(ids[0]).source, "a.rakudoc");
                assert_eq!(reg.get(ids[1]).source, "b.rakudoc");
            }
            other => panic!("expected ambiguity, got {:?}", other),
        }
    }

    #[test]
    fn kind_hint_disambiguates() {
        let reg = sample(&[1, 2, 0]);
        match reg.lookup("Str", Some(Kind::Class)) {
            Lookup::Found(id) => assert_eq!(reg.get(id).source, "a.rakudoc"),
            other => panic!("expected single match, got {:?}", other),
        }
        assert!(matches!(reg.lookup("Str", None), Lookup::Ambiguous(ref ids) if ids.len() == 2));
        // A hint that matches nothing falls back to every kind
        assert!(matches!(reg.lookup("Str", Some(Kind::Pragma)), Lookup::Ambiguous(_)));
    }

    #[test]
    fn case_insensitive_fallback() {
        let reg = sample(&[0, 1, 2]);
        assert!(matches!(reg.lookup("widget", Some(Kind::Routine)), Lookup::Ambiguous(_)));
        assert!(matches!(reg.lookup("STR", Some(Kind::Class)), Lookup::Found(_)));
        assert_eq!(reg.lookup("Nothing", None), Lookup::NotFound);
    }

    #[test]
    fn exact_spelling_wins_over_folded() {
        let mut builder = RegistryBuilder::default();
        builder.extend(vec![
            entry("x.rakudoc", 0, "x", Kind::Language),
            entry("x.rakudoc", 1, "list", Kind::Routine),
            entry("x.rakudoc", 2, "List", Kind::Class),
        ]);
        let reg = builder.freeze();
        match reg.lookup("List", None) {
            Lookup::Found(id) => assert_eq!(reg.get(id).kind, Kind::Class),
            other => panic!("expected List class, got {:?}", other),
        }
    }

    #[test]
    fn pages_index_document_roots() {
        let reg = sample(&[0, 1, 2]);
        let id = reg.page("b").unwrap();
        assert_eq!(reg.get(id).ordinal, 0);
        assert_eq!(reg.page("B"), Some(id));
        assert_eq!(reg.page("missing"), None);
        assert_eq!(reg.len(), 7);
    }
}
