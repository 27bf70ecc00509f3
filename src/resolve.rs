//! Cross-reference resolution against the frozen registry.
//!
//! Runs per document and only reads shared state, so documents resolve in
//! parallel. Each link gets exactly one outcome; each broken or ambiguous
//! link produces exactly one diagnostic.

use crate::anchor::{fragment_anchor, slug};
use crate::config::Config;
use crate::diagnostics::Diagnostic;
use crate::model::*;
use crate::registry::{EntryId, Lookup, Registry};

/// Outcome of one Link or IndexMarker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A registry entry, with the anchor to jump to on its page.
    Target { entry: EntryId, anchor: Option<String> },
    /// Several candidates; `chosen` is the first declared.
    Ambiguous {
        chosen: EntryId,
        anchor: Option<String>,
        candidates: Vec<EntryId>,
    },
    /// An anchor on the current page.
    Local { anchor: Option<String> },
    External(String),
    Broken,
}

/// Side table from reference id to outcome.
#[derive(Debug, Default)]
pub struct Resolutions {
    slots: Vec<Option<Resolution>>,
}

impl Resolutions {
    fn with_capacity(n: usize) -> Self {
        Self {
            slots: vec![None; n],
        }
    }

    fn set(&mut self, id: RefId, resolution: Resolution) {
        if id.0 >= self.slots.len() {
            self.slots.resize(id.0 + 1, None);
        }
        self.slots[id.0] = Some(resolution);
    }

    pub fn get(&self, id: RefId) -> Option<&Resolution> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }
}

pub fn is_external(target: &str) -> bool {
    target.contains("://") || target.starts_with("mailto:")
}

struct Resolver<'a> {
    doc: &'a ExtractedDocument,
    registry: &'a Registry,
    config: &'a Config,
    out: Resolutions,
    diagnostics: Vec<Diagnostic>,
}

/// Resolve every reference in `doc`.
pub fn resolve(
    doc: &ExtractedDocument,
    registry: &Registry,
    config: &Config,
) -> (Resolutions, Vec<Diagnostic>) {
    let mut r = Resolver {
        doc,
        registry,
        config,
        out: Resolutions::with_capacity(doc.parsed.ref_count),
        diagnostics: Vec::new(),
    };

    for &(id, owner) in &doc.index_owners {
        let anchor = doc.documentables[owner].anchor.clone();
        r.out.set(id, Resolution::Local { anchor });
    }

    for node in &doc.parsed.nodes {
        match &node.block {
            Block::Heading { content, .. } | Block::Paragraph(content) => {
                r.walk(content, node.line)
            }
            Block::List(items) => {
                for item in items {
                    r.walk(&item.content, item.line);
                }
            }
            Block::CodeBlock { .. } => {}
        }
    }

    (r.out, r.diagnostics)
}

impl Resolver<'_> {
    fn walk(&mut self, content: &[Inline], line: usize) {
        for inline in content {
            match inline {
                Inline::Link { id, display, target } => {
                    let resolution = self.link(target, line);
                    self.out.set(*id, resolution);
                    self.walk(display, line);
                }
                Inline::Span { content, .. } => self.walk(content, line),
                Inline::Index { display, .. } => self.walk(display, line),
                Inline::Text(_) => {}
            }
        }
    }

    fn link(&mut self, raw: &str, line: usize) -> Resolution {
        let target = raw.trim();
        if is_external(target) {
            return Resolution::External(target.to_string());
        }

        let (base, fragment) = match target.split_once('#') {
            Some((base, fragment)) => (base, Some(fragment)),
            None => (target, None),
        };

        if base.is_empty() {
            return match fragment.and_then(|f| self.local_anchor(f)) {
                Some(anchor) => Resolution::Local {
                    anchor: Some(anchor),
                },
                None => self.broken(raw, line),
            };
        }

        let lookup = if let Some(path) = base.strip_prefix('/') {
            let path = path.trim_end_matches('/');
            if let Some(id) = self.registry.page(path) {
                return Resolution::Target {
                    entry: id,
                    anchor: fragment.map(fragment_anchor),
                };
            }
            let (hint, name) = match path.split_once('/') {
                Some((prefix, name)) => (self.config.link_prefix_kind(prefix), name),
                None => (None, path),
            };
            self.registry.lookup(name, hint)
        } else {
            match base.strip_prefix('&') {
                Some(name) => self.registry.lookup(name, Some(Kind::Routine)),
                None => self.registry.lookup(base, None),
            }
        };

        match lookup {
            Lookup::Found(id) => Resolution::Target {
                entry: id,
                anchor: self.target_anchor(id, fragment),
            },
            Lookup::Ambiguous(candidates) => {
                let chosen = candidates[0];
                self.diagnostics.push(Diagnostic::AmbiguousReference {
                    path: self.doc.source.path.clone(),
                    line,
                    target: raw.to_string(),
                    candidates: candidates
                        .iter()
                        .map(|&id| self.registry.get(id).describe())
                        .collect(),
                });
                Resolution::Ambiguous {
                    chosen,
                    anchor: self.target_anchor(chosen, fragment),
                    candidates,
                }
            }
            Lookup::NotFound => self.broken(raw, line),
        }
    }

    /// Own anchor of a named entry; a fragment only applies to page roots.
    fn target_anchor(&self, id: EntryId, fragment: Option<&str>) -> Option<String> {
        let entry = self.registry.get(id);
        match (&entry.anchor, fragment) {
            (Some(anchor), _) => Some(anchor.clone()),
            (None, Some(fragment)) => Some(fragment_anchor(fragment)),
            (None, None) => None,
        }
    }

    /// Anchor in this document matching a `#fragment`.
    fn local_anchor(&self, fragment: &str) -> Option<String> {
        let wanted = fragment_anchor(fragment);
        if wanted.is_empty() {
            return None;
        }
        let documentables = &self.doc.documentables;
        documentables
            .iter()
            .filter_map(|d| d.anchor.as_ref())
            .find(|a| **a == wanted)
            .or_else(|| {
                documentables
                    .iter()
                    .find(|d| {
                        d.anchor.is_some()
                            && (slug(&d.title) == wanted || slug(&d.name) == wanted)
                    })
                    .and_then(|d| d.anchor.as_ref())
            })
            .cloned()
    }

    fn broken(&mut self, raw: &str, line: usize) -> Resolution {
        self.diagnostics.push(Diagnostic::BrokenReference {
            path: self.doc.source.path.clone(),
            line,
            target: raw.to_string(),
        });
        Resolution::Broken
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classifier;
    use crate::extract::extract;
    use crate::parser;
    use crate::registry::{self as reg, RegistryBuilder};

    fn corpus(files: &[(&str, &str)]) -> (Vec<ExtractedDocument>, Registry, Config) {
        let config = Config::default();
        let classifier = Classifier::new(&config).unwrap();
        let docs: Vec<ExtractedDocument> = files
            .iter()
            .map(|(path, text)| {
                let source = SourceDocument {
                    path: path.to_string(),
                    text: text.to_string(),
                };
                let parsed = parser::parse(&source.text);
                extract(source, parsed, &config, &classifier)
            })
            .collect();
        let mut builder = RegistryBuilder::default();
        for doc in &docs {
            builder.extend(reg::contribution(doc));
        }
        (docs, builder.freeze(), config)
    }

    fn first_link(doc: &ExtractedDocument, res: &Resolutions) -> Resolution {
        fn find(content: &[Inline]) -> Option<RefId> {
            content.iter().find_map(|i| match i {
                Inline::Link { id, .. } => Some(*id),
                Inline::Span { content, .. } => find(content),
                _ => None,
            })
        }
        let id = doc
            .parsed
            .nodes
            .iter()
            .find_map(|n| match &n.block {
                Block::Paragraph(c) => find(c),
                _ => None,
            })
            .expect("document has a link");
        res.get(id).cloned().expect("link resolved")
    }

    const STR: &str = "=begin pod :kind(\"Type\")\n\n=TITLE class Str\n\n=head1 Methods\n\n=head2 method split\n\nSplits.\n";

    #[test]
    fn cross_document_link_resolves_regardless_of_order() {
        let linker = "=begin pod :kind(\"Language\")\n\n=TITLE Intro\n\nSee L<split|/routine/split>.\n";
        // "Language/intro" sorts before "Type/Str"
        let (docs, registry, config) =
            corpus(&[("Language/intro.rakudoc", linker), ("Type/Str.rakudoc", STR)]);
        let (res, diags) = resolve(&docs[0], &registry, &config);
        assert!(diags.is_empty(), "{:?}", diags);
        match first_link(&docs[0], &res) {
            Resolution::Target { entry, anchor } => {
                assert_eq!(registry.get(entry).page, "type/Str");
                assert_eq!(anchor.as_deref(), Some("method-split"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn page_link_with_fragment() {
        let linker = "=begin pod :kind(\"Language\")\n\nL</type/Str#method_split>\n";
        let (docs, registry, config) =
            corpus(&[("Language/a.rakudoc", linker), ("Type/Str.rakudoc", STR)]);
        let (res, diags) = resolve(&docs[0], &registry, &config);
        assert!(diags.is_empty());
        match first_link(&docs[0], &res) {
            Resolution::Target { entry, anchor } => {
                assert_eq!(registry.get(entry).ordinal, 0);
                assert_eq!(anchor.as_deref(), Some("method-split"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn duplicate_names_are_ambiguous_with_one_diagnostic() {
        let a = "=begin pod :kind(\"Type\")\n\n=TITLE class A\n\n=head1 Methods\n\n=head2 method Widget\n";
        let b = "=begin pod :kind(\"Type\")\n\n=TITLE class B\n\n=head1 Methods\n\n=head2 method Widget\n";
        let c = "=begin pod :kind(\"Language\")\n\nUse L<Widget>.\n";
        let (docs, registry, config) =
            corpus(&[("Type/B.rakudoc", b), ("Language/c.rakudoc", c), ("Type/A.rakudoc", a)]);
        let (res, diags) = resolve(&docs[1], &registry, &config);
        assert_eq!(diags.len(), 1);
        match &diags[0] {
            Diagnostic::AmbiguousReference { candidates, .. } => {
                assert_eq!(candidates.len(), 2);
                assert!(candidates[0].starts_with("type/A#"));
            }
            other => panic!("unexpected {:?}", other),
        }
        match first_link(&docs[1], &res) {
            Resolution::Ambiguous { chosen, candidates, .. } => {
                assert_eq!(candidates.len(), 2);
                assert_eq!(registry.get(chosen).page, "type/A");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn broken_and_external_links() {
        let text = "=begin pod :kind(\"Language\")\n\nL<nowhere> and L<site|https://raku.org> and L<#Nope>.\n";
        let (docs, registry, config) = corpus(&[("Language/x.rakudoc", text)]);
        let (res, diags) = resolve(&docs[0], &registry, &config);
        assert_eq!(diags.len(), 2);
        assert!(diags.iter().all(|d| matches!(d, Diagnostic::BrokenReference { .. })));
        assert_eq!(res.get(RefId(0)), Some(&Resolution::Broken));
        assert_eq!(
            res.get(RefId(1)),
            Some(&Resolution::External("https://raku.org".to_string()))
        );
    }

    #[test]
    fn local_fragment() {
        let text = "=begin pod :kind(\"Language\")\n\n=head1 Some topic\n\nBack to L<top|#Some_topic>.\n";
        let (docs, registry, config) = corpus(&[("Language/x.rakudoc", text)]);
        let (res, diags) = resolve(&docs[0], &registry, &config);
        assert!(diags.is_empty());
        assert_eq!(
            first_link(&docs[0], &res),
            Resolution::Local {
                anchor: Some("some-topic".to_string())
            }
        );
    }

    #[test]
    fn routine_sigil_hints_kind() {
        let other = "=begin pod :kind(\"Type\")\n\n=TITLE class split\n";
        let linker = "=begin pod :kind(\"Language\")\n\nL<&split>\n";
        let (docs, registry, config) = corpus(&[
            ("Language/a.rakudoc", linker),
            ("Type/Str.rakudoc", STR),
            ("Type/split.rakudoc", other),
        ]);
        let (res, diags) = resolve(&docs[0], &registry, &config);
        assert!(diags.is_empty());
        match first_link(&docs[0], &res) {
            Resolution::Target { entry, .. } => assert_eq!(registry.get(entry).kind, Kind::Routine),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn index_markers_point_at_their_owner() {
        let text = "=begin pod :kind(\"Language\")\n\n=head1 Containers\n\nA X<scalar|Reference,scalar> here.\n";
        let (docs, registry, config) = corpus(&[("Language/c.rakudoc", text)]);
        let (res, diags) = resolve(&docs[0], &registry, &config);
        assert!(diags.is_empty());
        assert_eq!(
            res.get(RefId(0)),
            Some(&Resolution::Local {
                anchor: Some("containers".to_string())
            })
        );
    }
}
