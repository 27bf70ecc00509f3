//! Documentable extraction: an explicit stack of open documentables keyed by
//! heading level. A heading at level N closes every open documentable at
//! level >= N before opening its own; the document root (level 0) stays open
//! until the end.

use crate::anchor::AnchorSet;
use crate::classify::{Classifier, HeadingContext};
use crate::config::Config;
use crate::diagnostics::Diagnostic;
use crate::model::*;

/// Category of a file: `:kind` metadata, else its top-level directory.
pub fn file_category(source: &SourceDocument, parsed: &ParsedDocument) -> Option<String> {
    parsed
        .meta
        .kind
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| {
            source
                .path
                .split_once('/')
                .map(|(dir, _)| dir.to_string())
        })
}

/// Output page path: the source path without extension, top directory lowercased.
pub fn page_path(path: &str) -> String {
    let without_ext = match path.rfind('.') {
        Some(dot) if !path[dot..].contains('/') => &path[..dot],
        _ => path,
    };
    match without_ext.split_once('/') {
        Some((dir, rest)) => format!("{}/{}", dir.to_lowercase(), rest),
        None => without_ext.to_string(),
    }
}

fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    }
}

struct Extractor<'a> {
    config: &'a Config,
    classifier: &'a Classifier,
    category: Option<String>,
    path: String,
    docs: Vec<Documentable>,
    stack: Vec<usize>,
    index_owners: Vec<(RefId, usize)>,
    warnings: Vec<Diagnostic>,
    anchors: AnchorSet,
    titled: bool,
}

/// Extract every documentable of one parsed document.
pub fn extract(
    source: SourceDocument,
    parsed: ParsedDocument,
    config: &Config,
    classifier: &Classifier,
) -> ExtractedDocument {
    let category = file_category(&source, &parsed);
    let page = page_path(&source.path);
    let stem = file_stem(&source.path).to_string();

    let mut ex = Extractor {
        config,
        classifier,
        category: category.clone(),
        path: source.path.clone(),
        docs: Vec::new(),
        stack: vec![0],
        index_owners: Vec::new(),
        warnings: Vec::new(),
        anchors: AnchorSet::default(),
        titled: false,
    };
    ex.open_root(&stem, parsed.nodes.len());

    for (i, node) in parsed.nodes.iter().enumerate() {
        ex.visit(i, node);
    }
    ex.close_to(0, parsed.nodes.len());

    tracing::debug!(
        path = %source.path,
        documentables = ex.docs.len(),
        "extracted"
    );

    ExtractedDocument {
        source,
        parsed,
        category,
        page,
        documentables: ex.docs,
        index_owners: ex.index_owners,
        warnings: ex.warnings,
    }
}

impl Extractor<'_> {
    fn open_root(&mut self, stem: &str, node_count: usize) {
        let category = self.category.clone();
        let kind = match category.as_deref() {
            Some(category) => match self.config.category_kind(category) {
                Some(kind) => kind,
                None => {
                    self.warn(1, stem, format!("no kind configured for category '{}'", category));
                    Kind::Unclassified
                }
            },
            None => {
                self.warn(1, stem, "file has no category".to_string());
                Kind::Unclassified
            }
        };
        self.docs.push(Documentable {
            name: stem.to_string(),
            title: stem.to_string(),
            kind,
            level: 0,
            span: 0..node_count,
            anchor: None,
            parent: None,
            children: Vec::new(),
            aliases: Vec::new(),
        });
    }

    fn visit(&mut self, i: usize, node: &Node) {
        match &node.block {
            Block::Heading { level: 0, content } => {
                let title = plain_text(content);
                if self.titled {
                    self.warn(node.line, &title, "duplicate document title ignored".to_string());
                } else if !title.is_empty() {
                    self.titled = true;
                    let name = self
                        .classifier
                        .classify(&HeadingContext {
                            title: &title,
                            level: 0,
                            parent_title: "",
                            category: self.category.as_deref(),
                        })
                        .map(|c| c.name)
                        .unwrap_or_else(|| title.clone());
                    let root = &mut self.docs[0];
                    root.name = name;
                    root.title = title;
                }
                self.claim_markers(content, 0);
            }
            Block::Heading { level, content } => {
                self.close_to(*level, i);
                let idx = self.open_heading(i, node.line, *level, content);
                self.stack.push(idx);
                self.claim_markers(content, idx);
            }
            Block::List(items) => {
                let definition = match items.as_slice() {
                    [item] => item.definition_marker().map(|(display, keys, _)| {
                        (plain_text(display), keys.to_vec(), item.line)
                    }),
                    _ => None,
                };
                match definition {
                    Some((display, keys, line)) => {
                        let idx = self.open_item(i, line, display, &keys);
                        for item in items {
                            self.claim_markers(&item.content, idx);
                        }
                    }
                    None => {
                        let owner = self.top();
                        for item in items {
                            self.claim_markers(&item.content, owner);
                        }
                    }
                }
            }
            Block::Paragraph(content) => {
                let owner = self.top();
                self.claim_markers(content, owner);
            }
            Block::CodeBlock { .. } => {}
        }
    }

    fn top(&self) -> usize {
        self.stack.last().copied().unwrap_or(0)
    }

    /// Pop every open documentable at `level` or deeper, ending its span at `end`.
    fn close_to(&mut self, level: usize, end: usize) {
        while self.stack.len() > 1 {
            let top = self.top();
            if self.docs[top].level < level {
                break;
            }
            self.docs[top].span.end = end;
            self.stack.pop();
        }
    }

    fn open_heading(&mut self, i: usize, line: usize, level: usize, content: &[Inline]) -> usize {
        let parent = self.top();
        let mut title = plain_text(content);
        if title.is_empty() {
            title = first_index_entry(content, self.config).unwrap_or_default();
        }
        if title.is_empty() {
            self.warn(line, "", "heading has no text".to_string());
            title = "untitled".to_string();
        }

        let classified = self.classifier.classify(&HeadingContext {
            title: &title,
            level,
            parent_title: &self.docs[parent].title,
            category: self.category.as_deref(),
        });
        let (kind, name) = match classified {
            Some(c) => (c.kind, c.name),
            None => {
                self.warn(line, &title, "no classification rule matched".to_string());
                (Kind::Unclassified, title.clone())
            }
        };

        let anchor = Some(self.anchors.claim(&title));
        self.push(Documentable {
            name,
            anchor,
            title,
            kind,
            level,
            span: i..i + 1,
            parent: Some(parent),
            children: Vec::new(),
            aliases: Vec::new(),
        })
    }

    fn open_item(&mut self, i: usize, line: usize, display: String, keys: &[String]) -> usize {
        let parent = self.top();
        let name = if display.is_empty() {
            keys.last().cloned().unwrap_or_default()
        } else {
            display
        };
        let kind = match keys.first().and_then(|k| self.config.index_category_kind(k)) {
            Some(kind) => kind,
            None => {
                let category = keys.first().map(String::as_str).unwrap_or("");
                self.warn(line, &name, format!("unknown index category '{}'", category));
                Kind::Unclassified
            }
        };
        let level = self.docs[parent].level.saturating_add(1);

        let anchor = Some(self.anchors.claim(&name));
        self.push(Documentable {
            anchor,
            title: name.clone(),
            name,
            kind,
            level,
            span: i..i + 1,
            parent: Some(parent),
            children: Vec::new(),
            aliases: Vec::new(),
        })
    }

    fn push(&mut self, doc: Documentable) -> usize {
        let idx = self.docs.len();
        if let Some(parent) = doc.parent {
            self.docs[parent].children.push(idx);
        }
        self.docs.push(doc);
        idx
    }

    /// Record `owner` as the target of every index marker in `content` and
    /// add the marker's entries as search aliases.
    fn claim_markers(&mut self, content: &[Inline], owner: usize) {
        for inline in content {
            match inline {
                Inline::Index { id, display, keys } => {
                    self.index_owners.push((*id, owner));
                    for key in keys {
                        self.add_alias(owner, key);
                    }
                    self.claim_markers(display, owner);
                }
                Inline::Span { content, .. } => self.claim_markers(content, owner),
                Inline::Link { display, .. } => self.claim_markers(display, owner),
                Inline::Text(_) => {}
            }
        }
    }

    fn add_alias(&mut self, owner: usize, key: &str) {
        if self.config.index_category_kind(key).is_some() {
            return;
        }
        let doc = &mut self.docs[owner];
        if key != doc.name && !doc.aliases.iter().any(|a| a == key) {
            doc.aliases.push(key.to_string());
        }
    }

    fn warn(&mut self, line: usize, title: &str, message: String) {
        self.warnings.push(Diagnostic::Extraction {
            path: self.path.clone(),
            line,
            title: title.to_string(),
            message,
        });
    }
}

/// First index entry that is not a category key.
fn first_index_entry(content: &[Inline], config: &Config) -> Option<String> {
    content.iter().find_map(|inline| match inline {
        Inline::Index { keys, .. } => keys
            .iter()
            .find(|k| config.index_category_kind(k).is_none())
            .cloned(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    fn run(path: &str, text: &str) -> ExtractedDocument {
        let config = Config::default();
        let classifier = Classifier::new(&config).unwrap();
        let source = SourceDocument {
            path: path.to_string(),
            text: text.to_string(),
        };
        let parsed = parser::parse(&source.text);
        extract(source, parsed, &config, &classifier)
    }

    const STR_PAGE: &str = r#"=begin pod :kind("Type")

=TITLE class Str

Intro paragraph.

=head1 Methods

=head2 method chars

Counts.

=head2 method split

Splits.

=head3 Notes on split

Deep.

=head1 Operators

=head2 infix ~

Concatenates.

=end pod
"#;

    fn names(doc: &ExtractedDocument) -> Vec<(String, Kind, usize)> {
        doc.documentables
            .iter()
            .map(|d| (d.name.clone(), d.kind, d.level))
            .collect()
    }

    #[test]
    fn type_page_documentables() {
        let doc = run("Type/Str.rakudoc", STR_PAGE);
        assert_eq!(doc.page, "type/Str");
        assert_eq!(doc.category.as_deref(), Some("Type"));
        assert_eq!(
            names(&doc),
            vec![
                ("Str".to_string(), Kind::Class, 0),
                ("Methods".to_string(), Kind::Section, 1),
                ("chars".to_string(), Kind::Routine, 2),
                ("split".to_string(), Kind::Routine, 2),
                ("Notes on split".to_string(), Kind::Unclassified, 3),
                ("Operators".to_string(), Kind::Section, 1),
                ("~".to_string(), Kind::Operator, 2),
            ]
        );
        assert_eq!(doc.root().title, "class Str");
        assert_eq!(doc.documentables[2].anchor.as_deref(), Some("method-chars"));
        // "Notes on split" is the only unclassified heading
        assert_eq!(doc.warnings.len(), 1);
    }

    #[test]
    fn heading_closes_same_or_deeper_levels() {
        let doc = run("Type/Str.rakudoc", STR_PAGE);
        let d = &doc.documentables;
        let n = doc.parsed.nodes.len();
        assert_eq!(d[0].span, 0..n);
        // Methods closes at Operators
        assert_eq!(d[1].span.end, d[5].span.start);
        // method chars closes at method split
        assert_eq!(d[2].span.end, d[3].span.start);
        // Notes on split closes with its parent at Operators
        assert_eq!(d[4].span.end, d[5].span.start);
        assert_eq!(d[3].span.end, d[5].span.start);
        assert_eq!(d[6].span.end, n);
        assert_eq!(d[3].children, vec![4]);
        assert_eq!(d[4].parent, Some(3));
    }

    /// Every node is owned by exactly one innermost documentable, children
    /// nest inside their parent and siblings do not overlap.
    #[test]
    fn spans_partition_the_document() {
        let doc = run("Type/Str.rakudoc", STR_PAGE);
        let d = &doc.documentables;
        for (idx, doc_) in d.iter().enumerate() {
            let mut last_end = doc_.span.start;
            for &child in &doc_.children {
                let c = &d[child];
                assert!(c.span.start >= last_end, "sibling overlap in {}", idx);
                assert!(c.span.end <= doc_.span.end);
                assert!(c.span.start < c.span.end);
                last_end = c.span.end;
            }
        }
        for node in 0..doc.parsed.nodes.len() {
            let owners = d
                .iter()
                .filter(|x| x.span.contains(&node))
                .filter(|x| x.children.iter().all(|&c| !d[c].span.contains(&node)))
                .count();
            assert_eq!(owners, 1, "node {} owned {} times", node, owners);
        }
    }

    #[test]
    fn definition_items_nest_under_heading() {
        let text = r#"=begin pod :kind("Language")

=TITLE Pragmas

=head1 Version pragmas

=item X<v6.d|Pragmas,v6.d> Enables 6.d semantics.
=item X<v6.e|Pragmas,v6.e> Enables 6.e semantics.

=head1 Other

=end pod
"#;
        let doc = run("Language/pragmas.rakudoc", text);
        assert_eq!(
            names(&doc),
            vec![
                ("Pragmas".to_string(), Kind::Language, 0),
                ("Version pragmas".to_string(), Kind::Section, 1),
                ("v6.d".to_string(), Kind::Pragma, 2),
                ("v6.e".to_string(), Kind::Pragma, 2),
                ("Other".to_string(), Kind::Section, 1),
            ]
        );
        let item = &doc.documentables[2];
        assert_eq!(item.span.end - item.span.start, 1);
        assert_eq!(item.parent, Some(1));
        assert_eq!(doc.index_owners.len(), 2);
        assert_eq!(doc.index_owners[0].1, 2);
        assert!(doc.warnings.is_empty(), "{:?}", doc.warnings);
    }

    #[test]
    fn definition_item_with_unknown_category_is_unclassified() {
        let text = "=begin pod :kind(\"Language\")\n\n=head1 Widgets\n\n=item X<frob|Gadgets,frob> Frobs things.\n";
        let doc = run("Language/widgets.rakudoc", text);
        let item = &doc.documentables[2];
        assert_eq!(item.name, "frob");
        assert_eq!(item.kind, Kind::Unclassified);
        assert_eq!(item.parent, Some(1));
        assert_eq!(doc.warnings.len(), 1);
        match &doc.warnings[0] {
            Diagnostic::Extraction { title, message, .. } => {
                assert_eq!(title, "frob");
                assert_eq!(message, "unknown index category 'Gadgets'");
            }
            other => panic!("expected extraction warning, got {:?}", other),
        }
    }

    #[test]
    fn index_markers_become_aliases_of_enclosing_documentable() {
        let text = "=begin pod :kind(\"Language\")\n\n=head2 Containers\n\nA X<scalar container|Reference,scalar container> holds one value.\n";
        let doc = run("Language/containers.rakudoc", text);
        let containers = &doc.documentables[1];
        assert_eq!(containers.aliases, vec!["scalar container"]);
        assert_eq!(doc.index_owners, vec![(RefId(0), 1)]);
    }

    #[test]
    fn heading_with_only_a_marker_takes_its_entry() {
        let text = "=begin pod :kind(\"Language\")\n\n=head2 X<|Syntax,does>\n";
        let doc = run("Language/objects.rakudoc", text);
        assert_eq!(doc.documentables[1].name, "does");
    }

    #[test]
    fn duplicate_title_is_warned() {
        let doc = run("Language/x.rakudoc", "=TITLE One\n\n=TITLE Two\n");
        assert_eq!(doc.root().title, "One");
        assert_eq!(doc.warnings.len(), 1);
    }

    #[test]
    fn file_without_title_uses_stem_and_warns_without_category() {
        let doc = run("loose.rakudoc", "Just text.\n");
        assert_eq!(doc.root().name, "loose");
        assert_eq!(doc.root().kind, Kind::Unclassified);
        assert_eq!(doc.page, "loose");
        assert_eq!(doc.warnings.len(), 1);
    }

    #[test]
    fn page_paths() {
        assert_eq!(page_path("Type/IO/Path.rakudoc"), "type/IO/Path");
        assert_eq!(page_path("intro.pod6"), "intro");
        assert_eq!(page_path("v1.0/readme"), "v1.0/readme");
    }
}
