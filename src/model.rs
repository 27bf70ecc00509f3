//! Format-agnostic data model for parsed documentation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// One input file, immutable once loaded.
#[derive(Debug)]
pub struct SourceDocument {
    /// Path relative to the source root, `/`-separated.
    pub path: String,
    pub text: String,
}

/// Parser output for a single document.
#[derive(Debug, Default)]
pub struct ParsedDocument {
    pub meta: FileMeta,
    pub nodes: Vec<Node>,
    pub errors: Vec<crate::diagnostics::ParseError>,
    /// Number of Link/IndexMarker reference ids handed out.
    pub ref_count: usize,
}

/// File-level metadata from the first `=begin pod` line.
#[derive(Debug, Default, Clone)]
pub struct FileMeta {
    /// `:kind(...)`: the file category, e.g. "Type" or "Language".
    pub kind: Option<String>,
    /// `:subkind(...)`, e.g. "class" or "role".
    pub subkind: Option<String>,
}

/// A block-level markup element with its starting line (1-based).
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub line: usize,
    pub block: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Level 0 is the document title.
    Heading { level: usize, content: Vec<Inline> },
    Paragraph(Vec<Inline>),
    CodeBlock {
        lang: Option<String>,
        /// "do not execute this example during testing"
        skip_test: bool,
        text: String,
    },
    List(Vec<ListItem>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    pub level: usize,
    pub line: usize,
    pub content: Vec<Inline>,
}

impl ListItem {
    /// The leading index marker of a definition item (`=item X<...>`).
    pub fn definition_marker(&self) -> Option<(&[Inline], &[String], RefId)> {
        self.content
            .iter()
            .find(|inline| !matches!(inline, Inline::Text(t) if t.trim().is_empty()))
            .and_then(|inline| match inline {
                Inline::Index { id, display, keys } => {
                    Some((display.as_slice(), keys.as_slice(), *id))
                }
                _ => None,
            })
    }
}

/// Per-document id of a Link or IndexMarker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Bold,
    Italic,
    Code,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Text(String),
    Span { style: Style, content: Vec<Inline> },
    Link { id: RefId, display: Vec<Inline>, target: String },
    Index { id: RefId, display: Vec<Inline>, keys: Vec<String> },
}

/// Formatting-stripped text of an inline sequence, whitespace collapsed.
pub fn plain_text(content: &[Inline]) -> String {
    let mut raw = String::new();
    collect_plain(content, &mut raw);
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_plain(content: &[Inline], out: &mut String) {
    for inline in content {
        match inline {
            Inline::Text(t) => out.push_str(t),
            Inline::Span { content, .. } => collect_plain(content, out),
            Inline::Link { display, .. } | Inline::Index { display, .. } => {
                collect_plain(display, out)
            }
        }
    }
}

/// Closed set of documentable kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Class,
    Routine,
    Operator,
    Pragma,
    Syntax,
    Language,
    Program,
    Section,
    Unclassified,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Class => "class",
            Kind::Routine => "routine",
            Kind::Operator => "operator",
            Kind::Pragma => "pragma",
            Kind::Syntax => "syntax",
            Kind::Language => "language",
            Kind::Program => "program",
            Kind::Section => "section",
            Kind::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, addressable unit of documentation.
#[derive(Debug, Clone)]
pub struct Documentable {
    /// Lookup name (declarator keyword stripped where a rule says so).
    pub name: String,
    /// Plain text of the defining heading or marker.
    pub title: String,
    pub kind: Kind,
    /// Heading level; definition items sit one below their parent.
    pub level: usize,
    /// Node index range covered by this documentable.
    pub span: Range<usize>,
    /// Page-unique anchor; `None` for the document root.
    pub anchor: Option<String>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Alternate searchable text from index markers.
    pub aliases: Vec<String>,
}

/// Everything phase 1 produces for one document.
#[derive(Debug)]
pub struct ExtractedDocument {
    pub source: SourceDocument,
    pub parsed: ParsedDocument,
    /// Category used for the page path and kind tables.
    pub category: Option<String>,
    /// Output page path without extension, e.g. `type/Str`.
    pub page: String,
    /// Index 0 is always the document root.
    pub documentables: Vec<Documentable>,
    /// Enclosing documentable of each index marker.
    pub index_owners: Vec<(RefId, usize)>,
    pub warnings: Vec<crate::diagnostics::Diagnostic>,
}

impl ExtractedDocument {
    pub fn root(&self) -> &Documentable {
        &self.documentables[0]
    }

    /// Documentable whose defining node is `node`, if any.
    pub fn defined_at(&self, node: usize) -> Option<&Documentable> {
        self.documentables
            .iter()
            .skip(1)
            .find(|d| d.span.start == node)
    }
}
