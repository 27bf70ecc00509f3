//! Renderer module: trait-based format dispatch.

pub mod html;
pub mod markdown;

use crate::model::{plain_text, Block, ExtractedDocument, Inline, Kind, RefId};
use crate::registry::Registry;
use crate::resolve::{Resolution, Resolutions};
use anyhow::{anyhow, Result};

/// Everything a renderer needs for one page.
pub struct Page<'a> {
    pub doc: &'a ExtractedDocument,
    pub resolutions: &'a Resolutions,
    pub registry: &'a Registry,
    pub site_title: &'a str,
}

/// One row of the site index.
#[derive(Debug, Clone)]
pub struct PageSummary {
    pub page: String,
    pub title: String,
    pub kind: Kind,
    /// `:subkind` metadata, shown instead of the kind when present.
    pub subkind: Option<String>,
    pub category: String,
}

impl PageSummary {
    pub fn label(&self) -> &str {
        self.subkind.as_deref().unwrap_or(self.kind.as_str())
    }
}

pub struct SiteIndex<'a> {
    pub title: &'a str,
    /// Sorted by category, then page.
    pub pages: &'a [PageSummary],
}

/// Trait for rendering documents into a specific output format.
pub trait Renderer: Send + Sync {
    fn render(&self, page: &Page<'_>) -> String;
    fn render_index(&self, index: &SiteIndex<'_>) -> String;
    fn file_extension(&self) -> &str;
}

/// Create a renderer for the given format name.
pub fn create_renderer(format: &str) -> Result<Box<dyn Renderer>> {
    match format {
        "html" => Ok(Box::new(html::HtmlRenderer)),
        "markdown" | "md" => Ok(Box::new(markdown::MarkdownRenderer)),
        _ => Err(anyhow!("unknown format: {}. Use html or markdown", format)),
    }
}

/// Content of the first non-empty document title, if any. Later titles are
/// ignored, matching extraction.
pub fn title_content(doc: &ExtractedDocument) -> Option<&[Inline]> {
    doc.parsed.nodes.iter().find_map(|n| match &n.block {
        Block::Heading { level: 0, content } if !plain_text(content).is_empty() => {
            Some(content.as_slice())
        }
        _ => None,
    })
}

/// Deepest visual indent for nested items and index entries.
const MAX_INDENT: usize = 8;

/// Visual indent of a level-`level` item; level 1 sits flush.
pub fn indent_depth(level: usize) -> usize {
    level.saturating_sub(1).min(MAX_INDENT)
}

/// How a link should be drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkView {
    Href(String),
    Ambiguous { href: String, candidates: Vec<String> },
    Broken,
}

/// Href from page `from` to `to` (both extension-less, `/`-separated).
pub fn relative_href(from: &str, to: &str, ext: &str, anchor: Option<&str>) -> String {
    let fragment = anchor.map(|a| format!("#{}", a)).unwrap_or_default();
    if from == to && !fragment.is_empty() {
        return fragment;
    }
    let depth = from.matches('/').count();
    format!("{}{}.{}{}", "../".repeat(depth), to, ext, fragment)
}

/// Resolve a reference id of `page` into something drawable.
pub fn link_view(page: &Page<'_>, id: RefId, ext: &str) -> LinkView {
    let from = page.doc.page.as_str();
    match page.resolutions.get(id) {
        Some(Resolution::Target { entry, anchor }) => {
            let entry = page.registry.get(*entry);
            LinkView::Href(relative_href(from, &entry.page, ext, anchor.as_deref()))
        }
        Some(Resolution::Ambiguous {
            chosen,
            anchor,
            candidates,
        }) => {
            let entry = page.registry.get(*chosen);
            LinkView::Ambiguous {
                href: relative_href(from, &entry.page, ext, anchor.as_deref()),
                candidates: candidates
                    .iter()
                    .map(|&c| page.registry.get(c).describe())
                    .collect(),
            }
        }
        Some(Resolution::Local { anchor }) => {
            LinkView::Href(relative_href(from, from, ext, anchor.as_deref()))
        }
        Some(Resolution::External(url)) => LinkView::Href(url.clone()),
        Some(Resolution::Broken) | None => LinkView::Broken,
    }
}
