//! GitHub-flavored markdown renderer.
//!
//! Anchors are emitted as explicit `<a id>` tags so they match the HTML
//! output and the search index regardless of the host's heading slugs.

use crate::model::*;
use crate::render::{
    indent_depth, link_view, relative_href, title_content, LinkView, Page, Renderer, SiteIndex,
};

pub struct MarkdownRenderer;

const EXT: &str = "md";

impl Renderer for MarkdownRenderer {
    fn render(&self, page: &Page<'_>) -> String {
        let doc = page.doc;
        let root = doc.root();
        let mut output = String::new();

        match title_content(doc) {
            Some(content) => output.push_str(&format!("# {}\n\n", inline_md(page, content))),
            None => output.push_str(&format!("# {}\n\n", escape(&root.title))),
        }

        // Index
        let listed: Vec<&Documentable> = doc
            .documentables
            .iter()
            .skip(1)
            .filter(|d| d.anchor.is_some())
            .collect();
        if !listed.is_empty() {
            output.push_str("## Index\n\n");
            for d in listed {
                output.push_str(&format!(
                    "{}* [{}](#{})\n",
                    "  ".repeat(indent_depth(d.level)),
                    escape(&d.title),
                    d.anchor.as_deref().unwrap_or_default()
                ));
            }
            output.push('\n');
        }

        for (i, node) in doc.parsed.nodes.iter().enumerate() {
            match &node.block {
                Block::Heading { level: 0, .. } => {}
                Block::Heading { level, content } => {
                    if let Some(anchor) = doc.defined_at(i).and_then(|d| d.anchor.as_ref()) {
                        output.push_str(&format!("<a id=\"{}\"></a>\n\n", anchor));
                    }
                    let hashes = "#".repeat(level.saturating_add(1).min(6));
                    output.push_str(&format!("{} {}\n\n", hashes, inline_md(page, content)));
                }
                Block::Paragraph(content) => {
                    output.push_str(&inline_md(page, content));
                    output.push_str("\n\n");
                }
                Block::CodeBlock { lang, text, .. } => {
                    let fence = fence_for(text);
                    output.push_str(&format!(
                        "{}{}\n{}\n{}\n\n",
                        fence,
                        lang.as_deref().unwrap_or(""),
                        text.trim_end_matches('\n'),
                        fence
                    ));
                }
                Block::List(items) => {
                    if let Some(anchor) = doc.defined_at(i).and_then(|d| d.anchor.as_ref()) {
                        output.push_str(&format!("<a id=\"{}\"></a>\n\n", anchor));
                    }
                    for item in items {
                        output.push_str(&format!(
                            "{}* {}\n",
                            "  ".repeat(indent_depth(item.level)),
                            inline_md(page, &item.content)
                        ));
                    }
                    output.push('\n');
                }
            }
        }

        output
    }

    fn render_index(&self, index: &SiteIndex<'_>) -> String {
        let mut output = format!("# {}\n", escape(index.title));
        let mut current: Option<&str> = None;
        for summary in index.pages {
            if current != Some(summary.category.as_str()) {
                output.push_str(&format!("\n## {}\n\n", escape(&summary.category)));
                current = Some(&summary.category);
            }
            output.push_str(&format!(
                "* [{}]({}) ({})\n",
                escape(&summary.title),
                relative_href("index", &summary.page, EXT, None),
                summary.label()
            ));
        }
        output
    }

    fn file_extension(&self) -> &str {
        EXT
    }
}

fn inline_md(page: &Page<'_>, content: &[Inline]) -> String {
    let mut out = String::new();
    for inline in content {
        match inline {
            Inline::Text(t) => out.push_str(&escape(&t.replace('\n', " "))),
            Inline::Span {
                style: Style::Code,
                content,
            } => {
                let mut code = String::new();
                code_md(page, content, &mut code, &mut out);
                flush_code(&mut code, &mut out);
            }
            Inline::Span { style, content } => {
                let mark = if *style == Style::Bold { "**" } else { "*" };
                out.push_str(mark);
                out.push_str(&inline_md(page, content));
                out.push_str(mark);
            }
            Inline::Link { id, display, .. } => {
                out.push_str(&link_md(page, *id, inline_md(page, display)));
            }
            Inline::Index { display, .. } => out.push_str(&inline_md(page, display)),
        }
    }
    out
}

fn link_md(page: &Page<'_>, id: RefId, text: String) -> String {
    match link_view(page, id, EXT) {
        LinkView::Href(href) => format!("[{}]({})", text, href),
        LinkView::Ambiguous { href, candidates } => format!(
            "[{}]({} \"Ambiguous: {}\")",
            text,
            href,
            candidates.join(", ").replace('"', "'")
        ),
        LinkView::Broken => text,
    }
}

/// Code span content. Markdown has no links inside code spans, so a nested
/// link splits the span and wraps its own code span.
fn code_md(page: &Page<'_>, content: &[Inline], code: &mut String, out: &mut String) {
    for inline in content {
        match inline {
            Inline::Text(t) => code.push_str(t),
            Inline::Span { content, .. } | Inline::Index { display: content, .. } => {
                code_md(page, content, code, out)
            }
            Inline::Link { id, display, .. } => {
                flush_code(code, out);
                let text = code_span(&plain_text(display));
                out.push_str(&link_md(page, *id, text));
            }
        }
    }
}

fn flush_code(code: &mut String, out: &mut String) {
    let text = code.split_whitespace().collect::<Vec<_>>().join(" ");
    if !text.is_empty() {
        out.push_str(&code_span(&text));
    }
    code.clear();
}

/// Backslash-escape markdown metacharacters in literal text.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '*' | '_' | '[' | ']' | '<' | '>' | '`' | '#' | '|') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Wrap `text` in enough backticks that none inside close it early.
fn code_span(text: &str) -> String {
    let longest = longest_run(text, '`');
    let ticks = "`".repeat(longest + 1);
    if longest > 0 || text.starts_with(' ') || text.ends_with(' ') {
        format!("{} {} {}", ticks, text, ticks)
    } else {
        format!("{}{}{}", ticks, text, ticks)
    }
}

fn fence_for(text: &str) -> String {
    "`".repeat(longest_run(text, '`').max(2) + 1)
}

fn longest_run(text: &str, c: char) -> usize {
    let mut longest = 0;
    let mut run = 0;
    for ch in text.chars() {
        if ch == c {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    longest
}
