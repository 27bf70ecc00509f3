//! HTML renderer: standalone HTML page with semantic markup.

use crate::model::*;
use crate::render::{
    indent_depth, link_view, relative_href, title_content, LinkView, Page, Renderer, SiteIndex,
};

pub struct HtmlRenderer;

const EXT: &str = "html";

const STYLE: &str = "\
body { font-family: system-ui, sans-serif; max-width: 52em; margin: 2em auto; padding: 0 1em; }
code { background: #f4f4f4; padding: 0.15em 0.3em; border-radius: 3px; }
pre { background: #f4f4f4; padding: 1em; border-radius: 5px; overflow-x: auto; }
pre code { background: none; padding: 0; }
nav.site { font-size: 0.9em; margin-bottom: 1em; }
nav.toc ul { list-style: none; padding-left: 1em; }
ul.definitions { list-style: none; padding-left: 0; }
ul.definitions > li { margin-top: 0.5em; }
.broken-link { color: #b00020; text-decoration: underline wavy; }
a.ambiguous { text-decoration-style: dotted; }
.kind { display: inline-block; font-size: 0.75em; padding: 0.1em 0.4em; border-radius: 3px; background: #e8e8e8; margin-left: 0.5em; }
";

fn head(out: &mut String, title: &str) {
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    out.push_str("<meta charset=\"utf-8\">\n");
    out.push_str(&format!("<title>{}</title>\n", html_escape(title)));
    out.push_str("<style>\n");
    out.push_str(STYLE);
    out.push_str("</style>\n");
    out.push_str("</head>\n<body>\n");
}

impl Renderer for HtmlRenderer {
    fn render(&self, page: &Page<'_>) -> String {
        let doc = page.doc;
        let root = doc.root();
        let mut out = String::new();

        head(&mut out, &format!("{} | {}", root.title, page.site_title));
        out.push_str(&format!(
            "<nav class=\"site\"><a href=\"{}\">{}</a></nav>\n<main>\n",
            html_escape(&relative_href(&doc.page, "index", EXT, None)),
            html_escape(page.site_title)
        ));

        out.push_str(&format!("<h1{}>", data_attrs(root)));
        match title_content(doc) {
            Some(content) => inline_html(page, content, &mut out),
            None => out.push_str(&html_escape(&root.title)),
        }
        out.push_str("</h1>\n");

        // Index
        if doc.documentables.len() > 1 {
            out.push_str("<nav class=\"toc\">\n<h2>Index</h2>\n<ul>\n");
            for d in doc.documentables.iter().skip(1) {
                if let Some(ref anchor) = d.anchor {
                    out.push_str(&format!(
                        "  <li style=\"margin-left: {}em\"><a href=\"#{}\">{}</a></li>\n",
                        indent_depth(d.level),
                        html_escape(anchor),
                        html_escape(&d.title)
                    ));
                }
            }
            out.push_str("</ul>\n</nav>\n");
        }

        for (i, node) in doc.parsed.nodes.iter().enumerate() {
            match &node.block {
                Block::Heading { level: 0, .. } => {}
                Block::Heading { level, content } => {
                    let tag = format!("h{}", level.saturating_add(1).min(6));
                    let attrs = doc.defined_at(i).map(anchor_attrs).unwrap_or_default();
                    out.push_str(&format!("<{}{}>", tag, attrs));
                    inline_html(page, content, &mut out);
                    out.push_str(&format!("</{}>\n", tag));
                }
                Block::Paragraph(content) => {
                    out.push_str("<p>");
                    inline_html(page, content, &mut out);
                    out.push_str("</p>\n");
                }
                Block::CodeBlock {
                    lang,
                    skip_test,
                    text,
                } => {
                    let class = lang
                        .as_ref()
                        .map(|l| format!(" class=\"language-{}\"", html_escape(l)))
                        .unwrap_or_default();
                    let skip = if *skip_test { " data-skip-test" } else { "" };
                    out.push_str(&format!(
                        "<pre><code{}{}>{}</code></pre>\n",
                        class,
                        skip,
                        html_escape(text)
                    ));
                }
                Block::List(items) => match doc.defined_at(i) {
                    Some(d) => {
                        out.push_str("<ul class=\"definitions\">\n");
                        for item in items {
                            out.push_str(&format!("  <li{}>", anchor_attrs(d)));
                            inline_html(page, &item.content, &mut out);
                            out.push_str("</li>\n");
                        }
                        out.push_str("</ul>\n");
                    }
                    None => {
                        out.push_str("<ul>\n");
                        for item in items {
                            let depth = indent_depth(item.level);
                            if depth > 0 {
                                out.push_str(&format!(
                                    "  <li style=\"margin-left: {}em\">",
                                    depth * 2
                                ));
                            } else {
                                out.push_str("  <li>");
                            }
                            inline_html(page, &item.content, &mut out);
                            out.push_str("</li>\n");
                        }
                        out.push_str("</ul>\n");
                    }
                },
            }
        }

        out.push_str("</main>\n</body>\n</html>\n");
        out
    }

    fn render_index(&self, index: &SiteIndex<'_>) -> String {
        let mut out = String::new();
        head(&mut out, index.title);
        out.push_str(&format!("<h1>{}</h1>\n", html_escape(index.title)));

        let mut current: Option<&str> = None;
        for summary in index.pages {
            if current != Some(summary.category.as_str()) {
                if current.is_some() {
                    out.push_str("</ul>\n");
                }
                out.push_str(&format!("<h2>{}</h2>\n<ul>\n", html_escape(&summary.category)));
                current = Some(&summary.category);
            }
            out.push_str(&format!(
                "  <li><a href=\"{}\">{}</a><span class=\"kind\">{}</span></li>\n",
                html_escape(&relative_href("index", &summary.page, EXT, None)),
                html_escape(&summary.title),
                html_escape(summary.label())
            ));
        }
        if current.is_some() {
            out.push_str("</ul>\n");
        }

        out.push_str("</body>\n</html>\n");
        out
    }

    fn file_extension(&self) -> &str {
        EXT
    }
}

fn data_attrs(d: &Documentable) -> String {
    format!(
        " data-name=\"{}\" data-kind=\"{}\"",
        html_escape(&d.name),
        d.kind
    )
}

fn anchor_attrs(d: &Documentable) -> String {
    let id = d
        .anchor
        .as_ref()
        .map(|a| format!(" id=\"{}\"", html_escape(a)))
        .unwrap_or_default();
    format!("{}{}", id, data_attrs(d))
}

fn inline_html(page: &Page<'_>, content: &[Inline], out: &mut String) {
    for inline in content {
        match inline {
            Inline::Text(t) => out.push_str(&html_escape(t)),
            Inline::Span { style, content } => {
                let tag = match style {
                    Style::Bold => "strong",
                    Style::Italic => "em",
                    Style::Code => "code",
                };
                out.push_str(&format!("<{}>", tag));
                inline_html(page, content, out);
                out.push_str(&format!("</{}>", tag));
            }
            Inline::Link { id, display, .. } => match link_view(page, *id, EXT) {
                LinkView::Href(href) => {
                    out.push_str(&format!("<a href=\"{}\">", html_escape(&href)));
                    inline_html(page, display, out);
                    out.push_str("</a>");
                }
                LinkView::Ambiguous { href, candidates } => {
                    out.push_str(&format!(
                        "<a class=\"ambiguous\" href=\"{}\" title=\"Ambiguous: {}\">",
                        html_escape(&href),
                        html_escape(&candidates.join(", "))
                    ));
                    inline_html(page, display, out);
                    out.push_str("</a>");
                }
                LinkView::Broken => {
                    out.push_str("<span class=\"broken-link\">");
                    inline_html(page, display, out);
                    out.push_str("</span>");
                }
            },
            Inline::Index { display, keys, .. } => {
                out.push_str(&format!(
                    "<span class=\"indexed\" data-index=\"{}\">",
                    html_escape(&keys.join("; "))
                ));
                inline_html(page, display, out);
                out.push_str("</span>");
            }
        }
    }
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classifier;
    use crate::config::Config;
    use crate::extract::extract;
    use crate::parser;
    use crate::registry::{self, RegistryBuilder};
    use crate::resolve;

    fn render(files: &[(&str, &str)], which: usize) -> String {
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
            builder.extend(registry::contribution(doc));
        }
        let registry = builder.freeze();
        let (resolutions, _) = resolve::resolve(&docs[which], &registry, &config);
        HtmlRenderer.render(&Page {
            doc: &docs[which],
            resolutions: &resolutions,
            registry: &registry,
            site_title: "Docs",
        })
    }

    fn strip_tags(html: &str) -> String {
        let mut out = String::new();
        let mut in_tag = false;
        for c in html.chars() {
            match c {
                '<' => in_tag = true,
                '>' => in_tag = false,
                c if !in_tag => out.push(c),
                _ => {}
            }
        }
        out.replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&amp;", "&")
    }

    fn element<'a>(html: &'a str, open: &str, close: &str) -> &'a str {
        let start = html.find(open).expect("element present");
        let rest = &html[start..];
        let end = rest.find(close).expect("element closed");
        &rest[..end]
    }

    const STR: &str = "=begin pod :kind(\"Type\")\n\n=TITLE class Str\n\n=head1 Methods\n\n=head2 method B<split> & C<< a<b >>\n\nSplits L<Int> and L<nothing>.\n\n    my $s = \"<tag>\";\n";

    #[test]
    fn heading_text_round_trips() {
        let html = render(&[("Type/Str.rakudoc", STR)], 0);
        let heading = element(&html, "<h3 id=\"method-split-ab\"", "</h3>");
        let text = strip_tags(heading);
        assert_eq!(text.split_whitespace().collect::<Vec<_>>().join(" "), "method split & a<b");
        assert!(heading.contains("data-name=\"split &amp; a&lt;b\" data-kind=\"routine\""));
    }

    #[test]
    fn title_and_code_are_escaped() {
        let html = render(&[("Type/Str.rakudoc", STR)], 0);
        assert!(html.contains("<h1 data-name=\"Str\" data-kind=\"class\">class Str</h1>"));
        assert!(html.contains("my $s = &quot;&lt;tag&gt;&quot;;"));
        assert!(!html.contains("<tag>"));
    }

    #[test]
    fn broken_link_is_marked() {
        let html = render(&[("Type/Str.rakudoc", STR)], 0);
        assert!(html.contains("<span class=\"broken-link\">nothing</span>"));
        assert!(html.contains("<span class=\"broken-link\">Int</span>"));
    }

    #[test]
    fn resolved_link_is_relative() {
        let int = "=begin pod :kind(\"Type\")\n\n=TITLE class Int\n";
        let html = render(&[("Type/Str.rakudoc", STR), ("Type/Int.rakudoc", int)], 0);
        assert!(html.contains("<a href=\"../type/Int.html\">Int</a>"));
        assert!(html.contains("<a href=\"../index.html\">Docs</a>"));
    }

    #[test]
    fn ambiguous_link_lists_candidates() {
        let a = "=begin pod :kind(\"Type\")\n\n=TITLE class A\n\n=head1 Methods\n\n=head2 method Widget\n";
        let b = "=begin pod :kind(\"Type\")\n\n=TITLE class B\n\n=head1 Methods\n\n=head2 method Widget\n";
        let c = "=begin pod :kind(\"Language\")\n\nUse L<Widget>.\n";
        let files = [("Type/A.rakudoc", a), ("Type/B.rakudoc", b), ("Language/c.rakudoc", c)];
        let html = render(&files, 2);
        assert!(html.contains(
            "<a class=\"ambiguous\" href=\"../type/A.html#method-widget\" title=\"Ambiguous: type/A#method-widget (routine), type/B#method-widget (routine)\">Widget</a>"
        ));
    }

    #[test]
    fn deep_item_level_renders() {
        let text = "=begin pod :kind(\"Language\")\n\n=item1 top\n=item2 nested\n=item200 deep\n";
        let html = render(&[("Language/lists.rakudoc", text)], 0);
        assert!(html.contains("  <li>top</li>\n"));
        assert!(html.contains("<li style=\"margin-left: 2em\">nested</li>"));
        assert!(html.contains("<li style=\"margin-left: 16em\">deep</li>"));
    }

    #[test]
    fn definition_items_carry_anchor() {
        let text = "=begin pod :kind(\"Language\")\n\n=head1 Pragmas\n\n=item X<v6.d|Pragmas,v6.d> Enables 6.d.\n";
        let html = render(&[("Language/pragmas.rakudoc", text)], 0);
        assert!(html.contains("<ul class=\"definitions\">"));
        assert!(html.contains("<li id=\"v6d\" data-name=\"v6.d\" data-kind=\"pragma\">"));
    }
}
