//! Block-level Pod parser: line-by-line state machine.

use super::inline::{self, InlineContext};
use super::parse_attributes;
use crate::diagnostics::ParseError;
use crate::model::*;
use regex::Regex;
use std::sync::LazyLock;

// -- Regex patterns -----------------------------------------------------------

static RE_DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^=([A-Za-z][\w-]*)(?:[ \t]+(.*?))?[ \t]*$").unwrap());

static RE_NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(head|item)([0-9]+)$").unwrap());

static RE_BLANK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[[:space:]]*$").unwrap());

// -- Parser state -------------------------------------------------------------

#[derive(Debug)]
enum TextKind {
    Paragraph,
    Heading(usize),
    Item(usize),
}

#[derive(Debug)]
enum Mode {
    Normal,
    /// Abbreviated block: runs until a blank line or the next directive.
    Text {
        kind: TextKind,
        line: usize,
        buf: String,
    },
    /// Delimited (`end: Some`) or abbreviated verbatim block.
    Verbatim {
        name: String,
        line: usize,
        lang: Option<String>,
        skip_test: bool,
        keep: bool,
        end: Option<Regex>,
        lines: Vec<String>,
    },
    /// Implicit code block from indented lines.
    Indented { line: usize, lines: Vec<String> },
}

struct BlockParser {
    meta: FileMeta,
    seen_pod: bool,
    nodes: Vec<Node>,
    errors: Vec<ParseError>,
    inline: InlineContext,
    mode: Mode,
    /// Open `=begin` blocks that have no dedicated handling.
    open: Vec<(String, usize)>,
}

// -- Public API ---------------------------------------------------------------

/// Parse a whole document.
pub fn parse(input: &str) -> ParsedDocument {
    let mut p = BlockParser {
        meta: FileMeta::default(),
        seen_pod: false,
        nodes: Vec::new(),
        errors: Vec::new(),
        inline: InlineContext::default(),
        mode: Mode::Normal,
        open: Vec::new(),
    };

    for (i, line) in input.lines().enumerate() {
        p.process_line(i + 1, line);
    }
    p.finish();

    let mut errors = p.errors;
    errors.extend(p.inline.errors);
    errors.sort_by_key(|e| e.line);

    ParsedDocument {
        meta: p.meta,
        nodes: p.nodes,
        errors,
        ref_count: p.inline.next_ref,
    }
}

// -- Line processing ----------------------------------------------------------

impl BlockParser {
    fn process_line(&mut self, line_no: usize, line: &str) {
        // 1. Inside a verbatim block
        if let Mode::Verbatim { end, lines, .. } = &mut self.mode {
            match end {
                Some(re) => {
                    if re.is_match(line) {
                        self.finish_mode();
                    } else {
                        lines.push(line.to_string());
                    }
                    return;
                }
                None => {
                    if RE_BLANK.is_match(line) {
                        self.finish_mode();
                        return;
                    }
                    if !line.starts_with('=') {
                        lines.push(line.to_string());
                        return;
                    }
                    self.finish_mode();
                    // Fall through to the directive
                }
            }
        }

        // 2. Inside an implicit code block
        if let Mode::Indented { lines, .. } = &mut self.mode {
            if RE_BLANK.is_match(line) {
                lines.push(String::new());
                return;
            }
            if line.starts_with([' ', '\t']) {
                lines.push(line.to_string());
                return;
            }
            self.finish_mode();
        }

        // 3. Directives
        if let Some(caps) = RE_DIRECTIVE.captures(line) {
            self.finish_mode();
            let name = caps[1].to_string();
            let rest = caps.get(2).map(|m| m.as_str()).unwrap_or("").to_string();
            self.directive(line_no, &name, &rest);
            return;
        }

        // 4. Blank line ends abbreviated blocks
        if RE_BLANK.is_match(line) {
            self.finish_mode();
            return;
        }

        // 5. Text or indented code
        match &mut self.mode {
            Mode::Text { buf, .. } => {
                if !buf.is_empty() {
                    buf.push('\n');
                }
                buf.push_str(line);
            }
            _ => {
                if line.starts_with([' ', '\t']) {
                    self.mode = Mode::Indented {
                        line: line_no,
                        lines: vec![line.to_string()],
                    };
                } else {
                    self.mode = Mode::Text {
                        kind: TextKind::Paragraph,
                        line: line_no,
                        buf: line.to_string(),
                    };
                }
            }
        }
    }

    fn directive(&mut self, line_no: usize, name: &str, rest: &str) {
        match name {
            "begin" => self.begin_block(line_no, rest),
            "end" => self.end_block(line_no, rest),
            "for" => {
                let (block, attrs) = split_block_name(rest);
                match block {
                    "code" | "input" | "output" | "table" | "comment" => {
                        self.start_verbatim(line_no, block, attrs, false);
                    }
                    "pod" => {}
                    other => {
                        self.errors.push(ParseError::new(
                            line_no,
                            format!("unknown block '=for {}'", other),
                        ));
                        self.start_text(TextKind::Paragraph, line_no, "");
                    }
                }
            }
            "TITLE" | "title" => self.start_text(TextKind::Heading(0), line_no, rest),
            "SUBTITLE" | "subtitle" | "para" => self.start_text(TextKind::Paragraph, line_no, rest),
            "head" => self.start_text(TextKind::Heading(1), line_no, rest),
            "item" => self.start_text(TextKind::Item(1), line_no, rest),
            "comment" => {
                self.mode = Mode::Verbatim {
                    name: "comment".to_string(),
                    line: line_no,
                    lang: None,
                    skip_test: false,
                    keep: false,
                    end: None,
                    lines: Vec::new(),
                };
            }
            "config" => {}
            _ => {
                if let Some(caps) = RE_NUMBERED.captures(name) {
                    match caps[2].parse::<usize>() {
                        Ok(level) if &caps[1] == "head" => {
                            self.start_text(TextKind::Heading(level), line_no, rest)
                        }
                        Ok(level) => self.start_text(TextKind::Item(level.max(1)), line_no, rest),
                        Err(_) => {
                            self.errors.push(ParseError::new(
                                line_no,
                                format!("level out of range in '={}'", name),
                            ));
                            self.start_text(TextKind::Paragraph, line_no, rest);
                        }
                    }
                    return;
                }
                self.errors.push(ParseError::new(
                    line_no,
                    format!("unknown directive '={}'", name),
                ));
                self.start_text(TextKind::Paragraph, line_no, rest);
            }
        }
    }

    fn begin_block(&mut self, line_no: usize, rest: &str) {
        let (block, attrs) = split_block_name(rest);
        match block {
            "" => self
                .errors
                .push(ParseError::new(line_no, "=begin without a block name")),
            "pod" => {
                if !self.seen_pod {
                    self.seen_pod = true;
                    let attrs = parse_attributes(attrs);
                    self.meta = FileMeta {
                        kind: attrs.get("kind").cloned(),
                        subkind: attrs.get("subkind").cloned(),
                    };
                }
                self.open.push(("pod".to_string(), line_no));
            }
            "code" | "input" | "output" | "table" | "comment" => {
                self.start_verbatim(line_no, block, attrs, true);
            }
            other => {
                self.errors.push(ParseError::new(
                    line_no,
                    format!("unknown block '=begin {}'", other),
                ));
                self.open.push((other.to_string(), line_no));
            }
        }
    }

    fn end_block(&mut self, line_no: usize, rest: &str) {
        let (block, _) = split_block_name(rest);
        match self.open.iter().rposition(|(name, _)| name == block) {
            Some(pos) => {
                for (name, line) in self.open.drain(pos + 1..) {
                    self.errors.push(ParseError::new(
                        line,
                        format!("=begin {} closed by =end {}", name, block),
                    ));
                }
                self.open.pop();
            }
            None => self.errors.push(ParseError::new(
                line_no,
                format!("=end {} without matching =begin", block),
            )),
        }
    }

    fn start_verbatim(&mut self, line_no: usize, block: &str, attrs: &str, delimited: bool) {
        let attrs = parse_attributes(attrs);
        let end = if delimited {
            let pattern = format!(r"^=end[ \t]+{}[ \t]*$", regex::escape(block));
            Regex::new(&pattern).ok()
        } else {
            None
        };
        self.mode = Mode::Verbatim {
            name: block.to_string(),
            line: line_no,
            lang: attrs.get("lang").cloned().filter(|l| !l.is_empty()),
            skip_test: attrs
                .get("skip-test")
                .is_some_and(|v| v != "False"),
            keep: block != "comment",
            end,
            lines: Vec::new(),
        };
    }

    fn start_text(&mut self, kind: TextKind, line_no: usize, rest: &str) {
        self.mode = Mode::Text {
            kind,
            line: line_no,
            buf: rest.to_string(),
        };
    }

    /// Close whatever block is being accumulated and emit its node.
    fn finish_mode(&mut self) {
        match std::mem::replace(&mut self.mode, Mode::Normal) {
            Mode::Normal => {}
            Mode::Text { kind, line, buf } => self.emit_text(kind, line, &buf),
            Mode::Verbatim {
                line,
                lang,
                skip_test,
                keep,
                lines,
                ..
            } => {
                if keep {
                    self.nodes.push(Node {
                        line,
                        block: Block::CodeBlock {
                            lang,
                            skip_test,
                            text: lines.join("\n"),
                        },
                    });
                }
            }
            Mode::Indented { line, mut lines } => {
                while lines.last().is_some_and(|l| l.is_empty()) {
                    lines.pop();
                }
                self.nodes.push(Node {
                    line,
                    block: Block::CodeBlock {
                        lang: None,
                        skip_test: false,
                        text: dedent(&lines),
                    },
                });
            }
        }
    }

    fn emit_text(&mut self, kind: TextKind, line: usize, buf: &str) {
        let content = inline::parse(buf, line, &mut self.inline);
        match kind {
            TextKind::Heading(level) => self.nodes.push(Node {
                line,
                block: Block::Heading { level, content },
            }),
            TextKind::Paragraph => {
                if buf.trim().is_empty() {
                    return;
                }
                self.nodes.push(Node {
                    line,
                    block: Block::Paragraph(content),
                });
            }
            TextKind::Item(level) => {
                let item = ListItem { level, line, content };
                let definition = item.definition_marker().is_some();
                if !definition {
                    if let Some(Node {
                        block: Block::List(items),
                        ..
                    }) = self.nodes.last_mut()
                    {
                        if items.iter().all(|i| i.definition_marker().is_none()) {
                            items.push(item);
                            return;
                        }
                    }
                }
                self.nodes.push(Node {
                    line,
                    block: Block::List(vec![item]),
                });
            }
        }
    }

    fn finish(&mut self) {
        if let Mode::Verbatim {
            name,
            line,
            end: Some(_),
            ..
        } = &self.mode
        {
            self.errors.push(ParseError::new(
                *line,
                format!("unterminated =begin {}", name),
            ));
        }
        self.finish_mode();
        for (name, line) in std::mem::take(&mut self.open) {
            if name != "pod" {
                self.errors.push(ParseError::new(
                    line,
                    format!("unterminated =begin {}", name),
                ));
            }
        }
    }
}

// -- Helper functions ---------------------------------------------------------

/// "code :lang<raku>" → ("code", ":lang<raku>")
fn split_block_name(rest: &str) -> (&str, &str) {
    let rest = rest.trim();
    match rest.find(char::is_whitespace) {
        Some(pos) => (&rest[..pos], rest[pos..].trim_start()),
        None => (rest, ""),
    }
}

/// Remove the common leading whitespace of non-empty lines, counted in chars.
fn dedent(lines: &[String]) -> String {
    let indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.chars().take_while(|c| c.is_whitespace()).count())
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|l| match l.char_indices().nth(indent) {
            Some((at, _)) => &l[at..],
            // Whitespace-only line no longer than the indent
            None => l.trim_start(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
