//! Inline formatting codes: `B<>`, `I<>`, `C<>`, `L<>`, `X<>`, `V<>`, `E<>`, `Z<>`.
//!
//! A code is an uppercase letter that does not follow an alphanumeric
//! character, directly followed by `<`, a run of `<`, or `«`. Single angle
//! brackets balance inside the code; runs of `<<` close at the first
//! matching run of `>>`.

use crate::diagnostics::ParseError;
use crate::model::{plain_text, Inline, RefId, Style};

/// Shared state while parsing the inline content of one document.
#[derive(Debug, Default)]
pub struct InlineContext {
    pub errors: Vec<ParseError>,
    pub next_ref: usize,
}

impl InlineContext {
    fn next_id(&mut self) -> RefId {
        let id = RefId(self.next_ref);
        self.next_ref += 1;
        id
    }
}

#[derive(Debug, Clone, Copy)]
enum Delim {
    Angle(usize),
    Guillemet,
}

struct Opener {
    letter: char,
    content_start: usize,
    delim: Delim,
}

/// Parse `text` (which starts on `line`) into inline nodes.
pub fn parse(text: &str, line: usize, cx: &mut InlineContext) -> Vec<Inline> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut i = 0;

    while i < text.len() {
        if let Some(op) = opener_at(text, i) {
            match find_close(text, op.content_start, op.delim) {
                Some((end, after)) => {
                    let inner = &text[op.content_start..end];
                    let raw = &text[i..after];
                    apply(op.letter, inner, raw, line, cx, &mut out, &mut buf);
                    i = after;
                }
                None => {
                    cx.errors.push(ParseError::new(
                        line,
                        format!("unterminated formatting code {}<", op.letter),
                    ));
                    buf.push_str(&text[i..op.content_start]);
                    i = op.content_start;
                }
            }
            continue;
        }
        let Some(c) = text[i..].chars().next() else {
            break;
        };
        buf.push(c);
        i += c.len_utf8();
    }

    flush(&mut buf, &mut out);
    out
}

fn flush(buf: &mut String, out: &mut Vec<Inline>) {
    if buf.is_empty() {
        return;
    }
    // Merge with a preceding text run (entities, verbatim)
    if let Some(Inline::Text(prev)) = out.last_mut() {
        prev.push_str(buf);
        buf.clear();
        return;
    }
    out.push(Inline::Text(std::mem::take(buf)));
}

fn apply(
    letter: char,
    inner: &str,
    raw: &str,
    line: usize,
    cx: &mut InlineContext,
    out: &mut Vec<Inline>,
    buf: &mut String,
) {
    match letter {
        'B' | 'I' | 'C' | 'K' | 'T' => {
            flush(buf, out);
            let style = match letter {
                'B' => Style::Bold,
                'I' => Style::Italic,
                _ => Style::Code,
            };
            out.push(Inline::Span {
                style,
                content: parse(inner, line, cx),
            });
        }
        'L' => {
            let (display, target) = match split_bar(inner) {
                Some((display, target)) => (Some(display), target.trim()),
                None => (None, inner.trim()),
            };
            if target.is_empty() {
                cx.errors.push(ParseError::new(line, "link with empty target"));
                match display {
                    Some(d) => {
                        flush(buf, out);
                        out.extend(parse(d, line, cx));
                    }
                    None => buf.push_str(raw),
                }
                return;
            }
            flush(buf, out);
            let display = match display {
                Some(d) => parse(d, line, cx),
                None => vec![Inline::Text(target.to_string())],
            };
            let id = cx.next_id();
            out.push(Inline::Link {
                id,
                display,
                target: target.to_string(),
            });
        }
        'X' => {
            let (display, keys) = match split_bar(inner) {
                Some((display, keys)) => (parse(display, line, cx), split_keys(keys)),
                None => {
                    let display = parse(inner, line, cx);
                    let key = plain_text(&display);
                    (display, vec![key])
                }
            };
            let keys: Vec<String> = keys.into_iter().filter(|k| !k.is_empty()).collect();
            if keys.is_empty() {
                cx.errors.push(ParseError::new(line, "index marker without keys"));
                flush(buf, out);
                out.extend(display);
                return;
            }
            flush(buf, out);
            let id = cx.next_id();
            out.push(Inline::Index { id, display, keys });
        }
        'V' => buf.push_str(inner),
        'E' => match decode_entities(inner) {
            Some(decoded) => buf.push_str(&decoded),
            None => {
                cx.errors.push(ParseError::new(line, format!("unknown entity E<{}>", inner)));
                buf.push_str(raw);
            }
        },
        'Z' => {}
        other => {
            cx.errors.push(ParseError::new(
                line,
                format!("unknown formatting code {}<>", other),
            ));
            buf.push_str(raw);
        }
    }
}

fn opener_at(text: &str, i: usize) -> Option<Opener> {
    let rest = &text[i..];
    let mut chars = rest.chars();
    let letter = chars.next().filter(|c| c.is_ascii_uppercase())?;
    if text[..i].chars().next_back().is_some_and(|c| c.is_alphanumeric()) {
        return None;
    }
    let after_letter = i + 1;
    if rest[1..].starts_with('«') {
        return Some(Opener {
            letter,
            content_start: after_letter + '«'.len_utf8(),
            delim: Delim::Guillemet,
        });
    }
    let n = rest[1..].bytes().take_while(|&b| b == b'<').count();
    if n == 0 {
        return None;
    }
    Some(Opener {
        letter,
        content_start: after_letter + n,
        delim: Delim::Angle(n),
    })
}

/// Returns (content end, position after the closer).
fn find_close(text: &str, start: usize, delim: Delim) -> Option<(usize, usize)> {
    match delim {
        Delim::Angle(1) => balanced(text, start, '<', '>'),
        Delim::Angle(n) => {
            let closer = ">".repeat(n);
            text[start..]
                .find(&closer)
                .map(|p| (start + p, start + p + n))
        }
        Delim::Guillemet => balanced(text, start, '«', '»'),
    }
}

fn balanced(text: &str, start: usize, open: char, close: char) -> Option<(usize, usize)> {
    let mut depth = 0usize;
    for (offset, c) in text[start..].char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            if depth == 0 {
                let pos = start + offset;
                return Some((pos, pos + c.len_utf8()));
            }
            depth -= 1;
        }
    }
    None
}

/// Split at the first `|` that is not inside a nested formatting code.
fn split_bar(inner: &str) -> Option<(&str, &str)> {
    let mut i = 0;
    while i < inner.len() {
        if let Some(op) = opener_at(inner, i) {
            if let Some((_, after)) = find_close(inner, op.content_start, op.delim) {
                i = after;
                continue;
            }
        }
        let c = inner[i..].chars().next()?;
        if c == '|' {
            return Some((&inner[..i], &inner[i + 1..]));
        }
        i += c.len_utf8();
    }
    None
}

fn split_keys(keys: &str) -> Vec<String> {
    keys.split([',', ';'])
        .map(|k| k.trim().to_string())
        .collect()
}

const NAMED_ENTITIES: &[(&str, char)] = &[
    ("nbsp", '\u{a0}'),
    ("lt", '<'),
    ("gt", '>'),
    ("amp", '&'),
    ("quot", '"'),
    ("laquo", '«'),
    ("raquo", '»'),
    ("ndash", '–'),
    ("mdash", '—'),
    ("hellip", '…'),
    ("copy", '©'),
];

fn decode_entities(inner: &str) -> Option<String> {
    inner
        .split(';')
        .map(|e| decode_entity(e.trim()))
        .collect()
}

fn decode_entity(entity: &str) -> Option<char> {
    let code = if let Some(hex) = entity.strip_prefix("0x") {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(oct) = entity.strip_prefix("0o") {
        u32::from_str_radix(oct, 8).ok()
    } else if let Some(bin) = entity.strip_prefix("0b") {
        u32::from_str_radix(bin, 2).ok()
    } else if !entity.is_empty() && entity.bytes().all(|b| b.is_ascii_digit()) {
        entity.parse().ok()
    } else {
        return NAMED_ENTITIES
            .iter()
            .find(|(name, _)| *name == entity)
            .map(|(_, c)| *c);
    };
    code.and_then(char::from_u32)
}
