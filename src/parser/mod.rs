//! Parser module: Pod blocks, inline codes and block attributes.

pub mod block;
pub mod inline;

use crate::model::ParsedDocument;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

// :name<v>  :name("v")  :name('v')  :name(v)  :name«v»  :name[v]  :name  :!name
static RE_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#":(!)?([A-Za-z][\w-]*)"#,
        r#"(?:<([^>]*)>|\(\s*(?:"([^"]*)"|'([^']*)'|([^)]*?))\s*\)|«([^»]*)»|\[([^\]]*)\])?"#
    ))
    .unwrap()
});

/// Parse raw markup into nodes, collecting (never raising) parse errors.
pub fn parse(input: &str) -> ParsedDocument {
    block::parse(input)
}

/// Parse Pod block attributes. Flags map to "True" / "False".
pub fn parse_attributes(text: &str) -> BTreeMap<String, String> {
    RE_ATTRIBUTE
        .captures_iter(text)
        .map(|caps| {
            let name = caps[2].to_string();
            let value = (3..=8)
                .find_map(|i| caps.get(i))
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_else(|| {
                    if caps.get(1).is_some() { "False" } else { "True" }.to_string()
                });
            (name, value)
        })
        .collect()
}
