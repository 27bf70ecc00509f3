//! Site configuration: `podsite.toml` at the source root, or `--config`.
//!
//! Every table has built-in defaults tuned for a Raku-style corpus
//! (`doc/Type/*.rakudoc`, `doc/Language/*.rakudoc`, ...). A user file
//! replaces whole tables, it does not merge rule lists.

use crate::model::Kind;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const CONFIG_FILE: &str = "podsite.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Site title used on the index page.
    pub title: String,
    /// Source file extensions, without the dot.
    pub extensions: Vec<String>,
    /// File category → kind of the page-level documentable.
    pub categories: BTreeMap<String, Kind>,
    /// First segment of a `/prefix/name` link → kind hint.
    pub link_prefixes: BTreeMap<String, Kind>,
    /// First key of a definition item's `X<>` marker → kind.
    pub index_categories: BTreeMap<String, Kind>,
    /// Ordered heading classification rules; first match wins.
    pub rules: Vec<RuleSpec>,
}

/// One row of the heading classification table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    /// Regex on the heading's plain text. A `name` group selects the lookup name.
    pub pattern: String,
    pub kind: Kind,
    /// Regex on the enclosing documentable's title.
    #[serde(default)]
    pub context: Option<String>,
    /// Regex on the file category.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub level: Option<usize>,
}

impl RuleSpec {
    fn new(pattern: &str, kind: Kind) -> Self {
        Self {
            pattern: pattern.to_string(),
            kind,
            context: None,
            category: None,
            level: None,
        }
    }

    fn context(mut self, context: &str) -> Self {
        self.context = Some(context.to_string());
        self
    }

    fn category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    fn level(mut self, level: usize) -> Self {
        self.level = Some(level);
        self
    }
}

fn table(rows: &[(&str, Kind)]) -> BTreeMap<String, Kind> {
    rows.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "Documentation".to_string(),
            extensions: vec!["rakudoc".to_string(), "pod6".to_string()],
            categories: table(&[
                ("type", Kind::Class),
                ("language", Kind::Language),
                ("programs", Kind::Program),
                ("native", Kind::Class),
            ]),
            link_prefixes: table(&[
                ("type", Kind::Class),
                ("routine", Kind::Routine),
                ("syntax", Kind::Syntax),
                ("language", Kind::Language),
                ("programs", Kind::Program),
                ("pragma", Kind::Pragma),
            ]),
            index_categories: table(&[
                ("types", Kind::Class),
                ("routines", Kind::Routine),
                ("methods", Kind::Routine),
                ("operators", Kind::Operator),
                ("pragmas", Kind::Pragma),
                ("syntax", Kind::Syntax),
                ("language", Kind::Section),
                ("reference", Kind::Section),
            ]),
            rules: vec![
                RuleSpec::new(
                    r"^(?:(?:multi|proto|only)\s+)?(?:method|submethod|sub|routine|trait)\s+(?P<name>\S.*)$",
                    Kind::Routine,
                ),
                RuleSpec::new(
                    r"^(?:infix|prefix|postfix|circumfix|postcircumfix|term|listop)\s+(?P<name>\S.*)$",
                    Kind::Operator,
                ),
                RuleSpec::new(
                    r"^(?:class|role|enum|module|grammar|subset|package)\s+(?P<name>\S+)$",
                    Kind::Class,
                ),
                RuleSpec::new(r"^(?P<name>[\w:&.-]+)$", Kind::Routine)
                    .context(r"^(?:Methods|Routines|Subroutines|Submethods)\b"),
                RuleSpec::new(r"^(?P<name>\S+)$", Kind::Operator).context(r"^Operators\b"),
                RuleSpec::new(r"^(?P<name>\S+)$", Kind::Pragma).context(r"(?i)\bpragmas?$"),
                RuleSpec::new(r".+", Kind::Section).category(r"(?i)^(?:language|programs)$"),
                RuleSpec::new(r".+", Kind::Section).level(1),
            ],
        }
    }
}

impl Config {
    /// Load `explicit` if given, else `<source_root>/podsite.toml` if present,
    /// else the defaults.
    pub fn load(source_root: &Path, explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => {
                let candidate = source_root.join(CONFIG_FILE);
                if !candidate.is_file() {
                    tracing::debug!(
                        "no {} in {}, using defaults",
                        CONFIG_FILE,
                        source_root.display()
                    );
                    return Ok(Self::default());
                }
                candidate
            }
        };

        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let config = Self::from_toml(&text)
            .with_context(|| format!("invalid config: {}", path.display()))?;
        tracing::info!(config = %path.display(), rules = config.rules.len(), "loaded config");
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(text)?;
        config.categories = lowercase_keys(config.categories);
        config.link_prefixes = lowercase_keys(config.link_prefixes);
        config.index_categories = lowercase_keys(config.index_categories);
        Ok(config)
    }

    /// Kind of a page-level documentable for a file category.
    pub fn category_kind(&self, category: &str) -> Option<Kind> {
        self.categories.get(&category.to_lowercase()).copied()
    }

    pub fn link_prefix_kind(&self, prefix: &str) -> Option<Kind> {
        self.link_prefixes.get(&prefix.to_lowercase()).copied()
    }

    pub fn index_category_kind(&self, key: &str) -> Option<Kind> {
        self.index_categories.get(&key.trim().to_lowercase()).copied()
    }
}

fn lowercase_keys(map: BTreeMap<String, Kind>) -> BTreeMap<String, Kind> {
    map.into_iter().map(|(k, v)| (k.to_lowercase(), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_cover_core_categories() {
        let config = Config::default();
        assert_eq!(config.category_kind("Type"), Some(Kind::Class));
        assert_eq!(config.link_prefix_kind("routine"), Some(Kind::Routine));
        assert_eq!(config.index_category_kind(" Pragmas "), Some(Kind::Pragma));
        assert_eq!(config.category_kind("Recipes"), None);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
title = "Raku"
extensions = ["pod"]

[categories]
Recipes = "section"
"#,
        )
        .unwrap();
        assert_eq!(config.title, "Raku");
        assert_eq!(config.extensions, vec!["pod"]);
        assert_eq!(config.category_kind("recipes"), Some(Kind::Section));
        assert_eq!(config.category_kind("type"), None);
        assert!(!config.rules.is_empty());
    }

    #[test]
    fn rules_table_replaces_defaults() {
        let config = Config::from_toml(
            r#"
[[rules]]
pattern = '^fn (?P<name>\w+)$'
kind = "routine"
level = 2
"#,
        )
        .unwrap();
        assert_eq!(config.rules.len(), 1);
        assert_eq!(config.rules[0].level, Some(2));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = Config::from_toml("[categories]\ntype = \"widget\"\n").unwrap_err();
        assert!(format!("{:#}", err).contains("widget"));
    }

    #[test]
    fn load_picks_up_root_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "title = \"From file\"\n").unwrap();
        let config = Config::load(dir.path(), None).unwrap();
        assert_eq!(config.title, "From file");
    }

    #[test]
    fn load_missing_explicit_file_fails() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(Config::load(dir.path(), Some(&missing)).is_err());
    }
}
