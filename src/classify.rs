//! Kind classification from compiled pattern tables.

use crate::config::{Config, RuleSpec};
use crate::model::Kind;
use anyhow::{Context, Result};
use regex::Regex;

struct Rule {
    pattern: Regex,
    kind: Kind,
    context: Option<Regex>,
    category: Option<Regex>,
    level: Option<usize>,
}

/// Where a heading sits, as seen by the rule table.
pub struct HeadingContext<'a> {
    pub title: &'a str,
    pub level: usize,
    /// Title of the enclosing documentable.
    pub parent_title: &'a str,
    pub category: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: Kind,
    pub name: String,
}

pub struct Classifier {
    rules: Vec<Rule>,
}

fn compile(pattern: &str, what: &str, index: usize) -> Result<Regex> {
    Regex::new(pattern)
        .with_context(|| format!("rule {}: invalid {} regex: {}", index + 1, what, pattern))
}

impl Classifier {
    pub fn new(config: &Config) -> Result<Self> {
        let rules = config
            .rules
            .iter()
            .enumerate()
            .map(|(i, rule_spec)| compile_rule(i, rule_spec))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// First matching rule wins. `None` means the heading is unclassified.
    pub fn classify(&self, heading: &HeadingContext<'_>) -> Option<Classification> {
        self.rules.iter().find_map(|rule| {
            if rule.level.is_some_and(|level| level != heading.level) {
                return None;
            }
            if let Some(ref re) = rule.context {
                if !re.is_match(heading.parent_title) {
                    return None;
                }
            }
            if let Some(ref re) = rule.category {
                if !heading.category.is_some_and(|c| re.is_match(c)) {
                    return None;
                }
            }
            let caps = rule.pattern.captures(heading.title)?;
            let name = caps
                .name("name")
                .map(|m| m.as_str().trim())
                .filter(|n| !n.is_empty())
                .unwrap_or(heading.title);
            Some(Classification {
                kind: rule.kind,
                name: name.to_string(),
            })
        })
    }
}

fn compile_rule(index: usize, rule_spec: &RuleSpec) -> Result<Rule> {
    Ok(Rule {
        pattern: compile(&rule_spec.pattern, "pattern", index)?,
        kind: rule_spec.kind,
        context: rule_spec
            .context
            .as_deref()
            .map(|c| compile(c, "context", index))
            .transpose()?,
        category: rule_spec
            .category
            .as_deref()
            .map(|c| compile(c, "category", index))
            .transpose()?,
        level: rule_spec.level,
    })
}
