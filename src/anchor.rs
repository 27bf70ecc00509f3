//! Heading anchor/slug generation.

use std::collections::HashSet;

/// Anchor slug for a title.
///
/// - lowercase
/// - alphanumerics kept, whitespace/`_`/`-` runs collapse to one `-`
/// - everything else is stripped
pub fn slug(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.to_lowercase().chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_dash = true;
        }
        // All other chars (':', '.', operators) are stripped
    }
    slug
}

/// Anchor for a link fragment such as `method_split`.
pub fn fragment_anchor(fragment: &str) -> String {
    slug(&fragment.replace('_', " "))
}

/// Hands out page-unique anchors.
#[derive(Debug, Default)]
pub struct AnchorSet {
    used: HashSet<String>,
}

impl AnchorSet {
    pub fn claim(&mut self, title: &str) -> String {
        let base = match slug(title) {
            s if s.is_empty() => "section".to_string(),
            s => s,
        };
        if self.used.insert(base.clone()) {
            return base;
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}-{}", base, n);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}
