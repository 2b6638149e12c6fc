//! Heading slugs for in-page anchors.

use std::collections::HashMap;

use super::types::{Node, NodeKind};

/// Turn heading text into a URL-safe slug.
///
/// Lowercases, maps each whitespace character to `-` and drops everything
/// outside `[a-z0-9-_]`. Hyphens are not collapsed, so `"a - b"` becomes
/// `"a---b"`, matching GitHub-style anchors.
///
/// # Examples
///
/// ```
/// use changelogs::document::slugify;
///
/// assert_eq!(slugify("Patch Changes"), "patch-changes");
/// assert_eq!(slugify("[1.2.3] - 2020-01-01"), "123---2020-01-01");
/// ```
pub fn slugify(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some('-')
            } else if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_' {
                Some(c)
            } else {
                None
            }
        })
        .collect()
}

/// Hands out unique slugs for one document.
///
/// The first heading with a given text keeps the bare slug; later ones get
/// `-1`, `-2`, ... appended. A suffixed candidate that is already taken (say,
/// a heading literally named "Usage 1") is skipped.
#[derive(Debug, Default)]
pub struct Slugger {
    occurrences: HashMap<String, usize>,
}

impl Slugger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slug(&mut self, text: &str) -> String {
        let base = slugify(text);
        let mut candidate = base.clone();
        while self.occurrences.contains_key(&candidate) {
            let count = self.occurrences.entry(base.clone()).or_insert(0);
            *count += 1;
            candidate = format!("{base}-{count}");
        }
        self.occurrences.insert(candidate.clone(), 0);
        candidate
    }
}

/// Assign an `id` to every heading in the tree, in document order.
///
/// Uses a fresh [`Slugger`], so running it twice on the same tree gives the
/// same ids.
pub fn assign_heading_ids(root: &mut Node) {
    let mut slugger = Slugger::new();
    let mut assigned = 0usize;
    root.walk_mut(&mut |node| {
        if node.heading_depth().is_none() {
            return;
        }
        let slug = slugger.slug(&node.text());
        if let NodeKind::Heading { id, .. } = &mut node.kind {
            *id = Some(slug);
            assigned += 1;
        }
    });
    tracing::trace!(headings = assigned, "assigned heading ids");
}
