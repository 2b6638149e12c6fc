//! Table of contents projection.

use serde::Serialize;

use super::types::Node;

/// Deepest heading level shown in navigation.
pub const MAX_TOC_DEPTH: u8 = 3;

/// One navigation entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    pub level: u8,
    pub id: String,
    pub text: String,
}

impl TocEntry {
    /// In-page link target for this entry.
    pub fn href(&self) -> String {
        format!("#{}", self.id)
    }
}

/// Project the headings of `nodes` (and their descendants) into ToC entries.
///
/// Headings deeper than [`MAX_TOC_DEPTH`] are skipped. Headings that were
/// never slugged fall back to an empty id.
pub fn toc_for<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Vec<TocEntry> {
    let mut entries = Vec::new();
    for node in nodes {
        node.walk(&mut |n| {
            let Some(level) = n.heading_depth() else {
                return;
            };
            if level > MAX_TOC_DEPTH {
                return;
            }
            entries.push(TocEntry {
                level,
                id: n.heading_id().unwrap_or_default().to_string(),
                text: n.text(),
            });
        });
    }
    entries
}

/// Table of contents of a whole document tree.
pub fn toc(root: &Node) -> Vec<TocEntry> {
    toc_for(std::iter::once(root))
}
