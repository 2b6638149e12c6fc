//! Markdown document parsing.
//!
//! This module handles:
//! - Parsing markdown with comrak into an owned [`Node`] tree
//! - Assigning unique heading slugs
//! - Projecting a table of contents from headings

mod parser;
mod slug;
mod toc;
mod types;

pub use parser::{Extensions, MarkdownParser, parse};
pub use slug::{Slugger, assign_heading_ids, slugify};
pub use toc::{MAX_TOC_DEPTH, TocEntry, toc, toc_for};
pub use types::{Align, Node, NodeKind, Position, ReferenceKind};

/// Split source text into lines the way comrak numbers them.
///
/// `\r\n`, `\n` and a lone `\r` all end a line. A trailing line ending does
/// not produce an empty last line.
pub fn source_lines(source: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut rest = source;
    while !rest.is_empty() {
        let Some(idx) = rest.find(['\r', '\n']) else {
            lines.push(rest);
            break;
        };
        lines.push(&rest[..idx]);
        let ending = if rest[idx..].starts_with("\r\n") { 2 } else { 1 };
        rest = &rest[idx + ending..];
    }
    lines
}

/// Parse markdown and assign heading ids in one step.
///
/// # Example
///
/// ```
/// use changelogs::document::parse_with_ids;
///
/// let root = parse_with_ids("# Intro\n\n# Intro");
/// assert_eq!(root.children[1].heading_id(), Some("intro-1"));
/// ```
pub fn parse_with_ids(source: &str) -> Node {
    let mut root = parse(source);
    assign_heading_ids(&mut root);
    root
}
