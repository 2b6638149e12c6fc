//! Splitting a changelog tree into per-version segments.

use semver::Version;
use serde::Serialize;

use super::version::heading_version;
use crate::document::{Node, NodeKind, source_lines};

/// Depth every version heading is normalized to inside its segment.
pub const SEGMENT_HEADING_DEPTH: u8 = 2;

/// A contiguous block of changelog content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    /// Version announced by the segment's heading. `None` for the preamble
    /// and for an unsegmented document.
    pub version: Option<Version>,
    /// Flattened text of the triggering heading.
    pub title: String,
    /// Slug of the triggering heading.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Block nodes, starting with a depth-2 copy of the version heading.
    pub content: Vec<Node>,
    /// Raw markdown lines the segment spans.
    pub source: String,
}

impl Segment {
    pub const fn is_versioned(&self) -> bool {
        self.version.is_some()
    }
}

/// Result of segmenting a changelog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Segmentation {
    /// At least one heading announced a single version.
    Segmented {
        /// Content before the first version heading; never filtered.
        preamble: Option<Segment>,
        segments: Vec<Segment>,
    },
    /// No version headings: the whole document as one unversioned segment.
    Unsegmented { whole: Segment },
}

impl Segmentation {
    /// Segments to render and filter.
    ///
    /// For an unsegmented document this is the single whole-document segment.
    pub fn segments(&self) -> &[Segment] {
        match self {
            Self::Segmented { segments, .. } => segments,
            Self::Unsegmented { whole } => std::slice::from_ref(whole),
        }
    }

    pub const fn preamble(&self) -> Option<&Segment> {
        match self {
            Self::Segmented { preamble, .. } => preamble.as_ref(),
            Self::Unsegmented { .. } => None,
        }
    }

    pub const fn is_segmented(&self) -> bool {
        matches!(self, Self::Segmented { .. })
    }

    /// Detected versions in document order.
    pub fn versions(&self) -> Vec<&Version> {
        self.segments()
            .iter()
            .filter_map(|s| s.version.as_ref())
            .collect()
    }
}

struct Open {
    version: Option<Version>,
    title: String,
    id: Option<String>,
    start_line: Option<usize>,
    content: Vec<Node>,
}

/// Partition the root's direct children into version segments.
///
/// A heading whose text names exactly one version opens a new segment;
/// everything up to the next such heading belongs to it. `source` is the
/// text `root` was parsed from and is used to fill [`Segment::source`].
pub fn segment(root: &Node, source: &str) -> Segmentation {
    let _scope = crate::perf::scope("changelog.segment");
    let lines = source_lines(source);

    let mut preamble = Open {
        version: None,
        title: String::new(),
        id: None,
        start_line: Some(1),
        content: Vec::new(),
    };
    let mut segments: Vec<Open> = Vec::new();

    for child in &root.children {
        if let Some(version) = boundary_version(child) {
            let mut heading = child.clone();
            if let NodeKind::Heading { depth, .. } = &mut heading.kind {
                *depth = SEGMENT_HEADING_DEPTH;
            }
            tracing::trace!(%version, line = ?child.position.map(|p| p.start_line), "version boundary");
            segments.push(Open {
                version: Some(version),
                title: child.text(),
                id: child.heading_id().map(ToString::to_string),
                start_line: child.position.map(|p| p.start_line),
                content: vec![heading],
            });
            continue;
        }
        match segments.last_mut() {
            Some(open) => open.content.push(child.clone()),
            None => preamble.content.push(child.clone()),
        }
    }

    if segments.is_empty() {
        tracing::debug!("no version headings found; document is unsegmented");
        return Segmentation::Unsegmented {
            whole: Segment {
                version: None,
                title: String::new(),
                id: None,
                content: root.children.clone(),
                source: source.to_string(),
            },
        };
    }

    let starts: Vec<Option<usize>> = segments.iter().map(|s| s.start_line).collect();
    let preamble_end = starts[0];
    let preamble = (!preamble.content.is_empty())
        .then(|| close(preamble, &lines, preamble_end));

    let segments: Vec<Segment> = segments
        .into_iter()
        .enumerate()
        .map(|(idx, open)| {
            let end = starts.get(idx + 1).copied().flatten();
            close(open, &lines, end)
        })
        .collect();

    tracing::debug!(
        segments = segments.len(),
        preamble = preamble.is_some(),
        "segmented changelog"
    );
    Segmentation::Segmented { preamble, segments }
}

fn boundary_version(node: &Node) -> Option<Version> {
    node.heading_depth()?;
    heading_version(&node.text())
}

/// Finish a segment, slicing its source from its start line up to (not
/// including) `next_start`.
fn close(open: Open, lines: &[&str], next_start: Option<usize>) -> Segment {
    let source = open.start_line.map_or_else(String::new, |start| {
        let from = start.saturating_sub(1).min(lines.len());
        let to = next_start
            .map_or(lines.len(), |n| n.saturating_sub(1))
            .clamp(from, lines.len());
        lines[from..to].join("\n").trim_end().to_string()
    });
    Segment {
        version: open.version,
        title: open.title,
        id: open.id,
        content: open.content,
        source,
    }
}
