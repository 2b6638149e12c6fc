//! Changelog structure on top of a parsed document.
//!
//! This module handles:
//! - Detecting version numbers in heading text
//! - Splitting a document into per-version segments
//! - Parsing npm-style semver ranges and filtering segments by them

mod filter;
mod range;
mod segment;
mod version;

pub use filter::{SegmentFilter, filter_segments};
pub use range::{RangeError, VersionRange};
pub use segment::{SEGMENT_HEADING_DEPTH, Segment, Segmentation, segment};
pub use version::{heading_version, version_tokens};

use crate::document::{TocEntry, toc_for};

/// Table of contents over the content of the given segments, in order.
pub fn segments_toc<'a>(segments: impl IntoIterator<Item = &'a Segment>) -> Vec<TocEntry> {
    toc_for(segments.into_iter().flat_map(|s| s.content.iter()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse_with_ids;

    #[test]
    fn test_toc_of_filtered_segments() {
        let md = "# 1.2.3\n\n### Fixes\n\n# 1.3.0\n\n### Fixes\n\n# 2.0.0\n\n### Breaking\n";
        let seg = segment(&parse_with_ids(md), md);
        let kept = filter_segments(seg.segments(), ">=1.3.0");
        let entries = segments_toc(kept);
        let pairs: Vec<_> = entries
            .iter()
            .map(|e| (e.level, e.id.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![(2, "130"), (3, "fixes-1"), (2, "200"), (3, "breaking")]
        );
    }
}
