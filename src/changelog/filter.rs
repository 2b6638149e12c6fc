//! Selecting segments by semver range.

use semver::Version;

use super::range::{RangeError, VersionRange};
use super::segment::Segment;

/// How a user-supplied filter expression was interpreted.
#[derive(Debug)]
pub enum SegmentFilter {
    /// No expression given; every segment is kept.
    All,
    /// A valid range.
    Range(VersionRange),
    /// The expression did not parse; every segment is kept.
    Invalid { expr: String, error: RangeError },
}

impl SegmentFilter {
    /// Interpret a filter expression. Blank input means "no filter".
    pub fn from_expr(expr: &str) -> Self {
        if expr.trim().is_empty() {
            return Self::All;
        }
        match VersionRange::parse(expr) {
            Ok(range) => Self::Range(range),
            Err(error) => {
                tracing::debug!(expr, %error, "ignoring invalid version filter");
                Self::Invalid {
                    expr: expr.to_string(),
                    error,
                }
            }
        }
    }

    /// Whether segments are actually being narrowed down.
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Range(_))
    }

    pub const fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid { .. })
    }

    /// Whether a segment with this version survives the filter.
    ///
    /// Unversioned segments always survive.
    pub fn keeps(&self, version: Option<&Version>) -> bool {
        match (self, version) {
            (Self::Range(range), Some(version)) => range.matches(version),
            _ => true,
        }
    }

    /// Segments that survive, in their original order.
    pub fn apply<'a>(&self, segments: &'a [Segment]) -> Vec<&'a Segment> {
        segments
            .iter()
            .filter(|s| self.keeps(s.version.as_ref()))
            .collect()
    }

    /// Indices of surviving segments, in their original order.
    pub fn apply_indices(&self, segments: &[Segment]) -> Vec<usize> {
        segments
            .iter()
            .enumerate()
            .filter(|(_, s)| self.keeps(s.version.as_ref()))
            .map(|(idx, _)| idx)
            .collect()
    }
}

/// Keep the segments whose version satisfies `expr`.
///
/// An empty or unparseable expression keeps everything, so a half-typed
/// range never blanks the view.
pub fn filter_segments<'a>(segments: &'a [Segment], expr: &str) -> Vec<&'a Segment> {
    let _scope = crate::perf::scope("changelog.filter");
    SegmentFilter::from_expr(expr).apply(segments)
}
