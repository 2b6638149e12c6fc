// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. output::OutputFormat)
    clippy::module_name_repetitions
)]

//! # Changelogs
//!
//! Read a markdown changelog, split it into per-version sections and keep
//! only the releases matching an npm-style semver range.
//!
//! The pipeline runs in plain, synchronous stages:
//! - **Parse**: markdown into an owned [`document::Node`] tree
//! - **Slug**: unique, GitHub-style ids for every heading
//! - **Segment**: one [`changelog::Segment`] per version heading
//! - **Filter**: keep segments whose version satisfies a range
//! - **Project**: a table of contents of what is left
//!
//! ## Modules
//!
//! - [`document`]: Markdown parsing, heading slugs and ToC
//! - [`changelog`]: Version detection, segmentation and range filtering
//! - [`pipeline`]: End-to-end loading and the background loader
//! - [`resolve`]: Finding the changelog file of a package
//! - [`output`]: Text and JSON rendering
//! - [`config`]: Saved default flags
//! - [`watcher`]: File watching
//! - [`perf`]: Timing and debug logging

pub mod changelog;
pub mod config;
pub mod document;
pub mod output;
pub mod perf;
pub mod pipeline;
pub mod resolve;
pub mod watcher;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::changelog::{Segment, SegmentFilter, Segmentation, VersionRange, filter_segments};
    pub use crate::document::{MarkdownParser, Node, NodeKind, TocEntry};
    pub use crate::pipeline::{Loaded, Worker, load};
}
