use std::collections::HashSet;

use changelogs::changelog::{Segment, filter_segments, segment};
use changelogs::document::{NodeKind, Slugger, assign_heading_ids, parse, parse_with_ids, toc};
use changelogs::output::{self, OutputFormat, RenderOptions, View};
use changelogs::pipeline::{FilterStatus, load};

const FIXTURE: &str = include_str!("fixtures/changelog.md");
const THREE: &str = "## 1.2.3\n\nalpha words\n\n## 1.3.0\n\nbravo words\n\n## 2.0.0\n\ncharlie words\n";

fn versions(segments: &[&Segment]) -> Vec<String> {
    segments
        .iter()
        .filter_map(|s| s.version.as_ref().map(ToString::to_string))
        .collect()
}

#[test]
fn test_flattened_text_keeps_readable_content() {
    let md = "# Release notes\n\nThe **new** parser handles `code`, _emphasis_ and [links](https://example.com).\n\n> Quoted line\n";
    let root = parse(md);
    let mut words = Vec::new();
    root.walk(&mut |node| {
        if let NodeKind::Text { value } | NodeKind::InlineCode { value } = &node.kind {
            words.extend(value.split_whitespace().map(ToString::to_string));
        }
    });
    let expected: Vec<String> = "Release notes The new parser handles code , emphasis and links . Quoted line"
        .split_whitespace()
        .map(ToString::to_string)
        .collect();
    assert_eq!(words, expected);
}

#[test]
fn test_heading_ids_are_unique() {
    let root = parse_with_ids(FIXTURE);
    let ids: Vec<_> = root
        .headings()
        .iter()
        .map(|h| h.heading_id().unwrap().to_string())
        .collect();
    let unique: HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len(), "duplicate ids in {ids:?}");
    assert!(ids.contains(&"added".to_string()));
    assert!(ids.contains(&"added-1".to_string()));
    assert!(ids.contains(&"fixed-1".to_string()));
}

#[test]
fn test_three_versions_segment_in_order() {
    let seg = segment(&parse_with_ids(THREE), THREE);
    let segments: Vec<&Segment> = seg.segments().iter().collect();
    assert_eq!(versions(&segments), vec!["1.2.3", "1.3.0", "2.0.0"]);
    let owners = ["alpha", "bravo", "charlie"];
    for (segment, own) in segments.iter().zip(owners) {
        let text: String = segment.content.iter().map(|n| n.text() + " ").collect();
        for word in owners {
            assert_eq!(text.contains(word), word == own, "{word} in {own} segment");
        }
    }
}

#[test]
fn test_no_headings_is_unsegmented() {
    let md = "Version 4.5.6 fixes the build.\n\n- also 4.5.7 later\n";
    let seg = segment(&parse_with_ids(md), md);
    assert!(!seg.is_segmented());
    assert_eq!(seg.segments().len(), 1);
    assert!(seg.segments()[0].version.is_none());
}

#[test]
fn test_filter_lower_bound() {
    let seg = segment(&parse_with_ids(THREE), THREE);
    let kept = filter_segments(seg.segments(), ">=1.3.0");
    assert_eq!(versions(&kept), vec!["1.3.0", "2.0.0"]);
}

#[test]
fn test_filter_fails_open() {
    let seg = segment(&parse_with_ids(THREE), THREE);
    assert_eq!(filter_segments(seg.segments(), "not a valid range").len(), 3);
    assert_eq!(filter_segments(seg.segments(), "").len(), 3);
}

#[test]
fn test_toc_depths_and_ids() {
    let md = "# One\n\n## Two\n\n### Three\n\n#### Four\n";
    let entries = toc(&parse_with_ids(md));
    assert_eq!(entries.len(), 3);

    let mut slugger = Slugger::new();
    for (entry, text) in entries.iter().zip(["One", "Two", "Three"]) {
        assert_eq!(entry.text, text);
        assert_eq!(entry.id, slugger.slug(text));
    }
}

#[test]
fn test_slugging_is_idempotent() {
    let mut first = parse(FIXTURE);
    assign_heading_ids(&mut first);
    let mut second = first.clone();
    assign_heading_ids(&mut second);
    assert_eq!(first, second);
    assert_eq!(parse_with_ids(FIXTURE), first);
}

#[test]
fn test_fixture_versions_and_preamble() {
    let loaded = load(FIXTURE, "");
    assert_eq!(
        versions(&loaded.selected_segments()),
        vec!["2.0.0", "2.0.0-rc.1", "1.3.0", "1.2.3", "1.0.0"]
    );
    let preamble = loaded.preamble().unwrap();
    assert!(preamble.source.starts_with("# Changelog"));
    assert!(preamble.source.contains("## [Unreleased]"));
    assert!(!preamble.is_versioned());
}

#[test]
fn test_fixture_ambiguous_heading_stays_in_its_release() {
    let loaded = load(FIXTURE, "2.0.0");
    let kept = loaded.selected_segments();
    assert_eq!(versions(&kept), vec!["2.0.0"]);
    assert!(kept[0].source.contains("### Upgrading from 1.3.0 to 2.0.0"));
}

#[test]
fn test_fixture_prereleases_only_when_named() {
    let loaded = load(FIXTURE, ">=1.3.0");
    assert_eq!(versions(&loaded.selected_segments()), vec!["2.0.0", "1.3.0"]);

    let loaded = load(FIXTURE, ">=2.0.0-rc.0");
    assert_eq!(
        versions(&loaded.selected_segments()),
        vec!["2.0.0", "2.0.0-rc.1"]
    );
}

#[test]
fn test_fixture_or_and_hyphen_ranges() {
    let loaded = load(FIXTURE, "1.0.0 - 1.2.3 || ^2");
    assert_eq!(
        versions(&loaded.selected_segments()),
        vec!["2.0.0", "1.2.3", "1.0.0"]
    );
}

#[test]
fn test_fixture_invalid_filter_reports_status() {
    let loaded = load(FIXTURE, ">= banana");
    assert_eq!(loaded.selected.len(), 5);
    let FilterStatus::Invalid { expr, reason } = &loaded.filter else {
        panic!("expected invalid filter, got {:?}", loaded.filter);
    };
    assert_eq!(expr, ">= banana");
    assert!(reason.contains("banana"));
}

#[test]
fn test_fixture_toc_of_filtered_releases() {
    let loaded = load(FIXTURE, "^1.2");
    let options = RenderOptions {
        view: View::Toc,
        format: OutputFormat::Text,
        preamble: false,
    };
    let out = output::render(&loaded, options).unwrap();
    assert_eq!(
        out,
        "  - [v1.3.0 (2023-11-20)](#v130-2023-11-20)\n\
         \x20   - [Added](#added-1)\n\
         \x20   - [Fixed](#fixed)\n\
         \x20 - [1.2.3](#123)\n\
         \x20   - [Fixed](#fixed-1)\n"
    );
}

#[test]
fn test_fixture_json_round_trips_through_serde() {
    let loaded = load(FIXTURE, "<1.3.0");
    let options = RenderOptions {
        view: View::Segments,
        format: OutputFormat::Json,
        preamble: true,
    };
    let json: serde_json::Value =
        serde_json::from_str(&output::render(&loaded, options).unwrap()).unwrap();
    assert_eq!(json["filter"]["status"], "applied");
    assert_eq!(json["preamble"]["title"], "");
    let segments = json["segments"].as_array().unwrap();
    let found: Vec<_> = segments.iter().map(|s| s["version"].as_str().unwrap()).collect();
    assert_eq!(found, vec!["1.2.3", "1.0.0"]);
}
