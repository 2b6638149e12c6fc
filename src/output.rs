//! Rendering a loaded changelog for stdout.

use serde::Serialize;

use crate::changelog::Segment;
use crate::document::TocEntry;
use crate::pipeline::{FilterStatus, Loaded};

#[derive(clap::ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Which projection of the changelog to print.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum View {
    /// Markdown of the selected segments.
    #[default]
    Segments,
    Toc,
    Versions,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    pub view: View,
    pub format: OutputFormat,
    /// Print the preamble ahead of the segments.
    pub preamble: bool,
}

#[derive(Serialize)]
struct SegmentsJson<'a> {
    filter: &'a FilterStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    preamble: Option<&'a Segment>,
    segments: Vec<&'a Segment>,
}

/// Render `loaded` according to `options`. Text output ends with a newline
/// unless it is empty.
///
/// # Errors
/// Returns an error if JSON serialization fails.
pub fn render(loaded: &Loaded, options: RenderOptions) -> serde_json::Result<String> {
    let _scope = crate::perf::scope("output.render");
    match options.format {
        OutputFormat::Text => Ok(render_text(loaded, options)),
        OutputFormat::Json => render_json(loaded, options),
    }
}

fn render_text(loaded: &Loaded, options: RenderOptions) -> String {
    let lines = match options.view {
        View::Segments => {
            let preamble = loaded.preamble().filter(|_| options.preamble);
            preamble
                .into_iter()
                .chain(loaded.selected_segments())
                .map(|s| s.source.trim_end().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("\n\n")
        }
        View::Toc => toc_lines(&loaded.toc).join("\n"),
        View::Versions => versions(loaded).join("\n"),
    };
    if lines.is_empty() {
        lines
    } else {
        format!("{lines}\n")
    }
}

fn render_json(loaded: &Loaded, options: RenderOptions) -> serde_json::Result<String> {
    let mut out = match options.view {
        View::Segments => serde_json::to_string_pretty(&SegmentsJson {
            filter: &loaded.filter,
            preamble: loaded.preamble().filter(|_| options.preamble),
            segments: loaded.selected_segments(),
        })?,
        View::Toc => serde_json::to_string_pretty(&loaded.toc)?,
        View::Versions => serde_json::to_string_pretty(&versions(loaded))?,
    };
    out.push('\n');
    Ok(out)
}

/// Indented markdown link list, two spaces per level below the first.
pub fn toc_lines(entries: &[TocEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            let indent = "  ".repeat(usize::from(entry.level.saturating_sub(1)));
            format!("{indent}- [{}]({})", entry.text, entry.href())
        })
        .collect()
}

fn versions(loaded: &Loaded) -> Vec<String> {
    loaded
        .selected_segments()
        .iter()
        .filter_map(|s| s.version.as_ref().map(ToString::to_string))
        .collect()
}
