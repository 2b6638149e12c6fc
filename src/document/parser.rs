//! Markdown parsing with comrak.
//!
//! comrak produces an arena-allocated AST; this module converts it into the
//! owned [`Node`] tree the rest of the crate works with.

use std::collections::HashMap;
use std::sync::LazyLock;

use comrak::nodes::{AstNode, ListType, NodeValue, Sourcepos, TableAlignment};
use comrak::{Arena, Options, parse_document};
use regex::Regex;

use super::types::{Align, Node, NodeKind, Position, ReferenceKind};

/// Link reference definition on its own line, e.g. `[1.0.0]: https://example.com "Title"`.
static DEFINITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^ {0,3}\[((?:[^\]\\]|\\.)+)\]:[ \t]*<?([^\s>]+)>?(?:[ \t]+(?:"([^"]*)"|'([^']*)'|\(([^)]*)\)))?[ \t]*$"#,
    )
    .expect("definition pattern compiles")
});

/// GFM extensions the parser enables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extensions {
    pub tables: bool,
    pub strikethrough: bool,
    pub tasklist: bool,
    pub autolink: bool,
}

impl Default for Extensions {
    fn default() -> Self {
        Self {
            tables: true,
            strikethrough: true,
            tasklist: true,
            autolink: true,
        }
    }
}

/// A configured markdown parser.
///
/// Parsing never fails: malformed constructs degrade to the closest node
/// kind comrak recognises (an unterminated fence runs to end of input).
///
/// # Example
///
/// ```
/// use changelogs::document::{MarkdownParser, NodeKind};
///
/// let root = MarkdownParser::new().parse("# Hello\n\nWorld");
/// assert!(matches!(root.children[0].kind, NodeKind::Heading { depth: 1, .. }));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MarkdownParser {
    extensions: Extensions,
}

impl MarkdownParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_extensions(extensions: Extensions) -> Self {
        Self { extensions }
    }

    /// Parse markdown source into a root node.
    pub fn parse(&self, source: &str) -> Node {
        let _scope = crate::perf::scope("document.parse");
        let arena = Arena::new();

        let mut options = Options::default();
        options.extension.table = self.extensions.tables;
        options.extension.strikethrough = self.extensions.strikethrough;
        options.extension.tasklist = self.extensions.tasklist;
        options.extension.autolink = self.extensions.autolink;

        let root = parse_document(&arena, source, &options);
        let lines = super::source_lines(source);
        let definitions = scan_definitions(&lines, root);
        let converter = Converter {
            lines: &lines,
            labels: definitions
                .iter()
                .filter_map(|def| match &def.kind {
                    NodeKind::Definition {
                        identifier, url, ..
                    } => Some((identifier.clone(), url.clone())),
                    _ => None,
                })
                .collect(),
        };

        let mut tree = converter
            .convert(root)
            .into_iter()
            .find(Node::is_root)
            .unwrap_or_else(Node::root);
        insert_by_position(&mut tree.children, definitions);
        tracing::trace!(
            blocks = tree.children.len(),
            bytes = source.len(),
            "parsed markdown"
        );
        tree
    }
}

/// Parse markdown source with the default extensions.
pub fn parse(source: &str) -> Node {
    MarkdownParser::new().parse(source)
}

struct Converter<'s> {
    lines: &'s [&'s str],
    /// Definition identifier -> url.
    labels: HashMap<String, String>,
}

impl Converter<'_> {
    fn convert<'a>(&self, node: &'a AstNode<'a>) -> Vec<Node> {
        let (kind, position) = {
            let ast = node.data.borrow();
            let position = position_of(ast.sourcepos.start.line, ast.sourcepos.end.line);
            (self.convert_value(node, &ast.value, &ast.sourcepos), position)
        };

        // Constructs without a counterpart (footnotes, front matter,
        // description lists) contribute only their children.
        let Some(kind) = kind else {
            return node.children().flat_map(|child| self.convert(child)).collect();
        };

        // Alt text lives on the image node, not in children.
        if matches!(kind, NodeKind::Image { .. } | NodeKind::ImageReference { .. }) {
            return vec![Node::new(kind).at(position)];
        }

        let mut children: Vec<Node> = node.children().flat_map(|child| self.convert(child)).collect();
        merge_adjacent_text(&mut children);
        if let NodeKind::List { spread, .. } = kind {
            for item in &mut children {
                if let NodeKind::ListItem { spread: item_spread, .. } = &mut item.kind {
                    *item_spread = spread;
                }
            }
        }

        vec![Node {
            kind,
            children,
            position,
        }]
    }

    fn convert_value<'a>(
        &self,
        node: &'a AstNode<'a>,
        value: &NodeValue,
        sourcepos: &Sourcepos,
    ) -> Option<NodeKind> {
        let kind = match value {
            NodeValue::Document => NodeKind::Root,
            NodeValue::Heading(heading) => NodeKind::Heading {
                depth: heading.level.clamp(1, 6),
                id: None,
            },
            NodeValue::Paragraph => NodeKind::Paragraph,
            NodeValue::Text(text) => NodeKind::Text {
                value: text.to_string(),
            },
            NodeValue::SoftBreak => NodeKind::Text {
                value: "\n".to_string(),
            },
            NodeValue::LineBreak => NodeKind::Break,
            NodeValue::List(list) => {
                let ordered = matches!(list.list_type, ListType::Ordered);
                NodeKind::List {
                    ordered,
                    start: ordered.then_some(list.start),
                    spread: !list.tight,
                }
            }
            NodeValue::Item(_) => NodeKind::ListItem {
                spread: false,
                checked: None,
            },
            NodeValue::TaskItem(symbol) => NodeKind::ListItem {
                spread: false,
                checked: Some(symbol.is_some()),
            },
            NodeValue::CodeBlock(code_block) => {
                let (lang, meta) = split_info(&code_block.info);
                let literal = code_block.literal.as_str();
                NodeKind::Code {
                    lang,
                    meta,
                    value: literal.strip_suffix('\n').unwrap_or(literal).to_string(),
                }
            }
            NodeValue::Code(code) => NodeKind::InlineCode {
                value: code.literal.clone(),
            },
            NodeValue::Link(link) => {
                let label_text = plain_text(node);
                match self.reference_for(sourcepos, &label_text, &link.url) {
                    Some((reference, label)) => NodeKind::LinkReference {
                        identifier: normalize_label(&label),
                        label,
                        reference,
                        url: link.url.clone(),
                    },
                    None => NodeKind::Link {
                        url: link.url.clone(),
                        title: non_empty(&link.title),
                    },
                }
            }
            NodeValue::Image(image) => {
                let alt = plain_text(node);
                match self.reference_for(sourcepos, &alt, &image.url) {
                    Some((reference, label)) => NodeKind::ImageReference {
                        identifier: normalize_label(&label),
                        label,
                        reference,
                        url: image.url.clone(),
                        alt,
                    },
                    None => NodeKind::Image {
                        url: image.url.clone(),
                        title: non_empty(&image.title),
                        alt,
                    },
                }
            }
            NodeValue::Table(table) => NodeKind::Table {
                align: table.alignments.iter().map(convert_alignment).collect(),
            },
            NodeValue::TableRow(header) => NodeKind::TableRow { header: *header },
            NodeValue::TableCell => NodeKind::TableCell,
            NodeValue::BlockQuote => NodeKind::Blockquote,
            NodeValue::ThematicBreak => NodeKind::ThematicBreak,
            NodeValue::Strong => NodeKind::Strong,
            NodeValue::Emph => NodeKind::Emphasis,
            NodeValue::Strikethrough => NodeKind::Delete,
            NodeValue::HtmlBlock(html) => NodeKind::Html {
                value: html.literal.trim_end_matches('\n').to_string(),
            },
            NodeValue::HtmlInline(html) => NodeKind::Html {
                value: html.to_string(),
            },
            _ => return None,
        };
        Some(kind)
    }

    /// Decide whether a link or image was written reference-style.
    ///
    /// Returns the reference kind and the label it names.
    fn reference_for(
        &self,
        sourcepos: &Sourcepos,
        text: &str,
        url: &str,
    ) -> Option<(ReferenceKind, String)> {
        if let Some(raw) = self.raw_inline(sourcepos) {
            return classify_reference(raw, text);
        }
        // No usable source span: fall back to matching the text against a definition.
        let identifier = normalize_label(text);
        self.labels
            .get(&identifier)
            .filter(|defined| defined.as_str() == url)
            .map(|_| (ReferenceKind::Shortcut, text.to_string()))
    }

    fn raw_inline(&self, sourcepos: &Sourcepos) -> Option<&str> {
        let (start, end) = (sourcepos.start, sourcepos.end);
        if start.line == 0 || start.line != end.line || end.column < start.column {
            return None;
        }
        let line = self.lines.get(start.line - 1)?;
        line.get(start.column.checked_sub(1)?..end.column)
    }
}

fn classify_reference(raw: &str, text: &str) -> Option<(ReferenceKind, String)> {
    let raw = raw.strip_prefix('!').unwrap_or(raw);
    if !raw.starts_with('[') || !raw.ends_with(']') {
        return None;
    }
    if raw.ends_with("[]") {
        return Some((ReferenceKind::Collapsed, text.to_string()));
    }
    let inner = &raw[..raw.len() - 1];
    if let Some(idx) = inner.rfind("][") {
        return Some((ReferenceKind::Full, inner[idx + 2..].to_string()));
    }
    Some((ReferenceKind::Shortcut, text.to_string()))
}

/// Recover the link reference definitions comrak consumes.
///
/// Only lines outside every top-level block, or leading a top-level
/// paragraph, are considered. Definitions nested in containers are not
/// recovered.
fn scan_definitions<'a>(lines: &[&str], root: &'a AstNode<'a>) -> Vec<Node> {
    let mut covered = vec![false; lines.len()];
    for child in root.children() {
        let ast = child.data.borrow();
        let pos = ast.sourcepos;
        if pos.start.line == 0 {
            continue;
        }
        // Definitions directly followed by paragraph text stay inside the
        // paragraph's span.
        let mut first = pos.start.line;
        if matches!(ast.value, NodeValue::Paragraph) {
            while first <= pos.end.line
                && lines
                    .get(first - 1)
                    .is_some_and(|line| DEFINITION_RE.is_match(line))
            {
                first += 1;
            }
        }
        for line in first..=pos.end.line.min(lines.len()) {
            if let Some(slot) = covered.get_mut(line - 1) {
                *slot = true;
            }
        }
    }

    lines
        .iter()
        .enumerate()
        .filter(|(idx, _)| !covered[*idx])
        .filter_map(|(idx, line)| {
            let caps = DEFINITION_RE.captures(line)?;
            let label = caps.get(1)?.as_str().to_string();
            let url = caps.get(2)?.as_str().to_string();
            let title = caps
                .get(3)
                .or_else(|| caps.get(4))
                .or_else(|| caps.get(5))
                .map(|m| m.as_str().to_string());
            Some(
                Node::new(NodeKind::Definition {
                    identifier: normalize_label(&label),
                    label,
                    url,
                    title,
                })
                .at(Some(Position::new(idx + 1, idx + 1))),
            )
        })
        .collect()
}

fn insert_by_position(children: &mut Vec<Node>, extra: Vec<Node>) {
    for node in extra {
        let line = node.position.map_or(usize::MAX, |p| p.start_line);
        let at = children
            .iter()
            .position(|child| child.position.is_some_and(|p| p.end_line >= line))
            .unwrap_or(children.len());
        children.insert(at, node);
    }
}

fn merge_adjacent_text(children: &mut Vec<Node>) {
    let mut merged: Vec<Node> = Vec::with_capacity(children.len());
    for child in children.drain(..) {
        if let (Some(last), NodeKind::Text { value }) = (merged.last_mut(), &child.kind)
            && let NodeKind::Text { value: prev } = &mut last.kind
        {
            prev.push_str(value);
            if let (Some(a), Some(b)) = (last.position, child.position) {
                last.position = Some(Position::new(a.start_line, b.end_line.max(a.end_line)));
            }
            continue;
        }
        merged.push(child);
    }
    *children = merged;
}

fn plain_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut text = String::new();
    plain_text_recursive(node, &mut text);
    text
}

fn plain_text_recursive<'a>(node: &'a AstNode<'a>, text: &mut String) {
    match &node.data.borrow().value {
        NodeValue::Text(t) => text.push_str(t),
        NodeValue::Code(c) => text.push_str(&c.literal),
        NodeValue::SoftBreak | NodeValue::LineBreak => text.push(' '),
        _ => {
            for child in node.children() {
                plain_text_recursive(child, text);
            }
        }
    }
}

fn split_info(info: &str) -> (Option<String>, Option<String>) {
    let info = info.trim();
    match info.split_once(char::is_whitespace) {
        Some((lang, meta)) => (non_empty(lang), non_empty(meta.trim())),
        None => (non_empty(info), None),
    }
}

/// Case-fold and collapse whitespace, as reference matching does.
fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

const fn position_of(start_line: usize, end_line: usize) -> Option<Position> {
    if start_line == 0 {
        None
    } else {
        Some(Position::new(start_line, end_line))
    }
}

const fn convert_alignment(alignment: &TableAlignment) -> Align {
    match alignment {
        TableAlignment::None => Align::None,
        TableAlignment::Left => Align::Left,
        TableAlignment::Center => Align::Center,
        TableAlignment::Right => Align::Right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(node: &Node) -> Vec<&NodeKind> {
        node.children.iter().map(|c| &c.kind).collect()
    }

    #[test]
    fn test_parse_empty_document() {
        let root = parse("");
        assert!(root.is_root());
        assert!(root.children.is_empty());
    }

    #[test]
    fn test_parse_heading() {
        let root = parse("# Title");
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].heading_depth(), Some(1));
        assert_eq!(root.children[0].text(), "Title");
    }

    #[test]
    fn test_parse_multiple_headings() {
        let root = parse("# One\n\n## Two\n\n### Three\n\n###### Six");
        let depths: Vec<_> = root.children.iter().filter_map(Node::heading_depth).collect();
        assert_eq!(depths, vec![1, 2, 3, 6]);
    }

    #[test]
    fn test_heading_positions_are_source_lines() {
        let root = parse("# First\n\nParagraph\n\n## Second");
        assert_eq!(root.children[0].position, Some(Position::new(1, 1)));
        assert_eq!(root.children[1].position, Some(Position::new(3, 3)));
        assert_eq!(root.children[2].position, Some(Position::new(5, 5)));
    }

    #[test]
    fn test_parse_fenced_code_captures_language_and_meta() {
        let root = parse("```rust title=main\nfn main() {}\n```");
        assert_eq!(
            root.children[0].kind,
            NodeKind::Code {
                lang: Some("rust".to_string()),
                meta: Some("title=main".to_string()),
                value: "fn main() {}".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_indented_code() {
        let root = parse("Intro\n\n    let x = 1;\n");
        assert!(matches!(
            &root.children[1].kind,
            NodeKind::Code { lang: None, value, .. } if value == "let x = 1;"
        ));
    }

    #[test]
    fn test_unterminated_fence_runs_to_end() {
        let root = parse("```js\nconst a = 1;\n\n# not a heading");
        assert_eq!(root.children.len(), 1);
        match &root.children[0].kind {
            NodeKind::Code { value, .. } => assert!(value.contains("# not a heading")),
            other => panic!("expected code, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_tight_and_loose_lists() {
        let tight = parse("- a\n- b");
        assert!(matches!(
            tight.children[0].kind,
            NodeKind::List { ordered: false, spread: false, .. }
        ));
        let loose = parse("1. a\n\n2. b");
        assert!(matches!(
            loose.children[0].kind,
            NodeKind::List { ordered: true, start: Some(1), spread: true }
        ));
        assert!(matches!(
            loose.children[0].children[0].kind,
            NodeKind::ListItem { spread: true, .. }
        ));
    }

    #[test]
    fn test_parse_task_items() {
        let root = parse("- [x] done\n- [ ] todo");
        let items = &root.children[0].children;
        assert!(matches!(items[0].kind, NodeKind::ListItem { checked: Some(true), .. }));
        assert!(matches!(items[1].kind, NodeKind::ListItem { checked: Some(false), .. }));
    }

    #[test]
    fn test_parse_inline_markup() {
        let root = parse("Some *emph* and **strong** and ~~gone~~ and `code`");
        let para = &root.children[0];
        let inline = kinds(para);
        assert!(inline.contains(&&NodeKind::Emphasis));
        assert!(inline.contains(&&NodeKind::Strong));
        assert!(inline.contains(&&NodeKind::Delete));
        assert!(inline.contains(&&NodeKind::InlineCode {
            value: "code".to_string()
        }));
        assert_eq!(para.text(), "Some emph and strong and gone and code");
    }

    #[test]
    fn test_soft_breaks_merge_into_text() {
        let root = parse("line one\nline two");
        let para = &root.children[0];
        assert_eq!(para.children.len(), 1);
        assert_eq!(para.text(), "line one\nline two");
    }

    #[test]
    fn test_parse_inline_link_and_image() {
        let root = parse("[Click](https://example.com \"Go\") ![Alt](img.png)");
        let para = &root.children[0];
        assert_eq!(
            para.children[0].kind,
            NodeKind::Link {
                url: "https://example.com".to_string(),
                title: Some("Go".to_string()),
            }
        );
        assert!(para.children.iter().any(|c| c.kind
            == NodeKind::Image {
                url: "img.png".to_string(),
                title: None,
                alt: "Alt".to_string(),
            }));
    }

    #[test]
    fn test_parse_reference_links_and_definitions() {
        let md = "See [the notes][notes] and [1.0.0].\n\n[notes]: https://example.com/notes\n[1.0.0]: https://example.com/v1 \"One\"\n";
        let root = parse(md);
        let para = &root.children[0];
        let refs: Vec<_> = para
            .children
            .iter()
            .filter_map(|c| match &c.kind {
                NodeKind::LinkReference {
                    identifier,
                    reference,
                    url,
                    ..
                } => Some((identifier.as_str(), *reference, url.as_str())),
                _ => None,
            })
            .collect();
        assert_eq!(
            refs,
            vec![
                ("notes", ReferenceKind::Full, "https://example.com/notes"),
                ("1.0.0", ReferenceKind::Shortcut, "https://example.com/v1"),
            ]
        );

        let defs: Vec<_> = root
            .children
            .iter()
            .filter_map(|c| match &c.kind {
                NodeKind::Definition {
                    identifier, title, ..
                } => Some((identifier.as_str(), title.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(
            defs,
            vec![("notes", None), ("1.0.0", Some("One".to_string()))]
        );
    }

    #[test]
    fn test_definitions_keep_document_order() {
        let md = "# Top\n\n[a]: https://a.example\n\nText [a]\n";
        let root = parse(md);
        assert!(matches!(root.children[0].kind, NodeKind::Heading { .. }));
        assert!(matches!(root.children[1].kind, NodeKind::Definition { .. }));
        assert!(matches!(root.children[2].kind, NodeKind::Paragraph));
    }

    #[test]
    fn test_definition_directly_before_paragraph_text() {
        let md = "# 1.0.0\n\n[a]: https://a.example\nsome text [a]\n\n# 0.9.0\n\nold\n";
        let root = parse(md);
        let kinds: Vec<_> = root.children.iter().map(|c| &c.kind).collect();
        assert!(matches!(kinds[0], NodeKind::Heading { .. }));
        assert_eq!(
            kinds[1],
            &NodeKind::Definition {
                identifier: "a".to_string(),
                label: "a".to_string(),
                url: "https://a.example".to_string(),
                title: None,
            }
        );
        assert_eq!(root.children[1].position, Some(Position::new(3, 3)));
        assert_eq!(kinds[2], &NodeKind::Paragraph);
        assert_eq!(root.children[2].text(), "some text a");
        assert!(matches!(kinds[3], NodeKind::Heading { .. }));

        let two = parse("[a]: https://a.example\n[b]: https://b.example\ntext [a] [b]\n");
        let labels: Vec<_> = two
            .children
            .iter()
            .filter_map(|c| match &c.kind {
                NodeKind::Definition { label, .. } => Some(label.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(labels, vec!["a", "b"]);
        assert_eq!(two.children[2].kind, NodeKind::Paragraph);
    }

    #[test]
    fn test_lone_carriage_returns_keep_line_numbers() {
        let root = parse("# One\r\rtext\r\r## Two\r");
        assert_eq!(root.children[2].position, Some(Position::new(5, 5)));
    }

    #[test]
    fn test_parse_blockquote_and_thematic_break() {
        let root = parse("> quoted\n\n---\n");
        assert_eq!(root.children[0].kind, NodeKind::Blockquote);
        assert_eq!(root.children[0].text(), "quoted");
        assert_eq!(root.children[1].kind, NodeKind::ThematicBreak);
    }

    #[test]
    fn test_parse_table_alignment() {
        let md = "| a | b | c |\n|:--|:-:|--:|\n| 1 | 2 | 3 |";
        let root = parse(md);
        let table = &root.children[0];
        assert_eq!(
            table.kind,
            NodeKind::Table {
                align: vec![Align::Left, Align::Center, Align::Right]
            }
        );
        assert_eq!(table.children[0].kind, NodeKind::TableRow { header: true });
        assert_eq!(table.children[1].kind, NodeKind::TableRow { header: false });
        assert_eq!(table.children[1].children[2].text(), "3");
    }

    #[test]
    fn test_parse_html_block() {
        let root = parse("<details>\n<summary>More</summary>\n</details>\n");
        assert!(matches!(&root.children[0].kind, NodeKind::Html { value } if value.starts_with("<details>")));
    }

    #[test]
    fn test_parser_without_tables_keeps_pipes_as_text() {
        let parser = MarkdownParser::with_extensions(Extensions {
            tables: false,
            ..Extensions::default()
        });
        let root = parser.parse("| a |\n|---|\n| 1 |");
        assert_eq!(root.children[0].kind, NodeKind::Paragraph);
    }

    #[test]
    fn test_classify_reference_forms() {
        assert_eq!(classify_reference("[a](http://x)", "a"), None);
        assert_eq!(classify_reference("<http://x>", "http://x"), None);
        assert_eq!(
            classify_reference("[a][]", "a"),
            Some((ReferenceKind::Collapsed, "a".to_string()))
        );
        assert_eq!(
            classify_reference("![logo][img]", "logo"),
            Some((ReferenceKind::Full, "img".to_string()))
        );
        assert_eq!(
            classify_reference("[a]", "a"),
            Some((ReferenceKind::Shortcut, "a".to_string()))
        );
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn parse_never_panics_and_yields_root(source in "\\PC{0,400}") {
                let root = parse(&source);
                prop_assert!(root.is_root());
            }

            #[test]
            fn paragraph_text_survives_parsing(words in prop::collection::vec("[a-z]{1,8}", 1..20)) {
                let source = words.join(" ");
                let root = parse(&source);
                prop_assert_eq!(root.text(), source);
            }
        }
    }
}
