//! Core document types.

use serde::Serialize;

/// Source line span of a node (1-based, inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub start_line: usize,
    pub end_line: usize,
}

impl Position {
    pub const fn new(start_line: usize, end_line: usize) -> Self {
        Self {
            start_line,
            end_line,
        }
    }
}

/// Column alignment of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    None,
    Left,
    Center,
    Right,
}

/// How a reference-style link or image names its definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    /// `[text][label]`
    Full,
    /// `[label][]`
    Collapsed,
    /// `[label]`
    Shortcut,
}

/// Kind-specific data of a document node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodeKind {
    Root,
    Heading {
        depth: u8,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    Paragraph,
    Text {
        value: String,
    },
    List {
        ordered: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        start: Option<usize>,
        /// Loose list (blank lines between items).
        spread: bool,
    },
    ListItem {
        spread: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        checked: Option<bool>,
    },
    Code {
        #[serde(skip_serializing_if = "Option::is_none")]
        lang: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        meta: Option<String>,
        value: String,
    },
    InlineCode {
        value: String,
    },
    Link {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    Image {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        alt: String,
    },
    Table {
        align: Vec<Align>,
    },
    TableRow {
        header: bool,
    },
    TableCell,
    Blockquote,
    ThematicBreak,
    Strong,
    Emphasis,
    Delete,
    Definition {
        identifier: String,
        label: String,
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    LinkReference {
        identifier: String,
        label: String,
        reference: ReferenceKind,
        url: String,
    },
    ImageReference {
        identifier: String,
        label: String,
        reference: ReferenceKind,
        url: String,
        alt: String,
    },
    Html {
        value: String,
    },
    Break,
}

/// A node of the parsed markdown tree.
///
/// Container nodes own their children; the tree never shares nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    #[serde(flatten)]
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Self>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl Node {
    pub const fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
            position: None,
        }
    }

    pub fn with_children(kind: NodeKind, children: Vec<Self>) -> Self {
        Self {
            kind,
            children,
            position: None,
        }
    }

    /// An empty root, as produced for empty input.
    pub const fn root() -> Self {
        Self::new(NodeKind::Root)
    }

    pub fn text_node(value: impl Into<String>) -> Self {
        Self::new(NodeKind::Text {
            value: value.into(),
        })
    }

    #[must_use]
    pub const fn at(mut self, position: Option<Position>) -> Self {
        self.position = position;
        self
    }

    pub const fn is_root(&self) -> bool {
        matches!(self.kind, NodeKind::Root)
    }

    /// Heading depth, if this node is a heading.
    pub const fn heading_depth(&self) -> Option<u8> {
        match self.kind {
            NodeKind::Heading { depth, .. } => Some(depth),
            _ => None,
        }
    }

    /// Assigned heading id, if this node is a slugged heading.
    pub fn heading_id(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Heading { id, .. } => id.as_deref(),
            _ => None,
        }
    }

    /// Flattened human-readable text of this node and its descendants.
    ///
    /// Markup is dropped; text, code values and image alt text are kept.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Depth-first pre-order walk over this node and its descendants.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Self)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    /// Mutable pre-order walk.
    pub fn walk_mut(&mut self, visit: &mut impl FnMut(&mut Self)) {
        visit(self);
        for child in &mut self.children {
            child.walk_mut(visit);
        }
    }

    /// All headings in document order, at any nesting depth.
    pub fn headings(&self) -> Vec<&Self> {
        let mut headings = Vec::new();
        self.walk(&mut |node| {
            if node.heading_depth().is_some() {
                headings.push(node);
            }
        });
        headings
    }
}

fn collect_text(node: &Node, out: &mut String) {
    match &node.kind {
        NodeKind::Text { value } | NodeKind::InlineCode { value } | NodeKind::Code { value, .. } => {
            out.push_str(value);
        }
        NodeKind::Image { alt, .. } | NodeKind::ImageReference { alt, .. } => out.push_str(alt),
        _ => {
            for child in &node.children {
                collect_text(child, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_flattens_markup() {
        let heading = Node::with_children(
            NodeKind::Heading { depth: 2, id: None },
            vec![
                Node::text_node("Fix "),
                Node::with_children(NodeKind::Strong, vec![Node::text_node("bold")]),
                Node::text_node(" in "),
                Node::new(NodeKind::InlineCode {
                    value: "parse()".to_string(),
                }),
            ],
        );
        assert_eq!(heading.text(), "Fix bold in parse()");
    }

    #[test]
    fn test_text_uses_image_alt() {
        let para = Node::with_children(
            NodeKind::Paragraph,
            vec![Node::new(NodeKind::Image {
                url: "logo.png".to_string(),
                title: None,
                alt: "Logo".to_string(),
            })],
        );
        assert_eq!(para.text(), "Logo");
    }

    #[test]
    fn test_headings_finds_nested_headings_in_order() {
        let root = Node::with_children(
            NodeKind::Root,
            vec![
                Node::with_children(
                    NodeKind::Heading { depth: 1, id: None },
                    vec![Node::text_node("A")],
                ),
                Node::with_children(
                    NodeKind::Blockquote,
                    vec![Node::with_children(
                        NodeKind::Heading { depth: 3, id: None },
                        vec![Node::text_node("B")],
                    )],
                ),
            ],
        );
        let texts: Vec<_> = root.headings().iter().map(|h| h.text()).collect();
        assert_eq!(texts, vec!["A", "B"]);
    }

    #[test]
    fn test_serializes_with_type_tag() {
        let node = Node::with_children(
            NodeKind::Heading {
                depth: 2,
                id: Some("intro".to_string()),
            },
            vec![Node::text_node("Intro")],
        );
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "heading");
        assert_eq!(json["depth"], 2);
        assert_eq!(json["id"], "intro");
        assert_eq!(json["children"][0]["type"], "text");
        assert_eq!(json["children"][0]["value"], "Intro");
    }
}
