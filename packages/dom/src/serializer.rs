//! HTML serialization

use crate::document::Document;
use crate::node::{NodeId, NodeKind};

/// Serialization options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HtmlOptions {
    /// Emit comment nodes; anchors are comments, so user-visible markup
    /// leaves them out
    pub comments: bool,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        Self { comments: true }
    }
}

impl Document {
    /// Markup of the node itself; a fragment serializes as its children
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut output = String::new();
        write_node(self, id, HtmlOptions::default(), &mut output);
        output
    }

    /// Markup of the node's children
    pub fn inner_html(&self, id: NodeId) -> String {
        self.serialize_children(id, HtmlOptions::default())
    }

    /// Markup of the node's children without comments
    pub fn visible_html(&self, id: NodeId) -> String {
        self.serialize_children(id, HtmlOptions { comments: false })
    }

    pub fn serialize_children(&self, id: NodeId, options: HtmlOptions) -> String {
        let mut output = String::new();
        for child in self.children(id) {
            write_node(self, child, options, &mut output);
        }
        output
    }
}

fn write_node(document: &Document, id: NodeId, options: HtmlOptions, output: &mut String) {
    let Some(kind) = document.kind(id) else {
        return;
    };
    match kind {
        NodeKind::Text(text) => {
            let raw = document
                .parent(id)
                .and_then(|parent| document.tag(parent))
                .is_some_and(|tag| tag == "script" || tag == "style");
            if raw {
                output.push_str(text);
            } else {
                escape_text(text, output);
            }
        }
        NodeKind::Comment(text) => {
            if options.comments {
                output.push_str("<!--");
                output.push_str(text);
                output.push_str("-->");
            }
        }
        NodeKind::Fragment => {
            for child in document.children(id) {
                write_node(document, child, options, output);
            }
        }
        NodeKind::Element(element) => {
            output.push('<');
            output.push_str(&element.tag);
            for attribute in &element.attributes {
                output.push(' ');
                output.push_str(&attribute.name);
                output.push_str("=\"");
                escape_attribute(&attribute.value, output);
                output.push('"');
            }
            output.push('>');
            if element.is_void() {
                return;
            }
            for child in document.children(id) {
                write_node(document, child, options, output);
            }
            output.push_str("</");
            output.push_str(&element.tag);
            output.push('>');
        }
    }
}

fn escape_text(text: &str, output: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '\u{a0}' => output.push_str("&nbsp;"),
            _ => output.push(ch),
        }
    }
}

fn escape_attribute(value: &str, output: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => output.push_str("&amp;"),
            '"' => output.push_str("&quot;"),
            '\u{a0}' => output.push_str("&nbsp;"),
            _ => output.push(ch),
        }
    }
}
