//! Comment-anchored dynamic node lists
//!
//! An anchor is a comment followed by zero or more sibling nodes whose
//! membership changes between renders. The anchor remembers which nodes it
//! placed last time, so updates touch only what changed and never reach
//! into nodes that belong to a neighbouring anchor.

use crate::error::RenderResult;
use crate::value::Value;
use std::collections::HashSet;
use stencil_dom::{Document, DomResult, NodeId};
use tracing::{trace, warn};

/// Nodes claimed by some anchor or host during the current render pass.
/// A node claimed by one owner is never detached by another that placed it
/// on an earlier pass.
pub type Claims = HashSet<NodeId>;

/// Where a reconciled list starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Directly after this node, inside its parent
    After(NodeId),
    /// At the start of this container
    Start(NodeId),
}

/// Replaces `previous` with `next` at `position`.
///
/// Nodes only in `previous` are detached unless another owner claimed them
/// this pass. Nodes in `next` are claimed and moved only when they are not
/// already at their target position. A detached anchor keeps its nodes
/// detached; whoever places the anchor places them too.
pub fn reconcile(
    document: &mut Document,
    position: Position,
    previous: &[NodeId],
    next: &[NodeId],
    claims: &mut Claims,
) -> DomResult<()> {
    let keep: HashSet<NodeId> = next.iter().copied().collect();
    for node in previous {
        if !keep.contains(node) && !claims.contains(node) && document.contains(*node) {
            document.remove(*node)?;
        }
    }

    let (parent, mut cursor) = match position {
        Position::After(anchor) => (document.parent(anchor), Some(anchor)),
        Position::Start(container) => (Some(container), None),
    };

    for &node in next {
        claims.insert(node);
        let Some(parent) = parent else {
            if document.parent(node).is_some() {
                document.remove(node)?;
            }
            continue;
        };
        let reference = match cursor {
            Some(cursor) => document.next_sibling(cursor),
            None => document.first_child(parent),
        };
        if reference != Some(node) {
            document.insert_before(parent, node, reference)?;
        }
        cursor = Some(node);
    }
    Ok(())
}

/// Previously parsed markup string and the nodes it produced
#[derive(Debug, Clone)]
struct Parsed {
    key: MarkupKey,
    nodes: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MarkupKey {
    Markup(String),
    Text(String),
}

/// Bookkeeping for one anchor of a bound instance
#[derive(Debug, Clone)]
pub struct AnchorState {
    comment: NodeId,
    current: Vec<NodeId>,
    parsed: Vec<Parsed>,
}

impl AnchorState {
    pub fn new(comment: NodeId) -> Self {
        Self {
            comment,
            current: Vec::new(),
            parsed: Vec::new(),
        }
    }

    pub fn comment(&self) -> NodeId {
        self.comment
    }

    /// Nodes currently placed after the comment
    pub fn nodes(&self) -> &[NodeId] {
        &self.current
    }

    /// Normalizes `value` into a node list and reconciles it after the
    /// comment. Strings are parsed as markup once and reused while the same
    /// string keeps showing up; anything else becomes text.
    pub fn update(
        &mut self,
        document: &mut Document,
        value: Option<&Value>,
        claims: &mut Claims,
    ) -> RenderResult<()> {
        let mut items = Vec::new();
        if let Some(value) = value {
            flatten(value, &mut items);
        }

        let mut unused = std::mem::take(&mut self.parsed);
        let mut parsed = Vec::new();
        let mut next = Vec::new();

        for item in items {
            let key = match item {
                Value::Nodes(nodes) => {
                    next.extend(nodes.iter().copied());
                    continue;
                }
                Value::Null => continue,
                Value::Map(_) => {
                    warn!(anchor = %self.comment, "record without $template cannot be placed at an anchor");
                    continue;
                }
                Value::String(markup) => MarkupKey::Markup(markup.clone()),
                other => MarkupKey::Text(other.to_text()),
            };

            let nodes = match unused.iter().position(|entry| entry.key == key) {
                Some(index) => unused.remove(index).nodes,
                None => materialize(document, &key)?,
            };
            next.extend(nodes.iter().copied());
            parsed.push(Parsed { key, nodes });
        }

        reconcile(
            document,
            Position::After(self.comment),
            &self.current,
            &next,
            claims,
        )?;

        for entry in unused {
            for node in entry.nodes {
                if document.contains(node) && !claims.contains(&node) {
                    document.discard(node)?;
                }
            }
        }

        trace!(anchor = %self.comment, nodes = next.len(), "updated anchor");
        self.current = next;
        self.parsed = parsed;
        Ok(())
    }
}

fn flatten<'a>(value: &'a Value, items: &mut Vec<&'a Value>) {
    let mut stack = vec![value];
    while let Some(value) = stack.pop() {
        match value {
            Value::List(list) => stack.extend(list.iter().rev()),
            other => items.push(other),
        }
    }
}

/// Detached nodes for a string item. Markup that fails to parse is shown
/// as text instead of failing the render halfway through.
fn materialize(document: &mut Document, key: &MarkupKey) -> RenderResult<Vec<NodeId>> {
    match key {
        MarkupKey::Text(text) => Ok(vec![document.create_text(text.clone())]),
        MarkupKey::Markup(markup) => match document.parse_fragment(markup) {
            Ok(fragment) => {
                let nodes: Vec<NodeId> = document.children(fragment).collect();
                for node in &nodes {
                    document.remove(*node)?;
                }
                document.discard(fragment)?;
                Ok(nodes)
            }
            Err(error) => {
                warn!(%error, "markup at anchor failed to parse, inserting it as text");
                Ok(vec![document.create_text(markup.clone())])
            }
        },
    }
}
