//! Bound template instances

use crate::anchor::{AnchorState, Claims};
use crate::compiler::{Binding, BindingKind, Factory, LiveProperty};
use crate::error::{RenderError, RenderResult};
use crate::value::Value;
use std::collections::HashSet;
use std::sync::Arc;
use stencil_dom::{Document, NodeId, PropValue};
use tracing::trace;

/// A binding resolved against one instance's nodes
#[derive(Debug, Clone)]
enum Slot {
    Text(NodeId),
    TextareaValue(NodeId),
    Attribute { element: NodeId, name: String },
    Anchor(AnchorState),
}

/// Top-level node of an instance; anchors carry the index of their slot
#[derive(Debug, Clone, Copy)]
struct TopLevel {
    node: NodeId,
    anchor: Option<usize>,
}

/// A materialized copy of a factory's fragment with its bindings resolved
#[derive(Debug)]
pub struct Instance {
    factory: Arc<Factory>,
    fragment: NodeId,
    top_level: Vec<TopLevel>,
    slots: Vec<Slot>,
}

impl Instance {
    pub(crate) fn bind(
        document: &Document,
        factory: Arc<Factory>,
        fragment: NodeId,
    ) -> RenderResult<Self> {
        let mut slots = Vec::with_capacity(factory.bindings().len());
        for binding in factory.bindings() {
            slots.push(resolve(document, &factory, fragment, binding)?);
        }

        let top_level = document
            .children(fragment)
            .map(|node| TopLevel {
                node,
                anchor: slots
                    .iter()
                    .position(|slot| matches!(slot, Slot::Anchor(state) if state.comment() == node)),
            })
            .collect();

        Ok(Self {
            factory,
            fragment,
            top_level,
            slots,
        })
    }

    pub fn factory(&self) -> &Arc<Factory> {
        &self.factory
    }

    /// The instance's top-level nodes in order, each top-level anchor
    /// followed by the nodes it currently holds
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes = Vec::with_capacity(self.top_level.len());
        for top in &self.top_level {
            nodes.push(top.node);
            if let Some(Slot::Anchor(state)) = top.anchor.and_then(|index| self.slots.get(index)) {
                nodes.extend_from_slice(state.nodes());
            }
        }
        nodes
    }

    /// Applies `context` to every binding in document order. Binders write
    /// only when the new value differs from what the node holds.
    pub fn update(
        &mut self,
        document: &mut Document,
        context: &Value,
        claims: &mut Claims,
    ) -> RenderResult<()> {
        let factory = Arc::clone(&self.factory);
        for (index, (binding, slot)) in factory
            .bindings()
            .iter()
            .zip(self.slots.iter_mut())
            .enumerate()
        {
            match (&binding.kind, slot) {
                (BindingKind::Text { content }, Slot::Text(node)) => {
                    document.set_text(*node, content.render(context))?;
                }
                (BindingKind::TextareaValue { content }, Slot::TextareaValue(element)) => {
                    document.set_property(*element, "value", PropValue::Text(content.render(context)))?;
                }
                (
                    BindingKind::Attribute {
                        content, property, ..
                    },
                    Slot::Attribute { element, name },
                ) => {
                    let text = match content.whole() {
                        Some(expr) => {
                            let value = expr.evaluate(context);
                            match value.as_deref() {
                                Some(value) if value.is_present() => match value {
                                    Value::Bool(true) => Some(String::new()),
                                    other => Some(other.to_text()),
                                },
                                _ => None,
                            }
                        }
                        None => Some(content.render(context)),
                    };
                    write_attribute(document, *element, name, text, *property)?;
                }
                (BindingKind::Anchor { expr }, Slot::Anchor(state)) => {
                    let value = expr.evaluate(context);
                    state.update(document, value.as_deref(), claims)?;
                }
                _ => {
                    return Err(RenderError::SlotMismatch {
                        factory: factory.label().to_string(),
                        index,
                    })
                }
            }
        }
        trace!(factory = factory.label(), "updated instance");
        Ok(())
    }

    /// Frees the instance's nodes. Nodes below them that belong to
    /// `survivors` are detached first so live instances stay intact.
    pub fn discard(self, document: &mut Document, survivors: &HashSet<NodeId>) -> RenderResult<()> {
        for node in self.nodes() {
            if !document.contains(node) || survivors.contains(&node) {
                continue;
            }
            for rescued in outermost_survivors(document, node, survivors) {
                document.remove(rescued)?;
            }
            document.discard(node)?;
        }
        if document.contains(self.fragment) {
            document.discard(self.fragment)?;
        }
        Ok(())
    }
}

fn resolve(
    document: &Document,
    factory: &Factory,
    fragment: NodeId,
    binding: &Binding,
) -> RenderResult<Slot> {
    let mismatch = || RenderError::PathMismatch {
        factory: factory.label().to_string(),
        path: binding.path.clone(),
    };
    let node = binding.path.resolve(document, fragment).ok_or_else(mismatch)?;

    Ok(match &binding.kind {
        BindingKind::Text { .. } => Slot::Text(node),
        BindingKind::TextareaValue { .. } => {
            Slot::TextareaValue(document.parent(node).ok_or_else(mismatch)?)
        }
        BindingKind::Attribute { .. } => {
            let name = binding
                .path
                .attribute
                .and_then(|index| document.element(node)?.attributes.get(index))
                .map(|attribute| attribute.name.clone())
                .ok_or_else(mismatch)?;
            Slot::Attribute {
                element: node,
                name,
            }
        }
        BindingKind::Anchor { .. } => Slot::Anchor(AnchorState::new(node)),
    })
}

/// Sets or detaches the attribute, then pushes the live property.
/// `None` means absent.
fn write_attribute(
    document: &mut Document,
    element: NodeId,
    name: &str,
    text: Option<String>,
    property: Option<LiveProperty>,
) -> RenderResult<()> {
    match &text {
        Some(text) => document.set_attribute(element, name, text.as_str())?,
        None => document.remove_attribute(element, name)?,
    };

    if let Some(property) = property {
        let value = match property {
            LiveProperty::Value => PropValue::Text(text.unwrap_or_default()),
            LiveProperty::Checked | LiveProperty::Selected => PropValue::Flag(text.is_some()),
        };
        document.set_property(element, property.name(), value)?;
    }
    Ok(())
}

/// Survivor nodes inside `root` that are not themselves below another
/// survivor
fn outermost_survivors(
    document: &Document,
    root: NodeId,
    survivors: &HashSet<NodeId>,
) -> Vec<NodeId> {
    if survivors.is_empty() {
        return Vec::new();
    }
    document
        .descendants(root)
        .skip(1)
        .filter(|node| survivors.contains(node))
        .filter(|node| {
            let mut cursor = document.parent(*node);
            while let Some(ancestor) = cursor {
                if ancestor == root {
                    return true;
                }
                if survivors.contains(&ancestor) {
                    return false;
                }
                cursor = document.parent(ancestor);
            }
            true
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Template;
    use std::collections::BTreeMap;

    fn context(pairs: &[(&str, Value)]) -> Value {
        Value::Map(
            pairs
                .iter()
                .map(|(key, value)| (key.to_string(), value.clone()))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    #[test]
    fn test_nodes_follow_top_level_anchors() {
        let template = Template::compile("t", "<b>${a}</b><!--${list}--><i></i>").unwrap();
        let mut doc = Document::new();
        let mut instance = template.instantiate(&mut doc, template.root()).unwrap();

        let data = context(&[(
            "list",
            Value::List(vec![Value::from("<u>1</u>"), Value::from("<u>2</u>")]),
        )]);
        instance.update(&mut doc, &data, &mut Claims::new()).unwrap();

        let names: Vec<String> = instance
            .nodes()
            .into_iter()
            .map(|node| doc.kind(node).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["b", "#comment", "u", "u", "i"]);
    }

    #[test]
    fn test_embedded_attribute_is_always_present() {
        let template = Template::compile("t", r#"<a href="/users/${id}">x</a>"#).unwrap();
        let mut doc = Document::new();
        let mut instance = template.instantiate(&mut doc, template.root()).unwrap();
        let link = instance.nodes()[0];

        instance
            .update(&mut doc, &context(&[("id", Value::Number(7.0))]), &mut Claims::new())
            .unwrap();
        assert_eq!(doc.attribute(link, "href"), Some("/users/7"));

        instance
            .update(&mut doc, &context(&[]), &mut Claims::new())
            .unwrap();
        assert_eq!(doc.attribute(link, "href"), Some("/users/"));
    }

    #[test]
    fn test_discard_frees_nodes() {
        let template = Template::compile("t", "<p>${a}</p>").unwrap();
        let mut doc = Document::new();
        let instance = template.instantiate(&mut doc, template.root()).unwrap();
        let paragraph = instance.nodes()[0];

        instance.discard(&mut doc, &HashSet::new()).unwrap();
        assert!(!doc.contains(paragraph));
    }
}
