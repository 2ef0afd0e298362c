//! Template compilation
//!
//! Compiling parses the markup once into a private prototype document,
//! extracts every `<template id>` into its own sub-template, and records a
//! [`Binding`] for each placeholder: a child-index path from the factory
//! root to the bound node plus what to do with it. Instances are stamped
//! out by deep-importing the factory's fragment and resolving those paths.

use crate::error::{CompileError, CompileResult, RenderError, RenderResult};
use crate::expression::{Interpolation, PathExpr};
use crate::instance::Instance;
use std::collections::BTreeMap;
use std::sync::Arc;
use stencil_dom::{Document, NodeId, NodeKind};
use tracing::{debug, instrument};

/// Child indices from a factory's fragment down to a bound node, plus the
/// attribute index when the binding targets an attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPath {
    pub nodes: Vec<usize>,
    pub attribute: Option<usize>,
}

impl CompiledPath {
    pub fn resolve(&self, document: &Document, root: NodeId) -> Option<NodeId> {
        self.nodes
            .iter()
            .try_fold(root, |node, index| document.child_at(node, *index))
    }
}

/// Element properties kept in step with their bound attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveProperty {
    Value,
    Checked,
    Selected,
}

impl LiveProperty {
    fn for_attribute(tag: &str, name: &str) -> Option<Self> {
        if !stencil_dom::is_interactive_element(tag) {
            return None;
        }
        match name {
            "value" => Some(LiveProperty::Value),
            "checked" => Some(LiveProperty::Checked),
            "selected" => Some(LiveProperty::Selected),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LiveProperty::Value => "value",
            LiveProperty::Checked => "checked",
            LiveProperty::Selected => "selected",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BindingKind {
    /// Text node content
    Text { content: Interpolation },
    /// Text inside a `<textarea>`, written to the element's value property
    TextareaValue { content: Interpolation },
    /// Attribute value. A whole-value placeholder toggles the attribute's
    /// presence; an embedded one always keeps it.
    Attribute {
        name: String,
        content: Interpolation,
        property: Option<LiveProperty>,
    },
    /// Comment anchor followed by a dynamic node list
    Anchor { expr: PathExpr },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub path: CompiledPath,
    pub kind: BindingKind,
}

/// Prototype fragment of one (sub-)template and its bindings
#[derive(Debug)]
pub struct Factory {
    name: Option<String>,
    fragment: NodeId,
    bindings: Vec<Binding>,
}

impl Factory {
    /// Sub-template id, `None` for the root fragment
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<root>")
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Walks the fragment once, depth first, recording a binding for every
    /// placeholder and clearing placeholder text from the prototype
    fn compile(
        document: &mut Document,
        fragment: NodeId,
        name: Option<String>,
    ) -> CompileResult<Self> {
        let mut bindings = Vec::new();
        let mut path = vec![0];
        let mut cursor = document.first_child(fragment);

        while let Some(node) = cursor {
            visit(document, node, &path, &mut bindings)?;

            if document.element(node).is_some() {
                if let Some(child) = document.first_child(node) {
                    path.push(0);
                    cursor = Some(child);
                    continue;
                }
            }

            cursor = None;
            let mut current = node;
            loop {
                if let Some(next) = document.next_sibling(current) {
                    if let Some(index) = path.last_mut() {
                        *index += 1;
                    }
                    cursor = Some(next);
                    break;
                }
                path.pop();
                match document.parent(current) {
                    Some(parent) if parent != fragment => current = parent,
                    _ => break,
                }
            }
        }

        Ok(Self {
            name,
            fragment,
            bindings,
        })
    }
}

fn visit(
    document: &mut Document,
    node: NodeId,
    path: &[usize],
    bindings: &mut Vec<Binding>,
) -> CompileResult<()> {
    let Some(kind) = document.kind(node) else {
        return Ok(());
    };

    match kind {
        NodeKind::Text(text) => {
            let Some(content) = Interpolation::parse(text)? else {
                return Ok(());
            };
            let in_textarea = document
                .parent(node)
                .and_then(|parent| document.tag(parent))
                .is_some_and(|tag| tag == "textarea");
            let kind = if in_textarea {
                BindingKind::TextareaValue { content }
            } else {
                BindingKind::Text { content }
            };
            bindings.push(Binding {
                path: CompiledPath {
                    nodes: path.to_vec(),
                    attribute: None,
                },
                kind,
            });
            document.set_text(node, "")?;
        }
        NodeKind::Comment(text) => {
            let body = text
                .trim()
                .strip_prefix("${")
                .and_then(|rest| rest.strip_suffix('}'))
                .filter(|body| !body.contains('}') && !body.contains("${"));
            let expr = body.map(PathExpr::parse).transpose()?;
            if let Some(expr) = expr {
                bindings.push(Binding {
                    path: CompiledPath {
                        nodes: path.to_vec(),
                        attribute: None,
                    },
                    kind: BindingKind::Anchor { expr },
                });
                document.set_text(node, "")?;
            }
        }
        NodeKind::Element(element) => {
            let tag = element.tag.clone();
            let attributes: Vec<(String, String)> = element
                .attributes
                .iter()
                .map(|attribute| (attribute.name.clone(), attribute.value.clone()))
                .collect();

            for (index, (name, value)) in attributes.into_iter().enumerate() {
                let Some(content) = Interpolation::parse(&value)? else {
                    continue;
                };
                bindings.push(Binding {
                    path: CompiledPath {
                        nodes: path.to_vec(),
                        attribute: Some(index),
                    },
                    kind: BindingKind::Attribute {
                        property: LiveProperty::for_attribute(&tag, &name),
                        name: name.clone(),
                        content,
                    },
                });
                document.set_attribute(node, &name, "")?;
            }
        }
        NodeKind::Fragment => {}
    }
    Ok(())
}

/// A compiled template: the root factory plus its named sub-templates
#[derive(Debug)]
pub struct Template {
    name: String,
    prototype: Document,
    root: Arc<Factory>,
    named: BTreeMap<String, Arc<Factory>>,
}

fn is_blank_text(document: &Document, node: NodeId) -> bool {
    matches!(document.kind(node), Some(NodeKind::Text(text)) if text.trim().is_empty())
}

impl Template {
    #[instrument(skip(source), fields(bytes = source.len()))]
    pub fn compile(name: &str, source: &str) -> CompileResult<Self> {
        let mut prototype = Document::new();
        let root = prototype
            .parse_fragment(source)
            .map_err(|source| CompileError::Parse {
                template: name.to_string(),
                source,
            })?;

        // Pre-order lists outer templates first; walking it backwards
        // extracts nested templates before their parents.
        let elements: Vec<NodeId> = prototype
            .descendants(root)
            .filter(|id| prototype.tag(*id) == Some("template"))
            .collect();

        let mut extracted = Vec::new();
        for element in elements.into_iter().rev() {
            let id = prototype
                .attribute(element, "id")
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .ok_or_else(|| CompileError::MissingTemplateId {
                    template: name.to_string(),
                })?;

            let fragment = prototype.create_fragment();
            let children: Vec<NodeId> = prototype.children(element).collect();
            for child in children {
                prototype.append_child(fragment, child)?;
            }
            // Formatting whitespace around a template definition is not content.
            let neighbours = [
                prototype.previous_sibling(element),
                prototype.next_sibling(element),
            ];
            for neighbour in neighbours.into_iter().flatten() {
                if is_blank_text(&prototype, neighbour) {
                    prototype.discard(neighbour)?;
                }
            }
            prototype.discard(element)?;
            extracted.push((id, fragment));
        }

        let root = Arc::new(Factory::compile(&mut prototype, root, None)?);
        let mut named = BTreeMap::new();
        for (id, fragment) in extracted {
            if named.contains_key(&id) {
                return Err(CompileError::DuplicateTemplate {
                    template: name.to_string(),
                    name: id,
                });
            }
            let factory = Factory::compile(&mut prototype, fragment, Some(id.clone()))?;
            named.insert(id, Arc::new(factory));
        }

        debug!(
            template = name,
            bindings = root.bindings.len(),
            sub_templates = named.len(),
            "compiled template"
        );

        Ok(Self {
            name: name.to_string(),
            prototype,
            root,
            named,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Arc<Factory> {
        &self.root
    }

    /// The named sub-template, or the root factory for `None`
    pub fn factory(&self, name: Option<&str>) -> RenderResult<&Arc<Factory>> {
        match name {
            None => Ok(&self.root),
            Some(name) => self
                .named
                .get(name)
                .ok_or_else(|| RenderError::UnknownTemplate {
                    template: self.name.clone(),
                    name: name.to_string(),
                }),
        }
    }

    pub fn has_sub_template(&self, name: &str) -> bool {
        self.named.contains_key(name)
    }

    pub fn sub_templates(&self) -> impl Iterator<Item = &str> {
        self.named.keys().map(String::as_str)
    }

    /// Markup of a factory's prototype, placeholders cleared
    pub fn prototype_html(&self, factory: &Factory) -> String {
        self.prototype.outer_html(factory.fragment)
    }

    /// Deep-imports the factory's fragment into `document` and binds it
    pub fn instantiate(
        &self,
        document: &mut Document,
        factory: &Arc<Factory>,
    ) -> RenderResult<Instance> {
        let fragment = document.import_node(&self.prototype, factory.fragment)?;
        Instance::bind(document, Arc::clone(factory), fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(factory: &Factory) -> Vec<String> {
        factory
            .bindings()
            .iter()
            .map(|binding| match &binding.kind {
                BindingKind::Text { .. } => format!("text{:?}", binding.path.nodes),
                BindingKind::TextareaValue { .. } => format!("textarea{:?}", binding.path.nodes),
                BindingKind::Attribute { name, .. } => {
                    format!("attr:{}{:?}", name, binding.path.nodes)
                }
                BindingKind::Anchor { expr } => format!("anchor:{}{:?}", expr, binding.path.nodes),
            })
            .collect()
    }

    #[test]
    fn test_bindings_in_document_order() {
        let template = Template::compile(
            "page",
            r#"<h1 class="${tone}">${title}</h1><ul><!-- ${rows} --></ul><p>static</p>"#,
        )
        .unwrap();

        assert_eq!(
            kinds(template.root()),
            vec![
                "attr:class[0]".to_string(),
                "text[0, 0]".to_string(),
                "anchor:rows[1, 0]".to_string(),
            ]
        );
        assert_eq!(
            template.root().bindings()[0].path.attribute,
            Some(0),
        );
    }

    #[test]
    fn test_prototype_has_placeholders_cleared() {
        let template =
            Template::compile("page", r#"<b title="${t}">Hi ${name}</b><!--${list}-->"#).unwrap();
        assert_eq!(
            template.prototype_html(template.root()),
            r#"<b title=""></b><!---->"#
        );
    }

    #[test]
    fn test_plain_comments_stay_comments() {
        let template = Template::compile("page", "<!-- note --><!--${a} and ${b}-->").unwrap();
        assert!(template.root().bindings().is_empty());
    }

    #[test]
    fn test_sub_templates_are_extracted() {
        let template = Template::compile(
            "list",
            r#"<ul><!--${rows}--></ul>
<template id="row"><li>${label}<template id="badge"><b>${n}</b></template></li></template>"#,
        )
        .unwrap();

        let names: Vec<&str> = template.sub_templates().collect();
        assert_eq!(names, vec!["badge", "row"]);

        let row = template.factory(Some("row")).unwrap();
        assert_eq!(template.prototype_html(row), "<li></li>");
        assert_eq!(kinds(row), vec!["text[0, 0]".to_string()]);

        let badge = template.factory(Some("badge")).unwrap();
        assert_eq!(template.prototype_html(badge), "<b></b>");

        assert!(matches!(
            template.factory(Some("missing")),
            Err(RenderError::UnknownTemplate { .. })
        ));
    }

    #[test]
    fn test_whitespace_around_template_definitions_is_dropped() {
        let template = Template::compile(
            "list",
            "<ul>${a}</ul>\n<template id=\"row\"><li> ${b} </li></template>\n\n<template id=\"tag\"><em>${c}</em></template>\n",
        )
        .unwrap();

        assert_eq!(template.prototype_html(template.root()), "<ul></ul>");
        assert_eq!(kinds(template.root()), vec!["text[0, 0]".to_string()]);
        let row = template.factory(Some("row")).unwrap();
        assert_eq!(template.prototype_html(row), "<li></li>");
    }

    #[test]
    fn test_textarea_and_live_properties() {
        let template = Template::compile(
            "form",
            r#"<textarea>${body}</textarea><input value="${v}" checked="${on}"><div value="${v}"></div>"#,
        )
        .unwrap();
        let bindings = template.root().bindings();

        assert!(matches!(bindings[0].kind, BindingKind::TextareaValue { .. }));
        assert!(matches!(
            bindings[1].kind,
            BindingKind::Attribute {
                property: Some(LiveProperty::Value),
                ..
            }
        ));
        assert!(matches!(
            bindings[2].kind,
            BindingKind::Attribute {
                property: Some(LiveProperty::Checked),
                ..
            }
        ));
        assert!(matches!(
            bindings[3].kind,
            BindingKind::Attribute { property: None, .. }
        ));
    }

    #[test]
    fn test_compile_errors() {
        assert!(matches!(
            Template::compile("t", "<p>${a + b}</p>"),
            Err(CompileError::InvalidExpression { .. })
        ));
        assert!(matches!(
            Template::compile("t", "<template><p></p></template>"),
            Err(CompileError::MissingTemplateId { .. })
        ));
        assert!(matches!(
            Template::compile("t", r#"<template id="a"></template><template id="a"></template>"#),
            Err(CompileError::DuplicateTemplate { .. })
        ));
        assert!(matches!(
            Template::compile("t", "<p>${open</p>"),
            Err(CompileError::UnterminatedPlaceholder { .. })
        ));
    }

    #[test]
    fn test_deeply_nested_markup_compiles() {
        let depth = 5_000;
        let source = format!("{}${{leaf}}{}", "<div>".repeat(depth), "</div>".repeat(depth));
        let template = Template::compile("deep", &source).unwrap();
        assert_eq!(template.root().bindings()[0].path.nodes.len(), depth + 1);
    }
}
