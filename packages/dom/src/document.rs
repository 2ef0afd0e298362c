//! Arena-backed document
//!
//! Nodes live in a slot vector and link to each other through parent and
//! sibling handles, so node identity is a plain [`NodeId`] comparison and
//! moving a node never reallocates it.

use crate::error::{DomError, DomResult};
use crate::mutation::{MutationRecord, MutationStats};
use crate::node::{Attribute, ElementData, NodeId, NodeKind, PropValue};
use tracing::trace;

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    data: Option<NodeData>,
}

/// A tree of nodes rooted at a `<body>` element, plus any number of
/// detached subtrees and fragments.
#[derive(Debug, Clone)]
pub struct Document {
    slots: Vec<Slot>,
    free: Vec<u32>,
    body: NodeId,
    journal: Option<Vec<MutationRecord>>,
    stats: MutationStats,
}

impl Document {
    pub fn new() -> Self {
        let mut document = Self {
            slots: Vec::new(),
            free: Vec::new(),
            body: NodeId::new(0, 0),
            journal: None,
            stats: MutationStats::default(),
        };
        document.body = document.allocate(NodeKind::Element(ElementData::new("body")));
        document.stats = MutationStats::default();
        document
    }

    /// Root of the connected tree
    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Number of live nodes, detached ones included
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.data(id).is_some()
    }

    // ---- creation ----

    pub fn create_element(&mut self, tag: impl Into<String>) -> NodeId {
        self.allocate(NodeKind::Element(ElementData::new(tag)))
    }

    pub fn create_element_with(
        &mut self,
        tag: impl Into<String>,
        attributes: Vec<Attribute>,
    ) -> NodeId {
        let mut element = ElementData::new(tag);
        element.attributes = attributes;
        self.allocate(NodeKind::Element(element))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.allocate(NodeKind::Text(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.allocate(NodeKind::Comment(text.into()))
    }

    pub fn create_fragment(&mut self) -> NodeId {
        self.allocate(NodeKind::Fragment)
    }

    fn allocate(&mut self, kind: NodeKind) -> NodeId {
        self.stats.created += 1;
        let data = NodeData::new(kind);
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.data = Some(data);
                NodeId::new(index, slot.generation)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    data: Some(data),
                });
                NodeId::new(index, 0)
            }
        }
    }

    // ---- queries ----

    fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.data.as_ref())
    }

    fn live(&self, id: NodeId) -> DomResult<&NodeData> {
        self.data(id).ok_or(DomError::StaleNode(id))
    }

    fn live_mut(&mut self, id: NodeId) -> DomResult<&mut NodeData> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.data.as_mut())
            .ok_or(DomError::StaleNode(id))
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.data(id).map(|data| &data.kind)
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.kind(id)? {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|element| element.tag.as_str())
    }

    /// Character data of a text or comment node
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Text(text) | NodeKind::Comment(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_comment(&self, id: NodeId) -> bool {
        matches!(self.kind(id), Some(NodeKind::Comment(_)))
    }

    pub fn is_fragment(&self, id: NodeId) -> bool {
        matches!(self.kind(id), Some(NodeKind::Fragment))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.data(id)?.parent
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.data(id)?.first_child
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.data(id)?.last_child
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.data(id)?.next_sibling
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.data(id)?.prev_sibling
    }

    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            document: self,
            next: self.first_child(id),
        }
    }

    pub fn child_at(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.children(id).nth(index)
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).position(|child| child == id)
    }

    /// Pre-order walk of `id` and everything below it
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            document: self,
            root: id,
            next: self.data(id).map(|_| id),
        }
    }

    /// Concatenated data of all descendant text nodes
    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .filter_map(|node| match self.kind(node) {
                Some(NodeKind::Text(text)) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Whether `id` hangs below the body
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.is_inclusive_ancestor(self.body, id)
    }

    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(node) = cursor {
            if node == ancestor {
                return true;
            }
            cursor = self.parent(node);
        }
        false
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attribute(name)
    }

    /// Live property value; falls back to the attribute-derived default
    /// while the property was never written
    pub fn property(&self, id: NodeId, name: &str) -> Option<PropValue> {
        let element = self.element(id)?;
        if let Some(value) = element.properties.get(name) {
            return Some(value.clone());
        }
        match name {
            "value" if element.tag == "textarea" => Some(PropValue::Text(self.text_content(id))),
            "value" => Some(PropValue::Text(
                element.attribute("value").unwrap_or_default().to_string(),
            )),
            "checked" | "selected" | "disabled" => Some(PropValue::Flag(element.has_attribute(name))),
            _ => None,
        }
    }

    // ---- tree mutation ----

    pub fn append_child(&mut self, parent: NodeId, node: NodeId) -> DomResult<()> {
        self.insert_before(parent, node, None)
    }

    /// Inserts `node` into `parent` before `reference` (at the end when
    /// `None`), detaching it from its current position first. A fragment
    /// contributes its children instead of itself.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        node: NodeId,
        reference: Option<NodeId>,
    ) -> DomResult<()> {
        if !self.live(parent)?.kind.is_container() {
            return Err(DomError::NotAContainer(parent));
        }
        if let Some(reference) = reference {
            if self.live(reference)?.parent != Some(parent) {
                return Err(DomError::NotAChild {
                    parent,
                    child: reference,
                });
            }
        }

        if matches!(self.live(node)?.kind, NodeKind::Fragment) {
            let children: Vec<NodeId> = self.children(node).collect();
            for child in children {
                self.insert_before(parent, child, reference)?;
            }
            return Ok(());
        }

        if node == self.body || self.is_inclusive_ancestor(node, parent) {
            return Err(DomError::HierarchyRequest { parent, node });
        }

        let reference = if reference == Some(node) {
            self.next_sibling(node)
        } else {
            reference
        };

        self.unlink(node)?;
        self.link(parent, node, reference)?;

        if self.is_connected(parent) {
            self.stats.inserted += 1;
            self.record(MutationRecord::ChildList {
                target: parent,
                added: vec![node],
                removed: Vec::new(),
            });
        }
        trace!(%parent, %node, "inserted node");
        Ok(())
    }

    /// Detaches `node` from its parent; it stays alive and can be reinserted
    pub fn remove(&mut self, node: NodeId) -> DomResult<()> {
        if node == self.body {
            return Err(DomError::BodyRemoval);
        }
        self.live(node)?;
        self.unlink(node)
    }

    /// Detaches `node` and frees it together with its subtree. Handles to
    /// discarded nodes become stale.
    pub fn discard(&mut self, node: NodeId) -> DomResult<()> {
        self.remove(node)?;
        let subtree: Vec<NodeId> = self.descendants(node).collect();
        for id in subtree {
            let slot = &mut self.slots[id.index()];
            slot.data = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(id.index);
            self.stats.discarded += 1;
        }
        trace!(%node, "discarded subtree");
        Ok(())
    }

    fn unlink(&mut self, node: NodeId) -> DomResult<()> {
        let (parent, prev, next) = {
            let data = self.live(node)?;
            (data.parent, data.prev_sibling, data.next_sibling)
        };
        let Some(parent) = parent else {
            return Ok(());
        };
        let connected = self.is_connected(parent);

        match prev {
            Some(prev) => self.live_mut(prev)?.next_sibling = next,
            None => self.live_mut(parent)?.first_child = next,
        }
        match next {
            Some(next) => self.live_mut(next)?.prev_sibling = prev,
            None => self.live_mut(parent)?.last_child = prev,
        }
        let data = self.live_mut(node)?;
        data.parent = None;
        data.prev_sibling = None;
        data.next_sibling = None;

        if connected {
            self.stats.removed += 1;
            self.record(MutationRecord::ChildList {
                target: parent,
                added: Vec::new(),
                removed: vec![node],
            });
        }
        Ok(())
    }

    fn link(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>) -> DomResult<()> {
        let prev = match reference {
            Some(reference) => self.live(reference)?.prev_sibling,
            None => self.live(parent)?.last_child,
        };

        {
            let data = self.live_mut(node)?;
            data.parent = Some(parent);
            data.prev_sibling = prev;
            data.next_sibling = reference;
        }
        match prev {
            Some(prev) => self.live_mut(prev)?.next_sibling = Some(node),
            None => self.live_mut(parent)?.first_child = Some(node),
        }
        match reference {
            Some(reference) => self.live_mut(reference)?.prev_sibling = Some(node),
            None => self.live_mut(parent)?.last_child = Some(node),
        }
        Ok(())
    }

    // ---- node content ----

    /// Replaces the data of a text or comment node. Returns whether anything
    /// changed; unchanged writes are not recorded.
    pub fn set_text(&mut self, id: NodeId, value: impl Into<String>) -> DomResult<bool> {
        let value = value.into();
        let connected = self.is_connected(id);
        let data = match &mut self.live_mut(id)?.kind {
            NodeKind::Text(data) | NodeKind::Comment(data) => data,
            _ => return Err(DomError::NotCharacterData(id)),
        };
        if *data == value {
            return Ok(false);
        }
        *data = value;

        if connected {
            self.stats.text_writes += 1;
            self.record(MutationRecord::CharacterData { target: id });
        }
        Ok(true)
    }

    pub fn set_attribute(
        &mut self,
        id: NodeId,
        name: &str,
        value: impl Into<String>,
    ) -> DomResult<bool> {
        let value = value.into();
        let connected = self.is_connected(id);
        let element = self.element_mut(id)?;
        match element.attributes.iter_mut().find(|attr| attr.name == name) {
            Some(attr) if attr.value == value => return Ok(false),
            Some(attr) => attr.value = value,
            None => element.attributes.push(Attribute::new(name, value)),
        }

        if connected {
            self.stats.attribute_writes += 1;
            self.record(MutationRecord::Attribute {
                target: id,
                name: name.to_string(),
            });
        }
        Ok(true)
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> DomResult<bool> {
        let connected = self.is_connected(id);
        let element = self.element_mut(id)?;
        let before = element.attributes.len();
        element.attributes.retain(|attr| attr.name != name);
        if element.attributes.len() == before {
            return Ok(false);
        }

        if connected {
            self.stats.attribute_writes += 1;
            self.record(MutationRecord::Attribute {
                target: id,
                name: name.to_string(),
            });
        }
        Ok(true)
    }

    pub fn set_property(&mut self, id: NodeId, name: &str, value: PropValue) -> DomResult<bool> {
        if self.property(id, name).as_ref() == Some(&value) {
            let element = self.element_mut(id)?;
            element.properties.insert(name.to_string(), value);
            return Ok(false);
        }
        let connected = self.is_connected(id);
        self.element_mut(id)?
            .properties
            .insert(name.to_string(), value);

        if connected {
            self.stats.property_writes += 1;
            self.record(MutationRecord::Property {
                target: id,
                name: name.to_string(),
            });
        }
        Ok(true)
    }

    fn element_mut(&mut self, id: NodeId) -> DomResult<&mut ElementData> {
        match &mut self.live_mut(id)?.kind {
            NodeKind::Element(element) => Ok(element),
            _ => Err(DomError::NotAnElement(id)),
        }
    }

    // ---- cloning ----

    /// Deep copy of `id` within this document, detached
    pub fn clone_node(&mut self, id: NodeId) -> DomResult<NodeId> {
        let snapshot = self.snapshot(id)?;
        self.build(snapshot)
    }

    /// Deep copy of `id` from another document into this one, detached
    pub fn import_node(&mut self, source: &Document, id: NodeId) -> DomResult<NodeId> {
        let snapshot = source.snapshot(id)?;
        self.build(snapshot)
    }

    /// Pre-order list of shallow copies with the position of each parent
    fn snapshot(&self, id: NodeId) -> DomResult<Vec<(NodeKind, Option<usize>)>> {
        let mut nodes = Vec::new();
        let mut stack = vec![(id, None)];
        while let Some((node, parent)) = stack.pop() {
            let position = nodes.len();
            nodes.push((self.live(node)?.kind.shallow_clone(), parent));
            let children: Vec<NodeId> = self.children(node).collect();
            for child in children.into_iter().rev() {
                stack.push((child, Some(position)));
            }
        }
        Ok(nodes)
    }

    fn build(&mut self, snapshot: Vec<(NodeKind, Option<usize>)>) -> DomResult<NodeId> {
        let mut ids: Vec<NodeId> = Vec::with_capacity(snapshot.len());
        for (kind, parent) in snapshot {
            let id = self.allocate(kind);
            if let Some(parent) = parent {
                self.link(ids[parent], id, None)?;
            }
            ids.push(id);
        }
        Ok(ids[0])
    }

    // ---- journal ----

    /// Starts collecting [`MutationRecord`]s of the connected tree
    pub fn start_recording(&mut self) {
        self.journal.get_or_insert_with(Vec::new);
    }

    pub fn stop_recording(&mut self) -> Vec<MutationRecord> {
        self.journal.take().unwrap_or_default()
    }

    /// Drains the records collected so far, recording continues
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        self.journal.as_mut().map(std::mem::take).unwrap_or_default()
    }

    pub fn stats(&self) -> MutationStats {
        self.stats
    }

    fn record(&mut self, record: MutationRecord) {
        if let Some(journal) = &mut self.journal {
            journal.push(record);
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Children<'a> {
    document: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.document.next_sibling(current);
        Some(current)
    }
}

pub struct Descendants<'a> {
    document: &'a Document,
    root: NodeId,
    next: Option<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = match self.document.first_child(current) {
            Some(child) => Some(child),
            None => {
                let mut cursor = current;
                loop {
                    if cursor == self.root {
                        break None;
                    }
                    if let Some(sibling) = self.document.next_sibling(cursor) {
                        break Some(sibling);
                    }
                    match self.document.parent(cursor) {
                        Some(parent) => cursor = parent,
                        None => break None,
                    }
                }
            }
        };
        Some(current)
    }
}
