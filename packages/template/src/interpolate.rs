//! Interpolation walker
//!
//! Resolves a [`RenderNode`] tree bottom-up: every object selecting a
//! sub-template is rendered through a pooled [`Instance`] before its parent
//! sees it, and the parent's context receives the instance's nodes. Pools
//! match instances by ordinal, so the n-th object that selects template
//! `T` in a pass reuses the n-th instance of `T` from the previous pass.

use crate::anchor::{reconcile, Claims, Position};
use crate::compiler::Template;
use crate::error::{RenderError, RenderResult};
use crate::instance::Instance;
use crate::value::{RenderNode, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use stencil_dom::{Document, NodeId};
use tracing::{debug, instrument};

/// Pool key of the root factory; sub-template ids are never empty
const ROOT_POOL: &str = "";

/// Per-pass bookkeeping
#[derive(Default)]
struct Pass {
    used: HashMap<String, usize>,
    claims: Claims,
}

/// Renders data through one compiled template into a document, keeping the
/// instances of the previous pass for reuse
#[derive(Debug)]
pub struct Renderer {
    template: Arc<Template>,
    pools: BTreeMap<String, Vec<Instance>>,
    placed: Vec<NodeId>,
}

impl Renderer {
    pub fn new(template: Arc<Template>) -> Self {
        Self {
            template,
            pools: BTreeMap::new(),
            placed: Vec::new(),
        }
    }

    pub fn template(&self) -> &Arc<Template> {
        &self.template
    }

    /// Instances pooled for a sub-template, or for the root with `None`
    pub fn pool_len(&self, name: Option<&str>) -> usize {
        self.pools
            .get(name.unwrap_or(ROOT_POOL))
            .map_or(0, Vec::len)
    }

    /// Runs one pass and returns the root instance's top-level nodes.
    ///
    /// Unknown sub-template names are rejected before anything is touched.
    /// Instances beyond what this pass used are discarded afterwards.
    #[instrument(skip_all, fields(template = %self.template.name()))]
    pub fn render(&mut self, document: &mut Document, root: &RenderNode) -> RenderResult<Vec<NodeId>> {
        self.validate(root)?;

        let mut pass = Pass::default();
        let nodes = match root {
            RenderNode::Record(fields) => self.render_instance(document, &mut pass, None, fields)?,
            RenderNode::Template { name, fields } => {
                self.render_instance(document, &mut pass, Some(name.as_str()), fields)?
            }
            other => {
                return Err(RenderError::InvalidRoot {
                    found: other.kind_name(),
                })
            }
        };

        self.collect_garbage(document, &pass.used)?;
        Ok(nodes)
    }

    /// Renders `root` and places its nodes as the children of `host`,
    /// replacing what an earlier call placed there
    pub fn render_into(
        &mut self,
        document: &mut Document,
        host: NodeId,
        root: &RenderNode,
    ) -> RenderResult<()> {
        let nodes = self.render(document, root)?;
        reconcile(
            document,
            Position::Start(host),
            &self.placed,
            &nodes,
            &mut Claims::new(),
        )?;
        self.placed = nodes;
        Ok(())
    }

    /// Detaches and frees everything this renderer created
    pub fn clear(&mut self, document: &mut Document) -> RenderResult<()> {
        let empty = HashSet::new();
        for (_, pool) in std::mem::take(&mut self.pools) {
            for instance in pool {
                instance.discard(document, &empty)?;
            }
        }
        self.placed.clear();
        Ok(())
    }

    fn validate(&self, root: &RenderNode) -> RenderResult<()> {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            match node {
                RenderNode::List(items) => stack.extend(items),
                RenderNode::Record(fields) => stack.extend(fields.values()),
                RenderNode::Template { name, fields } => {
                    self.template.factory(Some(name.as_str()))?;
                    stack.extend(fields.values());
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn resolve(&mut self, document: &mut Document, pass: &mut Pass, node: &RenderNode) -> RenderResult<Value> {
        Ok(match node {
            RenderNode::Null => Value::Null,
            RenderNode::Bool(flag) => Value::Bool(*flag),
            RenderNode::Number(number) => Value::Number(*number),
            RenderNode::Text(text) => Value::String(text.clone()),
            RenderNode::List(items) => Value::List(
                items
                    .iter()
                    .map(|item| self.resolve(document, pass, item))
                    .collect::<RenderResult<_>>()?,
            ),
            RenderNode::Record(fields) => Value::Map(self.resolve_fields(document, pass, fields)?),
            RenderNode::Template { name, fields } => {
                Value::Nodes(self.render_instance(document, pass, Some(name.as_str()), fields)?)
            }
        })
    }

    fn resolve_fields(
        &mut self,
        document: &mut Document,
        pass: &mut Pass,
        fields: &BTreeMap<String, RenderNode>,
    ) -> RenderResult<BTreeMap<String, Value>> {
        let mut context = BTreeMap::new();
        for (key, value) in fields {
            context.insert(key.clone(), self.resolve(document, pass, value)?);
        }
        Ok(context)
    }

    fn render_instance(
        &mut self,
        document: &mut Document,
        pass: &mut Pass,
        name: Option<&str>,
        fields: &BTreeMap<String, RenderNode>,
    ) -> RenderResult<Vec<NodeId>> {
        let context = Value::Map(self.resolve_fields(document, pass, fields)?);

        let key = name.unwrap_or(ROOT_POOL);
        let used = pass.used.entry(key.to_string()).or_insert(0);
        let ordinal = *used;
        *used += 1;

        let template = &self.template;
        let factory = template.factory(name)?;
        let pool = self.pools.entry(key.to_string()).or_default();
        if ordinal >= pool.len() {
            debug!(factory = factory.label(), ordinal, "instantiating");
            pool.push(template.instantiate(document, factory)?);
        }
        let instance = &mut pool[ordinal];
        instance.update(document, &context, &mut pass.claims)?;
        Ok(instance.nodes())
    }

    /// Drops pooled instances past what the pass used
    fn collect_garbage(&mut self, document: &mut Document, used: &HashMap<String, usize>) -> RenderResult<()> {
        let mut doomed = Vec::new();
        for (key, pool) in self.pools.iter_mut() {
            let keep = used.get(key).copied().unwrap_or(0);
            if pool.len() > keep {
                doomed.extend(pool.drain(keep..));
            }
        }
        self.pools.retain(|_, pool| !pool.is_empty());
        if doomed.is_empty() {
            return Ok(());
        }

        let survivors: HashSet<NodeId> = self
            .pools
            .values()
            .flatten()
            .flat_map(Instance::nodes)
            .collect();
        let count = doomed.len();
        for instance in doomed {
            instance.discard(document, &survivors)?;
        }
        debug!(count, "discarded unused instances");
        Ok(())
    }
}
