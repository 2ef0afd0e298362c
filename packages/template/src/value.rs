//! Data flowing into templates
//!
//! [`RenderNode`] is what a component's display routine produces: plain
//! data where any object may select a named sub-template through its
//! `$template` field. [`Value`] is the resolved context handed to binders,
//! with every template node replaced by the nodes of its bound instance.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use stencil_dom::NodeId;

/// Field selecting the sub-template an object renders through
pub const DISCRIMINATOR: &str = "$template";

/// Tagged data tree produced by a display routine
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum RenderNode {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<RenderNode>),
    Record(BTreeMap<String, RenderNode>),
    Template {
        name: String,
        fields: BTreeMap<String, RenderNode>,
    },
}

impl RenderNode {
    pub fn record<K: Into<String>>(fields: impl IntoIterator<Item = (K, RenderNode)>) -> Self {
        RenderNode::Record(collect_fields(fields))
    }

    pub fn template<K: Into<String>>(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = (K, RenderNode)>,
    ) -> Self {
        RenderNode::Template {
            name: name.into(),
            fields: collect_fields(fields),
        }
    }

    pub fn list(items: impl IntoIterator<Item = RenderNode>) -> Self {
        RenderNode::List(items.into_iter().collect())
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            RenderNode::Null => "null",
            RenderNode::Bool(_) => "bool",
            RenderNode::Number(_) => "number",
            RenderNode::Text(_) => "text",
            RenderNode::List(_) => "list",
            RenderNode::Record(_) => "record",
            RenderNode::Template { .. } => "template",
        }
    }
}

fn collect_fields<K: Into<String>>(
    fields: impl IntoIterator<Item = (K, RenderNode)>,
) -> BTreeMap<String, RenderNode> {
    fields
        .into_iter()
        .map(|(key, value)| (key.into(), value))
        .collect()
}

impl From<serde_json::Value> for RenderNode {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match value {
            Json::Null => RenderNode::Null,
            Json::Bool(flag) => RenderNode::Bool(flag),
            Json::Number(number) => RenderNode::Number(number.as_f64().unwrap_or(f64::NAN)),
            Json::String(text) => RenderNode::Text(text),
            Json::Array(items) => RenderNode::List(items.into_iter().map(RenderNode::from).collect()),
            Json::Object(mut object) => {
                let name = match object.get(DISCRIMINATOR) {
                    Some(Json::String(name)) => Some(name.clone()),
                    _ => None,
                };
                match name {
                    Some(name) => {
                        object.remove(DISCRIMINATOR);
                        RenderNode::Template {
                            name,
                            fields: object
                                .into_iter()
                                .map(|(key, value)| (key, RenderNode::from(value)))
                                .collect(),
                        }
                    }
                    None => RenderNode::Record(
                        object
                            .into_iter()
                            .map(|(key, value)| (key, RenderNode::from(value)))
                            .collect(),
                    ),
                }
            }
        }
    }
}

impl From<RenderNode> for serde_json::Value {
    fn from(node: RenderNode) -> Self {
        use serde_json::Value as Json;
        match node {
            RenderNode::Null => Json::Null,
            RenderNode::Bool(flag) => Json::Bool(flag),
            RenderNode::Number(number) => serde_json::Number::from_f64(number)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            RenderNode::Text(text) => Json::String(text),
            RenderNode::List(items) => Json::Array(items.into_iter().map(Json::from).collect()),
            RenderNode::Record(fields) => Json::Object(
                fields
                    .into_iter()
                    .map(|(key, value)| (key, Json::from(value)))
                    .collect(),
            ),
            RenderNode::Template { name, fields } => {
                let mut object: serde_json::Map<String, Json> = fields
                    .into_iter()
                    .map(|(key, value)| (key, Json::from(value)))
                    .collect();
                object.insert(DISCRIMINATOR.to_string(), Json::String(name));
                Json::Object(object)
            }
        }
    }
}

impl From<&str> for RenderNode {
    fn from(text: &str) -> Self {
        RenderNode::Text(text.to_string())
    }
}

impl From<String> for RenderNode {
    fn from(text: String) -> Self {
        RenderNode::Text(text)
    }
}

impl From<bool> for RenderNode {
    fn from(flag: bool) -> Self {
        RenderNode::Bool(flag)
    }
}

impl From<f64> for RenderNode {
    fn from(number: f64) -> Self {
        RenderNode::Number(number)
    }
}

impl From<i64> for RenderNode {
    fn from(number: i64) -> Self {
        RenderNode::Number(number as f64)
    }
}

impl From<i32> for RenderNode {
    fn from(number: i32) -> Self {
        RenderNode::Number(number as f64)
    }
}

impl From<usize> for RenderNode {
    fn from(number: usize) -> Self {
        RenderNode::Number(number as f64)
    }
}

impl<T: Into<RenderNode>> From<Vec<T>> for RenderNode {
    fn from(items: Vec<T>) -> Self {
        RenderNode::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<RenderNode>> From<Option<T>> for RenderNode {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(RenderNode::Null)
    }
}

/// Resolved context value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// Realized top-level nodes of a rendered sub-template
    Nodes(Vec<NodeId>),
}

impl Value {
    /// Whether a whole-value attribute binding keeps its attribute
    pub fn is_present(&self) -> bool {
        !matches!(self, Value::Null | Value::Bool(false))
    }

    /// Text used when the value lands in a text node or attribute
    pub fn to_text(&self) -> String {
        match self {
            Value::Null | Value::Map(_) | Value::Nodes(_) => String::new(),
            Value::Bool(flag) => flag.to_string(),
            Value::Number(number) => format_number(*number),
            Value::String(text) => text.clone(),
            Value::List(items) => items
                .iter()
                .map(Value::to_text)
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

/// Integral numbers print without a fraction
fn format_number(number: f64) -> String {
    if number.is_finite() && number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        format!("{}", number)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::String(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::String(text)
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Value::Bool(flag)
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Value::Number(number)
    }
}

impl From<i64> for Value {
    fn from(number: i64) -> Self {
        Value::Number(number as f64)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}
