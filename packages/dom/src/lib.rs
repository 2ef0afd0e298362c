//! # Stencil DOM
//!
//! A small arena DOM for the template runtime: elements with ordered
//! attributes and live properties, text and comment nodes, fragments, a
//! lenient HTML fragment parser and a serializer.
//!
//! Node identity is a [`NodeId`]; moving a node keeps its id, so callers can
//! assert that a re-render kept (or replaced) a particular node. The
//! document reports mutations below its [`body`](Document::body) through a
//! journal of [`MutationRecord`]s and running [`MutationStats`].

pub mod document;
pub mod error;
pub mod lexer;
pub mod mutation;
pub mod node;
pub mod parser;
pub mod serializer;

pub use document::{Children, Descendants, Document};
#[cfg(feature = "pretty-errors")]
pub use error::format_error;
pub use error::{DomError, DomResult, ParseError, ParseResult};
pub use mutation::{MutationRecord, MutationStats};
pub use node::{
    is_interactive_element, is_raw_text_element, is_void_element, Attribute, ElementData, NodeId,
    NodeKind, PropValue,
};
pub use parser::{decode_entities, parse_fragment};
pub use serializer::HtmlOptions;
