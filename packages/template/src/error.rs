//! Error types for compilation and rendering

use crate::compiler::CompiledPath;
use stencil_dom::{DomError, ParseError};
use thiserror::Error;

pub type CompileResult<T> = Result<T, CompileError>;
pub type RenderResult<T> = Result<T, RenderError>;

/// Failure turning template markup into a [`Template`](crate::Template)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("Failed to parse template {template}: {source}")]
    Parse {
        template: String,
        #[source]
        source: ParseError,
    },

    #[error("Unterminated placeholder in {text:?}")]
    UnterminatedPlaceholder { text: String },

    #[error("Invalid expression {expression:?}: {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("<template> element without an id in {template}")]
    MissingTemplateId { template: String },

    #[error("Sub-template {name:?} is declared twice in {template}")]
    DuplicateTemplate { template: String, name: String },

    #[error(transparent)]
    Dom(#[from] DomError),
}

/// Failure applying data to a compiled template
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    #[error("Template {template:?} has no sub-template named {name:?}")]
    UnknownTemplate { template: String, name: String },

    #[error("The root of a render must be a record or a template node, found {found}")]
    InvalidRoot { found: &'static str },

    #[error("Binding path {path:?} does not resolve in an instance of {factory}")]
    PathMismatch { factory: String, path: CompiledPath },

    #[error("Binding {index} of {factory} is out of step with its slot")]
    SlotMismatch { factory: String, index: usize },

    #[error(transparent)]
    Dom(#[from] DomError),
}
