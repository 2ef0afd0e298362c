//! Runtime error types

use std::sync::Arc;
use stencil_template::{CompileError, RenderError};
use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    #[error("Failed to load template {name:?}: {reason}")]
    TemplateLoadFailed { name: String, reason: String },

    #[error("Failed to compile template: {0}")]
    Compile(#[from] CompileError),

    #[error("Failed to render: {0}")]
    Render(#[from] RenderError),

    #[error("Display failed: {0}")]
    Display(Arc<anyhow::Error>),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<anyhow::Error> for RuntimeError {
    fn from(error: anyhow::Error) -> Self {
        RuntimeError::Display(Arc::new(error))
    }
}

impl RuntimeError {
    pub fn load_failed(name: &str, reason: impl std::fmt::Display) -> Self {
        RuntimeError::TemplateLoadFailed {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}
