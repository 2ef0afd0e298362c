//! # Stencil runtime
//!
//! Hosts components on a shared [`Document`](stencil_dom::Document):
//! templates are fetched and compiled once per process through a
//! [`TemplateCache`], and each component re-renders through its own
//! [`Scheduler`], which coalesces display requests and never runs two
//! renders of the same component at once.

pub mod cache;
pub mod component;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod source;

pub use cache::{global, install_global, TemplateCache};
pub use component::{shared_document, Component, ComponentHost, Mounted, SharedDocument};
pub use config::{RuntimeConfig, DEFAULT_CONFIG_NAME};
pub use error::{RuntimeError, RuntimeResult};
pub use scheduler::{Phase, RenderStatus, Renderable, Scheduler};
pub use source::{DirectorySource, MemorySource, TemplateSource};
