//! # Stencil templates
//!
//! Compiles HTML fragments with `${path}` placeholders into reusable
//! factories and re-renders their instances in place. There is no virtual
//! tree: each placeholder becomes a binder that writes exactly one node,
//! attribute or comment-anchored node list, and only when its value changed.
//!
//! ```ignore
//! let template = Arc::new(Template::compile("counter", "<span>${count}</span>")?);
//! let mut renderer = Renderer::new(template);
//! renderer.render_into(&mut document, host, &RenderNode::from(json!({"count": 1})))?;
//! ```

pub mod anchor;
pub mod compiler;
pub mod error;
pub mod expression;
pub mod instance;
pub mod interpolate;
pub mod value;

pub use anchor::{reconcile, AnchorState, Claims, Position};
pub use compiler::{Binding, BindingKind, CompiledPath, Factory, LiveProperty, Template};
pub use error::{CompileError, CompileResult, RenderError, RenderResult};
pub use expression::{Interpolation, Part, PathExpr};
pub use instance::Instance;
pub use interpolate::Renderer;
pub use value::{RenderNode, Value, DISCRIMINATOR};
