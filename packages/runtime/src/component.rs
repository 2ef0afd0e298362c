//! Component hosting
//!
//! A [`Component`] names its template and turns its state into a
//! [`RenderNode`]. [`ComponentHost`] mounts it on a host element of a shared
//! document and re-renders it through a [`Scheduler`] whenever a display is
//! requested.

use crate::cache::TemplateCache;
use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::scheduler::{Phase, RenderStatus, Renderable, Scheduler};
use futures::future::{BoxFuture, FutureExt};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use stencil_dom::{Document, NodeId};
use stencil_template::{RenderNode, Renderer};
use tracing::{debug, error, instrument, trace};

/// Document shared by every component mounted on it
pub type SharedDocument = Arc<Mutex<Document>>;

pub fn shared_document(document: Document) -> SharedDocument {
    Arc::new(Mutex::new(document))
}

pub(crate) fn lock_document(document: &SharedDocument) -> MutexGuard<'_, Document> {
    document.lock().unwrap_or_else(PoisonError::into_inner)
}

pub trait Component: Send + 'static {
    /// Name the template is fetched by
    fn template_name(&self) -> &str;

    /// Builds the data tree for the next render
    fn display(&mut self) -> BoxFuture<'_, anyhow::Result<RenderNode>>;

    /// Called when a render fails, including when the template could not
    /// be loaded
    fn render_failed(&mut self, error: &RuntimeError) {
        error!(template = self.template_name(), %error, "component render failed");
    }
}

/// A component bound to its host element and instance pools
pub struct Mounted<C: Component> {
    component: C,
    cache: Arc<TemplateCache>,
    document: SharedDocument,
    host: Option<NodeId>,
    renderer: Option<Renderer>,
}

impl<C: Component> Mounted<C> {
    pub fn new(component: C, cache: Arc<TemplateCache>, document: SharedDocument, host: NodeId) -> Self {
        Self {
            component,
            cache,
            document,
            host: Some(host),
            renderer: None,
        }
    }

    pub fn component(&self) -> &C {
        &self.component
    }

    pub fn component_mut(&mut self) -> &mut C {
        &mut self.component
    }

    pub fn host(&self) -> Option<NodeId> {
        self.host
    }

    pub fn renderer(&self) -> Option<&Renderer> {
        self.renderer.as_ref()
    }

    /// Removes everything rendered so far and forgets the host element
    pub fn detach(&mut self) -> RuntimeResult<()> {
        if let Some(mut renderer) = self.renderer.take() {
            let mut document = lock_document(&self.document);
            renderer.clear(&mut document)?;
        }
        self.host = None;
        debug!(template = self.component.template_name(), "detached");
        Ok(())
    }

    pub fn attach(&mut self, host: NodeId) {
        self.host = Some(host);
    }

    #[instrument(skip(self), fields(template = self.component.template_name()))]
    async fn render_once(&mut self) -> RuntimeResult<()> {
        let Some(host) = self.host else {
            trace!("not attached, skipping render");
            return Ok(());
        };

        let template = self.cache.get(self.component.template_name()).await?;
        let data = self.component.display().await?;

        let renderer = self
            .renderer
            .get_or_insert_with(|| Renderer::new(Arc::clone(&template)));
        let mut document = lock_document(&self.document);
        renderer.render_into(&mut document, host, &data)?;
        Ok(())
    }
}

impl<C: Component> Renderable for Mounted<C> {
    fn render(&mut self) -> BoxFuture<'_, RuntimeResult<()>> {
        async move {
            let result = self.render_once().await;
            if let Err(error) = &result {
                self.component.render_failed(error);
            }
            result
        }
        .boxed()
    }
}

/// Handle to a mounted component and its scheduler
pub struct ComponentHost<C: Component> {
    scheduler: Scheduler<Mounted<C>>,
}

impl<C: Component> ComponentHost<C> {
    /// Mounts `component` on `host`; must be called inside a tokio runtime.
    /// Nothing renders until a display is requested.
    pub fn mount(
        component: C,
        cache: Arc<TemplateCache>,
        document: SharedDocument,
        host: NodeId,
        default_delay: Duration,
    ) -> Self {
        let mounted = Mounted::new(component, cache, document, host);
        Self {
            scheduler: Scheduler::new(mounted, default_delay),
        }
    }

    pub fn mount_with_config(
        component: C,
        cache: Arc<TemplateCache>,
        document: SharedDocument,
        host: NodeId,
        config: &RuntimeConfig,
    ) -> Self {
        Self::mount(component, cache, document, host, config.default_delay())
    }

    pub fn request_display(&self) {
        self.scheduler.request_display();
    }

    pub fn request_display_after(&self, delay: Duration) {
        self.scheduler.request_display_after(delay);
    }

    /// Mutates the component's state and requests a display
    pub async fn update<T>(&self, change: impl FnOnce(&mut C) -> T) -> T {
        let result = {
            let mut mounted = self.scheduler.lock().await;
            change(mounted.component_mut())
        };
        self.scheduler.request_display();
        result
    }

    /// Reads the component's state, waiting for a running render
    pub async fn inspect<T>(&self, read: impl FnOnce(&Mounted<C>) -> T) -> T {
        let mounted = self.scheduler.lock().await;
        read(&mounted)
    }

    pub async fn settled(&self) {
        self.scheduler.settled().await;
    }

    pub fn phase(&self) -> Phase {
        self.scheduler.phase()
    }

    pub fn status(&self) -> RenderStatus {
        self.scheduler.status()
    }

    /// Stops scheduled and pending renders, waits for a running one and
    /// removes the component's nodes from the document
    pub async fn disconnect(&self) -> RuntimeResult<()> {
        self.scheduler.cancel().await;
        self.scheduler.lock().await.detach()
    }

    /// Attaches to a (new) host element and requests a display
    pub async fn reconnect(&self, host: NodeId) {
        self.scheduler.lock().await.attach(host);
        self.scheduler.request_display();
    }
}
