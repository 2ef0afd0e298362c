//! Process-wide template cache
//!
//! Each template name is fetched and compiled at most once. Concurrent
//! requests for a name that is still loading wait for the same load. A
//! failed load leaves nothing behind, so the next request tries again.

use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::source::TemplateSource;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use stencil_template::Template;
use tokio::sync::OnceCell;
use tracing::{debug, instrument, warn};

static GLOBAL: OnceLock<Arc<TemplateCache>> = OnceLock::new();

pub struct TemplateCache {
    source: Box<dyn TemplateSource>,
    entries: Mutex<HashMap<String, Arc<OnceCell<Arc<Template>>>>>,
    loads: AtomicUsize,
}

impl TemplateCache {
    pub fn new(source: impl TemplateSource) -> Self {
        Self {
            source: Box::new(source),
            entries: Mutex::new(HashMap::new()),
            loads: AtomicUsize::new(0),
        }
    }

    /// Cache reading from the configured template directory
    pub fn from_config(config: &RuntimeConfig, cwd: impl AsRef<Path>) -> Self {
        Self::new(config.source(cwd))
    }

    /// The compiled template, loading it on first use
    #[instrument(skip(self))]
    pub async fn get(&self, name: &str) -> RuntimeResult<Arc<Template>> {
        let cell = {
            let mut entries = self
                .entries
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(entries.entry(name.to_string()).or_default())
        };

        let template = cell
            .get_or_try_init(|| async {
                self.loads.fetch_add(1, Ordering::SeqCst);
                let markup = self.source.fetch(name).await?;
                let template = Template::compile(name, &markup)?;
                debug!(template = name, "template loaded");
                Ok::<_, RuntimeError>(Arc::new(template))
            })
            .await
            .map_err(|error| {
                warn!(template = name, %error, "template load failed");
                error
            })?;

        Ok(Arc::clone(template))
    }

    /// Whether `name` finished loading successfully
    pub fn is_loaded(&self, name: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .is_some_and(|cell| cell.initialized())
    }

    /// Number of fetch-and-compile attempts so far
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for TemplateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateCache")
            .field("loads", &self.loads())
            .finish_non_exhaustive()
    }
}

/// Installs the process-wide cache; only the first call succeeds
pub fn install_global(cache: Arc<TemplateCache>) -> RuntimeResult<()> {
    GLOBAL
        .set(cache)
        .map_err(|_| RuntimeError::Config("a global template cache is already installed".to_string()))
}

pub fn global() -> Option<Arc<TemplateCache>> {
    GLOBAL.get().cloned()
}
