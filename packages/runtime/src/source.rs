//! Where template markup comes from

use crate::error::{RuntimeError, RuntimeResult};
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;
use tracing::debug;

/// Fetches template markup by name
pub trait TemplateSource: Send + Sync + 'static {
    fn fetch<'a>(&'a self, name: &'a str) -> BoxFuture<'a, RuntimeResult<String>>;
}

/// Reads `<dir>/<name>.<extension>` from disk
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
    extension: String,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extension: "html".to_string(),
        }
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    /// File holding template `name`. Names are plain file stems; anything
    /// that could step out of the directory is rejected.
    pub fn path_for(&self, name: &str) -> RuntimeResult<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\', '\0']);
        if !valid {
            return Err(RuntimeError::load_failed(name, "invalid template name"));
        }
        Ok(self.dir.join(format!("{}.{}", name, self.extension)))
    }
}

impl TemplateSource for DirectorySource {
    fn fetch<'a>(&'a self, name: &'a str) -> BoxFuture<'a, RuntimeResult<String>> {
        async move {
            let path = self.path_for(name)?;
            debug!(path = %path.display(), "reading template");
            tokio::fs::read_to_string(&path)
                .await
                .map_err(|error| RuntimeError::load_failed(name, format!("{}: {}", path.display(), error)))
        }
        .boxed()
    }
}

/// Templates registered in memory
#[derive(Debug, Default)]
pub struct MemorySource {
    templates: RwLock<HashMap<String, String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, name: &str, markup: &str) -> Self {
        self.insert(name, markup);
        self
    }

    pub fn insert(&self, name: &str, markup: &str) {
        let mut templates = self
            .templates
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        templates.insert(name.to_string(), markup.to_string());
    }
}

impl TemplateSource for MemorySource {
    fn fetch<'a>(&'a self, name: &'a str) -> BoxFuture<'a, RuntimeResult<String>> {
        let found = self
            .templates
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned();
        async move { found.ok_or_else(|| RuntimeError::load_failed(name, "not found")) }.boxed()
    }
}
