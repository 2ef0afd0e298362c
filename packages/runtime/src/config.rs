use crate::error::{RuntimeError, RuntimeResult};
use crate::source::DirectorySource;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_NAME: &str = "stencil.config.json";

/// Runtime configuration file format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Directory holding `<name>.<extension>` template files
    #[serde(default = "default_template_dir")]
    pub template_dir: String,

    /// Template file extension, without the dot
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Coalescing window for display requests
    #[serde(default = "default_delay_ms")]
    pub default_delay_ms: u64,
}

fn default_template_dir() -> String {
    "templates".to_string()
}

fn default_extension() -> String {
    "html".to_string()
}

fn default_delay_ms() -> u64 {
    16
}

impl RuntimeConfig {
    /// Load config from a directory, falling back to defaults when the
    /// file does not exist
    pub fn load(cwd: impl AsRef<Path>) -> RuntimeResult<Self> {
        let config_path = cwd.as_ref().join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path).map_err(|error| {
                RuntimeError::Config(format!("{}: {}", config_path.display(), error))
            })?;
            Self::parse(&content)
        } else {
            Ok(RuntimeConfig::default())
        }
    }

    pub fn parse(content: &str) -> RuntimeResult<Self> {
        let config: RuntimeConfig =
            serde_json::from_str(content).map_err(|error| RuntimeError::Config(error.to_string()))?;
        if config.extension.is_empty() || config.extension.starts_with('.') {
            return Err(RuntimeError::Config(format!(
                "extension must be non-empty and given without a dot, got {:?}",
                config.extension
            )));
        }
        Ok(config)
    }

    /// Absolute path to the template directory
    pub fn template_dir(&self, cwd: impl AsRef<Path>) -> PathBuf {
        cwd.as_ref().join(&self.template_dir)
    }

    pub fn default_delay(&self) -> Duration {
        Duration::from_millis(self.default_delay_ms)
    }

    pub fn source(&self, cwd: impl AsRef<Path>) -> DirectorySource {
        DirectorySource::new(self.template_dir(cwd)).with_extension(&self.extension)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            template_dir: default_template_dir(),
            extension: default_extension(),
            default_delay_ms: default_delay_ms(),
        }
    }
}
