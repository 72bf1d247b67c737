use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{key::KeyBy, transport::Method};

/// Expand tilde (~) in path to user's home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(s) = path.to_str() {
        if let Some(stripped) = s.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if s == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

/// Defaults shared by every resource of a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Prefix prepended to every resource URL template
    #[serde(default)]
    pub base_url: String,
    /// Identity attribute(s) used by resources that do not declare their own
    #[serde(default)]
    pub key_by: KeyBy,
    /// Method used by update commands (PUT or PATCH)
    #[serde(default = "defaults::default_update_method")]
    pub update_method: Method,
    /// Emit developer warnings through tracing as they are recorded
    #[serde(default = "defaults::default_developer_warnings")]
    pub developer_warnings: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            key_by: KeyBy::default(),
            update_method: defaults::default_update_method(),
            developer_warnings: defaults::default_developer_warnings(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from `path` (or the default config file) and
    /// environment variables, falling back to defaults when the file does
    /// not exist
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => expand_tilde(path),
            None => Self::config_file_path()?,
        };

        let mut config = if config_path.exists() {
            tracing::debug!("loading resource-sync config from {:?}", config_path);
            Self::load_from_file(&config_path)?
        } else {
            tracing::debug!("no config at {:?}, using defaults", config_path);
            Self::default()
        };

        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(base_url) = env::var("RESOURCE_SYNC_BASE_URL") {
            self.base_url = base_url;
        }

        if let Ok(key_by) = env::var("RESOURCE_SYNC_KEY_BY") {
            self.key_by = parse_key_by(&key_by);
        }

        if let Ok(method) = env::var("RESOURCE_SYNC_UPDATE_METHOD") {
            self.update_method = parse_update_method(&method)
                .context("Failed to parse RESOURCE_SYNC_UPDATE_METHOD")?;
        }

        if let Ok(warnings) = env::var("RESOURCE_SYNC_WARNINGS") {
            self.developer_warnings = warnings
                .parse()
                .context("Failed to parse RESOURCE_SYNC_WARNINGS as bool")?;
        }

        Ok(())
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: SyncConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get default config file path
    pub fn config_file_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".config/resource-sync/config.yaml"))
            .context("Could not determine home directory for config file")
    }
}

/// `id` names one attribute; `a,b` names a composite identity
fn parse_key_by(raw: &str) -> KeyBy {
    let attributes: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|attribute| !attribute.is_empty())
        .map(str::to_string)
        .collect();

    match attributes.as_slice() {
        [single] => KeyBy::Attribute(single.clone()),
        [] => KeyBy::default(),
        _ => KeyBy::Composite(attributes),
    }
}

fn parse_update_method(raw: &str) -> Result<Method> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "PUT" => Ok(Method::Put),
        "PATCH" => Ok(Method::Patch),
        other => anyhow::bail!("update method must be PUT or PATCH, got '{}'", other),
    }
}

mod defaults {
    use crate::transport::Method;

    pub(crate) fn default_update_method() -> Method {
        Method::Put
    }

    pub(crate) fn default_developer_warnings() -> bool {
        true
    }
}
