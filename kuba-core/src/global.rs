//! User-scoped configuration shared by every kuba project.

use crate::config::CacheConfig;
use crate::error::{ConfigError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Global user configuration for kuba.
///
/// Stored as TOML in the user's config directory, typically
/// `~/.config/kuba/config.toml` on Linux:
///
/// ```toml
/// [cache]
/// enabled = true
/// ttl = "12h"
///
/// [defaults]
/// environment = "default"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Global cache policy; individual environments may override it
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub defaults: GlobalDefaults,
}

/// Default settings in the global configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalDefaults {
    /// Environment used when a command does not name one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    /// Document path used when a command does not name one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<PathBuf>,
}

impl GlobalConfig {
    /// Gets the path to the global configuration file.
    pub fn path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "kuba").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Loads the global configuration from its default location.
    ///
    /// A missing file is not an error; it yields the defaults
    /// (caching disabled, 12h TTL).
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Loads the global configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::GlobalConfig {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Saves the global configuration to its default location.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Saves the global configuration to an explicit path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(io_err)
    }
}
