//! # Secret Cache
//!
//! Resolved secret values are cached per document, environment and variable
//! so repeated commands do not hit the secret backend every time.
//!
//! [`CacheStore`] owns the SQLite connection. [`CacheManager`] sits on top of
//! it and applies the user's cache policy: when caching is disabled globally
//! the store is never opened and every operation is a no-op.
//!
//! ```no_run
//! use kuba::cache::CacheManager;
//! use kuba_core::CacheConfig;
//! use std::path::Path;
//! use std::time::Duration;
//!
//! let cache = CacheManager::new_or_disabled(CacheConfig::enabled(Duration::from_secs(3600)));
//! let doc = Path::new("kuba.yaml");
//! if cache.get(doc, "default", "API_KEY").is_none() {
//!     cache.set(doc, "default", "API_KEY", "s3cr3t", Duration::from_secs(3600));
//! }
//! ```

pub mod store;

use chrono::TimeDelta;
use kuba_core::CacheConfig;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub use store::{CacheEntry, CacheError, CacheFilter, CacheStore, Result};

/// Summary returned by [`CacheManager::stats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheStats {
    Disabled,
    Enabled {
        total_entries: usize,
        ttl: Duration,
        per_environment: BTreeMap<String, usize>,
    },
}

/// Returns the absolute form of `path`.
///
/// Existing files are canonicalized so `./kuba.yaml` and `/work/kuba.yaml`
/// share cache rows. Paths that do not exist are made absolute against the
/// current directory.
pub fn absolute_path(path: &Path) -> PathBuf {
    path.canonicalize()
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn path_key(path: &Path) -> String {
    absolute_path(path).to_string_lossy().into_owned()
}

fn to_delta(ttl: Duration) -> TimeDelta {
    TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX)
}

/// Cache policy layer over [`CacheStore`].
pub struct CacheManager {
    config: CacheConfig,
    store: Option<CacheStore>,
}

impl CacheManager {
    /// Creates a manager from the global cache configuration.
    ///
    /// Opens the per-user store only when `config.enabled` is set.
    pub fn new(config: CacheConfig) -> Result<Self> {
        let store = if config.enabled {
            Some(CacheStore::open()?)
        } else {
            None
        };
        Ok(Self { config, store })
    }

    /// Like [`CacheManager::new`], but a store that fails to open downgrades
    /// the manager to disabled instead of failing.
    pub fn new_or_disabled(config: CacheConfig) -> Self {
        match Self::new(config) {
            Ok(manager) => manager,
            Err(e) => {
                warn!(error = %e, "cache unavailable, continuing without it");
                Self::disabled(config)
            }
        }
    }

    /// Creates an enabled manager backed by the database at `location`.
    pub fn open_at(config: CacheConfig, location: &Path) -> Result<Self> {
        let store = if config.enabled {
            Some(CacheStore::open_at(location)?)
        } else {
            None
        };
        Ok(Self { config, store })
    }

    fn disabled(config: CacheConfig) -> Self {
        Self {
            config: CacheConfig {
                enabled: false,
                ..config
            },
            store: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The cache policy for one environment: its own `cache` block when
    /// present, the global one otherwise.
    pub fn effective_config(&self, environment: Option<&CacheConfig>) -> CacheConfig {
        environment.copied().unwrap_or(self.config)
    }

    /// Looks up a cached value. Store failures are logged and read as a miss.
    pub fn get(&self, document: &Path, kuba_env: &str, name: &str) -> Option<String> {
        let store = self.store.as_ref()?;
        let path = path_key(document);
        match store.get(&path, kuba_env, name) {
            Ok(Some(value)) => {
                debug!(%path, kuba_env, name, "cache hit");
                Some(value)
            }
            Ok(None) => {
                debug!(%path, kuba_env, name, "cache miss");
                None
            }
            Err(e) => {
                warn!(error = %e, name, "cache read failed");
                None
            }
        }
    }

    /// Stores a value for `ttl`. Store failures are logged and skipped.
    pub fn set(&self, document: &Path, kuba_env: &str, name: &str, value: &str, ttl: Duration) {
        let Some(store) = &self.store else {
            return;
        };
        let path = path_key(document);
        if let Err(e) = store.set(&path, kuba_env, name, value, to_delta(ttl)) {
            warn!(error = %e, name, "cache write failed");
        }
    }

    pub fn delete(&self, document: &Path, kuba_env: &str, name: &str) -> Result<()> {
        match &self.store {
            Some(store) => store.delete(&path_key(document), kuba_env, name),
            None => Ok(()),
        }
    }

    pub fn clear(&self) -> Result<()> {
        match &self.store {
            Some(store) => store.clear(),
            None => Ok(()),
        }
    }

    pub fn clear_by_path(&self, document: &Path) -> Result<()> {
        match &self.store {
            Some(store) => store.clear_by_path(&path_key(document)),
            None => Ok(()),
        }
    }

    pub fn clear_by_env(&self, document: &Path, kuba_env: &str) -> Result<()> {
        match &self.store {
            Some(store) => store.clear_by_env(&path_key(document), kuba_env),
            None => Ok(()),
        }
    }

    /// Removes matching rows and returns how many went.
    ///
    /// A non-empty `filter.path` is made absolute before matching.
    pub fn clear_filtered(&self, filter: &CacheFilter, expired_only: bool) -> Result<usize> {
        match &self.store {
            Some(store) => store.clear_filtered(&normalize(filter), expired_only),
            None => Ok(0),
        }
    }

    /// Rewrites the expiry of matching rows to `now + ttl`.
    pub fn update_expiry(&self, filter: &CacheFilter, ttl: Duration) -> Result<usize> {
        match &self.store {
            Some(store) => store.update_expiry(&normalize(filter), to_delta(ttl)),
            None => Ok(0),
        }
    }

    pub fn list(&self) -> Result<Vec<CacheEntry>> {
        match &self.store {
            Some(store) => store.list(),
            None => Ok(Vec::new()),
        }
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let Some(store) = &self.store else {
            return Ok(CacheStats::Disabled);
        };
        let per_environment = store.count_by_env()?;
        Ok(CacheStats::Enabled {
            total_entries: per_environment.values().sum(),
            ttl: self.config.ttl,
            per_environment,
        })
    }

    /// Closes the underlying store. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        match self.store.as_mut() {
            Some(store) => store.close(),
            None => Ok(()),
        }
    }
}

fn normalize(filter: &CacheFilter) -> CacheFilter {
    let mut filter = filter.clone();
    if let Some(path) = filter.path.as_mut().filter(|p| !p.is_empty()) {
        *path = path_key(Path::new(path.as_str()));
    }
    filter
}
