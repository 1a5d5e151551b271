//! Turns a resolved environment into its final `name -> value` map.

use crate::cache::CacheManager;
use crate::error::{KubaError, Result};
use crate::provider::{self, Provider, ProviderConfig};
use kuba_core::{
    ConfigError, Document, EnvItem, Environment, GlobalConfig, ItemSource, load_document,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

type ProviderFactory = Box<dyn Fn(&str, &ProviderConfig) -> Result<Box<dyn Provider>>>;

/// The main entry point for the kuba library
///
/// `Secrets` holds a resolved document together with the cache, and fetches
/// the values of one environment at a time.
///
/// # Example
///
/// ```no_run
/// use kuba::Secrets;
/// use kuba_core::GlobalConfig;
/// use std::path::Path;
///
/// let secrets = Secrets::load(Path::new("kuba.yaml"), &GlobalConfig::load()?)?;
/// for (name, value) in secrets.resolve("default")? {
///     println!("{}={}", name, value);
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Secrets {
    path: PathBuf,
    document: Document,
    cache: CacheManager,
    factory: ProviderFactory,
}

impl Secrets {
    /// Creates a `Secrets` from an already resolved document.
    ///
    /// `path` is the document's location and keys its cache rows.
    pub fn new(path: impl Into<PathBuf>, document: Document, cache: CacheManager) -> Self {
        Self {
            path: path.into(),
            document,
            cache,
            factory: Box::new(provider::create),
        }
    }

    /// Loads and resolves the document at `path`, with the cache configured
    /// from `global`. A cache that cannot be opened is skipped.
    pub fn load(path: &Path, global: &GlobalConfig) -> Result<Self> {
        let document = load_document(path)?;
        let cache = CacheManager::new_or_disabled(global.cache);
        Ok(Self::new(path, document, cache))
    }

    /// Replaces how providers are built. Defaults to [`provider::create`].
    pub fn with_provider_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&str, &ProviderConfig) -> Result<Box<dyn Provider>> + 'static,
    {
        self.factory = Box::new(factory);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn environment(&self, name: &str) -> Result<&Environment> {
        self.document
            .get(name)
            .ok_or_else(|| ConfigError::EnvironmentNotFound(name.to_string()).into())
    }

    /// Fetches every variable of environment `name`.
    ///
    /// Literal values are used as is. Secrets are read from the cache when the
    /// environment's cache policy allows it; the rest are fetched in one batch
    /// per `(provider, project)` pair and written back to the cache.
    ///
    /// A `secret-path` variable `DB` exports each secret under its prefix as
    /// `DB_<NAME>`. Declared variables win over exported names that collide.
    pub fn resolve(&self, name: &str) -> Result<BTreeMap<String, String>> {
        let environment = self.environment(name)?;
        let ttl = self.cache_ttl(environment);

        let mut values = BTreeMap::new();
        let mut exported = BTreeMap::new();
        let mut pending: BTreeMap<(&str, &str), Vec<(&str, &EnvItem)>> = BTreeMap::new();

        for (variable, item) in &environment.variables {
            match item.source() {
                Some(ItemSource::Value(value)) => {
                    values.insert(variable.clone(), value.to_string());
                }
                Some(ItemSource::SecretKey(_)) => {
                    if let Some(value) = self.cached(ttl, name, variable) {
                        values.insert(variable.clone(), value);
                        continue;
                    }
                    pending
                        .entry(provider_key(item, environment))
                        .or_default()
                        .push((variable.as_str(), item));
                }
                Some(ItemSource::SecretPath(_)) => {
                    if let Some(map) = self.cached_map(ttl, name, variable) {
                        export(variable, &map, &mut exported);
                        continue;
                    }
                    pending
                        .entry(provider_key(item, environment))
                        .or_default()
                        .push((variable.as_str(), item));
                }
                None => {
                    return Err(ConfigError::Validation {
                        environment: name.to_string(),
                        reason: format!(
                            "variable '{}': one of secret-key, secret-path or value is required",
                            variable
                        ),
                    }
                    .into());
                }
            }
        }

        for ((provider_name, project), items) in pending {
            debug!(
                provider = provider_name,
                project,
                count = items.len(),
                "fetching secrets"
            );
            let mut provider = (self.factory)(provider_name, &ProviderConfig::new(project))?;
            let fetched = self.fetch(
                provider.as_ref(),
                name,
                ttl,
                &items,
                &mut values,
                &mut exported,
            );
            if let Err(e) = provider.close() {
                warn!(provider = provider_name, error = %e, "failed to close provider");
            }
            fetched?;
        }

        for (key, value) in exported {
            values.entry(key).or_insert(value);
        }
        Ok(values)
    }

    /// Closes the cache.
    pub fn close(mut self) -> Result<()> {
        self.cache.close()?;
        Ok(())
    }

    /// The TTL to cache with, or `None` when this environment is not cached.
    fn cache_ttl(&self, environment: &Environment) -> Option<Duration> {
        if !self.cache.is_enabled() {
            return None;
        }
        let policy = self.cache.effective_config(environment.cache.as_ref());
        (policy.enabled && !policy.ttl.is_zero()).then_some(policy.ttl)
    }

    fn cached(&self, ttl: Option<Duration>, kuba_env: &str, variable: &str) -> Option<String> {
        if ttl.is_none() {
            return None;
        }
        self.cache.get(&self.path, kuba_env, variable)
    }

    fn cached_map(
        &self,
        ttl: Option<Duration>,
        kuba_env: &str,
        variable: &str,
    ) -> Option<BTreeMap<String, String>> {
        let raw = self.cached(ttl, kuba_env, variable)?;
        match serde_json::from_str(&raw) {
            Ok(map) => Some(map),
            Err(e) => {
                warn!(variable, error = %e, "ignoring unreadable cached secret path");
                None
            }
        }
    }

    fn fetch(
        &self,
        provider: &dyn Provider,
        kuba_env: &str,
        ttl: Option<Duration>,
        items: &[(&str, &EnvItem)],
        values: &mut BTreeMap<String, String>,
        exported: &mut BTreeMap<String, String>,
    ) -> Result<()> {
        let keys: Vec<&str> = items
            .iter()
            .filter_map(|(_, item)| item.secret_key.as_deref())
            .collect();

        let secrets = if keys.is_empty() {
            Default::default()
        } else {
            provider.get_secrets(&keys)?
        };

        for (variable, item) in items {
            if let Some(key) = item.secret_key.as_deref() {
                let value = secrets
                    .get(key)
                    .ok_or_else(|| KubaError::SecretNotFound {
                        variable: variable.to_string(),
                        key: key.to_string(),
                    })?
                    .clone();
                if let Some(ttl) = ttl {
                    self.cache.set(&self.path, kuba_env, variable, &value, ttl);
                }
                values.insert(variable.to_string(), value);
            } else if let Some(path) = item.secret_path.as_deref() {
                let map: BTreeMap<String, String> = provider
                    .get_secrets_by_path(path)?
                    .into_iter()
                    .map(|(key, value)| (relative_name(path, &key).to_string(), value))
                    .collect();
                if let Some(ttl) = ttl {
                    let raw = serde_json::to_string(&map)?;
                    self.cache.set(&self.path, kuba_env, variable, &raw, ttl);
                }
                export(variable, &map, exported);
            }
        }

        Ok(())
    }
}

fn provider_key<'a>(item: &'a EnvItem, environment: &'a Environment) -> (&'a str, &'a str) {
    (
        item.effective_provider(environment),
        item.effective_project(environment),
    )
}

/// Strips `prefix` from a secret name returned by a path listing.
fn relative_name<'a>(prefix: &str, key: &'a str) -> &'a str {
    key.strip_prefix(prefix)
        .map(|rest| rest.trim_start_matches('/'))
        .filter(|rest| !rest.is_empty())
        .unwrap_or(key)
}

/// Builds the exported variable name for a secret found under a path.
///
/// `export_name("DB", "primary-host")` is `DB_PRIMARY_HOST`.
pub fn export_name(variable: &str, secret: &str) -> String {
    let suffix: String = secret
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_{}", variable, suffix.trim_matches('_'))
}

fn export(variable: &str, map: &BTreeMap<String, String>, out: &mut BTreeMap<String, String>) {
    for (secret, value) in map {
        out.insert(export_name(variable, secret), value.clone());
    }
}
