//! # Provider System
//!
//! Secret backends implement the [`Provider`] trait and register themselves
//! at link time with [`register_provider!`](crate::register_provider). The
//! document names a backend with the environment's `provider` field (or an
//! item-level override); [`create`] turns that name plus a project into a
//! provider instance.
//!
//! ## Available Providers
//!
//! - [`LocalProvider`]: literal values declared in the document
//!
//! `gcp`, `aws`, `azure` and `openbao` are recognised names whose clients live
//! outside this crate. Until an implementation is registered for one of them,
//! [`create`] reports [`KubaError::ProviderUnavailable`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use kuba::provider::{self, ProviderConfig};
//!
//! let mut provider = provider::create("aws", &ProviderConfig::default())?;
//! let password = provider.get_secret("db-password")?;
//! provider.close()?;
//! ```

use crate::{KubaError, Result};
use kuba_core::ProviderKind;
use std::collections::{BTreeMap, HashMap};

pub mod local;
#[macro_use]
pub mod macros;

#[cfg(test)]
pub(crate) mod tests;

pub use local::{LocalConfig, LocalProvider};

/// Information about a secret backend.
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    /// The name used in documents (e.g., "gcp", "local").
    pub name: &'static str,
    pub description: &'static str,
}

impl ProviderInfo {
    pub fn display(&self) -> String {
        format!("{}: {}", self.name, self.description)
    }
}

/// Macro support types
pub use macros::{PROVIDER_REGISTRY, ProviderRegistration};

/// Settings handed to a provider factory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Cloud project or account the secrets live in. Empty when the backend
    /// does not need one.
    pub project: String,
}

impl ProviderConfig {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
        }
    }
}

/// Returns metadata for every provider compiled into this build.
pub fn providers() -> Vec<ProviderInfo> {
    PROVIDER_REGISTRY
        .iter()
        .map(|reg| reg.info.clone())
        .collect()
}

/// Whether a provider named `name` is compiled into this build.
pub fn is_available(name: &str) -> bool {
    PROVIDER_REGISTRY.iter().any(|reg| reg.info.name == name)
}

/// Creates the provider called `name` for `config.project`.
///
/// # Errors
///
/// - [`KubaError::ProviderNotFound`] if `name` is not a provider kuba knows about
/// - [`KubaError::ProviderUnavailable`] if it is known but not compiled in
pub fn create(name: &str, config: &ProviderConfig) -> Result<Box<dyn Provider>> {
    let kind: ProviderKind = name
        .parse()
        .map_err(|_| KubaError::ProviderNotFound(name.to_string()))?;

    let registration = PROVIDER_REGISTRY
        .iter()
        .find(|reg| reg.info.name == kind.as_str())
        .ok_or_else(|| KubaError::ProviderUnavailable(kind.to_string()))?;

    (registration.factory)(config)
}

/// Trait defining the interface for secret backends.
///
/// A provider instance is bound to one project. It is created for a batch
/// of lookups and closed once the batch is done.
pub trait Provider: Send + Sync {
    /// Returns the name of this provider for display purposes
    fn name(&self) -> &'static str;

    /// Fetches a single secret. `Ok(None)` means the backend has no such key.
    fn get_secret(&self, key: &str) -> Result<Option<String>>;

    /// Fetches several secrets at once.
    ///
    /// Keys the backend does not have are absent from the returned map. The
    /// default implementation calls [`Provider::get_secret`] per key; backends
    /// with a batch API should override it.
    fn get_secrets(&self, keys: &[&str]) -> Result<HashMap<String, String>> {
        let mut secrets = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.get_secret(key)? {
                secrets.insert((*key).to_string(), value);
            }
        }
        Ok(secrets)
    }

    /// Fetches every secret stored under `path`, keyed by secret name.
    fn get_secrets_by_path(&self, path: &str) -> Result<BTreeMap<String, String>>;

    /// Releases any client resources.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
