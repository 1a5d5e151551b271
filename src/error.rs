//! Error types for kuba operations

use crate::cache::CacheError;
use kuba_core::ConfigError;
use thiserror::Error;

/// The main error type for kuba operations
///
/// This enum represents all possible errors that can occur when resolving
/// environments, talking to the cache, or fetching secrets from a provider.
#[derive(Error, Debug)]
pub enum KubaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Provider backend '{0}' not found")]
    ProviderNotFound(String),
    #[error(
        "Provider backend '{0}' is not available in this build.\n\nRegister an implementation with `kuba::register_provider!` or use the 'local' provider."
    )]
    ProviderUnavailable(String),
    #[error("Provider operation failed: {0}")]
    ProviderOperationFailed(String),
    #[error("Secret '{key}' not found (variable '{variable}')")]
    SecretNotFound { variable: String, key: String },
}

/// A type alias for `Result<T, KubaError>`
pub type Result<T> = std::result::Result<T, KubaError>;
