//! kuba - declarative environments from any secret manager
//!
//! A `kuba.yaml` document declares named environments whose variables come
//! from cloud secret managers, secret path prefixes, or literal values. This
//! crate resolves an environment into a flat `name -> value` map and keeps a
//! local SQLite cache so repeated runs do not hit the secret backend.
//!
//! Parsing, inheritance, interpolation and validation live in [`kuba_core`].
//! This crate adds the cache, the provider registry and secret fetching.
//!
//! # Example
//!
//! ```no_run
//! use kuba::Secrets;
//! use kuba_core::GlobalConfig;
//! use std::path::Path;
//!
//! let global = GlobalConfig::load()?;
//! let secrets = Secrets::load(Path::new("kuba.yaml"), &global)?;
//! let values = secrets.resolve("default")?;
//! println!("resolved {} variables", values.len());
//! secrets.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cache;
mod error;
pub mod provider;
mod secrets;

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;

pub use cache::{CacheEntry, CacheFilter, CacheManager, CacheStats};
pub use error::{KubaError, Result};
pub use secrets::{Secrets, export_name};
