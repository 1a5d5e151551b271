//! # kuba core
//!
//! Type definitions and the resolution pipeline for kuba documents.
//!
//! A `kuba.yaml` document declares named environments. Each environment picks
//! a secret backend (`gcp`, `aws`, `azure`, `openbao` or `local`), may inherit
//! variables from other environments, and maps variable names to a secret key,
//! a secret path prefix, or a literal value. Literal values and a handful of
//! metadata fields may reference other variables with `${NAME}` or
//! `${NAME:-default}`.
//!
//! [`loader::load_environment`] runs the whole pipeline and hands back a
//! validated [`Environment`] ready for secret fetching:
//!
//! ```no_run
//! use std::path::Path;
//!
//! let env = kuba_core::load_environment(Path::new("kuba.yaml"), "default")?;
//! for (name, item) in &env.variables {
//!     println!("{} <- {:?}", name, item.source());
//! }
//! # Ok::<(), kuba_core::ConfigError>(())
//! ```

pub mod config;
pub mod duration;
mod error;
pub mod global;
pub mod inherit;
pub mod interpolate;
pub mod loader;
pub mod validate;

pub use config::{CacheConfig, Document, EnvItem, Environment, ItemSource, ProviderKind, Scalar};
pub use duration::{DEFAULT_TTL, format_duration, parse_duration};
pub use error::{ConfigError, Phase, Result};
pub use global::{GlobalConfig, GlobalDefaults};
pub use loader::{load_document, load_environment};
