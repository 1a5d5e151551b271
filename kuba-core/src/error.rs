//! Errors raised while loading and resolving kuba documents

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when parsing, resolving or validating a kuba document.
///
/// Every variant is fatal for the command that triggered it: the loader stops
/// at the first failure and never hands back a partially resolved document.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// I/O error when reading a document or the global configuration
    #[error("failed to read '{path}': {source}")]
    Io { path: PathBuf, source: io::Error },

    /// The document is not valid YAML or does not match the expected shape
    #[error("failed to parse {}: {source}", origin(.path))]
    Yaml {
        path: Option<PathBuf>,
        source: serde_yaml::Error,
    },

    /// The global configuration file is not valid TOML
    #[error("failed to parse global configuration '{path}': {source}")]
    GlobalConfig {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to serialize global configuration: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("could not determine the user configuration directory")]
    NoConfigDir,

    #[error("circular inheritance detected at environment '{0}'")]
    Cycle(String),

    #[error("environment '{environment}' inherits from unknown environment '{parent}'")]
    UnknownEnvironment { environment: String, parent: String },

    #[error("environment '{0}' not found")]
    EnvironmentNotFound(String),

    #[error("environment '{environment}', variable '{variable}': {reason}")]
    Interpolation {
        environment: String,
        variable: String,
        reason: String,
    },

    #[error("environment '{environment}': {reason}")]
    Validation { environment: String, reason: String },

    #[error("invalid duration '{0}'")]
    InvalidDuration(String),

    /// A failure annotated with the loader phase it happened in
    #[error("{phase}: {source}")]
    Phase {
        phase: Phase,
        #[source]
        source: Box<ConfigError>,
    },
}

impl ConfigError {
    /// Strips any [`ConfigError::Phase`] wrappers and returns the underlying error.
    pub fn root(&self) -> &ConfigError {
        match self {
            ConfigError::Phase { source, .. } => source.root(),
            other => other,
        }
    }

    pub(crate) fn in_phase(self, phase: Phase) -> Self {
        ConfigError::Phase {
            phase,
            source: Box::new(self),
        }
    }
}

/// The stage of the loading pipeline an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Parse,
    Inheritance,
    Interpolation,
    Validation,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Phase::Parse => "parse",
            Phase::Inheritance => "inheritance",
            Phase::Interpolation => "interpolation",
            Phase::Validation => "validation",
        })
    }
}

fn origin(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!("'{}'", path.display()),
        None => "document".to_string(),
    }
}

/// A type alias for `Result<T, ConfigError>`.
pub type Result<T> = std::result::Result<T, ConfigError>;
