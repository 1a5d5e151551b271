//! Document data model.
//!
//! A `kuba.yaml` document maps environment names to environment definitions:
//!
//! ```yaml
//! base:
//!   provider: local
//!   env:
//!     LOG_LEVEL:
//!       value: info
//!
//! default:
//!   provider: gcp
//!   project: my-project
//!   inherits: [base]
//!   cache: 1h
//!   env:
//!     DB_PASSWORD:
//!       secret-key: db-password
//!     DATABASE_URL:
//!       value: "postgres://app:${DB_USER:-app}@localhost/app"
//! ```

use crate::duration::{DEFAULT_TTL, TtlValue, format_duration, parse_ttl};
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// A parsed kuba document: environment name to environment definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    pub environments: BTreeMap<String, Environment>,
}

impl Document {
    /// Get an environment by name.
    pub fn get(&self, name: &str) -> Option<&Environment> {
        self.environments.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }

    /// Names of all declared environments, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.environments.keys().map(String::as_str)
    }
}

impl FromStr for Document {
    type Err = ConfigError;

    /// Parse a document from YAML text. An empty document yields no environments.
    fn from_str(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Ok(Document::default());
        }
        serde_yaml::from_str(s).map_err(|source| ConfigError::Yaml { path: None, source })
    }
}

impl TryFrom<&Path> for Document {
    type Error = ConfigError;

    fn try_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        content.parse::<Document>().map_err(|e| match e {
            ConfigError::Yaml { source, .. } => ConfigError::Yaml {
                path: Some(path.to_path_buf()),
                source,
            },
            other => other,
        })
    }
}

/// A named bundle of variables plus the provider context they are fetched with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub provider: String,
    #[serde(default, deserialize_with = "scalar_string")]
    pub project: String,
    #[serde(default, rename = "env", alias = "variables")]
    pub variables: BTreeMap<String, EnvItem>,
    /// Parent environments; earlier entries win over later ones.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inherits: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheConfig>,
}

/// Where a single environment variable gets its value from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EnvItem {
    #[serde(default, alias = "secret_key", skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    #[serde(default, alias = "secret_path", skip_serializing_if = "Option::is_none")]
    pub secret_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Scalar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(
        default,
        deserialize_with = "optional_scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub project: Option<String>,
}

/// The single value source of a validated [`EnvItem`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemSource<'a> {
    SecretKey(&'a str),
    SecretPath(&'a str),
    Value(&'a Scalar),
}

impl EnvItem {
    pub fn secret_key(key: impl Into<String>) -> Self {
        Self {
            secret_key: Some(key.into()),
            ..Self::default()
        }
    }

    pub fn secret_path(path: impl Into<String>) -> Self {
        Self {
            secret_path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn value(value: impl Into<Scalar>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// Number of value sources set on this item.
    pub fn source_count(&self) -> usize {
        [
            self.secret_key.is_some(),
            self.secret_path.is_some(),
            self.value.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }

    /// Returns the value source, or `None` unless exactly one is set.
    pub fn source(&self) -> Option<ItemSource<'_>> {
        if self.source_count() != 1 {
            return None;
        }
        if let Some(key) = &self.secret_key {
            Some(ItemSource::SecretKey(key))
        } else if let Some(path) = &self.secret_path {
            Some(ItemSource::SecretPath(path))
        } else {
            self.value.as_ref().map(ItemSource::Value)
        }
    }

    /// The provider this item is fetched from: its own override, else the environment's.
    pub fn effective_provider<'a>(&'a self, environment: &'a Environment) -> &'a str {
        self.provider.as_deref().unwrap_or(&environment.provider)
    }

    /// The project this item is fetched from: its own override, else the environment's.
    pub fn effective_project<'a>(&'a self, environment: &'a Environment) -> &'a str {
        self.project.as_deref().unwrap_or(&environment.project)
    }
}

/// A literal value as written in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Scalar {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    /// Canonical string form: base-10 integers, shortest round-trip floats.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::String(s)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Integer(i)
    }
}

impl From<f64> for Scalar {
    fn from(x: f64) -> Self {
        Scalar::Float(x)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?
        .map(|s| s.to_string())
        .unwrap_or_default())
}

fn optional_scalar_string<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|s| s.to_string()))
}

/// Cache policy, either global or per environment.
///
/// In a document the policy may be written as a switch (`cache: true`), a TTL
/// (`cache: 30m`, `cache: 3600`) or a table (`cache: { enabled: true, ttl: 1h }`).
/// In table form `enabled` defaults to whether a non-zero `ttl` was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCacheConfig")]
pub struct CacheConfig {
    pub enabled: bool,
    #[serde(serialize_with = "serialize_ttl")]
    pub ttl: Duration,
}

impl CacheConfig {
    pub fn enabled(ttl: Duration) -> Self {
        Self { enabled: true, ttl }
    }

    pub fn disabled() -> Self {
        Self::default()
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl: DEFAULT_TTL,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCacheConfig {
    Toggle(bool),
    Ttl(TtlValue),
    Table {
        #[serde(default)]
        enabled: Option<bool>,
        #[serde(default)]
        ttl: Option<TtlValue>,
    },
}

impl TryFrom<RawCacheConfig> for CacheConfig {
    type Error = ConfigError;

    fn try_from(raw: RawCacheConfig) -> Result<Self> {
        let config = match raw {
            RawCacheConfig::Toggle(enabled) => CacheConfig {
                enabled,
                ttl: DEFAULT_TTL,
            },
            RawCacheConfig::Ttl(ttl) => {
                let (ttl, enabled) = parse_ttl(&ttl)?;
                CacheConfig {
                    enabled,
                    ttl: if enabled { ttl } else { DEFAULT_TTL },
                }
            }
            RawCacheConfig::Table { enabled, ttl } => {
                let (ttl, ttl_enabled) = match ttl {
                    Some(ttl) => parse_ttl(&ttl)?,
                    None => (DEFAULT_TTL, false),
                };
                let enabled = enabled.unwrap_or(ttl_enabled) && !ttl.is_zero();
                CacheConfig {
                    enabled,
                    ttl: if ttl.is_zero() { DEFAULT_TTL } else { ttl },
                }
            }
        };
        Ok(config)
    }
}

fn serialize_ttl<S>(ttl: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_duration(*ttl))
}

/// Known secret backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google Cloud Secret Manager
    Gcp,
    /// AWS Secrets Manager
    Aws,
    /// Azure Key Vault
    Azure,
    /// OpenBao / Vault KV
    Openbao,
    /// Literal values only, no backend
    Local,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::Gcp,
        ProviderKind::Aws,
        ProviderKind::Azure,
        ProviderKind::Openbao,
        ProviderKind::Local,
    ];

    /// Get the canonical identifier used in documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gcp => "gcp",
            ProviderKind::Aws => "aws",
            ProviderKind::Azure => "azure",
            ProviderKind::Openbao => "openbao",
            ProviderKind::Local => "local",
        }
    }

    /// Whether environments using this provider must name a project.
    pub fn requires_project(&self) -> bool {
        matches!(self, ProviderKind::Gcp)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown provider '{}'", s))
    }
}
