//! SQLite-backed storage for cached secret values.
//!
//! One table keyed by `(path, kuba_env, env)`: the absolute document path,
//! the kuba environment name and the variable name. Timestamps are Unix
//! milliseconds and a row is live while `expires_at > now`.

use chrono::{DateTime, TimeDelta, Utc};
use directories::ProjectDirs;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS cache (
    path TEXT NOT NULL,
    kuba_env TEXT NOT NULL,
    env TEXT NOT NULL,
    value TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL,
    PRIMARY KEY (path, kuba_env, env)
);
CREATE INDEX IF NOT EXISTS idx_cache_expires_at ON cache(expires_at);
";

/// Errors raised by the cache store.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not determine the user cache directory")]
    NoCacheDir,
    #[error("cache store is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, CacheError>;

/// A single cached variable value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    /// Absolute path of the document the value was resolved from
    pub path: String,
    /// Name of the kuba environment
    pub kuba_env: String,
    /// Name of the environment variable
    pub env: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            path: row.get(0)?,
            kuba_env: row.get(1)?,
            env: row.get(2)?,
            value: row.get(3)?,
            created_at: from_millis(row.get(4)?),
            expires_at: from_millis(row.get(5)?),
        })
    }
}

/// Row selection for bulk operations.
///
/// Unset or empty fields match every row. `name` matches the variable name
/// column, the same column as `env` on [`CacheEntry`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheFilter {
    pub path: Option<String>,
    pub kuba_env: Option<String>,
    pub name: Option<String>,
}

impl CacheFilter {
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn kuba_env(mut self, kuba_env: impl Into<String>) -> Self {
        self.kuba_env = Some(kuba_env.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn conditions(&self) -> (Vec<&'static str>, Vec<Value>) {
        let mut clauses = Vec::new();
        let mut values = Vec::new();
        for (column, filter) in [
            ("path = ?", &self.path),
            ("kuba_env = ?", &self.kuba_env),
            ("env = ?", &self.name),
        ] {
            if let Some(filter) = filter.as_deref().filter(|f| !f.is_empty()) {
                clauses.push(column);
                values.push(Value::Text(filter.to_string()));
            }
        }
        (clauses, values)
    }
}

fn where_clause(clauses: &[&str]) -> String {
    if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Persistent cache of resolved secret values.
///
/// The connection is released by [`CacheStore::close`] or when the store is
/// dropped; every operation on a closed store fails with [`CacheError::Closed`].
pub struct CacheStore {
    conn: Option<Connection>,
    location: PathBuf,
}

impl CacheStore {
    /// Gets the path of the per-user cache database.
    ///
    /// Typically `~/.cache/kuba/cache.db` on Linux.
    pub fn default_location() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "kuba").ok_or(CacheError::NoCacheDir)?;
        Ok(dirs.cache_dir().join("cache.db"))
    }

    /// Opens the per-user cache database, creating it if needed.
    pub fn open() -> Result<Self> {
        Self::open_at(&Self::default_location()?)
    }

    /// Opens (or creates) a cache database at `location`.
    ///
    /// Expired rows are swept on open. A failing sweep is logged and does not
    /// prevent the store from opening.
    pub fn open_at(location: &Path) -> Result<Self> {
        if let Some(parent) = location.parent() {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(location)?;
        conn.execute_batch(SCHEMA)?;

        let store = Self {
            conn: Some(conn),
            location: location.to_path_buf(),
        };

        match store.sweep_expired() {
            Ok(0) => {}
            Ok(swept) => debug!(swept, "removed expired cache entries"),
            Err(e) => warn!(error = %e, "failed to sweep expired cache entries"),
        }

        Ok(store)
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(CacheError::Closed)
    }

    fn sweep_expired(&self) -> Result<usize> {
        Ok(self
            .conn()?
            .execute("DELETE FROM cache WHERE expires_at <= ?1", params![now_millis()])?)
    }

    /// Returns the cached value, or `None` if it is absent or expired.
    pub fn get(&self, path: &str, kuba_env: &str, env: &str) -> Result<Option<String>> {
        Ok(self
            .conn()?
            .query_row(
                "SELECT value FROM cache
                 WHERE path = ?1 AND kuba_env = ?2 AND env = ?3 AND expires_at > ?4",
                params![path, kuba_env, env, now_millis()],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Inserts or replaces a value that expires `ttl` from now.
    ///
    /// A zero or negative `ttl` is accepted and stores an already expired row.
    pub fn set(
        &self,
        path: &str,
        kuba_env: &str,
        env: &str,
        value: &str,
        ttl: TimeDelta,
    ) -> Result<()> {
        let now = now_millis();
        let expires_at = now.saturating_add(ttl.num_milliseconds());
        self.conn()?.execute(
            "INSERT INTO cache (path, kuba_env, env, value, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (path, kuba_env, env) DO UPDATE SET
                value = excluded.value,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at",
            params![path, kuba_env, env, value, now, expires_at],
        )?;
        Ok(())
    }

    /// Removes a single row. Removing a missing row is not an error.
    pub fn delete(&self, path: &str, kuba_env: &str, env: &str) -> Result<()> {
        self.conn()?.execute(
            "DELETE FROM cache WHERE path = ?1 AND kuba_env = ?2 AND env = ?3",
            params![path, kuba_env, env],
        )?;
        Ok(())
    }

    /// Removes every row.
    pub fn clear(&self) -> Result<()> {
        self.conn()?.execute("DELETE FROM cache", [])?;
        Ok(())
    }

    /// Removes every row cached for the document at `path`.
    pub fn clear_by_path(&self, path: &str) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM cache WHERE path = ?1", params![path])?;
        Ok(())
    }

    /// Removes every row cached for one environment of one document.
    pub fn clear_by_env(&self, path: &str, kuba_env: &str) -> Result<()> {
        self.conn()?.execute(
            "DELETE FROM cache WHERE path = ?1 AND kuba_env = ?2",
            params![path, kuba_env],
        )?;
        Ok(())
    }

    /// Removes the rows matching `filter` and returns how many were removed.
    ///
    /// With `expired_only`, live rows are kept whatever the filter says.
    pub fn clear_filtered(&self, filter: &CacheFilter, expired_only: bool) -> Result<usize> {
        let (mut clauses, mut values) = filter.conditions();
        if expired_only {
            clauses.push("expires_at <= ?");
            values.push(Value::Integer(now_millis()));
        }

        let sql = format!("DELETE FROM cache{}", where_clause(&clauses));
        Ok(self.conn()?.execute(&sql, params_from_iter(values))?)
    }

    /// Sets `expires_at = now + ttl` on the rows matching `filter`, expired or
    /// not, and returns how many were updated.
    pub fn update_expiry(&self, filter: &CacheFilter, ttl: TimeDelta) -> Result<usize> {
        let (clauses, filter_values) = filter.conditions();
        let expires_at = now_millis().saturating_add(ttl.num_milliseconds());

        let mut values = vec![Value::Integer(expires_at)];
        values.extend(filter_values);

        let sql = format!("UPDATE cache SET expires_at = ?{}", where_clause(&clauses));
        Ok(self.conn()?.execute(&sql, params_from_iter(values))?)
    }

    /// Lists live rows ordered by path, environment and variable name.
    pub fn list(&self) -> Result<Vec<CacheEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT path, kuba_env, env, value, created_at, expires_at
             FROM cache
             WHERE expires_at > ?1
             ORDER BY path, kuba_env, env",
        )?;
        let entries = stmt
            .query_map(params![now_millis()], CacheEntry::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Counts live rows per kuba environment.
    pub fn count_by_env(&self) -> Result<BTreeMap<String, usize>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT kuba_env, COUNT(*) FROM cache
             WHERE expires_at > ?1
             GROUP BY kuba_env",
        )?;
        let counts = stmt
            .query_map(params![now_millis()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
            })?
            .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;
        Ok(counts)
    }

    /// Releases the database connection. Calling it again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| CacheError::Sqlite(e))?;
        }
        Ok(())
    }
}
