//! Environment inheritance.
//!
//! An environment lists parents in `inherits`. Its resolved variable set is
//! built from the parents in declaration order, where the first parent that
//! defines a variable wins over later parents, and then overlaid with the
//! environment's own variables, which always win.

use crate::config::{Document, EnvItem};
use crate::error::{ConfigError, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::trace;

/// Resolved variable set of a single environment.
pub type Variables = BTreeMap<String, EnvItem>;

/// Depth-first inheritance resolver with memoization and cycle detection.
///
/// A resolver borrows the document it resolves and remembers every
/// environment it has finished, so each parent is merged at most once no
/// matter how many descendants depend on it.
pub struct Resolver<'a> {
    document: &'a Document,
    resolved: HashMap<String, Variables>,
    resolving: HashSet<String>,
}

impl<'a> Resolver<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self {
            document,
            resolved: HashMap::new(),
            resolving: HashSet::new(),
        }
    }

    /// Resolves the full variable set of `name`.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::EnvironmentNotFound`] if `name` is not declared
    /// - [`ConfigError::UnknownEnvironment`] if an `inherits` entry is not declared
    /// - [`ConfigError::Cycle`] if `name` transitively inherits from itself
    pub fn resolve(&mut self, name: &str) -> Result<Variables> {
        if !self.document.environments.contains_key(name) {
            return Err(ConfigError::EnvironmentNotFound(name.to_string()));
        }
        self.resolve_inner(name)
    }

    fn resolve_inner(&mut self, name: &str) -> Result<Variables> {
        if let Some(done) = self.resolved.get(name) {
            return Ok(done.clone());
        }
        if !self.resolving.insert(name.to_string()) {
            return Err(ConfigError::Cycle(name.to_string()));
        }

        let document = self.document;
        let environment = &document.environments[name];

        let mut merged = Variables::new();
        for parent in &environment.inherits {
            if !document.environments.contains_key(parent) {
                return Err(ConfigError::UnknownEnvironment {
                    environment: name.to_string(),
                    parent: parent.clone(),
                });
            }
            for (key, item) in self.resolve_inner(parent)? {
                merged.entry(key).or_insert(item);
            }
        }

        for (key, item) in &environment.variables {
            merged.insert(key.clone(), item.clone());
        }

        trace!(environment = name, variables = merged.len(), "resolved inheritance");
        self.resolving.remove(name);
        self.resolved.insert(name.to_string(), merged.clone());
        Ok(merged)
    }
}

/// Resolves the variable set of a single environment.
pub fn resolve(document: &Document, name: &str) -> Result<Variables> {
    Resolver::new(document).resolve(name)
}

/// Returns a copy of `document` in which every environment's variables are
/// replaced by its fully inherited variable set.
pub fn resolve_document(document: &Document) -> Result<Document> {
    let mut resolver = Resolver::new(document);
    let mut out = document.clone();
    for (name, environment) in out.environments.iter_mut() {
        environment.variables = resolver.resolve(name)?;
    }
    Ok(out)
}
