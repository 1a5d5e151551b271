//! The resolution pipeline: parse, inherit, interpolate, validate.

use crate::config::{Document, Environment};
use crate::error::{ConfigError, Phase, Result};
use crate::interpolate::{Lookup, ProcessEnv};
use crate::{inherit, interpolate, validate};
use std::path::Path;
use tracing::debug;

/// Loads and fully resolves the document at `path`.
///
/// Stops at the first failure; errors are wrapped with the [`Phase`] they
/// came from.
pub fn load_document(path: &Path) -> Result<Document> {
    load_document_with(path, &ProcessEnv)
}

/// Like [`load_document`], with an explicit fallback for interpolation.
pub fn load_document_with(path: &Path, fallback: &dyn Lookup) -> Result<Document> {
    let document = Document::try_from(path).map_err(|e| e.in_phase(Phase::Parse))?;
    debug!(path = %path.display(), environments = document.environments.len(), "parsed document");
    resolve_with(document, fallback)
}

/// Loads the document at `path` and returns the resolved environment `name`.
pub fn load_environment(path: &Path, name: &str) -> Result<Environment> {
    load_environment_with(path, name, &ProcessEnv)
}

pub fn load_environment_with(
    path: &Path,
    name: &str,
    fallback: &dyn Lookup,
) -> Result<Environment> {
    let mut document = load_document_with(path, fallback)?;
    document
        .environments
        .remove(name)
        .ok_or_else(|| ConfigError::EnvironmentNotFound(name.to_string()))
}

/// Resolves an already parsed document against the process environment.
pub fn resolve(document: Document) -> Result<Document> {
    resolve_with(document, &ProcessEnv)
}

/// Runs inheritance, interpolation and validation over a parsed document.
pub fn resolve_with(document: Document, fallback: &dyn Lookup) -> Result<Document> {
    let document =
        inherit::resolve_document(&document).map_err(|e| e.in_phase(Phase::Inheritance))?;
    let document = interpolate::interpolate_with(document, fallback)
        .map_err(|e| e.in_phase(Phase::Interpolation))?;
    validate::validate(&document).map_err(|e| e.in_phase(Phase::Validation))?;
    Ok(document)
}
