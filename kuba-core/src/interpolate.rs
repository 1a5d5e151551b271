//! `${NAME}` / `${NAME:-default}` placeholder expansion.
//!
//! A placeholder is looked up, in order, in the environment's other resolved
//! values, then in the process environment, then falls back to its default.
//! A placeholder that matches nothing and has no default is left in the
//! output verbatim so unresolved references stay visible.
//!
//! Expansion runs in two phases per environment:
//!
//! 1. `value` items are expanded repeatedly until nothing changes (bounded by
//!    twice the number of variables), since values may reference each other.
//! 2. The environment `project` and each item's `secret-key`, `secret-path`
//!    and `project` are expanded once against the phase 1 results.

use crate::config::{Document, Environment, Scalar};
use crate::error::{ConfigError, Result};
use std::collections::{BTreeMap, HashMap};
use std::env;
use tracing::trace;

/// A source of variables consulted after an environment's own values.
pub trait Lookup {
    fn lookup(&self, name: &str) -> Option<String>;
}

/// Reads from the current process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Lookup for ProcessEnv {
    fn lookup(&self, name: &str) -> Option<String> {
        env::var(name).ok()
    }
}

impl Lookup for HashMap<String, String> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl Lookup for BTreeMap<String, String> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Expands every environment of `document` against the process environment.
pub fn interpolate(document: Document) -> Result<Document> {
    interpolate_with(document, &ProcessEnv)
}

/// Expands every environment of `document` against `fallback`.
pub fn interpolate_with(mut document: Document, fallback: &dyn Lookup) -> Result<Document> {
    for (name, environment) in document.environments.iter_mut() {
        *environment = interpolate_environment(name, std::mem::take(environment), fallback)?;
    }
    Ok(document)
}

/// Expands a single environment. `name` is only used for error context.
pub fn interpolate_environment(
    name: &str,
    mut environment: Environment,
    fallback: &dyn Lookup,
) -> Result<Environment> {
    let fail = |variable: &str, reason: String| ConfigError::Interpolation {
        environment: name.to_string(),
        variable: variable.to_string(),
        reason,
    };

    // Phase 1: values, to a fixed point. Each pass re-expands the raw text, and
    // a value never reads its own previous result.
    let raw: Vec<(String, String)> = environment
        .variables
        .iter()
        .filter_map(|(key, item)| item.value.as_ref().map(|v| (key.clone(), v.to_string())))
        .collect();
    let mut resolved: BTreeMap<String, String> = BTreeMap::new();

    let max_iterations = 2 * environment.variables.len();
    for iteration in 0..max_iterations {
        let mut changed = false;
        for (key, text) in &raw {
            let previous = resolved.remove(key);
            let next = expand(text, &resolved, fallback).map_err(|e| fail(key, e))?;
            if previous.as_ref() != Some(&next) {
                changed = true;
            }
            resolved.insert(key.clone(), next);
        }
        if !changed {
            trace!(environment = name, iterations = iteration + 1, "values converged");
            break;
        }
    }

    for (key, _) in &raw {
        if let Some(item) = environment.variables.get_mut(key) {
            item.value = Some(Scalar::String(resolved[key].clone()));
        }
    }

    // Phase 2: metadata fields, single pass.
    environment.project =
        expand(&environment.project, &resolved, fallback).map_err(|e| fail("project", e))?;

    for (key, item) in environment.variables.iter_mut() {
        for field in [
            &mut item.secret_key,
            &mut item.secret_path,
            &mut item.project,
        ] {
            if let Some(text) = field.as_mut() {
                *text = expand(text, &resolved, fallback).map_err(|e| fail(key, e))?;
            }
        }
    }

    Ok(environment)
}

/// Expands the placeholders in `input` once.
///
/// Returns an error message only for an opening `${` without a closing `}`.
pub fn expand(
    input: &str,
    local: &BTreeMap<String, String>,
    fallback: &dyn Lookup,
) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(close) = after_open.find('}') else {
            return Err(format!(
                "unclosed placeholder '{}' (missing '}}')",
                &rest[start..]
            ));
        };

        let body = &after_open[..close];
        let (name, default) = match body.split_once(":-") {
            Some((name, default)) => (name, Some(default)),
            None => (body, None),
        };

        match local
            .get(name)
            .cloned()
            .or_else(|| fallback.lookup(name))
            .or_else(|| default.map(str::to_string))
        {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[start..start + 2 + close + 1]),
        }

        rest = &after_open[close + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvItem;

    fn lookup(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn environment(vars: Vec<(&str, EnvItem)>) -> Environment {
        Environment {
            provider: "gcp".into(),
            project: "proj".into(),
            variables: vars.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            ..Environment::default()
        }
    }

    fn value(env: &Environment, key: &str) -> String {
        env.variables[key].value.as_ref().unwrap().to_string()
    }

    #[test]
    fn test_fixed_point_chain() {
        let env = environment(vec![
            ("X", EnvItem::value("${Y}")),
            ("Y", EnvItem::value("${Z}")),
            ("Z", EnvItem::value("v")),
        ]);

        let env = interpolate_environment("test", env, &lookup(&[])).unwrap();
        assert_eq!(value(&env, "X"), "v");
        assert_eq!(value(&env, "Y"), "v");
        assert_eq!(value(&env, "Z"), "v");
    }

    #[test]
    fn test_default_fallback() {
        let env = environment(vec![("X", EnvItem::value("${UNSET_VAR:-fallback}"))]);
        let env = interpolate_environment("test", env, &lookup(&[])).unwrap();
        assert_eq!(value(&env, "X"), "fallback");
    }

    #[test]
    fn test_empty_default() {
        let env = environment(vec![("X", EnvItem::value("a${UNSET_VAR:-}b"))]);
        let env = interpolate_environment("test", env, &lookup(&[])).unwrap();
        assert_eq!(value(&env, "X"), "ab");
    }

    #[test]
    fn test_undefined_passthrough() {
        let env = environment(vec![("X", EnvItem::value("${UNSET_VAR}"))]);
        let env = interpolate_environment("test", env, &lookup(&[])).unwrap();
        assert_eq!(value(&env, "X"), "${UNSET_VAR}");
    }

    #[test]
    fn test_process_env_fallback() {
        let env = environment(vec![("URL", EnvItem::value("http://${HOST}:${PORT:-80}/"))]);
        let fallback = lookup(&[("HOST", "example.com"), ("PORT", "8080")]);
        let env = interpolate_environment("test", env, &fallback).unwrap();
        assert_eq!(value(&env, "URL"), "http://example.com:8080/");
    }

    #[test]
    fn test_local_beats_process_env() {
        let env = environment(vec![
            ("HOST", EnvItem::value("local.test")),
            ("URL", EnvItem::value("${HOST}")),
        ]);
        let fallback = lookup(&[("HOST", "process.test")]);
        let env = interpolate_environment("test", env, &fallback).unwrap();
        assert_eq!(value(&env, "URL"), "local.test");
    }

    #[test]
    fn test_non_string_scalars_are_normalized() {
        let env = environment(vec![
            ("PORT", EnvItem::value(8080_i64)),
            ("RATIO", EnvItem::value(0.5)),
            ("DEBUG", EnvItem::value(true)),
            ("ADDR", EnvItem::value("0.0.0.0:${PORT}")),
        ]);

        let env = interpolate_environment("test", env, &lookup(&[])).unwrap();
        assert_eq!(
            env.variables["PORT"].value,
            Some(Scalar::String("8080".into()))
        );
        assert_eq!(
            env.variables["RATIO"].value,
            Some(Scalar::String("0.5".into()))
        );
        assert_eq!(
            env.variables["DEBUG"].value,
            Some(Scalar::String("true".into()))
        );
        assert_eq!(value(&env, "ADDR"), "0.0.0.0:8080");
    }

    #[test]
    fn test_self_reference_reads_process_env() {
        let env = environment(vec![("PATH_X", EnvItem::value("${PATH_X}:/extra"))]);
        let fallback = lookup(&[("PATH_X", "/usr/bin")]);
        let env = interpolate_environment("test", env, &fallback).unwrap();
        assert_eq!(value(&env, "PATH_X"), "/usr/bin:/extra");
    }

    #[test]
    fn test_unset_self_reference_stays_verbatim() {
        let env = environment(vec![("X", EnvItem::value("a${X}"))]);
        let env = interpolate_environment("test", env, &lookup(&[])).unwrap();
        assert_eq!(value(&env, "X"), "a${X}");
    }

    #[test]
    fn test_same_name_reference_reaches_process_env() {
        let env = environment(vec![
            ("HOST", EnvItem::value("${HOST}")),
            ("URL", EnvItem::value("http://${HOST}/")),
        ]);
        let fallback = lookup(&[("HOST", "example.com")]);
        let env = interpolate_environment("test", env, &fallback).unwrap();
        assert_eq!(value(&env, "HOST"), "example.com");
        assert_eq!(value(&env, "URL"), "http://example.com/");
    }

    #[test]
    fn test_reference_cycle_terminates() {
        let env = environment(vec![
            ("A", EnvItem::value("${B}")),
            ("B", EnvItem::value("${A}")),
        ]);
        let env = interpolate_environment("test", env, &lookup(&[])).unwrap();
        assert_eq!(value(&env, "A"), "${B}");
        assert_eq!(value(&env, "B"), "${B}");
    }

    #[test]
    fn test_metadata_fields_use_resolved_values() {
        let mut item = EnvItem::secret_key("${PREFIX}-db-password");
        item.project = Some("${PROJECT_ID}".into());
        let mut path_item = EnvItem::secret_path("${PREFIX}/${MISSING}");
        path_item.provider = Some("gcp".into());

        let mut env = environment(vec![
            ("PREFIX", EnvItem::value("staging")),
            ("DB_PASSWORD", item),
            ("DB", path_item),
        ]);
        env.project = "${GCP_PROJECT:-default-project}".into();

        let fallback = lookup(&[("PROJECT_ID", "from-env")]);
        let env = interpolate_environment("test", env, &fallback).unwrap();

        assert_eq!(env.project, "default-project");
        assert_eq!(
            env.variables["DB_PASSWORD"].secret_key.as_deref(),
            Some("staging-db-password")
        );
        assert_eq!(
            env.variables["DB_PASSWORD"].project.as_deref(),
            Some("from-env")
        );
        assert_eq!(
            env.variables["DB"].secret_path.as_deref(),
            Some("staging/${MISSING}")
        );
    }

    #[test]
    fn test_unclosed_placeholder_is_an_error() {
        let env = environment(vec![("X", EnvItem::value("${BROKEN"))]);
        match interpolate_environment("dev", env, &lookup(&[])) {
            Err(ConfigError::Interpolation {
                environment,
                variable,
                ..
            }) => {
                assert_eq!(environment, "dev");
                assert_eq!(variable, "X");
            }
            other => panic!("expected interpolation error, got {:?}", other),
        }
    }

    #[test]
    fn test_expand_plain_text() {
        let local = BTreeMap::new();
        assert_eq!(
            expand("no placeholders $HOME {x}", &local, &lookup(&[])).unwrap(),
            "no placeholders $HOME {x}"
        );
    }

    #[test]
    fn test_interpolate_document_covers_every_environment() {
        let mut document = Document::default();
        document.environments.insert(
            "a".into(),
            environment(vec![("X", EnvItem::value("${V:-a}"))]),
        );
        document.environments.insert(
            "b".into(),
            environment(vec![("X", EnvItem::value("${V:-b}"))]),
        );

        let document = interpolate_with(document, &lookup(&[])).unwrap();
        assert_eq!(value(&document.environments["a"], "X"), "a");
        assert_eq!(value(&document.environments["b"], "X"), "b");
    }

    #[test]
    #[serial_test::serial]
    fn test_process_env_lookup() {
        unsafe { env::set_var("KUBA_CORE_FALLBACK", "from-process") };
        let found = ProcessEnv.lookup("KUBA_CORE_FALLBACK");
        let expanded = expand("${KUBA_CORE_FALLBACK}!", &BTreeMap::new(), &ProcessEnv);
        unsafe { env::remove_var("KUBA_CORE_FALLBACK") };

        assert_eq!(found.as_deref(), Some("from-process"));
        assert_eq!(expanded.unwrap(), "from-process!");
    }
}
