//! Structural and per-provider checks on a resolved document.
//!
//! Rules are checked in a fixed order and the first violation is reported.
//! Environments and variables are visited in name order.

use crate::config::{Document, EnvItem, Environment, ProviderKind};
use crate::error::{ConfigError, Result};

/// Validates every environment of a document whose inheritance is already resolved.
pub fn validate(document: &Document) -> Result<()> {
    if document.is_empty() {
        return Err(ConfigError::Validation {
            environment: String::new(),
            reason: "no environments defined".into(),
        });
    }

    for (name, environment) in &document.environments {
        validate_environment(environment).map_err(|reason| ConfigError::Validation {
            environment: name.clone(),
            reason,
        })?;
    }

    Ok(())
}

/// Validates a single resolved environment, returning the reason on failure.
pub fn validate_environment(environment: &Environment) -> std::result::Result<(), String> {
    if environment.provider.is_empty() {
        return Err("provider is required".into());
    }
    let provider: ProviderKind = environment.provider.parse()?;

    if provider.requires_project() && environment.project.is_empty() {
        return Err(format!("project is required for provider '{}'", provider));
    }

    if environment.variables.is_empty() {
        return Err("at least one variable must be defined".into());
    }

    for (name, item) in &environment.variables {
        validate_item(item, environment).map_err(|e| format!("variable '{}': {}", name, e))?;
    }

    Ok(())
}

fn validate_item(item: &EnvItem, environment: &Environment) -> std::result::Result<(), String> {
    match item.source_count() {
        1 => {}
        0 => return Err("one of secret-key, secret-path or value is required".into()),
        _ => return Err("only one of secret-key, secret-path or value may be set".into()),
    }

    if let Some(provider) = &item.provider {
        provider.parse::<ProviderKind>()?;
    }

    if item.effective_provider(environment) == ProviderKind::Local.as_str()
        && (item.secret_key.is_some() || item.secret_path.is_some())
    {
        return Err("the local provider only supports value".into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Scalar;

    fn doc_with(environment: Environment) -> Document {
        let mut document = Document::default();
        document.environments.insert("dev".into(), environment);
        document
    }

    fn environment(provider: &str, project: &str, items: Vec<(&str, EnvItem)>) -> Environment {
        Environment {
            provider: provider.into(),
            project: project.into(),
            variables: items.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            ..Environment::default()
        }
    }

    fn reason(result: Result<()>) -> String {
        match result {
            Err(ConfigError::Validation {
                environment,
                reason,
            }) => {
                assert_eq!(environment, "dev");
                reason
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_document() {
        assert!(matches!(
            validate(&Document::default()),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn test_provider_required_and_known() {
        let env = environment("", "p", vec![("X", EnvItem::value("v"))]);
        assert!(reason(validate(&doc_with(env))).contains("provider is required"));

        let env = environment("vault", "p", vec![("X", EnvItem::value("v"))]);
        assert!(reason(validate(&doc_with(env))).contains("unknown provider 'vault'"));
    }

    #[test]
    fn test_project_requirement() {
        let env = environment("gcp", "", vec![("X", EnvItem::secret_key("k"))]);
        assert!(reason(validate(&doc_with(env))).contains("project is required"));

        for provider in ["aws", "azure", "openbao"] {
            let env = environment(provider, "", vec![("X", EnvItem::secret_key("k"))]);
            assert!(validate(&doc_with(env)).is_ok(), "{} needs no project", provider);
        }
        let env = environment("local", "", vec![("X", EnvItem::value("v"))]);
        assert!(validate(&doc_with(env)).is_ok());
    }

    #[test]
    fn test_variables_required() {
        let env = environment("aws", "", vec![]);
        assert!(reason(validate(&doc_with(env))).contains("at least one variable"));
    }

    #[test]
    fn test_exactly_one_source() {
        let mut both = EnvItem::secret_key("k");
        both.value = Some(Scalar::from("v"));
        let env = environment("gcp", "p", vec![("X", both)]);
        assert!(reason(validate(&doc_with(env))).contains("only one of"));

        let env = environment("gcp", "p", vec![("X", EnvItem::default())]);
        assert!(reason(validate(&doc_with(env))).contains("is required"));

        let env = environment("gcp", "p", vec![("X", EnvItem::secret_path("db/"))]);
        assert!(validate(&doc_with(env)).is_ok());
    }

    #[test]
    fn test_item_provider_override_must_be_known() {
        let mut item = EnvItem::secret_key("k");
        item.provider = Some("keyring".into());
        let env = environment("aws", "", vec![("X", item)]);
        assert!(reason(validate(&doc_with(env))).contains("unknown provider 'keyring'"));
    }

    #[test]
    fn test_local_provider_requires_value() {
        let env = environment("local", "", vec![("X", EnvItem::secret_key("k"))]);
        assert!(reason(validate(&doc_with(env))).contains("only supports value"));

        let env = environment("local", "", vec![("X", EnvItem::secret_path("p/"))]);
        assert!(reason(validate(&doc_with(env))).contains("only supports value"));

        let mut with_value = EnvItem::secret_key("k");
        with_value.value = Some(Scalar::from("v"));
        let env = environment("local", "", vec![("X", with_value)]);
        assert!(validate(&doc_with(env)).is_err());
    }

    #[test]
    fn test_local_override_on_cloud_environment() {
        let mut item = EnvItem::secret_key("k");
        item.provider = Some("local".into());
        let env = environment("aws", "", vec![("X", item)]);
        assert!(reason(validate(&doc_with(env))).contains("only supports value"));

        let mut item = EnvItem::value("v");
        item.provider = Some("local".into());
        let env = environment("aws", "", vec![("X", item)]);
        assert!(validate(&doc_with(env)).is_ok());
    }

    #[test]
    fn test_first_failure_wins() {
        let mut document = Document::default();
        document.environments.insert(
            "a".into(),
            environment("gcp", "", vec![("X", EnvItem::default())]),
        );
        document
            .environments
            .insert("b".into(), environment("nope", "", vec![]));

        match validate(&document) {
            Err(ConfigError::Validation {
                environment,
                reason,
            }) => {
                assert_eq!(environment, "a");
                assert!(reason.contains("project is required"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
