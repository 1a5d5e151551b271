use super::{Provider, ProviderConfig};
use crate::{KubaError, Result};
use std::collections::BTreeMap;

/// Configuration for the local provider. It takes no settings; a project,
/// if given, is ignored.
#[derive(Debug, Clone, Default)]
pub struct LocalConfig {}

impl TryFrom<&ProviderConfig> for LocalConfig {
    type Error = KubaError;

    fn try_from(_config: &ProviderConfig) -> Result<Self> {
        Ok(Self::default())
    }
}

/// Provider for environments whose variables are all literal `value`s.
///
/// Values never reach a provider: they are read straight from the resolved
/// document. Asking this provider for a secret is therefore always an error,
/// which matches the validator's rule that `local` items use `value`.
pub struct LocalProvider;

crate::register_provider! {
    struct: LocalProvider,
    config: LocalConfig,
    name: "local",
    description: "Literal values from the document",
}

impl LocalProvider {
    pub fn new(_config: LocalConfig) -> Self {
        Self
    }
}

impl Provider for LocalProvider {
    fn name(&self) -> &'static str {
        Self::PROVIDER_NAME
    }

    fn get_secret(&self, key: &str) -> Result<Option<String>> {
        Err(KubaError::ProviderOperationFailed(format!(
            "the local provider has no secret store; declare '{}' with `value`",
            key
        )))
    }

    fn get_secrets_by_path(&self, path: &str) -> Result<BTreeMap<String, String>> {
        Err(KubaError::ProviderOperationFailed(format!(
            "the local provider has no secret store; cannot list '{}'",
            path
        )))
    }
}
