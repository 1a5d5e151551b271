use crate::provider::{self, Provider, ProviderConfig};
use crate::{KubaError, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Mock provider for testing
///
/// Clones share the same call log, so a test can keep one handle while the
/// code under test owns the boxed provider.
#[derive(Clone, Default)]
pub struct MockProvider {
    secrets: Arc<BTreeMap<String, String>>,
    calls: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl MockProvider {
    pub fn new<'a>(secrets: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            secrets: Arc::new(
                secrets
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    /// Every key or path asked for so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Provider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn get_secret(&self, key: &str) -> Result<Option<String>> {
        self.calls.lock().unwrap().push(key.to_string());
        Ok(self.secrets.get(key).cloned())
    }

    fn get_secrets_by_path(&self, path: &str) -> Result<BTreeMap<String, String>> {
        self.calls.lock().unwrap().push(path.to_string());
        Ok(self
            .secrets
            .iter()
            .filter(|(k, _)| k.starts_with(path))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_local_provider_is_registered() {
    assert!(provider::is_available("local"));
    let names: Vec<_> = provider::providers().iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["local"]);

    let provider = provider::create("local", &ProviderConfig::default()).unwrap();
    assert_eq!(provider.name(), "local");
}

#[test]
fn test_local_provider_takes_no_settings() {
    use crate::provider::local::{LocalConfig, LocalProvider};

    let config = LocalConfig::try_from(&ProviderConfig::new("any-project")).unwrap();
    let mut provider = LocalProvider::new(config);
    assert_eq!(provider.name(), "local");
    assert!(provider.close().is_ok());
}

#[test]
fn test_local_provider_rejects_secret_lookups() {
    let provider = provider::create("local", &ProviderConfig::new("ignored")).unwrap();
    assert!(matches!(
        provider.get_secret("API_KEY"),
        Err(KubaError::ProviderOperationFailed(_))
    ));
    assert!(matches!(
        provider.get_secrets_by_path("db/"),
        Err(KubaError::ProviderOperationFailed(_))
    ));
}

#[test]
fn test_cloud_providers_are_unavailable() {
    for name in ["gcp", "aws", "azure", "openbao"] {
        match provider::create(name, &ProviderConfig::new("p")) {
            Err(KubaError::ProviderUnavailable(n)) => assert_eq!(n, name),
            Err(e) => panic!("unexpected error for {}: {}", name, e),
            Ok(_) => panic!("{} should not be compiled in", name),
        }
    }
}

#[test]
fn test_unknown_provider() {
    assert!(matches!(
        provider::create("vault", &ProviderConfig::default()),
        Err(KubaError::ProviderNotFound(name)) if name == "vault"
    ));
}

#[test]
fn test_default_get_secrets_skips_missing_keys() {
    let provider = MockProvider::new([("a", "1"), ("b", "2")]);
    let secrets = provider.get_secrets(&["a", "missing", "b"]).unwrap();

    let expected: HashMap<String, String> = [("a", "1"), ("b", "2")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    assert_eq!(secrets, expected);
    assert_eq!(provider.calls(), vec!["a", "missing", "b"]);
}

#[test]
fn test_provider_info_display() {
    let info = provider::providers()
        .into_iter()
        .find(|p| p.name == "local")
        .unwrap();
    assert_eq!(info.display(), "local: Literal values from the document");
}
