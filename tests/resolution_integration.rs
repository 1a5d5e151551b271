mod common;

use common::{LAYERED_DOCUMENT, TestFixture};
use kuba::{CacheManager, Secrets};
use kuba_core::{CacheConfig, ConfigError, Phase, load_document};
use serial_test::serial;
use std::time::Duration;

fn secrets(fixture: &TestFixture) -> Secrets {
    let doc = fixture.write_document(LAYERED_DOCUMENT);
    let document = load_document(&doc).unwrap();
    Secrets::new(&doc, document, CacheManager::new_or_disabled(CacheConfig::disabled()))
}

#[test]
fn test_first_parent_wins_and_own_values_override() {
    let fixture = TestFixture::new();
    let secrets = secrets(&fixture);

    let production = secrets.resolve("production").unwrap();
    assert_eq!(production["LOG_LEVEL"], "info");
    assert_eq!(production["ENDPOINT"], "https://eu-west-1.example.com");
    assert_eq!(production["TIMEOUT"], "30");

    let staging = secrets.resolve("staging").unwrap();
    assert_eq!(staging["LOG_LEVEL"], "debug");
    assert_eq!(staging["ENDPOINT"], "https://staging.eu-west-1.example.com");
}

#[test]
fn test_environment_cache_block_is_parsed() {
    let fixture = TestFixture::new();
    let secrets = secrets(&fixture);

    let staging = secrets.environment("staging").unwrap();
    let cache = staging.cache.as_ref().unwrap();
    assert!(cache.enabled);
    assert_eq!(cache.ttl, Duration::from_secs(300));
    assert!(secrets.environment("production").unwrap().cache.is_none());
}

#[test]
fn test_resolution_is_deterministic() {
    let fixture = TestFixture::new();
    let doc = fixture.write_document(LAYERED_DOCUMENT);

    let first = load_document(&doc).unwrap();
    for _ in 0..5 {
        assert_eq!(load_document(&doc).unwrap(), first);
    }
}

#[test]
#[serial]
fn test_interpolation_falls_back_to_process_environment() {
    let fixture = TestFixture::new();
    let doc = fixture.write_document(
        r#"
default:
  provider: local
  env:
    GREETING:
      value: "hello ${KUBA_IT_USER:-nobody}"
    UNSET:
      value: "${KUBA_IT_SURELY_UNSET}"
"#,
    );

    unsafe { std::env::set_var("KUBA_IT_USER", "ada") };
    let document = load_document(&doc);
    unsafe { std::env::remove_var("KUBA_IT_USER") };

    let secrets = Secrets::new(
        &doc,
        document.unwrap(),
        CacheManager::new_or_disabled(CacheConfig::disabled()),
    );
    let values = secrets.resolve("default").unwrap();
    assert_eq!(values["GREETING"], "hello ada");
    assert_eq!(values["UNSET"], "${KUBA_IT_SURELY_UNSET}");
}

#[test]
fn test_cycle_is_reported_with_phase() {
    let fixture = TestFixture::new();
    let doc = fixture.write_document(
        r#"
a:
  provider: local
  inherits: [b]
  env:
    X:
      value: 1
b:
  provider: local
  inherits: [a]
  env:
    Y:
      value: 2
"#,
    );

    let err = load_document(&doc).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Phase {
            phase: Phase::Inheritance,
            ..
        }
    ));
    assert!(matches!(err.root(), ConfigError::Cycle(_)));
}

#[test]
fn test_local_provider_rejects_secret_key() {
    let fixture = TestFixture::new();
    let doc = fixture.write_document(
        "default:\n  provider: local\n  env:\n    X:\n      secret-key: x\n",
    );

    let err = load_document(&doc).unwrap_err();
    assert!(matches!(
        err.root(),
        ConfigError::Validation { environment, .. } if environment == "default"
    ));
}
