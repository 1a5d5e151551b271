#![allow(dead_code)]

use kuba::CacheManager;
use kuba_core::CacheConfig;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

/// Test helper owning a temporary project directory and cache database
pub struct TestFixture {
    _temp_dir: TempDir,
    pub base_path: PathBuf,
}

impl TestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let base_path = temp_dir.path().canonicalize().unwrap();
        Self {
            _temp_dir: temp_dir,
            base_path,
        }
    }

    /// Writes `content` to `kuba.yaml` in the fixture directory
    pub fn write_document(&self, content: &str) -> PathBuf {
        self.write_file("kuba.yaml", content)
    }

    pub fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.base_path.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    pub fn cache_location(&self) -> PathBuf {
        self.base_path.join("cache").join("cache.db")
    }

    pub fn cache(&self, ttl: Duration) -> CacheManager {
        CacheManager::open_at(CacheConfig::enabled(ttl), &self.cache_location()).unwrap()
    }
}

/// A document with the environment layout used across the integration tests
pub const LAYERED_DOCUMENT: &str = r#"
base:
  provider: local
  env:
    REGION:
      value: eu-west-1
    LOG_LEVEL:
      value: info
    TIMEOUT:
      value: 30

staging:
  provider: local
  inherits: [base]
  cache:
    ttl: 5m
  env:
    LOG_LEVEL:
      value: debug
    ENDPOINT:
      value: "https://staging.${REGION}.example.com"

production:
  provider: local
  inherits: [base, staging]
  env:
    ENDPOINT:
      value: "https://${REGION}.example.com"
"#;
