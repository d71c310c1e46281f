//! Configuration Integration Tests
//!
//! Loads YAML files from disk and builds managers from the result.

use media_uploadr::config::{Config, ConfigError, StorageBackend};
use media_uploadr::policy::Purpose;
use media_uploadr::storage::MemoryStore;
use media_uploadr::upload::{SourceFile, UploadManager};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_full_config() {
    let file = write_config(
        r#"
storage:
  backend: http
  endpoint: "http://storage.local:9000"
  public_base_url: "https://cdn.example.com"
  timeout_secs: 30
upload:
  progress_interval_ms: 250
  progress_step: 5
  progress_cap: 95
  transfer_timeout_secs: 60
identity:
  jwt_secret: "dev-secret"
  issuer: "newsroom"
policies:
  avatar:
    bucket: agent-avatars
metrics:
  enabled: false
"#,
    );

    let config = Config::load(file.path()).unwrap();

    assert_eq!(config.storage.backend, StorageBackend::Http);
    assert_eq!(config.storage.public_base_url.as_deref(), Some("https://cdn.example.com"));
    assert_eq!(config.upload.progress_interval(), Duration::from_millis(250));
    assert_eq!(config.upload.transfer_timeout(), Duration::from_secs(60));
    assert_eq!(config.identity.unwrap().issuer.as_deref(), Some("newsroom"));
    assert_eq!(
        config.policies[&Purpose::Avatar].bucket.as_deref(),
        Some("agent-avatars")
    );
    assert!(!config.metrics.enabled);
}

#[test]
fn test_empty_file_uses_defaults() {
    let file = write_config("{}\n");
    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.storage.backend, StorageBackend::Memory);
    assert_eq!(config.upload.progress_cap, 90);
    assert!(config.policies.is_empty());
}

#[test]
fn test_missing_file() {
    let result = Config::load("/nonexistent/media-uploadr.yaml");
    assert!(matches!(result, Err(ConfigError::IoError(_))));
}

#[test]
fn test_http_backend_requires_valid_endpoint() {
    let file = write_config(
        r#"
storage:
  backend: http
  endpoint: "storage.local"
"#,
    );
    assert!(matches!(
        Config::load(file.path()),
        Err(ConfigError::ValidationError(_))
    ));
}

#[tokio::test]
async fn test_configured_overrides_reach_manager() {
    let file = write_config(
        r#"
policies:
  media:
    max_items: 1
    accept: "video/*"
"#,
    );
    let config = Config::load(file.path()).unwrap();

    let manager = UploadManager::builder(Arc::new(MemoryStore::new()))
        .purpose(Purpose::Media)
        .overrides(config.policy_overrides(Purpose::Media))
        .settings(config.upload.clone())
        .build();

    let report = manager
        .add_files(vec![
            SourceFile::new("a.png", "image/png", vec![0u8; 4]),
            SourceFile::new("b.mp4", "video/mp4", vec![0u8; 4]),
            SourceFile::new("c.mp4", "video/mp4", vec![0u8; 4]),
        ])
        .await;

    assert_eq!(report.accepted.len(), 1);
    assert_eq!(report.rejected.len(), 2);
    assert_eq!(manager.items()[0].file_name, "b.mp4");
}
