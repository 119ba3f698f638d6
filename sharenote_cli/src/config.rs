use std::{path::Path, sync::Arc, time::Duration};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sharenote_core::StorageBackend;
use sharenote_publish::{PublishConfig, RetryPolicy};
use sharenote_store_local::{LocalStore, LocalStoreConfig};
use sharenote_store_memory::MemoryStore;
use sharenote_store_s3::{S3Store, S3StoreConfig};
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SharenoteConfig {
    /// Prefix under which published objects are publicly reachable.
    pub public_base_url: Url,
    #[serde(default)]
    pub share_unencrypted: bool,
    #[serde(default)]
    pub retry: RetryConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryConfig {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: RetryPolicy::ASSET.attempts,
            delay_ms: RetryPolicy::ASSET.delay.as_millis() as u64,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        RetryPolicy::new(config.attempts, Duration::from_millis(config.delay_ms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum StoreConfig {
    Local(LocalStoreConfig),
    S3(S3StoreConfig),
    /// Discards everything on exit; useful for dry runs.
    Memory,
}

impl SharenoteConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let toml_content = std::fs::read_to_string(path).with_context(|| {
            format!(
                "failed to read config file {} (run `sharenote config init` first)",
                path.display()
            )
        })?;
        toml::from_str(&toml_content)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn publish_config(&self) -> PublishConfig {
        PublishConfig {
            share_unencrypted: self.share_unencrypted,
            ..Default::default()
        }
    }
}

pub fn open_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn StorageBackend>> {
    let store: Arc<dyn StorageBackend> = match config.clone() {
        StoreConfig::Local(config) => Arc::new(LocalStore::create(config)),
        StoreConfig::S3(config) => Arc::new(S3Store::create(config)?),
        StoreConfig::Memory => Arc::new(MemoryStore::new()),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_s3_config() {
        let config: SharenoteConfig = toml::from_str(
            r#"
public_base_url = "https://notes.example.com/"

[store]
type = "s3"
endpoint = "https://s3.example.com"
bucket_name = "notes"
access_key = "AKIA"
secret_key = "secret"
"#,
        )
        .unwrap();

        assert!(!config.share_unencrypted);
        assert_eq!(config.retry, RetryConfig::default());
        assert_eq!(RetryPolicy::from(&config.retry), RetryPolicy::ASSET);
        match config.store {
            StoreConfig::S3(s3) => {
                assert_eq!(s3.region, "auto");
                assert_eq!(s3.bucket_name, "notes");
            }
            other => panic!("expected s3 store, got {other:?}"),
        }
    }

    #[test]
    fn parses_local_config_with_overrides() {
        let config: SharenoteConfig = toml::from_str(
            r#"
public_base_url = "http://localhost:8080/"
share_unencrypted = true

[retry]
attempts = 2
delay_ms = 250

[store]
type = "local"
base_path = "/srv/www"
"#,
        )
        .unwrap();

        assert!(config.publish_config().share_unencrypted);
        assert_eq!(
            RetryPolicy::from(&config.retry),
            RetryPolicy::new(2, Duration::from_millis(250))
        );
        assert_eq!(
            config.store,
            StoreConfig::Local(LocalStoreConfig {
                base_path: "/srv/www".to_owned()
            })
        );
    }

    #[test]
    fn rejects_unknown_store_type() {
        let result: Result<SharenoteConfig, _> = toml::from_str(
            r#"
public_base_url = "http://localhost:8080/"

[store]
type = "ftp"
"#,
        );
        assert!(result.is_err());
    }
}
