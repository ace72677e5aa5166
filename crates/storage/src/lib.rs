use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use consent_core::{EngineConfig, RuleSet};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const CONFIG_KEY: &str = "config";
pub const RULES_KEY: &str = "rules";

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// One pretty-printed JSON file per key.
pub struct JsonFileStore {
    folder: PathBuf,
}

impl JsonFileStore {
    pub fn new(folder: impl Into<PathBuf>) -> Result<Self> {
        let folder = folder.into();
        std::fs::create_dir_all(&folder)
            .with_context(|| format!("creating store folder {}", folder.display()))?;
        Ok(Self { folder })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.folder.join(format!("{key}.json"))
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path(key);
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err).with_context(|| format!("reading {}", path.display())),
        };
        let value = serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(value))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let data = serde_json::to_string_pretty(&value)?;
        tokio::fs::write(self.path(key), data).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path(key)).await {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// Stored engine config, persisting the defaults on first use.
pub async fn load_or_init_config(store: &dyn KeyValueStore) -> Result<EngineConfig> {
    if let Some(stored) = store.get(CONFIG_KEY).await? {
        debug!("using stored config");
        return serde_json::from_value(stored).context("decoding stored config");
    }

    info!("initialising default config");
    let config = EngineConfig::default();
    store.set(CONFIG_KEY, serde_json::to_value(&config)?).await?;
    Ok(config)
}

pub async fn save_config(store: &dyn KeyValueStore, config: &EngineConfig) -> Result<()> {
    store.set(CONFIG_KEY, serde_json::to_value(config)?).await
}

/// Rule set from the store, empty when none was installed.
pub async fn load_rules(store: &dyn KeyValueStore) -> Result<RuleSet> {
    match store.get(RULES_KEY).await? {
        Some(raw) => serde_json::from_value(raw).context("decoding stored rules"),
        None => Ok(RuleSet::default()),
    }
}

/// Reads a rules file and installs it in the store.
pub async fn install_rules(store: &dyn KeyValueStore, path: &Path) -> Result<RuleSet> {
    let data = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading rules from {}", path.display()))?;
    let rules: RuleSet = serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
    store.set(RULES_KEY, serde_json::to_value(&rules)?).await?;
    info!(
        autoconsent = rules.autoconsent.len(),
        consentomatic = rules.consentomatic.len(),
        "installed rules"
    );
    Ok(rules)
}
