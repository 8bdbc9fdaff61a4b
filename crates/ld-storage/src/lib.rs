use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Set when the user explicitly disconnects; survives restarts.
pub const USER_DISCONNECTED_KEY: &str = "userDisconnectedWallet";

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

pub async fn read_flag(store: &dyn KeyValueStore, key: &str) -> Result<bool> {
    Ok(store.get(key).await?.as_deref() == Some("true"))
}

pub async fn write_flag(store: &dyn KeyValueStore, key: &str, value: bool) -> Result<()> {
    store.set(key, if value { "true" } else { "false" }).await
}

#[derive(Default)]
pub struct InMemoryStore {
    values: RwLock<BTreeMap<String, String>>,
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let guard = self.values.read().await;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut guard = self.values.write().await;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// Flat JSON object on disk. Writes go to a sibling temp file and are renamed into place.
pub struct JsonFileStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
}

impl JsonFileStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match tokio::fs::read(&path).await {
            Ok(raw) if raw.is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_slice(&raw)
                .with_context(|| format!("failed to parse state file: {}", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read state file: {}", path.display()));
            }
        };

        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, values: &BTreeMap<String, String>) -> Result<()> {
        let body = serde_json::to_vec_pretty(values)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, body)
            .await
            .with_context(|| format!("failed to write state file: {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed to replace state file: {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let guard = self.values.read().await;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut guard = self.values.write().await;
        guard.insert(key.to_owned(), value.to_owned());
        self.flush(&guard).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn flag_defaults_to_false() -> Result<()> {
        let store = InMemoryStore::default();
        assert!(!read_flag(&store, USER_DISCONNECTED_KEY).await?);
        write_flag(&store, USER_DISCONNECTED_KEY, true).await?;
        assert!(read_flag(&store, USER_DISCONNECTED_KEY).await?);
        write_flag(&store, USER_DISCONNECTED_KEY, false).await?;
        assert!(!read_flag(&store, USER_DISCONNECTED_KEY).await?);
        Ok(())
    }

    #[tokio::test]
    async fn file_store_survives_reopen() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("session.json");

        {
            let store = JsonFileStore::open(&path).await?;
            assert!(!read_flag(&store, USER_DISCONNECTED_KEY).await?);
            write_flag(&store, USER_DISCONNECTED_KEY, true).await?;
        }

        let reopened = JsonFileStore::open(&path).await?;
        assert!(read_flag(&reopened, USER_DISCONNECTED_KEY).await?);
        assert!(!path.with_extension("tmp").exists());
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("session.json");
        tokio::fs::write(&path, b"{not json").await?;
        let err = match JsonFileStore::open(&path).await {
            Ok(_) => anyhow::bail!("corrupt file should not open"),
            Err(err) => err,
        };
        assert!(err.to_string().contains("failed to parse state file"));
        Ok(())
    }
}
