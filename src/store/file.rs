use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{AppError, AppResult};
use crate::store::KeyValueStore;

/// A store persisted as a single JSON object on disk. Every write rewrites the
/// file through a temporary sibling so a crash never leaves it half written.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    pub async fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|err| {
                AppError::Storage(format!("corrupt store {}: {err}", path.display()))
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(AppError::Storage(format!(
                    "failed to read {}: {err}",
                    path.display()
                )));
            }
        };

        tracing::debug!(path = %path.display(), entries = entries.len(), "store opened");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, entries: &BTreeMap<String, String>) -> AppResult<()> {
        let bytes = serde_json::to_vec_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");

        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|err| AppError::Storage(format!("failed to write {}: {err}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|err| {
            AppError::Storage(format!("failed to replace {}: {err}", self.path.display()))
        })
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> AppResult<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), value);
        self.flush(&entries).await
    }

    async fn remove(&self, key: &str) -> AppResult<()> {
        let mut entries = self.entries.lock().await;
        if entries.remove(key).is_some() {
            self.flush(&entries).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::FileStore;
    use crate::store::KeyValueStore;

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = FileStore::open(&path).await.unwrap();
        store.set("basket", "[]".to_string()).await.unwrap();
        store.set("app_language", "da".to_string()).await.unwrap();
        store.remove("basket").await.unwrap();
        drop(store);

        let reopened = FileStore::open(&path).await.unwrap();
        assert_eq!(reopened.get("app_language").await.unwrap().as_deref(), Some("da"));
        assert_eq!(reopened.get("basket").await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        assert!(FileStore::open(&path).await.is_err());
    }
}
