//! On-device key-value persistence.

pub mod file;
pub mod keys;
pub mod memory;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::AppResult;

pub use file::FileStore;
pub use memory::MemoryStore;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<String>>;
    async fn set(&self, key: &str, value: String) -> AppResult<()>;
    async fn remove(&self, key: &str) -> AppResult<()>;
}

/// Reads a JSON value. Unparsable entries are treated as absent.
pub async fn get_json<T>(store: &dyn KeyValueStore, key: &str) -> AppResult<Option<T>>
where
    T: DeserializeOwned,
{
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            tracing::warn!(key, error = %err, "discarding unreadable stored value");
            Ok(None)
        }
    }
}

pub async fn set_json<T>(store: &dyn KeyValueStore, key: &str, value: &T) -> AppResult<()>
where
    T: Serialize + ?Sized,
{
    let raw = serde_json::to_string(value)?;
    store.set(key, raw).await
}

#[cfg(test)]
mod tests {
    use super::{KeyValueStore, MemoryStore, get_json, set_json};

    #[tokio::test]
    async fn json_helpers_round_trip_and_tolerate_garbage() {
        let store = MemoryStore::new();
        set_json(&store, "numbers", &vec![1, 2, 3]).await.unwrap();
        let numbers: Option<Vec<i32>> = get_json(&store, "numbers").await.unwrap();
        assert_eq!(numbers, Some(vec![1, 2, 3]));

        store.set("numbers", "{not json".to_string()).await.unwrap();
        let numbers: Option<Vec<i32>> = get_json(&store, "numbers").await.unwrap();
        assert_eq!(numbers, None);
    }
}
