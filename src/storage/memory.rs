use super::DataStorage;
use super::staging::BlobStage;
use crate::core::{Payload, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;

#[derive(Default)]
struct MemoryState {
    stage: BlobStage,
    commits: u64,
}

/// Volatile backend. Useful for tests and for sessions that never touch disk.
#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<MemoryState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys visible after the last commit, in ascending order.
    pub async fn committed_keys(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.stage.committed().keys().cloned().collect()
    }

    pub async fn committed(&self, key: &str) -> Option<Payload> {
        let state = self.state.lock().await;
        state.stage.committed().get(key).cloned()
    }

    pub async fn commit_count(&self) -> u64 {
        self.state.lock().await.commits
    }

    pub async fn has_uncommitted_changes(&self) -> bool {
        self.state.lock().await.stage.is_dirty()
    }
}

#[async_trait]
impl DataStorage for MemoryStorage {
    async fn get_blob(&self, key: &str) -> Result<Option<Payload>> {
        Ok(self.state.lock().await.stage.get(key))
    }

    async fn set_blob(&self, key: &str, payload: Payload) -> Result<()> {
        self.state.lock().await.stage.set(key, payload);
        Ok(())
    }

    async fn delete_key(&self, key: &str) -> Result<()> {
        self.state.lock().await.stage.delete(key);
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let merged = state.stage.merged();
        state.stage.finish_commit(merged);
        state.commits += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_writes_are_staged_until_commit() {
        let storage = MemoryStorage::new();
        storage.set_blob("data-0001-a", json!({"hp": 3})).await.unwrap();

        assert_eq!(
            storage.get_blob("data-0001-a").await.unwrap(),
            Some(json!({"hp": 3}))
        );
        assert!(storage.committed_keys().await.is_empty());
        assert!(storage.has_uncommitted_changes().await);

        storage.commit().await.unwrap();
        assert_eq!(storage.committed_keys().await, vec!["data-0001-a".to_string()]);
        assert_eq!(storage.commit_count().await, 1);
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_harmless() {
        let storage = MemoryStorage::new();
        storage.delete_key("data-0003-nothing").await.unwrap();
        storage.commit().await.unwrap();
        assert!(storage.committed_keys().await.is_empty());
        assert_eq!(storage.get_blob("data-0003-nothing").await.unwrap(), None);
    }
}
