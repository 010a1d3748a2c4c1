//! Ready-made persistable value.

use crate::core::{GameSave, LoadMode, Payload, Result, SaveError};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// A typed value that takes part in save and load under a fixed identity.
///
/// A missing or null payload resets the value to `T::default()`.
///
/// # Examples
///
/// ```
/// use saveload::SaveCell;
///
/// let gold = SaveCell::new("gold", 0u32).greedy();
/// gold.set(250).unwrap();
/// assert_eq!(gold.get().unwrap(), 250);
/// ```
pub struct SaveCell<T> {
    save_id: String,
    shared: bool,
    load_mode: LoadMode,
    value: Mutex<T>,
    loads: AtomicU64,
}

impl<T> SaveCell<T>
where
    T: Serialize + DeserializeOwned + Default + Send + 'static,
{
    pub fn new(save_id: impl Into<String>, value: T) -> Self {
        Self {
            save_id: save_id.into(),
            shared: false,
            load_mode: LoadMode::Lazy,
            value: Mutex::new(value),
            loads: AtomicU64::new(0),
        }
    }

    /// Store once for every slot.
    pub fn shared(mut self) -> Self {
        self.shared = true;
        self
    }

    /// Restore on `load` instead of on subscribe.
    pub fn greedy(mut self) -> Self {
        self.load_mode = LoadMode::Greedy;
        self
    }

    pub fn get(&self) -> Result<T>
    where
        T: Clone,
    {
        Ok(self.value.lock()?.clone())
    }

    pub fn set(&self, value: T) -> Result<()> {
        *self.value.lock()? = value;
        Ok(())
    }

    pub fn update<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut T),
    {
        let mut value = self.value.lock()?;
        mutate(&mut *value);
        Ok(())
    }

    /// How many times the value has been restored.
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T> GameSave for SaveCell<T>
where
    T: Serialize + DeserializeOwned + Default + Send + 'static,
{
    fn save_id(&self) -> String {
        self.save_id.clone()
    }

    fn is_shared(&self) -> bool {
        self.shared
    }

    fn load_mode(&self) -> LoadMode {
        self.load_mode
    }

    fn save_data(&self) -> Result<Payload> {
        let value = self.value.lock()?;
        Ok(serde_json::to_value(&*value)?)
    }

    async fn on_load(&self, payload: Option<Payload>) -> Result<()> {
        let restored = match payload {
            Some(Payload::Null) | None => T::default(),
            Some(payload) => serde_json::from_value(payload)
                .map_err(|e| SaveError::restore(&self.save_id, e))?,
        };
        *self.value.lock()? = restored;
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Position {
        x: i32,
        y: i32,
    }

    #[tokio::test]
    async fn test_restores_typed_value() {
        let cell = SaveCell::new("pos", Position { x: 1, y: 2 });
        let payload = cell.save_data().unwrap();
        assert_eq!(payload, json!({"x": 1, "y": 2}));

        cell.set(Position::default()).unwrap();
        cell.on_load(Some(payload)).await.unwrap();
        assert_eq!(cell.get().unwrap(), Position { x: 1, y: 2 });
        assert_eq!(cell.load_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_payload_resets_to_default() {
        let cell = SaveCell::new("pos", Position { x: 9, y: 9 });
        cell.on_load(None).await.unwrap();
        assert_eq!(cell.get().unwrap(), Position::default());
    }

    #[tokio::test]
    async fn test_null_payload_resets_to_default() {
        let cell = SaveCell::new("count", 5u32);
        cell.on_load(Some(json!(null))).await.unwrap();
        assert_eq!(cell.get().unwrap(), 0);
        assert_eq!(cell.load_count(), 1);
    }

    #[tokio::test]
    async fn test_bad_payload_keeps_value() {
        let cell = SaveCell::new("count", 3i64);
        let err = cell.on_load(Some(json!("three"))).await.unwrap_err();
        assert!(matches!(err, SaveError::Restore { identity, .. } if identity == "count"));
        assert_eq!(cell.get().unwrap(), 3);
        assert_eq!(cell.load_count(), 0);
    }

    #[test]
    fn test_builder_flags() {
        let cell = SaveCell::new("volume", 0.5f32).shared().greedy();
        assert!(cell.is_shared());
        assert_eq!(cell.load_mode(), LoadMode::Greedy);

        cell.update(|v| *v += 0.25).unwrap();
        assert_eq!(cell.get().unwrap(), 0.75);
    }
}
